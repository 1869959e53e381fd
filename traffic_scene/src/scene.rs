//! Raw JSON scene schema (spec §6), deserialized as-is before being
//! resolved into a [`traffic_core::WorldSpec`].

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct SceneJunction {
    pub id: u32,
    pub x: f64,
    pub y: f64,
    pub terminal: bool,
}

#[derive(Debug, Deserialize)]
pub struct SceneRoad {
    pub id: u32,
    pub source: u32,
    pub target: u32,
    pub lanes: u32,
    pub v_avg: f64,
    pub v_std: f64,
    pub is_sidewalk: bool,
}

#[derive(Debug, Deserialize)]
pub struct SceneCar {
    pub id: u64,
    pub road: u32,
    pub lane: u32,
    pub cell: u32,
    pub target_junction: u32,
    pub velocity: f64,
}

#[derive(Debug, Deserialize)]
pub struct ScenePedestrian {
    pub id: u64,
    pub road: u32,
    pub lane: u32,
    pub cell: u32,
    pub target_junction: u32,
    pub velocity: f64,
    pub t_walk_lights: f64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SceneLight {
    Timed {
        id: u32,
        road: u32,
        duration_green: f64,
        duration_red: f64,
        state: SceneLightState,
    },
    Complementary {
        id: u32,
        road: u32,
        complementary_to: u32,
        negates: bool,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SceneLightState {
    Green,
    Red,
}

#[derive(Debug, Deserialize)]
pub struct SceneSpawner {
    pub junction: u32,
    pub spawns_pedestrians: bool,
    pub spawn_freq: f64,
    pub spawn_freq_std: f64,
    pub random_delay_on_start: bool,
}

#[derive(Debug, Deserialize)]
pub struct Scene {
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub junctions: Vec<SceneJunction>,
    #[serde(default)]
    pub roads: Vec<SceneRoad>,
    #[serde(default)]
    pub cars: Vec<SceneCar>,
    #[serde(default)]
    pub pedestrians: Vec<ScenePedestrian>,
    #[serde(default)]
    pub lights: Vec<SceneLight>,
    #[serde(default)]
    pub spawners: Vec<SceneSpawner>,
}
