//! Scene loading: parses the JSON scene document (spec §6) and resolves it
//! into a [`traffic_core::World`].

pub mod error;
pub mod loader;
pub mod scene;

pub use error::SceneError;
pub use loader::load_world;
pub use scene::Scene;
