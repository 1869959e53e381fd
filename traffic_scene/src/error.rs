//! Errors raised while parsing and resolving a scene file.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SceneError {
    #[error("failed to read scene file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse scene JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("scene references unknown light id {0} as complementary_to")]
    UnknownComplementaryTarget(u32),

    #[error(transparent)]
    World(#[from] traffic_core::SimError),
}
