//! Errors raised while building a content graph from bytecode JSON.

use thiserror::Error;

pub mod messages {
    pub const VERSION_MISSING: &str = "Version of ink could not be found";
    pub const VERSION_TOO_NEW: &str =
        "Version of ink used to build story was newer than the current version of the loader";
    pub const VERSION_TOO_OLD: &str =
        "Version of ink used to build story is too old to be loaded by this version of the loader";
    pub const VERSION_OUT_OF_DATE: &str = "Version of ink used to build story doesn't match current version of loader. Non-critical, but recommend synchronising.";
    pub const ROOT_MISSING: &str = "Root node for ink not found";
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("story JSON could not be parsed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{}", messages::VERSION_MISSING)]
    VersionMissing,

    #[error("Version of ink value was malformed: {0}")]
    VersionMalformed(String),

    #[error("{} ({})", messages::VERSION_TOO_NEW, .0)]
    VersionTooNew(u32),

    #[error("{} ({})", messages::VERSION_TOO_OLD, .0)]
    VersionTooOld(u32),

    #[error("{}", messages::ROOT_MISSING)]
    MissingRoot,

    #[error("malformed story content: {0}")]
    Malformed(String),

    #[error("Failed to convert token to runtime object: '{0}'")]
    UnknownToken(String),
}

impl LoadError {
    pub fn is_version(&self) -> bool {
        matches!(
            self,
            LoadError::VersionMissing
                | LoadError::VersionMalformed(_)
                | LoadError::VersionTooNew(_)
                | LoadError::VersionTooOld(_)
        )
    }
}
