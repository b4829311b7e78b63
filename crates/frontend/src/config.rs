//! Build-time settings of the document remote.
//!
//! Values are baked in by the compiler from the environment of the build:
//!
//! - `ATLAS_SILO_BASE`: base URL of the silo API (default `/api/silo`, the bundled backend)
//! - `ATLAS_SILO_ID`: id of the document
//! - `ATLAS_SILO_KEY`: write key sent with every save

/// Document shipped with the default deployment.
pub const DEFAULT_SILO_ID: &str = "8ee3d1ad-fe62-4ac5-9838-8b1ccbccac89";

pub const DEFAULT_SILO_BASE: &str = "/api/silo";

#[derive(Debug, Clone, PartialEq)]
pub struct SiloConfig {
    /// Public read endpoint.
    pub public_url: String,
    /// Authenticated write endpoint.
    pub manage_url: String,
    pub write_key: String,
}

impl SiloConfig {
    pub fn new(base: &str, silo_id: &str, write_key: &str) -> Self {
        let base = base.trim_end_matches('/');
        SiloConfig {
            public_url: format!("{}/public/{}", base, silo_id),
            manage_url: format!("{}/api/v1/manage/{}", base, silo_id),
            write_key: write_key.to_string(),
        }
    }

    pub fn from_env() -> Self {
        let config = SiloConfig::new(
            option_env!("ATLAS_SILO_BASE").unwrap_or(DEFAULT_SILO_BASE),
            option_env!("ATLAS_SILO_ID").unwrap_or(DEFAULT_SILO_ID),
            option_env!("ATLAS_SILO_KEY").unwrap_or(""),
        );
        if config.write_key.is_empty() {
            tracing::warn!("ATLAS_SILO_KEY not set at build time, saves will be rejected");
        }
        config
    }
}
