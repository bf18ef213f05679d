//! Application state.

use std::sync::Arc;

use ytmp3_media::{ensure_output_dir, ConversionConfig};
use ytmp3_models::HostAllowList;

use crate::config::ApiConfig;
use crate::error::{set_production_mode, ApiResult};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    /// Conversion settings shared by every job
    pub conversion: Arc<ConversionConfig>,
    pub allowed_hosts: Arc<HostAllowList>,
}

impl AppState {
    /// Create new application state.
    ///
    /// Creates the download directory and pins it to an absolute path so
    /// success messages and `/downloads` agree on the location. Also fixes
    /// how much error detail responses reveal, from `config.environment`.
    pub async fn new(config: ApiConfig) -> ApiResult<Self> {
        let mut conversion = config.conversion.clone();
        conversion.output_dir = ensure_output_dir(&conversion.output_dir).await?;

        let allowed_hosts = Arc::new(config.allowed_hosts.clone());
        set_production_mode(config.is_production());

        Ok(Self {
            config,
            conversion: Arc::new(conversion),
            allowed_hosts,
        })
    }
}
