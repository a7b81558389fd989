mod redacted;
mod settings;
mod stream_url;

pub use redacted::Redacted;
pub use settings::{Overrides, Settings, DEFAULT_PREFIX, ENV_PREFIX};
pub use stream_url::websocket_url_for;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("invalid server url '{url}': {reason}")]
    InvalidServerUrl { url: String, reason: String },

    #[error("failed to read configuration: {0}")]
    Source(#[from] ::config::ConfigError),
}
