use super::ConfigError;
use url::Url;

/// `https://host[:port]/...` → `wss://host[:port]`, anything else → `ws://host[:port]`.
pub fn websocket_url_for(server_url: &str) -> Result<String, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidServerUrl {
        url: server_url.to_string(),
        reason,
    };

    let parsed = Url::parse(server_url).map_err(|e| invalid(e.to_string()))?;
    let host = parsed.host_str().ok_or_else(|| invalid("missing host".into()))?;

    let scheme = if parsed.scheme() == "https" { "wss" } else { "ws" };

    Ok(match parsed.port() {
        Some(port) => format!("{scheme}://{host}:{port}"),
        None => format!("{scheme}://{host}"),
    })
}
