use super::{stream_url, ConfigError, Redacted};
use ::config::{Config, Environment, File, Source};
use serde::Deserialize;
use std::path::Path;

pub const DEFAULT_PREFIX: &str = "!xkcd";
pub const ENV_PREFIX: &str = "XKCD_BOT";

const KEYS: [&str; 6] = ["server_url", "team", "log_channel", "bot_token", "bot_id", "prefix"];

/// Connection and behavior parameters. Built once at startup and passed by reference.
/// `Debug` goes through [`Redacted`], so the token never reaches the logs.
#[derive(Clone)]
pub struct Settings {
    pub server_url: String, // e.g. https://chat.example.com
    pub team: String,
    pub log_channel: String,
    pub bot_token: String,
    pub bot_id: String,
    pub prefix: String,

    /// Derived from `server_url`: same host/port, `ws`/`wss` scheme.
    pub websocket_url: String,
}

/// Values given on the command line. `None` means "not given" and lets lower sources win.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub server_url: Option<String>,
    pub bot_id: Option<String>,
    pub bot_token: Option<String>,
    pub log_channel: Option<String>,
    pub team: Option<String>,
    pub prefix: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSettings {
    server_url: Option<String>,
    team: Option<String>,
    log_channel: Option<String>,
    bot_token: Option<String>,
    bot_id: Option<String>,
    prefix: Option<String>,
}

impl Settings {
    /// Merges, lowest priority first: config file, `XKCD_BOT_*` environment, flags.
    pub fn load(config_file: Option<&Path>, overrides: &Overrides) -> Result<Self, ConfigError> {
        let _ = dotenvy::from_filename(".env");

        let mut builder = Config::builder().set_default("prefix", DEFAULT_PREFIX)?;

        // File values sit just above the defaults, under env and flags. Keys are
        // matched ignoring case and underscores, so `serverUrl` works too.
        if let Some(path) = config_file {
            tracing::info!(path = %path.display(), "using config file");
            let file = Config::builder().add_source(File::from(path)).build()?;
            for (key, value) in file.collect()? {
                match canonical_key(&key) {
                    Some(canonical) => builder = builder.set_default(canonical, value)?,
                    None => tracing::warn!(%key, "ignoring unknown config key"),
                }
            }
        }

        let raw: RawSettings = builder
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .set_override_option("server_url", overrides.server_url.clone())?
            .set_override_option("bot_id", overrides.bot_id.clone())?
            .set_override_option("bot_token", overrides.bot_token.clone())?
            .set_override_option("log_channel", overrides.log_channel.clone())?
            .set_override_option("team", overrides.team.clone())?
            .set_override_option("prefix", overrides.prefix.clone())?
            .build()?
            .try_deserialize()?;

        let settings = Self::from_raw(raw)?;
        tracing::debug!(settings = ?settings.redacted(), "loaded settings");
        Ok(settings)
    }

    fn from_raw(raw: RawSettings) -> Result<Self, ConfigError> {
        let server_url = required("server_url", raw.server_url)?;
        let websocket_url = stream_url::websocket_url_for(&server_url)?;

        Ok(Self {
            team: required("team", raw.team)?,
            log_channel: required("log_channel", raw.log_channel)?,
            bot_token: required("bot_token", raw.bot_token)?,
            bot_id: required("bot_id", raw.bot_id)?,
            prefix: raw.prefix.filter(|p| !p.is_empty()).unwrap_or_else(|| DEFAULT_PREFIX.into()),
            server_url,
            websocket_url,
        })
    }

    pub fn redacted(&self) -> Redacted<'_> {
        Redacted(self)
    }
}

/// `serverUrl`, `ServerUrl` and `server_url` all name `server_url`.
fn canonical_key(key: &str) -> Option<&'static str> {
    let folded: String = key.chars().filter(|c| *c != '_').flat_map(char::to_lowercase).collect();
    KEYS.into_iter().find(|k| k.replace('_', "") == folded)
}

fn required(key: &'static str, value: Option<String>) -> Result<String, ConfigError> {
    value.filter(|v| !v.trim().is_empty()).ok_or(ConfigError::Missing(key))
}
