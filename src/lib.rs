pub mod cli;
pub mod config;
pub mod event_stream;
pub mod mattermost;
pub mod session;
pub mod xkcd;

pub use crate::config::{ConfigError, Settings};
pub use session::{BotSession, SessionError, SessionState};
pub use xkcd::{ComicError, ComicPost, ComicSource, XkcdClient};
