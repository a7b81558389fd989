//! Mattermost event stream: connection, frame decoding and command dispatch.

mod command;
mod connection;
mod handler;
pub mod reply;

pub use command::{parse_command, parse_issue_number, Command};
pub use connection::{connect_stream, EventStream, WEBSOCKET_PATH};
pub use handler::{PostHandler, StreamEvent, POSTED};
