//! CLI parser. Flags override environment and config file values.

use crate::config::Overrides;
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "mattermost-xkcd-bot")]
#[command(about = "Mattermost bot that replies to !xkcd commands with comics", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file (TOML, YAML or JSON, picked by extension)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Mattermost server URL, e.g. https://chat.example.com
    #[arg(short = 'u', long = "serverUrl")]
    pub server_url: Option<String>,

    /// Bot user id
    #[arg(short = 'i', long = "botId")]
    pub bot_id: Option<String>,

    /// Bot access token
    #[arg(short = 't', long = "botToken")]
    pub bot_token: Option<String>,

    /// Log channel name (created if missing)
    #[arg(short = 'l', long = "logChannel")]
    pub log_channel: Option<String>,

    /// Team name
    #[arg(short = 'T', long = "team")]
    pub team: Option<String>,

    /// Command prefix [default: !xkcd]
    #[arg(short = 'p', long = "prefix")]
    pub prefix: Option<String>,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            server_url: self.server_url.clone(),
            bot_id: self.bot_id.clone(),
            bot_token: self.bot_token.clone(),
            log_channel: self.log_channel.clone(),
            team: self.team.clone(),
            prefix: self.prefix.clone(),
        }
    }
}
