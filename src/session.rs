//! Bot session: startup handshake, the listen loop and graceful shutdown.

use crate::config::Settings;
use crate::event_stream::{connect_stream, reply, EventStream, PostHandler};
use crate::mattermost::{
    ApiError, Channel, ChannelType, MattermostClient, NewChannel, NewPost, PostSink, Team, User,
};
use crate::xkcd::XkcdClient;
use std::fmt::Display;
use thiserror::Error;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

pub const LOG_CHANNEL_DISPLAY_NAME: &str = "Debugging For Sample Bot";
pub const LOG_CHANNEL_PURPOSE: &str =
    "This is used as a test channel for logging bot debug messages";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Initializing,
    Connected,
    Listening,
    ShuttingDown,
}

impl Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionState::Initializing => "initializing",
            SessionState::Connected => "connected",
            SessionState::Listening => "listening",
            SessionState::ShuttingDown => "shutting down",
        };

        write!(f, "{}", s)
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("could not load bot user {bot_id}: {source}")]
    Auth {
        bot_id: String,
        #[source]
        source: ApiError,
    },

    #[error("team search for '{team}' failed: {source}")]
    TeamLookup {
        team: String,
        #[source]
        source: ApiError,
    },

    #[error("could not find team with name: {0}")]
    TeamNotFound(String),

    #[error("could not create log channel '{channel}': {source}")]
    Channel {
        channel: String,
        #[source]
        source: ApiError,
    },

    #[error("server could not be reached: {0}")]
    Unreachable(#[source] ApiError),

    #[error("could not post to log channel: {0}")]
    Announce(#[source] ApiError),

    #[error("event stream failed: {0:#}")]
    Stream(anyhow::Error),

    #[error("event stream closed by server")]
    StreamClosed,
}

/// Everything the bot resolved at startup. Lives for the whole process.
pub struct BotSession<'a> {
    settings: &'a Settings,
    client: MattermostClient,
    comics: XkcdClient,
    bot_user: User,
    team: Team,
    log_channel: Channel,
    state: SessionState,
    announced: bool,
}

impl<'a> BotSession<'a> {
    /// Resolves bot user, team and log channel (creating the channel if needed).
    pub async fn initialize(settings: &'a Settings) -> Result<Self, SessionError> {
        let http = reqwest::Client::new();
        let client = MattermostClient::new(http.clone(), &settings.server_url, &settings.bot_token);
        let comics = XkcdClient::new(http);
        Self::initialize_with(settings, client, comics).await
    }

    pub async fn initialize_with(
        settings: &'a Settings,
        client: MattermostClient,
        comics: XkcdClient,
    ) -> Result<Self, SessionError> {
        tracing::info!(
            state = %SessionState::Initializing,
            server_url = %settings.server_url,
            "starting session"
        );

        let bot_user = client.get_user(&settings.bot_id).await.map_err(|source| {
            tracing::error!(bot_id = %settings.bot_id, error = %source, "could not get bot user");
            SessionError::Auth { bot_id: settings.bot_id.clone(), source }
        })?;
        tracing::debug!(bot_user = %bot_user.username, "loaded bot user");

        let team = find_team(&client, &settings.team).await?;
        tracing::debug!(
            bot_team = %team.name,
            display_name = %team.display_name,
            "loaded bot team"
        );

        let log_channel = ensure_log_channel(&client, &team, &settings.log_channel).await?;
        tracing::debug!(
            log_channel = %log_channel.name,
            display_name = %log_channel.display_name,
            "loaded log channel"
        );

        Ok(Self {
            settings,
            client,
            comics,
            bot_user,
            team,
            log_channel,
            state: SessionState::Initializing,
            announced: false,
        })
    }

    pub fn bot_user(&self) -> &User {
        &self.bot_user
    }

    pub fn team(&self) -> &Team {
        &self.team
    }

    pub fn log_channel(&self) -> &Channel {
        &self.log_channel
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn enter(&mut self, state: SessionState) {
        tracing::info!(from = %self.state, to = %state, "session state");
        self.state = state;
    }

    /// Connects and serves events until `shutdown` is cancelled or the stream ends.
    ///
    /// Returns `Ok` only for a shutdown request. `shutdown` is watched in every
    /// phase, including while an event is being handled; whatever the phase,
    /// an open stream is closed and the farewell is posted once the bot has
    /// announced itself or a shutdown was requested.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<(), SessionError> {
        let mut stream = None;
        let outcome = self.serve(&mut stream, &shutdown).await;

        self.enter(SessionState::ShuttingDown);
        if let Some(stream) = stream.as_mut() {
            stream.close().await;
        }

        if self.announced || shutdown.is_cancelled() {
            let farewell = reply::stopped(&self.bot_user.username);
            if let Err(e) = self.post_to_log_channel(&farewell).await {
                tracing::warn!(error = %e, "could not announce shutdown");
            }
        }

        outcome
    }

    async fn serve(
        &mut self,
        stream: &mut Option<EventStream>,
        shutdown: &CancellationToken,
    ) -> Result<(), SessionError> {
        let checked = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Ok(()),
            checked = self.client.check_connection() => checked,
        };
        checked.map_err(|e| {
            tracing::error!(error = %e, "server could not be reached");
            SessionError::Unreachable(e)
        })?;
        self.enter(SessionState::Connected);

        let started = reply::started(&self.bot_user.username);
        let announced = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Ok(()),
            announced = self.post_to_log_channel(&started) => announced,
        };
        announced.map_err(SessionError::Announce)?;
        self.announced = true;

        let websocket_url = &self.settings.websocket_url;
        let connected = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Ok(()),
            connected = connect_stream(websocket_url, self.client.token()) => connected,
        };
        let connected = connected.map_err(|e| {
            tracing::error!(error = %e, %websocket_url, "failed to connect to web socket");
            SessionError::Stream(e)
        })?;
        tracing::info!(url = %connected.url(), "connected to event stream");

        let stream = stream.insert(connected);
        self.enter(SessionState::Listening);

        self.listen(stream, shutdown).await
    }

    async fn listen(
        &self,
        stream: &mut EventStream,
        shutdown: &CancellationToken,
    ) -> Result<(), SessionError> {
        let handler = PostHandler {
            prefix: &self.settings.prefix,
            bot_id: &self.settings.bot_id,
            comics: &self.comics,
            chat: &self.client,
        };

        loop {
            let frame = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    tracing::info!("shutdown requested");
                    return Ok(());
                }
                frame = stream.next_frame() => frame,
            };

            match frame {
                Some(Ok(Message::Text(text))) => {
                    let handled = tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => {
                            tracing::info!("shutdown requested while handling an event");
                            return Ok(());
                        }
                        handled = handler.handle_ws_text(text.as_str()) => handled,
                    };
                    if let Err(e) = handled {
                        tracing::error!(error = ?e, "error handling stream message");
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::warn!(?frame, "event stream closed");
                    return Err(SessionError::StreamClosed);
                }
                Some(Ok(_other)) => {
                    // ping/pong are answered by tungstenite; binary is not used
                }
                Some(Err(e)) => {
                    tracing::error!(error = %e, "event stream error");
                    return Err(SessionError::Stream(e.into()));
                }
                None => return Err(SessionError::StreamClosed),
            }
        }
    }

    async fn post_to_log_channel(&self, message: &str) -> Result<(), ApiError> {
        let post = NewPost { channel_id: &self.log_channel.id, message, root_id: "" };
        self.client.create_post(&post).await.map(|_| ()).map_err(|e| {
            tracing::error!(error = %e, %message, "failed to post message to log channel");
            e
        })
    }
}

/// First search hit wins.
async fn find_team(client: &MattermostClient, name: &str) -> Result<Team, SessionError> {
    tracing::debug!(bot_team = %name, "trying to load bot team");

    let teams = client.search_teams(name).await.map_err(|source| {
        tracing::error!(error = %source, "error trying to find bot team");
        SessionError::TeamLookup { team: name.to_string(), source }
    })?;

    teams.into_iter().next().ok_or_else(|| {
        tracing::error!(team = %name, "could not find team");
        SessionError::TeamNotFound(name.to_string())
    })
}

async fn ensure_log_channel(
    client: &MattermostClient,
    team: &Team,
    name: &str,
) -> Result<Channel, SessionError> {
    match client.get_channel_by_name(&team.id, name).await {
        Ok(channel) => return Ok(channel),
        Err(e) => {
            tracing::warn!(log_channel = %name, status = ?e.status(), "log channel does not exist");
        }
    }

    let new_channel = NewChannel {
        team_id: &team.id,
        name,
        display_name: LOG_CHANNEL_DISPLAY_NAME,
        purpose: LOG_CHANNEL_PURPOSE,
        channel_type: ChannelType::Open,
    };

    match client.create_channel(&new_channel).await {
        Ok(channel) => {
            tracing::info!(
                channel_name = %name,
                channel_type = %new_channel.channel_type,
                "created the log channel"
            );
            Ok(channel)
        }
        Err(source) => {
            tracing::error!(error = %source, "failed to create the log channel");
            Err(SessionError::Channel { channel: name.to_string(), source })
        }
    }
}
