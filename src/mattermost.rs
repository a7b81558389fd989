//! Mattermost REST v4 (types + HTTP)

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt::Display;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub display_name: String,
}

/// Only public channels are ever created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChannelType {
    #[serde(rename = "O")]
    Open,
}

impl Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChannelType::Open => "open",
        };

        write!(f, "{}", s)
    }
}

#[derive(Debug, Serialize)]
pub struct NewChannel<'a> {
    pub team_id: &'a str,
    pub name: &'a str,
    pub display_name: &'a str,
    pub purpose: &'a str,
    #[serde(rename = "type")]
    pub channel_type: ChannelType,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Post {
    pub id: String,
    pub channel_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub root_id: String,
    #[serde(default)]
    pub message: String,
}

impl Post {
    /// Id to reply under: the thread root if this post is itself a reply.
    pub fn thread_root(&self) -> &str {
        if self.root_id.is_empty() {
            &self.id
        } else {
            &self.root_id
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NewPost<'a> {
    pub channel_id: &'a str,
    pub message: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    pub root_id: &'a str,
}

#[derive(Debug, Serialize)]
struct TeamSearch<'a> {
    term: &'a str,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Mattermost error {status} from {url}: {body}")]
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },
}

impl ApiError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Transport { .. } => None,
        }
    }
}

/// Anything that can put a message into a channel.
#[async_trait]
pub trait PostSink: Send + Sync {
    async fn create_post(&self, post: &NewPost<'_>) -> Result<Post, ApiError>;
}

#[derive(Debug, Clone)]
pub struct MattermostClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl MattermostClient {
    pub fn new(http: reqwest::Client, server_url: &str, token: &str) -> Self {
        Self {
            http,
            base_url: server_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v4{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        url: String,
        req: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let resp = req
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .send()
            .await
            .map_err(|source| ApiError::Transport { url: url.clone(), source })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Status { url, status, body });
        }

        resp.json().await.map_err(|source| ApiError::Transport { url, source })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        let req = self.http.get(&url);
        self.send(url, req).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self.url(path);
        let req = self.http.post(&url).json(body);
        self.send(url, req).await
    }

    /// Cheap authenticated call used to verify the server answers.
    pub async fn check_connection(&self) -> Result<(), ApiError> {
        let _: serde_json::Value = self.get("/config/client?format=old").await?;
        Ok(())
    }

    pub async fn get_user(&self, user_id: &str) -> Result<User, ApiError> {
        self.get(&format!("/users/{}", user_id)).await
    }

    pub async fn search_teams(&self, term: &str) -> Result<Vec<Team>, ApiError> {
        self.post("/teams/search", &TeamSearch { term }).await
    }

    pub async fn get_channel_by_name(
        &self,
        team_id: &str,
        name: &str,
    ) -> Result<Channel, ApiError> {
        self.get(&format!("/teams/{}/channels/name/{}", team_id, name)).await
    }

    pub async fn create_channel(&self, channel: &NewChannel<'_>) -> Result<Channel, ApiError> {
        self.post("/channels", channel).await
    }
}

#[async_trait]
impl PostSink for MattermostClient {
    async fn create_post(&self, post: &NewPost<'_>) -> Result<Post, ApiError> {
        self.post("/posts", post).await
    }
}
