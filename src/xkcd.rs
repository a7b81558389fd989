//! xkcd comic metadata API (types + HTTP)

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

pub const XKCD_BASE_URL: &str = "https://xkcd.com/";
const INFO_JSON: &str = "info.0.json";

#[derive(Debug, Clone, Deserialize)]
pub struct ComicPost {
    pub num: i64,
    #[serde(default)]
    pub title: String,
    pub safe_title: String,
    pub img: String,
    #[serde(default)]
    pub alt: String,
    #[serde(default)]
    pub month: String,
    #[serde(default)]
    pub year: String,
    #[serde(default)]
    pub day: String,
    #[serde(default)]
    pub transcript: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub news: String,
}

impl ComicPost {
    /// Publication date, if the year/month/day strings form a valid date.
    pub fn published_on(&self) -> Option<NaiveDate> {
        let year = self.year.trim().parse().ok()?;
        let month = self.month.trim().parse().ok()?;
        let day = self.day.trim().parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
    }
}

#[derive(Debug, Error)]
pub enum ComicError {
    #[error("comic not found at {url}")]
    NotFound { url: String },

    #[error("comic request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("comic request to {url} returned {status}")]
    UnexpectedStatus { url: String, status: StatusCode },
}

/// Where comics come from. The session only talks to this trait.
#[async_trait]
pub trait ComicSource: Send + Sync {
    async fn fetch_latest(&self) -> Result<ComicPost, ComicError>;
    async fn fetch_by_number(&self, number: i64) -> Result<ComicPost, ComicError>;
}

#[derive(Debug, Clone)]
pub struct XkcdClient {
    http: reqwest::Client,
    base_url: String,
}

impl XkcdClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self::with_base_url(http, XKCD_BASE_URL)
    }

    /// `base_url` is joined verbatim, so it should end with `/`.
    pub fn with_base_url(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self { http, base_url: base_url.into() }
    }

    pub fn latest_url(&self) -> String {
        format!("{}{}", self.base_url, INFO_JSON)
    }

    pub fn issue_url(&self, number: i64) -> String {
        format!("{}{}/{}", self.base_url, number, INFO_JSON)
    }

    async fn get_comic(&self, url: String) -> Result<ComicPost, ComicError> {
        let resp = match self.http.get(&url).send().await {
            Ok(resp) => resp,
            Err(source) => {
                tracing::error!(%url, error = %source, "could not send comic request");
                return Err(ComicError::Transport { url, source });
            }
        };

        let status = resp.status();
        tracing::debug!(%url, status_code = status.as_u16(), "comic response received");

        if status == StatusCode::NOT_FOUND {
            tracing::warn!(%url, "comic not found");
            return Err(ComicError::NotFound { url });
        }
        if !status.is_success() {
            tracing::error!(%url, %status, "unexpected comic response status");
            return Err(ComicError::UnexpectedStatus { url, status });
        }

        match resp.json::<ComicPost>().await {
            Ok(post) => Ok(post),
            Err(source) => {
                tracing::error!(%url, error = %source, "could not decode comic body");
                Err(ComicError::Transport { url, source })
            }
        }
    }
}

#[async_trait]
impl ComicSource for XkcdClient {
    async fn fetch_latest(&self) -> Result<ComicPost, ComicError> {
        self.get_comic(self.latest_url()).await
    }

    async fn fetch_by_number(&self, number: i64) -> Result<ComicPost, ComicError> {
        self.get_comic(self.issue_url(number)).await
    }
}
