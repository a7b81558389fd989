use crate::mattermost::{NewPost, Post, PostSink};
use crate::xkcd::ComicSource;
use anyhow::{Context as AnyhowContext, Result};
use serde::Deserialize;
use serde_json::{Map, Value};

use super::command::{parse_command, Command};
use super::reply;

pub const POSTED: &str = "posted";

/// One frame from the Mattermost event stream. Replies to our own actions
/// (`{"status":"OK","seq_reply":1}`) carry no `event`.
#[derive(Debug, Deserialize)]
pub struct StreamEvent {
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub seq: i64,
}

/// Turns posted messages into comic replies.
pub struct PostHandler<'a, C, S> {
    pub prefix: &'a str,
    pub bot_id: &'a str,
    pub comics: &'a C,
    pub chat: &'a S,
}

impl<C: ComicSource, S: PostSink> PostHandler<'_, C, S> {
    pub async fn handle_ws_text(&self, text: &str) -> Result<()> {
        let ev: StreamEvent =
            serde_json::from_str(text).context("Failed to parse stream event JSON")?;

        if ev.event.as_deref() != Some(POSTED) {
            return Ok(());
        }

        // data.post is the Post JSON encoded as a string
        let payload = match ev.data.get("post").and_then(Value::as_str) {
            Some(p) => p,
            None => return Ok(()),
        };

        let post: Post = serde_json::from_str(payload).context("Failed to parse post payload")?;
        tracing::debug!(
            seq = ev.seq,
            post_id = %post.id,
            channel_id = %post.channel_id,
            "posted event"
        );

        self.handle_post(&post).await
    }

    pub async fn handle_post(&self, post: &Post) -> Result<()> {
        let reply_text = match self.reply_for(post).await {
            Some(text) => text,
            None => return Ok(()),
        };

        self.chat
            .create_post(&NewPost {
                channel_id: &post.channel_id,
                message: &reply_text,
                root_id: post.thread_root(),
            })
            .await
            .with_context(|| format!("Failed to reply to post {}", post.id))?;

        Ok(())
    }

    /// The reply this post deserves, or `None` if it should be left alone.
    pub async fn reply_for(&self, post: &Post) -> Option<String> {
        if !post.message.starts_with(self.prefix) {
            return None;
        }

        // never answer ourselves
        if post.user_id == self.bot_id {
            return None;
        }

        tracing::info!(
            post_id = %post.id,
            user_id = %post.user_id,
            message = %post.message,
            "responding to command"
        );

        let result = match parse_command(&post.message)? {
            Command::Latest => self.comics.fetch_latest().await,
            Command::Issue(number) => self.comics.fetch_by_number(number).await,
            Command::InvalidNumber(token) => {
                tracing::info!(%token, "could not parse issue number");
                return Some(reply::parse_error(&token));
            }
        };

        Some(match result {
            Ok(comic) => {
                tracing::info!(num = comic.num, published = ?comic.published_on(), "found comic");
                reply::comic(&comic)
            }
            Err(e) => {
                tracing::warn!(error = %e, "comic lookup failed");
                reply::NOT_FOUND.to_string()
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mattermost::ApiError;
    use crate::xkcd::{ComicError, ComicPost};
    use async_trait::async_trait;
    use std::sync::Mutex;

    const BOT_ID: &str = "bot-user";

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Latest,
        Number(i64),
    }

    struct FakeComics {
        alt: &'static str,
        missing: bool,
        calls: Mutex<Vec<Call>>,
    }

    impl FakeComics {
        fn new(alt: &'static str) -> Self {
            Self { alt, missing: false, calls: Mutex::new(Vec::new()) }
        }

        fn missing() -> Self {
            Self { missing: true, ..Self::new("") }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn answer(&self, num: i64) -> Result<ComicPost, ComicError> {
            if self.missing {
                let url = format!("https://xkcd.com/{num}/info.0.json");
                return Err(ComicError::NotFound { url });
            }
            Ok(ComicPost {
                num,
                title: "Woodpecker".into(),
                safe_title: "Woodpecker".into(),
                img: "https://imgs.xkcd.com/comics/woodpecker.png".into(),
                alt: self.alt.into(),
                month: "9".into(),
                year: "2009".into(),
                day: "14".into(),
                transcript: String::new(),
                link: String::new(),
                news: String::new(),
            })
        }
    }

    #[async_trait]
    impl ComicSource for FakeComics {
        async fn fetch_latest(&self) -> Result<ComicPost, ComicError> {
            self.calls.lock().unwrap().push(Call::Latest);
            self.answer(3000)
        }

        async fn fetch_by_number(&self, number: i64) -> Result<ComicPost, ComicError> {
            self.calls.lock().unwrap().push(Call::Number(number));
            self.answer(number)
        }
    }

    #[derive(Default)]
    struct FakeChat {
        sent: Mutex<Vec<(String, String, String)>>,
    }

    #[async_trait]
    impl PostSink for FakeChat {
        async fn create_post(&self, post: &NewPost<'_>) -> Result<Post, ApiError> {
            self.sent.lock().unwrap().push((
                post.channel_id.to_string(),
                post.message.to_string(),
                post.root_id.to_string(),
            ));
            Ok(Post {
                id: "reply".into(),
                channel_id: post.channel_id.into(),
                user_id: BOT_ID.into(),
                root_id: post.root_id.into(),
                message: post.message.into(),
            })
        }
    }

    fn post_from(user_id: &str, message: &str) -> Post {
        Post {
            id: "post1".into(),
            channel_id: "town-square".into(),
            user_id: user_id.into(),
            root_id: String::new(),
            message: message.into(),
        }
    }

    fn posted_frame(user_id: &str, message: &str) -> String {
        let post = serde_json::json!({
            "id": "post1",
            "channel_id": "town-square",
            "user_id": user_id,
            "root_id": "",
            "message": message,
        });
        serde_json::json!({
            "event": "posted",
            "data": { "post": post.to_string(), "channel_type": "O" },
            "broadcast": { "channel_id": "town-square" },
            "seq": 4,
        })
        .to_string()
    }

    fn handler<'a>(
        comics: &'a FakeComics,
        chat: &'a FakeChat,
    ) -> PostHandler<'a, FakeComics, FakeChat> {
        PostHandler { prefix: "!xkcd", bot_id: BOT_ID, comics, chat }
    }

    #[tokio::test]
    async fn unprefixed_messages_are_ignored() {
        let (comics, chat) = (FakeComics::new("alt"), FakeChat::default());
        let h = handler(&comics, &chat);

        h.handle_post(&post_from("alice", "hello daily 614")).await.unwrap();
        h.handle_post(&post_from("alice", " !xkcd 614")).await.unwrap();

        assert!(comics.calls().is_empty());
        assert!(chat.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn own_messages_are_ignored() {
        let (comics, chat) = (FakeComics::new("alt"), FakeChat::default());
        let h = handler(&comics, &chat);

        h.handle_post(&post_from(BOT_ID, "!xkcd daily")).await.unwrap();
        h.handle_post(&post_from(BOT_ID, "!xkcd 614")).await.unwrap();

        assert!(comics.calls().is_empty());
        assert!(chat.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn daily_fetches_latest_and_replies_in_thread() {
        let (comics, chat) = (FakeComics::new(""), FakeChat::default());
        handler(&comics, &chat).handle_post(&post_from("alice", "!xkcd daily")).await.unwrap();

        assert_eq!(comics.calls(), vec![Call::Latest]);
        let sent = chat.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let (channel, message, root) = &sent[0];
        assert_eq!(channel, "town-square");
        assert_eq!(root, "post1");
        assert!(message.contains("Woodpecker"));
        assert!(message.contains("https://imgs.xkcd.com/comics/woodpecker.png"));
    }

    #[tokio::test]
    async fn alt_line_only_when_alt_text_present() {
        let with_alt = FakeComics::new("extension cord");
        let chat = FakeChat::default();
        let reply = handler(&with_alt, &chat).reply_for(&post_from("alice", "!xkcd 614")).await;
        assert_eq!(with_alt.calls(), vec![Call::Number(614)]);
        assert_eq!(
            reply.as_deref(),
            Some(concat!(
                "Title: Woodpecker\n",
                "Alt Text: extension cord\n",
                "Image: https://imgs.xkcd.com/comics/woodpecker.png"
            ))
        );

        let without_alt = FakeComics::new("");
        let reply = handler(&without_alt, &chat).reply_for(&post_from("alice", "!xkcd 614")).await;
        assert_eq!(
            reply.as_deref(),
            Some("Title: Woodpecker\nImage: https://imgs.xkcd.com/comics/woodpecker.png")
        );
    }

    #[tokio::test]
    async fn bad_number_replies_without_fetching() {
        let (comics, chat) = (FakeComics::new("alt"), FakeChat::default());
        let reply = handler(&comics, &chat).reply_for(&post_from("alice", "!xkcd abc")).await;

        assert!(comics.calls().is_empty());
        assert_eq!(reply.as_deref(), Some("Could not parse post number: abc"));
    }

    #[tokio::test]
    async fn three_tokens_get_no_reply() {
        let (comics, chat) = (FakeComics::new("alt"), FakeChat::default());
        handler(&comics, &chat).handle_post(&post_from("alice", "!xkcd 1 2")).await.unwrap();

        assert!(comics.calls().is_empty());
        assert!(chat.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_comic_replies_with_apology() {
        let (comics, chat) = (FakeComics::missing(), FakeChat::default());
        let h = handler(&comics, &chat);

        h.handle_post(&post_from("alice", "!xkcd 99999")).await.unwrap();
        h.handle_post(&post_from("alice", "!xkcd daily")).await.unwrap();

        assert_eq!(comics.calls(), vec![Call::Number(99999), Call::Latest]);
        let sent = chat.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|(_, message, _)| message == reply::NOT_FOUND));
    }

    #[tokio::test]
    async fn decodes_posted_frames() {
        let (comics, chat) = (FakeComics::new("alt"), FakeChat::default());
        let h = handler(&comics, &chat);

        h.handle_ws_text(&posted_frame("alice", "!xkcd 614")).await.unwrap();
        assert_eq!(comics.calls(), vec![Call::Number(614)]);
        assert_eq!(chat.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn other_frames_are_skipped() {
        let (comics, chat) = (FakeComics::new("alt"), FakeChat::default());
        let h = handler(&comics, &chat);

        h.handle_ws_text(r#"{"status":"OK","seq_reply":1}"#).await.unwrap();
        h.handle_ws_text(r#"{"event":"hello","data":{"server_version":"9.0"},"seq":0}"#)
            .await
            .unwrap();
        h.handle_ws_text(r#"{"event":"typing","data":{},"seq":2}"#).await.unwrap();

        assert!(comics.calls().is_empty());
        assert!(chat.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn garbage_frame_is_an_error() {
        let (comics, chat) = (FakeComics::new("alt"), FakeChat::default());
        assert!(handler(&comics, &chat).handle_ws_text("not json").await.is_err());
    }
}
