use anyhow::{Context as AnyhowContext, Result};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

pub const WEBSOCKET_PATH: &str = "/api/v4/websocket";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// The open event stream. Reads happen in the session loop; the write half
/// is only used for the auth challenge and for closing.
pub struct EventStream {
    write: SplitSink<WsStream, Message>,
    read: SplitStream<WsStream>,
    url: String,
    seq: i64,
}

impl EventStream {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn next_frame(&mut self) -> Option<Result<Message, tungstenite::Error>> {
        self.read.next().await
    }

    /// Best-effort close; closing twice or after the server hung up is harmless.
    pub async fn close(&mut self) {
        if let Err(e) = self.write.send(Message::Close(None)).await {
            tracing::debug!(error = %e, "event stream close frame not sent");
        }
        let _ = self.write.close().await;
    }

    async fn send_action(&mut self, action: &str, data: serde_json::Value) -> Result<()> {
        self.seq += 1;
        let frame = serde_json::json!({ "seq": self.seq, "action": action, "data": data });
        self.write
            .send(Message::Text(frame.to_string().into()))
            .await
            .with_context(|| format!("Failed to send {action} action"))
    }
}

/// Opens `<websocket_base>/api/v4/websocket` and authenticates with the bot token.
pub async fn connect_stream(websocket_base: &str, token: &str) -> Result<EventStream> {
    let url = format!("{}{}", websocket_base.trim_end_matches('/'), WEBSOCKET_PATH);

    let mut request = url.as_str().into_client_request().context("Invalid websocket URL")?;
    request.headers_mut().insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", token)).context("Invalid bot token")?,
    );

    let (ws_stream, _resp) = connect_async(request).await.context("Failed to connect WebSocket")?;
    let (write, read) = ws_stream.split();

    let mut stream = EventStream { write, read, url, seq: 0 };
    stream
        .send_action("authentication_challenge", serde_json::json!({ "token": token }))
        .await?;

    Ok(stream)
}
