use crate::error::EventError;
use crate::models::{
    ACTION_AUTHENTICATION_CHALLENGE, WebSocketEvent, WebSocketReply, WebSocketRequest,
};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

/// Live feed of server events for the logged-in bot.
pub struct EventStream {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    seq: i64,
}

impl EventStream {
    /// Opens `{ws_url}/api/v4/websocket` and authenticates with the session token.
    pub async fn connect(ws_url: &str, token: &str) -> Result<Self, EventError> {
        if !(ws_url.starts_with("ws://") || ws_url.starts_with("wss://")) {
            return Err(EventError::InvalidUrl(ws_url.to_string()));
        }
        let url = format!("{}/api/v4/websocket", ws_url.trim_end_matches('/'));
        let (socket, _response) = tokio_tungstenite::connect_async(url.as_str()).await?;
        tracing::info!("Connected to event feed at {url}");

        let mut stream = Self { socket, seq: 0 };
        stream
            .send_action(
                ACTION_AUTHENTICATION_CHALLENGE,
                serde_json::json!({ "token": token }),
            )
            .await?;
        Ok(stream)
    }

    async fn send_action(
        &mut self,
        action: &str,
        data: serde_json::Value,
    ) -> Result<(), EventError> {
        self.seq += 1;
        let request = WebSocketRequest {
            seq: self.seq,
            action,
            data,
        };
        let json = serde_json::to_string(&request)?;
        self.socket.send(Message::Text(json)).await?;
        Ok(())
    }

    /// Next server event, or `None` once the server has closed the feed.
    ///
    /// Cancel-safe: no frame is lost if the returned future is dropped.
    pub async fn next_event(&mut self) -> Option<Result<WebSocketEvent, EventError>> {
        loop {
            let message = match self.socket.next().await? {
                Ok(message) => message,
                Err(e) => return Some(Err(e.into())),
            };

            let text = match message {
                Message::Text(text) => text,
                Message::Close(frame) => {
                    tracing::info!(?frame, "Event feed closed by server");
                    return None;
                }
                _ => continue,
            };

            let value: serde_json::Value = match serde_json::from_str(&text) {
                Ok(v) => v,
                Err(e) => return Some(Err(e.into())),
            };

            if value.get("event").is_some() {
                return Some(serde_json::from_value(value).map_err(EventError::from));
            }

            if value.get("seq_reply").is_some() {
                match serde_json::from_value::<WebSocketReply>(value) {
                    Ok(reply) if reply.status != "OK" => {
                        tracing::warn!(
                            seq_reply = reply.seq_reply,
                            status = %reply.status,
                            error = ?reply.error,
                            "Websocket action was not accepted"
                        );
                    }
                    Ok(reply) => {
                        tracing::debug!(seq_reply = reply.seq_reply, "Websocket action acknowledged");
                    }
                    Err(e) => return Some(Err(e.into())),
                }
            }
        }
    }

    pub async fn close(&mut self) -> Result<(), EventError> {
        self.socket.close(None).await?;
        Ok(())
    }
}
