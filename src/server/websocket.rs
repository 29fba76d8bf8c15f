use crate::agent::AssistantAgent;
use crate::models::websocket::{ClientMessage, ServerMessage};
use crate::widget::ChatWidget;

use std::collections::HashMap;
use std::error::Error;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;

use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};

use lazy_static::lazy_static;
use governor::{RateLimiter, Quota, state::{InMemoryState, NotKeyed}, clock::DefaultClock};

use hmac::{Hmac, Mac};
use sha2::Sha256;
use chrono::Utc;
use hex;
use url::form_urlencoded;

use futures::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const MAX_MESSAGE_SIZE: usize = 1 * 1024 * 1024;
const HANDSHAKE_WINDOW_SECS: i64 = 300;

lazy_static! {
    static ref CONNECTION_LIMITER: RateLimiter<NotKeyed, InMemoryState, DefaultClock> =
        RateLimiter::direct(Quota::per_second(NonZeroU32::new(10).unwrap()));
}

pub async fn start_ws_server(
    addr: &str,
    agent: Arc<AssistantAgent>,
    api_key: Option<String>,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    info!("WS server listening on: {}", addr);

    loop {
        let (stream, peer) = listener.accept().await?;

        if CONNECTION_LIMITER.check().is_err() {
            warn!("Global connection rate limit exceeded for {}. Dropping connection.", peer);
            continue;
        }

        info!("Incoming connection from: {}", peer);
        let agent_clone = Arc::clone(&agent);
        let required_api_key = api_key.clone();

        tokio::spawn(async move {
            if let Err(e) = process_connection(peer, stream, agent_clone, required_api_key).await {
                error!("Failed to process connection for {}: {}", peer, e);
            }
        });
    }
}

/// Validates the `ts`/`sig` handshake query parameters: a unix timestamp
/// inside the replay window and an HMAC-SHA256 of it under the shared
/// secret, hex-encoded.
fn verify_signed_handshake(secret: &str, query: &str, now: i64) -> Result<(), &'static str> {
    let params: HashMap<String, String> =
        form_urlencoded::parse(query.as_bytes()).into_owned().collect();

    let ts = params.get("ts")
        .or_else(|| params.get("X-Api-Ts"))
        .map(|s| s.as_str());
    let sig = params.get("sig")
        .or_else(|| params.get("X-Api-Sign"))
        .map(|s| s.as_str());

    let (Some(ts), Some(sig)) = (ts, sig) else {
        return Err("missing ts/sig");
    };

    let ts_i: i64 = ts.parse().unwrap_or(0);
    if (now - ts_i).abs() > HANDSHAKE_WINDOW_SECS {
        return Err("timestamp out of range");
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| "bad secret")?;
    mac.update(ts.as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());

    if expected == sig {
        Ok(())
    } else {
        Err("bad signature")
    }
}

async fn process_connection<S>(
    peer: SocketAddr,
    stream: S,
    agent: Arc<AssistantAgent>,
    required_api_key: Option<String>,
) -> Result<(), Box<dyn Error + Send + Sync>>
    where S: AsyncRead + AsyncWrite + Unpin + Send + 'static
{
    let auth_callback = |req: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let secret = match &required_api_key {
            Some(k) if !k.is_empty() => k,
            _ => return Ok(response),
        };

        let qs = req.uri().query().unwrap_or("");
        match verify_signed_handshake(secret, qs, Utc::now().timestamp()) {
            Ok(()) => Ok(response),
            Err(reason) => {
                warn!("Rejected handshake from {}: {}", peer, reason);
                let res = Response::builder()
                    .status(401)
                    .body(Some(reason.into()))
                    .unwrap();
                Err(ErrorResponse::from(res))
            }
        }
    };

    match accept_hdr_async(stream, auth_callback).await {
        Ok(ws) => {
            handle_connection(peer, ws, agent).await;
            Ok(())
        }
        Err(e) => {
            error!("Handshake failed for {}: {}", peer, e);
            Err(Box::new(e) as _)
        }
    }
}

pub async fn handle_connection<S>(
    peer: SocketAddr,
    websocket: WebSocketStream<S>,
    agent: Arc<AssistantAgent>,
)
    where S: AsyncRead + AsyncWrite + Unpin
{
    info!("New WebSocket connection: {}", peer);

    let (mut tx, mut rx) = websocket.split();
    let session_id = Uuid::new_v4().to_string();
    info!("Assigned session ID {} to {}", session_id, peer);

    // One widget per connection. The conversation lives and dies with the
    // socket; close/open from the client only toggles visibility.
    let mut widget = ChatWidget::new();

    while let Some(msg) = rx.next().await {
        match msg {
            Ok(message) => {
                if message.len() > MAX_MESSAGE_SIZE {
                    warn!(
                        "Message from {} exceeds size limit ({} > {})",
                        peer,
                        message.len(),
                        MAX_MESSAGE_SIZE
                    );
                    let error_msg = ServerMessage::Error {
                        message: "Message too large".to_string(),
                    };
                    let _ = send_json(&mut tx, &error_msg).await;
                    break;
                }

                match message {
                    Message::Text(text) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(ClientMessage::Open) => {
                                widget.open();
                                let snapshot = ServerMessage::History {
                                    turns: widget.conversation().turns().to_vec(),
                                };
                                if let Err(e) = send_json(&mut tx, &snapshot).await {
                                    error!("Error sending history to {}: {}", peer, e);
                                    break;
                                }
                            }
                            Ok(ClientMessage::Close) => {
                                widget.close();
                            }
                            Ok(ClientMessage::Chat { content }) => {
                                // Empty input and submits while closed or
                                // awaiting are dropped without a reply frame.
                                let Some(message) = widget.begin_submit(&content) else {
                                    debug!(
                                        "Dropped submit from {} (state {:?})",
                                        peer,
                                        widget.state()
                                    );
                                    continue;
                                };

                                if let Err(e) = send_json(&mut tx, &ServerMessage::Processing).await {
                                    error!("Error sending typing status to {}: {}", peer, e);
                                    break;
                                }

                                let history = widget.prior_turns();
                                let reply = agent.reply(&history, &message).await;
                                widget.finish_submit(reply.clone());

                                let response = ServerMessage::Response {
                                    content: reply,
                                    timestamp: Utc::now().timestamp(),
                                };
                                if let Err(e) = send_json(&mut tx, &response).await {
                                    error!("Error sending response to {}: {}", peer, e);
                                    break;
                                }
                            }
                            Err(e) => {
                                error!("Failed to parse message from {}: {}", peer, e);
                                let error_msg = ServerMessage::Error {
                                    message: format!("Failed to parse message: {}", e),
                                };
                                if send_json(&mut tx, &error_msg).await.is_err() {
                                    error!("Error sending parse error to {}", peer);
                                    break;
                                }
                            }
                        }
                    }
                    Message::Close(_) => {
                        info!("Received close frame from {}", peer);
                        break;
                    }
                    Message::Ping(ping_data) => {
                        if tx.send(Message::Pong(ping_data)).await.is_err() {
                            error!("Failed to send pong to {}", peer);
                            break;
                        }
                    }
                    Message::Pong(_) => {/* Usually ignore pongs */}
                    Message::Binary(_) => {
                        warn!("Ignoring binary message from {}", peer);
                    }
                    Message::Frame(_) => {/* Usually ignore raw frames */}
                }
            }
            Err(e) => {
                match e {
                    | tokio_tungstenite::tungstenite::Error::ConnectionClosed
                    | tokio_tungstenite::tungstenite::Error::Protocol(_)
                    | tokio_tungstenite::tungstenite::Error::Utf8 => {
                        info!("WebSocket connection closed or protocol error for {}: {}", peer, e);
                    }
                    tokio_tungstenite::tungstenite::Error::Io(ref io_err) if
                        io_err.kind() == std::io::ErrorKind::ConnectionReset
                    => {
                        info!("WebSocket connection reset by peer {}", peer);
                    }
                    _ => {
                        error!("Error receiving message from {}: {}", peer, e);
                    }
                }
                break;
            }
        }
    }
    info!("WebSocket connection closed for {} (Session ID: {})", peer, session_id);
}

async fn send_json<S>(tx: &mut S, message: &ServerMessage) -> Result<(), Box<dyn Error + Send + Sync>>
where
    S: SinkExt<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    let json = serde_json::to_string(message).unwrap();
    tx.send(Message::Text(json))
        .await
        .map_err(|e| format!("failed to send frame: {}", e).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, ts: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(ts.to_string().as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn valid_signature_inside_window_passes() {
        let now = 1_700_000_000;
        let query = format!("ts={}&sig={}", now, sign("secret", now));
        assert!(verify_signed_handshake("secret", &query, now).is_ok());
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let now = 1_700_000_000;
        let old = now - HANDSHAKE_WINDOW_SECS - 1;
        let query = format!("ts={}&sig={}", old, sign("secret", old));
        assert_eq!(
            verify_signed_handshake("secret", &query, now),
            Err("timestamp out of range")
        );
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let now = 1_700_000_000;
        let query = format!("ts={}&sig={}", now, sign("other", now));
        assert_eq!(
            verify_signed_handshake("secret", &query, now),
            Err("bad signature")
        );
    }

    #[test]
    fn missing_parameters_are_rejected() {
        assert_eq!(
            verify_signed_handshake("secret", "", 1_700_000_000),
            Err("missing ts/sig")
        );
        assert_eq!(
            verify_signed_handshake("secret", "ts=123", 1_700_000_000),
            Err("missing ts/sig")
        );
    }
}
