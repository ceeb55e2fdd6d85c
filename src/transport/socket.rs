//! Persistent push connection over WebSocket.
//!
//! Each text (or binary) message carries a slice of the same
//! `event:`/`data:` line stream the HTTP transport delivers; message
//! boundaries need not align with frame boundaries, so messages are
//! forwarded as raw chunks into the shared frame decoder.

use std::io;

use bytes::Bytes;
use futures_util::{future, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::info;
use url::Url;

use crate::config::ClientConfig;
use crate::transport::{ByteStream, Connector, TransportFuture};
use crate::{AppError, Result};

/// WebSocket [`Connector`] for `{socket_url}/sessions/{id}/events`.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    socket_url: Url,
    api_key: Option<String>,
}

impl WebSocketConnector {
    /// Build a connector from configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `socket_url` is not configured or invalid.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let raw = config
            .socket_url
            .as_deref()
            .ok_or_else(|| AppError::Config("socket_url is not configured".into()))?;
        let socket_url = Url::parse(raw)
            .map_err(|err| AppError::Config(format!("socket_url invalid: {err}")))?;

        Ok(Self {
            socket_url,
            api_key: config.api_key.clone(),
        })
    }

    /// Events endpoint for `session_id`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the socket URL cannot carry a path.
    pub fn events_url(&self, session_id: &str) -> Result<Url> {
        let mut url = self.socket_url.clone();
        url.path_segments_mut()
            .map_err(|()| AppError::Config("socket_url cannot be a base".into()))?
            .pop_if_empty()
            .extend(["sessions", session_id, "events"]);
        Ok(url)
    }
}

impl Connector for WebSocketConnector {
    fn connect<'a>(&'a self, session_id: &'a str) -> TransportFuture<'a, ByteStream> {
        Box::pin(async move {
            let url = self.events_url(session_id)?;
            let mut request = url
                .as_str()
                .into_client_request()
                .map_err(|err| AppError::Config(format!("invalid socket request: {err}")))?;

            if let Some(key) = &self.api_key {
                let value = HeaderValue::from_str(&format!("Bearer {key}"))
                    .map_err(|err| AppError::Config(format!("invalid api key header: {err}")))?;
                request.headers_mut().insert(AUTHORIZATION, value);
            }

            let (ws, response) = connect_async(request).await.map_err(connect_error)?;
            info!(session_id, status = %response.status(), "push socket connected");

            let stream = ws
                .take_while(|message| future::ready(!matches!(message, Ok(Message::Close(_)))))
                .filter_map(|message| {
                    future::ready(match message {
                        Ok(Message::Text(text)) => Some(Ok(Bytes::copy_from_slice(text.as_bytes()))),
                        Ok(Message::Binary(data)) => Some(Ok(data)),
                        Ok(_) => None,
                        Err(err) => Some(Err(io::Error::other(err))),
                    })
                });

            Ok(Box::pin(stream) as ByteStream)
        })
    }
}

/// A rejected handshake is a protocol error; anything else may be retried.
fn connect_error(err: WsError) -> AppError {
    match err {
        WsError::Http(response) => {
            let status = response.status();
            let detail = response
                .body()
                .as_deref()
                .map(|body| String::from_utf8_lossy(body).into_owned())
                .filter(|body| !body.trim().is_empty())
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("handshake rejected")
                        .to_owned()
                });
            AppError::Protocol {
                status: status.as_u16(),
                detail,
            }
        }
        other => AppError::Transport(format!("socket connect failed: {other}")),
    }
}
