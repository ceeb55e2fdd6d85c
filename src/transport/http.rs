//! HTTP implementation of [`Transport`] over `reqwest`.
//!
//! The message call returns a chunked `text/event-stream` body that is
//! handed to the stream reader unparsed. Plain calls (HITL response,
//! session update, history) use the configured request timeout; the
//! message stream only uses the connect timeout.

use std::io;

use futures_util::StreamExt;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

use crate::config::ClientConfig;
use crate::models::hitl::HitlResponse;
use crate::models::session::{Session, SessionUpdate};
use crate::models::turn::HistoryMessage;
use crate::transport::{ByteStream, Transport, TransportFuture};
use crate::{AppError, Result};

/// `reqwest`-backed transport for the agent service REST API.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
    base_url: Url,
    api_key: Option<String>,
    request_timeout: std::time::Duration,
}

impl HttpTransport {
    /// Build a transport from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the base URL cannot be parsed or the
    /// HTTP client cannot be constructed.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|err| AppError::Config(format!("base_url invalid: {err}")))?;
        let http = Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|err| AppError::Config(format!("failed to build http client: {err}")))?;

        Ok(Self {
            http,
            base_url,
            api_key: config.api_key.clone(),
            request_timeout: config.request_timeout(),
        })
    }

    /// Resolve `segments` below the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| AppError::Config("base_url cannot be a base".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header(AUTHORIZATION, format!("Bearer {key}")),
            None => request,
        }
    }

    async fn send_plain(&self, request: RequestBuilder) -> Result<Response> {
        let response = self
            .authorize(request)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(transport_error)?;
        check_status(response).await
    }
}

impl Transport for HttpTransport {
    fn open_stream<'a>(
        &'a self,
        session_id: &'a str,
        message: &'a str,
        cancel: CancellationToken,
    ) -> TransportFuture<'a, ByteStream> {
        Box::pin(async move {
            let url = self.endpoint(&["sessions", session_id, "messages"])?;
            let request = self
                .authorize(self.http.post(url))
                .header(ACCEPT, "text/event-stream")
                .json(&json!({ "message": message }));

            let response = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(AppError::Cancelled),
                result = request.send() => result.map_err(transport_error)?,
            };

            let response = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(AppError::Cancelled),
                checked = check_status(response) => checked?,
            };

            info!(session_id, status = %response.status(), "message stream opened");
            let stream = response
                .bytes_stream()
                .map(|chunk| chunk.map_err(io::Error::other));
            Ok(Box::pin(stream) as ByteStream)
        })
    }

    fn send_hitl_response<'a>(
        &'a self,
        session_id: &'a str,
        response: &'a HitlResponse,
    ) -> TransportFuture<'a, ()> {
        Box::pin(async move {
            let url = self.endpoint(&["sessions", session_id, "hitl", "respond"])?;
            self.send_plain(self.http.post(url).json(response)).await?;
            debug!(session_id, action = ?response.action, "hitl response delivered");
            Ok(())
        })
    }

    fn update_session<'a>(
        &'a self,
        session_id: &'a str,
        update: &'a SessionUpdate,
    ) -> TransportFuture<'a, Option<Session>> {
        Box::pin(async move {
            let url = self.endpoint(&["sessions", session_id])?;
            let response = self.send_plain(self.http.patch(url).json(update)).await?;
            let body = response.bytes().await.map_err(transport_error)?;
            if body.iter().all(u8::is_ascii_whitespace) {
                debug!(session_id, "session update acknowledged without a body");
                return Ok(None);
            }
            serde_json::from_slice::<Session>(&body)
                .map(Some)
                .map_err(|err| AppError::Decode(format!("unexpected response body: {err}")))
        })
    }

    fn fetch_history<'a>(&'a self, session_id: &'a str) -> TransportFuture<'a, Vec<HistoryMessage>> {
        Box::pin(async move {
            let url = self.endpoint(&["sessions", session_id, "messages"])?;
            let response = self.send_plain(self.http.get(url)).await?;
            response
                .json::<Vec<HistoryMessage>>()
                .await
                .map_err(decode_error)
        })
    }
}

// ── Private helpers ───────────────────────────────────────────────────────────

/// Turn a status of 400 or above into [`AppError::Protocol`] with the body as detail.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.as_u16() < 400 {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_owned()
    } else {
        body
    };

    Err(AppError::Protocol {
        status: status.as_u16(),
        detail,
    })
}

fn transport_error(err: reqwest::Error) -> AppError {
    AppError::Transport(err.to_string())
}

fn decode_error(err: reqwest::Error) -> AppError {
    AppError::Decode(format!("unexpected response body: {err}"))
}
