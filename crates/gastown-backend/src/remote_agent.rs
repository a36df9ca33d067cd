//! A [`Backend`] that talks HTTP+WebSocket to a sidecar agent inside a
//! remote container (the wire protocol in the external interfaces: JSON
//! over `/api/v1/*`, a `/ws/state` event stream).

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use gastown_core::AgentState;
use serde::Deserialize;
use serde_json::json;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;

use crate::error::{BackendError, Result};
use crate::trait_def::{not_supported, Backend};
use crate::types::{EnvMap, ProcessStatus, StateEvent};

const RECONNECT_BACKOFF: Duration = Duration::from_secs(2);

/// A remote agent sidecar, reached over HTTP and WebSocket.
#[derive(Debug, Clone)]
pub struct RemoteAgent {
    base_url: String,
    bearer_token: Option<String>,
    client: reqwest::Client,
}

impl RemoteAgent {
    #[must_use]
    pub fn new(base_url: impl Into<String>, bearer_token: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            bearer_token,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.bearer_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        let resp = self
            .request(self.client.get(&url))
            .send()
            .await
            .map_err(|e| BackendError::Http { url: url.clone(), reason: e.to_string() })?;
        if !resp.status().is_success() {
            return Err(BackendError::Http { url, reason: resp.status().to_string() });
        }
        resp.json().await.map_err(|e| BackendError::Malformed(e.to_string()))
    }

    async fn send_json(&self, method: reqwest::Method, path: &str, body: serde_json::Value) -> Result<()> {
        let url = self.url(path);
        let resp = self
            .request(self.client.request(method, &url))
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::Http { url: url.clone(), reason: e.to_string() })?;
        if !resp.status().is_success() {
            return Err(BackendError::Http { url, reason: resp.status().to_string() });
        }
        Ok(())
    }

    /// Open the `/ws/state` stream once. Callers wanting the auto-reconnect
    /// behavior described in the wire protocol should loop through
    /// [`Self::watch_state`] instead.
    pub async fn state_stream(&self) -> Result<impl futures::Stream<Item = StateEvent>> {
        let ws_url = self
            .url("/ws/state")
            .replacen("http://", "ws://", 1)
            .replacen("https://", "wss://", 1);
        let mut request = ws_url
            .clone()
            .into_client_request()
            .map_err(|e| BackendError::WebSocket { url: ws_url.clone(), reason: e.to_string() })?;
        if let Some(token) = &self.bearer_token {
            let header = format!("Bearer {token}")
                .parse()
                .map_err(|_| BackendError::WebSocket { url: ws_url.clone(), reason: "invalid token".to_string() })?;
            request.headers_mut().insert("Authorization", header);
        }
        let (stream, _) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| BackendError::WebSocket { url: ws_url, reason: e.to_string() })?;
        let (_, read) = stream.split();
        Ok(read.filter_map(|msg| async move {
            let msg = msg.ok()?;
            let text = msg.to_text().ok()?;
            serde_json::from_str::<StateEvent>(text).ok()
        }))
    }

    /// Reconnects on stream end or error, applying a fixed backoff between
    /// attempts, invoking `on_event` for each parsed state event.
    pub async fn watch_state(&self, mut on_event: impl FnMut(StateEvent) + Send) -> ! {
        loop {
            match self.state_stream().await {
                Ok(stream) => {
                    futures::pin_mut!(stream);
                    while let Some(event) = stream.next().await {
                        on_event(event);
                    }
                }
                Err(err) => {
                    tracing::debug!(error = %err, "state stream connect failed, retrying");
                }
            }
            tokio::time::sleep(RECONNECT_BACKOFF).await;
        }
    }
}

#[derive(Debug, Deserialize)]
struct AgentStateResponse {
    state: AgentState,
}

#[derive(Debug, Deserialize)]
struct EnvResponse {
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CwdResponse {
    cwd: String,
}

#[async_trait]
impl Backend for RemoteAgent {
    fn kind_name(&self) -> &'static str {
        "RemoteAgent"
    }

    async fn has_session(&self, _session: &str) -> Result<bool> {
        Ok(self.get_json::<ProcessStatus>("/api/v1/status").await.is_ok())
    }

    async fn capture_pane(&self, _session: &str, _lines: usize) -> Result<String> {
        Err(not_supported(self.kind_name(), "capture_pane"))
    }

    async fn capture_pane_all(&self, _session: &str) -> Result<String> {
        Err(not_supported(self.kind_name(), "capture_pane_all"))
    }

    async fn send_input(&self, _session: &str, text: &str, press_enter: bool) -> Result<()> {
        self.send_json(reqwest::Method::POST, "/api/v1/input", json!({ "text": text, "enter": press_enter })).await
    }

    async fn send_keys(&self, _session: &str, _raw: &str) -> Result<()> {
        Err(not_supported(self.kind_name(), "send_keys"))
    }

    async fn nudge(&self, session: &str, text: &str) -> Result<()> {
        self.send_input(session, text, true).await
    }

    async fn is_pane_dead(&self, session: &str) -> Result<bool> {
        Ok(!self.is_agent_running(session).await?)
    }

    async fn kill_session(&self, _session: &str) -> Result<()> {
        self.send_json(reqwest::Method::POST, "/api/v1/signal", json!({ "signal": "SIGKILL" })).await
    }

    async fn is_agent_running(&self, _session: &str) -> Result<bool> {
        let status: ProcessStatus = self.get_json("/api/v1/status").await?;
        Ok(status.process_state == "running")
    }

    async fn get_agent_state(&self, _session: &str) -> Result<AgentState> {
        let resp: AgentStateResponse = self.get_json("/api/v1/agent/state").await?;
        Ok(resp.state)
    }

    async fn get_env(&self, _session: &str, key: &str) -> Result<Option<String>> {
        let resp: EnvResponse = self.get_json(&format!("/api/v1/env/{key}")).await?;
        Ok(resp.value)
    }

    async fn set_env(&self, _session: &str, key: &str, value: &str) -> Result<()> {
        self.send_json(reqwest::Method::PUT, &format!("/api/v1/env/{key}"), json!({ "value": value })).await
    }

    async fn get_cwd(&self, _session: &str) -> Result<String> {
        let resp: CwdResponse = self.get_json("/api/v1/session/cwd").await?;
        Ok(resp.cwd)
    }

    async fn respawn(&self, _session: &str) -> Result<()> {
        self.send_json(reqwest::Method::POST, "/api/v1/signal", json!({ "signal": "respawn" })).await
    }

    async fn switch_session(&self, _session: &str, extra_env: &EnvMap) -> Result<()> {
        self.send_json(reqwest::Method::PUT, "/api/v1/session/switch", json!({ "extra_env": extra_env })).await
    }

    async fn set_pane_died_hook(&self, _session: &str, _command: &str) -> Result<()> {
        Err(not_supported(self.kind_name(), "set_pane_died_hook"))
    }

    async fn status(&self, _session: &str) -> Result<ProcessStatus> {
        self.get_json("/api/v1/status").await
    }
}

