//! Agent backend gateway over JSON-RPC.

use super::channel::{ChannelState, ReconnectPolicy, TransportChannel};
use super::connector::Connector;
use super::error::TransportError;
use super::framing::FrameFormat;
use super::protocol::{
    ApprovalResponseParams, CancelParams, CreateSessionParams, CreateSessionResult,
    LoadSessionParams, METHOD_APPROVAL_RESPONSE, METHOD_SESSION_CANCEL, METHOD_SESSION_CREATE,
    METHOD_SESSION_LOAD, METHOD_SESSION_PROMPT, PromptParams, WireToolDefinition,
};
use super::router::MessageRouter;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tether_application::{AgentBackend, BackendError, ConnectionState, EventStream};
use tether_domain::{ApprovalResponse, SessionId, ToolDefinition};
use tracing::{debug, info};

/// Buffered events per turn before the router waits on the consumer.
const TURN_BUFFER: usize = 256;

/// [`AgentBackend`] implementation talking to a remote agent.
pub struct RemoteAgentBackend {
    router: Arc<MessageRouter>,
}

impl RemoteAgentBackend {
    /// Connect through `connector` and start routing.
    pub async fn connect(
        connector: Arc<dyn Connector>,
        format: FrameFormat,
        policy: ReconnectPolicy,
    ) -> Result<Self, TransportError> {
        let (channel, events) = TransportChannel::connect(connector, format, policy).await?;
        info!("RemoteAgentBackend initialized");
        Ok(Self::with_router(MessageRouter::spawn(channel, events)))
    }

    /// Create a backend with an existing router
    pub fn with_router(router: Arc<MessageRouter>) -> Self {
        Self { router }
    }

    pub fn router(&self) -> &Arc<MessageRouter> {
        &self.router
    }

    fn map_error(&self, err: TransportError) -> BackendError {
        if self.router.channel_state() == ChannelState::Disconnected {
            BackendError::Disconnected
        } else {
            err.into()
        }
    }
}

#[async_trait]
impl AgentBackend for RemoteAgentBackend {
    async fn create_session(
        &self,
        cwd: &Path,
        tools: &[ToolDefinition],
    ) -> Result<SessionId, BackendError> {
        let params = CreateSessionParams {
            cwd: cwd.display().to_string(),
            tools: tools.iter().map(WireToolDefinition::from).collect(),
        };
        let result = self
            .router
            .request(METHOD_SESSION_CREATE, &params)
            .await
            .map_err(|e| self.map_error(e))?;
        let result: CreateSessionResult = serde_json::from_value(result)
            .map_err(|e| BackendError::Protocol(format!("session.create result: {}", e)))?;
        let session = SessionId::parse(&result.session_id)
            .map_err(|e| BackendError::Protocol(e.to_string()))?;

        self.router
            .register_session(session.as_str(), cwd.to_path_buf());
        info!(session = %session, "Session created");
        Ok(session)
    }

    async fn resume_session(&self, session: &SessionId, cwd: &Path) -> Result<(), BackendError> {
        let params = LoadSessionParams {
            session_id: session.to_string(),
            cwd: cwd.display().to_string(),
        };
        self.router
            .request(METHOD_SESSION_LOAD, &params)
            .await
            .map_err(|e| self.map_error(e))?;
        self.router
            .register_session(session.as_str(), cwd.to_path_buf());
        info!(session = %session, "Session resumed");
        Ok(())
    }

    async fn submit_prompt(
        &self,
        session: &SessionId,
        content: &str,
    ) -> Result<EventStream, BackendError> {
        // Route first so events racing the acknowledgement are not lost.
        let (tx, stream) = EventStream::channel(TURN_BUFFER);
        self.router.open_turn(session.as_str(), tx);

        let params = PromptParams {
            session_id: session.to_string(),
            content: content.to_string(),
        };
        if let Err(e) = self.router.request(METHOD_SESSION_PROMPT, &params).await {
            self.router.close_turn(session.as_str());
            return Err(self.map_error(e));
        }
        debug!(session = %session, "Prompt acknowledged");
        Ok(stream)
    }

    async fn cancel_turn(&self, session: &SessionId) -> Result<(), BackendError> {
        let params = CancelParams {
            session_id: session.to_string(),
        };
        self.router
            .notify(METHOD_SESSION_CANCEL, &params)
            .await
            .map_err(|e| self.map_error(e))
    }

    async fn send_approval_response(
        &self,
        session: &SessionId,
        response: &ApprovalResponse,
    ) -> Result<(), BackendError> {
        let params = ApprovalResponseParams {
            session_id: session.as_str(),
            response,
        };
        self.router
            .notify(METHOD_APPROVAL_RESPONSE, &params)
            .await
            .map_err(|e| self.map_error(e))
    }

    fn connection_state(&self) -> ConnectionState {
        match self.router.channel_state() {
            ChannelState::Connected => ConnectionState::Connected,
            ChannelState::Reconnecting { attempt } => ConnectionState::Reconnecting { attempt },
            ChannelState::Disconnected => ConnectionState::Disconnected,
        }
    }
}
