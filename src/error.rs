use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for the Claw runtime.
///
/// Each subsystem defines its own error variant. Library callers can match on
/// these to decide recovery strategy; port implementations continue to use
/// `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum RuntimeError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Proposal store ──────────────────────────────────────────────────
    #[error("proposal: {0}")]
    Proposal(#[from] ProposalError),

    // ── Agent loop ──────────────────────────────────────────────────────
    #[error("agent: {0}")]
    Agent(#[from] AgentError),

    // ── Control plane ───────────────────────────────────────────────────
    #[error("control plane: {0}")]
    ControlPlane(#[from] ControlPlaneError),

    // ── Runtime event transport ─────────────────────────────────────────
    #[error("transport: {0}")]
    Transport(#[from] TransportError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config from {path}: {message}")]
    Load { path: String, message: String },

    #[error("failed to parse config {path}: {message}")]
    Parse { path: String, message: String },

    #[error("validation failed: {0}")]
    Validation(String),
}

// ─── Proposal store errors ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProposalError {
    #[error("unknown proposal: {id}")]
    NotFound { id: String },

    #[error("proposal {id} already exists")]
    Conflict { id: String },

    #[error("waiter for proposal {id} was dropped before a decision arrived")]
    WaiterDropped { id: String },

    #[error("proposal timeout requires a running tokio runtime")]
    TimerUnavailable,
}

// ─── Agent loop errors ──────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("planner failed: {0}")]
    Planner(String),

    #[error("control plane call failed: {0}")]
    ControlPlane(String),

    #[error("proposal workflow failed: {0}")]
    Proposal(#[from] ProposalError),

    #[error("step {step_id} execution raised: {message}")]
    Execution { step_id: String, message: String },
}

// ─── Control plane errors ───────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ControlPlaneError {
    #[error("request to {endpoint} failed: {message}")]
    Request { endpoint: String, message: String },

    #[error("HTTP {status} from {endpoint}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("invalid response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },
}

// ─── Runtime event transport errors ─────────────────────────────────────────

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("missing runtime token (set RUNTIME_TOKEN)")]
    MissingToken,

    #[error("unauthorized runtime token")]
    Unauthorized,

    #[error("unsupported protocol version")]
    UnsupportedProtocol,

    #[error("HTTP {0}")]
    Status(u16),

    #[error("request failed: {0}")]
    Request(String),
}

impl TransportError {
    /// Whether the hosting process should stop rather than retry.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::MissingToken | Self::Unauthorized | Self::UnsupportedProtocol
        )
    }
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, RuntimeError>;
