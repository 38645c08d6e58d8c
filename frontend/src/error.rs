use thiserror::Error;

/// Failures talking to the reward authority.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("failed: {0}")]
    Failed(reqwest::StatusCode),
    #[error("rejected by authority: {0}")]
    Rejected(String),
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

/// Why the Turn Guard refused to admit a turn.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    #[error("a reveal is already in progress")]
    AlreadyInProgress,
    #[error("no turns left")]
    BudgetExhausted,
}

/// Errors surfaced to the caller of a game turn.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RevealError {
    /// A reveal is active. Callers treat this as a no-op.
    #[error("a reveal is already in progress")]
    AlreadyInProgress,
    /// Disables the trigger control.
    #[error("no turns left")]
    BudgetExhausted,
    /// Retryable; the speculative budget decrement has been rolled back.
    #[error("outcome fetch failed: {0}")]
    OutcomeFetchFailed(String),
    /// The reveal stands; the next read retries.
    #[error("reconciliation failed: {0}")]
    ReconciliationFailed(String),
    /// Misconfigured pocket table or a draw that does not match its slots.
    #[error("mapping invariant violated: {0}")]
    MappingInvariantViolation(String),
    #[error("the reward event is not running")]
    EventClosed,
    #[error("slot {index} is out of range for {total} slots")]
    InvalidSlot { index: usize, total: usize },
    #[error("reveal session was disposed")]
    SessionDisposed,
}

impl RevealError {
    /// Whether the same trigger may simply be pressed again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::OutcomeFetchFailed(_) | Self::ReconciliationFailed(_))
    }
}

impl From<Rejection> for RevealError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::AlreadyInProgress => Self::AlreadyInProgress,
            Rejection::BudgetExhausted => Self::BudgetExhausted,
        }
    }
}

impl From<validator::ValidationError> for RevealError {
    fn from(err: validator::ValidationError) -> Self {
        Self::MappingInvariantViolation(err.code.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RevealError>;
