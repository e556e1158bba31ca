use ulid::Ulid;

#[derive(Debug)]
pub enum EngineError {
    /// Referenced user/item/booking absent — or access deliberately hidden.
    NotFound(Ulid),
    /// Wrong actor for the operation.
    Forbidden(&'static str),
    /// Transition or precondition violation (booking not WAITING, item unavailable).
    InvalidState(&'static str),
    /// Malformed filter or pagination input.
    InvalidArgument(String),
    AlreadyExists(Ulid),
    LimitExceeded(&'static str),
    WalError(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::Forbidden(msg) => write!(f, "forbidden: {msg}"),
            EngineError::InvalidState(msg) => write!(f, "invalid state: {msg}"),
            EngineError::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
