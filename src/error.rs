use std::fmt;

#[derive(Debug)]
pub enum EngineError {
    /// A session record failed to deserialize.
    InvalidSession(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::InvalidSession(detail) => write!(f, "Invalid session: {detail}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::InvalidSession(e.to_string())
    }
}
