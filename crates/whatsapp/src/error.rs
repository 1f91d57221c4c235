use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("session error: {0}")]
    Session(String),

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("whatsapp session is not connected")]
    Closed,

    #[error("session store error: {0}")]
    Store(#[from] sled::Error),

    #[error("registry slot '{0}' holds a different type")]
    SlotType(&'static str),
}

impl Error {
    /// Short error class name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Session(_) => "session",
            Self::Rejected(_) => "rejected",
            Self::Timeout(_) => "timeout",
            Self::Closed => "closed",
            Self::Store(_) => "store",
            Self::SlotType(_) => "slot_type",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
