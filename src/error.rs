use thiserror::Error;
use crate::transport::TransportError;

/// Errors surfaced by link operations. Damaged frames and timeouts are handled inside the retry
///  loops and never show up here, only in the statistics.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// The operation can not be used in the link's current state or with these arguments - this
    ///  is a bug in the calling code
    #[error("invalid use: {0}")]
    InvalidUse(#[from] InvalidUse),

    /// The transport reported a hard error. The connection should be torn down.
    #[error("transport failure: {0}")]
    TransportFailure(#[from] TransportError),

    /// The retry budget was exhausted. The connection is still usable, and it is up to the
    ///  caller to abort or retry.
    #[error("giving up after {attempts} attempts")]
    GiveUp { attempts: u32 },
}

impl LinkError {
    /// `true` if the connection is unusable after this error
    pub fn is_fatal(&self) -> bool {
        matches!(self, LinkError::TransportFailure(_))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidUse {
    #[error("not connected")]
    NotConnected,

    #[error("already connected")]
    AlreadyConnected,

    #[error("block of {len} bytes exceeds maximum block size {max}")]
    BlockTooLarge { len: usize, max: usize },
}
