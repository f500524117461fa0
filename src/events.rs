#[cfg(test)] use mockall::automock;
use crate::seq_num::SeqNum;
use crate::transport::TransportError;

/// Everything noteworthy that happens on a link, for callers that want to trace or report
///  protocol activity. The link itself logs through `tracing` and never prints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Connected,
    Disconnected,
    DataFrameSent { seq: SeqNum, attempt: u32, frame_len: usize },
    AckReceived { seq: SeqNum },
    /// a negative acknowledgement, or an acknowledgement for a different sequence number
    NakReceived { seq: u8 },
    AckSent { seq: SeqNum },
    NakSent { seq: SeqNum },
    AckSendFailed { seq: SeqNum, error: TransportError },
    BadFrame { frame_len: usize },
    Timeout { attempt: u32 },
    /// a good frame carrying the sequence number of the block that was accepted last
    DuplicateFrame { seq: SeqNum, expected: SeqNum },
    UnexpectedFrame { seq: u8, expected: SeqNum },
    BlockDelivered { seq: SeqNum, len: usize },
    GaveUp { attempts: u32 },
}

#[cfg_attr(test, automock)]
pub trait LinkObserver: Send {
    fn on_event(&self, event: &LinkEvent);
}
