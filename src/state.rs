use std::fmt::{Display, Formatter};
use std::time::{Duration, Instant};
use crate::seq_num::SeqNum;

/// Counters for everything that happened on a connection. They only ever increase while
///  connected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub frames_sent: u64,
    pub acks_sent: u64,
    pub naks_sent: u64,
    pub acks_received: u64,
    pub naks_received: u64,
    pub bad_frames: u64,
    pub good_frames: u64,
    pub timeouts: u64,
    /// acknowledgements the transport failed to send
    pub ack_send_failures: u64,
}

/// Protocol state of a single connection: created on connect and discarded on disconnect
pub struct ConnectionState {
    /// sequence number for the next data block to be sent
    pub seq_tx: SeqNum,
    /// sequence number of the last data block accepted by the receiver - `None` before the first
    ///  block, so the first expected number is 0 and no real sequence number is taken for a
    ///  duplicate
    pub last_good_rx: Option<SeqNum>,
    pub stats: LinkStats,
    pub connected_at: Instant,
}

impl ConnectionState {
    pub fn new() -> ConnectionState {
        ConnectionState {
            seq_tx: SeqNum::ZERO,
            last_good_rx: None,
            stats: LinkStats::default(),
            connected_at: Instant::now(),
        }
    }

    pub fn expected_rx(&self) -> SeqNum {
        self.last_good_rx
            .map(|s| s.next())
            .unwrap_or(SeqNum::ZERO)
    }

    pub fn report(&self) -> LinkReport {
        LinkReport {
            stats: self.stats.clone(),
            connected_for: self.connected_at.elapsed(),
        }
    }
}

/// Summary of a connection, available after disconnecting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkReport {
    pub stats: LinkStats,
    pub connected_for: Duration,
}

impl Display for LinkReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = &self.stats;
        writeln!(f, "Disconnected after {:.2} s. Sent {} data frames", self.connected_for.as_secs_f64(), s.frames_sent)?;
        writeln!(f, "Received {} good and {} bad frames, had {} timeouts", s.good_frames, s.bad_frames, s.timeouts)?;
        writeln!(f, "Sent {} ACKs and {} NAKs ({} failed)", s.acks_sent, s.naks_sent, s.ack_send_failures)?;
        write!(f, "Received {} ACKs and {} NAKs", s.acks_received, s.naks_received)
    }
}
