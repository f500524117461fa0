use std::fmt::{Display, Formatter};

/// Sequence numbers count modulo this value
pub const MOD_SEQNUM: u8 = 16;

/// A data block's sequence number, always in `[0, MOD_SEQNUM)`
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct SeqNum(u8);

impl Display for SeqNum {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl SeqNum {
    pub const ZERO: SeqNum = SeqNum(0);

    /// Interprets a sequence number byte taken from a received frame. Values outside the
    ///  sequence number range can only come from a peer that does not speak this protocol.
    pub fn from_wire(value: u8) -> Option<SeqNum> {
        (value < MOD_SEQNUM).then_some(SeqNum(value))
    }

    pub fn to_wire(&self) -> u8 {
        self.0
    }

    pub fn next(&self) -> SeqNum {
        SeqNum((self.0 + 1) % MOD_SEQNUM)
    }
}
