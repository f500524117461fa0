use std::time::Duration;
use anyhow::bail;
use crate::frame::MAX_PAYLOAD_LEN;
use crate::transport::TransportConfig;

pub struct LinkConfig {
    /// This is the largest data block `send_reliable` accepts. Receivers use it to reject
    ///  frames that can not have been sent by a peer with the same configuration.
    pub max_block: usize,

    /// Block size recommended to callers. This is a fixed value, there is no negotiation with
    ///  the peer.
    pub optimal_block: usize,

    /// number of attempts for sending or receiving a single block before giving up
    pub max_tries: u32,

    /// This is how long a sender waits for an acknowledgement after each transmission. It should
    ///  exceed the receiver's processing time plus the round trip time, including transmission
    ///  time for a full frame at the transport's bit rate.
    pub tx_wait: Duration,

    /// time a receiver waits for a data frame in each attempt
    pub rx_wait: Duration,

    /// time granted for the rest of a frame after its start marker, see
    ///  [crate::synchronizer::FrameSynchronizer]
    pub frame_body_grace: Duration,

    pub transport: TransportConfig,
}

impl LinkConfig {
    pub fn default_serial() -> LinkConfig {
        LinkConfig {
            max_block: 200,
            optimal_block: 70,
            max_tries: 5,
            tx_wait: Duration::from_secs(8),
            rx_wait: Duration::from_secs(6),
            frame_body_grace: Duration::from_secs(1),
            transport: TransportConfig::default_serial(),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_block == 0 || self.max_block > MAX_PAYLOAD_LEN {
            bail!("maximum block size must be in 1..={}, was {}", MAX_PAYLOAD_LEN, self.max_block);
        }
        if self.optimal_block > self.max_block {
            bail!("optimal block size {} exceeds maximum block size {}", self.optimal_block, self.max_block);
        }
        if self.max_tries == 0 {
            bail!("at least one attempt is required");
        }
        if self.tx_wait.is_zero() || self.rx_wait.is_zero() {
            bail!("wait times must not be zero");
        }
        self.transport.validate()
    }
}
