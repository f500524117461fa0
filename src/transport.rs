use std::time::{Duration, Instant};
use anyhow::bail;
#[cfg(test)] use mockall::automock;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use thiserror::Error;

#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, TryFromPrimitive, IntoPrimitive)]
pub enum Parity {
    None = 0,
    Odd = 1,
    Even = 2,
}

/// Settings for opening a serial-like byte channel
#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    /// identifies the channel, e.g. the number of a serial port
    pub channel: u8,
    pub bit_rate: u32,
    /// 7 or 8
    pub data_bits: u8,
    pub parity: Parity,
    /// fixed part of the time a single read may block
    pub rx_timeout_const: Duration,
    /// maximum gap between bytes inside a single read
    pub rx_timeout_interval: Duration,
    /// Probability of a simulated bit error per received byte. This is for testing protocol
    ///  robustness, and it should be 0 for regular operation.
    pub bit_error_probability: f64,
}

impl TransportConfig {
    pub fn default_serial() -> TransportConfig {
        TransportConfig {
            channel: 1,
            bit_rate: 4800,
            data_bits: 8,
            parity: Parity::None,
            rx_timeout_const: Duration::from_millis(1000),
            rx_timeout_interval: Duration::from_millis(50),
            bit_error_probability: 0.0,
        }
    }

    /// Bit rates are multiples of 1200 by a power of two, up to 38400
    pub fn validate(&self) -> anyhow::Result<()> {
        let ratio = self.bit_rate / 1200;
        if self.bit_rate % 1200 != 0 || !ratio.is_power_of_two() || ratio > 32 {
            bail!("invalid bit rate {}", self.bit_rate);
        }
        if self.data_bits != 7 && self.data_bits != 8 {
            bail!("invalid number of data bits: {}", self.data_bits);
        }
        if !(0.0..=1.0).contains(&self.bit_error_probability) {
            bail!("bit error probability {} is not in [0, 1]", self.bit_error_probability);
        }
        Ok(())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport is not open")]
    NotOpen,

    #[error("invalid transport configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("short write: sent {sent} of {expected} bytes")]
    ShortWrite { sent: usize, expected: usize },
}

/// The raw byte channel a link runs on. Implementations are not expected to be reliable: bytes
///  may be lost, corrupted or delayed.
///
/// This is an abstraction introduced to keep the protocol independent of the actual channel, and
///  to facilitate mocking the I/O part away for testing
#[cfg_attr(test, automock)]
pub trait Transport {
    fn open(&mut self, config: &TransportConfig) -> Result<(), TransportError>;

    fn close(&mut self) -> Result<(), TransportError>;

    /// returns the number of bytes actually sent, which can be less than requested
    fn send(&mut self, bytes: &[u8]) -> Result<usize, TransportError>;

    /// Blocks until `buf` is full or `deadline` is reached, returning the number of bytes read.
    ///  Reaching the deadline is not an error: it returns whatever was read so far, possibly 0.
    fn receive(&mut self, buf: &mut [u8], deadline: Instant) -> Result<usize, TransportError>;
}
