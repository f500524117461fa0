use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace};
use crate::transport::{Transport, TransportConfig, TransportError};

/// One end of an in-process full-duplex byte channel. Bytes sent on one end arrive at the other
///  end in order, and a configured probability of bit errors is applied on the receiving side,
///  flipping a single random bit in affected bytes.
///
/// A peer that went away looks like a silent line: sending still succeeds, and receiving waits
///  for the deadline.
pub struct LoopbackTransport {
    tx: Sender<u8>,
    rx: Receiver<u8>,
    is_open: bool,
    bit_error_probability: f64,
    rx_timeout_interval: Duration,
    rng: StdRng,
}

impl LoopbackTransport {
    pub fn pair() -> (LoopbackTransport, LoopbackTransport) {
        let (tx_a, rx_b) = channel();
        let (tx_b, rx_a) = channel();
        (Self::new(tx_a, rx_a), Self::new(tx_b, rx_b))
    }

    fn new(tx: Sender<u8>, rx: Receiver<u8>) -> LoopbackTransport {
        LoopbackTransport {
            tx,
            rx,
            is_open: false,
            bit_error_probability: 0.0,
            rx_timeout_interval: Duration::ZERO,
            rng: StdRng::from_entropy(),
        }
    }

    /// for reproducible bit errors
    pub fn with_seed(mut self, seed: u64) -> LoopbackTransport {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    fn simulate_bit_errors(&mut self, buf: &mut [u8]) {
        if self.bit_error_probability == 0.0 {
            return;
        }

        for b in buf.iter_mut() {
            if self.rng.gen_bool(self.bit_error_probability) {
                let bit = self.rng.gen_range(0..8);
                debug!("simulated bit error: flipping bit {} of {}", bit, *b);
                *b ^= 1 << bit;
            }
        }
    }
}

impl Transport for LoopbackTransport {
    fn open(&mut self, config: &TransportConfig) -> Result<(), TransportError> {
        config.validate()
            .map_err(|e| TransportError::InvalidConfig(format!("{:#}", e)))?;

        // discard whatever arrived while closed
        let mut num_stale = 0usize;
        while self.rx.try_recv().is_ok() {
            num_stale += 1;
        }
        if num_stale > 0 {
            debug!("discarded {} stale bytes on open", num_stale);
        }

        self.bit_error_probability = config.bit_error_probability;
        self.rx_timeout_interval = config.rx_timeout_interval;
        self.is_open = true;
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        if !self.is_open {
            return Err(TransportError::NotOpen);
        }
        self.is_open = false;
        Ok(())
    }

    fn send(&mut self, bytes: &[u8]) -> Result<usize, TransportError> {
        if !self.is_open {
            return Err(TransportError::NotOpen);
        }

        for &b in bytes {
            if self.tx.send(b).is_err() {
                trace!("peer is gone - bytes are lost");
                break;
            }
        }
        Ok(bytes.len())
    }

    fn receive(&mut self, buf: &mut [u8], deadline: Instant) -> Result<usize, TransportError> {
        if !self.is_open {
            return Err(TransportError::NotOpen);
        }

        let mut count = 0;
        while count < buf.len() {
            let mut timeout = deadline.saturating_duration_since(Instant::now());
            if count > 0 && !self.rx_timeout_interval.is_zero() {
                timeout = timeout.min(self.rx_timeout_interval);
            }

            match self.rx.recv_timeout(timeout) {
                Ok(b) => {
                    buf[count] = b;
                    count += 1;
                }
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => {
                    std::thread::sleep(deadline.saturating_duration_since(Instant::now()));
                    break;
                }
            }
        }

        self.simulate_bit_errors(&mut buf[..count]);
        Ok(count)
    }
}
