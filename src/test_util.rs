//! Utilities for testing link layer functionality without a real byte channel.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use crate::events::{LinkEvent, LinkObserver};
use crate::transport::{Transport, TransportConfig, TransportError};

enum Inbound {
    Bytes(Vec<u8>),
    /// nothing arrives until the deadline of the next read
    Silence,
    Failure(TransportError),
}

#[derive(Default)]
struct ScriptedTransportInner {
    is_open: bool,
    inbound: VecDeque<Inbound>,
    sent: Vec<Vec<u8>>,
    num_opened: usize,
    open_result: Option<TransportError>,
    close_result: Option<TransportError>,
    /// if set, `send` reports only this many bytes as sent
    short_write: Option<usize>,
}

/// A transport that plays back a pre-defined sequence of inbound bytes, and records everything
///  that is sent. Clones share their state, so a test can keep a handle for inspection after
///  handing the transport to a link.
///
/// Reads with nothing left in the script block until their deadline.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    inner: Arc<Mutex<ScriptedTransportInner>>,
}

impl ScriptedTransport {
    pub fn new() -> ScriptedTransport {
        Default::default()
    }

    pub fn opened() -> ScriptedTransport {
        let result = Self::new();
        result.inner.lock().unwrap().is_open = true;
        result
    }

    pub fn then_bytes(self, bytes: impl Into<Vec<u8>>) -> ScriptedTransport {
        self.inner.lock().unwrap().inbound.push_back(Inbound::Bytes(bytes.into()));
        self
    }

    pub fn then_silence(self) -> ScriptedTransport {
        self.inner.lock().unwrap().inbound.push_back(Inbound::Silence);
        self
    }

    pub fn then_failure(self, error: TransportError) -> ScriptedTransport {
        self.inner.lock().unwrap().inbound.push_back(Inbound::Failure(error));
        self
    }

    pub fn failing_open(self, error: TransportError) -> ScriptedTransport {
        self.inner.lock().unwrap().open_result = Some(error);
        self
    }

    pub fn failing_close(self, error: TransportError) -> ScriptedTransport {
        self.inner.lock().unwrap().close_result = Some(error);
        self
    }

    pub fn with_short_write(self, num_sent: usize) -> ScriptedTransport {
        self.inner.lock().unwrap().short_write = Some(num_sent);
        self
    }

    /// the byte chunks passed to `send`, in order
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.inner.lock().unwrap().sent.clone()
    }

    pub fn is_open(&self) -> bool {
        self.inner.lock().unwrap().is_open
    }

    pub fn num_opened(&self) -> usize {
        self.inner.lock().unwrap().num_opened
    }
}

impl Transport for ScriptedTransport {
    fn open(&mut self, _config: &TransportConfig) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(e) = inner.open_result.clone() {
            return Err(e);
        }
        inner.is_open = true;
        inner.num_opened += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();
        inner.is_open = false;
        match inner.close_result.clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn send(&mut self, bytes: &[u8]) -> Result<usize, TransportError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.is_open {
            return Err(TransportError::NotOpen);
        }
        inner.sent.push(bytes.to_vec());
        Ok(inner.short_write.unwrap_or(bytes.len()))
    }

    fn receive(&mut self, buf: &mut [u8], deadline: Instant) -> Result<usize, TransportError> {
        let next = {
            let mut inner = self.inner.lock().unwrap();
            if !inner.is_open {
                return Err(TransportError::NotOpen);
            }
            inner.inbound.pop_front()
        };

        match next {
            Some(Inbound::Bytes(mut bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                if n < bytes.len() {
                    let rest = bytes.split_off(n);
                    self.inner.lock().unwrap().inbound.push_front(Inbound::Bytes(rest));
                }
                Ok(n)
            }
            Some(Inbound::Failure(e)) => Err(e),
            Some(Inbound::Silence) | None => {
                std::thread::sleep(deadline.saturating_duration_since(Instant::now()));
                Ok(0)
            }
        }
    }
}

/// Collects all events of a link for later assertions. Clones share the collected events.
#[derive(Clone, Default)]
pub struct TrackingObserver {
    events: Arc<Mutex<Vec<LinkEvent>>>,
}

impl TrackingObserver {
    pub fn new() -> TrackingObserver {
        Default::default()
    }

    pub fn events(&self) -> Vec<LinkEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl LinkObserver for TrackingObserver {
    fn on_event(&self, event: &LinkEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
