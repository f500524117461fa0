use bytes::Bytes;
use tracing::{debug, error, trace, warn};
use crate::checksum::{self, FrameStatus};
use crate::config::LinkConfig;
use crate::error::{InvalidUse, LinkError};
use crate::events::{LinkEvent, LinkObserver};
use crate::frame::{build_ack_frame, build_data_frame, parse_ack, parse_frame, Ack, AckKind, FrameDump, ACK_FRAME_LEN, FRAME_OVERHEAD, SEQ_POS};
use crate::seq_num::SeqNum;
use crate::state::{ConnectionState, LinkReport, LinkStats};
use crate::synchronizer::FrameSynchronizer;
use crate::transport::{Transport, TransportError};

struct Events(Option<Box<dyn LinkObserver>>);

impl Events {
    fn notify(&self, event: LinkEvent) {
        if let Some(observer) = &self.0 {
            observer.on_event(&event);
        }
    }
}

/// A stop-and-wait ARQ link over an unreliable byte transport. Data blocks are delivered in
///  order and exactly once, as long as neither side gives up.
///
/// All operations block the calling thread until they succeed, fail or run out of retries. The
///  link owns its transport exclusively, and since every operation requires `&mut self`, there
///  can only be a single operation in flight at any time.
pub struct LinkLayer<T: Transport> {
    config: LinkConfig,
    transport: T,
    synchronizer: FrameSynchronizer,
    connection: Option<ConnectionState>,
    last_report: Option<LinkReport>,
    events: Events,
}

impl <T: Transport> LinkLayer<T> {
    pub fn new(transport: T, config: LinkConfig) -> anyhow::Result<LinkLayer<T>> {
        config.validate()?;

        Ok(LinkLayer {
            synchronizer: FrameSynchronizer::new(config.frame_body_grace),
            config,
            transport,
            connection: None,
            last_report: None,
            events: Events(None),
        })
    }

    pub fn with_observer(mut self, observer: impl LinkObserver + 'static) -> LinkLayer<T> {
        self.events = Events(Some(Box::new(observer)));
        self
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// live counters of the current connection
    pub fn stats(&self) -> Option<&LinkStats> {
        self.connection.as_ref()
            .map(|c| &c.stats)
    }

    /// The report of the most recent disconnect. It is available even if closing the transport
    ///  failed.
    pub fn last_report(&self) -> Option<&LinkReport> {
        self.last_report.as_ref()
    }

    pub fn optimal_block_size(&self) -> usize {
        self.config.optimal_block
    }

    pub fn connect(&mut self) -> Result<(), LinkError> {
        if self.connection.is_some() {
            return Err(InvalidUse::AlreadyConnected.into());
        }

        if let Err(e) = self.transport.open(&self.config.transport) {
            error!("failed to connect on channel {}: {}", self.config.transport.channel, e);
            return Err(e.into());
        }

        self.connection = Some(ConnectionState::new());
        debug!("connected on channel {}", self.config.transport.channel);
        self.events.notify(LinkEvent::Connected);
        Ok(())
    }

    /// Closes the transport and returns the connection's statistics. The link counts as
    ///  disconnected afterwards, even if the transport reports an error on closing.
    pub fn disconnect(&mut self) -> Result<LinkReport, LinkError> {
        let connection = self.connection.take()
            .ok_or(InvalidUse::NotConnected)?;

        let report = connection.report();
        self.last_report = Some(report.clone());
        self.events.notify(LinkEvent::Disconnected);

        match self.transport.close() {
            Ok(()) => {
                debug!("{}", report);
                Ok(report)
            }
            Err(e) => {
                error!("failed to disconnect: {}", e);
                Err(e.into())
            }
        }
    }

    /// Sends a data block and waits for the peer to acknowledge it, re-sending the same frame
    ///  until a positive acknowledgement arrives or the configured number of attempts is used up.
    pub fn send_reliable(&mut self, block: &[u8]) -> Result<(), LinkError> {
        let connection = self.connection.as_mut()
            .ok_or(InvalidUse::NotConnected)?;

        if block.len() > self.config.max_block {
            warn!("can not send block of {} bytes, max block size is {}", block.len(), self.config.max_block);
            return Err(InvalidUse::BlockTooLarge { len: block.len(), max: self.config.max_block }.into());
        }

        let seq = connection.seq_tx;
        let frame = build_data_frame(block, seq);

        for attempt in 1..=self.config.max_tries {
            let num_sent = self.transport.send(&frame)?;
            if num_sent != frame.len() {
                error!("block {}: failed to send frame, sent {} of {} bytes", seq, num_sent, frame.len());
                return Err(TransportError::ShortWrite { sent: num_sent, expected: frame.len() }.into());
            }

            connection.stats.frames_sent += 1;
            debug!("sent frame of {} bytes, block {}, attempt {}", frame.len(), seq, attempt);
            self.events.notify(LinkEvent::DataFrameSent { seq, attempt, frame_len: frame.len() });

            let response = match self.synchronizer.get_frame(&mut self.transport, 2 * ACK_FRAME_LEN, self.config.tx_wait)? {
                Some(response) => response,
                None => {
                    debug!("block {}: timeout waiting for response", seq);
                    connection.stats.timeouts += 1;
                    self.events.notify(LinkEvent::Timeout { attempt });
                    continue;
                }
            };

            if checksum::verify(&response) == FrameStatus::Bad {
                debug!("block {}: bad response frame\n{}", seq, FrameDump(&response));
                connection.stats.bad_frames += 1;
                self.events.notify(LinkEvent::BadFrame { frame_len: response.len() });
                continue;
            }
            connection.stats.good_frames += 1;

            match parse_ack(&response) {
                Ok(Ack { seq: ack_seq, kind: AckKind::Positive }) if ack_seq == seq.to_wire() => {
                    debug!("ACK received for block {}", seq);
                    connection.stats.acks_received += 1;
                    self.events.notify(LinkEvent::AckReceived { seq });

                    connection.seq_tx = seq.next();
                    return Ok(());
                }
                Ok(ack) => {
                    debug!("block {}: response {:?} for seq {}", seq, ack.kind, ack.seq);
                    connection.stats.naks_received += 1;
                    self.events.notify(LinkEvent::NakReceived { seq: ack.seq });
                }
                Err(e) => {
                    debug!("block {}: response is not an acknowledgement: {}", seq, e);
                    connection.stats.naks_received += 1;
                    self.events.notify(LinkEvent::NakReceived { seq: response[SEQ_POS] });
                }
            }
        }

        warn!("block {}: tried {} times, giving up", seq, self.config.max_tries);
        self.events.notify(LinkEvent::GaveUp { attempts: self.config.max_tries });
        Err(LinkError::GiveUp { attempts: self.config.max_tries })
    }

    /// Waits for the next data block in sequence and acknowledges it. Damaged frames and frames
    ///  out of sequence are answered with a negative acknowledgement, and a duplicate of the
    ///  previously accepted block is never delivered again.
    ///
    /// Payload bytes beyond `max_len` are dropped.
    pub fn receive_reliable(&mut self, max_len: usize) -> Result<Bytes, LinkError> {
        let connection = self.connection.as_mut()
            .ok_or(InvalidUse::NotConnected)?;

        let expected = connection.expected_rx();
        // room for a frame with a full-size block - anything bigger is discarded
        let capacity = FRAME_OVERHEAD + self.config.max_block + 1;

        for attempt in 1..=self.config.max_tries {
            let frame = match self.synchronizer.get_frame(&mut self.transport, capacity, self.config.rx_wait)? {
                Some(frame) => frame,
                None => {
                    debug!("timeout trying to receive frame, attempt {}", attempt);
                    connection.stats.timeouts += 1;
                    self.events.notify(LinkEvent::Timeout { attempt });
                    continue;
                }
            };
            trace!("got frame of {} bytes, attempt {}", frame.len(), attempt);

            if checksum::verify(&frame) == FrameStatus::Bad {
                debug!("bad frame received\n{}", FrameDump(&frame));
                connection.stats.bad_frames += 1;
                self.events.notify(LinkEvent::BadFrame { frame_len: frame.len() });

                // NB: the sequence number of a damaged frame is not reliable
                send_ack(&mut self.transport, connection, &self.events, AckKind::Negative, expected);
                continue;
            }

            let parsed = match parse_frame(&frame, max_len) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!("discarding frame: {}", e);
                    continue;
                }
            };
            connection.stats.good_frames += 1;

            match SeqNum::from_wire(parsed.seq) {
                Some(seq) if seq == expected => {
                    debug!("received block {} with {} data bytes", seq, parsed.payload.len());
                    connection.last_good_rx = Some(seq);
                    send_ack(&mut self.transport, connection, &self.events, AckKind::Positive, seq);
                    self.events.notify(LinkEvent::BlockDelivered { seq, len: parsed.payload.len() });
                    return Ok(parsed.payload);
                }
                Some(seq) if Some(seq) == connection.last_good_rx => {
                    // most likely our acknowledgement got lost, and the sender is repeating
                    debug!("duplicate block {}, expected {}", seq, expected);
                    self.events.notify(LinkEvent::DuplicateFrame { seq, expected });
                    send_ack(&mut self.transport, connection, &self.events, AckKind::Negative, seq);
                }
                Some(seq) => {
                    debug!("unexpected block {}, expected {}", seq, expected);
                    self.events.notify(LinkEvent::UnexpectedFrame { seq: parsed.seq, expected });
                    send_ack(&mut self.transport, connection, &self.events, AckKind::Negative, seq);
                }
                None => {
                    debug!("sequence number {} out of range, expected {}", parsed.seq, expected);
                    self.events.notify(LinkEvent::UnexpectedFrame { seq: parsed.seq, expected });
                    send_ack(&mut self.transport, connection, &self.events, AckKind::Negative, expected);
                }
            }
        }

        warn!("tried to receive block {} {} times, giving up", expected, self.config.max_tries);
        self.events.notify(LinkEvent::GaveUp { attempts: self.config.max_tries });
        Err(LinkError::GiveUp { attempts: self.config.max_tries })
    }
}

/// A failure to send an acknowledgement is only counted: the sender will repeat its frame, and
///  that is the next chance to acknowledge it.
fn send_ack(transport: &mut impl Transport, connection: &mut ConnectionState, events: &Events, kind: AckKind, seq: SeqNum) {
    let frame = build_ack_frame(kind, seq);

    let result = match transport.send(&frame) {
        Ok(n) if n == frame.len() => Ok(()),
        Ok(n) => Err(TransportError::ShortWrite { sent: n, expected: frame.len() }),
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => {
            trace!("sent {:?} acknowledgement for block {}", kind, seq);
            match kind {
                AckKind::Positive => {
                    connection.stats.acks_sent += 1;
                    events.notify(LinkEvent::AckSent { seq });
                }
                AckKind::Negative => {
                    connection.stats.naks_sent += 1;
                    events.notify(LinkEvent::NakSent { seq });
                }
            }
        }
        Err(error) => {
            warn!("failed to send {:?} acknowledgement for block {}: {}", kind, seq, error);
            connection.stats.ack_send_failures += 1;
            events.notify(LinkEvent::AckSendFailed { seq, error });
        }
    }
}
