//! A reliable, stop-and-wait data link on top of an unreliable byte channel like a serial line.
//!
//! Each data block is sent in a frame with a start marker, a size field, a sequence number and
//!  a checksum. The sender waits for an acknowledgement after every frame and repeats the frame
//!  until it is acknowledged, or until a configured number of attempts is used up. The receiver
//!  acknowledges every good frame, answers damaged or unexpected frames with a negative
//!  acknowledgement, and never delivers the same block twice.
//!
//! The byte channel itself is abstracted by [transport::Transport]. [loopback::LoopbackTransport]
//!  is an in-process implementation with optional bit error simulation.

pub mod checksum;
pub mod config;
pub mod error;
pub mod events;
pub mod frame;
pub mod link;
pub mod loopback;
pub mod seq_num;
pub mod state;
pub mod synchronizer;
pub mod transport;

#[cfg(test)] pub mod test_util;

pub use config::LinkConfig;
pub use error::{InvalidUse, LinkError};
pub use link::LinkLayer;
pub use transport::{Transport, TransportConfig, TransportError};
