#![cfg_attr(not(test), no_std)]

//! Shared parts of the infrared bridge.
//!
//! Everything in here runs without an allocator so the same code can drive the
//! bridge on the transceiver itself or on a host talking to it.

pub mod bridge;
pub mod frame;
pub mod message;
pub mod protocol;
pub mod session;

pub use bridge::{Bridge, CaptureOutcome, IrDecoder, IrTransmitter, TickReport};
pub use frame::{deframe, FrameError, Revision};
pub use message::{DeviceId, OutboundMessage};
pub use protocol::{DecodedSignal, IrCommand, ProtocolId, TxProtocol};
pub use session::{ConnectionState, Session, Transport};
