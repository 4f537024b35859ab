//! Server to device command framing.
//!
//! Extended frames (the current revision):
//!
//! ```text
//! [tag:1][repeat:1][bits:1][value:1..=8, little-endian]
//! ```
//!
//! Minimal frames, kept for servers that still speak the older revision:
//!
//! ```text
//! [tag:1][value:0..=8, little-endian]
//! ```
//!
//! There is no length prefix. A frame is whatever was buffered when the
//! command path polled, so frames split across polls or sent back to back
//! are misframed.

use core::convert::TryFrom;
use core::fmt;

use heapless::Vec;

use crate::protocol::{IrCommand, TxProtocol};

/// Bytes of value payload that fit in a u64
pub const MAX_VALUE_LEN: usize = 8;
/// Tag, repeat and bits
pub const EXTENDED_HEADER_LEN: usize = 3;
pub const EXTENDED_MIN_LEN: usize = EXTENDED_HEADER_LEN + 1;
pub const MAX_FRAME_LEN: usize = EXTENDED_HEADER_LEN + MAX_VALUE_LEN;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Revision {
    /// Tag and value only
    Minimal,
    /// Tag, repeat count, bit width and value
    Extended,
}

impl Default for Revision {
    fn default() -> Self {
        Revision::Extended
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FrameError {
    Empty,
    Truncated { needed: usize, got: usize },
    UnknownProtocol(u8),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::Empty => write!(f, "empty frame"),
            FrameError::Truncated { needed, got } => {
                write!(f, "truncated frame: need {} bytes, got {}", needed, got)
            }
            FrameError::UnknownProtocol(tag) => write!(f, "unknown protocol tag {}", tag),
        }
    }
}

/// Turn one buffered frame into a command
pub fn deframe(revision: Revision, bytes: &[u8]) -> Result<IrCommand, FrameError> {
    match revision {
        Revision::Minimal => deframe_minimal(bytes),
        Revision::Extended => deframe_extended(bytes),
    }
}

fn deframe_minimal(bytes: &[u8]) -> Result<IrCommand, FrameError> {
    let (&tag, value) = bytes.split_first().ok_or(FrameError::Empty)?;

    Ok(IrCommand {
        protocol: protocol_from_tag(tag)?,
        value: value_from_le(value),
        bits: None,
        repeat: None,
    })
}

fn deframe_extended(bytes: &[u8]) -> Result<IrCommand, FrameError> {
    if bytes.is_empty() {
        return Err(FrameError::Empty);
    }

    if bytes.len() < EXTENDED_MIN_LEN {
        return Err(FrameError::Truncated {
            needed: EXTENDED_MIN_LEN,
            got: bytes.len(),
        });
    }

    Ok(IrCommand {
        protocol: protocol_from_tag(bytes[0])?,
        repeat: Some(bytes[1]),
        bits: Some(bytes[2]),
        value: value_from_le(&bytes[EXTENDED_HEADER_LEN..]),
    })
}

fn protocol_from_tag(tag: u8) -> Result<TxProtocol, FrameError> {
    TxProtocol::try_from(tag).map_err(FrameError::UnknownProtocol)
}

/// Assemble a value, first byte lowest. Bytes past the eighth are ignored.
pub fn value_from_le(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .take(MAX_VALUE_LEN)
        .enumerate()
        .fold(0, |acc, (i, &b)| acc | (u64::from(b) << (8 * i)))
}

pub fn value_to_le(value: u64) -> [u8; MAX_VALUE_LEN] {
    value.to_le_bytes()
}

/// Number of value bytes needed to carry `value`, at least one
fn value_len(value: u64) -> usize {
    let significant = (64 - value.leading_zeros() as usize + 7) / 8;
    significant.max(1)
}

/// Build an extended frame for `cmd`. Missing bits and repeat are sent as zero.
pub fn encode_extended(cmd: &IrCommand) -> Vec<u8, MAX_FRAME_LEN> {
    let mut frame = Vec::new();
    let value = value_to_le(cmd.value);

    // Header and at most eight value bytes always fit
    let _ = frame.push(cmd.protocol.as_u8());
    let _ = frame.push(cmd.repeat.unwrap_or(0));
    let _ = frame.push(cmd.bits.unwrap_or(0));
    let _ = frame.extend_from_slice(&value[..value_len(cmd.value)]);

    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extended_nec_example() {
        let bytes = [0x00, 0x02, 0x20, 0xAD, 0xDE, 0x00, 0x00];
        let cmd = deframe(Revision::Extended, &bytes).unwrap();

        assert_eq!(
            cmd,
            IrCommand {
                protocol: TxProtocol::Nec,
                value: 0x0000_DEAD,
                bits: Some(32),
                repeat: Some(2),
            }
        );
    }

    #[test]
    fn extended_payload_lengths() {
        let full = [0x01, 0x00, 0x40, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88];

        for payload in 1..=MAX_VALUE_LEN {
            let bytes = &full[..EXTENDED_HEADER_LEN + payload];
            let cmd = deframe(Revision::Extended, bytes).unwrap();

            let expected = value_from_le(&full[EXTENDED_HEADER_LEN..EXTENDED_HEADER_LEN + payload]);
            assert_eq!(cmd.protocol, TxProtocol::Rc5);
            assert_eq!(cmd.bits, Some(0x40));
            assert_eq!(cmd.repeat, Some(0));
            assert_eq!(cmd.value, expected);
        }

        let cmd = deframe(Revision::Extended, &full).unwrap();
        assert_eq!(cmd.value, 0x8877_6655_4433_2211);
    }

    #[test]
    fn extended_short_frames() {
        assert_eq!(deframe(Revision::Extended, &[]), Err(FrameError::Empty));

        for len in 1..EXTENDED_MIN_LEN {
            let bytes = [0u8; EXTENDED_MIN_LEN];
            assert_eq!(
                deframe(Revision::Extended, &bytes[..len]),
                Err(FrameError::Truncated { needed: 4, got: len })
            );
        }
    }

    #[test]
    fn unknown_tag() {
        assert_eq!(
            deframe(Revision::Extended, &[7, 1, 32, 0xff]),
            Err(FrameError::UnknownProtocol(7))
        );
        assert_eq!(
            deframe(Revision::Minimal, &[0xff, 0x01]),
            Err(FrameError::UnknownProtocol(0xff))
        );
    }

    #[test]
    fn minimal() {
        let cmd = deframe(Revision::Minimal, &[2, 0x34, 0x12]).unwrap();
        assert_eq!(
            cmd,
            IrCommand {
                protocol: TxProtocol::RcMm,
                value: 0x1234,
                bits: None,
                repeat: None,
            }
        );

        let cmd = deframe(Revision::Minimal, &[0]).unwrap();
        assert_eq!(cmd.value, 0);
        assert_eq!(deframe(Revision::Minimal, &[]), Err(FrameError::Empty));
    }

    #[test]
    fn le_assembly() {
        for &v in &[0, 1, 0xff, 0x100, 0xDEAD, 0x1A2B3C, u64::from(u32::MAX), u64::MAX - 1, u64::MAX] {
            assert_eq!(value_from_le(&value_to_le(v)), v);
        }

        assert_eq!(value_from_le(&[0xAD, 0xDE]), 0xDEAD);
        assert_eq!(value_from_le(&[]), 0);
    }

    #[test]
    fn encode_is_minimal_and_readable() {
        let cmd = IrCommand {
            protocol: TxProtocol::Nec,
            value: 0x20DF_10EF,
            bits: Some(32),
            repeat: Some(1),
        };

        let frame = encode_extended(&cmd);
        assert_eq!(&frame[..], &[0, 1, 32, 0xEF, 0x10, 0xDF, 0x20]);
        assert_eq!(deframe(Revision::Extended, &frame), Ok(cmd));

        let zero = IrCommand { value: 0, ..cmd };
        assert_eq!(encode_extended(&zero).len(), EXTENDED_MIN_LEN);
    }

    #[test]
    fn display() {
        assert_eq!(
            FrameError::Truncated { needed: 4, got: 2 }.to_string(),
            "truncated frame: need 4 bytes, got 2"
        );
    }
}
