use core::convert::TryFrom;

use serde::{Deserialize, Serialize};

/// Protocols the decoder can report
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Eq, PartialEq)]
pub enum ProtocolId {
    /// Capture that didn't match any known protocol
    Unknown,
    Nec,
    Rc5,
    Rc6,
    RcMm,
    Samsung,
    Sony,
}

/// Protocols we can transmit. The discriminant is the wire tag.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Eq, PartialEq)]
pub enum TxProtocol {
    Nec = 0,
    Rc5 = 1,
    RcMm = 2,
}

impl TxProtocol {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for TxProtocol {
    type Error = u8;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(TxProtocol::Nec),
            1 => Ok(TxProtocol::Rc5),
            2 => Ok(TxProtocol::RcMm),
            other => Err(other),
        }
    }
}

impl TryFrom<&str> for TxProtocol {
    type Error = ();

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "nec" | "0" => Ok(TxProtocol::Nec),
            "rc5" | "1" => Ok(TxProtocol::Rc5),
            "rcmm" | "2" => Ok(TxProtocol::RcMm),
            _ => Err(()),
        }
    }
}

/// One result from the decoder
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Eq, PartialEq)]
pub struct DecodedSignal {
    pub protocol: ProtocolId,
    pub value: u64,
    /// Number of significant bits in `value`
    pub bits: u16,
    /// Repeat of the previous code, sent while a button is held
    pub repeat: bool,
    /// The capture buffer overran, value is garbage
    pub overflow: bool,
}

impl DecodedSignal {
    pub fn new(protocol: ProtocolId, value: u64, bits: u16) -> Self {
        DecodedSignal {
            protocol,
            value,
            bits,
            repeat: false,
            overflow: false,
        }
    }

    pub fn repeat(protocol: ProtocolId) -> Self {
        DecodedSignal {
            repeat: true,
            ..DecodedSignal::new(protocol, 0, 0)
        }
    }

    /// False for overflowed and unrecognized captures
    pub fn is_forwardable(&self) -> bool {
        !self.overflow && self.protocol != ProtocolId::Unknown
    }
}

/// Command received from the server, ready for the transmitter
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Eq, PartialEq)]
pub struct IrCommand {
    pub protocol: TxProtocol,
    pub value: u64,
    /// `None` lets the transmitter use the protocol default
    pub bits: Option<u8>,
    /// `None` lets the transmitter use the protocol default
    pub repeat: Option<u8>,
}

/// Receiver tuning handed to the transceiver at bring-up
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Eq, PartialEq)]
pub struct ReceiverConfig {
    pub recv_pin: u16,
    pub send_pin: u16,
    pub capture_buffer_size: u16,
    /// Inter-pulse gap that ends a capture
    pub timeout_ms: u8,
    /// Shortest unknown capture that is reported instead of dropped as noise
    pub min_unknown_size: u16,
    pub tolerance_percent: u8,
}

/// Host to transceiver
#[derive(Serialize, Deserialize, Debug, Eq, PartialEq)]
pub enum Command {
    /// Ask for firmware version and transmitters
    Info,
    Configure(ReceiverConfig),
    /// Start reporting decoded signals
    Capture,
    Transmit(IrCommand),
}

/// Transceiver to host
#[derive(Serialize, Deserialize, Debug, Eq, PartialEq)]
pub enum Reply {
    Ok,
    Info { info: Info },
    Decoded(DecodedSignal),
}

#[derive(Serialize, Deserialize, Debug, Eq, PartialEq)]
pub struct Info {
    pub version: u32,
    /// Bitfield of transmitters
    pub transmitters: u32,
}
