//! Device to server messages. All of them are plain ASCII text.

use core::fmt::{self, Write};

use heapless::String;

pub const MAX_DEVICE_ID_LEN: usize = 32;
/// "register " plus the longest id, with room to spare
pub const MAX_MESSAGE_LEN: usize = 64;

/// Identifier this unit registers with
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DeviceId(String<MAX_DEVICE_ID_LEN>);

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DeviceIdError {
    Empty,
    TooLong,
    /// The server splits messages on the first space
    InvalidChar(char),
}

impl fmt::Display for DeviceIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceIdError::Empty => write!(f, "device id is empty"),
            DeviceIdError::TooLong => {
                write!(f, "device id is longer than {} bytes", MAX_DEVICE_ID_LEN)
            }
            DeviceIdError::InvalidChar(c) => write!(f, "device id contains {:?}", c),
        }
    }
}

impl DeviceId {
    pub fn new(id: &str) -> Result<Self, DeviceIdError> {
        if id.is_empty() {
            return Err(DeviceIdError::Empty);
        }

        if let Some(c) = id
            .chars()
            .find(|c| !c.is_ascii() || c.is_ascii_whitespace() || c.is_ascii_control())
        {
            return Err(DeviceIdError::InvalidChar(c));
        }

        let mut s = String::new();
        s.push_str(id).map_err(|_| DeviceIdError::TooLong)?;
        Ok(DeviceId(s))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum OutboundMessage<'a> {
    /// First message on every new connection
    Register(&'a DeviceId),
    /// Button still held, server repeats the last code it got from us
    Repeat(&'a DeviceId),
    /// A new code
    Code(&'a DeviceId, u64),
}

impl<'a> OutboundMessage<'a> {
    pub fn render(&self) -> String<MAX_MESSAGE_LEN> {
        let mut s = String::new();
        // Longest rendering is 9 + 32 bytes
        let _ = write!(s, "{}", self);
        s
    }
}

impl<'a> fmt::Display for OutboundMessage<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutboundMessage::Register(id) => write!(f, "register {}", id),
            OutboundMessage::Repeat(id) => write!(f, "{} repeat", id),
            OutboundMessage::Code(id, value) => write!(f, "{} {:x}", id, value),
        }
    }
}
