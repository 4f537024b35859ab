use core::fmt::Debug;

use log::{debug, info, warn};

use crate::message::{DeviceId, OutboundMessage};

/// Byte stream to the server
pub trait Transport {
    type Error: Debug;

    /// Blocks until connected or failed
    fn connect(&mut self, host: &str, port: u16) -> Result<(), Self::Error>;
    fn is_connected(&mut self) -> bool;
    /// Disable send coalescing (Nagle)
    fn set_nodelay(&mut self, nodelay: bool) -> Result<(), Self::Error>;
    /// Bytes that can be read without blocking
    fn available(&mut self) -> usize;
    /// Read up to `buf.len()` of the available bytes
    fn read(&mut self, buf: &mut [u8]) -> usize;
    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error>;
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// Owns the connection to the server and registers once per connection
pub struct Session<'h, T> {
    transport: T,
    host: &'h str,
    port: u16,
    device_id: DeviceId,
    state: ConnectionState,
    connects: u32,
}

impl<'h, T: Transport> Session<'h, T> {
    pub fn new(transport: T, host: &'h str, port: u16, device_id: DeviceId) -> Self {
        Session {
            transport,
            host,
            port,
            device_id,
            state: ConnectionState::Disconnected,
            connects: 0,
        }
    }

    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Successful connects so far
    pub fn connects(&self) -> u32 {
        self.connects
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Check the connection without trying to reconnect
    pub fn is_connected(&mut self) -> bool {
        if self.state == ConnectionState::Connected && !self.transport.is_connected() {
            info!("Connection to {}:{} lost", self.host, self.port);
            self.state = ConnectionState::Disconnected;
        }

        self.state == ConnectionState::Connected
    }

    /// Connect and register unless already connected.
    ///
    /// One attempt per call. Failure is not an error, the caller just skips
    /// whatever needed the connection and we try again next time.
    pub fn ensure_connected(&mut self) -> bool {
        if self.is_connected() {
            return true;
        }

        debug!("Connecting to {}:{}", self.host, self.port);

        if let Err(err) = self.transport.connect(self.host, self.port) {
            warn!("Connection to {}:{} failed: {:?}", self.host, self.port, err);
            return false;
        }

        info!("Connected to {}:{}", self.host, self.port);

        // Coalesced writes bunch up the repeats sent while a button is held
        if let Err(err) = self.transport.set_nodelay(true) {
            warn!("Failed to disable Nagle: {:?}", err);
        }

        self.state = ConnectionState::Connected;
        self.connects = self.connects.wrapping_add(1);

        let device_id = self.device_id.clone();
        self.send(&OutboundMessage::Register(&device_id))
    }

    /// Write one message. A failed write drops the session.
    pub fn send(&mut self, msg: &OutboundMessage<'_>) -> bool {
        if self.state != ConnectionState::Connected {
            return false;
        }

        let text = msg.render();
        debug!("Sending: {}", text);

        match self.transport.write(text.as_bytes()) {
            Ok(()) => true,
            Err(err) => {
                warn!("Send failed: {:?}", err);
                self.state = ConnectionState::Disconnected;
                false
            }
        }
    }
}
