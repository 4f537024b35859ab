//! The bridge loop body. Each tick services inbound commands first, then
//! polls the decoder once.

use core::fmt::Debug;

use heapless::Vec;
use log::{debug, info, trace, warn};

use crate::frame::{deframe, Revision, MAX_FRAME_LEN};
use crate::message::OutboundMessage;
use crate::protocol::{DecodedSignal, IrCommand};
use crate::session::{Session, Transport};

/// Source of decoded infrared captures
pub trait IrDecoder {
    /// Never blocks. `None` when nothing new was captured.
    fn poll(&mut self) -> Option<DecodedSignal>;
}

/// Emits infrared commands
pub trait IrTransmitter {
    type Error: Debug;

    fn transmit(&mut self, cmd: &IrCommand) -> Result<(), Self::Error>;
}

/// What happened to the capture polled this tick
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CaptureOutcome {
    /// Decoder had nothing
    Idle,
    /// Overflow or unknown protocol
    Discarded,
    /// Couldn't reach the server, signal dropped
    Offline,
    Forwarded,
    SendFailed,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TickReport {
    pub transmitted: Option<IrCommand>,
    pub capture: CaptureOutcome,
}

pub struct Bridge<'h, T, D, X> {
    session: Session<'h, T>,
    decoder: D,
    transmitter: X,
    revision: Revision,
}

impl<'h, T, D, X> Bridge<'h, T, D, X>
where
    T: Transport,
    D: IrDecoder,
    X: IrTransmitter,
{
    pub fn new(session: Session<'h, T>, decoder: D, transmitter: X, revision: Revision) -> Self {
        Bridge {
            session,
            decoder,
            transmitter,
            revision,
        }
    }

    pub fn session(&self) -> &Session<'h, T> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session<'h, T> {
        &mut self.session
    }

    pub fn decoder_mut(&mut self) -> &mut D {
        &mut self.decoder
    }

    pub fn transmitter(&self) -> &X {
        &self.transmitter
    }

    pub fn into_parts(self) -> (Session<'h, T>, D, X) {
        (self.session, self.decoder, self.transmitter)
    }

    pub fn tick(&mut self) -> TickReport {
        let transmitted = self.service_commands();
        let capture = self.service_capture();

        TickReport {
            transmitted,
            capture,
        }
    }

    /// Read everything the server has sent as one command and transmit it.
    pub fn service_commands(&mut self) -> Option<IrCommand> {
        if !self.session.is_connected() {
            return None;
        }

        let transport = self.session.transport_mut();
        if transport.available() == 0 {
            return None;
        }

        let mut frame: Vec<u8, MAX_FRAME_LEN> = Vec::new();
        let mut overflow = 0;
        let mut chunk = [0u8; MAX_FRAME_LEN];

        while transport.available() > 0 {
            let n = transport.read(&mut chunk);
            if n == 0 {
                break;
            }

            for &b in &chunk[..n] {
                if frame.push(b).is_err() {
                    overflow += 1;
                }
            }
        }

        if overflow > 0 {
            debug!("Dropped {} bytes past the end of the frame", overflow);
        }

        let cmd = match deframe(self.revision, &frame) {
            Ok(cmd) => cmd,
            Err(err) => {
                debug!("Ignoring command {:02x?}: {}", &frame[..], err);
                return None;
            }
        };

        info!(
            "Transmit {:?} value: {:#x} bits: {:?} repeat: {:?}",
            cmd.protocol, cmd.value, cmd.bits, cmd.repeat
        );

        match self.transmitter.transmit(&cmd) {
            Ok(()) => Some(cmd),
            Err(err) => {
                warn!("Transmit failed: {:?}", err);
                None
            }
        }
    }

    /// Poll the decoder once and forward what qualifies.
    pub fn service_capture(&mut self) -> CaptureOutcome {
        let signal = match self.decoder.poll() {
            Some(signal) => signal,
            None => return CaptureOutcome::Idle,
        };

        if !signal.is_forwardable() {
            trace!("Discarding {:?}", signal);
            return CaptureOutcome::Discarded;
        }

        debug!(
            "{:?} value: {:#x} bits: {} repeat: {}",
            signal.protocol, signal.value, signal.bits, signal.repeat
        );

        if !self.session.ensure_connected() {
            return CaptureOutcome::Offline;
        }

        let device_id = self.session.device_id().clone();
        let msg = if signal.repeat {
            OutboundMessage::Repeat(&device_id)
        } else {
            OutboundMessage::Code(&device_id, signal.value)
        };

        if self.session.send(&msg) {
            CaptureOutcome::Forwarded
        } else {
            CaptureOutcome::SendFailed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::vec::Vec as StdVec;

    use crate::message::DeviceId;
    use crate::protocol::{ProtocolId, TxProtocol};
    use crate::session::tests::FakeTransport;

    #[derive(Default)]
    struct Captures(VecDeque<DecodedSignal>);

    impl IrDecoder for Captures {
        fn poll(&mut self) -> Option<DecodedSignal> {
            self.0.pop_front()
        }
    }

    #[derive(Default)]
    struct Sent(StdVec<IrCommand>);

    impl IrTransmitter for Sent {
        type Error = ();

        fn transmit(&mut self, cmd: &IrCommand) -> Result<(), ()> {
            self.0.push(*cmd);
            Ok(())
        }
    }

    fn bridge(transport: FakeTransport) -> Bridge<'static, FakeTransport, Captures, Sent> {
        let session = Session::new(transport, "localhost", 10765, DeviceId::new("1").unwrap());
        Bridge::new(session, Captures::default(), Sent::default(), Revision::Extended)
    }

    #[test]
    fn oversized_frame_is_truncated() {
        let mut b = bridge(FakeTransport::default());
        assert!(b.session_mut().ensure_connected());

        let mut bytes = [0xEEu8; 16];
        bytes[0] = 1;
        bytes[1] = 0;
        bytes[2] = 13;
        b.session_mut().transport_mut().push_inbound(&bytes);

        let cmd = b.service_commands().unwrap();
        assert_eq!(cmd.protocol, TxProtocol::Rc5);
        assert_eq!(cmd.value, 0xEEEE_EEEE_EEEE_EEEE);
        assert_eq!(b.session_mut().transport_mut().available(), 0);
    }

    #[test]
    fn commands_need_a_connection() {
        let mut b = bridge(FakeTransport::default());
        b.session_mut()
            .transport_mut()
            .push_inbound(&[0, 0, 32, 1, 2, 3, 4]);

        assert_eq!(b.service_commands(), None);
        assert_eq!(b.session().transport().connect_attempts, 0);
        assert!(b.transmitter().0.is_empty());
    }

    #[test]
    fn capture_connects_lazily() {
        let mut b = bridge(FakeTransport::default());
        b.decoder_mut()
            .0
            .push_back(DecodedSignal::new(ProtocolId::Nec, 0x1A2B3C, 32));

        assert_eq!(b.service_capture(), CaptureOutcome::Forwarded);
        assert_eq!(b.session().transport().sent, vec!["register 1", "1 1a2b3c"]);
        assert_eq!(b.service_capture(), CaptureOutcome::Idle);
    }
}
