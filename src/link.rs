use std::io::{self, Read, Write};
use std::path::Path;
use std::time::{Duration, Instant};

use irbridge_shared::protocol::{Command, Info, ReceiverConfig, Reply};
use irbridge_shared::{DecodedSignal, IrCommand, IrDecoder, IrTransmitter};
use log::{debug, info, trace, warn};
use postcard::{from_bytes_cobs, to_stdvec_cobs};
use serialport::{SerialPort, SerialPortInfo};
use thiserror::Error;

/// Replies larger than this mean we lost sync with the transceiver
const MAX_FRAME: usize = 256;
const READ_TIMEOUT: Duration = Duration::from_millis(10);
const REPLY_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("serial port: {0}")]
    Serial(#[from] serialport::Error),
    #[error("io: {0}")]
    Io(#[from] io::Error),
    #[error("encoding: {0}")]
    Encoding(#[from] postcard::Error),
    #[error("unexpected reply: {0:?}")]
    UnexpectedReply(Reply),
    #[error("no reply from transceiver")]
    Timeout,
}

/// Zero delimited COBS frames from the transceiver
#[derive(Default)]
pub struct ReplyBuffer {
    buf: Vec<u8>,
}

impl ReplyBuffer {
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Next complete reply, skipping frames that don't decode
    pub fn next_reply(&mut self) -> Option<Reply> {
        while let Some(end) = self.buf.iter().position(|&b| b == 0) {
            let mut frame: Vec<u8> = self.buf.drain(..=end).collect();
            frame.pop();

            if frame.is_empty() {
                continue;
            }

            match from_bytes_cobs::<Reply>(&mut frame) {
                Ok(reply) => return Some(reply),
                Err(err) => debug!("Dropping undecodable frame: {}", err),
            }
        }

        if self.buf.len() > MAX_FRAME {
            debug!("Discarding {} bytes without a delimiter", self.buf.len());
            self.buf.clear();
        }

        None
    }
}

/// Serial connection to the IR transceiver
pub struct SerialLink {
    port: Box<dyn SerialPort>,
    rx: ReplyBuffer,
}

impl SerialLink {
    pub fn list_ports() -> Result<Vec<SerialPortInfo>, serialport::Error> {
        serialport::available_ports()
    }

    pub fn open<P: AsRef<Path>>(path: P, baud_rate: u32) -> Result<Self, LinkError> {
        let path = path.as_ref().to_string_lossy();
        let port = serialport::new(path, baud_rate)
            .timeout(READ_TIMEOUT)
            .open()?;

        Ok(SerialLink {
            port,
            rx: ReplyBuffer::default(),
        })
    }

    pub fn send_command(&mut self, cmd: &Command) -> Result<(), LinkError> {
        write_command(self.port.as_mut(), cmd)
    }

    /// Whatever reply is already buffered, without waiting
    pub fn poll_reply(&mut self) -> Result<Option<Reply>, LinkError> {
        pull(self.port.as_mut(), &mut self.rx)?;
        Ok(self.rx.next_reply())
    }

    pub fn read_reply(&mut self, timeout: Duration) -> Result<Reply, LinkError> {
        let start = Instant::now();

        loop {
            if let Some(reply) = self.poll_reply()? {
                return Ok(reply);
            }

            if start.elapsed() > timeout {
                return Err(LinkError::Timeout);
            }

            std::thread::sleep(Duration::from_millis(1));
        }
    }

    pub fn reply_ok(&mut self) -> Result<(), LinkError> {
        match self.read_reply(REPLY_TIMEOUT)? {
            Reply::Ok => Ok(()),
            other => Err(LinkError::UnexpectedReply(other)),
        }
    }

    pub fn info(&mut self) -> Result<Info, LinkError> {
        self.send_command(&Command::Info)?;
        expect_info(self.read_reply(REPLY_TIMEOUT)?)
    }

    /// Check the transceiver answers, push receiver tuning and start
    /// reporting captures
    pub fn start_capture(&mut self, config: &ReceiverConfig) -> Result<(), LinkError> {
        let info = self.info()?;
        info!(
            "Transceiver firmware {}, transmitters {:#b}",
            info.version, info.transmitters
        );

        self.send_command(&Command::Configure(*config))?;
        self.reply_ok()?;
        self.send_command(&Command::Capture)?;
        self.reply_ok()
    }

    /// Transmit and wait for the transceiver to acknowledge
    pub fn transmit_blocking(&mut self, cmd: &IrCommand) -> Result<(), LinkError> {
        self.send_command(&Command::Transmit(*cmd))?;
        self.reply_ok()
    }

    /// Separate halves so the decoder and transmitter can be owned apart
    pub fn split(self) -> Result<(LinkReceiver, LinkSender), LinkError> {
        let tx = self.port.try_clone()?;

        Ok((
            LinkReceiver {
                port: self.port,
                rx: self.rx,
                health: ReadHealth::default(),
            },
            LinkSender { port: tx },
        ))
    }
}

fn expect_info(reply: Reply) -> Result<Info, LinkError> {
    match reply {
        Reply::Info { info } => Ok(info),
        other => Err(LinkError::UnexpectedReply(other)),
    }
}

fn write_command(port: &mut dyn SerialPort, cmd: &Command) -> Result<(), LinkError> {
    let req = to_stdvec_cobs(cmd)?;
    trace!("Sending {:?} ({} bytes)", cmd, req.len());
    port.write_all(&req)?;
    Ok(())
}

fn pull(port: &mut dyn SerialPort, rx: &mut ReplyBuffer) -> Result<(), LinkError> {
    let pending = port.bytes_to_read()? as usize;
    if pending == 0 {
        return Ok(());
    }

    let mut buf = vec![0; pending];
    match port.read(&mut buf) {
        Ok(n) => rx.extend(&buf[..n]),
        Err(ref e) if e.kind() == io::ErrorKind::TimedOut => (),
        Err(e) => return Err(e.into()),
    }

    Ok(())
}

/// Tracks whether reads from the port keep failing, so an unplugged
/// transceiver warns once instead of on every poll
#[derive(Default)]
struct ReadHealth {
    failing: bool,
}

impl ReadHealth {
    /// Returns true when the port went from working to failing or back
    fn report(&mut self, result: Result<(), LinkError>) -> bool {
        match result {
            Ok(()) if self.failing => {
                info!("Reading from transceiver works again");
                self.failing = false;
                true
            }
            Ok(()) => false,
            Err(err) if self.failing => {
                trace!("Reading from transceiver still failing: {}", err);
                false
            }
            Err(err) => {
                warn!("Reading from transceiver failed: {}", err);
                self.failing = true;
                true
            }
        }
    }
}

/// Decoder half of the link
pub struct LinkReceiver {
    port: Box<dyn SerialPort>,
    rx: ReplyBuffer,
    health: ReadHealth,
}

impl IrDecoder for LinkReceiver {
    fn poll(&mut self) -> Option<DecodedSignal> {
        let result = pull(self.port.as_mut(), &mut self.rx);
        self.health.report(result);

        while let Some(reply) = self.rx.next_reply() {
            match reply {
                Reply::Decoded(signal) => return Some(signal),
                other => trace!("Ignoring {:?}", other),
            }
        }

        None
    }
}

/// Transmitter half of the link. Doesn't wait for the acknowledgement, the
/// receiver half drops it.
pub struct LinkSender {
    port: Box<dyn SerialPort>,
}

impl IrTransmitter for LinkSender {
    type Error = LinkError;

    fn transmit(&mut self, cmd: &IrCommand) -> Result<(), LinkError> {
        write_command(self.port.as_mut(), &Command::Transmit(*cmd))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use irbridge_shared::ProtocolId;

    fn encoded(reply: &Reply) -> Vec<u8> {
        to_stdvec_cobs(reply).unwrap()
    }

    #[test]
    fn replies_split_across_reads() {
        let signal = DecodedSignal::new(ProtocolId::Nec, 0x20df_10ef, 32);
        let mut bytes = encoded(&Reply::Ok);
        bytes.extend(encoded(&Reply::Decoded(signal)));

        let mut rx = ReplyBuffer::default();
        let (a, b) = bytes.split_at(bytes.len() - 3);

        rx.extend(a);
        assert_eq!(rx.next_reply(), Some(Reply::Ok));
        assert_eq!(rx.next_reply(), None);

        rx.extend(b);
        assert_eq!(rx.next_reply(), Some(Reply::Decoded(signal)));
        assert_eq!(rx.next_reply(), None);
    }

    #[test]
    fn garbage_is_skipped() {
        let info = Reply::Info {
            info: Info {
                version: 1,
                transmitters: 0b1,
            },
        };

        let mut rx = ReplyBuffer::default();
        rx.extend(&[0x00, 0x05, 0xff, 0xff, 0x00]);
        rx.extend(&encoded(&info));

        assert_eq!(rx.next_reply(), Some(info));
    }

    #[test]
    fn runaway_frame_is_dropped() {
        let mut rx = ReplyBuffer::default();
        rx.extend(&[0x01; MAX_FRAME + 1]);
        assert_eq!(rx.next_reply(), None);

        rx.extend(&encoded(&Reply::Ok));
        assert_eq!(rx.next_reply(), Some(Reply::Ok));
    }

    #[test]
    fn info_reply_is_required() {
        let mut rx = ReplyBuffer::default();
        rx.extend(&encoded(&Reply::Info {
            info: Info {
                version: 3,
                transmitters: 0b101,
            },
        }));

        let info = expect_info(rx.next_reply().unwrap()).unwrap();
        assert_eq!(info.version, 3);
        assert_eq!(info.transmitters, 0b101);

        assert!(matches!(
            expect_info(Reply::Ok),
            Err(LinkError::UnexpectedReply(Reply::Ok))
        ));
    }

    #[test]
    fn info_request_is_one_frame() {
        let bytes = to_stdvec_cobs(&Command::Info).unwrap();
        assert_eq!(bytes.iter().position(|&b| b == 0), Some(bytes.len() - 1));
    }

    #[test]
    fn dead_port_warns_once() {
        let broken = || -> Result<(), LinkError> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged").into())
        };
        let mut health = ReadHealth::default();

        assert!(!health.report(Ok(())));
        assert!(health.report(broken()));
        for _ in 0..1000 {
            assert!(!health.report(broken()));
        }

        // Recovery is reported once, and a new failure warns again
        assert!(health.report(Ok(())));
        assert!(!health.report(Ok(())));
        assert!(health.report(broken()));
    }

    #[test]
    fn commands_are_delimited() {
        let cmd = Command::Transmit(IrCommand {
            protocol: irbridge_shared::TxProtocol::Rc5,
            value: 0x0c,
            bits: Some(13),
            repeat: None,
        });
        let bytes = to_stdvec_cobs(&cmd).unwrap();

        assert_eq!(bytes.last(), Some(&0));
        assert_eq!(bytes.iter().filter(|&&b| b == 0).count(), 1);
    }
}
