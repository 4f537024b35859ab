use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use irbridge_shared::Transport;
use log::{debug, trace};

/// Server connection over TCP.
///
/// Connecting blocks, everything after that is non-blocking. Pending bytes
/// are pulled into `rx` so `available` can report them.
pub struct TcpTransport {
    stream: Option<TcpStream>,
    rx: Vec<u8>,
    connect_timeout: Duration,
}

impl TcpTransport {
    pub fn new(connect_timeout: Duration) -> Self {
        TcpTransport {
            stream: None,
            rx: Vec::new(),
            connect_timeout,
        }
    }

    fn disconnect(&mut self) {
        if self.stream.take().is_some() {
            debug!("Dropping server connection");
        }
    }

    /// Drain what the socket has without blocking
    fn fill(&mut self) {
        let mut buf = [0u8; 256];

        loop {
            let stream = match self.stream.as_mut() {
                Some(stream) => stream,
                None => return,
            };

            match stream.read(&mut buf) {
                Ok(0) => {
                    debug!("Server closed the connection");
                    self.disconnect();
                    return;
                }
                Ok(n) => {
                    trace!("Received {} bytes", n);
                    self.rx.extend_from_slice(&buf[..n]);
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!("Read failed: {}", e);
                    self.disconnect();
                    return;
                }
            }
        }
    }
}

impl Transport for TcpTransport {
    type Error = io::Error;

    fn connect(&mut self, host: &str, port: u16) -> io::Result<()> {
        self.disconnect();
        self.rx.clear();

        let mut last_err = None;

        for addr in (host, port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => {
                    stream.set_nonblocking(true)?;
                    self.stream = Some(stream);
                    return Ok(());
                }
                Err(e) => last_err = Some(e),
            }
        }

        Err(last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} did not resolve to any address", host),
            )
        }))
    }

    fn is_connected(&mut self) -> bool {
        self.fill();
        self.stream.is_some()
    }

    fn set_nodelay(&mut self, nodelay: bool) -> io::Result<()> {
        self.stream
            .as_ref()
            .ok_or(io::ErrorKind::NotConnected)?
            .set_nodelay(nodelay)
    }

    fn available(&mut self) -> usize {
        self.fill();
        self.rx.len()
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.rx.len());
        buf[..n].copy_from_slice(&self.rx[..n]);
        self.rx.drain(..n);
        n
    }

    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        let stream = self.stream.as_mut().ok_or(io::ErrorKind::NotConnected)?;

        let mut written = 0;
        while written < data.len() {
            match stream.write(&data[written..]) {
                Ok(0) => {
                    self.disconnect();
                    return Err(io::ErrorKind::WriteZero.into());
                }
                Ok(n) => written += n,
                // Server isn't reading. Never wait on it, the message is dropped.
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if written > 0 {
                        debug!("Send buffer full mid message, dropping connection");
                        self.disconnect();
                    }
                    return Err(io::ErrorKind::WouldBlock.into());
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.disconnect();
                    return Err(e);
                }
            }
        }

        Ok(())
    }
}
