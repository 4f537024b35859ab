use std::path::PathBuf;
use std::time::Duration;

use irbridge_shared::message::DeviceIdError;
use irbridge_shared::protocol::ReceiverConfig;
use irbridge_shared::{DeviceId, Revision};
use structopt::StructOpt;
use thiserror::Error;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 10765;
pub const DEFAULT_DEVICE_ID: &str = "1";

/// GPIO the IR demodulator is wired to
pub const RECV_PIN: u16 = 14;
/// GPIO driving the IR led
pub const SEND_PIN: u16 = 4;
/// Large enough for air conditioner remotes
pub const CAPTURE_BUFFER_SIZE: u16 = 1024;
/// Gap in ms that ends a capture. Much higher and repeats get swallowed.
pub const CAPTURE_TIMEOUT_MS: u8 = 15;
/// Unknown captures shorter than this are treated as noise
pub const MIN_UNKNOWN_SIZE: u16 = 12;
pub const TOLERANCE_PERCENT: u8 = 25;

pub const BAUD_RATE: u32 = 115_200;
pub const CONNECT_TIMEOUT_MS: u64 = 5_000;
pub const POLL_INTERVAL_MS: u64 = 1;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid device id: {0}")]
    DeviceId(DeviceIdError),
    #[error("server port must not be zero")]
    Port,
    #[error("tolerance must be below 100%, got {0}%")]
    Tolerance(u8),
    #[error("capture buffer must hold at least {min} pulses, got {got}")]
    CaptureBuffer { min: u16, got: u16 },
}

#[derive(Debug, StructOpt)]
#[structopt(name = "irbridge", about = "Bridge an infrared transceiver to a remote server")]
pub struct Opt {
    /// Serial device of the IR transceiver. Defaults to the first port found
    #[structopt(long = "device", parse(from_os_str))]
    pub serial: Option<PathBuf>,
    /// Serial baud rate [default: 115200]
    #[structopt(long)]
    pub baud: Option<u32>,
    #[structopt(short, long)]
    pub debug: bool,
    #[structopt(subcommand)]
    pub cmd: CliCommand,
}

#[derive(StructOpt, Debug)]
pub enum CliCommand {
    /// Forward captures to the server and transmit its commands
    Run(BridgeOpt),
    /// Print decoded captures without connecting anywhere
    Capture(ReceiverOpt),
    /// Transmit one command
    Transmit {
        /// nec rc5 rcmm, or the wire tag 0 1 2
        protocol: String,
        /// Value in hex
        value: String,
        #[structopt(long)]
        bits: Option<u8>,
        #[structopt(long)]
        repeat: Option<u8>,
    },
    /// List serial ports
    Ports,
}

/// Unset options fall back to the constants above
#[derive(StructOpt, Debug, Default, Clone)]
pub struct BridgeOpt {
    /// Server host [default: 127.0.0.1]
    #[structopt(long)]
    pub host: Option<String>,
    /// Server port [default: 10765]
    #[structopt(long)]
    pub port: Option<u16>,
    /// Identifier this unit registers with [default: 1]
    #[structopt(long = "id")]
    pub device_id: Option<String>,
    /// Speak the old tag + value command framing
    #[structopt(long)]
    pub legacy_framing: bool,
    #[structopt(long)]
    pub connect_timeout_ms: Option<u64>,
    #[structopt(long)]
    pub poll_interval_ms: Option<u64>,
    #[structopt(flatten)]
    pub receiver: ReceiverOpt,
}

#[derive(StructOpt, Debug, Default, Clone)]
pub struct ReceiverOpt {
    #[structopt(long)]
    pub recv_pin: Option<u16>,
    #[structopt(long)]
    pub send_pin: Option<u16>,
    #[structopt(long)]
    pub capture_buffer: Option<u16>,
    /// Inter-pulse timeout in ms
    #[structopt(long)]
    pub capture_timeout: Option<u8>,
    #[structopt(long)]
    pub min_unknown_size: Option<u16>,
    /// Timing tolerance in percent
    #[structopt(long)]
    pub tolerance: Option<u8>,
}

impl ReceiverOpt {
    pub fn receiver_config(&self) -> Result<ReceiverConfig, ConfigError> {
        let config = ReceiverConfig {
            recv_pin: self.recv_pin.unwrap_or(RECV_PIN),
            send_pin: self.send_pin.unwrap_or(SEND_PIN),
            capture_buffer_size: self.capture_buffer.unwrap_or(CAPTURE_BUFFER_SIZE),
            timeout_ms: self.capture_timeout.unwrap_or(CAPTURE_TIMEOUT_MS),
            min_unknown_size: self.min_unknown_size.unwrap_or(MIN_UNKNOWN_SIZE),
            tolerance_percent: self.tolerance.unwrap_or(TOLERANCE_PERCENT),
        };

        if config.tolerance_percent >= 100 {
            return Err(ConfigError::Tolerance(config.tolerance_percent));
        }

        if config.capture_buffer_size < config.min_unknown_size {
            return Err(ConfigError::CaptureBuffer {
                min: config.min_unknown_size,
                got: config.capture_buffer_size,
            });
        }

        Ok(config)
    }
}

/// Validated settings for the bridge loop
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub device_id: DeviceId,
    pub revision: Revision,
    pub connect_timeout: Duration,
    pub poll_interval: Duration,
    pub receiver: ReceiverConfig,
}

impl Config {
    pub fn from_opt(opt: &BridgeOpt) -> Result<Self, ConfigError> {
        let port = opt.port.unwrap_or(DEFAULT_PORT);
        if port == 0 {
            return Err(ConfigError::Port);
        }

        let device_id = opt.device_id.as_deref().unwrap_or(DEFAULT_DEVICE_ID);
        let device_id = DeviceId::new(device_id).map_err(ConfigError::DeviceId)?;

        let revision = if opt.legacy_framing {
            Revision::Minimal
        } else {
            Revision::Extended
        };

        Ok(Config {
            host: opt.host.clone().unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            device_id,
            revision,
            connect_timeout: Duration::from_millis(
                opt.connect_timeout_ms.unwrap_or(CONNECT_TIMEOUT_MS),
            ),
            poll_interval: Duration::from_millis(opt.poll_interval_ms.unwrap_or(POLL_INTERVAL_MS)),
            receiver: opt.receiver.receiver_config()?,
        })
    }
}
