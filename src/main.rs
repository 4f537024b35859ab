use std::path::PathBuf;

use structopt::StructOpt;

mod capture;
mod config;
mod irsend;
mod link;
mod run;
mod transport;

use crate::config::{CliCommand, Config, Opt, BAUD_RATE};
use crate::link::SerialLink;

fn main() -> anyhow::Result<()> {
    let opt = Opt::from_args();

    let loglevel = if opt.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(loglevel)).init();

    let baud = opt.baud.unwrap_or(BAUD_RATE);

    let path_serialport = if let Some(path) = opt.serial {
        path
    } else {
        SerialLink::list_ports()
            .ok()
            .and_then(|ports| ports.first().map(|port| PathBuf::from(&port.port_name)))
            .unwrap_or_else(|| PathBuf::from("/dev/ttyACM0"))
    };

    match opt.cmd {
        CliCommand::Run(bridge_opt) => {
            let config = Config::from_opt(&bridge_opt)?;
            let link = SerialLink::open(&path_serialport, baud)?;
            run::command_run(link, &config)
        }
        CliCommand::Capture(receiver_opt) => {
            let receiver = receiver_opt.receiver_config()?;
            let link = SerialLink::open(&path_serialport, baud)?;
            capture::command_capture(link, &receiver, opt.debug)
        }
        CliCommand::Transmit {
            protocol,
            value,
            bits,
            repeat,
        } => {
            let mut link = SerialLink::open(&path_serialport, baud)?;
            irsend::transmit(&mut link, &protocol, &value, bits, repeat)
        }
        CliCommand::Ports => {
            for port in SerialLink::list_ports()? {
                println!("{}\t{:?}", port.port_name, port.port_type);
            }
            Ok(())
        }
    }
}
