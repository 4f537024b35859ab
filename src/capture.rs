use std::thread;
use std::time::Duration;

use irbridge_shared::protocol::ReceiverConfig;
use irbridge_shared::IrDecoder;
use log::info;

use crate::link::SerialLink;

/// Print what the transceiver decodes without forwarding anything
pub fn command_capture(
    mut link: SerialLink,
    config: &ReceiverConfig,
    verbose: bool,
) -> anyhow::Result<()> {
    link.start_capture(config)?;

    info!("Capturing");

    let (mut receiver, _sender) = link.split()?;

    loop {
        let signal = match receiver.poll() {
            Some(signal) => signal,
            None => {
                thread::sleep(Duration::from_millis(1));
                continue;
            }
        };

        if verbose {
            println!("{:?}", signal);
        }

        if signal.overflow {
            println!("Overflow, capture buffer too small");
        } else if !signal.is_forwardable() {
            println!("Unknown protocol");
        } else if signal.repeat {
            println!("{:?}\trepeat", signal.protocol);
        } else {
            println!(
                "{:?}\tValue: {:x}\tBits: {}",
                signal.protocol, signal.value, signal.bits
            );
        }
    }
}
