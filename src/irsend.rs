use std::convert::TryFrom;

use anyhow::{anyhow, Context};
use irbridge_shared::{IrCommand, TxProtocol};
use log::info;

use crate::link::SerialLink;

pub fn transmit(
    link: &mut SerialLink,
    protocol: &str,
    value: &str,
    bits: Option<u8>,
    repeat: Option<u8>,
) -> anyhow::Result<()> {
    let cmd = parse_command(protocol, value, bits, repeat)?;

    info!("Sending command: {:?}", cmd);

    link.transmit_blocking(&cmd)?;
    info!("Got ok");

    Ok(())
}

fn parse_command(
    protocol: &str,
    value: &str,
    bits: Option<u8>,
    repeat: Option<u8>,
) -> anyhow::Result<IrCommand> {
    let protocol = TxProtocol::try_from(protocol.to_ascii_lowercase().as_str())
        .map_err(|_| anyhow!("Unknown protocol: {}", protocol))?;

    let digits = value.trim_start_matches("0x").trim_start_matches("0X");
    let value = u64::from_str_radix(digits, 16)
        .with_context(|| format!("Invalid hex value: {}", value))?;

    Ok(IrCommand {
        protocol,
        value,
        bits,
        repeat,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_and_tags() {
        let cmd = parse_command("NEC", "0x20DF10EF", Some(32), None).unwrap();
        assert_eq!(cmd.protocol, TxProtocol::Nec);
        assert_eq!(cmd.value, 0x20df_10ef);
        assert_eq!(cmd.bits, Some(32));
        assert_eq!(cmd.repeat, None);

        let cmd = parse_command("2", "1a2b3c", None, Some(3)).unwrap();
        assert_eq!(cmd.protocol, TxProtocol::RcMm);
        assert_eq!(cmd.value, 0x1a2b3c);
        assert_eq!(cmd.repeat, Some(3));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse_command("sony", "1", None, None).is_err());
        assert!(parse_command("rc5", "xyz", None, None).is_err());
        assert!(parse_command("rc5", "1ffffffffffffffff", None, None).is_err());
    }
}
