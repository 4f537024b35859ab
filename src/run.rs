use std::thread;

use irbridge_shared::{Bridge, CaptureOutcome, Session};
use log::{info, warn};

use crate::config::Config;
use crate::link::SerialLink;
use crate::transport::TcpTransport;

/// Run the bridge until killed
pub fn command_run(mut link: SerialLink, config: &Config) -> anyhow::Result<()> {
    link.start_capture(&config.receiver)?;
    let (receiver, sender) = link.split()?;

    let transport = TcpTransport::new(config.connect_timeout);
    let session = Session::new(transport, &config.host, config.port, config.device_id.clone());
    let mut bridge = Bridge::new(session, receiver, sender, config.revision);

    info!(
        "Bridging as {} to {}:{} ({:?} framing)",
        config.device_id, config.host, config.port, config.revision
    );

    // Connect at startup, after this only captures trigger a reconnect
    if !bridge.session_mut().ensure_connected() {
        warn!("Server not reachable, retrying on the next capture");
    }

    loop {
        let report = bridge.tick();

        if report.transmitted.is_none() && report.capture == CaptureOutcome::Idle {
            thread::sleep(config.poll_interval);
        }
    }
}
