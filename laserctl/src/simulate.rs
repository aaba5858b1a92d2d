//! Simulated controller backend
//!
//! Every open of [`SIMULATED_PATH`] gets a fresh in-memory pipe with a
//! virtual controller on the far end.

use std::io;
use std::sync::Arc;

use laser_detect::StaticDiscovery;
use laser_link::{BoxedTransport, FnOpener, LaserLink, LineConfig, LinkConfig};
use laser_sim::{run_virtual_controller_task, VirtualController};
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};

/// Device path of the simulated controller
pub const SIMULATED_PATH: &str = "sim://controller";

/// Name the simulated controller is listed under
pub const SIMULATED_NAME: &str = "Virtual Controller";

fn open_simulated(path: &str, _line: &LineConfig) -> io::Result<BoxedTransport> {
    if path != SIMULATED_PATH {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("no simulated device at {}", path),
        ));
    }

    let (ours, theirs) = tokio::io::duplex(1024);
    let (cmd_tx, cmd_rx) = mpsc::channel(8);
    let (state_tx, _) = broadcast::channel(16);

    tokio::spawn(async move {
        // The task stops once its command channel closes
        let _cmd_tx = cmd_tx;
        let controller = VirtualController::new(SIMULATED_NAME);
        if let Err(e) = run_virtual_controller_task(theirs, controller, cmd_rx, state_tx).await {
            warn!("Simulated controller failed: {}", e);
        }
    });

    info!("Opened simulated controller at {}", path);
    Ok(Box::new(ours))
}

/// Link engine talking to a simulated controller
pub fn simulated_link(config: LinkConfig) -> LaserLink {
    let discovery = StaticDiscovery::new().with_device(SIMULATED_NAME, SIMULATED_PATH);
    LaserLink::spawn(config, Arc::new(FnOpener::new(open_simulated)), Arc::new(discovery))
}
