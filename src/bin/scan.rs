/// SIM900 Port Scanner
///
/// One-shot discovery tool: open the mainframe, probe all eight ports and
/// print which slots hold modules.

use anyhow::Result;
use sim900::{Connection, LinkConfig, OpenOutcome};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let resource = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/dev/ttyUSB0".to_string());

    let conn = Connection::open(&resource, LinkConfig::default()).await?;

    match conn.outcome() {
        OpenOutcome::Connected { identity } => {
            println!("Mainframe on {}: {}", resource, identity);
        }
        OpenOutcome::Simulated => {
            println!(
                "No mainframe on {}; scanning in simulation mode (all ports will read Empty)",
                resource
            );
        }
    }

    let scan = conn.scan_ports().await?;
    print!("{}", scan);
    println!(
        "{} of {} ports occupied",
        scan.present_count(),
        sim900::NUM_PORTS
    );

    conn.close().await?;
    Ok(())
}
