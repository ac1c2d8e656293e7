/// SIM900 Demo
///
/// This program demonstrates basic usage of the sim900 library: open a
/// connection (or fall back to simulation), scan the ports, bind the module
/// drivers and show transport statistics.

use anyhow::Result;
use sim900::utils::format;
use sim900::{
    Connection, LinkConfig, OpenOutcome, OperationTimer, PerformanceMetrics, Port, Sim922, Sim970,
};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    println!("🚀 SIM900 Mainframe Demo");
    println!("========================");

    let resource = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/dev/ttyUSB0".to_string());

    println!("Opening mainframe on {}...", resource);

    let conn = Connection::open(&resource, LinkConfig::default()).await?;

    match conn.outcome() {
        OpenOutcome::Connected { identity } => {
            println!("✅ Connected: {}", identity);
        }
        OpenOutcome::Simulated => {
            println!("⚠️  No mainframe found; running in simulation mode");
            println!("   (every query answers with neutral values)");
        }
    }

    println!("\n🔍 Scanning ports...");
    let timer = OperationTimer::start("port scan");
    let scan = conn.scan_ports().await?;
    timer.stop_and_log(true);
    print!("{}", scan);
    println!("Modules present: {}", scan.present_count());

    let mut metrics = PerformanceMetrics::new();

    // Bind a driver for each module this library knows about.
    for port in scan.present_ports() {
        let handle = match sim900::ModuleHandle::bind(&conn, port).await {
            Ok(handle) => handle,
            Err(e) => {
                println!("❌ Bind failed on port {}: {}", port, e);
                continue;
            }
        };

        match handle.identity() {
            Sim922::MODEL => {
                println!("\n🌡️  SIM922 thermometer on port {}", port);
                let thermometer = Sim922::from_handle(handle)?;
                match thermometer.excitations().await {
                    Ok(states) => {
                        for (channel, on) in (1..=4).zip(states) {
                            println!(
                                "   Channel {} excitation: {}",
                                channel,
                                if on { "ON" } else { "OFF" }
                            );
                        }
                    }
                    Err(e) => println!("❌ Failed to read excitations: {}", e),
                }
            }
            Sim970::MODEL => {
                println!("\n📟 SIM970 voltmeter on port {}", port);
                let voltmeter = Sim970::from_handle(handle)?;
                if let Err(e) = voltmeter.set_message(1, "HELLO").await {
                    println!("❌ Failed to set display message: {}", e);
                } else {
                    println!("   Display line 1 set");
                }
            }
            other => {
                println!("\n❓ Unrecognized module {} on port {}", other, port);
            }
        }
    }

    // A raw exchange without a driver, straight through a port. In
    // simulation mode this still exercises the full path.
    let port = scan
        .present_ports()
        .first()
        .copied()
        .unwrap_or(Port::new(1)?);
    let timer = OperationTimer::start("raw query");
    match conn.query_port(port, "*IDN?", None).await {
        Ok(reply) => {
            metrics.record_success(timer.stop());
            println!("\n🔁 Raw query on port {}: {:?}", port, reply);
        }
        Err(e) => {
            metrics.record_failure(timer.stop());
            println!("\n❌ Raw query on port {} failed: {}", port, e);
        }
    }

    println!("\n{}", format::format_metrics(&metrics));

    // Show transport statistics
    let stats = conn.stats().await;
    println!("\n📊 Transport Statistics:");
    println!("   Writes sent: {}", stats.writes_sent);
    println!("   Replies received: {}", stats.replies_received);
    println!("   Errors: {}", stats.errors);
    println!("   Timeouts: {}", stats.timeouts);
    println!("   Bytes sent: {}", stats.bytes_sent);
    println!("   Bytes received: {}", stats.bytes_received);
    println!("   Session time: {:?}", conn.elapsed());

    if let Err(e) = conn.close().await {
        eprintln!("⚠️  Error closing connection: {}", e);
    } else {
        println!("\n✅ Connection closed");
    }

    println!("\n🎉 Demo completed!");

    Ok(())
}
