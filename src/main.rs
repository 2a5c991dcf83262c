//! Conferencing relay server binary
//!
//! Run with: confab-server [BIND_ADDR]
//!
//! Examples:
//!   confab-server                     # binds to 127.0.0.1:8888
//!   confab-server localhost:9000      # binds to 127.0.0.1:9000
//!   confab-server 0.0.0.0:8888        # binds to 0.0.0.0:8888

use std::net::SocketAddr;
use std::sync::Arc;

use confab::{ControlServer, ServerConfig};

/// Parse bind address from command line argument.
///
/// Accepts "IP:PORT", a bare IP (default port 8888), or "localhost" forms.
fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
    const DEFAULT_PORT: u16 = 8888;

    let normalized = arg.replace("localhost", "127.0.0.1");

    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }
    if let Ok(ip) = normalized.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    Err(format!(
        "Invalid bind address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

fn print_usage() {
    eprintln!("Usage: confab-server [BIND_ADDR]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  BIND_ADDR    Address to bind to (default: 127.0.0.1:8888)");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let bind_addr = match args.get(1) {
        Some(addr_str) => match parse_bind_addr(addr_str) {
            Ok(addr) => addr,
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        },
        None => "127.0.0.1:8888".parse()?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("confab=info".parse()?),
        )
        .init();

    let config = ServerConfig::with_addr(bind_addr);
    let server = Arc::new(ControlServer::bind(config).await?);
    tracing::info!(addr = %bind_addr, "conferencing relay started");

    tokio::select! {
        result = Arc::clone(&server).run() => {
            if let Err(e) = result {
                eprintln!("Server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
        }
    }

    Ok(())
}
