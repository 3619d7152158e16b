use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use mdns_registry::{registry, responder, ServiceDescriptor};

/// Advertise a single service over Multicast DNS / DNS-SD.
///
/// Binds the mDNS multicast socket, announces the described service,
/// answers queries for it, and sends a goodbye on shutdown (Ctrl-C or
/// SIGTERM).
#[derive(Parser, Debug)]
#[command(name = "mdns-responder-demo", version, about)]
struct Args {
    /// Instance label, e.g. "service1".
    #[arg(long)]
    instance_name: String,

    /// Fully-qualified hostname to resolve for A/AAAA records, e.g.
    /// "myhost.local". Must resolve to both an IPv4 and an IPv6
    /// address via the host resolver (e.g. `/etc/hosts`).
    #[arg(long)]
    host_name: String,

    /// Service type, e.g. "_mdnstest._tcp".
    #[arg(long)]
    service_type: String,

    /// Domain the service is advertised under.
    #[arg(long, default_value = "local")]
    domain: String,

    /// Port the service listens on.
    #[arg(long)]
    port: u16,

    /// A `key=value` TXT record entry. May be given more than once.
    #[arg(long = "txt", value_parser = parse_txt_entry)]
    txt_entries: Vec<(String, String)>,
}

fn parse_txt_entry(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) => Ok((k.to_string(), v.to_string())),
        None => Err(format!("expected key=value, got '{s}'")),
    }
}

fn begin_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    begin_logging();

    let args = Args::parse();
    let descriptor = ServiceDescriptor {
        instance_name: args.instance_name,
        host_name: args.host_name,
        service_type: args.service_type,
        domain: args.domain,
        port: args.port,
        txt_entries: args.txt_entries,
    };

    let socket = match responder::bind() {
        Ok(socket) => Arc::new(socket),
        Err(e) => {
            tracing::error!(error = %e, "could not bind mDNS socket");
            return ExitCode::FAILURE;
        }
    };

    let multicast_addr =
        std::net::SocketAddr::from((responder::MULTICAST_ADDR, responder::MULTICAST_PORT));
    let handle = registry::spawn(Arc::clone(&socket), multicast_addr);

    tracing::info!(service = %descriptor, "registering service");
    if let Err(e) = handle.register(descriptor).await {
        tracing::error!(error = %e, "could not register service");
        return ExitCode::FAILURE;
    }

    if let Err(e) = responder::run(socket, handle).await {
        tracing::error!(error = %e, "responder loop exited with an error");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
