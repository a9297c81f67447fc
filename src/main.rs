//! tls-echo: a TLS-terminating TCP echo server
//!
//! Accepts TLS connections and echoes every message back behind a fixed
//! acknowledgment prefix until the client sends `quit` or disconnects.

use tls_echo::config::Config;
use tls_echo::server::Server;
use tls_echo::tls::{ServerTlsContext, TlsVersion};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    // A client vanishing mid-write must not take the process down.
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_IGN);
    }

    let min_version: TlsVersion = config.min_tls_version.parse()?;

    // Any failure from here to bind is fatal to startup and nowhere else.
    let mut builder = ServerTlsContext::builder()
        .min_version(min_version)
        .cipher_list(&config.cipher_list)?;

    if let (Some(cert), Some(key)) = (&config.cert, &config.key) {
        builder = builder.cert_file(cert)?.key_file(key)?;
    } else {
        info!("No certificate configured, using built-in self-signed pair");
    }

    let ctx = builder.build()?;

    let server = Server::bind(&config.listen, ctx)?;
    info!(
        address = %server.local_addr()?,
        min_version = min_version.as_str(),
        "TLS echo server listening"
    );

    server.run()?;
    Ok(())
}
