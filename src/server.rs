//! Accept loop
//!
//! Binds the listening socket and hands each accepted connection to its own
//! detached thread, where the TLS handshake and the echo session run in
//! full isolation from every other connection. The accept loop is the only
//! sequential point; it resumes accepting as soon as a connection is handed
//! off, and neither a failed accept nor a failed handshake terminates it.

use crate::echo::{EchoSession, SessionError, SessionOutcome};
use crate::tls::ServerTlsContext;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};

/// Listen backlog for pending connections.
const LISTEN_BACKLOG: i32 = 10;

/// TLS echo server: a bound listener plus the shared TLS context.
pub struct Server {
    listener: TcpListener,
    ctx: ServerTlsContext,
    active_sessions: Arc<AtomicUsize>,
}

impl Server {
    /// Bind the listening socket.
    ///
    /// The socket is created with `SO_REUSEADDR` set so the address can be
    /// rebound immediately after a restart.
    pub fn bind(addr: &str, ctx: ServerTlsContext) -> io::Result<Self> {
        let addr: SocketAddr = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, "listen address resolved to nothing")
            })?;

        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
        socket.set_reuse_address(true)?;
        socket.bind(&addr.into())?;
        socket.listen(LISTEN_BACKLOG)?;

        Ok(Server {
            listener: socket.into(),
            ctx,
            active_sessions: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Address the server is listening on.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Number of sessions currently running.
    pub fn active_sessions(&self) -> usize {
        self.active_sessions.load(Ordering::Relaxed)
    }

    /// Accept connections forever.
    ///
    /// A failed accept is logged and the loop continues; only a failed
    /// thread spawn drops the connection it was meant to serve.
    pub fn run(&self) -> io::Result<()> {
        loop {
            let (stream, peer) = match self.listener.accept() {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(error = %e, "Failed to accept connection");
                    continue;
                }
            };

            debug!(%peer, "New connection");

            let ctx = self.ctx.clone();
            let sessions = Arc::clone(&self.active_sessions);
            let spawned = thread::Builder::new()
                .name(format!("conn-{peer}"))
                .spawn(move || handle_connection(stream, peer, ctx, sessions));

            if let Err(e) = spawned {
                warn!(%peer, error = %e, "Failed to spawn connection thread");
            }
        }
    }
}

/// One connection's whole life: handshake, echo loop, teardown.
///
/// Runs on its own thread; nothing here can affect another connection or
/// the accept loop.
fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    ctx: ServerTlsContext,
    sessions: Arc<AtomicUsize>,
) {
    let channel = match ctx.accept(stream) {
        Ok(channel) => channel,
        Err(e) => {
            warn!(%peer, error = %e, "TLS handshake failed");
            return;
        }
    };

    info!(
        %peer,
        version = %channel.info().version,
        cipher = %channel.info().cipher,
        "Session established"
    );

    let active = sessions.fetch_add(1, Ordering::Relaxed) + 1;
    debug!(active, "Session count up");

    let outcome = EchoSession::new(channel).run();

    sessions.fetch_sub(1, Ordering::Relaxed);

    match outcome {
        SessionOutcome::Quit => info!(%peer, "Client quit"),
        SessionOutcome::Ended(SessionError::PeerClosed) => {
            info!(%peer, "Peer closed connection")
        }
        SessionOutcome::Ended(e) => warn!(%peer, error = %e, "Session ended on error"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tls::TlsVersion;

    fn test_ctx() -> ServerTlsContext {
        ServerTlsContext::builder()
            .min_version(TlsVersion::Tls12)
            .build()
            .unwrap()
    }

    #[test]
    fn test_bind_ephemeral_port() {
        let server = Server::bind("127.0.0.1:0", test_ctx()).unwrap();
        let addr = server.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
        assert_eq!(server.active_sessions(), 0);
    }

    #[test]
    fn test_bind_rejects_unresolvable_address() {
        assert!(Server::bind("not an address", test_ctx()).is_err());
    }
}
