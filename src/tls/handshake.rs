//! TLS handshake
//!
//! Converts one freshly accepted TCP connection plus the server context
//! into a usable encrypted channel, or a classified failure. The raw
//! connection is consumed either way; on failure the socket and any
//! partial TLS state are dropped before returning, and the accept loop
//! treats the error as non-fatal.

use openssl::error::ErrorStack;
use openssl::ssl::{ErrorCode, HandshakeError as SslHandshakeError, Ssl};
use std::io;
use std::net::TcpStream;

use super::channel::TlsChannel;
use super::context::ServerTlsContext;

/// Why a handshake attempt failed.
#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    /// The peer's negotiation was incompatible with the context's policy,
    /// or the bytes on the wire were not TLS at all.
    #[error("protocol negotiation failed: {0}")]
    ProtocolMismatch(String),

    /// The peer went away before the handshake completed.
    #[error("peer aborted handshake: {0}")]
    PeerAbort(String),

    /// A transport-level failure unrelated to the peer's behavior.
    #[error("handshake I/O failure: {0}")]
    Io(#[source] io::Error),
}

/// Drive the server-side TLS handshake on `stream`.
///
/// The stream must be freshly accepted and not yet consumed. On success
/// the negotiated protocol satisfies the context's configured floor.
pub fn handshake(
    stream: TcpStream,
    ctx: &ServerTlsContext,
) -> Result<TlsChannel, HandshakeError> {
    let ssl = Ssl::new(ctx.ssl_context())
        .map_err(|e| HandshakeError::Io(io::Error::new(io::ErrorKind::Other, e.to_string())))?;

    match ssl.accept(stream) {
        Ok(stream) => Ok(TlsChannel::new(stream)),
        Err(e) => Err(classify(e)),
    }
}

fn classify(error: SslHandshakeError<TcpStream>) -> HandshakeError {
    match error {
        SslHandshakeError::SetupFailure(stack) => {
            HandshakeError::Io(io::Error::new(io::ErrorKind::Other, stack.to_string()))
        }
        SslHandshakeError::Failure(mid) => classify_failure(mid.into_error()),
        // Streams here are blocking; a would-block is a transport anomaly.
        SslHandshakeError::WouldBlock(_) => HandshakeError::Io(io::Error::new(
            io::ErrorKind::WouldBlock,
            "handshake would block on a blocking stream",
        )),
    }
}

fn classify_failure(error: openssl::ssl::Error) -> HandshakeError {
    let code = error.code();

    if code == ErrorCode::ZERO_RETURN {
        return HandshakeError::PeerAbort("peer closed during handshake".to_string());
    }

    if code == ErrorCode::SYSCALL {
        return match error.into_io_error() {
            Ok(io_err) if is_disconnect(io_err.kind()) => {
                HandshakeError::PeerAbort(io_err.to_string())
            }
            Ok(io_err) => HandshakeError::Io(io_err),
            // EOF with no errno: the peer vanished without close_notify.
            Err(_) => HandshakeError::PeerAbort("peer disconnected during handshake".to_string()),
        };
    }

    if let Some(stack) = error.ssl_error() {
        let reason = first_reason(stack);
        // OpenSSL 3.x reports a peer vanishing mid-handshake as an
        // SSL-level unexpected-EOF error rather than a syscall failure.
        if reason.to_ascii_lowercase().contains("eof") {
            return HandshakeError::PeerAbort(reason);
        }
        return HandshakeError::ProtocolMismatch(reason);
    }

    HandshakeError::Io(io::Error::new(io::ErrorKind::Other, error.to_string()))
}

fn first_reason(stack: &ErrorStack) -> String {
    stack
        .errors()
        .iter()
        .filter_map(|e| e.reason().map(str::to_string))
        .next()
        .unwrap_or_else(|| stack.to_string())
}

fn is_disconnect(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
    )
}
