//! TLS layer
//!
//! This module owns everything between a freshly accepted TCP connection
//! and a usable encrypted channel:
//!
//! 1. `ServerTlsContext` holds the process-wide TLS settings (certificate
//!    and key, minimum protocol version, cipher list). It is built once at
//!    startup and shared read-only by every connection.
//! 2. `handshake` consumes a raw `TcpStream` and drives the TLS handshake
//!    to completion or a classified failure.
//! 3. `TlsChannel` is the encrypted channel a successful handshake yields;
//!    the echo session performs all further I/O through it.
//!
//! # Examples
//!
//! ```no_run
//! use tls_echo::tls::{ServerTlsContext, TlsVersion};
//! use std::net::TcpListener;
//!
//! let ctx = ServerTlsContext::builder()
//!     .min_version(TlsVersion::Tls12)
//!     .build()
//!     .unwrap();
//!
//! let listener = TcpListener::bind("127.0.0.1:8443").unwrap();
//! let (stream, _) = listener.accept().unwrap();
//! let channel = ctx.accept(stream).unwrap();
//! ```

pub mod builtin_cert;
pub mod channel;
pub mod context;
pub mod handshake;

pub use channel::{TlsChannel, TlsInfo};
pub use context::{ServerTlsContext, ServerTlsContextBuilder, TlsError, TlsVersion};
pub use handshake::{handshake, HandshakeError};
