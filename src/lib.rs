//! tls-echo - TLS-terminating TCP echo server
//!
//! This crate implements a small TLS server that echoes application data
//! back to the client with a fixed acknowledgment prefix, closing the
//! session when the client sends the literal message `quit`.
//!
//! The `tls` module owns handshake establishment and the encrypted channel,
//! the `echo` module owns the per-connection read/echo/write loop, and the
//! `server` module ties them together with one thread per connection.

pub mod channel;
pub mod config;
pub mod echo;
pub mod server;
pub mod tls;
