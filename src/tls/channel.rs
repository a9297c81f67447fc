//! Encrypted channel
//!
//! This module implements the `Channel` trait over an OpenSSL stream,
//! carrying the negotiated connection parameters and the failure discipline
//! the session relies on for teardown.

use crate::channel::Channel;
use openssl::ssl::{SslRef, SslStream};
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};

/// Negotiated TLS parameters, captured after the handshake.
#[derive(Debug, Clone)]
pub struct TlsInfo {
    /// Negotiated TLS version (e.g., "TLSv1.3")
    pub version: String,

    /// Negotiated cipher suite
    pub cipher: String,
}

impl TlsInfo {
    pub(crate) fn from_ssl(ssl: &SslRef) -> Self {
        TlsInfo {
            version: ssl.version_str().to_string(),
            cipher: ssl
                .current_cipher()
                .map(|c| c.name().to_string())
                .unwrap_or_else(|| "<undef>".to_string()),
        }
    }
}

/// Encrypted channel produced by a successful handshake.
///
/// Exclusively owned by one echo session. Once a read or write fails, the
/// `failed` flag suppresses the protocol-level close notification on
/// shutdown; the socket is still torn down.
#[derive(Debug)]
pub struct TlsChannel {
    stream: SslStream<TcpStream>,
    info: TlsInfo,
    failed: bool,
}

impl TlsChannel {
    pub(crate) fn new(stream: SslStream<TcpStream>) -> Self {
        let info = TlsInfo::from_ssl(stream.ssl());
        TlsChannel {
            stream,
            info,
            failed: false,
        }
    }

    /// Negotiated connection parameters.
    pub fn info(&self) -> &TlsInfo {
        &self.info
    }

    /// Whether a read or write on this channel has failed.
    pub fn failed(&self) -> bool {
        self.failed
    }
}

impl Channel for TlsChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.stream.read(buf) {
            Ok(n) => Ok(n),
            Err(e) => {
                self.failed = true;
                Err(e)
            }
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.stream.write(buf) {
            Ok(n) => Ok(n),
            Err(e) => {
                self.failed = true;
                Err(e)
            }
        }
    }

    fn shutdown(&mut self) -> io::Result<()> {
        // Send close_notify only on a healthy channel
        if !self.failed {
            let _ = self.stream.shutdown();
        }

        self.stream.get_ref().shutdown(Shutdown::Both)
    }
}
