//! Server TLS context
//!
//! The context holds the certificate/key pair and the negotiated-parameter
//! policy (protocol floor, cipher list) for the whole process. It is built
//! once at startup; a failure here is fatal to startup and nowhere else.

use openssl::pkey::PKey;
use openssl::ssl::{SslContext, SslContextBuilder, SslMethod};
use openssl::x509::X509;
use std::fs::File;
use std::io::Read;
use std::net::TcpStream;
use std::path::Path;
use std::str::FromStr;

use super::channel::TlsChannel;
use super::handshake::{handshake, HandshakeError};

/// TLS protocol version, used as the negotiation floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TlsVersion {
    /// TLS 1.0
    Tls10,
    /// TLS 1.1
    Tls11,
    /// TLS 1.2
    Tls12,
    /// TLS 1.3
    Tls13,
}

impl TlsVersion {
    /// Get OpenSSL protocol version constant
    pub fn to_openssl_version(&self) -> openssl::ssl::SslVersion {
        use openssl::ssl::SslVersion;
        match self {
            TlsVersion::Tls10 => SslVersion::TLS1,
            TlsVersion::Tls11 => SslVersion::TLS1_1,
            TlsVersion::Tls12 => SslVersion::TLS1_2,
            TlsVersion::Tls13 => SslVersion::TLS1_3,
        }
    }

    /// Get version as string
    pub fn as_str(&self) -> &'static str {
        match self {
            TlsVersion::Tls10 => "TLSv1.0",
            TlsVersion::Tls11 => "TLSv1.1",
            TlsVersion::Tls12 => "TLSv1.2",
            TlsVersion::Tls13 => "TLSv1.3",
        }
    }
}

impl FromStr for TlsVersion {
    type Err = TlsError;

    /// Parse a TLS version from a string (case-insensitive).
    fn from_str(s: &str) -> Result<Self, TlsError> {
        match s.to_uppercase().as_str() {
            "TLSV1.0" | "TLS1.0" | "TLSV1" | "TLS1" | "1.0" => Ok(TlsVersion::Tls10),
            "TLSV1.1" | "TLS1.1" | "1.1" => Ok(TlsVersion::Tls11),
            "TLSV1.2" | "TLS1.2" | "1.2" => Ok(TlsVersion::Tls12),
            "TLSV1.3" | "TLS1.3" | "1.3" => Ok(TlsVersion::Tls13),
            _ => Err(TlsError::InvalidVersion(s.to_string())),
        }
    }
}

/// TLS context errors
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("OpenSSL error: {0}")]
    OpenSsl(#[from] openssl::error::ErrorStack),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TLS version: {0}")]
    InvalidVersion(String),

    #[error("Certificate error: {0}")]
    Certificate(String),
}

/// Server TLS context (immutable after building)
///
/// Cloning shares the underlying OpenSSL context; clones are handed to
/// connection threads, which only ever read it.
#[derive(Clone)]
pub struct ServerTlsContext {
    ctx: SslContext,
}

impl ServerTlsContext {
    /// Create a new context builder
    pub fn builder() -> ServerTlsContextBuilder {
        ServerTlsContextBuilder::new()
    }

    /// Accept a client connection, driving the TLS handshake.
    pub fn accept(&self, stream: TcpStream) -> Result<TlsChannel, HandshakeError> {
        handshake(stream, self)
    }

    pub(crate) fn ssl_context(&self) -> &SslContext {
        &self.ctx
    }
}

/// Server context builder
pub struct ServerTlsContextBuilder {
    ctx_builder: SslContextBuilder,
    has_cert: bool,
    has_key: bool,
}

impl ServerTlsContextBuilder {
    fn new() -> Self {
        let ctx_builder = SslContextBuilder::new(SslMethod::tls_server())
            .expect("Failed to create SSL context");

        ServerTlsContextBuilder {
            ctx_builder,
            has_cert: false,
            has_key: false,
        }
    }

    /// Set the minimum accepted TLS version.
    ///
    /// Negotiation below this floor is rejected during the handshake by the
    /// context itself.
    pub fn min_version(mut self, version: TlsVersion) -> Self {
        self.ctx_builder
            .set_min_proto_version(Some(version.to_openssl_version()))
            .expect("Failed to set min proto version");
        self
    }

    /// Set cipher list (for TLS <= 1.2)
    pub fn cipher_list(mut self, ciphers: &str) -> Result<Self, TlsError> {
        self.ctx_builder.set_cipher_list(ciphers)?;
        Ok(self)
    }

    /// Load the server certificate from a PEM file
    pub fn cert_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, TlsError> {
        let mut cert_pem = Vec::new();
        File::open(path.as_ref())?.read_to_end(&mut cert_pem)?;

        let cert = X509::from_pem(&cert_pem)
            .map_err(|e| TlsError::Certificate(format!("Failed to load certificate: {}", e)))?;
        self.ctx_builder.set_certificate(&cert)?;

        self.has_cert = true;
        Ok(self)
    }

    /// Load the server private key from a PEM file
    pub fn key_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, TlsError> {
        let mut key_pem = Vec::new();
        File::open(path.as_ref())?.read_to_end(&mut key_pem)?;

        let key = PKey::private_key_from_pem(&key_pem)
            .map_err(|e| TlsError::Certificate(format!("Failed to load private key: {}", e)))?;
        self.ctx_builder.set_private_key(&key)?;

        self.has_key = true;
        Ok(self)
    }

    /// Build the TLS context
    ///
    /// With no certificate and key configured, the built-in self-signed
    /// pair is used. The private key is always checked against the
    /// certificate.
    pub fn build(mut self) -> Result<ServerTlsContext, TlsError> {
        match (self.has_cert, self.has_key) {
            (true, true) => {}
            (false, false) => {
                self = self.load_builtin_cert()?;
            }
            _ => {
                return Err(TlsError::Certificate(
                    "certificate and private key must be configured together".to_string(),
                ));
            }
        }

        self.ctx_builder
            .check_private_key()
            .map_err(|_| TlsError::Certificate("private key does not match certificate".to_string()))?;

        Ok(ServerTlsContext {
            ctx: self.ctx_builder.build(),
        })
    }

    fn load_builtin_cert(mut self) -> Result<Self, TlsError> {
        let cert_pem = super::builtin_cert::BUILTIN_CERT;

        let cert = X509::from_pem(cert_pem.as_bytes())
            .map_err(|e| TlsError::Certificate(format!("Failed to load built-in certificate: {}", e)))?;
        self.ctx_builder.set_certificate(&cert)?;

        let key = PKey::private_key_from_pem(cert_pem.as_bytes())
            .map_err(|e| TlsError::Certificate(format!("Failed to load built-in private key: {}", e)))?;
        self.ctx_builder.set_private_key(&key)?;

        self.has_cert = true;
        self.has_key = true;
        Ok(self)
    }
}
