//! Handshake isolation integration tests
//!
//! A malformed or aborted handshake must neither crash the server nor
//! prevent later clients from connecting; the accept loop just logs and
//! keeps going.

use openssl::ssl::{Ssl, SslContextBuilder, SslMethod, SslStream, SslVerifyMode};
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::thread;
use std::time::Duration;
use tls_echo::echo::ACK_PREFIX;
use tls_echo::server::Server;
use tls_echo::tls::{ServerTlsContext, TlsVersion};

fn spawn_server() -> SocketAddr {
    let ctx = ServerTlsContext::builder()
        .min_version(TlsVersion::Tls12)
        .build()
        .unwrap();

    let server = Server::bind("127.0.0.1:0", ctx).unwrap();
    let addr = server.local_addr().unwrap();

    thread::spawn(move || {
        let _ = server.run();
    });

    thread::sleep(Duration::from_millis(100));

    addr
}

fn connect(addr: SocketAddr) -> SslStream<TcpStream> {
    let mut builder = SslContextBuilder::new(SslMethod::tls_client()).unwrap();
    builder.set_verify(SslVerifyMode::NONE);
    let ctx = builder.build();

    let stream = TcpStream::connect(addr).unwrap();
    Ssl::new(&ctx).unwrap().connect(stream).unwrap()
}

fn echo_roundtrip(tls: &mut SslStream<TcpStream>, payload: &[u8]) {
    tls.write_all(payload).unwrap();

    let mut buf = vec![0u8; ACK_PREFIX.len() + payload.len()];
    tls.read_exact(&mut buf).unwrap();
    assert_eq!(&buf[..ACK_PREFIX.len()], ACK_PREFIX);
    assert_eq!(&buf[ACK_PREFIX.len()..], payload);
}

#[test]
fn test_non_tls_client_does_not_poison_the_server() {
    let addr = spawn_server();

    // Plain-text client: the handshake fails server-side and the
    // connection is dropped
    {
        let mut raw = TcpStream::connect(addr).unwrap();
        raw.write_all(b"GET / HTTP/1.1\r\n\r\n").unwrap();
        let mut buf = [0u8; 64];
        let _ = raw.read(&mut buf);
    }

    // A well-behaved client right after gets full service
    let mut tls = connect(addr);
    echo_roundtrip(&mut tls, b"still alive");
}

#[test]
fn test_aborted_handshake_does_not_poison_the_server() {
    let addr = spawn_server();

    // Connect and vanish before sending a ClientHello
    for _ in 0..3 {
        let stream = TcpStream::connect(addr).unwrap();
        drop(stream);
    }

    let mut tls = connect(addr);
    echo_roundtrip(&mut tls, b"hello");
}

#[test]
fn test_failed_handshake_while_session_active() {
    let addr = spawn_server();

    // An established session in one thread...
    let mut active = connect(addr);
    echo_roundtrip(&mut active, b"before");

    // ...is unaffected by a garbage handshake attempt in another
    {
        let mut raw = TcpStream::connect(addr).unwrap();
        raw.write_all(b"definitely not tls").unwrap();
        let mut buf = [0u8; 64];
        let _ = raw.read(&mut buf);
    }

    echo_roundtrip(&mut active, b"after");
}
