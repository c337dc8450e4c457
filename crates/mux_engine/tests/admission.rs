use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use mux_engine::{AcceptError, Acceptor, LimitListener};
use tokio::io::{AsyncReadExt, DuplexStream};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;

const SHORT: Duration = Duration::from_millis(50);
const LONG: Duration = Duration::from_secs(2);

/// Acceptor fed from a channel; pending forever once the feed is empty.
struct FakeAcceptor {
    rx: mpsc::UnboundedReceiver<io::Result<DuplexStream>>,
}

#[async_trait::async_trait]
impl Acceptor for FakeAcceptor {
    type Conn = DuplexStream;

    async fn accept(&mut self) -> io::Result<(DuplexStream, SocketAddr)> {
        match self.rx.recv().await {
            Some(conn) => conn.map(|conn| (conn, fake_addr())),
            None => std::future::pending().await,
        }
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok(fake_addr())
    }
}

fn fake_addr() -> SocketAddr {
    "127.0.0.1:9".parse().unwrap()
}

fn fake_listener(
    max_connections: usize,
    ready: usize,
) -> (
    LimitListener<FakeAcceptor>,
    mpsc::UnboundedSender<io::Result<DuplexStream>>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    for _ in 0..ready {
        tx.send(Ok(tokio::io::duplex(64).0)).unwrap();
    }
    (LimitListener::new(FakeAcceptor { rx }, max_connections), tx)
}

#[tokio::test]
async fn second_accept_waits_until_first_connection_closes() {
    let (mut listener, _feed) = fake_listener(1, 2);

    let (first, _) = listener.accept().await.expect("first admitted");
    assert!(first.holds_slot());
    assert_eq!(listener.available_slots(), Some(0));

    assert!(timeout(SHORT, listener.accept()).await.is_err());

    drop(first);
    let (second, _) = timeout(LONG, listener.accept())
        .await
        .expect("admitted after release")
        .expect("accept ok");
    assert!(second.holds_slot());
}

#[tokio::test]
async fn at_most_n_connections_are_admitted() {
    let (mut listener, _feed) = fake_listener(3, 10);

    let mut admitted = Vec::new();
    while let Ok(accepted) = timeout(SHORT, listener.accept()).await {
        admitted.push(accepted.expect("accept ok"));
    }

    assert_eq!(admitted.len(), 3);
    assert_eq!(listener.available_slots(), Some(0));

    // Releasing one admits exactly one more.
    admitted.pop();
    admitted.push(timeout(LONG, listener.accept()).await.unwrap().unwrap());
    assert!(timeout(SHORT, listener.accept()).await.is_err());
}

#[tokio::test]
async fn closing_a_connection_twice_releases_one_slot() {
    let (mut listener, _feed) = fake_listener(2, 1);

    let (mut conn, _) = listener.accept().await.unwrap();
    assert_eq!(listener.available_slots(), Some(1));

    conn.close().await.unwrap();
    conn.close().await.unwrap();
    assert!(!conn.holds_slot());
    assert_eq!(listener.available_slots(), Some(2));

    drop(conn);
    assert_eq!(listener.available_slots(), Some(2));
}

#[tokio::test]
async fn zero_capacity_disables_the_gate() {
    let (mut listener, _feed) = fake_listener(0, 5);
    assert_eq!(listener.available_slots(), None);

    let mut admitted = Vec::new();
    for _ in 0..5 {
        let (conn, _) = timeout(LONG, listener.accept()).await.unwrap().unwrap();
        assert!(!conn.holds_slot());
        admitted.push(conn);
    }
    assert_eq!(admitted.len(), 5);
}

#[tokio::test]
async fn closing_the_acceptor_wakes_slot_waiters() {
    let (mut listener, _feed) = fake_listener(1, 2);
    let closer = listener.closer();
    let (held, _) = listener.accept().await.unwrap();

    let waiter = tokio::spawn(async move {
        let outcome = listener.accept().await;
        (outcome.map(|_| ()), listener)
    });
    tokio::time::sleep(SHORT).await;
    assert!(!waiter.is_finished());

    closer.close();
    let (outcome, mut listener) = timeout(LONG, waiter).await.unwrap().unwrap();
    assert!(matches!(outcome, Err(AcceptError::Closed)));
    assert!(matches!(listener.accept().await, Err(AcceptError::Closed)));
    drop(held);
}

#[tokio::test]
async fn closing_the_acceptor_wakes_unbounded_accept() {
    let (mut listener, _feed) = fake_listener(0, 0);
    let closer = listener.closer();

    let waiter = tokio::spawn(async move { listener.accept().await.map(|_| ()) });
    tokio::time::sleep(SHORT).await;
    closer.close();

    let outcome = timeout(LONG, waiter).await.unwrap().unwrap();
    assert!(matches!(outcome, Err(AcceptError::Closed)));
    assert!(closer.is_closed());
}

#[tokio::test]
async fn failed_raw_accept_returns_the_slot() {
    let (mut listener, feed) = fake_listener(1, 0);
    feed.send(Err(io::Error::new(io::ErrorKind::Other, "boom")))
        .unwrap();

    assert!(matches!(listener.accept().await, Err(AcceptError::Io(_))));
    assert_eq!(listener.available_slots(), Some(1));
}

#[tokio::test]
async fn tcp_listener_is_gated_by_slots() {
    let raw = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = raw.local_addr().unwrap();
    let mut listener = LimitListener::new(raw, 1);
    assert_eq!(listener.local_addr().unwrap(), addr);
    assert_eq!(listener.max_connections(), 1);

    let _client_a = TcpStream::connect(addr).await.unwrap();
    let _client_b = TcpStream::connect(addr).await.unwrap();

    let (first, _) = timeout(LONG, listener.accept()).await.unwrap().unwrap();
    assert!(timeout(SHORT, listener.accept()).await.is_err());

    drop(first);
    let (second, _) = timeout(LONG, listener.accept()).await.unwrap().unwrap();
    assert!(second.get_ref().peer_addr().is_ok());
}

#[tokio::test]
async fn close_without_a_slot_still_shuts_down_the_stream() {
    let raw = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = raw.local_addr().unwrap();
    let mut listener = LimitListener::new(raw, 0);

    let mut peer = TcpStream::connect(addr).await.unwrap();
    let (mut conn, _) = timeout(LONG, listener.accept()).await.unwrap().unwrap();
    assert!(!conn.holds_slot());

    conn.close().await.unwrap();
    conn.close().await.unwrap();

    let mut buf = [0u8; 8];
    let read = timeout(Duration::from_millis(300), peer.read(&mut buf))
        .await
        .expect("peer sees EOF")
        .unwrap();
    assert_eq!(read, 0);
}
