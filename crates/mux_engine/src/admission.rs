//! Connection admission: a counting-semaphore decorator around a raw acceptor.

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use mux_logging::mux_debug;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

/// Source of raw connections.
#[async_trait::async_trait]
pub trait Acceptor: Send {
    type Conn: Send + 'static;

    async fn accept(&mut self) -> io::Result<(Self::Conn, SocketAddr)>;

    fn local_addr(&self) -> io::Result<SocketAddr>;
}

#[async_trait::async_trait]
impl Acceptor for TcpListener {
    type Conn = TcpStream;

    async fn accept(&mut self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self).await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        TcpListener::local_addr(self)
    }
}

#[derive(Debug, Error)]
pub enum AcceptError {
    #[error("acceptor closed")]
    Closed,
    #[error("accept failed: {0}")]
    Io(#[from] io::Error),
}

/// One unit of admission capacity, returned to the pool at most once.
#[derive(Debug, Default)]
pub struct ConnectionSlot {
    permit: Option<OwnedSemaphorePermit>,
}

impl ConnectionSlot {
    /// Gives the slot back. Later calls, and the eventual drop, are no-ops.
    pub fn release(&mut self) {
        self.permit.take();
    }

    pub fn is_held(&self) -> bool {
        self.permit.is_some()
    }
}

/// An admitted connection. Dropping it releases its slot.
#[derive(Debug)]
pub struct LimitedConn<C> {
    conn: C,
    slot: ConnectionSlot,
    closed: bool,
}

impl<C> LimitedConn<C> {
    pub fn get_ref(&self) -> &C {
        &self.conn
    }

    pub fn holds_slot(&self) -> bool {
        self.slot.is_held()
    }
}

impl<C: AsyncWrite + Unpin> LimitedConn<C> {
    /// Shuts down the write side and releases the slot. Idempotent.
    pub async fn close(&mut self) -> io::Result<()> {
        let shut = if self.closed {
            Ok(())
        } else {
            self.closed = true;
            self.conn.shutdown().await
        };
        self.slot.release();
        shut
    }
}

impl<C: AsyncRead + Unpin> AsyncRead for LimitedConn<C> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.conn).poll_read(cx, buf)
    }
}

impl<C: AsyncWrite + Unpin> AsyncWrite for LimitedConn<C> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.conn).poll_write(cx, buf)
    }

    fn poll_write_vectored(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.conn).poll_write_vectored(cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        self.conn.is_write_vectored()
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.conn).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.conn).poll_shutdown(cx)
    }
}

/// Closes a [`LimitListener`] from another task.
#[derive(Debug, Clone)]
pub struct AcceptorCloser {
    closed: CancellationToken,
    slots: Option<Arc<Semaphore>>,
}

impl AcceptorCloser {
    /// Wakes every pending `accept` with [`AcceptError::Closed`].
    pub fn close(&self) {
        if let Some(slots) = &self.slots {
            slots.close();
        }
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

/// Caps the number of concurrently open connections accepted from `A`.
///
/// `max_connections == 0` disables the cap: no semaphore is created and
/// admitted connections carry an empty slot.
pub struct LimitListener<A> {
    inner: A,
    slots: Option<Arc<Semaphore>>,
    max_connections: usize,
    closed: CancellationToken,
}

impl<A: Acceptor> LimitListener<A> {
    pub fn new(inner: A, max_connections: usize) -> Self {
        let slots = (max_connections > 0).then(|| Arc::new(Semaphore::new(max_connections)));
        Self {
            inner,
            slots,
            max_connections,
            closed: CancellationToken::new(),
        }
    }

    pub fn closer(&self) -> AcceptorCloser {
        AcceptorCloser {
            closed: self.closed.clone(),
            slots: self.slots.clone(),
        }
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Free slots, or `None` when admission is unbounded.
    pub fn available_slots(&self) -> Option<usize> {
        self.slots.as_ref().map(|slots| slots.available_permits())
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    /// Waits for a free slot, then for the next raw connection.
    ///
    /// The slot is held by the returned connection; if the underlying accept
    /// fails or the acceptor closes first, it is returned immediately.
    pub async fn accept(&mut self) -> Result<(LimitedConn<A::Conn>, SocketAddr), AcceptError> {
        if self.closed.is_cancelled() {
            return Err(AcceptError::Closed);
        }

        let permit = match &self.slots {
            Some(slots) => {
                let slots = slots.clone();
                let permit = tokio::select! {
                    biased;
                    _ = self.closed.cancelled() => return Err(AcceptError::Closed),
                    permit = slots.acquire_owned() => permit.map_err(|_| AcceptError::Closed)?,
                };
                Some(permit)
            }
            None => None,
        };

        let (conn, addr) = tokio::select! {
            biased;
            _ = self.closed.cancelled() => return Err(AcceptError::Closed),
            accepted = self.inner.accept() => accepted?,
        };
        match self.available_slots() {
            Some(left) => mux_debug!("admitted connection from {} ({} slots left)", addr, left),
            None => mux_debug!("admitted connection from {} (unbounded)", addr),
        }

        Ok((
            LimitedConn {
                conn,
                slot: ConnectionSlot { permit },
                closed: false,
            },
            addr,
        ))
    }
}
