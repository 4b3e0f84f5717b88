//! Parent-side dispatcher.
//!
//! [`spawn`] takes ownership of the socket and runs the dispatch loop as
//! a single task: commands from the [`Handle`] on one side, socket
//! readiness on the other. All I/O is nonblocking; reads land in the
//! tail of a growing [`FrameBuffer`], writes drain an append-only buffer
//! and resume after partial progress.
//!
//! Lifecycle: `Running` while any handle clone is alive; dropping the
//! last handle (or calling [`Handle::close`]) enters `ShuttingDown` -
//! no new requests, outstanding replies still awaited, write side
//! half-closed once the outbound buffer drains. The engine ends in
//! exactly one of `on_destroy` (handle released, all replies delivered,
//! clean EOF) or `on_error` (anything else).

use std::io;
use std::sync::Arc;

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncWriteExt, Interest};
use tokio::net::UnixStream;
use tokio::sync::mpsc;

use super::options::{DestroyFn, ErrorFn, EventFn, Options};
use super::pending::{IdAlloc, PendingSet, ReplyFn};
use crate::error::{ForkwireError, Result};
use crate::protocol::{wire, Frame, FrameBuffer};
use crate::serializer::{Args, Serializer};

/// Call handle for a spawned parent engine.
///
/// Cheaply cloneable; the engine begins drain-and-close when the last
/// clone is dropped. Dropping a handle implies [`Handle::close`].
#[derive(Clone)]
pub struct Handle {
    tx: mpsc::UnboundedSender<Command>,
}

enum Command {
    Invoke { args: Args, reply: ReplyFn },
}

impl Handle {
    /// Send a request to the child. Never blocks: the frame is enqueued
    /// and the writer scheduled. `reply` fires once with the decoded
    /// response values - or never, if the connection ends in an error.
    ///
    /// Invoking after the engine has closed is a programmer error; the
    /// call is dropped with a diagnostic.
    pub fn invoke<F>(&self, args: Args, reply: F)
    where
        F: FnOnce(Args) + Send + 'static,
    {
        let command = Command::Invoke {
            args,
            reply: Box::new(reply),
        };
        if self.tx.send(command).is_err() {
            tracing::error!("invoke on a closed engine; call dropped");
        }
    }

    /// Release this handle. Equivalent to dropping it.
    pub fn close(self) {}
}

/// Spawn the parent engine over an inherited, connected stream.
///
/// The stream must be the parent end of the socketpair shared with the
/// child, already switched to nonblocking mode by tokio.
pub fn spawn(stream: UnixStream, options: Options) -> Handle {
    let (tx, rx) = mpsc::unbounded_channel();
    let engine = Engine::new(stream, options);
    tokio::spawn(engine.run(rx));
    Handle { tx }
}

enum ReadState {
    Open,
    Eof,
}

struct Engine {
    stream: UnixStream,
    rbuf: FrameBuffer,
    wbuf: BytesMut,
    pending: PendingSet,
    ids: IdAlloc,
    serializer: Arc<dyn Serializer>,
    on_event: Option<EventFn>,
    on_error: Option<ErrorFn>,
    on_destroy: Option<DestroyFn>,
    shutting_down: bool,
    write_shut: bool,
}

impl Engine {
    fn new(stream: UnixStream, options: Options) -> Self {
        Self {
            stream,
            rbuf: FrameBuffer::with_max_payload(options.max_payload),
            wbuf: BytesMut::new(),
            pending: PendingSet::new(options.mode),
            ids: IdAlloc::new(),
            serializer: options.serializer,
            on_event: options.on_event,
            on_error: options.on_error,
            on_destroy: options.on_destroy,
            shutting_down: false,
            write_shut: false,
        }
    }

    async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<Command>) {
        match self.drive(&mut cmd_rx).await {
            Ok(()) => {
                tracing::debug!("engine closed cleanly");
                if let Some(on_destroy) = self.on_destroy.take() {
                    on_destroy();
                }
            }
            Err(e) => {
                let dropped = self.pending.len();
                self.pending.clear();
                tracing::debug!(dropped_replies = dropped, error = %e, "engine closed on error");
                self.report_fatal(e);
            }
        }
    }

    /// Fatal-error fallback chain: `on_error`, else an `("error", msg)`
    /// event, else an error-level log.
    fn report_fatal(&mut self, error: ForkwireError) {
        let msg = match error {
            ForkwireError::Protocol(m) => m,
            // The documented diagnostic for a torn connection.
            ForkwireError::ConnectionClosed => "unexpected eof".to_string(),
            other => other.to_string(),
        };
        if let Some(on_error) = self.on_error.take() {
            on_error(msg);
        } else if let Some(on_event) = self.on_event.as_mut() {
            on_event(vec![Bytes::from_static(b"error"), Bytes::from(msg)]);
        } else {
            tracing::error!(error = %msg, "fatal rpc error");
        }
    }

    async fn drive(&mut self, cmd_rx: &mut mpsc::UnboundedReceiver<Command>) -> Result<()> {
        loop {
            if self.shutting_down && self.wbuf.is_empty() && !self.write_shut {
                self.stream.shutdown().await?;
                self.write_shut = true;
                tracing::debug!("outbound drained; write side closed");
            }

            let interest = if self.wbuf.is_empty() {
                Interest::READABLE
            } else {
                Interest::READABLE | Interest::WRITABLE
            };

            tokio::select! {
                command = cmd_rx.recv(), if !self.shutting_down => {
                    match command {
                        Some(Command::Invoke { args, reply }) => self.start_request(args, reply)?,
                        None => self.shutting_down = true,
                    }
                }
                ready = self.stream.ready(interest) => {
                    let ready = ready?;
                    if ready.is_readable() {
                        if let ReadState::Eof = self.read_ready()? {
                            // Clean shutdown needs all three: handle
                            // released, replies delivered, EOF. An EOF
                            // while still running is a torn connection
                            // even with nothing pending.
                            return if self.shutting_down && self.pending.is_empty() {
                                Ok(())
                            } else {
                                Err(ForkwireError::ConnectionClosed)
                            };
                        }
                    }
                    if ready.is_writable() && !self.wbuf.is_empty() {
                        self.write_ready()?;
                    }
                }
            }
        }
    }

    /// Serialize, assign an id, record the pending reply, and enqueue the
    /// request frame.
    fn start_request(&mut self, args: Args, reply: ReplyFn) -> Result<()> {
        let payload = self.serializer.encode(&args)?;
        let id = self.ids.next_id(&self.pending);
        let frame = wire::encode_request(id, &payload)?;
        self.pending.insert(id, reply);
        self.wbuf.extend_from_slice(&frame);
        tracing::trace!(id, payload_len = payload.len(), "request enqueued");
        Ok(())
    }

    /// One nonblocking read plus dispatch of every completed frame.
    fn read_ready(&mut self) -> Result<ReadState> {
        match self.stream.try_read_buf(self.rbuf.tail()) {
            Ok(0) => Ok(ReadState::Eof),
            Ok(n) => {
                tracing::trace!(bytes = n, "read");
                while let Some(frame) = self.rbuf.extract()? {
                    self.dispatch(frame)?;
                }
                Ok(ReadState::Open)
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(ReadState::Open),
            Err(e) => Err(e.into()),
        }
    }

    fn dispatch(&mut self, frame: Frame) -> Result<()> {
        if frame.is_event() {
            let values = self.serializer.decode(&frame.payload)?;
            match self.on_event.as_mut() {
                Some(on_event) => on_event(values),
                None => tracing::warn!("event received without an on_event handler; dropped"),
            }
            return Ok(());
        }

        let reply = self.pending.complete(frame.id())?;
        let values = self.serializer.decode(&frame.payload)?;
        tracing::trace!(id = frame.id(), "reply delivered");
        reply(values);
        Ok(())
    }

    /// One nonblocking write; the written prefix is dropped and the rest
    /// retried on the next writable event.
    fn write_ready(&mut self) -> Result<()> {
        match self.stream.try_write(&self.wbuf) {
            Ok(n) => {
                self.wbuf.advance(n);
                tracing::trace!(bytes = n, left = self.wbuf.len(), "wrote");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
