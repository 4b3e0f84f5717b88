//! Concurrent child engine.
//!
//! A readiness-driven loop over the shared socket. Each inbound request
//! spawns its handler with a [`Done`] completion capability and an
//! [`Emitter`]; any number of handlers may be outstanding, and their
//! completions may come in any order. Responses and events funnel
//! through one outbound queue into one write buffer, so the wire carries
//! them in exactly the order the child code produced them.
//!
//! A `busy` counter starts at 1 for the attached parent; each request
//! adds one and each response removes one, and observing EOF removes the
//! parent bias. When `busy` reaches 0 and the write buffer drains, the
//! engine half-closes and exits - `process::exit(0)` unless an
//! [`Options::exit_hook`] replaces it.

use std::future::Future;
use std::io;
use std::sync::Arc;

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncWriteExt, Interest};
use tokio::net::UnixStream;
use tokio::sync::mpsc;

use crate::error::{ForkwireError, Result};
use crate::protocol::{wire, FrameBuffer};
use crate::serializer::{Args, Serializer};

enum Outbound {
    Reply { id: u32, values: Args },
    Event { values: Args },
    Abandoned { id: u32 },
}

/// Completion capability for one request. Consumed by [`Done::respond`].
///
/// Dropping a `Done` without responding is a child fault: the request id
/// can never be answered, so the engine tears down and the parent
/// observes an unexpected EOF.
pub struct Done {
    id: u32,
    tx: Option<mpsc::UnboundedSender<Outbound>>,
}

impl Done {
    /// The request id this completion answers.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Enqueue the response tuple for this request.
    pub fn respond(mut self, values: Args) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Outbound::Reply { id: self.id, values });
        }
    }
}

impl Drop for Done {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Outbound::Abandoned { id: self.id });
        }
    }
}

/// Event-emission capability. Cloneable and free-standing: handlers may
/// keep one alive and emit at any time, request in flight or not.
#[derive(Clone)]
pub struct Emitter {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl Emitter {
    /// Enqueue an event frame (id 0) behind whatever was enqueued before.
    pub fn emit(&self, values: Args) {
        if self.tx.send(Outbound::Event { values }).is_err() {
            tracing::warn!("event dropped; engine is gone");
        }
    }
}

/// Options for the cooperative child engine.
#[derive(Default)]
pub struct Options {
    exit_hook: Option<Box<dyn FnOnce() + Send>>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the default `process::exit(0)` at clean shutdown. The
    /// hook runs after the final flush and half-close; [`run`] then
    /// returns instead of exiting.
    pub fn exit_hook<F: FnOnce() + Send + 'static>(mut self, f: F) -> Self {
        self.exit_hook = Some(Box::new(f));
        self
    }
}

/// Run the cooperative child engine until the parent detaches.
///
/// `handler` is called once per request with `(done, emitter, args)` and
/// its future is spawned, so handlers are free to wait on timers or
/// other reactor events before responding. Blocking the thread inside a
/// handler deadlocks the engine; all waits must go through the reactor.
pub async fn run<H, Fut>(
    mut stream: UnixStream,
    serializer: Arc<dyn Serializer>,
    handler: H,
    mut options: Options,
) -> Result<()>
where
    H: Fn(Done, Emitter, Args) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    match drive(&mut stream, serializer.as_ref(), &handler).await {
        Ok(()) => {
            tracing::debug!("cooperative child drained; exiting");
            match options.exit_hook.take() {
                Some(hook) => {
                    hook();
                    Ok(())
                }
                None => std::process::exit(0),
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "cooperative child terminated");
            Err(e)
        }
    }
}

async fn drive<H, Fut>(
    stream: &mut UnixStream,
    serializer: &dyn Serializer,
    handler: &H,
) -> Result<()>
where
    H: Fn(Done, Emitter, Args) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel();
    let emitter = Emitter { tx: tx.clone() };

    let mut rbuf = FrameBuffer::new();
    let mut wbuf = BytesMut::new();
    // One for the attached parent, one per request in flight.
    let mut busy: u32 = 1;
    let mut eof = false;

    loop {
        if eof && busy == 0 && wbuf.is_empty() {
            // Anything child code enqueued before this point still goes
            // out ahead of the half-close.
            match rx.try_recv() {
                Ok(out) => {
                    enqueue_outbound(out, serializer, &mut wbuf, &mut busy)?;
                    continue;
                }
                Err(_) => {
                    stream.shutdown().await?;
                    return Ok(());
                }
            }
        }

        let interest = match (!eof, !wbuf.is_empty()) {
            (true, true) => Some(Interest::READABLE | Interest::WRITABLE),
            (true, false) => Some(Interest::READABLE),
            (false, true) => Some(Interest::WRITABLE),
            (false, false) => None,
        };

        tokio::select! {
            Some(out) = rx.recv() => {
                enqueue_outbound(out, serializer, &mut wbuf, &mut busy)?;
            }
            ready = stream.ready(interest.unwrap_or(Interest::READABLE)), if interest.is_some() => {
                let ready = ready?;
                if ready.is_readable() && !eof {
                    match stream.try_read_buf(rbuf.tail()) {
                        Ok(0) => {
                            // Parent detached: cancel the attachment bias
                            // and keep draining whatever is queued.
                            eof = true;
                            busy -= 1;
                            tracing::debug!(busy, "eof from parent");
                        }
                        Ok(_) => {
                            while let Some(frame) = rbuf.extract()? {
                                if frame.is_event() {
                                    return Err(ForkwireError::Protocol(
                                        "unexpected event frame from parent".to_string(),
                                    ));
                                }
                                let args = serializer.decode(&frame.payload)?;
                                busy += 1;
                                let done = Done { id: frame.id(), tx: Some(tx.clone()) };
                                tracing::trace!(id = done.id, busy, "request dispatched");
                                tokio::spawn(handler(done, emitter.clone(), args));
                            }
                        }
                        Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                        Err(e) => return Err(e.into()),
                    }
                }
                if ready.is_writable() && !wbuf.is_empty() {
                    match stream.try_write(&wbuf) {
                        Ok(n) => wbuf.advance(n),
                        Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                        Err(e) => return Err(e.into()),
                    }
                }
            }
        }
    }
}

/// Serialize one outbound message onto the write buffer. Responses
/// retire their request from the busy count; an abandoned request is a
/// child fault.
fn enqueue_outbound(
    out: Outbound,
    serializer: &dyn Serializer,
    wbuf: &mut BytesMut,
    busy: &mut u32,
) -> Result<()> {
    match out {
        Outbound::Reply { id, values } => {
            let payload = serializer.encode(&values)?;
            wbuf.extend_from_slice(&wire::encode_response(id, &payload)?);
            *busy -= 1;
            tracing::trace!(id, busy = *busy, "response enqueued");
        }
        Outbound::Event { values } => {
            let payload = serializer.encode(&values)?;
            wbuf.extend_from_slice(&wire::encode_event(&payload));
        }
        Outbound::Abandoned { id } => {
            tracing::error!(id, "handler dropped without responding");
            return Err(ForkwireError::ConnectionClosed);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serializer::{args, LengthPrefixed};
    use bytes::Bytes;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn read_frame(stream: &mut UnixStream) -> Option<(u32, Vec<u8>)> {
        let mut header = [0u8; wire::HEADER_SIZE];
        match stream.read_exact(&mut header).await {
            Ok(_) => {}
            Err(_) => return None,
        }
        let header = wire::Header::decode(&header).unwrap();
        let mut payload = vec![0u8; header.length as usize];
        stream.read_exact(&mut payload).await.unwrap();
        Some((header.id, payload))
    }

    fn request(id: u32, value: &[u8]) -> Vec<u8> {
        let payload = LengthPrefixed.encode(&args([value.to_vec()])).unwrap();
        wire::encode_request(id, &payload).unwrap()
    }

    #[tokio::test]
    async fn test_responses_complete_out_of_order() {
        let (mut parent, child) = UnixStream::pair().unwrap();

        let engine = tokio::spawn(run(
            child,
            Arc::new(LengthPrefixed),
            |done: Done, _emitter: Emitter, args: Args| async move {
                let millis: u64 = String::from_utf8(args[0].to_vec())
                    .unwrap()
                    .parse()
                    .unwrap();
                tokio::time::sleep(Duration::from_millis(millis)).await;
                done.respond(args);
            },
            Options::new().exit_hook(|| {}),
        ));

        parent.write_all(&request(1, b"60")).await.unwrap();
        parent.write_all(&request(2, b"30")).await.unwrap();
        parent.write_all(&request(3, b"5")).await.unwrap();
        parent.shutdown().await.unwrap();

        let mut order = Vec::new();
        while let Some((id, _payload)) = read_frame(&mut parent).await {
            order.push(id);
        }

        assert_eq!(order, vec![3, 2, 1]);
        engine.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_events_and_responses_share_wire_order() {
        let (mut parent, child) = UnixStream::pair().unwrap();

        let engine = tokio::spawn(run(
            child,
            Arc::new(LengthPrefixed),
            |done: Done, emitter: Emitter, _args: Args| async move {
                emitter.emit(args([&b"before"[..]]));
                done.respond(args([&b"reply"[..]]));
                emitter.emit(args([&b"after"[..]]));
            },
            Options::new().exit_hook(|| {}),
        ));

        parent.write_all(&request(1, b"go")).await.unwrap();
        parent.shutdown().await.unwrap();

        let mut frames = Vec::new();
        while let Some((id, payload)) = read_frame(&mut parent).await {
            let values = LengthPrefixed.decode(&payload).unwrap();
            frames.push((id, values[0].clone()));
        }

        assert_eq!(
            frames,
            vec![
                (wire::EVENT_ID, Bytes::from_static(b"before")),
                (1, Bytes::from_static(b"reply")),
                (wire::EVENT_ID, Bytes::from_static(b"after")),
            ]
        );
        engine.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_abandoned_done_is_fatal() {
        let (mut parent, child) = UnixStream::pair().unwrap();

        let engine = tokio::spawn(run(
            child,
            Arc::new(LengthPrefixed),
            |done: Done, _emitter: Emitter, _args: Args| async move {
                drop(done);
            },
            Options::new().exit_hook(|| {}),
        ));

        parent.write_all(&request(1, b"x")).await.unwrap();

        let result = engine.await.unwrap();
        assert!(matches!(result, Err(ForkwireError::ConnectionClosed)));
    }
}
