//! Serial child engine.
//!
//! The minimum-dependency execution model: one synchronous loop, one
//! request in flight, responses written in request order. Only blocking
//! `read` and `write` syscalls are used. Peer EOF ends the loop cleanly;
//! every other failure is fatal and reported with a diagnostic so the
//! child binary can exit.

use std::io::Write;
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::sync::Arc;

use crate::error::{ForkwireError, Result};
use crate::protocol::{wire, FrameBuffer};
use crate::serializer::{Args, Serializer};

/// Event-emission capability handed to the request handler.
///
/// Events are written synchronously, so anything emitted before the
/// handler returns reaches the parent ahead of the response.
pub struct Emitter<'a> {
    stream: &'a UnixStream,
    serializer: &'a dyn Serializer,
}

impl Emitter<'_> {
    /// Serialize and write an event frame (id 0). A failed write is
    /// fatal for the connection; propagate the error out of the handler.
    pub fn emit(&self, values: Args) -> Result<()> {
        let payload = self.serializer.encode(&values)?;
        let frame = wire::encode_event(&payload);
        let mut stream = self.stream;
        stream.write_all(&frame)?;
        Ok(())
    }
}

/// Run the serial child loop until the parent closes its end.
///
/// `handler` is called once per request with the decoded argument tuple;
/// its return tuple becomes the response. A handler error is fatal: the
/// loop stops without sending a response and the error is returned for
/// the child binary to exit on.
pub fn run<H>(stream: UnixStream, serializer: Arc<dyn Serializer>, handler: H) -> Result<()>
where
    H: Fn(&Emitter<'_>, Args) -> Result<Args>,
{
    let result = serve(&stream, serializer.as_ref(), &handler);
    if let Err(ref e) = result {
        tracing::error!(error = %e, "blocking child terminated");
        let _ = stream.shutdown(Shutdown::Both);
    }
    result
}

fn serve<H>(stream: &UnixStream, serializer: &dyn Serializer, handler: &H) -> Result<()>
where
    H: Fn(&Emitter<'_>, Args) -> Result<Args>,
{
    let mut rbuf = FrameBuffer::new();
    let emitter = Emitter { stream, serializer };

    loop {
        let n = rbuf.read_from(&mut &*stream)?;
        if n == 0 {
            tracing::debug!("parent closed; child exiting");
            let _ = stream.shutdown(Shutdown::Write);
            return Ok(());
        }

        while let Some(frame) = rbuf.extract()? {
            if frame.is_event() {
                return Err(ForkwireError::Protocol(
                    "unexpected event frame from parent".to_string(),
                ));
            }

            let args = serializer.decode(&frame.payload)?;
            tracing::trace!(id = frame.id(), "request dispatched");
            let ret = handler(&emitter, args)?;

            let payload = serializer.encode(&ret)?;
            let response = wire::encode_response(frame.id(), &payload)?;
            let mut writer = stream;
            writer.write_all(&response)?;
        }
    }
}
