//! Echo worker - blocking mode end-to-end over a socketpair.
//!
//! Runs both endpoints in one process: the serial child engine on a
//! thread (standing in for the forked child), the parent dispatcher on
//! the tokio side.
//!
//! ```sh
//! cargo run --example echo
//! ```

use std::sync::Arc;

use forkwire::child::blocking;
use forkwire::serializer::{args, LengthPrefixed};
use forkwire::{parent, Mode, Options};
use tokio::sync::oneshot;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let (parent_end, child_end) = std::os::unix::net::UnixStream::pair()?;

    let child = std::thread::spawn(move || {
        blocking::run(child_end, Arc::new(LengthPrefixed), |_emitter, args| Ok(args))
    });

    parent_end.set_nonblocking(true)?;
    let stream = tokio::net::UnixStream::from_std(parent_end)?;

    let (done_tx, done_rx) = oneshot::channel();
    let handle = parent::spawn(
        stream,
        Options::new(Mode::Blocking).on_destroy(move || {
            let _ = done_tx.send(());
        }),
    );

    for word in ["hello", "echo", "world"] {
        handle.invoke(args([word]), move |reply| {
            println!("{} -> {}", word, String::from_utf8_lossy(&reply[0]));
        });
    }

    drop(handle);
    done_rx.await?;
    child.join().expect("child thread panicked")?;
    Ok(())
}
