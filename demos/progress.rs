//! Progress worker - cooperative mode with timer-driven events.
//!
//! The child handler is picked from a registry by the name carried in
//! the parent's init pass-through. Each request counts down on a timer,
//! emitting a progress event per tick before responding; replies
//! overtake each other while every event still lands ahead of its own
//! reply.
//!
//! ```sh
//! cargo run --example progress
//! ```

use std::sync::Arc;
use std::time::Duration;

use forkwire::child::cooperative::{self, Done, Emitter};
use forkwire::serializer::{args, Args, LengthPrefixed};
use forkwire::{parent, HandlerRegistry, Mode, Options};
use tokio::sync::oneshot;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut registry = HandlerRegistry::new();
    registry.register_cooperative(
        "countdown",
        |done: Done, emitter: Emitter, args_in: Args| async move {
            let count: u64 = String::from_utf8_lossy(&args_in[0]).parse().unwrap_or(0);
            for tick in 1..=count {
                tokio::time::sleep(Duration::from_millis(100)).await;
                emitter.emit(args([args_in[0].clone(), tick.to_string().into()]));
            }
            done.respond(args_in);
        },
    );

    let (parent_end, child_end) = tokio::net::UnixStream::pair()?;

    let options = Options::new(Mode::Cooperative)
        .init("countdown")
        .on_event(|values| {
            println!(
                "progress: job {} tick {}",
                String::from_utf8_lossy(&values[0]),
                String::from_utf8_lossy(&values[1]),
            );
        });

    let name = String::from_utf8(options.init_data().expect("init set").to_vec())?;
    let handler = registry.cooperative(&name)?;

    let engine = tokio::spawn(cooperative::run(
        child_end,
        Arc::new(LengthPrefixed),
        move |done, emitter, args_in| handler(done, emitter, args_in),
        cooperative::Options::new().exit_hook(|| {}),
    ));

    let (done_tx, done_rx) = oneshot::channel();
    let handle = parent::spawn(
        parent_end,
        options.on_destroy(move || {
            let _ = done_tx.send(());
        }),
    );

    for count in ["3", "2", "1"] {
        handle.invoke(args([count]), move |_reply| {
            println!("job {} finished", count);
        });
    }

    drop(handle);
    done_rx.await?;
    engine.await??;
    Ok(())
}
