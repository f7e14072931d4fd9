//! Ctrl-C delivery for the prompt and turn loops.

use std::future::Future;

use tokio::sync::mpsc;
use tracing::debug;

/// Forwards every Ctrl-C to the returned channel for the life of the process.
/// Interrupts that land while nothing is waiting stay queued.
pub fn listen_for_interrupts() -> mpsc::UnboundedReceiver<()> {
    forward_interrupts(tokio::signal::ctrl_c)
}

/// Sends one message per completed `next()` until it errors or the receiver
/// is dropped.
fn forward_interrupts<F, Fut>(mut next: F) -> mpsc::UnboundedReceiver<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = std::io::Result<()>> + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        loop {
            if let Err(err) = next().await {
                debug!(event = "cli.interrupts_closed", domain = "cli", error = %err);
                break;
            }
            if tx.send(()).is_err() {
                break;
            }
        }
    });
    rx
}
