//! The debouncing request queue.
//!
//! Each stage is one task owning a FIFO and a single armed timer. A
//! request sits for at least the stage delay, measured from its arrival;
//! every insertion re-coalesces the queue, so bursts collapse before
//! anything escapes downstream. The main stage additionally multiplexes
//! an out-of-band inbox.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, trace};

use super::request::{coalesce, Request};

/// Default hold time of the front stage, smoothing bursts at the
/// filesystem boundary.
pub const DEFAULT_FRONT_DELAY: Duration = Duration::from_secs(5);

/// Default hold time of the main stage, letting renames and deletes
/// settle before side effects escape.
pub const DEFAULT_MAIN_DELAY: Duration = Duration::from_secs(15);

/// Run one queue stage until its inbox closes, then flush what is left.
///
/// `oob` is the main stage's side inbox for out-of-band requests; the
/// front stage passes `None`.
pub async fn queue_task(
    mut inbox: UnboundedReceiver<Request>,
    mut oob: Option<UnboundedReceiver<Request>>,
    out: UnboundedSender<Request>,
    delay: Duration,
) {
    let mut queue: VecDeque<Request> = VecDeque::new();
    loop {
        // One timer, armed for the head of the queue.
        let deadline = queue.front().map(|request| request.arrived + delay);
        tokio::select! {
            received = inbox.recv() => match received {
                Some(request) => insert(&mut queue, request),
                None => break,
            },
            received = recv_oob(&mut oob), if oob.is_some() => match received {
                Some(request) => insert(&mut queue, request),
                None => oob = None,
            },
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                release_due(&mut queue, &out, delay);
            }
        }
    }
    // Upstream is gone; hand over whatever is still pending.
    for request in queue {
        let _ = out.send(request);
    }
}

fn insert(queue: &mut VecDeque<Request>, request: Request) {
    trace!(kind = ?request.kind, source = %request.source.display(), "queued");
    queue.push_back(request);
    coalesce(queue);
}

fn release_due(queue: &mut VecDeque<Request>, out: &UnboundedSender<Request>, delay: Duration) {
    let now = Instant::now();
    while let Some(front) = queue.front() {
        if now < front.arrived + delay {
            break;
        }
        if let Some(request) = queue.pop_front() {
            debug!(kind = ?request.kind, source = %request.source.display(), "released");
            let _ = out.send(request);
        }
    }
}

async fn recv_oob(oob: &mut Option<UnboundedReceiver<Request>>) -> Option<Request> {
    match oob {
        Some(receiver) => receiver.recv().await,
        None => std::future::pending().await,
    }
}
