//! The sync pipeline: watch engine -> front queue -> main queue -> backend.
//!
//! Four tasks wired by unbounded channels, message passing only:
//! - the watcher owns the watch table and enqueues one [`Request`] per
//!   semantic event,
//! - the front queue smooths bursts with a short delay,
//! - the main queue holds requests longer and accepts out-of-band input,
//! - the backend applies whatever survives coalescing.

pub mod backend;
pub mod paths;
pub mod queue;
pub mod request;

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc::unbounded_channel;
use tracing::{debug, info};

use crate::watch::{default_watch_mask, process_notify_events, WatchCallbacks};

pub use backend::backend_task;
pub use paths::{absolutize, clean, rename_orig, sync_name};
pub use queue::{queue_task, DEFAULT_FRONT_DELAY, DEFAULT_MAIN_DELAY};
pub use request::{Request, SyncTarget};

/// Configuration of one pipeline run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub target: PathBuf,
    pub includes: Vec<PathBuf>,
    pub excludes: Vec<PathBuf>,
    pub front_delay: Duration,
    pub main_delay: Duration,
}

impl SyncOptions {
    pub fn new(target: PathBuf, includes: Vec<PathBuf>, excludes: Vec<PathBuf>) -> Self {
        Self {
            target,
            includes,
            excludes,
            front_delay: DEFAULT_FRONT_DELAY,
            main_delay: DEFAULT_MAIN_DELAY,
        }
    }
}

/// Spawn the queue and backend tasks, run the watcher to completion, and
/// return its exit code. The queues drain downstream when the watcher
/// ends, so nothing buffered is lost on shutdown.
pub async fn start_all(options: SyncOptions) -> i32 {
    let (front_tx, front_rx) = unbounded_channel();
    let (main_tx, main_rx) = unbounded_channel();
    let (oob_tx, oob_rx) = unbounded_channel();
    let (backend_tx, backend_rx) = unbounded_channel();

    tokio::spawn(queue_task(front_rx, None, main_tx, options.front_delay));
    tokio::spawn(queue_task(
        main_rx,
        Some(oob_rx),
        backend_tx,
        options.main_delay,
    ));
    let backend = tokio::spawn(backend_task(backend_rx));

    let target = SyncTarget::new(&options.target);
    let callbacks = WatchCallbacks {
        init: Some(Box::new(|| {
            info!("all watches are set up, processing events");
        })),
        report: Some(Box::new(|text, event| {
            debug!(cookie = event.cookie, "{text}");
        })),
        event: Some(Box::new(move |event| {
            let _ = front_tx.send(Request::new(&target, &event));
        })),
    };

    let code = process_notify_events(
        options.includes,
        options.excludes,
        default_watch_mask(),
        callbacks,
    )
    .await;

    // Closing the out-of-band inbox lets the main stage drain and the
    // backend finish before we report the exit code.
    drop(oob_tx);
    let _ = backend.await;
    code
}
