//! Downstream consumer of released requests.
//!
//! The channel feeding this task is the seam for a real sync backend;
//! the default consumer only records what it would apply.

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::info;

use super::request::Request;

/// Drain released requests until the pipeline shuts down.
pub async fn backend_task(mut inbox: UnboundedReceiver<Request>) {
    while let Some(request) = inbox.recv().await {
        info!(
            kind = ?request.kind,
            source = %request.source.display(),
            dest = %request.dest.display(),
            is_dir = request.is_dir,
            "backend request"
        );
    }
}
