//! Kernel event source.
//!
//! The engine only ever talks to the [`EventSource`] trait, so the state
//! machine stays independent of the real inotify descriptor and can be
//! driven by scripted events in tests. [`InotifySource`] is the production
//! implementation on top of the `inotify` crate's async event stream.

use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use inotify::{EventStream, Inotify, WatchDescriptor, WatchMask, Watches};
use tracing::trace;

use super::event::RawEvent;

/// Size of the kernel read buffer. Must hold at least one maximal event:
/// the fixed event header plus NAME_MAX + 1 bytes of name.
const READ_BUFFER_SIZE: usize = 4096;

/// Abstraction over the kernel notification channel.
#[async_trait]
pub trait EventSource: Send {
    /// Register a watch on `path`, returning the kernel watch descriptor.
    fn add_watch(&mut self, path: &Path) -> io::Result<i32>;

    /// Drop the watch behind `wd`. Failures are reported by the caller
    /// but never fatal; the descriptor may already be gone.
    fn remove_watch(&mut self, wd: i32) -> io::Result<()>;

    /// Wait for the next event. Returns `Ok(None)` when `timeout` elapses
    /// without one; that silence is itself a signal (it terminates a
    /// stranded rename).
    async fn next_event(&mut self, timeout: Duration) -> io::Result<Option<RawEvent>>;
}

/// Production [`EventSource`] reading from an inotify file descriptor.
///
/// The descriptor is opened close-on-exec by the crate; watches are added
/// with DONT_FOLLOW and EXCL_UNLINK on top of the subscription mask. The
/// descriptor closes when the source is dropped.
pub struct InotifySource {
    stream: EventStream<Vec<u8>>,
    watches: Watches,
    mask: WatchMask,
    descriptors: HashMap<i32, WatchDescriptor>,
}

impl InotifySource {
    pub fn new(mask: WatchMask) -> io::Result<Self> {
        let inotify = Inotify::init()?;
        let stream = inotify.into_event_stream(vec![0u8; READ_BUFFER_SIZE])?;
        let watches = stream.watches();
        Ok(Self {
            stream,
            watches,
            mask: mask | WatchMask::DONT_FOLLOW | WatchMask::EXCL_UNLINK,
            descriptors: HashMap::new(),
        })
    }
}

#[async_trait]
impl EventSource for InotifySource {
    fn add_watch(&mut self, path: &Path) -> io::Result<i32> {
        let descriptor = self.watches.add(path, self.mask)?;
        let wd = descriptor.get_watch_descriptor_id();
        self.descriptors.insert(wd, descriptor);
        Ok(wd)
    }

    fn remove_watch(&mut self, wd: i32) -> io::Result<()> {
        match self.descriptors.remove(&wd) {
            Some(descriptor) => self.watches.remove(descriptor),
            None => Ok(()),
        }
    }

    async fn next_event(&mut self, timeout: Duration) -> io::Result<Option<RawEvent>> {
        match tokio::time::timeout(timeout, self.stream.next()).await {
            Err(_) => Ok(None),
            Ok(None) => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "inotify event stream closed",
            )),
            Ok(Some(Err(err))) => Err(err),
            Ok(Some(Ok(event))) => {
                let raw = RawEvent {
                    wd: event.wd.get_watch_descriptor_id(),
                    mask: event.mask,
                    cookie: event.cookie,
                    name: event.name,
                };
                trace!(wd = raw.wd, cookie = raw.cookie, "kernel event");
                Ok(Some(raw))
            }
        }
    }
}
