//! mirrorsync - mirror filesystem changes into a target directory.
//!
//! The crate has two halves: [`watch`] turns raw inotify notifications
//! into semantic filesystem events over a set of watched roots, and
//! [`sync`] buffers those events in debouncing queues that coalesce
//! bursts before a backend applies them. [`bwt`] carries the byte codec
//! used for compacting transferred content.

pub mod bwt;
pub mod cli;
pub mod sync;
pub mod watch;
