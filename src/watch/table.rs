//! The watch table and its event state machine.
//!
//! The table owns the dirent tree mirroring the watched roots, the
//! per-inode records, and the three lookup maps (watch descriptor, inode
//! key, move cookie). Raw kernel events mutate the mirror and are
//! condensed into semantic [`FsEvent`]s: MOVED_FROM/MOVED_TO pairs become
//! one MOVE, MODIFY followed by CLOSE_WRITE becomes one CHANGE, a CREATE
//! whose inode is already known becomes a LINK.

use std::collections::{HashMap, HashSet};
use std::ffi::OsStr;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use inotify::EventMask;
use thiserror::Error;
use tracing::{debug, trace, warn};

use super::dirent::{Arena, Dirent, DirentId, FileKind, InodeId, InodeKey, InodeRec};
use super::event::{mask_to_string, EventKind, FsEvent, RawEvent, WatchCallbacks};
use super::source::EventSource;
use crate::sync::paths::absolutize;

/// How long one read may wait before silence is treated as the
/// terminator for a stranded rename.
pub const READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Process exit code for a panicked watcher task.
pub const ABNORMAL_EXIT: i32 = 99;

/// Terminal conditions of the watch loop. Each maps to the process exit
/// code callers of [`process_notify_events`] receive.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("nothing to watch")]
    NothingToWatch,
    #[error("event source failed: {0}")]
    Source(#[from] io::Error),
    #[error("kernel event queue overflowed")]
    Overflow,
    #[error("event carries no watch descriptor")]
    MalformedEvent,
    #[error("watch table diverged from kernel state at {path}")]
    Inconsistency { path: PathBuf },
}

impl WatchError {
    pub fn exit_code(&self) -> i32 {
        match self {
            WatchError::NothingToWatch | WatchError::Source(_) => 1,
            WatchError::Overflow => 2,
            WatchError::MalformedEvent => 3,
            WatchError::Inconsistency { .. } => 64,
        }
    }
}

/// Engine-wide state: the dirent mirror plus every index over it.
pub struct WatchTable<S> {
    dirents: Arena<Dirent>,
    inode_recs: Arena<InodeRec>,
    /// wd of a watched directory -> its dirent.
    wd_index: HashMap<i32, DirentId>,
    /// (dev, ino) -> inode record.
    inodes: HashMap<InodeKey, InodeId>,
    /// Move cookie -> dirent detached for a pending rename.
    moved: HashMap<u32, DirentId>,
    /// Absolute paths never watched nor recursed into.
    excludes: HashSet<PathBuf>,
    /// Cookie of the most recent MOVED_FROM, cleared by the next event.
    pending_cookie: Option<u32>,
    /// Synthetic root whose children are the registered roots.
    root: DirentId,
    source: S,
    callbacks: WatchCallbacks,
    read_timeout: Duration,
}

impl<S: EventSource> WatchTable<S> {
    pub fn new(source: S, callbacks: WatchCallbacks) -> Self {
        let mut dirents: Arena<Dirent> = Arena::new();
        let root = dirents.alloc(Dirent::new(Default::default(), None));
        Self {
            dirents,
            inode_recs: Arena::new(),
            wd_index: HashMap::new(),
            inodes: HashMap::new(),
            moved: HashMap::new(),
            excludes: HashSet::new(),
            pending_cookie: None,
            root,
            source,
            callbacks,
            read_timeout: READ_TIMEOUT,
        }
    }

    /// Number of directories currently holding a kernel watch.
    pub fn watch_count(&self) -> usize {
        self.wd_index.len()
    }

    /// Build the mirror: record the exclusions, then lstat each root,
    /// walk it recursively, and install a watch on every directory seen.
    /// The `init` callback fires once everything is in place.
    pub fn register(&mut self, includes: &[PathBuf], excludes: &[PathBuf]) {
        for path in excludes {
            self.excludes.insert(absolutize(path));
        }
        for path in includes {
            let name = absolutize(path).into_os_string();
            if let Some(id) = self.stat_new_file(self.root, &name) {
                if self.kind_of(id) == Some(FileKind::Directory)
                    && self.walk_directory(id, false).is_ok()
                {
                    self.add_watch(id);
                }
            }
        }
        self.dump();
        if let Some(init) = self.callbacks.init.as_mut() {
            init();
        }
    }

    /// Watch loop: read events until the table runs out of watches or the
    /// source fails. A read timeout with a rename still pending produces
    /// the synthetic terminator for it.
    pub async fn run(&mut self) -> Result<(), WatchError> {
        if self.wd_index.is_empty() {
            return Err(WatchError::NothingToWatch);
        }
        loop {
            let event = self.source.next_event(self.read_timeout).await?;
            self.process_event(event.as_ref())?;
            if self.wd_index.is_empty() {
                return Ok(());
            }
        }
    }

    /// Process one read result (`None` = timeout). The pre-pass settles a
    /// pending MOVED_FROM first: any continuation other than MOVED_TO or
    /// MOVE_SELF means the file left the watched set.
    pub(crate) fn process_event(&mut self, event: Option<&RawEvent>) -> Result<(), WatchError> {
        if let Some(cookie) = self.pending_cookie.take() {
            let stranded = match event {
                None => true,
                Some(ev) => !ev
                    .mask
                    .intersects(EventMask::MOVED_TO | EventMask::MOVE_SELF),
            };
            if stranded {
                if let Some(&parked) = self.moved.get(&cookie) {
                    let synthetic = RawEvent::synthetic_move_self();
                    self.process_self(&synthetic, parked);
                }
            }
        }

        let Some(event) = event else {
            return Ok(());
        };
        self.report(event);

        if event.mask.contains(EventMask::Q_OVERFLOW) {
            return Err(WatchError::Overflow);
        }
        if event.wd == 0 {
            return Err(WatchError::MalformedEvent);
        }
        // Unknown descriptors race against IGNORED and watch removal.
        let Some(&id) = self.wd_index.get(&event.wd) else {
            return Ok(());
        };
        match event.name.as_deref() {
            Some(name) if !name.is_empty() => self.process_subfile(event, id, name),
            _ => {
                self.process_self(event, id);
                Ok(())
            }
        }
    }

    /// Events about the watched directory itself (no child name).
    fn process_self(&mut self, event: &RawEvent, id: DirentId) {
        let mask = event.mask;
        if mask.contains(EventMask::IGNORED) {
            // The kernel already dropped this watch.
            self.forget_watch(id);
        } else if mask.contains(EventMask::MOVE_SELF) {
            // Either the MOVED_FROM was never matched, or the entry moved
            // straight out of a registered root.
            if self.dirents[id].cookie != 0 || self.dirents[id].parent == Some(self.root) {
                self.emit_delete(id);
                self.remove_hierarchy(id);
                self.pending_cookie = None;
            }
        } else if mask.contains(EventMask::DELETE_SELF) {
            if self.dirents[id].parent == Some(self.root) {
                // A registered root was deleted; its watch died with it.
                self.forget_watch(id);
                self.emit_delete(id);
                self.remove_hierarchy(id);
            }
        } else if mask.contains(EventMask::ATTRIB) {
            self.process_attribute(id);
        }
    }

    /// Events carrying a child name, dispatched by the highest-priority
    /// bit in the mask.
    fn process_subfile(
        &mut self,
        event: &RawEvent,
        id: DirentId,
        name: &OsStr,
    ) -> Result<(), WatchError> {
        if self.excludes.contains(&self.path2(id, name)) {
            return Ok(());
        }
        let mask = event.mask;
        if mask.contains(EventMask::CREATE) {
            self.process_create(id, name);
        } else if mask.contains(EventMask::MOVED_FROM) {
            let child = self.child(id, name)?;
            self.process_moved_from(event, child);
        } else if mask.contains(EventMask::MOVED_TO) {
            self.process_moved_to(event, id, name);
        } else if mask.contains(EventMask::DELETE) {
            let child = self.child(id, name)?;
            self.process_delete(child);
        } else if mask.contains(EventMask::MODIFY) {
            let child = self.child(id, name)?;
            self.mark_seen(child, EventMask::MODIFY);
        } else if mask.contains(EventMask::CLOSE_WRITE) {
            let child = self.child(id, name)?;
            self.process_close(child);
        } else if mask.contains(EventMask::ATTRIB) {
            let child = self.child(id, name)?;
            self.process_attribute(child);
        }
        Ok(())
    }

    /// A name appeared: mirror it, report CREATE (or LINK when the inode
    /// is already known through another name), and recursively discover
    /// the contents of a new directory.
    fn process_create(&mut self, id: DirentId, name: &OsStr) {
        let Some(new_id) = self.stat_new_file(id, name) else {
            return;
        };
        let sibling = self.dirents[new_id].next;
        let is_dir = self.kind_of(new_id) == Some(FileKind::Directory);
        match sibling {
            Some(other) if !is_dir => {
                let path2 = Some(self.path_of(other));
                self.emit(EventKind::Link, new_id, path2, false);
            }
            _ => self.emit(EventKind::Create, new_id, None, false),
        }
        if is_dir {
            // Contents may have appeared before the watch is in place;
            // rescan and announce whatever is found.
            if self.walk_directory(new_id, true).is_ok() {
                self.add_watch(new_id);
            }
        }
    }

    /// First half of a rename: detach the dirent and park it under the
    /// event cookie until its MOVED_TO (or a terminator) arrives.
    fn process_moved_from(&mut self, event: &RawEvent, id: DirentId) {
        let dirent = &mut self.dirents[id];
        dirent.cookie = event.cookie;
        let name = dirent.name.clone();
        if let Some(parent) = dirent.parent {
            self.dirents[parent].children.remove(&name);
        }
        self.moved.insert(event.cookie, id);
        self.dequeue(id);
        self.pending_cookie = Some(event.cookie);
    }

    /// Second half of a rename. Without a matching cookie the entry came
    /// from outside the watched set and is treated as a plain CREATE.
    fn process_moved_to(&mut self, event: &RawEvent, id: DirentId, name: &OsStr) {
        let Some(moved_id) = self.moved.remove(&event.cookie) else {
            self.process_create(id, name);
            return;
        };
        // A rename over an existing name replaces it without a DELETE.
        if let Some(&existing) = self.dirents[id].children.get(name) {
            if existing != moved_id {
                self.remove_hierarchy(existing);
            }
        }
        let old_path = self.path_of(moved_id);
        let dirent = &mut self.dirents[moved_id];
        dirent.cookie = 0;
        dirent.name = name.to_os_string();
        dirent.parent = Some(id);
        self.dirents[id].children.insert(name.to_os_string(), moved_id);
        if let Some(inode) = self.dirents[moved_id].inode {
            self.dirents[moved_id].next = self.inode_recs[inode].first;
            self.inode_recs[inode].first = Some(moved_id);
        }
        self.emit(EventKind::Move, moved_id, Some(old_path), false);
    }

    /// A name disappeared. Data survives if the inode keeps another name
    /// inside the watched set; the event then carries that path.
    fn process_delete(&mut self, id: DirentId) {
        self.emit_delete(id);
        self.remove_hierarchy(id);
    }

    /// CLOSE_WRITE concludes a change, but only when a MODIFY was seen
    /// since the last one: open-then-close alone stays silent.
    fn process_close(&mut self, id: DirentId) {
        let Some(inode) = self.dirents[id].inode else {
            return;
        };
        if self.inode_recs[inode].seen_mask.contains(EventMask::MODIFY) {
            self.inode_recs[inode].seen_mask |= EventMask::CLOSE_WRITE;
            if self.inode_recs[inode].is_change_complete() {
                self.inode_recs[inode].reset_changed();
                self.emit(EventKind::Change, id, None, true);
            }
        }
    }

    /// ATTRIB is released per occurrence; the bit round-trips through the
    /// record so the aggregation protocol stays uniform.
    fn process_attribute(&mut self, id: DirentId) {
        let Some(inode) = self.dirents[id].inode else {
            return;
        };
        self.inode_recs[inode].seen_mask |= EventMask::ATTRIB;
        if self.inode_recs[inode].is_attribute_complete() {
            self.inode_recs[inode].reset_attribute();
            self.emit(EventKind::Attribute, id, None, false);
        }
    }

    fn mark_seen(&mut self, id: DirentId, bits: EventMask) {
        if let Some(inode) = self.dirents[id].inode {
            self.inode_recs[inode].seen_mask |= bits;
        }
    }

    /// Insert all data for a newly detected file, directory, or symlink:
    /// a fresh or refreshed inode record plus a dirent prepended to the
    /// record's hard-link list. Refuses while any ancestor is parked for
    /// a rename, for excluded paths, and for untracked file modes.
    fn stat_new_file(&mut self, parent: DirentId, name: &OsStr) -> Option<DirentId> {
        if self.inherited_cookie(parent) != 0 {
            return None;
        }
        let path = self.path2(parent, name);
        if self.excludes.contains(&path) {
            return None;
        }
        let metadata = match std::fs::symlink_metadata(&path) {
            Ok(metadata) => metadata,
            Err(err) => {
                // The entry may already be gone again; drop the event.
                warn!("lstat {} failed: {err}", path.display());
                return None;
            }
        };
        let kind = FileKind::from_file_type(metadata.file_type())?;
        let key = InodeKey::from_metadata(&metadata);

        // A create can land on a name already mirrored (a rescan racing
        // its own queued events); the stale entry gives way silently.
        if let Some(&existing) = self.dirents[parent].children.get(name) {
            self.remove_hierarchy(existing);
        }

        let (inode, saved_first) = match self.inodes.get(&key) {
            Some(&inode) => {
                let rec = &mut self.inode_recs[inode];
                rec.kind = kind;
                (inode, rec.first)
            }
            None => {
                let inode = self.inode_recs.alloc(InodeRec::new(key, kind));
                self.inodes.insert(key, inode);
                (inode, None)
            }
        };

        let mut dirent = Dirent::new(name.to_os_string(), Some(parent));
        dirent.inode = Some(inode);
        dirent.next = saved_first;
        let new_id = self.dirents.alloc(dirent);
        self.dirents[parent]
            .children
            .insert(name.to_os_string(), new_id);
        self.inode_recs[inode].first = Some(new_id);
        Some(new_id)
    }

    /// Read the directory behind `id` and mirror each entry, recursing
    /// into subdirectories. With `announce` set every discovered entry is
    /// reported as CREATE (the post-create rescan).
    fn walk_directory(&mut self, id: DirentId, announce: bool) -> io::Result<()> {
        let dir = self.path_of(id);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("readdir {} failed: {err}", dir.display());
                return Err(err);
            }
        };
        let mut names: Vec<_> = entries
            .filter_map(|entry| entry.ok().map(|e| e.file_name()))
            .collect();
        names.sort();
        for name in names {
            self.discover(id, &name, announce);
        }
        Ok(())
    }

    fn discover(&mut self, parent: DirentId, name: &OsStr, announce: bool) {
        let Some(new_id) = self.stat_new_file(parent, name) else {
            return;
        };
        if announce {
            self.emit(EventKind::Create, new_id, None, false);
        }
        if self.kind_of(new_id) == Some(FileKind::Directory)
            && self.walk_directory(new_id, announce).is_ok()
        {
            self.add_watch(new_id);
        }
    }

    fn add_watch(&mut self, id: DirentId) {
        let path = self.path_of(id);
        match self.source.add_watch(&path) {
            Ok(wd) => {
                debug!("node+ {} {}", wd, path.display());
                self.dirents[id].wd = wd;
                self.wd_index.insert(wd, id);
            }
            Err(err) => {
                // The dirent stays in the mirror, just without a watch.
                warn!("add watch {} failed: {err}", path.display());
            }
        }
    }

    /// Release the kernel watch and the index entry behind `id`.
    fn remove_watch(&mut self, id: DirentId) {
        let wd = self.dirents[id].wd;
        if wd > 0 {
            debug!("node- {} {}", wd, self.path_of(id).display());
            if let Err(err) = self.source.remove_watch(wd) {
                trace!("remove watch {wd} failed: {err}");
            }
            self.forget_watch(id);
        }
    }

    /// Drop the index entry without telling the kernel (its watch is
    /// already gone).
    fn forget_watch(&mut self, id: DirentId) {
        let wd = self.dirents[id].wd;
        if wd > 0 {
            self.wd_index.remove(&wd);
            self.dirents[id].wd = 0;
        }
    }

    /// Tear down `id` and everything below it: watches, index entries,
    /// inode list membership, and finally the arena slots.
    fn remove_hierarchy(&mut self, id: DirentId) {
        self.unlink(id);
        self.remove_hierarchy_rec(id);
    }

    fn remove_hierarchy_rec(&mut self, id: DirentId) {
        self.remove_watch(id);
        let children = std::mem::take(&mut self.dirents[id].children);
        for (_, child) in children {
            self.remove_hierarchy_rec(child);
        }
        self.dequeue_and_maybe_free_status(id);
        self.dirents.free(id);
    }

    /// Detach `id` from wherever it is linked: the cookie table while a
    /// rename is pending, its parent's children map otherwise.
    fn unlink(&mut self, id: DirentId) {
        let cookie = self.dirents[id].cookie;
        if cookie != 0 {
            self.moved.remove(&cookie);
        } else if let Some(parent) = self.dirents[id].parent {
            let name = self.dirents[id].name.clone();
            self.dirents[parent].children.remove(&name);
        }
    }

    /// Unlink from the inode list and drop the record once its last
    /// referencing dirent is gone.
    fn dequeue_and_maybe_free_status(&mut self, id: DirentId) {
        self.dequeue(id);
        if let Some(inode) = self.dirents[id].inode {
            if self.inode_recs[inode].first.is_none() {
                if let Some(rec) = self.inode_recs.free(inode) {
                    self.inodes.remove(&rec.key);
                }
            }
        }
    }

    /// Remove `id` from its inode's intrusive list.
    fn dequeue(&mut self, id: DirentId) {
        let Some(inode) = self.dirents[id].inode else {
            return;
        };
        let next_of_id = self.dirents[id].next.take();
        if self.inode_recs[inode].first == Some(id) {
            self.inode_recs[inode].first = next_of_id;
            return;
        }
        let mut cursor = self.inode_recs[inode].first;
        while let Some(current) = cursor {
            let next = self.dirents[current].next;
            if next == Some(id) {
                self.dirents[current].next = next_of_id;
                return;
            }
            cursor = next;
        }
    }

    /// Another dirent sharing this inode, if any: "is there still a
    /// surviving hard link inside the watched set?"
    fn alternative(&self, id: DirentId) -> Option<DirentId> {
        let inode = self.dirents[id].inode?;
        let mut cursor = self.inode_recs[inode].first;
        while let Some(current) = cursor {
            if current != id {
                return Some(current);
            }
            cursor = self.dirents[current].next;
        }
        None
    }

    /// Child lookup; a missing name for a named kernel event means the
    /// mirror diverged from the kernel and processing cannot continue.
    fn child(&self, id: DirentId, name: &OsStr) -> Result<DirentId, WatchError> {
        match self.dirents[id].children.get(name) {
            Some(&child) => Ok(child),
            None => Err(WatchError::Inconsistency {
                path: self.path2(id, name),
            }),
        }
    }

    /// Nearest nonzero cookie on the path to the root, else 0.
    fn inherited_cookie(&self, id: DirentId) -> u32 {
        let dirent = &self.dirents[id];
        if dirent.cookie != 0 || dirent.parent.is_none() {
            return dirent.cookie;
        }
        self.inherited_cookie(dirent.parent.unwrap_or(self.root))
    }

    /// Join the names from the root down to `id`; the synthetic root
    /// contributes nothing.
    fn path_of(&self, id: DirentId) -> PathBuf {
        let mut names = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let dirent = &self.dirents[current];
            if !dirent.name.is_empty() {
                names.push(dirent.name.clone());
            }
            cursor = dirent.parent;
        }
        let mut path = PathBuf::new();
        for name in names.iter().rev() {
            path.push(name);
        }
        path
    }

    fn path2(&self, id: DirentId, name: &OsStr) -> PathBuf {
        self.path_of(id).join(name)
    }

    fn kind_of(&self, id: DirentId) -> Option<FileKind> {
        self.dirents[id].inode.map(|inode| self.inode_recs[inode].kind)
    }

    fn key_of(&self, id: DirentId) -> InodeKey {
        self.dirents[id]
            .inode
            .map(|inode| self.inode_recs[inode].key)
            .unwrap_or_default()
    }

    fn emit_delete(&mut self, id: DirentId) {
        let path2 = self.alternative(id).map(|alt| self.path_of(alt));
        let data_modified = path2.is_none();
        self.emit(EventKind::Delete, id, path2, data_modified);
    }

    fn emit(&mut self, kind: EventKind, id: DirentId, path2: Option<PathBuf>, data_modified: bool) {
        let event = FsEvent {
            kind,
            is_dir: self.kind_of(id) == Some(FileKind::Directory),
            data_modified,
            path: self.path_of(id),
            path2,
            key: self.key_of(id),
        };
        if let Some(callback) = self.callbacks.event.as_mut() {
            callback(event);
        }
    }

    fn report(&mut self, event: &RawEvent) {
        if let Some(report) = self.callbacks.report.as_mut() {
            let text = format!(
                "wd={} mask={} cookie={}",
                event.wd,
                mask_to_string(event.mask),
                event.cookie
            );
            report(&text, event);
        }
    }

    /// Pre-order dump of the mirror at debug level.
    fn dump(&self) {
        if !tracing::enabled!(tracing::Level::DEBUG) {
            return;
        }
        for (&wd, &id) in &self.wd_index {
            debug!("node: {} => {}", wd, self.path_of(id).display());
        }
        self.walk(self.root, 0, &mut |table, id, depth| {
            let dirent = &table.dirents[id];
            let indent = " ".repeat(depth * 2);
            debug!(
                "{}{} ({})",
                indent,
                dirent.name.to_string_lossy(),
                table.key_of(id)
            );
        });
    }

    /// Pre-order traversal over the dirent tree.
    fn walk(&self, id: DirentId, depth: usize, action: &mut dyn FnMut(&Self, DirentId, usize)) {
        action(self, id, depth);
        let children: Vec<DirentId> = self.dirents[id].children.values().copied().collect();
        for child in children {
            self.walk(child, depth + 1, action);
        }
    }
}

/// Run the full watch pipeline: open the kernel source, mirror and watch
/// the `includes` (minus `excludes`), then convert raw events until a
/// terminal condition.
///
/// Exit codes: 0 normal, 1 nothing to watch or source failure, 2 kernel
/// queue overflow, 3 malformed event, 64 internal inconsistency, 99 for a
/// panicked watcher task.
pub async fn process_notify_events(
    includes: Vec<PathBuf>,
    excludes: Vec<PathBuf>,
    mask: inotify::WatchMask,
    callbacks: WatchCallbacks,
) -> i32 {
    let watcher = tokio::spawn(async move {
        let source = super::source::InotifySource::new(mask)?;
        let mut table = WatchTable::new(source, callbacks);
        table.register(&includes, &excludes);
        table.run().await
    });
    match watcher.await {
        Ok(Ok(())) => 0,
        Ok(Err(err)) => {
            warn!("watcher stopped: {err}");
            err.exit_code()
        }
        Err(err) => {
            warn!("watcher task aborted: {err}");
            ABNORMAL_EXIT
        }
    }
}

#[cfg(test)]
impl<S: EventSource> WatchTable<S> {
    /// Audit every structural invariant of the mirror. Called after each
    /// processed event in the state machine tests.
    fn check_invariants(&self) {
        let parked: HashSet<DirentId> = self.moved.values().copied().collect();

        for (id, dirent) in self.dirents.entries() {
            if id == self.root {
                assert_eq!(dirent.cookie, 0);
                assert!(dirent.parent.is_none());
                continue;
            }
            if dirent.cookie != 0 {
                assert_eq!(self.moved.get(&dirent.cookie), Some(&id));
            } else {
                let parent = dirent.parent.expect("non-root dirent without parent");
                assert_eq!(
                    self.dirents[parent].children.get(&dirent.name),
                    Some(&id),
                    "dirent {:?} not linked from its parent",
                    dirent.name
                );
            }
            if dirent.wd > 0 {
                assert_eq!(self.wd_index.get(&dirent.wd), Some(&id));
            }
        }

        for (&wd, &id) in &self.wd_index {
            assert!(wd > 0);
            assert_eq!(self.dirents[id].wd, wd);
        }

        assert_eq!(self.inodes.len(), self.inode_recs.entries().count());
        for (inode, rec) in self.inode_recs.entries() {
            assert_eq!(self.inodes.get(&rec.key), Some(&inode));
            let mut seen = HashSet::new();
            let mut cursor = rec.first;
            while let Some(current) = cursor {
                assert!(seen.insert(current), "cycle in inode list");
                assert_eq!(self.dirents[current].inode, Some(inode));
                cursor = self.dirents[current].next;
            }
            if rec.first.is_none() {
                // Only a parked dirent may keep an empty record alive.
                assert!(
                    parked
                        .iter()
                        .any(|&p| self.dirents[p].inode == Some(inode)),
                    "inode record {} has no referents",
                    rec.key
                );
            }
        }

        for (id, dirent) in self.dirents.entries() {
            let Some(inode) = dirent.inode else { continue };
            let mut on_list = false;
            let mut cursor = self.inode_recs[inode].first;
            while let Some(current) = cursor {
                if current == id {
                    on_list = true;
                    break;
                }
                cursor = self.dirents[current].next;
            }
            if parked.contains(&id) {
                assert!(!on_list, "parked dirent still on its inode list");
            } else {
                assert!(on_list, "dirent missing from its inode list");
            }
        }
    }
}
