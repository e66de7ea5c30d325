//! Queued sync requests and the coalescing rules applied on insertion.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use tokio::time::Instant;

use crate::watch::{EventKind, FsEvent, InodeKey};

use super::paths::{absolutize, rename_orig, sync_name};

/// The base directory modifications are mirrored into. Source paths map
/// into it via [`SyncTarget::sync_name`].
#[derive(Debug, Clone)]
pub struct SyncTarget {
    base_dir: PathBuf,
}

impl SyncTarget {
    pub fn new(path: &Path) -> Self {
        Self {
            base_dir: absolutize(path),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn sync_name(&self, orig: &Path) -> PathBuf {
        sync_name(&self.base_dir, orig)
    }
}

/// One destination-side modification request, buffered in the debounce
/// queue. Destination paths are derived from the source paths and kept in
/// step when coalescing rewrites them.
#[derive(Debug, Clone)]
pub struct Request {
    pub kind: EventKind,
    pub is_dir: bool,
    pub source: PathBuf,
    /// The other side of a MOVE or LINK, or the surviving link of a DELETE.
    pub source_alt: Option<PathBuf>,
    pub dest: PathBuf,
    pub dest_alt: Option<PathBuf>,
    pub key: InodeKey,
    /// Wall-clock arrival, the reference point for the release timer.
    pub arrived: Instant,
    target: SyncTarget,
}

impl Request {
    pub fn new(target: &SyncTarget, event: &FsEvent) -> Self {
        let mut request = Self {
            kind: event.kind,
            is_dir: event.is_dir,
            source: event.path.clone(),
            source_alt: event.path2.clone(),
            dest: PathBuf::new(),
            dest_alt: None,
            key: event.key,
            arrived: Instant::now(),
            target: target.clone(),
        };
        request.refresh_dest();
        request
    }

    /// Substitute the `old_dir` prefix of the source paths with `new_dir`.
    fn rewrite_prefix(&mut self, new_dir: &Path, old_dir: &Path) {
        self.source = rename_orig(new_dir, old_dir, &self.source);
        if let Some(alt) = self.source_alt.take() {
            self.source_alt = Some(rename_orig(new_dir, old_dir, &alt));
        }
        self.refresh_dest();
    }

    /// Point this request at the surviving link of a deleted source.
    fn retarget(&mut self, alt: &Path) {
        self.source = alt.to_path_buf();
        self.source_alt = None;
        self.refresh_dest();
    }

    fn refresh_dest(&mut self) {
        self.dest = self.target.sync_name(&self.source);
        self.dest_alt = self
            .source_alt
            .as_deref()
            .map(|alt| self.target.sync_name(alt));
    }
}

/// Coalesce the queue around its newest entry (the one just pushed):
///
/// - MOVE rewrites the paths of queued CREATE/CHANGE requests under the
///   old prefix; if the moved object's own CREATE was still queued the
///   move collapses into it and is dropped.
/// - DELETE with a surviving link re-targets queued non-DELETE requests
///   for that source onto the link. Without one, a still-queued CREATE
///   means the object never reached the target, so the whole
///   create..delete sequence vanishes.
pub(crate) fn coalesce(queue: &mut VecDeque<Request>) {
    let Some(newest) = queue.back() else {
        return;
    };
    let last = queue.len() - 1;
    match newest.kind {
        EventKind::Move => {
            let Some(old_dir) = newest.source_alt.clone() else {
                return;
            };
            let new_dir = newest.source.clone();
            let key = newest.key;
            let mut absorbed = false;
            for request in queue.iter_mut().take(last) {
                if matches!(request.kind, EventKind::Create | EventKind::Change) {
                    if request.kind == EventKind::Create
                        && request.key == key
                        && request.source == old_dir
                    {
                        absorbed = true;
                    }
                    request.rewrite_prefix(&new_dir, &old_dir);
                }
            }
            if absorbed {
                queue.pop_back();
            }
        }
        EventKind::Delete => {
            let del_path = newest.source.clone();
            match newest.source_alt.clone() {
                Some(alt) => {
                    for request in queue.iter_mut().take(last) {
                        if request.kind != EventKind::Delete && request.source == del_path {
                            request.retarget(&alt);
                        }
                    }
                }
                None => {
                    let pending_create = queue
                        .iter()
                        .take(last)
                        .any(|r| r.kind == EventKind::Create && r.source == del_path);
                    if pending_create {
                        queue.pop_back();
                        queue.retain(|r| {
                            !(matches!(r.kind, EventKind::Create | EventKind::Change)
                                && r.source == del_path)
                        });
                    }
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(kind: EventKind, source: &str, source_alt: Option<&str>) -> Request {
        let target = SyncTarget::new(Path::new("/mirror"));
        let event = FsEvent {
            kind,
            is_dir: false,
            data_modified: false,
            path: PathBuf::from(source),
            path2: source_alt.map(PathBuf::from),
            key: InodeKey::new(1, source.len() as u64),
        };
        Request::new(&target, &event)
    }

    fn push(queue: &mut VecDeque<Request>, req: Request) {
        queue.push_back(req);
        coalesce(queue);
    }

    #[test]
    fn request_derives_destination_paths() {
        let req = request(EventKind::Create, "/src/dir/f", None);
        assert_eq!(req.dest, PathBuf::from("/mirror/src/dir/f"));
        assert_eq!(req.dest_alt, None);
    }

    #[test]
    fn move_rewrites_queued_create_and_collapses() {
        let mut queue = VecDeque::new();
        let mut create = request(EventKind::Create, "/src/x", None);
        create.key = InodeKey::new(1, 10);
        push(&mut queue, create);

        let mut mv = request(EventKind::Move, "/src/y", Some("/src/x"));
        mv.key = InodeKey::new(1, 10);
        push(&mut queue, mv);

        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].kind, EventKind::Create);
        assert_eq!(queue[0].source, PathBuf::from("/src/y"));
        assert_eq!(queue[0].dest, PathBuf::from("/mirror/src/y"));
    }

    #[test]
    fn move_of_directory_rewrites_children_but_survives() {
        let mut queue = VecDeque::new();
        push(&mut queue, request(EventKind::Change, "/src/d/f", None));

        let mv = request(EventKind::Move, "/src/e", Some("/src/d"));
        push(&mut queue, mv);

        assert_eq!(queue.len(), 2);
        assert_eq!(queue[0].source, PathBuf::from("/src/e/f"));
        assert_eq!(queue[0].dest, PathBuf::from("/mirror/src/e/f"));
        assert_eq!(queue[1].kind, EventKind::Move);
    }

    #[test]
    fn move_leaves_unrelated_requests_alone() {
        let mut queue = VecDeque::new();
        push(&mut queue, request(EventKind::Create, "/src/other", None));
        push(&mut queue, request(EventKind::Move, "/src/y", Some("/src/x")));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue[0].source, PathBuf::from("/src/other"));
    }

    #[test]
    fn delete_retargets_onto_surviving_link() {
        let mut queue = VecDeque::new();
        push(&mut queue, request(EventKind::Change, "/src/f", None));
        push(
            &mut queue,
            request(EventKind::Delete, "/src/f", Some("/src/f2")),
        );

        assert_eq!(queue.len(), 2);
        assert_eq!(queue[0].kind, EventKind::Change);
        assert_eq!(queue[0].source, PathBuf::from("/src/f2"));
        assert_eq!(queue[0].source_alt, None);
        assert_eq!(queue[0].dest, PathBuf::from("/mirror/src/f2"));
    }

    #[test]
    fn create_then_delete_vanishes() {
        let mut queue = VecDeque::new();
        push(&mut queue, request(EventKind::Create, "/src/tmp", None));
        push(&mut queue, request(EventKind::Change, "/src/tmp", None));
        push(&mut queue, request(EventKind::Delete, "/src/tmp", None));

        assert!(queue.is_empty());
    }

    #[test]
    fn delete_without_pending_create_is_kept() {
        let mut queue = VecDeque::new();
        push(&mut queue, request(EventKind::Delete, "/src/f", None));

        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].kind, EventKind::Delete);
    }

    #[test]
    fn coalescing_is_idempotent() {
        let mut queue = VecDeque::new();
        push(&mut queue, request(EventKind::Change, "/src/d/f", None));
        push(&mut queue, request(EventKind::Move, "/src/e", Some("/src/d")));
        let snapshot: Vec<PathBuf> = queue.iter().map(|r| r.source.clone()).collect();

        coalesce(&mut queue);
        let again: Vec<PathBuf> = queue.iter().map(|r| r.source.clone()).collect();
        assert_eq!(snapshot, again);
    }
}
