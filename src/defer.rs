//! Deferred cleanup of temporary artefacts.
//!
//! Every temporary file or directory the installer creates is registered here
//! the moment it exists. The registry drains once, either through an explicit
//! [`CleanupRegistry::run`] or when the last handle to it is dropped.

use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, warn};

type Action = Box<dyn FnOnce() + Send>;

/// Identifies one registered action so it can be cancelled on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeferredId(u64);

struct Deferred {
    id: DeferredId,
    target: Option<PathBuf>,
    action: Action,
}

#[derive(Default)]
struct State {
    next_id: u64,
    actions: Vec<Deferred>,
}

/// Ordered list of cleanup actions, executed in registration order.
#[derive(Default)]
pub struct CleanupRegistry {
    state: Mutex<State>,
}

impl CleanupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, target: Option<PathBuf>, action: Action) -> DeferredId {
        let mut state = self.lock();
        let id = DeferredId(state.next_id);
        state.next_id += 1;
        state.actions.push(Deferred { id, target, action });
        id
    }

    /// Append an arbitrary action.
    pub fn register<F>(&self, action: F) -> DeferredId
    where
        F: FnOnce() + Send + 'static,
    {
        self.push(None, Box::new(action))
    }

    /// Schedule `path` for removal. Directories are removed recursively; a
    /// path that no longer exists is silently skipped.
    pub fn register_path_deletion(&self, path: impl Into<PathBuf>) -> DeferredId {
        let path = path.into();
        debug!("scheduled removal of {}", path.display());
        let target = path.clone();
        self.push(Some(target), Box::new(move || remove_path(&path)))
    }

    /// Cancel one pending action. Returns `false` if it already ran or was
    /// cancelled.
    pub fn cancel(&self, id: DeferredId) -> bool {
        let mut state = self.lock();
        let before = state.actions.len();
        state.actions.retain(|d| d.id != id);
        state.actions.len() != before
    }

    /// Keep `path` alive: cancels every pending deletion whose target is
    /// `path` itself or one of its ancestors. Returns how many were cancelled.
    pub fn retain(&self, path: &Path) -> usize {
        let mut state = self.lock();
        let before = state.actions.len();
        state.actions.retain(|d| match &d.target {
            Some(target) => !path.starts_with(target),
            None => true,
        });
        let cancelled = before - state.actions.len();
        debug!("retained {} ({cancelled} deletion(s) cancelled)", path.display());
        cancelled
    }

    /// Drop every pending action without running it.
    pub fn cancel_all(&self) {
        let mut state = self.lock();
        debug!("cancelled {} pending cleanup action(s)", state.actions.len());
        state.actions.clear();
    }

    /// Number of actions still waiting to run.
    pub fn pending(&self) -> usize {
        self.lock().actions.len()
    }

    /// Targets of the pending path deletions, in registration order.
    pub fn pending_paths(&self) -> Vec<PathBuf> {
        self.lock()
            .actions
            .iter()
            .filter_map(|d| d.target.clone())
            .collect()
    }

    /// Run every pending action in registration order.
    ///
    /// The list is taken out before anything runs, so each action executes at
    /// most once and actions registered meanwhile wait for the next drain. A
    /// panicking action is logged and does not stop the ones after it.
    pub fn run(&self) {
        let actions = std::mem::take(&mut self.lock().actions);
        for deferred in actions {
            if panic::catch_unwind(AssertUnwindSafe(deferred.action)).is_err() {
                warn!("cleanup action {:?} panicked", deferred.id);
            }
        }
    }
}

impl Drop for CleanupRegistry {
    fn drop(&mut self) {
        self.run();
    }
}

fn remove_path(path: &Path) {
    let result = match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(_) => return,
    };
    match result {
        Ok(()) => debug!("removed {}", path.display()),
        Err(e) => warn!("failed to remove {}: {e}", path.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn runs_in_registration_order_exactly_once() {
        let registry = CleanupRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let log = Arc::clone(&log);
            registry.register(move || log.lock().unwrap().push(i));
        }

        registry.run();
        registry.run();

        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(registry.pending(), 0);
    }

    #[test]
    fn removes_files_and_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("archive.tar.gz");
        let dir = tmp.path().join("extract");
        fs::write(&file, b"data").unwrap();
        fs::create_dir_all(dir.join("nested")).unwrap();
        fs::write(dir.join("nested/yab"), b"bin").unwrap();

        let registry = CleanupRegistry::new();
        registry.register_path_deletion(&file);
        registry.register_path_deletion(&dir);
        registry.register_path_deletion(tmp.path().join("never-created"));
        registry.run();

        assert!(!file.exists());
        assert!(!dir.exists());
    }

    #[test]
    fn cancel_all_keeps_files() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("keep.txt");
        fs::write(&file, b"keep").unwrap();

        let registry = CleanupRegistry::new();
        registry.register_path_deletion(&file);
        registry.cancel_all();
        drop(registry);

        assert!(file.exists());
    }

    #[test]
    fn cancel_removes_a_single_action() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("a");
        let b = tmp.path().join("b");
        fs::write(&a, b"a").unwrap();
        fs::write(&b, b"b").unwrap();

        let registry = CleanupRegistry::new();
        let keep = registry.register_path_deletion(&a);
        registry.register_path_deletion(&b);

        assert!(registry.cancel(keep));
        assert!(!registry.cancel(keep));
        registry.run();

        assert!(a.exists());
        assert!(!b.exists());
    }

    #[test]
    fn retain_cancels_ancestor_deletions_only() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("yab.tar.gz");
        let dir = tmp.path().join("extract");
        fs::write(&archive, b"gz").unwrap();
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("yab"), b"bin").unwrap();

        let registry = CleanupRegistry::new();
        registry.register_path_deletion(&archive);
        registry.register_path_deletion(&dir);

        assert_eq!(registry.retain(&dir.join("yab")), 1);
        assert_eq!(registry.pending_paths(), vec![archive.clone()]);
        registry.run();

        assert!(!archive.exists());
        assert!(dir.join("yab").exists());
    }

    #[test]
    fn panicking_action_does_not_stop_later_ones() {
        let registry = CleanupRegistry::new();
        let ran = Arc::new(Mutex::new(false));
        registry.register(|| panic!("boom"));
        let flag = Arc::clone(&ran);
        registry.register(move || *flag.lock().unwrap() = true);

        registry.run();

        assert!(*ran.lock().unwrap());
    }

    #[test]
    fn drop_drains_pending_actions() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("gone");
        fs::write(&file, b"x").unwrap();

        let registry = CleanupRegistry::new();
        registry.register_path_deletion(&file);
        drop(registry);

        assert!(!file.exists());
    }
}
