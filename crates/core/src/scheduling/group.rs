//! Completion protocol for tables submitted together as one group.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use dbarchive_domain::DbArchiveError;
use uuid::Uuid;

use crate::archive::ArchiveLog;

type Hook = Box<dyn FnOnce() + Send + 'static>;
type FailureHook = Box<dyn FnOnce(&DbArchiveError) + Send + 'static>;

/// Callbacks fired once per group: `on_success` when every member finished
/// `Done`, `on_failure` on the first `Failed` member, `on_finally` once every
/// member is terminal.
#[derive(Default)]
pub struct GroupHooks {
    on_success: Option<Hook>,
    on_failure: Option<FailureHook>,
    on_finally: Option<Hook>,
}

impl fmt::Debug for GroupHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupHooks")
            .field("on_success", &self.on_success.is_some())
            .field("on_failure", &self.on_failure.is_some())
            .field("on_finally", &self.on_finally.is_some())
            .finish()
    }
}

impl GroupHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hooks that only report through `log`.
    pub fn logging(log: Arc<dyn ArchiveLog>) -> Self {
        let success_log = Arc::clone(&log);
        let failure_log = Arc::clone(&log);
        Self::new()
            .on_success(move || success_log.info("All jobs in the batch completed successfully."))
            .on_failure(move |err| failure_log.error(&format!("Batch failed: {err}")))
            .on_finally(move || log.info("Batch processing finished."))
    }

    #[must_use]
    pub fn on_success(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_success = Some(Box::new(hook));
        self
    }

    #[must_use]
    pub fn on_failure(mut self, hook: impl FnOnce(&DbArchiveError) + Send + 'static) -> Self {
        self.on_failure = Some(Box::new(hook));
        self
    }

    #[must_use]
    pub fn on_finally(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_finally = Some(Box::new(hook));
        self
    }
}

/// Hooks that became due after recording a member result. Fired by the
/// caller once no lock is held.
#[derive(Default)]
pub(crate) struct DueHooks {
    failure: Option<(FailureHook, DbArchiveError)>,
    success: Option<Hook>,
    finally: Option<Hook>,
}

impl DueHooks {
    pub(crate) fn fire(self) {
        if let Some((hook, err)) = self.failure {
            hook(&err);
        }
        if let Some(hook) = self.success {
            hook();
        }
        if let Some(hook) = self.finally {
            hook();
        }
    }
}

/// Bookkeeping for one active group.
pub(crate) struct GroupState {
    id: Uuid,
    pending: HashSet<String>,
    failed: bool,
    hooks: GroupHooks,
}

impl GroupState {
    pub(crate) fn new<'a>(members: impl IntoIterator<Item = &'a str>, hooks: GroupHooks) -> Self {
        Self {
            id: Uuid::new_v4(),
            pending: members.into_iter().map(str::to_string).collect(),
            failed: false,
            hooks,
        }
    }

    pub(crate) const fn id(&self) -> Uuid {
        self.id
    }

    /// Hooks due immediately, for a group created without members.
    pub(crate) fn settle_if_empty(&mut self) -> DueHooks {
        if self.pending.is_empty() {
            self.settle()
        } else {
            DueHooks::default()
        }
    }

    /// Record a member's terminal result. `error` is `Some` for a failure.
    pub(crate) fn record_terminal(&mut self, table: &str, error: Option<&str>) -> DueHooks {
        if !self.pending.remove(table) {
            return DueHooks::default();
        }

        let mut due = DueHooks::default();
        if let Some(message) = error {
            self.failed = true;
            if let Some(hook) = self.hooks.on_failure.take() {
                let err = DbArchiveError::GroupFailure(format!("{table}: {message}"));
                due.failure = Some((hook, err));
            }
        }

        if self.pending.is_empty() {
            let settled = self.settle();
            due.success = settled.success;
            due.finally = settled.finally;
        }
        due
    }

    fn settle(&mut self) -> DueHooks {
        DueHooks {
            failure: None,
            success: if self.failed { None } else { self.hooks.on_success.take() },
            finally: self.hooks.on_finally.take(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    struct Counters {
        success: AtomicUsize,
        failure: AtomicUsize,
        finally: AtomicUsize,
    }

    fn counting_hooks(counters: &Arc<Counters>) -> GroupHooks {
        let (s, f, fin) = (Arc::clone(counters), Arc::clone(counters), Arc::clone(counters));
        GroupHooks::new()
            .on_success(move || {
                s.success.fetch_add(1, Ordering::SeqCst);
            })
            .on_failure(move |_| {
                f.failure.fetch_add(1, Ordering::SeqCst);
            })
            .on_finally(move || {
                fin.finally.fetch_add(1, Ordering::SeqCst);
            })
    }

    #[test]
    fn all_done_fires_success_then_finally() {
        let counters = Arc::new(Counters::default());
        let mut group = GroupState::new(["a", "b"], counting_hooks(&counters));

        group.record_terminal("a", None).fire();
        assert_eq!(counters.finally.load(Ordering::SeqCst), 0);
        group.record_terminal("b", None).fire();
        group.record_terminal("b", None).fire();

        assert_eq!(counters.success.load(Ordering::SeqCst), 1);
        assert_eq!(counters.failure.load(Ordering::SeqCst), 0);
        assert_eq!(counters.finally.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failures_fire_failure_once_and_suppress_success() {
        let counters = Arc::new(Counters::default());
        let mut group = GroupState::new(["a", "b", "c"], counting_hooks(&counters));

        group.record_terminal("a", Some("boom")).fire();
        group.record_terminal("b", Some("boom again")).fire();
        group.record_terminal("c", None).fire();

        assert_eq!(counters.success.load(Ordering::SeqCst), 0);
        assert_eq!(counters.failure.load(Ordering::SeqCst), 1);
        assert_eq!(counters.finally.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn empty_group_settles_immediately() {
        let counters = Arc::new(Counters::default());
        let mut group = GroupState::new(Vec::<&str>::new(), counting_hooks(&counters));
        group.settle_if_empty().fire();
        group.settle_if_empty().fire();

        assert_eq!(counters.success.load(Ordering::SeqCst), 1);
        assert_eq!(counters.finally.load(Ordering::SeqCst), 1);
    }
}
