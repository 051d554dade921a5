//! Identity of the current unit of work, used to key
//! [CONTEXT-scoped](crate::pod::PodScope::Context) instances.
//!
//! Every container gets its own id per thread. Futures wrapped with [scope] get a separate slot,
//! which follows the task across worker threads for its whole lifetime, so that two concurrently
//! scheduled tasks never share an id, even when polled by the same thread.
//!
//! Tasks which are not wrapped fall back to the id of the thread polling them. On a multi-thread
//! runtime that id can change after an `.await`, and unrelated tasks polled by the same worker
//! share it, so async code relying on context-scoped pods must run inside [scope].

use fxhash::FxHashMap;
use std::cell::RefCell;
use std::fmt::{Display, Formatter};
use std::future::Future;
use uuid::Uuid;

/// Opaque identifier of a unit of work.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ContextId(Uuid);

impl ContextId {
    /// Mints a new, random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[inline]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ContextId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

type ContextIds = RefCell<FxHashMap<u64, ContextId>>;

thread_local! {
    static THREAD_CONTEXT_IDS: ContextIds = RefCell::new(FxHashMap::default());
}

tokio::task_local! {
    static TASK_CONTEXT_IDS: ContextIds;
}

/// Runs given future with its own set of context ids.
pub fn scope<F: Future>(future: F) -> impl Future<Output = F::Output> {
    TASK_CONTEXT_IDS.scope(RefCell::new(FxHashMap::default()), future)
}

/// Runs given closure with its own set of context ids.
pub fn sync_scope<F: FnOnce() -> R, R>(f: F) -> R {
    TASK_CONTEXT_IDS.sync_scope(RefCell::new(FxHashMap::default()), f)
}

/// Returns the id for given container in the current unit of work, creating it if absent. Outside
/// of [scope] and [sync_scope], this is the id of the current thread.
pub(crate) fn current(owner: u64) -> ContextId {
    let get_or_create =
        |ids: &ContextIds| *ids.borrow_mut().entry(owner).or_insert_with(ContextId::new);

    TASK_CONTEXT_IDS
        .try_with(get_or_create)
        .unwrap_or_else(|_| THREAD_CONTEXT_IDS.with(get_or_create))
}

/// Discards the id for given container in the current unit of work, returning it if present.
pub(crate) fn clear(owner: u64) -> Option<ContextId> {
    let remove = |ids: &ContextIds| ids.borrow_mut().remove(&owner);

    match TASK_CONTEXT_IDS.try_with(remove) {
        Ok(id) => id,
        Err(_) => THREAD_CONTEXT_IDS.with(remove),
    }
}
