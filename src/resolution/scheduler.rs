//! Debounced, single-flight scheduling of resolution passes.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error};

use super::resolver::RelationshipResolver;
use crate::types::PassSummary;

/// What the scheduler is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    Idle,
    /// A pass is pending, waiting out the debounce window.
    Scheduled,
    Running,
    /// A pass is running and another was requested meanwhile.
    RunningWithRerun,
}

#[derive(Debug, Default)]
struct SchedulerState {
    dirty: bool,
    immediate: bool,
    deadline: Option<Instant>,
    running: bool,
    /// Bumped by every request; a pass covers every request made before it
    /// started.
    requested: u64,
}

#[derive(Debug, Clone, Default)]
struct Completion {
    generation: u64,
    passes: u64,
    summary: Option<PassSummary>,
}

struct SchedulerInner {
    resolver: RelationshipResolver,
    debounce: Duration,
    state: Mutex<SchedulerState>,
    wake: Notify,
    completed: watch::Sender<Completion>,
}

struct Worker(JoinHandle<()>);

impl Drop for Worker {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Coalesces resolution requests into passes.
///
/// At most one pass runs at a time. Requests made while a pass runs
/// collapse into exactly one follow-up pass. [`schedule`](Self::schedule)
/// waits out a debounce window that restarts on every call;
/// [`resolve`](Self::resolve) skips it and waits for a pass that started
/// after the call.
///
/// Cloning shares the same worker. The worker stops when the last handle is
/// dropped; a pass already running finishes first.
#[derive(Clone)]
pub struct ResolveScheduler {
    inner: Arc<SchedulerInner>,
    _worker: Arc<Worker>,
}

impl ResolveScheduler {
    /// Creates a scheduler debouncing with the resolver's configured window.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(resolver: RelationshipResolver) -> Self {
        let debounce = resolver.config().debounce();
        Self::with_debounce(resolver, debounce)
    }

    pub fn with_debounce(resolver: RelationshipResolver, debounce: Duration) -> Self {
        let (completed, _) = watch::channel(Completion::default());
        let inner = Arc::new(SchedulerInner {
            resolver,
            debounce,
            state: Mutex::new(SchedulerState::default()),
            wake: Notify::new(),
            completed,
        });
        let worker = tokio::spawn(run_worker(Arc::clone(&inner)));
        Self {
            inner,
            _worker: Arc::new(Worker(worker)),
        }
    }

    /// Requests a pass after the debounce window. Returns immediately.
    pub fn schedule(&self) {
        {
            let mut state = self.inner.lock_state();
            state.dirty = true;
            state.requested += 1;
            state.deadline = Some(Instant::now() + self.inner.debounce);
        }
        self.inner.wake.notify_one();
        debug!("resolution pass scheduled");
    }

    /// Runs a pass as soon as possible and waits for it. If a pass is
    /// already running, waits for the follow-up pass instead.
    ///
    /// Returns `None` when the pass failed.
    pub async fn resolve(&self) -> Option<PassSummary> {
        let mut completed = self.inner.completed.subscribe();
        let wanted = {
            let mut state = self.inner.lock_state();
            state.dirty = true;
            state.immediate = true;
            state.requested += 1;
            state.requested
        };
        self.inner.wake.notify_one();

        let summary = match completed.wait_for(|c| c.generation >= wanted).await {
            Ok(completion) => completion.summary.clone(),
            Err(_) => None,
        };
        summary
    }

    pub fn phase(&self) -> SchedulerPhase {
        let state = self.inner.lock_state();
        match (state.running, state.dirty) {
            (false, false) => SchedulerPhase::Idle,
            (false, true) => SchedulerPhase::Scheduled,
            (true, false) => SchedulerPhase::Running,
            (true, true) => SchedulerPhase::RunningWithRerun,
        }
    }

    /// Passes finished since the scheduler was created, failed ones included.
    pub fn passes_completed(&self) -> u64 {
        self.inner.completed.borrow().passes
    }

    /// Summary of the most recent pass, if it succeeded.
    pub fn last_summary(&self) -> Option<PassSummary> {
        self.inner.completed.borrow().summary.clone()
    }
}

impl SchedulerInner {
    fn lock_state(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Waits until a pending pass is due. Returns the generation it covers,
    /// or `None` when nothing is pending.
    async fn wait_until_due(&self) -> Option<u64> {
        loop {
            let wait = {
                let mut state = self.lock_state();
                if !state.dirty {
                    return None;
                }
                let now = Instant::now();
                match state.deadline {
                    Some(deadline) if !state.immediate && deadline > now => deadline - now,
                    _ => {
                        state.dirty = false;
                        state.immediate = false;
                        state.deadline = None;
                        state.running = true;
                        return Some(state.requested);
                    }
                }
            };
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = self.wake.notified() => {}
            }
        }
    }

    fn finish(&self, generation: u64, summary: Option<PassSummary>) {
        self.lock_state().running = false;
        self.completed.send_modify(|c| {
            c.generation = generation;
            c.passes += 1;
            c.summary = summary;
        });
    }
}

async fn run_worker(inner: Arc<SchedulerInner>) {
    loop {
        inner.wake.notified().await;
        while let Some(generation) = inner.wait_until_due().await {
            let pass = {
                let inner = Arc::clone(&inner);
                tokio::spawn(async move { inner.resolver.run_pass().await })
            };
            let summary = match pass.await {
                Ok(Ok(summary)) => Some(summary),
                Ok(Err(e)) => {
                    error!(error = %e, "relationship resolution pass failed");
                    None
                }
                Err(e) => {
                    error!(error = %e, "relationship resolution pass aborted");
                    None
                }
            };
            inner.finish(generation, summary);
        }
    }
}
