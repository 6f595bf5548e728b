use std::time::Duration;

use crate::scene::NodeId;

/// Deferred work owned by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    /// Coalesced layout pass for a dispatching container.
    Recompute(NodeId),
    /// Destroy a node that never reached a live surface.
    DestroyOrphan(NodeId),
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    due: Duration,
    seq: u64,
    task: Task,
}

/// Single-threaded queue of deferred tasks driven by virtual time.
///
/// Scheduling a task that is already pending moves its deadline, which is
/// what turns repeated layout notifications into one recomputation.
#[derive(Debug, Default)]
pub struct Scheduler {
    now: Duration,
    seq: u64,
    pending: Vec<Pending>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn schedule(&mut self, task: Task, delay: Duration) {
        self.cancel(task);
        self.seq += 1;
        self.pending.push(Pending {
            due: self.now + delay,
            seq: self.seq,
            task,
        });
    }

    pub fn cancel(&mut self, task: Task) -> bool {
        let before = self.pending.len();
        self.pending.retain(|pending| pending.task != task);
        before != self.pending.len()
    }

    pub fn cancel_for(&mut self, node: NodeId) {
        self.pending.retain(|pending| match pending.task {
            Task::Recompute(id) | Task::DestroyOrphan(id) => id != node,
        });
    }

    pub fn is_pending(&self, task: Task) -> bool {
        self.pending.iter().any(|pending| pending.task == task)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Advance the clock and hand back every task that came due, earliest
    /// first.
    pub fn advance(&mut self, elapsed: Duration) -> Vec<Task> {
        self.now += elapsed;
        let now = self.now;
        let mut due: Vec<Pending> = Vec::new();
        self.pending.retain(|pending| {
            if pending.due <= now {
                due.push(*pending);
                false
            } else {
                true
            }
        });
        due.sort_by_key(|pending| (pending.due, pending.seq));
        due.into_iter().map(|pending| pending.task).collect()
    }
}
