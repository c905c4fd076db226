use std::fmt::Debug;

use crate::task::Task;

/// Decides whether a task an agent is walking to gives way to another task
/// that has become due.
///
/// Work already in progress is never interrupted.
pub trait PreemptionPolicy: Debug {
    /// Returns true if `current` (moving) should be suspended in favour of
    /// `candidate` (not started, due).
    fn should_preempt(&self, current: &Task, candidate: &Task) -> bool;

    /// Whether this policy can ever preempt. Agents skip looking for due
    /// candidates while walking when it cannot.
    fn enabled(&self) -> bool {
        true
    }
}

/// Agents finish walking to whatever they set out for.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPreemption;

impl PreemptionPolicy for NoPreemption {
    fn should_preempt(&self, _current: &Task, _candidate: &Task) -> bool {
        false
    }

    fn enabled(&self) -> bool {
        false
    }
}

/// Strictly more urgent due tasks interrupt the walk.
#[derive(Debug, Clone, Copy, Default)]
pub struct PriorityPreemption;

impl PreemptionPolicy for PriorityPreemption {
    fn should_preempt(&self, current: &Task, candidate: &Task) -> bool {
        candidate.priority > current.priority
    }
}
