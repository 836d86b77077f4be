//! Execution trace of a task run.

use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceKind {
    Started,
    Finished,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEvent {
    /// Position in the trace; events are totally ordered.
    pub seq: usize,
    pub task: String,
    pub kind: TraceKind,
}

/// Ordered record of task start/finish events.
#[derive(Debug, Default)]
pub struct Trace {
    events: Mutex<Vec<TraceEvent>>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, task: &str, kind: TraceKind) {
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        let seq = events.len();
        events.push(TraceEvent {
            seq,
            task: task.to_string(),
            kind,
        });
    }

    pub fn events(&self) -> Vec<TraceEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn first(&self, task: &str, kind: TraceKind) -> Option<usize> {
        self.events()
            .into_iter()
            .find(|e| e.task == task && e.kind == kind)
            .map(|e| e.seq)
    }

    pub fn started_at(&self, task: &str) -> Option<usize> {
        self.first(task, TraceKind::Started)
    }

    pub fn finished_at(&self, task: &str) -> Option<usize> {
        self.first(task, TraceKind::Finished)
    }

    /// Event kinds recorded for `task`, in order.
    pub fn kinds_for(&self, task: &str) -> Vec<TraceKind> {
        self.events()
            .into_iter()
            .filter(|e| e.task == task)
            .map(|e| e.kind)
            .collect()
    }

    /// True when `first` finished before `second` started.
    pub fn finished_before(&self, first: &str, second: &str) -> bool {
        match (self.finished_at(first), self.started_at(second)) {
            (Some(done), Some(start)) => done < start,
            _ => false,
        }
    }
}
