//! Per-mesh FIFO task queues

use std::collections::VecDeque;

use tokio::sync::oneshot;
use vertex_paint::{Request, TaskFailure, TaskResult};

/// A validated request waiting its turn, with the channel its result is
/// delivered on.
pub(crate) struct QueuedTask {
    pub task_id: u64,
    pub request: Request,
    pub tx: oneshot::Sender<TaskResult>,
}

/// Queue state for one mesh. Exactly one task per mesh executes at a time;
/// the rest wait here in submission order.
#[derive(Default)]
pub(crate) struct MeshQueue {
    /// Task id currently executing, if any.
    pub running: Option<u64>,
    pub pending: VecDeque<QueuedTask>,
}

impl MeshQueue {
    pub fn is_idle(&self) -> bool {
        self.running.is_none() && self.pending.is_empty()
    }

    /// Drop queued tasks made moot by a full-replacement submission.
    ///
    /// The running task is never touched, and queued submissions that are
    /// themselves full replacements stay (their handles were already issued
    /// and their outcomes remain meaningful). Dropped tasks complete with
    /// `TaskFailure::Superseded`.
    pub fn supersede(&mut self) -> usize {
        let mut kept = VecDeque::with_capacity(self.pending.len());
        let mut dropped = 0;
        for task in self.pending.drain(..) {
            if task.request.supersedes_queued() {
                kept.push_back(task);
            } else {
                dropped += 1;
                let _ = task.tx.send(TaskResult::failed(TaskFailure::Superseded));
            }
        }
        self.pending = kept;
        dropped
    }
}
