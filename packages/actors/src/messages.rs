//! Message types for actor communication.

use ops_core::JobRecord;
use ractor::RpcReplyPort;

use crate::operations::OperationCall;

/// A submitted job and the call it will run.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub record: JobRecord,
    pub call: OperationCall,
}

/// Messages for the DispatcherActor.
#[derive(Debug)]
pub enum DispatcherMessage {
    /// Append a work item to the back of the queue.
    Enqueue {
        work: Box<WorkItem>,
        reply: RpcReplyPort<()>,
    },

    /// Hand the oldest pending item to a worker.
    RequestWork {
        worker_id: String,
        reply: RpcReplyPort<Option<WorkItem>>,
    },

    /// Number of items waiting for a worker.
    Pending { reply: RpcReplyPort<usize> },

    /// Stop the dispatcher.
    Shutdown,
}

/// Messages for the WorkerActor.
#[derive(Debug)]
pub enum WorkerMessage {
    /// Run one work item to a terminal state.
    Process { work: Box<WorkItem> },

    /// Poll tick: pull the next item when idle.
    Heartbeat,

    /// Stop the worker.
    Shutdown,
}

/// Messages for the Supervisor.
#[derive(Debug)]
pub enum SupervisorMessage {
    /// Forward a work item to the dispatcher.
    Enqueue {
        work: Box<WorkItem>,
        reply: RpcReplyPort<Result<(), String>>,
    },

    /// Number of live workers.
    WorkerCount { reply: RpcReplyPort<usize> },

    /// Stop the dispatcher, every worker, then the supervisor.
    Shutdown,
}
