//! Dispatcher actor: the producer side of the executor.

use std::collections::VecDeque;

use ractor::{Actor, ActorProcessingErr, ActorRef, MessagingErr};

use crate::messages::{DispatcherMessage, WorkItem};

/// State for the dispatcher actor.
#[derive(Default)]
pub struct DispatcherState {
    /// Pending work, oldest first.
    pending: VecDeque<WorkItem>,
}

/// Holds submitted work in FIFO order until a worker pulls it.
pub struct DispatcherActor;

impl Actor for DispatcherActor {
    type Msg = DispatcherMessage;
    type State = DispatcherState;
    type Arguments = ();

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        _args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting job dispatcher");
        Ok(DispatcherState::default())
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            DispatcherMessage::Enqueue { work, reply } => {
                tracing::debug!(
                    "Enqueued job {} ({})",
                    work.record.id(),
                    work.record.operation()
                );
                state.pending.push_back(*work);
                let _ = reply.send(());
            }

            DispatcherMessage::RequestWork { worker_id, reply } => {
                if reply.is_closed() {
                    return Ok(());
                }
                let next = state.pending.pop_front();
                if let Some(work) = &next {
                    tracing::debug!("Job {} assigned to {}", work.record.id(), worker_id);
                }
                // The worker may have given up waiting; keep its item at the front.
                if let Err(MessagingErr::SendErr(Some(work))) = reply.send(next) {
                    tracing::debug!("Job {} returned to the queue, {} went away", work.record.id(), worker_id);
                    state.pending.push_front(work);
                }
            }

            DispatcherMessage::Pending { reply } => {
                let _ = reply.send(state.pending.len());
            }

            DispatcherMessage::Shutdown => {
                if !state.pending.is_empty() {
                    tracing::warn!(
                        "Dispatcher stopping with {} unstarted jobs",
                        state.pending.len()
                    );
                }
                myself.stop(None);
            }
        }

        Ok(())
    }
}
