//! Supervisor actor owning the dispatcher and the worker pool.

use std::time::Duration;

use ractor::{Actor, ActorProcessingErr, ActorRef, SupervisionEvent};

use crate::messages::{DispatcherMessage, SupervisorMessage, WorkerMessage};
use crate::dispatcher_actor::DispatcherActor;
use crate::worker_actor::{WorkerActor, WorkerArgs, WorkerContext};

/// Supervisor arguments.
pub struct SupervisorArgs {
    pub workers: usize,
    pub poll_interval: Duration,
    pub context: WorkerContext,
}

/// State for the supervisor actor.
pub struct SupervisorState {
    dispatcher: ActorRef<DispatcherMessage>,
    workers: Vec<ActorRef<WorkerMessage>>,
}

/// Top-level executor actor. Children are linked, so their termination is
/// reported here.
pub struct Supervisor;

impl Actor for Supervisor {
    type Msg = SupervisorMessage;
    type State = SupervisorState;
    type Arguments = SupervisorArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting executor supervisor with {} workers", args.workers);

        let (dispatcher, _handle) =
            Actor::spawn_linked(None, DispatcherActor, (), myself.get_cell())
                .await
                .map_err(|e| ActorProcessingErr::from(format!("Failed to spawn dispatcher: {}", e)))?;

        let mut workers = Vec::with_capacity(args.workers);
        for index in 0..args.workers {
            let worker_args = WorkerArgs {
                worker_id: format!("worker-{}", index + 1),
                dispatcher: dispatcher.clone(),
                context: args.context.clone(),
                poll_interval: args.poll_interval,
            };
            let (worker, _handle) =
                Actor::spawn_linked(None, WorkerActor, worker_args, myself.get_cell())
                    .await
                    .map_err(|e| ActorProcessingErr::from(format!("Failed to spawn worker: {}", e)))?;
            workers.push(worker);
        }

        Ok(SupervisorState {
            dispatcher,
            workers,
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SupervisorMessage::Enqueue { work, reply } => {
                let (tx, rx) = ractor::concurrency::oneshot();
                if state
                    .dispatcher
                    .send_message(DispatcherMessage::Enqueue {
                        work,
                        reply: tx.into(),
                    })
                    .is_err()
                {
                    let _ = reply.send(Err("Dispatcher is not running".into()));
                    return Ok(());
                }
                match rx.await {
                    Ok(()) => {
                        let _ = reply.send(Ok(()));
                    }
                    Err(_) => {
                        let _ = reply.send(Err("Failed to enqueue job".into()));
                    }
                }
            }

            SupervisorMessage::WorkerCount { reply } => {
                let _ = reply.send(state.workers.len());
            }

            SupervisorMessage::Shutdown => {
                tracing::info!("Shutting down executor supervisor");
                for worker in &state.workers {
                    let _ = worker.send_message(WorkerMessage::Shutdown);
                }
                let _ = state.dispatcher.send_message(DispatcherMessage::Shutdown);
                myself.stop(None);
            }
        }

        Ok(())
    }

    async fn handle_supervisor_evt(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: SupervisionEvent,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SupervisionEvent::ActorTerminated(cell, _, reason) => {
                state.workers.retain(|w| w.get_id() != cell.get_id());
                tracing::info!("Child actor {} stopped: {:?}", cell.get_id(), reason);
            }
            SupervisionEvent::ActorFailed(cell, error) => {
                state.workers.retain(|w| w.get_id() != cell.get_id());
                tracing::warn!("Child actor {} failed: {}", cell.get_id(), error);
            }
            _ => {}
        }
        Ok(())
    }
}

/// Spawn the supervisor and its children.
pub async fn start_supervisor(
    args: SupervisorArgs,
) -> Result<(ActorRef<SupervisorMessage>, tokio::task::JoinHandle<()>), ractor::SpawnErr> {
    Actor::spawn(None, Supervisor, args).await
}
