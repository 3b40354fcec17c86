//! Worker actor: the consumer side of the executor.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use db::JobRepository;
use engine::EngineClient;
use ops_core::{BusMessage, JobNotification, JobRecord, Publisher, TopicScheme};
use ractor::{Actor, ActorProcessingErr, ActorRef};

use crate::messages::{DispatcherMessage, WorkItem, WorkerMessage};

/// Shared dependencies every worker runs jobs with.
#[derive(Clone)]
pub struct WorkerContext {
    pub client: EngineClient,
    pub jobs: JobRepository,
    pub publisher: Arc<dyn Publisher>,
    pub topics: TopicScheme,
}

/// Worker actor arguments.
pub struct WorkerArgs {
    pub worker_id: String,
    pub dispatcher: ActorRef<DispatcherMessage>,
    pub context: WorkerContext,
    pub poll_interval: Duration,
}

/// State for the worker actor.
pub struct WorkerActorState {
    pub worker_id: String,
    dispatcher: ActorRef<DispatcherMessage>,
    context: WorkerContext,
    busy: bool,
    running: bool,
}

/// Pulls work from the dispatcher and runs it, one job at a time.
pub struct WorkerActor;

impl Actor for WorkerActor {
    type Msg = WorkerMessage;
    type State = WorkerActorState;
    type Arguments = WorkerArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting worker: {}", args.worker_id);

        let myself_clone = myself.clone();
        let poll_interval = args.poll_interval;
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(poll_interval).await;
                if myself_clone.send_message(WorkerMessage::Heartbeat).is_err() {
                    break;
                }
            }
        });

        Ok(WorkerActorState {
            worker_id: args.worker_id,
            dispatcher: args.dispatcher,
            context: args.context,
            busy: false,
            running: true,
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            WorkerMessage::Process { work } => {
                state.busy = true;
                run_job(&state.context, *work).await;
                state.busy = false;
            }

            WorkerMessage::Shutdown => {
                tracing::info!("Shutting down worker: {}", state.worker_id);
                state.running = false;
                myself.stop(None);
            }

            WorkerMessage::Heartbeat => {
                if !state.running {
                    myself.stop(None);
                    return Ok(());
                }

                if !state.busy {
                    let result = ractor::rpc::call(
                        &state.dispatcher,
                        |reply| DispatcherMessage::RequestWork {
                            worker_id: state.worker_id.clone(),
                            reply,
                        },
                        Some(Duration::from_secs(5)),
                    )
                    .await;
                    if let Ok(ractor::rpc::CallResult::Success(Some(work))) = result {
                        state.busy = true;
                        myself.send_message(WorkerMessage::Process {
                            work: Box::new(work),
                        })?;
                    }
                }
            }
        }

        Ok(())
    }
}

/// Drive one job through Running to its terminal state. Engine failures end
/// up in the record; nothing here fails the actor.
async fn run_job(context: &WorkerContext, work: WorkItem) {
    let WorkItem { mut record, call } = work;

    if let Err(e) = record.mark_running() {
        tracing::warn!("Skipping job: {}", e);
        return;
    }
    save(context, &record).await;

    let outcome = call.invoke(&context.client).await;
    let transition = match outcome {
        Ok(result) => record.mark_completed(result),
        Err(error) => {
            tracing::debug!("Job {} failed: {}", record.id(), error);
            record.mark_failed(error.to_string())
        }
    };
    if let Err(e) = transition {
        tracing::warn!("Job {}: {}", record.id(), e);
        return;
    }
    save(context, &record).await;

    if let Some(notification) = notification_for(&record) {
        tracing::info!("{}", notification.description());
        for topic in context.topics.job_topics(record.id()) {
            context
                .publisher
                .publish(&topic, BusMessage::job_notification(&notification));
        }
    }
}

async fn save(context: &WorkerContext, record: &JobRecord) {
    if let Err(e) = context.jobs.save(record).await {
        tracing::warn!("Failed to store job {}: {}", record.id(), e);
    }
}

/// Notification for a finished job, if it carries a callback token.
fn notification_for(record: &JobRecord) -> Option<JobNotification> {
    let token = record.callback()?.to_string();
    let job_id = record.id();
    let operation = record.operation().to_string();
    let timestamp = Utc::now();

    if let Some(result) = record.result() {
        Some(JobNotification::Completed {
            job_id,
            operation,
            result: result.clone(),
            token,
            timestamp,
        })
    } else {
        record.error().map(|error| JobNotification::Failed {
            job_id,
            operation,
            error: error.to_string(),
            token,
            timestamp,
        })
    }
}
