//! The wave scheduler: a wave's ready tasks are split into two queues,
//! sequential (including `Conditional` and `Handoff`, evaluated/run one
//! at a time in enumeration order) and parallel (drained concurrently
//! under a semaphore sized `parallel_limit`). The two queues never
//! interleave within a wave.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use relay_kernel::{KernelError, KernelResult, MessageBroker};
use serde_json::Value;
use tokio::sync::{Notify, RwLock, Semaphore};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::config::WorkflowConfig;
use crate::dag::{self, ready_tasks};
use crate::events::{emit_task, emit_workflow};
use crate::runner::AgentRunner;
use crate::state::{WorkflowState, WorkflowStatus};
use crate::task::{TaskKind, WorkflowTask};

pub struct WorkflowEngine {
    pub workflow_id: String,
    config: RwLock<WorkflowConfig>,
    state: RwLock<WorkflowState>,
    runner: Arc<dyn AgentRunner>,
    broker: MessageBroker,
    name_to_id: RwLock<HashMap<String, String>>,
    paused: Arc<AtomicBool>,
    cancelled: Arc<AtomicBool>,
    resume_notify: Arc<Notify>,
}

impl WorkflowEngine {
    pub fn new(config: WorkflowConfig, runner: Arc<dyn AgentRunner>, broker: MessageBroker) -> Self {
        let workflow_id = uuid::Uuid::new_v4().to_string();
        Self {
            state: RwLock::new(WorkflowState::new(workflow_id.clone())),
            workflow_id,
            config: RwLock::new(config),
            runner,
            broker,
            name_to_id: RwLock::new(HashMap::new()),
            paused: Arc::new(AtomicBool::new(false)),
            cancelled: Arc::new(AtomicBool::new(false)),
            resume_notify: Arc::new(Notify::new()),
        }
    }

    /// Validates the DAG (dependency resolution + cycle check) and
    /// transitions `CREATED -> READY`.
    pub async fn initialize(&self) -> KernelResult<()> {
        let mut config = self.config.write().await;
        dag::validate(&mut config.tasks)?;

        let mut map = self.name_to_id.write().await;
        for task in &config.tasks {
            map.insert(task.name.clone(), task.id.clone());
        }
        drop(map);
        drop(config);

        let mut state = self.state.write().await;
        state.status = WorkflowStatus::Ready;
        Ok(())
    }

    pub async fn status(&self) -> WorkflowStatus {
        self.state.read().await.status
    }

    pub async fn get_task_result(&self, id_or_name: &str) -> Option<Value> {
        let id = self.name_to_id.read().await.get(id_or_name).cloned().unwrap_or_else(|| id_or_name.to_string());
        self.state.read().await.task_results.get(&id).cloned()
    }

    pub async fn snapshot(&self) -> WorkflowState {
        self.state.read().await.clone()
    }

    pub async fn pause(&self) -> bool {
        if self.status().await != WorkflowStatus::Running {
            return false;
        }
        self.paused.store(true, Ordering::SeqCst);
        self.state.write().await.status = WorkflowStatus::Paused;
        self.runner.pause_all().await;
        emit_workflow(&self.broker, &self.workflow_id, "paused").await;
        true
    }

    pub async fn resume(&self) -> bool {
        if self.status().await != WorkflowStatus::Paused {
            return false;
        }
        self.paused.store(false, Ordering::SeqCst);
        self.resume_notify.notify_waiters();
        self.state.write().await.status = WorkflowStatus::Running;
        self.runner.resume_all().await;
        emit_workflow(&self.broker, &self.workflow_id, "resumed").await;
        true
    }

    pub async fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.resume_notify.notify_waiters();
        self.runner.stop_all().await;
        let mut state = self.state.write().await;
        state.status = WorkflowStatus::Cancelled;
        state.end_time = Some(relay_kernel::message::now_millis());
        drop(state);
        emit_workflow(&self.broker, &self.workflow_id, "cancelled").await;
    }

    /// Runs the workflow to completion (or until cancelled/failed),
    /// returning the final state. Also performs the atomic state
    /// persistence spec'd for `auto_save`.
    pub async fn execute(&self) -> KernelResult<WorkflowState> {
        {
            let mut state = self.state.write().await;
            state.status = WorkflowStatus::Running;
            state.start_time = Some(relay_kernel::message::now_millis());
        }
        emit_workflow(&self.broker, &self.workflow_id, "started").await;

        let config = self.config.read().await.clone();
        let mut completed: HashSet<String> = HashSet::new();
        let mut skipped: HashSet<String> = HashSet::new();
        let mut failed: HashSet<String> = HashSet::new();
        let mut task_results: HashMap<String, Value> = HashMap::new();
        let mut failure_message: Option<String> = None;

        'waves: loop {
            if self.cancelled.load(Ordering::SeqCst) {
                break;
            }
            while self.paused.load(Ordering::SeqCst) {
                self.resume_notify.notified().await;
                if self.cancelled.load(Ordering::SeqCst) {
                    break 'waves;
                }
            }

            let done: HashSet<String> = completed.union(&skipped).cloned().chain(failed.iter().cloned()).collect();
            let ready: Vec<WorkflowTask> = ready_tasks(&config.tasks, &completed, &done).into_iter().cloned().collect();
            if ready.is_empty() {
                break;
            }

            let (seq_like, parallel): (Vec<_>, Vec<_>) = ready.into_iter().partition(|t| !matches!(t.kind, TaskKind::Parallel));

            for task in seq_like {
                match self.run_one(&task, &completed, &task_results).await {
                    TaskOutcome::Completed(value) => {
                        completed.insert(task.id.clone());
                        task_results.insert(task.id.clone(), value);
                    }
                    TaskOutcome::Skipped => {
                        completed.insert(task.id.clone());
                        skipped.insert(task.id.clone());
                    }
                    TaskOutcome::Failed(message) => {
                        failed.insert(task.id.clone());
                        failure_message = Some(message);
                        break 'waves;
                    }
                }
            }

            if !parallel.is_empty() {
                let limit = config.parallel_limit.max(1);
                let semaphore = Arc::new(Semaphore::new(limit));
                let mut joins = JoinSet::new();
                for task in parallel {
                    let permit = semaphore.clone();
                    let completed_snapshot = completed.clone();
                    let results_snapshot = task_results.clone();
                    let this_broker = self.broker.clone();
                    let runner = self.runner.clone();
                    let workflow_id = self.workflow_id.clone();
                    joins.spawn(async move {
                        let _permit = match permit.acquire_owned().await {
                            Ok(permit) => permit,
                            Err(_) => return (task.id.clone(), TaskOutcome::Failed("scheduler semaphore closed".to_string())),
                        };
                        let outcome = run_one_standalone(&runner, &this_broker, &workflow_id, &task, &completed_snapshot, &results_snapshot).await;
                        (task.id.clone(), outcome)
                    });
                }
                while let Some(joined) = joins.join_next().await {
                    let (task_id, outcome) = joined.map_err(|e| KernelError::internal(format!("task join failure: {e}")))?;
                    match outcome {
                        TaskOutcome::Completed(value) => {
                            completed.insert(task_id.clone());
                            task_results.insert(task_id, value);
                        }
                        TaskOutcome::Skipped => {
                            completed.insert(task_id.clone());
                            skipped.insert(task_id);
                        }
                        TaskOutcome::Failed(message) => {
                            failed.insert(task_id);
                            failure_message = Some(message);
                        }
                    }
                }
                if failure_message.is_some() {
                    break;
                }
            }
        }

        let mut state = self.state.write().await;
        state.completed = completed.into_iter().collect();
        state.skipped = skipped.into_iter().collect();
        state.failed = failed.into_iter().collect();
        state.task_results = task_results;
        state.end_time = Some(relay_kernel::message::now_millis());

        if self.cancelled.load(Ordering::SeqCst) {
            state.status = WorkflowStatus::Cancelled;
        } else if let Some(message) = failure_message {
            state.status = WorkflowStatus::Failed;
            state.error_message = Some(message);
        } else {
            state.status = WorkflowStatus::Completed;
        }
        let final_state = state.clone();
        drop(state);

        match final_state.status {
            WorkflowStatus::Completed => emit_workflow(&self.broker, &self.workflow_id, "completed").await,
            WorkflowStatus::Failed => emit_workflow(&self.broker, &self.workflow_id, "failed").await,
            WorkflowStatus::Cancelled => emit_workflow(&self.broker, &self.workflow_id, "cancelled").await,
            _ => {}
        }

        if config.auto_save {
            if let Some(path) = &config.save_path {
                if let Err(e) = persist_state_atomic(path, &final_state, &config).await {
                    warn!(workflow_id = %self.workflow_id, error = %e, "failed to persist workflow state");
                }
            }
        }

        Ok(final_state)
    }

    async fn run_one(&self, task: &WorkflowTask, completed: &HashSet<String>, task_results: &HashMap<String, Value>) -> TaskOutcome {
        run_one_standalone(&self.runner, &self.broker, &self.workflow_id, task, completed, task_results).await
    }
}

enum TaskOutcome {
    Completed(Value),
    Skipped,
    Failed(String),
}

fn evaluate_conditions(conditions: &HashMap<String, Value>, completed: &HashSet<String>, task_results: &HashMap<String, Value>) -> bool {
    conditions.iter().all(|(key, expected)| {
        if let Some(id) = key.strip_prefix("task_result:") {
            task_results.get(id).map(|actual| actual == expected).unwrap_or(false)
        } else if let Some(id) = key.strip_prefix("task_status:") {
            completed.contains(id)
        } else {
            true
        }
    })
}

async fn run_one_standalone(
    runner: &Arc<dyn AgentRunner>,
    broker: &MessageBroker,
    workflow_id: &str,
    task: &WorkflowTask,
    completed: &HashSet<String>,
    task_results: &HashMap<String, Value>,
) -> TaskOutcome {
    if task.kind == TaskKind::Conditional && !evaluate_conditions(&task.conditions, completed, task_results) {
        emit_task(broker, workflow_id, &task.id, "skipped").await;
        return TaskOutcome::Skipped;
    }

    emit_task(broker, workflow_id, &task.id, "started").await;
    match run_with_retry(runner, task).await {
        Ok(text) => {
            emit_task(broker, workflow_id, &task.id, "completed").await;
            TaskOutcome::Completed(Value::String(text))
        }
        Err(e) => {
            emit_task(broker, workflow_id, &task.id, "failed").await;
            TaskOutcome::Failed(e.to_string())
        }
    }
}

async fn run_with_retry(runner: &Arc<dyn AgentRunner>, task: &WorkflowTask) -> KernelResult<String> {
    let mut attempt = 0u32;
    loop {
        let call = runner.run_task(&task.id, task.agent_config.as_ref(), &task.task_content);
        let result = match task.timeout_secs {
            Some(secs) => tokio::time::timeout(std::time::Duration::from_secs(secs), call)
                .await
                .map_err(|_| KernelError::Timeout(format!("task '{}' exceeded {secs}s", task.id)))
                .and_then(|inner| inner),
            None => call.await,
        };

        match result {
            Ok(text) => return Ok(text),
            Err(e) if attempt < task.max_retries => {
                attempt += 1;
                let backoff = 2u64.saturating_pow(attempt);
                info!(task_id = %task.id, attempt, backoff_secs = backoff, error = %e, "retrying workflow task");
                tokio::time::sleep(std::time::Duration::from_secs(backoff)).await;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn persist_state_atomic(path: &str, state: &WorkflowState, config: &WorkflowConfig) -> KernelResult<()> {
    let payload = serde_json::json!({
        "state": state,
        "config": {
            "name": config.name,
            "parallel_limit": config.parallel_limit,
        },
    });
    let bytes = serde_json::to_vec_pretty(&payload)?;
    let tmp_path = format!("{path}.tmp");
    tokio::fs::write(&tmp_path, &bytes).await?;
    tokio::fs::rename(&tmp_path, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::DefaultAgentRunner;
    use crate::task::WorkflowTask;
    use relay_agent::AgentConfig;

    fn engine(tasks: Vec<WorkflowTask>) -> WorkflowEngine {
        let config = WorkflowConfig::new("test-workflow", tasks);
        let runner = Arc::new(DefaultAgentRunner::new(AgentConfig::new("writer", "openai", "gpt-4o")));
        WorkflowEngine::new(config, runner, MessageBroker::new())
    }

    #[tokio::test]
    async fn runs_a_linear_chain_to_completion() {
        let tasks = vec![
            WorkflowTask::new("a", "fetch", TaskKind::Sequential, "fetch data"),
            WorkflowTask::new("b", "summarize", TaskKind::Sequential, "summarize it").depends_on(["fetch"]),
        ];
        let engine = engine(tasks);
        engine.initialize().await.unwrap();
        let state = engine.execute().await.unwrap();
        assert_eq!(state.status, WorkflowStatus::Completed);
        assert_eq!(state.completed.len(), 2);
        assert!(engine.get_task_result("summarize").await.is_some());
    }

    #[tokio::test]
    async fn unsatisfied_conditional_is_skipped_without_result() {
        let mut conditions = HashMap::new();
        conditions.insert("task_result:a".to_string(), Value::String("will never match".to_string()));
        let tasks = vec![
            WorkflowTask::new("a", "fetch", TaskKind::Sequential, "fetch data"),
            WorkflowTask::new("b", "maybe", TaskKind::Conditional, "only if matched").depends_on(["fetch"]).with_conditions(conditions),
        ];
        let engine = engine(tasks);
        engine.initialize().await.unwrap();
        let state = engine.execute().await.unwrap();
        assert_eq!(state.status, WorkflowStatus::Completed);
        assert!(state.completed.contains(&"b".to_string()));
        assert!(state.skipped.contains(&"b".to_string()));
        assert!(engine.get_task_result("maybe").await.is_none());
    }

    #[tokio::test]
    async fn cycle_is_rejected_at_initialize() {
        let tasks = vec![
            WorkflowTask::new("a", "a", TaskKind::Sequential, "x").depends_on(["b"]),
            WorkflowTask::new("b", "b", TaskKind::Sequential, "y").depends_on(["a"]),
        ];
        let engine = engine(tasks);
        assert!(engine.initialize().await.is_err());
    }

    #[tokio::test]
    async fn parallel_tasks_run_under_the_configured_limit() {
        let tasks = vec![
            WorkflowTask::new("a", "a", TaskKind::Parallel, "x"),
            WorkflowTask::new("b", "b", TaskKind::Parallel, "y"),
            WorkflowTask::new("c", "c", TaskKind::Parallel, "z"),
        ];
        let engine = engine(tasks);
        engine.initialize().await.unwrap();
        let state = engine.execute().await.unwrap();
        assert_eq!(state.status, WorkflowStatus::Completed);
        assert_eq!(state.completed.len(), 3);
    }

    #[tokio::test]
    async fn pause_then_resume_lets_the_workflow_finish() {
        let tasks = vec![WorkflowTask::new("a", "a", TaskKind::Sequential, "x")];
        let engine = Arc::new(engine(tasks));
        engine.initialize().await.unwrap();

        // Pause before execute() has a chance to see Running would race;
        // instead verify the resume-before-start path is a harmless no-op
        // and the run still completes.
        assert!(!engine.resume().await);
        let state = engine.execute().await.unwrap();
        assert_eq!(state.status, WorkflowStatus::Completed);
    }
}
