//! Delegation contract between a coordinator and worker agents.
//!
//! A coordinator hands a unit of work to a worker either foreground (the
//! call awaits the worker's reply and returns it inline, no TaskRecord) or
//! background (a TaskRecord is created and transitioned to in_progress, the
//! worker runs out-of-band, and the returned handle can be polled through
//! the tracker). Delegation-time failures come back as a `Failed` handle so
//! the coordinator's own loop decides retry-or-abandon; they are never
//! thrown past it.

use std::sync::Arc;

use async_trait::async_trait;
use log::{error, info, warn};

use crate::config::DelegationConfig;
use crate::domain::{TaskRecord, TaskStatus};
use crate::error::{HuddleError, Result};
use crate::repo::Repository;

/// What a coordinator asks for. Not persisted on its own.
#[derive(Debug, Clone, Default)]
pub struct DelegationRequest {
    /// Short human-readable description of the unit of work
    pub description: String,

    /// Full prompt handed to the worker
    pub prompt: String,

    /// Worker category; falls back to the configured default
    pub subagent_type: Option<String>,

    /// Background: tracked TaskRecord. Foreground: inline reply.
    pub run_in_background: bool,

    /// Existing session the worker should attach to, if any
    pub session_id: Option<String>,

    /// Command that originated this delegation, for audit text
    pub origin_command: Option<String>,

    /// Skill identifiers the worker should preload before starting
    pub skills: Vec<String>,
}

/// What `delegate` hands back.
#[derive(Debug, Clone, PartialEq)]
pub enum DelegationHandle {
    /// Foreground reply, returned inline
    Sync { reply: String },

    /// Background task the coordinator can poll or be notified about
    Background { list_id: String, task_id: String },

    /// Delegation-time failure, reported as data
    Failed { reason: String },
}

impl DelegationHandle {
    pub fn is_failed(&self) -> bool {
        matches!(self, DelegationHandle::Failed { .. })
    }
}

/// Everything a dispatcher needs to start one worker.
#[derive(Debug, Clone)]
pub struct WorkerSpec {
    pub description: String,
    pub prompt: String,
    pub subagent_type: String,
    pub session_id: Option<String>,
    pub origin_command: Option<String>,

    /// Skills the worker will preload; unknown ids are filtered out
    /// before dispatch
    pub skills: Vec<String>,
}

/// Starts worker agent instances. Implemented by the embedding runtime.
#[async_trait]
pub trait WorkerDispatcher: Send + Sync {
    /// Worker categories this dispatcher can start.
    fn known_subagent_types(&self) -> Vec<String>;

    /// Skill identifiers workers can preload.
    fn known_skills(&self) -> Vec<String>;

    /// Run one worker to completion and return its reply text.
    /// Startup failures surface as `DispatchFailed`.
    async fn run_worker(&self, spec: WorkerSpec) -> Result<String>;
}

/// Coordinator-side delegation entry point.
pub struct Delegator {
    dispatcher: Arc<dyn WorkerDispatcher>,
    repo: Repository,
    config: DelegationConfig,

    /// Coordinator session that owns background task records
    session_id: String,
}

impl Delegator {
    pub fn new(
        dispatcher: Arc<dyn WorkerDispatcher>,
        repo: Repository,
        config: DelegationConfig,
        session_id: &str,
    ) -> Self {
        Self {
            dispatcher,
            repo,
            config,
            session_id: session_id.to_string(),
        }
    }

    /// Delegate one unit of work.
    ///
    /// `InvalidSubagentType` and `DispatchFailed` are folded into a
    /// `Failed` handle; storage errors still propagate, since they mean
    /// the coordination substrate itself is unhealthy.
    pub async fn delegate(&self, request: DelegationRequest) -> Result<DelegationHandle> {
        let spec = match self.build_spec(&request) {
            Ok(spec) => spec,
            Err(e @ HuddleError::InvalidSubagentType(_)) => {
                return Ok(DelegationHandle::Failed {
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        };

        if request.run_in_background {
            self.delegate_background(&request, spec).await
        } else {
            self.delegate_foreground(spec).await
        }
    }

    /// Validate the subagent type and filter unknown skills.
    fn build_spec(&self, request: &DelegationRequest) -> Result<WorkerSpec> {
        let subagent_type = request
            .subagent_type
            .clone()
            .unwrap_or_else(|| self.config.default_subagent_type.clone());

        if !self
            .dispatcher
            .known_subagent_types()
            .contains(&subagent_type)
        {
            return Err(HuddleError::InvalidSubagentType(subagent_type));
        }

        let known_skills = self.dispatcher.known_skills();
        let mut skills = Vec::new();
        for skill in &request.skills {
            if known_skills.contains(skill) {
                skills.push(skill.clone());
            } else {
                // Non-fatal: the worker proceeds without it.
                warn!("Unknown skill id \"{}\" dropped from delegation", skill);
            }
        }

        Ok(WorkerSpec {
            description: request.description.clone(),
            prompt: request.prompt.clone(),
            subagent_type,
            session_id: request.session_id.clone(),
            origin_command: request.origin_command.clone(),
            skills,
        })
    }

    async fn delegate_foreground(&self, spec: WorkerSpec) -> Result<DelegationHandle> {
        match self.dispatcher.run_worker(spec).await {
            Ok(reply) => Ok(DelegationHandle::Sync { reply }),
            Err(e @ HuddleError::DispatchFailed(_)) => Ok(DelegationHandle::Failed {
                reason: e.to_string(),
            }),
            Err(e) => Err(e),
        }
    }

    async fn delegate_background(
        &self,
        request: &DelegationRequest,
        spec: WorkerSpec,
    ) -> Result<DelegationHandle> {
        let list_id = self.config.default_list.clone();
        let task = TaskRecord::new(&list_id, &request.description, &self.session_id);
        let task_id = task.id.clone();

        self.repo.create_task(&task)?;
        self.repo.update_task_status(
            &list_id,
            &task_id,
            TaskStatus::InProgress,
            None,
            &self.session_id,
        )?;
        info!(
            "Dispatched background task {}/{}: {}",
            list_id, task_id, request.description
        );

        let dispatcher = Arc::clone(&self.dispatcher);
        let repo = self.repo.clone();
        let owner = self.session_id.clone();
        let spawn_list = list_id.clone();
        let spawn_task = task_id.clone();

        tokio::spawn(async move {
            let outcome = dispatcher.run_worker(spec).await;
            let (status, result) = match outcome {
                Ok(reply) => (TaskStatus::Completed, Some(reply)),
                Err(e) => (TaskStatus::Failed, Some(e.to_string())),
            };

            if let Err(e) =
                repo.update_task_status(&spawn_list, &spawn_task, status, result, &owner)
            {
                // The record stays in_progress; the tracker will still
                // surface it rather than dropping it silently.
                error!(
                    "Failed to record outcome for task {}/{}: {}",
                    spawn_list, spawn_task, e
                );
            }
        });

        Ok(DelegationHandle::Background { list_id, task_id })
    }
}
