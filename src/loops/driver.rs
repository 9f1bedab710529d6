//! Continuation loop state machine.
//!
//! `LoopDriver` keeps a session working: after each inference turn it
//! inspects the transcript for the exact completion marker and either
//! re-injects a continuation prompt, stops on completion, or stops on
//! iteration exhaustion. All state lives in the session's persisted
//! `LoopState`; the driver re-reads it before every decision, so restarts
//! and speculative cancels from other processes are always safe.

use log::{info, warn};

use crate::config::LoopConfig;
use crate::domain::{LoopPhase, LoopState};
use crate::error::{HuddleError, Result};
use crate::runtime::HostRuntime;
use crate::store::{FileStore, StorePaths};

use super::marker::contains_promise;

/// Options for starting a loop. Unset fields fall back to config defaults.
#[derive(Debug, Clone, Default)]
pub struct StartOptions {
    pub completion_promise: Option<String>,
    pub max_iterations: Option<u32>,
    pub ultrawork_mode: bool,
}

/// Per-turn decision handed back to the orchestration layer.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnDecision {
    /// Re-inject `continuation_prompt` and keep the session working.
    Continue {
        iteration: u32,
        continuation_prompt: String,
    },

    /// Stop the loop. `report` says why, suitable for the agent's next turn.
    Stop { phase: LoopPhase, report: String },
}

/// Drives one session's continuation loop against persisted state.
#[derive(Debug, Clone)]
pub struct LoopDriver {
    paths: StorePaths,
    config: LoopConfig,
}

impl LoopDriver {
    pub fn new(paths: StorePaths, config: LoopConfig) -> Self {
        Self { paths, config }
    }

    /// Start a loop for `session_id`.
    ///
    /// Fails with `AlreadyActive` if the session already has an active
    /// loop. At most one active loop per session.
    pub fn start(&self, session_id: &str, prompt: &str, opts: StartOptions) -> Result<LoopState> {
        let promise = opts
            .completion_promise
            .unwrap_or_else(|| self.config.completion_promise.clone());
        let max_iterations = opts.max_iterations.unwrap_or(self.config.max_iterations);

        if promise.is_empty() {
            return Err(HuddleError::InvalidState(
                "Completion promise must be non-empty".to_string(),
            ));
        }
        if max_iterations == 0 {
            return Err(HuddleError::InvalidState(
                "max_iterations must be at least 1".to_string(),
            ));
        }

        if let Some(existing) = self.read_state(session_id)?
            && existing.active
        {
            return Err(HuddleError::AlreadyActive(session_id.to_string()));
        }

        let mut state = LoopState::new(prompt, &promise, max_iterations);
        state.session_id = Some(session_id.to_string());
        state.ultrawork_mode = opts.ultrawork_mode;

        self.write_state(session_id, &state)?;
        info!(
            "Started loop for session {} (promise={}, max_iterations={})",
            session_id, promise, max_iterations
        );
        Ok(state)
    }

    /// Decide what to do after a completed turn, given the transcript text.
    ///
    /// Exact-marker hit stops the loop as Completed. Otherwise the
    /// iteration count advances and the loop continues until the cap,
    /// where it stops as Exhausted with an explicit report, never a
    /// silent stop.
    pub fn on_turn_complete(&self, session_id: &str, transcript: &str) -> Result<TurnDecision> {
        let mut state = self.read_state(session_id)?.ok_or_else(|| {
            HuddleError::InvalidState(format!("No loop state for session: {}", session_id))
        })?;

        if !state.active {
            // A concurrent cancel or a finished loop; nothing to drive.
            return Ok(TurnDecision::Stop {
                phase: state.phase,
                report: format!("Loop is no longer active ({})", state.phase),
            });
        }

        if contains_promise(transcript, &state.completion_promise) {
            state.finish(LoopPhase::Completed);
            self.write_state(session_id, &state)?;
            info!(
                "Loop completed for session {} after {} iteration(s)",
                session_id, state.iteration
            );
            return Ok(TurnDecision::Stop {
                phase: LoopPhase::Completed,
                report: format!(
                    "Completion promise \"{}\" detected after {} iteration(s)",
                    state.completion_promise, state.iteration
                ),
            });
        }

        state.iteration += 1;
        if state.iteration >= state.max_iterations {
            state.finish(LoopPhase::Exhausted);
            self.write_state(session_id, &state)?;
            warn!(
                "Loop exhausted for session {} at {} iteration(s)",
                session_id, state.iteration
            );
            return Ok(TurnDecision::Stop {
                phase: LoopPhase::Exhausted,
                report: format!(
                    "Loop exhausted: {} iteration(s) elapsed without the completion promise \"{}\"",
                    state.iteration, state.completion_promise
                ),
            });
        }

        self.write_state(session_id, &state)?;
        Ok(TurnDecision::Continue {
            iteration: state.iteration,
            continuation_prompt: render_continuation_prompt(&state),
        })
    }

    /// Run one full turn boundary against the host: read the transcript,
    /// decide, and re-inject the continuation prompt on Continue.
    pub async fn drive_turn(
        &self,
        host: &dyn HostRuntime,
        session_id: &str,
    ) -> Result<TurnDecision> {
        // Orphan recovery happens here, before the decision.
        if self.recover(host, session_id).await?.is_none() {
            return Err(HuddleError::InvalidState(format!(
                "No loop state for session: {}",
                session_id
            )));
        }

        let transcript = host.read_transcript(session_id).await?;
        let decision = self.on_turn_complete(session_id, &transcript)?;

        if let TurnDecision::Continue {
            continuation_prompt, ..
        } = &decision
        {
            host.send_prompt(session_id, continuation_prompt).await?;
        }

        Ok(decision)
    }

    /// Cancel the session's loop. Idempotent: absent or already-terminal
    /// state is a no-op success, so cancellation is always safe to call
    /// speculatively.
    pub fn cancel(&self, session_id: &str) -> Result<()> {
        let Some(mut state) = self.read_state(session_id)? else {
            return Ok(());
        };

        if !state.active {
            return Ok(());
        }

        state.finish(LoopPhase::Cancelled);
        self.write_state(session_id, &state)?;
        info!("Cancelled loop for session {}", session_id);
        Ok(())
    }

    /// Read the session's loop state without recovery.
    pub fn status(&self, session_id: &str) -> Result<Option<LoopState>> {
        self.read_state(session_id)
    }

    /// Read the session's loop state, flipping an orphaned active loop
    /// (owning session confirmed gone) to Cancelled instead of resuming it.
    pub async fn recover(
        &self,
        host: &dyn HostRuntime,
        session_id: &str,
    ) -> Result<Option<LoopState>> {
        let Some(mut state) = self.read_state(session_id)? else {
            return Ok(None);
        };

        if state.active && !host.session_exists(session_id).await? {
            warn!(
                "Session {} no longer exists; cancelling its orphaned loop",
                session_id
            );
            state.finish(LoopPhase::Cancelled);
            self.write_state(session_id, &state)?;
        }

        Ok(Some(state))
    }

    /// Delete the session's loop record. Used for explicit archival; a
    /// terminal record is otherwise retained for status reporting.
    pub fn clear(&self, session_id: &str) -> Result<()> {
        FileStore::remove(&self.paths.loop_state_path(session_id))
    }

    fn read_state(&self, session_id: &str) -> Result<Option<LoopState>> {
        FileStore::read(&self.paths.loop_state_path(session_id))
    }

    fn write_state(&self, session_id: &str, state: &LoopState) -> Result<()> {
        FileStore::write(&self.paths.loop_state_path(session_id), state)
    }
}

/// Render the prompt re-injected on Continue.
fn render_continuation_prompt(state: &LoopState) -> String {
    let remaining = state.max_iterations.saturating_sub(state.iteration);
    let mut prompt = format!(
        "Continue working on the task below. When it is genuinely complete, \
         emit <promise>{}</promise> and stop.\n\n{}",
        state.completion_promise, state.prompt
    );

    if state.ultrawork_mode {
        prompt.push_str(&format!(
            "\n\nIteration {} of {} ({} remaining). Do not stop early; keep \
             working until the task is done or the budget runs out.",
            state.iteration, state.max_iterations, remaining
        ));
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MockHost;
    use tempfile::TempDir;

    fn create_test_driver() -> (TempDir, LoopDriver) {
        let temp = TempDir::new().unwrap();
        let driver = LoopDriver::new(StorePaths::at_root(temp.path()), LoopConfig::default());
        (temp, driver)
    }

    fn start_loop(driver: &LoopDriver, session: &str, promise: &str, max: u32) -> LoopState {
        driver
            .start(
                session,
                "Do the task",
                StartOptions {
                    completion_promise: Some(promise.to_string()),
                    max_iterations: Some(max),
                    ultrawork_mode: false,
                },
            )
            .unwrap()
    }

    #[test]
    fn test_start_creates_active_state() {
        let (_temp, driver) = create_test_driver();
        let state = start_loop(&driver, "sess-1", "DONE", 5);

        assert!(state.active);
        assert_eq!(state.iteration, 0);
        assert_eq!(state.session_id.as_deref(), Some("sess-1"));
    }

    #[test]
    fn test_start_twice_is_already_active() {
        let (_temp, driver) = create_test_driver();
        start_loop(&driver, "sess-1", "DONE", 5);

        let result = driver.start("sess-1", "Another task", StartOptions::default());
        assert!(matches!(result, Err(HuddleError::AlreadyActive(_))));
    }

    #[test]
    fn test_start_after_terminal_loop_is_fine() {
        let (_temp, driver) = create_test_driver();
        start_loop(&driver, "sess-1", "DONE", 5);
        driver.cancel("sess-1").unwrap();

        let state = start_loop(&driver, "sess-1", "DONE", 5);
        assert!(state.active);
        assert_eq!(state.iteration, 0);
    }

    #[test]
    fn test_start_rejects_empty_promise() {
        let (_temp, driver) = create_test_driver();
        let result = driver.start(
            "sess-1",
            "task",
            StartOptions {
                completion_promise: Some(String::new()),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(HuddleError::InvalidState(_))));
    }

    #[test]
    fn test_start_rejects_zero_iterations() {
        let (_temp, driver) = create_test_driver();
        let result = driver.start(
            "sess-1",
            "task",
            StartOptions {
                max_iterations: Some(0),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(HuddleError::InvalidState(_))));
    }

    #[test]
    fn test_start_uses_config_defaults() {
        let (_temp, driver) = create_test_driver();
        let state = driver.start("sess-1", "task", StartOptions::default()).unwrap();
        assert_eq!(state.completion_promise, "DONE");
        assert_eq!(state.max_iterations, 10);
    }

    #[test]
    fn test_immediate_marker_completes() {
        let (_temp, driver) = create_test_driver();
        start_loop(&driver, "sess-1", "DONE", 1);

        let decision = driver
            .on_turn_complete("sess-1", "all good <promise>DONE</promise>")
            .unwrap();

        assert!(matches!(
            decision,
            TurnDecision::Stop {
                phase: LoopPhase::Completed,
                ..
            }
        ));
        let state = driver.status("sess-1").unwrap().unwrap();
        assert!(!state.active);
        assert_eq!(state.phase, LoopPhase::Completed);
    }

    #[test]
    fn test_wrong_token_marker_does_not_complete() {
        let (_temp, driver) = create_test_driver();
        start_loop(&driver, "sess-1", "DONE", 5);

        let decision = driver
            .on_turn_complete("sess-1", "<promise>DONE_PHASE_1</promise>")
            .unwrap();

        assert!(matches!(decision, TurnDecision::Continue { iteration: 1, .. }));
    }

    #[test]
    fn test_three_turn_scenario() {
        let (_temp, driver) = create_test_driver();
        start_loop(&driver, "sess-1", "DONE", 3);

        let turn1 = driver.on_turn_complete("sess-1", "working...").unwrap();
        assert!(matches!(turn1, TurnDecision::Continue { iteration: 1, .. }));

        let turn2 = driver.on_turn_complete("sess-1", "still working").unwrap();
        assert!(matches!(turn2, TurnDecision::Continue { iteration: 2, .. }));

        let turn3 = driver
            .on_turn_complete("sess-1", "<promise>DONE</promise>")
            .unwrap();
        assert!(matches!(
            turn3,
            TurnDecision::Stop {
                phase: LoopPhase::Completed,
                ..
            }
        ));
    }

    #[test]
    fn test_exhaustion_at_max_iterations() {
        let (_temp, driver) = create_test_driver();
        start_loop(&driver, "sess-1", "DONE", 3);

        assert!(matches!(
            driver.on_turn_complete("sess-1", "nope").unwrap(),
            TurnDecision::Continue { iteration: 1, .. }
        ));
        assert!(matches!(
            driver.on_turn_complete("sess-1", "nope").unwrap(),
            TurnDecision::Continue { iteration: 2, .. }
        ));

        let last = driver.on_turn_complete("sess-1", "nope").unwrap();
        match last {
            TurnDecision::Stop { phase, report } => {
                assert_eq!(phase, LoopPhase::Exhausted);
                assert!(report.contains("exhausted"));
            }
            other => panic!("Expected exhaustion stop, got {:?}", other),
        }

        // No further increments once terminal
        let after = driver.on_turn_complete("sess-1", "nope").unwrap();
        assert!(matches!(
            after,
            TurnDecision::Stop {
                phase: LoopPhase::Exhausted,
                ..
            }
        ));
        let state = driver.status("sess-1").unwrap().unwrap();
        assert_eq!(state.iteration, 3);
        assert!(state.iteration <= state.max_iterations);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let (_temp, driver) = create_test_driver();
        start_loop(&driver, "sess-1", "DONE", 5);

        driver.cancel("sess-1").unwrap();
        driver.cancel("sess-1").unwrap();

        let state = driver.status("sess-1").unwrap().unwrap();
        assert!(!state.active);
        assert_eq!(state.phase, LoopPhase::Cancelled);
    }

    #[test]
    fn test_cancel_absent_session_is_ok() {
        let (_temp, driver) = create_test_driver();
        driver.cancel("nobody").unwrap();
    }

    #[test]
    fn test_cancel_does_not_overwrite_completed() {
        let (_temp, driver) = create_test_driver();
        start_loop(&driver, "sess-1", "DONE", 5);
        driver
            .on_turn_complete("sess-1", "<promise>DONE</promise>")
            .unwrap();

        driver.cancel("sess-1").unwrap();
        let state = driver.status("sess-1").unwrap().unwrap();
        assert_eq!(state.phase, LoopPhase::Completed);
    }

    #[test]
    fn test_turn_on_missing_loop_is_error() {
        let (_temp, driver) = create_test_driver();
        let result = driver.on_turn_complete("nobody", "text");
        assert!(matches!(result, Err(HuddleError::InvalidState(_))));
    }

    #[test]
    fn test_continuation_prompt_mentions_promise_and_task() {
        let (_temp, driver) = create_test_driver();
        start_loop(&driver, "sess-1", "SHIPPED", 5);

        let decision = driver.on_turn_complete("sess-1", "working").unwrap();
        match decision {
            TurnDecision::Continue {
                continuation_prompt, ..
            } => {
                assert!(continuation_prompt.contains("<promise>SHIPPED</promise>"));
                assert!(continuation_prompt.contains("Do the task"));
            }
            other => panic!("Expected continue, got {:?}", other),
        }
    }

    #[test]
    fn test_ultrawork_prompt_mentions_budget() {
        let (_temp, driver) = create_test_driver();
        driver
            .start(
                "sess-1",
                "Big refactor",
                StartOptions {
                    completion_promise: Some("DONE".to_string()),
                    max_iterations: Some(4),
                    ultrawork_mode: true,
                },
            )
            .unwrap();

        let decision = driver.on_turn_complete("sess-1", "working").unwrap();
        match decision {
            TurnDecision::Continue {
                continuation_prompt, ..
            } => {
                assert!(continuation_prompt.contains("Iteration 1 of 4"));
                assert!(continuation_prompt.contains("3 remaining"));
            }
            other => panic!("Expected continue, got {:?}", other),
        }
    }

    #[test]
    fn test_clear_removes_record() {
        let (_temp, driver) = create_test_driver();
        start_loop(&driver, "sess-1", "DONE", 5);
        driver.cancel("sess-1").unwrap();
        driver.clear("sess-1").unwrap();
        assert!(driver.status("sess-1").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_drive_turn_sends_continuation_prompt() {
        let (_temp, driver) = create_test_driver();
        let host = MockHost::new();
        host.add_session("sess-1", "working...");
        start_loop(&driver, "sess-1", "DONE", 5);

        let decision = driver.drive_turn(&host, "sess-1").await.unwrap();
        assert!(matches!(decision, TurnDecision::Continue { .. }));

        let prompts = host.sent_prompts("sess-1");
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("<promise>DONE</promise>"));
    }

    #[tokio::test]
    async fn test_drive_turn_stops_on_marker_without_prompting() {
        let (_temp, driver) = create_test_driver();
        let host = MockHost::new();
        host.add_session("sess-1", "<promise>DONE</promise>");
        start_loop(&driver, "sess-1", "DONE", 5);

        let decision = driver.drive_turn(&host, "sess-1").await.unwrap();
        assert!(matches!(
            decision,
            TurnDecision::Stop {
                phase: LoopPhase::Completed,
                ..
            }
        ));
        assert!(host.sent_prompts("sess-1").is_empty());
    }

    #[tokio::test]
    async fn test_recover_cancels_orphaned_loop() {
        let (_temp, driver) = create_test_driver();
        let host = MockHost::new();
        host.add_session("sess-1", "working");
        start_loop(&driver, "sess-1", "DONE", 5);

        host.kill_session("sess-1");

        let state = driver.recover(&host, "sess-1").await.unwrap().unwrap();
        assert!(!state.active);
        assert_eq!(state.phase, LoopPhase::Cancelled);
    }

    #[tokio::test]
    async fn test_recover_leaves_live_loop_alone() {
        let (_temp, driver) = create_test_driver();
        let host = MockHost::new();
        host.add_session("sess-1", "working");
        start_loop(&driver, "sess-1", "DONE", 5);

        let state = driver.recover(&host, "sess-1").await.unwrap().unwrap();
        assert!(state.active);
        assert_eq!(state.phase, LoopPhase::Active);
    }
}
