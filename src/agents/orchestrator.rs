// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Two-tier agent orchestrator
//!
//! A single classification call routes the goal: simple tasks run a ReAct
//! loop whose first step the classifier already produced, projects run a
//! plan executor seeded with the full development plan. Both paths share
//! one loop body. The model speaks the JSON step protocol in plain text;
//! tool execution goes through [`ToolDispatcher`], so observations are
//! always strings and a bad tool call never kills the run.
//!
//! Credential rotation mid-run rebuilds the session and re-seeds it from
//! the scratchpad, which survives every rebuild.

use std::sync::Arc;

use crate::error::{ApiError, OttoError, Result};
use crate::llm::credentials::CredentialPool;
use crate::llm::provider::{CompletionRequest, LlmProvider, ToolDefinition};
use crate::llm::rotation::{call_with_rotation, RotationPolicy};
use crate::llm::session::{ConversationSession, Turn};
use crate::tools::ToolDispatcher;

use super::parse::{parse_agent_step, parse_classification};
use super::prompts::{
    executor_instruction, executor_kickoff, master_instruction, objective_context,
    observation_prompt, plan_block, react_instruction, resume_prompt,
};
use super::types::{
    AgentOutcome, AgentProgressEvent, AgentStep, Classification, ProgressSender, Scratchpad,
    StopReason, TaskKind, DEFAULT_FINISH_ANSWER,
};

/// Step ceiling for the ReAct path
pub const DEFAULT_REACT_STEPS: usize = 10;

/// Step ceiling for the plan executor path
pub const DEFAULT_EXECUTOR_STEPS: usize = 30;

/// Parameters for one run of the shared loop
struct LoopSetup {
    kind: TaskKind,
    instruction: String,
    kickoff: String,
    /// Restates the objective or the plan when a rebuilt session is re-seeded
    resume_context: String,
    ceiling: usize,
    /// Step produced by the classifier, consumed before the first model call
    injected: Option<AgentStep>,
}

/// Drives an autonomous goal to completion
pub struct AgentOrchestrator {
    provider: Arc<dyn LlmProvider>,
    pool: CredentialPool,
    policy: RotationPolicy,
    dispatcher: ToolDispatcher,
    model: String,
    max_react_steps: usize,
    max_executor_steps: usize,
    max_output_tokens: u32,
    temperature: f32,
    progress: Option<ProgressSender>,
}

impl AgentOrchestrator {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        pool: CredentialPool,
        dispatcher: ToolDispatcher,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            pool,
            policy: RotationPolicy::default(),
            dispatcher,
            model: model.into(),
            max_react_steps: DEFAULT_REACT_STEPS,
            max_executor_steps: DEFAULT_EXECUTOR_STEPS,
            max_output_tokens: 8192,
            temperature: 0.7,
            progress: None,
        }
    }

    pub fn with_policy(mut self, policy: RotationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_step_limits(mut self, react: usize, executor: usize) -> Self {
        self.max_react_steps = react;
        self.max_executor_steps = executor;
        self
    }

    pub fn with_generation(mut self, max_output_tokens: u32, temperature: f32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self.temperature = temperature;
        self
    }

    /// Send progress events to `sender` as the run advances
    pub fn with_progress(mut self, sender: ProgressSender) -> Self {
        self.progress = Some(sender);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Classify the goal and drive the matching loop to an outcome.
    pub async fn run(&mut self, goal: &str) -> Result<AgentOutcome> {
        let definitions = self.dispatcher.definitions();
        tracing::info!(
            target: "otto.agents",
            model = %self.model,
            tools = definitions.len(),
            "agent run starting"
        );

        let classification = self.classify(goal, &definitions).await?;

        let setup = match classification.task_type.as_deref() {
            Some("project_plan") => {
                let plan = classification
                    .plan
                    .filter(|p| !p.files.is_empty())
                    .ok_or_else(|| OttoError::Agent("Project plan is empty".to_string()))?;

                self.emit(AgentProgressEvent::Classified {
                    kind: TaskKind::Project,
                });
                self.emit(AgentProgressEvent::PlanReady {
                    project_name: plan.project_name.clone(),
                    file_count: plan.files.len(),
                });
                tracing::info!(
                    target: "otto.agents",
                    project = %plan.project_name,
                    files = plan.files.len(),
                    "executing project plan"
                );

                let plan_json = serde_json::to_string_pretty(&plan)?;
                LoopSetup {
                    kind: TaskKind::Project,
                    instruction: executor_instruction(&definitions),
                    kickoff: executor_kickoff(&plan_json),
                    resume_context: plan_block(&plan_json),
                    ceiling: self.max_executor_steps,
                    injected: None,
                }
            }
            Some("simple_task") => {
                self.emit(AgentProgressEvent::Classified {
                    kind: TaskKind::Simple,
                });
                LoopSetup {
                    kind: TaskKind::Simple,
                    instruction: react_instruction(&definitions),
                    kickoff: goal.to_string(),
                    resume_context: objective_context(goal),
                    ceiling: self.max_react_steps,
                    injected: classification.first_step,
                }
            }
            other => {
                tracing::warn!(
                    target: "otto.agents",
                    task_type = ?other,
                    "unrecognized classification, treating the goal as a simple task"
                );
                self.emit(AgentProgressEvent::Classified {
                    kind: TaskKind::Simple,
                });
                LoopSetup {
                    kind: TaskKind::Simple,
                    instruction: react_instruction(&definitions),
                    kickoff: goal.to_string(),
                    resume_context: objective_context(goal),
                    ceiling: self.max_react_steps,
                    injected: None,
                }
            }
        };

        self.run_loop(goal, setup).await
    }

    /// One classification call. Retried on a fresh session after rotation.
    async fn classify(
        &mut self,
        goal: &str,
        definitions: &[ToolDefinition],
    ) -> Result<Classification> {
        let mut session = ConversationSession::new(master_instruction(definitions));
        let raw = self.call_model(&mut session, goal, goal).await?;
        Ok(parse_classification(&raw)?)
    }

    /// The shared step loop for both execution paths.
    async fn run_loop(&mut self, goal: &str, setup: LoopSetup) -> Result<AgentOutcome> {
        let mut session = ConversationSession::new(setup.instruction.clone());
        let mut scratchpad = Scratchpad::default();
        let mut pending = setup.injected;
        let mut next_prompt = setup.kickoff;

        for step_number in 1..=setup.ceiling {
            self.emit(AgentProgressEvent::StepStarted {
                step: step_number,
                ceiling: setup.ceiling,
            });

            let step = match pending.take() {
                Some(step) => step,
                None => {
                    let resume = resume_prompt(&setup.resume_context, &scratchpad);
                    let raw = self.call_model(&mut session, &next_prompt, &resume).await?;
                    parse_agent_step(&raw)?
                }
            };

            self.emit(AgentProgressEvent::Thought(step.thought.clone()));

            if step.is_finish() {
                let answer = step.answer().unwrap_or(DEFAULT_FINISH_ANSWER).to_string();
                self.emit(AgentProgressEvent::Finished {
                    answer: answer.clone(),
                });
                tracing::info!(
                    target: "otto.agents",
                    steps = step_number,
                    kind = %setup.kind,
                    "agent finished"
                );
                return Ok(AgentOutcome {
                    answer: Some(answer),
                    stop_reason: StopReason::Finished,
                    kind: setup.kind,
                    steps_taken: step_number,
                    scratchpad,
                    tool_calls: self.dispatcher.take_records(),
                });
            }

            let tool_name = step.tool_name().to_string();
            self.emit(AgentProgressEvent::ActionDispatched {
                tool_name: tool_name.clone(),
                args: step.action.tool_args.clone(),
            });

            // Dispatch never fails; bad calls come back as readable errors
            // the model can correct on the next step.
            let observation = self.dispatcher.dispatch(&tool_name, &step.action.tool_args).await;
            self.emit(AgentProgressEvent::Observation(observation.clone()));

            scratchpad.record(step.thought.clone(), step.action.clone(), observation.clone());
            next_prompt = observation_prompt(&observation, goal);
        }

        self.emit(AgentProgressEvent::StepLimitReached {
            ceiling: setup.ceiling,
        });
        tracing::warn!(
            target: "otto.agents",
            ceiling = setup.ceiling,
            kind = %setup.kind,
            "step ceiling reached without a finish action"
        );
        Ok(AgentOutcome {
            answer: None,
            stop_reason: StopReason::StepLimitReached,
            kind: setup.kind,
            steps_taken: setup.ceiling,
            scratchpad,
            tool_calls: self.dispatcher.take_records(),
        })
    }

    /// Push `prompt` and return the model's text reply.
    ///
    /// A credential rotation invalidates the session mid-call; the session
    /// is then rebuilt from its instruction and `resume` replaces the
    /// prompt. Consecutive rotations are capped at the pool size.
    async fn call_model(
        &mut self,
        session: &mut ConversationSession,
        prompt: &str,
        resume: &str,
    ) -> Result<String> {
        let mut prompt = prompt.to_string();
        let mut rebuilds: usize = 0;

        loop {
            session.push(Turn::user(&prompt));

            match self.complete_once(session).await {
                Ok(text) => {
                    session.push(Turn::model(&text));
                    return Ok(text);
                }
                Err(OttoError::SessionInvalidated { key_index }) => {
                    rebuilds += 1;
                    if rebuilds >= self.pool.len() {
                        return Err(ApiError::QuotaExhausted(format!(
                            "All {} configured credentials are exhausted",
                            self.pool.len()
                        ))
                        .into());
                    }
                    tracing::warn!(
                        target: "otto.agents",
                        slot = key_index,
                        rebuilds,
                        "credential rotated, re-seeding the agent session"
                    );
                    self.emit(AgentProgressEvent::SessionRebuilt { rebuilds });
                    *session = ConversationSession::new(session.system_instruction.clone());
                    prompt = resume.to_string();
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn complete_once(&mut self, session: &ConversationSession) -> Result<String> {
        // The step protocol rides in plain text, so no tool declarations
        let request = CompletionRequest::new(&self.model, session.turns.clone())
            .with_system(&session.system_instruction)
            .with_max_tokens(self.max_output_tokens)
            .with_temperature(self.temperature);

        let provider = self.provider.clone();
        let response = call_with_rotation(
            self.provider.as_ref(),
            &mut self.pool,
            &self.policy,
            "agent_step",
            move || {
                let provider = provider.clone();
                let request = request.clone();
                async move { provider.complete(request).await }
            },
        )
        .await?;

        Ok(response.text())
    }

    fn emit(&self, event: AgentProgressEvent) {
        if let Some(sender) = &self.progress {
            let _ = sender.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentParseError;
    use crate::llm::mock_provider::{MockOutcome, MockProvider};
    use crate::llm::session::Role;
    use crate::tools::{
        SchemaBuilder, ScriptedPrompt, Tool, ToolContext, ToolOutcome, ToolRegistry,
    };
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ProbeTool {
        invocations: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Tool for ProbeTool {
        fn name(&self) -> &str {
            "probe_tool"
        }

        fn definition(&self) -> crate::llm::provider::ToolDefinition {
            crate::llm::provider::ToolDefinition {
                name: "probe_tool".to_string(),
                description: "probe".to_string(),
                input_schema: SchemaBuilder::new().build(),
            }
        }

        async fn invoke(
            &self,
            _args: Value,
            _context: &ToolContext,
        ) -> crate::error::Result<ToolOutcome> {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            Ok(ToolOutcome::success("probe says hi"))
        }
    }

    fn probe_dispatcher(dry_run: bool) -> (ToolDispatcher, Arc<AtomicUsize>) {
        let invocations = Arc::new(AtomicUsize::new(0));
        let tool: Arc<dyn Tool> = Arc::new(ProbeTool {
            invocations: invocations.clone(),
        });
        let mut registry = ToolRegistry::new();
        registry.register(tool);
        let dispatcher = ToolDispatcher::new(
            registry,
            ToolContext::new(PathBuf::from("/tmp")),
            Arc::new(ScriptedPrompt::always(true)),
        )
        .with_dry_run(dry_run);
        (dispatcher, invocations)
    }

    fn fast_policy() -> RotationPolicy {
        RotationPolicy {
            max_soft_retries: 3,
            retry_margin_secs: 0,
            base_retry_delay_secs: 0,
            jitter: false,
        }
    }

    fn pool(keys: &[&str]) -> CredentialPool {
        CredentialPool::new(keys.iter().map(|k| k.to_string()).collect()).unwrap()
    }

    fn orchestrator_with(
        provider: MockProvider,
        keys: &[&str],
        dry_run: bool,
    ) -> (AgentOrchestrator, Arc<MockProvider>, Arc<AtomicUsize>) {
        let provider = Arc::new(provider);
        let (dispatcher, invocations) = probe_dispatcher(dry_run);
        let orchestrator = AgentOrchestrator::new(
            provider.clone(),
            pool(keys),
            dispatcher,
            "mock-model",
        )
        .with_policy(fast_policy());
        (orchestrator, provider, invocations)
    }

    fn step_json(thought: &str, tool: &str, args: Value) -> String {
        json!({
            "thought": thought,
            "action": {"tool_name": tool, "tool_args": args}
        })
        .to_string()
    }

    fn finish_json(answer: &str) -> String {
        step_json("done", "finish", json!({"answer": answer}))
    }

    fn simple_classification(tool: &str) -> String {
        json!({
            "task_type": "simple_task",
            "first_step": {
                "thought": "start by probing",
                "action": {"tool_name": tool, "tool_args": {}}
            }
        })
        .to_string()
    }

    fn project_classification() -> String {
        json!({
            "task_type": "project_plan",
            "plan": {
                "project_name": "demo_site",
                "reasoning": "small static site",
                "structure": {"demo_site": {"index.html": null}},
                "files": [
                    {"path": "demo_site/index.html", "description": "Landing page."}
                ]
            }
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_simple_task_uses_injected_first_step() {
        // Classification carries the first step, so only one more model
        // call (the finish) is needed.
        let provider = MockProvider::new()
            .with_response(simple_classification("probe_tool"))
            .with_response(finish_json("probe complete"));
        let (mut orchestrator, provider, invocations) =
            orchestrator_with(provider, &["key-a"], false);

        let outcome = orchestrator.run("probe the system").await.unwrap();

        assert_eq!(outcome.stop_reason, StopReason::Finished);
        assert_eq!(outcome.kind, TaskKind::Simple);
        assert_eq!(outcome.answer.as_deref(), Some("probe complete"));
        assert_eq!(outcome.steps_taken, 2);
        assert_eq!(invocations.load(Ordering::SeqCst), 1);
        // Classification + one step
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_finish_without_answer_uses_default() {
        let provider = MockProvider::new()
            .with_response(simple_classification("probe_tool"))
            .with_response(step_json("wrap up", "finish", json!({})));
        let (mut orchestrator, _, _) = orchestrator_with(provider, &["key-a"], false);

        let outcome = orchestrator.run("probe").await.unwrap();
        assert_eq!(outcome.answer.as_deref(), Some(DEFAULT_FINISH_ANSWER));
    }

    #[tokio::test]
    async fn test_step_ceiling_is_an_outcome_not_an_error() {
        // The model never finishes; the scripted step repeats forever.
        let provider = MockProvider::new()
            .with_response(simple_classification("probe_tool"))
            .with_response(step_json("keep probing", "probe_tool", json!({})));
        let (mut orchestrator, _, invocations) = orchestrator_with(provider, &["key-a"], false);
        orchestrator = orchestrator.with_step_limits(3, 30);

        let outcome = orchestrator.run("probe forever").await.unwrap();

        assert_eq!(outcome.stop_reason, StopReason::StepLimitReached);
        assert_eq!(outcome.answer, None);
        assert_eq!(outcome.steps_taken, 3);
        assert_eq!(invocations.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_scratchpad_records_every_executed_step() {
        let provider = MockProvider::new()
            .with_response(simple_classification("probe_tool"))
            .with_response(step_json("again", "probe_tool", json!({"n": 2})))
            .with_response(finish_json("done"));
        let (mut orchestrator, _, _) = orchestrator_with(provider, &["key-a"], false);

        let outcome = orchestrator.run("probe twice").await.unwrap();

        assert_eq!(outcome.scratchpad.len(), 2);
        let entries = outcome.scratchpad.entries();
        assert_eq!(entries[0].thought, "start by probing");
        assert_eq!(entries[0].observation, "probe says hi");
        assert_eq!(entries[1].action.tool_args, json!({"n": 2}));
        // Finish is not an executed step
        assert_eq!(outcome.steps_taken, 3);
    }

    #[tokio::test]
    async fn test_dry_run_synthesizes_observations() {
        let provider = MockProvider::new()
            .with_response(simple_classification("probe_tool"))
            .with_response(finish_json("done"));
        let (mut orchestrator, _, invocations) = orchestrator_with(provider, &["key-a"], true);

        let outcome = orchestrator.run("probe").await.unwrap();

        assert_eq!(invocations.load(Ordering::SeqCst), 0);
        assert_eq!(outcome.scratchpad.len(), 1);
        assert!(outcome.scratchpad.entries()[0]
            .observation
            .contains("Would have called 'probe_tool'"));
        // The audit log still records the synthetic dispatch
        assert_eq!(outcome.tool_calls.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_tool_feeds_error_back_and_continues() {
        let provider = MockProvider::new()
            .with_response(simple_classification("no_such_tool"))
            .with_response(finish_json("recovered"));
        let (mut orchestrator, _, _) = orchestrator_with(provider, &["key-a"], false);

        let outcome = orchestrator.run("probe").await.unwrap();

        assert_eq!(outcome.stop_reason, StopReason::Finished);
        assert!(outcome.scratchpad.entries()[0]
            .observation
            .contains("'no_such_tool' is not registered"));
    }

    #[tokio::test]
    async fn test_namespaced_tool_name_is_stripped_before_dispatch() {
        let provider = MockProvider::new()
            .with_response(simple_classification("functions:probe_tool"))
            .with_response(finish_json("done"));
        let (mut orchestrator, _, invocations) = orchestrator_with(provider, &["key-a"], false);

        let outcome = orchestrator.run("probe").await.unwrap();

        assert_eq!(invocations.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.scratchpad.entries()[0].observation, "probe says hi");
    }

    #[tokio::test]
    async fn test_malformed_step_aborts_with_raw_text() {
        let provider = MockProvider::new()
            .with_response(simple_classification("probe_tool"))
            .with_response("I refuse to speak JSON today.");
        let (mut orchestrator, _, _) = orchestrator_with(provider, &["key-a"], false);

        let err = orchestrator.run("probe").await.unwrap_err();

        match err {
            OttoError::AgentParse(AgentParseError::NoJsonFound { raw }) => {
                assert!(raw.contains("I refuse to speak JSON today."));
            }
            other => panic!("expected a parse abort, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_classification_aborts() {
        let provider = MockProvider::new().with_response("plain prose, no JSON");
        let (mut orchestrator, _, _) = orchestrator_with(provider, &["key-a"], false);

        let err = orchestrator.run("anything").await.unwrap_err();
        assert!(matches!(err, OttoError::AgentParse(_)));
    }

    #[tokio::test]
    async fn test_unrecognized_task_type_falls_back_to_react() {
        // No injected step on the fallback path: the first loop step is a
        // fresh model call.
        let provider = MockProvider::new()
            .with_response(r#"{"task_type": "interpretive_dance"}"#)
            .with_response(finish_json("improvised"));
        let (mut orchestrator, provider, _) = orchestrator_with(provider, &["key-a"], false);

        let outcome = orchestrator.run("dance").await.unwrap();

        assert_eq!(outcome.kind, TaskKind::Simple);
        assert_eq!(outcome.answer.as_deref(), Some("improvised"));
        assert_eq!(outcome.steps_taken, 1);
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_project_plan_with_no_files_is_an_error() {
        let provider = MockProvider::new().with_response(
            json!({
                "task_type": "project_plan",
                "plan": {"project_name": "empty", "files": []}
            })
            .to_string(),
        );
        let (mut orchestrator, _, _) = orchestrator_with(provider, &["key-a"], false);

        let err = orchestrator.run("build nothing").await.unwrap_err();
        match err {
            OttoError::Agent(msg) => assert!(msg.contains("Project plan is empty")),
            other => panic!("expected an agent error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_project_plan_missing_entirely_is_an_error() {
        let provider =
            MockProvider::new().with_response(r#"{"task_type": "project_plan"}"#);
        let (mut orchestrator, _, _) = orchestrator_with(provider, &["key-a"], false);

        let err = orchestrator.run("build").await.unwrap_err();
        assert!(matches!(err, OttoError::Agent(_)));
    }

    #[tokio::test]
    async fn test_project_path_seeds_executor_with_plan() {
        let provider = MockProvider::new()
            .with_response(project_classification())
            .with_response(step_json("create the page", "probe_tool", json!({})))
            .with_response(finish_json("Created demo_site.\n\nTo run it: open index.html"));
        let (mut orchestrator, provider, _) = orchestrator_with(provider, &["key-a"], false);

        let outcome = orchestrator.run("build me a site").await.unwrap();

        assert_eq!(outcome.kind, TaskKind::Project);
        assert_eq!(outcome.stop_reason, StopReason::Finished);

        let requests = provider.recorded_requests();
        assert_eq!(requests.len(), 3);
        // Executor session runs under the executor instruction with the
        // plan in its first message.
        let system = requests[1].system.as_deref().unwrap_or_default();
        assert!(system.contains("executor of a development plan"));
        let kickoff = requests[1].turns[0].text();
        assert!(kickoff.contains("PROJECT_PLAN"));
        assert!(kickoff.contains("demo_site"));
    }

    #[tokio::test]
    async fn test_rotation_mid_loop_preserves_scratchpad() {
        // Step 1 executes, then the quota dies; the rebuilt session is
        // re-seeded from the scratchpad and the run still finishes.
        let provider = MockProvider::new()
            .with_response(simple_classification("probe_tool"))
            .with_outcome(MockOutcome::QuotaExhausted("daily limit".to_string()))
            .with_response(finish_json("finished on the second key"));
        let (mut orchestrator, provider, _) =
            orchestrator_with(provider, &["key-a", "key-b"], false);

        let outcome = orchestrator.run("probe resiliently").await.unwrap();

        assert_eq!(outcome.stop_reason, StopReason::Finished);
        assert_eq!(outcome.scratchpad.len(), 1);
        assert_eq!(provider.keys_seen(), vec!["key-b".to_string()]);
        assert_eq!(provider.call_count(), 3);

        // The resume prompt restates the completed steps and the objective
        let requests = provider.recorded_requests();
        let resume = requests[2].turns[0].text();
        assert!(resume.contains("Completed steps so far"));
        assert!(resume.contains("Step 1:"));
        assert!(resume.contains("'probe resiliently'"));
    }

    #[tokio::test]
    async fn test_all_credentials_exhausted_surfaces_quota_error() {
        let provider = MockProvider::new()
            .with_outcome(MockOutcome::QuotaExhausted("dead".to_string()));
        let (mut orchestrator, provider, _) =
            orchestrator_with(provider, &["k1", "k2", "k3"], false);

        let err = orchestrator.run("anything").await.unwrap_err();

        match err {
            OttoError::Api(ApiError::QuotaExhausted(msg)) => {
                assert!(msg.contains("All 3 configured credentials are exhausted"));
            }
            other => panic!("expected quota exhaustion, got {:?}", other),
        }
        // One attempt per credential
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn test_progress_events_arrive_in_order() {
        let provider = MockProvider::new()
            .with_response(simple_classification("probe_tool"))
            .with_response(finish_json("done"));
        let (orchestrator, _, _) = orchestrator_with(provider, &["key-a"], false);

        let (sender, mut receiver) = tokio::sync::mpsc::unbounded_channel();
        let mut orchestrator = orchestrator.with_progress(sender);
        orchestrator.run("probe").await.unwrap();

        let mut events = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            events.push(event);
        }

        assert!(matches!(
            events[0],
            AgentProgressEvent::Classified {
                kind: TaskKind::Simple
            }
        ));
        assert!(events
            .iter()
            .any(|e| matches!(e, AgentProgressEvent::ActionDispatched { tool_name, .. } if tool_name == "probe_tool")));
        assert!(matches!(
            events.last().unwrap(),
            AgentProgressEvent::Finished { .. }
        ));
    }

    #[tokio::test]
    async fn test_observation_prompt_restates_goal_between_steps() {
        let provider = MockProvider::new()
            .with_response(simple_classification("probe_tool"))
            .with_response(finish_json("done"));
        let (mut orchestrator, provider, _) = orchestrator_with(provider, &["key-a"], false);

        orchestrator.run("count the files").await.unwrap();

        let requests = provider.recorded_requests();
        // Second request is the loop's first model call, prompted by the
        // injected step's observation.
        let prompt = requests[1].turns[0].text();
        assert!(prompt.contains("This was the result of your last action"));
        assert!(prompt.contains("probe says hi"));
        assert!(prompt.contains("'count the files'"));
    }

    #[tokio::test]
    async fn test_session_accumulates_turns_within_the_loop() {
        let provider = MockProvider::new()
            .with_response(simple_classification("probe_tool"))
            .with_response(step_json("again", "probe_tool", json!({})))
            .with_response(finish_json("done"));
        let (mut orchestrator, provider, _) = orchestrator_with(provider, &["key-a"], false);

        orchestrator.run("probe").await.unwrap();

        let requests = provider.recorded_requests();
        // Third request carries the loop's running history: prompt, reply,
        // next prompt.
        assert_eq!(requests[2].turns.len(), 3);
        assert_eq!(requests[2].turns[0].role, Role::User);
        assert_eq!(requests[2].turns[1].role, Role::Model);
        assert_eq!(requests[2].turns[2].role, Role::User);
    }

    #[test]
    fn test_progress_drops_are_silent() {
        let provider = Arc::new(MockProvider::new());
        let (dispatcher, _) = probe_dispatcher(false);
        let (sender, receiver) = tokio::sync::mpsc::unbounded_channel();
        drop(receiver);

        let orchestrator = AgentOrchestrator::new(
            provider,
            pool(&["key-a"]),
            dispatcher,
            "mock-model",
        )
        .with_progress(sender);

        // Receiver is gone; emit must not panic
        orchestrator.emit(AgentProgressEvent::StepStarted { step: 1, ceiling: 10 });
    }

    #[test]
    fn test_orchestrator_default_limits() {
        let provider = Arc::new(MockProvider::new());
        let (dispatcher, _) = probe_dispatcher(false);
        let orchestrator =
            AgentOrchestrator::new(provider, pool(&["key-a"]), dispatcher, "mock-model");

        assert_eq!(orchestrator.max_react_steps, DEFAULT_REACT_STEPS);
        assert_eq!(orchestrator.max_executor_steps, DEFAULT_EXECUTOR_STEPS);
        assert_eq!(orchestrator.model(), "mock-model");
    }
}
