//! The per-message pipeline.
//!
//! ```text
//! scan input → session → breaker gate → classify playbooks → select tools
//!   → model/tool loop → leak recovery → guard (one corrective retry)
//!   → breaker success/failure → scan output → record turn
//! ```

use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use switchyard_config::AppConfig;
use switchyard_core::error::{Error, ProviderError};
use switchyard_core::event::{DomainEvent, EventBus};
use switchyard_core::message::{Message, MessageToolCall};
use switchyard_core::model::{LanguageModel, ModelRequest, ToolDefinition};
use switchyard_core::tool::ToolOutcome;
use switchyard_playbooks::{CachedPlaybook, PlaybookCache, required_tools};
use switchyard_router::ToolRouter;
use switchyard_security::SecurityCoordinator;
use switchyard_selector::EmbeddingToolSelector;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::circuit::CircuitBreakerRegistry;
use crate::guard::HallucinationGuard;
use crate::recovery::{detect_leaked_tool_call, recover_leaked_tool_call};
use crate::sessions::{SessionManager, SessionTurn};

const ITERATION_LIMIT_REPLY: &str =
    "I've reached the maximum number of tool call iterations. Please provide further guidance.";

#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub agent_id: String,
    /// Absent for a new conversation
    pub session_id: Option<String>,
    pub text: String,
}

impl IncomingMessage {
    pub fn new(agent_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            session_id: None,
            text: text.into(),
        }
    }

    pub fn in_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Diagnostics attached to a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyFlag {
    /// The first draft was flagged and the corrective retry cleared it
    Corrected,
    /// The reply claims an action no tool performed
    UnverifiedAction(String),
    /// The reply disclaims access although matching tools were offered
    ToolRefusal(String),
    IterationLimit,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentReply {
    pub session_id: String,
    pub text: String,
    /// Tools that executed successfully during this turn
    pub tools_used: BTreeSet<String>,
    pub matched_playbooks: Vec<String>,
    /// Name of a tool executed from JSON leaked into the reply
    pub recovered_tool_call: Option<String>,
    pub flags: Vec<ReplyFlag>,
}

#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub model: String,
    pub temperature: f32,
    pub max_iterations: u32,
    pub system_prompt: String,
    /// Always offered to the model, whatever the selector says
    pub core_tools: Vec<String>,
    /// Bound on the whole model/tool loop of one message
    pub turn_timeout: Duration,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl AgentSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.agent.model.clone(),
            temperature: config.agent.temperature,
            max_iterations: config.agent.max_iterations,
            system_prompt: config.agent.system_prompt.clone(),
            core_tools: config.embeddings.core_tools.clone(),
            turn_timeout: config.router.skill_timeout(),
        }
    }
}

/// What one pass of the model/tool loop produced.
#[derive(Debug, Default)]
struct LoopOutcome {
    text: String,
    tools_used: BTreeSet<String>,
    /// Most recent successful tool, whose provider governs the output scan
    last_tool: Option<String>,
    any_failed: bool,
    hit_limit: bool,
}

impl LoopOutcome {
    fn absorb(&mut self, next: LoopOutcome) {
        self.text = next.text;
        self.tools_used.extend(next.tools_used);
        self.last_tool = next.last_tool.or(self.last_tool.take());
        self.any_failed |= next.any_failed;
        self.hit_limit = next.hit_limit;
    }
}

pub struct Orchestrator {
    model: Arc<dyn LanguageModel>,
    router: Arc<ToolRouter>,
    security: SecurityCoordinator,
    guard: HallucinationGuard,
    sessions: Arc<SessionManager>,
    breakers: Arc<CircuitBreakerRegistry>,
    playbooks: Option<Arc<PlaybookCache>>,
    selector: Option<Arc<EmbeddingToolSelector>>,
    events: Arc<EventBus>,
    settings: AgentSettings,
}

impl Orchestrator {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        router: Arc<ToolRouter>,
        security: SecurityCoordinator,
        guard: HallucinationGuard,
    ) -> Self {
        Self {
            model,
            router,
            security,
            guard,
            sessions: Arc::new(SessionManager::default()),
            breakers: Arc::new(CircuitBreakerRegistry::new(Default::default())),
            playbooks: None,
            selector: None,
            events: Arc::new(EventBus::default()),
            settings: AgentSettings::default(),
        }
    }

    pub fn with_sessions(mut self, sessions: Arc<SessionManager>) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn with_breakers(mut self, breakers: Arc<CircuitBreakerRegistry>) -> Self {
        self.breakers = breakers;
        self
    }

    pub fn with_playbooks(mut self, playbooks: Arc<PlaybookCache>) -> Self {
        self.playbooks = Some(playbooks);
        self
    }

    /// Narrow the catalog per message. Without a selector every tool is offered.
    pub fn with_selector(mut self, selector: Arc<EmbeddingToolSelector>) -> Self {
        self.selector = Some(selector);
        self
    }

    pub fn with_event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    pub fn with_settings(mut self, settings: AgentSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn breakers(&self) -> &CircuitBreakerRegistry {
        &self.breakers
    }

    /// Run one inbound message through the full pipeline.
    ///
    /// Fails on a blocked input or output, an open breaker, or a model
    /// error. Tool failures do not fail the call; they are reported to the
    /// model and count against the agent's breaker.
    pub async fn handle_message(&self, incoming: IncomingMessage) -> Result<AgentReply, Error> {
        let agent_id = incoming.agent_id.as_str();
        let security = self.security.for_agent(agent_id);

        let scan = security.scan_input(&incoming.text).await;
        security.assert_allowed(&scan, "input")?;

        let session = self
            .sessions
            .get_or_create(incoming.session_id.as_deref(), agent_id);

        if !self.breakers.can_process(agent_id) {
            warn!(agent_id = %agent_id, "Circuit open, refusing message");
            return Err(Error::CircuitOpen {
                agent_id: agent_id.to_string(),
            });
        }

        info!(agent_id = %agent_id, session_id = %session.id, "Handling message");

        let matched = match &self.playbooks {
            Some(cache) => cache.classify(&incoming.text).await,
            None => Vec::new(),
        };
        let mut core_tools = self.settings.core_tools.clone();
        for tool in required_tools(&matched) {
            if !core_tools.contains(&tool) {
                core_tools.push(tool);
            }
        }

        let catalog = self.router.get_tool_definitions();
        let tools = self.select_tools(&incoming.text, &catalog, &core_tools).await;
        let max_iterations = matched
            .iter()
            .find_map(|p| p.max_steps)
            .unwrap_or(self.settings.max_iterations)
            .max(1);

        let mut messages = vec![Message::system(self.system_prompt(&matched))];
        for turn in &session.turns {
            messages.push(Message::user(&turn.user_message));
            messages.push(Message::assistant(&turn.assistant_response));
        }
        messages.push(Message::user(&incoming.text));

        let deadline = Instant::now() + self.settings.turn_timeout;
        let mut outcome = match self
            .run_bounded(&mut messages, &tools, max_iterations, deadline)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                self.breakers.record_failure(agent_id);
                return Err(e.into());
            }
        };

        let mut flags = Vec::new();
        let mut recovered_tool_call = None;

        let available: Vec<String> = catalog.iter().map(|t| t.name.clone()).collect();
        if let Some(leaked) = detect_leaked_tool_call(&outcome.text, &available) {
            let result =
                recover_leaked_tool_call(&leaked.tool_name, leaked.parameters, self.router.as_ref())
                    .await;
            self.events.publish(DomainEvent::LeakedToolCallRecovered {
                tool_name: leaked.tool_name.clone(),
                success: result.success,
                timestamp: Utc::now(),
            });
            if result.success {
                outcome.tools_used.insert(leaked.tool_name.clone());
                outcome.last_tool = Some(leaked.tool_name.clone());
            } else {
                outcome.any_failed = true;
            }
            outcome.text = join_nonempty(&leaked.preamble, &result.render());
            recovered_tool_call = Some(leaked.tool_name);
        } else if let Some(flag) = self.check_reply(&outcome, !tools.is_empty()) {
            debug!(agent_id = %agent_id, ?flag, "Reply flagged, re-prompting once");
            messages.push(Message::assistant(&outcome.text));
            messages.push(Message::user(corrective_prompt(&flag)));
            match self
                .run_bounded(&mut messages, &tools, max_iterations, deadline)
                .await
            {
                Ok(retry) => {
                    outcome.absorb(retry);
                    match self.check_reply(&outcome, !tools.is_empty()) {
                        Some(still) => {
                            warn!(agent_id = %agent_id, flag = ?still, "Reply still flagged after correction");
                            flags.push(still);
                        }
                        None => flags.push(ReplyFlag::Corrected),
                    }
                }
                Err(e) => {
                    warn!(agent_id = %agent_id, error = %e, "Corrective retry failed, keeping first reply");
                    flags.push(flag);
                }
            }
        }
        if outcome.hit_limit {
            flags.push(ReplyFlag::IterationLimit);
        }

        // Recorded ahead of the output scan so a blocked reply never leaves the breaker half-open.
        if outcome.any_failed {
            self.breakers.record_failure(agent_id);
        } else {
            self.breakers.record_success(agent_id);
        }

        let provider = outcome
            .last_tool
            .as_deref()
            .and_then(|tool| self.router.provider_for(tool));
        let scan = security
            .scan_output_from(&outcome.text, provider.as_deref())
            .await;
        security.assert_allowed(&scan, "output")?;

        self.sessions.add_turn(
            &session.id,
            SessionTurn::new(
                incoming.text.clone(),
                outcome.text.clone(),
                outcome.tools_used.iter().cloned(),
            ),
            agent_id,
        );

        Ok(AgentReply {
            session_id: session.id,
            text: outcome.text,
            tools_used: outcome.tools_used,
            matched_playbooks: matched.into_iter().map(|p| p.name).collect(),
            recovered_tool_call,
            flags,
        })
    }

    async fn select_tools(
        &self,
        message: &str,
        catalog: &[ToolDefinition],
        core_tools: &[String],
    ) -> Vec<ToolDefinition> {
        let Some(selector) = &self.selector else {
            return catalog.to_vec();
        };
        match selector.select_tools(message, catalog, core_tools).await {
            Ok(tools) => tools,
            Err(e) => {
                warn!(error = %e, "Tool selection failed, offering full catalog");
                catalog.to_vec()
            }
        }
    }

    fn system_prompt(&self, matched: &[CachedPlaybook]) -> String {
        let mut prompt = self.settings.system_prompt.clone();
        for playbook in matched {
            prompt.push_str(&format!(
                "\n\n## Playbook: {}\n{}",
                playbook.name, playbook.instructions
            ));
        }
        prompt
    }

    fn check_reply(&self, outcome: &LoopOutcome, has_tools: bool) -> Option<ReplyFlag> {
        if outcome.tools_used.is_empty()
            && let Some(phrase) = self.guard.detect_action_hallucination(&outcome.text)
        {
            return Some(ReplyFlag::UnverifiedAction(phrase));
        }
        self.guard
            .detect_tool_refusal(&outcome.text, has_tools)
            .map(ReplyFlag::ToolRefusal)
    }

    async fn run_bounded(
        &self,
        messages: &mut Vec<Message>,
        tools: &[ToolDefinition],
        max_iterations: u32,
        deadline: Instant,
    ) -> Result<LoopOutcome, ProviderError> {
        tokio::time::timeout_at(deadline, self.run_loop(messages, tools, max_iterations))
            .await
            .map_err(|_| {
                ProviderError::Timeout(format!(
                    "turn exceeded {}ms",
                    self.settings.turn_timeout.as_millis()
                ))
            })?
    }

    /// Call the model until it answers without tool calls or the iteration
    /// budget runs out.
    async fn run_loop(
        &self,
        messages: &mut Vec<Message>,
        tools: &[ToolDefinition],
        max_iterations: u32,
    ) -> Result<LoopOutcome, ProviderError> {
        let mut outcome = LoopOutcome::default();

        for iteration in 1..=max_iterations {
            debug!(iteration, "Model iteration");
            let request = ModelRequest {
                model: self.settings.model.clone(),
                messages: messages.clone(),
                temperature: self.settings.temperature,
                max_tokens: None,
                tools: tools.to_vec(),
            };
            let response = self.model.complete(request).await?;

            if response.message.tool_calls.is_empty() {
                outcome.text = response.message.content.clone();
                messages.push(response.message);
                return Ok(outcome);
            }

            let calls = response.message.tool_calls.clone();
            messages.push(response.message);
            for call in &calls {
                let result = self.execute_call(call).await;
                if result.success {
                    outcome.tools_used.insert(call.name.clone());
                    outcome.last_tool = Some(call.name.clone());
                } else {
                    outcome.any_failed = true;
                }
                messages.push(Message::tool_result(&call.id, result.render()));
            }
        }

        warn!(max_iterations, "Max tool iterations reached");
        outcome.text = ITERATION_LIMIT_REPLY.into();
        outcome.hit_limit = true;
        Ok(outcome)
    }

    async fn execute_call(&self, call: &MessageToolCall) -> ToolOutcome {
        let arguments = match call.parsed_arguments() {
            Ok(arguments) => arguments,
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Malformed tool arguments");
                return ToolOutcome::failure(format!("invalid arguments: {e}"));
            }
        };
        match self.router.route_tool_call(&call.name, arguments).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Model called an unknown tool");
                ToolOutcome::failure(e.to_string())
            }
        }
    }
}

fn corrective_prompt(flag: &ReplyFlag) -> String {
    match flag {
        ReplyFlag::UnverifiedAction(phrase) => format!(
            "Your previous reply said \"{phrase}\" but no tool was called, so nothing was done. \
             Call the appropriate tool now, or tell the user plainly that the action was not performed."
        ),
        ReplyFlag::ToolRefusal(phrase) => format!(
            "Your previous reply said \"{phrase}\", but tools that can answer this are available. \
             Use them instead of declining."
        ),
        ReplyFlag::Corrected | ReplyFlag::IterationLimit => String::new(),
    }
}

fn join_nonempty(first: &str, second: &str) -> String {
    match (first.is_empty(), second.is_empty()) {
        (true, _) => second.to_string(),
        (_, true) => first.to_string(),
        _ => format!("{first}\n\n{second}"),
    }
}
