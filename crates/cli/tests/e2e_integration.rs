//! End-to-end tests wiring every Switchyard crate together the way the CLI
//! does: skills on disk, namespaced providers, the embedding selector and
//! per-agent security overrides.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use switchyard_agent::{HallucinationGuard, IncomingMessage, Orchestrator};
use switchyard_config::{AgentSecurityOverride, SecurityConfig};
use switchyard_core::error::{EmbeddingError, Error, ProviderError, ToolError};
use switchyard_core::message::{Message, MessageToolCall};
use switchyard_core::model::{LanguageModel, ModelRequest, ModelResponse};
use switchyard_core::tool::{Tool, ToolOutcome, ToolRegistry};
use switchyard_core::EmbeddingBackend;
use switchyard_playbooks::{PlaybookCache, PlaybookCacheOptions, SkillLoader};
use switchyard_router::{LocalToolProvider, RouterOptions, ToolRouter};
use switchyard_security::SecurityCoordinator;
use switchyard_selector::{EmbeddingCache, EmbeddingToolSelector, SelectorOptions};
use tempfile::tempdir;

// ── Scripted model ─────────────────────────────────────────────────────────

struct ScriptedModel {
    replies: Mutex<Vec<ModelResponse>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    fn new(mut replies: Vec<ModelResponse>) -> Arc<Self> {
        replies.reverse();
        Arc::new(Self {
            replies: Mutex::new(replies),
            requests: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        "e2e"
    }

    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop()
            .ok_or_else(|| ProviderError::Network("no more replies".into()))
    }
}

fn text(content: &str) -> ModelResponse {
    ModelResponse {
        message: Message::assistant(content),
        model: "e2e".into(),
    }
}

fn call(name: &str, arguments: Value) -> ModelResponse {
    let mut message = Message::assistant("");
    message.tool_calls.push(MessageToolCall {
        id: "call_1".into(),
        name: name.into(),
        arguments: arguments.to_string(),
    });
    ModelResponse {
        message,
        model: "e2e".into(),
    }
}

// ── Tools and providers ────────────────────────────────────────────────────

struct StaticTool {
    name: &'static str,
    description: &'static str,
}

#[async_trait]
impl Tool for StaticTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        self.description
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object"})
    }

    async fn execute(&self, arguments: Value) -> Result<ToolOutcome, ToolError> {
        Ok(ToolOutcome::ok(json!({"tool": self.name, "args": arguments})))
    }
}

fn provider(id: &str, tools: Vec<StaticTool>) -> Arc<LocalToolProvider> {
    let mut registry = ToolRegistry::new();
    for tool in tools {
        registry.register(Box::new(tool));
    }
    Arc::new(LocalToolProvider::new(id, registry))
}

async fn router() -> Arc<ToolRouter> {
    let mut router = ToolRouter::new(RouterOptions::default());
    router.register_provider(
        "mail",
        provider(
            "mail",
            vec![
                StaticTool { name: "send", description: "Send an email" },
                StaticTool { name: "search", description: "Search email messages" },
            ],
        ),
    );
    router.register_provider(
        "calendar",
        provider(
            "calendar",
            vec![
                StaticTool { name: "search", description: "Search calendar events" },
                StaticTool { name: "create_event", description: "Create a calendar event" },
            ],
        ),
    );
    router.discover_tools().await;
    Arc::new(router)
}

/// Bag-of-words vectors over a tiny vocabulary.
struct KeywordEmbeddings;

const VOCABULARY: [&str; 4] = ["email", "calendar", "weather", "time"];

fn bag_of_words(text: &str) -> Vec<f32> {
    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered.split(|c: char| !c.is_alphanumeric()).collect();
    VOCABULARY
        .iter()
        .map(|v| words.iter().filter(|w| *w == v).count() as f32)
        .collect()
}

#[async_trait]
impl EmbeddingBackend for KeywordEmbeddings {
    fn provider_id(&self) -> &str {
        "keywords"
    }

    fn model_id(&self) -> &str {
        "bow-4"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(bag_of_words(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| bag_of_words(t)).collect())
    }
}

fn open_security() -> SecurityCoordinator {
    SecurityCoordinator::from_config(
        None,
        &SecurityConfig {
            input_enabled: false,
            output_fail_mode: switchyard_core::FailMode::Open,
            ..SecurityConfig::default()
        },
    )
}

// ── Scenarios ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn skills_selector_and_namespaced_routing() {
    let temp = tempdir().unwrap();
    let skills = temp.path().join("skills");
    let bundle = skills.join("meeting-prep");
    std::fs::create_dir_all(&bundle).unwrap();
    std::fs::write(
        bundle.join("SKILL.md"),
        "---\nname: meeting-prep\ndescription: Prepare meetings\nplaybook:\n  keywords: [meeting]\n  priority: 4\n  required_tools: [create_event]\n---\nAlways create the calendar event before emailing attendees.\n",
    )
    .unwrap();

    let router = router().await;
    let names: BTreeSet<String> = router
        .get_tool_definitions()
        .into_iter()
        .map(|t| t.name)
        .collect();
    let expected: BTreeSet<String> = ["calendar.search", "create_event", "mail.search", "send"]
        .into_iter()
        .map(String::from)
        .collect();
    assert_eq!(names, expected);

    let cache_path = temp.path().join("embedding-cache.json");
    let selector = Arc::new(
        EmbeddingToolSelector::new(
            Arc::new(KeywordEmbeddings),
            SelectorOptions {
                threshold: 0.5,
                top_k: 2,
                min_tools: 0,
            },
        )
        .with_cache_path(&cache_path),
    );
    let init = selector.initialize(&router.get_tool_definitions()).await.unwrap();
    assert_eq!(init.embedded, 4);
    assert_eq!(EmbeddingCache::load(&cache_path).unwrap().len(), 4);

    let playbooks = PlaybookCache::new(PlaybookCacheOptions::default())
        .with_loader(SkillLoader::new(&skills));

    let model = ScriptedModel::new(vec![
        call("create_event", json!({"title": "Sync with Dana"})),
        text("The sync is on the calendar; drafting the invite next."),
    ]);
    let orchestrator = Orchestrator::new(
        model.clone(),
        router.clone(),
        open_security(),
        HallucinationGuard::new().unwrap(),
    )
    .with_playbooks(Arc::new(playbooks))
    .with_selector(selector.clone());

    let reply = orchestrator
        .handle_message(IncomingMessage::new("assistant", "Set up a meeting and email Dana"))
        .await
        .unwrap();

    assert_eq!(reply.matched_playbooks, vec!["meeting-prep".to_string()]);
    assert!(reply.tools_used.contains("create_event"));

    let requests = model.requests.lock().unwrap();
    let offered: BTreeSet<String> = requests[0].tools.iter().map(|t| t.name.clone()).collect();
    let expected: BTreeSet<String> = ["create_event", "mail.search", "send"]
        .into_iter()
        .map(String::from)
        .collect();
    assert_eq!(offered, expected);
    assert!(requests[0].messages[0]
        .content
        .contains("Always create the calendar event"));

    let stats = selector.get_last_selection_stats().unwrap();
    assert_eq!(stats.core_tool_count, 1);
    assert_eq!(stats.selected_count, 3);
}

#[tokio::test]
async fn prefixed_tools_route_to_their_own_provider() {
    let router = router().await;
    let outcome = router
        .route_tool_call("calendar.search", json!({"q": "standup"}))
        .await
        .unwrap();
    assert_eq!(outcome.result.unwrap()["tool"], "search");
    assert_eq!(router.provider_for("calendar.search").as_deref(), Some("calendar"));
    assert_eq!(router.provider_for("mail.search").as_deref(), Some("mail"));
    assert!(router.route_tool_call("search", json!({})).await.is_err());
}

#[tokio::test]
async fn per_agent_override_relaxes_closed_input_policy() {
    let mut agents = HashMap::new();
    agents.insert(
        "ops".to_string(),
        AgentSecurityOverride {
            input_enabled: Some(false),
            output_fail_mode: Some(switchyard_core::FailMode::Open),
            ..AgentSecurityOverride::default()
        },
    );
    // No scanner and closed defaults: everyone but "ops" is blocked
    let security = SecurityCoordinator::from_config(
        None,
        &SecurityConfig {
            agents,
            ..SecurityConfig::default()
        },
    );

    let model = ScriptedModel::new(vec![text("All systems nominal.")]);
    let orchestrator = Orchestrator::new(
        model,
        router().await,
        security,
        HallucinationGuard::new().unwrap(),
    );

    let reply = orchestrator
        .handle_message(IncomingMessage::new("ops", "status?"))
        .await
        .unwrap();
    assert_eq!(reply.text, "All systems nominal.");

    let err = orchestrator
        .handle_message(IncomingMessage::new("assistant", "status?"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Security(_)));
}
