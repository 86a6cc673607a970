//! `switchyard ask`: Send one message through the full pipeline.

use std::path::PathBuf;
use std::sync::Arc;
use switchyard_agent::{
    AgentSettings, CircuitBreakerOptions, CircuitBreakerRegistry, HallucinationGuard,
    IncomingMessage, Orchestrator, SessionManager, SessionOptions,
};
use switchyard_config::AppConfig;
use switchyard_core::event::EventBus;
use switchyard_core::model::LanguageModel;
use switchyard_playbooks::{PlaybookCache, PlaybookCacheOptions, SkillLoader};
use switchyard_providers::{OpenAiChat, OpenAiEmbeddings};
use switchyard_router::{RouterOptions, ToolRouter};
use switchyard_security::SecurityCoordinator;
use switchyard_selector::{EmbeddingToolSelector, SelectorOptions};
use tracing::{debug, warn};

use super::doctor::unscanned_policy_issues;
use crate::builtin;

pub async fn run(
    message: String,
    agent: String,
    dir: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    preflight(&config, &agent)?;

    let model = Arc::new(OpenAiChat::from_config(&config.agent)?);
    let orchestrator = build(&config, model, dir).await?;

    let reply = orchestrator
        .handle_message(IncomingMessage::new(agent, message))
        .await?;

    println!("{}", reply.text);
    if !reply.tools_used.is_empty() {
        let tools: Vec<&str> = reply.tools_used.iter().map(String::as_str).collect();
        eprintln!("  tools: {}", tools.join(", "));
    }
    if !reply.matched_playbooks.is_empty() {
        eprintln!("  playbooks: {}", reply.matched_playbooks.join(", "));
    }
    for flag in &reply.flags {
        eprintln!("  flag: {flag:?}");
    }
    Ok(())
}

/// Refuse to start when the agent's policy would block every message,
/// since the CLI has no safety scanner to consult.
fn preflight(config: &AppConfig, agent: &str) -> Result<(), String> {
    let security = SecurityCoordinator::from_config(None, &config.security).for_agent(agent);
    let issues = unscanned_policy_issues(security.policy());
    if issues.is_empty() {
        return Ok(());
    }
    Err(format!(
        "no safety scanner is configured and the policy for agent '{agent}' would block this message:\n  - {}",
        issues.join("\n  - ")
    ))
}

/// Wire the whole stack around `model`.
async fn build(
    config: &AppConfig,
    model: Arc<dyn LanguageModel>,
    dir: Option<PathBuf>,
) -> Result<Orchestrator, Box<dyn std::error::Error>> {
    let events = Arc::new(EventBus::default());

    let mut router =
        ToolRouter::new(RouterOptions::from_config(&config.router)).with_event_bus(events.clone());
    router.register_provider(builtin::PROVIDER_ID, Arc::new(builtin::provider()));
    let report = router.discover_tools().await;
    debug!(tools = report.tool_count, "Tools discovered");
    let router = Arc::new(router);

    let security =
        SecurityCoordinator::from_config(None, &config.security).with_event_bus(events.clone());

    let skills_dir = dir.unwrap_or_else(|| config.playbooks.skills_dir());
    let playbooks = PlaybookCache::new(PlaybookCacheOptions::from_config(&config.playbooks))
        .with_loader(SkillLoader::new(skills_dir))
        .with_event_bus(events.clone());

    let breakers = CircuitBreakerRegistry::new(CircuitBreakerOptions::from_config(
        &config.circuit_breaker,
    ))
    .with_event_bus(events.clone());

    let mut orchestrator = Orchestrator::new(model, router.clone(), security, HallucinationGuard::new()?)
        .with_sessions(Arc::new(SessionManager::new(SessionOptions::from_config(&config.sessions))))
        .with_breakers(Arc::new(breakers))
        .with_playbooks(Arc::new(playbooks))
        .with_event_bus(events)
        .with_settings(AgentSettings::from_config(config));

    if config.embeddings.enabled {
        let backend = Arc::new(OpenAiEmbeddings::from_config(&config.embeddings)?);
        let selector = EmbeddingToolSelector::new(backend, SelectorOptions::from_config(&config.embeddings))
            .with_cache_path(config.embeddings.cache_path());
        match selector.initialize(&router.get_tool_definitions()).await {
            Ok(report) => debug!(cached = report.cached, embedded = report.embedded, "Selector ready"),
            Err(e) => warn!(error = %e, "Embedding selector unavailable, offering every tool"),
        }
        orchestrator = orchestrator.with_selector(Arc::new(selector));
    }

    Ok(orchestrator)
}
