use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use taskflow_agent::openai::OpenAiProvider;
use taskflow_agent::orchestrator::{OrchestratorConfig, TaskOrchestrator};
use taskflow_agent::provider::LlmProvider;
use taskflow_agent::router::{ProviderRouter, ProviderSlot};
use taskflow_agent::skills::text::TextSkill;
use taskflow_agent::skills::vision::VisionSkill;
use taskflow_agent::skills::{Skill, SkillSet};
use taskflow_agent::tools::ToolRegistry;
use taskflow_core::config::{ProviderConfig, TaskflowConfig};
use tracing::{info, warn};

mod app;
mod http;

/// Streaming task gateway for chat completions.
#[derive(Parser, Debug)]
#[command(name = "taskflow-gateway", version, about)]
struct Cli {
    /// Config file (default: $TASKFLOW_CONFIG, then ~/.taskflow/taskflow.toml)
    #[arg(long)]
    config: Option<String>,

    /// Address to bind, overrides gateway.bind
    #[arg(long)]
    bind: Option<String>,

    /// Port to listen on, overrides gateway.port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "taskflow_gateway=info,taskflow_agent=info,tower_http=debug".into()
            }),
        )
        .init();

    let cli = Cli::parse();

    // explicit path > TASKFLOW_CONFIG env > ~/.taskflow/taskflow.toml
    let config_path = cli.config.or_else(|| std::env::var("TASKFLOW_CONFIG").ok());
    let mut config = TaskflowConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        TaskflowConfig::default()
    });
    if let Some(bind) = cli.bind {
        config.gateway.bind = bind;
    }
    if let Some(port) = cli.port {
        config.gateway.port = port;
    }

    let skills = build_skills(&config);
    let orchestrator = TaskOrchestrator::new(skills, OrchestratorConfig::from(&config.agent));

    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port).parse()?;
    let state = Arc::new(app::AppState::new(config, orchestrator));
    let router = app::build_router(state);

    info!("Taskflow gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Taskflow gateway stopped");
    Ok(())
}

/// Build the text and vision skills from the provider sections.
///
/// A skill whose provider has no API key is left out; requests that need
/// it are rejected with `CONFIG_ERROR` instead of failing mid-stream.
fn build_skills(config: &TaskflowConfig) -> SkillSet {
    let max_retries = config.agent.max_retries;

    let text = config.providers.text.as_ref().and_then(|p| {
        let provider = build_provider("text", p, max_retries)?;
        let model = config.providers.text_model();
        info!(provider = %provider.name(), model = %model, "text skill ready");
        let mut skill = TextSkill::new(provider, model);
        if config.tools.enabled {
            let ttl = Duration::from_secs(config.tools.cache_ttl_secs);
            skill = skill.with_tools(Arc::new(ToolRegistry::builtin(ttl)));
        }
        Some(Arc::new(skill) as Arc<dyn Skill>)
    });

    let vision = config.providers.vision.as_ref().and_then(|p| {
        let provider = build_provider("vision", p, max_retries)?;
        let model = config.providers.vision_model();
        info!(provider = %provider.name(), model = %model, "vision skill ready");
        Some(Arc::new(VisionSkill::new(provider, model)) as Arc<dyn Skill>)
    });

    if text.is_none() {
        warn!("No text provider configured, chat requests will be rejected");
    }
    if vision.is_none() {
        info!("No vision provider configured, image requests will be rejected");
    }
    SkillSet::new(text, vision)
}

fn build_provider(
    name: &str,
    config: &ProviderConfig,
    max_retries: u32,
) -> Option<Arc<dyn LlmProvider>> {
    if !config.is_configured() {
        return None;
    }
    info!("LLM provider {}: {}", name, config.endpoint());
    let provider = OpenAiProvider::from_config(name, config);
    if max_retries == 0 {
        return Some(Arc::new(provider));
    }
    let router = ProviderRouter::new(name, vec![ProviderSlot::new(Box::new(provider), max_retries)]);
    Some(Arc::new(router))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
