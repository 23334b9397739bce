use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod config;
mod play;

use config::{ensure_skeleton_config, load_config, LovegateConfig};
use lovegate_channels::telegram::TelegramBot;
use lovegate_channels::ChannelBot;
use lovegate_provider::{create_provider, ProviderType};
use lovegate_server::state::AppState;
use lovegate_story::{CharacterId, JsonFileStore, StoryEngine};

#[derive(Parser)]
#[command(name = "lovegate", version, about = "Lovegate companion chat: web API, Telegram bot and story engine")]
struct Cli {
    #[arg(
        long,
        default_value = "~/.lovegate",
        help = "Config root directory (contains config/, data/ and logs/)"
    )]
    config_root: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Start the HTTP API server and the Telegram bot")]
    Start {
        #[arg(long, help = "Override server.bind from main.yaml")]
        bind: Option<String>,
    },
    #[command(about = "Run only the HTTP API server")]
    Serve {
        #[arg(long, help = "Override server.bind from main.yaml")]
        bind: Option<String>,
    },
    #[command(about = "Run only the Telegram bot")]
    Bot,
    #[command(about = "Validate config and story content")]
    Validate,
    #[command(about = "Play a character's story in the terminal")]
    Play {
        #[arg(help = "Character id: alisa, maria, sofia, katya or lera")]
        character: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();

    if cli.config_root.starts_with("~") {
        if let Some(home) = std::env::var_os("HOME") {
            cli.config_root = PathBuf::from(home).join(cli.config_root.strip_prefix("~").unwrap_or(&cli.config_root));
        }
    }

    let log_dir = cli.config_root.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, "lovegate.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(non_blocking))
        .init();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let root = cli.config_root.as_path();
    match command {
        Commands::Validate => {
            let config = load_config(&root.join("config"))?;
            let engine = StoryEngine::builtin().context("story content failed validation")?;
            let episodes: usize = CharacterId::ALL.iter().map(|id| engine.episodes(*id).len()).sum();
            println!(
                "Config valid. {} characters, {} episodes, server on {}.",
                CharacterId::ALL.len(),
                episodes,
                config.server.bind
            );
            for missing in missing_secrets(&config) {
                println!("  warning: {missing} is not set");
            }
        }
        Commands::Start { bind } => {
            let config = prepare(root)?;
            run_start(&config, bind).await?;
        }
        Commands::Serve { bind } => {
            let config = prepare(root)?;
            let state = build_app_state(&config)?;
            let addr = bind.unwrap_or_else(|| config.server.bind.clone());
            tokio::select! {
                result = lovegate_server::serve(state, &addr) => result?,
                _ = shutdown_signal() => {}
            }
        }
        Commands::Bot => {
            let config = prepare(root)?;
            Box::new(build_bot(&config)?).run().await?;
        }
        Commands::Play { character } => {
            let character: CharacterId = character.parse()?;
            let config = prepare(root)?;
            run_play(root, &config, character).await?;
        }
    }

    Ok(())
}

fn prepare(root: &Path) -> Result<LovegateConfig> {
    ensure_skeleton_config(root)?;
    load_config(&root.join("config"))
}

fn missing_secrets(config: &LovegateConfig) -> Vec<String> {
    let mut missing = Vec::new();
    if config.telegram.enabled && config.telegram.require_token().is_err() {
        missing.push("BOT_TOKEN".to_string());
    }
    if config.provider.provider_type != ProviderType::Stub && config.provider.resolve_api_key().is_err() {
        missing.push(config.provider.api_key_env.clone());
    }
    missing
}

fn build_app_state(config: &LovegateConfig) -> Result<AppState> {
    let provider = create_provider(&config.provider).context("chat provider is not usable")?;
    let engine = StoryEngine::builtin().context("story content failed validation")?;
    Ok(AppState::new(provider, Arc::new(engine))
        .with_model(config.provider.model.clone())
        .with_personas(config.personas.clone()))
}

fn build_bot(config: &LovegateConfig) -> Result<TelegramBot> {
    let token = config.telegram.require_token()?.to_string();
    let adapter = config.telegram.adapter()?;
    Ok(TelegramBot::new(token, adapter))
}

async fn run_start(config: &LovegateConfig, bind: Option<String>) -> Result<()> {
    let state = build_app_state(config)?;
    let bot = if config.telegram.enabled {
        Some(build_bot(config)?)
    } else {
        tracing::warn!("telegram is disabled in main.yaml, running HTTP server only");
        None
    };

    let addr = bind.unwrap_or_else(|| config.server.bind.clone());
    let mut server = tokio::spawn(async move { lovegate_server::serve(state, &addr).await });

    match bot {
        Some(bot) => {
            let bot: Box<dyn ChannelBot> = Box::new(bot);
            tracing::info!("Starting {} bot", bot.channel_type());
            tokio::select! {
                result = &mut server => result.context("HTTP server task failed")??,
                result = bot.run() => result?,
                _ = shutdown_signal() => tracing::info!("Goodbye."),
            }
        }
        None => {
            tokio::select! {
                result = &mut server => result.context("HTTP server task failed")??,
                _ = shutdown_signal() => tracing::info!("Goodbye."),
            }
        }
    }
    server.abort();
    Ok(())
}

async fn run_play(root: &Path, config: &LovegateConfig, character: CharacterId) -> Result<()> {
    let engine = StoryEngine::builtin().context("story content failed validation")?;
    let store = JsonFileStore::new(config.state.state_file(root));

    let chat = match create_provider(&config.provider) {
        Ok(provider) => Some(play::ChatContext {
            provider,
            model: config.provider.model.clone(),
            persona: config
                .personas
                .get(&character)
                .cloned()
                .unwrap_or_else(|| character.character().persona.to_string()),
        }),
        Err(err) => {
            tracing::warn!("free-text chat disabled: {err:#}");
            None
        }
    };

    play::run(&engine, &store, chat, character).await
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => tracing::info!("Received SIGINT, shutting down..."),
                    _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(err) => {
                tracing::warn!("failed to install SIGTERM handler: {err}");
                ctrl_c.await.ok();
                tracing::info!("Received SIGINT, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        tracing::info!("Received SIGINT, shutting down...");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_config() -> LovegateConfig {
        serde_yaml::from_str("telegram:\n  enabled: false\nprovider:\n  type: stub\n").unwrap()
    }

    #[tokio::test]
    async fn start_fails_when_port_is_taken() {
        let held = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = held.local_addr().unwrap().to_string();

        let err = run_start(&offline_config(), Some(addr.clone())).await.unwrap_err();
        assert!(format!("{err:#}").contains(&addr));
    }

    #[test]
    fn stub_provider_needs_no_secrets() {
        let missing = missing_secrets(&offline_config());
        assert!(missing.is_empty());
    }
}
