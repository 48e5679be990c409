//! Advisor CLI - chat with the virtual advisor from the terminal

use advisor_core::{
    config::Config,
    orchestrator::Orchestrator,
    response::MessageType,
    tui::{Renderer, ThinkingSpinner},
    AgentContext, ConversationTurn,
};
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "advisor")]
#[command(about = "Route questions to specialist advisor agents backed by local LLMs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    /// Config file path (default: ~/.config/advisor-core/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat session
    Chat {
        /// Pin every message to one agent id
        #[arg(short, long)]
        agent: Option<String>,
    },

    /// Ask a single question and print the answer
    Ask {
        /// The question text
        question: String,

        /// Pin the question to one agent id
        #[arg(short, long)]
        agent: Option<String>,

        /// Print the full message as JSON instead of rendered text
        #[arg(long)]
        json: bool,
    },

    /// List registered agents and their capabilities
    Agents,

    /// Probe configured inference backends
    Health,

    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Initialize configuration file with defaults
    Init {
        /// Overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config(cli.config.clone())?;
    config.validate()?;

    match cli.command {
        Commands::Chat { agent } => {
            run_chat(&config, agent).await?;
        }
        Commands::Ask {
            question,
            agent,
            json,
        } => {
            run_ask(&config, &question, agent, json).await?;
        }
        Commands::Agents => {
            show_agents(&config)?;
        }
        Commands::Health => {
            run_health(&config).await?;
        }
        Commands::Config(cmd) => {
            run_config_command(cmd, cli.config)?;
        }
    }

    Ok(())
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    Ok(config)
}

async fn run_chat(config: &Config, pinned_agent: Option<String>) -> Result<()> {
    use std::io::{self, BufRead, Write};

    let orchestrator = Orchestrator::from_config(config)?;
    let renderer = Renderer::new();

    println!("Advisor chat");
    println!("============");
    println!("Commands:");
    println!("  /agents  - List specialist agents");
    println!("  /health  - Probe inference backends");
    println!("  /stats   - Show session statistics");
    println!("  /quit    - Exit");
    println!();

    let stdin = io::stdin();
    let session_id = format!("cli-{}", std::process::id());
    let mut history: Vec<ConversationTurn> = Vec::new();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();

        if line.is_empty() {
            continue;
        }

        if line == "/quit" {
            break;
        }

        if line == "/agents" {
            print_capabilities(&orchestrator.capabilities());
            continue;
        }

        if line == "/health" {
            print_health(&orchestrator).await;
            continue;
        }

        if line == "/stats" {
            println!("{}", orchestrator.stats());
            continue;
        }

        let mut context =
            AgentContext::new(session_id.clone(), "local").with_history(history.clone());
        if let Some(agent) = &pinned_agent {
            context = context.with_preferred_agent(agent.clone());
        }

        let mut spinner = ThinkingSpinner::new();
        spinner.start("Thinking...");
        let message = orchestrator.process_message(line, &context).await;
        spinner.stop();

        if message.metadata.is_degraded() {
            println!("  (offline answer)");
        }
        renderer.print_message(&message);

        history.push(ConversationTurn::user(line));
        history.push(ConversationTurn::assistant(
            message.content.clone(),
            Some(&message.agent_id),
        ));
    }

    println!("{}", orchestrator.stats());
    Ok(())
}

async fn run_ask(
    config: &Config,
    question: &str,
    pinned_agent: Option<String>,
    json: bool,
) -> Result<()> {
    let orchestrator = Orchestrator::from_config(config)?;

    let mut context = AgentContext::new(format!("cli-{}", std::process::id()), "local");
    if let Some(agent) = pinned_agent {
        context = context.with_preferred_agent(agent);
    }

    info!("processing question");
    let message = orchestrator.process_message(question, &context).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&message)?);
    } else {
        Renderer::new().print_message(&message);
        if message.metadata.message_type != MessageType::Greeting {
            println!(
                "[{} | {} | confidence {:.2}]",
                message.agent_id,
                message.metadata.message_type.as_str(),
                message.metadata.confidence
            );
        }
    }

    Ok(())
}

fn show_agents(config: &Config) -> Result<()> {
    let orchestrator = Orchestrator::from_config(config)?;
    print_capabilities(&orchestrator.capabilities());
    Ok(())
}

fn print_capabilities(capabilities: &[advisor_core::AgentCapabilities]) {
    println!("{:<14} {:>8}  {}", "Agent", "Priority", "Specialties");
    println!("{}", "-".repeat(60));
    for cap in capabilities {
        println!(
            "{:<14} {:>8}  {}",
            cap.id,
            cap.priority,
            cap.specialties.join(", ")
        );
    }
}

async fn run_health(config: &Config) -> Result<()> {
    let orchestrator = Orchestrator::from_config(config)?;
    print_health(&orchestrator).await;
    Ok(())
}

async fn print_health(orchestrator: &Orchestrator) {
    let registry = orchestrator.providers();
    registry.refresh().await;

    for descriptor in registry.descriptors().await {
        let status = if descriptor.available { "UP" } else { "DOWN" };
        println!(
            "{:<8} {:<6} {} (models: {})",
            descriptor.id,
            status,
            descriptor.base_url,
            descriptor.models.join(", ")
        );
    }
}

fn run_config_command(cmd: ConfigCommands, path: Option<PathBuf>) -> Result<()> {
    let path = path.unwrap_or_else(Config::default_path);

    match cmd {
        ConfigCommands::Init { force } => {
            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }
            let config = Config::default();
            config.save_to(path.clone())?;
            println!("Configuration file created at: {}", path.display());
            println!();
            println!("Environment overrides: OLLAMA_URL, OLLAMA_MODEL, VLLM_URL, VLLM_MODEL,");
            println!("ADVISOR_PROVIDER");
        }
        ConfigCommands::Show => {
            let config = Config::load_from(path)?;
            println!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigCommands::Path => {
            println!("{}", path.display());
            if path.exists() {
                println!("(file exists)");
            } else {
                println!("(file does not exist - run 'config init' to create)");
            }
        }
    }

    Ok(())
}
