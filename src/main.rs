//! BuddyRAG - Main CLI Entry Point

use anyhow::{Context, Result};
use buddyrag::cli::{chat, Args, ChatCommand, ChatInput, Commands};
use buddyrag::llm::{LanguageModel, ModelInfo, OllamaClient};
use buddyrag::rag::retrieval::{JsonFileLoader, SharedIndex};
use buddyrag::session::{JsonlTranscriptSink, PersistenceConfig};
use buddyrag::{logging, AnswerMode, AskResponse, Config, RetrievalOrchestrator};
use clap::Parser;
use colored::Colorize;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.load_config().context("failed to load configuration")?;
    logging::init(&config.logging);

    match &args.command {
        Commands::Ask {
            session,
            user,
            question,
        } => {
            let (orchestrator, _) = build_orchestrator(&args, &config).await?;
            orchestrator.set_session(session, user).await;
            let response = orchestrator.ask(session, user, question).await?;
            print_response(&response);
        }
        Commands::Chat { session, user } => {
            let (orchestrator, client) = build_orchestrator(&args, &config).await?;
            let session = session
                .clone()
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            run_chat(&orchestrator, &client, &session, user).await?;
        }
        Commands::Config => {
            show_config(&config)?;
        }
    }

    Ok(())
}

async fn build_orchestrator(
    args: &Args,
    config: &Config,
) -> Result<(RetrievalOrchestrator, Arc<OllamaClient>)> {
    let index = SharedIndex::new(JsonFileLoader::new(args.index_path()?));

    let client = Arc::new(OllamaClient::from_config(&config.llm)?);
    if !client.health_check().await {
        eprintln!(
            "{} Ollama is not reachable at {} (start it with: ollama serve)",
            "warning:".yellow().bold(),
            client.base_url()
        );
    }
    let model: Arc<dyn LanguageModel> = client.clone();

    let mut builder = RetrievalOrchestrator::builder(config.clone(), Arc::new(index), model);
    if let Some(dir) = &args.transcripts {
        let sink = JsonlTranscriptSink::new(PersistenceConfig {
            storage_dir: dir.clone(),
        })?;
        builder = builder.transcripts(Arc::new(sink));
    }

    let orchestrator = builder.build()?;
    orchestrator
        .init()
        .await
        .context("failed to load the handbook index")?;
    Ok((orchestrator, client))
}

async fn run_chat(
    orchestrator: &RetrievalOrchestrator,
    client: &OllamaClient,
    session: &str,
    user: &str,
) -> Result<()> {
    let reaper = orchestrator.spawn_idle_reaper();
    let mut input = ChatInput::new(chat::default_history_path())?;
    let mut session_id = session.to_string();

    orchestrator.set_session(&session_id, user).await;
    println!("{}", "BuddyRAG chat. /help for commands, /quit to leave.".bold());

    loop {
        let prompt = format!("{} ", format!("[{}]>", session_id).cyan());
        match input.read(&prompt)? {
            ChatCommand::Ask(question) => match orchestrator.ask(&session_id, user, &question).await {
                Ok(response) => print_response(&response),
                Err(e) => eprintln!("{} {}", "error:".red().bold(), e),
            },
            ChatCommand::Reset => {
                orchestrator.reset_session(&session_id).await;
                println!("{}", "Session cleared.".dimmed());
            }
            ChatCommand::Switch(next) => {
                session_id = next;
                orchestrator.set_session(&session_id, user).await;
                println!("{} {}", "Switched to session".dimmed(), session_id.bold());
            }
            ChatCommand::Model(name) => match client.switch_model(&name) {
                Ok(info) => println!("{} {}", "Now answering with".dimmed(), info.display_name.bold()),
                Err(e) => eprintln!("{} {}", "error:".red().bold(), e),
            },
            ChatCommand::Models => print_models(&client.current_model(), &client.available_models()),
            ChatCommand::Help => {
                println!("  /reset          clear this session's history");
                println!("  /session <id>   switch to another session");
                println!("  /model <name>   answer with another configured model");
                println!("  /models         list configured models");
                println!("  /quit           leave the chat");
            }
            ChatCommand::Unknown(line) => {
                eprintln!("{} unknown command {}", "error:".red().bold(), line);
            }
            ChatCommand::Empty => {}
            ChatCommand::Quit => break,
        }
    }

    input.save_history()?;
    reaper.abort();
    Ok(())
}

fn print_response(response: &AskResponse) {
    println!("\n{}\n", response.answer);

    if let Some(standalone) = &response.standalone_question {
        println!("{} {}", "interpreted as:".dimmed(), standalone.italic());
    }

    match response.mode {
        AnswerMode::Retrieval => {
            let sources: Vec<String> = response
                .sources
                .iter()
                .map(|s| format!("{} ({})", s.source_id, s.category))
                .collect();
            println!("{} {}", "sources:".dimmed(), sources.join(", "));
        }
        AnswerMode::Fallback => {
            println!("{}", "no matching handbook passages; answered from general knowledge".yellow());
        }
    }

    let confidence = format!("{:.2}", response.confidence);
    let confidence = if response.confidence >= 0.5 {
        confidence.green()
    } else {
        confidence.yellow()
    };
    println!("{} {}\n", "confidence:".dimmed(), confidence);
}

fn print_models(current: &ModelInfo, models: &[ModelInfo]) {
    for model in models {
        let marker = if model.name == current.name { "*" } else { " " };
        println!(
            "{} {} {} (temperature {})",
            marker.green().bold(),
            model.name.bold(),
            model.display_name.dimmed(),
            model.temperature
        );
        if !model.description.is_empty() {
            println!("    {}", model.description);
        }
    }
}

fn show_config(config: &Config) -> Result<()> {
    println!("{}", "BuddyRAG Configuration".bold());
    println!("{}\n", "======================".bold());
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
