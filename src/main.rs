use clap::Parser;
use colored::*;
use eyre::{Context, Result, eyre};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod cli;
mod config;

use accordo::AccordoError;
use accordo::analyst::{RequirementsAnalyst, UserRequest};
use accordo::llm::{ChatClient, LlmClient};
use accordo::session::RepairLoop;
use accordo::validation::{CheckReport, ConcertoCli, check_file};
use accordo::workflow::{Workflow, WorkflowReport};
use cli::Cli;
use cli::commands::Commands;
use config::Config;

fn setup_logging(level: Option<&str>) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("accordo")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("accordo.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    let env = env_logger::Env::default().default_filter_or(level.unwrap_or("info"));
    env_logger::Builder::from_env(env)
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn chat_client(config: &Config) -> Result<Arc<ChatClient>> {
    let client = ChatClient::new(config.chat_config())
        .context(format!("Set {} to use the LLM", config.llm.api_key_env))?;
    Ok(Arc::new(client))
}

/// The workflow plus the chat client it talks through, kept for usage reporting
fn build_workflow(config: &Config, output_dir: Option<&Path>) -> Result<(Workflow, Arc<ChatClient>)> {
    let chat = chat_client(config)?;
    let llm: Arc<dyn LlmClient> = chat.clone();
    let generator = config.generation.strategy.build(Some(llm.clone()))?;
    let validator = Arc::new(ConcertoCli::new(config.cli_config()));
    let repair_loop = RepairLoop::new(generator, validator, config.repair_config());

    let dir = output_dir.map(Path::to_path_buf).unwrap_or_else(|| config.output.dir.clone());
    Ok((Workflow::new(RequirementsAnalyst::new(llm), repair_loop, dir), chat))
}

fn print_usage(chat: &ChatClient) {
    let usage = chat.total_usage();
    println!(
        "{} {} tokens ({} in, {} out)",
        "Usage:".cyan(),
        usage.total(),
        usage.input_tokens,
        usage.output_tokens
    );
}

fn request(description: &str, namespace: Option<&str>, context: Option<&str>) -> UserRequest {
    let mut request = UserRequest::new(description);
    request.preferred_namespace = namespace.map(str::to_string);
    request.additional_context = context.map(str::to_string);
    request
}

/// Print what went wrong, including the full attempt trail on exhaustion
fn report_failure(err: &AccordoError) {
    eprintln!("{} {}", "Failed:".red().bold(), err);
    match err {
        AccordoError::Exhausted(report) => {
            for line in report.trail() {
                eprintln!("  {}", line.red());
            }
            if let Some(suggestion) = &report.last_error.suggestion {
                eprintln!("{} {}", "Suggestion:".yellow(), suggestion);
            }
        }
        AccordoError::Environment(_) => {
            eprintln!("{}", "Is the concerto CLI installed? Try: npm install -g @accordproject/concerto-cli".yellow());
        }
        _ => {}
    }
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::Generate {
            description,
            namespace,
            context,
            output,
            no_save,
            quiet,
        } => {
            let request = request(description, namespace.as_deref(), context.as_deref());
            handle_generate(&request, output.as_deref(), !*no_save, *quiet, config).await
        }
        Commands::Validate { file } => handle_validate(file, cli.is_verbose(), config).await,
        Commands::Preview { description, namespace } => {
            handle_preview(&request(description, namespace.as_deref(), None), config).await
        }
        Commands::Info => handle_info(config).await,
        Commands::Batch {
            description,
            iterations,
        } => handle_batch(&request(description, None, None), *iterations, config).await,
    }
}

async fn handle_generate(
    request: &UserRequest,
    output: Option<&Path>,
    save: bool,
    quiet: bool,
    config: &Config,
) -> Result<()> {
    info!("Generating model (save: {})", save);
    let (workflow, chat) = build_workflow(config, output)?;

    if !quiet {
        println!("{} {}", "Generating:".green(), request.description);
    }

    let report: WorkflowReport = match workflow.run(request, save).await {
        Ok(report) => report,
        Err(e) => {
            report_failure(&e);
            return Err(e).context("Generation failed");
        }
    };

    if quiet {
        print!("{}", report.model);
        return Ok(());
    }

    println!(
        "{} {} concept(s) in {}",
        "Extracted:".green(),
        report.intent.concepts.len(),
        report.intent.namespace
    );
    println!("\n{}", report.model);
    if let Some(path) = &report.saved_to {
        println!("{} {}", "Saved:".green(), path.display());
    }
    print_usage(&chat);
    Ok(())
}

fn print_check(report: &CheckReport, verbose: bool) {
    let classified = &report.classified;
    if report.is_success() {
        println!("{} model is valid ({} stage)", "Valid:".green().bold(), report.stage);
    } else {
        println!("{} [{}] {}", "Invalid:".red().bold(), classified.category, classified.message);
        for detail in classified.details() {
            println!("  {}", detail);
        }
        if let Some(suggestion) = &classified.suggestion {
            println!("{} {}", "Suggestion:".yellow(), suggestion);
        }
    }

    if verbose && !report.outcome.raw_output.is_empty() {
        println!("\n{}\n{}", "Validator output:".cyan(), report.outcome.raw_output);
    }
}

async fn handle_validate(file: &Path, verbose: bool, config: &Config) -> Result<()> {
    info!("Validating {}", file.display());
    let cli = ConcertoCli::new(config.cli_config());

    let report = check_file(&cli, file, &config.validator.target)
        .await
        .map_err(AccordoError::from)
        .context(format!("Could not validate {}", file.display()))?;

    print_check(&report, verbose);
    if report.is_success() {
        Ok(())
    } else {
        Err(eyre!("{} is not a valid model", file.display()))
    }
}

async fn handle_preview(request: &UserRequest, config: &Config) -> Result<()> {
    info!("Previewing intent");
    let (workflow, _) = build_workflow(config, None)?;
    let (intent, rendered) = workflow.preview(request).await.context("Preview failed")?;

    println!("{}", "Structured intent:".cyan());
    println!("{}", serde_json::to_string_pretty(&intent)?);
    println!("\n{}", "Rendered model:".cyan());
    print!("{}", rendered);
    Ok(())
}

async fn handle_info(config: &Config) -> Result<()> {
    println!("{}", "Accordo configuration".cyan().bold());
    println!("  LLM endpoint: {}", config.llm.base_url);
    println!("  Model:        {}", config.llm.model);

    let key_status = if config.has_api_key() {
        "set".green()
    } else {
        "missing".red()
    };
    println!("  API key:      {} ({})", config.llm.api_key_env, key_status);
    println!("  Strategy:     {}", config.generation.strategy);
    println!("  Max attempts: {}", config.generation.max_attempts);
    println!("  Output dir:   {}", config.output.dir.display());

    let cli = ConcertoCli::new(config.cli_config());
    println!("  Validator:    {}", cli.config().command_line());
    match cli.version().await {
        Ok(version) => println!("  Version:      {}", version.green()),
        Err(e) => println!("  Version:      {}", e.to_string().red()),
    }
    Ok(())
}

async fn handle_batch(request: &UserRequest, iterations: u32, config: &Config) -> Result<()> {
    info!("Batch run: {} iterations", iterations);
    let (workflow, chat) = build_workflow(config, None)?;

    let mut successes = 0u32;
    for run in 1..=iterations {
        match workflow.run(request, false).await {
            Ok(report) => {
                successes += 1;
                println!("{} run {}: {}", "OK".green(), run, report.intent.namespace);
            }
            Err(e) => {
                println!("{} run {}: {}", "FAIL".red(), run, e);
                if e.is_infrastructure() {
                    return Err(e).context("Batch aborted");
                }
            }
        }
    }

    let rate = if iterations == 0 {
        0.0
    } else {
        f64::from(successes) * 100.0 / f64::from(iterations)
    };
    println!(
        "\n{} {}/{} succeeded ({:.0}%)",
        "Summary:".cyan(),
        successes,
        iterations,
        rate
    );
    print_usage(&chat);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref())
        .context("Failed to load configuration")?
        .with_env_overrides();

    // Setup logging
    setup_logging(config.log_level.as_deref()).context("Failed to setup logging")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}
