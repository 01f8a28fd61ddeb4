use anyhow::{Context, Result};
use indicatif::ProgressBar;
use issue_pipeline::agent::{CommandModel, LanguageModel};
use issue_pipeline::analysis::{
    apply_answers, epic_pipeline, research_pipeline, researchers, review_pipeline, AnalysisResult, AnalysisState,
    ContextStore, EpicAnalysis, InMemoryContextStore, QuestionAnswer,
};
use issue_pipeline::cli::commands::{AnalysisMode, AnalyzeCommand, AnswerCommand, PersonasCommand, ValidateCommand};
use issue_pipeline::cli::output::*;
use issue_pipeline::cli::{Cli, Command};
use issue_pipeline::core::config::AnalysisConfig;
use issue_pipeline::execution::CompiledPipeline;
use issue_pipeline::tracker::{Issue, JsonFileTracker, TicketTracker};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Context store chunks handed to the review personas
const REVIEW_CONTEXT_CHUNKS: usize = 5;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging; RUST_LOG overrides the default level
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set logging subscriber")?;

    match &cli.command {
        Command::Analyze(cmd) => analyze(cmd, &cli).await?,
        Command::Answer(cmd) => answer(cmd, &cli).await?,
        Command::Validate(cmd) => validate_config(cmd)?,
        Command::Personas(cmd) => show_personas(cmd, &cli)?,
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<AnalysisConfig> {
    match &cli.config {
        Some(path) => AnalysisConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(AnalysisConfig::default()),
    }
}

/// `<dir>/<KEY>.json` becomes a tracker rooted at `<dir>` and the key
fn open_issue_file(path: &Path) -> Result<(JsonFileTracker, String)> {
    let key = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .with_context(|| format!("Invalid issue file name: {}", path.display()))?;
    let root = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    Ok((JsonFileTracker::new(root), key.to_string()))
}

async fn load_issue(path: &Path) -> Result<(JsonFileTracker, Issue)> {
    let (tracker, key) = open_issue_file(path)?;
    let issue = tracker
        .get_issue(&key)
        .await
        .with_context(|| format!("Failed to load issue from {}", path.display()))?;
    Ok((tracker, issue))
}

async fn seed_store(config: &AnalysisConfig) -> Result<Arc<InMemoryContextStore>> {
    let store = InMemoryContextStore::new(config.memory.chunk_size, config.memory.chunk_overlap);
    for path in &config.memory.seed_files {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read seed file {}", path.display()))?;
        let metadata = HashMap::from([("source".to_string(), path.display().to_string())]);
        let chunks = store.add(&text, metadata).await?;
        info!("Loaded {} chunk(s) from {}", chunks, path.display());
    }
    Ok(Arc::new(store))
}

/// Echo top-level pipeline events above the spinner
fn observed(pipeline: CompiledPipeline, spinner: Option<&ProgressBar>) -> CompiledPipeline {
    match spinner {
        Some(spinner) => {
            let spinner = spinner.clone();
            pipeline.with_event_handler(Arc::new(move |event| spinner.println(format_execution_event(&event))))
        }
        None => pipeline,
    }
}

enum Analysis {
    Review(AnalysisResult),
    Epic(EpicAnalysis),
}

async fn run_analysis(
    mode: AnalysisMode,
    issue: &Issue,
    config: &AnalysisConfig,
    spinner: Option<&ProgressBar>,
) -> Result<Analysis> {
    let model: Arc<dyn LanguageModel> = Arc::new(CommandModel::new(config.agent_config()));
    let store = seed_store(config).await?;
    let personas = config.persona_set();
    let max_steps = config.engine.max_steps;

    match mode {
        AnalysisMode::Review => {
            let pipeline = observed(review_pipeline(model, &personas, max_steps)?, spinner);
            let context = store
                .search(&issue.page_content(), REVIEW_CONTEXT_CHUNKS)
                .await?
                .join("\n\n");
            let state = AnalysisState {
                issue: issue.document(),
                context,
                ..Default::default()
            };
            Ok(Analysis::Review(pipeline.invoke_typed(&state).await?))
        }
        AnalysisMode::Epic => {
            let research = research_pipeline(model, store, max_steps)?;
            let researchers = researchers(&personas, &research);
            let pipeline = observed(epic_pipeline(&researchers, max_steps)?, spinner);
            Ok(Analysis::Epic(pipeline.invoke_typed(&issue.summary()).await?))
        }
    }
}

async fn analyze(cmd: &AnalyzeCommand, cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let (tracker, issue) = load_issue(&cmd.issue).await?;

    let spinner = if cmd.json {
        None
    } else {
        println!(
            "{} Loaded issue: {} {}",
            INFO,
            style(&issue.key).bold(),
            style(&issue.fields.summary).dim()
        );
        Some(create_spinner(format!("Analyzing {}", issue.key)))
    };

    let result = run_analysis(cmd.mode, &issue, &config, spinner.as_ref()).await;
    if let Some(spinner) = &spinner {
        spinner.finish_and_clear();
    }

    let analysis = match result {
        Ok(analysis) => analysis,
        Err(e) => {
            println!("\n{} Analysis of {} {}", CROSS, style(&issue.key).bold(), style("failed").red());
            error!("{:#}", e);
            std::process::exit(1);
        }
    };

    let comment = match &analysis {
        Analysis::Review(result) => {
            if cmd.json {
                println!("{}", serde_json::to_string_pretty(result)?);
            } else {
                println!("\n{}", format_analysis_result(result));
            }
            review_comment(result)
        }
        Analysis::Epic(epic) => {
            if cmd.json {
                println!("{}", serde_json::to_string_pretty(epic)?);
            } else {
                println!("\n{}", format_epic_analysis(epic));
            }
            epic_comment(epic)
        }
    };

    if cmd.comment {
        tracker
            .add_comment(&issue.key, &comment)
            .await
            .with_context(|| format!("Failed to comment on {}", issue.key))?;
        if !cmd.json {
            println!("{} Posted analysis to {}", CHECK, style(&issue.key).bold());
        }
    }

    Ok(())
}

async fn answer(cmd: &AnswerCommand, cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let (tracker, issue) = load_issue(&cmd.issue).await?;

    let content = tokio::fs::read_to_string(&cmd.answers)
        .await
        .with_context(|| format!("Failed to read answers {}", cmd.answers.display()))?;
    let answers: Vec<QuestionAnswer> = serde_json::from_str(&content).context("Failed to parse answers")?;
    if answers.is_empty() {
        println!("{} No answers to apply", WARN);
        return Ok(());
    }

    let model = CommandModel::new(config.agent_config());
    let spinner = create_spinner(format!("Updating {}", issue.key));
    let result = apply_answers(&model, &tracker, &issue.key, &answers).await;
    spinner.finish_and_clear();

    match result {
        Ok(update) => {
            println!(
                "{} Updated {} from {} answer(s)",
                CHECK,
                style(&issue.key).bold(),
                style(answers.len()).cyan()
            );
            println!("  Comments: {}", style(update.comments.len()).cyan());
            if !update.fields.is_empty() {
                let names: Vec<&str> = update.fields.keys().map(String::as_str).collect();
                println!("  Fields: {}", style(names.join(", ")).dim());
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Update of {} {}", CROSS, style(&issue.key).bold(), style("failed").red());
            error!("{}", e);
            std::process::exit(1);
        }
    }
}

fn validate_config(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating configuration...", INFO);

    match AnalysisConfig::from_file(&cmd.file) {
        Ok(config) => {
            println!("{} Configuration is valid!", CHECK);
            println!(
                "  Model: {}",
                style(config.model.command.as_deref().unwrap_or("pi")).bold()
            );
            println!("  Persona overrides: {}", style(config.personas.len()).cyan());
            println!("  Seed files: {}", style(config.memory.seed_files.len()).cyan());
            match config.engine.max_steps {
                Some(limit) => println!("  Step limit: {}", style(limit).cyan()),
                None => println!("  Step limit: {}", style("none").dim()),
            }

            if cmd.json {
                let json = serde_json::to_string_pretty(&config)?;
                println!("\n{}", json);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(e).red());
            std::process::exit(1);
        }
    }
}

fn show_personas(cmd: &PersonasCommand, cli: &Cli) -> Result<()> {
    let personas = load_config(cli)?.persona_set();

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&personas)?);
        return Ok(());
    }

    println!("{} Analysis personas:", INFO);
    for (kind, persona) in personas.iter() {
        println!("  {}", format_persona(kind, persona));
    }
    Ok(())
}
