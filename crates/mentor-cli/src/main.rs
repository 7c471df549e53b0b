mod config;

use std::io::{BufRead, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use mentor_agents::{
    record_feedback, Mentor, Parser as ProblemParser, PythonSandbox, Router, Trace,
};
use mentor_core::{
    Capabilities, ChatInference, CodeRunner, CorpusDocument, Embedder, Feedback, HashEmbedder,
    Inference, Offline, ProblemRecord,
};
use mentor_store::{CorpusIndex, MemoryLog};

use crate::config::{Config, EmbedderKind, RetrievalConfig};

#[derive(Parser)]
#[command(
    name = "mentor",
    version,
    about = "Math mentor - parse, route, solve and explain math problems"
)]
struct Cli {
    /// Path to a config file (overrides $MENTOR_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve a problem end to end
    Solve {
        /// Problem text (read from stdin when omitted)
        text: Option<String>,

        /// Modality the text was extracted from
        #[arg(long, default_value = "text")]
        input_type: InputKind,

        /// Accept the parsed problem without review
        #[arg(short, long)]
        yes: bool,

        /// Record feedback without prompting
        #[arg(long)]
        feedback: Option<CliFeedback>,
    },

    /// Show the parsed problem record
    Parse {
        text: String,
    },

    /// Show which topic a problem routes to, and why
    Route {
        text: String,

        /// Keyword rules only, no model call
        #[arg(long)]
        offline: bool,
    },

    /// Execute a Python file in the sandbox
    Run {
        file: PathBuf,

        /// Enable the symbolic-math capabilities
        #[arg(long)]
        sympy: bool,
    },

    /// Rebuild the retrieval index and query it
    Recall {
        query: String,

        /// Documents requested (the index returns up to k + 2)
        #[arg(short, long)]
        k: Option<usize>,
    },

    /// Rebuild the retrieval index from the knowledge base and memory log
    Reindex,

    /// Show saved solutions
    History {
        /// Most recent entries to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Show the effective configuration
    Config,
}

#[derive(Clone, Copy, ValueEnum)]
enum InputKind {
    Text,
    Image,
    Audio,
}

impl InputKind {
    fn label(self) -> &'static str {
        match self {
            Self::Text => "Text",
            Self::Image => "Image",
            Self::Audio => "Audio",
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum CliFeedback {
    Positive,
    Negative,
}

impl From<CliFeedback> for Feedback {
    fn from(val: CliFeedback) -> Self {
        match val {
            CliFeedback::Positive => Feedback::Positive,
            CliFeedback::Negative => Feedback::Negative,
        }
    }
}

fn init_inference(cfg: &Config) -> Arc<dyn Inference> {
    let settings = cfg.chat_settings();
    if settings.api_key.is_none() {
        eprintln!(
            "warning: ${} is not set, running without a model (fallbacks only)",
            cfg.model.api_key_env
        );
        return Arc::new(Offline);
    }
    Arc::new(ChatInference::new(settings))
}

#[cfg(feature = "embeddings")]
fn init_embedder(retrieval: &RetrievalConfig) -> Arc<dyn Embedder> {
    match retrieval.embedder {
        EmbedderKind::Fastembed => {
            let embedder = mentor_core::FastEmbedder::new(retrieval.model);
            match &retrieval.model_cache {
                Some(dir) => Arc::new(embedder.with_cache_dir(dir)),
                None => Arc::new(embedder),
            }
        }
        EmbedderKind::Hash => Arc::new(HashEmbedder::default()),
    }
}

#[cfg(not(feature = "embeddings"))]
fn init_embedder(retrieval: &RetrievalConfig) -> Arc<dyn Embedder> {
    if retrieval.embedder == EmbedderKind::Fastembed {
        tracing::warn!("built without the embeddings feature, using hash embeddings");
    }
    Arc::new(HashEmbedder::default())
}

fn build_index(cfg: &Config) -> Result<CorpusIndex> {
    let log = MemoryLog::open(cfg.memory_log_path());
    CorpusIndex::initialize(
        &cfg.index_settings(),
        &log,
        init_embedder(&cfg.retrieval),
    )
    .context("failed to build retrieval index")
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Solve {
            text,
            input_type,
            yes,
            feedback,
        } => cmd_solve(&cfg, text, input_type, yes, feedback.map(Feedback::from)),
        Commands::Parse { text } => cmd_parse(&cfg, &text),
        Commands::Route { text, offline } => cmd_route(&cfg, &text, offline),
        Commands::Run { file, sympy } => cmd_run(&cfg, &file, sympy),
        Commands::Recall { query, k } => cmd_recall(&cfg, &query, k.unwrap_or(cfg.retrieval.k)),
        Commands::Reindex => cmd_reindex(&cfg),
        Commands::History { limit } => cmd_history(&cfg, limit),
        Commands::Config => cmd_config(&cfg, cli.config.as_deref()),
    }
}

fn cmd_solve(
    cfg: &Config,
    text: Option<String>,
    input_type: InputKind,
    yes: bool,
    feedback: Option<Feedback>,
) -> Result<()> {
    let interactive = text.is_some() && std::io::stdin().is_terminal();
    let raw = match text {
        Some(t) => t,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read problem from stdin")?;
            buf
        }
    };
    if raw.trim().is_empty() {
        bail!("no problem text given");
    }

    let inference = init_inference(cfg);
    let parser = ProblemParser::new(inference.clone()).with_fast_path_len(cfg.parser.fast_path_len);
    let mut problem = parser.parse(&raw);

    if !yes && interactive {
        problem = review_problem(problem)?;
    }

    let index = Arc::new(build_index(cfg)?);
    let runner = Arc::new(PythonSandbox::new(cfg.sandbox_settings()));
    let mentor = Mentor::new(inference, runner, index, cfg.mentor_settings());

    let solved = mentor.solve(problem);
    let review = mentor.review(&solved);
    let trace = Trace::new(input_type.label(), solved, review);
    print_trace(&trace);

    let feedback = match feedback {
        Some(f) => Some(f),
        None if interactive => ask_feedback()?,
        None => None,
    };

    let log = MemoryLog::open(cfg.memory_log_path());
    match feedback {
        Some(f) => match record_feedback(&log, &trace, f)? {
            Some(n) => println!("Saved to memory ({n} entries)."),
            None => println!("Feedback noted; nothing saved."),
        },
        None => println!("No feedback given; nothing saved."),
    }
    Ok(())
}

/// Human check of the parsed problem. Empty input accepts it; anything
/// else replaces the statement.
fn review_problem(problem: ProblemRecord) -> Result<ProblemRecord> {
    println!("Parsed problem:");
    println!("  {}", problem.problem_text);
    if let Some(hint) = &problem.topic_hint {
        println!("  hint: {hint}");
    }
    if problem.needs_clarification {
        println!("  (the parser flagged this problem as ambiguous)");
    }
    let answer = prompt_line("Press Enter to accept, or type a corrected problem: ")?;
    let answer = answer.trim();
    if answer.is_empty() {
        Ok(problem)
    } else {
        Ok(problem.with_text(answer))
    }
}

fn ask_feedback() -> Result<Option<Feedback>> {
    loop {
        let answer = prompt_line("Was this solution correct? [y]es / [n]o / [s]kip: ")?;
        let answer = answer.trim();
        if answer.is_empty() || answer.eq_ignore_ascii_case("s") || answer == "skip" {
            return Ok(None);
        }
        match answer.parse::<Feedback>() {
            Ok(f) => return Ok(Some(f)),
            Err(_) => println!("Please answer y, n or s."),
        }
    }
}

fn prompt_line(prompt: &str) -> Result<String> {
    print!("{prompt}");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read from stdin")?;
    Ok(line)
}

fn print_trace(trace: &Trace) {
    let solved = &trace.solved;
    println!();
    println!("=== Solution ({}) ===", solved.solution.tier);
    println!("{}", solved.solution.text);
    println!();
    println!("=== Verification ===");
    println!("{}", trace.review.verification.text());
    println!();
    println!("=== Explanation ===");
    println!("{}", trace.review.explanation.text());
    println!();
    println!("--- trace ---");
    println!("  topic:    {}", solved.topic());
    println!("  routed:   {}", solved.route.via);
    if solved.route.via.is_default() {
        println!("  note:     no category was recognized; edit the problem to re-route it");
    }
    println!("  verdict:  {}", trace.review.verdict());
    if solved.solution.evidence.is_empty() {
        println!("  evidence: (none)");
    } else {
        println!("  evidence:");
        for item in &solved.solution.evidence {
            println!("    - {}", truncate(&item.replace('\n', " "), 80));
        }
    }
    let timings: Vec<String> = trace
        .timings()
        .iter()
        .map(|(stage, d)| format!("{stage} {}", format_duration(*d)))
        .collect();
    println!("  timings:  {}", timings.join(", "));
    println!();
}

fn cmd_parse(cfg: &Config, text: &str) -> Result<()> {
    let parser =
        ProblemParser::new(init_inference(cfg)).with_fast_path_len(cfg.parser.fast_path_len);
    let record = parser.parse(text);
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

fn cmd_route(cfg: &Config, text: &str, offline: bool) -> Result<()> {
    let inference: Arc<dyn Inference> = if offline {
        Arc::new(Offline)
    } else {
        init_inference(cfg)
    };
    let route = Router::new(inference).route(text);
    println!("{}  (via {})", route.topic, route.via);
    Ok(())
}

fn cmd_run(cfg: &Config, file: &Path, sympy: bool) -> Result<()> {
    let code =
        std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let capabilities = if sympy {
        Capabilities::SYMBOLIC
    } else {
        Capabilities::NUMERIC
    };
    let result = PythonSandbox::new(cfg.sandbox_settings()).execute(&code, capabilities);
    match (result.stdout(), result.error()) {
        (Some(out), _) => {
            println!("{out}");
            Ok(())
        }
        (None, Some(err)) => bail!("execution failed: {err}"),
        (None, None) => Ok(()),
    }
}

/// Rebuild the index so entries saved since the last run are searchable,
/// then return the nearest documents with their distances.
fn recall(cfg: &Config, query: &str, k: usize) -> Result<Vec<(CorpusDocument, f32)>> {
    let index = build_index(cfg)?;
    index
        .query_scored(query, k + 2)
        .context("retrieval query failed")
}

fn cmd_recall(cfg: &Config, query: &str, k: usize) -> Result<()> {
    let results = recall(cfg, query, k)?;
    if results.is_empty() {
        println!("No documents found.");
        return Ok(());
    }
    for (doc, distance) in &results {
        println!(
            "--- {} / {} [distance: {:.3}] ---",
            doc.metadata.source, doc.metadata.kind, distance
        );
        println!("{}", doc.content);
        println!();
    }
    Ok(())
}

fn cmd_reindex(cfg: &Config) -> Result<()> {
    let index = build_index(cfg)?;
    let stats = index.stats()?;
    println!("Index:      {}", cfg.index_dir().display());
    println!("Documents:  {}", stats.total_documents);
    println!("  textbook: {}", stats.textbook_documents);
    println!("  memory:   {}", stats.memory_documents);
    println!("Dimensions: {}", stats.dimensions);
    if let Some(built) = stats.built_at {
        println!("Built at:   {built}");
    }
    Ok(())
}

fn cmd_history(cfg: &Config, limit: usize) -> Result<()> {
    let log = MemoryLog::open(cfg.memory_log_path());
    let entries = log
        .try_load()
        .with_context(|| format!("reading {}", log.path().display()))?;
    if entries.is_empty() {
        println!("No saved solutions.");
        return Ok(());
    }

    let skip = entries.len().saturating_sub(limit);
    for entry in entries.iter().skip(skip) {
        println!("--- {} ---", entry.id.as_deref().unwrap_or("(legacy entry)"));
        if let Some(at) = entry.recorded_at {
            println!("  recorded: {}", at.format("%Y-%m-%d %H:%M"));
        }
        println!("  topic:    {}", entry.topic);
        println!("  input:    {}", entry.original_input_type);
        println!("  question: {}", truncate(&entry.parsed_question, 100));
        println!(
            "  answer:   {}",
            truncate(&entry.final_answer.replace('\n', " "), 100)
        );
        println!("  verifier: {}", truncate(&entry.verifier_outcome, 60));
        println!();
    }
    println!("{} of {} entries shown.", entries.len() - skip, entries.len());
    Ok(())
}

fn cmd_config(cfg: &Config, explicit: Option<&Path>) -> Result<()> {
    println!("Config: {}", config::show_config_path(explicit));
    println!();
    println!("[paths]");
    println!("  knowledge_base = {}", cfg.paths.knowledge_base);
    println!("  memory_log = {}", cfg.memory_log_path().display());
    println!("  index_dir = {}", cfg.index_dir().display());
    println!();
    println!("[model]");
    println!("  endpoint = {}", cfg.model.endpoint);
    println!("  model = {}", cfg.model.model);
    println!("  temperature = {}", cfg.model.temperature);
    let key_state = if cfg.chat_settings().api_key.is_some() {
        "set"
    } else {
        "not set"
    };
    println!("  api_key_env = {} ({key_state})", cfg.model.api_key_env);
    println!("  timeout_secs = {}", cfg.model.timeout_secs);
    println!();
    println!("[retrieval]");
    println!("  k = {}", cfg.retrieval.k);
    println!("  chunk_size = {}", cfg.retrieval.chunk_size);
    println!("  chunk_overlap = {}", cfg.retrieval.chunk_overlap);
    println!("  embedder = {:?}", cfg.retrieval.embedder);
    println!("  model = {}", cfg.retrieval.model);
    println!();
    println!("[sandbox]");
    println!("  python = {}", cfg.sandbox.python);
    println!("  timeout_secs = {}", cfg.sandbox.timeout_secs);
    if let Some(mb) = cfg.sandbox.memory_limit_mb {
        println!("  memory_limit_mb = {mb}");
    }
    println!();
    println!("[parser]");
    println!("  fast_path_len = {}", cfg.parser.fast_path_len);
    Ok(())
}

fn format_duration(d: Duration) -> String {
    let ms = d.as_secs_f64() * 1000.0;
    if ms < 1.0 {
        format!("{:.0}us", ms * 1000.0)
    } else if ms < 1000.0 {
        format!("{ms:.1}ms")
    } else {
        format!("{:.2}s", ms / 1000.0)
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}
