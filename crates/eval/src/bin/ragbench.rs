use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use eval::benchmark::{EvaluationReport, label_for, save_report};
use eval::{
    BatchRunner, Evaluator, FailurePolicy, Scorer, Settings, TestSet, generate_plots,
    init_from_questions, logging, prepare_output,
};
use index::{DocumentReader, EmbeddingClient, LLM_RESPONSE_CACHE_FILE, clear_mode_fields};
use query::{
    AnswerArchiver, ChatClient, GraphRagCli, LightRagClient, QueryBackend, QueryMode, QueryParams,
};

#[derive(Parser)]
#[command(name = "ragbench", about = "Compare LightRAG and GraphRAG on a question set")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, ValueEnum)]
enum Backend {
    Lightrag,
    Graphrag,
}

#[derive(Subcommand)]
enum Command {
    /// Build a test set JSON from a `=== Q` / `=== A` question file
    InitTestSet {
        #[arg(long, default_value = "test_data/study_rules/questions.txt")]
        questions: PathBuf,
        #[arg(long, default_value = "test_data/study_rules/test_set.json")]
        output: PathBuf,
    },
    /// Reset cached LightRAG responses for the given modes in the cache file,
    /// for use while the LightRAG server is stopped
    ClearCache {
        /// Defaults to the LLM response cache in WORKING_DIR
        #[arg(long)]
        cache: Option<PathBuf>,
        /// Defaults to CLEAR_CACHE_MODES
        #[arg(long = "mode")]
        modes: Vec<String>,
    },
    /// Insert a document, or every .txt/.md file in a directory, into LightRAG
    Index { path: PathBuf },
    /// Answer every unanswered question of a test set, resuming from OUTPUT
    Fill {
        #[arg(long, value_enum)]
        backend: Backend,
        #[arg(long, default_value = "test_data/study_rules/test_set.json")]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[arg(long)]
        mode: Option<QueryMode>,
        #[arg(long)]
        top_k: Option<usize>,
        #[arg(long, value_enum, default_value_t = FailurePolicy::FailFast)]
        policy: FailurePolicy,
        #[arg(long)]
        no_archive: bool,
        /// Query LightRAG without resetting its response cache first
        #[arg(long)]
        keep_cache: bool,
    },
    /// Ask questions interactively
    Ask {
        #[arg(long, value_enum)]
        backend: Backend,
        #[arg(long)]
        mode: Option<QueryMode>,
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Score filled test sets and plot the comparison
    Evaluate {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let settings = Settings::from_env()?;
    let _log_guard = logging::init(&settings.logging)?;

    match cli.command {
        Command::InitTestSet { questions, output } => {
            if init_from_questions(&questions, &output).await? {
                let test_set = TestSet::load(&output).await?;
                println!("✅ Wrote {} questions to {}", test_set.len(), output.display());
            } else {
                println!("File already exists: {}, skipping creation.", output.display());
            }
        }
        Command::ClearCache { cache, modes } => {
            let cache = cache.unwrap_or_else(|| settings.working_dir.join(LLM_RESPONSE_CACHE_FILE));
            let modes = if modes.is_empty() {
                settings.clear_cache_modes.clone()
            } else {
                modes
            };
            let resets = clear_mode_fields(&cache, &modes).await?;
            println!("✅ Cleared {} cached entries ({}) in {}", resets, modes.join(", "), cache.display());
        }
        Command::Index { path } => {
            let client = lightrag_client(&settings);
            let documents = DocumentReader::read_path(&path).await?;
            for (source, text) in &documents {
                client.insert_text(text, Some(source)).await?;
                println!("Inserted {}", source);
            }
            println!("✅ Indexed {} documents", documents.len());
        }
        Command::Fill {
            backend,
            input,
            output,
            mode,
            top_k,
            policy,
            no_archive,
            keep_cache,
        } => {
            let params = query_params(&settings, backend, mode, top_k);
            let client = build_backend(&settings, backend);

            let mut test_set = prepare_output(&input, &output).await?;
            println!(
                "{} of {} questions already answered",
                test_set.answered_count(),
                test_set.len()
            );

            // The running server holds its cache in memory, so it has to drop it itself.
            if backend == Backend::Lightrag && !keep_cache {
                lightrag_client(&settings)
                    .clear_cache(&settings.clear_cache_modes)
                    .await
                    .context("Refusing to query with an unsanitized response cache")?;
            }

            let mut runner = BatchRunner::new(client.as_ref(), params, output.clone()).with_policy(policy);
            if !no_archive {
                runner = runner.with_archiver(AnswerArchiver::new(&settings.answers_dir, client.name()));
            }

            let summary = runner.run(&mut test_set).await?;
            println!(
                "✔️ All done: {} answered, {} skipped, {} without answer, {} failed ({} total)",
                summary.answered, summary.skipped, summary.unanswered, summary.failed, summary.total
            );
        }
        Command::Ask { backend, mode, top_k } => {
            let params = query_params(&settings, backend, mode, top_k);
            let client = build_backend(&settings, backend);
            let archiver = AnswerArchiver::new(&settings.answers_dir, client.name());
            ask_loop(client.as_ref(), &params, &archiver).await?;
        }
        Command::Evaluate { files, output_dir } => {
            let judge = ChatClient::new(
                settings.llm.base_url.clone(),
                settings.llm.model.clone(),
                settings.llm.api_key.clone(),
            );
            let embedder = EmbeddingClient::new(
                settings.embedding.base_url.clone(),
                settings.embedding.model.clone(),
                settings.embedding.api_key.clone(),
            );
            let evaluator = Evaluator::new(Scorer::new(&judge, &embedder));

            let mut reports = Vec::new();
            for file in &files {
                let test_set = TestSet::load(file).await?;
                let report = evaluator.evaluate(&test_set, &label_for(file)).await?;
                let path = save_report(&report, &output_dir).await?;
                println!("✅ Saved {}", path.display());
                reports.push(report);
            }

            print_reports(&reports);
            let plot = generate_plots(&reports, &output_dir)?;
            println!("✅ Plot saved to {}", plot.display());
        }
    }

    Ok(())
}

fn lightrag_client(settings: &Settings) -> LightRagClient {
    LightRagClient::new(
        settings.lightrag_url.clone(),
        settings.lightrag_api_key.clone(),
        &settings.working_dir,
    )
}

fn build_backend(settings: &Settings, backend: Backend) -> Box<dyn QueryBackend> {
    match backend {
        Backend::Lightrag => Box::new(lightrag_client(settings)),
        Backend::Graphrag => Box::new(GraphRagCli::new(
            settings.graphrag_bin.clone(),
            settings.graphrag_root.clone(),
        )),
    }
}

fn query_params(
    settings: &Settings,
    backend: Backend,
    mode: Option<QueryMode>,
    top_k: Option<usize>,
) -> QueryParams {
    let default_mode = match backend {
        Backend::Lightrag => settings.mode,
        Backend::Graphrag => settings.graphrag_method,
    };
    QueryParams {
        mode: mode.unwrap_or(default_mode),
        top_k: top_k.unwrap_or(settings.top_k),
    }
}

async fn ask_loop(
    backend: &dyn QueryBackend,
    params: &QueryParams,
    archiver: &AnswerArchiver,
) -> Result<()> {
    println!("Welcome! Type your question below. Type 'exit', 'quit' or 'q' to end the session.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"Question: ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question.to_lowercase().as_str(), "exit" | "quit" | "q") {
            println!("Session ended.");
            break;
        }

        match backend.query(question, params).await {
            Ok(Some(answer)) => {
                println!("Answer: {}", answer);
                if let Err(e) = archiver.archive(question, &answer).await {
                    eprintln!("Failed to archive answer: {:#}", e);
                }
            }
            Ok(None) => println!("No answer returned."),
            Err(e) => eprintln!("An error occurred while processing your query: {}", e),
        }
    }

    Ok(())
}

fn print_reports(reports: &[EvaluationReport]) {
    println!("\n=== RESULTS ===\n");
    println!(
        "{:<32} {:>8} {:>12} {:>12}",
        "test set", "scored", "correctness", "relevancy"
    );
    for report in reports {
        println!(
            "{:<32} {:>8} {:>12.3} {:>12.3}",
            report.label, report.scored, report.answer_correctness.mean, report.answer_relevancy.mean
        );
        if report.skipped + report.failed > 0 {
            println!(
                "  ({} unanswered skipped, {} could not be scored)",
                report.skipped, report.failed
            );
        }
    }
}
