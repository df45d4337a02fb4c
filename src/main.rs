mod logging;

use anyhow::Result;
use clap::Parser;
use colored::*;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

use askba_gemini::{GeminiClient, GeminiConfig, GeminiEmbedder};
use askba_rag::{
    AnswerLegs, AnswerOrchestrator, AnswerPair, CorpusSource, DocumentStore, EngineConfig, Error,
    ErrorClass, Generation, Language, VectorizerKind,
};

#[derive(Parser)]
#[command(name = "askba")]
#[command(about = "Answers questions about Federal Employment Agency documents", long_about = None)]
struct Cli {
    /// Question to answer; without it questions are read interactively
    #[arg(short, long)]
    question: Option<String>,

    /// Answer language (de, en, tr)
    #[arg(short, long, default_value = "de")]
    language: String,

    /// Directory of .txt documents (overrides ASKBA_CORPUS_PATH)
    #[arg(long)]
    corpus: Option<PathBuf>,

    /// Comma-separated model preference list (overrides ASKBA_MODELS)
    #[arg(long, value_delimiter = ',')]
    models: Option<Vec<String>>,

    /// Print document store statistics and exit
    #[arg(long)]
    stats: bool,

    /// Debug logging on stderr
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "❌".red(), e);
            exit_code(&e)
        }
    }
}

fn exit_code(error: &anyhow::Error) -> ExitCode {
    match error.downcast_ref::<Error>().map(Error::class) {
        Some(ErrorClass::Setup) => ExitCode::from(2),
        _ => ExitCode::FAILURE,
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = EngineConfig::from_env()?;
    if let Some(corpus) = cli.corpus {
        config.corpus_path = corpus;
    }
    if let Some(models) = cli.models {
        config.models = models
            .into_iter()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();
    }
    let language = Language::from_code(&cli.language)?;
    info!(
        corpus = %config.corpus_path.display(),
        models = ?config.models,
        vectorizer = ?config.vectorizer,
        "Engine configured"
    );

    if cli.stats {
        if let Some(stats) = offline_stats(&config).await? {
            println!("{}", serde_json::to_string_pretty(&stats)?);
            return Ok(());
        }
    }

    let gemini = GeminiConfig::from_env()?;
    let client = GeminiClient::new(gemini.clone())?;
    let mut engine = AnswerOrchestrator::new(config, Arc::new(client))?;
    if engine.config().vectorizer == VectorizerKind::Gemini {
        engine = engine.with_embedder(Arc::new(GeminiEmbedder::new(gemini)?));
    }

    if cli.stats {
        let store = engine.store().await?;
        println!("{}", serde_json::to_string_pretty(&store.stats())?);
        return Ok(());
    }

    if let Some(question) = cli.question {
        let pair = engine.answer(&question, language.code()).await?;
        print_pair(&pair);
        return Ok(());
    }

    // Build the store before the first prompt so setup errors surface early
    let store = engine.store().await?;
    display_banner(language, store.len());
    interactive(&engine, language).await
}

/// Statistics for a TF-IDF store, built without any Gemini credentials.
///
/// Returns `None` when the store needs remote embeddings.
async fn offline_stats(config: &EngineConfig) -> askba_rag::Result<Option<serde_json::Value>> {
    if config.vectorizer != VectorizerKind::TfIdf {
        return Ok(None);
    }
    let store = DocumentStore::load_or_build(
        &CorpusSource::from(config),
        config.snapshot_path.as_deref(),
        None,
        config.vectorizer,
    )
    .await?;
    Ok(Some(store.stats()))
}

async fn interactive(engine: &AnswerOrchestrator, mut language: Language) -> Result<()> {
    let stdin = io::stdin();

    loop {
        print!("{} ", format!("[{}]>", language).cyan().bold());
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match input.to_lowercase().as_str() {
            "exit" | "quit" => {
                println!("{}", "👋 Goodbye!".green());
                break;
            }
            "help" => {
                print_help();
                continue;
            }
            _ => {}
        }

        if let Some(code) = input.strip_prefix("lang ") {
            match Language::from_code(code) {
                Ok(selected) => {
                    language = selected;
                    println!("{} Answering in {}", "✅".green(), language.code());
                }
                Err(e) => println!("{} {}", "❌".red(), e),
            }
            continue;
        }

        println!("{} Searching documents...", "🤖".blue());
        match engine.answer_legs(input, language.code()).await {
            Ok(legs) => print_legs(&legs),
            Err(e) if e.class() == ErrorClass::Setup => return Err(e.into()),
            Err(e) => println!("{} {}", "❌".red(), e),
        }
    }

    Ok(())
}

fn display_banner(language: Language, documents: usize) {
    println!();
    println!("{}", "askba - Federal Employment Agency assistant".blue().bold());
    println!(
        "{}",
        format!("{} documents loaded, answering in {}", documents, language.code()).dimmed()
    );
    println!("Type {} for commands.", "help".green());
    println!();
}

fn print_help() {
    println!("{}", "Available commands:".bold());
    println!("  {} - Ask a question about the loaded documents", "<question>".green());
    println!("  {} - Switch the answer language (de, en, tr)", "lang <code>".green());
    println!("  {} - Show this help message", "help".green());
    println!("  {} - Exit the application", "exit/quit".green());
    println!();
    println!("{}", "Examples:".bold());
    println!("  Was ist ein Bildungsgutschein?");
    println!("  lang en");
    println!("  How do I apply for unemployment benefit?");
}

fn print_pair(pair: &AnswerPair) {
    println!("{}", "Short answer".bold().underline());
    println!("{}", pair.short);
    println!();
    println!("{}", "Detailed answer".bold().underline());
    println!("{}", pair.detailed);
}

fn print_legs(legs: &AnswerLegs) {
    print_leg("Short answer", &legs.short);
    print_leg("Detailed answer", &legs.detailed);

    if !legs.context.is_empty() {
        let sources: Vec<_> = legs.context.iter().map(|r| r.document_id.as_str()).collect();
        println!();
        println!("{} {}", "Sources:".dimmed(), sources.join(", ").dimmed());
    }
    println!();
}

fn print_leg(title: &str, leg: &askba_rag::Result<Generation>) {
    println!();
    println!("{}", title.bold().underline());
    match leg {
        Ok(generation) => {
            println!("{}", generation.text);
            println!("{}", format!("({})", generation.model_id).dimmed());
        }
        Err(e) => println!("{} {}", "❌".red(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn corpus() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("alg.txt"), "Arbeitslosengeld nach Arbeitslosmeldung").unwrap();
        fs::write(dir.path().join("bgs.txt"), "Bildungsgutschein für Weiterbildung").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_tfidf_stats_need_no_credentials() {
        let dir = corpus();
        let config = EngineConfig {
            corpus_path: dir.path().to_path_buf(),
            vectorizer: VectorizerKind::TfIdf,
            ..Default::default()
        };

        let stats = offline_stats(&config).await.unwrap().unwrap();
        assert_eq!(stats["documents"], 2);
        assert_eq!(stats["sources"], 2);
    }

    #[tokio::test]
    async fn test_embedding_stats_go_through_gemini_setup() {
        let dir = corpus();
        let config = EngineConfig {
            corpus_path: dir.path().to_path_buf(),
            vectorizer: VectorizerKind::Gemini,
            ..Default::default()
        };

        assert!(offline_stats(&config).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_corpus_stats_is_setup_error() {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig {
            corpus_path: dir.path().join("missing"),
            vectorizer: VectorizerKind::TfIdf,
            ..Default::default()
        };

        let error = offline_stats(&config).await.unwrap_err();
        assert!(matches!(error, Error::CorpusNotFound(_)));
        assert_eq!(exit_code(&error.into()), ExitCode::from(2));
    }
}
