use chrono::Utc;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pdf_chat_core::{
    extract_text, load_documents, split_text, CharacterNgramEmbedder,
    ChatError, ChatSession, ChunkingConfig, EmbeddingProvider, LopdfExtractor, OpenAiChatModel,
    OpenAiConfig, OpenAiEmbedder, RetryPolicy, SessionOptions, DEFAULT_CHAT_MODEL,
    DEFAULT_EMBEDDING_MODEL, DEFAULT_OPENAI_BASE_URL,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

type AppSession = ChatSession<LopdfExtractor, EmbeddingProvider, OpenAiChatModel>;

#[derive(Parser)]
#[command(name = "pdf-chat", version, about = "Ask questions about your PDFs")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_OPENAI_BASE_URL)]
    openai_base_url: String,

    /// API key for the hosted providers
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    /// Chat completion model
    #[arg(long, env = "PDF_CHAT_MODEL", default_value = DEFAULT_CHAT_MODEL)]
    chat_model: String,

    /// Sampling temperature for answers
    #[arg(long, default_value_t = 0.7)]
    temperature: f32,

    /// Hosted embedding model
    #[arg(long, env = "PDF_CHAT_EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL)]
    embedding_model: String,

    /// Embed locally with hashed character trigrams instead of the hosted API
    #[arg(long, env = "PDF_CHAT_LOCAL_EMBEDDINGS", default_value_t = false)]
    local_embeddings: bool,

    /// Maximum characters per chunk
    #[arg(long, default_value = "1000")]
    chunk_size: usize,

    /// Characters shared by consecutive chunks
    #[arg(long, default_value = "200")]
    chunk_overlap: usize,

    /// Chunks retrieved per question
    #[arg(long, default_value = "4")]
    top_k: usize,

    /// Chunks sent per embedding request
    #[arg(long, default_value = "64")]
    embedding_batch_size: usize,

    /// Maximum number of PDFs per upload
    #[arg(long, default_value = "20")]
    max_documents: usize,

    /// Maximum total upload size in MiB
    #[arg(long, default_value = "50")]
    max_upload_mb: usize,

    /// Timeout for each provider request, in seconds
    #[arg(long, default_value = "60")]
    request_timeout_secs: u64,

    /// Retries after a transient provider failure
    #[arg(long, default_value = "1")]
    retries: u32,

    /// Fixed delay before a retry, in milliseconds
    #[arg(long, default_value = "1000")]
    retry_backoff_ms: u64,

    /// Retrieve with the raw follow-up question instead of a rewritten one
    #[arg(long, default_value_t = false)]
    no_condense: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive session: type questions, `/process PATH...` to load PDFs.
    Chat {
        /// PDF file or folder to process before the first question.
        #[arg(long = "pdf")]
        pdfs: Vec<PathBuf>,
    },
    /// Process PDFs, then ask each question in order within one session.
    Ask {
        /// PDF file or folder (repeatable).
        #[arg(long = "pdf", required = true)]
        pdfs: Vec<PathBuf>,
        /// Question to ask (repeatable).
        #[arg(long = "question", required = true)]
        questions: Vec<String>,
    },
    /// Print the chunks that would be indexed. No provider is contacted.
    Chunks {
        /// PDF file or folder (repeatable).
        #[arg(long = "pdf", required = true)]
        pdfs: Vec<PathBuf>,
    },
}

impl Cli {
    fn session_options(&self) -> SessionOptions {
        SessionOptions {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            top_k: self.top_k,
            embedding_batch_size: self.embedding_batch_size,
            max_documents: self.max_documents,
            max_upload_bytes: self.max_upload_mb.saturating_mul(1024 * 1024),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            retry: RetryPolicy {
                retries: self.retries,
                backoff: Duration::from_millis(self.retry_backoff_ms),
            },
            condense_question: !self.no_condense,
        }
    }

    fn provider_config(&self, model: &str) -> OpenAiConfig {
        OpenAiConfig::new(model)
            .with_base_url(self.openai_base_url.clone())
            .with_api_key(self.openai_api_key.clone())
            .with_timeout(Duration::from_secs(self.request_timeout_secs))
    }

    fn build_session(&self) -> anyhow::Result<AppSession> {
        if self.openai_api_key.is_none() {
            warn!("OPENAI_API_KEY is not set; hosted providers will likely reject requests");
        }

        let embedder = if self.local_embeddings {
            info!("using local character n-gram embeddings");
            EmbeddingProvider::Local(CharacterNgramEmbedder::default())
        } else {
            let embedder = OpenAiEmbedder::new(&self.provider_config(&self.embedding_model))?;
            info!(model = embedder.model(), "using hosted embeddings");
            EmbeddingProvider::OpenAi(embedder)
        };
        let model = OpenAiChatModel::new(&self.provider_config(&self.chat_model))?
            .with_temperature(self.temperature);
        info!(model = model.model(), temperature = self.temperature, "chat model configured");

        Ok(ChatSession::new(
            LopdfExtractor,
            Arc::new(embedder),
            Arc::new(model),
            self.session_options(),
        ))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "pdf-chat boot"
    );

    match &cli.command {
        Command::Chat { pdfs } => {
            let mut session = cli.build_session()?;
            info!(session = %session.session_id(), "session started");
            if !pdfs.is_empty() {
                if let Err(error) = process_paths(&mut session, pdfs).await {
                    render_error(&error);
                }
            }
            run_repl(&mut session).await?;
        }
        Command::Ask { pdfs, questions } => {
            let mut session = cli.build_session()?;
            process_paths(&mut session, pdfs)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            for question in questions {
                ask_and_render(&mut session, question).await;
            }
        }
        Command::Chunks { pdfs } => {
            print_chunks(&cli.session_options(), pdfs)?;
        }
    }

    Ok(())
}

async fn process_paths(session: &mut AppSession, paths: &[PathBuf]) -> Result<(), ChatError> {
    let documents = load_documents(paths, session.options())?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}").unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(format!("Processing {} PDF(s)...", documents.len()));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = session.process(&documents).await;
    spinner.finish_and_clear();
    let report = result?;

    for document in &report.documents {
        println!(
            "processed {} ({} pages, {} chars, sha256 {})",
            document.name,
            document.pages,
            document.characters,
            &document.checksum[..12.min(document.checksum.len())]
        );
    }
    println!(
        "{} chunks indexed at {}; ask away.",
        report.chunk_count,
        report.processed_at.to_rfc3339()
    );
    Ok(())
}

async fn ask_and_render(session: &mut AppSession, question: &str) {
    match session.ask(question).await {
        Ok(answer) => {
            info!(sources = answer.sources.len(), "answer ready");
            println!("{}\n", session.render_history());
        }
        Err(error) => render_error(&error),
    }
}

#[derive(Debug, PartialEq)]
enum ReplCommand {
    Empty,
    Quit,
    History,
    Process(Vec<PathBuf>),
    ProcessUsage,
    Ask(String),
}

/// Commands are matched on the whole first word; anything else is a question.
fn parse_command(line: &str) -> ReplCommand {
    let line = line.trim();
    let mut words = line.split_whitespace();

    match words.next() {
        None => ReplCommand::Empty,
        Some("/quit" | "/exit") => ReplCommand::Quit,
        Some("/history") => ReplCommand::History,
        Some("/process") => {
            let paths = words.map(PathBuf::from).collect::<Vec<_>>();
            if paths.is_empty() {
                ReplCommand::ProcessUsage
            } else {
                ReplCommand::Process(paths)
            }
        }
        Some(_) => ReplCommand::Ask(line.to_string()),
    }
}

async fn run_repl(session: &mut AppSession) -> anyhow::Result<()> {
    println!("Ask a question about your PDFs. Commands: /process PATH..., /history, /quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        match parse_command(&line) {
            ReplCommand::Empty => {}
            ReplCommand::Quit => break,
            ReplCommand::History => {
                let transcript = session.render_history();
                if transcript.is_empty() {
                    println!("(no conversation yet)");
                } else {
                    println!("{transcript}");
                }
            }
            ReplCommand::ProcessUsage => println!("usage: /process PATH..."),
            ReplCommand::Process(paths) => {
                if let Err(error) = process_paths(session, &paths).await {
                    render_error(&error);
                }
            }
            ReplCommand::Ask(question) => ask_and_render(session, &question).await,
        }
    }

    Ok(())
}

fn print_chunks(options: &SessionOptions, paths: &[PathBuf]) -> anyhow::Result<()> {
    let config = ChunkingConfig::from(options);
    config.validate()?;

    let documents = load_documents(paths, options)?;
    let raw = extract_text(&LopdfExtractor, &documents)?;
    let chunks = split_text(&raw.text, config);

    for (index, chunk) in chunks.iter().enumerate() {
        println!("--- chunk {index} ({} chars) ---\n{chunk}", chunk.chars().count());
    }
    println!("{} chunks from {} document(s)", chunks.len(), raw.documents.len());
    Ok(())
}

fn render_error(error: &ChatError) {
    warn!(kind = error.kind(), "request failed");
    eprintln!("error: {error}");
}

#[cfg(test)]
mod tests {
    use super::{parse_command, ReplCommand};
    use std::path::PathBuf;

    #[test]
    fn process_command_takes_paths() {
        assert_eq!(
            parse_command("/process a.pdf  manuals/"),
            ReplCommand::Process(vec![PathBuf::from("a.pdf"), PathBuf::from("manuals/")])
        );
        assert_eq!(parse_command("/process"), ReplCommand::ProcessUsage);
    }

    #[test]
    fn words_merely_starting_with_a_command_are_questions() {
        assert_eq!(
            parse_command("/processed.pdf says what?"),
            ReplCommand::Ask("/processed.pdf says what?".to_string())
        );
        assert_eq!(parse_command("/historyless"), ReplCommand::Ask("/historyless".to_string()));
        assert_eq!(
            parse_command("  what is the pump pressure?  "),
            ReplCommand::Ask("what is the pump pressure?".to_string())
        );
    }

    #[test]
    fn control_commands_are_recognised() {
        assert_eq!(parse_command("/quit"), ReplCommand::Quit);
        assert_eq!(parse_command("/exit"), ReplCommand::Quit);
        assert_eq!(parse_command("/history"), ReplCommand::History);
        assert_eq!(parse_command("   "), ReplCommand::Empty);
    }
}
