//! Command implementations.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use askdocs_chat::{CancellationToken, ConversationTurn, Session, SessionError};
use askdocs_ingest::{IngestPipeline, IngestionReport};
use askdocs_watcher::{DirectoryWatcher, FileEventKind, WatchConfig, scan};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::app::{App, absolute};
use crate::config::AppConfig;

/// Expand `paths` into ingestible files; directories are scanned.
fn collect_files(documents: &WatchConfig, paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        let path = absolute(path);
        if path.is_dir() {
            let config = documents.clone().with_path(&path);
            files.extend(scan(&config).with_context(|| format!("failed to scan {}", path.display()))?);
        } else if path.is_file() {
            files.push(path);
        } else {
            bail!("no such file or directory: {}", path.display());
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

fn print_report(report: &IngestionReport) {
    for result in &report.succeeded {
        println!(
            "  ingested  {} ({} chunks, {} ms)",
            result.document_id, result.chunks, result.duration_ms
        );
    }
    for id in &report.skipped {
        println!("  skipped   {id}");
    }
    for failure in &report.failed {
        println!("  FAILED    {}: {}", failure.document_id, failure.failure);
    }
    println!(
        "{} ingested ({} chunks), {} skipped, {} failed",
        report.succeeded.len(),
        report.total_chunks(),
        report.skipped.len(),
        report.failed.len()
    );
}

pub async fn ingest(app: &App, paths: Vec<PathBuf>, force: bool) -> Result<()> {
    let paths = if paths.is_empty() {
        vec![app.config.documents.path.clone()]
    } else {
        paths
    };
    let files = collect_files(&app.config.documents, &paths)?;
    if files.is_empty() {
        println!("No ingestible files found.");
        return Ok(());
    }

    app.check_providers(false).await;
    let pipeline = app.pipeline(force).await?;
    info!("Ingesting {} files", files.len());
    let report = pipeline.ingest_paths(&files).await;
    print_report(&report);

    if !report.is_success() {
        bail!("{} documents failed to ingest", report.failed.len());
    }
    Ok(())
}

pub async fn watch(app: &App) -> Result<()> {
    let mut documents = app.config.documents.clone();
    documents.path = std::fs::canonicalize(&documents.path)
        .with_context(|| format!("documents directory {} not found", documents.path.display()))?;

    app.check_providers(false).await;
    let pipeline = app.pipeline(false).await?;

    let files = scan(&documents)?;
    println!(
        "Scanning {}: {} ingestible files",
        documents.path.display(),
        files.len()
    );
    if !files.is_empty() {
        print_report(&pipeline.ingest_paths(&files).await);
    }

    let mut watcher = DirectoryWatcher::start(&documents)?;
    println!("Watching {} (Ctrl-C to stop)", watcher.root().display());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("Stopping.");
                break;
            }
            event = watcher.next_event() => {
                let Some(event) = event else {
                    warn!("Watcher stopped");
                    break;
                };
                handle_event(&pipeline, event.kind, &event.path).await;
            }
        }
    }
    Ok(())
}

async fn handle_event(pipeline: &IngestPipeline, kind: FileEventKind, path: &Path) {
    match kind {
        FileEventKind::Changed => {
            let report = pipeline.ingest_paths(&[path.to_path_buf()]).await;
            print_report(&report);
        }
        FileEventKind::Removed => match pipeline.remove_path(path).await {
            Ok(0) => {}
            Ok(removed) => println!(
                "  removed   {} ({removed} chunks)",
                pipeline.loader().document_id(path)
            ),
            Err(e) => println!("  FAILED    {e}"),
        },
    }
}

/// Ask one question on `session`, streaming the answer to stdout.
///
/// Ctrl-C while answering cancels the question, not the program.
async fn answer(session: &mut Session, question: &str, show_context: bool) -> Result<()> {
    let cancel = CancellationToken::new();
    let interrupt = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });

    let (tx, mut rx) = mpsc::channel::<String>(64);
    let printer = tokio::spawn(async move {
        let mut printed = false;
        while let Some(fragment) = rx.recv().await {
            print!("{fragment}");
            let _ = std::io::stdout().flush();
            printed = true;
        }
        printed
    });

    let result = session.ask_streaming(question, &cancel, tx).await;
    interrupt.abort();
    let streamed = printer.await.unwrap_or(false);

    match result {
        Ok(turn) => {
            if !streamed || turn.is_error() {
                if streamed {
                    println!();
                }
                print!("{}", turn.answer);
            }
            println!();
            print_sources(&turn, show_context);
            Ok(())
        }
        Err(SessionError::Cancelled) => {
            println!("\n(cancelled)");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn print_sources(turn: &ConversationTurn, show_context: bool) {
    if show_context && !turn.context.is_empty() {
        println!("\n--- Context ---\n{}\n---------------", turn.context.text);
    }
    if turn.context.sources.is_empty() {
        return;
    }
    println!("\nSources:");
    for source in &turn.context.sources {
        println!("  {} score {:.3}", source.header(), source.score);
    }
}

pub async fn ask(app: &App, question: &str, top_k: Option<usize>, show_context: bool) -> Result<()> {
    app.check_providers(true).await;
    let mut session = app.session(app.config.session.clone(), top_k);
    session.start()?;
    answer(&mut session, question, show_context).await?;
    session.end();
    Ok(())
}

pub async fn chat(app: &App, top_k: Option<usize>, show_context: bool) -> Result<()> {
    app.check_providers(true).await;
    let mut session = app.session(app.config.session.clone(), top_k);
    session.start()?;

    println!("Ask My Docs");
    println!("===========");
    println!("Chat model: {}", app.config.ollama.chat_model);
    println!("\nType 'exit' or 'quit' to end the session.");
    println!("Type '/clear' to forget the conversation so far.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => None,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            println!();
            break;
        };
        let input = line.trim();

        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            break;
        }
        if input.eq_ignore_ascii_case("/clear") {
            session.clear_history();
            println!("Conversation cleared.\n");
            continue;
        }

        answer(&mut session, input, show_context).await?;
        println!();
    }

    session.end();
    println!("Goodbye!");
    Ok(())
}

pub async fn stats(app: &App) -> Result<()> {
    let store = app.store();
    let collection = app.config.collection.as_str();
    let documents = store.documents(collection).await?;
    let records = store.count(collection).await?;

    println!("Store:      {}", app.config.store_dir().display());
    println!("Collection: {collection}");
    println!("Documents:  {}", documents.len());
    println!("Chunks:     {records}");
    for summary in &documents {
        println!(
            "  {:<40} {:>5} chunks  {}",
            summary.document_id,
            summary.chunks,
            summary.ingested_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

pub async fn remove(app: &App, targets: Vec<String>) -> Result<()> {
    let pipeline = app.pipeline(false).await?;
    for target in targets {
        let path = Path::new(&target);
        let removed = if path.is_file() {
            pipeline.remove_path(&absolute(path)).await?
        } else {
            pipeline.remove_document(&target).await?
        };
        if removed == 0 {
            println!("  not found {target}");
        } else {
            println!("  removed   {target} ({removed} chunks)");
        }
    }
    Ok(())
}

pub fn show_config(config: &AppConfig, path: Option<&Path>, path_only: bool) -> Result<()> {
    let path = path.map_or_else(AppConfig::default_path, Path::to_path_buf);
    if path_only {
        println!("{}", path.display());
        return Ok(());
    }
    println!("# {}", path.display());
    println!("{}", config.to_toml()?);
    Ok(())
}
