//! Interactive question loop.

use std::path::Path;

use anyhow::Context;
use pdfchat_rag::{ChatSession, Document, RagPipeline};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::warn;

const HELP: &str = "\
Commands:
  /ingest <file>  add a text file to the store
  /clear          forget this conversation
  /reset          delete every stored chunk
  /count          show how many chunks are stored
  /help           show this message
  /quit           exit
Anything else is asked as a question.";

#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Ask(&'a str),
    Ingest(&'a str),
    Clear,
    Reset,
    Count,
    Help,
    Quit,
    Unknown(&'a str),
    Empty,
}

fn parse(line: &str) -> Command<'_> {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Command::Ask(line);
    };
    let (name, arg) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    match (name, arg.trim()) {
        ("ingest", path) if !path.is_empty() => Command::Ingest(path),
        ("clear", _) => Command::Clear,
        ("reset", _) => Command::Reset,
        ("count", _) => Command::Count,
        ("help", _) => Command::Help,
        ("quit" | "exit", _) => Command::Quit,
        _ => Command::Unknown(line),
    }
}

/// Read a UTF-8 text file into a [`Document`] named after the file.
pub async fn load_document(path: &Path) -> anyhow::Result<Document> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let id = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    Ok(Document::new(id, text).with_source_uri(path.display().to_string()))
}

pub async fn run(pipeline: &RagPipeline, session: &ChatSession) -> anyhow::Result<()> {
    let mut editor = DefaultEditor::new()?;
    println!("Ask a question about your documents. Type /help for commands.");

    loop {
        let line = match editor.readline("pdfchat> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let command = parse(&line);
        if command != Command::Empty {
            let _ = editor.add_history_entry(line.trim());
        }

        match command {
            Command::Empty => {}
            Command::Ask(question) => match session.ask(question).await {
                Ok(answer) => println!("\n{answer}\n"),
                Err(e) => eprintln!("error: {e}"),
            },
            Command::Ingest(path) => match load_document(Path::new(path)).await {
                Ok(document) => match pipeline.ingest(&document).await {
                    Ok(chunks) => println!("ingested {} chunks from {path}", chunks.len()),
                    Err(e) => eprintln!("error: {e}"),
                },
                Err(e) => eprintln!("error: {e:#}"),
            },
            Command::Clear => {
                session.clear().await;
                println!("conversation cleared");
            }
            Command::Reset => match pipeline.reset_store().await {
                Ok(()) => println!("store reset"),
                Err(e) => eprintln!("error: {e}"),
            },
            Command::Count => match pipeline.vector_store().count().await {
                Ok(count) => println!("{count} chunks stored"),
                Err(e) => eprintln!("error: {e}"),
            },
            Command::Help => println!("{HELP}"),
            Command::Quit => break,
            Command::Unknown(input) => {
                warn!(input, "unknown command");
                println!("unknown command, type /help");
            }
        }
    }
    Ok(())
}
