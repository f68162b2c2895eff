use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use paperchat_core::WorkspaceCoordinator;
use paperchat_engine::{default_engine, LopdfEngine};
use paperchat_gateway::{FsGateway, OllamaClient};
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "paperchat-cli")]
#[command(about = "PaperChat workspace CLI")]
pub struct Cli {
    /// Workspace root holding uploads and chat histories.
    #[arg(long, env = "PAPERCHAT_ROOT", default_value = ".paperchat")]
    root: PathBuf,

    /// Ollama base url for the assistant-backed commands.
    #[arg(long, env = "PAPERCHAT_OLLAMA_URL", default_value = "http://localhost:11434")]
    ollama_url: String,

    /// Model name passed to Ollama.
    #[arg(long, env = "PAPERCHAT_MODEL", default_value = "llama3.2")]
    model: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Upload a PDF into the workspace.
    Upload {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// List uploaded documents.
    List,
    /// Delete an uploaded document by its url.
    Delete {
        #[arg(value_name = "URL")]
        url: String,
    },
    /// List conversation sessions.
    Sessions,
    /// Send a chat message to the active session and print the reply.
    Send {
        #[arg(value_name = "TEXT")]
        text: String,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Serialize)]
struct DocumentOutput {
    name: String,
    url: String,
    size: u64,
    referenced: bool,
    active: bool,
}

#[derive(Debug, Serialize)]
struct SessionOutput {
    id: String,
    name: String,
    message_count: usize,
    active: bool,
}

type Workspace = WorkspaceCoordinator<LopdfEngine, FsGateway, OllamaClient>;

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    let mut workspace = Workspace::new(
        default_engine(),
        FsGateway::new(&cli.root),
        OllamaClient::new(cli.ollama_url, cli.model),
    );
    workspace.bootstrap();

    match cli.command {
        Commands::Upload { file } => run_upload(&mut workspace, &file),
        Commands::List => run_list(&workspace),
        Commands::Delete { url } => {
            workspace.delete_document(&url);
            Ok(())
        }
        Commands::Sessions => run_sessions(&workspace),
        Commands::Send { text } => run_send(&mut workspace, &text),
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn run_upload(workspace: &mut Workspace, file: &Path) -> Result<()> {
    let bytes =
        fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    let filename = file
        .file_name()
        .and_then(|name| name.to_str())
        .context("file name is not valid UTF-8")?;

    let document = workspace
        .upload_document(&bytes, filename)
        .with_context(|| format!("failed to upload {filename}"))?;

    let payload = DocumentOutput {
        name: document.name,
        url: document.id,
        size: document.size_bytes,
        referenced: document.referenced,
        active: true,
    };
    println!("{}", serde_json::to_string_pretty(&payload)?);

    Ok(())
}

fn run_list(workspace: &Workspace) -> Result<()> {
    let active = workspace.library().active_id().cloned();

    let payload: Vec<DocumentOutput> = workspace
        .library()
        .list()
        .iter()
        .map(|document| DocumentOutput {
            name: document.name.clone(),
            url: document.id.clone(),
            size: document.size_bytes,
            referenced: document.referenced,
            active: Some(&document.id) == active.as_ref(),
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&payload)?);

    Ok(())
}

fn run_sessions(workspace: &Workspace) -> Result<()> {
    let active = workspace.sessions().active_id().cloned();

    let payload: Vec<SessionOutput> = workspace
        .sessions()
        .sessions()
        .iter()
        .map(|session| SessionOutput {
            id: session.id.clone(),
            name: session.name.clone(),
            message_count: session.messages.len(),
            active: Some(&session.id) == active.as_ref(),
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&payload)?);

    Ok(())
}

fn run_send(workspace: &mut Workspace, text: &str) -> Result<()> {
    workspace.send_message(text).context("failed to send message")?;

    if let Some(reply) = workspace
        .sessions()
        .active()
        .and_then(|session| session.messages.last())
    {
        println!("{}", reply.content);
    }

    Ok(())
}
