//! `wisdome` command line client.
//!
//! # Responsibility
//! - Compose config, local cache, remote connector and session.
//! - Expose list/add/edit/promote/link/delete/refresh over one session.

use clap::{Parser, Subcommand};
use log::info;
use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;
use wisdome_core::{
    default_log_level, init_logging, Credential, HttpConnector, LocalStore, Note, NoteDraft,
    NoteKind, NoteSession, SyncConfig,
};

#[derive(Parser)]
#[command(name = "wisdome", author, version, about = "Zettelkasten notes with Drive sync", long_about = None)]
struct Cli {
    /// OAuth access token for the Drive API. Without it the local cache is used.
    #[arg(long, env = "WISDOME_ACCESS_TOKEN", hide_env_values = true)]
    token: Option<String>,
    /// Directory for rolling log files.
    #[arg(long, env = "WISDOME_LOG_DIR")]
    log_dir: Option<String>,
    #[arg(long, env = "WISDOME_LOG_LEVEL")]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List notes, most recently updated first
    List {
        #[arg(short, long, value_parser = parse_kind)]
        kind: Option<NoteKind>,
    },
    /// Create a note
    Add {
        #[arg(short, long, value_parser = parse_kind, default_value = "fleeting")]
        kind: NoteKind,
        #[arg(short, long)]
        title: String,
        /// HTML body; `data-mention-id` markers become connections
        #[arg(short, long)]
        body: String,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// Edit title, body or tags of a note
    Edit {
        id: String,
        #[arg(short, long)]
        title: Option<String>,
        #[arg(short, long)]
        body: Option<String>,
        /// Replaces all tags when given at least once
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// Convert a note to a permanent note
    Promote { id: String },
    /// Connect a permanent note to another note
    Link { source: String, target: String },
    /// Delete a note
    Delete { id: String },
    /// Reconcile with the remote folder and print the result
    Refresh,
}

fn parse_kind(value: &str) -> Result<NoteKind, String> {
    NoteKind::parse(value).ok_or_else(|| {
        let expected: Vec<&str> = NoteKind::ALL.iter().map(|kind| kind.as_str()).collect();
        format!("unknown note kind `{value}`, expected one of {}", expected.join(", "))
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let log_dir = cli.log_dir.unwrap_or_else(|| {
        std::env::temp_dir()
            .join("wisdome_logs")
            .to_string_lossy()
            .into_owned()
    });
    let log_level = cli
        .log_level
        .unwrap_or_else(|| default_log_level().to_string());
    if let Err(err) = init_logging(&log_level, &log_dir) {
        eprintln!("warning: file logging disabled: {err}");
    }

    let config = SyncConfig::from_env()?;
    let local = Arc::new(LocalStore::open(&config.db_path)?);
    let session = NoteSession::new(HttpConnector::new(config.clone()), local, config);

    if let Some(token) = cli.token.filter(|token| !token.trim().is_empty()) {
        if !session.login(Credential::new(token.trim())).await {
            let state = session.state();
            eprintln!(
                "warning: {}; working from the local cache",
                state.error().unwrap_or("sign-in failed")
            );
        }
    }

    match cli.command {
        Commands::List { kind } => {
            let kinds: Vec<NoteKind> = match kind {
                Some(kind) => vec![kind],
                None => NoteKind::ALL.to_vec(),
            };
            for kind in kinds {
                for note in session.notes_of_kind(kind) {
                    print_note(&note);
                }
            }
        }
        Commands::Add {
            kind,
            title,
            body,
            tags,
        } => {
            let mut draft = NoteDraft::new(kind);
            draft.title = title;
            draft.set_body(body);
            draft.set_tags(&tags);
            if !draft.is_valid() {
                return Err("title and body must not be blank".into());
            }
            let note = draft.into_note();
            let persisted = session.save_note(note.clone()).await;
            report("saved", &note.id, persisted, session.state().ready());
        }
        Commands::Edit {
            id,
            title,
            body,
            tags,
        } => {
            let mut note = session
                .find_note(&id)
                .ok_or_else(|| format!("note not found: {id}"))?;
            let mut draft = NoteDraft::from_note(&note);
            if let Some(title) = title {
                draft.title = title;
            }
            if let Some(body) = body {
                draft.set_body(body);
            }
            if !tags.is_empty() {
                draft.set_tags(&tags);
            }
            if !draft.is_valid() {
                return Err("title and body must not be blank".into());
            }
            draft.apply_to(&mut note);
            let persisted = session.save_note(note).await;
            report("updated", &id, persisted, session.state().ready());
        }
        Commands::Promote { id } => {
            let persisted = session.promote_to_permanent(&id).await?;
            report("promoted", &id, persisted, session.state().ready());
        }
        Commands::Link { source, target } => {
            if session.find_note(&target).is_none() {
                return Err(format!("note not found: {target}").into());
            }
            let persisted = session.add_connection(&source, &target).await?;
            report("linked", &source, persisted, session.state().ready());
        }
        Commands::Delete { id } => {
            let persisted = session.delete_note(&id).await;
            report("deleted", &id, persisted, session.state().ready());
        }
        Commands::Refresh => {
            let notes = session.refresh_notes().await;
            for note in &notes {
                print_note(note);
            }
            println!("{} notes", notes.len());
        }
    }

    info!("event=cli_exit module=cli status=ok");
    Ok(())
}

fn print_note(note: &Note) {
    println!(
        "{}\t{}\t{}\t{}",
        note.id,
        note.kind,
        note.updated_at.to_rfc3339(),
        note.title
    );
}

fn report(action: &str, id: &str, persisted: bool, remote: bool) {
    match (persisted, remote) {
        (true, true) => println!("{action} {id} (synced)"),
        (true, false) => println!("{action} {id} (local only)"),
        (false, _) => println!("{action} {id} locally; remote write failed"),
    }
}
