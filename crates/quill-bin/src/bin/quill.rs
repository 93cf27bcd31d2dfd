//! Quill Binary Entry Point

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use quill_bin::{seed, App};
use quill_core::model::NoteId;
use quill_core::{MemoryBackend, QuillConfig};

#[derive(Parser)]
#[command(name = "quill", about = "Query notes and their internal links")]
struct Cli {
    /// Directory of note files (*.json)
    #[arg(long, short, env = "QUILL_NOTES", default_value = ".")]
    notes: PathBuf,
    /// Path to config file (YAML)
    #[arg(long, short, env = "QUILL_CONFIG")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a note and write it to the notes directory
    New { title: String },
    /// Link suggestions for text typed before the caret, e.g. "See [[Proj"
    Suggest {
        text: String,
        /// Commit the option at this index and print the resulting editor state
        #[arg(long)]
        pick: Option<usize>,
    },
    /// List the internal links of a note
    Links {
        uuid: String,
        /// Update stale link titles and save the note
        #[arg(long)]
        refresh: bool,
    },
    /// Search note titles, or note text with --content
    Search {
        text: String,
        #[arg(long)]
        content: bool,
    },
    /// Click a link inside a note and print where it navigates
    Follow {
        uuid: String,
        /// Which link, in document order
        #[arg(long, default_value = "0")]
        index: usize,
    },
    /// Resolve an in-app route such as /notes/<uuid>
    Route { path: String },
}

fn load_config(path: Option<&PathBuf>) -> Result<QuillConfig> {
    let Some(path) = path else {
        return Ok(QuillConfig::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    QuillConfig::from_yaml(&text).with_context(|| format!("parsing config {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    let backend = Arc::new(MemoryBackend::new());
    let mut files = seed::load_notes(&cli.notes, &backend)?;
    let app = App::new(backend, config);

    match cli.command {
        Commands::New { title } => {
            let note = app.create_note(&title).await?;
            let path = files.write(&note)?;
            info!("wrote {}", path.display());
            println!("{}", note.uuid);
        }
        Commands::Suggest { text, pick } => {
            let suggestions = app.suggest(&text, pick).await?;
            for (i, option) in suggestions.options.iter().enumerate() {
                println!("{}\t{}\t{}", i, option.title, option.uuid);
            }
            if let Some(document) = suggestions.committed {
                println!("{}", serde_json::to_string_pretty(&document.to_value())?);
            }
        }
        Commands::Links { uuid, refresh } => {
            let uuid = NoteId::from(uuid);
            for link in app.links(&uuid, refresh).await? {
                let current = link.current_title.as_deref().unwrap_or("<missing>");
                println!("{}\t{}\t{}", link.uuid, link.title, current);
            }
            if refresh {
                let note = app.queries().ensure_note(&uuid).await?;
                let path = files.write(&note)?;
                info!("wrote {}", path.display());
            }
        }
        Commands::Search { text, content } => {
            for (title, uuid, context) in app.search(&text, content).await? {
                match context {
                    Some(context) => println!("{}\t{}\t{}", title, uuid, context),
                    None => println!("{}\t{}", title, uuid),
                }
            }
        }
        Commands::Follow { uuid, index } => {
            let route = app.follow(&NoteId::from(uuid), index).await?;
            println!("{}", route);
        }
        Commands::Route { path } => {
            println!("{}", app.route(&path).await?);
        }
    }

    app.queries().cache().settle().await;
    Ok(())
}
