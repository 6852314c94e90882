use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use playpen::store::{JsonFileStore, MemoryStore};
use playpen::{PlaygroundConfig, SourceSlot};

/// Drive a live-coding playground headless: compose the three sources,
/// run the result in the sandbox, and print the captured console.
#[derive(Parser, Debug)]
#[command(name = "playpen", version, about)]
struct Cli {
    /// Markup source file (body content)
    #[arg(long)]
    markup: Option<PathBuf>,

    /// Style source file
    #[arg(long)]
    style: Option<PathBuf>,

    /// Script source file
    #[arg(long)]
    script: Option<PathBuf>,

    /// Persist state to this JSON file (omit for in-memory only)
    #[arg(long)]
    state: Option<PathBuf>,

    /// Script execution timeout in milliseconds
    #[arg(long, default_value_t = 5000)]
    timeout_ms: u64,

    /// Print the composed preview document before the console output
    #[arg(long)]
    print_document: bool,

    /// Print the sha256 digest of the composed document
    #[arg(long)]
    digest: bool,
}

fn read_source(path: &Option<PathBuf>) -> Result<Option<String>> {
    match path {
        Some(p) => {
            let text = std::fs::read_to_string(p)
                .with_context(|| format!("failed to read {}", p.display()))?;
            Ok(Some(text))
        }
        None => Ok(None),
    }
}

fn run<S: playpen::store::KeyValueStore>(cli: &Cli, store: S) -> Result<()> {
    let config = PlaygroundConfig {
        script_timeout_ms: cli.timeout_ms,
        ..Default::default()
    };

    let mut playground = playpen::new_playground(store, config)?;

    let edits = [
        (SourceSlot::Markup, read_source(&cli.markup)?),
        (SourceSlot::Style, read_source(&cli.style)?),
        (SourceSlot::Script, read_source(&cli.script)?),
    ];
    for (slot, text) in edits {
        if let Some(text) = text {
            playground.edit(slot, &text)?;
        }
    }
    playground.pump_console();

    if cli.print_document {
        println!("{}", playground.preview().document());
    }
    if cli.digest {
        println!(
            "sha256:{}",
            playpen::compositor::document_digest(playground.preview().document())
        );
    }

    for line in playground.console().lines() {
        println!("[{}] {}", line.kind, line.text);
    }

    playground.close();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.state {
        Some(path) => {
            let store = JsonFileStore::open(path)
                .with_context(|| format!("failed to open store {}", path.display()))?;
            run(&cli, store)
        }
        None => run(&cli, MemoryStore::new()),
    }
}
