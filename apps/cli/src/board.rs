use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use athfw_core::board::{create_from_mapping, extract_to_mapping};
use athfw_core::{
    BoardContainer, BoardEntry, BoardProduct, CodecObserver, DiffOutcome, EntryKind, ToolConfig,
    TracingObserver, diff_summaries, diffstat,
};
use clap::Subcommand;
use tracing::{info, warn};

#[derive(Subcommand, Debug)]
pub enum BoardCommand {
    /// Build a container from a JSON mapping file
    Create {
        mapping: PathBuf,
        #[arg(short, long, default_value = "board-2.bin")]
        output: PathBuf,
        #[arg(long, default_value = "ath10k")]
        product: BoardProduct,
    },
    /// Write every entry and a mapping file into a directory
    Extract {
        file: PathBuf,
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
    /// Print a summary of the container
    Info {
        file: PathBuf,
        /// Sort names within each entry
        #[arg(long)]
        sorted: bool,
    },
    /// Diff the summaries of two containers
    Diff { first: PathBuf, second: PathBuf },
    /// List new, deleted and changed entries
    Diffstat { first: PathBuf, second: PathBuf },
    /// Add (or replace) one entry
    Add {
        file: PathBuf,
        data: PathBuf,
        #[arg(long = "name", required = true)]
        names: Vec<String>,
        #[arg(long, default_value = "board")]
        kind: EntryKind,
        /// Defaults to rewriting the input file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn load(path: &Path, config: &ToolConfig) -> Result<(Vec<u8>, BoardContainer)> {
    let data = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let container = BoardContainer::decode(&data, &config.decode_options(), &TracingObserver)
        .with_context(|| format!("Failed to decode {}", path.display()))?;
    Ok((data, container))
}

fn write(path: &Path, container: &BoardContainer) -> Result<()> {
    let bytes = container.encode(&TracingObserver)?;
    std::fs::write(path, &bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    info!(
        path = %path.display(),
        size = bytes.len(),
        entries = container.entries.len(),
        "Wrote board container"
    );
    Ok(())
}

fn add(
    container: &mut BoardContainer,
    entry: BoardEntry,
    observer: &dyn CodecObserver,
) -> Result<()> {
    if !container.product.supports(entry.kind) {
        bail!("{} containers have no {} entries", container.product, entry.kind);
    }
    container.add_entry(entry, observer)?;
    if let Some(dup) = container.validate(observer) {
        warn!(name = %dup.name, "Container still has duplicate names");
    }
    Ok(())
}

pub fn run(cmd: BoardCommand, config: &ToolConfig) -> Result<()> {
    match cmd {
        BoardCommand::Create {
            mapping,
            output,
            product,
        } => {
            let container = create_from_mapping(&mapping, product, &TracingObserver)
                .with_context(|| format!("Failed to create from {}", mapping.display()))?;
            write(&output, &container)
        }
        BoardCommand::Extract { file, output } => {
            let (_, container) = load(&file, config)?;
            let mapping = extract_to_mapping(&container, &output)?;
            println!("{}", mapping.display());
            Ok(())
        }
        BoardCommand::Info { file, sorted } => {
            let (data, container) = load(&file, config)?;
            print!("{}", container.summarize(&data, sorted));
            Ok(())
        }
        BoardCommand::Diff { first, second } => {
            let (a_data, a) = load(&first, config)?;
            let (b_data, b) = load(&second, config)?;
            let left = a.summarize(&a_data, true);
            let right = b.summarize(&b_data, true);

            let outcome = diff_summaries(
                &config.diff_command,
                (&first.display().to_string(), &left),
                (&second.display().to_string(), &right),
            )?;
            if let DiffOutcome::Different(text) = outcome {
                print!("{text}");
            }
            Ok(())
        }
        BoardCommand::Diffstat { first, second } => {
            let (_, a) = load(&first, config)?;
            let (_, b) = load(&second, config)?;
            print!("{}", diffstat(&a, &b).to_text());
            Ok(())
        }
        BoardCommand::Add {
            file,
            data,
            names,
            kind,
            output,
        } => {
            let (_, mut container) = load(&file, config)?;
            let payload =
                std::fs::read(&data).with_context(|| format!("Failed to read {}", data.display()))?;
            add(&mut container, BoardEntry::new(kind, names, payload), &TracingObserver)?;
            write(output.as_deref().unwrap_or(&file), &container)
        }
    }
}
