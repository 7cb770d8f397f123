use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use athfw_core::firmware::{HTT_OP_VERSIONS, WMI_OP_VERSIONS, parse_op_version};
use athfw_core::{
    DiffOutcome, FirmwareChanges, FirmwareContainer, FwProduct, ImageKind, ToolConfig,
    TracingObserver, diff_summaries,
};
use clap::{Args, Subcommand};
use tracing::info;

#[derive(Subcommand, Debug)]
pub enum FwCommand {
    /// Print a summary of the container
    Info { file: PathBuf },
    /// Build a container from its fields and image files
    Create {
        #[arg(long)]
        product: FwProduct,
        #[arg(short, long, default_value = "firmware.bin")]
        output: PathBuf,
        #[command(flatten)]
        fields: FieldArgs,
    },
    /// Change fields of an existing container
    Modify {
        file: PathBuf,
        /// Defaults to rewriting the input file
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        fields: FieldArgs,
        #[arg(long = "add-feature")]
        add_features: Vec<String>,
        #[arg(long = "remove-feature")]
        remove_features: Vec<String>,
    },
    /// Write every image into a directory
    Extract {
        file: PathBuf,
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
    /// Print the CRC32 of every image
    Crc32 { file: PathBuf },
    /// Diff the summaries of two containers
    Diff { first: PathBuf, second: PathBuf },
    /// Print the create command that rebuilds the container
    DumpCmdline { file: PathBuf },
}

#[derive(Args, Debug, Default)]
pub struct FieldArgs {
    #[arg(long)]
    firmware_version: Option<String>,
    #[arg(long)]
    timestamp: Option<u32>,
    /// Comma separated feature names or bit numbers; empty clears all
    #[arg(long)]
    features: Option<String>,
    #[arg(long)]
    wmi_op_version: Option<String>,
    #[arg(long)]
    htt_op_version: Option<String>,
    /// Image as KIND=PATH
    #[arg(long = "image", value_parser = parse_image)]
    images: Vec<(ImageKind, PathBuf)>,
}

fn parse_image(s: &str) -> Result<(ImageKind, PathBuf), String> {
    let (kind, path) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KIND=PATH, got '{s}'"))?;
    let kind = kind.parse::<ImageKind>().map_err(|e| e.to_string())?;
    Ok((kind, PathBuf::from(path)))
}

fn feature_indices(product: FwProduct, names: &[String]) -> Result<Vec<usize>> {
    names
        .iter()
        .map(|name| product.feature_index(name).map_err(Into::into))
        .collect()
}

impl FieldArgs {
    fn into_changes(self, product: FwProduct) -> Result<FirmwareChanges> {
        let features = match self.features {
            Some(list) => {
                let names: Vec<String> = list
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect();
                Some(
                    feature_indices(product, &names)?
                        .into_iter()
                        .collect::<BTreeSet<_>>(),
                )
            }
            None => None,
        };

        let wmi_op_version = self
            .wmi_op_version
            .map(|s| parse_op_version(WMI_OP_VERSIONS, "wmi-op-version", &s))
            .transpose()?;
        let htt_op_version = self
            .htt_op_version
            .map(|s| parse_op_version(HTT_OP_VERSIONS, "htt-op-version", &s))
            .transpose()?;

        let mut images = Vec::with_capacity(self.images.len());
        for (kind, path) in self.images {
            let data = std::fs::read(&path)
                .with_context(|| format!("Failed to read {} image {}", kind, path.display()))?;
            images.push((kind, data));
        }

        Ok(FirmwareChanges {
            version: self.firmware_version,
            timestamp: self.timestamp,
            features,
            wmi_op_version,
            htt_op_version,
            images,
            ..Default::default()
        })
    }
}

/// Changes requested by `fw modify`. An empty change set is an error.
fn modify_changes(
    product: FwProduct,
    fields: FieldArgs,
    add_features: &[String],
    remove_features: &[String],
) -> Result<FirmwareChanges> {
    let mut changes = fields.into_changes(product)?;
    changes.add_features = feature_indices(product, add_features)?;
    changes.remove_features = feature_indices(product, remove_features)?;
    if changes.is_empty() {
        return Err(anyhow!("Nothing to modify"));
    }
    Ok(changes)
}

fn load(path: &Path, config: &ToolConfig) -> Result<(Vec<u8>, FirmwareContainer)> {
    let data = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let container = FirmwareContainer::load(&data, &config.decode_options(), &TracingObserver)
        .with_context(|| format!("Failed to decode {}", path.display()))?;
    Ok((data, container))
}

fn write(path: &Path, container: &FirmwareContainer) -> Result<()> {
    let bytes = container.save(&TracingObserver)?;
    std::fs::write(path, &bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), size = bytes.len(), "Wrote firmware container");
    Ok(())
}

pub fn run(cmd: FwCommand, config: &ToolConfig) -> Result<()> {
    match cmd {
        FwCommand::Info { file } => {
            let (data, container) = load(&file, config)?;
            print!("{}", container.summary(&data));
            Ok(())
        }
        FwCommand::Create {
            product,
            output,
            fields,
        } => {
            let mut container = FirmwareContainer::new(product);
            fields.into_changes(product)?.apply(&mut container)?;
            write(&output, &container)
        }
        FwCommand::Modify {
            file,
            output,
            fields,
            add_features,
            remove_features,
        } => {
            let (_, mut container) = load(&file, config)?;
            modify_changes(container.product, fields, &add_features, &remove_features)?
                .apply(&mut container)?;
            write(output.as_deref().unwrap_or(&file), &container)
        }
        FwCommand::Extract { file, output } => {
            let (_, container) = load(&file, config)?;
            for path in container.extract(&output)? {
                println!("{}", path.display());
            }
            Ok(())
        }
        FwCommand::Crc32 { file } => {
            let (_, container) = load(&file, config)?;
            for (kind, crc) in container.image_crc32s() {
                println!("{}: 0x{crc:08x}", kind.file_name());
            }
            Ok(())
        }
        FwCommand::Diff { first, second } => {
            let (a_data, a) = load(&first, config)?;
            let (b_data, b) = load(&second, config)?;
            let outcome = diff_summaries(
                &config.diff_command,
                (&first.display().to_string(), &a.summary(&a_data)),
                (&second.display().to_string(), &b.summary(&b_data)),
            )?;
            if let DiffOutcome::Different(text) = outcome {
                print!("{text}");
            }
            Ok(())
        }
        FwCommand::DumpCmdline { file } => {
            let (_, container) = load(&file, config)?;
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "firmware.bin".to_string());
            println!("{}", container.dump_cmdline(&name));
            Ok(())
        }
    }
}
