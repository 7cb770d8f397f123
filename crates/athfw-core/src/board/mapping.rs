//! JSON mapping files for board containers.
//!
//! Two shapes are accepted. The flat ath10k shape lists boards directly:
//!
//! ```json
//! [{"names": ["bus=pci,bmi-chip-id=0,bmi-board-id=1"], "data": "board1.bin"}]
//! ```
//!
//! The sectioned ath11k shape groups entries by kind:
//!
//! ```json
//! [{"board": [{"names": ["bus=pci,qmi-chip-id=0"], "data": "board.bin"}],
//!   "regdb": [{"names": ["bus=pci"], "data": "regdb.bin"}]}]
//! ```
//!
//! Data paths are relative to the mapping file.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{BoardContainer, BoardEntry, BoardProduct, EntryKind};
use crate::error::{CodecError, Result};
use crate::events::CodecObserver;

/// Default mapping file name written by [`extract_to_mapping`].
pub const MAPPING_FILE_NAME: &str = "board-2.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub names: Vec<String>,
    pub data: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MappingSection {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub board: Vec<MappingEntry>,
    #[serde(rename = "board-ext", default, skip_serializing_if = "Vec::is_empty")]
    pub board_ext: Vec<MappingEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub regdb: Vec<MappingEntry>,
}

impl MappingSection {
    fn sections(&self) -> [(EntryKind, &Vec<MappingEntry>); 3] {
        [
            (EntryKind::Board, &self.board),
            (EntryKind::BoardExt, &self.board_ext),
            (EntryKind::Regdb, &self.regdb),
        ]
    }

    fn section_mut(&mut self, kind: EntryKind) -> &mut Vec<MappingEntry> {
        match kind {
            EntryKind::Board => &mut self.board,
            EntryKind::BoardExt => &mut self.board_ext,
            EntryKind::Regdb => &mut self.regdb,
        }
    }
}

/// One top-level item of a mapping file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MappingItem {
    // Listed first: a flat entry would otherwise match an empty section.
    Flat(MappingEntry),
    Sectioned(MappingSection),
}

/// Parse mapping JSON into `(kind, entry)` pairs in file order.
pub fn parse_mapping(json: &str) -> Result<Vec<(EntryKind, MappingEntry)>> {
    let items: Vec<MappingItem> = serde_json::from_str(json)?;
    let mut entries = Vec::new();

    for item in items {
        match item {
            MappingItem::Flat(entry) => entries.push((EntryKind::Board, entry)),
            MappingItem::Sectioned(section) => {
                for (kind, list) in section.sections() {
                    entries.extend(list.iter().cloned().map(|e| (kind, e)));
                }
            }
        }
    }

    Ok(entries)
}

/// Build a container from a mapping file, reading each data file.
pub fn create_from_mapping(
    path: &Path,
    product: BoardProduct,
    observer: &dyn CodecObserver,
) -> Result<BoardContainer> {
    let json = std::fs::read_to_string(path)?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));

    let mut container = BoardContainer::new(product);
    for (kind, entry) in parse_mapping(&json)? {
        let data_path = base.join(&entry.data);
        debug!(kind = %kind, path = %data_path.display(), "Reading entry data");

        let data = std::fs::read(&data_path).map_err(|e| {
            CodecError::Io(std::io::Error::new(
                e.kind(),
                format!("{}: {e}", data_path.display()),
            ))
        })?;
        container.add_entry(BoardEntry::new(kind, entry.names, data), observer)?;
    }

    info!(
        product = %product,
        entries = container.entries.len(),
        "Created container from mapping"
    );
    Ok(container)
}

/// File name for an entry's data, derived from its first alias.
pub fn data_file_name(entry: &BoardEntry) -> String {
    let stem: String = entry
        .names
        .first()
        .map(String::as_str)
        .unwrap_or(entry.kind.mapping_key())
        .chars()
        .map(|c| match c {
            ',' => '_',
            '=' => '-',
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();

    let stem = if stem.is_empty() || stem.starts_with('.') {
        format!("{}{stem}", entry.kind.mapping_key())
    } else {
        stem
    };

    match entry.kind {
        EntryKind::Regdb => format!("{stem}.regdb"),
        _ => format!("{stem}.bin"),
    }
}

/// Write every entry's data into `dir` plus a mapping file describing them.
///
/// Returns the path of the mapping file.
pub fn extract_to_mapping(container: &BoardContainer, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;

    let mut used = HashSet::new();
    let mut flat = Vec::new();
    let mut section = MappingSection::default();

    for entry in &container.entries {
        let base_name = data_file_name(entry);
        let mut file_name = base_name.clone();
        let mut n = 1;
        while !used.insert(file_name.clone()) {
            file_name = match base_name.rsplit_once('.') {
                Some((stem, ext)) => format!("{stem}-{n}.{ext}"),
                None => format!("{base_name}-{n}"),
            };
            n += 1;
        }

        std::fs::write(dir.join(&file_name), &entry.data)?;
        debug!(file = %file_name, len = entry.data.len(), "Extracted entry");

        let mapped = MappingEntry {
            names: entry.names.clone(),
            data: file_name,
        };
        flat.push(MappingItem::Flat(mapped.clone()));
        section.section_mut(entry.kind).push(mapped);
    }

    let only_boards = section.board_ext.is_empty() && section.regdb.is_empty();
    let items = if container.product == BoardProduct::Ath10k && only_boards {
        flat
    } else {
        vec![MappingItem::Sectioned(section)]
    };

    let mapping_path = dir.join(MAPPING_FILE_NAME);
    std::fs::write(&mapping_path, serde_json::to_string_pretty(&items)?)?;

    info!(
        entries = container.entries.len(),
        mapping = %mapping_path.display(),
        "Extracted container"
    );
    Ok(mapping_path)
}
