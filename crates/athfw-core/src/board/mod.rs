//! Board-data containers (`board-2.bin`).
//!
//! A board container holds many board-data images, each selected by the
//! driver through one of its alias names. ath11k containers additionally
//! carry regulatory-database images framed the same way.
//!
//! Every entry is one outer element whose value is a nested element list:
//! one name element per alias followed by one data element.

pub mod mapping;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::checksum::{crc32, md5_hex};
use crate::codec::constants::*;
use crate::codec::framing::{
    check_capacity, element_len, push_element, read_elements, read_signature, write_element,
    write_signature,
};
use crate::config::DecodeOptions;
use crate::error::{CodecError, Result};
use crate::events::{CodecEvent, CodecObserver, Scope};

pub use mapping::{create_from_mapping, extract_to_mapping};

/// Board container product generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoardProduct {
    Ath10k,
    Ath11k,
}

impl BoardProduct {
    pub const ALL: [BoardProduct; 2] = [BoardProduct::Ath10k, BoardProduct::Ath11k];

    pub fn format(&self) -> &'static ContainerFormat {
        match self {
            BoardProduct::Ath10k => &ATH10K_BOARD,
            BoardProduct::Ath11k => &ATH11K_BOARD,
        }
    }

    /// Detect the product from the leading signature.
    pub fn detect(data: &[u8]) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| read_signature(data, p.format()).is_ok())
    }

    /// Entry kinds this product's containers can hold.
    pub fn kinds(&self) -> &'static [EntryKind] {
        match self {
            BoardProduct::Ath10k => &[EntryKind::Board, EntryKind::BoardExt],
            BoardProduct::Ath11k => &[EntryKind::Board, EntryKind::Regdb],
        }
    }

    pub fn supports(&self, kind: EntryKind) -> bool {
        self.kinds().contains(&kind)
    }

    fn kind_for_id(&self, type_id: i32) -> Option<EntryKind> {
        self.kinds()
            .iter()
            .copied()
            .find(|k| k.type_id() == type_id)
    }
}

impl fmt::Display for BoardProduct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoardProduct::Ath10k => write!(f, "ath10k"),
            BoardProduct::Ath11k => write!(f, "ath11k"),
        }
    }
}

impl FromStr for BoardProduct {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ath10k" => Ok(BoardProduct::Ath10k),
            "ath11k" => Ok(BoardProduct::Ath11k),
            other => Err(CodecError::InvalidValue {
                field: "product",
                message: format!("unknown board product '{other}'"),
            }),
        }
    }
}

/// Kind of a logical entry in a board container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntryKind {
    Board,
    BoardExt,
    Regdb,
}

impl EntryKind {
    pub fn type_id(&self) -> i32 {
        match self {
            EntryKind::Board => BD_IE_BOARD,
            EntryKind::BoardExt => BD_IE_BOARD_EXT,
            EntryKind::Regdb => BD_IE_REGDB,
        }
    }

    /// Key used in JSON mapping files.
    pub fn mapping_key(&self) -> &'static str {
        match self {
            EntryKind::Board => "board",
            EntryKind::BoardExt => "board-ext",
            EntryKind::Regdb => "regdb",
        }
    }

    /// Prefix used in summary lines.
    fn summary_prefix(&self) -> &'static str {
        match self {
            EntryKind::Board => "Board",
            EntryKind::BoardExt => "BoardExt",
            EntryKind::Regdb => "Regdb",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mapping_key())
    }
}

impl FromStr for EntryKind {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "board" => Ok(EntryKind::Board),
            "board-ext" => Ok(EntryKind::BoardExt),
            "regdb" => Ok(EntryKind::Regdb),
            other => Err(CodecError::InvalidValue {
                field: "kind",
                message: format!("unknown entry kind '{other}'"),
            }),
        }
    }
}

/// One named binary blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardEntry {
    pub kind: EntryKind,
    /// Alias names, in encode order.
    pub names: Vec<String>,
    pub data: Vec<u8>,
}

impl BoardEntry {
    pub fn new(kind: EntryKind, names: Vec<String>, data: Vec<u8>) -> Self {
        Self { kind, names, data }
    }

    fn shares_name_with(&self, other: &BoardEntry) -> bool {
        self.kind == other.kind && self.names.iter().any(|n| other.names.contains(n))
    }

    /// Names sorted, for order-independent comparison.
    pub fn sorted_names(&self) -> Vec<String> {
        let mut names = self.names.clone();
        names.sort();
        names
    }
}

/// First duplicate name found by [`BoardContainer::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateName {
    pub kind: EntryKind,
    pub name: String,
    /// Index of the first entry carrying the name.
    pub first: usize,
    /// Index of the entry repeating it.
    pub second: usize,
}

/// Decoded or freshly built board container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardContainer {
    pub product: BoardProduct,
    pub entries: Vec<BoardEntry>,
}

impl BoardContainer {
    pub fn new(product: BoardProduct) -> Self {
        Self {
            product,
            entries: Vec::new(),
        }
    }

    /// Add an entry. Existing entries of the same kind that share any name
    /// with it are removed first.
    pub fn add_entry(&mut self, entry: BoardEntry, observer: &dyn CodecObserver) -> Result<()> {
        if !self.product.supports(entry.kind) {
            return Err(CodecError::InvalidValue {
                field: "kind",
                message: format!("{} containers cannot hold {} entries", self.product, entry.kind),
            });
        }
        if entry.names.is_empty() {
            return Err(CodecError::InvalidValue {
                field: "names",
                message: "entry needs at least one name".to_string(),
            });
        }

        let mut index = 0;
        self.entries.retain(|existing| {
            let replaced = existing.shares_name_with(&entry);
            if replaced {
                observer.on_event(&CodecEvent::EntryReplaced {
                    name: existing.names.join(","),
                    index,
                });
            }
            index += 1;
            !replaced
        });

        self.entries.push(entry);
        Ok(())
    }

    /// Entries of one kind, in encode order.
    pub fn entries_of(&self, kind: EntryKind) -> impl Iterator<Item = &BoardEntry> {
        self.entries.iter().filter(move |e| e.kind == kind)
    }

    pub fn encode(&self, observer: &dyn CodecObserver) -> Result<Vec<u8>> {
        let format = self.product.format();
        let mut buf = Vec::new();
        write_signature(&mut buf, format);

        for entry in &self.entries {
            let inner_len = entry
                .names
                .iter()
                .map(|n| element_len(n.len()))
                .sum::<usize>()
                + element_len(entry.data.len());
            check_capacity(buf.len() + element_len(inner_len), format)?;

            let mut inner = Vec::with_capacity(inner_len);
            for name in &entry.names {
                write_element(&mut inner, BD_IE_NAME, name.as_bytes(), format.padding);
            }
            write_element(&mut inner, BD_IE_DATA, &entry.data, format.padding);

            push_element(&mut buf, entry.kind.type_id(), &inner, format)?;
        }

        observer.on_event(&CodecEvent::Encoded {
            signature: format.signature_str(),
            size: buf.len(),
        });

        Ok(buf)
    }

    /// Decode a container, detecting the product from its signature.
    pub fn decode(
        data: &[u8],
        options: &DecodeOptions,
        observer: &dyn CodecObserver,
    ) -> Result<Self> {
        let product = BoardProduct::detect(data).ok_or_else(|| CodecError::BadSignature {
            expected: BoardProduct::ALL
                .iter()
                .map(|p| p.format().signature_str())
                .collect::<Vec<_>>()
                .join(" or "),
        })?;
        Self::decode_as(product, data, options, observer)
    }

    pub fn decode_as(
        product: BoardProduct,
        data: &[u8],
        options: &DecodeOptions,
        observer: &dyn CodecObserver,
    ) -> Result<Self> {
        let format = product.format();
        if data.len() > format.max_len {
            return Err(CodecError::Capacity {
                size: data.len(),
                max: format.max_len,
            });
        }

        let offset = read_signature(data, format)?;
        let mut entries = Vec::new();

        for element in read_elements(data, offset, data.len() - offset)? {
            let Some(kind) = product.kind_for_id(element.type_id) else {
                options.unknown_element(Scope::Board, &element, observer)?;
                continue;
            };

            let mut names = Vec::new();
            let mut payload = None;

            for inner in read_elements(element.value, 0, element.value.len())? {
                match inner.type_id {
                    BD_IE_NAME => {
                        let name = std::str::from_utf8(inner.value).map_err(|e| {
                            CodecError::InvalidValue {
                                field: "name",
                                message: format!("entry at 0x{:X}: {e}", element.offset),
                            }
                        })?;
                        names.push(name.to_string());
                    }
                    BD_IE_DATA => payload = Some(inner.value.to_vec()),
                    _ => options.unknown_element(Scope::BoardEntry, &inner, observer)?,
                }
            }

            let data = payload.ok_or_else(|| CodecError::InvalidValue {
                field: "data",
                message: format!("{kind} entry at 0x{:X} has no data element", element.offset),
            })?;

            entries.push(BoardEntry { kind, names, data });
        }

        observer.on_event(&CodecEvent::Decoded {
            signature: format.signature_str(),
            size: data.len(),
            entries: entries.len(),
        });

        let container = Self { product, entries };
        container.validate(observer);
        Ok(container)
    }

    /// Report the first name used by two entries of the same kind.
    ///
    /// The driver resolves board files by name, so only the first entry
    /// carrying a duplicated name is ever reachable.
    pub fn validate(&self, observer: &dyn CodecObserver) -> Option<DuplicateName> {
        let mut seen: HashMap<(EntryKind, &str), usize> = HashMap::new();

        for (index, entry) in self.entries.iter().enumerate() {
            for name in &entry.names {
                match seen.get(&(entry.kind, name.as_str())) {
                    Some(&first) if first != index => {
                        observer.on_event(&CodecEvent::DuplicateName {
                            name: name.clone(),
                            first,
                            second: index,
                        });
                        return Some(DuplicateName {
                            kind: entry.kind,
                            name: name.clone(),
                            first,
                            second: index,
                        });
                    }
                    Some(_) => {}
                    None => {
                        seen.insert((entry.kind, name.as_str()), index);
                    }
                }
            }
        }

        None
    }

    /// Render file and per-entry checksums, one `Key: value` per line.
    ///
    /// `file` is the container's on-disk bytes. With `sorted` the entries
    /// are ordered by kind and names, which keeps line diffs stable.
    pub fn summarize(&self, file: &[u8], sorted: bool) -> String {
        let mut out = String::new();
        out.push_str(&format!("FileSize: {}\n", file.len()));
        out.push_str(&format!("FileCRC32: {:08x}\n", crc32(file)));
        out.push_str(&format!("FileMD5: {}\n", md5_hex(file)));

        for &kind in self.product.kinds() {
            let mut entries: Vec<(Vec<String>, &BoardEntry)> = self
                .entries_of(kind)
                .map(|e| {
                    let names = if sorted { e.sorted_names() } else { e.names.clone() };
                    (names, e)
                })
                .collect();
            if sorted {
                entries.sort_by(|a, b| a.0.cmp(&b.0));
            }

            let prefix = kind.summary_prefix();
            for (i, (names, entry)) in entries.iter().enumerate() {
                for name in names {
                    out.push_str(&format!("{prefix}Names[{i}]: '{name}'\n"));
                }
                out.push_str(&format!("{prefix}Length[{i}]: {}\n", entry.data.len()));
                out.push_str(&format!("{prefix}CRC32[{i}]: {:08x}\n", crc32(&entry.data)));
                out.push_str(&format!("{prefix}MD5[{i}]: {}\n", md5_hex(&entry.data)));
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UnknownElementPolicy;
    use crate::events::{NullObserver, RecordingObserver};

    fn entry(kind: EntryKind, names: &[&str], data: &[u8]) -> BoardEntry {
        BoardEntry::new(
            kind,
            names.iter().map(|n| n.to_string()).collect(),
            data.to_vec(),
        )
    }

    fn sample(product: BoardProduct) -> BoardContainer {
        let mut container = BoardContainer::new(product);
        let obs = NullObserver;
        container
            .add_entry(entry(EntryKind::Board, &["bus=pci,bmi-chip-id=0"], b""), &obs)
            .unwrap();
        container
            .add_entry(
                entry(EntryKind::Board, &["bus=pci,a", "bus=pci,b"], b"abcd"),
                &obs,
            )
            .unwrap();
        container
            .add_entry(entry(EntryKind::Board, &["bus=pci,c"], b"12345"), &obs)
            .unwrap();
        container
    }

    #[test]
    fn test_roundtrip_ath10k() {
        let container = sample(BoardProduct::Ath10k);
        let bytes = container.encode(&NullObserver).unwrap();
        let decoded =
            BoardContainer::decode(&bytes, &DecodeOptions::default(), &NullObserver).unwrap();
        assert_eq!(decoded, container);
    }

    #[test]
    fn test_roundtrip_ath11k_with_regdb() {
        let mut container = sample(BoardProduct::Ath11k);
        container
            .add_entry(entry(EntryKind::Regdb, &["bus=ahb"], b"regdb!"), &NullObserver)
            .unwrap();
        let bytes = container.encode(&NullObserver).unwrap();
        assert_eq!(&bytes[..16], b"QCA-ATH11K-BOARD");

        let decoded =
            BoardContainer::decode(&bytes, &DecodeOptions::default(), &NullObserver).unwrap();
        assert_eq!(decoded.product, BoardProduct::Ath11k);
        assert_eq!(decoded, container);
        assert_eq!(decoded.entries_of(EntryKind::Regdb).count(), 1);
    }

    #[test]
    fn test_encoded_layout() {
        let mut container = BoardContainer::new(BoardProduct::Ath10k);
        container
            .add_entry(entry(EntryKind::Board, &["ab"], b"xyz"), &NullObserver)
            .unwrap();
        let bytes = container.encode(&NullObserver).unwrap();

        // signature(20) + outer header(8) + name(8+2+2) + data(8+3+1)
        assert_eq!(bytes.len(), 20 + 8 + 12 + 12);
        assert_eq!(&bytes[20..24], &0i32.to_le_bytes());
        assert_eq!(&bytes[24..28], &24i32.to_le_bytes());
        assert_eq!(&bytes[38..40], &[0x6D, 0x6D]);
        assert_eq!(bytes[bytes.len() - 1], 0x6D);
    }

    #[test]
    fn test_add_entry_replaces_shared_name() {
        let mut container = sample(BoardProduct::Ath10k);
        let obs = RecordingObserver::new();
        container
            .add_entry(entry(EntryKind::Board, &["bus=pci,b"], b"new"), &obs)
            .unwrap();

        assert_eq!(container.entries.len(), 3);
        assert_eq!(container.entries[2].data, b"new");
        assert!(matches!(
            obs.events()[0],
            CodecEvent::EntryReplaced { index: 1, .. }
        ));
    }

    #[test]
    fn test_add_entry_kind_namespaces() {
        let mut container = BoardContainer::new(BoardProduct::Ath11k);
        container
            .add_entry(entry(EntryKind::Board, &["x"], b"1"), &NullObserver)
            .unwrap();
        container
            .add_entry(entry(EntryKind::Regdb, &["x"], b"2"), &NullObserver)
            .unwrap();
        assert_eq!(container.entries.len(), 2);
    }

    #[test]
    fn test_add_entry_rejects_unsupported_kind() {
        let mut container = BoardContainer::new(BoardProduct::Ath10k);
        let err = container
            .add_entry(entry(EntryKind::Regdb, &["x"], b"1"), &NullObserver)
            .unwrap_err();
        assert!(matches!(err, CodecError::InvalidValue { field: "kind", .. }));
    }

    #[test]
    fn test_duplicate_name_is_a_warning() {
        // Bypass add_entry so the duplicate survives into the encoding.
        let mut container = sample(BoardProduct::Ath10k);
        container
            .entries
            .push(entry(EntryKind::Board, &["bus=pci,c"], b"dup"));
        let bytes = container.encode(&NullObserver).unwrap();

        let obs = RecordingObserver::new();
        let decoded = BoardContainer::decode(&bytes, &DecodeOptions::default(), &obs).unwrap();
        assert_eq!(decoded.entries.len(), 4);
        assert!(obs.events().contains(&CodecEvent::DuplicateName {
            name: "bus=pci,c".to_string(),
            first: 2,
            second: 3,
        }));

        let dup = decoded.validate(&NullObserver).unwrap();
        assert_eq!(dup.kind, EntryKind::Board);
        assert_eq!((dup.first, dup.second), (2, 3));
    }

    #[test]
    fn test_bad_signature() {
        let mut bytes = sample(BoardProduct::Ath10k).encode(&NullObserver).unwrap();
        bytes[3] = b'X';
        let err =
            BoardContainer::decode(&bytes, &DecodeOptions::default(), &NullObserver).unwrap_err();
        assert!(err.is_format());
    }

    #[test]
    fn test_truncated_container() {
        let bytes = sample(BoardProduct::Ath10k).encode(&NullObserver).unwrap();
        let truncated = &bytes[..bytes.len() - 6];
        let err = BoardContainer::decode(truncated, &DecodeOptions::default(), &NullObserver)
            .unwrap_err();
        assert!(err.is_format(), "{err}");
    }

    #[test]
    fn test_inner_overrun() {
        let mut container = BoardContainer::new(BoardProduct::Ath10k);
        container
            .add_entry(entry(EntryKind::Board, &["ab"], b"xyz"), &NullObserver)
            .unwrap();
        let mut bytes = container.encode(&NullObserver).unwrap();
        // Name length larger than the enclosing board element.
        bytes[32..36].copy_from_slice(&40i32.to_le_bytes());
        let err =
            BoardContainer::decode(&bytes, &DecodeOptions::default(), &NullObserver).unwrap_err();
        assert!(matches!(err, CodecError::LengthOverrun { length: 40, .. }));
    }

    #[test]
    fn test_unknown_outer_element_policy() {
        let mut bytes = sample(BoardProduct::Ath10k).encode(&NullObserver).unwrap();
        write_element(&mut bytes, 9, b"junk", PADDING_MAGIC_ATH);

        let obs = RecordingObserver::new();
        let decoded = BoardContainer::decode(&bytes, &DecodeOptions::default(), &obs).unwrap();
        assert_eq!(decoded.entries.len(), 3);
        assert_eq!(obs.warnings(), 1);

        let reject = DecodeOptions {
            unknown_elements: UnknownElementPolicy::Reject,
        };
        let err = BoardContainer::decode(&bytes, &reject, &NullObserver).unwrap_err();
        assert!(matches!(err, CodecError::UnknownElement { type_id: 9, .. }));
    }

    #[test]
    fn test_capacity_on_decode() {
        let data = vec![0u8; ATH10K_BOARD.max_len + 1];
        let options = DecodeOptions::default();
        let err = BoardContainer::decode_as(BoardProduct::Ath10k, &data, &options, &NullObserver)
            .unwrap_err();
        assert!(matches!(err, CodecError::Capacity { .. }));
    }

    #[test]
    fn test_capacity_on_encode() {
        let mut container = BoardContainer::new(BoardProduct::Ath10k);
        container
            .add_entry(
                entry(EntryKind::Board, &["big"], &vec![0u8; ATH10K_BOARD.max_len]),
                &NullObserver,
            )
            .unwrap();
        let obs = RecordingObserver::new();
        let err = container.encode(&obs).unwrap_err();
        assert!(matches!(err, CodecError::Capacity { max: TWO_MB, .. }));
        assert!(obs.events().is_empty());
    }

    #[test]
    fn test_summary_sorted_order() {
        let mut container = BoardContainer::new(BoardProduct::Ath10k);
        container
            .add_entry(entry(EntryKind::Board, &["zzz"], b"1"), &NullObserver)
            .unwrap();
        container
            .add_entry(entry(EntryKind::Board, &["aaa"], b"2"), &NullObserver)
            .unwrap();
        let bytes = container.encode(&NullObserver).unwrap();

        let unsorted = container.summarize(&bytes, false);
        let sorted = container.summarize(&bytes, true);
        assert!(unsorted.contains("BoardNames[0]: 'zzz'"));
        assert!(sorted.contains("BoardNames[0]: 'aaa'"));
        assert!(sorted.contains(&format!("FileSize: {}", bytes.len())));
        assert!(sorted.contains(&format!("BoardCRC32[0]: {:08x}", crc32(b"2"))));
    }
}
