//! Container comparison.
//!
//! `diffstat` compares board containers entry by entry, keyed by name set.
//! `diff_summaries` hands two textual summaries to an external line diff
//! tool through temporary files that are removed on every exit path.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::process::Command;

use thiserror::Error;
use tracing::debug;

use crate::board::{BoardContainer, EntryKind};

/// Identity of a board entry: its kind plus the sorted set of names.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct EntryKey {
    pub kind: EntryKind,
    pub names: Vec<String>,
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.names.iter().map(|n| format!("'{n}'")).collect();
        write!(f, "{} {}", self.kind, names.join(", "))
    }
}

/// Map every entry of `container` to its payload.
///
/// When several entries share a name set only the first is kept, matching
/// the entry the driver resolves.
pub fn keyed_by_name(container: &BoardContainer) -> BTreeMap<EntryKey, &[u8]> {
    let mut keyed = BTreeMap::new();
    for e in &container.entries {
        let key = EntryKey {
            kind: e.kind,
            names: e.sorted_names(),
        };
        keyed.entry(key).or_insert(e.data.as_slice());
    }
    keyed
}

/// Entry-level differences between two board containers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffStat {
    /// Present only in the second container.
    pub new: Vec<EntryKey>,
    /// Present only in the first container.
    pub deleted: Vec<EntryKey>,
    /// Present in both with different payload bytes.
    pub changed: Vec<EntryKey>,
}

impl DiffStat {
    pub fn is_empty(&self) -> bool {
        self.new.is_empty() && self.deleted.is_empty() && self.changed.is_empty()
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for (title, keys) in [
            ("New", &self.new),
            ("Deleted", &self.deleted),
            ("Changed", &self.changed),
        ] {
            if keys.is_empty() {
                continue;
            }
            out.push_str(&format!("{title}:\n"));
            for key in keys {
                out.push_str(&format!("  {key}\n"));
            }
            out.push('\n');
        }
        out.push_str(&format!(
            "{} new, {} deleted, {} changed\n",
            self.new.len(),
            self.deleted.len(),
            self.changed.len()
        ));
        out
    }
}

/// Compare entries by exact payload bytes.
pub fn diffstat(first: &BoardContainer, second: &BoardContainer) -> DiffStat {
    let a = keyed_by_name(first);
    let b = keyed_by_name(second);
    let mut stat = DiffStat::default();

    for (key, data) in &b {
        match a.get(key) {
            None => stat.new.push(key.clone()),
            Some(old) if old != data => stat.changed.push(key.clone()),
            Some(_) => {}
        }
    }
    stat.deleted = a.keys().filter(|k| !b.contains_key(*k)).cloned().collect();

    stat
}

#[derive(Error, Debug)]
pub enum DiffError {
    #[error("No diff command configured")]
    NoCommand,
    #[error("Failed to run {command}: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("{command} failed with status {status:?}: {stderr}")]
    Failed {
        command: String,
        status: Option<i32>,
        stderr: String,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of an external diff run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffOutcome {
    Identical,
    Different(String),
}

fn write_temp(label: &str, text: &str) -> Result<tempfile::NamedTempFile, DiffError> {
    let prefix: String = label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    let mut file = tempfile::Builder::new()
        .prefix(&format!("{prefix}-"))
        .suffix(".txt")
        .tempfile()?;
    file.write_all(text.as_bytes())?;
    file.flush()?;
    Ok(file)
}

/// Run `command <left> <right>` over two summaries.
///
/// Exit status 0 means identical and 1 means different, as for `diff(1)`;
/// anything else is an error.
pub fn diff_summaries(
    command: &[String],
    left: (&str, &str),
    right: (&str, &str),
) -> Result<DiffOutcome, DiffError> {
    let (program, args) = command.split_first().ok_or(DiffError::NoCommand)?;

    let left_file = write_temp(left.0, left.1)?;
    let right_file = write_temp(right.0, right.1)?;

    debug!(command = %command.join(" "), "Running diff");
    let output = Command::new(program)
        .args(args)
        .arg(left_file.path())
        .arg(right_file.path())
        .output()
        .map_err(|source| DiffError::Spawn {
            command: program.clone(),
            source,
        })?;

    match output.status.code() {
        Some(0) => Ok(DiffOutcome::Identical),
        Some(1) => Ok(DiffOutcome::Different(
            String::from_utf8_lossy(&output.stdout).into_owned(),
        )),
        status => Err(DiffError::Failed {
            command: program.clone(),
            status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }),
    }
}
