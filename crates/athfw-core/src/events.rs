//! Event system for codec diagnostics.
//!
//! Decode and encode entry points take an observer handle instead of
//! logging through global state, so the CLI and tests can each decide
//! what to do with warnings.

use std::fmt;
use std::sync::Mutex;

/// Which part of a container an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Top-level element list of a board container.
    Board,
    /// Elements nested inside one board/regdb entry.
    BoardEntry,
    /// Top-level element list of a firmware container.
    Firmware,
}

impl Scope {
    pub fn name(&self) -> &'static str {
        match self {
            Scope::Board => "board container",
            Scope::BoardEntry => "board entry",
            Scope::Firmware => "firmware container",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Events emitted while decoding or encoding a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecEvent {
    /// Container decoded.
    Decoded {
        signature: String,
        size: usize,
        entries: usize,
    },
    /// Container encoded.
    Encoded { signature: String, size: usize },
    /// Element with a type id the family does not define.
    UnknownElement {
        scope: Scope,
        type_id: i32,
        offset: usize,
        length: usize,
    },
    /// Element type that appears more than once; the later value wins.
    DuplicateElement {
        scope: Scope,
        type_id: i32,
        offset: usize,
    },
    /// Feature bit set that has no name in the feature table.
    UnknownFeature { index: usize },
    /// The same name appears in two entries of the same kind.
    DuplicateName {
        name: String,
        first: usize,
        second: usize,
    },
    /// An added entry replaced an existing one sharing a name.
    EntryReplaced { name: String, index: usize },
}

/// Observer trait for receiving codec events.
pub trait CodecObserver: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: &CodecEvent);
}

/// No-op observer that discards all events.
pub struct NullObserver;

impl CodecObserver for NullObserver {
    fn on_event(&self, _event: &CodecEvent) {}
}

/// Observer that logs events using tracing.
pub struct TracingObserver;

impl CodecObserver for TracingObserver {
    fn on_event(&self, event: &CodecEvent) {
        match event {
            CodecEvent::Decoded {
                signature,
                size,
                entries,
            } => {
                tracing::debug!(signature = %signature, size, entries, "Container decoded");
            }
            CodecEvent::Encoded { signature, size } => {
                tracing::debug!(signature = %signature, size, "Container encoded");
            }
            CodecEvent::UnknownElement {
                scope,
                type_id,
                offset,
                length,
            } => {
                tracing::warn!(
                    scope = %scope,
                    type_id,
                    offset = %format!("0x{:X}", offset),
                    length,
                    "Unknown element"
                );
            }
            CodecEvent::DuplicateElement {
                scope,
                type_id,
                offset,
            } => {
                tracing::warn!(
                    scope = %scope,
                    type_id,
                    offset = %format!("0x{:X}", offset),
                    "Repeated element overrides earlier value"
                );
            }
            CodecEvent::UnknownFeature { index } => {
                tracing::warn!(index, "Unknown feature bit set");
            }
            CodecEvent::DuplicateName {
                name,
                first,
                second,
            } => {
                tracing::warn!(
                    name = %name,
                    first,
                    second,
                    "Duplicate board name, driver will only find the first entry"
                );
            }
            CodecEvent::EntryReplaced { name, index } => {
                tracing::info!(name = %name, index, "Replaced existing entry");
            }
        }
    }
}

/// Observer that keeps every event, for inspection after the fact.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<CodecEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded events.
    pub fn events(&self) -> Vec<CodecEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn warnings(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| {
                matches!(
                    e,
                    CodecEvent::UnknownElement { .. }
                        | CodecEvent::DuplicateElement { .. }
                        | CodecEvent::UnknownFeature { .. }
                        | CodecEvent::DuplicateName { .. }
                )
            })
            .count()
    }
}

impl CodecObserver for RecordingObserver {
    fn on_event(&self, event: &CodecEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
