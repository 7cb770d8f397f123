//! Tool configuration, loaded from an optional TOML file.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::RawElement;
use crate::error::CodecError;
use crate::events::{CodecEvent, CodecObserver, Scope};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// What to do with an element whose type id the family does not define.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownElementPolicy {
    /// Skip silently.
    Ignore,
    /// Skip and emit an `UnknownElement` event.
    #[default]
    Warn,
    /// Fail the decode with a format error.
    Reject,
}

/// Options applied by every decode entry point.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    pub unknown_elements: UnknownElementPolicy,
}

impl DecodeOptions {
    /// Apply the unknown-element policy to `element`.
    pub fn unknown_element(
        &self,
        scope: Scope,
        element: &RawElement<'_>,
        observer: &dyn CodecObserver,
    ) -> Result<(), CodecError> {
        match self.unknown_elements {
            UnknownElementPolicy::Ignore => Ok(()),
            UnknownElementPolicy::Warn => {
                observer.on_event(&CodecEvent::UnknownElement {
                    scope,
                    type_id: element.type_id,
                    offset: element.offset,
                    length: element.value.len(),
                });
                Ok(())
            }
            UnknownElementPolicy::Reject => Err(CodecError::UnknownElement {
                scope: scope.name(),
                type_id: element.type_id,
            }),
        }
    }
}

/// Configuration for the athfw tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Unknown element handling for board and firmware decoding.
    pub unknown_elements: UnknownElementPolicy,
    /// Line diff command; the two summary files are appended.
    pub diff_command: Vec<String>,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            unknown_elements: UnknownElementPolicy::default(),
            diff_command: vec!["diff".to_string(), "-u".to_string()],
        }
    }
}

impl ToolConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: ToolConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            unknown_elements: self.unknown_elements,
        }
    }
}
