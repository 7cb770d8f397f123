//! Firmware containers (`firmware-N.bin`).
//!
//! A flat element list keyed by a small per-product enum: version string,
//! build timestamp, feature bitmap, WMI/HTT operation versions and the
//! binary images. Unset fields are not encoded at all, so "absent" and
//! "present but empty" survive a round trip.

pub mod modify;
pub mod tables;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::checksum::{crc32, md5_hex};
use crate::codec::bitmap::{decode_bitmap, encode_bitmap};
use crate::codec::framing::{
    push_element, read_elements, read_signature, read_u32_value, write_signature,
};
use crate::config::DecodeOptions;
use crate::error::{CodecError, Result};
use crate::events::{CodecEvent, CodecObserver, Scope};

pub use modify::FirmwareChanges;
pub use tables::{
    FwField, FwProduct, HTT_OP_VERSIONS, ImageKind, WMI_OP_VERSIONS, op_version_name,
    parse_op_version,
};

/// One firmware element, decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FwElement {
    Version(String),
    Timestamp(u32),
    Features(BTreeSet<usize>),
    WmiOpVersion(u32),
    HttOpVersion(u32),
    Image(ImageKind, Vec<u8>),
}

impl FwElement {
    pub fn field(&self) -> FwField {
        match self {
            FwElement::Version(_) => FwField::Version,
            FwElement::Timestamp(_) => FwField::Timestamp,
            FwElement::Features(_) => FwField::Features,
            FwElement::WmiOpVersion(_) => FwField::WmiOpVersion,
            FwElement::HttOpVersion(_) => FwField::HttOpVersion,
            FwElement::Image(kind, _) => FwField::Image(*kind),
        }
    }

    fn decode(field: FwField, value: &[u8]) -> Result<Self> {
        Ok(match field {
            FwField::Version => {
                let version =
                    String::from_utf8(value.to_vec()).map_err(|e| CodecError::InvalidValue {
                        field: "firmware-version",
                        message: e.to_string(),
                    })?;
                FwElement::Version(version)
            }
            FwField::Timestamp => FwElement::Timestamp(read_u32_value(value, "timestamp")?),
            FwField::Features => FwElement::Features(decode_bitmap(value)),
            FwField::WmiOpVersion => {
                FwElement::WmiOpVersion(read_u32_value(value, "wmi-op-version")?)
            }
            FwField::HttOpVersion => {
                FwElement::HttOpVersion(read_u32_value(value, "htt-op-version")?)
            }
            FwField::Image(kind) => FwElement::Image(kind, value.to_vec()),
        })
    }

    fn encode_value(&self, product: FwProduct) -> Result<Vec<u8>> {
        Ok(match self {
            FwElement::Version(version) => version.as_bytes().to_vec(),
            FwElement::Timestamp(v) | FwElement::WmiOpVersion(v) | FwElement::HttOpVersion(v) => {
                v.to_le_bytes().to_vec()
            }
            FwElement::Features(features) => {
                encode_bitmap(features, product.feature_count(features))?
            }
            FwElement::Image(_, data) => data.clone(),
        })
    }
}

/// Decoded or freshly built firmware container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareContainer {
    pub product: FwProduct,
    pub version: Option<String>,
    pub timestamp: Option<u32>,
    pub features: Option<BTreeSet<usize>>,
    pub wmi_op_version: Option<u32>,
    pub htt_op_version: Option<u32>,
    pub images: BTreeMap<ImageKind, Vec<u8>>,
}

impl FirmwareContainer {
    pub fn new(product: FwProduct) -> Self {
        Self {
            product,
            version: None,
            timestamp: None,
            features: None,
            wmi_op_version: None,
            htt_op_version: None,
            images: BTreeMap::new(),
        }
    }

    /// Store an element, replacing any previous value of the same field.
    pub fn set(&mut self, element: FwElement) {
        match element {
            FwElement::Version(v) => self.version = Some(v),
            FwElement::Timestamp(v) => self.timestamp = Some(v),
            FwElement::Features(v) => self.features = Some(v),
            FwElement::WmiOpVersion(v) => self.wmi_op_version = Some(v),
            FwElement::HttOpVersion(v) => self.htt_op_version = Some(v),
            FwElement::Image(kind, data) => {
                self.images.insert(kind, data);
            }
        }
    }

    /// All present fields as elements, in no particular order.
    pub fn elements(&self) -> Vec<FwElement> {
        let mut elements = Vec::new();
        if let Some(v) = &self.version {
            elements.push(FwElement::Version(v.clone()));
        }
        if let Some(v) = self.timestamp {
            elements.push(FwElement::Timestamp(v));
        }
        if let Some(v) = &self.features {
            elements.push(FwElement::Features(v.clone()));
        }
        if let Some(v) = self.wmi_op_version {
            elements.push(FwElement::WmiOpVersion(v));
        }
        if let Some(v) = self.htt_op_version {
            elements.push(FwElement::HttOpVersion(v));
        }
        for (kind, data) in &self.images {
            elements.push(FwElement::Image(*kind, data.clone()));
        }
        elements
    }

    /// Present elements with their type ids, in encode order.
    ///
    /// Fails if a field is set that this product cannot carry.
    fn ordered_elements(&self) -> Result<Vec<(i32, FwElement)>> {
        let fields = self.product.fields();
        let mut ordered = Vec::new();

        for element in self.elements() {
            let field = element.field();
            let position = fields.iter().position(|(_, f)| *f == field).ok_or_else(|| {
                CodecError::InvalidValue {
                    field: "product",
                    message: format!("{} firmware has no {field} element", self.product),
                }
            })?;
            ordered.push((position, fields[position].0, element));
        }

        ordered.sort_by_key(|(position, _, _)| *position);
        Ok(ordered.into_iter().map(|(_, id, e)| (id, e)).collect())
    }

    pub fn save(&self, observer: &dyn CodecObserver) -> Result<Vec<u8>> {
        let format = self.product.format();
        let mut buf = Vec::new();
        write_signature(&mut buf, format);

        for (type_id, element) in self.ordered_elements()? {
            let value = element.encode_value(self.product)?;
            push_element(&mut buf, type_id, &value, format)?;
        }

        observer.on_event(&CodecEvent::Encoded {
            signature: format.signature_str(),
            size: buf.len(),
        });
        Ok(buf)
    }

    /// Decode a container, detecting the product from its signature.
    pub fn load(
        data: &[u8],
        options: &DecodeOptions,
        observer: &dyn CodecObserver,
    ) -> Result<Self> {
        let product = FwProduct::ALL
            .into_iter()
            .find(|p| read_signature(data, p.format()).is_ok())
            .ok_or_else(|| CodecError::BadSignature {
                expected: FwProduct::ALL
                    .iter()
                    .map(|p| p.format().signature_str())
                    .collect::<Vec<_>>()
                    .join(" or "),
            })?;
        Self::load_as(product, data, options, observer)
    }

    pub fn load_as(
        product: FwProduct,
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
        let elements = read_elements(data, offset, data.len() - offset)?;
        let mut container = Self::new(product);

        let mut seen = BTreeSet::new();
        for raw in &elements {
            let Some(field) = product.field_for_id(raw.type_id) else {
                options.unknown_element(Scope::Firmware, raw, observer)?;
                continue;
            };
            if !seen.insert(raw.type_id) {
                observer.on_event(&CodecEvent::DuplicateElement {
                    scope: Scope::Firmware,
                    type_id: raw.type_id,
                    offset: raw.offset,
                });
            }
            debug!(field = %field, len = raw.value.len(), "Decoded element");
            container.set(FwElement::decode(field, raw.value)?);
        }

        if let Some(features) = &container.features {
            let known = product.feature_names().len();
            for &index in features.iter().filter(|&&i| i >= known) {
                observer.on_event(&CodecEvent::UnknownFeature { index });
            }
        }

        observer.on_event(&CodecEvent::Decoded {
            signature: format.signature_str(),
            size: data.len(),
            entries: elements.len(),
        });
        Ok(container)
    }

    /// Enabled feature names in bit order.
    pub fn feature_names(&self) -> Vec<String> {
        self.features
            .iter()
            .flatten()
            .map(|&i| self.product.feature_name(i))
            .collect()
    }

    /// CRC32 of every present image.
    pub fn image_crc32s(&self) -> Vec<(ImageKind, u32)> {
        self.images
            .iter()
            .map(|(kind, data)| (*kind, crc32(data)))
            .collect()
    }

    /// Render present fields as `Key: value` lines.
    ///
    /// `file` is the container's on-disk bytes.
    pub fn summary(&self, file: &[u8]) -> String {
        let mut out = String::new();
        out.push_str(&format!("FileSize: {}\n", file.len()));
        out.push_str(&format!("FileCRC32: {:08x}\n", crc32(file)));
        out.push_str(&format!("FileMD5: {}\n", md5_hex(file)));

        for (_, field) in self.product.fields() {
            match field {
                FwField::Version => {
                    if let Some(v) = &self.version {
                        out.push_str(&format!("FirmwareVersion: {v}\n"));
                    }
                }
                FwField::Timestamp => {
                    if let Some(ts) = self.timestamp {
                        out.push_str(&format!("Timestamp: {}\n", format_timestamp(ts)));
                    }
                }
                FwField::Features => {
                    if self.features.is_some() {
                        out.push_str(&format!("Features: {}\n", self.feature_names().join(",")));
                    }
                }
                FwField::WmiOpVersion => {
                    if let Some(v) = self.wmi_op_version {
                        out.push_str(&format!(
                            "WMIOpVersion: {}\n",
                            op_version_name(WMI_OP_VERSIONS, v)
                        ));
                    }
                }
                FwField::HttOpVersion => {
                    if let Some(v) = self.htt_op_version {
                        out.push_str(&format!(
                            "HTTOpVersion: {}\n",
                            op_version_name(HTT_OP_VERSIONS, v)
                        ));
                    }
                }
                FwField::Image(kind) => {
                    if let Some(data) = self.images.get(kind) {
                        let key = kind.summary_key();
                        out.push_str(&format!("{key}Size: {}\n", data.len()));
                        out.push_str(&format!("{key}CRC32: {:08x}\n", crc32(data)));
                    }
                }
            }
        }

        out
    }

    /// Write every image into `dir` under its conventional file name.
    pub fn extract(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;

        let mut written = Vec::new();
        for (kind, data) in &self.images {
            let path = dir.join(kind.file_name());
            std::fs::write(&path, data)?;
            debug!(image = %kind, path = %path.display(), "Extracted image");
            written.push(path);
        }

        info!(images = written.len(), dir = %dir.display(), "Extracted firmware images");
        Ok(written)
    }

    /// Command line that rebuilds this container from extracted images.
    pub fn dump_cmdline(&self, output: &str) -> String {
        let mut args = vec![
            "athfw".to_string(),
            "fw".to_string(),
            "create".to_string(),
            "--product".to_string(),
            self.product.to_string(),
            "-o".to_string(),
            shell_quote(output),
        ];

        if let Some(v) = &self.version {
            args.push(format!("--firmware-version={}", shell_quote(v)));
        }
        if let Some(ts) = self.timestamp {
            args.push(format!("--timestamp={ts}"));
        }
        if let Some(features) = &self.features {
            let names: Vec<String> = features
                .iter()
                .map(|&i| match self.product.feature_names().get(i) {
                    Some(name) => name.to_string(),
                    None => i.to_string(),
                })
                .collect();
            args.push(format!("--features={}", shell_quote(&names.join(","))));
        }
        if let Some(v) = self.wmi_op_version {
            args.push(format!(
                "--wmi-op-version={}",
                op_version_name(WMI_OP_VERSIONS, v)
            ));
        }
        if let Some(v) = self.htt_op_version {
            args.push(format!(
                "--htt-op-version={}",
                op_version_name(HTT_OP_VERSIONS, v)
            ));
        }
        for kind in self.images.keys() {
            args.push(format!("--image={}={}", kind.cli_name(), kind.file_name()));
        }

        args.join(" ")
    }
}

/// `1463736532 (2016-05-20 09:28:52 UTC)`
pub fn format_timestamp(ts: u32) -> String {
    match chrono::DateTime::from_timestamp(i64::from(ts), 0) {
        Some(date) => format!("{ts} ({})", date.format("%Y-%m-%d %H:%M:%S UTC")),
        None => ts.to_string(),
    }
}

fn shell_quote(s: &str) -> String {
    let safe = !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_.,/=:+@".contains(c));
    if safe {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}
