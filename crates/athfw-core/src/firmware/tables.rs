//! Per-product element, image and feature tables.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::codec::constants::*;
use crate::error::{CodecError, Result};

/// Firmware container product generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FwProduct {
    Ath10k,
    Ath11k,
}

impl FwProduct {
    pub const ALL: [FwProduct; 2] = [FwProduct::Ath10k, FwProduct::Ath11k];

    pub fn format(&self) -> &'static ContainerFormat {
        match self {
            FwProduct::Ath10k => &ATH10K_FIRMWARE,
            FwProduct::Ath11k => &ATH11K_FIRMWARE,
        }
    }

    /// Element type id to field dispatch table, in encode order.
    pub fn fields(&self) -> &'static [(i32, FwField)] {
        match self {
            FwProduct::Ath10k => &[
                (ATH10K_FW_IE_FW_VERSION, FwField::Version),
                (ATH10K_FW_IE_TIMESTAMP, FwField::Timestamp),
                (ATH10K_FW_IE_FEATURES, FwField::Features),
                (ATH10K_FW_IE_FW_IMAGE, FwField::Image(ImageKind::Firmware)),
                (ATH10K_FW_IE_OTP_IMAGE, FwField::Image(ImageKind::Otp)),
                (ATH10K_FW_IE_WMI_OP_VERSION, FwField::WmiOpVersion),
                (ATH10K_FW_IE_HTT_OP_VERSION, FwField::HttOpVersion),
                (ATH10K_FW_IE_FW_CODE_SWAP_IMAGE, FwField::Image(ImageKind::CodeSwap)),
            ],
            FwProduct::Ath11k => &[
                (ATH11K_FW_IE_TIMESTAMP, FwField::Timestamp),
                (ATH11K_FW_IE_FEATURES, FwField::Features),
                (ATH11K_FW_IE_AMSS_IMAGE, FwField::Image(ImageKind::Amss)),
                (ATH11K_FW_IE_M3_IMAGE, FwField::Image(ImageKind::M3)),
                (ATH11K_FW_IE_AMSS_DUALMAC_IMAGE, FwField::Image(ImageKind::AmssDualMac)),
            ],
        }
    }

    pub fn field_for_id(&self, type_id: i32) -> Option<FwField> {
        self.fields()
            .iter()
            .find(|(id, _)| *id == type_id)
            .map(|(_, field)| *field)
    }

    pub fn type_id_of(&self, field: FwField) -> Option<i32> {
        self.fields()
            .iter()
            .find(|(_, f)| *f == field)
            .map(|(id, _)| *id)
    }

    pub fn supports(&self, field: FwField) -> bool {
        self.type_id_of(field).is_some()
    }

    /// Feature names indexed by bit number.
    pub fn feature_names(&self) -> &'static [&'static str] {
        match self {
            FwProduct::Ath10k => ATH10K_FEATURES,
            FwProduct::Ath11k => ATH11K_FEATURES,
        }
    }

    /// Resolve a feature by name, by bit number or as `bit-N`.
    ///
    /// Bit numbers without a name are accepted so that containers carrying
    /// newer feature bits can be recreated.
    pub fn feature_index(&self, name: &str) -> Result<usize> {
        if let Some(index) = self.feature_names().iter().position(|n| *n == name) {
            return Ok(index);
        }
        let number = name.strip_prefix("bit-").unwrap_or(name);
        match number.parse::<usize>() {
            Ok(index) if index < self.max_feature_bits() => Ok(index),
            _ => Err(CodecError::UnknownFeature(name.to_string())),
        }
    }

    /// Number of feature bits a container of the maximum size can hold.
    pub fn max_feature_bits(&self) -> usize {
        self.format().max_len * 8
    }

    /// Bitmap width used when encoding `features`.
    pub fn feature_count(&self, features: &BTreeSet<usize>) -> usize {
        let highest = features.last().map_or(0, |&i| i + 1);
        self.feature_names().len().max(highest)
    }

    /// Name of a feature bit, or `bit-N` for bits without a name.
    pub fn feature_name(&self, index: usize) -> String {
        self.feature_names()
            .get(index)
            .map(|n| n.to_string())
            .unwrap_or_else(|| format!("bit-{index}"))
    }
}

impl fmt::Display for FwProduct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FwProduct::Ath10k => write!(f, "ath10k"),
            FwProduct::Ath11k => write!(f, "ath11k"),
        }
    }
}

impl FromStr for FwProduct {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ath10k" => Ok(FwProduct::Ath10k),
            "ath11k" => Ok(FwProduct::Ath11k),
            other => Err(CodecError::InvalidValue {
                field: "product",
                message: format!("unknown firmware product '{other}'"),
            }),
        }
    }
}

/// Binary image slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ImageKind {
    /// ath10k main firmware (athwlan.bin)
    Firmware,
    /// ath10k one-time-programmable setup image
    Otp,
    /// ath10k code swap image
    CodeSwap,
    /// ath11k AMSS image
    Amss,
    /// ath11k M3 image
    M3,
    /// ath11k dual-MAC AMSS image
    AmssDualMac,
}

impl ImageKind {
    pub const ALL: [ImageKind; 6] = [
        ImageKind::Firmware,
        ImageKind::Otp,
        ImageKind::CodeSwap,
        ImageKind::Amss,
        ImageKind::M3,
        ImageKind::AmssDualMac,
    ];

    /// Name used on the command line (`--image firmware=athwlan.bin`).
    pub fn cli_name(&self) -> &'static str {
        match self {
            ImageKind::Firmware => "firmware",
            ImageKind::Otp => "otp",
            ImageKind::CodeSwap => "code-swap",
            ImageKind::Amss => "amss",
            ImageKind::M3 => "m3",
            ImageKind::AmssDualMac => "amss-dualmac",
        }
    }

    /// Conventional file name used when extracting.
    pub fn file_name(&self) -> &'static str {
        match self {
            ImageKind::Firmware => "athwlan.bin",
            ImageKind::Otp => "otp.bin",
            ImageKind::CodeSwap => "athwlan.codeswap.bin",
            ImageKind::Amss => "amss.bin",
            ImageKind::M3 => "m3.bin",
            ImageKind::AmssDualMac => "amss_dualmac.bin",
        }
    }

    /// Key prefix in summaries (`FirmwareImageSize`, ...).
    pub fn summary_key(&self) -> &'static str {
        match self {
            ImageKind::Firmware => "FirmwareImage",
            ImageKind::Otp => "OTPImage",
            ImageKind::CodeSwap => "CodeSwapImage",
            ImageKind::Amss => "AMSSImage",
            ImageKind::M3 => "M3Image",
            ImageKind::AmssDualMac => "AMSSDualMacImage",
        }
    }
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cli_name())
    }
}

impl FromStr for ImageKind {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self> {
        ImageKind::ALL
            .into_iter()
            .find(|k| k.cli_name() == s)
            .ok_or_else(|| CodecError::InvalidValue {
                field: "image",
                message: format!("unknown image kind '{s}'"),
            })
    }
}

/// Logical field of a firmware container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FwField {
    Version,
    Timestamp,
    Features,
    WmiOpVersion,
    HttOpVersion,
    Image(ImageKind),
}

impl fmt::Display for FwField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FwField::Version => write!(f, "firmware-version"),
            FwField::Timestamp => write!(f, "timestamp"),
            FwField::Features => write!(f, "features"),
            FwField::WmiOpVersion => write!(f, "wmi-op-version"),
            FwField::HttOpVersion => write!(f, "htt-op-version"),
            FwField::Image(kind) => write!(f, "{kind} image"),
        }
    }
}

// ============================================================================
// Feature Names
// ============================================================================

pub const ATH10K_FEATURES: &[&str] = &[
    "ext-wmi-mgmt-rx",
    "wmi-10x",
    "has-wmi-mgmt-tx",
    "no-p2p",
    "wmi-10-2",
    "multi-vif-ps-support",
    "wowlan-support",
    "ignore-otp-result",
    "no-nwifi-decap-4addr-padding",
    "support-skip-clock-init",
    "raw-mode-support",
    "supports-adaptive-cca",
    "mfp-support",
    "peer-flow-control",
    "btcoex-param",
    "skip-null-func-war",
    "allows-mesh-bcast",
    "no-ps",
    "mgmt-tx-by-reference",
    "non-bmi",
    "single-chan-info-per-channel",
    "peer-fixed-rate",
    "iram-recovery",
];

pub const ATH11K_FEATURES: &[&str] = &["multi-qrtr-id"];

// ============================================================================
// Operation Versions
// ============================================================================

pub const WMI_OP_VERSIONS: &[(u32, &str)] = &[
    (1, "main"),
    (2, "10.1"),
    (3, "10.2"),
    (4, "tlv"),
    (5, "10.2.4"),
    (6, "10.4"),
];

pub const HTT_OP_VERSIONS: &[(u32, &str)] = &[(1, "main"), (2, "10.1"), (3, "tlv"), (4, "10.4")];

/// Render an op version by name, falling back to the raw number.
pub fn op_version_name(table: &[(u32, &str)], value: u32) -> String {
    table
        .iter()
        .find(|(v, _)| *v == value)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| value.to_string())
}

/// Parse an op version given by name or number.
///
/// Numbers missing from the table are accepted as-is.
pub fn parse_op_version(table: &[(u32, &str)], field: &'static str, s: &str) -> Result<u32> {
    if let Some((value, _)) = table.iter().find(|(_, name)| *name == s) {
        return Ok(*value);
    }
    s.parse::<u32>()
        .map_err(|_| CodecError::InvalidValue {
            field,
            message: format!(
                "'{s}' (expected one of {})",
                table.iter().map(|(_, n)| *n).collect::<Vec<_>>().join(", ")
            ),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_lookup() {
        let p = FwProduct::Ath10k;
        assert_eq!(p.feature_names().len(), 23);
        assert_eq!(p.feature_index("wmi-10x").unwrap(), 1);
        assert_eq!(p.feature_index("9").unwrap(), 9);
        assert!(p.feature_index("warp-drive").is_err());
        assert_eq!(p.feature_index("40").unwrap(), 40);
        assert_eq!(p.feature_index("300").unwrap(), 300);
        assert_eq!(p.feature_index("bit-41").unwrap(), 41);
        assert!(p.feature_index("16000000").is_err());
        assert_eq!(p.feature_name(22), "iram-recovery");
        assert_eq!(p.feature_name(40), "bit-40");
    }

    #[test]
    fn test_feature_count() {
        let p = FwProduct::Ath10k;
        assert_eq!(p.feature_count(&BTreeSet::new()), 23);
        assert_eq!(p.feature_count(&[1, 40].into_iter().collect()), 41);
    }

    #[test]
    fn test_field_tables() {
        assert_eq!(
            FwProduct::Ath10k.field_for_id(7),
            Some(FwField::Image(ImageKind::CodeSwap))
        );
        assert_eq!(FwProduct::Ath11k.field_for_id(0), Some(FwField::Timestamp));
        assert!(!FwProduct::Ath11k.supports(FwField::Version));
        assert_eq!(FwProduct::Ath11k.field_for_id(5), None);
    }

    #[test]
    fn test_op_versions() {
        assert_eq!(parse_op_version(WMI_OP_VERSIONS, "wmi", "10.2.4").unwrap(), 5);
        assert_eq!(parse_op_version(HTT_OP_VERSIONS, "htt", "3").unwrap(), 3);
        assert!(parse_op_version(HTT_OP_VERSIONS, "htt", "10.2").is_err());
        assert_eq!(parse_op_version(WMI_OP_VERSIONS, "wmi", "7").unwrap(), 7);
        assert_eq!(op_version_name(WMI_OP_VERSIONS, 4), "tlv");
        assert_eq!(op_version_name(WMI_OP_VERSIONS, 99), "99");
    }

    #[test]
    fn test_image_kind_parse() {
        assert_eq!("code-swap".parse::<ImageKind>().unwrap(), ImageKind::CodeSwap);
        assert!("kernel".parse::<ImageKind>().is_err());
    }
}
