//! Field updates applied to a firmware container.
//!
//! `create` applies changes to an empty container, `modify` to a decoded
//! one; both then re-encode to a fresh buffer.

use std::collections::BTreeSet;

use tracing::debug;

use super::{FirmwareContainer, FwField, ImageKind};
use crate::error::{CodecError, Result};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FirmwareChanges {
    pub version: Option<String>,
    pub timestamp: Option<u32>,
    /// Replaces the whole feature set.
    pub features: Option<BTreeSet<usize>>,
    pub add_features: Vec<usize>,
    pub remove_features: Vec<usize>,
    pub wmi_op_version: Option<u32>,
    pub htt_op_version: Option<u32>,
    pub images: Vec<(ImageKind, Vec<u8>)>,
}

impl FirmwareChanges {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn check(container: &FirmwareContainer, field: FwField) -> Result<()> {
        if container.product.supports(field) {
            Ok(())
        } else {
            Err(CodecError::InvalidValue {
                field: "product",
                message: format!("{} firmware has no {field} element", container.product),
            })
        }
    }

    pub fn apply(self, container: &mut FirmwareContainer) -> Result<()> {
        if let Some(version) = self.version {
            Self::check(container, FwField::Version)?;
            debug!(version = %version, "Setting firmware version");
            container.version = Some(version);
        }

        if let Some(timestamp) = self.timestamp {
            Self::check(container, FwField::Timestamp)?;
            container.timestamp = Some(timestamp);
        }

        let touches_features = self.features.is_some()
            || !self.add_features.is_empty()
            || !self.remove_features.is_empty();
        if touches_features {
            Self::check(container, FwField::Features)?;
            // Removing from an absent set leaves the element absent.
            let base = self.features.or_else(|| container.features.take());
            if base.is_some() || !self.add_features.is_empty() {
                let mut features = base.unwrap_or_default();
                features.extend(self.add_features);
                for index in &self.remove_features {
                    features.remove(index);
                }
                container.features = Some(features);
            }
        }

        if let Some(v) = self.wmi_op_version {
            Self::check(container, FwField::WmiOpVersion)?;
            container.wmi_op_version = Some(v);
        }

        if let Some(v) = self.htt_op_version {
            Self::check(container, FwField::HttOpVersion)?;
            container.htt_op_version = Some(v);
        }

        for (kind, data) in self.images {
            Self::check(container, FwField::Image(kind))?;
            debug!(image = %kind, len = data.len(), "Setting image");
            container.images.insert(kind, data);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firmware::FwProduct;

    #[test]
    fn test_apply_to_empty() {
        let mut fw = FirmwareContainer::new(FwProduct::Ath10k);
        FirmwareChanges {
            version: Some("1.0".into()),
            add_features: vec![0, 9],
            images: vec![(ImageKind::Firmware, b"fw".to_vec())],
            ..Default::default()
        }
        .apply(&mut fw)
        .unwrap();

        assert_eq!(fw.version.as_deref(), Some("1.0"));
        assert_eq!(fw.features, Some([0, 9].into_iter().collect()));
        assert_eq!(fw.images[&ImageKind::Firmware], b"fw");
        assert_eq!(fw.timestamp, None);
    }

    #[test]
    fn test_add_and_remove_features() {
        let mut fw = FirmwareContainer::new(FwProduct::Ath10k);
        fw.features = Some([1, 2].into_iter().collect());

        FirmwareChanges {
            add_features: vec![5],
            remove_features: vec![1],
            ..Default::default()
        }
        .apply(&mut fw)
        .unwrap();

        assert_eq!(fw.features, Some([2, 5].into_iter().collect()));
    }

    #[test]
    fn test_remove_feature_keeps_absent_element_absent() {
        let mut fw = FirmwareContainer::new(FwProduct::Ath10k);
        FirmwareChanges {
            remove_features: vec![3],
            ..Default::default()
        }
        .apply(&mut fw)
        .unwrap();
        assert_eq!(fw.features, None);

        let bytes = fw.save(&crate::events::NullObserver).unwrap();
        assert_eq!(bytes.len(), 12);
    }

    #[test]
    fn test_replace_features() {
        let mut fw = FirmwareContainer::new(FwProduct::Ath10k);
        fw.features = Some([1, 2].into_iter().collect());

        FirmwareChanges {
            features: Some(BTreeSet::new()),
            ..Default::default()
        }
        .apply(&mut fw)
        .unwrap();

        assert_eq!(fw.features, Some(BTreeSet::new()));
    }

    #[test]
    fn test_rejects_foreign_image() {
        let mut fw = FirmwareContainer::new(FwProduct::Ath11k);
        let err = FirmwareChanges {
            images: vec![(ImageKind::Otp, vec![1])],
            ..Default::default()
        }
        .apply(&mut fw)
        .unwrap_err();
        assert!(matches!(err, CodecError::InvalidValue { .. }));
    }

    #[test]
    fn test_is_empty() {
        assert!(FirmwareChanges::default().is_empty());
        assert!(
            !FirmwareChanges {
                timestamp: Some(1),
                ..Default::default()
            }
            .is_empty()
        );
    }
}
