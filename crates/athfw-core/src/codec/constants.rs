//! Container format constants.
//!
//! Values match what the ath10k/ath11k drivers expect in `board-2.bin`
//! and `firmware-N.bin`.

// ============================================================================
// Container Formats
// ============================================================================

/// Fixed framing parameters of one container family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerFormat {
    /// ASCII signature, written without its NUL terminator.
    pub signature: &'static [u8],
    /// Byte used to pad the signature and every element to 4 bytes.
    pub padding: u8,
    /// Largest container the tools accept or produce.
    pub max_len: usize,
}

impl ContainerFormat {
    pub fn signature_str(&self) -> String {
        String::from_utf8_lossy(self.signature).into_owned()
    }
}

pub const PADDING_MAGIC_ATH: u8 = 0x6D;
pub const PADDING_MAGIC_QCOM: u8 = 0x77;

pub const TWO_MB: usize = 2_000_000;
pub const TWENTY_MB: usize = 20_000_000;

pub const ATH10K_BOARD: ContainerFormat = ContainerFormat {
    signature: b"QCA-ATH10K-BOARD",
    padding: PADDING_MAGIC_ATH,
    max_len: TWO_MB,
};

pub const ATH11K_BOARD: ContainerFormat = ContainerFormat {
    signature: b"QCA-ATH11K-BOARD",
    padding: PADDING_MAGIC_ATH,
    max_len: TWENTY_MB,
};

pub const ATH10K_FIRMWARE: ContainerFormat = ContainerFormat {
    signature: b"QCA-ATH10K",
    padding: PADDING_MAGIC_ATH,
    max_len: TWO_MB,
};

pub const ATH11K_FIRMWARE: ContainerFormat = ContainerFormat {
    signature: b"QCOM-ATH11K-FW",
    padding: PADDING_MAGIC_QCOM,
    max_len: TWENTY_MB,
};

// ============================================================================
// Board Container Element Types
// ============================================================================

/// Outer element: one board entry
pub const BD_IE_BOARD: i32 = 0;
/// Outer element: extended board entry (ath10k)
pub const BD_IE_BOARD_EXT: i32 = 1;
/// Outer element: regulatory database entry (ath11k)
pub const BD_IE_REGDB: i32 = 1;

/// Inner element: one alias name
pub const BD_IE_NAME: i32 = 0;
/// Inner element: the payload
pub const BD_IE_DATA: i32 = 1;

// ============================================================================
// ath10k Firmware Element Types
// ============================================================================

pub const ATH10K_FW_IE_FW_VERSION: i32 = 0;
pub const ATH10K_FW_IE_TIMESTAMP: i32 = 1;
pub const ATH10K_FW_IE_FEATURES: i32 = 2;
pub const ATH10K_FW_IE_FW_IMAGE: i32 = 3;
pub const ATH10K_FW_IE_OTP_IMAGE: i32 = 4;
pub const ATH10K_FW_IE_WMI_OP_VERSION: i32 = 5;
pub const ATH10K_FW_IE_HTT_OP_VERSION: i32 = 6;
pub const ATH10K_FW_IE_FW_CODE_SWAP_IMAGE: i32 = 7;

// ============================================================================
// ath11k Firmware Element Types
// ============================================================================

pub const ATH11K_FW_IE_TIMESTAMP: i32 = 0;
pub const ATH11K_FW_IE_FEATURES: i32 = 1;
pub const ATH11K_FW_IE_AMSS_IMAGE: i32 = 2;
pub const ATH11K_FW_IE_M3_IMAGE: i32 = 3;
pub const ATH11K_FW_IE_AMSS_DUALMAC_IMAGE: i32 = 4;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_board_signatures_are_16_bytes() {
        assert_eq!(ATH10K_BOARD.signature.len(), 16);
        assert_eq!(ATH11K_BOARD.signature.len(), 16);
    }

    #[test]
    fn test_signature_str() {
        assert_eq!(ATH11K_FIRMWARE.signature_str(), "QCOM-ATH11K-FW");
    }
}
