//! WQSF quality flag decoding for OLCI Level-2 WFR pixels.
//!
//! The packed flag word arrives from the extraction as a double. It is turned
//! into an exact `u64` first, then inspected bit by bit against the product's
//! flag table.

use crate::types::{WqError, WqResult};

/// Named WQSF flags (least significant word)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QualityFlag {
    Invalid,
    Water,
    Land,
    Cloud,
    SnowIce,
    InlandWater,
    Tidal,
    Cosmetic,
    Suspect,
    Hisolzen,
    Saturated,
    Meglint,
    Highglint,
    Whitecaps,
    Adjac,
    WvFail,
    ParFail,
    AcFail,
    Oc4meFail,
    OcnnFail,
    KdmFail,
    CloudAmbiguous,
    CloudMargin,
    BpacOn,
    WhiteScatt,
    Lowrw,
    Highrw,
    AnnotAngstrom,
    AnnotAeroB,
    AnnotAbsoD,
    AnnotAclim,
    AnnotAbsoa,
    AnnotMixr1,
    AnnotDrout,
    AnnotTau06,
    RwnegO1,
    RwnegO2,
    RwnegO3,
    RwnegO4,
    RwnegO5,
    RwnegO6,
    RwnegO7,
    RwnegO8,
    RwnegO9,
    RwnegO10,
    RwnegO11,
    RwnegO12,
    RwnegO16,
    RwnegO17,
    RwnegO18,
    RwnegO21,
}

/// Bit position -> flag. Positions 20, 22 and 29-31 are reserved.
pub const FLAG_TABLE: [(u32, QualityFlag); 51] = [
    (0, QualityFlag::Invalid),
    (1, QualityFlag::Water),
    (2, QualityFlag::Land),
    (3, QualityFlag::Cloud),
    (4, QualityFlag::SnowIce),
    (5, QualityFlag::InlandWater),
    (6, QualityFlag::Tidal),
    (7, QualityFlag::Cosmetic),
    (8, QualityFlag::Suspect),
    (9, QualityFlag::Hisolzen),
    (10, QualityFlag::Saturated),
    (11, QualityFlag::Meglint),
    (12, QualityFlag::Highglint),
    (13, QualityFlag::Whitecaps),
    (14, QualityFlag::Adjac),
    (15, QualityFlag::WvFail),
    (16, QualityFlag::ParFail),
    (17, QualityFlag::AcFail),
    (18, QualityFlag::Oc4meFail),
    (19, QualityFlag::OcnnFail),
    (21, QualityFlag::KdmFail),
    (23, QualityFlag::CloudAmbiguous),
    (24, QualityFlag::CloudMargin),
    (25, QualityFlag::BpacOn),
    (26, QualityFlag::WhiteScatt),
    (27, QualityFlag::Lowrw),
    (28, QualityFlag::Highrw),
    (32, QualityFlag::AnnotAngstrom),
    (33, QualityFlag::AnnotAeroB),
    (34, QualityFlag::AnnotAbsoD),
    (35, QualityFlag::AnnotAclim),
    (36, QualityFlag::AnnotAbsoa),
    (37, QualityFlag::AnnotMixr1),
    (38, QualityFlag::AnnotDrout),
    (39, QualityFlag::AnnotTau06),
    (40, QualityFlag::RwnegO1),
    (41, QualityFlag::RwnegO2),
    (42, QualityFlag::RwnegO3),
    (43, QualityFlag::RwnegO4),
    (44, QualityFlag::RwnegO5),
    (45, QualityFlag::RwnegO6),
    (46, QualityFlag::RwnegO7),
    (47, QualityFlag::RwnegO8),
    (48, QualityFlag::RwnegO9),
    (49, QualityFlag::RwnegO10),
    (50, QualityFlag::RwnegO11),
    (51, QualityFlag::RwnegO12),
    (52, QualityFlag::RwnegO16),
    (53, QualityFlag::RwnegO17),
    (54, QualityFlag::RwnegO18),
    (55, QualityFlag::RwnegO21),
];

/// Widest flag word the product defines
pub const FLAG_WORD_BITS: u32 = 56;

/// Legacy fill value that decodes to "no flags" instead of a flag list.
/// Its binary form is 31 ones followed by a zero.
pub const LEGACY_FILL_SENTINEL: u64 = 0xFFFF_FFFE;

impl QualityFlag {
    /// Bit position of this flag in the WQSF word
    pub const fn bit(self) -> u32 {
        match self {
            QualityFlag::Invalid => 0,
            QualityFlag::Water => 1,
            QualityFlag::Land => 2,
            QualityFlag::Cloud => 3,
            QualityFlag::SnowIce => 4,
            QualityFlag::InlandWater => 5,
            QualityFlag::Tidal => 6,
            QualityFlag::Cosmetic => 7,
            QualityFlag::Suspect => 8,
            QualityFlag::Hisolzen => 9,
            QualityFlag::Saturated => 10,
            QualityFlag::Meglint => 11,
            QualityFlag::Highglint => 12,
            QualityFlag::Whitecaps => 13,
            QualityFlag::Adjac => 14,
            QualityFlag::WvFail => 15,
            QualityFlag::ParFail => 16,
            QualityFlag::AcFail => 17,
            QualityFlag::Oc4meFail => 18,
            QualityFlag::OcnnFail => 19,
            QualityFlag::KdmFail => 21,
            QualityFlag::CloudAmbiguous => 23,
            QualityFlag::CloudMargin => 24,
            QualityFlag::BpacOn => 25,
            QualityFlag::WhiteScatt => 26,
            QualityFlag::Lowrw => 27,
            QualityFlag::Highrw => 28,
            QualityFlag::AnnotAngstrom => 32,
            QualityFlag::AnnotAeroB => 33,
            QualityFlag::AnnotAbsoD => 34,
            QualityFlag::AnnotAclim => 35,
            QualityFlag::AnnotAbsoa => 36,
            QualityFlag::AnnotMixr1 => 37,
            QualityFlag::AnnotDrout => 38,
            QualityFlag::AnnotTau06 => 39,
            QualityFlag::RwnegO1 => 40,
            QualityFlag::RwnegO2 => 41,
            QualityFlag::RwnegO3 => 42,
            QualityFlag::RwnegO4 => 43,
            QualityFlag::RwnegO5 => 44,
            QualityFlag::RwnegO6 => 45,
            QualityFlag::RwnegO7 => 46,
            QualityFlag::RwnegO8 => 47,
            QualityFlag::RwnegO9 => 48,
            QualityFlag::RwnegO10 => 49,
            QualityFlag::RwnegO11 => 50,
            QualityFlag::RwnegO12 => 51,
            QualityFlag::RwnegO16 => 52,
            QualityFlag::RwnegO17 => 53,
            QualityFlag::RwnegO18 => 54,
            QualityFlag::RwnegO21 => 55,
        }
    }

    /// Product name of the flag
    pub fn name(self) -> &'static str {
        match self {
            QualityFlag::Invalid => "INVALID",
            QualityFlag::Water => "WATER",
            QualityFlag::Land => "LAND",
            QualityFlag::Cloud => "CLOUD",
            QualityFlag::SnowIce => "SNOW_ICE",
            QualityFlag::InlandWater => "INLAND_WATER",
            QualityFlag::Tidal => "TIDAL",
            QualityFlag::Cosmetic => "COSMETIC",
            QualityFlag::Suspect => "SUSPECT",
            QualityFlag::Hisolzen => "HISOLZEN",
            QualityFlag::Saturated => "SATURATED",
            QualityFlag::Meglint => "MEGLINT",
            QualityFlag::Highglint => "HIGHGLINT",
            QualityFlag::Whitecaps => "WHITECAPS",
            QualityFlag::Adjac => "ADJAC",
            QualityFlag::WvFail => "WV_FAIL",
            QualityFlag::ParFail => "PAR_FAIL",
            QualityFlag::AcFail => "AC_FAIL",
            QualityFlag::Oc4meFail => "OC4ME_FAIL",
            QualityFlag::OcnnFail => "OCNN_FAIL",
            QualityFlag::KdmFail => "KDM_FAIL",
            QualityFlag::CloudAmbiguous => "CLOUD_AMBIGUOUS",
            QualityFlag::CloudMargin => "CLOUD_MARGIN",
            QualityFlag::BpacOn => "BPAC_ON",
            QualityFlag::WhiteScatt => "WHITE_SCATT",
            QualityFlag::Lowrw => "LOWRW",
            QualityFlag::Highrw => "HIGHRW",
            QualityFlag::AnnotAngstrom => "ANNOT_ANGSTROM",
            QualityFlag::AnnotAeroB => "ANNOT_AERO_B",
            QualityFlag::AnnotAbsoD => "ANNOT_ABSO_D",
            QualityFlag::AnnotAclim => "ANNOT_ACLIM",
            QualityFlag::AnnotAbsoa => "ANNOT_ABSOA",
            QualityFlag::AnnotMixr1 => "ANNOT_MIXR1",
            QualityFlag::AnnotDrout => "ANNOT_DROUT",
            QualityFlag::AnnotTau06 => "ANNOT_TAU06",
            QualityFlag::RwnegO1 => "RWNEG_O1",
            QualityFlag::RwnegO2 => "RWNEG_O2",
            QualityFlag::RwnegO3 => "RWNEG_O3",
            QualityFlag::RwnegO4 => "RWNEG_O4",
            QualityFlag::RwnegO5 => "RWNEG_O5",
            QualityFlag::RwnegO6 => "RWNEG_O6",
            QualityFlag::RwnegO7 => "RWNEG_O7",
            QualityFlag::RwnegO8 => "RWNEG_O8",
            QualityFlag::RwnegO9 => "RWNEG_O9",
            QualityFlag::RwnegO10 => "RWNEG_O10",
            QualityFlag::RwnegO11 => "RWNEG_O11",
            QualityFlag::RwnegO12 => "RWNEG_O12",
            QualityFlag::RwnegO16 => "RWNEG_O16",
            QualityFlag::RwnegO17 => "RWNEG_O17",
            QualityFlag::RwnegO18 => "RWNEG_O18",
            QualityFlag::RwnegO21 => "RWNEG_O21",
        }
    }

    /// Every defined flag, in bit order
    pub fn all() -> impl Iterator<Item = QualityFlag> {
        FLAG_TABLE.iter().map(|&(_, flag)| flag)
    }
}

impl std::fmt::Display for QualityFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

const fn defined_bits() -> u64 {
    let mut mask = 0u64;
    let mut i = 0;
    while i < FLAG_TABLE.len() {
        mask |= 1u64 << FLAG_TABLE[i].0;
        i += 1;
    }
    mask
}

/// Set of decoded flags for one pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct QualityFlags(u64);

impl QualityFlags {
    /// Bits that carry a named flag
    pub const DEFINED: u64 = defined_bits();

    pub const fn empty() -> Self {
        QualityFlags(0)
    }

    pub const fn from_flags(flags: &[QualityFlag]) -> Self {
        let mut bits = 0u64;
        let mut i = 0;
        while i < flags.len() {
            bits |= 1u64 << flags[i].bit();
            i += 1;
        }
        QualityFlags(bits)
    }

    /// Keep only the bits that name a flag; reserved positions are dropped
    pub const fn from_bits_truncate(bits: u64) -> Self {
        QualityFlags(bits & Self::DEFINED)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    pub const fn contains(self, flag: QualityFlag) -> bool {
        self.0 & (1u64 << flag.bit()) != 0
    }

    pub const fn contains_all(self, other: QualityFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: QualityFlags) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, flag: QualityFlag) {
        self.0 |= 1u64 << flag.bit();
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Flags present, in bit order
    pub fn iter(self) -> impl Iterator<Item = QualityFlag> {
        QualityFlag::all().filter(move |f| self.contains(*f))
    }

    pub fn names(self) -> Vec<&'static str> {
        self.iter().map(QualityFlag::name).collect()
    }
}

impl FromIterator<QualityFlag> for QualityFlags {
    fn from_iter<I: IntoIterator<Item = QualityFlag>>(iter: I) -> Self {
        let mut flags = QualityFlags::empty();
        for flag in iter {
            flags.insert(flag);
        }
        flags
    }
}

impl std::fmt::Display for QualityFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.names().join("|"))
    }
}

/// Flags a pixel must carry to pass
pub const REQUIRED: QualityFlags = QualityFlags::from_flags(&[QualityFlag::InlandWater]);

/// Flags that reject a pixel
pub const REJECT: QualityFlags = QualityFlags::from_flags(&[
    QualityFlag::Invalid,
    QualityFlag::Cloud,
    QualityFlag::CloudAmbiguous,
    QualityFlag::CloudMargin,
    QualityFlag::SnowIce,
    QualityFlag::Suspect,
    QualityFlag::Saturated,
    QualityFlag::AcFail,
    QualityFlag::Meglint,
    QualityFlag::Highglint,
    QualityFlag::Lowrw,
]);

/// Convert a bitmask stored as a double into the exact integer flag word.
///
/// The value must be a finite, non-negative integer that fits in the
/// 56-bit flag word.
pub fn bitmask_from_f64(value: f64) -> WqResult<u64> {
    let limit = (1u64 << FLAG_WORD_BITS) as f64;
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value >= limit {
        return Err(WqError::Schema(format!(
            "Quality bitmask {} is not an integer in [0, 2^{})",
            value, FLAG_WORD_BITS
        )));
    }
    Ok(value as u64)
}

/// Decode a flag word. `None` is the legacy "false" decode of the fill sentinel.
pub fn decode(mask: u64) -> Option<QualityFlags> {
    if mask == LEGACY_FILL_SENTINEL {
        return None;
    }
    Some(QualityFlags::from_bits_truncate(mask))
}

/// Validate and decode a bitmask read as a double
pub fn decode_f64(value: f64) -> WqResult<Option<QualityFlags>> {
    Ok(decode(bitmask_from_f64(value)?))
}

/// 1 when every required flag is set and no rejecting flag is, otherwise 0
pub fn quality(flags: Option<QualityFlags>) -> u8 {
    match flags {
        Some(f) if f.contains_all(REQUIRED) && !f.intersects(REJECT) => 1,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_and_bit_agree() {
        for &(bit, flag) in FLAG_TABLE.iter() {
            assert_eq!(flag.bit(), bit, "{}", flag);
        }
        assert_eq!(QualityFlags::DEFINED.count_ones(), 51);
        for reserved in [20u32, 22, 29, 30, 31] {
            assert_eq!(QualityFlags::DEFINED & (1 << reserved), 0);
        }
    }

    #[test]
    fn test_decode_inland_water_pixel() {
        // WATER + INLAND_WATER
        let flags = decode((1 << 1) | (1 << 5)).unwrap();
        assert_eq!(flags.names(), vec!["WATER", "INLAND_WATER"]);
        assert_eq!(quality(Some(flags)), 1);
    }

    #[test]
    fn test_reject_flag_fails_quality() {
        let flags = decode((1 << 5) | (1 << 3)).unwrap();
        assert!(flags.contains(QualityFlag::Cloud));
        assert_eq!(quality(Some(flags)), 0);

        let flags = decode((1 << 5) | (1 << 27)).unwrap();
        assert!(flags.contains(QualityFlag::Lowrw));
        assert_eq!(quality(Some(flags)), 0);
    }

    #[test]
    fn test_missing_inland_water_fails_quality() {
        assert_eq!(quality(decode(1 << 1)), 0);
        assert_eq!(quality(decode(0)), 0);
    }

    #[test]
    fn test_sentinel_is_false_decode() {
        assert_eq!(format!("{:b}", LEGACY_FILL_SENTINEL), "11111111111111111111111111111110");
        assert_eq!(decode(LEGACY_FILL_SENTINEL), None);
        assert_eq!(quality(None), 0);
        // one bit more is an ordinary word
        assert!(decode(LEGACY_FILL_SENTINEL | 1).is_some());
    }

    #[test]
    fn test_high_bits_decode() {
        let flags = decode(1u64 << 55).unwrap();
        assert_eq!(flags.names(), vec!["RWNEG_O21"]);
        let flags = decode((1u64 << 32) | (1u64 << 20)).unwrap();
        assert_eq!(flags.names(), vec!["ANNOT_ANGSTROM"]);
    }

    #[test]
    fn test_bitmask_conversion_is_validated() {
        assert_eq!(bitmask_from_f64(34.0).unwrap(), 34);
        assert_eq!(bitmask_from_f64(36028797018963968.0).unwrap(), 1u64 << 55);
        assert!(bitmask_from_f64(-1.0).is_err());
        assert!(bitmask_from_f64(1.5).is_err());
        assert!(bitmask_from_f64(f64::NAN).is_err());
        assert!(bitmask_from_f64(72057594037927936.0).is_err());
    }

    #[test]
    fn test_display_joins_names() {
        let flags: QualityFlags = [QualityFlag::InlandWater, QualityFlag::Water].into_iter().collect();
        assert_eq!(flags.to_string(), "WATER|INLAND_WATER");
        assert_eq!(flags.len(), 2);
    }
}
