use proptest::prelude::*;
use tambaqui::core::quality_flags::{
    self, decode, decode_f64, QualityFlag, QualityFlags, LEGACY_FILL_SENTINEL, REJECT, REQUIRED,
};

fn flag_subset() -> impl Strategy<Value = QualityFlags> {
    let all: Vec<QualityFlag> = QualityFlag::all().collect();
    prop::collection::vec(any::<bool>(), all.len()).prop_map(move |mask| {
        all.iter()
            .zip(mask)
            .filter_map(|(&flag, on)| if on { Some(flag) } else { None })
            .collect()
    })
}

#[test]
fn test_gate_sets() {
    assert_eq!(REQUIRED.names(), vec!["INLAND_WATER"]);
    assert_eq!(REJECT.len(), 11);
    assert!(!REJECT.contains(QualityFlag::Water));
    assert!(REJECT.contains(QualityFlag::CloudMargin));
}

#[test]
fn test_sentinel_read_from_double() {
    let decoded = decode_f64(LEGACY_FILL_SENTINEL as f64).expect("sentinel is a valid word");
    assert_eq!(decoded, None);
    assert_eq!(quality_flags::quality(decoded), 0);
}

proptest! {
    #[test]
    fn prop_quality_gate_matches_set_rule(flags in flag_subset()) {
        let decoded = decode(flags.bits());
        prop_assert_eq!(decoded, Some(flags));

        let expected = flags.contains(QualityFlag::InlandWater) && !flags.intersects(REJECT);
        prop_assert_eq!(quality_flags::quality(decoded) == 1, expected);
    }

    #[test]
    fn prop_decoding_is_pure(mask in 0u64..(1u64 << 56)) {
        let first = decode(mask);
        let second = decode(mask);
        prop_assert_eq!(first, second);
        if let Some(flags) = first {
            prop_assert_eq!(flags.bits(), mask & QualityFlags::DEFINED);
        } else {
            prop_assert_eq!(mask, LEGACY_FILL_SENTINEL);
        }
    }

    #[test]
    fn prop_double_round_trip_is_exact(mask in 0u64..(1u64 << 53)) {
        prop_assert_eq!(decode_f64(mask as f64).unwrap(), decode(mask));
    }
}
