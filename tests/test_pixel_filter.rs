mod common;

use approx::assert_relative_eq;
use common::*;
use proptest::prelude::*;
use tambaqui::core::pixel_filter::{FilterConfig, FilterStage, PixelFilterPipeline};
use tambaqui::{columns, Band, SpmModel};

#[test]
fn test_ten_pixel_fixture_end_to_end() {
    init_logging();

    let config = FilterConfig {
        nir_min: Some(0.0),
        nir_max: Some(0.2),
        max_aot: Some(0.6),
        glint_threshold: 20.0,
        ..FilterConfig::default()
    };
    let pipeline = PixelFilterPipeline::with_config(config);
    let outcome = pipeline
        .run(table_of(ten_pixel_fixture()), None)
        .expect("Fixture should filter");

    let counts: Vec<(FilterStage, usize)> = outcome.stages.iter().map(|s| (s.stage, s.rows)).collect();
    println!("Stage counts: {:?}", counts);
    assert_eq!(
        counts,
        vec![
            (FilterStage::Input, 10),
            (FilterStage::Saturation, 9),
            (FilterStage::Normalization, 9),
            (FilterStage::NirMin, 8),
            (FilterStage::NirMax, 7),
            (FilterStage::CamsProxy, 7),
            (FilterStage::QualityFlags, 6),
            (FilterStage::MaxAot, 5),
            (FilterStage::MissingReflectance, 4),
            (FilterStage::SpectralShape, 3),
            (FilterStage::Glint, 2),
            (FilterStage::WaterIndices, 2),
            (FilterStage::Reindex, 2),
            (FilterStage::Spm, 2),
        ]
    );

    assert_eq!(outcome.absolute_valid_pixels, 10);
    assert_eq!(outcome.source_rows, vec![0, 9]);
    assert_relative_eq!(outcome.valid_percentage(), 20.0);

    let table = &outcome.table;
    assert_eq!(table.row_ids(), &[0, 1]);
    assert_eq!(table.value(0, columns::ABSVLDPX).unwrap(), 10.0);
    assert_eq!(table.value(1, columns::QUALITY).unwrap(), 1.0);
    assert_relative_eq!(table.value(0, columns::GLINT).unwrap(), 60.0, epsilon = 1e-9);
    assert_relative_eq!(table.value(0, columns::NDWI).unwrap(), 0.6, epsilon = 1e-12);
    assert_eq!(table.value(1, Band::RED.column()).unwrap(), 0.07);

    let model = SpmModel::default();
    assert_eq!(table.value(0, columns::SPM).unwrap(), model.estimate(0.06, 0.015));
    assert_eq!(table.value(1, columns::SPM).unwrap(), model.estimate(0.07, 0.015));

    let flags = table.flags().expect("flags decoded");
    assert_eq!(flags[0].map(|f| f.to_string()), Some("WATER|INLAND_WATER".to_string()));
}

#[test]
fn test_disabled_thresholds_keep_nir_outliers() {
    let config = FilterConfig {
        nir_min: None,
        nir_max: None,
        max_aot: None,
        ..FilterConfig::default()
    };
    let outcome = PixelFilterPipeline::with_config(config)
        .run(table_of(ten_pixel_fixture()), None)
        .unwrap();
    // the NIR and AOT rows now survive; 0.25 NIR still passes NDWI
    assert_eq!(outcome.source_rows, vec![0, 2, 5, 9]);
}

#[test]
fn test_cams_reference_applies_to_whole_image() {
    let outcome = PixelFilterPipeline::new()
        .run(table_of(ten_pixel_fixture()), Some(0.1))
        .unwrap();
    // T865 of the surviving pixels is exactly 0.1, not above it
    assert!(outcome.table.is_empty());
    assert_eq!(outcome.valid_percentage(), 0.0);
}

fn arbitrary_pixel() -> impl Strategy<Value = Pixel> {
    (
        prop_oneof![Just(0.02), Just(1.0000184)],
        -0.05f64..0.3,
        0.0f64..1.0,
        prop_oneof![Just(34.0), Just(42.0), Just(2.0), Just(4294967294.0)],
        -0.01f64..0.08,
        0.0f64..0.08,
        0.0f64..60.0,
        0.0f64..0.1,
    )
        .prop_map(|(oa01, nir, t865, wqsf, oa09, oa12, zenith, oa21)| {
            let mut p = with(clean_pixel(), "Oa01_reflectance:float", oa01);
            p = with(p, "Oa17_reflectance:float", nir);
            p = with(p, "T865:float", t865);
            p = with(p, "WQSF_lsb:double", wqsf);
            p = with(p, "Oa09_reflectance:float", oa09);
            p = with(p, "Oa12_reflectance:float", oa12);
            p = with(p, "OZA:float", zenith);
            with(p, "Oa21_reflectance:float", oa21)
        })
}

proptest! {
    #[test]
    fn prop_stages_never_add_rows(rows in prop::collection::vec(arbitrary_pixel(), 0..40)) {
        let n = rows.len();
        let outcome = PixelFilterPipeline::new().run(table_of(rows), None).unwrap();

        prop_assert_eq!(outcome.absolute_valid_pixels, n);
        prop_assert_eq!(outcome.stages[0].rows, n);
        for pair in outcome.stages.windows(2) {
            prop_assert!(pair[1].rows <= pair[0].rows);
        }
        prop_assert_eq!(outcome.stages.last().map(|s| s.rows), Some(outcome.table.len()));
        prop_assert_eq!(outcome.source_rows.len(), outcome.table.len());
        prop_assert!(outcome.source_rows.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn prop_survivors_satisfy_every_rule(rows in prop::collection::vec(arbitrary_pixel(), 1..40)) {
        let outcome = PixelFilterPipeline::new().run(table_of(rows), None).unwrap();
        let table = &outcome.table;
        for i in 0..table.len() {
            let nir = table.value(i, Band::NIR.column()).unwrap();
            prop_assert!((0.0..=0.2).contains(&nir));
            prop_assert!(table.value(i, columns::T865).unwrap() < 0.6);
            prop_assert!(table.value(i, columns::GLINT).unwrap() > 20.0);
            prop_assert_eq!(table.value(i, columns::QUALITY).unwrap(), 1.0);
            prop_assert!(
                table.value(i, Band::Oa11.column()).unwrap() > table.value(i, Band::Oa12.column()).unwrap()
            );
        }
    }
}
