//! End-to-end renders through the public API.

mod common;

use proofsheet_core::decode::decode_source;
use proofsheet_core::encode::encode;
use proofsheet_core::{
    render, BudgetStatus, ColorSpace, EditParameters, ExportSettings, MetadataPolicy, MetadataSet,
    MetadataTag, OutputFormat, TagNamespace, TagValue,
};

use common::{camera_jpeg, camera_metadata, textured};

#[test]
fn pixel_budget_keeps_aspect_and_tags() {
    let source = camera_jpeg(4000, 3000);
    let settings = ExportSettings {
        max_pixels: Some(2_000_000),
        quality: 90,
        ..Default::default()
    };

    let result = render(&source, &EditParameters::default(), &settings).unwrap();

    assert!(u64::from(result.width) * u64::from(result.height) <= 2_000_000);
    assert_eq!((result.width, result.height), (1633, 1224));
    let aspect = f64::from(result.width) / f64::from(result.height);
    assert!((aspect - 4.0 / 3.0).abs() < 0.01, "aspect {aspect}");
    assert_eq!(result.quality, Some(90));
    assert_eq!(result.budget, BudgetStatus::Unconstrained);

    let decoded = decode_source(&result.bytes).unwrap();
    assert_eq!(decoded.image.dimensions(), (1633, 1224));
    assert_eq!(
        decoded.metadata.get(&MetadataTag::MAKE).and_then(|v| v.as_text()),
        Some("Proofsheet Camera".to_string())
    );
    assert!(decoded.metadata.contains(&MetadataTag::GPS_LATITUDE));
}

#[test]
fn byte_budget_is_met_or_reported() {
    let source = camera_jpeg(4000, 3000);
    let settings = ExportSettings {
        max_pixels: Some(2_000_000),
        max_file_size_bytes: Some(500_000),
        quality: 90,
        ..Default::default()
    };

    let result = render(&source, &EditParameters::default(), &settings).unwrap();

    assert!(u64::from(result.width) * u64::from(result.height) <= 2_000_000);
    match result.budget {
        BudgetStatus::Met => {
            assert!(result.byte_len() <= 500_000);
            let q = result.quality.unwrap();
            if q < 90 && result.width == 1633 {
                let decoded = decode_source(&source).unwrap();
                let resized = proofsheet_core::resolve::fit_pixel_budget(decoded.image, 2_000_000).unwrap();
                let next = encode(&resized, &result.metadata, OutputFormat::Jpeg, q + 1).unwrap();
                assert!(next.len() as u64 > 500_000, "quality {} also fits", q + 1);
            }
        }
        BudgetStatus::Unattainable { budget, achieved } => {
            assert_eq!(budget, 500_000);
            assert_eq!(achieved, result.byte_len());
        }
        BudgetStatus::Unconstrained => panic!("a budget was requested"),
    }
}

#[test]
fn byte_budget_at_full_resolution_picks_tightest_quality() {
    let source = camera_jpeg(4000, 3000);
    let settings = ExportSettings {
        max_file_size_bytes: Some(500_000),
        quality: 90,
        ..Default::default()
    };

    let result = render(&source, &EditParameters::default(), &settings).unwrap();

    // Quality 1 of this image is far below 500 kB, so no shrinking is needed.
    assert_eq!(result.budget, BudgetStatus::Met);
    assert_eq!((result.width, result.height), (4000, 3000));
    assert!(result.byte_len() <= 500_000);

    let q = result.quality.unwrap();
    assert!(q < 90, "quality {q}");
    let decoded = decode_source(&source).unwrap();
    let next = encode(&decoded.image, &result.metadata, OutputFormat::Jpeg, q + 1).unwrap();
    assert!(next.len() as u64 > 500_000, "quality {} also fits", q + 1);
}

#[test]
fn lossless_tiny_budget_is_bounded_and_unattainable() {
    let source = encode(&textured(300, 200, 255), &MetadataSet::new(), OutputFormat::Png, 90).unwrap();
    let settings = ExportSettings {
        format: OutputFormat::Png,
        max_file_size_bytes: Some(1_000),
        ..Default::default()
    };

    let result = render(&source, &EditParameters::default(), &settings).unwrap();

    assert!(matches!(
        result.budget,
        BudgetStatus::Unattainable { budget: 1_000, .. }
    ));
    assert!(!result.budget_met());
    assert_eq!(result.quality, None);
    assert_eq!(result.content_type, "image/png");
    // Ten rounds at 0.9 bound the shrink at 300 * 0.9^10 = 104.6
    assert!(result.width < 300);
    assert!(result.width >= 104, "width {}", result.width);
}

#[test]
fn strip_gps_keeps_make_and_drops_location() {
    let source = camera_jpeg(320, 240);
    let settings = ExportSettings {
        metadata_policy: MetadataPolicy::StripGps,
        ..Default::default()
    };

    let result = render(&source, &EditParameters::default(), &settings).unwrap();
    assert!(result.metadata.contains(&MetadataTag::MAKE));
    assert_eq!(result.metadata.namespace(TagNamespace::Gps).count(), 0);

    let decoded = decode_source(&result.bytes).unwrap();
    assert!(decoded.metadata.contains(&MetadataTag::MAKE));
    assert!(decoded.metadata.contains(&MetadataTag::COPYRIGHT));
    assert_eq!(decoded.metadata.namespace(TagNamespace::Gps).count(), 0);
}

#[test]
fn retained_metadata_is_a_subset_of_the_source() {
    let source = camera_jpeg(64, 48);
    let original = decode_source(&source).unwrap().metadata;
    assert!(!original.is_empty());
    for policy in [MetadataPolicy::All, MetadataPolicy::StripGps, MetadataPolicy::StripAll] {
        for format in [OutputFormat::Jpeg, OutputFormat::Png, OutputFormat::Tiff] {
            let settings = ExportSettings {
                metadata_policy: policy,
                format,
                ..Default::default()
            };
            let result = render(&source, &EditParameters::default(), &settings).unwrap();
            assert!(
                result.metadata.is_subset_of(&original),
                "{policy} {format}"
            );
        }
    }
}

#[test]
fn tiff_export_carries_descriptive_tags_only() {
    let settings = ExportSettings {
        format: OutputFormat::Tiff,
        ..Default::default()
    };
    let result = render(&camera_jpeg(64, 48), &EditParameters::default(), &settings).unwrap();

    assert_eq!(result.content_type, "image/tiff");
    assert!(result.metadata.contains(&MetadataTag::MAKE));
    assert_eq!(result.metadata.namespace(TagNamespace::Gps).count(), 0);

    let decoded = decode_source(&result.bytes).unwrap();
    assert_eq!(decoded.image.dimensions(), (64, 48));
    assert!(decoded.metadata.contains(&MetadataTag::MODEL));
}

#[test]
fn tiff_export_skips_non_ascii_text() {
    let mut metadata = camera_metadata();
    metadata.insert(MetadataTag::ARTIST, TagValue::ascii("Jürgen Müller"));
    let source = encode(&textured(64, 48, 24), &metadata, OutputFormat::Jpeg, 95).unwrap();
    let settings = ExportSettings {
        format: OutputFormat::Tiff,
        ..Default::default()
    };

    let result = render(&source, &EditParameters::default(), &settings).unwrap();

    assert!(result.metadata.contains(&MetadataTag::MAKE));
    assert!(!result.metadata.contains(&MetadataTag::ARTIST));
    let decoded = decode_source(&result.bytes).unwrap();
    assert!(decoded.metadata.contains(&MetadataTag::MAKE));
    assert!(!decoded.metadata.contains(&MetadataTag::ARTIST));
}

#[test]
fn converted_export_drops_source_color_tags() {
    let mut metadata = camera_metadata();
    metadata.insert(MetadataTag::INTEROP_INDEX, TagValue::ascii("R03"));
    let source = encode(&textured(32, 24, 8), &metadata, OutputFormat::Jpeg, 95).unwrap();
    assert_eq!(decode_source(&source).unwrap().image.color_space(), ColorSpace::AdobeRgb);

    let to_srgb = render(&source, &EditParameters::default(), &ExportSettings::default()).unwrap();
    assert_eq!(to_srgb.color_space, ColorSpace::Srgb);
    assert!(!to_srgb.metadata.contains(&MetadataTag::INTEROP_INDEX));
    assert!(to_srgb.metadata.contains(&MetadataTag::MAKE));
    let decoded = decode_source(&to_srgb.bytes).unwrap();
    assert_eq!(decoded.image.color_space(), ColorSpace::Srgb);

    let settings = ExportSettings {
        color_space: ColorSpace::AdobeRgb,
        ..Default::default()
    };
    let kept = render(&source, &EditParameters::default(), &settings).unwrap();
    assert!(kept.metadata.contains(&MetadataTag::INTEROP_INDEX));
    let decoded = decode_source(&kept.bytes).unwrap();
    assert_eq!(decoded.image.color_space(), ColorSpace::AdobeRgb);
}

#[test]
fn color_space_conversion_tags_the_result() {
    let settings = ExportSettings {
        color_space: ColorSpace::Rec2020,
        format: OutputFormat::Png,
        ..Default::default()
    };
    let result = render(&camera_jpeg(32, 24), &EditParameters::default(), &settings).unwrap();
    assert_eq!(result.color_space, ColorSpace::Rec2020);
}

#[test]
fn identical_inputs_give_identical_bytes() {
    let source = camera_jpeg(200, 150);
    let edits = EditParameters {
        exposure: Some(15.0),
        contrast: Some(10.0),
        saturation: Some(-30.0),
    };
    let settings = ExportSettings {
        max_pixels: Some(10_000),
        max_file_size_bytes: Some(4_000),
        color_space: ColorSpace::AdobeRgb,
        ..Default::default()
    };

    let first = render(&source, &edits, &settings).unwrap();
    let second = render(&source, &edits, &settings).unwrap();
    assert_eq!(first.bytes, second.bytes);
    assert_eq!(first.quality, second.quality);
}
