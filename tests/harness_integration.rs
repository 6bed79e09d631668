//! End-to-end batch evaluation: image files in, CSV rows out.

use std::io::Cursor;
use std::path::Path;

use fgsm::harness::{collect_images, evaluate, load_images, CsvSink, EvalRow};
use fgsm::image_io::Preprocess;
use fgsm::prelude::*;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

fn small_preprocess() -> Preprocess {
    Preprocess {
        resize: 12,
        crop: 8,
        normalization: Normalization::imagenet(),
    }
}

fn write_image(path: &Path, seed: u32, format: ImageFormat) {
    let image = RgbImage::from_fn(15, 11, |x, y| {
        let v = (x * 17 + y * 5 + seed * 29) % 256;
        Rgb([v as u8, (255 - v) as u8, ((v * 3) % 256) as u8])
    });
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut bytes), format)
        .unwrap();
    std::fs::write(path, bytes).unwrap();
}

#[test]
fn test_directory_to_csv_has_n_times_m_rows() {
    let dir = tempfile::tempdir().unwrap();
    write_image(&dir.path().join("c.png"), 1, ImageFormat::Png);
    write_image(&dir.path().join("a.jpg"), 2, ImageFormat::Jpeg);
    write_image(&dir.path().join("b.png"), 3, ImageFormat::Png);
    std::fs::write(dir.path().join("README"), "not an image").unwrap();

    let images = load_images(dir.path(), &small_preprocess()).unwrap();
    let names: Vec<_> = images.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, ["a.jpg", "b.png", "c.png"]);
    assert!(images.iter().all(|(_, t)| t.shape() == [1, 3, 8, 8]));

    let classifier = ModuleClassifier::new(TinyConvNet::seeded(6, 4));
    let bounds = Normalization::imagenet().bounds();
    let epsilons = [0.0, 0.03, 0.3, 3.0];
    let csv_path = dir.path().join("results.csv");

    let mut sink = CsvSink::create(&csv_path).unwrap();
    let rows = evaluate(&classifier, &bounds, &images, &epsilons, &mut sink).unwrap();
    drop(sink);
    assert_eq!(rows, 12);

    let mut reader = csv::Reader::from_path(&csv_path).unwrap();
    let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
    assert_eq!(headers, ["image", "epsilon", "clean_pred", "adv_pred", "success"]);
    let records: Vec<csv::StringRecord> = reader.records().map(std::result::Result::unwrap).collect();
    assert_eq!(records.len(), 12);
    for record in &records {
        let clean: usize = record[2].parse().unwrap();
        let adv: usize = record[3].parse().unwrap();
        let expected = if clean == adv { "0" } else { "1" };
        assert_eq!(&record[4], expected);
        assert!(clean < 6 && adv < 6);
    }
    assert_eq!(&records[0][1], "0");
    assert_eq!(&records[0][4], "0");
}

#[test]
fn test_memory_sink_matches_single_attacks() {
    let dir = tempfile::tempdir().unwrap();
    write_image(&dir.path().join("one.png"), 7, ImageFormat::Png);
    let images = load_images(dir.path(), &small_preprocess()).unwrap();

    let classifier = ModuleClassifier::new(TinyConvNet::seeded(6, 4));
    let bounds = Normalization::imagenet().bounds();
    let mut rows: Vec<EvalRow> = Vec::new();
    evaluate(&classifier, &bounds, &images, &[0.2], &mut rows).unwrap();

    let single = FgsmAttack::new(&classifier, 0.2, &bounds)
        .unwrap()
        .run(&images[0].1, None)
        .unwrap();
    assert_eq!(rows[0].clean_pred, single.clean_prediction());
    assert_eq!(rows[0].adv_pred, single.adversarial_prediction());
    assert_eq!(rows[0].success, single.success());
}

#[test]
fn test_undecodable_file_fails_load() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("broken.png"), b"\x89PNG\r\n\x1a\ntruncated").unwrap();
    assert_eq!(collect_images(dir.path()).unwrap().len(), 1);
    assert!(matches!(
        load_images(dir.path(), &small_preprocess()),
        Err(FgsmError::Decode(_))
    ));
}
