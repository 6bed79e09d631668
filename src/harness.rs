//! Batch evaluation: attack every image at every epsilon and record one row
//! per pair.
//!
//! Rows go to a [`ResultSink`]. [`CsvSink`] writes the
//! `image,epsilon,clean_pred,adv_pred,success` table; `Vec<EvalRow>` keeps
//! rows in memory.
//!
//! # Example
//!
//! ```
//! use fgsm::autograd::Tensor;
//! use fgsm::classifier::ModuleClassifier;
//! use fgsm::harness::{evaluate, EvalRow};
//! use fgsm::models::TinyConvNet;
//! use fgsm::normalization::Normalization;
//!
//! let classifier = ModuleClassifier::new(TinyConvNet::seeded(10, 1));
//! let bounds = Normalization::imagenet().bounds();
//! let images = vec![("a.png".to_string(), Tensor::zeros(&[1, 3, 8, 8]))];
//!
//! let mut rows: Vec<EvalRow> = Vec::new();
//! let n = evaluate(&classifier, &bounds, &images, &[0.0, 0.1], &mut rows).unwrap();
//! assert_eq!(n, 2);
//! assert!(!rows[0].success);
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::attack::FgsmAttack;
use crate::autograd::{GradContext, Tensor};
use crate::classifier::Classifier;
use crate::error::{FgsmError, Result};
use crate::image_io::{self, Preprocess};
use crate::normalization::Bounds;

/// Epsilon grid used when none is configured.
pub const DEFAULT_EPSILONS: [f32; 5] = [0.0, 0.01, 0.05, 0.1, 0.2];

/// Column names written by [`CsvSink`].
pub const CSV_HEADER: [&str; 5] = ["image", "epsilon", "clean_pred", "adv_pred", "success"];

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// One (image, epsilon) outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalRow {
    /// Image identifier, usually its file name.
    pub image: String,
    /// Epsilon used.
    pub epsilon: f32,
    /// Clean top-1 class.
    pub clean_pred: usize,
    /// Adversarial top-1 class.
    pub adv_pred: usize,
    /// Whether the prediction changed.
    pub success: bool,
}

/// Destination for evaluation rows.
pub trait ResultSink {
    /// Record one row.
    ///
    /// # Errors
    ///
    /// Returns an error if the row cannot be written.
    fn record(&mut self, row: &EvalRow) -> Result<()>;

    /// Flush buffered rows. Called once after the last row.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing fails.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

impl ResultSink for Vec<EvalRow> {
    fn record(&mut self, row: &EvalRow) -> Result<()> {
        self.push(row.clone());
        Ok(())
    }
}

/// CSV sink with a fixed header and `0`/`1` success column.
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> CsvSink<W> {
    /// Wrap `inner` and write the header row.
    ///
    /// # Errors
    ///
    /// Returns [`FgsmError::Csv`] if the header cannot be written.
    pub fn new(inner: W) -> Result<Self> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(inner);
        writer.write_record(CSV_HEADER)?;
        Ok(Self { writer })
    }

    /// Flush and return the underlying writer.
    ///
    /// # Errors
    ///
    /// Returns [`FgsmError::Io`] if the final flush fails.
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| FgsmError::Io(e.into_error()))
    }
}

impl CsvSink<std::fs::File> {
    /// Create (or truncate) a CSV file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`FgsmError::Io`] if the file cannot be created.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(std::fs::File::create(path)?)
    }
}

impl<W: Write> ResultSink for CsvSink<W> {
    fn record(&mut self, row: &EvalRow) -> Result<()> {
        self.writer.write_record([
            row.image.clone(),
            row.epsilon.to_string(),
            row.clean_pred.to_string(),
            row.adv_pred.to_string(),
            u8::from(row.success).to_string(),
        ])?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Attack every image at every epsilon and record the outcomes.
///
/// Engines for all epsilons are built before any image is attacked, so an
/// invalid epsilon fails the whole run without emitting rows. Rows are
/// emitted image by image, in epsilon order.
///
/// Returns the number of rows written, `images.len() * epsilons.len()`.
///
/// # Errors
///
/// - [`FgsmError::InvalidHyperparameter`] for an empty or invalid epsilon
///   grid
/// - any error from [`FgsmAttack::run`] or from the sink
pub fn evaluate<C, S>(
    classifier: &C,
    bounds: &Bounds,
    images: &[(String, Tensor)],
    epsilons: &[f32],
    sink: &mut S,
) -> Result<usize>
where
    C: Classifier + ?Sized,
    S: ResultSink + ?Sized,
{
    if epsilons.is_empty() {
        return Err(FgsmError::invalid_hyperparameter(
            "epsilons",
            "[]",
            "at least one epsilon",
        ));
    }
    let engines = epsilons
        .iter()
        .map(|&eps| FgsmAttack::new(classifier, eps, bounds))
        .collect::<Result<Vec<_>>>()?;

    let mut ctx = GradContext::new();
    let mut rows = 0;
    for (name, image) in images {
        for engine in &engines {
            let result = engine.run_with_context(&mut ctx, image, None)?;
            let row = EvalRow {
                image: name.clone(),
                epsilon: engine.epsilon(),
                clean_pred: result.clean_prediction(),
                adv_pred: result.adversarial_prediction(),
                success: result.success(),
            };
            debug!(image = %row.image, epsilon = row.epsilon, success = row.success, "evaluated");
            sink.record(&row)?;
            rows += 1;
        }
    }
    sink.finish()?;

    info!(images = images.len(), epsilons = epsilons.len(), rows, "evaluation finished");
    Ok(rows)
}

/// PNG and JPEG files directly inside `dir`, sorted by path.
///
/// Extensions are matched case-insensitively; subdirectories are skipped.
///
/// # Errors
///
/// Returns [`FgsmError::Io`] if the directory cannot be read.
pub fn collect_images(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_image = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                IMAGE_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            });
        if is_image && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Load and preprocess every image in `dir`, keyed by file name.
///
/// # Errors
///
/// Fails on the first image that cannot be read, decoded or preprocessed.
pub fn load_images(dir: impl AsRef<Path>, opts: &Preprocess) -> Result<Vec<(String, Tensor)>> {
    collect_images(dir)?
        .into_iter()
        .map(|path| {
            let name = path
                .file_name()
                .map_or_else(String::new, |n| n.to_string_lossy().into_owned());
            let tensor = image_io::preprocess(&image_io::load(&path)?, opts)?;
            Ok((name, tensor))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ModuleClassifier;
    use crate::models::TinyConvNet;
    use crate::normalization::Normalization;

    fn images(n: usize) -> Vec<(String, Tensor)> {
        (0..n)
            .map(|i| {
                let data: Vec<f32> = (0..3 * 8 * 8)
                    .map(|j| ((i * 31 + j * 7) % 23) as f32 / 11.0 - 1.0)
                    .collect();
                (format!("img_{i}.png"), Tensor::new(&data, &[1, 3, 8, 8]))
            })
            .collect()
    }

    #[test]
    fn test_evaluate_emits_every_pair() {
        let classifier = ModuleClassifier::new(TinyConvNet::seeded(10, 2));
        let bounds = Normalization::imagenet().bounds();
        let mut rows: Vec<EvalRow> = Vec::new();

        let n = evaluate(&classifier, &bounds, &images(3), &DEFAULT_EPSILONS, &mut rows).unwrap();
        assert_eq!(n, 15);
        assert_eq!(rows.len(), 15);
        assert_eq!(rows[0].image, "img_0.png");
        assert_eq!(rows[4].epsilon, 0.2);
        assert_eq!(rows[5].image, "img_1.png");
        for row in &rows {
            assert_eq!(row.success, row.clean_pred != row.adv_pred);
        }
        // epsilon 0 never changes the prediction
        assert!(rows.iter().filter(|r| r.epsilon == 0.0).all(|r| !r.success));
    }

    #[test]
    fn test_evaluate_rejects_bad_grid_before_writing() {
        let classifier = ModuleClassifier::new(TinyConvNet::seeded(10, 2));
        let bounds = Normalization::imagenet().bounds();
        let mut rows: Vec<EvalRow> = Vec::new();

        assert!(evaluate(&classifier, &bounds, &images(1), &[], &mut rows).is_err());
        assert!(evaluate(&classifier, &bounds, &images(1), &[0.1, -1.0], &mut rows).is_err());
        assert!(rows.is_empty());
    }

    #[test]
    fn test_evaluate_no_images() {
        let classifier = ModuleClassifier::new(TinyConvNet::seeded(10, 2));
        let bounds = Normalization::imagenet().bounds();
        let mut rows: Vec<EvalRow> = Vec::new();
        assert_eq!(evaluate(&classifier, &bounds, &[], &[0.1], &mut rows).unwrap(), 0);
    }

    #[test]
    fn test_csv_sink_format() {
        let mut sink = CsvSink::new(Vec::new()).unwrap();
        sink.record(&EvalRow {
            image: "cat.png".to_string(),
            epsilon: 0.05,
            clean_pred: 281,
            adv_pred: 282,
            success: true,
        })
        .unwrap();
        sink.record(&EvalRow {
            image: "dog.jpg".to_string(),
            epsilon: 0.0,
            clean_pred: 207,
            adv_pred: 207,
            success: false,
        })
        .unwrap();
        sink.finish().unwrap();

        let text = String::from_utf8(sink.into_inner().unwrap()).unwrap();
        assert_eq!(
            text,
            "image,epsilon,clean_pred,adv_pred,success\ncat.png,0.05,281,282,1\ndog.jpg,0,207,207,0\n"
        );
    }

    #[test]
    fn test_collect_images_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.JPG", "a.png", "c.jpeg", "notes.txt", "d.gif"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.png")).unwrap();

        let names: Vec<_> = collect_images(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.png", "b.JPG", "c.jpeg"]);
    }

    #[test]
    fn test_collect_images_missing_dir() {
        assert!(matches!(
            collect_images("/no/such/dir"),
            Err(FgsmError::Io(_))
        ));
    }
}
