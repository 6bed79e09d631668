//! `fgsm eval`: the batch harness over a directory.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use fgsm::config::RunConfig;
use fgsm::harness::{self, CsvSink, EvalRow, ResultSink};
use tracing::info;

use crate::error::{CliError, Result};
use crate::output;

/// Forwards rows to a CSV sink while counting successes per epsilon.
struct Tally<W: Write> {
    csv: CsvSink<W>,
    per_epsilon: BTreeMap<u32, (f32, usize, usize)>,
}

impl<W: Write> Tally<W> {
    fn new(csv: CsvSink<W>) -> Self {
        Self {
            csv,
            per_epsilon: BTreeMap::new(),
        }
    }
}

impl<W: Write> ResultSink for Tally<W> {
    fn record(&mut self, row: &EvalRow) -> fgsm::Result<()> {
        // non-negative floats order the same as their bit patterns; `+ 0.0`
        // folds -0.0 into 0.0
        let epsilon = row.epsilon + 0.0;
        let entry = self
            .per_epsilon
            .entry(epsilon.to_bits())
            .or_insert((epsilon, 0, 0));
        entry.1 += 1;
        entry.2 += usize::from(row.success);
        self.csv.record(row)
    }

    fn finish(&mut self) -> fgsm::Result<()> {
        self.csv.finish()
    }
}

pub(crate) fn run(config: &RunConfig, dir: &Path, csv: Option<&Path>, quiet: bool) -> Result<()> {
    if !dir.is_dir() {
        return Err(CliError::NotADirectory(dir.to_path_buf()));
    }
    let images = harness::load_images(dir, &config.preprocess())?;
    if images.is_empty() {
        return Err(CliError::NoImages(dir.to_path_buf()));
    }
    let classifier = config.classifier()?;
    let bounds = config.bounds();

    let (rows, tally) = match csv {
        Some(path) => {
            let mut tally = Tally::new(CsvSink::create(path)?);
            let rows = harness::evaluate(&classifier, &bounds, &images, &config.epsilons, &mut tally)?;
            info!(path = %path.display(), rows, "wrote results");
            (rows, tally.per_epsilon)
        }
        None => {
            let mut tally = Tally::new(CsvSink::new(std::io::stdout().lock())?);
            let rows = harness::evaluate(&classifier, &bounds, &images, &config.epsilons, &mut tally)?;
            (rows, tally.per_epsilon)
        }
    };

    // the table only goes to stdout when the CSV does not
    if csv.is_none() || quiet {
        for (epsilon, total, successes) in tally.values() {
            info!(epsilon, total, successes, "success rate");
        }
        return Ok(());
    }

    output::section("FGSM Evaluation");
    output::kv("Images", images.len());
    output::kv("Rows", rows);
    for (epsilon, total, successes) in tally.values() {
        output::kv(
            &format!("epsilon {epsilon}"),
            format!("{successes}/{total} flipped ({})", output::percent(*successes, *total)),
        );
    }
    Ok(())
}
