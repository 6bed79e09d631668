//! `fgsm attack`: one image, one epsilon.

use std::path::Path;

use fgsm::attack::{AttackReport, FgsmAttack};
use fgsm::config::RunConfig;
use fgsm::image_io;
use tracing::info;

use crate::error::{CliError, Result};
use crate::output;

pub(crate) fn run(
    config: &RunConfig,
    image: &Path,
    label: Option<usize>,
    out_dir: Option<&Path>,
    json: bool,
) -> Result<()> {
    if !image.is_file() {
        return Err(CliError::FileNotFound(image.to_path_buf()));
    }
    let decoded = image_io::decode(&std::fs::read(image)?)?;
    let tensor = image_io::preprocess(&decoded, &config.preprocess())?;

    let classifier = config.classifier()?;
    let bounds = config.bounds();
    let attack = FgsmAttack::new(&classifier, config.epsilon, &bounds)?;
    let result = attack.run(&tensor, label)?;

    let labels = config.label_table()?;
    let report = AttackReport::new(&result, &tensor, labels.as_ref());

    if let Some(dir) = out_dir {
        std::fs::create_dir_all(dir)?;
        let normalization = config.normalization();
        let clean = image_io::encode_png(&normalization.to_raw(&tensor)?)?;
        let adversarial =
            image_io::encode_png(&normalization.to_raw(result.adversarial_image())?)?;
        std::fs::write(dir.join("clean.png"), clean)?;
        std::fs::write(dir.join("adversarial.png"), adversarial)?;
        info!(dir = %dir.display(), "wrote clean.png and adversarial.png");
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    output::section("FGSM Attack");
    output::kv("Image", image.display());
    output::kv("Epsilon", report.epsilon);
    output::kv(
        "Clean prediction",
        output::class(report.clean_prediction, report.clean_label.as_deref()),
    );
    output::kv(
        "Adversarial prediction",
        output::class(
            report.adversarial_prediction,
            report.adversarial_label.as_deref(),
        ),
    );
    output::kv("Max |perturbation|", format!("{:.6}", report.max_abs_perturbation));
    if report.attack_success {
        output::success("prediction changed");
    } else {
        output::fail("prediction unchanged");
    }
    Ok(())
}
