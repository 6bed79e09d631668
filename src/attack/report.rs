use serde::{Deserialize, Serialize};

use crate::autograd::Tensor;
use crate::labels::LabelTable;

use super::AttackResult;

/// Serializable summary of an attack, with human-readable labels.
///
/// # Example
///
/// ```
/// use fgsm::attack::AttackReport;
///
/// let json = r#"{
///     "clean_prediction": 3,
///     "adversarial_prediction": 7,
///     "clean_label": "cat",
///     "adversarial_label": null,
///     "attack_success": true,
///     "epsilon": 0.1,
///     "max_abs_perturbation": 0.1
/// }"#;
/// let report: AttackReport = serde_json::from_str(json).unwrap();
/// assert!(report.attack_success);
/// assert_eq!(report.adversarial_label, None);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackReport {
    /// Top-1 class of the clean image.
    pub clean_prediction: usize,
    /// Top-1 class of the adversarial image.
    pub adversarial_prediction: usize,
    /// Label of `clean_prediction`, if the table has one.
    pub clean_label: Option<String>,
    /// Label of `adversarial_prediction`, if the table has one.
    pub adversarial_label: Option<String>,
    /// Whether the prediction changed.
    pub attack_success: bool,
    /// Epsilon used, normalized-space units.
    pub epsilon: f32,
    /// Largest absolute difference between clean and adversarial images.
    pub max_abs_perturbation: f32,
}

impl AttackReport {
    /// Summarize `result` against the clean `image` it was computed from.
    #[must_use]
    pub fn new(result: &AttackResult, image: &Tensor, labels: Option<&LabelTable>) -> Self {
        let label = |class: usize| {
            labels
                .and_then(|table| table.get(class))
                .map(str::to_owned)
        };

        let max_abs_perturbation = result
            .adversarial_image()
            .data()
            .iter()
            .zip(image.data())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0_f32, f32::max);

        Self {
            clean_prediction: result.clean_prediction(),
            adversarial_prediction: result.adversarial_prediction(),
            clean_label: label(result.clean_prediction()),
            adversarial_label: label(result.adversarial_prediction()),
            attack_success: result.success(),
            epsilon: result.epsilon(),
            max_abs_perturbation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_labels_and_perturbation() {
        let image = Tensor::new(&[0.0, 0.5, 1.0], &[1, 1, 1, 3]);
        let adv = Tensor::new(&[0.1, 0.4, 1.0], &[1, 1, 1, 3]);
        let result = AttackResult::new(adv, 0, 2, 0, 0.1);
        let labels: LabelTable = ["tench", "goldfish"].into_iter().collect();

        let report = AttackReport::new(&result, &image, Some(&labels));
        assert_eq!(report.clean_label.as_deref(), Some("tench"));
        assert_eq!(report.adversarial_label, None);
        assert!(report.attack_success);
        assert!((report.max_abs_perturbation - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_report_without_labels_serializes() {
        let image = Tensor::zeros(&[1, 1, 1, 1]);
        let result = AttackResult::new(image.clone(), 4, 4, 4, 0.0);

        let report = AttackReport::new(&result, &image, None);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["attack_success"], false);
        assert_eq!(json["clean_label"], serde_json::Value::Null);
        assert_eq!(json["max_abs_perturbation"], 0.0);
    }
}
