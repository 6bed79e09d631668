//! Property-based tests for the FGSM engine and normalization.

use fgsm::attack::perturb;
use fgsm::prelude::*;
use proptest::prelude::*;

const SHAPE: [usize; 4] = [1, 3, 4, 4];

fn image_strategy() -> impl Strategy<Value = Tensor> {
    proptest::collection::vec(-3.0f32..3.0, 48).prop_map(|data| Tensor::new(&data, &SHAPE))
}

fn raw_strategy() -> impl Strategy<Value = Tensor> {
    proptest::collection::vec(0.0f32..=1.0, 48).prop_map(|data| Tensor::new(&data, &SHAPE))
}

fn classifier() -> ModuleClassifier<TinyConvNet> {
    ModuleClassifier::new(TinyConvNet::seeded(5, 11))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn adversarial_stays_in_bounds(image in image_strategy(), eps in 0.0f32..5.0) {
        let classifier = classifier();
        let bounds = Normalization::imagenet().bounds();
        let attack = FgsmAttack::new(&classifier, eps, &bounds).unwrap();

        let result = attack.run(&image, None).unwrap();
        prop_assert!(bounds.contains(result.adversarial_image()).unwrap());
    }

    #[test]
    fn success_iff_prediction_changed(image in image_strategy(), eps in 0.0f32..1.0, label in 0usize..5) {
        let classifier = classifier();
        let bounds = Normalization::imagenet().bounds();
        let attack = FgsmAttack::new(&classifier, eps, &bounds).unwrap();

        let result = attack.run(&image, Some(label)).unwrap();
        prop_assert_eq!(
            result.success(),
            result.clean_prediction() != result.adversarial_prediction()
        );
        prop_assert_eq!(result.target(), label);
    }

    #[test]
    fn zero_epsilon_only_clamps(image in image_strategy()) {
        let classifier = classifier();
        let bounds = Normalization::imagenet().bounds();
        let attack = FgsmAttack::new(&classifier, 0.0, &bounds).unwrap();

        let result = attack.run(&image, None).unwrap();
        prop_assert_eq!(result.adversarial_image(), &bounds.clamp(&image).unwrap());
    }

    #[test]
    fn runs_are_bitwise_identical(image in image_strategy(), eps in 0.0f32..1.0) {
        let classifier = classifier();
        let bounds = Normalization::imagenet().bounds();
        let attack = FgsmAttack::new(&classifier, eps, &bounds).unwrap();

        let first = attack.run(&image, None).unwrap();
        let second = attack.run(&image, None).unwrap();
        let bits = |t: &Tensor| t.data().iter().map(|v| v.to_bits()).collect::<Vec<_>>();
        prop_assert_eq!(bits(first.adversarial_image()), bits(second.adversarial_image()));
        prop_assert_eq!(first.adversarial_prediction(), second.adversarial_prediction());
    }

    #[test]
    fn perturbation_scales_linearly(
        grad in proptest::collection::vec(-1.0f32..1.0, 48),
        eps in 0.001f32..1.0,
    ) {
        let image = Tensor::zeros(&SHAPE);
        let grad = Tensor::new(&grad, &SHAPE);
        let one = perturb(&image, &grad, eps).unwrap();
        let two = perturb(&image, &grad, 2.0 * eps).unwrap();

        for ((&a, &b), &g) in one.data().iter().zip(two.data()).zip(grad.data()) {
            prop_assert!((b - 2.0 * a).abs() < 1e-6);
            let expected = if g == 0.0 { 0.0 } else { eps };
            prop_assert!((a.abs() - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn normalization_round_trips(raw in raw_strategy()) {
        let norm = Normalization::imagenet();
        let back = norm.to_raw(&norm.to_normalized(&raw).unwrap()).unwrap();
        for (&a, &b) in raw.data().iter().zip(back.data()) {
            prop_assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn normalized_raw_images_are_in_bounds(raw in raw_strategy()) {
        let norm = Normalization::imagenet();
        let normalized = norm.to_normalized(&raw).unwrap();
        let bounds = norm.bounds();
        // mapping and bounds share the same arithmetic, so no slack is needed
        prop_assert_eq!(&bounds.clamp(&normalized).unwrap(), &normalized);
    }
}

#[test]
fn huge_epsilon_saturates_every_moved_element() {
    let classifier = classifier();
    let bounds = Normalization::imagenet().bounds();
    let attack = FgsmAttack::new(&classifier, 1e3, &bounds).unwrap();
    let data: Vec<f32> = (0..48).map(|i| (i as f32 * 0.37).sin()).collect();
    let image = Tensor::new(&data, &SHAPE);

    let result = attack.run(&image, None).unwrap();
    let per_channel = bounds.per_channel();
    for (i, (&adv, &orig)) in result
        .adversarial_image()
        .data()
        .iter()
        .zip(image.data())
        .enumerate()
    {
        let (lo, hi) = per_channel[i / 16];
        assert!(adv == orig || adv == lo || adv == hi, "element {i} = {adv}");
    }
}
