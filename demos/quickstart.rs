//! Quickstart: perturb a small batch and inspect the report

use fgsm::{DifferentiableModel, FgsmConfig, PerturbationGenerator, Sequential};
use ndarray::{array, Array1, Array4};
use tracing_subscriber::EnvFilter;

fn main() {
    // RUST_LOG=fgsm=debug shows the per-step summary
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("fgsm-rs Quickstart Demo\n");

    // Two-class softmax classifier over 2x2 grayscale images:
    // bright top row -> class 0, bright bottom row -> class 1
    let model = Sequential::softmax_classifier(
        array![[1.5, -1.5], [1.5, -1.5], [-1.5, 1.5], [-1.5, 1.5]],
        Array1::zeros(2),
    )
    .unwrap();

    let images = Array4::from_shape_vec(
        (2, 2, 2, 1),
        vec![
            0.9, 0.8, 0.1, 0.2, // clearly class 0
            0.2, 0.1, 0.7, 0.9, // clearly class 1
        ],
    )
    .unwrap();
    let labels = array![[1.0, 0.0], [0.0, 1.0]];

    let generator = PerturbationGenerator::new(FgsmConfig::default().with_input_validation(true));
    let (adversarial, report) = generator
        .generate_with_report(&model, &images, &labels, 0.25f32)
        .unwrap();

    println!("Clean predictions:       {:?}", model.predict(images.view()).unwrap());
    println!("Adversarial predictions: {:?}", model.predict(adversarial.view()).unwrap());
    println!("\nAdversarial pixels: {:?}", adversarial.iter().collect::<Vec<_>>());
    println!("\nReport:\n{}", report.to_json().unwrap());
}
