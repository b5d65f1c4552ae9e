//! Accuracy of a fixed classifier as the perturbation budget grows

use fgsm::{fgsm, DifferentiableModel, Sequential};
use ndarray::{Array1, Array2, Array4, Axis};
use tracing_subscriber::EnvFilter;

const SIDE: usize = 4;
const CLASSES: usize = 2;

fn accuracy(model: &Sequential, images: &Array4<f32>, labels: &Array2<f32>) -> f32 {
    let probs = model.predict(images.view()).unwrap();
    let correct = probs
        .axis_iter(Axis(0))
        .zip(labels.axis_iter(Axis(0)))
        .filter(|(p, y)| argmax(p.iter()) == argmax(y.iter()))
        .count();
    correct as f32 / labels.nrows() as f32
}

fn argmax<'a>(values: impl Iterator<Item = &'a f32>) -> usize {
    values
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
        .0
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("Epsilon sweep on a left/right brightness classifier\n");

    // Class 0: left half brighter, class 1: right half brighter
    let features = SIDE * SIDE;
    let model = Sequential::softmax_classifier(
        Array2::from_shape_fn((features, CLASSES), |(i, j)| {
            let left = (i % SIDE) < SIDE / 2;
            if left == (j == 0) {
                0.8
            } else {
                -0.8
            }
        }),
        Array1::zeros(CLASSES),
    )
    .unwrap();

    let n = 64;
    let images = Array4::from_shape_fn((n, SIDE, SIDE, 1), |(k, _, w, _)| {
        let left = w < SIDE / 2;
        let base = if (k % CLASSES == 0) == left { 0.65 } else { 0.35 };
        base + ((k * 7 + w) as f32).sin() * 0.05
    });
    let labels = Array2::from_shape_fn((n, CLASSES), |(k, j)| if k % CLASSES == j { 1.0 } else { 0.0 });

    println!("{:>8}  {:>8}", "epsilon", "accuracy");
    for &eps in &[0.0f32, 0.02, 0.05, 0.1, 0.15, 0.2, 0.3] {
        let adversarial = fgsm(&model, &images, &labels, eps).unwrap();
        println!("{:>8.3}  {:>7.1}%", eps, accuracy(&model, &adversarial, &labels) * 100.0);
    }
}
