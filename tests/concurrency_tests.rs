//! Thread-safety and thread-count independence of the generator

use fgsm::{FgsmConfig, PerturbationGenerator, Sequential};
use ndarray::{Array1, Array2, Array4};

fn assert_send_sync<T: Send + Sync>() {}

fn classifier() -> Sequential {
    Sequential::softmax_classifier(
        Array2::from_shape_fn((16, 4), |(i, j)| ((i * 4 + j) as f32 * 0.37).sin()),
        Array1::zeros(4),
    )
    .unwrap()
}

fn batch() -> (Array4<f32>, Array2<f32>) {
    let n = 32;
    let images = Array4::from_shape_fn((n, 4, 4, 1), |(k, h, w, _)| {
        ((k * 16 + h * 4 + w) as f32 * 0.113).cos() * 0.45 + 0.5
    });
    let labels = Array2::from_shape_fn((n, 4), |(k, j)| if k % 4 == j { 1.0 } else { 0.0 });
    (images, labels)
}

#[test]
fn test_generator_is_send_and_sync() {
    assert_send_sync::<PerturbationGenerator>();
    assert_send_sync::<Sequential>();
    assert_send_sync::<FgsmConfig>();
}

#[test]
fn test_output_independent_of_thread_count() {
    let generator = PerturbationGenerator::default();
    let model = classifier();
    let (images, labels) = batch();

    let default_pool = generator.generate(&model, &images, &labels, 0.05f32).unwrap();

    let single = rayon::ThreadPoolBuilder::new()
        .num_threads(1)
        .build()
        .unwrap();
    let one_thread = single
        .install(|| generator.generate(&model, &images, &labels, 0.05f32))
        .unwrap();

    assert_eq!(default_pool, one_thread);
}

#[test]
fn test_concurrent_calls_share_one_generator() {
    let generator = PerturbationGenerator::default();
    let model = classifier();
    let (images, labels) = batch();
    let expected = generator.generate(&model, &images, &labels, 0.05f32).unwrap();

    let results: Vec<Array4<f32>> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| s.spawn(|| generator.generate(&model, &images, &labels, 0.05f32).unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for result in &results {
        assert_eq!(result, &expected);
    }
}
