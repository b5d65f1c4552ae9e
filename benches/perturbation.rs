use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use fgsm::{fgsm, Sequential};
use ndarray::{Array1, Array2, Array4};

fn bench_fgsm(c: &mut Criterion) {
    let mut group = c.benchmark_group("fgsm");

    for &batch in &[1usize, 16, 64] {
        for &side in &[8usize, 28] {
            let features = side * side;
            let model = Sequential::softmax_classifier(
                Array2::from_shape_fn((features, 10), |(i, j)| ((i * 10 + j) as f32).sin() * 0.05),
                Array1::zeros(10),
            )
            .unwrap();
            let images = Array4::from_shape_fn((batch, side, side, 1), |(n, h, w, _)| {
                ((n * features + h * side + w) as f32).cos() * 0.5 + 0.5
            });
            let labels = Array2::from_shape_fn((batch, 10), |(n, j)| if n % 10 == j { 1.0 } else { 0.0 });

            let id = format!("{}b_{}x{}", batch, side, side);

            group.bench_with_input(
                BenchmarkId::new("softmax_classifier", &id),
                &(images, labels),
                |b, (images, labels)| b.iter(|| fgsm(&model, images, labels, 0.1f32).unwrap()),
            );
        }
    }
    group.finish();
}

criterion_group!(benches, bench_fgsm);
criterion_main!(benches);
