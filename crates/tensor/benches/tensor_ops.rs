use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use tensor::{Gemm, NaiveGemm, NdarrayGemm, Tensor};

fn filled(shape: &[usize]) -> Tensor<'static, f32> {
    let n: usize = shape.iter().product();
    Tensor::from_vec(shape, (0..n).map(|v| (v % 97) as f32 * 0.01).collect()).unwrap()
}

fn benchmark_matmul(c: &mut Criterion) {
    let mut group = c.benchmark_group("matmul");

    // Mask prototype projection: [n, 32] x [32, 160*160]
    for rows in [10usize, 100] {
        let coeffs = filled(&[rows, 32]);
        let protos = filled(&[32, 160 * 160]);

        let kernels: [(&str, &dyn Gemm); 2] = [("naive", &NaiveGemm), ("ndarray", &NdarrayGemm)];
        for (name, kernel) in kernels {
            group.bench_with_input(BenchmarkId::new(name, rows), &rows, |b, _| {
                b.iter(|| coeffs.matmul_with(black_box(&protos), kernel).unwrap());
            });
        }
    }

    group.finish();
}

fn benchmark_elementwise(c: &mut Criterion) {
    let mut group = c.benchmark_group("elementwise");
    let input = filled(&[1, 3, 640, 640]);

    group.bench_function("affine_out_of_place", |b| {
        b.iter(|| black_box(&input).affine(1.0 / 255.0, 0.0));
    });

    group.bench_function("affine_inplace", |b| {
        b.iter(|| input.affine_inplace(black_box(1.0), 0.0).unwrap());
    });

    group.bench_function("sigmoid", |b| {
        b.iter(|| black_box(&input).sigmoid());
    });

    group.finish();
}

fn benchmark_broadcast(c: &mut Criterion) {
    let mut group = c.benchmark_group("broadcast");
    let bias = filled(&[3, 1, 1]);

    for side in [160usize, 640] {
        group.bench_with_input(BenchmarkId::new("chw", side), &side, |b, &side| {
            b.iter(|| bias.broadcast(black_box(&[3, side, side])).unwrap());
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_matmul,
    benchmark_elementwise,
    benchmark_broadcast
);
criterion_main!(benches);
