use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::Rng;
use thtensor::Tensor;

fn generate_random_matrix(rows: usize, cols: usize) -> Tensor<f64> {
    let mut rng = rand::thread_rng();
    Tensor::from_vec((0..rows * cols).map(|_| rng.gen()).collect(), &[rows, cols]).unwrap()
}

pub fn sum_benchmark(c: &mut Criterion) {
    let m = generate_random_matrix(1024, 1024);
    let mut r = Tensor::new();

    let mut group = c.benchmark_group("Sum");
    group.bench_function("All", |b| b.iter(|| m.sumall().unwrap()));
    for dim in 0..2 {
        group.bench_with_input(BenchmarkId::new("Along", dim), &dim, |b, &dim| {
            b.iter(|| r.sum(&m, dim).unwrap())
        });
    }
    group.finish();
}

pub fn sort_benchmark(c: &mut Criterion) {
    let m = generate_random_matrix(256, 1024);
    let mut sorted = Tensor::new();
    let mut order = Tensor::new();

    let mut group = c.benchmark_group("Sort");
    for descending in [false, true] {
        group.bench_with_input(BenchmarkId::new("Rows", descending), &descending, |b, &descending| {
            b.iter(|| sorted.sort(&mut order, &m, 1, descending).unwrap())
        });
    }
    group.finish();
}

pub fn addmm_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("AddMM");
    for side in [64, 128, 256] {
        let m1 = generate_random_matrix(side, side);
        let m2 = generate_random_matrix(side, side);
        let t = Tensor::with_size_2d(side, side).unwrap();
        let mut r = Tensor::new();
        group.bench_with_input(BenchmarkId::new("Square", side), &side, |b, _| {
            b.iter(|| r.addmm(0.0, &t, 1.0, &m1, &m2).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, sum_benchmark, sort_benchmark, addmm_benchmark);
criterion_main!(benches);
