use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::Rng;
use thtensor::dispatch::{self, cap};
use thtensor::{Numeric, Tensor};

const SIDE: usize = 512;

fn generate_random_matrix(side: usize) -> Tensor<f32> {
    let mut rng = rand::thread_rng();
    Tensor::from_vec((0..side * side).map(|_| rng.gen()).collect(), &[side, side]).unwrap()
}

pub fn vector_benchmark(c: &mut Criterion) {
    dispatch::init();
    let x: Vec<f32> = (0..SIDE * SIDE).map(|_| rand::thread_rng().gen()).collect();
    let mut y = vec![0.0f32; x.len()];
    let serial = dispatch::with_capabilities::<f32>(cap::SERIAL);

    let mut group = c.benchmark_group("Vector Mul");
    group.bench_function("Serial", |b| b.iter(|| serial.mul(&mut y, &x, 1.5)));
    group.bench_function("Dispatched", |b| b.iter(|| f32::vector().mul(&mut y, &x, 1.5)));
    group.finish();
}

pub fn cadd_benchmark(c: &mut Criterion) {
    let a = generate_random_matrix(SIDE);
    let b = generate_random_matrix(SIDE);
    let transposed = b.new_transpose(0, 1).unwrap();
    let mut r = Tensor::new();

    let mut group = c.benchmark_group("Tensor CAdd");
    for (name, src) in [("Contiguous", &b), ("Transposed", &transposed)] {
        group.bench_with_input(BenchmarkId::new(name, SIDE), &SIDE, |bencher, _| {
            bencher.iter(|| r.cadd(&a, 2.0, src).unwrap())
        });
    }
    group.bench_with_input(BenchmarkId::new("In Place", SIDE), &SIDE, |bencher, _| {
        let mut target = a.new_clone().unwrap();
        let alias = target.clone();
        bencher.iter(|| target.cadd(&alias, 0.5, &b).unwrap())
    });
    group.finish();
}

criterion_group!(benches, vector_benchmark, cadd_benchmark);
criterion_main!(benches);
