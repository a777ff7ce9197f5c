use std::time::Instant;

use ffnn::nn::init;
use ffnn::tensor::kernels::gemm;
use ffnn::{matrix_product, Dense, NeuralNetwork, OptimizerKind, OptimizerSchedule, Relu, Sigmoid, Tensor, TrainConfig};
use rand::rngs::StdRng;
use rand::SeedableRng;

struct BenchmarkResult {
    name: &'static str,
    latency_ms: f64,
    gflops: f64,
}

fn time_ms<F: FnMut()>(iterations: usize, mut f: F) -> f64 {
    // Warm-up
    for _ in 0..3 {
        f();
    }
    let start = Instant::now();
    for _ in 0..iterations {
        f();
    }
    start.elapsed().as_secs_f64() * 1000.0 / iterations as f64
}

fn benchmark_shape(m: usize, k: usize, n: usize, iterations: usize, rng: &mut StdRng) -> Vec<BenchmarkResult> {
    let a = Tensor::random_uniform([m, k], -1.0, 1.0, rng);
    let b = Tensor::random_uniform([k, n], -1.0, 1.0, rng);
    let flops = 2.0 * (m * k * n) as f64;

    let kernel_ms = time_ms(iterations, || {
        let _ = gemm::matmul(a.data(), [m, k], b.data(), [k, n]);
    });
    let tensor_ms = time_ms(iterations, || {
        let _ = matrix_product(&a, &b);
    });

    // The same work split over a batch of 4 that shares the right operand
    let batched_a = Tensor::random_uniform([4, m / 4, k], -1.0, 1.0, rng);
    let mut batched_b = Tensor::new([1, k, n]);
    batched_b.assign(b.data()).unwrap();
    let batched_ms = time_ms(iterations, || {
        let _ = matrix_product(&batched_a, &batched_b);
    });

    [("gemm kernel", kernel_ms), ("matrix_product", tensor_ms), ("batched x4", batched_ms)]
        .into_iter()
        .map(|(name, latency_ms)| BenchmarkResult {
            name,
            latency_ms,
            gflops: flops / (latency_ms * 1e6),
        })
        .collect()
}

fn print_results_table(title: &str, m: usize, k: usize, n: usize, results: &[BenchmarkResult]) {
    println!("\n{} ([{}x{}] @ [{}x{}])", title, m, k, k, n);
    println!("{:<18} {:>12} {:>10}", "Variant", "Latency(ms)", "GFLOP/s");
    println!("{}", "-".repeat(42));
    for r in results {
        println!("{:<18} {:>12.3} {:>10.2}", r.name, r.latency_ms, r.gflops);
    }
}

fn benchmark_training_epoch(rng: &mut StdRng) {
    let samples = 512;
    let x = Tensor::random_uniform([samples, 784], 0.0, 1.0, rng);
    let y = Tensor::random_uniform([samples, 10], 0.0, 1.0, rng);

    for schedule in [OptimizerSchedule::PerBatch, OptimizerSchedule::Persistent] {
        let mut net = NeuralNetwork::new();
        net.add_layer(Dense::new(784, 128, init::uniform(-0.1, 0.1, &mut *rng), init::zeros()));
        net.add_layer(Relu::new());
        net.add_layer(Dense::new(128, 64, init::uniform(-0.1, 0.1, &mut *rng), init::zeros()));
        net.add_layer(Relu::new());
        net.add_layer(Dense::new(64, 10, init::uniform(-0.1, 0.1, &mut *rng), init::zeros()));
        net.add_layer(Sigmoid::new());

        let config = TrainConfig::default()
            .with_epochs(1)
            .with_batch_size(64)
            .with_optimizer(OptimizerKind::adam())
            .with_schedule(schedule);
        let ms = time_ms(3, || {
            let _ = net.train(&x, &y, &config);
        });
        println!("{:<18} {:>12.3} ms/epoch ({} samples)", schedule.to_string(), ms, samples);
    }
}

fn main() {
    println!("Matrix Multiplication Benchmarks");
    println!("=================================");

    let mut rng = StdRng::seed_from_u64(0);

    // (name, m, k, n, iterations)
    let benchmarks = [
        ("Small Square", 32, 32, 32, 100),
        ("Medium Square", 256, 256, 256, 10),
        ("MNIST Batch (64)", 64, 784, 128, 50),
        ("Hidden Layer", 64, 128, 64, 100),
        ("Tall Matrix", 1000, 100, 10, 50),
    ];

    for (name, m, k, n, iterations) in benchmarks {
        let results = benchmark_shape(m, k, n, iterations, &mut rng);
        print_results_table(name, m, k, n, &results);
    }

    println!("\nTraining epoch (784-128-64-10)");
    println!("{}", "-".repeat(42));
    benchmark_training_epoch(&mut rng);

    println!("\n{}", "=".repeat(42));
    println!("Benchmark complete!");
}
