use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ffnn::data::{images_to_tensor, one_hot, MnistCsv, IMAGE_PIXELS, NUM_CLASSES};
use ffnn::nn::init;
use ffnn::{Dense, LossKind, NeuralNetwork, OptimizerKind, OptimizerSchedule, Relu, Sigmoid, TrainConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "Feed-forward digit classifier", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train the 784-128-64-10 classifier and save it
    Train {
        #[arg(long, default_value = "mnist/mnist_train.csv")]
        train_csv: PathBuf,

        #[arg(long, default_value = "mnist/mnist_test.csv")]
        test_csv: PathBuf,

        #[arg(long, default_value_t = 100)]
        epochs: usize,

        #[arg(long, default_value_t = 64)]
        batch_size: usize,

        #[arg(long, default_value_t = 0.01)]
        lr: f32,

        #[arg(long, default_value_t = LossKind::Bce)]
        loss: LossKind,

        #[arg(long, default_value_t = OptimizerKind::adam())]
        optimizer: OptimizerKind,

        /// Defaults to $FFNN_SCHEDULE, then per-batch
        #[arg(long)]
        schedule: Option<OptimizerSchedule>,

        /// Seed for the weight initialization
        #[arg(long, default_value_t = 42)]
        seed: u64,

        #[arg(long, default_value = "model.nn")]
        model_out: PathBuf,
    },

    /// Report the accuracy of a saved model on a test set
    Evaluate {
        #[arg(long, default_value = "mnist/mnist_test.csv")]
        test_csv: PathBuf,

        #[arg(long, default_value = "model.nn")]
        model: PathBuf,
    },

    /// Print one training sample as ASCII art
    Inspect {
        #[arg(long, default_value = "mnist/mnist_train.csv")]
        csv: PathBuf,

        #[arg(long, default_value_t = 0)]
        index: usize,
    },
}

fn build_classifier(seed: u64) -> NeuralNetwork {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut net = NeuralNetwork::new();
    net.add_layer(Dense::new(IMAGE_PIXELS, 128, init::uniform(-0.1, 0.1, &mut rng), init::zeros()));
    net.add_layer(Relu::new());
    net.add_layer(Dense::new(128, 64, init::uniform(-0.1, 0.1, &mut rng), init::zeros()));
    net.add_layer(Relu::new());
    net.add_layer(Dense::new(64, NUM_CLASSES, init::uniform(-0.1, 0.1, &mut rng), init::zeros()));
    net.add_layer(Sigmoid::new());
    net
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    match args.command {
        Command::Train {
            train_csv,
            test_csv,
            epochs,
            batch_size,
            lr,
            loss,
            optimizer,
            schedule,
            seed,
            model_out,
        } => {
            let mut loader = MnistCsv::new();
            loader.load_train(&train_csv)?;
            loader.load_test(&test_csv)?;

            let (images, labels) = loader.train_data();
            let x_train = images_to_tensor(images)?;
            let y_train = one_hot(labels, NUM_CLASSES)?;

            let mut config = TrainConfig::default()
                .with_epochs(epochs)
                .with_batch_size(batch_size)
                .with_learning_rate(lr)
                .with_loss(loss)
                .with_optimizer(optimizer);
            if let Some(schedule) = schedule {
                config = config.with_schedule(schedule);
            }

            let mut net = build_classifier(seed);
            info!(
                samples = loader.train_len(),
                epochs,
                batch_size,
                lr,
                %loss,
                %optimizer,
                schedule = %config.schedule,
                "training"
            );
            let start = std::time::Instant::now();
            let report = net.train(&x_train, &y_train, &config)?;
            info!(
                seconds = start.elapsed().as_secs_f64(),
                final_loss = report.final_loss(),
                "training finished"
            );

            let (images, labels) = loader.test_data();
            let accuracy = net.evaluate_accuracy(&images_to_tensor(images)?, labels)?;
            println!("Test accuracy: {:.2} %", accuracy * 100.0);

            net.save(&model_out)?;
            println!("Model saved to {}", model_out.display());
        }

        Command::Evaluate { test_csv, model } => {
            let mut net = NeuralNetwork::new();
            net.load(&model)?;

            let mut loader = MnistCsv::new();
            loader.load_test(&test_csv)?;
            let (images, labels) = loader.test_data();
            let accuracy = net.evaluate_accuracy(&images_to_tensor(images)?, labels)?;
            println!("Test accuracy: {:.2} %", accuracy * 100.0);
        }

        Command::Inspect { csv, index } => {
            let mut loader = MnistCsv::new();
            loader.load_train(&csv)?;
            println!("Samples: {}", loader.train_len());
            match (loader.label(index, true), loader.render_sample(index, true)) {
                (Some(label), Some(art)) => {
                    println!("Label: {}", label);
                    print!("{}", art);
                }
                _ => println!("Index {} is out of range", index),
            }

            let batch = loader.next_batch(5);
            for (i, (image, label)) in batch.images.iter().zip(&batch.labels).enumerate() {
                println!("Batch sample {}: label = {}, pixels = {}", i, label, image.len());
            }
        }
    }

    Ok(())
}
