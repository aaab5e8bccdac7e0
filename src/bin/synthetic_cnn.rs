// synthetic_cnn.rs
// Trains a small CNN on random synthetic images using explicit-loop kernels.
//
// Usage:
//   synthetic_cnn [architecture.json [training.json]]
//
// With no arguments the built-in topology and hyperparameters below are
// used. Output:
//   - per-sample class probabilities after training
//   - correct vs predicted labels and the accuracy tally
//   - logs/synthetic_run.txt (parameters, final loss, accuracy, time)

use std::env;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::process;
use std::time::Instant;

use convnet::config::{self, TrainingConfig};
use convnet::layers::{Conv2D, DenseLayer, MaxPool2D};
use convnet::loss::cross_entropy_loss;
use convnet::sequential::Sequential;
use convnet::tensor::Tensor;
use convnet::utils::{Activation, SimpleRng};

// Synthetic dataset: random pixels, random labels. The model is expected to
// memorize, not generalize.
const IMG_H: usize = 20;
const IMG_W: usize = 20;
const IMG_C: usize = 1;
const TOTAL_IMAGES: usize = 10;
const CLASSES: usize = 5;

// Training hyperparameters used when no training config file is given.
const EPOCHS: usize = 20;
const BATCH_SIZE: usize = 32;
const LEARNING_RATE: f32 = 0.01;

fn default_training() -> TrainingConfig {
    TrainingConfig {
        epochs: EPOCHS,
        batch_size: BATCH_SIZE,
        learning_rate: LEARNING_RATE,
    }
}

// Built-in topology: conv 16 -> pool -> conv 32 -> pool -> conv 64,
// then dense 32 (relu) -> dense CLASSES (softmax).
fn build_default_model(rng: &mut SimpleRng) -> Sequential {
    let mut model = Sequential::new();
    model.add_spatial_layer(Box::new(Conv2D::new(IMG_C, 16, 3, 3, rng)));
    model.add_spatial_layer(Box::new(MaxPool2D::new()));
    model.add_spatial_layer(Box::new(Conv2D::new(16, 32, 3, 3, rng)));
    model.add_spatial_layer(Box::new(MaxPool2D::new()));
    model.add_spatial_layer(Box::new(Conv2D::new(32, 64, 3, 3, rng)));
    // 20x20 -> 18 -> 9 -> 7 -> 3 -> 1, so the flattened width is 64
    model.add_dense_layer(DenseLayer::new(64, 32, Activation::Relu, rng));
    model.add_dense_layer(DenseLayer::new(32, CLASSES, Activation::Softmax, rng));
    model
}

// Uniform-random pixel values in [0, 1), one label per image.
fn generate_dataset(
    rng: &mut SimpleRng,
    height: usize,
    width: usize,
    channels: usize,
    classes: usize,
) -> (Tensor, Vec<usize>) {
    let mut images = Tensor::zeros(TOTAL_IMAGES, height, width, channels);
    for value in images.data_mut().iter_mut() {
        *value = rng.gen_usize(256) as f32 / 255.0;
    }
    let labels: Vec<usize> = (0..TOTAL_IMAGES).map(|_| rng.gen_usize(classes)).collect();
    (images, labels)
}

fn main() {
    let mut rng = SimpleRng::new(1);
    rng.reseed_from_time();

    let arch_path = env::args().nth(1);
    let (mut model, img_dims) = match &arch_path {
        Some(path) => {
            let network = config::load_network(path).unwrap_or_else(|e| {
                eprintln!("{}: {}", path, e);
                process::exit(1);
            });
            let model = config::build_network(&network, &mut rng).unwrap_or_else(|e| {
                eprintln!("{}: {}", path, e);
                process::exit(1);
            });
            let dims = (network.input.height, network.input.width, network.input.channels);
            (model, dims)
        }
        None => (build_default_model(&mut rng), (IMG_H, IMG_W, IMG_C)),
    };

    let training = match env::args().nth(2) {
        Some(path) => config::load_training(&path).unwrap_or_else(|e| {
            eprintln!("{}: {}", path, e);
            process::exit(1);
        }),
        None => default_training(),
    };

    let classes = model.num_classes().unwrap_or(CLASSES);
    let (images, labels) = generate_dataset(&mut rng, img_dims.0, img_dims.1, img_dims.2, classes);

    println!("Total trainable parameters = {}", model.parameter_count());
    println!(
        "Training: epochs={} batch={} lr={}",
        training.epochs, training.batch_size, training.learning_rate
    );

    let start_time = Instant::now();
    let predictions = model
        .fit(
            training.epochs,
            &images,
            &labels,
            training.batch_size,
            training.learning_rate,
        )
        .unwrap_or_else(|e| {
            eprintln!("training failed: {}", e);
            process::exit(1);
        });
    let elapsed = start_time.elapsed().as_secs_f32();

    for row in predictions.data.chunks_exact(predictions.cols) {
        let formatted: Vec<String> = row.iter().map(|p| format!("{:.12}", p)).collect();
        println!("{}", formatted.join(" "));
    }

    let predicted = predictions.argmax_rows();
    println!("correct labels =   {:?}", labels);
    println!("predicted labels = {:?}", predicted);

    let correct = predicted
        .iter()
        .zip(labels.iter())
        .filter(|(p, l)| p == l)
        .count();
    let final_loss = cross_entropy_loss(&predictions, &labels);
    println!("{} / {} correct", correct, TOTAL_IMAGES);
    println!("Total time = {:.3}s", elapsed);

    fs::create_dir_all("./logs").ok();
    if let Ok(file) = File::create("./logs/synthetic_run.txt") {
        let mut log = BufWriter::new(file);
        writeln!(
            log,
            "parameters={} final_loss={:.6} correct={}/{} time={:.3}",
            model.parameter_count(),
            final_loss,
            correct,
            TOTAL_IMAGES,
            elapsed
        )
        .ok();
    }
}
