use std::env;
use std::path::PathBuf;

use anyhow::Result;
use ndarray::Array2;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use tiny_mlp::{Hyperparams, InMemorySource, Trainer, TrainerConfig};

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("train") => {
            let resume = args.get(2).map(PathBuf::from);
            run_train(resume)
        }
        _ => {
            println!("Usage: cargo run -- train [checkpoint]");
            println!("Example commands:");
            println!("  cargo run -- train");
            println!("  cargo run -- train models/step-1000-loss-1.5-mark-hidden_layer_32_epoch_10.bin");
            Ok(())
        }
    }
}

fn run_train(resume: Option<PathBuf>) -> Result<()> {
    let hps = Hyperparams::default();
    let mut rng = SmallRng::seed_from_u64(0);

    let (x, y) = synthetic_corpus(&hps, &mut rng);
    let mut source = InMemorySource::new(x, y, hps.batch_size)?;

    let config = TrainerConfig {
        resume,
        ..TrainerConfig::default()
    };
    let mut trainer = Trainer::new(hps, config, &mut rng)?;
    match trainer.train(&mut source)? {
        Some(path) => println!("best checkpoint: {}", path.display()),
        None => println!("no checkpoint written"),
    }
    Ok(())
}

/// A toy linearly-separable corpus: class 0 when the features sum to a
/// non-negative value, the last class otherwise.
fn synthetic_corpus(hps: &Hyperparams, rng: &mut SmallRng) -> (Array2<f32>, Array2<f32>) {
    let x = Array2::from_shape_fn((hps.total_size, hps.x_size), |_| rng.gen_range(-1.0..1.0));
    let mut y = Array2::zeros((hps.total_size, hps.y_size));
    for (row, sample) in x.outer_iter().enumerate() {
        let class = if sample.sum() >= 0.0 { 0 } else { hps.y_size - 1 };
        y[[row, class]] = 1.0;
    }
    (x, y)
}
