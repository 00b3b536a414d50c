use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::model::{Gradients, Hyperparams, Mlp};

/// Multiplicative decay applied to the learning rate every `DECAY_STEPS`
/// optimizer steps, continuously (not staircased).
const DECAY_RATE: f32 = 0.90;
const DECAY_STEPS: f32 = 1000.0;

const BETA1: f32 = 0.9;
const BETA2: f32 = 0.999;
const EPSILON: f32 = 1e-8;

/// First and second moment estimates for one weight matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MomentPair {
    m: Array2<f32>,
    v: Array2<f32>,
}

impl MomentPair {
    fn zeros(shape: (usize, usize)) -> Self {
        Self {
            m: Array2::zeros(shape),
            v: Array2::zeros(shape),
        }
    }
}

/// Moment estimates for a scalar bias.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
struct ScalarMoments {
    m: f32,
    v: f32,
}

/// Adam with an exponentially decayed learning rate:
/// `lr(step) = base_lr * 0.90^(step / 1000)`.
///
/// `global_step` counts completed updates, increments by exactly one per
/// [`Adam::step`], and is serialized with the moments so a restored run
/// resumes both the schedule and the bias correction where it left off.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Adam {
    base_lr: f32,
    global_step: u64,
    w1: MomentPair,
    w2: MomentPair,
    w3: MomentPair,
    b1: ScalarMoments,
    b2: ScalarMoments,
    b3: ScalarMoments,
}

impl Adam {
    pub fn new(hps: &Hyperparams) -> Self {
        let [h1, h2] = hps.hidden;
        Self {
            base_lr: hps.learning_rate,
            global_step: 0,
            w1: MomentPair::zeros((hps.x_size, h1)),
            w2: MomentPair::zeros((h1, h2)),
            w3: MomentPair::zeros((h2, hps.y_size)),
            b1: ScalarMoments::default(),
            b2: ScalarMoments::default(),
            b3: ScalarMoments::default(),
        }
    }

    pub fn global_step(&self) -> u64 {
        self.global_step
    }

    /// Learning rate at the current step, before the next update.
    pub fn learning_rate(&self) -> f32 {
        self.base_lr * DECAY_RATE.powf(self.global_step as f32 / DECAY_STEPS)
    }

    /// Applies one Adam update to every parameter and advances the step
    /// counter by one.
    pub fn step(&mut self, model: &mut Mlp, grads: &Gradients) {
        let lr = self.learning_rate();
        self.global_step += 1;
        let t = self.global_step as i32;
        let c1 = 1.0 - BETA1.powi(t);
        let c2 = 1.0 - BETA2.powi(t);

        update_matrix(&mut model.w1, &grads.w1, &mut self.w1, lr, c1, c2);
        update_matrix(&mut model.w2, &grads.w2, &mut self.w2, lr, c1, c2);
        update_matrix(&mut model.w3, &grads.w3, &mut self.w3, lr, c1, c2);
        update_scalar(&mut model.b1, grads.b1, &mut self.b1, lr, c1, c2);
        update_scalar(&mut model.b2, grads.b2, &mut self.b2, lr, c1, c2);
        update_scalar(&mut model.b3, grads.b3, &mut self.b3, lr, c1, c2);
    }
}

fn update_matrix(
    param: &mut Array2<f32>,
    grad: &Array2<f32>,
    state: &mut MomentPair,
    lr: f32,
    c1: f32,
    c2: f32,
) {
    state
        .m
        .zip_mut_with(grad, |m, &g| *m = BETA1 * *m + (1.0 - BETA1) * g);
    state
        .v
        .zip_mut_with(grad, |v, &g| *v = BETA2 * *v + (1.0 - BETA2) * g * g);
    ndarray::Zip::from(param)
        .and(&state.m)
        .and(&state.v)
        .for_each(|p, &m, &v| {
            let m_hat = m / c1;
            let v_hat = v / c2;
            *p -= lr * m_hat / (v_hat.sqrt() + EPSILON);
        });
}

fn update_scalar(
    param: &mut f32,
    grad: f32,
    state: &mut ScalarMoments,
    lr: f32,
    c1: f32,
    c2: f32,
) {
    state.m = BETA1 * state.m + (1.0 - BETA1) * grad;
    state.v = BETA2 * state.v + (1.0 - BETA2) * grad * grad;
    let m_hat = state.m / c1;
    let v_hat = state.v / c2;
    *param -= lr * m_hat / (v_hat.sqrt() + EPSILON);
}
