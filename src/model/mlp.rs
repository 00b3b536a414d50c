use ndarray::{Array2, ArrayView2};
use ndarray_rand::RandomExt;
use rand::rngs::SmallRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use super::config::Hyperparams;
use super::error::ModelError;

/// Negative-side slope of the leaky-ReLU activation.
const LEAKY_SLOPE: f32 = 0.2;
/// Standard deviation of the truncated-normal weight initializer.
const INIT_STDDEV: f32 = 0.05;
/// Number of trainable parameters entering the mean L2 penalty.
const PARAM_COUNT: f32 = 6.0;

/// Normal distribution with samples outside two standard deviations
/// rejected and redrawn.
#[derive(Debug, Clone, Copy)]
struct TruncatedNormal {
    inner: Normal<f32>,
    bound: f32,
}

impl TruncatedNormal {
    fn new(stddev: f32) -> Result<Self, ModelError> {
        let inner =
            Normal::new(0.0, stddev).map_err(|e| ModelError::Init(e.to_string()))?;
        Ok(Self {
            inner,
            bound: 2.0 * stddev,
        })
    }
}

impl Distribution<f32> for TruncatedNormal {
    fn sample<R: rand::Rng + ?Sized>(&self, rng: &mut R) -> f32 {
        loop {
            let x = self.inner.sample(rng);
            if x.abs() <= self.bound {
                return x;
            }
        }
    }
}

/// The fixed 3-layer network: two affine + leaky-ReLU hidden layers and a
/// raw affine output. Weight matrices are rank-2; biases are scalars, added
/// to every element of the layer's pre-activation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mlp {
    pub w1: Array2<f32>,
    pub b1: f32,
    pub w2: Array2<f32>,
    pub b2: f32,
    pub w3: Array2<f32>,
    pub b3: f32,
    regularization: f32,
}

/// Loss gradients with respect to every parameter of [`Mlp`], produced by
/// one backward pass and consumed by the optimizer.
#[derive(Debug, Clone)]
pub struct Gradients {
    pub w1: Array2<f32>,
    pub b1: f32,
    pub w2: Array2<f32>,
    pub b2: f32,
    pub w3: Array2<f32>,
    pub b3: f32,
}

impl Mlp {
    /// Initializes weights from a truncated normal (stddev 0.05) using the
    /// caller's seeded RNG; biases start at zero.
    pub fn new(hps: &Hyperparams, rng: &mut SmallRng) -> Result<Self, ModelError> {
        hps.validate()?;
        let dist = TruncatedNormal::new(INIT_STDDEV)?;
        let [h1, h2] = hps.hidden;
        Ok(Self {
            w1: Array2::random_using((hps.x_size, h1), dist, rng),
            b1: 0.0,
            w2: Array2::random_using((h1, h2), dist, rng),
            b2: 0.0,
            w3: Array2::random_using((h2, hps.y_size), dist, rng),
            b3: 0.0,
            regularization: hps.regularization,
        })
    }

    /// Forward pass: `[batch, x_size]` in, raw logits `[batch, y_size]` out.
    pub fn forward(&self, x: ArrayView2<f32>) -> Result<Array2<f32>, ModelError> {
        self.check_input(&x)?;
        let a1 = (x.dot(&self.w1) + self.b1).mapv(leaky_relu);
        let a2 = (a1.dot(&self.w2) + self.b2).mapv(leaky_relu);
        Ok(a2.dot(&self.w3) + self.b3)
    }

    /// Mean softmax cross-entropy against one-hot/soft targets, plus
    /// `regularization * mean(l2(p))` over all six parameters, where
    /// `l2(p) = sum(p^2) / 2`.
    pub fn loss(&self, logits: &Array2<f32>, y: ArrayView2<f32>) -> Result<f32, ModelError> {
        if logits.dim() != y.dim() {
            return Err(ModelError::Shape(format!(
                "logits {:?} vs targets {:?}",
                logits.dim(),
                y.dim()
            )));
        }
        Ok(softmax_cross_entropy(logits, &y) + self.regularization * self.l2_mean())
    }

    /// Forward pass, loss, and analytic gradients for one batch.
    pub fn backward(
        &self,
        x: ArrayView2<f32>,
        y: ArrayView2<f32>,
    ) -> Result<(f32, Gradients), ModelError> {
        self.check_input(&x)?;
        let z1 = x.dot(&self.w1) + self.b1;
        let a1 = z1.mapv(leaky_relu);
        let z2 = a1.dot(&self.w2) + self.b2;
        let a2 = z2.mapv(leaky_relu);
        let logits = a2.dot(&self.w3) + self.b3;
        let loss = self.loss(&logits, y)?;

        // Mean cross-entropy over the batch: d(loss)/d(logits) = (p - y) / n.
        let batch = x.nrows() as f32;
        let mut dz3 = softmax_rows(&logits);
        dz3 -= &y;
        dz3.mapv_inplace(|v| v / batch);

        let reg = self.regularization / PARAM_COUNT;
        let gw3 = a2.t().dot(&dz3) + &self.w3 * reg;
        let gb3 = dz3.sum() + reg * self.b3;

        let mut dz2 = dz3.dot(&self.w3.t());
        apply_leaky_mask(&mut dz2, &z2);
        let gw2 = a1.t().dot(&dz2) + &self.w2 * reg;
        let gb2 = dz2.sum() + reg * self.b2;

        let mut dz1 = dz2.dot(&self.w2.t());
        apply_leaky_mask(&mut dz1, &z1);
        let gw1 = x.t().dot(&dz1) + &self.w1 * reg;
        let gb1 = dz1.sum() + reg * self.b1;

        Ok((
            loss,
            Gradients {
                w1: gw1,
                b1: gb1,
                w2: gw2,
                b2: gb2,
                w3: gw3,
                b3: gb3,
            },
        ))
    }

    /// Mean of the six per-parameter L2 terms.
    fn l2_mean(&self) -> f32 {
        let l2 = |w: &Array2<f32>| w.iter().map(|v| v * v).sum::<f32>() / 2.0;
        let total = l2(&self.w1)
            + l2(&self.w2)
            + l2(&self.w3)
            + self.b1 * self.b1 / 2.0
            + self.b2 * self.b2 / 2.0
            + self.b3 * self.b3 / 2.0;
        total / PARAM_COUNT
    }

    fn check_input(&self, x: &ArrayView2<f32>) -> Result<(), ModelError> {
        let expected = self.w1.nrows();
        if x.ncols() != expected {
            return Err(ModelError::Shape(format!(
                "input has {} features, model expects {}",
                x.ncols(),
                expected
            )));
        }
        Ok(())
    }
}

#[inline]
fn leaky_relu(x: f32) -> f32 {
    if x > 0.0 {
        x
    } else {
        LEAKY_SLOPE * x
    }
}

/// Scales upstream gradients by the leaky-ReLU derivative at the cached
/// pre-activation.
fn apply_leaky_mask(grad: &mut Array2<f32>, pre_activation: &Array2<f32>) {
    grad.zip_mut_with(pre_activation, |d, &z| {
        if z <= 0.0 {
            *d *= LEAKY_SLOPE;
        }
    });
}

/// Row-wise softmax, stabilized by the row maximum.
fn softmax_rows(logits: &Array2<f32>) -> Array2<f32> {
    let mut out = logits.clone();
    for mut row in out.rows_mut() {
        let max = row.fold(f32::NEG_INFINITY, |a, &b| a.max(b));
        let mut sum = 0.0f32;
        for v in row.iter_mut() {
            *v = (*v - max).exp();
            sum += *v;
        }
        for v in row.iter_mut() {
            *v /= sum;
        }
    }
    out
}

/// Mean over the batch of `-sum_j y_j * log_softmax(logits)_j`.
fn softmax_cross_entropy(logits: &Array2<f32>, y: &ArrayView2<f32>) -> f32 {
    let mut total = 0.0f32;
    for (row, targets) in logits.rows().into_iter().zip(y.rows()) {
        let max = row.fold(f32::NEG_INFINITY, |a, &b| a.max(b));
        let log_sum_exp = row.iter().map(|&v| (v - max).exp()).sum::<f32>().ln();
        for (&logit, &t) in row.iter().zip(targets.iter()) {
            total -= t * (logit - max - log_sum_exp);
        }
    }
    total / logits.nrows() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;

    fn small_hps() -> Hyperparams {
        Hyperparams {
            batch_size: 2,
            x_size: 3,
            hidden: [4, 4],
            y_size: 2,
            learning_rate: 0.01,
            regularization: 0.05,
            epochs: 1,
            total_size: 4,
        }
    }

    #[test]
    fn forward_output_shape() {
        let hps = small_hps();
        let mut rng = SmallRng::seed_from_u64(0);
        let model = Mlp::new(&hps, &mut rng).unwrap();

        let x = Array2::<f32>::zeros((5, hps.x_size));
        let logits = model.forward(x.view()).unwrap();
        assert_eq!(logits.dim(), (5, hps.y_size));
    }

    #[test]
    fn forward_known_weights() {
        // Identity weights, zero biases: each layer only applies leaky-ReLU.
        let model = Mlp {
            w1: array![[1.0, 0.0], [0.0, 1.0]],
            b1: 0.0,
            w2: array![[1.0, 0.0], [0.0, 1.0]],
            b2: 0.0,
            w3: array![[1.0, 0.0], [0.0, 1.0]],
            b3: 0.0,
            regularization: 0.0,
        };

        let x = array![[1.0, -1.0]];
        let logits = model.forward(x.view()).unwrap();

        // leaky(-1) = -0.2, leaky(-0.2) = -0.04; no activation on the output.
        let expected = array![[1.0, -0.04]];
        for (o, e) in logits.iter().zip(expected.iter()) {
            assert!((o - e).abs() < 1e-6, "got {o}, expected {e}");
        }
    }

    #[test]
    fn wrong_feature_count_fails_fast() {
        let hps = small_hps();
        let mut rng = SmallRng::seed_from_u64(0);
        let model = Mlp::new(&hps, &mut rng).unwrap();

        let x = Array2::<f32>::zeros((2, hps.x_size + 1));
        assert!(matches!(
            model.forward(x.view()),
            Err(ModelError::Shape(_))
        ));
    }

    #[test]
    fn mismatched_targets_fail_fast() {
        let hps = small_hps();
        let mut rng = SmallRng::seed_from_u64(0);
        let model = Mlp::new(&hps, &mut rng).unwrap();

        let x = Array2::<f32>::zeros((2, hps.x_size));
        let y = Array2::<f32>::zeros((2, hps.y_size + 3));
        assert!(matches!(
            model.backward(x.view(), y.view()),
            Err(ModelError::Shape(_))
        ));
    }

    #[test]
    fn loss_is_finite_and_bounded_below_by_penalty() {
        let hps = small_hps();
        let mut rng = SmallRng::seed_from_u64(7);
        let model = Mlp::new(&hps, &mut rng).unwrap();

        let x = array![[0.3, -0.2, 0.9], [1.0, 0.5, -0.4]];
        let y = array![[1.0, 0.0], [0.0, 1.0]];
        let logits = model.forward(x.view()).unwrap();
        let loss = model.loss(&logits, y.view()).unwrap();

        assert!(loss.is_finite());
        // Cross-entropy is non-negative, so the penalty is a lower bound.
        assert!(loss >= hps.regularization * model.l2_mean());
    }

    #[test]
    fn seeded_init_is_deterministic() {
        let hps = small_hps();
        let a = Mlp::new(&hps, &mut SmallRng::seed_from_u64(42)).unwrap();
        let b = Mlp::new(&hps, &mut SmallRng::seed_from_u64(42)).unwrap();
        assert_eq!(a.w1, b.w1);
        assert_eq!(a.w2, b.w2);
        assert_eq!(a.w3, b.w3);
    }

    #[test]
    fn init_is_truncated_at_two_stddev() {
        let hps = Hyperparams {
            hidden: [64, 64],
            x_size: 64,
            ..small_hps()
        };
        let model = Mlp::new(&hps, &mut SmallRng::seed_from_u64(3)).unwrap();
        let bound = 2.0 * INIT_STDDEV + 1e-6;
        assert!(model.w1.iter().all(|v| v.abs() <= bound));
        assert!(model.w2.iter().all(|v| v.abs() <= bound));
        assert_eq!(model.b1, 0.0);
        assert_eq!(model.b2, 0.0);
        assert_eq!(model.b3, 0.0);
    }

    #[test]
    fn gradients_match_finite_differences() {
        let hps = small_hps();
        let mut rng = SmallRng::seed_from_u64(11);
        let model = Mlp::new(&hps, &mut rng).unwrap();

        let x = array![[0.5, -0.3, 0.8], [-0.9, 0.2, 0.4]];
        let y = array![[0.0, 1.0], [1.0, 0.0]];
        let (_, grads) = model.backward(x.view(), y.view()).unwrap();

        let eps = 2e-3_f32;
        let numeric = |plus: &Mlp, minus: &Mlp| -> f32 {
            let lp = plus.loss(&plus.forward(x.view()).unwrap(), y.view()).unwrap();
            let lm = minus
                .loss(&minus.forward(x.view()).unwrap(), y.view())
                .unwrap();
            (lp - lm) / (2.0 * eps)
        };

        // Spot-check one entry of each weight matrix.
        for (field, idx, analytic) in [
            (0usize, [0, 1], grads.w1[[0, 1]]),
            (1, [1, 2], grads.w2[[1, 2]]),
            (2, [3, 0], grads.w3[[3, 0]]),
        ] {
            let mut plus = model.clone();
            let mut minus = model.clone();
            match field {
                0 => {
                    plus.w1[idx] += eps;
                    minus.w1[idx] -= eps;
                }
                1 => {
                    plus.w2[idx] += eps;
                    minus.w2[idx] -= eps;
                }
                _ => {
                    plus.w3[idx] += eps;
                    minus.w3[idx] -= eps;
                }
            }
            let expected = numeric(&plus, &minus);
            assert!(
                (analytic - expected).abs() < 5e-3,
                "weight grad {analytic} vs finite difference {expected}"
            );
        }

        // And the scalar biases.
        for (field, analytic) in [(0usize, grads.b1), (1, grads.b2), (2, grads.b3)] {
            let mut plus = model.clone();
            let mut minus = model.clone();
            match field {
                0 => {
                    plus.b1 += eps;
                    minus.b1 -= eps;
                }
                1 => {
                    plus.b2 += eps;
                    minus.b2 -= eps;
                }
                _ => {
                    plus.b3 += eps;
                    minus.b3 -= eps;
                }
            }
            let expected = numeric(&plus, &minus);
            assert!(
                (analytic - expected).abs() < 5e-3,
                "bias grad {analytic} vs finite difference {expected}"
            );
        }
    }

    #[test]
    fn softmax_rows_sum_to_one() {
        let logits = array![[1.0, 2.0, 3.0], [-5.0, 0.0, 5.0]];
        let p = softmax_rows(&logits);
        for row in p.rows() {
            let sum: f32 = row.iter().sum();
            assert!((sum - 1.0).abs() < 1e-5);
        }
    }
}
