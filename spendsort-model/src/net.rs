//! Network: `Linear(in -> hidden) -> ReLU -> Linear(hidden -> out) -> softmax`.
//!
//! Rows are examples. Weights are stored `(out, in)` so the named parameter
//! layout matches the usual `fc.weight` / `fc.bias` convention.

use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone, PartialEq)]
pub struct Linear {
    pub weight: Array2<f32>,
    pub bias: Array1<f32>,
}

impl Linear {
    /// Uniform init in `[-1/sqrt(in), 1/sqrt(in))` for weight and bias.
    pub fn new(in_features: usize, out_features: usize, rng: &mut StdRng) -> Self {
        let bound = if in_features == 0 {
            0.0
        } else {
            1.0 / (in_features as f32).sqrt()
        };
        let mut sample = || {
            if bound > 0.0 {
                rng.random_range(-bound..bound)
            } else {
                0.0
            }
        };
        let weight = Array2::from_shape_simple_fn((out_features, in_features), &mut sample);
        let bias = Array1::from_shape_simple_fn(out_features, &mut sample);
        Self { weight, bias }
    }

    pub fn in_features(&self) -> usize {
        self.weight.ncols()
    }

    pub fn out_features(&self) -> usize {
        self.weight.nrows()
    }

    pub fn forward(&self, x: ArrayView2<'_, f32>) -> Array2<f32> {
        x.dot(&self.weight.t()) + &self.bias
    }
}

/// Intermediate values kept from a forward pass for the backward pass.
#[derive(Debug, Clone)]
pub struct Activations {
    pub pre_hidden: Array2<f32>,
    pub hidden: Array2<f32>,
    pub probs: Array2<f32>,
}

#[derive(Debug, Clone)]
pub struct Gradients {
    pub fc1_weight: Array2<f32>,
    pub fc1_bias: Array1<f32>,
    pub fc2_weight: Array2<f32>,
    pub fc2_bias: Array1<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Net {
    pub fc1: Linear,
    pub fc2: Linear,
}

impl Net {
    pub fn new(input_size: usize, hidden_size: usize, output_size: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let fc1 = Linear::new(input_size, hidden_size, &mut rng);
        let fc2 = Linear::new(hidden_size, output_size, &mut rng);
        Self { fc1, fc2 }
    }

    /// Class probabilities, one row per input row.
    pub fn forward(&self, x: ArrayView2<'_, f32>) -> Array2<f32> {
        self.forward_cached(x).probs
    }

    pub fn forward_cached(&self, x: ArrayView2<'_, f32>) -> Activations {
        let pre_hidden = self.fc1.forward(x);
        let hidden = pre_hidden.mapv(|v| v.max(0.0));
        let probs = softmax_rows(self.fc2.forward(hidden.view()));
        Activations {
            pre_hidden,
            hidden,
            probs,
        }
    }

    /// Parameter gradients given dLoss/dProbs.
    pub fn backward(
        &self,
        x: ArrayView2<'_, f32>,
        acts: &Activations,
        grad_probs: ArrayView2<'_, f32>,
    ) -> Gradients {
        let p = &acts.probs;
        // softmax Jacobian-vector product, row-wise: p * (g - <g, p>)
        let inner = (&grad_probs * p).sum_axis(Axis(1)).insert_axis(Axis(1));
        let dz2 = p * &(&grad_probs - &inner);

        let fc2_weight = dz2.t().dot(&acts.hidden);
        let fc2_bias = dz2.sum_axis(Axis(0));

        let relu_mask = acts.pre_hidden.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 });
        let dz1 = dz2.dot(&self.fc2.weight) * &relu_mask;

        let fc1_weight = dz1.t().dot(&x);
        let fc1_bias = dz1.sum_axis(Axis(0));

        Gradients {
            fc1_weight,
            fc1_bias,
            fc2_weight,
            fc2_bias,
        }
    }
}

/// Numerically stable softmax over each row.
pub fn softmax_rows(mut z: Array2<f32>) -> Array2<f32> {
    for mut row in z.rows_mut() {
        let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        if sum > 0.0 {
            row /= sum;
        }
    }
    z
}

/// Sum of squared errors over every cell.
pub fn sse_loss(pred: ArrayView2<'_, f32>, target: ArrayView2<'_, f32>) -> f32 {
    pred.iter()
        .zip(target.iter())
        .map(|(p, y)| {
            let d = p - y;
            d * d
        })
        .sum()
}

/// dLoss/dPred for `sse_loss`.
pub fn sse_grad(pred: ArrayView2<'_, f32>, target: ArrayView2<'_, f32>) -> Array2<f32> {
    (&pred - &target) * 2.0
}
