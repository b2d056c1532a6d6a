//! Adam with per-parameter state keyed by parameter name.

use ndarray::{Array, ArrayD, Dimension, Zip};
use std::collections::HashMap;

pub const DEFAULT_LEARNING_RATE: f32 = 1e-4;

#[derive(Debug, Clone)]
struct Moments {
    m: ArrayD<f32>,
    v: ArrayD<f32>,
    step: i32,
}

#[derive(Debug, Clone)]
pub struct Adam {
    pub learning_rate: f32,
    pub beta1: f32,
    pub beta2: f32,
    pub eps: f32,
    state: HashMap<String, Moments>,
}

impl Default for Adam {
    fn default() -> Self {
        Self::new(DEFAULT_LEARNING_RATE)
    }
}

impl Adam {
    pub fn new(learning_rate: f32) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            state: HashMap::new(),
        }
    }

    /// Update `param` in place from `grad`. Moments for `name` are created
    /// on first use and reset if the parameter changes shape.
    pub fn step<D: Dimension>(&mut self, name: &str, param: &mut Array<f32, D>, grad: &Array<f32, D>) {
        debug_assert_eq!(param.shape(), grad.shape(), "{name}: param/grad shape");

        let state = self
            .state
            .entry(name.to_string())
            .or_insert_with(|| Moments {
                m: ArrayD::zeros(grad.shape()),
                v: ArrayD::zeros(grad.shape()),
                step: 0,
            });
        if state.m.shape() != grad.shape() {
            log::warn!("{}: shape changed, resetting optimizer state", name);
            state.m = ArrayD::zeros(grad.shape());
            state.v = ArrayD::zeros(grad.shape());
            state.step = 0;
        }
        state.step += 1;

        let (b1, b2, eps) = (self.beta1, self.beta2, self.eps);
        let bias1 = 1.0 - b1.powi(state.step);
        let bias2_sqrt = (1.0 - b2.powi(state.step)).sqrt();
        let step_size = self.learning_rate / bias1;

        Zip::from(param.view_mut().into_dyn())
            .and(grad.view().into_dyn())
            .and(&mut state.m)
            .and(&mut state.v)
            .for_each(|p, &g, m, v| {
                *m = b1 * *m + (1.0 - b1) * g;
                *v = b2 * *v + (1.0 - b2) * g * g;
                let denom = v.sqrt() / bias2_sqrt + eps;
                *p -= step_size * *m / denom;
            });
    }

    /// Steps taken for `name`, 0 if never updated.
    pub fn steps(&self, name: &str) -> i32 {
        self.state.get(name).map_or(0, |s| s.step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1};

    #[test]
    fn test_first_step_moves_by_learning_rate() {
        // With bias correction the first step is lr * sign(g).
        let mut adam = Adam::new(0.1);
        let mut w = array![1.0f32, -1.0, 0.5];
        let g = array![2.0f32, -3.0, 0.0];
        adam.step("w", &mut w, &g);
        assert!((w[0] - 0.9).abs() < 1e-5);
        assert!((w[1] + 0.9).abs() < 1e-5);
        assert_eq!(w[2], 0.5);
        assert_eq!(adam.steps("w"), 1);
    }

    #[test]
    fn test_state_is_per_name() {
        let mut adam = Adam::new(0.01);
        let mut a = Array1::<f32>::ones(2);
        let mut b = ndarray::Array2::<f32>::ones((2, 2));
        adam.step("a", &mut a, &Array1::ones(2));
        adam.step("a", &mut a, &Array1::ones(2));
        adam.step("b", &mut b, &ndarray::Array2::ones((2, 2)));
        assert_eq!(adam.steps("a"), 2);
        assert_eq!(adam.steps("b"), 1);
        assert_eq!(adam.steps("c"), 0);
    }

    #[test]
    fn test_minimizes_quadratic() {
        let mut adam = Adam::new(0.05);
        let mut x = array![3.0f32, -2.0];
        for _ in 0..2000 {
            let g = &x * 2.0;
            adam.step("x", &mut x, &g);
        }
        assert!(x.iter().all(|v| v.abs() < 0.1), "{x:?}");
    }
}
