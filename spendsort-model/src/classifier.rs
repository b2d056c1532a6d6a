//! Classifier: owns the network, trains it on encoded datasets, saves and
//! restores its parameters.
//!
//! Weights file format: JSON object mapping parameter name to a flat,
//! row-major `f32` list:
//!
//!   {"fc1.bias": [...], "fc1.weight": [...], "fc2.bias": [...], "fc2.weight": [...]}
//!
//! Widths are not stored. They come from the metadata at load time and every
//! list length is checked against them.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::ModelError;
use crate::net::{sse_grad, sse_loss, Net};
use crate::optim::{Adam, DEFAULT_LEARNING_RATE};

pub const DEFAULT_HIDDEN_SIZE: usize = 128;
pub const DEFAULT_SEED: u64 = 0x5eed;

pub type StateDict = BTreeMap<String, Vec<f32>>;

/// Layer widths: input = vocabulary size, output = category count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Widths {
    pub input: usize,
    pub hidden: usize,
    pub output: usize,
}

impl Widths {
    pub fn new(input: usize, output: usize) -> Self {
        Self {
            input,
            hidden: DEFAULT_HIDDEN_SIZE,
            output,
        }
    }

    pub fn with_hidden(mut self, hidden: usize) -> Self {
        self.hidden = hidden;
        self
    }

    /// Every layer needs at least one unit; an empty vocabulary or category
    /// list is a configuration error, not a degenerate network.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.input == 0 || self.hidden == 0 || self.output == 0 {
            return Err(ModelError::InvalidConfig(format!(
                "layer widths must be non-zero, got {} -> {} -> {}",
                self.input, self.hidden, self.output
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub epochs: usize,
    pub learning_rate: f32,
    /// Leading share of rows used for training; the rest is held out.
    pub train_fraction: f64,
    /// Log (and record) the training loss every this many epochs; 0 disables.
    pub log_every: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: 1000,
            learning_rate: DEFAULT_LEARNING_RATE,
            train_fraction: 0.8,
            log_every: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainReport {
    pub epochs: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    /// (epoch index, loss) at each logging point.
    pub loss_history: Vec<(usize, f32)>,
    /// Loss of the last epoch, computed before its update.
    pub final_train_loss: Option<f32>,
    /// Loss on the held-out rows after training; `None` when nothing was held out.
    pub test_loss: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classifier {
    net: Net,
    widths: Widths,
}

impl Classifier {
    /// Fresh, seeded weights.
    pub fn new(widths: Widths, seed: u64) -> Self {
        Self {
            net: Net::new(widths.input, widths.hidden, widths.output, seed),
            widths,
        }
    }

    /// Load weights from `path` if it exists, otherwise start fresh.
    pub fn open(path: Option<&Path>, widths: Widths, seed: u64) -> Result<Self, ModelError> {
        match path {
            None => {
                log::info!("no model path provided, initializing a new model");
                Ok(Self::new(widths, seed))
            }
            Some(p) if p.exists() => Self::load(p, widths),
            Some(p) => {
                log::info!("model path {} does not exist, initializing a new model", p.display());
                Ok(Self::new(widths, seed))
            }
        }
    }

    pub fn widths(&self) -> Widths {
        self.widths
    }

    pub fn net(&self) -> &Net {
        &self.net
    }

    fn check_features(&self, features: &ArrayView2<'_, f32>) -> Result<(), ModelError> {
        if features.ncols() != self.widths.input {
            return Err(ModelError::shape("feature columns", self.widths.input, features.ncols()));
        }
        Ok(())
    }

    fn check_training_shapes(
        &self,
        features: &ArrayView2<'_, f32>,
        labels: &ArrayView2<'_, f32>,
    ) -> Result<(), ModelError> {
        self.check_features(features)?;
        if labels.ncols() != self.widths.output {
            return Err(ModelError::shape("label columns", self.widths.output, labels.ncols()));
        }
        if labels.nrows() != features.nrows() {
            return Err(ModelError::shape("label rows", features.nrows(), labels.nrows()));
        }
        Ok(())
    }

    /// Full-batch training on the leading `train_fraction` of the rows, then a
    /// single held-out loss on the rest. Every shape is checked before the
    /// first update.
    pub fn train(
        &mut self,
        features: ArrayView2<'_, f32>,
        labels: ArrayView2<'_, f32>,
        config: &TrainConfig,
    ) -> Result<TrainReport, ModelError> {
        self.widths.validate()?;
        self.check_training_shapes(&features, &labels)?;
        if !(config.train_fraction > 0.0 && config.train_fraction <= 1.0) {
            return Err(ModelError::InvalidConfig(format!(
                "train_fraction must be in (0, 1], got {}",
                config.train_fraction
            )));
        }

        let rows = features.nrows();
        let split = (rows as f64 * config.train_fraction).floor() as usize;
        if split == 0 {
            return Err(ModelError::EmptyTrainingSet {
                rows,
                fraction: config.train_fraction,
            });
        }

        let (x_train, x_test) = features.split_at(Axis(0), split);
        let (y_train, y_test) = labels.split_at(Axis(0), split);
        log::info!(
            "training on {} rows ({} held out) for {} epochs",
            x_train.nrows(),
            x_test.nrows(),
            config.epochs
        );

        let mut adam = Adam::new(config.learning_rate);
        let mut loss_history = Vec::new();
        let mut final_train_loss = None;

        for t in 0..config.epochs {
            let acts = self.net.forward_cached(x_train);
            let loss = sse_loss(acts.probs.view(), y_train);
            if config.log_every > 0 && t % config.log_every == config.log_every - 1 {
                log::info!("epoch {} loss {:.6}", t, loss);
                loss_history.push((t, loss));
            }
            final_train_loss = Some(loss);

            let grad = sse_grad(acts.probs.view(), y_train);
            let grads = self.net.backward(x_train, &acts, grad.view());

            adam.step("fc1.weight", &mut self.net.fc1.weight, &grads.fc1_weight);
            adam.step("fc1.bias", &mut self.net.fc1.bias, &grads.fc1_bias);
            adam.step("fc2.weight", &mut self.net.fc2.weight, &grads.fc2_weight);
            adam.step("fc2.bias", &mut self.net.fc2.bias, &grads.fc2_bias);
        }

        let test_loss = if x_test.nrows() > 0 {
            let loss = sse_loss(self.net.forward(x_test).view(), y_test);
            log::info!("test loss {:.6}", loss);
            Some(loss)
        } else {
            log::info!("no held-out rows; skipping test loss");
            None
        };

        Ok(TrainReport {
            epochs: config.epochs,
            train_rows: x_train.nrows(),
            test_rows: x_test.nrows(),
            loss_history,
            final_train_loss,
            test_loss,
        })
    }

    /// Class distributions, one row per feature row.
    pub fn predict(&self, features: ArrayView2<'_, f32>) -> Result<Array2<f32>, ModelError> {
        self.check_features(&features)?;
        Ok(self.net.forward(features))
    }

    pub fn predict_one(&self, features: ArrayView1<'_, f32>) -> Result<Array1<f32>, ModelError> {
        let batch = features.insert_axis(Axis(0));
        let probs = self.predict(batch)?;
        Ok(probs.index_axis_move(Axis(0), 0))
    }

    /// Sum-of-squared-errors loss without touching the weights.
    pub fn loss(&self, features: ArrayView2<'_, f32>, labels: ArrayView2<'_, f32>) -> Result<f32, ModelError> {
        self.check_training_shapes(&features, &labels)?;
        Ok(sse_loss(self.net.forward(features).view(), labels))
    }

    pub fn state_dict(&self) -> StateDict {
        let mut dict = BTreeMap::new();
        dict.insert("fc1.weight".to_string(), self.net.fc1.weight.iter().copied().collect());
        dict.insert("fc1.bias".to_string(), self.net.fc1.bias.to_vec());
        dict.insert("fc2.weight".to_string(), self.net.fc2.weight.iter().copied().collect());
        dict.insert("fc2.bias".to_string(), self.net.fc2.bias.to_vec());
        dict
    }

    /// Replace all parameters. Nothing is assigned unless every entry is
    /// present with the expected length.
    pub fn load_state_dict(&mut self, mut dict: StateDict) -> Result<(), ModelError> {
        let Widths {
            input,
            hidden,
            output,
        } = self.widths;

        let mut take = |name: &str, len: usize| -> Result<Vec<f32>, ModelError> {
            let values = dict
                .remove(name)
                .ok_or_else(|| ModelError::MissingParameter(name.to_string()))?;
            if values.len() != len {
                return Err(ModelError::shape(name, len, values.len()));
            }
            Ok(values)
        };
        let fc1_weight = take("fc1.weight", hidden * input)?;
        let fc1_bias = take("fc1.bias", hidden)?;
        let fc2_weight = take("fc2.weight", output * hidden)?;
        let fc2_bias = take("fc2.bias", output)?;
        if !dict.is_empty() {
            log::warn!("ignoring unknown parameters: {:?}", dict.keys().collect::<Vec<_>>());
        }

        let to_matrix = |name: &str, rows: usize, cols: usize, values: Vec<f32>| {
            Array2::from_shape_vec((rows, cols), values)
                .map_err(|_| ModelError::shape(name, rows * cols, 0))
        };
        let fc1_weight = to_matrix("fc1.weight", hidden, input, fc1_weight)?;
        let fc2_weight = to_matrix("fc2.weight", output, hidden, fc2_weight)?;

        self.net.fc1.weight = fc1_weight;
        self.net.fc1.bias = Array1::from(fc1_bias);
        self.net.fc2.weight = fc2_weight;
        self.net.fc2.bias = Array1::from(fc2_bias);
        Ok(())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ModelError> {
        let path = path.as_ref();
        let json = serde_json::to_string(&self.state_dict())?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        log::info!("saved model to {}", path.display());
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>, widths: Widths) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let s = fs::read_to_string(path)?;
        let dict: StateDict = serde_json::from_str(&s)?;
        let mut classifier = Self::new(widths, DEFAULT_SEED);
        classifier.load_state_dict(dict)?;
        log::info!("loaded model from {}", path.display());
        Ok(classifier)
    }
}
