//! spendsort-model: two-layer softmax classifier over bag-of-words features,
//! trained full-batch with Adam, plus the description -> category predictor.

pub mod classifier;
pub mod error;
pub mod net;
pub mod optim;
pub mod predictor;

pub use classifier::{Classifier, TrainConfig, TrainReport, Widths, DEFAULT_HIDDEN_SIZE};
pub use error::ModelError;
pub use optim::Adam;
pub use predictor::{binding_path, check_binding, Prediction, Predictor};
