//! Description in, category out: encode -> predict -> argmax -> category.
//!
//! Saved weights are bound to their metadata: a copy of the metadata is
//! written beside the weights (`model.json` -> `model.meta.json`) and loading
//! refuses weights whose copy differs from the metadata being paired with
//! them. Equal widths are not enough; a reordered vocabulary or category list
//! would silently change every prediction.

use std::fs;
use std::path::{Path, PathBuf};

use spendsort_core::{encode, label_to_category, ModelMetadata};

use crate::classifier::{Classifier, Widths};
use crate::error::ModelError;

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub category: String,
    pub confidence: f32,
    /// Probability per category, in metadata order.
    pub scores: Vec<(String, f32)>,
}

impl Prediction {
    /// The `n` most likely categories, best first.
    pub fn top(&self, n: usize) -> Vec<(&str, f32)> {
        let mut ranked: Vec<(&str, f32)> = self.scores.iter().map(|(c, p)| (c.as_str(), *p)).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(n);
        ranked
    }
}

/// A trained classifier paired with the metadata that gives its inputs and
/// outputs their meaning. Read-only; share it behind `Arc` if needed.
#[derive(Debug, Clone)]
pub struct Predictor {
    metadata: ModelMetadata,
    classifier: Classifier,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    #[allow(dead_code)]
    fn verify_thread_safety() {
        assert_send_sync::<Predictor>();
    }
};

/// Location of the metadata copy bound to the weights at `weights_path`.
pub fn binding_path(weights_path: &Path) -> PathBuf {
    weights_path.with_extension("meta.json")
}

/// Fails unless the weights at `weights_path` were saved against `metadata`.
pub fn check_binding(metadata: &ModelMetadata, weights_path: &Path) -> Result<(), ModelError> {
    let binding = binding_path(weights_path);
    if !binding.exists() {
        return Err(ModelError::UnboundWeights(weights_path.to_path_buf()));
    }
    let bound = ModelMetadata::load(&binding)?;
    if &bound != metadata {
        log::warn!(
            "{} does not match the metadata the weights were trained on",
            binding.display()
        );
        return Err(ModelError::StaleWeights(weights_path.to_path_buf()));
    }
    Ok(())
}

impl Predictor {
    pub fn new(metadata: ModelMetadata, classifier: Classifier) -> Result<Self, ModelError> {
        let widths = classifier.widths();
        widths.validate()?;
        if widths.input != metadata.input_size() {
            return Err(ModelError::shape("vocabulary size", widths.input, metadata.input_size()));
        }
        if widths.output != metadata.output_size() {
            return Err(ModelError::shape("category count", widths.output, metadata.output_size()));
        }
        Ok(Self {
            metadata,
            classifier,
        })
    }

    /// Metadata first (it fixes the widths), then the binding saved with the
    /// weights, then the weights.
    pub fn load(meta_path: &Path, weights_path: &Path, hidden_size: usize) -> Result<Self, ModelError> {
        let metadata = ModelMetadata::load(meta_path)?;
        check_binding(&metadata, weights_path)?;
        let widths = Widths::new(metadata.input_size(), metadata.output_size()).with_hidden(hidden_size);
        let classifier = Classifier::load(weights_path, widths)?;
        Self::new(metadata, classifier)
    }

    /// Write the weights, then the metadata copy that binds them. The old
    /// binding is removed first so an interrupted save leaves unbound weights
    /// rather than a stale pair.
    pub fn save(&self, weights_path: &Path) -> Result<(), ModelError> {
        let binding = binding_path(weights_path);
        if binding.exists() {
            fs::remove_file(&binding)?;
        }
        self.classifier.save(weights_path)?;
        self.metadata.save(&binding)?;
        Ok(())
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn into_classifier(self) -> Classifier {
        self.classifier
    }

    pub fn predict(&self, description: &str) -> Result<Prediction, ModelError> {
        let features = encode(description, &self.metadata.vocabulary);
        let probs = self.classifier.predict_one(features.view())?;

        let (best, confidence) = probs
            .iter()
            .copied()
            .enumerate()
            .fold(None, |best: Option<(usize, f32)>, (i, p)| match best {
                Some((_, bp)) if bp >= p => best,
                _ => Some((i, p)),
            })
            .ok_or(ModelError::shape("category count", 1, 0))?;

        let category = label_to_category(best, &self.metadata.categories)?.to_string();
        let scores = self
            .metadata
            .categories
            .names()
            .iter()
            .cloned()
            .zip(probs.iter().copied())
            .collect();
        log::debug!("{:?} -> {} ({:.3})", description, category, confidence);

        Ok(Prediction {
            category,
            confidence,
            scores,
        })
    }
}
