//! Model metadata: the (vocabulary, categories) pair that gives trained
//! weights their meaning. Saved next to the weights, loaded before them.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::categories::CategorySet;
use crate::error::CoreError;
use crate::vocabulary::Vocabulary;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub vocabulary: Vocabulary,
    pub categories: CategorySet,
}

impl ModelMetadata {
    pub fn new(vocabulary: Vocabulary, categories: CategorySet) -> Self {
        Self {
            vocabulary,
            categories,
        }
    }

    /// Network input width.
    pub fn input_size(&self) -> usize {
        self.vocabulary.len()
    }

    /// Network output width.
    pub fn output_size(&self) -> usize {
        self.categories.len()
    }

    /// Write as JSON. The file is written beside the target and renamed into
    /// place so a reader never sees a half-written pair.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), CoreError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        log::info!("saved metadata to {}", path.display());
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let s = fs::read_to_string(path)?;
        let meta: Self = serde_json::from_str(&s)?;
        log::info!(
            "loaded metadata from {} ({} tokens, {} categories)",
            path.display(),
            meta.input_size(),
            meta.output_size()
        );
        Ok(meta)
    }
}
