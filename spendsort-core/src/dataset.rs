//! Dataset store: the (features, labels) matrices plus the metadata that
//! defines their columns.
//!
//! Two ways in:
//! - `from_rows`: mine vocabulary + categories from labeled rows and encode them
//! - `restore`: load metadata, then the flat CSV table it describes
//!
//! On disk the dataset is one CSV: a header of vocabulary tokens followed by
//! category names, then one 0/1 row per example.

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use std::fs;
use std::path::Path;

use crate::categories::CategorySet;
use crate::encoder::{category_to_label, encode};
use crate::error::CoreError;
use crate::metadata::ModelMetadata;
use crate::vocabulary::VocabularyBuilder;

/// One transaction as it enters the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawRow {
    Labeled { description: String, category: String },
    Unlabeled { description: String },
}

impl RawRow {
    pub fn labeled(description: impl Into<String>, category: impl Into<String>) -> Self {
        RawRow::Labeled {
            description: description.into(),
            category: category.into(),
        }
    }

    pub fn unlabeled(description: impl Into<String>) -> Self {
        RawRow::Unlabeled {
            description: description.into(),
        }
    }

    pub fn description(&self) -> &str {
        match self {
            RawRow::Labeled { description, .. } | RawRow::Unlabeled { description } => description,
        }
    }

    pub fn category(&self) -> Option<&str> {
        match self {
            RawRow::Labeled { category, .. } => Some(category),
            RawRow::Unlabeled { .. } => None,
        }
    }

    pub fn is_labeled(&self) -> bool {
        matches!(self, RawRow::Labeled { .. })
    }

    /// Attach a category, keeping the description.
    pub fn with_category(self, category: impl Into<String>) -> Self {
        match self {
            RawRow::Labeled { description, .. } | RawRow::Unlabeled { description } => {
                RawRow::labeled(description, category)
            }
        }
    }
}

/// Encoded training data. Row `i` of `features` pairs with row `i` of `labels`;
/// every label row is one-hot.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    features: Array2<f32>,
    labels: Array2<f32>,
}

impl Dataset {
    pub fn new(features: Array2<f32>, labels: Array2<f32>) -> Result<Self, CoreError> {
        if features.nrows() != labels.nrows() {
            return Err(CoreError::InvalidDataset(format!(
                "{} feature rows but {} label rows",
                features.nrows(),
                labels.nrows()
            )));
        }
        if let Some((row, _)) = features
            .indexed_iter()
            .find(|(_, v)| **v != 0.0 && **v != 1.0)
        {
            return Err(CoreError::InvalidDataset(format!(
                "feature row {} has a value other than 0 or 1",
                row.0
            )));
        }
        for (i, row) in labels.axis_iter(Axis(0)).enumerate() {
            let ones = row.iter().filter(|v| **v == 1.0).count();
            let zeros = row.iter().filter(|v| **v == 0.0).count();
            if ones != 1 || ones + zeros != row.len() {
                return Err(CoreError::InvalidDataset(format!(
                    "label row {} is not one-hot",
                    i
                )));
            }
        }
        Ok(Self { features, labels })
    }

    pub fn len(&self) -> usize {
        self.features.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn feature_width(&self) -> usize {
        self.features.ncols()
    }

    pub fn label_width(&self) -> usize {
        self.labels.ncols()
    }

    pub fn features(&self) -> ArrayView2<'_, f32> {
        self.features.view()
    }

    pub fn labels(&self) -> ArrayView2<'_, f32> {
        self.labels.view()
    }

    pub fn row(&self, index: usize) -> Option<(ArrayView1<'_, f32>, ArrayView1<'_, f32>)> {
        if index >= self.len() {
            return None;
        }
        Some((self.features.row(index), self.labels.row(index)))
    }
}

/// Owns a dataset and its metadata. An empty store (nothing provided or
/// nothing on disk) is valid; check `is_initialized` before use.
#[derive(Debug, Clone, Default)]
pub struct DatasetStore {
    metadata: Option<ModelMetadata>,
    dataset: Option<Dataset>,
}

impl DatasetStore {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from labeled rows, deriving categories in first-seen order.
    pub fn from_rows(rows: &[RawRow], builder: &VocabularyBuilder) -> Result<Self, CoreError> {
        Self::build(rows, builder, None)
    }

    /// Build from labeled rows against a fixed category list. A row whose
    /// category is not in `categories` fails with `UnknownCategory`.
    pub fn from_rows_with_categories(
        rows: &[RawRow],
        builder: &VocabularyBuilder,
        categories: CategorySet,
    ) -> Result<Self, CoreError> {
        Self::build(rows, builder, Some(categories))
    }

    fn build(
        rows: &[RawRow],
        builder: &VocabularyBuilder,
        categories: Option<CategorySet>,
    ) -> Result<Self, CoreError> {
        if rows.is_empty() {
            return Err(CoreError::EmptyCorpus);
        }

        let mut labeled: Vec<(&str, &str)> = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            match row {
                RawRow::Labeled {
                    description,
                    category,
                } => labeled.push((description.as_str(), category.as_str())),
                RawRow::Unlabeled { .. } => return Err(CoreError::MissingCategory { row: i }),
            }
        }

        let vocabulary = builder.build(labeled.iter().map(|(d, _)| *d));
        if vocabulary.is_empty() {
            return Err(CoreError::EmptyVocabulary);
        }
        let categories = categories
            .unwrap_or_else(|| CategorySet::from_names(labeled.iter().map(|(_, c)| *c)));

        let mut features = Array2::zeros((labeled.len(), vocabulary.len()));
        let mut labels = Array2::zeros((labeled.len(), categories.len()));
        for (i, (description, category)) in labeled.iter().enumerate() {
            features.row_mut(i).assign(&encode(description, &vocabulary));
            labels.row_mut(i).assign(&category_to_label(category, &categories)?);
        }

        log::info!(
            "built dataset: {} rows, {} tokens, {} categories",
            labeled.len(),
            vocabulary.len(),
            categories.len()
        );

        Ok(Self {
            metadata: Some(ModelMetadata::new(vocabulary, categories)),
            dataset: Some(Dataset::new(features, labels)?),
        })
    }

    /// Restore from a persisted dataset and its metadata. Metadata is read
    /// first so the table's column split is known before parsing it.
    pub fn restore(data_path: Option<&Path>, meta_path: Option<&Path>) -> Result<Self, CoreError> {
        let (Some(data_path), Some(meta_path)) = (data_path, meta_path) else {
            log::info!("no data/metadata provided");
            return Ok(Self::empty());
        };
        if !meta_path.exists() {
            log::info!("metadata path does not exist: {}", meta_path.display());
            return Ok(Self::empty());
        }
        if !data_path.exists() {
            log::info!("data path does not exist: {}", data_path.display());
            return Ok(Self::empty());
        }

        let metadata = ModelMetadata::load(meta_path)?;
        let dataset = read_table(data_path, &metadata)?;
        log::info!(
            "loaded dataset from {} ({} rows)",
            data_path.display(),
            dataset.len()
        );

        Ok(Self {
            metadata: Some(metadata),
            dataset: Some(dataset),
        })
    }

    pub fn is_initialized(&self) -> bool {
        self.metadata.is_some() && self.dataset.is_some()
    }

    pub fn metadata(&self) -> Option<&ModelMetadata> {
        self.metadata.as_ref()
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }

    pub fn into_parts(self) -> Option<(ModelMetadata, Dataset)> {
        Some((self.metadata?, self.dataset?))
    }

    /// Persist the table and the metadata.
    pub fn save(&self, data_path: &Path, meta_path: &Path) -> Result<(), CoreError> {
        let (Some(metadata), Some(dataset)) = (&self.metadata, &self.dataset) else {
            return Err(CoreError::InvalidDataset(
                "store is empty; nothing to save".to_string(),
            ));
        };
        metadata.save(meta_path)?;
        write_table(data_path, metadata, dataset)?;
        log::info!("saved dataset to {}", data_path.display());
        Ok(())
    }
}

fn header(metadata: &ModelMetadata) -> Vec<&str> {
    metadata
        .vocabulary
        .tokens()
        .iter()
        .chain(metadata.categories.names())
        .map(String::as_str)
        .collect()
}

fn write_table(path: &Path, metadata: &ModelMetadata, dataset: &Dataset) -> Result<(), CoreError> {
    let tmp = path.with_extension("csv.tmp");
    {
        let mut wtr = csv::Writer::from_path(&tmp)?;
        wtr.write_record(header(metadata))?;
        for (features, labels) in dataset
            .features
            .axis_iter(Axis(0))
            .zip(dataset.labels.axis_iter(Axis(0)))
        {
            wtr.write_record(
                features
                    .iter()
                    .chain(labels.iter())
                    .map(|v| if *v == 0.0 { "0" } else { "1" }),
            )?;
        }
        wtr.flush()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

fn read_table(path: &Path, metadata: &ModelMetadata) -> Result<Dataset, CoreError> {
    if metadata.vocabulary.is_empty() {
        return Err(CoreError::EmptyVocabulary);
    }

    let n_features = metadata.input_size();
    let n_labels = metadata.output_size();
    let width = n_features + n_labels;

    let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;

    let expected = header(metadata);
    let found = rdr.headers()?.clone();
    if found.len() != width {
        return Err(CoreError::MetadataMismatch(format!(
            "expected {} columns ({} tokens + {} categories), found {}",
            width,
            n_features,
            n_labels,
            found.len()
        )));
    }
    if let Some((col, (want, got))) = expected
        .iter()
        .zip(found.iter())
        .enumerate()
        .find(|(_, (want, got))| **want != *got)
    {
        return Err(CoreError::MetadataMismatch(format!(
            "column {} is {:?}, metadata says {:?}",
            col, got, want
        )));
    }

    let mut features: Vec<f32> = Vec::new();
    let mut labels: Vec<f32> = Vec::new();
    let mut rows = 0usize;
    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        for (col, cell) in record.iter().enumerate() {
            let value: f32 = cell.trim().parse().map_err(|_| {
                CoreError::InvalidDataset(format!(
                    "row {}, column {}: {:?} is not a number",
                    i, col, cell
                ))
            })?;
            if col < n_features {
                features.push(value);
            } else {
                labels.push(value);
            }
        }
        rows += 1;
    }

    let features = Array2::from_shape_vec((rows, n_features), features)
        .map_err(|e| CoreError::InvalidDataset(e.to_string()))?;
    let labels = Array2::from_shape_vec((rows, n_labels), labels)
        .map_err(|e| CoreError::InvalidDataset(e.to_string()))?;
    Dataset::new(features, labels)
}
