//! End to end: raw rows -> labeling -> dataset store on disk -> training ->
//! weights on disk -> predictor loaded from files.

use std::sync::Arc;

use spendsort_core::{DatasetStore, Labeler, RawRow, VocabularyBuilder};
use spendsort_model::{binding_path, Classifier, ModelError, Predictor, TrainConfig, Widths};

fn statement() -> Vec<RawRow> {
    let mut rows = Vec::new();
    for i in 0..6 {
        rows.push(RawRow::unlabeled(format!("SHELL GAS STATION {} 04{:02}", 8800 + i, i)));
        rows.push(RawRow::unlabeled(format!("NETFLIX COM STREAMING {} 05{:02}", 7100 + i, i)));
        rows.push(RawRow::unlabeled(format!("COSTCO WHOLESALE STORE {} 06{:02}", 500 + i, i)));
    }
    rows
}

fn category_for(description: &str) -> &'static str {
    if description.starts_with("SHELL") {
        "Gas"
    } else if description.starts_with("NETFLIX") {
        "Subscriptions"
    } else {
        "Groceries"
    }
}

fn labeled(rows: Vec<RawRow>) -> Vec<RawRow> {
    rows.into_iter()
        .map(|r| {
            let category = category_for(r.description());
            r.with_category(category)
        })
        .collect()
}

#[test]
fn test_label_train_predict_from_disk() {
    let temp = tempfile::tempdir().unwrap();
    let data_path = temp.path().join("data.csv");
    let meta_path = temp.path().join("meta_data.json");
    let weights_path = temp.path().join("model.json");

    let mut labeler = Labeler::new(statement());
    while let Some(description) = labeler.current() {
        let category = category_for(description);
        labeler.submit(category);
    }
    let rows = labeler.into_labeled_rows();
    assert_eq!(rows.len(), 18);

    let store = DatasetStore::from_rows(&rows, &VocabularyBuilder::new()).unwrap();
    store.save(&data_path, &meta_path).unwrap();

    let restored = DatasetStore::restore(Some(data_path.as_path()), Some(meta_path.as_path())).unwrap();
    assert!(restored.is_initialized());
    let (metadata, dataset) = restored.into_parts().unwrap();
    assert_eq!(metadata.output_size(), 3);

    let widths = Widths::new(metadata.input_size(), metadata.output_size()).with_hidden(16);
    let mut classifier = Classifier::open(Some(weights_path.as_path()), widths, 7).unwrap();
    let config = TrainConfig {
        epochs: 400,
        learning_rate: 0.01,
        ..TrainConfig::default()
    };
    let report = classifier
        .train(dataset.features(), dataset.labels(), &config)
        .unwrap();
    assert_eq!(report.train_rows, 14);
    assert_eq!(report.test_rows, 4);
    assert_eq!(report.loss_history.len(), 4);
    Predictor::new(metadata, classifier).unwrap().save(&weights_path).unwrap();

    let predictor = Arc::new(Predictor::load(&meta_path, &weights_path, 16).unwrap());
    assert_eq!(predictor.predict("SHELL GAS STATION 9999 0101").unwrap().category, "Gas");
    assert_eq!(predictor.predict("netflix com streaming").unwrap().category, "Subscriptions");
    assert_eq!(predictor.predict("COSTCO WHOLESALE").unwrap().category, "Groceries");

    let shared = Arc::clone(&predictor);
    let handle = std::thread::spawn(move || shared.predict("SHELL GAS").map(|p| p.category));
    assert_eq!(handle.join().unwrap().unwrap(), "Gas");
}

#[test]
fn test_predictor_rejects_weights_for_other_widths() {
    let temp = tempfile::tempdir().unwrap();
    let meta_path = temp.path().join("meta_data.json");
    let weights_path = temp.path().join("model.json");

    let store = DatasetStore::from_rows(&labeled(statement()), &VocabularyBuilder::new()).unwrap();
    let metadata = store.metadata().unwrap();
    metadata.save(&meta_path).unwrap();
    metadata.save(binding_path(&weights_path)).unwrap();

    Classifier::new(Widths::new(2, 3).with_hidden(16), 1)
        .save(&weights_path)
        .unwrap();
    assert!(matches!(
        Predictor::load(&meta_path, &weights_path, 16),
        Err(ModelError::ShapeMismatch { .. })
    ));
}

#[test]
fn test_rebuilt_metadata_invalidates_trained_weights() {
    let temp = tempfile::tempdir().unwrap();
    let data_path = temp.path().join("data.csv");
    let meta_path = temp.path().join("meta_data.json");
    let weights_path = temp.path().join("model.json");
    let config = TrainConfig {
        epochs: 400,
        learning_rate: 0.01,
        ..TrainConfig::default()
    };

    let train_and_save = || {
        let store = DatasetStore::restore(Some(data_path.as_path()), Some(meta_path.as_path())).unwrap();
        let (metadata, dataset) = store.into_parts().unwrap();
        let widths = Widths::new(metadata.input_size(), metadata.output_size()).with_hidden(16);
        let mut classifier = Classifier::new(widths, 7);
        classifier
            .train(dataset.features(), dataset.labels(), &config)
            .unwrap();
        Predictor::new(metadata, classifier).unwrap().save(&weights_path).unwrap();
    };

    DatasetStore::from_rows(&labeled(statement()), &VocabularyBuilder::new())
        .unwrap()
        .save(&data_path, &meta_path)
        .unwrap();
    train_and_save();
    let first = Predictor::load(&meta_path, &weights_path, 16).unwrap();
    assert_eq!(first.predict("SHELL GAS STATION").unwrap().category, "Gas");

    // Same tokens and categories, first seen in a different order: the widths
    // stay equal but every column moves.
    let mut reordered = labeled(statement());
    reordered.reverse();
    let rebuilt = DatasetStore::from_rows(&reordered, &VocabularyBuilder::new()).unwrap();
    let rebuilt_meta = rebuilt.metadata().unwrap();
    assert_eq!(rebuilt_meta.input_size(), first.metadata().input_size());
    assert_eq!(rebuilt_meta.output_size(), first.metadata().output_size());
    assert_ne!(rebuilt_meta, first.metadata());
    rebuilt.save(&data_path, &meta_path).unwrap();

    assert!(matches!(
        Predictor::load(&meta_path, &weights_path, 16),
        Err(ModelError::StaleWeights(_))
    ));

    train_and_save();
    let second = Predictor::load(&meta_path, &weights_path, 16).unwrap();
    assert_eq!(second.predict("SHELL GAS STATION").unwrap().category, "Gas");
    assert_eq!(second.predict("NETFLIX COM STREAMING").unwrap().category, "Subscriptions");
}
