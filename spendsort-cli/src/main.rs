use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use spendsort_core::{CategorySet, DatasetStore, Labeler, ModelMetadata, RawRow};
use spendsort_ingest::{parse_statement_csv, write_labeled_csv, StatementTransaction};
use spendsort_model::{check_binding, Classifier, Predictor, TrainReport};

mod config;
mod labeling;
mod state;

use config::{ArtifactPaths, Config};

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("SPENDSORT_BUILD_SHA"), ")");

#[derive(Parser, Debug)]
#[command(name = "spendsort", version = VERSION, about = "Learn spending categories from bank statements")]
struct Cli {
    /// Debug logging (RUST_LOG takes precedence when set)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Dataset CSV (default: [paths].dataset in config.toml)
    #[arg(long, global = true)]
    dataset: Option<PathBuf>,

    /// Metadata JSON (default: [paths].metadata in config.toml)
    #[arg(long, global = true)]
    metadata: Option<PathBuf>,

    /// Weights JSON (default: [paths].weights in config.toml)
    #[arg(long, global = true)]
    weights: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Label the unlabeled rows of a statement CSV and write it back with a Class column
    Label {
        /// Statement CSV with a Description column
        csv: PathBuf,

        /// Output CSV (default: <csv stem>.labeled.csv next to the input)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Build and save the dataset + metadata from a statement CSV
    Build {
        /// Statement CSV with a Description column
        csv: PathBuf,

        /// Fail on unlabeled rows instead of prompting for them
        #[arg(long)]
        no_label: bool,

        /// Also write the statement with its labels to this CSV
        #[arg(long)]
        labeled_out: Option<PathBuf>,

        /// Trailing tokens per description to leave out of the vocabulary
        #[arg(long)]
        exclude_trailing: Option<usize>,
    },

    /// Train the classifier on the saved dataset and save its weights
    Train {
        #[arg(long)]
        epochs: Option<usize>,

        #[arg(long)]
        learning_rate: Option<f32>,

        #[arg(long)]
        hidden_size: Option<usize>,

        #[arg(long)]
        seed: Option<u64>,

        /// Continue from the saved weights instead of a fresh initialization.
        /// Refused when the metadata has been rebuilt since they were saved.
        #[arg(long)]
        resume: bool,
    },

    /// Predict categories; reads descriptions from stdin until `exit`
    Predict {
        /// Predict a single description and exit
        #[arg(short, long)]
        description: Option<String>,

        #[arg(long)]
        hidden_size: Option<usize>,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write ~/.spendsort/config.toml with defaults
    Init,
    /// Print the effective configuration and artifact paths
    Show,
}

/// Effective configuration for one invocation.
struct Ctx {
    cfg: Config,
    paths: ArtifactPaths,
}

impl Ctx {
    fn load(cli: &Cli) -> Result<Self> {
        let cfg = config::load_config()?;
        let home = state::ensure_spendsort_home()?;
        let mut paths = ArtifactPaths::resolve(&cfg.paths, &home);
        if let Some(p) = &cli.dataset {
            paths.dataset = p.clone();
        }
        if let Some(p) = &cli.metadata {
            paths.metadata = p.clone();
        }
        if let Some(p) = &cli.weights {
            paths.weights = p.clone();
        }
        Ok(Self { cfg, paths })
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();

    let mut ctx = Ctx::load(&cli)?;

    match cli.command {
        Command::Label { csv, out } => label(&ctx, &csv, out)?,

        Command::Build {
            csv,
            no_label,
            labeled_out,
            exclude_trailing,
        } => {
            if let Some(n) = exclude_trailing {
                ctx.cfg.vocabulary.exclude_trailing = n;
            }
            build(&ctx, &csv, no_label, labeled_out.as_deref())?;
        }

        Command::Train {
            epochs,
            learning_rate,
            hidden_size,
            seed,
            resume,
        } => {
            let t = &mut ctx.cfg.training;
            t.epochs = epochs.unwrap_or(t.epochs);
            t.learning_rate = learning_rate.unwrap_or(t.learning_rate);
            t.hidden_size = hidden_size.unwrap_or(t.hidden_size);
            t.seed = seed.unwrap_or(t.seed);
            train(&ctx, resume)?;
        }

        Command::Predict {
            description,
            hidden_size,
        } => {
            if let Some(h) = hidden_size {
                ctx.cfg.training.hidden_size = h;
            }
            let predictor = Predictor::load(
                &ctx.paths.metadata,
                &ctx.paths.weights,
                ctx.cfg.training.hidden_size,
            )
            .with_context(|| {
                format!(
                    "loading model from {} and {}",
                    ctx.paths.metadata.display(),
                    ctx.paths.weights.display()
                )
            })?;
            let stdout = io::stdout();
            match description {
                Some(d) => print_prediction(&predictor, &d, &mut stdout.lock())?,
                None => predict_repl(&predictor, io::stdin().lock(), stdout.lock())?,
            }
        }

        Command::Config { command } => match command {
            ConfigCommand::Init => config::init_config()?,
            ConfigCommand::Show => show_config(&ctx)?,
        },
    }

    Ok(())
}

fn show_config(ctx: &Ctx) -> Result<()> {
    println!("# {}", config::config_path()?.display());
    print!("{}", toml::to_string_pretty(&ctx.cfg).context("serialize config")?);
    println!();
    println!("# resolved");
    println!("dataset  = {}", ctx.paths.dataset.display());
    println!("metadata = {}", ctx.paths.metadata.display());
    println!("weights  = {}", ctx.paths.weights.display());
    Ok(())
}

/// Categories from saved metadata, so earlier runs' labels autocomplete.
fn known_categories(meta_path: &Path) -> Result<CategorySet> {
    if !meta_path.exists() {
        return Ok(CategorySet::new());
    }
    let meta = ModelMetadata::load(meta_path).with_context(|| format!("read {}", meta_path.display()))?;
    Ok(meta.categories)
}

fn default_labeled_path(csv: &Path) -> PathBuf {
    let stem = csv.file_stem().and_then(|s| s.to_str()).unwrap_or("statement");
    csv.with_file_name(format!("{}.labeled.csv", stem))
}

fn raw_rows(txns: &[StatementTransaction]) -> Vec<RawRow> {
    txns.iter().map(StatementTransaction::to_raw_row).collect()
}

/// Prompt for every unlabeled row on the terminal, then copy the labels back.
fn label_on_terminal(txns: &mut [StatementTransaction], known: CategorySet) -> Result<Labeler> {
    let mut labeler = Labeler::with_categories(raw_rows(txns), known);
    let summary = labeling::run_session(&mut labeler, txns, io::stdin().lock(), io::stdout().lock())?;
    labeling::apply_labels(txns, &labeler);
    log::info!(
        "labeled {} rows this session{}",
        summary.labeled,
        if summary.halted { " (stopped early)" } else { "" }
    );
    Ok(labeler)
}

fn label(ctx: &Ctx, csv: &Path, out: Option<PathBuf>) -> Result<()> {
    let mut txns = parse_statement_csv(csv)?;
    let known = known_categories(&ctx.paths.metadata)?;
    label_on_terminal(&mut txns, known)?;

    let out = out.unwrap_or_else(|| default_labeled_path(csv));
    write_labeled_csv(&out, &txns)?;
    let labeled = txns.iter().filter(|t| t.category.is_some()).count();
    println!("{} of {} rows labeled; wrote {}", labeled, txns.len(), out.display());
    Ok(())
}

fn build(ctx: &Ctx, csv: &Path, no_label: bool, labeled_out: Option<&Path>) -> Result<()> {
    let mut txns = parse_statement_csv(csv)?;
    let mut rows = raw_rows(&txns);

    let unlabeled = rows.iter().filter(|r| !r.is_labeled()).count();
    if unlabeled > 0 && !no_label {
        let known = CategorySet::from_names(rows.iter().filter_map(RawRow::category));
        let labeler = label_on_terminal(&mut txns, known)?;
        rows = labeler.into_labeled_rows();
        if let Some(out) = labeled_out {
            write_labeled_csv(out, &txns)?;
        }
    }

    let store = DatasetStore::from_rows(&rows, &ctx.cfg.vocabulary_builder())
        .with_context(|| format!("building dataset from {}", csv.display()))?;
    store
        .save(&ctx.paths.dataset, &ctx.paths.metadata)
        .with_context(|| format!("saving dataset to {}", ctx.paths.dataset.display()))?;

    if let Some(meta) = store.metadata() {
        println!(
            "Built dataset: {} rows, {} tokens, {} categories",
            rows.len(),
            meta.input_size(),
            meta.output_size()
        );
        println!("Categories: {}", meta.categories.names().join(", "));
        if ctx.paths.weights.exists() && check_binding(meta, &ctx.paths.weights).is_err() {
            println!(
                "Weights at {} were trained on other metadata; run: spendsort train",
                ctx.paths.weights.display()
            );
        }
    }
    println!("Dataset:  {}", ctx.paths.dataset.display());
    println!("Metadata: {}", ctx.paths.metadata.display());
    Ok(())
}

fn train(ctx: &Ctx, resume: bool) -> Result<TrainReport> {
    let store = DatasetStore::restore(Some(ctx.paths.dataset.as_path()), Some(ctx.paths.metadata.as_path()))?;
    let Some((metadata, dataset)) = store.into_parts() else {
        bail!(
            "No dataset at {} (metadata {}). Run: spendsort build <statement.csv>",
            ctx.paths.dataset.display(),
            ctx.paths.metadata.display()
        );
    };

    let widths = ctx.cfg.widths(metadata.input_size(), metadata.output_size());
    let mut classifier = if resume && ctx.paths.weights.exists() {
        Predictor::load(&ctx.paths.metadata, &ctx.paths.weights, widths.hidden)
            .with_context(|| {
                format!(
                    "resuming from {} (train without --resume to start over)",
                    ctx.paths.weights.display()
                )
            })?
            .into_classifier()
    } else {
        if resume {
            log::info!("no weights at {}, starting fresh", ctx.paths.weights.display());
        }
        Classifier::new(widths, ctx.cfg.training.seed)
    };

    let report = classifier.train(dataset.features(), dataset.labels(), &ctx.cfg.train_config())?;
    Predictor::new(metadata, classifier)?
        .save(&ctx.paths.weights)
        .with_context(|| format!("saving weights to {}", ctx.paths.weights.display()))?;

    println!(
        "Trained {} epochs on {} rows ({} held out)",
        report.epochs, report.train_rows, report.test_rows
    );
    if let Some(loss) = report.final_train_loss {
        println!("Train loss: {:.4}", loss);
    }
    if let Some(loss) = report.test_loss {
        println!("Test loss:  {:.4}", loss);
    }
    println!("Weights: {}", ctx.paths.weights.display());
    Ok(report)
}

fn print_prediction<W: Write>(predictor: &Predictor, description: &str, out: &mut W) -> Result<()> {
    let p = predictor.predict(description)?;
    writeln!(out, "{} ({:.1}%)", p.category, p.confidence * 100.0)?;
    Ok(())
}

fn predict_repl<R: BufRead, W: Write>(predictor: &Predictor, mut input: R, mut out: W) -> Result<()> {
    loop {
        write!(out, "Description (exit to quit): ")?;
        out.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            writeln!(out)?;
            break;
        }
        let line = line.trim();
        if line == "exit" {
            break;
        }
        if line.is_empty() {
            continue;
        }
        print_prediction(predictor, line, &mut out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use spendsort_core::Vocabulary;
    use spendsort_model::Widths;
    use std::io::Cursor;

    fn predictor() -> Predictor {
        let meta = ModelMetadata::new(
            Vocabulary::from_tokens(["SHELL", "NETFLIX"]),
            CategorySet::from_names(["Gas", "Subscriptions"]),
        );
        let clf = Classifier::new(Widths::new(2, 2).with_hidden(4), 1);
        Predictor::new(meta, clf).unwrap()
    }

    #[test]
    fn test_cli_parses() {
        use clap::CommandFactory;
        Cli::command().debug_assert();

        let cli = Cli::parse_from(["spendsort", "train", "--epochs", "5", "--weights", "/tmp/m.json"]);
        assert_eq!(cli.weights, Some(PathBuf::from("/tmp/m.json")));
        assert!(matches!(cli.command, Command::Train { epochs: Some(5), resume: false, .. }));

        let cli = Cli::parse_from(["spendsort", "train", "--resume"]);
        assert!(matches!(cli.command, Command::Train { resume: true, .. }));
    }

    fn ctx_in(dir: &Path) -> Ctx {
        let mut cfg = Config::default();
        cfg.vocabulary.exclude_trailing = 0;
        cfg.training.epochs = 300;
        cfg.training.learning_rate = 0.01;
        cfg.training.hidden_size = 8;
        let paths = ArtifactPaths::resolve(&cfg.paths, dir);
        Ctx { cfg, paths }
    }

    fn write_statement(path: &Path, rows: &[(&str, &str)]) {
        let mut csv = String::from("Description,Class\n");
        for (description, class) in rows {
            csv.push_str(&format!("{},{}\n", description, class));
        }
        std::fs::write(path, csv).unwrap();
    }

    #[test]
    fn test_rebuild_requires_retraining() {
        let temp = tempfile::tempdir().unwrap();
        let ctx = ctx_in(temp.path());
        let csv = temp.path().join("statement.csv");
        let rows = [
            ("SHELL GAS", "Gas"),
            ("SHELL GAS", "Gas"),
            ("NETFLIX COM", "Subscriptions"),
            ("NETFLIX COM", "Subscriptions"),
            ("SHELL GAS", "Gas"),
        ];

        write_statement(&csv, &rows);
        build(&ctx, &csv, true, None).unwrap();
        train(&ctx, false).unwrap();
        let predictor = Predictor::load(&ctx.paths.metadata, &ctx.paths.weights, 8).unwrap();
        assert_eq!(predictor.predict("SHELL GAS").unwrap().category, "Gas");

        // A Subscriptions row first: same widths, but categories and tokens reorder.
        let mut reordered = vec![("NETFLIX COM", "Subscriptions")];
        reordered.extend(rows);
        write_statement(&csv, &reordered);
        build(&ctx, &csv, true, None).unwrap();
        let meta = ModelMetadata::load(&ctx.paths.metadata).unwrap();
        assert_eq!(meta.categories.names(), &["Subscriptions".to_string(), "Gas".to_string()]);
        assert_eq!(meta.input_size(), predictor.metadata().input_size());

        let err = Predictor::load(&ctx.paths.metadata, &ctx.paths.weights, 8).unwrap_err();
        assert!(matches!(err, spendsort_model::ModelError::StaleWeights(_)));
        assert!(train(&ctx, true).is_err());

        train(&ctx, false).unwrap();
        let predictor = Predictor::load(&ctx.paths.metadata, &ctx.paths.weights, 8).unwrap();
        assert_eq!(predictor.predict("SHELL GAS").unwrap().category, "Gas");

        let report = train(&ctx, true).unwrap();
        assert_eq!(report.train_rows, 4);
    }

    #[test]
    fn test_repl_stops_at_exit() {
        let predictor = predictor();
        let mut out = Vec::new();
        predict_repl(&predictor, Cursor::new("shell gas\n\nexit\nnetflix\n"), &mut out).unwrap();

        let shown = String::from_utf8(out).unwrap();
        assert_eq!(shown.matches("Description (exit to quit): ").count(), 3);
        assert_eq!(shown.matches('%').count(), 1);
    }

    #[test]
    fn test_repl_stops_at_eof() {
        let predictor = predictor();
        let mut out = Vec::new();
        predict_repl(&predictor, Cursor::new("netflix\n"), &mut out).unwrap();
        let shown = String::from_utf8(out).unwrap();
        assert!(shown.contains("Gas (") || shown.contains("Subscriptions ("));
    }

    #[test]
    fn test_default_labeled_path() {
        assert_eq!(
            default_labeled_path(Path::new("/data/march.csv")),
            PathBuf::from("/data/march.labeled.csv")
        );
    }
}
