//! hetstat CLI

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use hs_core::{DataFrame, EffectEstimator, EffectModel};
use hs_inference::{
    CartConfig, CausalForestConfig, FeatureConfig, IllustrativeTreeConfig, design_matrix,
    dta_to_frame, evaluate_segments, grouped_mean, illustrative_tree, ols_on_treatment, read_dta,
    select_features, train_test_split, treatment_codes, variable_labels,
};
use hs_viz::{EffectScatterGrid, ImportanceArtifact, TreeDiagramArtifact, scatter_panel};

#[derive(Parser)]
#[command(name = "hetstat")]
#[command(about = "hetstat - Heterogeneous treatment effect analysis")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Average treatment effect: OLS of the outcome on treatment
    Baseline {
        /// Input survey (Stata .dta, release 118)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file for results (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Full heterogeneity analysis: causal forest, ranking, trends, segments
    Analyze {
        /// Input survey (Stata .dta, release 118)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file for results (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Seed for the train/test split and the forest
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Training fraction of the clean sample
        #[arg(long, default_value = "0.6")]
        train_frac: f64,

        /// Number of trees in the forest
        #[arg(long, default_value = "5000")]
        trees: usize,

        /// Scatter/trend panels for the top-k ranked covariates
        #[arg(long, default_value = "3")]
        top_k: usize,

        /// LOESS span fraction for the trend panels
        #[arg(long, default_value = "1.0")]
        span: f64,

        /// Segment slice covariate. Requires `--segment-threshold`.
        #[arg(long, requires = "segment_threshold")]
        segment_covariate: Option<String>,

        /// Keep test units with covariate strictly above this value.
        #[arg(long, requires = "segment_covariate")]
        segment_threshold: Option<f64>,

        /// Threads (0 = auto). Use 1 for deterministic parity.
        #[arg(long, default_value = "0")]
        threads: usize,
    },

    /// Illustrative classification tree on the treated units
    Tree {
        /// Input survey (Stata .dta, release 118)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file for results (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Covariates to grow the tree on (typically the top-3 ranked)
        #[arg(long, required = true, num_args = 1..)]
        covariates: Vec<String>,

        /// Seed for the treated-sample split
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Quantile categories for the binned outcome
        #[arg(long, default_value = "5")]
        bins: usize,

        /// Training fraction of the treated sample
        #[arg(long, default_value = "0.6")]
        train_frac: f64,

        /// Maximum tree depth
        #[arg(long, default_value = "5")]
        max_depth: usize,

        /// Minimum node size to attempt a split
        #[arg(long, default_value = "5")]
        min_split: usize,

        /// Minimum rows in each child
        #[arg(long, default_value = "5")]
        min_bucket: usize,

        /// Minimum relative impurity decrease per split
        #[arg(long, default_value = "0.003")]
        cp: f64,
    },

    /// Print version information
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_max_level(cli.log_level).with_target(false).init();

    match cli.command {
        Commands::Baseline { input, output } => cmd_baseline(&input, output.as_ref()),
        Commands::Analyze {
            input,
            output,
            seed,
            train_frac,
            trees,
            top_k,
            span,
            segment_covariate,
            segment_threshold,
            threads,
        } => cmd_analyze(
            &input,
            output.as_ref(),
            seed,
            train_frac,
            trees,
            top_k,
            span,
            segment_covariate.as_deref().zip(segment_threshold),
            threads,
        ),
        Commands::Tree {
            input,
            output,
            covariates,
            seed,
            bins,
            train_frac,
            max_depth,
            min_split,
            min_bucket,
            cp,
        } => cmd_tree(
            &input,
            output.as_ref(),
            covariates,
            seed,
            bins,
            train_frac,
            CartConfig { max_depth, min_split, min_bucket, cp },
        ),
        Commands::Version => {
            println!("hetstat {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn cmd_baseline(input: &PathBuf, output: Option<&PathBuf>) -> Result<()> {
    let config = FeatureConfig::default();
    let (clean, _) = load_clean_frame(input, &config)?;

    let table = ols_on_treatment(&clean, &config.outcome, &config.treatment)?;
    let by_treatment =
        grouped_mean(clean.numeric(&config.treatment)?, clean.numeric(&config.outcome)?)?;
    tracing::info!(n_obs = table.n_obs, "baseline fit complete");

    write_json(output, serde_json::json!({ "baseline": table, "by_treatment": by_treatment }))
}

#[allow(clippy::too_many_arguments)]
fn cmd_analyze(
    input: &PathBuf,
    output: Option<&PathBuf>,
    seed: u64,
    train_frac: f64,
    trees: usize,
    top_k: usize,
    span: f64,
    segment: Option<(&str, f64)>,
    threads: usize,
) -> Result<()> {
    if threads > 0 {
        // Best-effort; if a global pool already exists, keep going.
        let _ = rayon::ThreadPoolBuilder::new().num_threads(threads).build_global();
    }

    let config = FeatureConfig::default();
    let (clean, labels) = load_clean_frame(input, &config)?;

    let baseline = ols_on_treatment(&clean, &config.outcome, &config.treatment)?;
    let baseline_by_treatment =
        grouped_mean(clean.numeric(&config.treatment)?, clean.numeric(&config.outcome)?)?;

    let (train, test) = train_test_split(&clean, train_frac, seed)?;
    tracing::info!(train = train.n_rows(), test = test.n_rows(), "partitioned sample");

    let covariates: Vec<&str> = config.covariates.iter().map(|s| s.as_str()).collect();
    let dm_train = design_matrix(&train, &covariates)?;
    let dm_test = design_matrix(&test, &covariates)?;

    let y = train.numeric(&config.outcome)?;
    let w = treatment_codes(train.numeric(&config.treatment)?)?;

    let forest_config = CausalForestConfig { n_trees: trees, seed, ..Default::default() };
    let model = forest_config.fit(&dm_train.data, y, &w, dm_train.p)?;
    tracing::info!(trees, covariates = dm_train.p, "forest fit complete");

    let predictions = model.predict(&dm_test.data, test.n_rows(), true)?;
    let effects: Vec<f64> = predictions.iter().map(|p| p.effect).collect();
    let variances: Vec<f64> =
        predictions.iter().map(|p| p.variance.unwrap_or(0.0)).collect();

    let ranking = ImportanceArtifact::rank(&dm_train.names, &model.importances(), None);

    let mut panels = Vec::new();
    for name in ranking.top_names(top_k) {
        let Some(idx) = dm_test.names.iter().position(|n| *n == name) else { continue };
        let x = dm_test.column(idx);
        let label = labels.iter().find(|(n, _)| *n == name).map(|(_, l)| l.clone());
        panels.push(scatter_panel(&name, label, &x, &effects, span, 50)?);
    }
    let scatter = EffectScatterGrid { panels };

    let segments = evaluate_segments(&test, &effects, &config.treatment, segment)?;

    write_json(
        output,
        serde_json::json!({
            "baseline": baseline,
            "baseline_by_treatment": baseline_by_treatment,
            "n_clean": clean.n_rows(),
            "n_train": train.n_rows(),
            "n_test": test.n_rows(),
            "effects": effects,
            "variances": variances,
            "ranking": ranking,
            "scatter": scatter,
            "segments": segments,
        }),
    )
}

fn cmd_tree(
    input: &PathBuf,
    output: Option<&PathBuf>,
    covariates: Vec<String>,
    seed: u64,
    bins: usize,
    train_frac: f64,
    cart: CartConfig,
) -> Result<()> {
    let config = FeatureConfig::default();
    let (clean, _) = load_clean_frame(input, &config)?;

    let tree_config = IllustrativeTreeConfig {
        treatment: config.treatment.clone(),
        outcome: config.outcome.clone(),
        covariates,
        n_bins: bins,
        train_frac,
        seed,
        cart,
    };
    let fitted = illustrative_tree(&clean, &tree_config)?;
    tracing::info!(nodes = fitted.tree.nodes.len(), n_train = fitted.n_train, "tree grown");

    let artifact = TreeDiagramArtifact::from(&fitted);
    write_json(output, serde_json::json!({ "tree": artifact }))
}

/// Read the survey, derive the outcome, and drop rows missing the key
/// covariate. Returns the clean frame plus variable labels for display.
fn load_clean_frame(
    input: &PathBuf,
    config: &FeatureConfig,
) -> Result<(DataFrame, Vec<(String, String)>)> {
    tracing::info!(path = %input.display(), "loading survey");
    let dataset = read_dta(&input.to_string_lossy())?;
    let frame = dta_to_frame(&dataset)?;
    let labels = variable_labels(&dataset);

    let clean = select_features(&frame, config)?;
    tracing::info!(rows = clean.n_rows(), columns = clean.n_cols(), "analysis sample ready");
    Ok((clean, labels))
}

fn write_json(output: Option<&PathBuf>, value: serde_json::Value) -> Result<()> {
    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&value)?)?;
    } else {
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyze_defaults() {
        let cli = Cli::try_parse_from(["hetstat", "analyze", "--input", "survey.dta"]).unwrap();
        match cli.command {
            Commands::Analyze { seed, train_frac, trees, top_k, span, threads, .. } => {
                assert_eq!(seed, 42);
                assert_eq!(train_frac, 0.6);
                assert_eq!(trees, 5000);
                assert_eq!(top_k, 3);
                assert_eq!(span, 1.0); // every point in every window, tricube-weighted
                assert_eq!(threads, 0);
            }
            _ => panic!("expected analyze"),
        }
    }

    #[test]
    fn test_tree_defaults() {
        let cli = Cli::try_parse_from([
            "hetstat",
            "tree",
            "--input",
            "survey.dta",
            "--covariates",
            "assets_total_bl",
        ])
        .unwrap();
        match cli.command {
            Commands::Tree { bins, train_frac, max_depth, min_split, min_bucket, cp, .. } => {
                assert_eq!(bins, 5);
                assert_eq!(train_frac, 0.6);
                assert_eq!(max_depth, 5);
                assert_eq!(min_split, 5);
                assert_eq!(min_bucket, 5);
                assert_eq!(cp, 0.003);
            }
            _ => panic!("expected tree"),
        }
    }

    #[test]
    fn test_segment_flags_require_each_other() {
        let err = Cli::try_parse_from([
            "hetstat",
            "analyze",
            "--input",
            "survey.dta",
            "--segment-covariate",
            "assets_total_bl",
        ]);
        assert!(err.is_err());
    }
}
