//! PovLine CLI

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use pl_core::Variable;
use pl_data::{DescribeTable, VariableRange, describe};

mod config;
mod dashboard;
mod simulate;

use config::DashboardConfig;
use dashboard::Dashboard;

#[derive(Parser)]
#[command(name = "povline")]
#[command(about = "PovLine - Fixed-effects poverty line model and what-if simulation")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
#[group(required = true, multiple = false)]
struct Source {
    /// Dashboard config (YAML or JSON, schema povline_dashboard_v0)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Panel CSV/TSV, fitted with the default config
    #[arg(short, long)]
    input: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit the model and print its estimation summary
    Summary {
        #[command(flatten)]
        source: Source,

        /// Emit JSON instead of the text table
        #[arg(long)]
        json: bool,

        /// Output file. Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List entities with their ids, names and intercepts (pretty JSON)
    Entities {
        #[command(flatten)]
        source: Source,

        /// Output file for results (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Descriptive statistics of the normalized panel
    Describe {
        #[command(flatten)]
        source: Source,

        /// Emit JSON (statistics + input ranges) instead of the text table
        #[arg(long)]
        json: bool,

        /// Output file. Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Predict the poverty line for one entity
    Predict {
        #[command(flatten)]
        source: Source,

        /// Entity id or display name. Unknown selectors use the mean intercept.
        #[arg(long)]
        entity: String,

        /// Input value, `variable=value` (repeatable). Unset exposed inputs
        /// default to their observed mean.
        #[arg(long = "set", value_name = "VAR=VALUE")]
        set: Vec<String>,

        /// Preset minimum-wage band label (e.g. "2jt - 2.5jt")
        #[arg(long)]
        wage_band: Option<String>,

        /// Output file for results (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Interactive what-if session on stdin
    Simulate {
        #[command(flatten)]
        source: Source,
    },

    /// Print version information
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Summary { source, json, output } => cmd_summary(&source, json, output.as_ref()),
        Commands::Entities { source, output } => cmd_entities(&source, output.as_ref()),
        Commands::Describe { source, json, output } => {
            cmd_describe(&source, json, output.as_ref())
        }
        Commands::Predict { source, entity, set, wage_band, output } => {
            cmd_predict(&source, &entity, &set, wage_band.as_deref(), output.as_ref())
        }
        Commands::Simulate { source } => cmd_simulate(&source),
        Commands::Version => {
            println!("povline {}", pl_core::VERSION);
            Ok(())
        }
    }
}

fn load_dashboard(source: &Source) -> Result<Arc<Dashboard>> {
    let config = match (&source.config, &source.input) {
        (Some(path), _) => DashboardConfig::read(path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        (None, Some(path)) => DashboardConfig::for_input(path),
        (None, None) => anyhow::bail!("one of --config or --input is required"),
    };
    let path = config.data.path.clone();
    Dashboard::load(config).with_context(|| format!("failed to load panel {}", path.display()))
}

fn cmd_summary(source: &Source, json: bool, output: Option<&PathBuf>) -> Result<()> {
    let dash = load_dashboard(source)?;
    let summary = dash.model().summary();
    if json {
        let mut value = serde_json::to_value(summary)?;
        let cov = dash.model().covariance();
        let rows: Vec<Vec<f64>> =
            (0..cov.nrows()).map(|i| cov.row(i).iter().copied().collect()).collect();
        if let Some(obj) = value.as_object_mut() {
            obj.insert("covariance_matrix".to_string(), serde_json::json!(rows));
        }
        write_json(output, value)
    } else {
        write_text(output, &summary.to_string())
    }
}

fn cmd_entities(source: &Source, output: Option<&PathBuf>) -> Result<()> {
    let dash = load_dashboard(source)?;
    let entities = dash.intercepts().entries();
    write_json(
        output,
        serde_json::json!({
            "n_entities": entities.len(),
            "mean_intercept": dash.intercepts().mean_intercept(),
            "entities": entities,
        }),
    )
}

fn cmd_describe(source: &Source, json: bool, output: Option<&PathBuf>) -> Result<()> {
    let dash = load_dashboard(source)?;
    let ds = dash.dataset();
    let stats = describe(ds);
    if json {
        let ranges: BTreeMap<&str, VariableRange> =
            Variable::ALL.into_iter().map(|v| (v.name(), dash.range(v))).collect();
        write_json(
            output,
            serde_json::json!({
                "n_obs": ds.len(),
                "n_entities": ds.entities().len(),
                "periods": ds.periods(),
                "duplicates_dropped": ds.duplicates_dropped(),
                "incomplete_dropped": ds.incomplete_dropped(),
                "statistics": stats,
                "ranges": ranges,
            }),
        )
    } else {
        let mut text = DescribeTable(&stats).to_string();
        text.push_str(&format!(
            "\n{} observations, {} entities, periods {:?}\n",
            ds.len(),
            ds.entities().len(),
            ds.periods()
        ));
        if ds.duplicates_dropped() + ds.incomplete_dropped() > 0 {
            text.push_str(&format!(
                "dropped: {} duplicate, {} incomplete rows\n",
                ds.duplicates_dropped(),
                ds.incomplete_dropped()
            ));
        }
        write_text(output, &text)
    }
}

fn cmd_predict(
    source: &Source,
    entity: &str,
    set: &[String],
    wage_band: Option<&str>,
    output: Option<&PathBuf>,
) -> Result<()> {
    let dash = load_dashboard(source)?;
    let mut inputs = dash.default_inputs();

    if let Some(label) = wage_band {
        let band = dash.config().simulation.wage_band(label).with_context(|| {
            let known: Vec<&str> =
                dash.config().simulation.wage_bands.iter().map(|b| b.label.as_str()).collect();
            format!("unknown wage band '{label}' (known: {})", known.join(", "))
        })?;
        inputs.insert(Variable::MinimumWage, band.value);
    }
    // Explicit values win over a band.
    for s in set {
        let (v, x) = simulate::parse_assignment(s).map_err(anyhow::Error::msg)?;
        if !dash.predictor().exposed().contains(&v) {
            tracing::warn!(variable = v.name(), "input is not an exposed covariate; ignored");
        }
        inputs.insert(v, x);
    }

    let prediction = dash.predict(entity, &inputs)?;
    let named: BTreeMap<&str, f64> = inputs.iter().map(|(v, &x)| (v.name(), x)).collect();
    write_json(
        output,
        serde_json::json!({
            "prediction": prediction.value,
            "formula": prediction.to_string(),
            "inputs": named,
            "detail": prediction,
        }),
    )
}

fn cmd_simulate(source: &Source) -> Result<()> {
    let dash = load_dashboard(source)?;
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    simulate::Session::new(dash).run(stdin.lock(), &mut stdout)
}

fn write_json(output: Option<&PathBuf>, value: serde_json::Value) -> Result<()> {
    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&value)?)?;
    } else {
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}

fn write_text(output: Option<&PathBuf>, text: &str) -> Result<()> {
    if let Some(path) = output {
        std::fs::write(path, text)?;
    } else {
        print!("{text}");
        if !text.ends_with('\n') {
            println!();
        }
    }
    Ok(())
}
