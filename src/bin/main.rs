use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossterm::style::Stylize;
use d2l_core::core::inventory::SegmentInventory;
use d2l_core::data;
use d2l_core::persistence::{load_from_disk, save_to_disk};
use d2l_core::{Learner, LearnerConfig, PlpGrammar, D2L};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Learns local assimilation and dissimilation rules from underlying/surface pairs.
#[derive(Parser, Debug)]
#[command(name = "d2l")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Learn a rule from a file of underlying/surface pairs
    Train {
        /// Tab-separated feature table
        #[arg(long)]
        inventory: PathBuf,
        /// Tab-separated training pairs
        #[arg(long)]
        data: PathBuf,
        #[arg(long)]
        skip_header: bool,
        /// JSON learner configuration
        #[arg(long)]
        config: Option<PathBuf>,
        /// Where to save the trained model
        #[arg(long)]
        model: Option<PathBuf>,
        /// Learn one rule per feature-difference signature
        #[arg(long)]
        multi: bool,
        /// Print a JSON report instead of text
        #[arg(long)]
        json: bool,
    },
    /// Predict surface forms with a saved model
    Produce {
        #[arg(long)]
        model: PathBuf,
        #[arg(required = true)]
        forms: Vec<String>,
    },
    /// Score a saved model against held-out pairs
    Evaluate {
        #[arg(long)]
        model: PathBuf,
        #[arg(long)]
        data: PathBuf,
        #[arg(long)]
        skip_header: bool,
        /// List every mispredicted item
        #[arg(long)]
        errors: bool,
    },
    /// Report symbols that share a feature vector
    Check {
        #[arg(long)]
        inventory: PathBuf,
        /// List the members of a natural class, e.g. `--class +cons --class -son`
        #[arg(long = "class", allow_hyphen_values = true)]
        class: Vec<String>,
    },
}

#[derive(Debug, Serialize)]
struct ProcessReport {
    discrepancy: Vec<String>,
    rule: Option<String>,
    default: Option<String>,
}

#[derive(Debug, Serialize)]
struct TrainReport {
    processes: Vec<ProcessReport>,
    accuracy: f64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("d2l_core=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Train {
            inventory,
            data,
            skip_header,
            config,
            model,
            multi,
            json,
        } => {
            let inventory = load_inventory(&inventory)?;
            let config = match config {
                Some(path) => LearnerConfig::from_json_file(&path)
                    .with_context(|| format!("reading config {}", path.display()))?,
                None => LearnerConfig::default(),
            };
            let pairs = data::as_string_pairs(
                &data::load_pairs(&data, skip_header)
                    .with_context(|| format!("reading pairs {}", data.display()))?,
            );
            tracing::info!(pairs = pairs.len(), "training");

            let report = if multi {
                if model.is_some() {
                    tracing::warn!("--model only saves single-rule models; ignoring it with --multi");
                }
                train_grammar(inventory, config, &pairs)?
            } else {
                train_single(inventory, config, &pairs, model.as_deref())?
            };
            print_report(&report, json)
        }
        Command::Produce { model, forms } => {
            let mut model = load_model(&model)?;
            for uf in forms {
                let sf = model.produce(&uf)?;
                println!("{}\t{}", uf, sf);
            }
            Ok(())
        }
        Command::Evaluate {
            model,
            data,
            skip_header,
            errors,
        } => {
            let mut model = load_model(&model)?;
            let pairs = data::as_string_pairs(&data::load_pairs(&data, skip_header)?);
            let (accuracy, mistakes) = model.accuracy_with_errors(&pairs)?;
            println!("{} {:.4} ({} items)", "Accuracy:".bold(), accuracy, pairs.len());
            if errors {
                for mistake in mistakes {
                    println!(
                        "  {} -> {} (expected {})",
                        mistake.underlying,
                        mistake.predicted.red(),
                        mistake.expected
                    );
                }
            }
            Ok(())
        }
        Command::Check { inventory, class } => {
            let inventory = load_inventory(&inventory)?;
            if !class.is_empty() {
                let class = inventory.class(class.as_slice())?;
                let extension = inventory.extension(&class);
                let members: Vec<&str> = extension.iter().map(|s| s.symbol()).collect();
                println!("{} {}", class.name().bold(), members.join(" "));
            }
            let duplicates = inventory.check_unique();
            if duplicates.is_empty() {
                println!("{}", "Every symbol has a distinct feature vector.".green());
            }
            for group in duplicates {
                let symbols: Vec<String> = group.into_iter().collect();
                println!("{} {}", "Same features:".yellow(), symbols.join(" "));
            }
            Ok(())
        }
    }
}

fn load_inventory(path: &Path) -> Result<SegmentInventory> {
    SegmentInventory::load(path).with_context(|| format!("loading inventory {}", path.display()))
}

fn load_model(path: &Path) -> Result<D2L> {
    load_from_disk(path).with_context(|| format!("loading model {}", path.display()))
}

fn train_single(
    inventory: SegmentInventory,
    config: LearnerConfig,
    pairs: &[(String, String)],
    model_path: Option<&Path>,
) -> Result<TrainReport> {
    let mut model = D2L::with_config(inventory, config);
    model.train(pairs)?;
    if let Some(path) = model_path {
        save_to_disk(&model, path).with_context(|| format!("saving model {}", path.display()))?;
        tracing::info!(path = %path.display(), "model saved");
    }

    let accuracy = model.accuracy(pairs)?;
    let process = ProcessReport {
        discrepancy: model
            .discrepancy()
            .map(|d| d.feat_diff().to_vec())
            .unwrap_or_default(),
        rule: model.rule().map(ToString::to_string),
        default: model.default_rule().map(ToString::to_string),
    };
    Ok(TrainReport {
        processes: vec![process],
        accuracy,
    })
}

fn train_grammar(
    inventory: SegmentInventory,
    config: LearnerConfig,
    pairs: &[(String, String)],
) -> Result<TrainReport> {
    let mut grammar = PlpGrammar::with_config(inventory, config);
    grammar.train(pairs)?;
    let accuracy = grammar.accuracy(pairs)?;
    let processes = grammar
        .processes()
        .iter()
        .map(|p| ProcessReport {
            discrepancy: p.discrepancy.feat_diff().to_vec(),
            rule: p.rule.as_ref().map(ToString::to_string),
            default: p.default.as_ref().map(ToString::to_string),
        })
        .collect();
    Ok(TrainReport {
        processes,
        accuracy,
    })
}

fn print_report(report: &TrainReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    for process in &report.processes {
        match &process.rule {
            Some(rule) => println!("{} {}", "Rule:".bold().green(), rule),
            None => println!("{}", "No Rule.".yellow()),
        }
        if let Some(default) = &process.default {
            println!("{} {}", "Default:".bold(), default);
        }
    }
    println!("{} {:.4}", "Training accuracy:".bold(), report.accuracy);
    Ok(())
}
