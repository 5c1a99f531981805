use anyhow::{Context, Result};
use clap::Parser;
use crossterm::style::Stylize;
use d2l_core::persistence::load_from_disk;
use d2l_core::{Learner, D2L};
use std::io::{stdin, stdout, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Interactive prompt for a trained model.
#[derive(Parser, Debug)]
#[command(name = "d2l_simulator")]
struct Args {
    /// Model written by `d2l train --model`
    #[arg(default_value = "d2l_model.bin")]
    model: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("d2l_core=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut model = load_from_disk(&args.model)
        .with_context(|| format!("loading model {}", args.model.display()))?;

    println!("D2L simulator. Model: {}", args.model.display());
    println!("---------------------------------------------------------------");
    println!("Type an underlying form to see its surface form,");
    println!("'uf opt1 opt2' for a forced choice, ':rule' for the model, 'exit' to quit.");

    loop {
        print!("\n> ");
        stdout().flush()?;

        let mut input = String::new();
        if stdin().read_line(&mut input)? == 0 {
            break;
        }
        let parts: Vec<&str> = input.split_whitespace().collect();

        let outcome = match parts.as_slice() {
            [] => Ok(()),
            ["exit"] => break,
            [":rule"] => {
                print_model(&model);
                Ok(())
            }
            [uf] => model
                .produce(uf)
                .map(|sf| println!("{} -> {}", uf, sf.bold())),
            [uf, opt1, opt2] => model
                .choose(uf, opt1, opt2)
                .map(|chosen| println!("{} -> {} (of {} / {})", uf, chosen.bold(), opt1, opt2)),
            _ => {
                println!("Expected 'uf' or 'uf opt1 opt2'.");
                Ok(())
            }
        };
        if let Err(e) = outcome {
            eprintln!("{} {}", "[ERROR]".red(), e);
        }
    }
    Ok(())
}

fn print_model(model: &D2L) {
    match model.rule() {
        Some(rule) => println!("{} {}", "Rule:".bold().green(), rule),
        None => println!("{}", "No Rule.".yellow()),
    }
    if let Some(default) = model.default_rule() {
        println!("{} {}", "Default:".bold(), default);
    }
    println!("Symbols: {}", model.inventory().len());
}
