use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::model::{OptionKey, Options};

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Log filter, e.g. `warn` or `pcbscript=debug`
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the version and exit
    Version,
    /// Compile a script into a list of items
    Compile(CompileArgs),
}

#[derive(clap::Args, Debug)]
pub struct CompileArgs {
    /// Input .pcbs script
    #[arg(short, long)]
    pub input: PathBuf,
    /// Output file; stdout when omitted
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    #[arg(short, long, value_enum, default_value_t = Format::Text)]
    pub format: Format,
    /// Override an option default, e.g. `--set PIN_DOUT=1.2` or `--set GAP=None`
    #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_override)]
    pub overrides: Vec<(OptionKey, Option<f64>)>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Text,
    Json,
}

fn parse_override(s: &str) -> Result<(OptionKey, Option<f64>), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got `{s}`"))?;
    let key = name.trim().parse::<OptionKey>()?;
    let value = match value.trim() {
        "None" => None,
        v => Some(
            v.parse::<f64>()
                .map_err(|e| format!("invalid value for {key}: {e}"))?,
        ),
    };
    Ok((key, value))
}

impl CompileArgs {
    /// Built-in defaults with every `--set` applied in order.
    pub fn options(&self) -> Result<Options, String> {
        let mut options = Options::default();
        for (key, value) in &self.overrides {
            options.set(*key, *value)?;
        }
        Ok(options)
    }
}
