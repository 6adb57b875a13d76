use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Args {
    /// Path to config TOML (defaults are used when omitted)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Sweep concentration from 0 to 1 for a scenario
    Run {
        /// Scenario JSON; the reference scenario when omitted
        #[arg(long)]
        scenario: Option<PathBuf>,

        /// Time `t` for x1..x6 (overrides the scenario)
        #[arg(long)]
        time: Option<f64>,

        /// Compression exponent (overrides config)
        #[arg(long)]
        power: Option<f64>,

        /// Write the JSON report here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Generate a random scenario
    Random {
        #[arg(long)]
        seed: Option<u64>,

        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Local derivative terms and stiffness along a run
    Inspect {
        #[arg(long)]
        scenario: Option<PathBuf>,

        /// Grid point nearest to this concentration is inspected
        #[arg(long, default_value_t = 0.0)]
        concentration: f64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_with_overrides() {
        let args = Args::try_parse_from([
            "ecoloss",
            "run",
            "--scenario",
            "s.json",
            "--time",
            "0.5",
            "--power",
            "1",
            "--config",
            "c.toml",
        ])
        .expect("args");
        assert_eq!(args.config, Some(PathBuf::from("c.toml")));
        match args.command {
            Command::Run {
                scenario,
                time,
                power,
                output,
            } => {
                assert_eq!(scenario, Some(PathBuf::from("s.json")));
                assert_eq!(time, Some(0.5));
                assert_eq!(power, Some(1.0));
                assert_eq!(output, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn inspect_defaults_to_zero_concentration() {
        let args = Args::try_parse_from(["ecoloss", "inspect"]).expect("args");
        assert!(matches!(
            args.command,
            Command::Inspect {
                scenario: None,
                concentration,
            } if concentration == 0.0
        ));
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Args::try_parse_from(["ecoloss"]).is_err());
    }
}
