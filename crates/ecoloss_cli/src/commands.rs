use crate::config::AppConfig;
use anyhow::{Context, Result};
use ecoloss_core::analysis::{stiffness_report, StiffnessReport};
use ecoloss_core::driver::{run, RunResult};
use ecoloss_core::engine::{DerivativeTerms, LossSystem};
use ecoloss_core::report::{
    perturbation_profile, range_warnings, PerturbationProfile, RangeWarning, Snapshot,
};
use ecoloss_core::scenario::{RawScenario, Scenario};
use ecoloss_core::state::{LossComponent, LossState};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Everything `run` writes out.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub result: RunResult,
    pub snapshots: Vec<Snapshot>,
    pub total_loss: Vec<f64>,
    pub perturbations: PerturbationProfile,
    pub range_warnings: Vec<RangeWarning>,
}

#[derive(Debug, Serialize)]
pub struct InspectReport {
    pub concentration: f64,
    pub state: LossState,
    pub terms: DerivativeTerms,
    pub stiffness: StiffnessReport,
}

pub fn load_scenario(path: Option<&Path>) -> Result<Scenario> {
    let Some(path) = path else {
        tracing::info!("no scenario given; using the reference scenario");
        return Ok(Scenario::reference());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario {}", path.display()))?;
    let raw: RawScenario = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse scenario {}", path.display()))?;
    raw.coerce()
        .with_context(|| format!("Invalid scenario {}", path.display()))
}

fn write_json(value: &impl Serialize, output: Option<&Path>) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    match output {
        Some(path) => {
            fs::write(path, text)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), "wrote output");
        }
        None => println!("{text}"),
    }
    Ok(())
}

pub fn execute_run(
    config: &AppConfig,
    scenario: Option<&Path>,
    time: Option<f64>,
    power: Option<f64>,
) -> Result<RunReport> {
    let mut scenario = load_scenario(scenario)?;
    if let Some(t) = time {
        scenario.time = t;
    }
    let mut settings = config.model.clone();
    if let Some(p) = power {
        settings.power = p;
    }

    let mut solver = config.solver.build()?;
    let result = run(&scenario, &settings, &mut solver).context("Run failed")?;

    Ok(RunReport {
        snapshots: result.snapshots(),
        total_loss: result.total_loss(None),
        perturbations: perturbation_profile(
            &scenario.perturbations,
            scenario.time,
            &result.concentration,
        ),
        range_warnings: range_warnings(&scenario.perturbations),
        result,
    })
}

pub fn run_command(
    config: &AppConfig,
    scenario: Option<&Path>,
    time: Option<f64>,
    power: Option<f64>,
    output: Option<&Path>,
) -> Result<()> {
    let report = execute_run(config, scenario, time, power)?;
    if output.is_some() {
        if let Some(last) = report.result.final_state() {
            for component in LossComponent::ALL {
                println!(
                    "{} at C=1: {:.4}  ({})",
                    component.symbol(),
                    last[component.index()],
                    component.label()
                );
            }
        }
    }
    write_json(&report, output)
}

pub fn random_scenario(seed: Option<u64>) -> Scenario {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    Scenario::random(&mut rng)
}

pub fn random_command(seed: Option<u64>, output: Option<&Path>) -> Result<()> {
    write_json(&random_scenario(seed), output)
}

pub fn inspect(
    config: &AppConfig,
    scenario: Option<&Path>,
    concentration: f64,
) -> Result<InspectReport> {
    let scenario = load_scenario(scenario)?;
    let mut solver = config.solver.build()?;
    let result = run(&scenario, &config.model, &mut solver).context("Run failed")?;

    let index = result
        .concentration
        .iter()
        .enumerate()
        .min_by(|a, b| (a.1 - concentration).abs().total_cmp(&(b.1 - concentration).abs()))
        .map(|(i, _)| i)
        .context("Run produced an empty grid")?;
    let c = result.concentration[index];
    let state = result.trajectory[index];

    let system = LossSystem::new(&scenario.perturbations, &scenario.couplings)
        .with_time(scenario.time)
        .with_power(config.model.power)
        .with_scale(config.model.scale);
    let stiffness = stiffness_report(&system, c, &state).context("Stiffness analysis failed")?;
    if let Some(ratio) = stiffness.stiffness_ratio {
        tracing::info!(concentration = c, ratio, "stiffness ratio");
    }

    Ok(InspectReport {
        concentration: c,
        state,
        terms: system.terms(c, &state),
        stiffness,
    })
}

pub fn inspect_command(
    config: &AppConfig,
    scenario: Option<&Path>,
    concentration: f64,
) -> Result<()> {
    let report = inspect(config, scenario, concentration)?;
    write_json(&report, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn unique_path(name: &str) -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!(
            "ecoloss_cli_test_{}_{}",
            name,
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        p
    }

    #[test]
    fn run_on_reference_scenario_produces_full_report() {
        let report = execute_run(&AppConfig::default(), None, None, None).expect("run");
        assert_eq!(report.result.trajectory.len(), 100);
        assert_eq!(report.snapshots.len(), 5);
        assert_eq!(report.total_loss.len(), 100);
        assert_eq!(report.perturbations.concentration.len(), 100);
        assert_eq!(report.range_warnings.len(), 1);
    }

    #[test]
    fn overrides_reach_the_run() {
        let report = execute_run(&AppConfig::default(), None, Some(0.9), Some(5.0)).expect("run");
        assert_eq!(report.result.time, 0.9);
        assert_eq!(report.result.power, 2.0);
    }

    #[test]
    fn random_scenario_file_runs() {
        let path = unique_path("random.json");
        random_command(Some(3), Some(&path)).expect("random");
        let scenario = load_scenario(Some(&path)).expect("load");
        assert_eq!(scenario, random_scenario(Some(3)));

        let report = execute_run(&AppConfig::default(), Some(&path), None, None).expect("run");
        assert!(report
            .result
            .trajectory
            .iter()
            .all(|s| s.iter().all(|v| (0.0..=1.0).contains(v))));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn scenario_errors_name_the_file() {
        let path = unique_path("bad.json");
        fs::write(&path, r#"{"initial_equations": [0.1, 0.2]}"#).unwrap();
        let err = load_scenario(Some(&path)).expect_err("shape error");
        let message = format!("{err:#}");
        assert!(message.contains("Invalid scenario"), "{message}");
        assert!(message.contains("must have 5 values"), "{message}");
        let _ = fs::remove_file(&path);

        assert!(load_scenario(Some(&unique_path("absent.json"))).is_err());
    }

    #[test]
    fn inspect_reports_terms_at_nearest_point() {
        let mut config = AppConfig::default();
        config.model.grid_points = 11;
        let report = inspect(&config, None, 0.52).expect("inspect");
        assert_eq!(report.concentration, 0.5);
        assert_eq!(report.terms.perturbations.len(), 14);
        assert_eq!(report.stiffness.eigenvalues.len(), 5);
    }
}
