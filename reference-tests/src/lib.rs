//! Reference test framework for SPH solver validation
//!
//! A reference test loads a scene file, steps the CPU solver a fixed number
//! of times while recording one probe particle, and validates the result
//! against closed-form expectations from [`analytical`].

pub mod analytical;
pub mod scenarios;


use std::path::{Path, PathBuf};

use glam::Vec3;
use orchestrator::SceneConfig;
use sph::{ErrorMetrics, SimulationBackend};

/// Resolve a path relative to the workspace root.
pub fn project_path(relative: &str) -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .unwrap_or(manifest_dir)
        .join(relative)
}

/// Expected result criteria for a reference test
#[derive(Debug, Clone, Default)]
pub struct ExpectedResult {
    /// Every particle stays inside an axis-aligned box
    pub position_bounds: Option<PositionBoundsCheck>,
    /// Final probe state matches a reference state
    pub final_state: Option<FinalStateCheck>,
    /// Probe apex after its first bounce
    pub rebound: Option<ReboundCheck>,
    /// Density stays near rest density
    pub density: Option<DensityCheck>,
    /// Mechanical energy is conserved
    pub energy: Option<EnergyCheck>,
}

/// Check that particles remain within specified bounds
#[derive(Debug, Clone)]
pub struct PositionBoundsCheck {
    /// Minimum allowed position
    pub min: Vec3,
    /// Maximum allowed position
    pub max: Vec3,
}

/// Compare the probe particle's final state with a reference
#[derive(Debug, Clone)]
pub struct FinalStateCheck {
    /// Expected position; `None` skips the position comparison
    pub position: Option<Vec3>,
    /// Expected velocity; `None` skips the velocity comparison
    pub velocity: Option<Vec3>,
    /// Absolute tolerance on either vector (m or m/s)
    pub tolerance: f32,
}

/// Check the highest point reached after the first bounce
#[derive(Debug, Clone)]
pub struct ReboundCheck {
    /// Expected apex height (m)
    pub expected_height: f32,
    /// Relative tolerance (0.0 to 1.0)
    pub tolerance: f32,
}

/// Check the last step's maximum relative density deviation
#[derive(Debug, Clone)]
pub struct DensityCheck {
    /// Maximum allowed `|rho - rho0| / rho0`
    pub max_variation: f32,
}

/// Check the relative drift of kinetic plus potential energy
#[derive(Debug, Clone)]
pub struct EnergyCheck {
    /// Maximum allowed relative drift (0.0 to 1.0)
    pub max_drift: f32,
}

/// One recorded probe sample.
#[derive(Debug, Clone, Copy)]
pub struct ProbeSample {
    /// Simulated time after the step (s)
    pub time: f64,
    /// Probe position
    pub position: Vec3,
    /// Probe velocity
    pub velocity: Vec3,
}

/// Result of running a reference test
#[derive(Debug)]
pub struct TestResult {
    /// Test name
    pub name: String,
    /// Whether test passed
    pub passed: bool,
    /// Individual check results
    pub checks: Vec<CheckResult>,
    /// Final error metrics
    pub error_metrics: ErrorMetrics,
    /// Number of timesteps executed
    pub timesteps: u64,
    /// Simulated time (seconds)
    pub sim_time: f64,
}

/// Result of an individual validation check
#[derive(Debug)]
pub struct CheckResult {
    /// Check name
    pub name: String,
    /// Whether check passed
    pub passed: bool,
    /// Details, also present on success
    pub message: Option<String>,
}

impl CheckResult {
    fn new(name: &str, passed: bool, message: String) -> Self {
        Self {
            name: name.to_string(),
            passed,
            message: Some(message),
        }
    }
}

/// A reference test case
pub struct ReferenceTest {
    /// Test name
    pub name: String,
    /// Path to the scene file
    pub config_path: PathBuf,
    /// Number of timesteps to run
    pub timesteps: u64,
    /// Index of the particle whose trajectory is recorded
    pub probe: usize,
    /// Expected results to validate
    pub expected: ExpectedResult,
}

impl ReferenceTest {
    /// Run the reference test and return results
    pub fn run(&self) -> Result<TestResult, String> {
        tracing::info!("Running reference test: {}", self.name);

        let config = SceneConfig::load(&self.config_path).map_err(|e| format!("{e:#}"))?;
        let base_dir = self.config_path.parent().unwrap_or_else(|| Path::new("."));
        let mut sim =
            orchestrator::build_simulation(&config, base_dir).map_err(|e| format!("{e:#}"))?;

        if self.probe >= sim.particles().len() {
            return Err(format!(
                "probe {} out of range for {} particles",
                self.probe,
                sim.particles().len()
            ));
        }
        tracing::info!(
            "Initialized: {} particles, dt={}",
            sim.particles().len(),
            sim.parameters().time_step
        );

        let mut history = Vec::with_capacity(self.timesteps as usize);
        for step in 0..self.timesteps {
            sim.advance();
            history.push(ProbeSample {
                time: sim.time(),
                position: sim.particles().positions()[self.probe],
                velocity: sim.particles().velocities()[self.probe],
            });

            if (step + 1) % (self.timesteps / 10).max(1) == 0 {
                let progress = ((step + 1) as f32 / self.timesteps as f32) * 100.0;
                tracing::info!("Progress: {:.0}% ({}/{})", progress, step + 1, self.timesteps);
            }
        }
        let sim_time = sim.time();
        tracing::info!("Simulation complete: {} steps, {:.6}s simulated", self.timesteps, sim_time);

        let error_metrics = SimulationBackend::error_metrics(&sim);
        let positions = sim.particles().positions();

        let mut checks = Vec::new();
        if let Some(ref bounds) = self.expected.position_bounds {
            checks.push(validate_position_bounds(positions, bounds));
        }
        if let Some(ref check) = self.expected.final_state {
            checks.push(validate_final_state(history.last(), check));
        }
        if let Some(ref check) = self.expected.rebound {
            checks.push(validate_rebound(&history, check));
        }
        if let Some(ref check) = self.expected.density {
            checks.push(validate_density(&error_metrics, check));
        }
        if let Some(ref check) = self.expected.energy {
            checks.push(validate_energy(&error_metrics, check));
        }

        Ok(TestResult {
            name: self.name.clone(),
            passed: checks.iter().all(|c| c.passed),
            checks,
            error_metrics,
            timesteps: self.timesteps,
            sim_time,
        })
    }
}

/// Validate that particles remain within specified bounds
fn validate_position_bounds(positions: &[Vec3], bounds: &PositionBoundsCheck) -> CheckResult {
    let mut violations = 0;
    let mut max_violation = 0.0_f32;

    for p in positions {
        let below = (bounds.min - *p).max(Vec3::ZERO);
        let above = (*p - bounds.max).max(Vec3::ZERO);
        let worst = below.max_element().max(above.max_element());
        if worst > 0.0 || !p.is_finite() {
            violations += 1;
            max_violation = max_violation.max(worst);
        }
    }

    if violations == 0 {
        CheckResult::new(
            "Position Bounds",
            true,
            format!("All {} particles inside", positions.len()),
        )
    } else {
        CheckResult::new(
            "Position Bounds",
            false,
            format!(
                "{} particles out of bounds (max violation: {:.6} m)",
                violations, max_violation
            ),
        )
    }
}

/// Compare the last probe sample against the expected state
fn validate_final_state(last: Option<&ProbeSample>, check: &FinalStateCheck) -> CheckResult {
    let Some(sample) = last else {
        return CheckResult::new("Final State", false, "No steps were run".to_string());
    };

    let mut passed = true;
    let mut parts = Vec::new();
    if let Some(expected) = check.position {
        let error = (sample.position - expected).length();
        passed &= error <= check.tolerance;
        parts.push(format!("position {} vs {} (error {:.2e} m)", sample.position, expected, error));
    }
    if let Some(expected) = check.velocity {
        let error = (sample.velocity - expected).length();
        passed &= error <= check.tolerance;
        parts.push(format!("velocity {} vs {} (error {:.2e} m/s)", sample.velocity, expected, error));
    }
    parts.push(format!("tolerance {:.1e}", check.tolerance));

    CheckResult::new("Final State", passed, parts.join(", "))
}

/// Highest probe height after its vertical velocity first turns upward
fn validate_rebound(history: &[ProbeSample], check: &ReboundCheck) -> CheckResult {
    let bounce = history
        .windows(2)
        .position(|w| w[0].velocity.y < 0.0 && w[1].velocity.y > 0.0);
    let Some(bounce) = bounce else {
        return CheckResult::new("Rebound", false, "Probe never bounced".to_string());
    };

    let apex = history[bounce + 1..]
        .iter()
        .map(|s| s.position.y)
        .fold(f32::NEG_INFINITY, f32::max);
    let error = (apex - check.expected_height).abs() / check.expected_height.abs().max(1.0e-6);

    CheckResult::new(
        "Rebound",
        error <= check.tolerance,
        format!(
            "Bounce at t={:.4} s, apex {:.4} m, expected {:.4} m (error {:.1}%, tolerance {:.1}%)",
            history[bounce + 1].time,
            apex,
            check.expected_height,
            error * 100.0,
            check.tolerance * 100.0
        ),
    )
}

fn validate_density(metrics: &ErrorMetrics, check: &DensityCheck) -> CheckResult {
    CheckResult::new(
        "Density Variation",
        metrics.max_density_variation <= check.max_variation,
        format!(
            "Max variation: {:.1}% (limit: {:.1}%)",
            metrics.max_density_variation * 100.0,
            check.max_variation * 100.0
        ),
    )
}

fn validate_energy(metrics: &ErrorMetrics, check: &EnergyCheck) -> CheckResult {
    CheckResult::new(
        "Energy Conservation",
        metrics.energy_drift <= check.max_drift,
        format!(
            "Drift: {:.3}% (limit: {:.3}%)",
            metrics.energy_drift * 100.0,
            check.max_drift * 100.0
        ),
    )
}

impl TestResult {
    /// Print a summary of the test result
    pub fn print_summary(&self) {
        println!("\n{}", "=".repeat(80));
        println!("Test: {}", self.name);
        println!("{}", "=".repeat(80));
        println!("Status: {}", if self.passed { "PASSED" } else { "FAILED" });
        println!("Timesteps: {}", self.timesteps);
        println!("Simulated time: {:.6} s", self.sim_time);
        println!("\nError Metrics:");
        println!("  Max density variation: {:.2}%", self.error_metrics.max_density_variation * 100.0);
        println!("  Energy drift: {:.3}%", self.error_metrics.energy_drift * 100.0);
        println!("\nValidation Checks:");
        for check in &self.checks {
            let status = if check.passed { "PASS" } else { "FAIL" };
            print!("  [{}] {}", status, check.name);
            if let Some(ref msg) = check.message {
                print!(" - {}", msg);
            }
            println!();
        }
        println!("{}", "=".repeat(80));
    }
}
