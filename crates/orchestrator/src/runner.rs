//! Simulation runner with lifecycle management
//!
//! This module provides the `SimulationRunner` which drives a simulation
//! backend in a background thread. Play/pause and the particle render mode
//! are control signals only: they decide whether a step runs and whether its
//! positions are published, never how it is computed.

use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use sph::{ParameterError, PositionBuffer, SimulationBackend, SimulationParameters};

/// Poll interval while waiting to start or while paused.
const IDLE_POLL: Duration = Duration::from_millis(10);

/// Runner state enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    /// Simulation created but not yet started
    Created,
    /// Simulation actively running
    Running,
    /// Simulation paused
    Paused,
    /// Simulation finished (reached stopping condition)
    Finished,
    /// Simulation stopped after a numerical failure
    Error,
}

/// Whether particle positions are published after each step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Publish positions every step
    Particles,
    /// Step without publishing
    Hidden,
}

/// Shared state between the runner thread and control interface
struct SharedState {
    state: RunnerState,
    render_mode: RenderMode,
    /// Parameters submitted since the last step
    submitted: Option<SimulationParameters>,
    sim_time: f64,
    step_count: u64,
    error_message: Option<String>,
}

/// Handle for controlling and querying a running simulation
pub struct SimulationRunner {
    shared: Arc<Mutex<SharedState>>,
    output: PositionBuffer,
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl SimulationRunner {
    /// Create a runner around `backend`. The thread waits for [`start`](Self::start).
    ///
    /// # Arguments
    /// * `backend` - The simulation to drive
    /// * `render_mode` - Initial render mode
    /// * `max_steps` - Optional maximum number of steps
    /// * `max_time` - Optional maximum simulation time (seconds)
    pub fn new(
        mut backend: Box<dyn SimulationBackend>,
        render_mode: RenderMode,
        max_steps: Option<u64>,
        max_time: Option<f64>,
    ) -> Self {
        let shared = Arc::new(Mutex::new(SharedState {
            state: RunnerState::Created,
            render_mode,
            submitted: None,
            sim_time: backend.time(),
            step_count: 0,
            error_message: None,
        }));
        let output = backend.output();

        let shared_clone = Arc::clone(&shared);
        let thread_handle = thread::spawn(move || {
            run_simulation_loop(backend.as_mut(), shared_clone, max_steps, max_time);
        });

        Self {
            shared,
            output,
            thread_handle: Some(thread_handle),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SharedState> {
        lock_shared(&self.shared)
    }

    /// Get current runner state
    pub fn state(&self) -> RunnerState {
        self.lock().state
    }

    /// Get current simulation time (seconds)
    pub fn sim_time(&self) -> f64 {
        self.lock().sim_time
    }

    /// Get the number of completed steps
    pub fn step_count(&self) -> u64 {
        self.lock().step_count
    }

    /// Get error message if state is Error
    pub fn error_message(&self) -> Option<String> {
        self.lock().error_message.clone()
    }

    /// Start the simulation (transition from Created to Running)
    pub fn start(&self) {
        let mut state = self.lock();
        if state.state == RunnerState::Created {
            tracing::info!("Simulation started");
            state.state = RunnerState::Running;
        }
    }

    /// Pause the simulation
    pub fn pause(&self) {
        let mut state = self.lock();
        if state.state == RunnerState::Running {
            state.state = RunnerState::Paused;
        }
    }

    /// Resume the simulation
    pub fn resume(&self) {
        let mut state = self.lock();
        if state.state == RunnerState::Paused {
            state.state = RunnerState::Running;
        }
    }

    /// Flip between running and paused. Returns the new state.
    pub fn toggle_pause(&self) -> RunnerState {
        let mut state = self.lock();
        state.state = match state.state {
            RunnerState::Running => RunnerState::Paused,
            RunnerState::Paused => RunnerState::Running,
            other => other,
        };
        state.state
    }

    /// Current render mode
    pub fn render_mode(&self) -> RenderMode {
        self.lock().render_mode
    }

    /// Set the render mode, effective from the next step
    pub fn set_render_mode(&self, mode: RenderMode) {
        self.lock().render_mode = mode;
    }

    /// Flip the render mode. Returns the new mode.
    pub fn toggle_render_mode(&self) -> RenderMode {
        let mut state = self.lock();
        state.render_mode = match state.render_mode {
            RenderMode::Particles => RenderMode::Hidden,
            RenderMode::Hidden => RenderMode::Particles,
        };
        state.render_mode
    }

    /// Submit a new parameter snapshot.
    ///
    /// The snapshot is validated here; a valid one reaches the backend before
    /// its next step and is installed at that step's start.
    pub fn submit_parameters(&self, params: SimulationParameters) -> Result<(), ParameterError> {
        params.validate()?;
        self.lock().submitted = Some(params);
        Ok(())
    }

    /// Handle to the published position frames
    pub fn positions(&self) -> PositionBuffer {
        self.output.clone()
    }

    /// Stop the simulation thread at the next step boundary
    pub fn stop(&self) {
        let mut state = self.lock();
        if matches!(state.state, RunnerState::Created | RunnerState::Running | RunnerState::Paused) {
            state.state = RunnerState::Finished;
        }
    }

    /// Wait for the simulation thread to complete
    pub fn join(mut self) -> Result<(), String> {
        if let Some(handle) = self.thread_handle.take() {
            handle.join().map_err(|_| "Thread panicked".to_string())?;
        }
        Ok(())
    }
}

impl Drop for SimulationRunner {
    fn drop(&mut self) {
        // Signal the thread to exit
        self.stop();
    }
}

fn lock_shared(shared: &Mutex<SharedState>) -> MutexGuard<'_, SharedState> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Main simulation loop executed in background thread
fn run_simulation_loop(
    backend: &mut dyn SimulationBackend,
    shared: Arc<Mutex<SharedState>>,
    max_steps: Option<u64>,
    max_time: Option<f64>,
) {
    // Wait for start signal
    loop {
        let state = lock_shared(&shared).state;
        match state {
            RunnerState::Created => thread::sleep(IDLE_POLL),
            RunnerState::Running | RunnerState::Paused => break,
            _ => return,
        }
    }

    let start_wall_time = Instant::now();
    let mut step_count = 0_u64;

    loop {
        let (state, render_mode, submitted) = {
            let mut guard = lock_shared(&shared);
            (guard.state, guard.render_mode, guard.submitted.take())
        };

        if let Some(params) = submitted {
            if let Err(e) = backend.apply_parameters(params) {
                tracing::warn!("parameter snapshot rejected: {}", e);
            }
        }

        match state {
            RunnerState::Running => {
                match render_mode {
                    RenderMode::Particles => backend.step(),
                    RenderMode::Hidden => backend.advance(),
                }
                step_count += 1;
                let sim_time = backend.time();

                if backend.particles().positions().iter().any(|p| !p.is_finite()) {
                    let message = format!("non-finite particle position after step {step_count}");
                    tracing::warn!("Simulation stopped: {}", message);
                    let mut guard = lock_shared(&shared);
                    guard.state = RunnerState::Error;
                    guard.error_message = Some(message);
                    guard.step_count = step_count;
                    guard.sim_time = sim_time;
                    break;
                }

                {
                    let mut guard = lock_shared(&shared);
                    guard.sim_time = sim_time;
                    guard.step_count = step_count;
                }

                if let Some(max) = max_steps {
                    if step_count >= max {
                        tracing::info!("Simulation finished: reached max_steps = {}", max);
                        lock_shared(&shared).state = RunnerState::Finished;
                        break;
                    }
                }

                if let Some(max_t) = max_time {
                    if sim_time >= max_t {
                        tracing::info!("Simulation finished: reached max_time = {:.3}s", max_t);
                        lock_shared(&shared).state = RunnerState::Finished;
                        break;
                    }
                }

                if step_count % 100 == 0 {
                    let metrics = backend.error_metrics();
                    tracing::debug!(
                        "Step {}: sim_time={:.4}s, wall_time={:.2}s, max density variation={:.4}",
                        step_count,
                        sim_time,
                        start_wall_time.elapsed().as_secs_f64(),
                        metrics.max_density_variation,
                    );
                }
            }
            RunnerState::Paused => thread::sleep(IDLE_POLL),
            RunnerState::Finished | RunnerState::Error | RunnerState::Created => break,
        }
    }

    tracing::info!(
        "Simulation thread exiting: {} steps, {:.4}s simulated",
        step_count,
        backend.time()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use sph::{Bvh, CpuSimulation, ParticleSet};

    fn small_backend() -> Box<dyn SimulationBackend> {
        let particles = ParticleSet::from_positions(vec![
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.05, 1.0, 0.0),
        ]);
        Box::new(CpuSimulation::new(SimulationParameters::default(), particles, Bvh::default()).unwrap())
    }

    fn wait_for(runner: &SimulationRunner, state: RunnerState) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while runner.state() != state {
            assert!(Instant::now() < deadline, "timed out waiting for {state:?}");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_runner_lifecycle() {
        let runner = SimulationRunner::new(small_backend(), RenderMode::Particles, Some(10), None);
        assert_eq!(runner.state(), RunnerState::Created);

        runner.start();
        wait_for(&runner, RunnerState::Finished);
        assert_eq!(runner.step_count(), 10);
        assert_eq!(runner.positions().generation(), 10);
        assert!((runner.sim_time() - 10.0 * 0.005).abs() < 1.0e-6);

        runner.join().unwrap();
    }

    #[test]
    fn test_runner_pause_resume() {
        let runner = SimulationRunner::new(small_backend(), RenderMode::Particles, Some(1_000_000), None);
        runner.start();
        thread::sleep(Duration::from_millis(20));

        runner.pause();
        assert_eq!(runner.state(), RunnerState::Paused);
        thread::sleep(Duration::from_millis(30));

        // Allow for one step that was already in flight.
        let steps_paused = runner.step_count();
        thread::sleep(Duration::from_millis(50));
        let steps_after_pause = runner.step_count();
        assert!(
            steps_after_pause <= steps_paused + 1,
            "Steps should not advance while paused: before={steps_paused}, after={steps_after_pause}"
        );

        assert_eq!(runner.toggle_pause(), RunnerState::Running);
        runner.stop();
        runner.join().unwrap();
    }

    #[test]
    fn hidden_mode_skips_publishing() {
        let runner = SimulationRunner::new(small_backend(), RenderMode::Hidden, Some(5), None);
        runner.start();
        wait_for(&runner, RunnerState::Finished);
        assert_eq!(runner.step_count(), 5);
        assert_eq!(runner.positions().generation(), 0);
        assert_eq!(runner.toggle_render_mode(), RenderMode::Particles);
        runner.join().unwrap();
    }

    #[test]
    fn invalid_submission_is_rejected() {
        let runner = SimulationRunner::new(small_backend(), RenderMode::Particles, Some(1), None);
        let bad = SimulationParameters { time_step: -1.0, ..Default::default() };
        assert!(runner.submit_parameters(bad).is_err());
        runner.stop();
        runner.join().unwrap();
    }

    #[test]
    fn submitted_parameters_take_effect() {
        let runner = SimulationRunner::new(small_backend(), RenderMode::Particles, None, Some(0.1));
        let slower = SimulationParameters { time_step: 0.01, ..Default::default() };
        runner.submit_parameters(slower).unwrap();
        runner.start();
        wait_for(&runner, RunnerState::Finished);
        // 0.1 s at dt = 0.01 instead of 20 steps at the default 0.005.
        assert!(runner.step_count() <= 11, "steps = {}", runner.step_count());
        runner.join().unwrap();
    }
}
