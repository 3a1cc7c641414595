//! The reference scenarios, shared by the binary and `cargo test`.

use glam::{DVec3, Vec3};

use crate::analytical::{rebound_height, FreeFall, LinearDrag};
use crate::{
    project_path, DensityCheck, EnergyCheck, ExpectedResult, FinalStateCheck, PositionBoundsCheck,
    ReboundCheck, ReferenceTest,
};

const GRAVITY: DVec3 = DVec3::new(0.0, -9.8, 0.0);

/// Lone particle dropped from 5 m with no drag.
///
/// Final state matches the discrete semi-implicit Euler sequence; energy
/// drift is the integrator's `g^2 dt t / 2` per unit mass.
pub fn free_fall_test() -> ReferenceTest {
    let steps = 1000;
    let dt = 0.001;
    let fall = FreeFall {
        position: DVec3::new(0.0, 5.0, 0.0),
        velocity: DVec3::ZERO,
        gravity: GRAVITY,
    };

    ReferenceTest {
        name: "Free Fall".to_string(),
        config_path: project_path("configs/free-fall.json"),
        timesteps: steps,
        probe: 0,
        expected: ExpectedResult {
            final_state: Some(FinalStateCheck {
                position: Some(fall.position_after_steps(steps, dt).as_vec3()),
                velocity: Some(fall.velocity_after_steps(steps, dt).as_vec3()),
                tolerance: 2.0e-3,
            }),
            energy: Some(EnergyCheck { max_drift: 0.005 }),
            ..Default::default()
        },
    }
}

/// Lone particle accelerating from rest under gravity, drag and a 1 m/s
/// crosswind, for three drag time constants.
pub fn terminal_velocity_test() -> ReferenceTest {
    let steps = 3000;
    let dt = 0.002;
    let drag = LinearDrag {
        mass: 1.0,
        drag: 0.5,
        gravity: GRAVITY,
        wind: DVec3::new(1.0, 0.0, 0.0),
        velocity: DVec3::ZERO,
    };

    ReferenceTest {
        name: "Terminal Velocity".to_string(),
        config_path: project_path("configs/terminal-velocity.json"),
        timesteps: steps,
        probe: 0,
        expected: ExpectedResult {
            final_state: Some(FinalStateCheck {
                position: None,
                velocity: Some(drag.velocity_after_steps(steps, dt).as_vec3()),
                tolerance: 1.0e-2,
            }),
            ..Default::default()
        },
    }
}

/// Lone particle dropped 1 m onto a container floor with restitution 0.5.
///
/// After contact it sits `collision_clearance * particle_radius` above the
/// floor and should climb a further `e^2 h`.
pub fn restitution_bounce_test() -> ReferenceTest {
    let clearance = 0.5 * 0.05;

    ReferenceTest {
        name: "Restitution Bounce".to_string(),
        config_path: project_path("configs/bounce.json"),
        timesteps: 2000,
        probe: 0,
        expected: ExpectedResult {
            position_bounds: Some(PositionBoundsCheck {
                min: Vec3::new(-1.0, 0.0, -1.0),
                max: Vec3::new(1.0, 3.0, 1.0),
            }),
            rebound: Some(ReboundCheck {
                expected_height: rebound_height(1.0, 0.5, clearance) as f32,
                tolerance: 0.03,
            }),
            ..Default::default()
        },
    }
}

/// Water column collapsing inside a closed tank.
///
/// Nothing may leave the tank and the density must stay bounded.
pub fn dam_break_test() -> ReferenceTest {
    ReferenceTest {
        name: "Dam Break Containment".to_string(),
        config_path: project_path("configs/tank.json"),
        timesteps: 500,
        probe: 0,
        expected: ExpectedResult {
            position_bounds: Some(PositionBoundsCheck {
                min: Vec3::splat(-0.001),
                max: Vec3::new(2.001, 1.501, 1.001),
            }),
            density: Some(DensityCheck { max_variation: 1.0 }),
            ..Default::default()
        },
    }
}

/// Get all reference tests
pub fn all_tests() -> Vec<ReferenceTest> {
    vec![
        free_fall_test(),
        terminal_velocity_test(),
        restitution_bounce_test(),
        dam_break_test(),
    ]
}
