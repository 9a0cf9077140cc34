//! Minimal longitudinal plant the coordinator can fly against.
//!
//! One degree of freedom is enough to exercise every transition path: a
//! point mass accelerated by whatever forward thrust the coordinator
//! commands and slowed by linear drag, plus a first-order attitude lag so
//! pitch-driven airframes (tailsitters) see a realistic rotation.

/// Plant tuning. The defaults give a vehicle that comfortably reaches the
/// default transition airspeed within the default timeout.
#[derive(Debug, Clone, Copy)]
pub struct PlantConfig {
    /// Acceleration at full forward thrust (m/s²).
    pub thrust_accel: f32,
    /// Linear drag coefficient (1/s).
    pub drag_coeff: f32,
    /// Attitude tracking time constant (s).
    pub attitude_tau: f32,
}

impl Default for PlantConfig {
    fn default() -> Self {
        Self {
            thrust_accel: 12.0,
            drag_coeff: 0.1,
            attitude_tau: 0.3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VtolPlant {
    config: PlantConfig,
    /// True airspeed (m/s).
    pub airspeed: f32,
    /// Altitude above origin (m, up positive).
    pub altitude: f32,
    /// Measured pitch (rad).
    pub pitch: f32,
}

impl VtolPlant {
    pub fn new(config: PlantConfig, airspeed: f32, altitude: f32) -> Self {
        Self {
            config,
            airspeed,
            altitude,
            pitch: 0.0,
        }
    }

    /// Advance one step: `forward_thrust` in [0, 1] accelerates the vehicle,
    /// the attitude tracks `pitch_sp` with a first-order lag.
    pub fn step(&mut self, dt: f32, forward_thrust: f32, pitch_sp: f32) {
        let alpha = dt / (self.config.attitude_tau + dt);
        self.pitch += alpha * (pitch_sp - self.pitch);

        let accel = self.config.thrust_accel * forward_thrust.clamp(0.0, 1.0)
            - self.config.drag_coeff * self.airspeed;
        self.airspeed = (self.airspeed + accel * dt).max(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plant_accelerates_and_settles() {
        let mut plant = VtolPlant::new(PlantConfig::default(), 0.0, 50.0);
        for _ in 0..10_000 {
            plant.step(0.004, 0.5, 0.0);
        }
        // equilibrium: thrust_accel·thrust / drag
        let expected = 12.0 * 0.5 / 0.1;
        assert!((plant.airspeed - expected).abs() < 1.0);
    }

    #[test]
    fn test_attitude_lags_setpoint() {
        let mut plant = VtolPlant::new(PlantConfig::default(), 0.0, 50.0);
        plant.step(0.004, 0.0, -1.0);
        assert!(plant.pitch > -0.1, "one step must not snap to the setpoint");

        for _ in 0..1000 {
            plant.step(0.004, 0.0, -1.0);
        }
        assert!((plant.pitch - -1.0).abs() < 0.01);
    }

    #[test]
    fn test_airspeed_never_negative() {
        let mut plant = VtolPlant::new(PlantConfig::default(), 1.0, 50.0);
        for _ in 0..1000 {
            plant.step(0.004, 0.0, 0.0);
            assert!(plant.airspeed >= 0.0);
        }
    }
}
