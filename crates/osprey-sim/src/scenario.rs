//! Scripted closed-loop scenarios.
//!
//! A scenario wires a [`Coordinator`] to the [`VtolPlant`] over a
//! [`FlightBus`], publishes the surrounding flight stack's topics at the
//! inner-loop rate, fires scripted events (pilot requests, autopilot
//! commands, nav-state changes, sensor failures) and records a per-tick
//! trace.

use nalgebra::{UnitQuaternion, Vector3};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use osprey_core::bus::FlightBus;
use osprey_core::msgs::*;
use osprey_core::params::{AirframeKind, VtolParams};
use osprey_core::{Airframe, Coordinator, CoordinatorError};

use crate::plant::{PlantConfig, VtolPlant};

// ---------------------------------------------------------------------------
// Scripting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScenarioAction {
    /// Pilot requests forward flight.
    RequestFwPilot,
    /// Pilot requests hover.
    RequestMcPilot,
    /// Autopilot or GCS transition command.
    Command {
        target: VtolState,
        immediate: bool,
        external: bool,
    },
    SetNavState(NavState),
    SetLanded(bool),
    /// The airspeed source goes invalid (publishes NaN from here on).
    DisableAirspeedSensor,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScenarioEvent {
    /// Scenario time at which the action fires (s).
    pub at_s: f32,
    pub action: ScenarioAction,
}

#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    pub airframe: AirframeKind,
    pub params: VtolParams,
    pub plant: PlantConfig,
    pub duration_s: f32,
    pub tick_hz: f32,
    pub initial_airspeed: f32,
    pub initial_altitude: f32,
    pub initial_nav_state: NavState,
    /// 1-sigma airspeed measurement noise (m/s); 0 disables the generator.
    pub airspeed_noise_std: f32,
    pub seed: u64,
    pub events: Vec<ScenarioEvent>,
}

impl ScenarioConfig {
    pub fn new(airframe: AirframeKind) -> Self {
        Self {
            airframe,
            params: VtolParams {
                vt_type: airframe as i32,
                ..VtolParams::default()
            },
            plant: PlantConfig::default(),
            duration_s: 20.0,
            tick_hz: 250.0,
            initial_airspeed: 5.0,
            initial_altitude: 50.0,
            initial_nav_state: NavState::AutoMission,
            airspeed_noise_std: 0.0,
            seed: 42,
            events: Vec::new(),
        }
    }

    pub fn with_event(mut self, at_s: f32, action: ScenarioAction) -> Self {
        self.events.push(ScenarioEvent { at_s, action });
        self
    }
}

// ---------------------------------------------------------------------------
// Trace
// ---------------------------------------------------------------------------

/// Per-tick record of everything the scenario observed on the bus.
#[derive(Debug, Clone, Default)]
pub struct ScenarioTrace {
    pub time: Vec<f32>,
    pub mode: Vec<VtolState>,
    /// Roll, pitch, yaw and throttle multirotor weights.
    pub mc_weights: Vec<[f32; 4]>,
    /// Pusher throttle (standard), collective tilt (tiltrotor) or hover
    /// thrust magnitude (tailsitter).
    pub forward_actuator: Vec<f32>,
    pub airspeed: Vec<f32>,
    pub altitude: Vec<f32>,
    pub attitude_sp_pitch: Vec<f32>,
    pub failure_latched: Vec<bool>,
    pub acks: Vec<VehicleCommandAck>,
    pub quadchute_events: Vec<QuadchuteEvent>,
}

impl ScenarioTrace {
    /// First scenario time at which the published state equals `state`.
    pub fn first_time_in(&self, state: VtolState) -> Option<f32> {
        self.mode
            .iter()
            .position(|&m| m == state)
            .map(|i| self.time[i])
    }

    pub fn mode_at(&self, t: f32) -> VtolState {
        let dt = self.time.get(1).copied().unwrap_or(1.0) - self.time.first().copied().unwrap_or(0.0);
        let index = ((t / dt) as usize).min(self.mode.len() - 1);
        self.mode[index]
    }

    /// Sample one of the per-tick series at scenario time `t`.
    pub fn value_at(&self, values: &[f32], t: f32) -> f32 {
        let index = self
            .time
            .iter()
            .position(|&x| x >= t)
            .unwrap_or(values.len() - 1);
        values[index]
    }

    pub fn final_mode(&self) -> VtolState {
        self.mode.last().copied().unwrap_or(VtolState::Undefined)
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// Run a scenario to completion.
pub fn run_scenario(config: &ScenarioConfig) -> Result<ScenarioTrace, CoordinatorError> {
    let mut coordinator = Coordinator::new(config.params)?;
    coordinator.set_lockstep_enabled(true);

    let mut bus = FlightBus::new();
    let mut plant = VtolPlant::new(config.plant, config.initial_airspeed, config.initial_altitude);

    let mut rng = StdRng::seed_from_u64(config.seed);
    let airspeed_noise = (config.airspeed_noise_std > 0.0)
        .then(|| Normal::new(0.0, config.airspeed_noise_std).unwrap());

    let dt = 1.0 / config.tick_hz;
    let tick_us = (dt * 1e6) as u64;
    let steps = (config.duration_s / dt) as usize;

    let mut now: u64 = 1_000_000;
    let mut nav_state = config.initial_nav_state;
    let mut landed = false;
    let mut airspeed_sensor_ok = true;
    let mut fired = vec![false; config.events.len()];
    let mut prev_airspeed = plant.airspeed;

    // static surroundings
    bus.home_position.publish(HomePosition {
        timestamp: now,
        z: 0.0,
        valid_alt: true,
    });
    bus.vehicle_air_data.publish(VehicleAirData {
        timestamp: now,
        rho: 1.225,
    });

    let mut trace = ScenarioTrace::default();

    for step in 0..steps {
        now += tick_us;
        let t = step as f32 * dt;

        for (event, fired) in config.events.iter().zip(fired.iter_mut()) {
            if *fired || t < event.at_s {
                continue;
            }
            *fired = true;

            match event.action {
                ScenarioAction::RequestFwPilot => bus.action_request.push(ActionRequest {
                    timestamp: now,
                    action: ActionRequestKind::VtolTransitionToFixedwing,
                }),
                ScenarioAction::RequestMcPilot => bus.action_request.push(ActionRequest {
                    timestamp: now,
                    action: ActionRequestKind::VtolTransitionToMulticopter,
                }),
                ScenarioAction::Command {
                    target,
                    immediate,
                    external,
                } => bus.vehicle_command.push(VehicleCommand {
                    timestamp: now,
                    command: VEHICLE_CMD_DO_VTOL_TRANSITION,
                    param1: match target {
                        VtolState::Fw => 2.0,
                        _ => 3.0,
                    },
                    param2: if immediate { 1.0 } else { 0.0 },
                    from_external: external,
                    source_system: 42,
                    source_component: 7,
                }),
                ScenarioAction::SetNavState(state) => nav_state = state,
                ScenarioAction::SetLanded(state) => landed = state,
                ScenarioAction::DisableAirspeedSensor => airspeed_sensor_ok = false,
            }
        }

        publish_vehicle_state(
            &mut bus,
            now,
            &plant,
            nav_state,
            landed,
            prev_airspeed,
            dt,
        );

        let measured_airspeed = if airspeed_sensor_ok {
            let noise = airspeed_noise
                .as_ref()
                .map_or(0.0, |n| n.sample(&mut rng));
            plant.airspeed + noise
        } else {
            f32::NAN
        };
        bus.airspeed_validated.publish(AirspeedValidated {
            timestamp: now,
            calibrated_airspeed_m_s: measured_airspeed,
        });

        publish_virtual_streams(&mut bus, now);

        coordinator.run(&mut bus, now);

        // drive the plant with whatever the coordinator commanded
        let forward_thrust = forward_thrust_of(config.airframe, &bus, &plant);
        let (_, pitch_sp, _) = bus
            .vehicle_attitude_setpoint
            .latest()
            .q_d
            .euler_angles();
        prev_airspeed = plant.airspeed;
        plant.step(dt, forward_thrust, pitch_sp);

        // record
        let status = bus.vtol_vehicle_status.latest();
        let common = coordinator.airframe().common();
        trace.time.push(t);
        trace.mode.push(status.vehicle_vtol_state);
        trace.mc_weights.push([
            common.mc_roll_weight,
            common.mc_pitch_weight,
            common.mc_yaw_weight,
            common.mc_throttle_weight,
        ]);
        trace
            .forward_actuator
            .push(forward_actuator_of(config.airframe, &bus, &coordinator));
        trace.airspeed.push(plant.airspeed);
        trace.altitude.push(plant.altitude);
        trace.attitude_sp_pitch.push(pitch_sp);
        trace.failure_latched.push(status.fixed_wing_system_failure);

        while let Some(ack) = bus.vehicle_command_ack.pop() {
            trace.acks.push(ack);
        }
        while let Some(event) = bus.quadchute_event.pop() {
            trace.quadchute_events.push(event);
        }
    }

    Ok(trace)
}

fn publish_vehicle_state(
    bus: &mut FlightBus,
    now: u64,
    plant: &VtolPlant,
    nav_state: NavState,
    landed: bool,
    prev_airspeed: f32,
    dt: f32,
) {
    bus.vehicle_status.publish(VehicleStatus {
        timestamp: now,
        nav_state,
    });
    bus.vehicle_control_mode.publish(VehicleControlMode {
        timestamp: now,
        flag_armed: true,
        flag_control_climb_rate_enabled: true,
        flag_control_auto_enabled: true,
    });
    bus.vehicle_attitude.publish(VehicleAttitude {
        timestamp: now,
        q: UnitQuaternion::from_euler_angles(0.0, plant.pitch, 0.0),
        quat_reset_counter: 0,
        delta_q_reset: UnitQuaternion::identity(),
    });
    bus.vehicle_local_position.publish(VehicleLocalPosition {
        timestamp: now,
        x: 0.0,
        y: 0.0,
        z: -plant.altitude,
        vx: plant.airspeed,
        vy: 0.0,
        vz: 0.0,
        ax: (plant.airspeed - prev_airspeed) / dt,
        ay: 0.0,
        v_xy_valid: true,
        z_valid: true,
    });
    bus.vehicle_local_position_setpoint
        .publish(VehicleLocalPositionSetpoint {
            timestamp: now,
            z: -plant.altitude,
            vz: 0.0,
        });
    bus.vehicle_land_detected.publish(VehicleLandDetected {
        timestamp: now,
        landed,
    });
    bus.tecs_status.publish(TecsStatus {
        timestamp: now,
        height_rate: 0.0,
        height_rate_setpoint: 0.0,
    });
}

fn publish_virtual_streams(bus: &mut FlightBus, now: u64) {
    bus.torque_virtual_mc.publish(VehicleTorqueSetpoint {
        timestamp: now,
        timestamp_sample: now,
        xyz: Vector3::new(0.02, -0.01, 0.005),
    });
    bus.torque_virtual_fw.publish(VehicleTorqueSetpoint {
        timestamp: now,
        timestamp_sample: now,
        xyz: Vector3::new(0.03, 0.04, -0.02),
    });
    bus.thrust_virtual_mc.publish(VehicleThrustSetpoint {
        timestamp: now,
        timestamp_sample: now,
        xyz: Vector3::new(0.0, 0.0, -0.55),
    });
    bus.thrust_virtual_fw.publish(VehicleThrustSetpoint {
        timestamp: now,
        timestamp_sample: now,
        xyz: Vector3::new(0.6, 0.0, 0.0),
    });
    bus.attitude_sp_virtual_mc.publish(VehicleAttitudeSetpoint {
        timestamp: now,
        q_d: UnitQuaternion::identity(),
        thrust_body: Vector3::new(0.0, 0.0, -0.55),
    });
    bus.attitude_sp_virtual_fw.publish(VehicleAttitudeSetpoint {
        timestamp: now,
        q_d: UnitQuaternion::identity(),
        thrust_body: Vector3::new(0.6, 0.0, 0.0),
    });
}

/// Forward thrust actually reaching the plant for each airframe family.
fn forward_thrust_of(airframe: AirframeKind, bus: &FlightBus, plant: &VtolPlant) -> f32 {
    let thrust_0 = bus.thrust_setpoint_0.latest();

    match airframe {
        AirframeKind::Standard => thrust_0.xyz.x,
        AirframeKind::Tiltrotor => {
            let extras = bus.tiltrotor_extra_controls.latest();
            extras.collective_tilt * thrust_0.xyz.z.abs() + thrust_0.xyz.x
        }
        AirframeKind::Tailsitter => {
            // rotor thrust projected onto the flight path as the nose drops
            thrust_0.xyz.z.abs() * (-plant.pitch).sin().max(0.0)
        }
    }
}

fn forward_actuator_of(airframe: AirframeKind, bus: &FlightBus, coordinator: &Coordinator) -> f32 {
    match (airframe, coordinator.airframe()) {
        (AirframeKind::Standard, Airframe::Standard(standard)) => standard.pusher_throttle(),
        (AirframeKind::Tiltrotor, Airframe::Tiltrotor(tiltrotor)) => tiltrotor.tilt_control(),
        _ => bus.thrust_setpoint_0.latest().xyz.z.abs(),
    }
}
