//! The transition coordinator.
//!
//! Driven at the inner-loop rate by publications of the virtual control
//! streams, it drains commands, advances the active airframe's state
//! machine, multiplexes the two virtual streams into physical actuator
//! setpoints and fans the results out on the bus. All failure handling is
//! value based: ack codes, status flags and event records.

use core::fmt;

use log::{error, info, warn};
use nalgebra::Vector3;

use crate::airframe::{Airframe, StepContext, VtolMode};
use crate::bus::{FlightBus, Subscription};
use crate::msgs::*;
use crate::params::VtolParams;

/// Runs closer together than this are dropped (> 500 Hz protection).
pub const MIN_RUN_INTERVAL_US: u64 = 2_000;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorError {
    /// `VT_TYPE` does not name a supported airframe family.
    UnknownAirframeKind(i32),
}

impl fmt::Display for CoordinatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownAirframeKind(raw) => {
                write!(f, "unknown airframe kind {raw}")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CoordinatorError {}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// Latest sample of every inbound topic, owned by the coordinator. Airframes
/// read it through the per-call context.
#[derive(Debug, Clone, Default)]
pub struct InputSnapshot {
    pub vehicle_status: VehicleStatus,
    pub control_mode: VehicleControlMode,
    pub attitude: VehicleAttitude,
    pub local_position: VehicleLocalPosition,
    pub local_position_setpoint: VehicleLocalPositionSetpoint,
    pub position_setpoint_triplet: PositionSetpointTriplet,
    pub airspeed: AirspeedValidated,
    pub tecs_status: TecsStatus,
    pub land_detected: VehicleLandDetected,
    /// Home altitude in the local frame, when a valid one has been received.
    pub home_position_z: Option<f32>,
    /// Latest air density (kg/m³).
    pub air_density: f32,

    pub torque_virtual_mc: VehicleTorqueSetpoint,
    pub torque_virtual_fw: VehicleTorqueSetpoint,
    pub thrust_virtual_mc: VehicleThrustSetpoint,
    pub thrust_virtual_fw: VehicleThrustSetpoint,
    pub attitude_sp_virtual_mc: VehicleAttitudeSetpoint,
    pub attitude_sp_virtual_fw: VehicleAttitudeSetpoint,
}

impl InputSnapshot {
    pub fn new() -> Self {
        Self {
            air_density: 1.225,
            ..Default::default()
        }
    }
}

/// The four physical setpoints plus the attitude setpoint being composed,
/// owned by the coordinator and written by the airframe.
#[derive(Debug, Clone, Default)]
pub struct OutputSetpoints {
    pub torque_setpoint: [VehicleTorqueSetpoint; 2],
    pub thrust_setpoint: [VehicleThrustSetpoint; 2],
    pub attitude_sp: VehicleAttitudeSetpoint,
    pub tiltrotor_extras: TiltrotorExtraControls,
}

impl OutputSetpoints {
    /// Zero the four physical setpoints and restamp them for this tick.
    pub fn reset_stamps(
        &mut self,
        now: u64,
        torque_mc_sample: u64,
        torque_fw_sample: u64,
        thrust_mc_sample: u64,
        thrust_fw_sample: u64,
    ) {
        self.torque_setpoint[0] = VehicleTorqueSetpoint {
            timestamp: now,
            timestamp_sample: torque_mc_sample,
            xyz: Vector3::zeros(),
        };
        self.torque_setpoint[1] = VehicleTorqueSetpoint {
            timestamp: now,
            timestamp_sample: torque_fw_sample,
            xyz: Vector3::zeros(),
        };
        self.thrust_setpoint[0] = VehicleThrustSetpoint {
            timestamp: now,
            timestamp_sample: thrust_mc_sample,
            xyz: Vector3::zeros(),
        };
        self.thrust_setpoint[1] = VehicleThrustSetpoint {
            timestamp: now,
            timestamp_sample: thrust_fw_sample,
            xyz: Vector3::zeros(),
        };
    }
}

#[derive(Debug, Default)]
struct Subscriptions {
    vehicle_status: Subscription,
    control_mode: Subscription,
    attitude: Subscription,
    local_position: Subscription,
    local_position_setpoint: Subscription,
    position_setpoint_triplet: Subscription,
    airspeed: Subscription,
    tecs_status: Subscription,
    land_detected: Subscription,
    air_data: Subscription,
    home_position: Subscription,
    parameter_update: Subscription,
    torque_mc: Subscription,
    torque_fw: Subscription,
    thrust_mc: Subscription,
    thrust_fw: Subscription,
    att_sp_mc: Subscription,
    att_sp_fw: Subscription,
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Coordinator {
    params: VtolParams,
    airframe: Airframe,
    inputs: InputSnapshot,
    outputs: OutputSetpoints,
    vtol_status: VtolVehicleStatus,
    subs: Subscriptions,

    transition_command: VtolState,
    immediate_transition: bool,
    nav_state_prev: NavState,
    last_run_ts: u64,
    /// In lockstep simulation the scheduler already paces the loop; the
    /// rate gate is then disabled.
    lockstep_enabled: bool,
}

impl Coordinator {
    /// Fails only on configuration: an unknown airframe kind refuses to run.
    pub fn new(mut params: VtolParams) -> Result<Self, CoordinatorError> {
        let kind = params
            .airframe_kind()
            .ok_or(CoordinatorError::UnknownAirframeKind(params.vt_type))?;

        let mut airframe = Airframe::new(kind);
        airframe.parameters_update(&mut params);

        info!("transition coordinator starting, airframe: {}", kind.label());

        Ok(Self {
            params,
            airframe,
            inputs: InputSnapshot::new(),
            outputs: OutputSetpoints::default(),
            vtol_status: VtolVehicleStatus::default(),
            subs: Subscriptions::default(),
            transition_command: VtolState::Mc,
            immediate_transition: false,
            nav_state_prev: NavState::default(),
            last_run_ts: 0,
            lockstep_enabled: false,
        })
    }

    pub fn set_lockstep_enabled(&mut self, enabled: bool) {
        self.lockstep_enabled = enabled;
    }

    pub fn airframe(&self) -> &Airframe {
        &self.airframe
    }

    pub fn vtol_status(&self) -> &VtolVehicleStatus {
        &self.vtol_status
    }

    pub fn transition_command(&self) -> VtolState {
        self.transition_command
    }

    pub fn immediate_transition(&self) -> bool {
        self.immediate_transition
    }

    pub fn params(&self) -> &VtolParams {
        &self.params
    }

    fn is_fixed_wing_requested(&self) -> bool {
        self.transition_command == VtolState::Fw
    }

    /// One tick. `now` is the monotonic clock in microseconds; the call
    /// either runs to completion or returns early at one of the gates.
    pub fn run(&mut self, bus: &mut FlightBus, now: u64) {
        // prevent excessive scheduling (> 500 Hz)
        if !self.lockstep_enabled
            && self.last_run_ts != 0
            && now.saturating_sub(self.last_run_ts) < MIN_RUN_INTERVAL_US
        {
            return;
        }
        self.last_run_ts = now;

        let updated_fw_in = self
            .subs
            .torque_fw
            .update(&bus.torque_virtual_fw, &mut self.inputs.torque_virtual_fw)
            | self
                .subs
                .thrust_fw
                .update(&bus.thrust_virtual_fw, &mut self.inputs.thrust_virtual_fw);
        let updated_mc_in = self
            .subs
            .torque_mc
            .update(&bus.torque_virtual_mc, &mut self.inputs.torque_virtual_mc)
            | self
                .subs
                .thrust_mc
                .update(&bus.thrust_virtual_mc, &mut self.inputs.thrust_virtual_mc);

        // only run on publications of the stream that matches the mode
        let should_run = match self.airframe.mode() {
            VtolMode::TransitionToFw | VtolMode::TransitionToMc => updated_fw_in || updated_mc_in,
            VtolMode::RotaryWing => updated_mc_in,
            VtolMode::FixedWing => updated_fw_in,
        };

        if !should_run {
            return;
        }

        if self.subs.parameter_update.updated(&bus.parameter_update) {
            let _ = self.subs.parameter_update.copy(&bus.parameter_update);
            self.airframe.parameters_update(&mut self.params);
        }

        self.sample_inputs(bus);
        self.vehicle_status_poll(bus);
        self.action_request_poll(bus);
        self.vehicle_cmd_poll(bus, now);

        self.airframe.common_mut().advance_timers(now);
        self.airframe.handle_ekf_resets(&self.inputs, &mut self.outputs);

        let mc_att_sp_updated = self.subs.att_sp_mc.update(
            &bus.attitude_sp_virtual_mc,
            &mut self.inputs.attitude_sp_virtual_mc,
        );
        let fw_att_sp_updated = self.subs.att_sp_fw.update(
            &bus.attitude_sp_virtual_fw,
            &mut self.inputs.attitude_sp_virtual_fw,
        );

        // advance the state machine deciding which mode we are in
        let fixed_wing_requested = self.is_fixed_wing_requested();
        let failure = self.vtol_status.fixed_wing_system_failure;
        {
            let mut ctx = StepContext {
                now,
                inputs: &self.inputs,
                params: &self.params,
                outputs: &mut self.outputs,
                fixed_wing_requested,
                immediate_transition: &mut self.immediate_transition,
                fixed_wing_system_failure: failure,
            };
            self.airframe.update_vtol_state(&mut ctx);
        }

        let mode = self.airframe.mode();
        self.vtol_status.vehicle_vtol_state = match mode {
            VtolMode::RotaryWing => VtolState::Mc,
            VtolMode::FixedWing => VtolState::Fw,
            VtolMode::TransitionToFw => VtolState::TransitionToFw,
            VtolMode::TransitionToMc => VtolState::TransitionToMc,
        };

        // mode-specific work, gated on the matching attitude setpoints
        let mut quadchute_reason = None;
        match mode {
            VtolMode::TransitionToFw | VtolMode::TransitionToMc => {
                if mc_att_sp_updated || fw_att_sp_updated {
                    quadchute_reason = self
                        .airframe
                        .transition_safety_check(&self.inputs, &self.params);
                    self.step_airframe(now, Airframe::update_transition_state);
                    self.publish_attitude_sp(bus, now);
                }
            }
            VtolMode::RotaryWing => {
                if mc_att_sp_updated {
                    self.step_airframe(now, Airframe::update_mc_state);
                    self.publish_attitude_sp(bus, now);
                }
            }
            VtolMode::FixedWing => {
                if fw_att_sp_updated {
                    quadchute_reason = self
                        .airframe
                        .transition_safety_check(&self.inputs, &self.params);
                    self.step_airframe(now, Airframe::update_fw_state);
                    self.publish_attitude_sp(bus, now);
                }
            }
        }

        self.step_airframe(now, Airframe::fill_actuator_outputs);

        bus.torque_setpoint_0.publish(self.outputs.torque_setpoint[0]);
        bus.torque_setpoint_1.publish(self.outputs.torque_setpoint[1]);
        bus.thrust_setpoint_0.publish(self.outputs.thrust_setpoint[0]);
        bus.thrust_setpoint_1.publish(self.outputs.thrust_setpoint[1]);

        if matches!(self.airframe, Airframe::Tiltrotor(_)) {
            bus.tiltrotor_extra_controls
                .publish(self.outputs.tiltrotor_extras);
        }

        self.vtol_status.timestamp = now;
        bus.vtol_vehicle_status.publish(self.vtol_status);

        // Flaps/spoilers with the configured deflection while hovering in
        // auto. In manual and in forward flight other controllers own them.
        if self.inputs.control_mode.flag_control_auto_enabled
            && self.vtol_status.vehicle_vtol_state != VtolState::Fw
        {
            bus.flaps_setpoint.publish(NormalizedUnsignedSetpoint {
                timestamp: now,
                normalized_setpoint: 0.0,
            });

            let current = &self.inputs.position_setpoint_triplet.current;
            let landing = (current.valid && current.setpoint_type == PositionSetpointType::Land)
                || self.inputs.vehicle_status.nav_state == NavState::Descend;

            bus.spoilers_setpoint.publish(NormalizedUnsignedSetpoint {
                timestamp: now,
                normalized_setpoint: if landing { self.params.vt_spoiler_mc_ld } else { 0.0 },
            });
        }

        if let Some(reason) = quadchute_reason {
            self.quadchute(bus, reason, now);
        }
    }

    fn step_airframe(&mut self, now: u64, f: fn(&mut Airframe, &mut StepContext<'_>)) {
        let fixed_wing_requested = self.is_fixed_wing_requested();
        let failure = self.vtol_status.fixed_wing_system_failure;
        let mut ctx = StepContext {
            now,
            inputs: &self.inputs,
            params: &self.params,
            outputs: &mut self.outputs,
            fixed_wing_requested,
            immediate_transition: &mut self.immediate_transition,
            fixed_wing_system_failure: failure,
        };
        f(&mut self.airframe, &mut ctx);
    }

    fn publish_attitude_sp(&mut self, bus: &mut FlightBus, now: u64) {
        self.outputs.attitude_sp.timestamp = now;
        bus.vehicle_attitude_setpoint.publish(self.outputs.attitude_sp);
    }

    fn sample_inputs(&mut self, bus: &FlightBus) {
        self.subs
            .control_mode
            .update(&bus.vehicle_control_mode, &mut self.inputs.control_mode);
        self.subs
            .attitude
            .update(&bus.vehicle_attitude, &mut self.inputs.attitude);
        self.subs
            .local_position
            .update(&bus.vehicle_local_position, &mut self.inputs.local_position);
        self.subs.local_position_setpoint.update(
            &bus.vehicle_local_position_setpoint,
            &mut self.inputs.local_position_setpoint,
        );
        self.subs.position_setpoint_triplet.update(
            &bus.position_setpoint_triplet,
            &mut self.inputs.position_setpoint_triplet,
        );
        self.subs
            .airspeed
            .update(&bus.airspeed_validated, &mut self.inputs.airspeed);
        self.subs
            .tecs_status
            .update(&bus.tecs_status, &mut self.inputs.tecs_status);
        self.subs
            .land_detected
            .update(&bus.vehicle_land_detected, &mut self.inputs.land_detected);

        if self.subs.home_position.updated(&bus.home_position) {
            let home = self.subs.home_position.copy(&bus.home_position);
            self.inputs.home_position_z = home.valid_alt.then_some(home.z);
        }

        if self.subs.air_data.updated(&bus.vehicle_air_data) {
            self.inputs.air_density = self.subs.air_data.copy(&bus.vehicle_air_data).rho;
        }
    }

    /// Abort a front transition when return-to-launch engages mid-way; the
    /// airframe reacts on its next state update.
    fn vehicle_status_poll(&mut self, bus: &FlightBus) {
        self.subs
            .vehicle_status
            .update(&bus.vehicle_status, &mut self.inputs.vehicle_status);

        let nav_state = self.inputs.vehicle_status.nav_state;
        if nav_state == NavState::AutoRtl
            && self.nav_state_prev != NavState::AutoRtl
            && self.airframe.mode() == VtolMode::TransitionToFw
        {
            info!("return mode engaged, aborting transition to fixed-wing");
            self.transition_command = VtolState::Mc;
        }

        self.nav_state_prev = nav_state;
    }

    fn action_request_poll(&mut self, bus: &mut FlightBus) {
        while let Some(request) = bus.action_request.pop() {
            match request.action {
                ActionRequestKind::VtolTransitionToMulticopter => {
                    self.transition_command = VtolState::Mc;
                    self.immediate_transition = false;
                }
                ActionRequestKind::VtolTransitionToFixedwing => {
                    self.transition_command = VtolState::Fw;
                    self.immediate_transition = false;

                    // a fresh transition to FW clears a latched failure
                    self.vtol_status.fixed_wing_system_failure = false;
                }
            }
        }
    }

    fn vehicle_cmd_poll(&mut self, bus: &mut FlightBus, now: u64) {
        while let Some(command) = bus.vehicle_command.pop() {
            if command.command != VEHICLE_CMD_DO_VTOL_TRANSITION {
                continue;
            }

            let mut result = CommandResult::Accepted;

            match VtolState::from_transition_param(command.param1) {
                Some(VtolState::Fw)
                    if matches!(
                        self.inputs.vehicle_status.nav_state,
                        NavState::AutoTakeoff
                            | NavState::AutoLand
                            | NavState::AutoRtl
                            | NavState::Orbit
                    ) =>
                {
                    // deny MC→FW in takeoff, landing, return and orbit
                    warn!(
                        "transition to fixed-wing denied in {:?}",
                        self.inputs.vehicle_status.nav_state
                    );
                    result = CommandResult::TemporarilyRejected;
                }
                Some(target @ (VtolState::Fw | VtolState::Mc)) => {
                    self.transition_command = target;
                    self.immediate_transition =
                        command.param2.is_finite() && (command.param2 + 0.5) as i32 != 0;

                    if self.transition_command == VtolState::Fw {
                        // a fresh transition to FW clears a latched failure
                        self.vtol_status.fixed_wing_system_failure = false;
                    }

                    // an externally commanded immediate hand-back to hover is
                    // an emergency
                    if target == VtolState::Mc && self.immediate_transition && command.from_external
                    {
                        self.quadchute(bus, QuadchuteReason::ExternalCommand, now);
                    }
                }
                _ => {
                    result = CommandResult::TemporarilyRejected;
                }
            }

            if command.from_external {
                bus.vehicle_command_ack.push(VehicleCommandAck {
                    timestamp: now,
                    command: command.command,
                    result,
                    target_system: command.source_system,
                    target_component: command.source_component,
                });
            }
        }
    }

    /// Latch the fixed-wing failure and report it: exactly one critical log
    /// entry and one event record per firing.
    fn quadchute(&mut self, bus: &mut FlightBus, reason: QuadchuteReason, now: u64) {
        if self.vtol_status.fixed_wing_system_failure {
            return;
        }

        self.vtol_status.fixed_wing_system_failure = true;

        error!(
            "Quad-chute triggered due to {} ({})",
            reason.description(),
            reason.event_id()
        );

        bus.quadchute_event.push(QuadchuteEvent {
            timestamp: now,
            reason,
        });
    }
}
