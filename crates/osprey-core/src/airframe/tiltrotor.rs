//! Tiltrotor airframe: rotors rotate between vertical and horizontal thrust
//! axes.
//!
//! A front transition has two phases: spool/accelerate with the rotors at an
//! intermediate tilt, then tilt fully forward while the rotor authority
//! fades. A back transition ramps the tilt back to hover while the rear
//! vertical rotors leave idle and spin up; the state machine refuses to
//! complete until they are up.

#[cfg(not(feature = "std"))]
use num_traits::Float;

use super::common::TransitionCommon;
use super::{StepContext, ThrottleBlendAction, VtolMode};
use crate::msgs::TiltrotorExtraControls;
use crate::params::VtolParams;

const EPSILON: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlightPhase {
    Mc,
    TransitionFrontP1,
    TransitionFrontP2,
    TransitionBack,
    Fw,
}

#[derive(Debug)]
pub struct Tiltrotor {
    pub common: TransitionCommon,
    phase: FlightPhase,
    /// Commanded tilt servo position in [0, 1].
    tilt_control: f32,
    /// Transition-clock value at the phase 1 → phase 2 handover (s).
    time_p1_duration: f32,
    /// Hover throttle magnitude carried into forward flight for TECS
    /// blending.
    thrust_transition: f32,
    fw_throttle_at_back_trans: f32,
}

impl Default for Tiltrotor {
    fn default() -> Self {
        Self::new()
    }
}

fn move_linear(start: f32, stop: f32, progress: f32) -> f32 {
    start + (stop - start) * progress.clamp(0.0, 1.0)
}

impl Tiltrotor {
    pub fn new() -> Self {
        Self {
            common: TransitionCommon::new(),
            phase: FlightPhase::Mc,
            tilt_control: 0.0,
            time_p1_duration: 0.0,
            thrust_transition: 0.0,
            fw_throttle_at_back_trans: 0.0,
        }
    }

    pub fn tilt_control(&self) -> f32 {
        self.tilt_control
    }

    pub fn parameters_update(&mut self, params: &mut VtolParams) {
        params.sanitize();

        // tilt positions must be ordered hover ≤ transition ≤ forward
        params.vt_tilt_trans = params.vt_tilt_trans.clamp(params.vt_tilt_mc, params.vt_tilt_fw);
        params.vt_trans_p2_dur = params.vt_trans_p2_dur.max(0.1);
        params.vt_bt_tilt_dur = params.vt_bt_tilt_dur.max(0.1);
    }

    /// Remaining spin-up time of the rear vertical rotors, estimated from the
    /// back-transition tilt ramp.
    pub fn time_until_motors_are_up(&self, params: &VtolParams) -> f32 {
        (params.vt_bt_tilt_dur - self.common.time_since_trans_start).max(0.0)
    }

    pub fn update_vtol_state(&mut self, ctx: &mut StepContext<'_>) {
        if ctx.fixed_wing_system_failure {
            // failsafe: tilt straight back to hover
            self.phase = FlightPhase::Mc;
            self.tilt_control = ctx.params.vt_tilt_mc;
        } else if !ctx.fixed_wing_requested {
            match self.phase {
                FlightPhase::Mc => {
                    self.tilt_control = ctx.params.vt_tilt_mc;
                }
                FlightPhase::Fw => {
                    self.common.reset_transition_states(ctx.now, ctx.inputs);
                    self.fw_throttle_at_back_trans =
                        ctx.inputs.attitude_sp_virtual_fw.thrust_body.x;
                    self.phase = FlightPhase::TransitionBack;
                }
                FlightPhase::TransitionFrontP1 | FlightPhase::TransitionFrontP2 => {
                    // abort
                    self.phase = FlightPhase::Mc;
                    self.tilt_control = ctx.params.vt_tilt_mc;
                }
                FlightPhase::TransitionBack => {
                    let elapsed = self.common.can_transition_on_ground(ctx.inputs)
                        || self.common.time_since_trans_start > ctx.params.vt_b_trans_dur;

                    // never hand over to the rotors before they are up
                    if elapsed && self.time_until_motors_are_up(ctx.params) <= 0.0 {
                        self.phase = FlightPhase::Mc;
                    }
                }
            }
        } else {
            match self.phase {
                FlightPhase::Mc | FlightPhase::TransitionBack => {
                    self.common.reset_transition_states(ctx.now, ctx.inputs);
                    self.phase = FlightPhase::TransitionFrontP1;
                }
                FlightPhase::Fw => {}
                FlightPhase::TransitionFrontP1 => {
                    // accelerate until the blend airspeed, or on time without
                    // a usable airspeed
                    let airspeed = ctx.inputs.airspeed.calibrated_airspeed_m_s;
                    let reached_speed = self.common.airspeed_usable(ctx.inputs, ctx.params)
                        && airspeed >= self.common.blend_airspeed(ctx.params);
                    let open_loop = !self.common.airspeed_usable(ctx.inputs, ctx.params)
                        && self.common.time_since_trans_start
                            > self.common.minimum_front_transition_time(ctx.inputs, ctx.params);

                    if reached_speed
                        || open_loop
                        || self.common.can_transition_on_ground(ctx.inputs)
                        || *ctx.immediate_transition
                    {
                        self.phase = FlightPhase::TransitionFrontP2;
                        self.time_p1_duration = self.common.time_since_trans_start;
                    }
                }
                FlightPhase::TransitionFrontP2 => {
                    let mut completed = self.common.time_since_trans_start - self.time_p1_duration
                        >= ctx.params.vt_trans_p2_dur;

                    completed |= self.common.can_transition_on_ground(ctx.inputs);

                    if *ctx.immediate_transition {
                        completed = true;
                        *ctx.immediate_transition = false;
                    }

                    if completed {
                        self.phase = FlightPhase::Fw;
                        self.tilt_control = ctx.params.vt_tilt_fw;
                        self.common.trans_finished_ts = ctx.now;
                    }
                }
            }
        }

        match self.phase {
            FlightPhase::Mc => self.common.set_weights(1.0),
            FlightPhase::Fw => self.common.set_weights(0.0),
            _ => {}
        }

        self.common.common_mode = match self.phase {
            FlightPhase::Mc => VtolMode::RotaryWing,
            FlightPhase::Fw => VtolMode::FixedWing,
            FlightPhase::TransitionFrontP1 | FlightPhase::TransitionFrontP2 => {
                VtolMode::TransitionToFw
            }
            FlightPhase::TransitionBack => VtolMode::TransitionToMc,
        };
    }

    pub fn update_transition_state(&mut self, ctx: &mut StepContext<'_>) {
        let mc_sp = &ctx.inputs.attitude_sp_virtual_mc;
        if self.common.setpoint_stale(mc_sp.timestamp, ctx.now) {
            return;
        }

        // hover controller keeps flying the vehicle through both phases
        ctx.outputs.attitude_sp = *mc_sp;

        let mut mc_weight = 1.0;

        match self.phase {
            FlightPhase::TransitionFrontP1 => {
                let duration = self
                    .common
                    .open_loop_front_trans_dur(ctx.inputs, ctx.params)
                    .max(EPSILON);
                self.tilt_control = move_linear(
                    ctx.params.vt_tilt_mc,
                    ctx.params.vt_tilt_trans,
                    self.common.time_since_trans_start / duration,
                );

                self.thrust_transition = mc_sp.thrust_body.z.abs();
            }
            FlightPhase::TransitionFrontP2 => {
                let progress = (self.common.time_since_trans_start - self.time_p1_duration)
                    / ctx.params.vt_trans_p2_dur.max(EPSILON);
                self.tilt_control = move_linear(
                    ctx.params.vt_tilt_trans,
                    ctx.params.vt_tilt_fw,
                    progress,
                );

                mc_weight = 1.0 - progress.clamp(0.0, 1.0);
            }
            FlightPhase::TransitionBack => {
                let progress =
                    self.common.time_since_trans_start / ctx.params.vt_bt_tilt_dur.max(EPSILON);
                self.tilt_control =
                    move_linear(ctx.params.vt_tilt_fw, ctx.params.vt_tilt_mc, progress);

                // hover authority ramps back in
                if ctx.params.vt_b_trans_ramp > EPSILON {
                    mc_weight = self.common.time_since_trans_start / ctx.params.vt_b_trans_ramp;
                }

                // throttle blends from the last fixed-wing demand to the
                // hover demand over the tilt ramp
                let blend = progress.clamp(0.0, 1.0);
                ctx.outputs.attitude_sp.thrust_body.z = blend * mc_sp.thrust_body.z
                    + (1.0 - blend) * -self.fw_throttle_at_back_trans;
            }
            _ => {}
        }

        self.common.set_weights(mc_weight);
    }

    pub fn update_mc_state(&mut self, ctx: &mut StepContext<'_>) {
        self.common.update_mc_state_base(ctx.inputs, ctx.outputs);
        self.tilt_control = ctx.params.vt_tilt_mc;
    }

    pub fn update_fw_state(&mut self, ctx: &mut StepContext<'_>) {
        self.common.update_fw_state_base(ctx.inputs, ctx.outputs);
        self.tilt_control = ctx.params.vt_tilt_fw;

        match self.common.post_transition_throttle_action(ctx.inputs, ctx.now) {
            ThrottleBlendAction::WaitingOnTecs => self.waiting_on_tecs(ctx),
            ThrottleBlendAction::Blend(scale) => {
                self.blend_throttle_after_front_transition(ctx, scale)
            }
            ThrottleBlendAction::Settled => {}
        }
    }

    /// Keep the thrust the transition ended with until TECS runs.
    pub fn waiting_on_tecs(&mut self, ctx: &mut StepContext<'_>) {
        ctx.outputs.attitude_sp.thrust_body.x = self.thrust_transition;
    }

    pub fn blend_throttle_after_front_transition(&mut self, ctx: &mut StepContext<'_>, scale: f32) {
        let tecs_throttle = ctx.outputs.attitude_sp.thrust_body.x;
        ctx.outputs.attitude_sp.thrust_body.x =
            scale * tecs_throttle + (1.0 - scale) * self.thrust_transition;
    }

    pub fn fill_actuator_outputs(&mut self, ctx: &mut StepContext<'_>) {
        let outputs = &mut *ctx.outputs;
        outputs.reset_stamps(
            ctx.now,
            ctx.inputs.torque_virtual_mc.timestamp_sample,
            ctx.inputs.torque_virtual_fw.timestamp_sample,
            ctx.inputs.thrust_virtual_mc.timestamp_sample,
            ctx.inputs.thrust_virtual_fw.timestamp_sample,
        );

        let torque_mc = &ctx.inputs.torque_virtual_mc.xyz;
        let torque_fw = &ctx.inputs.torque_virtual_fw.xyz;
        let thrust_mc = &ctx.inputs.thrust_virtual_mc.xyz;
        let thrust_fw = &ctx.inputs.thrust_virtual_fw.xyz;

        match self.phase {
            FlightPhase::Mc => {
                outputs.torque_setpoint[0].xyz = *torque_mc;
                outputs.thrust_setpoint[0].xyz.z = thrust_mc.z;

                if !ctx.params.vt_elev_mc_lock {
                    outputs.torque_setpoint[1].xyz.x = torque_fw.x;
                    outputs.torque_setpoint[1].xyz.y = torque_fw.y;
                }
            }
            FlightPhase::Fw => {
                // rotors tilted forward: thrust rides on the body x axis
                outputs.torque_setpoint[1].xyz = *torque_fw;
                outputs.thrust_setpoint[0].xyz.x = thrust_fw.x;
            }
            _ => {
                outputs.torque_setpoint[0].xyz.x = torque_mc.x * self.common.mc_roll_weight;
                outputs.torque_setpoint[0].xyz.y = torque_mc.y * self.common.mc_pitch_weight;
                outputs.torque_setpoint[0].xyz.z = torque_mc.z * self.common.mc_yaw_weight;
                outputs.thrust_setpoint[0].xyz.z = thrust_mc.z * self.common.mc_throttle_weight;

                outputs.torque_setpoint[1].xyz = *torque_fw;
            }
        }

        // the tilt servo and rear-motor gating ride on a dedicated record
        outputs.tiltrotor_extras = TiltrotorExtraControls {
            timestamp: ctx.now,
            collective_tilt: self.tilt_control.clamp(0.0, 1.0),
            rear_motors_enabled: self.phase != FlightPhase::Fw,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::{InputSnapshot, OutputSetpoints};

    struct Harness {
        airframe: Tiltrotor,
        inputs: InputSnapshot,
        outputs: OutputSetpoints,
        params: VtolParams,
        fw_requested: bool,
        immediate: bool,
        now: u64,
    }

    impl Harness {
        fn new() -> Self {
            let mut inputs = InputSnapshot::default();
            inputs.control_mode.flag_armed = true;
            inputs.control_mode.flag_control_climb_rate_enabled = true;
            inputs.local_position.z_valid = true;
            inputs.attitude_sp_virtual_mc.thrust_body.z = -0.5;

            Self {
                airframe: Tiltrotor::new(),
                inputs,
                outputs: OutputSetpoints::default(),
                params: VtolParams::default(),
                fw_requested: false,
                immediate: false,
                now: 1_000_000,
            }
        }

        fn tick(&mut self, dt_us: u64) {
            self.now += dt_us;
            self.airframe.common.advance_timers(self.now);
            self.inputs.attitude_sp_virtual_mc.timestamp = self.now;
            self.inputs.attitude_sp_virtual_fw.timestamp = self.now;

            let mut ctx = StepContext {
                now: self.now,
                inputs: &self.inputs,
                params: &self.params,
                outputs: &mut self.outputs,
                fixed_wing_requested: self.fw_requested,
                immediate_transition: &mut self.immediate,
                fixed_wing_system_failure: false,
            };
            self.airframe.update_vtol_state(&mut ctx);

            let mut ctx = StepContext {
                now: self.now,
                inputs: &self.inputs,
                params: &self.params,
                outputs: &mut self.outputs,
                fixed_wing_requested: self.fw_requested,
                immediate_transition: &mut self.immediate,
                fixed_wing_system_failure: false,
            };
            match self.airframe.common.common_mode {
                VtolMode::TransitionToFw | VtolMode::TransitionToMc => {
                    self.airframe.update_transition_state(&mut ctx)
                }
                VtolMode::RotaryWing => self.airframe.update_mc_state(&mut ctx),
                VtolMode::FixedWing => self.airframe.update_fw_state(&mut ctx),
            }

            let mut ctx = StepContext {
                now: self.now,
                inputs: &self.inputs,
                params: &self.params,
                outputs: &mut self.outputs,
                fixed_wing_requested: self.fw_requested,
                immediate_transition: &mut self.immediate,
                fixed_wing_system_failure: false,
            };
            self.airframe.fill_actuator_outputs(&mut ctx);
        }

        fn mode(&self) -> VtolMode {
            self.airframe.common.common_mode
        }
    }

    const TICK_US: u64 = 4_000;

    #[test]
    fn test_two_phase_front_transition() {
        let mut h = Harness::new();
        h.inputs.airspeed.calibrated_airspeed_m_s = 3.0;
        h.fw_requested = true;
        h.tick(TICK_US);
        assert_eq!(h.mode(), VtolMode::TransitionToFw);

        // phase 1: tilt creeps from hover toward the transition position
        for _ in 0..100 {
            h.tick(TICK_US);
        }
        let tilt_p1 = h.airframe.tilt_control();
        assert!(tilt_p1 > h.params.vt_tilt_mc);
        assert!(tilt_p1 <= h.params.vt_tilt_trans + 1e-6);
        // full hover authority while accelerating
        assert_eq!(h.airframe.common.mc_roll_weight, 1.0);

        // reaching the blend airspeed hands over to phase 2
        h.inputs.airspeed.calibrated_airspeed_m_s = 8.5;
        h.tick(TICK_US);
        assert_eq!(h.mode(), VtolMode::TransitionToFw);

        // phase 2 runs VT_TRANS_P2_DUR seconds, fading the rotors
        let p2_start = h.now;
        let mut prev_weight = 1.0;
        while h.mode() == VtolMode::TransitionToFw {
            h.tick(TICK_US);
            let w = h.airframe.common.mc_roll_weight;
            assert!(w <= prev_weight + 1e-6);
            prev_weight = w;
            assert!(h.now - p2_start < 2_000_000, "phase 2 never completed");
        }

        let p2_time = (h.now - p2_start) as f32 * 1e-6;
        assert_eq!(h.mode(), VtolMode::FixedWing);
        assert!((p2_time - h.params.vt_trans_p2_dur).abs() < 0.05);
        assert!((h.airframe.tilt_control() - h.params.vt_tilt_fw).abs() < 1e-6);
        assert_eq!(h.airframe.common.mc_roll_weight, 0.0);
    }

    #[test]
    fn test_back_transition_waits_for_motor_spinup() {
        let mut h = Harness::new();
        h.params.vt_bt_tilt_dur = 6.0; // longer than the back transition timeout
        h.inputs.airspeed.calibrated_airspeed_m_s = 12.0;
        h.fw_requested = true;
        h.immediate = true;
        h.tick(TICK_US);
        h.tick(TICK_US);
        h.tick(TICK_US);
        assert_eq!(h.mode(), VtolMode::FixedWing);

        h.fw_requested = false;
        h.tick(TICK_US);
        assert_eq!(h.mode(), VtolMode::TransitionToMc);

        // timeout passed but the rear motors are still spinning up
        while h.airframe.common.time_since_trans_start < h.params.vt_b_trans_dur + 0.5 {
            h.tick(TICK_US);
        }
        assert_eq!(h.mode(), VtolMode::TransitionToMc);
        assert!(h.airframe.time_until_motors_are_up(&h.params) > 0.0);

        // once they are up, hover
        while h.airframe.time_until_motors_are_up(&h.params) > 0.0 {
            h.tick(TICK_US);
        }
        h.tick(TICK_US);
        assert_eq!(h.mode(), VtolMode::RotaryWing);
    }

    #[test]
    fn test_back_transition_tilt_ramp() {
        let mut h = Harness::new();
        h.inputs.airspeed.calibrated_airspeed_m_s = 12.0;
        h.fw_requested = true;
        h.immediate = true;
        h.tick(TICK_US);
        h.tick(TICK_US);
        h.tick(TICK_US);
        assert_eq!(h.mode(), VtolMode::FixedWing);

        h.fw_requested = false;
        h.tick(TICK_US);

        let mut prev_tilt = h.params.vt_tilt_fw + 1e-6;
        while h.airframe.common.time_since_trans_start < h.params.vt_bt_tilt_dur {
            h.tick(TICK_US);
            let tilt = h.airframe.tilt_control();
            assert!(tilt <= prev_tilt + 1e-6, "tilt must ramp toward hover");
            prev_tilt = tilt;
        }
        assert!((h.airframe.tilt_control() - h.params.vt_tilt_mc).abs() < 0.05);
    }

    #[test]
    fn test_extras_gate_rear_motors() {
        let mut h = Harness::new();
        h.tick(TICK_US);
        assert!(h.outputs.tiltrotor_extras.rear_motors_enabled);

        h.inputs.airspeed.calibrated_airspeed_m_s = 12.0;
        h.fw_requested = true;
        h.immediate = true;
        h.tick(TICK_US);
        h.tick(TICK_US);
        h.tick(TICK_US);
        assert_eq!(h.mode(), VtolMode::FixedWing);
        assert!(!h.outputs.tiltrotor_extras.rear_motors_enabled);

        // back transition re-enables them right away
        h.fw_requested = false;
        h.tick(TICK_US);
        assert!(h.outputs.tiltrotor_extras.rear_motors_enabled);
    }

    #[test]
    fn test_abort_front_transition_tilts_back() {
        let mut h = Harness::new();
        h.inputs.airspeed.calibrated_airspeed_m_s = 3.0;
        h.fw_requested = true;
        for _ in 0..100 {
            h.tick(TICK_US);
        }
        assert!(h.airframe.tilt_control() > h.params.vt_tilt_mc);

        h.fw_requested = false;
        h.tick(TICK_US);
        assert_eq!(h.mode(), VtolMode::RotaryWing);
        assert!((h.airframe.tilt_control() - h.params.vt_tilt_mc).abs() < 1e-6);
        assert_eq!(h.airframe.common.mc_roll_weight, 1.0);
    }

    #[test]
    fn test_tilt_ordering_clamped_on_parameter_update() {
        let mut h = Harness::new();
        h.params.vt_tilt_trans = 1.5;
        h.airframe.parameters_update(&mut h.params);
        assert!(h.params.vt_tilt_trans <= h.params.vt_tilt_fw);

        h.params.vt_tilt_trans = -0.2;
        h.airframe.parameters_update(&mut h.params);
        assert!(h.params.vt_tilt_trans >= h.params.vt_tilt_mc);
    }
}
