//! Tailsitter airframe: the whole vehicle pitches ~90° between regimes.
//!
//! Transitions are attitude rotations, not speed ramps: the desired attitude
//! is a spherical interpolation between the attitude at transition start and
//! the target regime attitude, so the outer loop can track a smooth ramp.
//! Completion is decided on the measured pitch angle.

use core::f32::consts::FRAC_PI_2;

use nalgebra::UnitQuaternion;

#[cfg(not(feature = "std"))]
use num_traits::Float;

use super::common::TransitionCommon;
use super::{StepContext, ThrottleBlendAction, VtolMode};
use crate::coordinator::{InputSnapshot, OutputSetpoints};
use crate::params::VtolParams;

/// Measured pitch below which an automatic front transition completes
/// (rad, ≈ −60°).
pub const FRONT_TRANS_COMPLETE_PITCH: f32 = -1.05;

/// Measured pitch above which a back transition completes (rad, ≈ −15°).
pub const BACK_TRANS_COMPLETE_PITCH: f32 = -0.26;

/// Thrust blending duration between fixed-wing and hover throttle at the
/// start of a back transition (s).
const BACK_TRANS_THRUST_BLEND_DUR_S: f32 = 0.5;

const EPSILON: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlightPhase {
    Mc,
    TransitionFrontP1,
    TransitionBack,
    Fw,
}

#[derive(Debug)]
pub struct Tailsitter {
    pub common: TransitionCommon,
    phase: FlightPhase,
    /// Set once per transition when the rotation endpoints are captured.
    in_transition_attitude: bool,
    q_trans_start: UnitQuaternion<f32>,
    q_trans_sp: UnitQuaternion<f32>,
    /// Hover throttle magnitude carried into forward flight for TECS
    /// blending.
    thrust_transition: f32,
    fw_throttle_at_back_trans: f32,
}

impl Default for Tailsitter {
    fn default() -> Self {
        Self::new()
    }
}

impl Tailsitter {
    pub fn new() -> Self {
        Self {
            common: TransitionCommon::new(),
            phase: FlightPhase::Mc,
            in_transition_attitude: false,
            q_trans_start: UnitQuaternion::identity(),
            q_trans_sp: UnitQuaternion::identity(),
            thrust_transition: 0.0,
            fw_throttle_at_back_trans: 0.0,
        }
    }

    pub fn parameters_update(&mut self, params: &mut VtolParams) {
        params.sanitize();
    }

    fn measured_pitch(inputs: &InputSnapshot) -> f32 {
        inputs.attitude.q.euler_angles().1
    }

    pub fn update_vtol_state(&mut self, ctx: &mut StepContext<'_>) {
        if ctx.fixed_wing_system_failure {
            // failsafe: the rotors carry the vehicle, pitch back up
            self.phase = FlightPhase::Mc;
            self.in_transition_attitude = false;
        } else if !ctx.fixed_wing_requested {
            match self.phase {
                FlightPhase::Mc => {}
                FlightPhase::Fw => {
                    self.common.reset_transition_states(ctx.now, ctx.inputs);
                    self.fw_throttle_at_back_trans =
                        ctx.inputs.attitude_sp_virtual_fw.thrust_body.x;
                    self.phase = FlightPhase::TransitionBack;
                    self.in_transition_attitude = false;
                }
                FlightPhase::TransitionFrontP1 => {
                    // abort: pitch straight back up
                    self.phase = FlightPhase::Mc;
                    self.in_transition_attitude = false;
                }
                FlightPhase::TransitionBack => {
                    let pitch = Self::measured_pitch(ctx.inputs);

                    if self.common.can_transition_on_ground(ctx.inputs)
                        || pitch >= BACK_TRANS_COMPLETE_PITCH
                        || self.common.time_since_trans_start > ctx.params.vt_b_trans_dur
                    {
                        self.phase = FlightPhase::Mc;
                        self.in_transition_attitude = false;
                    }
                }
            }
        } else {
            match self.phase {
                FlightPhase::Mc | FlightPhase::TransitionBack => {
                    self.common.reset_transition_states(ctx.now, ctx.inputs);
                    self.phase = FlightPhase::TransitionFrontP1;
                    self.in_transition_attitude = false;
                }
                FlightPhase::Fw => {}
                FlightPhase::TransitionFrontP1 => {
                    let pitch = Self::measured_pitch(ctx.inputs);

                    let mut completed = pitch <= FRONT_TRANS_COMPLETE_PITCH
                        && self.common.time_since_trans_start
                            > self.common.minimum_front_transition_time(ctx.inputs, ctx.params);

                    completed |= self.common.can_transition_on_ground(ctx.inputs);

                    if *ctx.immediate_transition {
                        completed = true;
                        *ctx.immediate_transition = false;
                    }

                    if completed {
                        self.phase = FlightPhase::Fw;
                        self.common.trans_finished_ts = ctx.now;
                        self.in_transition_attitude = false;
                    }
                }
            }
        }

        match self.phase {
            FlightPhase::Mc => self.common.set_weights(1.0),
            FlightPhase::Fw => self.common.set_weights(0.0),
            // transition weights follow the rotation progress
            _ => {}
        }

        self.common.common_mode = match self.phase {
            FlightPhase::Mc => VtolMode::RotaryWing,
            FlightPhase::Fw => VtolMode::FixedWing,
            FlightPhase::TransitionFrontP1 => VtolMode::TransitionToFw,
            FlightPhase::TransitionBack => VtolMode::TransitionToMc,
        };
    }

    pub fn update_transition_state(&mut self, ctx: &mut StepContext<'_>) {
        if !self.in_transition_attitude {
            self.in_transition_attitude = true;
            self.q_trans_start = ctx.inputs.attitude.q;

            let (_, _, yaw) = ctx.inputs.attitude.q.euler_angles();
            self.q_trans_sp = match self.phase {
                // forward flight: nose down ~90°, keeping the current heading
                FlightPhase::TransitionFrontP1 => UnitQuaternion::from_euler_angles(
                    0.0,
                    -FRAC_PI_2 + ctx.params.fw_psp_off.to_radians(),
                    yaw,
                ),
                // hover: rotor axis back to vertical
                FlightPhase::TransitionBack => UnitQuaternion::from_euler_angles(0.0, 0.0, yaw),
                _ => self.q_trans_start,
            };
        }

        let mc_sp = &ctx.inputs.attitude_sp_virtual_mc;
        if self.common.setpoint_stale(mc_sp.timestamp, ctx.now) {
            return;
        }

        let mut mc_weight = 1.0;

        match self.phase {
            FlightPhase::TransitionFrontP1 => {
                let duration = self
                    .common
                    .open_loop_front_trans_dur(ctx.inputs, ctx.params)
                    .max(EPSILON);
                let progress = (self.common.time_since_trans_start / duration).clamp(0.0, 1.0);

                ctx.outputs.attitude_sp.q_d = self.q_trans_start.slerp(&self.q_trans_sp, progress);
                ctx.outputs.attitude_sp.thrust_body.z = mc_sp.thrust_body.z;

                self.thrust_transition = mc_sp.thrust_body.z.abs();
                mc_weight = 1.0 - progress;
            }
            FlightPhase::TransitionBack => {
                let duration = ctx.params.vt_b_trans_dur.max(EPSILON);
                let progress = (self.common.time_since_trans_start / duration).clamp(0.0, 1.0);

                ctx.outputs.attitude_sp.q_d = self.q_trans_start.slerp(&self.q_trans_sp, progress);

                // blend from the last fixed-wing throttle into hover thrust
                let blend = (self.common.time_since_trans_start / BACK_TRANS_THRUST_BLEND_DUR_S)
                    .clamp(0.0, 1.0);
                ctx.outputs.attitude_sp.thrust_body.z = blend * mc_sp.thrust_body.z
                    + (1.0 - blend) * -self.fw_throttle_at_back_trans;

                mc_weight = progress;
            }
            _ => {}
        }

        self.common.set_weights(mc_weight);
    }

    pub fn update_mc_state(&mut self, ctx: &mut StepContext<'_>) {
        self.common.update_mc_state_base(ctx.inputs, ctx.outputs);
    }

    pub fn update_fw_state(&mut self, ctx: &mut StepContext<'_>) {
        self.common.update_fw_state_base(ctx.inputs, ctx.outputs);

        match self.common.post_transition_throttle_action(ctx.inputs, ctx.now) {
            ThrottleBlendAction::WaitingOnTecs => self.waiting_on_tecs(ctx),
            ThrottleBlendAction::Blend(scale) => {
                self.blend_throttle_after_front_transition(ctx, scale)
            }
            ThrottleBlendAction::Settled => {}
        }
    }

    /// Keep the rotors at the hover throttle the transition ended with.
    pub fn waiting_on_tecs(&mut self, ctx: &mut StepContext<'_>) {
        ctx.outputs.attitude_sp.thrust_body.x = self.thrust_transition;
    }

    pub fn blend_throttle_after_front_transition(&mut self, ctx: &mut StepContext<'_>, scale: f32) {
        let tecs_throttle = ctx.outputs.attitude_sp.thrust_body.x;
        ctx.outputs.attitude_sp.thrust_body.x =
            scale * tecs_throttle + (1.0 - scale) * self.thrust_transition;
    }

    pub fn handle_ekf_resets(&mut self, inputs: &InputSnapshot, outputs: &mut OutputSetpoints) {
        if let Some(delta_q) = self.common.handle_ekf_resets(inputs, outputs) {
            // keep the rotation endpoints consistent with the new heading
            self.q_trans_start = delta_q * self.q_trans_start;
            self.q_trans_sp = delta_q * self.q_trans_sp;
        }
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
            FlightPhase::Fw => {
                // the motors only provide thrust, along the (now horizontal)
                // rotor axis
                outputs.torque_setpoint[1].xyz = *torque_fw;
                outputs.thrust_setpoint[0].xyz.z = -thrust_fw.x;
            }
            _ => {
                // rotor torque faded by the per-axis weights; thrust keeps
                // carrying the vehicle throughout
                outputs.torque_setpoint[0].xyz.x = torque_mc.x * self.common.mc_roll_weight;
                outputs.torque_setpoint[0].xyz.y = torque_mc.y * self.common.mc_pitch_weight;
                outputs.torque_setpoint[0].xyz.z = torque_mc.z * self.common.mc_yaw_weight;
                outputs.thrust_setpoint[0].xyz.z = thrust_mc.z;

                // surfaces give passive damping during rotations
                let surfaces_locked =
                    self.phase == FlightPhase::Mc && ctx.params.vt_elev_mc_lock;
                if !surfaces_locked {
                    outputs.torque_setpoint[1].xyz.x = torque_fw.x;
                    outputs.torque_setpoint[1].xyz.y = torque_fw.y;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::{InputSnapshot, OutputSetpoints};

    struct Harness {
        airframe: Tailsitter,
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
            inputs.attitude_sp_virtual_mc.thrust_body.z = -0.6;

            Self {
                airframe: Tailsitter::new(),
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
        }

        fn mode(&self) -> VtolMode {
            self.airframe.common.common_mode
        }

        fn set_pitch(&mut self, pitch: f32) {
            self.inputs.attitude.q = UnitQuaternion::from_euler_angles(0.0, pitch, 0.0);
        }
    }

    const TICK_US: u64 = 4_000;

    #[test]
    fn test_front_transition_interpolates_attitude() {
        let mut h = Harness::new();
        h.fw_requested = true;
        h.tick(TICK_US);
        assert_eq!(h.mode(), VtolMode::TransitionToFw);

        // the attitude setpoint pitches down progressively
        let mut prev_pitch = f32::MAX;
        for _ in 0..200 {
            h.tick(TICK_US);
            let (_, pitch, _) = h.outputs.attitude_sp.q_d.euler_angles();
            assert!(pitch <= prev_pitch + 1e-5, "setpoint pitch must not rise");
            prev_pitch = pitch;
        }
        // after 0.8 s of a 5 s rotation the nose is measurably down
        assert!(prev_pitch < -0.1);
    }

    #[test]
    fn test_front_transition_completes_on_measured_pitch() {
        let mut h = Harness::new();
        h.fw_requested = true;
        h.tick(TICK_US);

        // nose down but the minimum time has not elapsed
        h.set_pitch(-1.2);
        h.tick(TICK_US);
        assert_eq!(h.mode(), VtolMode::TransitionToFw);

        // wait out the minimum time with the nose still up: no completion
        h.set_pitch(-0.5);
        while h.airframe.common.time_since_trans_start < h.params.vt_trans_min_tm + 0.1 {
            h.tick(TICK_US);
        }
        assert_eq!(h.mode(), VtolMode::TransitionToFw);

        // pitch past the threshold: done
        h.set_pitch(-1.2);
        h.tick(TICK_US);
        assert_eq!(h.mode(), VtolMode::FixedWing);
        assert!(h.airframe.common.trans_finished_ts > 0);
        assert_eq!(h.airframe.common.mc_roll_weight, 0.0);
    }

    #[test]
    fn test_back_transition_completes_on_pitch_or_time() {
        let mut h = Harness::new();
        h.fw_requested = true;
        h.immediate = true;
        h.set_pitch(-1.3);
        h.tick(TICK_US);
        h.tick(TICK_US);
        assert_eq!(h.mode(), VtolMode::FixedWing);

        h.fw_requested = false;
        h.tick(TICK_US);
        assert_eq!(h.mode(), VtolMode::TransitionToMc);

        // still nose down: not complete
        h.tick(TICK_US);
        assert_eq!(h.mode(), VtolMode::TransitionToMc);

        // nose back up past −15°
        h.set_pitch(-0.1);
        h.tick(TICK_US);
        assert_eq!(h.mode(), VtolMode::RotaryWing);
        assert_eq!(h.airframe.common.mc_roll_weight, 1.0);
    }

    #[test]
    fn test_back_transition_blends_throttle() {
        let mut h = Harness::new();
        h.inputs.attitude_sp_virtual_fw.thrust_body.x = 0.8;
        h.fw_requested = true;
        h.immediate = true;
        h.set_pitch(-1.3);
        h.tick(TICK_US);
        h.tick(TICK_US);
        assert_eq!(h.mode(), VtolMode::FixedWing);

        h.fw_requested = false;
        h.tick(TICK_US); // enters back transition
        h.tick(TICK_US);

        // right after entry the thrust still reflects the fixed-wing
        // throttle (sign flipped onto the hover axis)
        let early = h.outputs.attitude_sp.thrust_body.z;
        assert!(early < -0.7, "early = {early}");

        // after the blending window it is the hover demand
        while h.airframe.common.time_since_trans_start < 0.6 {
            h.tick(TICK_US);
        }
        let late = h.outputs.attitude_sp.thrust_body.z;
        assert!((late - -0.6).abs() < 1e-3, "late = {late}");
    }

    #[test]
    fn test_transition_weights_follow_rotation_progress() {
        let mut h = Harness::new();
        h.fw_requested = true;
        h.tick(TICK_US);

        let mut prev = 1.0;
        for _ in 0..300 {
            h.tick(TICK_US);
            let w = h.airframe.common.mc_roll_weight;
            assert!(w <= prev + 1e-6);
            assert!((0.0..=1.0).contains(&w));
            prev = w;
        }
        assert!(prev < 1.0);
    }

    #[test]
    fn test_heading_reset_rotates_transition_endpoints() {
        let mut h = Harness::new();
        h.fw_requested = true;
        h.tick(TICK_US);
        h.tick(TICK_US);

        let (_, _, yaw_before) = h.airframe.q_trans_sp.euler_angles();

        h.inputs.attitude.quat_reset_counter = 1;
        h.inputs.attitude.delta_q_reset = UnitQuaternion::from_euler_angles(0.0, 0.0, 0.3);
        h.airframe.handle_ekf_resets(&h.inputs, &mut h.outputs);

        let (_, _, yaw_after) = h.airframe.q_trans_sp.euler_angles();
        assert!(((yaw_after - yaw_before) - 0.3).abs() < 1e-3);
    }

    #[test]
    fn test_fw_mixing_redirects_thrust() {
        let mut h = Harness::new();
        h.inputs.thrust_virtual_fw.xyz.x = 0.5;
        h.inputs.torque_virtual_fw.xyz = nalgebra::Vector3::new(0.1, 0.2, 0.3);
        h.fw_requested = true;
        h.immediate = true;
        h.set_pitch(-1.3);
        h.tick(TICK_US);
        h.tick(TICK_US);
        assert_eq!(h.mode(), VtolMode::FixedWing);

        let mut ctx = StepContext {
            now: h.now,
            inputs: &h.inputs,
            params: &h.params,
            outputs: &mut h.outputs,
            fixed_wing_requested: true,
            immediate_transition: &mut h.immediate,
            fixed_wing_system_failure: false,
        };
        h.airframe.fill_actuator_outputs(&mut ctx);

        // forward demand rides on the rotor axis
        assert_eq!(h.outputs.thrust_setpoint[0].xyz.z, -0.5);
        assert_eq!(h.outputs.torque_setpoint[1].xyz, h.inputs.torque_virtual_fw.xyz);
        assert_eq!(h.outputs.torque_setpoint[0].xyz.norm(), 0.0);
    }
}
