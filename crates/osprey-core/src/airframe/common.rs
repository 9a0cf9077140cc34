//! State and predicates shared by every airframe family.

use nalgebra::{UnitQuaternion, Vector3};

#[cfg(not(feature = "std"))]
use num_traits::Float;

use super::VtolMode;
use crate::coordinator::{InputSnapshot, OutputSetpoints};
use crate::msgs::{QuadchuteReason, VehicleAttitudeSetpoint};
use crate::params::VtolParams;

/// Integration step cap; protects ramps and integrators after a scheduling
/// stall.
pub const DT_MAX_S: f32 = 0.05;

/// Virtual attitude setpoints older than this do not advance the attitude
/// output.
pub const STALE_SETPOINT_AGE_US: u64 = 1_000_000;

/// Window after a completed front transition during which the transition
/// throttle is blended into the forward-flight throttle.
pub const FRONT_TRANS_THROTTLE_BLEND_DUR_S: f32 = 1.0;

/// Sea-level air density, kg/m³.
pub const SEA_LEVEL_AIR_DENSITY: f32 = 1.225;

/// Descent faster than this (m/s) counts toward the uncommanded-descent
/// failsafe.
const UNCOMMANDED_DESCENT_RATE: f32 = 1.0;

/// Output limit of the back transition pitch controller (rad, nose up).
const BACKTRANS_PITCH_LIMIT: f32 = 0.3;

const EPSILON: f32 = 1e-6;

/// What to do with the forward throttle right after a front transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThrottleBlendAction {
    /// The forward-flight energy controller has not run yet; hold the
    /// transition throttle.
    WaitingOnTecs,
    /// Convex blend between transition throttle and energy-controller
    /// throttle; the scale ramps 0 → 1 over the blend window.
    Blend(f32),
    /// The blend window has passed.
    Settled,
}

// ---------------------------------------------------------------------------
// Shared transition state
// ---------------------------------------------------------------------------

/// Shared per-airframe state: blending weights, transition clocks and the
/// failsafe bookkeeping. Embedded by value in each airframe.
#[derive(Debug)]
pub struct TransitionCommon {
    /// Observable flight regime; updated atomically with the airframe's
    /// internal phase.
    pub common_mode: VtolMode,

    /// Multirotor authority per axis, each in [0, 1].
    pub mc_roll_weight: f32,
    pub mc_pitch_weight: f32,
    pub mc_yaw_weight: f32,
    pub mc_throttle_weight: f32,

    /// Set when entering any transition phase (µs).
    pub trans_start_ts: u64,
    /// Set when a front transition completes (µs); gates post-transition
    /// throttle blending.
    pub trans_finished_ts: u64,
    /// Seconds since `trans_start_ts`.
    pub time_since_trans_start: f32,
    /// Clamped integration step for this tick (s).
    pub dt: f32,

    last_loop_ts: u64,
    alt_at_trans_start: f32,
    height_rate_error_integral: f32,
    accel_to_pitch_integ: f32,
    quat_reset_counter: u8,
}

impl Default for TransitionCommon {
    fn default() -> Self {
        Self::new()
    }
}

impl TransitionCommon {
    pub fn new() -> Self {
        Self {
            common_mode: VtolMode::RotaryWing,
            mc_roll_weight: 1.0,
            mc_pitch_weight: 1.0,
            mc_yaw_weight: 1.0,
            mc_throttle_weight: 1.0,
            trans_start_ts: 0,
            trans_finished_ts: 0,
            time_since_trans_start: 0.0,
            dt: 0.004,
            last_loop_ts: 0,
            alt_at_trans_start: 0.0,
            height_rate_error_integral: 0.0,
            accel_to_pitch_integ: 0.0,
            quat_reset_counter: 0,
        }
    }

    pub fn set_weights(&mut self, weight: f32) {
        let weight = weight.clamp(0.0, 1.0);
        self.mc_roll_weight = weight;
        self.mc_pitch_weight = weight;
        self.mc_yaw_weight = weight;
        self.mc_throttle_weight = weight;
    }

    /// Once per tick: update `dt` (capped at [`DT_MAX_S`]) and the transition
    /// clock.
    pub fn advance_timers(&mut self, now: u64) {
        if self.last_loop_ts != 0 {
            let elapsed = now.saturating_sub(self.last_loop_ts) as f32 * 1e-6;
            self.dt = elapsed.clamp(1e-4, DT_MAX_S);
        }
        self.last_loop_ts = now;
        self.time_since_trans_start = now.saturating_sub(self.trans_start_ts) as f32 * 1e-6;
    }

    /// Arm the transition clock and clear per-transition accumulators. Called
    /// when entering any transition phase.
    pub fn reset_transition_states(&mut self, now: u64, inputs: &InputSnapshot) {
        self.trans_start_ts = now;
        self.time_since_trans_start = 0.0;
        self.alt_at_trans_start = -inputs.local_position.z;
        self.height_rate_error_integral = 0.0;
        self.accel_to_pitch_integ = 0.0;
    }

    // -----------------------------------------------------------------------
    // Predicates
    // -----------------------------------------------------------------------

    /// Transitions complete immediately while disarmed or on the ground.
    pub fn can_transition_on_ground(&self, inputs: &InputSnapshot) -> bool {
        !inputs.control_mode.flag_armed || inputs.land_detected.landed
    }

    pub fn airspeed_usable(&self, inputs: &InputSnapshot, params: &VtolParams) -> bool {
        params.fw_use_airspd && inputs.airspeed.calibrated_airspeed_m_s.is_finite()
    }

    /// Open-loop transition times stretch in thin air.
    pub fn front_transition_time_factor(&self, inputs: &InputSnapshot) -> f32 {
        let rho = inputs.air_density;
        if rho.is_finite() && rho > EPSILON {
            (SEA_LEVEL_AIR_DENSITY / rho).sqrt().clamp(1.0, 2.0)
        } else {
            1.0
        }
    }

    pub fn minimum_front_transition_time(&self, inputs: &InputSnapshot, params: &VtolParams) -> f32 {
        params.vt_trans_min_tm * self.front_transition_time_factor(inputs)
    }

    pub fn open_loop_front_trans_dur(&self, inputs: &InputSnapshot, params: &VtolParams) -> f32 {
        params.vt_f_trans_dur * self.front_transition_time_factor(inputs)
    }

    pub fn blend_airspeed(&self, params: &VtolParams) -> f32 {
        params.vt_arsp_blend
    }

    pub fn transition_airspeed(&self, params: &VtolParams) -> f32 {
        params.vt_arsp_trans
    }

    /// Completion predicate shared by the speed-building airframes: airspeed
    /// above the transition airspeed once the minimum time has elapsed, the
    /// open-loop duration without a usable airspeed, or immediately when on
    /// ground / commanded immediate.
    pub fn front_transition_completed_base(
        &self,
        inputs: &InputSnapshot,
        params: &VtolParams,
        immediate_transition: &mut bool,
    ) -> bool {
        let mut completed = false;

        if self.time_since_trans_start > self.minimum_front_transition_time(inputs, params) {
            if self.airspeed_usable(inputs, params) {
                completed =
                    inputs.airspeed.calibrated_airspeed_m_s >= self.transition_airspeed(params);
            } else {
                completed =
                    self.time_since_trans_start > self.open_loop_front_trans_dur(inputs, params);
            }
        }

        completed |= self.can_transition_on_ground(inputs);

        if *immediate_transition {
            completed = true;
            *immediate_transition = false;
        }

        completed
    }

    /// Ground-track forward speed, when the estimator vouches for the
    /// horizontal velocity.
    pub fn body_forward_velocity(&self, inputs: &InputSnapshot) -> Option<f32> {
        if !inputs.local_position.v_xy_valid {
            return None;
        }

        let vel = Vector3::new(
            inputs.local_position.vx,
            inputs.local_position.vy,
            inputs.local_position.vz,
        );
        Some(inputs.attitude.q.inverse_transform_vector(&vel).x)
    }

    fn altitude_above_home(&self, inputs: &InputSnapshot) -> f32 {
        match inputs.home_position_z {
            Some(home_z) => -(inputs.local_position.z - home_z),
            None => -inputs.local_position.z,
        }
    }

    // -----------------------------------------------------------------------
    // Quadchute
    // -----------------------------------------------------------------------

    /// Failsafe predicate set; returns the first firing cause. Checks only
    /// run while armed and airborne.
    pub fn transition_safety_check(
        &mut self,
        inputs: &InputSnapshot,
        params: &VtolParams,
        front_transition: bool,
    ) -> Option<QuadchuteReason> {
        if !inputs.control_mode.flag_armed || inputs.land_detected.landed {
            self.height_rate_error_integral = 0.0;
            return None;
        }

        if front_transition
            && params.vt_trans_timeout > EPSILON
            && self.time_since_trans_start
                > params.vt_trans_timeout * self.front_transition_time_factor(inputs)
        {
            return Some(QuadchuteReason::TransitionTimeout);
        }

        if params.vt_fw_min_alt > EPSILON
            && inputs.local_position.z_valid
            && self.altitude_above_home(inputs) < params.vt_fw_min_alt
        {
            return Some(QuadchuteReason::MinimumAltBreached);
        }

        if let Some(reason) = self.uncommanded_descent_check(inputs, params) {
            return Some(reason);
        }

        if front_transition && params.vt_qc_t_alt_loss > EPSILON {
            let lost = self.alt_at_trans_start - (-inputs.local_position.z);
            if lost > params.vt_qc_t_alt_loss {
                return Some(QuadchuteReason::TransitionAltitudeLoss);
            }
        }

        // attitude envelope on the multirotor attitude setpoint
        let (roll, pitch, _) = inputs.attitude_sp_virtual_mc.q_d.euler_angles();

        if params.vt_fw_qc_p > 0 && pitch.abs() > (params.vt_fw_qc_p as f32).to_radians() {
            return Some(QuadchuteReason::MaximumPitchExceeded);
        }

        if params.vt_fw_qc_r > 0 && roll.abs() > (params.vt_fw_qc_r as f32).to_radians() {
            return Some(QuadchuteReason::MaximumRollExceeded);
        }

        None
    }

    fn uncommanded_descent_check(
        &mut self,
        inputs: &InputSnapshot,
        params: &VtolParams,
    ) -> Option<QuadchuteReason> {
        if params.vt_qc_hr_error_i < EPSILON
            || !inputs.control_mode.flag_control_climb_rate_enabled
        {
            return None;
        }

        // commanded descent is not a failure (NED: positive vz commands down)
        let descent_commanded = inputs.local_position_setpoint.vz > 0.5;

        let height_rate_error = inputs.tecs_status.height_rate_setpoint - inputs.tecs_status.height_rate;

        if !descent_commanded
            && inputs.tecs_status.height_rate < -UNCOMMANDED_DESCENT_RATE
            && height_rate_error > 0.0
        {
            self.height_rate_error_integral += height_rate_error * self.dt;
        } else {
            self.height_rate_error_integral =
                (self.height_rate_error_integral - self.dt).max(0.0);
        }

        (self.height_rate_error_integral > params.vt_qc_hr_error_i)
            .then_some(QuadchuteReason::UncommandedDescent)
    }

    // -----------------------------------------------------------------------
    // Hover helpers
    // -----------------------------------------------------------------------

    /// Copy the multirotor virtual attitude setpoint through and restore full
    /// multirotor authority.
    pub fn update_mc_state_base(&mut self, inputs: &InputSnapshot, outputs: &mut OutputSetpoints) {
        outputs.attitude_sp = inputs.attitude_sp_virtual_mc;
        self.set_weights(1.0);
    }

    /// Copy the fixed-wing virtual attitude setpoint through and drop
    /// multirotor authority.
    pub fn update_fw_state_base(&mut self, inputs: &InputSnapshot, outputs: &mut OutputSetpoints) {
        outputs.attitude_sp = inputs.attitude_sp_virtual_fw;
        self.set_weights(0.0);
    }

    /// Trade a nose-down pitch demand for forward thrust so the vehicle can
    /// hold position against headwind without tilting. Returns the forward
    /// thrust and re-levels the pitch setpoint.
    pub fn pusher_assist(
        &self,
        inputs: &InputSnapshot,
        params: &VtolParams,
        attitude_sp: &mut VehicleAttitudeSetpoint,
    ) -> f32 {
        if !params.vt_fwd_thrust_en
            || !inputs.control_mode.flag_armed
            || !inputs.control_mode.flag_control_climb_rate_enabled
            || inputs.land_detected.landed
        {
            return 0.0;
        }

        let (roll, pitch, yaw) = attitude_sp.q_d.euler_angles();
        if pitch >= 0.0 {
            return 0.0;
        }

        let forward_thrust = ((-pitch).sin() * params.vt_fwd_thrust_sc).clamp(0.0, 1.0);
        attitude_sp.q_d = UnitQuaternion::from_euler_angles(roll, 0.0, yaw);

        forward_thrust
    }

    /// Pitch setpoint decelerating the vehicle during a back transition:
    /// feed-forward on the deceleration setpoint plus an integrator on the
    /// forward acceleration error, with anti-windup at the output limits.
    pub fn update_and_get_backtransition_pitch_sp(
        &mut self,
        inputs: &InputSnapshot,
        params: &VtolParams,
    ) -> f32 {
        let track = inputs.local_position.vy.atan2(inputs.local_position.vx);
        let accel_body_forward =
            track.cos() * inputs.local_position.ax + track.sin() * inputs.local_position.ay;

        // positive error means decelerating too slowly: pitch up more
        let accel_error_forward = params.vt_b_dec_mss + accel_body_forward;

        let pitch_sp_new = params.vt_b_dec_ff * params.vt_b_dec_mss + self.accel_to_pitch_integ;

        let mut integrator_input = params.vt_b_dec_i * accel_error_forward;

        if (pitch_sp_new >= BACKTRANS_PITCH_LIMIT && accel_error_forward > 0.0)
            || (pitch_sp_new <= 0.0 && accel_error_forward < 0.0)
        {
            integrator_input = 0.0;
        }

        self.accel_to_pitch_integ += integrator_input * self.dt;

        pitch_sp_new.clamp(0.0, BACKTRANS_PITCH_LIMIT)
    }

    // -----------------------------------------------------------------------
    // Forward flight
    // -----------------------------------------------------------------------

    /// Decide how the forward throttle is sourced right after a front
    /// transition, based on whether the energy controller has caught up.
    pub fn post_transition_throttle_action(
        &self,
        inputs: &InputSnapshot,
        now: u64,
    ) -> ThrottleBlendAction {
        if self.trans_finished_ts == 0 {
            return ThrottleBlendAction::Settled;
        }

        if inputs.tecs_status.timestamp < self.trans_finished_ts {
            return ThrottleBlendAction::WaitingOnTecs;
        }

        let since_finish = now.saturating_sub(self.trans_finished_ts) as f32 * 1e-6;
        if since_finish < FRONT_TRANS_THROTTLE_BLEND_DUR_S {
            ThrottleBlendAction::Blend(since_finish / FRONT_TRANS_THROTTLE_BLEND_DUR_S)
        } else {
            ThrottleBlendAction::Settled
        }
    }

    // -----------------------------------------------------------------------
    // Estimator resets
    // -----------------------------------------------------------------------

    /// On a heading reset, rotate the published attitude setpoint by the
    /// reset delta so the downstream controller sees no step. Returns the
    /// delta so airframes can re-express additional stored attitudes.
    pub fn handle_ekf_resets(
        &mut self,
        inputs: &InputSnapshot,
        outputs: &mut OutputSetpoints,
    ) -> Option<UnitQuaternion<f32>> {
        let attitude = &inputs.attitude;

        if attitude.quat_reset_counter == self.quat_reset_counter {
            return None;
        }

        self.quat_reset_counter = attitude.quat_reset_counter;
        outputs.attitude_sp.q_d = attitude.delta_q_reset * outputs.attitude_sp.q_d;

        Some(attitude.delta_q_reset)
    }

    /// A virtual setpoint is stale once it is a second old; the previous
    /// attitude output is then retained.
    pub fn setpoint_stale(&self, setpoint_ts: u64, now: u64) -> bool {
        now.saturating_sub(setpoint_ts) > STALE_SETPOINT_AGE_US
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::InputSnapshot;

    fn airborne_inputs() -> InputSnapshot {
        let mut inputs = InputSnapshot::default();
        inputs.control_mode.flag_armed = true;
        inputs.control_mode.flag_control_climb_rate_enabled = true;
        inputs.land_detected.landed = false;
        inputs.local_position.z_valid = true;
        inputs
    }

    #[test]
    fn test_dt_is_clamped_after_stall() {
        let mut common = TransitionCommon::new();
        common.advance_timers(1_000_000);
        // 400 ms stall
        common.advance_timers(1_400_000);
        assert!((common.dt - DT_MAX_S).abs() < 1e-6);
    }

    #[test]
    fn test_transition_clock_tracks_reset() {
        let mut common = TransitionCommon::new();
        let inputs = airborne_inputs();
        common.reset_transition_states(2_000_000, &inputs);
        common.advance_timers(3_500_000);
        assert!((common.time_since_trans_start - 1.5).abs() < 1e-4);
    }

    #[test]
    fn test_weights_are_clamped() {
        let mut common = TransitionCommon::new();
        common.set_weights(1.7);
        assert_eq!(common.mc_roll_weight, 1.0);
        common.set_weights(-0.3);
        assert_eq!(common.mc_throttle_weight, 0.0);
    }

    #[test]
    fn test_quadchute_timeout_only_in_front_transition() {
        let mut common = TransitionCommon::new();
        let inputs = airborne_inputs();
        common.reset_transition_states(0, &inputs);
        common.time_since_trans_start = 20.0;

        let params = VtolParams::default();
        assert_eq!(
            common.transition_safety_check(&inputs, &params, true),
            Some(QuadchuteReason::TransitionTimeout)
        );
        assert_eq!(common.transition_safety_check(&inputs, &params, false), None);
    }

    #[test]
    fn test_quadchute_minimum_altitude() {
        let mut common = TransitionCommon::new();
        let mut inputs = airborne_inputs();
        inputs.local_position.z = -20.0; // 20 m above origin
        inputs.home_position_z = Some(0.0);

        let mut params = VtolParams::default();
        params.vt_fw_min_alt = 30.0;

        assert_eq!(
            common.transition_safety_check(&inputs, &params, false),
            Some(QuadchuteReason::MinimumAltBreached)
        );

        params.vt_fw_min_alt = 10.0;
        assert_eq!(common.transition_safety_check(&inputs, &params, false), None);
    }

    #[test]
    fn test_quadchute_altitude_loss_during_front_transition() {
        let mut common = TransitionCommon::new();
        let mut inputs = airborne_inputs();
        inputs.local_position.z = -50.0;
        common.reset_transition_states(0, &inputs);

        let mut params = VtolParams::default();
        params.vt_qc_t_alt_loss = 15.0;

        // drop to 30 m: 20 m lost
        inputs.local_position.z = -30.0;
        assert_eq!(
            common.transition_safety_check(&inputs, &params, true),
            Some(QuadchuteReason::TransitionAltitudeLoss)
        );
        // the same loss is fine outside a front transition
        assert_eq!(common.transition_safety_check(&inputs, &params, false), None);
    }

    #[test]
    fn test_quadchute_attitude_envelope_uses_setpoint() {
        let mut common = TransitionCommon::new();
        let mut inputs = airborne_inputs();
        let mut params = VtolParams::default();
        params.vt_fw_qc_p = 30;

        inputs.attitude_sp_virtual_mc.q_d =
            UnitQuaternion::from_euler_angles(0.0, 0.7, 0.0); // ~40° pitch demand
        assert_eq!(
            common.transition_safety_check(&inputs, &params, false),
            Some(QuadchuteReason::MaximumPitchExceeded)
        );

        params.vt_fw_qc_p = 0; // disabled
        assert_eq!(common.transition_safety_check(&inputs, &params, false), None);
    }

    #[test]
    fn test_quadchute_uncommanded_descent_integrates() {
        let mut common = TransitionCommon::new();
        let mut inputs = airborne_inputs();
        inputs.tecs_status.height_rate = -3.0;
        inputs.tecs_status.height_rate_setpoint = 0.0;
        inputs.local_position_setpoint.vz = 0.0;

        let mut params = VtolParams::default();
        params.vt_qc_hr_error_i = 5.0;
        common.dt = 0.5;

        let mut fired = None;
        for _ in 0..10 {
            fired = common.transition_safety_check(&inputs, &params, false);
            if fired.is_some() {
                break;
            }
        }
        assert_eq!(fired, Some(QuadchuteReason::UncommandedDescent));

        // a commanded descent never integrates
        let mut common = TransitionCommon::new();
        common.dt = 0.5;
        inputs.local_position_setpoint.vz = 2.0;
        for _ in 0..10 {
            assert_eq!(common.transition_safety_check(&inputs, &params, false), None);
        }
    }

    #[test]
    fn test_quadchute_suppressed_on_ground() {
        let mut common = TransitionCommon::new();
        let mut inputs = airborne_inputs();
        inputs.land_detected.landed = true;
        common.time_since_trans_start = 100.0;

        let params = VtolParams::default();
        assert_eq!(common.transition_safety_check(&inputs, &params, true), None);
    }

    #[test]
    fn test_front_transition_completion_paths() {
        let mut common = TransitionCommon::new();
        let mut inputs = airborne_inputs();
        let params = VtolParams::default();
        let mut immediate = false;

        // too early
        common.time_since_trans_start = 1.0;
        inputs.airspeed.calibrated_airspeed_m_s = 12.0;
        assert!(!common.front_transition_completed_base(&inputs, &params, &mut immediate));

        // min time passed, airspeed above threshold
        common.time_since_trans_start = 3.0;
        assert!(common.front_transition_completed_base(&inputs, &params, &mut immediate));

        // airspeed below threshold
        inputs.airspeed.calibrated_airspeed_m_s = 9.0;
        assert!(!common.front_transition_completed_base(&inputs, &params, &mut immediate));

        // immediate flag completes and is consumed
        immediate = true;
        assert!(common.front_transition_completed_base(&inputs, &params, &mut immediate));
        assert!(!immediate);
    }

    #[test]
    fn test_open_loop_completion_without_airspeed() {
        let common = TransitionCommon::new();
        let mut inputs = airborne_inputs();
        inputs.airspeed.calibrated_airspeed_m_s = f32::NAN;
        let params = VtolParams::default();
        let mut immediate = false;

        let mut common = common;
        common.time_since_trans_start = 4.0;
        assert!(!common.front_transition_completed_base(&inputs, &params, &mut immediate));

        common.time_since_trans_start = 5.5;
        assert!(common.front_transition_completed_base(&inputs, &params, &mut immediate));
    }

    #[test]
    fn test_throttle_blend_windows() {
        let mut common = TransitionCommon::new();
        let mut inputs = airborne_inputs();

        // no transition finished yet
        assert_eq!(
            common.post_transition_throttle_action(&inputs, 1_000_000),
            ThrottleBlendAction::Settled
        );

        common.trans_finished_ts = 10_000_000;
        inputs.tecs_status.timestamp = 9_000_000;
        assert_eq!(
            common.post_transition_throttle_action(&inputs, 10_100_000),
            ThrottleBlendAction::WaitingOnTecs
        );

        inputs.tecs_status.timestamp = 10_200_000;
        match common.post_transition_throttle_action(&inputs, 10_500_000) {
            ThrottleBlendAction::Blend(scale) => assert!((scale - 0.5).abs() < 1e-3),
            other => panic!("expected blend, got {:?}", other),
        }

        assert_eq!(
            common.post_transition_throttle_action(&inputs, 11_500_000),
            ThrottleBlendAction::Settled
        );
    }

    #[test]
    fn test_heading_reset_rotates_attitude_setpoint() {
        let mut common = TransitionCommon::new();
        let mut inputs = airborne_inputs();
        let mut outputs = OutputSetpoints::default();

        outputs.attitude_sp.q_d = UnitQuaternion::from_euler_angles(0.0, 0.0, 0.5);

        inputs.attitude.quat_reset_counter = 1;
        inputs.attitude.delta_q_reset = UnitQuaternion::from_euler_angles(0.0, 0.0, 0.2);

        assert!(common.handle_ekf_resets(&inputs, &mut outputs).is_some());
        let (_, _, yaw) = outputs.attitude_sp.q_d.euler_angles();
        assert!((yaw - 0.7).abs() < 1e-4);

        // same counter: nothing happens
        assert!(common.handle_ekf_resets(&inputs, &mut outputs).is_none());
    }

    #[test]
    fn test_pusher_assist_trades_pitch_for_thrust() {
        let common = TransitionCommon::new();
        let inputs = airborne_inputs();
        let mut params = VtolParams::default();
        params.vt_fwd_thrust_en = true;

        let mut att_sp = VehicleAttitudeSetpoint::default();
        att_sp.q_d = UnitQuaternion::from_euler_angles(0.0, -0.3, 0.0);

        let thrust = common.pusher_assist(&inputs, &params, &mut att_sp);
        assert!(thrust > 0.0 && thrust <= 1.0);

        // pitch demand was re-leveled
        let (_, pitch, _) = att_sp.q_d.euler_angles();
        assert!(pitch.abs() < 1e-4);

        // nose-up demand gets no assist
        att_sp.q_d = UnitQuaternion::from_euler_angles(0.0, 0.2, 0.0);
        assert_eq!(common.pusher_assist(&inputs, &params, &mut att_sp), 0.0);
    }

    #[test]
    fn test_backtransition_pitch_stays_in_limits() {
        let mut common = TransitionCommon::new();
        let mut inputs = airborne_inputs();
        inputs.local_position.vx = 15.0;
        inputs.local_position.ax = 0.0; // not decelerating at all
        common.dt = 0.02;

        let params = VtolParams::default();
        for _ in 0..2000 {
            let pitch = common.update_and_get_backtransition_pitch_sp(&inputs, &params);
            assert!((0.0..=BACKTRANS_PITCH_LIMIT).contains(&pitch));
        }
    }
}
