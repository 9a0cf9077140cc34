//! Standard VTOL airframe: independent lift rotors plus a forward pusher.
//!
//! A front transition spools the pusher up while the vehicle gains airspeed;
//! rotor authority fades over an airspeed band (or over time without a
//! usable airspeed). In back transition the pusher stops immediately and
//! rotor authority ramps back in.

use nalgebra::UnitQuaternion;

#[cfg(not(feature = "std"))]
use num_traits::Float;

use super::common::TransitionCommon;
use super::{StepContext, VtolMode};
use crate::params::VtolParams;

const EPSILON: f32 = 1e-6;

/// Pusher ramp integration step cap (s).
const PUSHER_RAMP_DT_MAX_S: f32 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlightPhase {
    Mc,
    TransitionToFw,
    TransitionToMc,
    Fw,
}

#[derive(Debug)]
pub struct Standard {
    pub common: TransitionCommon,
    phase: FlightPhase,
    pusher_throttle: f32,
    airspeed_trans_blend_margin: f32,
    last_pusher_update_ts: u64,
}

impl Default for Standard {
    fn default() -> Self {
        Self::new()
    }
}

impl Standard {
    pub fn new() -> Self {
        Self {
            common: TransitionCommon::new(),
            phase: FlightPhase::Mc,
            pusher_throttle: 0.0,
            airspeed_trans_blend_margin: 0.0,
            last_pusher_update_ts: 0,
        }
    }

    pub fn pusher_throttle(&self) -> f32 {
        self.pusher_throttle
    }

    pub fn parameters_update(&mut self, params: &mut VtolParams) {
        params.sanitize();

        // the authority ramp cannot outlast the back transition itself
        params.vt_b_trans_ramp = params.vt_b_trans_ramp.min(params.vt_b_trans_dur);
    }

    pub fn update_vtol_state(&mut self, ctx: &mut StepContext<'_>) {
        // After switching to FW the pusher spools up and the vehicle picks up
        // forward speed; once fast enough the rotors shut down. In back
        // transition the pusher stops immediately and the rotors reactivate.

        let mut mc_weight = self.common.mc_roll_weight;

        if ctx.fixed_wing_system_failure {
            // failsafe: engage mc motors immediately
            self.phase = FlightPhase::Mc;
            self.pusher_throttle = 0.0;
        } else if !ctx.fixed_wing_requested {
            match self.phase {
                FlightPhase::Mc => {
                    mc_weight = 1.0;
                }
                FlightPhase::Fw => {
                    self.common.reset_transition_states(ctx.now, ctx.inputs);
                    self.phase = FlightPhase::TransitionToMc;
                }
                FlightPhase::TransitionToFw => {
                    // abort back to mc mode
                    self.phase = FlightPhase::Mc;
                    mc_weight = 1.0;
                    self.pusher_throttle = 0.0;
                }
                FlightPhase::TransitionToMc => {
                    // speed exit condition: ground-relative if valid,
                    // airspeed otherwise
                    let exit_speed = match self.common.body_forward_velocity(ctx.inputs) {
                        Some(vel_forward) => vel_forward < ctx.params.mpc_xy_cruise,
                        None => {
                            let airspeed = ctx.inputs.airspeed.calibrated_airspeed_m_s;
                            airspeed.is_finite() && airspeed < ctx.params.mpc_xy_cruise
                        }
                    };

                    let exit_time =
                        self.common.time_since_trans_start > ctx.params.vt_b_trans_dur;

                    if self.common.can_transition_on_ground(ctx.inputs)
                        || exit_speed
                        || exit_time
                    {
                        self.phase = FlightPhase::Mc;
                    }
                }
            }
        } else {
            match self.phase {
                FlightPhase::Mc | FlightPhase::TransitionToMc => {
                    // start the front transition; there is no failsafe path
                    // into FW as that can leave the vehicle unsafe
                    self.common.reset_transition_states(ctx.now, ctx.inputs);
                    self.phase = FlightPhase::TransitionToFw;
                }
                FlightPhase::Fw => {
                    mc_weight = 0.0;
                }
                FlightPhase::TransitionToFw => {
                    if self.common.front_transition_completed_base(
                        ctx.inputs,
                        ctx.params,
                        ctx.immediate_transition,
                    ) {
                        self.phase = FlightPhase::Fw;

                        // pusher throttle stays where the ramp left it
                        self.common.trans_finished_ts = ctx.now;
                    }
                }
            }
        }

        self.common.set_weights(mc_weight);
        self.common.common_mode = match self.phase {
            FlightPhase::Mc => VtolMode::RotaryWing,
            FlightPhase::Fw => VtolMode::FixedWing,
            FlightPhase::TransitionToFw => VtolMode::TransitionToFw,
            FlightPhase::TransitionToMc => VtolMode::TransitionToMc,
        };
    }

    pub fn update_transition_state(&mut self, ctx: &mut StepContext<'_>) {
        let now = ctx.now;
        let mut mc_weight = 1.0;

        let fw_sp = &ctx.inputs.attitude_sp_virtual_fw;
        let mc_sp = &ctx.inputs.attitude_sp_virtual_mc;

        // With climb-rate control the attitude setpoint comes from the
        // multirotor flight task; otherwise the fixed-wing controller
        // publishes it from stick input. A stale source keeps the previous
        // setpoint active.
        let roll_body;
        let mut pitch_body;
        let yaw_body;

        if ctx.inputs.control_mode.flag_control_climb_rate_enabled {
            if self.common.setpoint_stale(mc_sp.timestamp, now)
                || self.common.setpoint_stale(fw_sp.timestamp, now)
            {
                return;
            }

            ctx.outputs.attitude_sp = *mc_sp;
            let (_, pitch, yaw) = mc_sp.q_d.euler_angles();
            roll_body = fw_sp.q_d.euler_angles().0;
            pitch_body = pitch;
            yaw_body = yaw;
        } else {
            if self.common.setpoint_stale(fw_sp.timestamp, now) {
                return;
            }

            ctx.outputs.attitude_sp = *fw_sp;
            ctx.outputs.attitude_sp.thrust_body.z = -fw_sp.thrust_body.x;
            let (roll, pitch, yaw) = fw_sp.q_d.euler_angles();
            roll_body = roll;
            pitch_body = pitch;
            yaw_body = yaw;
        }

        match self.phase {
            FlightPhase::TransitionToFw => {
                if ctx.params.vt_psher_slew <= EPSILON {
                    // just set the final target throttle value
                    self.pusher_throttle = ctx.params.vt_f_trans_thr;
                } else if self.pusher_throttle <= ctx.params.vt_f_trans_thr {
                    // ramp up throttle to the target throttle value
                    let dt = (now.saturating_sub(self.last_pusher_update_ts) as f32 * 1e-6)
                        .min(PUSHER_RAMP_DT_MAX_S);
                    self.pusher_throttle = (self.pusher_throttle
                        + ctx.params.vt_psher_slew * dt)
                        .min(ctx.params.vt_f_trans_thr);
                    self.last_pusher_update_ts = now;
                }

                self.airspeed_trans_blend_margin =
                    self.common.transition_airspeed(ctx.params) - self.common.blend_airspeed(ctx.params);

                let airspeed = ctx.inputs.airspeed.calibrated_airspeed_m_s;

                // blend mc and fw controls once inside the blend band and the
                // minimum transition time has passed
                if self.airspeed_trans_blend_margin > 0.0
                    && airspeed.is_finite()
                    && airspeed > 0.0
                    && airspeed >= self.common.blend_airspeed(ctx.params)
                    && self.common.time_since_trans_start
                        > self.common.minimum_front_transition_time(ctx.inputs, ctx.params)
                {
                    mc_weight = 1.0
                        - (airspeed - self.common.blend_airspeed(ctx.params)).abs()
                            / self.airspeed_trans_blend_margin;
                } else if !self.common.airspeed_usable(ctx.inputs, ctx.params) {
                    // time based blending when no airspeed sensor is set
                    mc_weight = 1.0
                        - self.common.time_since_trans_start
                            / self.common.minimum_front_transition_time(ctx.inputs, ctx.params);
                    mc_weight = (2.0 * mc_weight).clamp(0.0, 1.0);
                }

                // raise the nose progressively toward the fixed-wing pitch
                // offset as the rotors fade
                pitch_body = ctx.params.fw_psp_off.to_radians() * (1.0 - mc_weight);
                ctx.outputs.attitude_sp.thrust_body.x = self.pusher_throttle;
                ctx.outputs.attitude_sp.q_d =
                    UnitQuaternion::from_euler_angles(roll_body, pitch_body, yaw_body);
            }
            FlightPhase::TransitionToMc => {
                if ctx.inputs.control_mode.flag_control_climb_rate_enabled {
                    // control back transition deceleration using pitch
                    pitch_body = self
                        .common
                        .update_and_get_backtransition_pitch_sp(ctx.inputs, ctx.params);
                }

                ctx.outputs.attitude_sp.q_d =
                    UnitQuaternion::from_euler_angles(roll_body, pitch_body, yaw_body);

                self.pusher_throttle = 0.0;

                // continually increase mc attitude control on the way back
                if ctx.params.vt_b_trans_ramp > EPSILON {
                    mc_weight = self.common.time_since_trans_start / ctx.params.vt_b_trans_ramp;
                }
            }
            _ => {}
        }

        self.common.set_weights(mc_weight);
    }

    pub fn update_mc_state(&mut self, ctx: &mut StepContext<'_>) {
        self.common.update_mc_state_base(ctx.inputs, ctx.outputs);

        self.pusher_throttle =
            self.common
                .pusher_assist(ctx.inputs, ctx.params, &mut ctx.outputs.attitude_sp);
    }

    pub fn update_fw_state(&mut self, ctx: &mut StepContext<'_>) {
        self.common.update_fw_state_base(ctx.inputs, ctx.outputs);

        match self.common.post_transition_throttle_action(ctx.inputs, ctx.now) {
            super::ThrottleBlendAction::WaitingOnTecs => self.waiting_on_tecs(ctx),
            super::ThrottleBlendAction::Blend(scale) => {
                self.blend_throttle_after_front_transition(ctx, scale)
            }
            super::ThrottleBlendAction::Settled => {}
        }
    }

    /// Keep thrust from the transition until the energy controller runs.
    pub fn waiting_on_tecs(&mut self, ctx: &mut StepContext<'_>) {
        ctx.outputs.attitude_sp.thrust_body.x = self.pusher_throttle;
    }

    pub fn blend_throttle_after_front_transition(&mut self, ctx: &mut StepContext<'_>, scale: f32) {
        let tecs_throttle = ctx.outputs.attitude_sp.thrust_body.x;
        ctx.outputs.attitude_sp.thrust_body.x =
            scale * tecs_throttle + (1.0 - scale) * self.pusher_throttle;
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
                // rotors
                outputs.torque_setpoint[0].xyz = *torque_mc;
                outputs.thrust_setpoint[0].xyz.z = thrust_mc.z;

                // control-surface trim in hover, unless the elevons are
                // locked
                if !ctx.params.vt_elev_mc_lock {
                    outputs.torque_setpoint[1].xyz.x = torque_fw.x;
                    outputs.torque_setpoint[1].xyz.y = torque_fw.y;
                }

                outputs.thrust_setpoint[0].xyz.x = self.pusher_throttle;
            }
            FlightPhase::TransitionToFw | FlightPhase::TransitionToMc => {
                // rotors, faded by the per-axis weights
                outputs.torque_setpoint[0].xyz.x = torque_mc.x * self.common.mc_roll_weight;
                outputs.torque_setpoint[0].xyz.y = torque_mc.y * self.common.mc_pitch_weight;
                outputs.torque_setpoint[0].xyz.z = torque_mc.z * self.common.mc_yaw_weight;
                outputs.thrust_setpoint[0].xyz.z = thrust_mc.z * self.common.mc_throttle_weight;

                // surfaces at full authority throughout
                outputs.torque_setpoint[1].xyz = *torque_fw;
                outputs.thrust_setpoint[0].xyz.x = self.pusher_throttle;
            }
            FlightPhase::Fw => {
                outputs.torque_setpoint[1].xyz = *torque_fw;
                outputs.thrust_setpoint[0].xyz.x = thrust_fw.x;
            }
        }
    }
}
