//! Typed configuration for the transition coordinator.
//!
//! Parameters mirror the flight stack's storage: a flat bag of scalars that
//! may change at any time. A change is announced through the
//! `parameter_update` topic; the coordinator re-reads the bag and lets the
//! active airframe apply its cross-parameter clamps. No change takes effect
//! before the next tick.

// ---------------------------------------------------------------------------
// Airframe kind
// ---------------------------------------------------------------------------

/// Supported airframe families. Selected once at startup via `VT_TYPE` and
/// immutable for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AirframeKind {
    /// Independent lift rotors plus a separate forward pusher.
    Standard = 0,
    /// The whole vehicle pitches ~90° between regimes.
    Tailsitter = 1,
    /// Rotors physically rotate between vertical and horizontal thrust axes.
    Tiltrotor = 2,
}

impl AirframeKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Standard => "Standard",
            Self::Tailsitter => "Tailsitter",
            Self::Tiltrotor => "Tiltrotor",
        }
    }

    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::Standard),
            1 => Some(Self::Tailsitter),
            2 => Some(Self::Tiltrotor),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Parameter bag
// ---------------------------------------------------------------------------

/// All tunables consumed by the coordinator. Field names follow the stored
/// parameter names.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VtolParams {
    /// Airframe kind; unknown values are a fatal configuration error.
    pub vt_type: i32,

    // front transition
    /// Airspeed at which multirotor/fixed-wing blending starts (m/s).
    pub vt_arsp_blend: f32,
    /// Airspeed at which the front transition may complete (m/s).
    pub vt_arsp_trans: f32,
    /// Minimum duration of a front transition (s).
    pub vt_trans_min_tm: f32,
    /// Open-loop front transition duration when flying without a usable
    /// airspeed measurement (s).
    pub vt_f_trans_dur: f32,
    /// Front transition timeout before the quadchute fires (s), 0 disables.
    pub vt_trans_timeout: f32,
    /// Target pusher throttle during the front transition.
    pub vt_f_trans_thr: f32,
    /// Pusher throttle ramp slew rate (1/s); 0 snaps to the target.
    pub vt_psher_slew: f32,

    // back transition
    /// Maximum back transition duration (s).
    pub vt_b_trans_dur: f32,
    /// Multirotor authority ramp-up duration in back transition (s).
    pub vt_b_trans_ramp: f32,
    /// Back transition deceleration setpoint (m/s²).
    pub vt_b_dec_mss: f32,
    /// Integrator gain of the back transition deceleration controller.
    pub vt_b_dec_i: f32,
    /// Feed-forward gain of the back transition deceleration controller.
    pub vt_b_dec_ff: f32,

    // hover surfaces & pusher assist
    /// Lock elevons to zero while hovering.
    pub vt_elev_mc_lock: bool,
    /// Spoiler deflection while hovering in a landing phase.
    pub vt_spoiler_mc_ld: f32,
    /// Enable forward-thrust assistance from the pusher in hover.
    pub vt_fwd_thrust_en: bool,
    /// Scale of the pitch-demand-to-forward-thrust trade.
    pub vt_fwd_thrust_sc: f32,

    // quadchute
    /// Minimum altitude above home in fixed-wing flight (m), 0 disables.
    pub vt_fw_min_alt: f32,
    /// Height-rate error integral that triggers the uncommanded-descent
    /// quadchute (m), 0 disables.
    pub vt_qc_hr_error_i: f32,
    /// Altitude loss during a front transition that triggers the quadchute
    /// (m), 0 disables.
    pub vt_qc_t_alt_loss: f32,
    /// Maximum multirotor pitch setpoint in fixed-wing flight (deg), 0
    /// disables.
    pub vt_fw_qc_p: i32,
    /// Maximum multirotor roll setpoint in fixed-wing flight (deg), 0
    /// disables.
    pub vt_fw_qc_r: i32,

    // tiltrotor
    /// Normalized tilt in hover.
    pub vt_tilt_mc: f32,
    /// Normalized tilt during the front transition acceleration phase.
    pub vt_tilt_trans: f32,
    /// Normalized tilt in fixed-wing flight.
    pub vt_tilt_fw: f32,
    /// Duration of front transition phase 2, tilting from `vt_tilt_trans` to
    /// `vt_tilt_fw` (s).
    pub vt_trans_p2_dur: f32,
    /// Duration of the back transition tilt ramp (s).
    pub vt_bt_tilt_dur: f32,

    // collaborating controllers
    /// Fixed-wing pitch setpoint offset (deg).
    pub fw_psp_off: f32,
    /// Whether the fixed-wing stack flies on the airspeed measurement.
    pub fw_use_airspd: bool,
    /// Multicopter cruise speed, used as the back transition exit speed
    /// (m/s).
    pub mpc_xy_cruise: f32,
}

impl Default for VtolParams {
    fn default() -> Self {
        Self {
            vt_type: AirframeKind::Standard as i32,
            vt_arsp_blend: 8.0,
            vt_arsp_trans: 10.0,
            vt_trans_min_tm: 2.0,
            vt_f_trans_dur: 5.0,
            vt_trans_timeout: 15.0,
            vt_f_trans_thr: 1.0,
            vt_psher_slew: 0.33,
            vt_b_trans_dur: 4.0,
            vt_b_trans_ramp: 3.0,
            vt_b_dec_mss: 2.0,
            vt_b_dec_i: 0.1,
            vt_b_dec_ff: 0.12,
            vt_elev_mc_lock: true,
            vt_spoiler_mc_ld: 0.0,
            vt_fwd_thrust_en: false,
            vt_fwd_thrust_sc: 0.7,
            vt_fw_min_alt: 0.0,
            vt_qc_hr_error_i: 0.0,
            vt_qc_t_alt_loss: 10.0,
            vt_fw_qc_p: 0,
            vt_fw_qc_r: 0,
            vt_tilt_mc: 0.0,
            vt_tilt_trans: 0.4,
            vt_tilt_fw: 1.0,
            vt_trans_p2_dur: 0.5,
            vt_bt_tilt_dur: 1.0,
            fw_psp_off: 0.0,
            fw_use_airspd: true,
            mpc_xy_cruise: 5.0,
        }
    }
}

impl VtolParams {
    /// Clamps that hold for every airframe. Airframe-specific clamps live in
    /// the airframe's `parameters_update`.
    pub fn sanitize(&mut self) {
        self.vt_arsp_blend = self.vt_arsp_blend.min(self.vt_arsp_trans);
        self.vt_trans_min_tm = self.vt_trans_min_tm.max(0.0);
        self.vt_f_trans_dur = self.vt_f_trans_dur.max(0.1);
        self.vt_b_trans_dur = self.vt_b_trans_dur.max(0.1);
        self.vt_f_trans_thr = self.vt_f_trans_thr.clamp(0.0, 1.0);
    }

    pub fn airframe_kind(&self) -> Option<AirframeKind> {
        AirframeKind::from_raw(self.vt_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_airframe_kind_roundtrip() {
        for kind in [
            AirframeKind::Standard,
            AirframeKind::Tailsitter,
            AirframeKind::Tiltrotor,
        ] {
            assert_eq!(AirframeKind::from_raw(kind as i32), Some(kind));
        }
        assert_eq!(AirframeKind::from_raw(3), None);
        assert_eq!(AirframeKind::from_raw(-1), None);
    }

    #[test]
    fn test_sanitize_orders_airspeeds() {
        let mut params = VtolParams {
            vt_arsp_blend: 12.0,
            vt_arsp_trans: 10.0,
            ..VtolParams::default()
        };
        params.sanitize();
        assert!(params.vt_arsp_blend <= params.vt_arsp_trans);
    }

    #[test]
    fn test_defaults_pass_sanitize_unchanged() {
        let mut params = VtolParams::default();
        let before = params;
        params.sanitize();
        assert_eq!(params, before);
    }
}
