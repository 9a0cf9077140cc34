//! Parameter bounds for the coordinator tunables.

/// Parameter specification with bounds and step size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    /// Stored parameter name.
    pub name: &'static str,
    /// Human-readable label.
    pub label: &'static str,
    /// Minimum value.
    pub min: f32,
    /// Maximum value.
    pub max: f32,
    /// Step size for sweeps and sliders.
    pub step: f32,
    /// Default value.
    pub default: f32,
}

impl ParamSpec {
    pub const fn new(
        name: &'static str,
        label: &'static str,
        min: f32,
        max: f32,
        step: f32,
        default: f32,
    ) -> Self {
        Self {
            name,
            label,
            min,
            max,
            step,
            default,
        }
    }
}

/// Front transition tunables.
pub mod front_transition {
    use super::ParamSpec;

    pub const ARSP_BLEND: ParamSpec =
        ParamSpec::new("VT_ARSP_BLEND", "Blend airspeed (m/s)", 0.0, 30.0, 0.5, 8.0);
    pub const ARSP_TRANS: ParamSpec =
        ParamSpec::new("VT_ARSP_TRANS", "Transition airspeed (m/s)", 0.0, 30.0, 0.5, 10.0);
    pub const TRANS_MIN_TM: ParamSpec =
        ParamSpec::new("VT_TRANS_MIN_TM", "Min transition time (s)", 0.0, 20.0, 0.1, 2.0);
    pub const F_TRANS_DUR: ParamSpec =
        ParamSpec::new("VT_F_TRANS_DUR", "Open-loop duration (s)", 0.1, 20.0, 0.1, 5.0);
    pub const TRANS_TIMEOUT: ParamSpec =
        ParamSpec::new("VT_TRANS_TIMEOUT", "Transition timeout (s)", 0.0, 60.0, 1.0, 15.0);
    pub const F_TRANS_THR: ParamSpec =
        ParamSpec::new("VT_F_TRANS_THR", "Pusher target throttle", 0.0, 1.0, 0.01, 1.0);
    pub const PSHER_SLEW: ParamSpec =
        ParamSpec::new("VT_PSHER_SLEW", "Pusher slew (1/s)", 0.0, 2.0, 0.01, 0.33);
}

/// Back transition tunables.
pub mod back_transition {
    use super::ParamSpec;

    pub const B_TRANS_DUR: ParamSpec =
        ParamSpec::new("VT_B_TRANS_DUR", "Max duration (s)", 0.1, 20.0, 0.1, 4.0);
    pub const B_TRANS_RAMP: ParamSpec =
        ParamSpec::new("VT_B_TRANS_RAMP", "Authority ramp (s)", 0.0, 20.0, 0.1, 3.0);
    pub const B_DEC_MSS: ParamSpec =
        ParamSpec::new("VT_B_DEC_MSS", "Deceleration setpoint (m/s²)", 0.5, 10.0, 0.1, 2.0);
}

/// Quadchute thresholds.
pub mod quadchute {
    use super::ParamSpec;

    pub const FW_MIN_ALT: ParamSpec =
        ParamSpec::new("VT_FW_MIN_ALT", "Min altitude (m)", 0.0, 200.0, 1.0, 0.0);
    pub const QC_HR_ERROR_I: ParamSpec =
        ParamSpec::new("VT_QC_HR_ERROR_I", "Height-rate error integral (m)", 0.0, 50.0, 1.0, 0.0);
    pub const QC_T_ALT_LOSS: ParamSpec =
        ParamSpec::new("VT_QC_T_ALT_LOSS", "Transition altitude loss (m)", 0.0, 50.0, 1.0, 10.0);
    pub const FW_QC_P: ParamSpec =
        ParamSpec::new("VT_FW_QC_P", "Max pitch (deg)", 0.0, 180.0, 1.0, 0.0);
    pub const FW_QC_R: ParamSpec =
        ParamSpec::new("VT_FW_QC_R", "Max roll (deg)", 0.0, 180.0, 1.0, 0.0);
}

/// Tiltrotor geometry and timing.
pub mod tiltrotor {
    use super::ParamSpec;

    pub const TILT_MC: ParamSpec =
        ParamSpec::new("VT_TILT_MC", "Tilt in hover", 0.0, 1.0, 0.01, 0.0);
    pub const TILT_TRANS: ParamSpec =
        ParamSpec::new("VT_TILT_TRANS", "Tilt in transition", 0.0, 1.0, 0.01, 0.4);
    pub const TILT_FW: ParamSpec =
        ParamSpec::new("VT_TILT_FW", "Tilt in forward flight", 0.0, 1.0, 0.01, 1.0);
    pub const TRANS_P2_DUR: ParamSpec =
        ParamSpec::new("VT_TRANS_P2_DUR", "Phase 2 duration (s)", 0.1, 5.0, 0.01, 0.5);
    pub const BT_TILT_DUR: ParamSpec =
        ParamSpec::new("VT_BT_TILT_DUR", "Back tilt duration (s)", 0.1, 10.0, 0.1, 1.0);
}

/// Every spec, for sweep tooling.
pub const ALL_PARAMS: [ParamSpec; 20] = [
    front_transition::ARSP_BLEND,
    front_transition::ARSP_TRANS,
    front_transition::TRANS_MIN_TM,
    front_transition::F_TRANS_DUR,
    front_transition::TRANS_TIMEOUT,
    front_transition::F_TRANS_THR,
    front_transition::PSHER_SLEW,
    back_transition::B_TRANS_DUR,
    back_transition::B_TRANS_RAMP,
    back_transition::B_DEC_MSS,
    quadchute::FW_MIN_ALT,
    quadchute::QC_HR_ERROR_I,
    quadchute::QC_T_ALT_LOSS,
    quadchute::FW_QC_P,
    quadchute::FW_QC_R,
    tiltrotor::TILT_MC,
    tiltrotor::TILT_TRANS,
    tiltrotor::TILT_FW,
    tiltrotor::TRANS_P2_DUR,
    tiltrotor::BT_TILT_DUR,
];

/// Look a spec up by its stored name.
pub fn param_spec(name: &str) -> Option<ParamSpec> {
    ALL_PARAMS.iter().find(|spec| spec.name == name).copied()
}
