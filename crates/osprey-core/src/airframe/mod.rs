//! Airframe-specific transition logic.
//!
//! The coordinator owns exactly one [`Airframe`] for its lifetime. Shared
//! behavior (timers, blending weights, quadchute predicates, EKF-reset
//! handling) is a plain [`TransitionCommon`] value embedded in each variant;
//! everything the airframe needs from the coordinator arrives through a
//! [`StepContext`] handle passed per call.

mod common;
pub mod standard;
pub mod tailsitter;
pub mod tiltrotor;

pub use common::{ThrottleBlendAction, TransitionCommon, DT_MAX_S, STALE_SETPOINT_AGE_US};
pub use standard::Standard;
pub use tailsitter::Tailsitter;
pub use tiltrotor::Tiltrotor;

use crate::coordinator::{InputSnapshot, OutputSetpoints};
use crate::msgs::QuadchuteReason;
use crate::params::{AirframeKind, VtolParams};

// ---------------------------------------------------------------------------
// Common mode
// ---------------------------------------------------------------------------

/// The observable flight regime, common to all airframe families. Each
/// airframe maps its internal phases onto this; both change atomically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum VtolMode {
    RotaryWing = 0,
    FixedWing = 1,
    TransitionToFw = 2,
    TransitionToMc = 3,
}

impl VtolMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::RotaryWing => "Rotary wing",
            Self::FixedWing => "Fixed wing",
            Self::TransitionToFw => "Transition to FW",
            Self::TransitionToMc => "Transition to MC",
        }
    }

    pub fn in_transition(self) -> bool {
        matches!(self, Self::TransitionToFw | Self::TransitionToMc)
    }
}

// ---------------------------------------------------------------------------
// Per-call context
// ---------------------------------------------------------------------------

/// Read access to the coordinator's input snapshot and write access to its
/// output setpoints, valid for a single call. Airframes never store it.
pub struct StepContext<'a> {
    /// Monotonic clock, microseconds.
    pub now: u64,
    pub inputs: &'a InputSnapshot,
    pub params: &'a VtolParams,
    pub outputs: &'a mut OutputSetpoints,
    /// True while the active command requests forward flight.
    pub fixed_wing_requested: bool,
    /// Skip the minimum-time gates; consumed by the completing transition.
    pub immediate_transition: &'a mut bool,
    /// Latched quadchute state as of this tick's start.
    pub fixed_wing_system_failure: bool,
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// The one airframe strategy owned by the coordinator.
#[derive(Debug)]
pub enum Airframe {
    Standard(Standard),
    Tailsitter(Tailsitter),
    Tiltrotor(Tiltrotor),
}

impl Airframe {
    pub fn new(kind: AirframeKind) -> Self {
        match kind {
            AirframeKind::Standard => Self::Standard(Standard::new()),
            AirframeKind::Tailsitter => Self::Tailsitter(Tailsitter::new()),
            AirframeKind::Tiltrotor => Self::Tiltrotor(Tiltrotor::new()),
        }
    }

    pub fn kind(&self) -> AirframeKind {
        match self {
            Self::Standard(_) => AirframeKind::Standard,
            Self::Tailsitter(_) => AirframeKind::Tailsitter,
            Self::Tiltrotor(_) => AirframeKind::Tiltrotor,
        }
    }

    pub fn mode(&self) -> VtolMode {
        self.common().common_mode
    }

    pub fn common(&self) -> &TransitionCommon {
        match self {
            Self::Standard(a) => &a.common,
            Self::Tailsitter(a) => &a.common,
            Self::Tiltrotor(a) => &a.common,
        }
    }

    pub fn common_mut(&mut self) -> &mut TransitionCommon {
        match self {
            Self::Standard(a) => &mut a.common,
            Self::Tailsitter(a) => &mut a.common,
            Self::Tiltrotor(a) => &mut a.common,
        }
    }

    /// Advance the airframe state machine by at most one step.
    pub fn update_vtol_state(&mut self, ctx: &mut StepContext<'_>) {
        match self {
            Self::Standard(a) => a.update_vtol_state(ctx),
            Self::Tailsitter(a) => a.update_vtol_state(ctx),
            Self::Tiltrotor(a) => a.update_vtol_state(ctx),
        }
    }

    pub fn update_transition_state(&mut self, ctx: &mut StepContext<'_>) {
        match self {
            Self::Standard(a) => a.update_transition_state(ctx),
            Self::Tailsitter(a) => a.update_transition_state(ctx),
            Self::Tiltrotor(a) => a.update_transition_state(ctx),
        }
    }

    pub fn update_mc_state(&mut self, ctx: &mut StepContext<'_>) {
        match self {
            Self::Standard(a) => a.update_mc_state(ctx),
            Self::Tailsitter(a) => a.update_mc_state(ctx),
            Self::Tiltrotor(a) => a.update_mc_state(ctx),
        }
    }

    pub fn update_fw_state(&mut self, ctx: &mut StepContext<'_>) {
        match self {
            Self::Standard(a) => a.update_fw_state(ctx),
            Self::Tailsitter(a) => a.update_fw_state(ctx),
            Self::Tiltrotor(a) => a.update_fw_state(ctx),
        }
    }

    /// Write the physical torque/thrust setpoints from the virtual streams.
    pub fn fill_actuator_outputs(&mut self, ctx: &mut StepContext<'_>) {
        match self {
            Self::Standard(a) => a.fill_actuator_outputs(ctx),
            Self::Tailsitter(a) => a.fill_actuator_outputs(ctx),
            Self::Tiltrotor(a) => a.fill_actuator_outputs(ctx),
        }
    }

    /// Re-apply derived-parameter clamps after a storage update.
    pub fn parameters_update(&mut self, params: &mut VtolParams) {
        match self {
            Self::Standard(a) => a.parameters_update(params),
            Self::Tailsitter(a) => a.parameters_update(params),
            Self::Tiltrotor(a) => a.parameters_update(params),
        }
    }

    /// Re-express stored setpoints after an estimator reset.
    pub fn handle_ekf_resets(&mut self, inputs: &InputSnapshot, outputs: &mut OutputSetpoints) {
        match self {
            Self::Standard(a) => {
                a.common.handle_ekf_resets(inputs, outputs);
            }
            Self::Tailsitter(a) => a.handle_ekf_resets(inputs, outputs),
            Self::Tiltrotor(a) => {
                a.common.handle_ekf_resets(inputs, outputs);
            }
        }
    }

    /// Run the failsafe predicate set for the current regime.
    pub fn transition_safety_check(
        &mut self,
        inputs: &InputSnapshot,
        params: &VtolParams,
    ) -> Option<QuadchuteReason> {
        let front_transition = self.mode() == VtolMode::TransitionToFw;
        self.common_mut()
            .transition_safety_check(inputs, params, front_transition)
    }
}
