//! Record types exchanged over the flight bus.
//!
//! Every record carries a `timestamp` in microseconds of the same monotonic
//! clock the coordinator is driven with. Records are plain `Copy` values: the
//! bus hands out copies, never references that outlive a tick.

use nalgebra::{UnitQuaternion, Vector3};

/// Command id for a commanded mode change between hover and forward flight.
pub const VEHICLE_CMD_DO_VTOL_TRANSITION: u32 = 3000;

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// Navigation state as reported by the commander.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum NavState {
    #[default]
    Manual = 0,
    Stabilized = 1,
    AutoMission = 2,
    AutoLoiter = 3,
    AutoTakeoff = 4,
    AutoLand = 5,
    AutoRtl = 6,
    Orbit = 7,
    Descend = 8,
}

/// Externally observable VTOL state, also used as the wire encoding of
/// transition commands (`param1` of [`VEHICLE_CMD_DO_VTOL_TRANSITION`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum VtolState {
    Undefined = 0,
    TransitionToFw = 1,
    Fw = 2,
    Mc = 3,
    TransitionToMc = 4,
}

impl VtolState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Undefined => "Undefined",
            Self::TransitionToFw => "Transition to FW",
            Self::Fw => "FW",
            Self::Mc => "MC",
            Self::TransitionToMc => "Transition to MC",
        }
    }

    /// Decode the `param1` of a transition command. Only the two commandable
    /// target states are accepted.
    pub fn from_transition_param(param1: f32) -> Option<Self> {
        if !param1.is_finite() {
            return None;
        }

        match (param1 + 0.5) as i32 {
            2 => Some(Self::Fw),
            3 => Some(Self::Mc),
            _ => None,
        }
    }
}

/// Result code carried in a command acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandResult {
    Accepted = 0,
    TemporarilyRejected = 1,
}

/// Pilot action requests relevant to mode transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ActionRequestKind {
    VtolTransitionToMulticopter = 0,
    VtolTransitionToFixedwing = 1,
}

/// Kind of the currently active position setpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum PositionSetpointType {
    #[default]
    Position = 0,
    Velocity = 1,
    Loiter = 2,
    Takeoff = 3,
    Land = 4,
    Idle = 5,
}

/// Cause of an emergency reversion to hover flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum QuadchuteReason {
    TransitionTimeout = 0,
    ExternalCommand = 1,
    MinimumAltBreached = 2,
    UncommandedDescent = 3,
    TransitionAltitudeLoss = 4,
    MaximumPitchExceeded = 5,
    MaximumRollExceeded = 6,
}

impl QuadchuteReason {
    /// Short event id, stable across releases; one id per cause.
    pub fn event_id(self) -> &'static str {
        match self {
            Self::TransitionTimeout => "tout",
            Self::ExternalCommand => "ext_cmd",
            Self::MinimumAltBreached => "min_alt",
            Self::UncommandedDescent => "alt_loss",
            Self::TransitionAltitudeLoss => "trans_alt_err",
            Self::MaximumPitchExceeded => "max_pitch",
            Self::MaximumRollExceeded => "max_roll",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::TransitionTimeout => "transition timeout",
            Self::ExternalCommand => "external command",
            Self::MinimumAltBreached => "minimum altitude breach",
            Self::UncommandedDescent => "uncommanded descent detection",
            Self::TransitionAltitudeLoss => "loss of altitude during transition",
            Self::MaximumPitchExceeded => "maximum pitch angle exceeded",
            Self::MaximumRollExceeded => "maximum roll angle exceeded",
        }
    }
}

// ---------------------------------------------------------------------------
// Inbound records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct VehicleStatus {
    pub timestamp: u64,
    pub nav_state: NavState,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VehicleControlMode {
    pub timestamp: u64,
    pub flag_armed: bool,
    pub flag_control_climb_rate_enabled: bool,
    pub flag_control_auto_enabled: bool,
}

/// Estimated attitude, with the estimator's reset bookkeeping so consumers
/// can re-express stored setpoints after a heading reset.
#[derive(Debug, Clone, Copy)]
pub struct VehicleAttitude {
    pub timestamp: u64,
    pub q: UnitQuaternion<f32>,
    pub quat_reset_counter: u8,
    pub delta_q_reset: UnitQuaternion<f32>,
}

impl Default for VehicleAttitude {
    fn default() -> Self {
        Self {
            timestamp: 0,
            q: UnitQuaternion::identity(),
            quat_reset_counter: 0,
            delta_q_reset: UnitQuaternion::identity(),
        }
    }
}

/// Local position estimate, NED frame (z down).
#[derive(Debug, Clone, Copy, Default)]
pub struct VehicleLocalPosition {
    pub timestamp: u64,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub vx: f32,
    pub vy: f32,
    pub vz: f32,
    pub ax: f32,
    pub ay: f32,
    pub v_xy_valid: bool,
    pub z_valid: bool,
}

/// Local position setpoint, NED frame. The coordinator only consumes the
/// commanded vertical velocity (to tell commanded from uncommanded descent).
#[derive(Debug, Clone, Copy, Default)]
pub struct VehicleLocalPositionSetpoint {
    pub timestamp: u64,
    pub z: f32,
    pub vz: f32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PositionSetpoint {
    pub valid: bool,
    pub setpoint_type: PositionSetpointType,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PositionSetpointTriplet {
    pub timestamp: u64,
    pub current: PositionSetpoint,
}

/// Validated airspeed; `calibrated_airspeed_m_s` is NaN while no valid
/// estimate is available.
#[derive(Debug, Clone, Copy)]
pub struct AirspeedValidated {
    pub timestamp: u64,
    pub calibrated_airspeed_m_s: f32,
}

impl Default for AirspeedValidated {
    fn default() -> Self {
        Self {
            timestamp: 0,
            calibrated_airspeed_m_s: f32::NAN,
        }
    }
}

/// Total-energy controller status. Height rates in m/s, up positive.
#[derive(Debug, Clone, Copy, Default)]
pub struct TecsStatus {
    pub timestamp: u64,
    pub height_rate: f32,
    pub height_rate_setpoint: f32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VehicleLandDetected {
    pub timestamp: u64,
    pub landed: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct VehicleAirData {
    pub timestamp: u64,
    /// Air density in kg/m³.
    pub rho: f32,
}

impl Default for VehicleAirData {
    fn default() -> Self {
        Self {
            timestamp: 0,
            rho: 1.225,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HomePosition {
    pub timestamp: u64,
    /// Home altitude in the local frame (NED z, down positive).
    pub z: f32,
    pub valid_alt: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ActionRequest {
    pub timestamp: u64,
    pub action: ActionRequestKind,
}

#[derive(Debug, Clone, Copy)]
pub struct VehicleCommand {
    pub timestamp: u64,
    pub command: u32,
    pub param1: f32,
    pub param2: f32,
    pub from_external: bool,
    pub source_system: u8,
    pub source_component: u8,
}

/// Notification that one or more parameters changed in storage.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParameterUpdate {
    pub timestamp: u64,
}

// ---------------------------------------------------------------------------
// Outbound records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct VehicleCommandAck {
    pub timestamp: u64,
    pub command: u32,
    pub result: CommandResult,
    pub target_system: u8,
    pub target_component: u8,
}

/// Normalized torque demand for one actuator group, body frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct VehicleTorqueSetpoint {
    pub timestamp: u64,
    pub timestamp_sample: u64,
    pub xyz: Vector3<f32>,
}

/// Normalized thrust demand for one actuator group, body frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct VehicleThrustSetpoint {
    pub timestamp: u64,
    pub timestamp_sample: u64,
    pub xyz: Vector3<f32>,
}

#[derive(Debug, Clone, Copy)]
pub struct VehicleAttitudeSetpoint {
    pub timestamp: u64,
    pub q_d: UnitQuaternion<f32>,
    /// Normalized thrust demand in body frame (z up-thrust is negative).
    pub thrust_body: Vector3<f32>,
}

impl Default for VehicleAttitudeSetpoint {
    fn default() -> Self {
        Self {
            timestamp: 0,
            q_d: UnitQuaternion::identity(),
            thrust_body: Vector3::zeros(),
        }
    }
}

/// Ground truth for downstream consumers: mode transitions must be observed
/// through this record only.
#[derive(Debug, Clone, Copy)]
pub struct VtolVehicleStatus {
    pub timestamp: u64,
    pub vehicle_vtol_state: VtolState,
    /// Latched by a quadchute; cleared only by a fresh transition-to-FW
    /// command.
    pub fixed_wing_system_failure: bool,
}

impl Default for VtolVehicleStatus {
    fn default() -> Self {
        Self {
            timestamp: 0,
            vehicle_vtol_state: VtolState::Mc,
            fixed_wing_system_failure: false,
        }
    }
}

/// Setpoint for an unsigned normalized surface (flaps, spoilers).
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizedUnsignedSetpoint {
    pub timestamp: u64,
    pub normalized_setpoint: f32,
}

/// Tiltrotor-only auxiliary controls.
#[derive(Debug, Clone, Copy, Default)]
pub struct TiltrotorExtraControls {
    pub timestamp: u64,
    /// Tilt servo position, 0 = rotors vertical, 1 = rotors horizontal.
    pub collective_tilt: f32,
    /// Rear vertical rotors must spin (at least at idle) so hover authority
    /// is available without a spool-up delay.
    pub rear_motors_enabled: bool,
}

/// One record per quadchute firing.
#[derive(Debug, Clone, Copy)]
pub struct QuadchuteEvent {
    pub timestamp: u64,
    pub reason: QuadchuteReason,
}
