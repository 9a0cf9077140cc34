//! Latest-value publish/subscribe substrate.
//!
//! Single-threaded and allocation free: a [`Topic`] holds the most recent
//! sample and a generation counter, a [`Subscription`] tracks what a reader
//! has seen, and a [`Queue`] buffers the few topics where arrival order
//! matters (commands and acknowledgements). Each topic has exactly one
//! writer; readers get copies.

use crate::msgs::*;

// ---------------------------------------------------------------------------
// Topic & Subscription
// ---------------------------------------------------------------------------

/// Last-value topic with a single writer.
#[derive(Debug, Clone)]
pub struct Topic<T> {
    value: T,
    generation: u64,
}

impl<T> Topic<T> {
    pub fn new(initial: T) -> Self {
        Self {
            value: initial,
            generation: 0,
        }
    }

    /// Replace the stored sample. Publishing never blocks.
    pub fn publish(&mut self, value: T) {
        self.value = value;
        self.generation += 1;
    }

    pub fn latest(&self) -> &T {
        &self.value
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl<T: Default> Default for Topic<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Reader-side cursor over a [`Topic`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Subscription {
    seen: u64,
}

impl Subscription {
    /// True while the topic holds a sample this reader has not consumed.
    pub fn updated<T>(&self, topic: &Topic<T>) -> bool {
        topic.generation > self.seen
    }

    /// Copy the latest sample into `dest` if it is new to this reader.
    pub fn update<T: Clone>(&mut self, topic: &Topic<T>, dest: &mut T) -> bool {
        if self.updated(topic) {
            *dest = topic.value.clone();
            self.seen = topic.generation;
            true
        } else {
            false
        }
    }

    /// Copy the latest sample unconditionally and mark it consumed.
    pub fn copy<T: Clone>(&mut self, topic: &Topic<T>) -> T {
        self.seen = topic.generation;
        topic.value.clone()
    }
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

/// Fixed-capacity FIFO for ordered topics. A full queue drops the oldest
/// entry, matching last-value semantics under overload.
#[derive(Debug, Clone)]
pub struct Queue<T, const N: usize> {
    items: [Option<T>; N],
    head: usize,
    len: usize,
}

impl<T: Copy, const N: usize> Queue<T, N> {
    pub const fn new() -> Self {
        Self {
            items: [None; N],
            head: 0,
            len: 0,
        }
    }

    pub fn push(&mut self, item: T) {
        if self.len == N {
            // overwrite the oldest entry
            self.items[self.head] = Some(item);
            self.head = (self.head + 1) % N;
        } else {
            let tail = (self.head + self.len) % N;
            self.items[tail] = Some(item);
            self.len += 1;
        }
    }

    pub fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }

        let item = self.items[self.head].take();
        self.head = (self.head + 1) % N;
        self.len -= 1;
        item
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<T: Copy, const N: usize> Default for Queue<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Bus
// ---------------------------------------------------------------------------

/// The full topic set the coordinator is wired to. Inbound topics are
/// written by the rest of the flight stack (or the sim harness); outbound
/// topics have the coordinator as their single writer.
#[derive(Debug, Default)]
pub struct FlightBus {
    // inbound state
    pub vehicle_status: Topic<VehicleStatus>,
    pub vehicle_control_mode: Topic<VehicleControlMode>,
    pub vehicle_attitude: Topic<VehicleAttitude>,
    pub vehicle_local_position: Topic<VehicleLocalPosition>,
    pub vehicle_local_position_setpoint: Topic<VehicleLocalPositionSetpoint>,
    pub position_setpoint_triplet: Topic<PositionSetpointTriplet>,
    pub airspeed_validated: Topic<AirspeedValidated>,
    pub tecs_status: Topic<TecsStatus>,
    pub vehicle_land_detected: Topic<VehicleLandDetected>,
    pub vehicle_air_data: Topic<VehicleAirData>,
    pub home_position: Topic<HomePosition>,
    pub parameter_update: Topic<ParameterUpdate>,

    // inbound commands, drained in arrival order
    pub action_request: Queue<ActionRequest, 8>,
    pub vehicle_command: Queue<VehicleCommand, 8>,

    // virtual control streams
    pub torque_virtual_mc: Topic<VehicleTorqueSetpoint>,
    pub torque_virtual_fw: Topic<VehicleTorqueSetpoint>,
    pub thrust_virtual_mc: Topic<VehicleThrustSetpoint>,
    pub thrust_virtual_fw: Topic<VehicleThrustSetpoint>,
    pub attitude_sp_virtual_mc: Topic<VehicleAttitudeSetpoint>,
    pub attitude_sp_virtual_fw: Topic<VehicleAttitudeSetpoint>,

    // outbound
    pub torque_setpoint_0: Topic<VehicleTorqueSetpoint>,
    pub torque_setpoint_1: Topic<VehicleTorqueSetpoint>,
    pub thrust_setpoint_0: Topic<VehicleThrustSetpoint>,
    pub thrust_setpoint_1: Topic<VehicleThrustSetpoint>,
    pub vehicle_attitude_setpoint: Topic<VehicleAttitudeSetpoint>,
    pub vtol_vehicle_status: Topic<VtolVehicleStatus>,
    pub flaps_setpoint: Topic<NormalizedUnsignedSetpoint>,
    pub spoilers_setpoint: Topic<NormalizedUnsignedSetpoint>,
    pub tiltrotor_extra_controls: Topic<TiltrotorExtraControls>,
    pub vehicle_command_ack: Queue<VehicleCommandAck, 4>,
    pub quadchute_event: Queue<QuadchuteEvent, 4>,
}

impl FlightBus {
    pub fn new() -> Self {
        Self::default()
    }
}
