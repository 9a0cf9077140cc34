//! # Osprey Core
//!
//! VTOL transition-control library designed for `no_std` environments.
//! This crate contains only the code that needs to run on the flight
//! controller:
//! - Per-airframe transition state machines (standard, tailsitter,
//!   tiltrotor)
//! - Multiplexing of the two virtual control streams into physical actuator
//!   setpoints, with blending during transitions
//! - The command/failsafe surface: pilot requests, autopilot commands and
//!   the quad-chute
//! - A latest-value bus modeling the flight stack's topic contracts
//!
//! # Features
//! - `std`: Enable standard library support (for testing and the sim)
//! - Default: `no_std` with no allocations (bare metal embedded)

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "std")]
extern crate std;

pub mod airframe;
pub mod bus;
pub mod coordinator;
pub mod msgs;
pub mod params;

// Re-export core types
pub use airframe::{Airframe, StepContext, TransitionCommon, VtolMode};
pub use bus::{FlightBus, Queue, Subscription, Topic};
pub use coordinator::{Coordinator, CoordinatorError, InputSnapshot, OutputSetpoints};
pub use msgs::{QuadchuteReason, VtolState, VtolVehicleStatus};
pub use params::{AirframeKind, VtolParams};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
