//! # Contracts
//!
//! Frozen interface contracts shared by every loxprox crate.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Data Model
//! - `RawFrame`: one UDP datagram split into its three fields
//! - `DeviceEvent`: a frame after device-type specific decoding
//! - `ProxyBlueprint`: canonical configuration handed to the core at startup

mod blueprint;
mod error;
mod event;
mod frame;
mod sink;

pub use blueprint::*;
pub use error::*;
pub use event::*;
pub use frame::RawFrame;
pub use sink::*;
