//! # rvcbridge-domain
//!
//! Pure domain model for the rvcbridge RV-C ⇄ MQTT bridge.
//!
//! ## Responsibilities
//! - Foundational types: CAN identifiers, raw frames, typed signal values
//! - Define the **spec registry** — a loaded, read-only index of RV-C DGN
//!   layouts and named enumerations
//! - Define the **frame decoder** — 29-bit identifier parsing and signal
//!   extraction against the registry
//! - Define **entity descriptors** and the `(message, instance)` projection
//!   index, with per-signal transforms
//! - Define **commands** — candidate and normalized command types and the
//!   stable validation error codes
//! - Define the **command codec** — device-family frame encoders producing
//!   timed frame sequences
//! - Define **events** — entity state updates and command feedback records
//! - Contain all invariant enforcement and domain logic
//!
//! ## Dependency rule
//! This crate has **no internal dependencies** and performs no IO.
//! It must never import anything from `app`, adapters, or transport crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod frame;

pub mod command;
pub mod decode;
pub mod encode;
pub mod entity;
pub mod event;
pub mod project;
pub mod spec;
pub mod transform;
