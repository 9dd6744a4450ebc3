//! # rvcbridge-app
//!
//! Application layer — use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `CanTransport` — write a frame onto the bus
//!   - `EventPublisher` — publish state and feedback events
//! - Define **driving/inbound use-cases**:
//!   - `RxPipeline` — decode incoming frames and project entity state
//!   - `CommandPipeline` — validate, encode, rate-limit and transmit
//!     commands, emitting exactly one feedback record per command
//! - Own the shared mutable state: the rate limiter's budgets and the
//!   transmitter's statistics
//! - Orchestrate domain objects without knowing *how* the bus or the
//!   broker are reached
//!
//! ## Dependency rule
//! Depends on `rvcbridge-domain` only.
//! Never imports adapter crates. Adapters depend on *this* crate, not the
//! reverse.

pub mod event_bus;
pub mod ports;
pub mod services;
