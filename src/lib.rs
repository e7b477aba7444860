//! # atomberg_fans_rs
//!
//! A Rust library for controlling Atomberg smart ceiling fans over their local
//! UDP protocol.
//!
//! Fans accept small JSON commands that carry only the settings being changed,
//! and periodically broadcast their full state as a packed bitfield. This crate
//! covers both directions: [`Fan`] sends [`Command`]s, and a
//! [`BroadcastListener`] decodes, deduplicates and delivers [`DeviceState`]s.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::net::Ipv4Addr;
//! use atomberg_fans_rs::{BroadcastListener, Fan, FanEvent, FanSpeed, ListenerConfig};
//!
//! async fn control_fan() -> Result<(), Box<dyn std::error::Error>> {
//!     let fan = Fan::new(Ipv4Addr::new(192, 168, 29, 14), Some("Sofa Fan"));
//!     fan.turn_on().await?;
//!     fan.set_speed(FanSpeed::create(4).unwrap()).await?;
//!
//!     let listener = BroadcastListener::new(ListenerConfig::default());
//!     let events = listener.start()?;
//!     if let FanEvent::State(state) = events.recv()? {
//!         println!("power={} speed={}", state.power(), state.speed());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Communication
//!
//! Commands are sent as single UDP datagrams to port 5600 of the fan; no reply
//! is sent back. State broadcasts arrive on UDP port 5625, either as JSON text
//! or as its hex-ASCII encoding.
//!
//! ## Feature Flags
//!
//! - `runtime-tokio` (default): Use the tokio async runtime for command sends

mod bitfield;
mod command;
mod dedup;
mod errors;
mod fan;
pub mod framing;
mod history;
mod listener;
mod registry;
pub mod runtime;
mod types;

// Re-export public API
pub use bitfield::{ColorMode, DeviceState};
pub use command::Command;
pub use dedup::DedupCache;
pub use errors::Error;
pub use fan::Fan;
pub use framing::{Envelope, Skip};
pub use history::{HistoryEntry, HistorySummary, MessageHistory, MessageType};
pub use listener::{
    BroadcastListener, FanEvent, LISTEN_PORT, ListenerConfig, ListenerDiagnostics, ListenerState,
};
pub use registry::DeviceRegistry;
pub use types::{FanSpeed, SpeedDelta, Timer};
