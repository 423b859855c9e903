//! Fog Bridge: MQTT control-plane for fog-tier operators (spec.md §4.4).

pub mod client;
pub mod error;
pub mod messages;
pub mod topics;

pub use client::{run_event_loop, FogBridge, SyncRequestSource};
pub use error::FogError;
pub use messages::{OperatorIds, StartCommand, StopCommand, UpstreamControlMessage, UpstreamSyncMessage};
