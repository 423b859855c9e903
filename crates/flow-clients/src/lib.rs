//! Thin, trait-fronted HTTP clients for the flow engine's external
//! collaborators (spec.md §4.5): the flow parser, permission search,
//! pipeline registry, device manager, and the Kafka↔MQTT bridge.

pub mod bridge;
pub mod device_manager;
pub mod error;
pub mod fakes;
pub mod parser;
pub mod permission;
pub mod registry;

pub use bridge::{HttpKafkaMqttBridgeClient, KafkaMqttBridgeClient};
pub use fakes::{
    FakeDeviceManagerClient, FakeKafkaMqttBridgeClient, FakeParserClient, FakePermissionClient,
    FakePipelineRegistryClient,
};
pub use device_manager::{DeviceManagerClient, HttpDeviceManagerClient, ServiceMetadata};
pub use error::ClientError;
pub use parser::{HttpParserClient, ParserClient};
pub use permission::{HttpPermissionClient, PermissionClient};
pub use registry::{HttpPipelineRegistryClient, PipelineRegistryClient};
