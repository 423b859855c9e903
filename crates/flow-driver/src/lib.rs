//! Cluster driver contract and implementations (spec.md §4.3).

pub mod contract;
pub mod fake;
pub mod kubernetes;
pub mod naming;

pub use contract::Driver;
pub use fake::FakeDriver;
pub use kubernetes::KubernetesDriver;
