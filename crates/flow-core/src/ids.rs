//! Newtype identifiers.
//!
//! `flowId`, `pipelineId`, `operatorId` and `applicationId` are all UUIDs on
//! the wire but must never be interchangeable at a call site — mixing them
//! up is exactly the class of bug this module exists to rule out at compile
//! time (see the identity-typing note in the design notes).

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn nil() -> Self {
                Self(Uuid::nil())
            }

            pub fn is_nil(&self) -> bool {
                self.0.is_nil()
            }

            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::nil()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(u: Uuid) -> Self {
                Self(u)
            }
        }
    };
}

uuid_id!(PipelineId);
uuid_id!(ApplicationId);

/// Operator node IDs come from the parser as opaque strings (they may be
/// composite, e.g. `"<nodeId>:<pipelineId>"` for cross-pipeline operator
/// references — the substring after the first `:` is itself a pipeline ID)
/// — not a bare UUID, so this stays a string newtype.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperatorId(pub String);

impl fmt::Display for OperatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for OperatorId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for OperatorId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Flow IDs are assigned by the (external) flow authoring tool, also opaque.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowId(pub String);

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for FlowId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for FlowId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nil_application_id_is_the_sentinel() {
        let id = ApplicationId::default();
        assert!(id.is_nil());
    }

    #[test]
    fn pipeline_id_round_trips_through_display() {
        let id = PipelineId::new();
        let parsed = PipelineId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }
}
