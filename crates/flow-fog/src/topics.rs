//! MQTT control-plane topic names (spec.md §4.4, §6). All topics are scoped
//! per `userId` — there is no pipeline-scoped subscription, a fog node only
//! ever talks to topics named after the user that owns it.

pub fn operator_start(user_id: &str) -> String {
    format!("operator/control/start/{user_id}")
}

pub fn operator_stop(user_id: &str) -> String {
    format!("operator/control/stop/{user_id}")
}

pub fn operator_sync_request(user_id: &str) -> String {
    format!("operator/control/sync/request/{user_id}")
}

pub fn operator_sync_response(user_id: &str) -> String {
    format!("operator/control/sync/response/{user_id}")
}

pub fn upstream_enable(user_id: &str) -> String {
    format!("upstream/control/enable/{user_id}")
}

pub fn upstream_disable(user_id: &str) -> String {
    format!("upstream/control/disable/{user_id}")
}

pub fn upstream_sync_request(user_id: &str) -> String {
    format!("upstream/sync/request/{user_id}")
}

pub fn upstream_sync_response(user_id: &str) -> String {
    format!("upstream/sync/response/{user_id}")
}

/// `userId` from a topic this engine subscribes to, or `None` if it doesn't
/// match one of our known prefixes.
pub fn user_from_sync_request_topic(topic: &str) -> Option<(SyncRequestKind, &str)> {
    if let Some(user) = topic.strip_prefix("operator/control/sync/request/") {
        return Some((SyncRequestKind::Operator, user));
    }
    if let Some(user) = topic.strip_prefix("upstream/sync/request/") {
        return Some((SyncRequestKind::Upstream, user));
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncRequestKind {
    Operator,
    Upstream,
}
