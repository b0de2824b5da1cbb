use std::fmt::Display;

use taskwarden_core::id::UserId;
use taskwarden_core::policy::{Action, DenyReason};
use taskwarden_core::resource::ResourceKind;

/// `resource_id` is empty for creation targets that have no id yet.
pub fn audit_access_denied(
    user_id: &UserId,
    resource: ResourceKind,
    resource_id: &str,
    action: Action,
    reason: DenyReason,
) {
    tracing::warn!(
        target: "audit",
        event = "access_denied",
        user_id = %user_id,
        resource_kind = resource.as_str(),
        resource_id = resource_id,
        action = action.as_str(),
        reason = reason.code(),
        "access denied"
    );
}

pub fn audit_resource_mutated(user_id: &UserId, event: &str, resource_id: &dyn Display) {
    tracing::info!(
        target: "audit",
        event = event,
        user_id = %user_id,
        resource_id = %resource_id,
        "resource mutated"
    );
}

pub fn audit_user_promoted(actor: &UserId, target: &UserId) {
    tracing::info!(
        target: "audit",
        event = "user_promoted",
        user_id = %actor,
        target_user_id = %target,
        "user promoted to admin"
    );
}

pub fn audit_auth_success(user_id: &UserId, key_id: &str) {
    tracing::info!(
        target: "audit",
        event = "auth_success",
        user_id = %user_id,
        key_id = key_id,
        "authentication succeeded"
    );
}

pub fn audit_auth_failure(reason: &str, key_id: Option<&str>) {
    tracing::warn!(
        target: "audit",
        event = "auth_failure",
        reason = reason,
        key_id = key_id.unwrap_or("unknown"),
        "authentication failed"
    );
}
