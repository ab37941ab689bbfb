// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status condition helpers for Kubernetes resources.
//!
//! This module provides utility functions for creating and managing
//! Kubernetes status conditions following the standard conventions.
//!
//! # Condition Format
//!
//! - `type`: The aspect of the resource being reported (e.g., "Ready", "Succeeded")
//! - `status`: "True", "False", or "Unknown"
//! - `reason`: A programmatic identifier (CamelCase)
//! - `message`: A human-readable explanation
//! - `lastTransitionTime`: RFC3339 timestamp when the condition changed
//!
//! The comparison helpers ignore `lastTransitionTime` so that a reconcile
//! pass producing the same semantic state performs zero status writes.

use crate::crd::Condition;
use chrono::Utc;

/// Create a new Kubernetes condition with the current timestamp.
///
/// # Example
///
/// ```rust,no_run
/// # use kiln::reconcilers::status::create_condition;
/// let condition = create_condition(
///     "Ready",
///     "True",
///     "ReconcileSucceeded",
///     "Builder metadata resolved"
/// );
/// assert_eq!(condition.r#type, "Ready");
/// assert_eq!(condition.status, "True");
/// ```
#[must_use]
pub fn create_condition(
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) -> Condition {
    Condition {
        r#type: condition_type.to_string(),
        status: status.to_string(),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
        last_transition_time: Some(Utc::now().to_rfc3339()),
    }
}

/// Find a condition by type in a list of conditions.
#[must_use]
pub fn find_condition<'a>(
    conditions: &'a [Condition],
    condition_type: &str,
) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == condition_type)
}

/// Update or add a condition in a mutable conditions list (in-memory, no API call).
///
/// Preserves `lastTransitionTime` when the status value is unchanged, so the
/// transition timestamp reflects the last actual state flip rather than the
/// last reconcile pass.
pub fn update_condition_in_memory(
    conditions: &mut Vec<Condition>,
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) {
    if let Some(existing) = conditions.iter_mut().find(|c| c.r#type == condition_type) {
        let last_transition_time = if existing.status == status {
            existing
                .last_transition_time
                .clone()
                .unwrap_or_else(|| Utc::now().to_rfc3339())
        } else {
            Utc::now().to_rfc3339()
        };

        existing.status = status.to_string();
        existing.reason = Some(reason.to_string());
        existing.message = Some(message.to_string());
        existing.last_transition_time = Some(last_transition_time);
    } else {
        conditions.push(create_condition(condition_type, status, reason, message));
    }
}

/// Compare two condition lists for semantic equality.
///
/// Ignores `lastTransitionTime` differences and compares only type, status,
/// reason, and message.
#[must_use]
pub fn conditions_equal(current: &[Condition], new: &[Condition]) -> bool {
    if current.len() != new.len() {
        return false;
    }

    for new_cond in new {
        match current.iter().find(|c| c.r#type == new_cond.r#type) {
            None => return false,
            Some(curr_cond) => {
                if curr_cond.status != new_cond.status
                    || curr_cond.reason != new_cond.reason
                    || curr_cond.message != new_cond.message
                {
                    return false;
                }
            }
        }
    }

    true
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;
