// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Centralized status updates for `Image` resources.
//!
//! The updater collects all status changes during a reconcile pass and
//! applies them in a single API call, gated on semantic difference. One write
//! per pass keeps the controller out of self-triggered reconcile loops and
//! gives the idempotence guarantee: a second pass with no external change
//! performs zero writes.

#[allow(clippy::wildcard_imports)]
use super::types::*;
use crate::reconcilers::status::{conditions_equal, update_condition_in_memory};

/// Collect-then-apply status updater for an `Image`.
pub struct ImageStatusUpdater {
    namespace: String,
    name: String,
    current_status: Option<ImageStatus>,
    new_status: ImageStatus,
}

impl ImageStatusUpdater {
    /// Create a status updater seeded with the image's current status.
    #[must_use]
    pub fn new(image: &Image) -> Self {
        let current_status = image.status.clone();
        let new_status = current_status.clone().unwrap_or_default();

        Self {
            namespace: image.namespace().unwrap_or_default(),
            name: image.name_any(),
            current_status,
            new_status,
        }
    }

    /// Update or add a condition (in-memory only, no API call).
    pub fn set_condition(
        &mut self,
        condition_type: &str,
        status: &str,
        reason: &str,
        message: &str,
    ) {
        update_condition_in_memory(
            &mut self.new_status.conditions,
            condition_type,
            status,
            reason,
            message,
        );
    }

    /// Set the observed generation to match the current generation.
    pub fn set_observed_generation(&mut self, generation: Option<i64>) {
        self.new_status.observed_generation = generation;
    }

    /// Record a newly created build: counter and latest-build reference.
    pub fn record_new_build(&mut self, build_number: i64, build_name: &str) {
        self.new_status.build_counter = Some(build_number);
        self.new_status.latest_build_ref = Some(build_name.to_string());
    }

    /// Surface the latest produced image digest and stack run image.
    pub fn set_latest_artifact(&mut self, image: Option<String>, stack: Option<String>) {
        if image.is_some() {
            self.new_status.latest_image = image;
        }
        if stack.is_some() {
            self.new_status.latest_stack = stack;
        }
    }

    /// Keep the latest-build reference in sync with observed history.
    pub fn set_latest_build_ref(&mut self, build_name: &str) {
        self.new_status.latest_build_ref = Some(build_name.to_string());
    }

    /// Whether the collected status semantically differs from the stored one.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        match &self.current_status {
            None => true, // First status update
            Some(current) => {
                current.observed_generation != self.new_status.observed_generation
                    || current.build_counter != self.new_status.build_counter
                    || current.latest_build_ref != self.new_status.latest_build_ref
                    || current.latest_image != self.new_status.latest_image
                    || current.latest_stack != self.new_status.latest_stack
                    || !conditions_equal(&current.conditions, &self.new_status.conditions)
            }
        }
    }

    /// The conditions collected so far (for tests).
    #[cfg(test)]
    #[must_use]
    pub fn conditions(&self) -> &Vec<crate::crd::Condition> {
        &self.new_status.conditions
    }

    /// Apply the collected changes in a single API call.
    ///
    /// Skips the call entirely when nothing changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the Kubernetes API call fails.
    pub async fn apply(&self, client: &Client) -> Result<()> {
        if !self.has_changes() {
            debug!(
                "Image {}/{} status unchanged, skipping update",
                self.namespace, self.name
            );
            return Ok(());
        }

        let api: Api<Image> = Api::namespaced(client.clone(), &self.namespace);
        let patch = json!({ "status": self.new_status });
        api.patch_status(&self.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;

        debug!(
            "Updated Image {}/{} status: {} condition(s), build counter {:?}",
            self.namespace,
            self.name,
            self.new_status.conditions.len(),
            self.new_status.build_counter
        );

        Ok(())
    }
}

#[cfg(test)]
#[path = "status_helpers_tests.rs"]
mod status_helpers_tests;
