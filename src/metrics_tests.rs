// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `metrics.rs`

#[cfg(test)]
mod tests {
    use super::super::{
        gather_metrics, record_build_created, record_keychain_cache_hit, record_reconciliation,
    };
    use std::time::Duration;

    /// Recorded metrics show up in the text exposition
    #[test]
    fn test_gather_includes_recorded_metrics() {
        record_reconciliation("Image", "success", Duration::from_millis(42));
        record_build_created();
        record_keychain_cache_hit();

        let output = gather_metrics().unwrap();

        assert!(output.contains("kiln_firestoned_io_reconciliations_total"));
        assert!(output.contains("kiln_firestoned_io_builds_created_total"));
        assert!(output.contains("kiln_firestoned_io_keychain_cache_lookups_total"));
    }

    /// Reconciliation metrics carry resource type and status labels
    #[test]
    fn test_reconciliation_labels() {
        record_reconciliation("Builder", "error", Duration::from_millis(7));

        let output = gather_metrics().unwrap();
        assert!(output.contains("resource_type=\"Builder\""));
        assert!(output.contains("status=\"error\""));
    }
}
