// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for reconciler helpers

#[cfg(test)]
mod tests {
    use super::super::{should_reconcile, status_changed};

    /// Spec changes and first reconciles need work; matched generations do not
    #[test]
    fn test_should_reconcile() {
        assert!(should_reconcile(Some(2), Some(1)), "spec changed");
        assert!(should_reconcile(Some(1), None), "first reconciliation");
        assert!(!should_reconcile(Some(3), Some(3)), "status is current");
        assert!(!should_reconcile(None, None), "no generation tracking");
    }

    /// Status writes are gated on actual value changes
    #[test]
    fn test_status_changed() {
        assert!(status_changed(&Some(1), &Some(2)));
        assert!(status_changed(&None, &Some(1)));
        assert!(!status_changed(&Some("same"), &Some("same")));
        assert!(!status_changed::<i64>(&None, &None));
    }
}
