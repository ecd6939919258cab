//! Primary vs. fallback XP verification.
//!
//! The store-side aggregate function and the direct-read fallback are two
//! independently maintained implementations of [`crate::sources::total_xp`].
//! When both run for the same user over the same rows they must agree to
//! the unit. A disagreement produces an [`XpMismatch`].

use studyquest_types::UserId;

use crate::XpMismatch;

/// Outcome of comparing the two computations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XpConsistency {
    /// Both paths produced the same total.
    Consistent(i64),
    /// The paths disagree.
    Mismatch(XpMismatch),
}

/// Compare a primary and a fallback total for one user.
pub fn verify_consistency(user_id: UserId, primary: i64, fallback: i64) -> XpConsistency {
    if primary == fallback {
        return XpConsistency::Consistent(primary);
    }

    tracing::warn!(
        %user_id,
        primary,
        fallback,
        "XP aggregation paths disagree"
    );

    XpConsistency::Mismatch(XpMismatch {
        user_id,
        primary,
        fallback,
        message: format!(
            "XP_MISMATCH for user {user_id}: calculate_xp returned {primary}, source reads give {fallback}",
        ),
    })
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn equal_totals_are_consistent() {
        let user = UserId::new();
        assert_eq!(verify_consistency(user, 540, 540), XpConsistency::Consistent(540));
    }

    #[test]
    fn differing_totals_report_both_values() {
        let user = UserId::new();
        match verify_consistency(user, 540, 440) {
            XpConsistency::Mismatch(mismatch) => {
                assert_eq!(mismatch.user_id, user);
                assert_eq!(mismatch.primary, 540);
                assert_eq!(mismatch.fallback, 440);
                assert!(mismatch.message.contains("XP_MISMATCH"));
            }
            XpConsistency::Consistent(_) => panic!("expected a mismatch"),
        }
    }
}
