//! The three-source XP total rule.
//!
//! The store-side `calculate_xp` function (see the `studyquest-db`
//! migrations) mirrors this rule in SQL. Any change here must be made
//! there in the same release; the consistency check catches drift.

use studyquest_types::XpSources;

use crate::XpError;

/// XP granted for each completed day in a current study plan.
pub const XP_PER_COMPLETED_DAY: i64 = 100;

/// Sum a user's XP sources into a single total.
///
/// All inputs must be non-negative; overflow is reported rather than
/// wrapped.
pub fn total_xp(sources: &XpSources) -> Result<i64, XpError> {
    for (field, value) in [
        ("event_xp", sources.event_xp),
        ("archived_plan_xp", sources.archived_plan_xp),
        ("active_plan_completed_days", sources.active_plan_completed_days),
    ] {
        if value < 0 {
            return Err(XpError::Negative { field, value });
        }
    }

    let day_xp = sources
        .active_plan_completed_days
        .checked_mul(XP_PER_COMPLETED_DAY)
        .ok_or(XpError::Overflow("active plan XP"))?;

    sources
        .event_xp
        .checked_add(sources.archived_plan_xp)
        .and_then(|sum| sum.checked_add(day_xp))
        .ok_or(XpError::Overflow("total XP"))
}
