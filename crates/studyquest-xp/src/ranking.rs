//! Leaderboard ordering and rank assignment.
//!
//! The total order is: `total_xp` descending, then `updated_at` ascending
//! (the earlier achiever of a total ranks higher), then `user_id`
//! ascending so that no two records ever compare equal. Top-N listings
//! and per-user rank lookups both use this order, which keeps a user's
//! looked-up rank equal to their listed position.

use core::cmp::Ordering;

use studyquest_types::{LeaderboardEntry, XpRecord};

use crate::level::level_of;

/// Compare two records in leaderboard order (`Less` ranks higher).
pub fn leaderboard_order(a: &XpRecord, b: &XpRecord) -> Ordering {
    b.total_xp
        .cmp(&a.total_xp)
        .then_with(|| a.updated_at.cmp(&b.updated_at))
        .then_with(|| a.user_id.cmp(&b.user_id))
}

/// Whether `candidate` ranks strictly ahead of `target`.
pub fn ranks_ahead(candidate: &XpRecord, target: &XpRecord) -> bool {
    leaderboard_order(candidate, target) == Ordering::Less
}

/// Whether a record appears on the leaderboard at all.
pub const fn is_ranked(record: &XpRecord) -> bool {
    record.total_xp > 0
}

/// Turn records into a ranked Top-N list.
///
/// Records with no XP are dropped, the rest are sorted into leaderboard
/// order, truncated to `limit`, and assigned 1-based ranks by position.
pub fn rank_records(mut records: Vec<XpRecord>, limit: usize) -> Vec<LeaderboardEntry> {
    records.retain(is_ranked);
    records.sort_by(leaderboard_order);
    records
        .into_iter()
        .take(limit)
        .zip(1_u32..)
        .map(|(record, rank)| LeaderboardEntry {
            rank,
            level: level_of(record.total_xp),
            user_id: record.user_id,
            username: record.username,
            total_xp: record.total_xp,
            updated_at: record.updated_at,
        })
        .collect()
}

/// Rank of `target` among `records`, computed without building a list.
///
/// A ranked target sits behind every record that [`ranks_ahead`] of it.
/// A missing or zero-XP target sits behind every ranked record.
pub fn rank_among<'a>(
    target: Option<&XpRecord>,
    records: impl IntoIterator<Item = &'a XpRecord>,
) -> u64 {
    let ahead = records
        .into_iter()
        .filter(|other| match target {
            Some(t) if is_ranked(t) => other.user_id != t.user_id && ranks_ahead(other, t),
            _ => is_ranked(other),
        })
        .count();
    u64::try_from(ahead).unwrap_or(u64::MAX).saturating_add(1)
}
