//! The level law: every 1000 XP is one level, starting at level 1.

use studyquest_types::LevelProgress;

/// XP required to complete one level.
pub const XP_PER_LEVEL: i64 = 1_000;

/// Break an XP total into level, in-level XP, and percent progress.
///
/// Negative totals are treated as zero.
pub fn level_progress(total_xp: i64) -> LevelProgress {
    let xp = total_xp.max(0);
    let completed_levels = xp.div_euclid(XP_PER_LEVEL);
    let current_xp = xp.rem_euclid(XP_PER_LEVEL);
    // current_xp < 1000, so the product cannot overflow.
    let progress_percent = current_xp.saturating_mul(100).div_euclid(XP_PER_LEVEL);

    LevelProgress {
        level: completed_levels.saturating_add(1),
        current_xp,
        required_xp: XP_PER_LEVEL,
        progress_percent,
    }
}

/// Just the level number for an XP total.
pub fn level_of(total_xp: i64) -> i64 {
    level_progress(total_xp).level
}
