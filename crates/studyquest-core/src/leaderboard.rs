//! Leaderboard reads over persisted XP totals.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use studyquest_types::{Leaderboard, UserId, UserRank};
use studyquest_xp::{level_progress, rank_records};

use crate::aggregator::XpAggregator;
use crate::config::LeaderboardConfig;
use crate::error::GamificationError;
use crate::store::GamificationStore;

/// Produces Top-N lists and per-user ranks.
#[derive(Debug)]
pub struct LeaderboardRanker<S> {
    store: Arc<S>,
    aggregator: XpAggregator<S>,
    config: LeaderboardConfig,
}

impl<S> Clone for LeaderboardRanker<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            aggregator: self.aggregator.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S: GamificationStore> LeaderboardRanker<S> {
    /// Create a ranker. The aggregator is used only for bootstrap.
    pub const fn new(store: Arc<S>, aggregator: XpAggregator<S>, config: LeaderboardConfig) -> Self {
        Self {
            store,
            aggregator,
            config,
        }
    }

    /// The effective limit for a request.
    pub fn clamp_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.config.default_limit)
            .min(self.config.max_limit)
    }

    /// The Top-N leaderboard.
    ///
    /// When nothing is ranked and no XP record exists at all, the viewer's
    /// total is recomputed once and the query retried once. A failed
    /// bootstrap recompute is logged and the retry still happens.
    ///
    /// # Errors
    ///
    /// Returns [`GamificationError::TransientStore`] on store failure.
    pub async fn top_n(
        &self,
        limit: Option<usize>,
        viewer: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Result<Leaderboard, GamificationError> {
        let limit = self.clamp_limit(limit);
        let mut records = self.store.top_xp_records(limit).await?;

        let bootstrap_viewer = viewer.filter(|_| records.is_empty() && self.config.bootstrap_on_empty);
        if let Some(viewer) = bootstrap_viewer {
            if self.store.count_xp_records().await? == 0 {
                tracing::info!(user_id = %viewer, "leaderboard empty, bootstrapping viewer XP");
                if let Err(err) = self.aggregator.recompute(viewer, now).await {
                    tracing::warn!(user_id = %viewer, error = %err, "leaderboard bootstrap recompute failed");
                }
                records = self.store.top_xp_records(limit).await?;
            }
        }

        Ok(Leaderboard {
            entries: rank_records(records, limit),
            degraded: false,
        })
    }

    /// [`top_n`](Self::top_n), degrading to an empty board on failure.
    pub async fn leaderboard_or_empty(
        &self,
        limit: Option<usize>,
        viewer: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Leaderboard {
        match self.top_n(limit, viewer, now).await {
            Ok(board) => board,
            Err(err) => {
                tracing::warn!(error = %err, "leaderboard unavailable, serving empty board");
                Leaderboard {
                    entries: Vec::new(),
                    degraded: true,
                }
            }
        }
    }

    /// A user's rank, computed without building a Top-N list.
    ///
    /// Users without a record, or with zero XP, rank after every user who
    /// has XP.
    ///
    /// # Errors
    ///
    /// Returns [`GamificationError::TransientStore`] on store failure.
    pub async fn rank_of(&self, user_id: UserId) -> Result<UserRank, GamificationError> {
        let record = self.store.get_xp_record(user_id).await?;
        let ahead = self.store.count_ranked_ahead(record.as_ref()).await?;
        let total_xp = record.map_or(0, |r| r.total_xp);

        Ok(UserRank {
            user_id,
            rank: ahead.saturating_add(1),
            total_xp,
            level: level_progress(total_xp),
        })
    }
}
