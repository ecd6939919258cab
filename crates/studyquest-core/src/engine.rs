//! The [`Gamification`] facade: the operations the surrounding application
//! calls, wired over one shared store.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use studyquest_types::{
    Countdown, Event, EventFilter, EventId, EventStatus, Leaderboard, LevelProgress,
    ParticipationId, UserId, UserRank,
};
use studyquest_xp::level_progress;

use crate::aggregator::{CreditStatus, RecomputeOutcome, XpAggregator};
use crate::config::GamificationConfig;
use crate::error::GamificationError;
use crate::leaderboard::LeaderboardRanker;
use crate::lifecycle::{LifecycleManager, RefreshReport, countdown};
use crate::participation::{ParticipationLedger, Submission};
use crate::store::GamificationStore;

/// An event together with its client-side countdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventView {
    /// The event, with status refreshed.
    #[serde(flatten)]
    pub event: Event,
    /// Time to the next phase boundary.
    pub countdown: Countdown,
}

impl EventView {
    fn at(event: Event, now: DateTime<Utc>) -> Self {
        let countdown = countdown(&event, now);
        Self { event, countdown }
    }
}

/// What a successful submission reports back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionOutcome {
    /// The recorded participation.
    pub participation_id: ParticipationId,
    /// The event attempted.
    pub event_id: EventId,
    /// The submitting user.
    pub user_id: UserId,
    /// Correct answers.
    pub score: u32,
    /// Questions in the event.
    pub total_questions: u32,
    /// XP the attempt earned.
    pub xp_earned: i64,
    /// Whether that XP reached the user's total.
    pub credit: CreditStatus,
}

/// The gamification engine.
#[derive(Debug)]
pub struct Gamification<S> {
    store: Arc<S>,
    lifecycle: LifecycleManager<S>,
    ledger: ParticipationLedger<S>,
    aggregator: XpAggregator<S>,
    ranker: LeaderboardRanker<S>,
    config: GamificationConfig,
}

impl<S: GamificationStore> Gamification<S> {
    /// Wire every service over `store`.
    pub fn new(store: Arc<S>, config: GamificationConfig) -> Self {
        let aggregator = XpAggregator::new(Arc::clone(&store), config.xp.cross_check);
        let ranker = LeaderboardRanker::new(
            Arc::clone(&store),
            aggregator.clone(),
            config.leaderboard.clone(),
        );
        Self {
            lifecycle: LifecycleManager::new(Arc::clone(&store)),
            ledger: ParticipationLedger::new(Arc::clone(&store)),
            aggregator,
            ranker,
            store,
            config,
        }
    }

    /// The configuration this engine was built with.
    pub const fn config(&self) -> &GamificationConfig {
        &self.config
    }

    /// The underlying store.
    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }

    // -- Events -------------------------------------------------------------

    /// List events, refreshing every status first.
    ///
    /// # Errors
    ///
    /// Returns [`GamificationError::TransientStore`] on store failure.
    pub async fn list_events(
        &self,
        filter: EventFilter,
        now: DateTime<Utc>,
    ) -> Result<Vec<EventView>, GamificationError> {
        let events = self.lifecycle.list(filter, now).await?;
        Ok(events.into_iter().map(|e| EventView::at(e, now)).collect())
    }

    /// One event with a freshly derived status.
    ///
    /// # Errors
    ///
    /// Returns [`GamificationError::NotFound`] for an unknown event, or
    /// [`GamificationError::TransientStore`] on store failure.
    pub async fn get_event(
        &self,
        event_id: EventId,
        now: DateTime<Utc>,
    ) -> Result<EventView, GamificationError> {
        let event = self.lifecycle.get(event_id, now).await?;
        Ok(EventView::at(event, now))
    }

    /// Administrative status override.
    ///
    /// # Errors
    ///
    /// Returns [`GamificationError::NotFound`] for an unknown event, or
    /// [`GamificationError::TransientStore`] on store failure.
    pub async fn override_status(
        &self,
        event_id: EventId,
        status: EventStatus,
        now: DateTime<Utc>,
    ) -> Result<EventView, GamificationError> {
        let event = self.lifecycle.override_status(event_id, status, now).await?;
        Ok(EventView::at(event, now))
    }

    /// Flip an event's kill switch.
    ///
    /// # Errors
    ///
    /// Returns [`GamificationError::NotFound`] for an unknown event, or
    /// [`GamificationError::TransientStore`] on store failure.
    pub async fn set_enabled(
        &self,
        event_id: EventId,
        enabled: bool,
        now: DateTime<Utc>,
    ) -> Result<EventView, GamificationError> {
        let event = self.lifecycle.set_enabled(event_id, enabled, now).await?;
        Ok(EventView::at(event, now))
    }

    /// Write back every drifted event status.
    ///
    /// # Errors
    ///
    /// Returns [`GamificationError::TransientStore`] on store failure.
    pub async fn refresh_statuses(&self, now: DateTime<Utc>) -> Result<RefreshReport, GamificationError> {
        self.lifecycle.refresh_all(now).await
    }

    // -- Participations -----------------------------------------------------

    /// Whether the user has already attempted the event.
    ///
    /// # Errors
    ///
    /// Returns [`GamificationError::TransientStore`] on store failure.
    pub async fn has_participated(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<bool, GamificationError> {
        self.ledger.has_participated(event_id, user_id).await
    }

    /// Record a submission, then credit its XP.
    ///
    /// Once the participation row is written the call succeeds; a failed
    /// credit is reported in [`SubmissionOutcome::credit`].
    ///
    /// # Errors
    ///
    /// Whatever [`ParticipationLedger::submit`] returns.
    pub async fn submit_participation(
        &self,
        submission: &Submission,
        now: DateTime<Utc>,
    ) -> Result<SubmissionOutcome, GamificationError> {
        let participation = self.ledger.submit(submission, now).await?;
        let credit = self
            .aggregator
            .credit_xp(participation.user_id, participation.xp_earned, now)
            .await;

        Ok(SubmissionOutcome {
            participation_id: participation.id,
            event_id: participation.event_id,
            user_id: participation.user_id,
            score: participation.score,
            total_questions: participation.total_questions,
            xp_earned: participation.xp_earned,
            credit,
        })
    }

    // -- XP -----------------------------------------------------------------

    /// Recompute and persist a user's total.
    ///
    /// # Errors
    ///
    /// See [`XpAggregator::recompute`].
    pub async fn recompute_xp(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<RecomputeOutcome, GamificationError> {
        self.aggregator.recompute(user_id, now).await
    }

    /// Level breakdown of a user's persisted total.
    ///
    /// # Errors
    ///
    /// Returns [`GamificationError::TransientStore`] on store failure.
    pub async fn get_user_level(&self, user_id: UserId) -> Result<LevelProgress, GamificationError> {
        let total = self
            .store
            .get_xp_record(user_id)
            .await?
            .map_or(0, |record| record.total_xp);
        Ok(level_progress(total))
    }

    // -- Leaderboard --------------------------------------------------------

    /// Top-N leaderboard; degrades to an empty, flagged board on failure.
    pub async fn get_leaderboard(
        &self,
        limit: Option<usize>,
        viewer: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Leaderboard {
        self.ranker.leaderboard_or_empty(limit, viewer, now).await
    }

    /// A user's rank.
    ///
    /// # Errors
    ///
    /// Returns [`GamificationError::TransientStore`] on store failure.
    pub async fn get_user_rank(&self, user_id: UserId) -> Result<UserRank, GamificationError> {
        self.ranker.rank_of(user_id).await
    }
}

/// Refresh event statuses every `period` until the task is dropped.
///
/// Failures are logged and the loop keeps going.
pub async fn run_status_refresh<S: GamificationStore>(
    engine: Arc<Gamification<S>>,
    period: core::time::Duration,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if let Err(err) = engine.refresh_statuses(Utc::now()).await {
            tracing::warn!(error = %err, "background status refresh failed");
        }
    }
}
