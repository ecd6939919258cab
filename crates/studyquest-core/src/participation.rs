//! The participation ledger: one scored attempt per `(event, user)`.
//!
//! The store's uniqueness constraint is the only authoritative guard
//! against double submission. The `has_participated` check in
//! [`ParticipationLedger::submit`] is a fast-fail that saves scoring work;
//! concurrent submissions that all pass it still race on the insert, and
//! exactly one wins.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use studyquest_types::{Answer, EventId, Participation, UserId};
use studyquest_xp::{score_answers, validate_answers, xp_for_score};

use crate::error::{GamificationError, StoreError, ValidationError};
use crate::lifecycle::ensure_active;
use crate::store::{GamificationStore, NewParticipation};

/// A user's answer sheet for one event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Submission {
    /// The event being attempted.
    pub event_id: EventId,
    /// The submitting user.
    pub user_id: UserId,
    /// One answer per question, in question order.
    pub answers: Vec<Answer>,
    /// Self-reported time spent.
    pub time_taken_minutes: u32,
}

/// Records participations and scores them.
#[derive(Debug)]
pub struct ParticipationLedger<S> {
    store: Arc<S>,
}

impl<S> Clone for ParticipationLedger<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: GamificationStore> ParticipationLedger<S> {
    /// Create a ledger over a shared store.
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Whether the user already has a participation for the event.
    ///
    /// Advisory only; [`submit`](Self::submit) does not rely on it.
    ///
    /// # Errors
    ///
    /// Returns [`GamificationError::TransientStore`] on store failure.
    pub async fn has_participated(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<bool, GamificationError> {
        Ok(self.store.has_participated(event_id, user_id).await?)
    }

    /// Validate, score, and record a submission.
    ///
    /// The returned row carries the score and the XP earned. Crediting that
    /// XP to the user's total is a separate step.
    ///
    /// # Errors
    ///
    /// - [`GamificationError::NotFound`] if the event does not exist.
    /// - [`GamificationError::Validation`] if the event is not open at
    ///   `now` or the answers do not fit its questions.
    /// - [`GamificationError::AlreadyParticipated`] if a row for the pair
    ///   exists, including one written concurrently.
    /// - [`GamificationError::TransientStore`] on store failure.
    pub async fn submit(
        &self,
        submission: &Submission,
        now: DateTime<Utc>,
    ) -> Result<Participation, GamificationError> {
        let Submission {
            event_id,
            user_id,
            ..
        } = *submission;

        let event = self
            .store
            .get_event(event_id)
            .await?
            .ok_or_else(|| GamificationError::NotFound(format!("event {event_id}")))?;
        ensure_active(&event, now)?;

        let questions = self.store.get_questions(event_id).await?;
        validate_answers(&questions, &submission.answers).map_err(ValidationError::from)?;

        if self.store.has_participated(event_id, user_id).await? {
            return Err(GamificationError::AlreadyParticipated { event_id, user_id });
        }

        let score = score_answers(&questions, &submission.answers);
        let total_questions = u32::try_from(questions.len())
            .map_err(|e| GamificationError::Corrupt(format!("event {event_id} question count: {e}")))?;
        let xp_earned =
            xp_for_score(score, total_questions, event.xp_reward).map_err(ValidationError::from)?;

        let row = NewParticipation {
            event_id,
            user_id,
            answers: submission.answers.clone(),
            score,
            total_questions,
            time_taken_minutes: submission.time_taken_minutes,
            xp_earned,
            completed_at: now,
        };

        match self.store.insert_participation(row).await {
            Ok(participation) => {
                tracing::info!(
                    %event_id,
                    %user_id,
                    score,
                    total_questions,
                    xp_earned,
                    "participation recorded"
                );
                Ok(participation)
            }
            Err(StoreError::UniqueViolation(_)) => {
                tracing::debug!(%event_id, %user_id, "duplicate participation rejected by store");
                Err(GamificationError::AlreadyParticipated { event_id, user_id })
            }
            Err(other) => Err(other.into()),
        }
    }
}
