//! XP aggregation: recompute a user's total from its sources.
//!
//! A recompute never adjusts a stored total incrementally. It derives the
//! total fresh and overwrites the record, so repeated or concurrent
//! recomputes converge on the same value.
//!
//! Phases:
//!
//! ```text
//! Idle -> Computing -> Committed
//!                   -> FallbackComputing -> Committed
//!                                        -> Failed
//!                   -> Computing         (sources moved under the write)
//!                   -> Failed            (mismatch, write failure)
//! ```
//!
//! The primary path is the store's `calculate_xp` function, read in the same
//! snapshot as the three sources. When that is unavailable the aggregator
//! reads the sources directly and applies [`studyquest_xp::total_xp`],
//! exactly once. With cross-checking on, a successful primary is also
//! compared against the snapshot's sources and a disagreement aborts the
//! recompute without writing anything.
//!
//! The write carries the sources the total was computed from. If the store
//! finds them moved, a participation landed mid-recompute and the total is
//! derived again, so a stale total never overwrites a fresher one.
//! [`XpAggregator::credit_xp`] never joins a recompute that started before
//! the participation it credits.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use studyquest_types::{UserId, XpPath, XpRecord, XpSources};
use studyquest_xp::{XpConsistency, total_xp, verify_consistency};

use crate::error::{GamificationError, StoreError};
use crate::singleflight::SingleFlight;
use crate::store::{GamificationStore, XpWrite};

/// Where a recompute is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecomputePhase {
    /// Not started.
    Idle,
    /// Running the primary aggregate.
    Computing,
    /// Primary unavailable; reading sources directly.
    FallbackComputing,
    /// Total persisted.
    Committed,
    /// Aborted without persisting.
    Failed,
}

/// A committed recompute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecomputeOutcome {
    /// The record as persisted.
    pub record: XpRecord,
    /// Which computation produced the total.
    pub path: XpPath,
    /// Phases visited, in order.
    pub phases: Vec<RecomputePhase>,
}

/// Result of crediting a participation's XP to the user's total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CreditStatus {
    /// The total was recomputed and persisted.
    Credited {
        /// The user's new total.
        total_xp: i64,
        /// Which computation produced it.
        path: XpPath,
    },
    /// The participation is recorded but the total was not updated.
    /// A later recompute picks it up.
    Pending {
        /// Why crediting failed.
        reason: String,
    },
}

type RecomputeResult = Result<RecomputeOutcome, GamificationError>;

/// Recomputes and persists users' XP totals.
#[derive(Debug)]
pub struct XpAggregator<S> {
    store: Arc<S>,
    flights: Arc<SingleFlight<UserId, RecomputeResult>>,
    cross_check: bool,
}

impl<S> Clone for XpAggregator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            flights: Arc::clone(&self.flights),
            cross_check: self.cross_check,
        }
    }
}

impl<S: GamificationStore> XpAggregator<S> {
    /// Create an aggregator over a shared store.
    pub fn new(store: Arc<S>, cross_check: bool) -> Self {
        Self {
            store,
            flights: Arc::new(SingleFlight::new()),
            cross_check,
        }
    }

    /// Recompute and persist a user's total.
    ///
    /// Concurrent calls for the same user share one computation.
    ///
    /// # Errors
    ///
    /// - [`GamificationError::TransientStore`] if both paths fail, the
    ///   write fails, or the sources keep moving under the write.
    /// - [`GamificationError::AggregationMismatch`] if cross-checking is on
    ///   and the two paths disagree.
    pub async fn recompute(&self, user_id: UserId, now: DateTime<Utc>) -> RecomputeResult {
        let store = Arc::clone(&self.store);
        let cross_check = self.cross_check;
        let flight = self
            .flights
            .run(user_id, move || recompute_once(store, user_id, cross_check, now))
            .await;
        if flight.joined {
            tracing::debug!(%user_id, "joined in-flight XP recompute");
        }
        flight.value.unwrap_or_else(|err| Err(err.into()))
    }

    /// Credit a freshly recorded participation.
    ///
    /// Always starts a new recompute so the total reflects the participation
    /// just written, never a read taken before it. Never fails: a recompute
    /// error is reported as [`CreditStatus::Pending`] and the participation
    /// stays recorded.
    pub async fn credit_xp(&self, user_id: UserId, xp_earned: i64, now: DateTime<Utc>) -> CreditStatus {
        let store = Arc::clone(&self.store);
        let cross_check = self.cross_check;
        let result = self
            .flights
            .run_fresh(user_id, move || recompute_once(store, user_id, cross_check, now))
            .await
            .value
            .unwrap_or_else(|err| Err(err.into()));

        match result {
            Ok(outcome) => {
                tracing::info!(
                    %user_id,
                    xp_earned,
                    total_xp = outcome.record.total_xp,
                    path = ?outcome.path,
                    "XP credited"
                );
                CreditStatus::Credited {
                    total_xp: outcome.record.total_xp,
                    path: outcome.path,
                }
            }
            Err(err) => {
                tracing::warn!(%user_id, xp_earned, error = %err, "XP scored but not credited");
                CreditStatus::Pending {
                    reason: err.to_string(),
                }
            }
        }
    }
}

/// Attempts at a recompute whose write found the sources moved.
const MAX_WRITE_ATTEMPTS: u32 = 3;

/// A computed total and the sources it was computed from.
struct Computed {
    total: i64,
    path: XpPath,
    basis: Option<XpSources>,
}

fn sum_sources(user_id: UserId, sources: &XpSources) -> Result<i64, GamificationError> {
    total_xp(sources).map_err(|err| GamificationError::Corrupt(format!("XP sources for {user_id}: {err}")))
}

async fn compute_total<S: GamificationStore>(
    store: &S,
    user_id: UserId,
    cross_check: bool,
    phases: &mut Vec<RecomputePhase>,
) -> Result<Computed, GamificationError> {
    let snapshot = match store.read_xp_snapshot(user_id).await {
        Ok(snapshot) => snapshot,
        Err(StoreError::Unavailable(reason)) => {
            tracing::warn!(%user_id, %reason, "calculate_xp unavailable, reading sources directly");
            phases.push(RecomputePhase::FallbackComputing);
            let fallback = match store.read_xp_sources(user_id).await {
                Ok(sources) => sum_sources(user_id, &sources).map(|total| (total, sources)),
                Err(StoreError::Corrupt(msg)) => Err(GamificationError::Corrupt(msg)),
                Err(err) => Err(GamificationError::TransientStore(err.to_string())),
            };
            return fallback
                .map(|(total, sources)| Computed {
                    total,
                    path: XpPath::Fallback,
                    basis: Some(sources),
                })
                .inspect_err(|err| tracing::error!(%user_id, error = %err, "XP fallback failed"));
        }
        Err(err) => {
            tracing::error!(%user_id, error = %err, "calculate_xp failed");
            return Err(err.into());
        }
    };

    let sources = match snapshot.sources {
        Ok(sources) => sources,
        Err(err) => {
            tracing::warn!(%user_id, error = %err, "XP sources unreadable, writing the primary unverified");
            return Ok(Computed {
                total: snapshot.primary,
                path: XpPath::Primary,
                basis: None,
            });
        }
    };

    if cross_check {
        let fallback = sum_sources(user_id, &sources)?;
        if let XpConsistency::Mismatch(mismatch) = verify_consistency(user_id, snapshot.primary, fallback) {
            tracing::error!(%user_id, "{}", mismatch.message);
            return Err(GamificationError::AggregationMismatch {
                user_id,
                primary: mismatch.primary,
                fallback: mismatch.fallback,
            });
        }
    }

    Ok(Computed {
        total: snapshot.primary,
        path: XpPath::Primary,
        basis: Some(sources),
    })
}

async fn recompute_once<S: GamificationStore>(
    store: Arc<S>,
    user_id: UserId,
    cross_check: bool,
    now: DateTime<Utc>,
) -> RecomputeResult {
    let mut phases = vec![RecomputePhase::Idle];

    for attempt in 1..=MAX_WRITE_ATTEMPTS {
        phases.push(RecomputePhase::Computing);
        let computed = match compute_total(&*store, user_id, cross_check, &mut phases).await {
            Ok(computed) => computed,
            Err(err) => {
                phases.push(RecomputePhase::Failed);
                tracing::debug!(%user_id, phases = ?phases, "XP recompute failed");
                return Err(err);
            }
        };

        match store
            .upsert_xp_record(user_id, computed.total, computed.basis, now)
            .await
        {
            Ok(XpWrite::Committed(record)) => {
                phases.push(RecomputePhase::Committed);
                tracing::debug!(%user_id, total = computed.total, path = ?computed.path, "XP recompute committed");
                return Ok(RecomputeOutcome {
                    record,
                    path: computed.path,
                    phases,
                });
            }
            Ok(XpWrite::SourcesMoved) => {
                tracing::debug!(%user_id, attempt, "XP sources moved during recompute, recomputing");
            }
            Err(err) => {
                phases.push(RecomputePhase::Failed);
                tracing::error!(%user_id, total = computed.total, error = %err, "XP record write failed");
                return Err(err.into());
            }
        }
    }

    phases.push(RecomputePhase::Failed);
    tracing::warn!(%user_id, phases = ?phases, "XP sources kept moving, recompute abandoned");
    Err(GamificationError::TransientStore(format!(
        "XP sources for {user_id} kept changing during recompute"
    )))
}
