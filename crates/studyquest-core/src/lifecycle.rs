//! Event lifecycle: status derivation, write-back, and the action gate.
//!
//! An event's persisted `status` is a cache of
//! `(start_time, duration_minutes, is_enabled, now)`. [`compute_status`]
//! is the single source of truth; [`LifecycleManager::refresh_all`] writes
//! it back, and [`ensure_active`] re-derives it at the
//! moment of any action that requires an open event.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use studyquest_types::{Countdown, Event, EventFilter, EventId, EventStatus};

use crate::error::{GamificationError, ValidationError};
use crate::store::GamificationStore;

/// The instant an event's window closes.
///
/// `None` only when the end would not fit in a timestamp, which callers
/// treat as "never closes".
pub fn window_end(event: &Event) -> Option<DateTime<Utc>> {
    event
        .start_time
        .checked_add_signed(Duration::minutes(i64::from(event.duration_minutes)))
}

/// Derive an event's status from its schedule and kill switch.
///
/// Deterministic: the same event and `now` always give the same status.
pub fn compute_status(event: &Event, now: DateTime<Utc>) -> EventStatus {
    if now < event.start_time {
        return EventStatus::Upcoming;
    }
    let in_window = window_end(event).is_none_or(|end| now < end);
    if in_window && event.is_enabled {
        EventStatus::Active
    } else {
        EventStatus::Finished
    }
}

/// Time remaining until the next phase boundary, for client timers.
pub fn countdown(event: &Event, now: DateTime<Utc>) -> Countdown {
    match compute_status(event, now) {
        EventStatus::Upcoming => {
            Countdown::StartsIn(event.start_time.signed_duration_since(now).num_seconds())
        }
        EventStatus::Active => window_end(event).map_or(Countdown::EndsIn(i64::MAX), |end| {
            Countdown::EndsIn(end.signed_duration_since(now).num_seconds())
        }),
        EventStatus::Finished => Countdown::Over,
    }
}

/// Gate an action on the event being open right now.
///
/// Ignores the cached `status` field entirely.
///
/// # Errors
///
/// Returns [`ValidationError::EventNotActive`] if the event is upcoming,
/// closed, or disabled.
pub fn ensure_active(event: &Event, now: DateTime<Utc>) -> Result<(), ValidationError> {
    match compute_status(event, now) {
        EventStatus::Active => Ok(()),
        status => Err(ValidationError::EventNotActive {
            event_id: event.id,
            status,
        }),
    }
}

/// Whether an event belongs in a listing under `filter`.
pub fn matches_filter(event: &Event, filter: EventFilter) -> bool {
    match filter {
        EventFilter::All => true,
        EventFilter::ActiveOnly => event.status == EventStatus::Active && event.is_enabled,
    }
}

/// Result of one [`LifecycleManager::refresh_all`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    /// Events looked at.
    pub examined: usize,
    /// Events whose persisted status was rewritten.
    pub updated: usize,
}

/// Keeps persisted event statuses in line with the clock.
#[derive(Debug)]
pub struct LifecycleManager<S> {
    store: Arc<S>,
}

impl<S> Clone for LifecycleManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: GamificationStore> LifecycleManager<S> {
    /// Create a manager over a shared store.
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Recompute every event's status and write back the ones that drifted.
    ///
    /// # Errors
    ///
    /// Returns [`GamificationError::TransientStore`] if the catalog cannot
    /// be read or a write-back fails.
    pub async fn refresh_all(&self, now: DateTime<Utc>) -> Result<RefreshReport, GamificationError> {
        let events = self.store.list_events().await?;
        let mut report = RefreshReport {
            examined: events.len(),
            updated: 0,
        };

        for event in &events {
            let derived = compute_status(event, now);
            if derived == event.status {
                continue;
            }
            if self.store.set_event_status(event.id, derived, now).await? {
                report.updated = report.updated.saturating_add(1);
                tracing::info!(
                    event_id = %event.id,
                    from = %event.status,
                    to = %derived,
                    "event status refreshed"
                );
            }
        }

        tracing::debug!(examined = report.examined, updated = report.updated, "status refresh complete");
        Ok(report)
    }

    /// List events, refreshing statuses first.
    ///
    /// # Errors
    ///
    /// Returns [`GamificationError::TransientStore`] on store failure.
    pub async fn list(
        &self,
        filter: EventFilter,
        now: DateTime<Utc>,
    ) -> Result<Vec<Event>, GamificationError> {
        self.refresh_all(now).await?;
        let events = self.store.list_events().await?;
        Ok(events
            .into_iter()
            .filter(|event| matches_filter(event, filter))
            .collect())
    }

    /// Load one event with its status re-derived for `now`.
    ///
    /// A drifted status is written back before returning.
    ///
    /// # Errors
    ///
    /// Returns [`GamificationError::NotFound`] for an unknown event, or
    /// [`GamificationError::TransientStore`] on store failure.
    pub async fn get(&self, event_id: EventId, now: DateTime<Utc>) -> Result<Event, GamificationError> {
        let mut event = self
            .store
            .get_event(event_id)
            .await?
            .ok_or_else(|| GamificationError::NotFound(format!("event {event_id}")))?;

        let derived = compute_status(&event, now);
        if derived != event.status {
            self.store.set_event_status(event_id, derived, now).await?;
            tracing::info!(%event_id, from = %event.status, to = %derived, "event status refreshed");
            event.status = derived;
            event.updated_at = now;
        }
        Ok(event)
    }

    /// Force an event's status without touching its schedule.
    ///
    /// The next refresh may supersede the forced value.
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
    ) -> Result<Event, GamificationError> {
        if !self.store.set_event_status(event_id, status, now).await? {
            return Err(GamificationError::NotFound(format!("event {event_id}")));
        }
        tracing::warn!(%event_id, %status, "event status overridden");
        self.load(event_id).await
    }

    /// Flip an event's kill switch and write back the re-derived status.
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
    ) -> Result<Event, GamificationError> {
        if !self.store.set_event_enabled(event_id, enabled, now).await? {
            return Err(GamificationError::NotFound(format!("event {event_id}")));
        }
        tracing::info!(%event_id, enabled, "event kill switch changed");
        self.get(event_id, now).await
    }

    async fn load(&self, event_id: EventId) -> Result<Event, GamificationError> {
        self.store
            .get_event(event_id)
            .await?
            .ok_or_else(|| GamificationError::NotFound(format!("event {event_id}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::memory::MemoryStore;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap()
    }

    fn event(start: DateTime<Utc>, duration_minutes: u32, is_enabled: bool) -> Event {
        Event {
            id: EventId::new(),
            title: "Quiz".to_owned(),
            description: String::new(),
            category: "math".to_owned(),
            start_time: start,
            duration_minutes,
            xp_reward: 50,
            is_enabled,
            status: EventStatus::Upcoming,
            created_at: start,
            updated_at: start,
        }
    }

    #[test]
    fn status_follows_the_window() {
        let ev = event(t0(), 60, true);
        assert_eq!(compute_status(&ev, t0() - Duration::seconds(1)), EventStatus::Upcoming);
        assert_eq!(compute_status(&ev, t0()), EventStatus::Active);
        assert_eq!(compute_status(&ev, t0() + Duration::minutes(59)), EventStatus::Active);
        assert_eq!(compute_status(&ev, t0() + Duration::minutes(60)), EventStatus::Finished);
    }

    #[test]
    fn status_is_deterministic() {
        let ev = event(t0(), 30, true);
        let now = t0() + Duration::minutes(10);
        assert_eq!(compute_status(&ev, now), compute_status(&ev, now));
    }

    #[test]
    fn kill_switch_closes_an_open_window() {
        let ev = event(t0(), 60, false);
        assert_eq!(compute_status(&ev, t0() + Duration::minutes(5)), EventStatus::Finished);
        // The schedule still governs before the start.
        assert_eq!(compute_status(&ev, t0() - Duration::minutes(5)), EventStatus::Upcoming);
    }

    #[test]
    fn countdown_tracks_phase() {
        let ev = event(t0(), 60, true);
        assert_eq!(countdown(&ev, t0() - Duration::seconds(90)), Countdown::StartsIn(90));
        assert_eq!(countdown(&ev, t0() + Duration::minutes(45)), Countdown::EndsIn(900));
        assert_eq!(countdown(&ev, t0() + Duration::minutes(61)), Countdown::Over);
    }

    #[test]
    fn gate_ignores_stale_cached_status() {
        let mut ev = event(t0(), 60, true);
        ev.status = EventStatus::Active;
        let after = t0() + Duration::minutes(90);
        assert_eq!(
            ensure_active(&ev, after),
            Err(ValidationError::EventNotActive {
                event_id: ev.id,
                status: EventStatus::Finished,
            })
        );
    }

    #[tokio::test]
    async fn refresh_writes_back_only_drifted_rows() {
        let store = Arc::new(MemoryStore::new());
        let open = event(t0(), 60, true);
        let mut settled = event(t0() + Duration::days(1), 60, true);
        settled.status = EventStatus::Upcoming;
        store.insert_event(open.clone()).await;
        store.insert_event(settled).await;

        let manager = LifecycleManager::new(Arc::clone(&store));
        let report = manager.refresh_all(t0() + Duration::minutes(1)).await.unwrap();
        assert_eq!(report, RefreshReport { examined: 2, updated: 1 });

        let again = manager.refresh_all(t0() + Duration::minutes(2)).await.unwrap();
        assert_eq!(again.updated, 0);

        let stored = store.get_event(open.id).await.unwrap().unwrap();
        assert_eq!(stored.status, EventStatus::Active);
    }

    #[tokio::test]
    async fn active_listing_hides_disabled_events() {
        let store = Arc::new(MemoryStore::new());
        let ev = event(t0(), 60, true);
        store.insert_event(ev.clone()).await;
        let manager = LifecycleManager::new(Arc::clone(&store));
        let now = t0() + Duration::minutes(10);

        let active = manager.list(EventFilter::ActiveOnly, now).await.unwrap();
        assert_eq!(active.len(), 1);

        let disabled = manager.set_enabled(ev.id, false, now).await.unwrap();
        assert_eq!(disabled.status, EventStatus::Finished);
        assert!(manager.list(EventFilter::ActiveOnly, now).await.unwrap().is_empty());
        assert_eq!(manager.list(EventFilter::All, now).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn override_holds_until_next_refresh() {
        let store = Arc::new(MemoryStore::new());
        let ev = event(t0(), 60, true);
        store.insert_event(ev.clone()).await;
        let manager = LifecycleManager::new(Arc::clone(&store));
        let now = t0() + Duration::minutes(10);

        let forced = manager
            .override_status(ev.id, EventStatus::Finished, now)
            .await
            .unwrap();
        assert_eq!(forced.status, EventStatus::Finished);

        manager.refresh_all(now).await.unwrap();
        let refreshed = manager.get(ev.id, now).await.unwrap();
        assert_eq!(refreshed.status, EventStatus::Active);
    }

    #[tokio::test]
    async fn unknown_event_is_not_found() {
        let manager = LifecycleManager::new(Arc::new(MemoryStore::new()));
        let err = manager.get(EventId::new(), t0()).await.unwrap_err();
        assert!(matches!(err, GamificationError::NotFound(_)));
    }
}
