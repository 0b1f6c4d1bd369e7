//! Unlock engine: persistence, housekeeping and enforcement around the pure
//! derivation in [`crate::unlock`].
//!
//! The engine owns no timer and no thread. Every call loads the persisted
//! aggregates, brings them up to date for the supplied `now`, applies the
//! requested change, saves what changed and pushes the enforcement directive
//! only if it flipped since the last successful push.
//!
//! Mutations take `&mut self`, so one engine is one writer. Hosts that share
//! an engine between callers wrap it in [`SharedEngine`].

use std::collections::BTreeSet;
use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::enforcement::EnforcementGateway;
use crate::error::{CoreError, GatewayError, Result, UnlockError};
use crate::events::Event;
use crate::plan::PlanResolver;
use crate::registry::BlockedAppSet;
use crate::storage::{keys, load_json, store_json, Config, EmergencyDefaults, KeyValueStore};
use crate::unlock::{
    derive, Directive, EmergencyMinutes, EmergencyUnlockState, UnlockInputs, UnlockSession,
    UnlockView, WorkoutInProgress,
};
use crate::workout::{WorkoutMode, WorkoutTable};

/// Engine parameters resolved from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub grace_period_secs: u64,
    pub earning_timeout_secs: u64,
    pub workouts: WorkoutTable,
    pub emergency_defaults: EmergencyDefaults,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            grace_period_secs: config.unlock.grace_period_secs,
            earning_timeout_secs: config.unlock.earning_timeout_secs,
            workouts: config.workouts.clone(),
            emergency_defaults: config.emergency.clone(),
        }
    }
}

/// Everything a caller needs to render the current state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnlockSnapshot {
    #[serde(flatten)]
    pub view: UnlockView,
    pub session: Option<UnlockSession>,
    pub workout: Option<WorkoutInProgress>,
    pub emergency_enabled: bool,
    pub emergency_minutes: EmergencyMinutes,
    pub uses_remaining_today: u32,
    pub max_uses_per_day: u32,
    pub quota_resets_on: NaiveDate,
    pub blocked_apps: usize,
    /// The gateway refused or lost permission; apps may not actually be blocked.
    pub setup_required: bool,
    pub clock_anomaly: bool,
    pub at: DateTime<Utc>,
}

/// Result of a mutating call.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub snapshot: UnlockSnapshot,
    pub events: Vec<Event>,
    #[serde(skip)]
    pub enforcement_error: Option<UnlockError>,
}

#[derive(Debug, Clone, PartialEq)]
struct Persisted {
    apps: BlockedAppSet,
    session: Option<UnlockSession>,
    workout: Option<WorkoutInProgress>,
    emergency: EmergencyUnlockState,
    last_directive: Option<Directive>,
    /// Ids the gateway was last told to restrict.
    enforced: BTreeSet<String>,
    last_seen_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
enum AppChange {
    Added(String),
    Removed(String),
}

/// Caller time split into the UTC instant and the caller's local date.
#[derive(Debug, Clone, Copy)]
struct Now {
    utc: DateTime<Utc>,
    today: NaiveDate,
}

impl Now {
    fn from_zoned<Tz: TimeZone>(now: DateTime<Tz>) -> Self {
        Self {
            utc: now.with_timezone(&Utc),
            today: now.date_naive(),
        }
    }
}

pub struct UnlockEngine<S, G, P> {
    store: S,
    gateway: G,
    plan: P,
    settings: EngineSettings,
}

impl<S, G, P> UnlockEngine<S, G, P>
where
    S: KeyValueStore,
    G: EnforcementGateway,
    P: PlanResolver,
{
    pub fn new(store: S, gateway: G, plan: P, settings: EngineSettings) -> Self {
        Self {
            store,
            gateway,
            plan,
            settings,
        }
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn gateway_mut(&mut self) -> &mut G {
        &mut self.gateway
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Derive the current state without writing anything.
    ///
    /// # Errors
    /// Only store read failures.
    pub fn status<Tz: TimeZone>(&self, now: DateTime<Tz>) -> Result<UnlockSnapshot> {
        let now = Now::from_zoned(now);
        let mut state = self.load()?;
        let mut discarded = Vec::new();
        let anomaly = self.housekeep(&mut state, &now, &mut discarded);
        let view = self.view(&state, &now);
        Ok(self.snapshot(&state, view, &now, anomaly, !self.gateway.is_authorized()))
    }

    /// # Errors
    /// Only store read failures.
    pub fn blocked_apps(&self) -> Result<BlockedAppSet> {
        Ok(load_json(&self.store, keys::BLOCKED_APPS)?.unwrap_or_default())
    }

    /// # Errors
    /// Only store read failures.
    pub fn contains_app(&self, app_id: &str) -> Result<bool> {
        Ok(self.blocked_apps()?.contains(app_id))
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Bring persisted state up to date and push the directive if it flipped.
    ///
    /// Enforcement failures do not fail the poll; they show up as
    /// `setup_required` and are retried on the next call.
    ///
    /// # Errors
    /// Store failures.
    pub fn poll<Tz: TimeZone>(&mut self, now: DateTime<Tz>) -> Result<Outcome> {
        self.transact(Now::from_zoned(now), |_, _, _| Ok(None))
    }

    /// Like [`poll`](Self::poll), but an enforcement failure is an error.
    ///
    /// # Errors
    /// `EnforcementUnavailable` when the gateway refuses the directive.
    pub fn enforce<Tz: TimeZone>(&mut self, now: DateTime<Tz>) -> Result<Outcome> {
        let mut outcome = self.poll(now)?;
        match outcome.enforcement_error.take() {
            Some(err) => Err(err.into()),
            None => Ok(outcome),
        }
    }

    /// Locked -> Earning.
    pub fn workout_started<Tz: TimeZone>(
        &mut self,
        mode: WorkoutMode,
        now: DateTime<Tz>,
    ) -> Result<Outcome> {
        self.transact(Now::from_zoned(now), move |state, now, events| {
            state.workout = Some(WorkoutInProgress {
                mode,
                started_at: now.utc,
            });
            tracing::info!(%mode, "workout started");
            events.push(Event::WorkoutStarted { mode, at: now.utc });
            Ok(None)
        })
    }

    /// Earning -> Unlocked when anything was earned, otherwise -> Locked.
    ///
    /// A new session replaces any existing one outright; time is never added
    /// to a running session.
    pub fn workout_completed<Tz: TimeZone>(
        &mut self,
        mode: WorkoutMode,
        reps_completed: u32,
        now: DateTime<Tz>,
    ) -> Result<Outcome> {
        let earned = self.settings.workouts.compute_earned_secs(mode, reps_completed);
        let grace = self.settings.grace_period_secs;
        self.transact(Now::from_zoned(now), move |state, now, events| {
            if state.workout.take().is_none() {
                tracing::debug!(%mode, "completion reported without a workout in progress");
            }
            if earned == 0 {
                tracing::info!(%mode, reps_completed, "workout earned nothing");
                events.push(Event::WorkoutAborted {
                    mode: Some(mode),
                    at: now.utc,
                });
                return Ok(None);
            }
            let replaced_previous = state.session.as_ref().is_some_and(|s| !s.is_over(now.utc));
            let session = UnlockSession::new(mode, reps_completed, earned, now.utc, grace);
            tracing::info!(%mode, reps_completed, earned_secs = earned, replaced_previous, "unlock earned");
            events.push(Event::UnlockEarned {
                session_id: session.id,
                mode,
                reps_completed,
                earned_secs: earned,
                replaced_previous,
                at: now.utc,
            });
            state.session = Some(session);
            Ok(None)
        })
    }

    /// Earning -> Locked. No session is created.
    pub fn workout_aborted<Tz: TimeZone>(&mut self, now: DateTime<Tz>) -> Result<Outcome> {
        self.transact(Now::from_zoned(now), |state, now, events| {
            let mode = state.workout.take().map(|w| w.mode);
            tracing::info!(?mode, "workout aborted");
            events.push(Event::WorkoutAborted { mode, at: now.utc });
            Ok(None)
        })
    }

    /// Spend one emergency unlock. The base state is not touched.
    ///
    /// # Errors
    /// `QuotaExhausted` when no uses are left, the user disabled emergency
    /// unlocks, or the plan does not include them. Nothing is persisted then.
    pub fn spend_emergency<Tz: TimeZone>(&mut self, now: DateTime<Tz>) -> Result<Outcome> {
        let allowed = self.plan.emergency_unlock_allowed();
        self.transact(Now::from_zoned(now), move |state, now, events| {
            if !allowed {
                tracing::info!("emergency unlock not included in plan");
                return Err(UnlockError::QuotaExhausted {
                    resets_on: state.emergency.resets_on(now.today),
                }
                .into());
            }
            let next = state.emergency.spend_one(now.utc, now.today)?;
            let active_until = next.active_until.unwrap_or(now.utc);
            tracing::info!(
                uses_remaining_today = next.uses_remaining_today,
                %active_until,
                "emergency unlock started"
            );
            events.push(Event::EmergencyStarted {
                minutes: next.minutes_per_use,
                uses_remaining_today: next.uses_remaining_today,
                active_until,
                at: now.utc,
            });
            state.emergency = next;
            Ok(None)
        })
    }

    /// End an active emergency window early. The spent use is not refunded.
    pub fn end_emergency<Tz: TimeZone>(&mut self, now: DateTime<Tz>) -> Result<Outcome> {
        self.transact(Now::from_zoned(now), |state, now, events| {
            if state.emergency.is_active(now.utc) {
                state.emergency = state.emergency.cleared();
                tracing::info!("emergency unlock ended early");
                events.push(Event::EmergencyEnded {
                    elapsed: false,
                    at: now.utc,
                });
            }
            Ok(None)
        })
    }

    /// Change emergency unlock settings; `None` keeps the current value.
    pub fn configure_emergency<Tz: TimeZone>(
        &mut self,
        enabled: Option<bool>,
        minutes_per_use: Option<EmergencyMinutes>,
        max_uses_per_day: Option<u32>,
        now: DateTime<Tz>,
    ) -> Result<Outcome> {
        self.transact(Now::from_zoned(now), move |state, _, _| {
            let current = &state.emergency;
            state.emergency = current.with_settings(
                enabled.unwrap_or(current.enabled),
                minutes_per_use.unwrap_or(current.minutes_per_use),
                max_uses_per_day.unwrap_or(current.max_uses_per_day),
            );
            tracing::info!(
                enabled = state.emergency.enabled,
                minutes = state.emergency.minutes_per_use.as_minutes(),
                max_uses_per_day = state.emergency.max_uses_per_day,
                "emergency settings changed"
            );
            Ok(None)
        })
    }

    /// Add an app to the registry and resynchronize the gateway.
    ///
    /// # Errors
    /// `LimitExceeded` when the plan cap is reached; the registry is unchanged.
    pub fn add_app<Tz: TimeZone>(&mut self, app_id: &str, now: DateTime<Tz>) -> Result<Outcome> {
        let limit = self.plan.max_blocked_apps();
        let app_id = app_id.trim().to_string();
        self.transact(Now::from_zoned(now), move |state, now, events| {
            if !state.apps.add(&app_id, limit)? {
                return Ok(None);
            }
            tracing::info!(app_id = %app_id, count = state.apps.len(), %limit, "app added to registry");
            events.push(Event::AppAdded {
                app_id: app_id.clone(),
                at: now.utc,
            });
            Ok(Some(AppChange::Added(app_id)))
        })
    }

    /// Remove an app from the registry and resynchronize the gateway.
    pub fn remove_app<Tz: TimeZone>(&mut self, app_id: &str, now: DateTime<Tz>) -> Result<Outcome> {
        let app_id = app_id.trim().to_string();
        self.transact(Now::from_zoned(now), move |state, now, events| {
            if !state.apps.remove(&app_id) {
                return Ok(None);
            }
            tracing::info!(app_id = %app_id, count = state.apps.len(), "app removed from registry");
            events.push(Event::AppRemoved {
                app_id: app_id.clone(),
                at: now.utc,
            });
            Ok(Some(AppChange::Removed(app_id)))
        })
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn transact<F>(&mut self, now: Now, op: F) -> Result<Outcome>
    where
        F: FnOnce(&mut Persisted, &Now, &mut Vec<Event>) -> Result<Option<AppChange>>,
    {
        let before = self.load()?;
        let mut state = before.clone();
        let mut events = Vec::new();

        let anomaly = self.housekeep(&mut state, &now, &mut events);
        let change = op(&mut state, &now, &mut events)?;

        let view = self.view(&state, &now);
        let enforcement = match change {
            Some(change) if state.last_directive == Some(view.directive) => {
                self.push_app_change(&mut state, view.directive, &change)
            }
            _ => self.sync_directive(&mut state, &view, &now, &mut events),
        };

        self.save(&before, &state)?;

        let enforcement_error = enforcement.err();
        if let Some(err) = &enforcement_error {
            tracing::warn!(error = %err, "enforcement directive not applied");
        }
        let setup_required = enforcement_error.is_some() || !self.gateway.is_authorized();
        let snapshot = self.snapshot(&state, view, &now, anomaly, setup_required);
        tracing::debug!(
            state = ?snapshot.view.state,
            display = ?snapshot.view.display,
            directive = ?snapshot.view.directive,
            "engine evaluated"
        );
        Ok(Outcome {
            snapshot,
            events,
            enforcement_error,
        })
    }

    /// Apply the time-driven transitions to `state` in memory.
    ///
    /// Returns true when `now` is earlier than the last instant seen.
    fn housekeep(&self, state: &mut Persisted, now: &Now, events: &mut Vec<Event>) -> bool {
        let previous_seen = state.last_seen_at;
        let anomaly = match previous_seen {
            Some(last_seen) if now.utc < last_seen => {
                let err = UnlockError::ClockAnomaly {
                    now: now.utc,
                    last_seen,
                };
                tracing::warn!(error = %err, "clamping to stored timestamps");
                events.push(Event::ClockAnomaly {
                    last_seen,
                    at: now.utc,
                });
                true
            }
            _ => {
                state.last_seen_at = Some(now.utc);
                false
            }
        };

        state.emergency = state.emergency.current_quota(now.today);
        if state.emergency.active_until.is_some() && !state.emergency.is_active(now.utc) {
            state.emergency = state.emergency.cleared();
            tracing::info!("emergency unlock elapsed");
            events.push(Event::EmergencyEnded {
                elapsed: true,
                at: now.utc,
            });
        }

        if let Some(workout) = &state.workout {
            if workout.is_stale(now.utc, self.settings.earning_timeout_secs) {
                tracing::info!(mode = %workout.mode, "abandoned workout cleared");
                events.push(Event::WorkoutAborted {
                    mode: Some(workout.mode),
                    at: now.utc,
                });
                state.workout = None;
            }
        }

        if let Some(session) = &state.session {
            if session.is_over(now.utc) {
                tracing::info!(session_id = %session.id, "grace period over, relocking");
                events.push(Event::Relocked {
                    session_id: session.id,
                    at: now.utc,
                });
                state.session = None;
            } else if session.remaining_secs(now.utc) == 0
                && previous_seen.map_or(true, |seen| seen < session.ends_at())
            {
                tracing::info!(session_id = %session.id, "unlock expired, grace period running");
                events.push(Event::UnlockExpired {
                    session_id: session.id,
                    grace_remaining_secs: session.grace_remaining_secs(now.utc),
                    at: now.utc,
                });
            }
        }

        anomaly
    }

    fn view(&self, state: &Persisted, now: &Now) -> UnlockView {
        derive(
            &UnlockInputs {
                session: state.session.as_ref(),
                workout: state.workout.as_ref(),
                emergency: &state.emergency,
                earning_timeout_secs: self.settings.earning_timeout_secs,
            },
            now.utc,
        )
    }

    /// Push the full directive if it differs from the last acknowledged one.
    ///
    /// A block leaves the gateway restricting exactly the registry: ids that
    /// were restricted earlier but are no longer registered get cleared first.
    fn sync_directive(
        &mut self,
        state: &mut Persisted,
        view: &UnlockView,
        now: &Now,
        events: &mut Vec<Event>,
    ) -> Result<(), UnlockError> {
        let directive = view.directive;
        if state.last_directive == Some(directive) {
            return Ok(());
        }
        if !self.gateway.is_authorized() {
            return Err(GatewayError::NotAuthorized.into());
        }
        match directive {
            Directive::Block => {
                let stale: BTreeSet<String> =
                    state.enforced.difference(state.apps.all()).cloned().collect();
                if !stale.is_empty() {
                    self.gateway.clear_restriction(&stale)?;
                    state.enforced.retain(|id| !stale.contains(id));
                }
                self.gateway.apply_restriction(state.apps.all())?;
                state.enforced = state.apps.all().clone();
            }
            Directive::Allow => {
                let released: BTreeSet<String> =
                    state.enforced.union(state.apps.all()).cloned().collect();
                self.gateway.clear_restriction(&released)?;
                state.enforced.clear();
            }
        }
        tracing::info!(?directive, app_count = state.apps.len(), "enforcement directive changed");
        state.last_directive = Some(directive);
        events.push(Event::DirectiveChanged {
            directive,
            app_count: state.apps.len(),
            at: now.utc,
        });
        Ok(())
    }

    /// Mirror a single registry change onto a gateway that is already in sync.
    ///
    /// On failure the acknowledged directive is forgotten so the next call
    /// pushes the full set again.
    fn push_app_change(
        &mut self,
        state: &mut Persisted,
        directive: Directive,
        change: &AppChange,
    ) -> Result<(), UnlockError> {
        let single = |id: &str| BTreeSet::from([id.to_string()]);
        let result = if !self.gateway.is_authorized() {
            Err(GatewayError::NotAuthorized)
        } else {
            match (directive, change) {
                (Directive::Block, AppChange::Added(id)) => self
                    .gateway
                    .apply_restriction(&single(id))
                    .map(|()| {
                        state.enforced.insert(id.clone());
                    }),
                (Directive::Block, AppChange::Removed(id))
                | (Directive::Allow, AppChange::Added(id)) => self
                    .gateway
                    .clear_restriction(&single(id))
                    .map(|()| {
                        state.enforced.remove(id);
                    }),
                (Directive::Allow, AppChange::Removed(_)) => Ok(()),
            }
        };
        if result.is_err() {
            state.last_directive = None;
        }
        result.map_err(UnlockError::from)
    }

    fn load(&self) -> Result<Persisted> {
        Ok(Persisted {
            apps: load_json(&self.store, keys::BLOCKED_APPS)?.unwrap_or_default(),
            session: load_json(&self.store, keys::UNLOCK_SESSION)?,
            workout: load_json(&self.store, keys::WORKOUT_IN_PROGRESS)?,
            emergency: load_json(&self.store, keys::EMERGENCY_UNLOCK_STATE)?
                .unwrap_or_else(|| self.settings.emergency_defaults.initial_state()),
            last_directive: load_json(&self.store, keys::LAST_DIRECTIVE)?,
            enforced: load_json(&self.store, keys::ENFORCED_APPS)?.unwrap_or_default(),
            last_seen_at: load_json(&self.store, keys::LAST_SEEN_AT)?,
        })
    }

    fn save(&mut self, before: &Persisted, after: &Persisted) -> Result<()> {
        if before.apps != after.apps {
            store_json(&mut self.store, keys::BLOCKED_APPS, Some(&after.apps))?;
        }
        if before.session != after.session {
            store_json(&mut self.store, keys::UNLOCK_SESSION, after.session.as_ref())?;
        }
        if before.workout != after.workout {
            store_json(&mut self.store, keys::WORKOUT_IN_PROGRESS, after.workout.as_ref())?;
        }
        if before.emergency != after.emergency {
            store_json(&mut self.store, keys::EMERGENCY_UNLOCK_STATE, Some(&after.emergency))?;
        }
        if before.last_directive != after.last_directive {
            store_json(&mut self.store, keys::LAST_DIRECTIVE, after.last_directive.as_ref())?;
        }
        if before.enforced != after.enforced {
            store_json(&mut self.store, keys::ENFORCED_APPS, Some(&after.enforced))?;
        }
        if before.last_seen_at != after.last_seen_at {
            store_json(&mut self.store, keys::LAST_SEEN_AT, after.last_seen_at.as_ref())?;
        }
        Ok(())
    }

    fn snapshot(
        &self,
        state: &Persisted,
        view: UnlockView,
        now: &Now,
        clock_anomaly: bool,
        setup_required: bool,
    ) -> UnlockSnapshot {
        UnlockSnapshot {
            view,
            session: state.session.clone(),
            workout: state.workout.clone(),
            emergency_enabled: state.emergency.enabled && self.plan.emergency_unlock_allowed(),
            emergency_minutes: state.emergency.minutes_per_use,
            uses_remaining_today: state.emergency.uses_remaining_today,
            max_uses_per_day: state.emergency.max_uses_per_day,
            quota_resets_on: state.emergency.resets_on(now.today),
            blocked_apps: state.apps.len(),
            setup_required,
            clock_anomaly,
            at: now.utc,
        }
    }
}

/// Mutex-guarded engine for hosts with more than one caller.
pub struct SharedEngine<S, G, P>(Mutex<UnlockEngine<S, G, P>>);

impl<S, G, P> SharedEngine<S, G, P>
where
    S: KeyValueStore,
    G: EnforcementGateway,
    P: PlanResolver,
{
    pub fn new(engine: UnlockEngine<S, G, P>) -> Self {
        Self(Mutex::new(engine))
    }

    /// Run `f` with exclusive access to the engine.
    ///
    /// # Errors
    /// Whatever `f` returns, or a custom error if a previous holder panicked.
    pub fn with<R>(&self, f: impl FnOnce(&mut UnlockEngine<S, G, P>) -> Result<R>) -> Result<R> {
        let mut engine = self
            .0
            .lock()
            .map_err(|_| CoreError::Custom("unlock engine lock poisoned".into()))?;
        f(&mut engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enforcement::{GatewayCall, MemoryGateway};
    use crate::plan::StaticPlan;
    use crate::storage::MemoryStore;
    use crate::unlock::{DisplayState, UnlockState};
    use chrono::Duration;

    type TestEngine = UnlockEngine<MemoryStore, MemoryGateway, StaticPlan>;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn engine() -> TestEngine {
        UnlockEngine::new(
            MemoryStore::new(),
            MemoryGateway::new(),
            StaticPlan::pro(),
            EngineSettings::default(),
        )
    }

    fn ids(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn first_poll_blocks_registry() {
        let mut e = engine();
        e.add_app("com.social.app", t0()).unwrap();
        assert_eq!(e.gateway().restricted(), &ids(&["com.social.app"]));
        let calls_after_add = e.gateway().calls().len();

        // Further polls in the same state do not call the gateway again.
        e.poll(t0() + Duration::seconds(1)).unwrap();
        e.poll(t0() + Duration::seconds(2)).unwrap();
        assert_eq!(e.gateway().calls().len(), calls_after_add);
    }

    #[test]
    fn status_does_not_write() {
        let e = engine();
        let snap = e.status(t0()).unwrap();
        assert_eq!(snap.view.state, UnlockState::Locked);
        assert!(e.store().entries().is_empty());
    }

    #[test]
    fn workout_started_is_earning_and_still_blocked() {
        let mut e = engine();
        e.add_app("com.social.app", t0()).unwrap();
        let out = e.workout_started(WorkoutMode::Cozy, t0()).unwrap();
        assert_eq!(out.snapshot.view.state, UnlockState::Earning);
        assert_eq!(out.snapshot.view.directive, Directive::Block);
        assert!(matches!(out.events[0], Event::WorkoutStarted { .. }));
    }

    #[test]
    fn completion_replaces_rather_than_extends() {
        let mut e = engine();
        e.workout_completed(WorkoutMode::Normal, 20, t0()).unwrap();
        let later = t0() + Duration::minutes(5);
        let out = e.workout_completed(WorkoutMode::Cozy, 1, later).unwrap();
        let session = out.snapshot.session.unwrap();
        assert_eq!(session.started_at, later);
        assert_eq!(session.earned_duration_secs, 60);
        assert!(out
            .events
            .iter()
            .any(|ev| matches!(ev, Event::UnlockEarned { replaced_previous: true, .. })));
    }

    #[test]
    fn zero_reps_returns_to_locked() {
        let mut e = engine();
        e.workout_started(WorkoutMode::Tuff, t0()).unwrap();
        let out = e.workout_completed(WorkoutMode::Tuff, 0, t0()).unwrap();
        assert_eq!(out.snapshot.view.state, UnlockState::Locked);
        assert!(out.snapshot.session.is_none());
        assert!(out.snapshot.workout.is_none());
    }

    #[test]
    fn unauthorized_gateway_flags_setup_and_retries() {
        let mut e = engine();
        e.gateway_mut().set_authorized(false);
        let out = e.add_app("com.social.app", t0()).unwrap();
        assert!(out.snapshot.setup_required);
        assert!(matches!(
            out.enforcement_error,
            Some(UnlockError::EnforcementUnavailable { .. })
        ));
        assert!(e.contains_app("com.social.app").unwrap());
        assert!(e.enforce(t0()).is_err());

        e.gateway_mut().set_authorized(true);
        let out = e.poll(t0() + Duration::seconds(1)).unwrap();
        assert!(!out.snapshot.setup_required);
        assert_eq!(e.gateway().restricted(), &ids(&["com.social.app"]));
    }

    #[test]
    fn app_removed_while_unauthorized_is_released_on_resync() {
        let mut e = engine();
        e.add_app("a", t0()).unwrap();
        e.add_app("b", t0()).unwrap();
        assert_eq!(e.gateway().restricted(), &ids(&["a", "b"]));

        e.gateway_mut().set_authorized(false);
        let out = e.remove_app("a", t0()).unwrap();
        assert!(out.snapshot.setup_required);

        e.gateway_mut().set_authorized(true);
        e.gateway_mut().take_calls();
        e.poll(t0() + Duration::seconds(1)).unwrap();
        assert_eq!(e.gateway().restricted(), e.blocked_apps().unwrap().all());
        assert_eq!(e.gateway().restricted(), &ids(&["b"]));
        assert_eq!(
            e.gateway().calls(),
            &[
                GatewayCall::Clear(ids(&["a"])),
                GatewayCall::Apply(ids(&["b"])),
            ]
        );
    }

    #[test]
    fn app_removed_while_unlocked_is_not_reblocked() {
        let mut e = engine();
        e.add_app("a", t0()).unwrap();
        e.add_app("b", t0()).unwrap();
        e.workout_completed(WorkoutMode::Normal, 20, t0()).unwrap();
        assert!(e.gateway().restricted().is_empty());

        e.remove_app("a", t0() + Duration::seconds(5)).unwrap();
        e.poll(t0() + Duration::hours(2)).unwrap();
        assert_eq!(e.gateway().restricted(), &ids(&["b"]));
    }

    #[test]
    fn huge_earning_timeout_does_not_panic() {
        let mut settings = EngineSettings::default();
        settings.earning_timeout_secs = 10_000_000_000_000;
        let mut e = UnlockEngine::new(
            MemoryStore::new(),
            MemoryGateway::new(),
            StaticPlan::pro(),
            settings,
        );
        let out = e.workout_started(WorkoutMode::Normal, t0()).unwrap();
        assert_eq!(out.snapshot.view.state, UnlockState::Earning);
        let out = e.poll(t0() + Duration::days(365)).unwrap();
        assert_eq!(out.snapshot.view.state, UnlockState::Earning);
    }

    #[test]
    fn removing_app_while_blocked_clears_only_that_app() {
        let mut e = engine();
        e.add_app("a", t0()).unwrap();
        e.add_app("b", t0()).unwrap();
        e.gateway_mut().take_calls();
        e.remove_app("a", t0()).unwrap();
        assert_eq!(e.gateway().calls(), &[GatewayCall::Clear(ids(&["a"]))]);
        assert_eq!(e.gateway().restricted(), &ids(&["b"]));
    }

    #[test]
    fn adding_app_while_unlocked_keeps_it_reachable() {
        let mut e = engine();
        e.add_app("a", t0()).unwrap();
        e.workout_completed(WorkoutMode::Normal, 20, t0()).unwrap();
        e.add_app("b", t0() + Duration::seconds(5)).unwrap();
        assert!(e.gateway().restricted().is_empty());

        let after = t0() + Duration::hours(2);
        e.poll(after).unwrap();
        assert_eq!(e.gateway().restricted(), &ids(&["a", "b"]));
    }

    #[test]
    fn end_emergency_early_restores_block() {
        let mut e = engine();
        e.add_app("a", t0()).unwrap();
        let out = e.spend_emergency(t0()).unwrap();
        assert_eq!(out.snapshot.view.display, DisplayState::EmergencyUnlocked);
        assert!(e.gateway().restricted().is_empty());

        let out = e.end_emergency(t0() + Duration::minutes(1)).unwrap();
        assert_eq!(out.snapshot.view.display, DisplayState::Locked);
        assert_eq!(out.snapshot.uses_remaining_today, 0);
        assert_eq!(e.gateway().restricted(), &ids(&["a"]));
    }

    #[test]
    fn stale_workout_marker_is_cleared_on_poll() {
        let mut e = engine();
        e.workout_started(WorkoutMode::Normal, t0()).unwrap();
        let out = e.poll(t0() + Duration::hours(1)).unwrap();
        assert_eq!(out.snapshot.view.state, UnlockState::Locked);
        assert!(out.snapshot.workout.is_none());
        assert!(out
            .events
            .iter()
            .any(|ev| matches!(ev, Event::WorkoutAborted { .. })));
    }

    #[test]
    fn shared_engine_serializes_callers() {
        let shared = std::sync::Arc::new(SharedEngine::new(engine()));
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let shared = shared.clone();
                std::thread::spawn(move || {
                    shared.with(|e| e.add_app(&format!("app.{i}"), t0()).map(|_| ()))
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap().unwrap();
        }
        let count = shared.with(|e| Ok(e.blocked_apps()?.len())).unwrap();
        assert_eq!(count, 4);
    }
}
