//! End-to-end scenarios for the unlock engine.
//!
//! Every test drives the engine with explicit timestamps; nothing depends on
//! the wall clock or on a poll loop having run.

use std::collections::BTreeSet;
use std::path::Path;

use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};
use repgate_core::enforcement::GatewayCall;
use repgate_core::storage::{Config, Database, MemoryStore};
use repgate_core::{
    CoreError, Directive, DisplayState, EngineSettings, Event, FileGateway, MemoryGateway,
    StaticPlan, UnlockEngine, UnlockError, UnlockState, WorkoutMode,
};

// ============================================================================
// Test Helpers
// ============================================================================

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

fn secs(n: i64) -> Duration {
    Duration::seconds(n)
}

/// Normal mode earns 3 seconds per rep, grace period 15 seconds.
fn scenario_settings() -> EngineSettings {
    let mut config = Config::default();
    config.unlock.grace_period_secs = 15;
    config.workouts.normal.earned_secs_per_rep = 3.0;
    config.emergency.max_uses_per_day = 1;
    EngineSettings::from_config(&config)
}

fn engine_with(plan: StaticPlan) -> UnlockEngine<MemoryStore, MemoryGateway, StaticPlan> {
    UnlockEngine::new(
        MemoryStore::new(),
        MemoryGateway::new(),
        plan,
        scenario_settings(),
    )
}

fn ids(list: &[&str]) -> BTreeSet<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn set_readonly(path: &Path, readonly: bool) {
    let mut perms = std::fs::metadata(path).unwrap().permissions();
    perms.set_readonly(readonly);
    std::fs::set_permissions(path, perms).unwrap();
}

// ============================================================================
// Earned unlock lifecycle
// ============================================================================

#[test]
fn normal_workout_unlocks_expires_and_relocks() {
    let mut engine = engine_with(StaticPlan::pro());
    engine.add_app("com.video.app", t0()).unwrap();

    engine.workout_started(WorkoutMode::Normal, t0()).unwrap();
    let out = engine.workout_completed(WorkoutMode::Normal, 20, t0()).unwrap();
    let session = out.snapshot.session.clone().unwrap();
    assert_eq!(session.earned_duration_secs, 60);
    assert_eq!(session.started_at, t0());
    assert_eq!(out.snapshot.view.state, UnlockState::Unlocked);
    assert!(engine.gateway().restricted().is_empty());

    let snap = engine.poll(t0() + secs(30)).unwrap().snapshot;
    assert_eq!(snap.view.remaining_secs, 30);
    assert_eq!(snap.view.state, UnlockState::Unlocked);

    let out = engine.poll(t0() + secs(61)).unwrap();
    assert_eq!(out.snapshot.view.state, UnlockState::Expired);
    assert_eq!(out.snapshot.view.grace_remaining_secs, 14);
    assert_eq!(out.snapshot.view.directive, Directive::Allow);
    assert!(out
        .events
        .iter()
        .any(|e| matches!(e, Event::UnlockExpired { .. })));

    let out = engine.poll(t0() + secs(76)).unwrap();
    assert_eq!(out.snapshot.view.state, UnlockState::Locked);
    assert!(out.snapshot.session.is_none());
    assert!(out.events.iter().any(|e| matches!(e, Event::Relocked { .. })));
    assert_eq!(engine.gateway().restricted(), &ids(&["com.video.app"]));
}

#[test]
fn unlock_expired_is_announced_once() {
    let mut engine = engine_with(StaticPlan::pro());
    engine.workout_completed(WorkoutMode::Normal, 20, t0()).unwrap();
    let first = engine.poll(t0() + secs(61)).unwrap();
    let second = engine.poll(t0() + secs(62)).unwrap();
    let expired = |events: &[Event]| {
        events
            .iter()
            .filter(|e| matches!(e, Event::UnlockExpired { .. }))
            .count()
    };
    assert_eq!(expired(&first.events), 1);
    assert_eq!(expired(&second.events), 0);
}

#[test]
fn gateway_is_only_called_when_directive_flips() {
    let mut engine = engine_with(StaticPlan::pro());
    engine.add_app("com.video.app", t0()).unwrap();
    engine.workout_completed(WorkoutMode::Normal, 20, t0()).unwrap();

    for s in 1..=90 {
        engine.poll(t0() + secs(s)).unwrap();
    }

    let app = ids(&["com.video.app"]);
    assert_eq!(
        engine.gateway().calls(),
        &[
            GatewayCall::Apply(app.clone()),
            GatewayCall::Clear(app.clone()),
            GatewayCall::Apply(app),
        ]
    );
}

#[test]
fn aborted_workout_stays_locked() {
    let mut engine = engine_with(StaticPlan::pro());
    engine.workout_started(WorkoutMode::Cozy, t0()).unwrap();
    assert_eq!(engine.status(t0()).unwrap().view.state, UnlockState::Earning);

    let out = engine.workout_aborted(t0() + secs(20)).unwrap();
    assert_eq!(out.snapshot.view.state, UnlockState::Locked);
    assert!(out.snapshot.session.is_none());
    assert!(matches!(
        out.events.last(),
        Some(Event::WorkoutAborted {
            mode: Some(WorkoutMode::Cozy),
            ..
        })
    ));
}

// ============================================================================
// Emergency unlock
// ============================================================================

#[test]
fn second_emergency_spend_fails_and_keeps_first_window() {
    let mut engine = engine_with(StaticPlan::pro());
    let t1 = t0() + secs(600);

    let out = engine.spend_emergency(t1).unwrap();
    assert_eq!(out.snapshot.uses_remaining_today, 0);
    let first_until = t1 + Duration::minutes(15);
    assert_eq!(out.snapshot.view.emergency_remaining_secs, 15 * 60);

    let err = engine.spend_emergency(t1 + secs(60)).unwrap_err();
    assert!(matches!(
        err,
        CoreError::Unlock(UnlockError::QuotaExhausted { .. })
    ));

    let snap = engine.status(t1 + secs(60)).unwrap();
    assert_eq!(snap.uses_remaining_today, 0);
    assert_eq!(
        snap.view.emergency_remaining_secs,
        (first_until - (t1 + secs(60))).num_seconds() as u64
    );
}

#[test]
fn free_plan_without_emergency_reports_quota_exhausted() {
    let mut engine = engine_with(StaticPlan::free(3));
    let err = engine.spend_emergency(t0()).unwrap_err();
    assert!(matches!(
        err,
        CoreError::Unlock(UnlockError::QuotaExhausted { .. })
    ));
    assert_eq!(engine.status(t0()).unwrap().uses_remaining_today, 1);
}

#[test]
fn quota_refills_at_local_midnight() {
    // UTC+09:00: local midnight is 15:00 UTC the previous day.
    let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
    let mut engine = engine_with(StaticPlan::pro());

    let evening = tokyo.with_ymd_and_hms(2026, 3, 1, 23, 30, 0).unwrap();
    engine.spend_emergency(evening).unwrap();
    assert!(engine.spend_emergency(evening + Duration::minutes(20)).is_err());

    // Still 2026-03-01 in UTC, already 2026-03-02 locally.
    let after_midnight = tokyo.with_ymd_and_hms(2026, 3, 2, 0, 5, 0).unwrap();
    let snap = engine.status(after_midnight).unwrap();
    assert_eq!(snap.uses_remaining_today, 1);

    engine.spend_emergency(after_midnight).unwrap();
    let later_same_day = tokyo.with_ymd_and_hms(2026, 3, 2, 18, 0, 0).unwrap();
    assert_eq!(engine.status(later_same_day).unwrap().uses_remaining_today, 0);
}

#[test]
fn earned_unlock_outranks_emergency_for_display() {
    let mut engine = engine_with(StaticPlan::pro());
    engine.spend_emergency(t0()).unwrap();
    let out = engine.workout_completed(WorkoutMode::Normal, 20, t0() + secs(5)).unwrap();
    assert!(out.snapshot.view.emergency_active);
    assert_eq!(out.snapshot.view.display, DisplayState::Unlocked);

    // Once the earned window is over, the still-running emergency shows.
    let snap = engine.status(t0() + secs(70)).unwrap();
    assert_eq!(snap.view.state, UnlockState::Expired);
    assert_eq!(snap.view.display, DisplayState::EmergencyUnlocked);
}

// ============================================================================
// Registry limits
// ============================================================================

#[test]
fn fourth_app_over_free_cap_is_rejected() {
    let mut engine = engine_with(StaticPlan::free(3));
    for app in ["com.a", "com.b", "com.c"] {
        engine.add_app(app, t0()).unwrap();
    }
    let err = engine.add_app("com.d", t0()).unwrap_err();
    assert!(matches!(
        err,
        CoreError::Unlock(UnlockError::LimitExceeded {
            limit: 3,
            attempted: 4
        })
    ));
    assert_eq!(engine.blocked_apps().unwrap().len(), 3);
    assert_eq!(engine.gateway().restricted(), &ids(&["com.a", "com.b", "com.c"]));
}

#[test]
fn restriction_file_converges_after_permission_returns() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("restrictions.json");
    let mut engine = UnlockEngine::new(
        MemoryStore::new(),
        FileGateway::new(path.clone()),
        StaticPlan::pro(),
        scenario_settings(),
    );
    engine.add_app("com.a", t0()).unwrap();
    engine.add_app("com.b", t0()).unwrap();
    assert_eq!(engine.gateway().read().restricted, ids(&["com.a", "com.b"]));

    // Helper withdrew permission while the user removed an app.
    set_readonly(&path, true);
    let out = engine.remove_app("com.a", t0() + secs(1)).unwrap();
    assert!(out.snapshot.setup_required);
    assert!(out.enforcement_error.is_some());
    assert_eq!(engine.blocked_apps().unwrap().all(), &ids(&["com.b"]));

    set_readonly(&path, false);
    let out = engine.poll(t0() + secs(2)).unwrap();
    assert!(!out.snapshot.setup_required);
    assert_eq!(engine.gateway().read().restricted, ids(&["com.b"]));
}

// ============================================================================
// Restart survival and clock anomalies
// ============================================================================

#[test]
fn state_survives_restart_with_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("repgate.db");

    {
        let mut engine = UnlockEngine::new(
            Database::open_at(&path).unwrap(),
            MemoryGateway::new(),
            StaticPlan::pro(),
            scenario_settings(),
        );
        engine.add_app("com.video.app", t0()).unwrap();
        engine.workout_completed(WorkoutMode::Normal, 20, t0()).unwrap();
    }

    // Process was killed; nothing ran for 40 seconds.
    let mut engine = UnlockEngine::new(
        Database::open_at(&path).unwrap(),
        MemoryGateway::new(),
        StaticPlan::pro(),
        scenario_settings(),
    );
    let snap = engine.status(t0() + secs(40)).unwrap();
    assert_eq!(snap.view.state, UnlockState::Unlocked);
    assert_eq!(snap.view.remaining_secs, 20);
    assert_eq!(snap.blocked_apps, 1);

    // The persisted directive is still Allow, so no redundant gateway call.
    engine.poll(t0() + secs(41)).unwrap();
    assert!(engine.gateway().calls().is_empty());
}

#[test]
fn clock_rollback_is_flagged_and_clamped() {
    let mut engine = engine_with(StaticPlan::pro());
    engine.workout_completed(WorkoutMode::Normal, 20, t0()).unwrap();
    engine.poll(t0() + secs(30)).unwrap();

    let out = engine.poll(t0() - secs(3600)).unwrap();
    assert!(out.snapshot.clock_anomaly);
    assert_eq!(out.snapshot.view.remaining_secs, 60);
    assert_eq!(out.snapshot.view.state, UnlockState::Unlocked);
    assert!(out
        .events
        .iter()
        .any(|e| matches!(e, Event::ClockAnomaly { .. })));

    // Clock comes back: normal operation resumes.
    let out = engine.poll(t0() + secs(31)).unwrap();
    assert!(!out.snapshot.clock_anomaly);
    assert_eq!(out.snapshot.view.remaining_secs, 29);
}
