//! End-to-end alarm cycles against in-memory collaborators
//!
//! Time is driven by a manual clock; the wait loop polls every few
//! milliseconds so each scenario completes quickly.

mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::*;
use reveille::alarm::{PlaybackKind, PlaybackSource, RampPolicy};
use reveille::{AlarmConfig, AlarmError, AlarmState, Clock, ControllerSettings};

fn config(hour: u32, minute: u32) -> AlarmConfig {
    AlarmConfig::new(hour, minute, 5, None).unwrap()
}

fn podcast_config(hour: u32, minute: u32) -> AlarmConfig {
    AlarmConfig::new(hour, minute, 5, Some(FEED_URL.to_string())).unwrap()
}

// Armed shortly before the deadline, no feed
#[test]
fn test_rings_with_ramped_default_sound() {
    let h = Harness::new(local(6, 59, 58), Arc::new(FakeResolver::resolving()));

    let deadline = h.controller.set_alarm(config(7, 0)).unwrap();
    assert_eq!(deadline, local(7, 0, 0));
    assert_eq!(h.controller.state(), AlarmState::Armed);
    assert_eq!(h.display.events(), vec![DisplayEvent::NextAlarm(deadline)]);

    thread::sleep(Duration::from_millis(30));
    assert_eq!(h.display.count(&DisplayEvent::Ringing), 0);

    h.clock.advance(chrono::Duration::seconds(2));
    assert!(h.wait_ringing(1));

    let status = h.controller.status();
    assert_eq!(status.state, AlarmState::Ringing);
    assert_eq!(status.volume, Some(0.1));
    assert!(!status.streamed);

    let session = h.controller.session().unwrap();
    assert_eq!(session.kind, PlaybackKind::Ramped);
    assert!(matches!(session.source, PlaybackSource::DefaultSound(_)));
    assert_eq!(h.sink.volumes(session.id), vec![0.1]);
    assert!(h.controller.is_ramping());
}

#[test]
fn test_deadline_equal_to_now_fires_immediately() {
    let h = Harness::new(local(7, 0, 0), Arc::new(FakeResolver::resolving()));

    let deadline = h.controller.set_alarm(config(7, 0)).unwrap();
    assert_eq!(deadline, local(7, 0, 0));
    assert!(h.wait_ringing(1));
}

#[test]
fn test_passed_time_arms_for_tomorrow() {
    let h = Harness::new(local(8, 0, 0), Arc::new(FakeResolver::resolving()));

    let deadline = h.controller.set_alarm(config(7, 0)).unwrap();
    assert_eq!(deadline, local(7, 0, 0) + chrono::Duration::days(1));

    h.clock.advance(chrono::Duration::hours(12));
    thread::sleep(Duration::from_millis(30));
    assert_eq!(h.controller.state(), AlarmState::Armed);
}

// The feed resolves and the episode is streamed
#[test]
fn test_podcast_feed_is_streamed_without_ramp() {
    let resolver = Arc::new(FakeResolver::resolving());
    let h = Harness::new(local(6, 59, 0), resolver.clone());

    h.controller.set_alarm(podcast_config(7, 0)).unwrap();
    h.clock.advance(chrono::Duration::minutes(1));
    assert!(h.wait_ringing(1));

    assert_eq!(resolver.calls(), 1);
    assert_eq!(h.sink.stream_plays(), vec![EPISODE_URL.to_string()]);
    assert_eq!(h.sink.local_plays(), 0);

    let status = h.controller.status();
    assert!(status.streamed);
    assert_eq!(status.volume, Some(1.0));
    assert!(!h.controller.is_ramping());

    let session = h.controller.session().unwrap();
    assert_eq!(session.source, PlaybackSource::Podcast(episode()));
    assert!(h.sink.volumes(session.id).is_empty());
}

// The feed fails and the local sound takes over
#[test]
fn test_feed_failure_falls_back_to_default_sound() {
    let resolver = Arc::new(FakeResolver::failing());
    let h = Harness::new(local(6, 59, 0), resolver.clone());

    h.controller.set_alarm(podcast_config(7, 0)).unwrap();
    h.clock.advance(chrono::Duration::minutes(1));
    assert!(h.wait_ringing(1));

    assert_eq!(resolver.calls(), 1);
    assert!(h.sink.stream_plays().is_empty());
    assert_eq!(h.sink.local_plays(), 1);

    let status = h.controller.status();
    assert_eq!(status.state, AlarmState::Ringing);
    assert!(!status.streamed);
    assert_eq!(status.volume, Some(0.1));
    assert!(h.controller.is_ramping());
    assert!(h.display.errors().is_empty());
}

#[test]
fn test_stream_playback_failure_falls_back_to_default_sound() {
    let h = Harness::with(
        local(6, 59, 0),
        Arc::new(FakeResolver::resolving()),
        FakeSink::failing_stream(),
        fast_settings(),
    );

    h.controller.set_alarm(podcast_config(7, 0)).unwrap();
    h.clock.advance(chrono::Duration::minutes(1));
    assert!(h.wait_ringing(1));

    assert_eq!(h.sink.local_plays(), 1);
    assert_eq!(h.controller.session().unwrap().kind, PlaybackKind::Ramped);
}

// Ring, snooze for five minutes, ring again
#[test]
fn test_snooze_rings_again_after_duration() {
    let h = Harness::new(local(6, 59, 0), Arc::new(FakeResolver::resolving()));

    h.controller.set_alarm(config(7, 0)).unwrap();
    h.clock.advance(chrono::Duration::minutes(1));
    assert!(h.wait_ringing(1));
    let first = h.controller.session().unwrap();

    let snoozed_at = h.clock.now();
    let deadline = h.controller.snooze().unwrap();
    assert_eq!(deadline, snoozed_at + chrono::Duration::minutes(5));
    assert_eq!(h.controller.state(), AlarmState::Snoozing);
    assert_eq!(h.controller.status().deadline, Some(deadline));
    assert!(h.sink.was_stopped(first.id));
    assert!(h.controller.session().is_none());
    assert!(!h.controller.is_ramping());
    assert_eq!(
        h.display.events().last(),
        Some(&DisplayEvent::Countdown(chrono::Duration::minutes(5)))
    );

    h.clock.advance(chrono::Duration::seconds(299));
    thread::sleep(Duration::from_millis(30));
    assert_eq!(h.controller.state(), AlarmState::Snoozing);
    assert_eq!(h.display.count(&DisplayEvent::Ringing), 1);

    h.clock.advance(chrono::Duration::seconds(1));
    assert!(h.wait_ringing(2));
    assert_eq!(h.controller.state(), AlarmState::Ringing);
    assert_eq!(h.sink.local_plays(), 2);
}

#[test]
fn test_stop_while_snoozing_prevents_next_ring() {
    let h = Harness::new(local(6, 59, 0), Arc::new(FakeResolver::resolving()));

    h.controller.set_alarm(config(7, 0)).unwrap();
    h.clock.advance(chrono::Duration::minutes(1));
    assert!(h.wait_ringing(1));
    h.controller.snooze().unwrap();

    h.controller.stop().unwrap();
    assert_eq!(h.controller.state(), AlarmState::Idle);

    h.clock.advance(chrono::Duration::minutes(10));
    thread::sleep(Duration::from_millis(50));
    assert_eq!(h.display.count(&DisplayEvent::Ringing), 1);
    assert_eq!(h.controller.state(), AlarmState::Idle);
}

#[test]
fn test_cancel_while_snoozing_returns_to_idle() {
    let h = Harness::new(local(6, 59, 0), Arc::new(FakeResolver::resolving()));

    h.controller.set_alarm(config(7, 0)).unwrap();
    h.clock.advance(chrono::Duration::minutes(1));
    assert!(h.wait_ringing(1));
    h.controller.snooze().unwrap();

    h.controller.cancel().unwrap();
    assert_eq!(h.controller.state(), AlarmState::Idle);

    h.clock.advance(chrono::Duration::minutes(10));
    thread::sleep(Duration::from_millis(50));
    assert_eq!(h.display.count(&DisplayEvent::Ringing), 1);
}

#[test]
fn test_stop_silences_ringing_alarm() {
    let h = Harness::new(local(6, 59, 0), Arc::new(FakeResolver::resolving()));

    h.controller.set_alarm(config(7, 0)).unwrap();
    h.clock.advance(chrono::Duration::minutes(1));
    assert!(h.wait_ringing(1));
    let session = h.controller.session().unwrap();

    h.controller.stop().unwrap();

    assert!(h.sink.was_stopped(session.id));
    let status = h.controller.status();
    assert_eq!(status.state, AlarmState::Idle);
    assert_eq!(status.config, None);
    assert_eq!(status.volume, None);
    assert!(wait_until(Duration::from_secs(1), || !h.controller.is_ramping()));
    assert_eq!(h.display.events().last(), Some(&DisplayEvent::Idle));

    // Configuration is accepted again
    assert!(h.controller.set_alarm(config(7, 0)).is_ok());
}

// Cancel while armed
#[test]
fn test_cancel_before_deadline_never_rings() {
    let h = Harness::new(local(6, 59, 0), Arc::new(FakeResolver::resolving()));

    h.controller.set_alarm(config(7, 0)).unwrap();
    h.controller.cancel().unwrap();
    assert_eq!(h.controller.state(), AlarmState::Idle);

    h.clock.advance(chrono::Duration::minutes(5));
    thread::sleep(Duration::from_millis(50));

    assert_eq!(h.display.count(&DisplayEvent::Ringing), 0);
    assert!(h.sink.calls().is_empty());
    assert_eq!(h.controller.state(), AlarmState::Idle);

    let deadline = h.controller.set_alarm(config(7, 30)).unwrap();
    assert_eq!(deadline, local(7, 30, 0));
    assert_eq!(h.controller.state(), AlarmState::Armed);
}

#[test]
fn test_cancel_keeps_config_for_rearm() {
    let h = Harness::new(local(6, 0, 0), Arc::new(FakeResolver::resolving()));

    h.controller.set_alarm(podcast_config(7, 15)).unwrap();
    h.controller.cancel().unwrap();

    let last = h.controller.last_config().unwrap();
    assert_eq!(last.time_label(), "07:15");
    assert_eq!(last.feed_url(), Some(FEED_URL));
    assert_eq!(h.controller.status().config, None);
}

#[test]
fn test_cancel_drops_feed_when_not_retained() {
    let settings = ControllerSettings {
        retain_feed_on_cancel: false,
        ..fast_settings()
    };
    let h = Harness::with(
        local(6, 0, 0),
        Arc::new(FakeResolver::resolving()),
        FakeSink::new(),
        settings,
    );

    h.controller.set_alarm(podcast_config(7, 15)).unwrap();
    h.controller.cancel().unwrap();

    let last = h.controller.last_config().unwrap();
    assert_eq!(last.time_label(), "07:15");
    assert_eq!(last.feed_url(), None);
}

#[test]
fn test_volume_ramp_climbs_to_full() {
    let settings = ControllerSettings {
        ramp: RampPolicy {
            step_interval_ms: 2,
            ..RampPolicy::default()
        },
        ..fast_settings()
    };
    let h = Harness::with(
        local(7, 0, 0),
        Arc::new(FakeResolver::resolving()),
        FakeSink::new(),
        settings,
    );

    h.controller.set_alarm(config(7, 0)).unwrap();
    assert!(h.wait_ringing(1));
    let session = h.controller.session().unwrap();

    assert!(wait_until(Duration::from_secs(2), || !h.controller.is_ramping()));

    let volumes = h.sink.volumes(session.id);
    assert_eq!(volumes.first(), Some(&0.1));
    assert_eq!(volumes.last(), Some(&1.0));
    assert!(volumes.windows(2).all(|w| w[0] <= w[1]));
    assert!(volumes.iter().all(|v| (0.1f32..=1.0).contains(v)));
    assert_eq!(h.controller.status().volume, Some(1.0));
}

#[test]
fn test_volume_ramp_halts_when_playback_ends() {
    let settings = ControllerSettings {
        ramp: RampPolicy {
            step_interval_ms: 20,
            ..RampPolicy::default()
        },
        ..fast_settings()
    };
    let h = Harness::with(
        local(7, 0, 0),
        Arc::new(FakeResolver::resolving()),
        FakeSink::new(),
        settings,
    );

    h.controller.set_alarm(config(7, 0)).unwrap();
    assert!(h.wait_ringing(1));
    let session = h.controller.session().unwrap();

    assert!(wait_until(Duration::from_secs(2), || h.sink.volumes(session.id).len() >= 2));
    h.sink.finish(session.id);
    assert!(wait_until(Duration::from_secs(2), || !h.controller.is_ramping()));

    let volumes = h.sink.volumes(session.id);
    assert!(volumes.last().copied().unwrap_or_default() < 1.0);
    thread::sleep(Duration::from_millis(100));
    assert_eq!(h.sink.volumes(session.id), volumes);
    assert_eq!(h.controller.state(), AlarmState::Ringing);
}

#[test]
fn test_stop_during_feed_resolution_discards_late_session() {
    let resolver = Arc::new(GatedResolver::new());
    let h = Harness::new(local(7, 0, 0), resolver.clone());

    h.controller.set_alarm(podcast_config(7, 0)).unwrap();
    assert!(resolver.wait_entered(Duration::from_secs(2)));
    assert_eq!(h.controller.state(), AlarmState::Ringing);

    h.controller.stop().unwrap();
    resolver.release();

    assert!(wait_until(Duration::from_secs(2), || h.sink.stream_plays().len() == 1));
    assert!(wait_until(Duration::from_secs(2), || h
        .sink
        .calls()
        .iter()
        .any(|c| matches!(c, SinkCall::Stop(_)))));

    assert_eq!(h.controller.state(), AlarmState::Idle);
    assert!(h.controller.session().is_none());
    assert_eq!(h.display.count(&DisplayEvent::Ringing), 0);
}

#[test]
fn test_snooze_during_feed_resolution_discards_late_session() {
    let resolver = Arc::new(GatedResolver::new());
    let h = Harness::new(local(7, 0, 0), resolver.clone());

    h.controller.set_alarm(podcast_config(7, 0)).unwrap();
    assert!(resolver.wait_entered(Duration::from_secs(2)));

    h.controller.snooze().unwrap();
    resolver.release();

    assert!(wait_until(Duration::from_secs(2), || h
        .sink
        .calls()
        .iter()
        .any(|c| matches!(c, SinkCall::Stop(_)))));
    assert_eq!(h.controller.state(), AlarmState::Snoozing);
    assert!(h.controller.session().is_none());
}

#[test]
fn test_playback_failure_keeps_ringing_and_reports() {
    let h = Harness::with(
        local(6, 59, 0),
        Arc::new(FakeResolver::resolving()),
        FakeSink::failing_local(),
        fast_settings(),
    );

    h.controller.set_alarm(config(7, 0)).unwrap();
    h.clock.advance(chrono::Duration::minutes(1));
    assert!(h.wait_ringing(1));

    assert_eq!(h.controller.state(), AlarmState::Ringing);
    assert!(h.controller.session().is_none());
    assert!(!h.controller.is_ramping());

    let errors = h.display.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("Playback failed"), "{}", errors[0]);

    h.controller.stop().unwrap();
    assert_eq!(h.controller.state(), AlarmState::Idle);
}

#[test]
fn test_invalid_transitions_are_rejected() {
    let h = Harness::new(local(6, 0, 0), Arc::new(FakeResolver::resolving()));

    assert!(matches!(
        h.controller.snooze(),
        Err(AlarmError::InvalidTransition { state: AlarmState::Idle, .. })
    ));
    assert!(matches!(
        h.controller.stop(),
        Err(AlarmError::InvalidTransition { state: AlarmState::Idle, .. })
    ));
    assert!(matches!(
        h.controller.cancel(),
        Err(AlarmError::InvalidTransition { state: AlarmState::Idle, .. })
    ));

    h.controller.set_alarm(config(7, 0)).unwrap();
    assert!(matches!(
        h.controller.set_alarm(config(8, 0)),
        Err(AlarmError::InvalidTransition { state: AlarmState::Armed, .. })
    ));
    assert!(matches!(
        h.controller.snooze(),
        Err(AlarmError::InvalidTransition { state: AlarmState::Armed, .. })
    ));
    assert!(matches!(
        h.controller.stop(),
        Err(AlarmError::InvalidTransition { state: AlarmState::Armed, .. })
    ));

    h.clock.advance(chrono::Duration::hours(1));
    assert!(h.wait_ringing(1));
    assert!(matches!(
        h.controller.cancel(),
        Err(AlarmError::InvalidTransition { state: AlarmState::Ringing, .. })
    ));
    assert!(matches!(
        h.controller.set_alarm(config(8, 0)),
        Err(AlarmError::InvalidTransition { state: AlarmState::Ringing, .. })
    ));

    // Rejections leave the ring alone
    assert_eq!(h.controller.state(), AlarmState::Ringing);
    assert!(h.controller.session().is_some());
}

#[test]
fn test_refresh_reports_countdown_while_snoozing() {
    let h = Harness::new(local(6, 59, 0), Arc::new(FakeResolver::resolving()));

    h.controller.refresh();
    assert_eq!(h.display.clock_refreshes(), 1);
    assert!(h.display.events().is_empty());

    h.controller.set_alarm(config(7, 0)).unwrap();
    h.clock.advance(chrono::Duration::minutes(1));
    assert!(h.wait_ringing(1));
    h.controller.snooze().unwrap();

    h.clock.advance(chrono::Duration::seconds(90));
    h.controller.refresh();

    assert_eq!(h.display.clock_refreshes(), 2);
    assert_eq!(
        h.display.events().last(),
        Some(&DisplayEvent::Countdown(chrono::Duration::seconds(210)))
    );
}
