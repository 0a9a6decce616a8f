use std::sync::{Arc, Mutex};

use proptest::prelude::*;

use super::{EndTransition, Engine, EngineOptions, Phase};
use crate::backend::PlaybackStatus;
use crate::backend::fake::{Call, FakeOutput};
use crate::error::PlaybackError;
use crate::events::{EventKind, PlayerEvent, PlayerState};
use crate::state::{PlaybackState, RepeatMode};
use crate::track::{Track, TrackMetadata};

const DURATION: f64 = 180.0;

fn engine_with(options: EngineOptions) -> (Engine<FakeOutput>, FakeOutput) {
    let fake = FakeOutput::new();
    fake.set_duration(DURATION);
    (Engine::new(fake.clone(), options), fake)
}

fn engine() -> (Engine<FakeOutput>, FakeOutput) {
    engine_with(EngineOptions::default())
}

fn tracks(n: usize) -> Vec<Track> {
    (0..n)
        .map(|i| Track::new(format!("/music/{i}.mp3")).with_title(format!("Song {i}")))
        .collect()
}

fn tick(current_time: f64, playing: bool) -> PlaybackStatus {
    PlaybackStatus {
        current_time,
        duration: Some(DURATION),
        playing,
        did_just_finish: false,
        is_loaded: true,
    }
}

fn finished() -> PlaybackStatus {
    PlaybackStatus {
        did_just_finish: true,
        ..tick(DURATION + 0.2, false)
    }
}

/// Deliver a natural end through the live listener and let the engine react.
fn end_track(engine: &mut Engine<FakeOutput>, fake: &FakeOutput) {
    fake.emit(finished());
    engine.drain_status();
}

fn record_events(engine: &Engine<FakeOutput>) -> Arc<Mutex<Vec<PlayerEvent>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    for kind in [
        EventKind::PlaybackState,
        EventKind::PlaybackError,
        EventKind::ActiveTrackChanged,
    ] {
        let sink = seen.clone();
        // Handles are dropped on purpose: dropping does not unregister.
        let _ = engine.add_event_listener(kind, move |e| sink.lock().unwrap().push(e.clone()));
    }
    seen
}

fn assert_invariants(state: &PlaybackState) {
    assert_eq!(state.current_index.is_none(), state.queue.is_empty());
    if let Some(i) = state.current_index {
        assert!(i < state.queue.len());
    }
    assert!((0.0..=1.0).contains(&state.volume));
    assert!(state.position >= 0.0);
}

// ===== Queue =====

#[test]
fn set_queue_loads_first_track_without_playing() {
    let (mut engine, fake) = engine();
    engine.set_queue(tracks(3)).unwrap();

    let state = engine.snapshot();
    assert_eq!(state.current_index, Some(0));
    assert!(!state.is_playing);
    assert_eq!(state.position, 0.0);
    assert_eq!(state.duration, DURATION);

    let calls = fake.calls();
    assert!(calls.contains(&Call::Create("/music/0.mp3".into())));
    assert!(!calls.contains(&Call::Play));
    assert_eq!(engine.phase(), Phase::Loaded);
}

#[test]
fn empty_set_queue_resets_everything_and_disposes_the_handle() {
    let (mut engine, fake) = engine();
    engine.set_queue(tracks(3)).unwrap();
    engine.play().unwrap();
    fake.emit(tick(42.0, true));
    engine.drain_status();

    engine.set_queue(Vec::new()).unwrap();

    let state = engine.snapshot();
    assert_eq!(state.current_index, None);
    assert!(state.queue.is_empty());
    assert!(!state.is_playing);
    assert_eq!(state.position, 0.0);
    assert_eq!(state.duration, 0.0);
    assert!(fake.calls().contains(&Call::RemoveHandle));
    assert_eq!(fake.live_listeners(), 0);
    assert_eq!(engine.phase(), Phase::NoTrack);
}

#[test]
fn add_to_empty_queue_loads_but_does_not_play() {
    let (mut engine, fake) = engine();
    engine.add(tracks(2)).unwrap();

    assert_eq!(engine.get_active_track_index(), Some(0));
    assert!(!engine.snapshot().is_playing);
    assert!(fake.calls().contains(&Call::Create("/music/0.mp3".into())));
    assert!(!fake.calls().contains(&Call::Play));
}

#[test]
fn add_appends_without_touching_playback() {
    let (mut engine, fake) = engine();
    engine.set_queue(tracks(1)).unwrap();
    engine.play().unwrap();
    fake.clear_calls();

    engine.add([Track::new("/music/extra.mp3")]).unwrap();

    assert_eq!(engine.get_queue().len(), 2);
    assert_eq!(engine.get_active_track_index(), Some(0));
    assert!(engine.snapshot().is_playing);
    assert!(fake.calls().is_empty());
}

#[test]
fn tracks_without_a_url_are_refused() {
    let (mut engine, _fake) = engine();
    engine.set_queue(vec![Track::new("  ")]).unwrap();
    assert!(engine.get_queue().is_empty());

    let (mut strict, _fake) = engine_with(EngineOptions {
        strict_arguments: true,
        ..EngineOptions::default()
    });
    let err = strict.add([Track::new("")]).unwrap_err();
    assert!(matches!(err, PlaybackError::InvalidArgument(_)));
}

#[test]
fn removing_before_current_shifts_the_index_without_reload() {
    let (mut engine, fake) = engine();
    engine.set_queue(tracks(3)).unwrap();
    engine.skip(2).unwrap();
    fake.clear_calls();

    engine.remove(0).unwrap();

    assert_eq!(engine.get_active_track_index(), Some(1));
    assert_eq!(engine.get_active_track().unwrap().url, "/music/2.mp3");
    assert!(fake.calls().is_empty());
}

#[test]
fn removing_after_current_changes_nothing_but_the_queue() {
    let (mut engine, fake) = engine();
    engine.set_queue(tracks(3)).unwrap();
    fake.clear_calls();

    engine.remove(2).unwrap();

    assert_eq!(engine.get_active_track_index(), Some(0));
    assert_eq!(engine.get_queue().len(), 2);
    assert!(fake.calls().is_empty());
}

#[test]
fn removing_current_loads_the_track_that_took_its_place() {
    let (mut engine, fake) = engine();
    engine.set_queue(tracks(3)).unwrap();
    engine.skip(1).unwrap();
    fake.clear_calls();

    engine.remove(1).unwrap();

    assert_eq!(engine.get_active_track_index(), Some(1));
    assert_eq!(engine.get_active_track().unwrap().url, "/music/2.mp3");
    assert!(fake.calls().contains(&Call::Replace("/music/2.mp3".into())));
}

#[test]
fn removing_current_while_playing_does_not_restart_playback() {
    let (mut engine, fake) = engine();
    engine.set_queue(tracks(3)).unwrap();
    engine.skip(1).unwrap();
    engine.play().unwrap();
    fake.clear_calls();

    engine.remove(1).unwrap();

    assert_eq!(engine.get_active_track().unwrap().url, "/music/2.mp3");
    let calls = fake.calls();
    assert!(calls.contains(&Call::Replace("/music/2.mp3".into())));
    assert!(!calls.contains(&Call::Play));

    // The replacement's own status decides whether audio is running.
    fake.emit(tick(0.5, false));
    engine.drain_status();
    assert!(!engine.snapshot().is_playing);
    assert_eq!(engine.phase(), Phase::Paused);
}

#[test]
fn removing_current_last_track_steps_back() {
    let (mut engine, _fake) = engine();
    engine.set_queue(tracks(3)).unwrap();
    engine.skip(2).unwrap();

    engine.remove(2).unwrap();

    assert_eq!(engine.get_active_track_index(), Some(1));
}

#[test]
fn removing_the_only_track_disposes_the_backend() {
    let (mut engine, fake) = engine();
    let events = record_events(&engine);
    engine.set_queue(tracks(1)).unwrap();

    engine.remove(0).unwrap();

    assert_eq!(engine.get_active_track_index(), None);
    assert!(fake.calls().contains(&Call::RemoveHandle));
    assert!(
        events
            .lock()
            .unwrap()
            .contains(&PlayerEvent::ActiveTrackChanged(None))
    );
}

#[test]
fn out_of_range_remove_is_a_no_op_unless_strict() {
    let (mut engine, _fake) = engine();
    engine.set_queue(tracks(2)).unwrap();
    engine.remove(5).unwrap();
    assert_eq!(engine.get_queue().len(), 2);

    let (mut strict, _fake) = engine_with(EngineOptions {
        strict_arguments: true,
        ..EngineOptions::default()
    });
    strict.set_queue(tracks(2)).unwrap();
    assert!(matches!(
        strict.remove(5),
        Err(PlaybackError::InvalidArgument(_))
    ));
    assert_eq!(strict.get_queue().len(), 2);
}

#[test]
fn reset_clears_queue_and_handle() {
    let (mut engine, fake) = engine();
    engine.set_queue(tracks(2)).unwrap();
    engine.play().unwrap();

    engine.reset();

    let state = engine.snapshot();
    assert!(state.queue.is_empty());
    assert_eq!(state.current_index, None);
    assert!(!state.is_playing);
    assert_eq!(fake.live_listeners(), 0);
}

#[test]
fn metadata_updates_merge_but_keep_the_url() {
    let (mut engine, _fake) = engine();
    engine.set_queue(tracks(2)).unwrap();

    engine
        .update_metadata_for_track(
            1,
            TrackMetadata {
                title: Some("Renamed".into()),
                rating: Some(1),
                ..TrackMetadata::default()
            },
        )
        .unwrap();
    engine
        .update_metadata_for_track(9, TrackMetadata::default())
        .unwrap();

    let queue = engine.get_queue();
    assert_eq!(queue[1].url, "/music/1.mp3");
    assert_eq!(queue[1].title.as_deref(), Some("Renamed"));
    assert_eq!(queue[1].rating, 1);
    assert_eq!(queue[0].title.as_deref(), Some("Song 0"));
}

// ===== Transport =====

#[test]
fn play_configures_output_then_starts_the_handle() {
    let (mut engine, fake) = engine();
    engine.set_queue(tracks(1)).unwrap();
    fake.clear_calls();

    engine.play().unwrap();

    assert_eq!(fake.calls(), vec![Call::Configure, Call::Play]);
    assert!(engine.snapshot().is_playing);
    assert_eq!(engine.phase(), Phase::Playing);
}

#[test]
fn play_on_an_empty_queue_does_nothing() {
    let (mut engine, fake) = engine();
    engine.play().unwrap();
    assert!(fake.calls().is_empty());
    assert!(!engine.snapshot().is_playing);
}

#[test]
fn pause_twice_is_the_same_as_once() {
    let (mut engine, _fake) = engine();
    engine.set_queue(tracks(2)).unwrap();
    engine.play().unwrap();

    engine.pause();
    let once = engine.snapshot();
    engine.pause();
    let twice = engine.snapshot();

    assert_eq!(*once, *twice);
    assert!(!twice.is_playing);
}

#[test]
fn pause_without_a_track_never_fails() {
    let (mut engine, fake) = engine();
    engine.pause();
    assert!(fake.calls().is_empty());
}

#[test]
fn stop_rewinds_and_pauses() {
    let (mut engine, fake) = engine();
    engine.set_queue(tracks(1)).unwrap();
    engine.play().unwrap();
    fake.emit(tick(30.0, true));
    engine.drain_status();

    engine.stop().unwrap();

    let state = engine.snapshot();
    assert!(!state.is_playing);
    assert_eq!(state.position, 0.0);
    assert!(fake.calls().contains(&Call::SeekTo(0.0)));
}

#[test]
fn seek_updates_position_optimistically() {
    let (mut engine, fake) = engine();
    engine.seek_to(10.0).unwrap();
    assert!(fake.calls().is_empty());

    engine.set_queue(tracks(1)).unwrap();
    engine.seek_to(42.5).unwrap();
    assert_eq!(engine.snapshot().position, 42.5);
    assert!(fake.calls().contains(&Call::SeekTo(42.5)));
}

#[test]
fn failed_seek_is_reported() {
    let (mut engine, fake) = engine();
    let events = record_events(&engine);
    engine.set_queue(tracks(1)).unwrap();
    fake.fail_next_seek();

    assert!(matches!(engine.seek_to(5.0), Err(PlaybackError::Backend(_))));
    assert!(
        events
            .lock()
            .unwrap()
            .iter()
            .any(|e| e.kind() == EventKind::PlaybackError)
    );
}

#[test]
fn skip_then_previous_lands_on_the_middle_track() {
    let (mut engine, _fake) = engine();
    engine.set_queue(tracks(3)).unwrap();

    engine.skip(2).unwrap();
    engine.skip_to_previous().unwrap();

    assert_eq!(engine.get_active_track_index(), Some(1));
    assert_eq!(engine.get_active_track().unwrap().url, "/music/1.mp3");
}

#[test]
fn next_wraps_from_last_to_first() {
    let (mut engine, _fake) = engine();
    engine.set_queue(tracks(3)).unwrap();
    engine.skip(2).unwrap();

    engine.skip_to_next().unwrap();

    assert_eq!(engine.get_active_track_index(), Some(0));
}

#[test]
fn previous_wraps_from_first_to_last() {
    let (mut engine, _fake) = engine();
    engine.set_queue(tracks(3)).unwrap();

    engine.skip_to_previous().unwrap();

    assert_eq!(engine.get_active_track_index(), Some(2));
}

#[test]
fn next_and_previous_on_an_empty_queue_do_nothing() {
    let (mut engine, fake) = engine();
    engine.skip_to_next().unwrap();
    engine.skip_to_previous().unwrap();
    assert!(fake.calls().is_empty());
}

#[test]
fn skip_keeps_playing_when_already_playing() {
    let (mut engine, fake) = engine();
    engine.set_queue(tracks(3)).unwrap();
    engine.play().unwrap();
    fake.clear_calls();

    engine.skip(1).unwrap();

    assert!(engine.snapshot().is_playing);
    assert!(fake.calls().contains(&Call::Play));
}

#[test]
fn skip_while_paused_stays_paused_at_zero() {
    let (mut engine, fake) = engine();
    engine.set_queue(tracks(3)).unwrap();
    fake.clear_calls();

    engine.skip(2).unwrap();

    let state = engine.snapshot();
    assert!(!state.is_playing);
    assert_eq!(state.position, 0.0);
    assert!(!fake.calls().contains(&Call::Play));
}

#[test]
fn skip_to_index_can_force_autoplay() {
    let (mut engine, _fake) = engine();
    engine.set_queue(tracks(3)).unwrap();

    engine.skip_to_index(1, Some(true)).unwrap();

    assert!(engine.snapshot().is_playing);
}

#[test]
fn out_of_range_skip_is_ignored() {
    let (mut engine, _fake) = engine();
    engine.set_queue(tracks(3)).unwrap();
    engine.skip(3).unwrap();
    assert_eq!(engine.get_active_track_index(), Some(0));
}

#[test]
fn volume_outside_unit_range_is_ignored() {
    let (mut engine, fake) = engine();
    engine.set_queue(tracks(1)).unwrap();

    engine.set_volume(0.8).unwrap();
    engine.set_volume(1.5).unwrap();
    engine.set_volume(-0.1).unwrap();
    engine.set_volume(f32::NAN).unwrap();

    assert_eq!(engine.get_volume(), 0.8);
    assert!(fake.calls().contains(&Call::SetVolume(0.8)));
    assert!(!fake.calls().contains(&Call::SetVolume(1.5)));
}

#[test]
fn new_tracks_inherit_volume_and_loop_flag() {
    let (mut engine, fake) = engine();
    engine.set_volume(0.6).unwrap();
    engine.set_repeat_mode(RepeatMode::Track);

    engine.set_queue(tracks(1)).unwrap();

    let calls = fake.calls();
    assert!(calls.contains(&Call::SetVolume(0.6)));
    assert!(calls.contains(&Call::SetLoop(true)));
}

#[test]
fn repeat_mode_toggles_the_loop_flag_on_the_loaded_track() {
    let (mut engine, fake) = engine();
    engine.set_queue(tracks(2)).unwrap();
    fake.clear_calls();

    engine.set_repeat_mode(RepeatMode::Track);
    engine.set_repeat_mode(RepeatMode::Off);

    assert_eq!(fake.calls(), vec![Call::SetLoop(true), Call::SetLoop(false)]);
    assert_eq!(engine.get_repeat_mode(), RepeatMode::Off);
}

// ===== Natural end =====

#[test]
fn repeat_track_replays_the_same_index() {
    let (mut engine, fake) = engine();
    engine.set_queue(tracks(3)).unwrap();
    engine.set_repeat_mode(RepeatMode::Track);
    engine.skip(1).unwrap();
    engine.play().unwrap();
    fake.clear_calls();

    end_track(&mut engine, &fake);

    let state = engine.snapshot();
    assert_eq!(state.current_index, Some(1));
    assert!(state.is_playing);
    assert_eq!(state.position, 0.0);
    assert_eq!(fake.calls(), vec![Call::SeekTo(0.0), Call::Play]);
}

#[test]
fn natural_end_advances_and_keeps_playing() {
    let (mut engine, fake) = engine();
    engine.set_repeat_mode(RepeatMode::Off);
    engine.set_queue(tracks(3)).unwrap();
    engine.play().unwrap();

    end_track(&mut engine, &fake);

    let state = engine.snapshot();
    assert_eq!(state.current_index, Some(1));
    assert!(state.is_playing);
}

#[test]
fn repeat_queue_wraps_to_the_first_track() {
    let (mut engine, fake) = engine();
    engine.set_queue(tracks(3)).unwrap();
    engine.skip(2).unwrap();
    engine.play().unwrap();

    end_track(&mut engine, &fake);

    let state = engine.snapshot();
    assert_eq!(state.current_index, Some(0));
    assert!(state.is_playing);
}

#[test]
fn end_of_queue_with_repeat_off_stops_at_duration() {
    let (mut engine, fake) = engine();
    let events = record_events(&engine);
    engine.set_repeat_mode(RepeatMode::Off);
    engine.set_queue(tracks(2)).unwrap();
    engine.skip(1).unwrap();
    engine.play().unwrap();

    end_track(&mut engine, &fake);

    let state = engine.snapshot();
    assert_eq!(state.current_index, Some(1));
    assert!(!state.is_playing);
    assert_eq!(state.position, state.duration);
    assert_eq!(engine.phase(), Phase::Ended);
    assert_eq!(
        events.lock().unwrap().last(),
        Some(&PlayerEvent::PlaybackState(PlayerState::Stopped))
    );
}

#[test]
fn end_of_queue_reports_a_single_stop() {
    let (mut engine, fake) = engine();
    engine.set_repeat_mode(RepeatMode::Off);
    engine.set_queue(tracks(1)).unwrap();
    engine.play().unwrap();
    let events = record_events(&engine);

    end_track(&mut engine, &fake);

    assert_eq!(
        *events.lock().unwrap(),
        vec![PlayerEvent::PlaybackState(PlayerState::Stopped)]
    );
}

#[test]
fn repeat_track_end_is_not_a_state_change() {
    let (mut engine, fake) = engine();
    engine.set_repeat_mode(RepeatMode::Track);
    engine.set_queue(tracks(1)).unwrap();
    engine.play().unwrap();
    let events = record_events(&engine);

    end_track(&mut engine, &fake);

    assert!(engine.snapshot().is_playing);
    assert!(events.lock().unwrap().is_empty());
}

#[test]
fn play_after_the_queue_ended_restarts_the_track() {
    let (mut engine, fake) = engine();
    engine.set_repeat_mode(RepeatMode::Off);
    engine.set_queue(tracks(1)).unwrap();
    engine.play().unwrap();
    end_track(&mut engine, &fake);
    fake.clear_calls();

    engine.play().unwrap();

    assert_eq!(engine.snapshot().position, 0.0);
    assert_eq!(
        fake.calls(),
        vec![Call::Configure, Call::SeekTo(0.0), Call::Play]
    );
    assert_eq!(engine.phase(), Phase::Playing);
}

#[test]
fn end_transition_priority() {
    let state = |index: Option<usize>, len: usize, mode| PlaybackState {
        queue: tracks(len).into(),
        current_index: index,
        repeat_mode: mode,
        ..PlaybackState::default()
    };

    assert_eq!(
        EndTransition::decide(&state(None, 0, RepeatMode::Track)),
        EndTransition::Ignore
    );
    assert_eq!(
        EndTransition::decide(&state(Some(0), 3, RepeatMode::Track)),
        EndTransition::RepeatTrack
    );
    assert_eq!(
        EndTransition::decide(&state(Some(0), 3, RepeatMode::Queue)),
        EndTransition::Advance(1)
    );
    assert_eq!(
        EndTransition::decide(&state(Some(2), 3, RepeatMode::Queue)),
        EndTransition::WrapToStart
    );
    assert_eq!(
        EndTransition::decide(&state(Some(2), 3, RepeatMode::Off)),
        EndTransition::Finish
    );
}

// ===== Status reconciliation =====

#[test]
fn status_ticks_update_position_duration_and_playing() {
    let (mut engine, fake) = engine();
    let events = record_events(&engine);
    engine.set_queue(tracks(1)).unwrap();
    events.lock().unwrap().clear();

    fake.emit(tick(12.5, true));
    fake.emit(tick(12.75, true));
    assert_eq!(engine.drain_status(), 2);

    let state = engine.snapshot();
    assert_eq!(state.position, 12.75);
    assert_eq!(state.duration, DURATION);
    assert!(state.is_playing);
    // One transition, not one event per tick.
    assert_eq!(
        *events.lock().unwrap(),
        vec![PlayerEvent::PlaybackState(PlayerState::Playing)]
    );
}

#[test]
fn finish_from_a_superseded_load_is_dropped() {
    let (mut engine, fake) = engine();
    engine.set_queue(tracks(3)).unwrap();
    engine.skip(1).unwrap();

    // Listener 0 belonged to track 0 and was removed by the skip.
    fake.emit_on(0, finished());
    assert_eq!(engine.drain_status(), 1);

    assert_eq!(engine.get_active_track_index(), Some(1));
    assert_eq!(engine.snapshot().position, 0.0);
}

#[test]
fn unloaded_and_malformed_ticks_are_ignored() {
    let (mut engine, fake) = engine();
    engine.set_queue(tracks(1)).unwrap();
    let before = engine.snapshot();

    fake.emit(PlaybackStatus {
        is_loaded: false,
        ..tick(9.0, true)
    });
    fake.emit(tick(-3.0, true));
    fake.emit(tick(f64::NAN, true));
    fake.emit(PlaybackStatus {
        duration: Some(f64::INFINITY),
        ..tick(1.0, true)
    });
    engine.drain_status();

    assert_eq!(*engine.snapshot(), *before);
}

#[test]
fn unknown_duration_keeps_the_last_known_one() {
    let (mut engine, fake) = engine();
    engine.set_queue(tracks(1)).unwrap();

    fake.emit(PlaybackStatus {
        duration: None,
        ..tick(3.0, true)
    });
    engine.drain_status();

    assert_eq!(engine.snapshot().duration, DURATION);
}

#[test]
fn stale_ticks_after_reset_are_dropped() {
    let (mut engine, fake) = engine();
    engine.set_queue(tracks(2)).unwrap();
    engine.reset();

    fake.emit_on(0, tick(50.0, true));
    engine.drain_status();

    assert!(!engine.snapshot().is_playing);
    assert_eq!(engine.snapshot().position, 0.0);
}

// ===== Failures =====

#[test]
fn failed_load_rejects_and_keeps_the_new_index() {
    let (mut engine, fake) = engine();
    let events = record_events(&engine);
    engine.set_queue(tracks(3)).unwrap();
    fake.fail_next_load();

    let err = engine.skip(1).unwrap_err();

    assert!(matches!(err, PlaybackError::BackendLoad { index: 1, .. }));
    assert_eq!(engine.get_active_track_index(), Some(1));
    assert_eq!(fake.live_listeners(), 0);
    assert!(
        events
            .lock()
            .unwrap()
            .iter()
            .any(|e| matches!(e, PlayerEvent::PlaybackError(_)))
    );
}

#[test]
fn failed_load_while_playing_stops() {
    let (mut engine, fake) = engine();
    engine.set_queue(tracks(3)).unwrap();
    engine.play().unwrap();
    let events = record_events(&engine);
    fake.fail_next_load();

    assert!(engine.skip(1).is_err());

    let state = engine.snapshot();
    assert_eq!(state.current_index, Some(1));
    assert!(!state.is_playing);
    assert_ne!(engine.phase(), Phase::Playing);
    assert_eq!(fake.live_listeners(), 0);
    assert!(fake.calls().contains(&Call::RemoveHandle));
    assert_eq!(
        events.lock().unwrap().last(),
        Some(&PlayerEvent::PlaybackState(PlayerState::Stopped))
    );
}

#[test]
fn play_retries_a_track_that_failed_to_load() {
    let (mut engine, fake) = engine();
    engine.set_queue(tracks(3)).unwrap();
    fake.fail_next_load();
    assert!(engine.skip(1).is_err());
    fake.clear_calls();

    engine.play().unwrap();

    assert!(fake.calls().contains(&Call::Create("/music/1.mp3".into())));
    assert!(engine.snapshot().is_playing);
    assert_eq!(fake.live_listeners(), 1);
}

// ===== Events and subscriptions =====

#[test]
fn active_track_changes_are_announced() {
    let (mut engine, _fake) = engine();
    let events = record_events(&engine);

    engine.set_queue(tracks(2)).unwrap();
    engine.skip_to_next().unwrap();

    let changes: Vec<PlayerEvent> = events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| e.kind() == EventKind::ActiveTrackChanged)
        .cloned()
        .collect();
    assert_eq!(
        changes,
        vec![
            PlayerEvent::ActiveTrackChanged(Some(0)),
            PlayerEvent::ActiveTrackChanged(Some(1)),
        ]
    );
}

#[test]
fn removed_event_listener_is_not_called_again() {
    let (mut engine, _fake) = engine();
    let count = Arc::new(Mutex::new(0));
    let counter = count.clone();
    let handle = engine.add_event_listener(EventKind::PlaybackState, move |_| {
        *counter.lock().unwrap() += 1;
    });

    engine.pause();
    handle.remove();
    engine.pause();

    assert_eq!(*count.lock().unwrap(), 1);
}

#[test]
fn state_subscribers_see_consistent_snapshots() {
    let (mut engine, _fake) = engine();
    let store = engine.store().clone();
    let violations = Arc::new(Mutex::new(0));
    let seen = violations.clone();
    let _sub = engine.subscribe(move || {
        let state = store.snapshot();
        if state.current_index.is_none() != state.queue.is_empty() {
            *seen.lock().unwrap() += 1;
        }
    });

    engine.set_queue(tracks(3)).unwrap();
    engine.remove(0).unwrap();
    engine.add(tracks(1)).unwrap();
    engine.reset();

    assert_eq!(*violations.lock().unwrap(), 0);
}

#[test]
fn options_seed_the_initial_state() {
    let (engine, _fake) = engine_with(EngineOptions {
        volume: 0.7,
        repeat_mode: RepeatMode::Off,
        strict_arguments: false,
    });
    assert_eq!(engine.get_volume(), 0.7);
    assert_eq!(engine.get_repeat_mode(), RepeatMode::Off);

    let (engine, _fake) = engine_with(EngineOptions {
        volume: 4.0,
        ..EngineOptions::default()
    });
    assert_eq!(engine.get_volume(), crate::state::DEFAULT_VOLUME);
}

#[test]
fn teardown_releases_the_handle_and_stops() {
    let (mut engine, fake) = engine();
    engine.set_queue(tracks(1)).unwrap();
    engine.play().unwrap();

    engine.teardown();

    assert!(!engine.snapshot().is_playing);
    assert!(fake.calls().contains(&Call::RemoveHandle));
    assert_eq!(fake.live_listeners(), 0);
}

// ===== Properties =====

#[derive(Debug, Clone)]
enum Op {
    SetQueue(usize),
    Add(usize),
    Remove(usize),
    Skip(usize),
    Next,
    Previous,
    Play,
    Pause,
    Stop,
    Seek(f64),
    Volume(f32),
    Repeat(u8),
    Tick(f64, bool),
    End,
    FailNextLoad,
    Reset,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..5).prop_map(Op::SetQueue),
        (0usize..3).prop_map(Op::Add),
        (0usize..6).prop_map(Op::Remove),
        (0usize..6).prop_map(Op::Skip),
        Just(Op::Next),
        Just(Op::Previous),
        Just(Op::Play),
        Just(Op::Pause),
        Just(Op::Stop),
        (-10.0f64..300.0).prop_map(Op::Seek),
        (-0.5f32..1.5).prop_map(Op::Volume),
        (0u8..3).prop_map(Op::Repeat),
        (0.0f64..200.0, any::<bool>()).prop_map(|(t, p)| Op::Tick(t, p)),
        Just(Op::End),
        Just(Op::FailNextLoad),
        Just(Op::Reset),
    ]
}

fn apply(engine: &mut Engine<FakeOutput>, fake: &FakeOutput, op: Op) {
    // Rejections are fine here; only the reachable states matter.
    let _ = match op {
        Op::SetQueue(n) => engine.set_queue(tracks(n)),
        Op::Add(n) => engine.add(tracks(n)),
        Op::Remove(i) => engine.remove(i),
        Op::Skip(i) => engine.skip(i),
        Op::Next => engine.skip_to_next(),
        Op::Previous => engine.skip_to_previous(),
        Op::Play => engine.play(),
        Op::Pause => {
            engine.pause();
            Ok(())
        }
        Op::Stop => engine.stop(),
        Op::Seek(s) => engine.seek_to(s),
        Op::Volume(v) => engine.set_volume(v),
        Op::Repeat(m) => {
            engine.set_repeat_mode(match m {
                0 => RepeatMode::Off,
                1 => RepeatMode::Track,
                _ => RepeatMode::Queue,
            });
            Ok(())
        }
        Op::Tick(t, playing) => {
            fake.emit(tick(t, playing));
            engine.drain_status();
            Ok(())
        }
        Op::End => {
            end_track(engine, fake);
            Ok(())
        }
        Op::FailNextLoad => {
            fake.fail_next_load();
            Ok(())
        }
        Op::Reset => {
            engine.reset();
            Ok(())
        }
    };
}

proptest! {
    /// Every reachable state keeps the index, volume and position invariants.
    #[test]
    fn reachable_states_hold_invariants(ops in prop::collection::vec(op(), 1..40)) {
        let (mut engine, fake) = engine();
        for op in ops {
            apply(&mut engine, &fake, op);
            assert_invariants(&engine.snapshot());
            prop_assert!(fake.live_listeners() <= 1);
        }
    }

    /// With track repeat on, a natural end never moves the index.
    #[test]
    fn repeat_track_never_advances(len in 1usize..6, start in 0usize..6) {
        let (mut engine, fake) = engine();
        engine.set_queue(tracks(len)).unwrap();
        engine.set_repeat_mode(RepeatMode::Track);
        let start = start % len;
        engine.skip_to_index(start, Some(true)).unwrap();

        end_track(&mut engine, &fake);

        prop_assert_eq!(engine.get_active_track_index(), Some(start));
        prop_assert!(engine.snapshot().is_playing);
    }
}
