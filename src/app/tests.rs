use super::*;
use crate::audio::testing::ScriptedSink;
use crate::audio::{EngineState, LoadOutcome, LoadTicket, PROGRESS, RepeatMode, SinkEvent};
use crate::bus::{Notice, NotificationBus};
use crate::error::{FetchError, LoadError, PlaybackError, SessionError};
use crate::library::{Manifest, TRACK_CHANGED};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct RecordingFetcher {
    audio: Vec<LoadTicket>,
    art: Vec<(String, String)>,
}

impl FetchDispatch for RecordingFetcher {
    fn request_audio(&mut self, ticket: &LoadTicket) {
        self.audio.push(ticket.clone());
    }

    fn request_art(&mut self, album_id: &str, file_name: &str) {
        self.art.push((album_id.to_string(), file_name.to_string()));
    }
}

fn manifest() -> Manifest {
    serde_json::from_str(
        r#"{
            "albums": {
                "a1": {"name": "Demo", "artist": "DJ", "art": "demo.jpg"},
                "a2": {"name": "Other", "artist": "Band"}
            },
            "tracks": [
                {"id": "t1", "title": "Song", "albumId": "a1", "duration": 180, "fileName": "s1.mp3"},
                {"id": "t2", "title": "Next", "albumId": "a1", "duration": 200, "fileName": "s2.mp3"},
                {"id": "t3", "title": "Elsewhere", "albumId": "a2", "fileName": "s3.mp3"}
            ]
        }"#,
    )
    .unwrap()
}

type TestSession = Session<ScriptedSink, RecordingFetcher>;

fn session() -> (TestSession, ScriptedSink) {
    let bus = Arc::new(NotificationBus::new());
    let sink = ScriptedSink::new();
    let mut s = Session::new(
        bus,
        sink.clone(),
        RecordingFetcher::default(),
        StdRng::seed_from_u64(1),
    );
    s.load_library(manifest());
    (s, sink)
}

fn last_token(s: &TestSession) -> u64 {
    s.fetcher().audio.last().unwrap().token
}

fn file_names(s: &TestSession) -> Vec<&str> {
    s.fetcher()
        .audio
        .iter()
        .map(|t| t.file_name.as_str())
        .collect()
}

// Session

#[test]
fn selecting_a_track_fetches_it_once_and_plays() {
    let (mut s, sink) = session();

    assert!(s.play_track("t1"));
    assert_eq!(file_names(&s), vec!["s1.mp3"]);
    assert_eq!(s.store().current_track().map(|t| t.id.as_str()), Some("t1"));
    assert_eq!(s.engine().state(), EngineState::Loading);

    let outcome = s.on_audio_fetched(last_token(&s), Ok(vec![0; 32])).unwrap();
    assert_eq!(outcome, LoadOutcome::Ready);
    assert!(s.engine().is_playing());
    assert_eq!(sink.script().bound.as_deref(), Some("s1.mp3"));
    assert_eq!(file_names(&s), vec!["s1.mp3"]);
}

#[test]
fn unknown_track_id_changes_nothing() {
    let (mut s, _sink) = session();
    assert!(!s.play_track("nope"));
    assert!(s.fetcher().audio.is_empty());
    assert!(s.store().current_track().is_none());
}

#[test]
fn later_selection_wins_the_load_race() {
    let (mut s, sink) = session();
    s.play_track("t1");
    let x = last_token(&s);
    s.play_track("t2");
    let y = last_token(&s);

    assert_eq!(
        s.on_audio_fetched(y, Ok(vec![2; 8])).unwrap(),
        LoadOutcome::Ready
    );
    assert_eq!(
        s.on_audio_fetched(x, Ok(vec![1; 8])).unwrap(),
        LoadOutcome::Superseded
    );

    assert_eq!(sink.script().binds, vec!["s2.mp3"]);
    assert_eq!(s.store().current_track().map(|t| t.id.as_str()), Some("t2"));
    assert_eq!(s.engine().live_resources(), 1);
}

#[test]
fn natural_end_advances_to_the_next_queued_track() {
    let (mut s, sink) = session();
    s.play_track("t1");
    s.on_audio_fetched(last_token(&s), Ok(vec![0; 8])).unwrap();

    sink.push(SinkEvent::Ended);
    s.tick();

    assert_eq!(file_names(&s), vec!["s1.mp3", "s2.mp3"]);
    assert_eq!(s.store().current_track().map(|t| t.id.as_str()), Some("t2"));
    assert_eq!(s.engine().state(), EngineState::Loading);
}

#[test]
fn end_of_queue_stops_without_another_load() {
    let (mut s, sink) = session();
    let ended = Arc::new(Mutex::new(0));
    let e = ended.clone();
    s.bus()
        .subscribe(crate::audio::ENDED, move |_| *e.lock().unwrap() += 1);

    s.queue_album("a2");
    s.play_track("t3");
    s.on_audio_fetched(last_token(&s), Ok(vec![0; 8])).unwrap();

    sink.push(SinkEvent::Ended);
    s.tick();
    s.tick();

    assert_eq!(s.engine().state(), EngineState::Ended);
    assert_eq!(file_names(&s), vec!["s3.mp3"]);
    assert_eq!(*ended.lock().unwrap(), 1);
}

#[test]
fn duplicate_ids_in_the_manifest_still_reach_the_end_of_the_queue() {
    let (mut s, sink) = session();
    let ended = Arc::new(Mutex::new(0));
    let e = ended.clone();
    s.bus()
        .subscribe(crate::audio::ENDED, move |_| *e.lock().unwrap() += 1);

    s.load_library(
        serde_json::from_str(
            r#"{"tracks": [
                {"id": "A", "fileName": "a.mp3"},
                {"id": "B", "fileName": "b.mp3"},
                {"id": "A", "fileName": "a-again.mp3"}
            ]}"#,
        )
        .unwrap(),
    );
    assert_eq!(s.sequencer().queue(), ["A".to_string(), "B".to_string()]);

    s.play_track("A");
    s.on_audio_fetched(last_token(&s), Ok(vec![0; 8])).unwrap();
    sink.push(SinkEvent::Ended);
    s.tick();

    s.on_audio_fetched(last_token(&s), Ok(vec![0; 8])).unwrap();
    sink.push(SinkEvent::Ended);
    s.tick();
    s.tick();

    assert_eq!(file_names(&s), vec!["a.mp3", "b.mp3"]);
    assert_eq!(s.engine().state(), EngineState::Ended);
    assert_eq!(*ended.lock().unwrap(), 1);
}

#[test]
fn repeat_one_reloads_the_same_track() {
    let (mut s, sink) = session();
    s.set_repeat(RepeatMode::One);
    s.play_track("t1");
    s.on_audio_fetched(last_token(&s), Ok(vec![0; 8])).unwrap();

    sink.push(SinkEvent::Ended);
    s.tick();
    assert_eq!(file_names(&s), vec!["s1.mp3", "s1.mp3"]);
}

#[test]
fn skip_next_ignores_repeat_one() {
    let (mut s, _sink) = session();
    s.set_repeat(RepeatMode::One);
    s.play_track("t1");

    assert!(s.skip_next());
    assert_eq!(s.store().current_track().map(|t| t.id.as_str()), Some("t2"));
    assert!(s.skip_previous());
    assert_eq!(s.store().current_track().map(|t| t.id.as_str()), Some("t1"));
    assert!(!s.skip_previous());
}

#[test]
fn failed_fetch_reports_and_leaves_engine_idle() {
    let (mut s, _sink) = session();
    s.play_track("t1");

    let err = s
        .on_audio_fetched(last_token(&s), Err(FetchError::Auth))
        .unwrap_err();
    assert!(err.is_auth());
    assert_eq!(s.engine().state(), EngineState::Idle);
    assert_eq!(s.engine().live_resources(), 0);
}

#[test]
fn rejected_autoplay_keeps_the_track_ready() {
    let (mut s, sink) = session();
    sink.script().reject_play = true;
    s.play_track("t1");

    let err = s
        .on_audio_fetched(last_token(&s), Ok(vec![0; 8]))
        .unwrap_err();
    assert!(matches!(
        err,
        SessionError::Playback(PlaybackError::Rejected(_))
    ));
    assert_eq!(s.engine().state(), EngineState::Ready);

    sink.script().reject_play = false;
    s.toggle_play_pause().unwrap();
    assert!(s.engine().is_playing());
}

#[test]
fn play_pause_reloads_after_the_end() {
    let (mut s, sink) = session();
    s.engine_mut().set_auto_advance(false);
    s.play_track("t2");
    s.on_audio_fetched(last_token(&s), Ok(vec![0; 8])).unwrap();
    sink.push(SinkEvent::Ended);
    s.tick();
    assert_eq!(s.engine().state(), EngineState::Ended);

    s.toggle_play_pause().unwrap();
    assert_eq!(file_names(&s), vec!["s2.mp3", "s2.mp3"]);
}

#[test]
fn play_pause_with_nothing_selected_is_refused() {
    let (mut s, _sink) = session();
    assert_eq!(s.toggle_play_pause(), Err(PlaybackError::NothingLoaded));
}

#[test]
fn shutdown_twice_is_harmless() {
    let (mut s, sink) = session();
    s.play_track("t1");
    s.on_audio_fetched(last_token(&s), Ok(vec![0; 8])).unwrap();

    s.shutdown();
    s.shutdown();
    assert_eq!(s.engine().state(), EngineState::Destroyed);
    assert_eq!(s.engine().live_resources(), 0);
    assert!(sink.script().bound.is_none());
    assert!(!s.play_track("t2"));
    assert!(matches!(
        s.on_audio_fetched(99, Ok(vec![1])),
        Err(SessionError::Load(LoadError::Destroyed))
    ));
}

#[test]
fn queue_filtered_view_replaces_library_order() {
    let (mut s, _sink) = session();
    s.filter("elsewhere");
    assert_eq!(s.queue_filtered(), 1);
    assert_eq!(s.sequencer().queue(), ["t3".to_string()].as_slice());

    s.reset_queue();
    assert_eq!(s.sequencer().queue().len(), 3);
    assert!(!s.sequencer().is_explicit());
}

#[test]
fn empty_filter_does_not_clear_the_queue() {
    let (mut s, _sink) = session();
    s.filter("zzz");
    assert_eq!(s.queue_filtered(), 0);
    assert_eq!(s.sequencer().queue().len(), 3);
}

#[test]
fn reload_keeps_the_playing_track_current() {
    let (mut s, _sink) = session();
    s.play_track("t2");
    s.load_library(manifest());
    assert_eq!(s.store().current_track().map(|t| t.id.as_str()), Some("t2"));
}

#[test]
fn art_is_requested_once_per_album() {
    let (mut s, _sink) = session();
    s.play_track("t1");
    s.play_track("t2");
    assert_eq!(
        s.fetcher().art,
        vec![("a1".to_string(), "demo.jpg".to_string())]
    );
    assert!(!s.art_available());

    s.on_art_fetched("a1", Some(vec![0xff, 0xd8]));
    assert!(s.art_available());

    // Album without art clears it.
    s.play_track("t3");
    assert!(!s.art_available());
    s.on_art_fetched("a1", Some(vec![1]));
    assert!(!s.art_available());
}

#[test]
fn volume_adjusts_within_bounds() {
    let (mut s, _sink) = session();
    assert_eq!(s.adjust_volume(0.5), 1.0);
    assert!((s.adjust_volume(-0.25) - 0.75).abs() < f32::EPSILON);
    s.set_volume(0.0);
    assert_eq!(s.adjust_volume(-0.1), 0.0);
}

#[test]
fn shuffle_moves_the_playing_track_first() {
    let (mut s, _sink) = session();
    s.play_track("t2");
    assert!(s.toggle_shuffle());
    assert_eq!(s.sequencer().queue()[0], "t2");
    s.set_shuffle(false);
    assert_eq!(
        s.sequencer().queue(),
        ["t1", "t2", "t3"].map(String::from).as_slice()
    );
}

// App view model

#[test]
fn app_tracks_progress_and_failures_from_notices() {
    let mut app = App::new(true);
    app.apply_notice(
        PROGRESS,
        &Notice::Progress {
            position: Duration::from_secs(3),
            duration: Some(Duration::from_secs(60)),
        },
    );
    assert_eq!(app.position, Duration::from_secs(3));
    assert_eq!(app.duration, Some(Duration::from_secs(60)));

    app.apply_notice(crate::audio::FAILED, &Notice::Message("boom".into()));
    assert_eq!(app.status.as_deref(), Some("boom"));

    app.apply_notice(TRACK_CHANGED, &Notice::Track("t9".into()));
    assert_eq!(app.pending_follow.as_deref(), Some("t9"));
    assert_eq!(app.position, Duration::ZERO);
}

#[test]
fn app_follow_off_ignores_track_changes() {
    let mut app = App::new(false);
    app.apply_notice(TRACK_CHANGED, &Notice::Track("t1".into()));
    assert!(app.pending_follow.is_none());
}

#[test]
fn move_selection_wraps() {
    let mut app = App::new(true);
    app.move_selection(-1, 3);
    assert_eq!(app.selected, 2);
    app.move_selection(1, 3);
    assert_eq!(app.selected, 0);
    app.move_selection(1, 0);
    assert_eq!(app.selected, 0);
}

#[test]
fn album_detail_returns_to_album_cursor() {
    let mut app = App::new(true);
    app.toggle_view();
    assert_eq!(app.view, View::Albums);
    app.selected = 4;
    app.open_album("a1");
    assert_eq!(app.view, View::Album("a1".into()));
    assert_eq!(app.selected, 0);

    assert!(app.back());
    assert_eq!(app.view, View::Albums);
    assert_eq!(app.selected, 4);
    assert!(!app.back());
}

#[test]
fn filter_mode_switches_to_tracks_and_stops_following() {
    let mut app = App::new(true);
    app.toggle_view();
    app.enter_filter_mode();
    assert_eq!(app.view, View::Tracks);
    assert_eq!(app.input, InputMode::Filter);
    assert!(!app.follow_playback);

    app.push_filter_char('a');
    app.push_filter_char('b');
    app.pop_filter_char();
    assert_eq!(app.filter_query, "a");
    app.clear_filter();
    assert_eq!(app.filter_query, "");
    assert_eq!(app.input, InputMode::Normal);
}

#[test]
fn take_token_trims_and_rejects_blank() {
    let mut app = App::new(true);
    app.enter_token_mode();
    app.token_input = "  tok ".into();
    assert_eq!(app.take_token().as_deref(), Some("tok"));
    assert_eq!(app.input, InputMode::Normal);

    app.enter_token_mode();
    app.token_input = "   ".into();
    assert_eq!(app.take_token(), None);
}

#[test]
fn match_positions_is_case_insensitive_substring() {
    assert_eq!(App::match_positions("Hello World", "WOR"), Some(vec![6, 7, 8]));
    assert_eq!(App::match_positions("Hello", ""), Some(vec![]));
    assert_eq!(App::match_positions("Hello", "hw"), None);
}

#[test]
fn visible_ids_follow_the_view() {
    let (mut s, _) = session();
    let mut app = App::new(true);
    assert_eq!(app.visible_ids(s.store()), vec!["t1", "t2", "t3"]);

    s.filter("else");
    assert_eq!(app.visible_ids(s.store()), vec!["t3"]);

    app.toggle_view();
    // Band sorts before DJ.
    assert_eq!(app.visible_ids(s.store()), vec!["a2", "a1"]);

    app.open_album("a1");
    assert_eq!(app.visible_ids(s.store()), vec!["t1", "t2"]);
}

#[test]
fn follow_waits_until_the_track_is_visible() {
    let mut app = App::new(true);
    app.apply_notice(TRACK_CHANGED, &Notice::Track("t2".into()));

    let ids: Vec<String> = vec!["t1".into(), "t3".into()];
    app.apply_follow(&ids);
    assert_eq!(app.selected, 0);
    assert_eq!(app.pending_follow.as_deref(), Some("t2"));

    let ids: Vec<String> = vec!["t1".into(), "t2".into()];
    app.apply_follow(&ids);
    assert_eq!(app.selected, 1);
    assert!(app.pending_follow.is_none());
}
