use crate::app::{FetchDispatch, Session};
use crate::audio::MediaSink;
use crate::config;

/// Apply the `[playback]` defaults to a fresh session.
pub fn apply_playback_defaults<S, D>(session: &mut Session<S, D>, settings: &config::Settings)
where
    S: MediaSink,
    D: FetchDispatch,
{
    let playback = &settings.playback;
    session.set_shuffle(playback.shuffle);
    session.set_repeat(playback.repeat.into());
    session.set_volume(playback.volume);
    session.engine_mut().set_auto_advance(playback.auto_advance);
}
