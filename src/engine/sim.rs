use std::cell::{Cell, RefCell};
use std::time::{Duration, Instant};

use anyhow::Result;
use egui_inbox::UiInboxSender;
use log::debug;

use super::{
    EngineEvent, EngineProvider, MediaSource, PlaybackState, PlayerEngine, Timeline,
};

/// How long [`SimEngine`] pretends to buffer after `prepare`.
const DEFAULT_STARTUP: Duration = Duration::from_millis(400);

/// How far `buffered_position` leads the playback position.
const BUFFER_LOOKAHEAD: Duration = Duration::from_secs(2);

/// Clock-driven engine for hosts and tests that have no real engine to hand
/// over.
///
/// Only playback timing is simulated: the position advances against the wall
/// clock while playing, scaled by the speed; no media is fetched or decoded.
/// Clock-driven transitions (buffering finished, end of media) are folded in
/// lazily on every command and accessor, which the controls' refresh cadence
/// triggers often enough.
pub struct SimEngine {
    timeline: RefCell<Timeline>,
    source: RefCell<Option<MediaSource>>,
    sink: RefCell<Option<UiInboxSender<EngineEvent>>>,

    state: Cell<PlaybackState>,
    play_when_ready: Cell<bool>,
    speed: Cell<f32>,
    item: Cell<usize>,
    /// Position inside the current item as of `anchor`.
    base: Cell<Duration>,
    /// Wall-clock instant `base` was taken at.
    anchor: Cell<Instant>,
    /// When the simulated buffering completes.
    ready_at: Cell<Option<Instant>>,
    startup: Duration,
    released: Cell<bool>,
}

impl SimEngine {
    pub fn new(timeline: Timeline) -> Self {
        Self::with_startup(timeline, DEFAULT_STARTUP)
    }

    /// Like [`SimEngine::new`] with an explicit simulated buffering delay.
    pub fn with_startup(timeline: Timeline, startup: Duration) -> Self {
        Self {
            timeline: RefCell::new(timeline),
            source: RefCell::new(None),
            sink: RefCell::new(None),
            state: Cell::new(PlaybackState::Idle),
            play_when_ready: Cell::new(false),
            speed: Cell::new(1.0),
            item: Cell::new(0),
            base: Cell::new(Duration::ZERO),
            anchor: Cell::new(Instant::now()),
            ready_at: Cell::new(None),
            startup,
            released: Cell::new(false),
        }
    }

    fn emit(&self, event: EngineEvent) {
        if let Some(sink) = self.sink.borrow().as_ref() {
            let _ = sink.send(event);
        }
    }

    fn playing(&self) -> bool {
        self.state.get() == PlaybackState::Ready && self.play_when_ready.get()
    }

    fn item_duration(&self) -> Option<Duration> {
        self.timeline
            .borrow()
            .window(self.item.get())
            .map(|w| w.duration)
    }

    fn set_state(&self, next: PlaybackState) {
        let prev = self.state.get();
        if prev == next {
            return;
        }
        let was_playing = self.playing();
        self.state.set(next);
        debug!("engine state {prev:?} -> {next:?}");
        self.emit(EngineEvent::StateChanged);
        if was_playing != self.playing() {
            self.emit(EngineEvent::IsPlayingChanged);
        }
    }

    /// Folds wall-clock progress into the discrete state.
    fn sync_at(&self, now: Instant) {
        if self.released.get() {
            return;
        }
        if let Some(at) = self.ready_at.get() {
            if now >= at {
                self.ready_at.set(None);
                self.anchor.set(at);
                self.set_state(PlaybackState::Ready);
            }
        }
        if !self.playing() {
            self.anchor.set(now);
            return;
        }

        let elapsed = now.saturating_duration_since(self.anchor.get());
        self.anchor.set(self.anchor.get().max(now));
        let mut position = self.base.get() + elapsed.mul_f32(self.speed.get().max(0.0));
        loop {
            let Some(duration) = self.item_duration() else {
                self.base.set(position);
                return;
            };
            if position < duration {
                self.base.set(position);
                return;
            }
            let last = self.timeline.borrow().len().saturating_sub(1);
            if self.item.get() >= last {
                self.base.set(duration);
                self.set_state(PlaybackState::Ended);
                return;
            }
            position -= duration;
            self.item.set(self.item.get() + 1);
            self.emit(EngineEvent::PositionDiscontinuity);
        }
    }

    fn prepare_at(&self, now: Instant) {
        self.sync_at(now);
        if self.state.get() != PlaybackState::Idle || self.source.borrow().is_none() {
            return;
        }
        self.set_state(PlaybackState::Buffering);
        self.ready_at.set(Some(now + self.startup));
        self.emit(EngineEvent::TimelineChanged);
    }

    fn set_play_when_ready_at(&self, play: bool, now: Instant) {
        self.sync_at(now);
        if self.play_when_ready.get() == play {
            return;
        }
        let was_playing = self.playing();
        self.play_when_ready.set(play);
        self.emit(EngineEvent::PlayWhenReadyChanged);
        if was_playing != self.playing() {
            self.emit(EngineEvent::IsPlayingChanged);
        }
    }

    fn seek_at(&self, item: Option<usize>, position: Duration, now: Instant) {
        self.sync_at(now);
        if let Some(item) = item {
            let last = self.timeline.borrow().len().saturating_sub(1);
            self.item.set(item.min(last));
        }
        let clamped = match self.item_duration() {
            Some(duration) => position.min(duration),
            None => position,
        };
        self.base.set(clamped);
        self.anchor.set(now);
        if self.state.get() == PlaybackState::Ended {
            self.set_state(PlaybackState::Ready);
        }
        self.emit(EngineEvent::PositionDiscontinuity);
    }

    fn set_speed_at(&self, speed: f32, now: Instant) {
        self.sync_at(now);
        self.speed.set(speed);
        self.emit(EngineEvent::ParametersChanged);
    }

    fn stop_at(&self, now: Instant) {
        self.sync_at(now);
        self.ready_at.set(None);
        self.set_state(PlaybackState::Idle);
    }

    fn position_at(&self, now: Instant) -> Duration {
        self.sync_at(now);
        self.base.get()
    }
}

impl PlayerEngine for SimEngine {
    fn prepare(&mut self) {
        if self.released.get() {
            return;
        }
        self.prepare_at(Instant::now());
    }

    fn play(&mut self) {
        self.set_play_when_ready(true);
    }

    fn pause(&mut self) {
        self.set_play_when_ready(false);
    }

    fn stop(&mut self) {
        if self.released.get() {
            return;
        }
        self.stop_at(Instant::now());
    }

    fn release(&mut self) {
        self.sync_at(Instant::now());
        self.released.set(true);
        self.state.set(PlaybackState::Idle);
        *self.sink.borrow_mut() = None;
        debug!("engine released");
    }

    fn set_play_when_ready(&mut self, play: bool) {
        if self.released.get() {
            return;
        }
        self.set_play_when_ready_at(play, Instant::now());
    }

    fn seek(&mut self, position: Duration) {
        if self.released.get() {
            return;
        }
        self.seek_at(None, position, Instant::now());
    }

    fn seek_to(&mut self, item: usize, position: Duration) {
        if self.released.get() {
            return;
        }
        self.seek_at(Some(item), position, Instant::now());
    }

    fn set_speed(&mut self, speed: f32) {
        if self.released.get() {
            return;
        }
        self.set_speed_at(speed, Instant::now());
    }

    fn set_media_source(&mut self, source: MediaSource) {
        if self.released.get() {
            return;
        }
        let now = Instant::now();
        self.sync_at(now);
        debug!("media source set: {}", source.url());
        *self.source.borrow_mut() = Some(source);
        self.item.set(0);
        self.base.set(Duration::ZERO);
        self.anchor.set(now);
        self.ready_at.set(None);
        self.set_state(PlaybackState::Idle);
        self.emit(EngineEvent::TimelineChanged);
    }

    fn state(&self) -> PlaybackState {
        self.sync_at(Instant::now());
        self.state.get()
    }

    fn play_when_ready(&self) -> bool {
        self.play_when_ready.get()
    }

    fn is_playing(&self) -> bool {
        self.sync_at(Instant::now());
        self.playing()
    }

    fn position(&self) -> Duration {
        self.position_at(Instant::now())
    }

    fn buffered_position(&self) -> Duration {
        let position = self.position_at(Instant::now());
        if self.state.get() == PlaybackState::Idle {
            return position;
        }
        match self.item_duration() {
            Some(duration) => (position + BUFFER_LOOKAHEAD).min(duration),
            None => position,
        }
    }

    fn duration(&self) -> Option<Duration> {
        self.sync_at(Instant::now());
        if self.state.get() == PlaybackState::Idle {
            return None;
        }
        self.item_duration()
    }

    fn current_item(&self) -> usize {
        self.sync_at(Instant::now());
        self.item.get()
    }

    fn timeline(&self) -> Timeline {
        self.sync_at(Instant::now());
        if self.state.get() == PlaybackState::Idle {
            return Timeline::default();
        }
        self.timeline.borrow().clone()
    }

    fn speed(&self) -> f32 {
        self.speed.get()
    }

    fn subscribe(&mut self, sink: UiInboxSender<EngineEvent>) {
        *self.sink.borrow_mut() = Some(sink);
    }
}

/// Builds [`SimEngine`]s for hosts without a real engine.
pub struct SimEngineProvider {
    /// Per-item durations of the simulated timeline.
    pub item_durations: Vec<Duration>,
    /// Simulated buffering delay after `prepare`.
    pub startup: Duration,
}

impl Default for SimEngineProvider {
    fn default() -> Self {
        Self {
            item_durations: vec![Duration::from_secs(90)],
            startup: DEFAULT_STARTUP,
        }
    }
}

impl EngineProvider for SimEngineProvider {
    fn create(&self) -> Result<Box<dyn PlayerEngine>> {
        Ok(Box::new(SimEngine::with_startup(
            Timeline::new(self.item_durations.iter().copied()),
            self.startup,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui_inbox::UiInbox;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn engine(durations: &[u64]) -> SimEngine {
        let mut engine = SimEngine::with_startup(
            Timeline::new(durations.iter().map(|&d| ms(d))),
            ms(100),
        );
        engine.set_media_source(MediaSource::from_url("http://example.com/a.mp4").unwrap());
        engine
    }

    #[test]
    fn prepare_reaches_ready_after_startup() {
        let engine = engine(&[10_000]);
        let t0 = Instant::now();

        engine.prepare_at(t0);
        assert_eq!(engine.state.get(), PlaybackState::Buffering);

        engine.sync_at(t0 + ms(99));
        assert_eq!(engine.state.get(), PlaybackState::Buffering);

        engine.sync_at(t0 + ms(100));
        assert_eq!(engine.state.get(), PlaybackState::Ready);
    }

    #[test]
    fn position_advances_only_while_playing() {
        let engine = engine(&[10_000]);
        let t0 = Instant::now();
        engine.prepare_at(t0);
        engine.sync_at(t0 + ms(100));

        // Ready but not playing: the clock does not accrue.
        assert_eq!(engine.position_at(t0 + ms(600)), ms(0));

        engine.set_play_when_ready_at(true, t0 + ms(600));
        assert_eq!(engine.position_at(t0 + ms(1600)), ms(1000));

        engine.set_play_when_ready_at(false, t0 + ms(1600));
        assert_eq!(engine.position_at(t0 + ms(5000)), ms(1000));
    }

    #[test]
    fn speed_scales_the_clock() {
        let engine = engine(&[60_000]);
        let t0 = Instant::now();
        engine.prepare_at(t0);
        engine.sync_at(t0 + ms(100));
        engine.set_play_when_ready_at(true, t0 + ms(100));
        engine.set_speed_at(2.0, t0 + ms(100));

        assert_eq!(engine.position_at(t0 + ms(1100)), ms(2000));
    }

    #[test]
    fn crossing_the_last_item_end_yields_ended() {
        let engine = engine(&[1000]);
        let t0 = Instant::now();
        engine.prepare_at(t0);
        engine.sync_at(t0 + ms(100));
        engine.set_play_when_ready_at(true, t0 + ms(100));

        assert_eq!(engine.position_at(t0 + ms(5000)), ms(1000));
        assert_eq!(engine.state.get(), PlaybackState::Ended);
        assert!(!engine.playing());
    }

    #[test]
    fn crossing_an_interior_boundary_advances_the_item() {
        let engine = engine(&[1000, 4000]);
        let t0 = Instant::now();
        engine.prepare_at(t0);
        engine.sync_at(t0 + ms(100));
        engine.set_play_when_ready_at(true, t0 + ms(100));

        assert_eq!(engine.position_at(t0 + ms(1600)), ms(500));
        assert_eq!(engine.item.get(), 1);
        assert_eq!(engine.state.get(), PlaybackState::Ready);
    }

    #[test]
    fn seek_out_of_ended_restores_ready() {
        let engine = engine(&[1000]);
        let t0 = Instant::now();
        engine.prepare_at(t0);
        engine.sync_at(t0 + ms(100));
        engine.set_play_when_ready_at(true, t0 + ms(100));
        engine.sync_at(t0 + ms(3000));
        assert_eq!(engine.state.get(), PlaybackState::Ended);

        engine.seek_at(Some(0), ms(0), t0 + ms(3000));
        assert_eq!(engine.state.get(), PlaybackState::Ready);
        assert_eq!(engine.base.get(), ms(0));
    }

    #[test]
    fn seek_clamps_to_item_duration() {
        let engine = engine(&[1000]);
        let t0 = Instant::now();
        engine.prepare_at(t0);
        engine.sync_at(t0 + ms(100));

        engine.seek_at(None, ms(9999), t0 + ms(100));
        assert_eq!(engine.base.get(), ms(1000));
    }

    #[test]
    fn transitions_reach_the_subscriber() {
        let mut engine = engine(&[1000]);
        let inbox: UiInbox<EngineEvent> = UiInbox::new();
        engine.subscribe(inbox.sender());

        let t0 = Instant::now();
        engine.prepare_at(t0);
        engine.set_play_when_ready_at(true, t0);
        engine.sync_at(t0 + ms(100));

        let events: Vec<_> = inbox.read_without_ctx().collect();
        assert!(events.contains(&EngineEvent::StateChanged));
        assert!(events.contains(&EngineEvent::PlayWhenReadyChanged));
        assert!(events.contains(&EngineEvent::IsPlayingChanged));
    }

    #[test]
    fn released_engine_ignores_commands() {
        let mut engine = engine(&[1000]);
        engine.release();
        engine.prepare();
        engine.play();

        assert_eq!(engine.state.get(), PlaybackState::Idle);
        assert!(!engine.play_when_ready.get());
    }

    #[test]
    fn timeline_is_empty_until_prepared() {
        let engine = engine(&[1000]);
        assert!(engine.timeline().is_empty());
        assert_eq!(engine.duration(), None);

        let t0 = Instant::now();
        engine.prepare_at(t0);
        assert_eq!(engine.timeline.borrow().len(), 1);
    }
}
