use std::time::Duration;

use anyhow::{Context, Result};
use egui_inbox::UiInboxSender;
use url::Url;

#[cfg(feature = "sim-engine")]
mod sim;
#[cfg(feature = "sim-engine")]
pub use sim::{SimEngine, SimEngineProvider};

/// Coarse playback state reported by a [`PlayerEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Nothing prepared, or playback stopped (a failed load lands here too).
    Idle,
    /// Media is loading and cannot play yet.
    Buffering,
    /// Enough media is available to play.
    Ready,
    /// Playback reached the end of the last item.
    Ended,
}

/// Change notification pushed by a [`PlayerEngine`] to its subscriber.
///
/// Variants carry no data; the receiver re-reads whichever accessors it cares
/// about, which lets an engine coalesce bursts of changes freely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    /// [`PlayerEngine::state`] changed.
    StateChanged,
    /// [`PlayerEngine::play_when_ready`] changed.
    PlayWhenReadyChanged,
    /// [`PlayerEngine::is_playing`] changed.
    IsPlayingChanged,
    /// The position jumped (seek or item transition).
    PositionDiscontinuity,
    /// [`PlayerEngine::timeline`] changed.
    TimelineChanged,
    /// Playback parameters (the speed) changed.
    ParametersChanged,
}

/// One playable item in a [`Timeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineWindow {
    /// Duration of this item.
    pub duration: Duration,
}

/// Ordered sequence of playable items with per-item durations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timeline {
    /// The items, in playback order.
    pub windows: Vec<TimelineWindow>,
}

/// A concrete (item, in-item position) seek destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekTarget {
    /// Index of the timeline item to seek into.
    pub item: usize,
    /// Position inside that item.
    pub position: Duration,
}

impl Timeline {
    /// Builds a timeline from per-item durations.
    pub fn new(durations: impl IntoIterator<Item = Duration>) -> Self {
        Self {
            windows: durations
                .into_iter()
                .map(|duration| TimelineWindow { duration })
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    /// The window at `item`, if it exists.
    pub fn window(&self, item: usize) -> Option<&TimelineWindow> {
        self.windows.get(item)
    }

    /// Sum of all item durations.
    pub fn total_duration(&self) -> Duration {
        self.windows.iter().map(|w| w.duration).sum()
    }

    /// Maps a flat position onto an (item, offset) pair by walking the item
    /// durations in order. Positions past the end clamp to the end of the
    /// last item; an empty timeline yields `fallback_item` at the requested
    /// position.
    pub fn resolve(&self, position: Duration, fallback_item: usize) -> SeekTarget {
        if self.windows.is_empty() {
            return SeekTarget {
                item: fallback_item,
                position,
            };
        }
        let mut position = position;
        let last = self.windows.len() - 1;
        for (item, window) in self.windows.iter().enumerate() {
            if position < window.duration {
                return SeekTarget { item, position };
            }
            if item == last {
                return SeekTarget {
                    item,
                    position: window.duration,
                };
            }
            position -= window.duration;
        }
        unreachable!()
    }
}

/// A single-URL media source handed to the engine by the host.
#[derive(Debug, Clone)]
pub struct MediaSource {
    url: Url,
}

impl MediaSource {
    /// Builds a media source from a URL string.
    pub fn from_url(url: &str) -> Result<Self> {
        let url = Url::parse(url).with_context(|| format!("invalid media url: {url}"))?;
        Ok(Self { url })
    }

    /// The media URL.
    pub fn url(&self) -> &Url {
        &self.url
    }
}

/// Transport and state surface of a playback engine.
///
/// The controls only ever talk to an engine through this trait; concrete
/// engines are created by an [`EngineProvider`] owned by the host, never
/// inside the UI layer.
pub trait PlayerEngine {
    /// Starts loading the current media source. No-op unless idle.
    fn prepare(&mut self);
    /// Resumes playback (sets play-when-ready).
    fn play(&mut self);
    /// Pauses playback (clears play-when-ready).
    fn pause(&mut self);
    /// Stops playback and returns to idle, keeping the position.
    fn stop(&mut self);
    /// Releases all engine resources; further commands are ignored.
    fn release(&mut self);
    /// Sets whether playback should run once the engine is ready.
    fn set_play_when_ready(&mut self, play: bool);
    /// Seeks within the current item.
    fn seek(&mut self, position: Duration);
    /// Seeks to a position inside the given item.
    fn seek_to(&mut self, item: usize, position: Duration);
    /// Applies a playback speed multiplier.
    fn set_speed(&mut self, speed: f32);
    /// Replaces the media to play.
    fn set_media_source(&mut self, source: MediaSource);

    fn state(&self) -> PlaybackState;
    fn play_when_ready(&self) -> bool;
    /// Whether media time is advancing right now.
    fn is_playing(&self) -> bool;
    /// Playback position inside the current item.
    fn position(&self) -> Duration;
    /// How far data is buffered ahead inside the current item.
    fn buffered_position(&self) -> Duration;
    /// Duration of the current item, when known.
    fn duration(&self) -> Option<Duration>;
    /// Index of the current timeline item.
    fn current_item(&self) -> usize;
    /// The current timeline; empty until media is prepared.
    fn timeline(&self) -> Timeline;
    /// Current playback speed multiplier.
    fn speed(&self) -> f32;

    /// Registers the single event subscriber, replacing any previous one.
    fn subscribe(&mut self, sink: UiInboxSender<EngineEvent>);
}

/// Factory for playback engines, injected by the host.
pub trait EngineProvider {
    /// Builds a fresh engine.
    fn create(&self) -> Result<Box<dyn PlayerEngine>>;
}
