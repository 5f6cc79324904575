use std::time::Duration;

use egui::{Color32, CornerRadius, Key, Rect, Sense, Ui, Vec2};

/// Colors used to paint a [`TimeBar`].
#[derive(Debug, Clone, Copy)]
pub struct TimeBarStyle {
    /// The empty track.
    pub track: Color32,
    /// The buffered-ahead region.
    pub buffered: Color32,
    /// The played region and the scrub handle.
    pub played: Color32,
}

impl Default for TimeBarStyle {
    fn default() -> Self {
        Self {
            track: Color32::from_white_alpha(40),
            buffered: Color32::from_white_alpha(90),
            played: Color32::WHITE,
        }
    }
}

/// Drag protocol reported by [`TimeBar::show`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrubEvent {
    /// A drag began at the given media position.
    Started(Duration),
    /// The drag moved to the given media position.
    Moved(Duration),
    /// The drag finished. Cancelled drags commit nothing.
    Stopped {
        /// Last dragged-to media position.
        position: Duration,
        /// True when the drag was abandoned (Escape).
        cancelled: bool,
    },
}

/// Seek bar: track, buffered region, played region and a scrub handle.
///
/// The bar only displays what it was last told through the setters; whoever
/// owns it decides when to re-read the engine.
#[derive(Debug, Default)]
pub struct TimeBar {
    duration: Option<Duration>,
    position: Duration,
    buffered: Duration,
    /// In-progress scrub position, shown instead of `position` while dragging.
    scrub: Option<Duration>,
    /// Track width of the last render, in pixels.
    width_px: f32,
}

impl TimeBar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_position(&mut self, position: Duration) {
        self.position = position;
    }

    pub fn set_buffered_position(&mut self, buffered: Duration) {
        self.buffered = buffered;
    }

    pub fn set_duration(&mut self, duration: Option<Duration>) {
        self.duration = duration;
    }

    pub fn is_scrubbing(&self) -> bool {
        self.scrub.is_some()
    }

    /// Media time covered by one pixel of the track, used to pace progress
    /// updates. An unknown duration or an unrendered bar reports `fallback`.
    pub fn preferred_update_delay(&self, fallback: Duration) -> Duration {
        match self.duration {
            Some(duration) if self.width_px >= 1.0 => duration.div_f32(self.width_px),
            _ => fallback,
        }
    }

    /// Paints the bar into `rect` and reports drag activity.
    pub fn show(
        &mut self,
        ui: &mut Ui,
        rect: Rect,
        id: egui::Id,
        style: &TimeBarStyle,
        fade: f32,
    ) -> Option<ScrubEvent> {
        self.width_px = rect.width();

        let hit_rect = rect.expand2(Vec2::new(0.0, 8.0));
        let response = ui.interact(hit_rect, id, Sense::click_and_drag());
        let active = response.hovered() || response.dragged();

        let frac = |at: Duration| -> f32 {
            match self.duration {
                Some(duration) if !duration.is_zero() => {
                    (at.as_secs_f32() / duration.as_secs_f32()).clamp(0.0, 1.0)
                }
                _ => 0.0,
            }
        };
        let shown = self.scrub.unwrap_or(self.position);

        ui.painter()
            .rect_filled(rect, CornerRadius::same(2), style.track.linear_multiply(fade));
        let buffered_rect =
            Rect::from_min_size(rect.min, Vec2::new(rect.width() * frac(self.buffered), rect.height()));
        ui.painter().rect_filled(
            buffered_rect,
            CornerRadius::same(2),
            style.buffered.linear_multiply(fade),
        );
        let played_rect =
            Rect::from_min_size(rect.min, Vec2::new(rect.width() * frac(shown), rect.height()));
        ui.painter().rect_filled(
            played_rect,
            CornerRadius::same(2),
            style.played.linear_multiply(fade),
        );
        let handle_radius = if active { 7.0 } else { 5.0 };
        ui.painter().circle_filled(
            played_rect.right_center(),
            handle_radius,
            style.played.linear_multiply(fade),
        );

        let Some(duration) = self.duration else {
            return None;
        };
        let position_at = |x: f32| -> Duration {
            let rel = ((x - rect.min.x) / rect.width().max(1.0)).clamp(0.0, 1.0);
            duration.mul_f32(rel)
        };

        if self.scrub.is_some() && ui.input(|i| i.key_pressed(Key::Escape)) {
            self.scrub = None;
            return Some(ScrubEvent::Stopped {
                position: self.position,
                cancelled: true,
            });
        }

        if response.drag_started() {
            if let Some(pointer) = response.interact_pointer_pos() {
                let at = position_at(pointer.x);
                self.scrub = Some(at);
                return Some(ScrubEvent::Started(at));
            }
        } else if response.dragged() {
            if let Some(pointer) = response.interact_pointer_pos() {
                let at = position_at(pointer.x);
                self.scrub = Some(at);
                return Some(ScrubEvent::Moved(at));
            }
        } else if response.drag_stopped() && self.scrub.is_some() {
            let position = self.scrub.take().unwrap_or(self.position);
            return Some(ScrubEvent::Stopped {
                position,
                cancelled: false,
            });
        } else if response.clicked() {
            // A plain click commits like an instant drag.
            if let Some(pointer) = response.interact_pointer_pos() {
                return Some(ScrubEvent::Stopped {
                    position: position_at(pointer.x),
                    cancelled: false,
                });
            }
        }
        None
    }
}

/// Formats a media time like the player clock: `H:MM:SS` over an hour,
/// `MM:SS` below.
pub fn format_time(at: Duration) -> String {
    let total = at.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn format_time_rolls_over_units() {
        assert_eq!(format_time(ms(0)), "00:00");
        assert_eq!(format_time(ms(65_000)), "01:05");
        assert_eq!(format_time(ms(600_500)), "10:00");
        assert_eq!(format_time(ms(3_661_000)), "1:01:01");
    }

    #[test]
    fn preferred_delay_is_media_time_per_pixel() {
        let mut bar = TimeBar::new();
        bar.set_duration(Some(ms(90_000)));
        bar.width_px = 450.0;

        assert_eq!(bar.preferred_update_delay(ms(1000)), ms(200));
    }

    #[test]
    fn preferred_delay_falls_back_when_unknown() {
        let mut bar = TimeBar::new();
        assert_eq!(bar.preferred_update_delay(ms(1000)), ms(1000));

        // Known duration but never rendered: still the fallback.
        bar.set_duration(Some(ms(90_000)));
        assert_eq!(bar.preferred_update_delay(ms(1000)), ms(1000));
    }
}
