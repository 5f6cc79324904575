use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use egui::{pos2, Align2, Color32, CornerRadius, FontId, Rect, Sense, Ui, Vec2};
use log::info;

use crate::engine::{EngineProvider, MediaSource, PlayerEngine};
use crate::overlay::{ControllerOverlay, OverlayConfig};

/// What happened inside [`PlayerScreen::show`] this frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScreenResponse {
    /// The close control was clicked; the host should end the screen.
    pub close_requested: bool,
}

/// Single-screen host: owns the engine, the playback surface and the
/// controls.
///
/// The engine comes from the injected [`EngineProvider`]; the screen itself
/// never builds one. The close control is drawn outside the overlay and its
/// visibility mirrors the controls through the overlay's auxiliary flag.
pub struct PlayerScreen {
    engine: Box<dyn PlayerEngine>,
    overlay: ControllerOverlay,
    close_visible: Arc<AtomicBool>,
    destroyed: bool,
}

impl PlayerScreen {
    /// Builds the engine through `provider`, points it at `media_url` and
    /// wires up the controls.
    pub fn new(provider: &dyn EngineProvider, media_url: &str) -> Result<Self> {
        Self::with_config(provider, media_url, OverlayConfig::default())
    }

    /// Like [`PlayerScreen::new`] with explicit overlay configuration.
    pub fn with_config(
        provider: &dyn EngineProvider,
        media_url: &str,
        config: OverlayConfig,
    ) -> Result<Self> {
        let source = MediaSource::from_url(media_url)?;
        let mut engine = provider.create()?;
        engine.set_media_source(source);

        let mut overlay = ControllerOverlay::with_config(config);
        let close_visible = Arc::new(AtomicBool::new(false));
        overlay.set_aux_visibility(close_visible.clone());
        overlay.attach(engine.as_mut());
        info!("player screen ready: {media_url}");

        Ok(Self {
            engine,
            overlay,
            close_visible,
            destroyed: false,
        })
    }

    /// Resumes playback when the host comes to the foreground.
    pub fn resume(&mut self) {
        if !self.destroyed {
            self.engine.set_play_when_ready(true);
        }
    }

    /// Halts playback when the host leaves the foreground.
    pub fn stop(&mut self) {
        if !self.destroyed {
            self.engine.stop();
            self.engine.set_play_when_ready(false);
        }
    }

    /// Releases the engine; the screen draws nothing afterwards.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.overlay.detach();
        self.engine.release();
        self.destroyed = true;
    }

    /// Draws the playback surface, the controls and the close control.
    pub fn show(&mut self, ui: &mut Ui) -> ScreenResponse {
        let mut response = ScreenResponse::default();
        if self.destroyed {
            return response;
        }

        let rect = ui.available_rect_before_wrap();
        let surface = ui.allocate_rect(rect, Sense::click());
        ui.painter()
            .rect_filled(rect, CornerRadius::ZERO, Color32::BLACK);

        self.overlay.show(ui, &surface, self.engine.as_mut());

        if self.close_visible.load(Ordering::Relaxed) {
            let size = 28.0;
            let close_rect = Rect::from_min_size(
                pos2(rect.max.x - size - 12.0, rect.min.y + 12.0),
                Vec2::splat(size),
            );
            let close = ui.interact(close_rect, surface.id.with("close"), Sense::click());
            if close.hovered() {
                ui.painter().rect_filled(
                    close_rect,
                    CornerRadius::same(4),
                    Color32::from_white_alpha(30),
                );
            }
            ui.painter().text(
                close_rect.center(),
                Align2::CENTER_CENTER,
                "✕",
                FontId::proportional(16.0),
                Color32::WHITE,
            );
            if close.clicked() {
                response.close_requested = true;
            }
        }
        response
    }
}

#[cfg(test)]
#[cfg(feature = "sim-engine")]
mod tests {
    use super::*;
    use crate::engine::SimEngineProvider;

    #[test]
    fn screen_builds_from_provider_and_url() {
        let provider = SimEngineProvider::default();
        let screen = PlayerScreen::new(&provider, "http://example.com/movie.mp4");
        assert!(screen.is_ok());
    }

    #[test]
    fn screen_rejects_a_bad_url() {
        let provider = SimEngineProvider::default();
        assert!(PlayerScreen::new(&provider, "definitely not a url").is_err());
    }

    #[test]
    fn destroy_is_idempotent() {
        let provider = SimEngineProvider::default();
        let mut screen = PlayerScreen::new(&provider, "http://example.com/movie.mp4").unwrap();

        screen.resume();
        screen.stop();
        screen.destroy();
        screen.destroy();
        screen.resume();
    }
}
