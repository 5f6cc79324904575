use std::time::Duration;

use eframe::NativeOptions;
use egui::{CentralPanel, ViewportBuilder, ViewportCommand};
use egui_video_controller::{PlayerScreen, SimEngineProvider};

const MEDIA_URL: &str =
    "http://commondatastorage.googleapis.com/gtv-videos-bucket/sample/ElephantsDream.mp4";

fn main() {
    env_logger::init();
    let mut opt = NativeOptions::default();
    opt.viewport = ViewportBuilder::default().with_inner_size([1270.0, 740.0]);

    let _ = eframe::run_native("player", opt, Box::new(|_cc| Ok(Box::new(App::new()))));
}

struct App {
    screen: Option<PlayerScreen>,
}

impl App {
    fn new() -> Self {
        let provider = SimEngineProvider {
            item_durations: vec![Duration::from_secs(653)],
            ..Default::default()
        };
        let screen = match PlayerScreen::new(&provider, MEDIA_URL) {
            Ok(mut screen) => {
                screen.resume();
                Some(screen)
            }
            Err(e) => {
                log::error!("failed to open player: {e}");
                None
            }
        };
        Self { screen }
    }
}

impl eframe::App for App {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        CentralPanel::default().show(ctx, |ui| {
            if let Some(screen) = self.screen.as_mut() {
                if screen.show(ui).close_requested {
                    ctx.send_viewport_cmd(ViewportCommand::Close);
                }
            }
        });
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        if let Some(screen) = self.screen.as_mut() {
            screen.stop();
            screen.destroy();
        }
    }
}
