use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use egui::{pos2, vec2, Align2, Color32, CornerRadius, FontId, Rect, Response, Sense, Ui, Vec2};
use egui_inbox::UiInbox;
use log::{debug, info};

use crate::engine::{EngineEvent, PlaybackState, PlayerEngine};
use crate::task::DelaySlot;
use crate::timebar::{format_time, ScrubEvent, TimeBar, TimeBarStyle};

/// Playback speeds the speed control cycles through, in order.
pub const SPEED_STEPS: [f32; 7] = [0.25, 0.5, 0.75, 1.0, 1.25, 1.5, 2.0];

/// Index into [`SPEED_STEPS`] selected on attach.
pub const DEFAULT_SPEED_INDEX: usize = 3;

/// Appearance and behavior of a [`ControllerOverlay`].
#[derive(Debug, Clone)]
pub struct OverlayConfig {
    /// Height of the control bar.
    pub bar_height: f32,
    /// Background of the control bar.
    pub bar_color: Color32,
    /// Button glyph color.
    pub icon_color: Color32,
    /// Time and speed label color.
    pub text_color: Color32,
    /// Label font size.
    pub font_size: f32,
    /// Button glyph font size.
    pub icon_size: f32,
    /// Seek bar colors.
    pub time_bar: TimeBarStyle,
    /// Inactivity window before visible controls hide themselves.
    pub hide_delay: Duration,
    /// Length of the show/hide slide in seconds, independent of `hide_delay`.
    pub slide_duration: f32,
    /// How far the rewind/forward buttons jump.
    pub seek_step: Duration,
    /// Lower bound on the progress refresh delay.
    pub min_update_interval: Duration,
    /// Upper bound on the progress refresh delay; also the keep-alive cadence
    /// while buffering.
    pub max_update_interval: Duration,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            bar_height: 48.0,
            bar_color: Color32::from_black_alpha(160),
            icon_color: Color32::WHITE,
            text_color: Color32::WHITE,
            font_size: 13.0,
            icon_size: 18.0,
            time_bar: TimeBarStyle::default(),
            hide_delay: Duration::from_millis(6000),
            slide_duration: 0.6,
            seek_step: Duration::from_millis(5000),
            min_update_interval: Duration::from_millis(200),
            max_update_interval: Duration::from_millis(1000),
        }
    }
}

/// What happened inside [`ControllerOverlay::show`] this frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct OverlayResponse {
    /// Whether the controls are visible after this frame.
    pub visible: bool,
    /// Whether a seek-bar drag is in progress.
    pub scrubbing: bool,
}

/// Playback controls drawn over a video surface.
///
/// The overlay subscribes to the engine's event stream on
/// [`ControllerOverlay::attach`] and afterwards only mirrors engine state;
/// every user interaction goes back through [`PlayerEngine`] commands.
pub struct ControllerOverlay {
    config: OverlayConfig,
    inbox: UiInbox<EngineEvent>,
    attached: bool,

    visible: bool,
    aux_visible: Option<Arc<AtomicBool>>,
    speed_index: usize,
    show_pause: bool,

    time_bar: TimeBar,
    position_text: String,
    remaining_text: String,
    speed_text: String,

    hide_task: DelaySlot,
    refresh_task: DelaySlot,
}

impl Default for ControllerOverlay {
    fn default() -> Self {
        Self::new()
    }
}

impl ControllerOverlay {
    pub fn new() -> Self {
        Self::with_config(OverlayConfig::default())
    }

    pub fn with_config(config: OverlayConfig) -> Self {
        Self {
            config,
            inbox: UiInbox::new(),
            attached: false,
            visible: false,
            aux_visible: None,
            speed_index: DEFAULT_SPEED_INDEX,
            show_pause: false,
            time_bar: TimeBar::new(),
            position_text: String::new(),
            remaining_text: String::new(),
            speed_text: String::new(),
            hide_task: DelaySlot::default(),
            refresh_task: DelaySlot::default(),
        }
    }

    /// Binds the overlay to `engine`, replacing any previous binding.
    ///
    /// Subscribes the overlay as the engine's event listener, prepares an
    /// idle engine, refreshes every widget, and shows the controls with the
    /// hide timer armed.
    pub fn attach(&mut self, engine: &mut dyn PlayerEngine) {
        let now = Instant::now();
        self.hide_task.cancel();
        self.refresh_task.cancel();
        self.inbox = UiInbox::new();
        engine.subscribe(self.inbox.sender());
        if engine.state() == PlaybackState::Idle {
            engine.prepare();
        }
        self.speed_index = DEFAULT_SPEED_INDEX;
        self.attached = true;
        self.update_all(engine, now);
        self.set_visible(true);
        self.hide_task.schedule_in(now, self.config.hide_delay);
        info!("controller attached");
    }

    /// Unbinds the overlay; pending delayed work is dropped.
    pub fn detach(&mut self) {
        self.attached = false;
        self.hide_task.cancel();
        self.refresh_task.cancel();
    }

    /// Mirrors controls visibility into an externally owned flag, for hosts
    /// that keep auxiliary controls (a close button, say) outside the
    /// overlay.
    pub fn set_aux_visibility(&mut self, flag: Arc<AtomicBool>) {
        flag.store(self.visible, Ordering::Relaxed);
        self.aux_visible = Some(flag);
    }

    /// Whether the controls are currently shown.
    pub fn visible(&self) -> bool {
        self.visible
    }

    /// The currently selected playback speed.
    pub fn speed(&self) -> f32 {
        SPEED_STEPS[self.speed_index]
    }

    /// Runs one frame of the overlay over `surface`.
    ///
    /// `surface` is the host's playback surface response; clicking it toggles
    /// the controls.
    pub fn show(
        &mut self,
        ui: &mut Ui,
        surface: &Response,
        engine: &mut dyn PlayerEngine,
    ) -> OverlayResponse {
        let now = Instant::now();
        if !self.attached {
            return OverlayResponse::default();
        }

        // Engine events, coalesced into the displays they invalidate.
        let mut refresh_button = false;
        let mut refresh_progress = false;
        let mut refresh_timeline = false;
        let mut refresh_speed = false;
        for event in self.inbox.read(ui.ctx()) {
            match event {
                EngineEvent::StateChanged | EngineEvent::PlayWhenReadyChanged => {
                    refresh_button = true;
                    refresh_progress = true;
                }
                EngineEvent::IsPlayingChanged => refresh_progress = true,
                EngineEvent::PositionDiscontinuity | EngineEvent::TimelineChanged => {
                    refresh_timeline = true;
                }
                EngineEvent::ParametersChanged => refresh_speed = true,
            }
        }
        if refresh_timeline {
            self.update_timeline(engine, now);
        } else if refresh_progress {
            self.update_progress(engine, now);
        }
        if refresh_button {
            self.update_play_pause(engine);
        }
        if refresh_speed {
            self.update_speed_label();
        }

        self.poll_tasks(engine, now);

        if surface.clicked() {
            self.toggle_visibility(now);
        }

        let anim = ui.ctx().animate_bool_with_time(
            surface.id.with("controls_slide"),
            self.visible,
            self.config.slide_duration,
        );
        if anim > 0.0 {
            self.render_bar(ui, surface, engine, anim, now);
        }

        self.request_wakeup(ui, now);
        OverlayResponse {
            visible: self.visible,
            scrubbing: self.time_bar.is_scrubbing(),
        }
    }

    fn render_bar(
        &mut self,
        ui: &mut Ui,
        surface: &Response,
        engine: &mut dyn PlayerEngine,
        anim: f32,
        now: Instant,
    ) {
        let rect = surface.rect;
        let bar_height = self.config.bar_height;
        let padding = 8.0;

        // The bar slides in from the bottom edge.
        let slide = bar_height * (1.0 - anim);
        let bar_rect = Rect::from_min_size(
            pos2(rect.min.x, rect.max.y - bar_height + slide),
            vec2(rect.width(), bar_height),
        );
        ui.painter().rect_filled(
            bar_rect,
            CornerRadius::ZERO,
            self.config.bar_color.linear_multiply(anim),
        );

        let button = bar_height - 2.0 * padding;
        let icon_color = self.config.icon_color.linear_multiply(anim);
        let text_color = self.config.text_color.linear_multiply(anim);
        let icon_font = FontId::proportional(self.config.icon_size);
        let label_font = FontId::proportional(self.config.font_size);

        let button_rect = |index: usize| {
            Rect::from_min_size(
                pos2(
                    bar_rect.min.x + padding + index as f32 * (button + padding),
                    bar_rect.min.y + padding,
                ),
                Vec2::splat(button),
            )
        };
        let rewind_rect = button_rect(0);
        let play_rect = button_rect(1);
        let forward_rect = button_rect(2);

        let speed_width = 44.0;
        let speed_rect = Rect::from_min_size(
            pos2(bar_rect.max.x - padding - speed_width, bar_rect.min.y + padding),
            vec2(speed_width, button),
        );
        let time_width = 52.0;
        let remaining_rect = Rect::from_min_size(
            pos2(speed_rect.min.x - padding - time_width, bar_rect.min.y + padding),
            vec2(time_width, button),
        );
        let position_rect = Rect::from_min_size(
            pos2(forward_rect.max.x + padding, bar_rect.min.y + padding),
            vec2(time_width, button),
        );

        let bar_y = bar_rect.center().y;
        let track_rect = Rect::from_min_max(
            pos2(position_rect.max.x + padding, bar_y - 2.0),
            pos2(remaining_rect.min.x - padding, bar_y + 2.0),
        );

        let rewind = Self::icon_button(
            ui,
            rewind_rect,
            surface.id.with("rewind"),
            "⏪",
            &icon_font,
            icon_color,
            anim,
        );
        let play_icon = if self.show_pause { "⏸" } else { "▶" };
        let play = Self::icon_button(
            ui,
            play_rect,
            surface.id.with("play_pause"),
            play_icon,
            &icon_font,
            icon_color,
            anim,
        );
        let forward = Self::icon_button(
            ui,
            forward_rect,
            surface.id.with("forward"),
            "⏩",
            &icon_font,
            icon_color,
            anim,
        );
        let speed = Self::icon_button(
            ui,
            speed_rect,
            surface.id.with("speed"),
            &self.speed_text,
            &label_font,
            text_color,
            anim,
        );

        ui.painter().text(
            position_rect.left_center(),
            Align2::LEFT_CENTER,
            &self.position_text,
            label_font.clone(),
            text_color,
        );
        ui.painter().text(
            remaining_rect.right_center(),
            Align2::RIGHT_CENTER,
            &self.remaining_text,
            label_font.clone(),
            text_color,
        );

        let scrub = self.time_bar.show(
            ui,
            track_rect,
            surface.id.with("time_bar"),
            &self.config.time_bar,
            anim,
        );

        let mut interacted = false;
        if play {
            self.dispatch_play_pause(engine);
            interacted = true;
        }
        if rewind {
            engine.seek(engine.position().saturating_sub(self.config.seek_step));
            interacted = true;
        }
        if forward {
            engine.seek(engine.position() + self.config.seek_step);
            interacted = true;
        }
        if speed {
            self.next_speed(engine);
            interacted = true;
        }
        match scrub {
            Some(ScrubEvent::Started(at)) | Some(ScrubEvent::Moved(at)) => {
                self.set_time_text(at, engine.duration());
                interacted = true;
            }
            Some(ScrubEvent::Stopped {
                position,
                cancelled,
            }) => {
                if cancelled {
                    self.update_progress(engine, now);
                } else {
                    self.commit_seek(engine, position, now);
                }
                interacted = true;
            }
            None => {}
        }
        if interacted {
            self.note_interaction(now);
        }
    }

    fn icon_button(
        ui: &mut Ui,
        rect: Rect,
        id: egui::Id,
        glyph: &str,
        font: &FontId,
        color: Color32,
        fade: f32,
    ) -> bool {
        let response = ui.interact(rect, id, Sense::click());
        if response.hovered() {
            ui.painter().rect_filled(
                rect,
                CornerRadius::same(4),
                Color32::from_white_alpha(26).linear_multiply(fade),
            );
        }
        ui.painter().text(
            rect.center(),
            Align2::CENTER_CENTER,
            glyph,
            font.clone(),
            color,
        );
        response.clicked()
    }

    /// Fires due delayed work: the progress refresh and the auto-hide.
    fn poll_tasks(&mut self, engine: &mut dyn PlayerEngine, now: Instant) {
        if !self.attached {
            return;
        }
        if self.refresh_task.poll(now) {
            self.update_progress(engine, now);
        }
        if self.hide_task.poll(now) && self.visible {
            self.set_visible(false);
        }
    }

    /// Surface click: show or hide the controls. Showing arms the hide
    /// timer; hiding cancels it outright.
    fn toggle_visibility(&mut self, now: Instant) {
        if self.visible {
            self.set_visible(false);
            self.hide_task.cancel();
        } else {
            self.set_visible(true);
            self.hide_task.schedule_in(now, self.config.hide_delay);
        }
    }

    /// Any control interaction keeps the controls awake for another window.
    fn note_interaction(&mut self, now: Instant) {
        self.hide_task.schedule_in(now, self.config.hide_delay);
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
        if let Some(flag) = &self.aux_visible {
            flag.store(visible, Ordering::Relaxed);
        }
    }

    fn update_all(&mut self, engine: &mut dyn PlayerEngine, now: Instant) {
        self.update_timeline(engine, now);
        self.update_play_pause(engine);
        self.update_speed_label();
    }

    fn update_timeline(&mut self, engine: &dyn PlayerEngine, now: Instant) {
        self.time_bar.set_duration(engine.duration());
        self.update_progress(engine, now);
    }

    /// Re-reads position and buffering from the engine and schedules the next
    /// refresh. Scheduling replaces: at most one refresh is ever pending.
    fn update_progress(&mut self, engine: &dyn PlayerEngine, now: Instant) {
        if !self.attached {
            return;
        }
        let position = engine.position();
        self.set_time_text(position, engine.duration());
        self.time_bar.set_position(position);
        self.time_bar.set_buffered_position(engine.buffered_position());

        self.refresh_task.cancel();
        let state = engine.state();
        if engine.is_playing() {
            let preferred = self
                .time_bar
                .preferred_update_delay(self.config.max_update_interval);
            let delay = refresh_delay(
                preferred,
                position,
                engine.speed(),
                self.config.min_update_interval,
                self.config.max_update_interval,
            );
            self.refresh_task.schedule_in(now, delay);
        } else if state != PlaybackState::Ended && state != PlaybackState::Idle {
            self.refresh_task
                .schedule_in(now, self.config.max_update_interval);
        }
    }

    fn update_play_pause(&mut self, engine: &dyn PlayerEngine) {
        self.show_pause = should_show_pause(engine.state(), engine.play_when_ready());
    }

    fn update_speed_label(&mut self) {
        self.speed_text = speed_label(SPEED_STEPS[self.speed_index]);
    }

    fn set_time_text(&mut self, position: Duration, duration: Option<Duration>) {
        self.position_text = format_time(position);
        self.remaining_text = match duration {
            Some(duration) => format!("-{}", format_time(duration.saturating_sub(position))),
            None => "--:--".to_owned(),
        };
    }

    fn dispatch_play_pause(&self, engine: &mut dyn PlayerEngine) {
        let state = engine.state();
        if state == PlaybackState::Idle
            || state == PlaybackState::Ended
            || !engine.play_when_ready()
        {
            self.dispatch_play(engine);
        } else {
            engine.pause();
        }
    }

    fn dispatch_play(&self, engine: &mut dyn PlayerEngine) {
        match engine.state() {
            PlaybackState::Idle => engine.prepare(),
            PlaybackState::Ended => engine.seek_to(engine.current_item(), Duration::ZERO),
            _ => {}
        }
        engine.play();
    }

    /// Advances to the next allowed speed, wrapping after the last entry.
    fn next_speed(&mut self, engine: &mut dyn PlayerEngine) {
        self.speed_index = (self.speed_index + 1) % SPEED_STEPS.len();
        engine.set_speed(SPEED_STEPS[self.speed_index]);
    }

    fn commit_seek(&mut self, engine: &mut dyn PlayerEngine, position: Duration, now: Instant) {
        let target = engine.timeline().resolve(position, engine.current_item());
        debug!("seek committed: item {} at {:?}", target.item, target.position);
        engine.seek_to(target.item, target.position);
        self.update_progress(engine, now);
    }

    fn request_wakeup(&self, ui: &Ui, now: Instant) {
        let next = [
            self.refresh_task.remaining(now),
            self.hide_task.remaining(now),
        ]
        .into_iter()
        .flatten()
        .min();
        if let Some(delay) = next {
            ui.ctx().request_repaint_after(delay);
        }
    }
}

/// The pause glyph is shown whenever pressing the button would pause.
fn should_show_pause(state: PlaybackState, play_when_ready: bool) -> bool {
    state != PlaybackState::Ended && state != PlaybackState::Idle && play_when_ready
}

/// Real-time delay until the next progress refresh.
///
/// The preferred media-time delay is capped so the display never skips a
/// whole-second boundary, converted to real time through the playback speed,
/// then clamped to the update interval bounds.
fn refresh_delay(
    preferred: Duration,
    position: Duration,
    speed: f32,
    min: Duration,
    max: Duration,
) -> Duration {
    let until_next_second = Duration::from_millis(1000 - (position.as_millis() % 1000) as u64);
    let media_delay = preferred.min(until_next_second);
    let real_delay = if speed > 0.0 {
        media_delay.div_f32(speed)
    } else {
        max
    };
    real_delay.clamp(min, max)
}

fn speed_label(speed: f32) -> String {
    if speed.fract() == 0.0 {
        format!("{speed:.1}x")
    } else {
        format!("{speed}x")
    }
}
