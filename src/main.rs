//! Beat Borner entry point
//!
//! In the browser the host page fetches a map and calls `play_map`; the
//! game then runs off `requestAnimationFrame`. Natively there is no
//! window, so `main` plays a map headlessly with perfect-ish autoplay and
//! logs the result.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod wasm_game {
    use std::cell::RefCell;
    use std::rc::Rc;

    use wasm_bindgen::prelude::*;
    use web_sys::{Document, KeyboardEvent};

    use beat_borner::audio::{MusicTrack, load_song};
    use beat_borner::beatmap::{ACTIVE_CELLS, MapInfo, NormalizedMap, normalize_json};
    use beat_borner::clock::AudioClock;
    use beat_borner::highscores::{HighScoreEntry, HighScores};
    use beat_borner::input::KeyTracker;
    use beat_borner::platform::{SystemClock, timestamp_ms};
    use beat_borner::sim::{GameEvent, GamePhase, Grade, NoteState, Session, TickInput, Timing};
    use beat_borner::{AudioFallback, GameError, Settings};

    thread_local! {
        /// The session currently driving the page, if any
        static CURRENT: RefCell<Option<Rc<RefCell<Game>>>> = const { RefCell::new(None) };
    }

    fn js_error(e: GameError) -> JsValue {
        JsValue::from_str(&e.to_string())
    }

    /// Game instance holding all state
    struct Game {
        session: Session,
        clock: AudioClock<MusicTrack, SystemClock>,
        keys: KeyTracker,
        input: TickInput,
        settings: Settings,
        song: String,
        difficulty: String,
        /// Latest judgement for the feedback line
        feedback: Option<(Grade, Timing)>,
        /// Rank on the leaderboard for the finished run
        board_rank: Option<usize>,
        stopped: bool,
    }

    impl Game {
        fn new(map: NormalizedMap, music: Option<MusicTrack>, settings: Settings, song: String, difficulty: String) -> Result<Self, GameError> {
            let session = Session::new(map.notes, settings.session_config())?;
            let clock = AudioClock::new(music, SystemClock::new());
            Ok(Self {
                session,
                clock,
                keys: KeyTracker::new(settings.key_bindings.clone()),
                input: TickInput::default(),
                settings,
                song,
                difficulty,
                feedback: None,
                board_rank: None,
                stopped: false,
            })
        }

        fn start(&mut self, map_offset: f64) {
            self.clock.set_offset(self.settings.audio_offset + map_offset);
            self.clock.start_preroll(self.settings.preroll);
        }

        /// One frame: clock housekeeping, then a session tick at the new song time
        fn update(&mut self) {
            if let Err(e) = self.clock.update() {
                self.on_media_error(e);
            }

            if self.input.pause {
                match self.session.phase() {
                    GamePhase::Countdown | GamePhase::Playing => self.clock.pause(),
                    GamePhase::Paused => {
                        if let Err(e) = self.clock.resume() {
                            self.on_media_error(e);
                        }
                    }
                    GamePhase::Finished => {}
                }
            }

            self.input.media_ended = self.clock.has_ended();
            let now = self.clock.current_time();
            let input = std::mem::take(&mut self.input);
            for event in self.session.tick(&input, now) {
                self.on_event(event);
            }
        }

        fn on_media_error(&mut self, e: GameError) {
            log::error!("{}", e);
            match self.settings.audio_fallback {
                AudioFallback::WallClock => {
                    self.clock.detach_media();
                }
                AudioFallback::Disable => {
                    self.clock.stop();
                    self.stopped = true;
                    show_error(&e.to_string());
                }
            }
        }

        fn on_event(&mut self, event: GameEvent) {
            match event {
                GameEvent::NoteHit { grade, offset, .. } => {
                    self.feedback = Some((grade, Timing::from_offset(offset)));
                }
                GameEvent::ComboBroken { previous } => {
                    log::debug!("Combo of {} broken", previous);
                }
                GameEvent::Finished { stats } => {
                    let mut board = HighScores::load();
                    let entry = HighScoreEntry::from_stats(&self.song, &self.difficulty, &stats, timestamp_ms());
                    self.board_rank = board.add_result(entry);
                    if let Some(rank) = self.board_rank {
                        log::info!("New high score: #{}", rank);
                        board.save();
                    }
                    self.clock.stop();
                }
                _ => {}
            }
        }

        fn restart(&mut self) {
            self.session.restart();
            self.keys.release_all();
            self.input = TickInput::default();
            self.feedback = None;
            self.board_rank = None;
            self.clock.start_preroll(self.settings.preroll);
            log::info!("Restarted '{}'", self.song);
        }

        /// Update HUD elements in DOM
        fn update_hud(&self) {
            let Some(document) = web_sys::window().and_then(|w| w.document()) else {
                return;
            };
            let stats = self.session.stats();
            let phase = self.session.phase();

            set_text(&document, "#hud-score .hud-value", &stats.score.to_string());
            set_text(&document, "#hud-accuracy .hud-value", &format!("{:.2}%", stats.accuracy));

            if let Some(el) = document.get_element_by_id("hud-combo") {
                let _ = el.class_list().toggle_with_force("hidden", stats.combo < 2);
                set_text(&document, "#hud-combo .hud-value", &stats.combo.to_string());
                let multiplier = self.session.ledger().combo_multiplier();
                set_text(&document, "#hud-combo .multiplier", &format!("x{:.1}", multiplier));
            }

            let now = self.session.now();
            if let Some(el) = document.get_element_by_id("countdown") {
                let counting = phase == GamePhase::Countdown && now.is_finite();
                let _ = el.class_list().toggle_with_force("hidden", !counting);
                if counting {
                    el.set_text_content(Some(&format!("{}", (-now).ceil().max(1.0))));
                }
            }

            if let Some(el) = document.get_element_by_id("feedback") {
                let text = match self.feedback {
                    Some((grade, timing)) if self.settings.show_timing_feedback && grade != Grade::Perfect => {
                        format!("{} {}", grade.as_str(), timing.as_str())
                    }
                    Some((grade, _)) => grade.as_str().to_string(),
                    None => String::new(),
                };
                el.set_text_content(Some(&text));
            }

            // Approach progress per cell: 0 when a note appears, 1 on the beat
            let lookahead = self.settings.lookahead;
            let views = self.session.views();
            for cell in ACTIVE_CELLS {
                let Some(el) = document.get_element_by_id(&format!("cell-{}-{}", cell.x, cell.y)) else {
                    continue;
                };
                let next = views
                    .iter()
                    .filter(|v| v.cell == cell && v.visible && v.state == NoteState::Unhit)
                    .map(|v| v.time_until_hit)
                    .reduce(f64::min);
                match next {
                    Some(until) => {
                        let progress = (1.0 - until / lookahead).clamp(0.0, 1.0);
                        let _ = el.set_attribute("data-approach", &format!("{:.3}", progress));
                        let _ = el.class_list().toggle_with_force("active", true);
                    }
                    None => {
                        let _ = el.class_list().toggle_with_force("active", false);
                    }
                }
            }

            if let Some(el) = document.get_element_by_id("pause-menu") {
                let _ = el.class_list().toggle_with_force("hidden", phase != GamePhase::Paused);
            }

            if let Some(el) = document.get_element_by_id("results") {
                let finished = phase == GamePhase::Finished;
                let _ = el.class_list().toggle_with_force("hidden", !finished);
                if finished {
                    set_text(&document, "#final-score", &stats.score.to_string());
                    set_text(&document, "#final-rank", stats.rank.as_str());
                    set_text(&document, "#final-accuracy", &format!("{:.2}%", stats.accuracy));
                    set_text(&document, "#final-combo", &stats.max_combo.to_string());
                    let board = match self.board_rank {
                        Some(rank) => format!("New high score #{}", rank),
                        None => String::new(),
                    };
                    set_text(&document, "#final-board", &board);
                }
            }
        }
    }

    fn set_text(document: &Document, selector: &str, text: &str) {
        if let Some(el) = document.query_selector(selector).ok().flatten() {
            el.set_text_content(Some(text));
        }
    }

    fn show_error(message: &str) {
        let Some(document) = web_sys::window().and_then(|w| w.document()) else {
            return;
        };
        if let Some(el) = document.get_element_by_id("error") {
            el.set_text_content(Some(message));
            let _ = el.class_list().toggle_with_force("hidden", false);
        }
    }

    pub fn init() {
        console_error_panic_hook::set_once();
        if console_log::init_with_level(log::Level::Info).is_err() {
            web_sys::console::warn_1(&"logger already initialised".into());
        }
        log::info!("Beat Borner ready");
    }

    /// Load a map and its music, then start playing
    pub async fn play(info_json: &str, difficulty_json: &str, audio_url: &str, preview_url: Option<&str>) -> Result<(), JsValue> {
        // Only one session drives the page
        CURRENT.with(|current| {
            if let Some(old) = current.borrow_mut().take() {
                let mut old = old.borrow_mut();
                old.stopped = true;
                old.clock.stop();
            }
        });

        let settings = Settings::load();
        let info = MapInfo::from_json(info_json).map_err(js_error)?;
        let bpm = info.bpm().map_err(js_error)?;
        let difficulty = info
            .first_difficulty()
            .map(|d| d.difficulty.clone())
            .unwrap_or_else(|_| "Unknown".to_string());
        let map = normalize_json(difficulty_json, bpm).map_err(js_error)?;
        log::info!(
            "Playing '{}' [{}]: {} notes, {:.1} notes/s, difficulty {:.1}",
            info.title(),
            difficulty,
            map.stats.note_count,
            map.stats.density,
            map.stats.estimated_difficulty
        );

        let music = load_song(audio_url, preview_url, &settings).await.map_err(|e| {
            show_error(&e.to_string());
            js_error(e)
        })?;

        let mut game = Game::new(map, music, settings, info.title(), difficulty).map_err(js_error)?;
        game.start(info.song_time_offset_seconds());
        let game = Rc::new(RefCell::new(game));

        setup_input_handlers(game.clone());
        setup_auto_pause(game.clone());
        setup_buttons(game.clone());

        CURRENT.with(|current| *current.borrow_mut() = Some(game.clone()));
        request_animation_frame(game);
        Ok(())
    }

    fn setup_input_handlers(game: Rc<RefCell<Game>>) {
        let Some(window) = web_sys::window() else {
            return;
        };

        {
            let game = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: KeyboardEvent| {
                let mut g = game.borrow_mut();
                if g.stopped {
                    return;
                }
                match event.key().as_str() {
                    "Escape" => g.input.pause = true,
                    "Enter" if g.session.phase() == GamePhase::Finished => g.restart(),
                    key => {
                        if let Some(cell) = g.keys.key_down(key) {
                            g.input.presses.push(cell);
                            event.prevent_default();
                        }
                    }
                }
            });
            let _ = window.add_event_listener_with_callback("keydown", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        {
            let closure = Closure::<dyn FnMut(_)>::new(move |event: KeyboardEvent| {
                game.borrow_mut().keys.key_up(&event.key());
            });
            let _ = window.add_event_listener_with_callback("keyup", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    fn setup_auto_pause(game: Rc<RefCell<Game>>) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let Some(document) = window.document() else {
            return;
        };

        fn auto_pause(game: &Rc<RefCell<Game>>, reason: &str) {
            let mut g = game.borrow_mut();
            g.keys.release_all();
            let running = matches!(g.session.phase(), GamePhase::Countdown | GamePhase::Playing);
            if g.settings.pause_on_blur && running && !g.input.pause {
                g.input.pause = true;
                log::info!("Auto-paused ({})", reason);
            }
        }

        // Visibility change (tab switch, minimize)
        {
            let game = game.clone();
            let document_clone = document.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
                if document_clone.visibility_state() == web_sys::VisibilityState::Hidden {
                    auto_pause(&game, "tab hidden");
                }
            });
            let _ = document.add_event_listener_with_callback("visibilitychange", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Window blur (click outside)
        {
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::FocusEvent| {
                auto_pause(&game, "window blur");
            });
            let _ = window.add_event_listener_with_callback("blur", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    fn setup_buttons(game: Rc<RefCell<Game>>) {
        let Some(document) = web_sys::window().and_then(|w| w.document()) else {
            return;
        };

        if let Some(btn) = document.get_element_by_id("resume-btn") {
            let game = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
                game.borrow_mut().input.pause = true;
            });
            let _ = btn.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        if let Some(btn) = document.get_element_by_id("restart-btn") {
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
                game.borrow_mut().restart();
            });
            let _ = btn.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    fn request_animation_frame(game: Rc<RefCell<Game>>) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let closure = Closure::once(move |_time: f64| {
            game_loop(game);
        });
        let _ = window.request_animation_frame(closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn game_loop(game: Rc<RefCell<Game>>) {
        {
            let mut g = game.borrow_mut();
            if g.stopped {
                return;
            }
            g.update();
            g.update_hud();
        }

        request_animation_frame(game);
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn wasm_main() {
    wasm_game::init();
}

/// Play a map. `info_json` and `difficulty_json` are the file contents;
/// `preview_url` is tried when `audio_url` cannot be loaded.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub async fn play_map(
    info_json: String,
    difficulty_json: String,
    audio_url: String,
    preview_url: Option<String>,
) -> Result<(), JsValue> {
    wasm_game::play(&info_json, &difficulty_json, &audio_url, preview_url.as_deref()).await
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Beat Borner (native) starting...");
    log::info!("Native mode has no audio or display - run with `trunk serve` for the web version");

    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Err(e) = headless::run(&args) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}

#[cfg(not(target_arch = "wasm32"))]
mod headless {
    use std::rc::Rc;

    use beat_borner::beatmap::{MapInfo, normalize_json};
    use beat_borner::clock::{AudioClock, ManualClock, NoMedia, WallClock};
    use beat_borner::highscores::{HighScoreEntry, HighScores, format_age};
    use beat_borner::platform::timestamp_ms;
    use beat_borner::sim::{GameEvent, GamePhase, Session, TickInput};
    use beat_borner::{GameError, Result, Settings};

    const FRAME: f64 = 1.0 / 60.0;
    /// Autoplay lets every n-th note go by
    const SKIP_EVERY: usize = 7;

    const DEMO_INFO: &str = r#"{
        "_version": "2.0.0",
        "_songName": "Demo Pulse",
        "_songAuthorName": "Nobody",
        "_levelAuthorName": "Autoplay",
        "_beatsPerMinute": 120,
        "_songTimeOffset": 0,
        "_difficultyBeatmapSets": [
            {"_beatmapCharacteristicName": "Standard",
             "_difficultyBeatmaps": [{"_difficulty": "Normal", "_difficultyRank": 3, "_beatmapFilename": "Normal.dat"}]}
        ]
    }"#;

    const DEMO_DIFFICULTY: &str = r#"{
        "version": "3.2.0",
        "colorNotes": [
            {"b": 2, "x": 1, "y": 0, "c": 0, "d": 1},
            {"b": 3, "x": 2, "y": 0, "c": 1, "d": 1},
            {"b": 4, "x": 0, "y": 1, "c": 0, "d": 2},
            {"b": 5, "x": 3, "y": 1, "c": 1, "d": 3},
            {"b": 6, "x": 0, "y": 2, "c": 0, "d": 0},
            {"b": 6, "x": 3, "y": 2, "c": 1, "d": 0},
            {"b": 7, "x": 1, "y": 2, "c": 0, "d": 0},
            {"b": 7.5, "x": 2, "y": 2, "c": 1, "d": 0},
            {"b": 8, "x": 1, "y": 0, "c": 0, "d": 1},
            {"b": 8.5, "x": 2, "y": 0, "c": 1, "d": 1},
            {"b": 9, "x": 0, "y": 1, "c": 0, "d": 8},
            {"b": 9.5, "x": 3, "y": 1, "c": 1, "d": 8},
            {"b": 10, "x": 1, "y": 2, "c": 0, "d": 0},
            {"b": 10, "x": 2, "y": 2, "c": 1, "d": 0}
        ],
        "bombNotes": [{"b": 5.5, "x": 1, "y": 1}],
        "obstacles": [{"b": 11, "d": 1, "x": 0, "y": 0, "w": 1, "h": 5}]
    }"#;

    fn read(path: &str) -> Result<String> {
        std::fs::read_to_string(path).map_err(|e| GameError::InvalidMap(format!("{}: {}", path, e)))
    }

    /// Play `[info.dat difficulty.dat]` (or the built-in demo) on a silent
    /// clock, pressing each note on the frame it comes due.
    pub fn run(args: &[String]) -> Result<()> {
        let (info_text, difficulty_text) = match args {
            [info, difficulty, ..] => (read(info)?, read(difficulty)?),
            _ => (DEMO_INFO.to_string(), DEMO_DIFFICULTY.to_string()),
        };

        let settings = Settings::load();
        settings.validate()?;
        let info = MapInfo::from_json(&info_text)?;
        let difficulty = info.first_difficulty()?.difficulty.clone();
        let map = normalize_json(&difficulty_text, info.bpm()?)?;
        log::info!(
            "'{}' [{}]: {} notes, {} bombs, {} obstacles, {:.1}s, difficulty {:.1}",
            info.title(),
            difficulty,
            map.stats.note_count,
            map.bombs.len(),
            map.obstacles.len(),
            map.stats.duration,
            map.stats.estimated_difficulty
        );

        let end_time = map.stats.duration + 2.0;
        let notes = map.notes.clone();
        let mut session = Session::new(map.notes, settings.session_config())?;

        let wall = Rc::new(ManualClock::new(0.0));
        let mut clock: AudioClock<NoMedia, _> = AudioClock::silent(wall.clone());
        clock.set_offset(settings.audio_offset + info.song_time_offset_seconds());
        clock.start_preroll(settings.preroll);

        let mut played = 0;
        let mut last_now = f64::NEG_INFINITY;
        let stats = loop {
            wall.advance(FRAME);
            clock.update()?;
            let now = clock.current_time();

            let mut input = TickInput {
                media_ended: now >= end_time,
                ..Default::default()
            };
            for note in notes.iter().filter(|n| n.time_seconds > last_now && n.time_seconds <= now) {
                played += 1;
                if played % SKIP_EVERY != 0 {
                    input.presses.push(note.cell);
                }
            }
            last_now = now;

            let mut finished = None;
            for event in session.tick(&input, now) {
                match event {
                    GameEvent::NoteHit {
                        cell,
                        grade,
                        offset,
                        combo,
                        score,
                        ..
                    } => log::info!(
                        "{:7.3}s {} {:<7} {:+4.0} ms  combo {:3}  score {}",
                        now,
                        cell,
                        grade.as_str(),
                        offset * 1000.0,
                        combo,
                        score
                    ),
                    GameEvent::NoteMissed { cell, .. } => log::info!("{:7.3}s {} MISS", now, cell),
                    GameEvent::Finished { stats } => finished = Some(stats),
                    _ => {}
                }
            }
            debug_assert!(session.phase() != GamePhase::Paused);
            if let Some(stats) = finished {
                break stats;
            }
        };
        log::info!(
            "Result: score {} | rank {} | accuracy {:.2}% | max combo {} | {}P/{}Gr/{}Go/{}M",
            stats.score,
            stats.rank.as_str(),
            stats.accuracy,
            stats.max_combo,
            stats.counts.perfect,
            stats.counts.great,
            stats.counts.good,
            stats.counts.miss
        );

        let mut board = HighScores::load();
        let achieved = timestamp_ms();
        if let Some(rank) = board.add_result(HighScoreEntry::from_stats(&info.title(), &difficulty, &stats, achieved)) {
            log::info!("Leaderboard #{} ({})", rank, format_age(timestamp_ms(), achieved));
        }
        board.save();
        log::info!("Wall time simulated: {:.2}s", wall.now());
        Ok(())
    }
}
