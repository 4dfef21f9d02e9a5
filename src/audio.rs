//! Music playback using an `<audio>` element
//!
//! Loading waits for `canplaythrough` so the song clock never starts on a
//! track that would stall mid-song.

use std::cell::Cell;
use std::rc::Rc;

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::HtmlAudioElement;

use crate::clock::MediaElement;
use crate::error::{GameError, Result};
use crate::media::load_with_fallback;
use crate::settings::Settings;

/// `HTMLMediaElement.HAVE_ENOUGH_DATA`
const HAVE_ENOUGH_DATA: u16 = 4;

fn media_error(url: &str, err: &JsValue) -> GameError {
    let detail = err.as_string().unwrap_or_else(|| format!("{:?}", err));
    GameError::MediaLoad(format!("{}: {}", url, detail))
}

/// A song ready to play
pub struct MusicTrack {
    element: HtmlAudioElement,
    url: String,
    /// Set when the browser rejects a `play()` request
    failure: Rc<Cell<Option<GameError>>>,
}

impl MusicTrack {
    /// Fetch `url` and wait until it can play through, or fail after
    /// `timeout_secs`.
    pub async fn load(url: &str, timeout_secs: f64, volume: f64) -> Result<Self> {
        let element = HtmlAudioElement::new_with_src(url).map_err(|e| media_error(url, &e))?;
        element.set_preload("auto");
        element.set_volume(volume);

        if element.ready_state() < HAVE_ENOUGH_DATA {
            wait_until_buffered(&element, timeout_secs)
                .await
                .map_err(|e| media_error(url, &e))?;
        }

        log::info!("Music loaded: {} ({:.1}s)", url, element.duration());
        Ok(Self {
            element,
            url: url.to_string(),
            failure: Rc::new(Cell::new(None)),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Track length in seconds (NaN until metadata is known)
    pub fn duration(&self) -> f64 {
        self.element.duration()
    }
}

type LoadHandlers = (Closure<dyn FnMut()>, Closure<dyn FnMut()>, Closure<dyn FnMut()>);

/// Resolve on `canplaythrough`, reject on `error` or timeout. Listeners and
/// the timer are removed once the load settles.
async fn wait_until_buffered(element: &HtmlAudioElement, timeout_secs: f64) -> std::result::Result<(), JsValue> {
    let window = web_sys::window();
    let mut handlers: Option<LoadHandlers> = None;
    let mut timeout_id: Option<i32> = None;

    let promise = js_sys::Promise::new(&mut |resolve, reject| {
        let on_ready = Closure::<dyn FnMut()>::new(move || {
            let _ = resolve.call0(&JsValue::NULL);
        });
        let on_error = Closure::<dyn FnMut()>::new({
            let reject = reject.clone();
            move || {
                let _ = reject.call1(&JsValue::NULL, &JsValue::from_str("decode or network error"));
            }
        });
        let on_timeout = Closure::<dyn FnMut()>::new(move || {
            let _ = reject.call1(&JsValue::NULL, &JsValue::from_str("timed out waiting for buffer"));
        });

        let _ = element.add_event_listener_with_callback("canplaythrough", on_ready.as_ref().unchecked_ref());
        let _ = element.add_event_listener_with_callback("error", on_error.as_ref().unchecked_ref());
        if let Some(window) = &window {
            timeout_id = window
                .set_timeout_with_callback_and_timeout_and_arguments_0(
                    on_timeout.as_ref().unchecked_ref(),
                    (timeout_secs * 1000.0) as i32,
                )
                .ok();
        }
        handlers = Some((on_ready, on_error, on_timeout));
    });

    element.load();
    let result = JsFuture::from(promise).await.map(|_| ());

    if let (Some(window), Some(id)) = (&window, timeout_id) {
        window.clear_timeout_with_handle(id);
    }
    if let Some((on_ready, on_error, _on_timeout)) = &handlers {
        let _ = element.remove_event_listener_with_callback("canplaythrough", on_ready.as_ref().unchecked_ref());
        let _ = element.remove_event_listener_with_callback("error", on_error.as_ref().unchecked_ref());
    }
    result
}

impl MediaElement for MusicTrack {
    fn position(&self) -> f64 {
        self.element.current_time()
    }

    fn can_play_through(&self) -> bool {
        self.element.ready_state() >= HAVE_ENOUGH_DATA
    }

    fn is_paused(&self) -> bool {
        self.element.paused()
    }

    fn has_ended(&self) -> bool {
        self.element.ended()
    }

    fn play(&mut self) -> Result<()> {
        let promise = self.element.play().map_err(|e| media_error(&self.url, &e))?;
        // Autoplay policy rejections arrive asynchronously
        let url = self.url.clone();
        let failure = self.failure.clone();
        wasm_bindgen_futures::spawn_local(async move {
            if let Err(e) = JsFuture::from(promise).await {
                log::error!("Playback of {} rejected: {:?}", url, e);
                failure.set(Some(media_error(&url, &e)));
            }
        });
        Ok(())
    }

    fn pause(&mut self) {
        let _ = self.element.pause();
    }

    fn seek(&mut self, position: f64) {
        self.element.set_current_time(position);
    }

    fn set_volume(&mut self, volume: f64) {
        self.element.set_volume(volume.clamp(0.0, 1.0));
    }

    fn take_error(&mut self) -> Option<GameError> {
        self.failure.take()
    }
}

/// Load the song for play, honoring the settings' timeout, volume, and
/// fallback policy. `Ok(None)` means play silently on the wall clock.
pub async fn load_song(primary: &str, preview: Option<&str>, settings: &Settings) -> Result<Option<MusicTrack>> {
    let timeout = settings.media_load_timeout;
    let volume = settings.effective_volume();
    load_with_fallback(primary, preview, settings.audio_fallback, |url| async move {
        MusicTrack::load(&url, timeout, volume).await
    })
    .await
}
