//! Song source selection
//!
//! Tries the full song, then the preview clip. When neither loads, the
//! `AudioFallback` policy chooses between silent play and refusing to
//! start. Generic over the loader so the policy runs anywhere.

use std::future::Future;

use crate::error::Result;
use crate::settings::AudioFallback;

/// Load `primary`, then `fallback`. `Ok(None)` means play without music.
pub async fn load_with_fallback<T, F, Fut>(
    primary: &str,
    fallback: Option<&str>,
    policy: AudioFallback,
    mut load: F,
) -> Result<Option<T>>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error = match load(primary.to_string()).await {
        Ok(track) => return Ok(Some(track)),
        Err(e) => e,
    };
    log::warn!("{}", last_error);

    if let Some(url) = fallback {
        log::info!("Trying preview audio {}", url);
        match load(url.to_string()).await {
            Ok(track) => return Ok(Some(track)),
            Err(e) => {
                log::warn!("{}", e);
                last_error = e;
            }
        }
    }

    match policy {
        AudioFallback::WallClock => {
            log::warn!("No playable audio; continuing without music");
            Ok(None)
        }
        AudioFallback::Disable => {
            log::error!("No playable audio; refusing to start");
            Err(last_error)
        }
    }
}
