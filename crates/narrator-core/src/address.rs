//! Resolving resource locators to fetchable addresses.

use url::Url;

use crate::paragraph::ResourceLocator;

/// Resolve a (usually server-relative) locator against the server base URL.
///
/// Absolute locators are returned unchanged. A base URL without a trailing
/// slash is treated as a directory, so `http://host/tts` + `audio/1.wav`
/// yields `http://host/tts/audio/1.wav`.
pub fn resolve_locator(base: &Url, locator: &ResourceLocator) -> Result<Url, url::ParseError> {
    if let Ok(absolute) = Url::parse(locator.as_str()) {
        return Ok(absolute);
    }

    if base.path().ends_with('/') {
        base.join(locator.as_str())
    } else {
        let mut dir = base.clone();
        dir.set_path(&format!("{}/", base.path()));
        dir.join(locator.as_str())
    }
}
