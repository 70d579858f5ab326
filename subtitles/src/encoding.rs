//! Subtitle files on the site are mostly Windows-1255, older uploads ISO-8859-8,
//! newer ones UTF-8. Everything downstream expects UTF-8.

use std::borrow::Cow;

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, ISO_8859_8, ISO_8859_8_I, UTF_8, WINDOWS_1255};
use log::{debug, warn};

fn is_hebrew_code_page(encoding: &'static Encoding) -> bool {
    encoding == WINDOWS_1255 || encoding == ISO_8859_8 || encoding == ISO_8859_8_I
}

/// BOM first, statistical guess otherwise
pub fn detect(raw: &[u8]) -> &'static Encoding {
    if let Some((encoding, _)) = Encoding::for_bom(raw) {
        return encoding;
    }
    let mut detector = EncodingDetector::new();
    detector.feed(raw, true);
    detector.guess(None, true)
}

/// Re-encodes `raw` as UTF-8. Input that already is UTF-8 comes back
/// untouched, and input that cannot be decoded cleanly comes back as is.
pub fn to_utf8(raw: &[u8]) -> Cow<'_, [u8]> {
    let encoding = detect(raw);

    if encoding == UTF_8 {
        return Cow::Borrowed(raw);
    }

    let (text, _, had_errors) = encoding.decode(raw);
    if is_hebrew_code_page(encoding) {
        debug!("Decoded {} subtitle payload", encoding.name());
        return Cow::Owned(text.into_owned().into_bytes());
    }

    if had_errors {
        warn!(
            "Payload detected as {} did not decode cleanly, keeping raw bytes",
            encoding.name()
        );
        return Cow::Borrowed(raw);
    }

    debug!("Decoded {} subtitle payload", encoding.name());
    Cow::Owned(text.into_owned().into_bytes())
}
