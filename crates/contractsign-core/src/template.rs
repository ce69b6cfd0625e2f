//! Clean-template recovery for legacy records
//!
//! The clean template (all slots reset to placeholder tokens) is
//! persisted explicitly when a signing session first loads a record, and
//! rebuilding always starts from that stored copy. Recovery from a
//! rendered document exists only for records created before explicit
//! template storage. It is best-effort and lossy: it recognizes the
//! marker elements and decorative-font spans this engine produces, plus
//! a fixed list of font names from older renderers; anything else stays
//! as-is rather than erroring.

use contract_types::PLACEHOLDER_TOKEN;
use lazy_static::lazy_static;
use regex::Regex;

use crate::detector::MARKER_RE;

lazy_static! {
    static ref SIGNATURE_IMG_RE: Regex =
        Regex::new(r#"(?s)<img\b[^>]*alt="Signature"[^>]*/?>"#).unwrap();

    static ref FONT_SPAN_RE: Regex = Regex::new(
        r#"(?s)<span\b[^>]*style="[^"]*font-family:\s*'([^']+)'[^"]*"[^>]*>(.*?)</span>"#
    )
    .unwrap();
}

/// Font names the recovery pass recognizes as signature renderings.
const RECOGNIZED_FONTS: &[&str] = &[
    "Dancing Script",
    "Great Vibes",
    "Pacifico",
    "Satisfy",
    "Caveat",
    "Allura",
    "Sacramento",
];

/// Reverse a rendered document back to a placeholder-only template.
///
/// Marker elements collapse straight back to the token regardless of
/// content. Unwrapped `<img alt="Signature">` elements and decorative
/// font spans from pre-marker renderers are reversed only when the font
/// name is recognized; unrecognized renderings are left in place and
/// the partial result is returned. Never errors.
pub fn recover_template(rendered: &str) -> String {
    let document = MARKER_RE.replace_all(rendered, PLACEHOLDER_TOKEN).to_string();
    let document = SIGNATURE_IMG_RE
        .replace_all(&document, PLACEHOLDER_TOKEN)
        .to_string();

    let mut out = String::with_capacity(document.len());
    let mut last = 0;
    for caps in FONT_SPAN_RE.captures_iter(&document) {
        let whole = caps.get(0).expect("regex match has group 0");
        let family = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        if RECOGNIZED_FONTS.contains(&family) {
            out.push_str(&document[last..whole.start()]);
            out.push_str(PLACEHOLDER_TOKEN);
            last = whole.end();
        }
    }
    out.push_str(&document[last..]);
    out
}
