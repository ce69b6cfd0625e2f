//! Placeholder slot detection and lazy marker wrapping
//!
//! A slot appears in a document either as a marker element (a `<span>`
//! carrying the `signature-box` class or a `data-signature="true"`
//! attribute) or as a bare occurrence of the literal placeholder token.
//! Both forms are discovered by the same pass and enumerated in one
//! byte-position order. Every rendered marker consumes exactly one
//! template token, so these indices coincide with the occurrence
//! indices the compositor counts against the clean template.

use std::ops::Range;

use contract_types::{SlotStatus, PLACEHOLDER_TOKEN};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Marker element carrying either the structural class or the
    /// boolean data attribute. Rendered signatures never nest another
    /// `</span>` inside the marker (text content is HTML-escaped, image
    /// content is a self-closing `<img>`), so the non-greedy inner
    /// capture is exact.
    pub(crate) static ref MARKER_RE: Regex = Regex::new(
        r#"(?s)<span\b[^>]*(?:data-signature="true"|class="[^"]*signature-box[^"]*")[^>]*>(.*?)</span>"#
    )
    .unwrap();

    static ref TAG_RE: Regex = Regex::new(r"<[^>]+>").unwrap();
}

/// Fixed inline sizing applied to freshly wrapped, unfilled slots so
/// they render as a visible empty box before any signature exists.
const UNFILLED_BOX_STYLE: &str = "display: inline-block; width: 200px; height: 80px; \
     vertical-align: middle; border: 1px dashed #999; cursor: pointer;";

/// Enumerate all signature slots in the document, in document order,
/// with their fill status.
///
/// Marker elements and bare token occurrences outside any marker are
/// merged into a single sequence ordered by byte position, so the index
/// reported here is the same one the compositor and the variable map
/// use. Read-only; an empty document or a document with no slots yields
/// an empty list, which callers must treat as "no signature required"
/// rather than an error.
pub fn detect_slots(document: &str) -> Vec<SlotStatus> {
    let mut found: Vec<(usize, bool)> = Vec::new();
    let mut covered: Vec<Range<usize>> = Vec::new();

    for caps in MARKER_RE.captures_iter(document) {
        let whole = caps.get(0).expect("regex match has group 0");
        covered.push(whole.range());
        let inner = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        found.push((whole.start(), marker_is_filled(inner)));
    }

    // Bare tokens the wrapping pass has not promoted yet.
    for (pos, _) in document.match_indices(PLACEHOLDER_TOKEN) {
        if covered.iter().any(|range| range.contains(&pos)) {
            continue;
        }
        found.push((pos, false));
    }

    found.sort_unstable_by_key(|(pos, _)| *pos);
    found
        .into_iter()
        .enumerate()
        .map(|(index, (_, filled))| SlotStatus { index, filled })
        .collect()
}

/// A marker is filled when it holds an embedded image, or text content
/// that is non-empty and not exactly the placeholder token.
fn marker_is_filled(inner: &str) -> bool {
    if inner.contains("<img") {
        return true;
    }
    let text = TAG_RE.replace_all(inner, "");
    let text = text.trim();
    !text.is_empty() && text != PLACEHOLDER_TOKEN
}

/// Wrap every bare placeholder token in a clickable marker element so
/// unfilled slots render as visible boxes and can be targeted
/// interactively.
///
/// Tokens already inside a marker element are left alone, so the pass
/// is idempotent. `data-slot-index` is the wrapped token's rank in the
/// merged byte-position sequence of all slots, the same index
/// `detect_slots` reports for it.
pub fn wrap_bare_placeholders(document: &str) -> String {
    let existing: Vec<Range<usize>> = MARKER_RE.find_iter(document).map(|m| m.range()).collect();

    let bare: Vec<usize> = document
        .match_indices(PLACEHOLDER_TOKEN)
        .map(|(pos, _)| pos)
        .filter(|pos| !existing.iter().any(|range| range.contains(pos)))
        .collect();

    let mut all_positions: Vec<usize> = existing
        .iter()
        .map(|range| range.start)
        .chain(bare.iter().copied())
        .collect();
    all_positions.sort_unstable();

    let mut out = String::with_capacity(document.len() + 256);
    let mut last = 0;
    for pos in &bare {
        let index = all_positions.partition_point(|p| p < pos);
        out.push_str(&document[last..*pos]);
        out.push_str(&format!(
            r#"<span class="signature-box" data-signature="true" data-signature-clickable="true" data-slot-index="{}" style="{}">{}</span>"#,
            index, UNFILLED_BOX_STYLE, PLACEHOLDER_TOKEN,
        ));
        last = pos + PLACEHOLDER_TOKEN.len();
    }
    out.push_str(&document[last..]);
    out
}
