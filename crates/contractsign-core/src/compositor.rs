//! Signature substitution against placeholder occurrences
//!
//! Substitution is an exact-token sequential scan: the document is
//! walked left to right and only the Nth literal occurrence of the
//! placeholder token is replaced. Already-substituted slots no longer
//! match the token and are untouched by construction. Rebuilding always
//! starts from the clean template and replays the full variable map, so
//! re-running it for the same inputs is byte-for-byte idempotent.

use contract_types::{SignaturePayload, VariableMap, PLACEHOLDER_TOKEN};

/// Font used when the variable map carries no per-slot override.
pub const DEFAULT_SIGNATURE_FONT: &str = "Dancing Script";

/// Fallback fonts appended after the signer-chosen font, ending in the
/// generic `cursive` family.
const FONT_FALLBACKS: &[&str] = &["Dancing Script", "Great Vibes", "Pacifico", "Satisfy"];

const SIGNATURE_FONT_SIZE_PX: u32 = 24;
const MAX_IMAGE_WIDTH_PX: u32 = 200;
const MAX_IMAGE_HEIGHT_PX: u32 = 80;

/// Count the literal placeholder-token occurrences in a document.
pub fn count_placeholders(document: &str) -> usize {
    document.match_indices(PLACEHOLDER_TOKEN).count()
}

/// Replace the Nth placeholder-token occurrence (N = `target_index`,
/// counted over the document as given) with the rendered payload.
///
/// Out-of-range indices are a no-op: the document is returned unchanged
/// and a warning is logged, because a correct caller recomputes slot
/// positions against the current document immediately before calling.
pub fn apply_signature(document: &str, target_index: usize, payload: &str, font: &str) -> String {
    for (n, (pos, token)) in document.match_indices(PLACEHOLDER_TOKEN).enumerate() {
        if n == target_index {
            let mut out = String::with_capacity(document.len() + 256);
            out.push_str(&document[..pos]);
            out.push_str(&render_payload(payload, font));
            out.push_str(&document[pos + token.len()..]);
            return out;
        }
    }

    tracing::warn!(
        target_index,
        occurrences = count_placeholders(document),
        "placeholder index out of range, document left unchanged"
    );
    document.to_string()
}

/// Re-render every recorded signature onto a clean template.
///
/// Entries are applied in ascending numeric index order, each step
/// feeding the next: a non-empty payload consumes a token occurrence,
/// shifting the occurrence index of every later slot down by one, so
/// the effective occurrence index is the entry index minus the number
/// of earlier non-empty entries. Empty sentinel entries re-emit the
/// token inside a marker element and consume nothing. Missing entries
/// leave their token in place.
///
/// Postcondition: unresolved tokens = template occurrences − non-empty
/// entries (for maps that address in-range slots).
pub fn rebuild_from_template(template: &str, map: &VariableMap, default_font: &str) -> String {
    let mut document = template.to_string();
    let mut consumed = 0;

    for (index, payload) in map.signature_entries() {
        let font = map.font_for(index).unwrap_or(default_font);
        document = apply_signature(&document, index - consumed, payload, font);
        if !payload.is_empty() {
            consumed += 1;
        }
    }

    document
}

fn render_payload(payload: &str, font: &str) -> String {
    match SignaturePayload::classify(payload) {
        SignaturePayload::Image => format!(
            r#"<span class="signature-box" data-signature="true"><img src="{}" alt="Signature" style="max-width: {}px; max-height: {}px; vertical-align: middle;" /></span>"#,
            escape_html(payload),
            MAX_IMAGE_WIDTH_PX,
            MAX_IMAGE_HEIGHT_PX,
        ),
        SignaturePayload::Text => format!(
            r#"<span class="signature-box" data-signature="true" style="font-family: {}; font-size: {}px;">{}</span>"#,
            font_stack(font),
            SIGNATURE_FONT_SIZE_PX,
            neutralize_token(escape_html(payload)),
        ),
        SignaturePayload::Empty => format!(
            r#"<span class="signature-box" data-signature="true">{}</span>"#,
            PLACEHOLDER_TOKEN,
        ),
    }
}

/// Escape the five HTML-significant characters.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// A typed payload may spell out the placeholder token itself; rendered
/// verbatim it would count as an occurrence on the next scan and derail
/// every later substitution. Entity-encode the opening bracket so the
/// text displays identically but no longer matches the token.
fn neutralize_token(text: String) -> String {
    if text.contains(PLACEHOLDER_TOKEN) {
        let defused = PLACEHOLDER_TOKEN.replacen('[', "&#91;", 1);
        text.replace(PLACEHOLDER_TOKEN, &defused)
    } else {
        text
    }
}

/// Font-family chain: the signer-chosen font first, then the fixed
/// fallbacks (minus any duplicate of the chosen font), then `cursive`.
fn font_stack(font: &str) -> String {
    let chosen = sanitize_font(font);
    let mut stack = vec![format!("'{}'", chosen)];
    for fallback in FONT_FALLBACKS {
        if *fallback != chosen {
            stack.push(format!("'{}'", fallback));
        }
    }
    stack.push("cursive".to_string());
    stack.join(", ")
}

/// Strip characters that would break out of the font-family declaration.
fn sanitize_font(font: &str) -> String {
    font.chars()
        .filter(|c| !matches!(c, '"' | '\'' | '<' | '>' | ';'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const IMAGE_A: &str = "data:image/png;base64,AAAA";
    const IMAGE_B: &str = "data:image/png;base64,BBBB";

    fn two_slot_template() -> String {
        format!(
            "Sign here: {} and here: {}",
            PLACEHOLDER_TOKEN, PLACEHOLDER_TOKEN
        )
    }

    #[test]
    fn test_apply_image_replaces_only_first_occurrence() {
        let template = two_slot_template();
        let out = apply_signature(&template, 0, IMAGE_A, DEFAULT_SIGNATURE_FONT);

        assert_eq!(out.matches("<img").count(), 1);
        assert!(out.contains(IMAGE_A));
        assert_eq!(count_placeholders(&out), 1);
        // Second occurrence untouched.
        assert!(out.ends_with(PLACEHOLDER_TOKEN));
    }

    #[test]
    fn test_image_payload_is_bounded() {
        let out = apply_signature(PLACEHOLDER_TOKEN, 0, IMAGE_A, DEFAULT_SIGNATURE_FONT);
        assert!(out.contains("max-width: 200px"));
        assert!(out.contains("max-height: 80px"));
        assert!(out.contains("vertical-align: middle"));
    }

    #[test]
    fn test_typed_payload_uses_chosen_font_with_cursive_fallback() {
        let out = apply_signature(PLACEHOLDER_TOKEN, 0, "Jane Doe", "Caveat");
        assert!(out.contains("font-family: 'Caveat', 'Dancing Script'"));
        assert!(out.contains("cursive"));
        assert!(out.contains("font-size: 24px"));
        assert!(out.contains("Jane Doe"));
    }

    #[test]
    fn test_typed_payload_is_escaped() {
        let out = apply_signature(
            PLACEHOLDER_TOKEN,
            0,
            "<script>alert(1)</script> & \"quotes\" 'apos'",
            "Caveat",
        );
        assert!(out.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(out.contains("&amp;"));
        assert!(out.contains("&quot;quotes&quot;"));
        assert!(out.contains("&#39;apos&#39;"));
        assert!(!out.contains("<script>"));
    }

    #[test]
    fn test_empty_payload_preserves_placeholder_in_marker() {
        let out = apply_signature(PLACEHOLDER_TOKEN, 0, "", DEFAULT_SIGNATURE_FONT);
        assert!(out.contains(r#"class="signature-box""#));
        assert!(out.contains(PLACEHOLDER_TOKEN));
        // Still discoverable on the next pass.
        assert_eq!(count_placeholders(&out), 1);
    }

    #[test]
    fn test_out_of_range_index_is_a_no_op() {
        let template = two_slot_template();
        let out = apply_signature(&template, 5, IMAGE_A, DEFAULT_SIGNATURE_FONT);
        assert_eq!(out, template);
    }

    #[test]
    fn test_partial_token_is_not_matched() {
        let doc = "var[{{signatur}}] var[{{signature}}";
        let out = apply_signature(doc, 0, IMAGE_A, DEFAULT_SIGNATURE_FONT);
        assert_eq!(out, doc);
    }

    #[test]
    fn test_rebuild_scenario_image_then_untouched_token() {
        // Scenario 1: one image entry, second slot stays a bare token.
        let template = two_slot_template();
        let mut map = VariableMap::new();
        map.set_signature(0, IMAGE_A);

        let out = rebuild_from_template(&template, &map, DEFAULT_SIGNATURE_FONT);
        assert_eq!(out.matches("<img").count(), 1);
        assert_eq!(count_placeholders(&out), 1);
        assert!(out.ends_with(PLACEHOLDER_TOKEN));
    }

    #[test]
    fn test_rebuild_scenario_empty_then_typed() {
        // Scenario 2: empty sentinel keeps slot 0 discoverable, slot 1
        // renders as typed text.
        let template = two_slot_template();
        let mut map = VariableMap::new();
        map.set_signature(0, "");
        map.set_signature(1, "Jane Doe");
        map.set_font(1, "Caveat");

        let out = rebuild_from_template(&template, &map, DEFAULT_SIGNATURE_FONT);
        assert_eq!(count_placeholders(&out), 1);
        assert!(out.contains("font-family: 'Caveat'"));
        assert!(out.contains("Jane Doe"));
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let template = two_slot_template();
        let mut map = VariableMap::new();
        map.set_signature(0, IMAGE_A);
        map.set_signature(1, "Jane Doe");

        let first = rebuild_from_template(&template, &map, DEFAULT_SIGNATURE_FONT);
        let second = rebuild_from_template(&template, &map, DEFAULT_SIGNATURE_FONT);
        assert_eq!(first, second);
    }

    #[test]
    fn test_rebuild_added_entry_keeps_earlier_renderings_stable() {
        // Scenario 4: adding a third entry leaves the first two
        // renderings byte-identical.
        let template = format!(
            "a {} b {} c {} d",
            PLACEHOLDER_TOKEN, PLACEHOLDER_TOKEN, PLACEHOLDER_TOKEN
        );
        let mut map = VariableMap::new();
        map.set_signature(0, "");
        map.set_signature(1, "Jane Doe");
        map.set_font(1, "Caveat");

        let before = rebuild_from_template(&template, &map, DEFAULT_SIGNATURE_FONT);

        map.set_signature(2, IMAGE_B);
        let after = rebuild_from_template(&template, &map, DEFAULT_SIGNATURE_FONT);

        // The last token in `before` is the unfilled third slot (the
        // empty first slot's token sits inside its marker, earlier).
        // Everything up to it must be unchanged.
        let prefix_len = before.rfind(PLACEHOLDER_TOKEN).unwrap();
        assert_eq!(&after[..prefix_len], &before[..prefix_len]);
        assert!(after.contains(IMAGE_B));
        assert_eq!(count_placeholders(&after), 1);
    }

    #[test]
    fn test_rebuild_with_gap_leaves_earlier_token_in_place() {
        let template = two_slot_template();
        let mut map = VariableMap::new();
        map.set_signature(1, "Jane Doe");

        let out = rebuild_from_template(&template, &map, DEFAULT_SIGNATURE_FONT);
        // First slot untouched, second rendered.
        assert!(out.starts_with(&format!("Sign here: {}", PLACEHOLDER_TOKEN)));
        assert!(out.contains("Jane Doe"));
        assert_eq!(count_placeholders(&out), 1);
    }

    #[test]
    fn test_rebuild_conserves_slot_count() {
        let template = format!(
            "{} {} {} {}",
            PLACEHOLDER_TOKEN, PLACEHOLDER_TOKEN, PLACEHOLDER_TOKEN, PLACEHOLDER_TOKEN
        );
        let mut map = VariableMap::new();
        map.set_signature(0, IMAGE_A);
        map.set_signature(1, "Jane Doe");

        let out = rebuild_from_template(&template, &map, DEFAULT_SIGNATURE_FONT);
        assert_eq!(count_placeholders(&out), 2);
    }

    #[test]
    fn test_font_sanitization_strips_breakout_characters() {
        let out = apply_signature(PLACEHOLDER_TOKEN, 0, "Jane", "Cave'at\";<x>");
        assert!(out.contains("font-family: 'Caveatx'"));
    }

    #[test]
    fn test_default_font_is_not_duplicated_in_the_stack() {
        let out = apply_signature(PLACEHOLDER_TOKEN, 0, "Jane", DEFAULT_SIGNATURE_FONT);
        assert!(out.contains("font-family: 'Dancing Script', 'Great Vibes'"));
        assert_eq!(out.matches("Dancing Script").count(), 1);
    }

    #[test]
    fn test_token_valued_text_payload_is_neutralized() {
        let out = apply_signature(PLACEHOLDER_TOKEN, 0, PLACEHOLDER_TOKEN, "Caveat");
        assert_eq!(count_placeholders(&out), 0);
        assert!(out.contains("var&#91;{{signature}}]"));
    }

    #[test]
    fn test_token_valued_text_payload_does_not_derail_rebuild() {
        let template = two_slot_template();
        let mut map = VariableMap::new();
        map.set_signature(0, PLACEHOLDER_TOKEN);
        map.set_signature(1, "Jane Doe");

        let out = rebuild_from_template(&template, &map, DEFAULT_SIGNATURE_FONT);
        // Slot 1 renders in place; no marker ends up nested in another.
        assert!(out.contains("Jane Doe"));
        assert_eq!(count_placeholders(&out), 0);
        assert_eq!(out.matches("signature-box").count(), 2);
    }
}
