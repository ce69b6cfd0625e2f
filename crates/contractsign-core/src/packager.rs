//! Standalone HTML document packaging
//!
//! Wraps a rendered contract body into one self-contained document:
//! fixed base stylesheet, any custom styles carried over from a prior
//! version, and the body nested inside the two container levels the
//! extraction pass uses as anchors. Pure string assembly, suitable for
//! durable storage, later standalone re-display, and print.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref STYLE_RE: Regex = Regex::new(r"(?s)<style\b[^>]*>.*?</style>").unwrap();
    static ref LINK_RE: Regex = Regex::new(r"<link\b[^>]*>").unwrap();
    static ref DIV_RE: Regex = Regex::new(r"</?div\b").unwrap();
}

/// Opening tag of the inner container; the extraction anchor.
const BODY_ANCHOR: &str = r#"<div class="contract-body">"#;

/// Base stylesheet. The `.signature-box` rules pin every signature
/// marker to a constant inline-block size and forbid line-wrap inside
/// the box: a signature must never wrap to a new line on its own,
/// whatever the surrounding text reflow does.
const BASE_STYLESHEET: &str = r#"<style data-contract-base="true">
  body { font-family: Georgia, 'Times New Roman', serif; margin: 0; padding: 24px; color: #1a1a1a; line-height: 1.6; }
  .contract-preview { max-width: 820px; margin: 0 auto; background: #ffffff; padding: 48px; box-shadow: 0 1px 4px rgba(0, 0, 0, 0.15); }
  .contract-body p { margin: 0 0 12px; }
  .signature-box { display: inline-block; width: 200px; height: 80px; vertical-align: middle; white-space: nowrap; }
  @media print { body { padding: 0; } .contract-preview { box-shadow: none; padding: 0; } }
</style>"#;

/// Assemble a complete standalone HTML document around the rendered
/// body. Previously extracted custom styles are re-inserted verbatim,
/// after the base stylesheet.
pub fn package_document(body: &str, extracted_styles: &[String]) -> String {
    let mut custom = String::new();
    for fragment in extracted_styles {
        custom.push('\n');
        custom.push_str(fragment);
    }

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\" />\n{}{}\n</head>\n<body>\n<div class=\"contract-preview\">\n{}\n{}\n</div>\n</div>\n</body>\n</html>\n",
        BASE_STYLESHEET, custom, BODY_ANCHOR, body,
    )
}

/// Recover the rendered body and any custom `<style>`/`<link>`
/// fragments from a previously packaged document.
///
/// The base stylesheet is not a custom style and is skipped. If the
/// container anchors are missing (input was never packaged), the whole
/// input is returned as the body with no styles, so callers can feed
/// raw fragments through the same path.
pub fn extract_body_and_styles(html: &str) -> (String, Vec<String>) {
    let head_end = html.find("<body").unwrap_or(html.len());
    let head = &html[..head_end];

    let mut fragments: Vec<(usize, &str)> = STYLE_RE
        .find_iter(head)
        .chain(LINK_RE.find_iter(head))
        .filter(|m| !m.as_str().contains("data-contract-base"))
        .map(|m| (m.start(), m.as_str()))
        .collect();
    fragments.sort_by_key(|(start, _)| *start);
    let styles: Vec<String> = fragments.into_iter().map(|(_, s)| s.to_string()).collect();

    let body = match html.find(BODY_ANCHOR) {
        Some(anchor) => {
            let start = anchor + BODY_ANCHOR.len();
            match find_container_end(html, start) {
                Some(end) => html[start..end].trim().to_string(),
                None => html[start..].trim().to_string(),
            }
        }
        None => html.to_string(),
    };

    (body, styles)
}

/// Find the closing `</div>` matching the container opened just before
/// `from`, tolerating nested divs inside the body content.
fn find_container_end(html: &str, from: usize) -> Option<usize> {
    let mut depth = 1;
    for m in DIV_RE.find_iter(&html[from..]) {
        if m.as_str().starts_with("</") {
            depth -= 1;
            if depth == 0 {
                return Some(from + m.start());
            }
        } else {
            depth += 1;
        }
    }
    None
}
