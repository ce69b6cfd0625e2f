//! Contract placeholder resolution and signature compositing
//!
//! This crate locates signature slots inside a contract HTML document,
//! substitutes slots with rendered signatures (drawn images or styled
//! typed text), and packages the result as a standalone document.
//!
//! The durable source of truth is the variable map, not the rendered
//! HTML: every signature event replays the full map against the stored
//! clean template, so rendering is idempotent and tolerant of repeated
//! or concurrent re-runs.

pub mod compositor;
pub mod detector;
pub mod packager;
pub mod session;
pub mod template;

pub use compositor::{
    apply_signature, count_placeholders, rebuild_from_template, DEFAULT_SIGNATURE_FONT,
};
pub use detector::{detect_slots, wrap_bare_placeholders};
pub use packager::{extract_body_and_styles, package_document};
pub use session::{CollaborationRecord, CollaborationStore, SigningReceipt, SigningSession};
pub use template::recover_template;
