//! Signing session orchestration over the collaborator store boundary
//!
//! The store is consumed as an opaque service: resolve a signing token
//! to the current collaboration state, upsert the rendered document and
//! variable map, flip the signed flag. All document work in between is
//! pure and synchronous; the rendered HTML is always regenerated in
//! full from the clean template plus the variable map, never patched in
//! place, so re-running a signing step for the same inputs is safe.

use contract_types::{
    validate_image_payload, ContractSignError, SignaturePayload, SlotStatus, VariableMap,
};
use serde::{Deserialize, Serialize};

use crate::compositor::{count_placeholders, rebuild_from_template, DEFAULT_SIGNATURE_FONT};
use crate::detector::{detect_slots, wrap_bare_placeholders};
use crate::packager::{extract_body_and_styles, package_document};
use crate::template::recover_template;

/// Current state of a collaboration record, as resolved from a signing
/// session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaborationRecord {
    pub collaboration_id: String,
    /// Packaged rendered document, a derived artifact.
    pub rendered_html: String,
    /// Clean template, all slots reset to placeholder tokens. Absent
    /// only on records created before explicit template storage.
    pub template_html: Option<String>,
    /// JSON form of the durable variable map.
    pub variable_map_json: String,
}

/// Abstracted collaborator operations. Implementations are expected to
/// make `persist` an atomic upsert keyed by the collaboration id.
pub trait CollaborationStore {
    fn load(&self, token: &str) -> Result<CollaborationRecord, ContractSignError>;

    fn persist(
        &self,
        collaboration_id: &str,
        rendered_html: &str,
        template_html: &str,
        variable_map_json: &str,
    ) -> Result<(), ContractSignError>;

    /// Best-effort flag update; failures are logged by the session and
    /// never fail the signing operation.
    fn mark_signed(&self, collaboration_id: &str) -> Result<(), ContractSignError>;
}

/// Outcome of one signing step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningReceipt {
    pub collaboration_id: String,
    pub slot_index: usize,
    pub payload: SignaturePayload,
    pub remaining_slots: usize,
    pub signed_at: u64,
}

/// One signing session: loaded once per signer, then driven one
/// signature event at a time.
pub struct SigningSession<S: CollaborationStore> {
    store: S,
    collaboration_id: String,
    template: String,
    map: VariableMap,
    custom_styles: Vec<String>,
    rendered: String,
}

impl<S: CollaborationStore> SigningSession<S> {
    /// Resolve a signing token and prepare the session.
    ///
    /// Legacy records without a stored template get one recovered from
    /// the rendered document and persisted immediately, so every later
    /// rebuild starts from the durable copy instead of re-deriving it.
    pub fn open(store: S, token: &str) -> Result<Self, ContractSignError> {
        let record = store.load(token)?;
        let map = VariableMap::from_json(&record.variable_map_json)?;
        let (body, custom_styles) = extract_body_and_styles(&record.rendered_html);

        let needs_template_persist = record.template_html.is_none();
        let template = match record.template_html {
            Some(template) => template,
            None => recover_template(&body),
        };

        let rendered = rebuild_from_template(&template, &map, DEFAULT_SIGNATURE_FONT);

        let session = Self {
            store,
            collaboration_id: record.collaboration_id,
            template,
            map,
            custom_styles,
            rendered,
        };

        if needs_template_persist {
            session.persist_current()?;
        }

        tracing::info!(
            collaboration_id = %session.collaboration_id,
            slots = session.slot_count(),
            remaining = session.remaining_slots(),
            "signing session opened"
        );
        Ok(session)
    }

    /// Record a signature for one slot and persist the regenerated
    /// document.
    ///
    /// The variable map is the read-modify-write target; the rendered
    /// document is rebuilt in full from the clean template afterwards.
    /// Once every slot is filled the collaboration is marked signed,
    /// best-effort.
    ///
    /// A slot index the template cannot satisfy is rejected before any
    /// state changes: the compositor's silent no-op would otherwise let
    /// a stray `signature_<n>` entry reach the durable map.
    pub fn sign(
        &mut self,
        slot_index: usize,
        payload: &str,
        font: &str,
    ) -> Result<SigningReceipt, ContractSignError> {
        let total = count_placeholders(&self.template);
        if slot_index >= total {
            return Err(ContractSignError::SlotOutOfRange {
                index: slot_index,
                total,
            });
        }

        let kind = SignaturePayload::classify(payload);
        if kind == SignaturePayload::Image {
            validate_image_payload(payload)?;
        }

        self.map.set_signature(slot_index, payload);
        if kind == SignaturePayload::Text && !font.is_empty() {
            self.map.set_font(slot_index, font);
        }

        self.rendered = rebuild_from_template(&self.template, &self.map, DEFAULT_SIGNATURE_FONT);
        self.persist_current()?;

        let remaining = self.remaining_slots();
        if remaining == 0 && self.slot_count() > 0 {
            if let Err(err) = self.store.mark_signed(&self.collaboration_id) {
                tracing::warn!(
                    collaboration_id = %self.collaboration_id,
                    error = %err,
                    "failed to mark collaboration signed"
                );
            }
        }

        tracing::info!(
            collaboration_id = %self.collaboration_id,
            slot_index,
            remaining,
            "signature applied"
        );

        Ok(SigningReceipt {
            collaboration_id: self.collaboration_id.clone(),
            slot_index,
            payload: kind,
            remaining_slots: remaining,
            signed_at: chrono::Utc::now().timestamp() as u64,
        })
    }

    /// Slot statuses against the current rendered document. Recomputed
    /// fresh on every call; no index survives a document mutation.
    pub fn slots(&self) -> Vec<SlotStatus> {
        detect_slots(&self.rendered)
    }

    pub fn slot_count(&self) -> usize {
        self.slots().len()
    }

    pub fn remaining_slots(&self) -> usize {
        self.slots().iter().filter(|slot| !slot.filled).count()
    }

    /// Current rendered body, before packaging.
    pub fn rendered_html(&self) -> &str {
        &self.rendered
    }

    /// Rendered body with every bare placeholder wrapped in a clickable
    /// marker box, for interactive display.
    pub fn display_html(&self) -> String {
        wrap_bare_placeholders(&self.rendered)
    }

    pub fn variable_map(&self) -> &VariableMap {
        &self.map
    }

    fn persist_current(&self) -> Result<(), ContractSignError> {
        let packaged = package_document(&self.rendered, &self.custom_styles);
        let map_json = self.map.to_json()?;
        self.store.persist(
            &self.collaboration_id,
            &packaged,
            &self.template,
            &map_json,
        )
    }
}
