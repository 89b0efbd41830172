//! Message model, canonical serialization, and identity derivation.
//!
//! A message's identity is a content hash of its canonically-serialized
//! metadata; the payload is hashed *into* the metadata but excluded from the
//! id itself, so erasing a payload never changes the message id and never
//! breaks references that already point to it.
//!
//! Canonical bytes are produced through `serde_json::Value`, whose object
//! map keeps keys sorted; independent implementations therefore hash and
//! sign identical bytes.

use crate::crypto::Keypair;
use crate::error::{CoreResult, ValidationError};
use crate::protocol::ProtocolSpec;
use crate::tangle::Tangle;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Label length bounds.
const LABEL_MIN: usize = 3;
const LABEL_MAX: usize = 100;

/// A message's entry in one tangle: its causal depth and parent set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TangleRef {
    /// Causal depth within the tangle; the root sits at depth 0.
    pub depth: u64,
    /// Parent message ids, strictly sorted ascending. `None` only occurs in
    /// malformed input and is rejected at validation.
    pub prev: Option<Vec<String>>,
}

/// Signed message metadata. This is the content that gets hashed and signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// Hash of the canonically-serialized payload, or `None` for a root or
    /// erased message.
    pub payload_hash: Option<String>,
    /// Size in bytes of the canonically-serialized payload.
    pub payload_size: u64,
    /// The causal group this message belongs to, if any.
    pub causal_group: Option<String>,
    /// Most recent known tips of the causal group's own tangle.
    pub causal_group_tips: Option<Vec<String>>,
    /// Tangle entries, keyed by tangle root id.
    pub tangles: BTreeMap<String, TangleRef>,
    /// Application label, 3-100 alphanumeric/underscore characters.
    pub label: String,
    /// Protocol version.
    pub version: u16,
}

/// A content-addressed, signed message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Application payload. `None` marks a topic root or an erased message.
    pub payload: Option<Value>,
    /// Signed metadata.
    pub metadata: Metadata,
    /// Base58 public key of the author.
    pub signing_key: String,
    /// Base58 signature over the canonical metadata bytes.
    pub signature: String,
}

/// Inputs for building a candidate message against tangle snapshots.
pub struct CreateParams<'a> {
    /// Application payload, or `None` for a payload-less message.
    pub payload: Option<Value>,
    /// Application label.
    pub label: &'a str,
    /// Keypair that signs the metadata.
    pub keypair: &'a Keypair,
    /// Causal group, if the message belongs to one.
    pub causal_group: Option<&'a str>,
    /// Known tips of the causal group's tangle.
    pub causal_group_tips: Option<Vec<String>>,
    /// Tangles the message extends.
    pub tangles: &'a [&'a Tangle],
}

impl Message {
    /// Builds a signed candidate message.
    ///
    /// For each referenced tangle, the candidate's depth is
    /// `max_depth + 1` and its parents are the union of the tangle's lipmaa
    /// skip-set at that depth and its current tips, deduplicated and sorted.
    ///
    /// # Errors
    ///
    /// Fails if the label violates the label-format rule or a referenced
    /// tangle's root id is not a well-formed message id.
    pub fn create(spec: &ProtocolSpec, params: CreateParams<'_>) -> CoreResult<Self> {
        validate_label(params.label)?;

        let mut tangles = BTreeMap::new();
        for tangle in params.tangles {
            let root = tangle.root_id();
            if !spec.is_wellformed_id(root) {
                return Err(ValidationError::MalformedRootId {
                    id: root.to_string(),
                }
                .into());
            }
            let depth = tangle.max_depth() + 1;
            let mut prev: Vec<String> = tangle
                .lipmaa_set(depth)
                .into_iter()
                .chain(tangle.tips().iter().cloned())
                .collect();
            prev.sort();
            prev.dedup();
            tangles.insert(
                root.to_string(),
                TangleRef {
                    depth,
                    prev: Some(prev),
                },
            );
        }

        let (payload_hash, payload_size) = match &params.payload {
            Some(value) => {
                let bytes = serde_json::to_vec(value)?;
                (Some(spec.derive_id(&bytes)), bytes.len() as u64)
            }
            None => (None, 0),
        };

        let metadata = Metadata {
            payload_hash,
            payload_size,
            causal_group: params.causal_group.map(str::to_string),
            causal_group_tips: params.causal_group_tips,
            tangles,
            label: params.label.to_string(),
            version: spec.version,
        };

        let signature = params.keypair.sign(&metadata.canonical_bytes(spec)?);
        Ok(Self {
            payload: params.payload,
            metadata,
            signing_key: params.keypair.public_key(),
            signature,
        })
    }

    /// Builds a topic root: payload-less, tangle-less, size zero.
    ///
    /// # Errors
    ///
    /// Fails if the label violates the label-format rule.
    pub fn create_root(
        spec: &ProtocolSpec,
        label: &str,
        keypair: &Keypair,
        causal_group: Option<&str>,
    ) -> CoreResult<Self> {
        Self::create(
            spec,
            CreateParams {
                payload: None,
                label,
                keypair,
                causal_group,
                causal_group_tips: None,
                tangles: &[],
            },
        )
    }

    /// Returns the message id: a base58 content hash of the canonical
    /// metadata bytes.
    ///
    /// # Errors
    ///
    /// Fails only if metadata cannot be serialized.
    pub fn id(&self, spec: &ProtocolSpec) -> CoreResult<String> {
        Ok(spec.derive_id(&self.metadata.canonical_bytes(spec)?))
    }

    /// Returns an erased copy: payload `None`, everything else unchanged.
    ///
    /// Because ids cover metadata only, the erased copy keeps the original
    /// id and signature.
    #[must_use]
    pub fn erase(&self) -> Self {
        Self {
            payload: None,
            metadata: self.metadata.clone(),
            signing_key: self.signing_key.clone(),
            signature: self.signature.clone(),
        }
    }

    /// Returns whether this message is a topic root: no payload and no
    /// tangle entries.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.payload.is_none() && self.metadata.tangles.is_empty()
    }
}

impl Metadata {
    /// Serializes metadata deterministically: sorted keys, no whitespace,
    /// version-specific causal field names.
    ///
    /// # Errors
    ///
    /// Fails only if serialization itself fails.
    pub fn canonical_bytes(&self, spec: &ProtocolSpec) -> CoreResult<Vec<u8>> {
        let mut map = Map::new();
        map.insert(
            "payloadHash".to_string(),
            match &self.payload_hash {
                Some(h) => Value::String(h.clone()),
                None => Value::Null,
            },
        );
        map.insert("payloadSize".to_string(), json!(self.payload_size));
        map.insert(
            spec.causal_field.to_string(),
            match &self.causal_group {
                Some(g) => Value::String(g.clone()),
                None => Value::Null,
            },
        );
        map.insert(
            format!("{}Tips", spec.causal_field),
            match &self.causal_group_tips {
                Some(tips) => json!(tips),
                None => Value::Null,
            },
        );
        let tangles: Map<String, Value> = self
            .tangles
            .iter()
            .map(|(root, t)| (root.clone(), json!({ "depth": t.depth, "prev": t.prev })))
            .collect();
        map.insert("tangles".to_string(), Value::Object(tangles));
        map.insert("label".to_string(), Value::String(self.label.clone()));
        map.insert("version".to_string(), json!(self.version));

        Ok(serde_json::to_vec(&Value::Object(map))?)
    }
}

/// Checks the label-format rule: 3-100 characters, alphanumeric or
/// underscore only.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidLabel`] on violation.
pub fn validate_label(label: &str) -> Result<(), ValidationError> {
    let ok_len = (LABEL_MIN..=LABEL_MAX).contains(&label.len());
    let ok_chars = label.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if ok_len && ok_chars {
        Ok(())
    } else {
        Err(ValidationError::InvalidLabel)
    }
}
