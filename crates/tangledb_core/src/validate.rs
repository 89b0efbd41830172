//! Admission pipeline for candidate messages.
//!
//! An ordered, short-circuiting sequence of checks; the first failing stage
//! names the rule that rejected the message. Signature verification runs
//! last so that cheap structural rejections never pay for a curve operation.

use crate::crypto::{decode_public_key, verify};
use crate::error::{CoreResult, ValidationError};
use crate::message::{validate_label, Message};
use crate::protocol::{is_msg_uri, ProtocolSpec};
use crate::tangle::Tangle;
use serde_json::Value;

/// Answers whether a signing key may currently write to a causal group.
///
/// Implementations typically consult group membership messages replicated
/// out of band; [`OpenAuthority`] admits everyone.
pub trait GroupAuthority: Send + Sync {
    /// Whether `key` is authorized to write to `group`.
    fn is_authorized(&self, group: &str, key: &str) -> bool;
}

/// Authority that admits every key to every group.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAuthority;

impl GroupAuthority for OpenAuthority {
    fn is_authorized(&self, _group: &str, _key: &str) -> bool {
        true
    }
}

/// Causal group value that bypasses authorization entirely.
const GROUP_ANY: &str = "any";

/// Causal group value marking a self-owned root, which is not a feed.
const GROUP_SELF: &str = "self";

/// Returns whether `root` establishes a feed: a payload-less moot with no
/// prior tangles whose causal group is a real group rather than "self".
#[must_use]
pub fn is_feed_root(root: &Message) -> bool {
    root.is_root()
        && matches!(root.metadata.causal_group.as_deref(), Some(g) if g != GROUP_SELF)
}

/// Validates candidate messages against a tangle snapshot.
pub struct Validator<'a> {
    spec: &'a ProtocolSpec,
    authority: &'a dyn GroupAuthority,
}

impl<'a> Validator<'a> {
    /// Creates a validator for `spec` consulting `authority` for feed
    /// writes.
    #[must_use]
    pub fn new(spec: &'a ProtocolSpec, authority: &'a dyn GroupAuthority) -> Self {
        Self { spec, authority }
    }

    /// Runs the full pipeline over `msg` (whose id is `id`) against
    /// `tangle`. `root` is the tangle's root message when locally known;
    /// it drives feed authorization.
    ///
    /// # Errors
    ///
    /// Returns the [`ValidationError`] of the first failing stage, or a
    /// codec error if canonical serialization fails.
    pub fn validate(
        &self,
        id: &str,
        msg: &Message,
        tangle: &Tangle,
        root: Option<&Message>,
    ) -> CoreResult<()> {
        self.check_shape(msg)?;
        self.check_signing_key(msg)?;
        self.check_payload(msg)?;
        validate_label(&msg.metadata.label)?;
        self.check_authorization(id, msg, tangle, root)?;
        // A message that occupies the root id, or that carries no tangle
        // entries at all and therefore claims to be a root, gets the root
        // cross-check; everything else must prove tangle membership.
        if id == tangle.root_id() || msg.metadata.tangles.is_empty() {
            self.check_root(id, msg, tangle)?;
        } else {
            self.check_membership(msg, tangle)?;
        }
        self.check_signature(msg)?;
        Ok(())
    }

    fn check_shape(&self, msg: &Message) -> Result<(), ValidationError> {
        if msg.signing_key.is_empty() {
            return Err(ValidationError::MissingField {
                field: "signingKey",
            });
        }
        if msg.signature.is_empty() {
            return Err(ValidationError::MissingField { field: "signature" });
        }
        if msg.metadata.version != self.spec.version {
            return Err(ValidationError::WrongVersion {
                expected: self.spec.version,
                actual: msg.metadata.version,
            });
        }
        Ok(())
    }

    fn check_signing_key(&self, msg: &Message) -> Result<(), ValidationError> {
        decode_public_key(&msg.signing_key).map_err(|e| ValidationError::InvalidSigningKey {
            reason: e.to_string(),
        })?;
        Ok(())
    }

    fn check_payload(&self, msg: &Message) -> Result<(), ValidationError> {
        let payload = match &msg.payload {
            None => return Ok(()),
            Some(payload) => payload,
        };
        match payload {
            Value::Object(_) | Value::String(_) | Value::Null => {}
            _ => return Err(ValidationError::InvalidPayloadShape),
        }
        let bytes = serde_json::to_vec(payload).map_err(|_| ValidationError::InvalidPayloadShape)?;
        if msg.metadata.payload_hash.as_deref() != Some(self.spec.derive_id(&bytes).as_str()) {
            return Err(ValidationError::PayloadHashMismatch);
        }
        let actual = bytes.len() as u64;
        if msg.metadata.payload_size != actual {
            return Err(ValidationError::PayloadSizeMismatch {
                declared: msg.metadata.payload_size,
                actual,
            });
        }
        Ok(())
    }

    fn check_authorization(
        &self,
        id: &str,
        msg: &Message,
        tangle: &Tangle,
        root: Option<&Message>,
    ) -> Result<(), ValidationError> {
        // The root itself is exempt from its own feed's authorization.
        if id == tangle.root_id() {
            return Ok(());
        }
        let root = match root {
            Some(root) if is_feed_root(root) => root,
            _ => return Ok(()),
        };
        let group = match root.metadata.causal_group.as_deref() {
            Some(group) if group != GROUP_ANY => group,
            _ => return Ok(()),
        };
        if self.authority.is_authorized(group, &msg.signing_key) {
            Ok(())
        } else {
            Err(ValidationError::UnauthorizedKey {
                group: group.to_string(),
            })
        }
    }

    fn check_membership(&self, msg: &Message, tangle: &Tangle) -> Result<(), ValidationError> {
        let entry = msg
            .metadata
            .tangles
            .get(tangle.root_id())
            .ok_or_else(|| ValidationError::MissingTangle {
                root: tangle.root_id().to_string(),
            })?;

        let prev = entry.prev.as_ref().ok_or(ValidationError::PrevNotArray)?;
        if prev.is_empty() {
            return Err(ValidationError::PrevEmpty);
        }
        for item in prev {
            if is_msg_uri(item) {
                return Err(ValidationError::PrevItemUri { item: item.clone() });
            }
        }
        if prev.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ValidationError::PrevUnsorted);
        }

        if entry.depth == 0 {
            return Err(ValidationError::InvalidDepth { depth: entry.depth });
        }
        let mut known_max = None;
        for p in prev {
            if let Some(prev_depth) = tangle.depth_of(p) {
                if prev_depth >= entry.depth {
                    return Err(ValidationError::PrevDepthNotLower {
                        id: p.clone(),
                        prev_depth,
                        depth: entry.depth,
                    });
                }
                known_max = Some(known_max.map_or(prev_depth, |m: u64| m.max(prev_depth)));
            }
        }
        match known_max {
            None => Err(ValidationError::AllPrevUnknown),
            Some(max) if prev.iter().all(|p| tangle.depth_of(p).is_some()) => {
                if entry.depth == max + 1 {
                    Ok(())
                } else {
                    Err(ValidationError::WrongDepth {
                        expected: max + 1,
                        actual: entry.depth,
                    })
                }
            }
            Some(_) => Ok(()),
        }
    }

    fn check_root(&self, id: &str, msg: &Message, tangle: &Tangle) -> Result<(), ValidationError> {
        if id != tangle.root_id() {
            return Err(ValidationError::RootIdMismatch {
                id: id.to_string(),
                root: tangle.root_id().to_string(),
            });
        }
        if msg.metadata.tangles.contains_key(id) {
            return Err(ValidationError::RootSelfReference);
        }
        Ok(())
    }

    fn check_signature(&self, msg: &Message) -> CoreResult<()> {
        let bytes = msg.metadata.canonical_bytes(self.spec)?;
        match verify(&msg.signing_key, &bytes, &msg.signature) {
            Ok(true) => Ok(()),
            _ => Err(ValidationError::BadSignature.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;
    use crate::error::CoreError;
    use crate::message::{CreateParams, TangleRef};
    use crate::protocol::{PROTOCOL_V3, PROTOCOL_V4};
    use serde_json::json;

    fn keypair() -> Keypair {
        Keypair::from_seed(&[9u8; 32])
    }

    fn setup() -> (Message, String, Tangle) {
        let root = Message::create_root(&PROTOCOL_V3, "chat", &keypair(), None).unwrap();
        let root_id = root.id(&PROTOCOL_V3).unwrap();
        let mut tangle = Tangle::new(&root_id);
        tangle.add(&root_id, &root);
        (root, root_id, tangle)
    }

    fn candidate(tangle: &Tangle) -> (Message, String) {
        let msg = Message::create(
            &PROTOCOL_V3,
            CreateParams {
                payload: Some(json!({"text": "hi"})),
                label: "chat",
                keypair: &keypair(),
                causal_group: None,
                causal_group_tips: None,
                tangles: &[tangle],
            },
        )
        .unwrap();
        let id = msg.id(&PROTOCOL_V3).unwrap();
        (msg, id)
    }

    fn expect_rejection(result: CoreResult<()>, want: &ValidationError) {
        match result {
            Err(CoreError::Validation(e)) => assert_eq!(&e, want),
            other => panic!("expected {want:?}, got {other:?}"),
        }
    }

    #[test]
    fn valid_root_and_descendant_pass() {
        let (root, root_id, tangle) = setup();
        let validator = Validator::new(&PROTOCOL_V3, &OpenAuthority);
        validator
            .validate(&root_id, &root, &tangle, Some(&root))
            .unwrap();

        let (msg, id) = candidate(&tangle);
        validator.validate(&id, &msg, &tangle, Some(&root)).unwrap();
    }

    #[test]
    fn wrong_version_rejected() {
        let (root, root_id, tangle) = setup();
        let validator = Validator::new(&PROTOCOL_V4, &OpenAuthority);
        expect_rejection(
            validator.validate(&root_id, &root, &tangle, Some(&root)),
            &ValidationError::WrongVersion {
                expected: 4,
                actual: 3,
            },
        );
    }

    #[test]
    fn bad_signing_key_rejected() {
        let (root, _, tangle) = setup();
        let (mut msg, id) = candidate(&tangle);
        msg.signing_key = "tooShort".to_string();
        let validator = Validator::new(&PROTOCOL_V3, &OpenAuthority);
        assert!(matches!(
            validator.validate(&id, &msg, &tangle, Some(&root)),
            Err(CoreError::Validation(
                ValidationError::InvalidSigningKey { .. }
            ))
        ));
    }

    #[test]
    fn array_payload_rejected() {
        let (root, _, tangle) = setup();
        let (mut msg, id) = candidate(&tangle);
        msg.payload = Some(json!([1, 2, 3]));
        let validator = Validator::new(&PROTOCOL_V3, &OpenAuthority);
        expect_rejection(
            validator.validate(&id, &msg, &tangle, Some(&root)),
            &ValidationError::InvalidPayloadShape,
        );
    }

    #[test]
    fn tampered_payload_rejected_by_hash() {
        let (root, _, tangle) = setup();
        let (mut msg, id) = candidate(&tangle);
        msg.payload = Some(json!({"text": "tampered"}));
        let validator = Validator::new(&PROTOCOL_V3, &OpenAuthority);
        expect_rejection(
            validator.validate(&id, &msg, &tangle, Some(&root)),
            &ValidationError::PayloadHashMismatch,
        );
    }

    #[test]
    fn unsorted_prev_rejected() {
        let (root, root_id, tangle) = setup();
        let (mut msg, _) = candidate(&tangle);
        let entry = msg.metadata.tangles.get_mut(&root_id).unwrap();
        entry.prev = Some(vec!["zzz".to_string(), "aaa".to_string()]);
        let id = msg.id(&PROTOCOL_V3).unwrap();
        let validator = Validator::new(&PROTOCOL_V3, &OpenAuthority);
        expect_rejection(
            validator.validate(&id, &msg, &tangle, Some(&root)),
            &ValidationError::PrevUnsorted,
        );
    }

    #[test]
    fn empty_and_null_prev_rejected() {
        let (root, root_id, tangle) = setup();
        let validator = Validator::new(&PROTOCOL_V3, &OpenAuthority);

        let (mut msg, _) = candidate(&tangle);
        msg.metadata.tangles.get_mut(&root_id).unwrap().prev = Some(Vec::new());
        let id = msg.id(&PROTOCOL_V3).unwrap();
        expect_rejection(
            validator.validate(&id, &msg, &tangle, Some(&root)),
            &ValidationError::PrevEmpty,
        );

        let (mut msg, _) = candidate(&tangle);
        msg.metadata.tangles.get_mut(&root_id).unwrap().prev = None;
        let id = msg.id(&PROTOCOL_V3).unwrap();
        expect_rejection(
            validator.validate(&id, &msg, &tangle, Some(&root)),
            &ValidationError::PrevNotArray,
        );
    }

    #[test]
    fn uri_prev_item_rejected() {
        let (root, root_id, tangle) = setup();
        let (mut msg, _) = candidate(&tangle);
        let uri = format!("tangle:message/3/{root_id}/{root_id}");
        msg.metadata.tangles.get_mut(&root_id).unwrap().prev = Some(vec![uri.clone()]);
        let id = msg.id(&PROTOCOL_V3).unwrap();
        let validator = Validator::new(&PROTOCOL_V3, &OpenAuthority);
        expect_rejection(
            validator.validate(&id, &msg, &tangle, Some(&root)),
            &ValidationError::PrevItemUri { item: uri },
        );
    }

    #[test]
    fn all_unknown_prev_rejected() {
        let (root, root_id, tangle) = setup();
        let (mut msg, _) = candidate(&tangle);
        msg.metadata.tangles.get_mut(&root_id).unwrap().prev =
            Some(vec!["unknownMessageId".to_string()]);
        let id = msg.id(&PROTOCOL_V3).unwrap();
        let validator = Validator::new(&PROTOCOL_V3, &OpenAuthority);
        expect_rejection(
            validator.validate(&id, &msg, &tangle, Some(&root)),
            &ValidationError::AllPrevUnknown,
        );
    }

    #[test]
    fn wrong_depth_rejected_when_all_prev_known() {
        let (root, root_id, tangle) = setup();
        let (mut msg, _) = candidate(&tangle);
        msg.metadata.tangles.get_mut(&root_id).unwrap().depth = 5;
        let id = msg.id(&PROTOCOL_V3).unwrap();
        let validator = Validator::new(&PROTOCOL_V3, &OpenAuthority);
        expect_rejection(
            validator.validate(&id, &msg, &tangle, Some(&root)),
            &ValidationError::WrongDepth {
                expected: 1,
                actual: 5,
            },
        );
    }

    #[test]
    fn zero_depth_rejected() {
        let (root, root_id, tangle) = setup();
        let (mut msg, _) = candidate(&tangle);
        msg.metadata.tangles.get_mut(&root_id).unwrap().depth = 0;
        let id = msg.id(&PROTOCOL_V3).unwrap();
        let validator = Validator::new(&PROTOCOL_V3, &OpenAuthority);
        expect_rejection(
            validator.validate(&id, &msg, &tangle, Some(&root)),
            &ValidationError::InvalidDepth { depth: 0 },
        );
    }

    #[test]
    fn root_shaped_message_with_wrong_id_rejected() {
        let (root, _, tangle) = setup();
        // A message with no tangle entries claims to be a root; it may only
        // occupy the tangle's own root id.
        let imposter = Message::create_root(&PROTOCOL_V3, "other_topic", &keypair(), None).unwrap();
        let id = imposter.id(&PROTOCOL_V3).unwrap();
        let validator = Validator::new(&PROTOCOL_V3, &OpenAuthority);
        expect_rejection(
            validator.validate(&id, &imposter, &tangle, Some(&root)),
            &ValidationError::RootIdMismatch {
                id: id.clone(),
                root: tangle.root_id().to_string(),
            },
        );
    }

    #[test]
    fn root_self_reference_rejected() {
        let (mut root, root_id, tangle) = setup();
        root.metadata.tangles.insert(
            root_id.clone(),
            TangleRef {
                depth: 1,
                prev: Some(vec![root_id.clone()]),
            },
        );
        let validator = Validator::new(&PROTOCOL_V3, &OpenAuthority);
        expect_rejection(
            validator.validate(&root_id, &root, &tangle, Some(&root)),
            &ValidationError::RootSelfReference,
        );
    }

    #[test]
    fn bad_signature_rejected_last() {
        let (root, _, tangle) = setup();
        let (mut msg, id) = candidate(&tangle);
        msg.signature = Keypair::from_seed(&[1u8; 32]).sign(b"other bytes");
        let validator = Validator::new(&PROTOCOL_V3, &OpenAuthority);
        expect_rejection(
            validator.validate(&id, &msg, &tangle, Some(&root)),
            &ValidationError::BadSignature,
        );
    }

    struct DenyAll;
    impl GroupAuthority for DenyAll {
        fn is_authorized(&self, _group: &str, _key: &str) -> bool {
            false
        }
    }

    #[test]
    fn feed_write_requires_authorization() {
        let root = Message::create_root(&PROTOCOL_V3, "chat", &keypair(), Some("team")).unwrap();
        let root_id = root.id(&PROTOCOL_V3).unwrap();
        let mut tangle = Tangle::new(&root_id);
        tangle.add(&root_id, &root);
        assert!(is_feed_root(&root));

        let (msg, id) = candidate(&tangle);
        let validator = Validator::new(&PROTOCOL_V3, &DenyAll);
        expect_rejection(
            validator.validate(&id, &msg, &tangle, Some(&root)),
            &ValidationError::UnauthorizedKey {
                group: "team".to_string(),
            },
        );

        // The root itself is exempt.
        validator
            .validate(&root_id, &root, &tangle, Some(&root))
            .unwrap();
    }

    #[test]
    fn wildcard_group_bypasses_authority() {
        let root = Message::create_root(&PROTOCOL_V3, "chat", &keypair(), Some("any")).unwrap();
        let root_id = root.id(&PROTOCOL_V3).unwrap();
        let mut tangle = Tangle::new(&root_id);
        tangle.add(&root_id, &root);

        let (msg, id) = candidate(&tangle);
        let validator = Validator::new(&PROTOCOL_V3, &DenyAll);
        validator.validate(&id, &msg, &tangle, Some(&root)).unwrap();
    }

    #[test]
    fn self_group_is_not_a_feed() {
        let root = Message::create_root(&PROTOCOL_V3, "chat", &keypair(), Some("self")).unwrap();
        assert!(!is_feed_root(&root));
    }
}
