//! # TangleDB Core
//!
//! Embedded, content-addressed, causally-ordered message store.
//!
//! Messages are signed, identified by a hash of their canonical metadata,
//! and organized into per-topic DAGs ("tangles") with lipmaa skip-links for
//! logarithmic certification paths. Everything is verified locally before it
//! is trusted; persistence goes through the block-structured append-only
//! log in `tangledb_storage`.
//!
//! ## Example
//!
//! ```no_run
//! use tangledb_core::{Config, Database, Keypair, Message, PROTOCOL_V4};
//! use std::path::Path;
//!
//! let db = Database::open(Path::new("tangle.db"), Config::default()).unwrap();
//! let keypair = Keypair::generate();
//!
//! let root = Message::create_root(&PROTOCOL_V4, "chat", &keypair, None).unwrap();
//! let root_id = root.id(&PROTOCOL_V4).unwrap();
//! db.add(&root, &root_id).unwrap();
//! db.flush().unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod crypto;
mod database;
mod encryption;
mod error;
mod feed;
mod ghosts;
mod message;
pub mod protocol;
pub mod tangle;
mod validate;

pub use config::Config;
pub use crypto::{decode_public_key, verify, Keypair};
pub use database::{Database, RecordSlot};
pub use encryption::{join_suffix, split_suffix, EncryptionFormat, EncryptionFormats};
pub use error::{CoreError, CoreResult, ValidationError};
pub use feed::{ChangeFeed, EventKind, MessageEvent};
pub use ghosts::{GhostFile, GhostStore};
pub use message::{validate_label, CreateParams, Message, Metadata, TangleRef};
pub use protocol::{
    is_msg_uri, msg_uri, parse_msg_uri, strip_uri, HashAlgorithm, ParsedUri, ProtocolSpec,
    PROTOCOL_V3, PROTOCOL_V4,
};
pub use tangle::{lipmaa, Tangle};
pub use validate::{is_feed_root, GroupAuthority, OpenAuthority, Validator};
