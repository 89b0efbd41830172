//! Database orchestration: log, index, validation, and notifications.
//!
//! A [`Database`] loads the entire log once at open, keeping every decoded
//! message in an in-memory record table indexed by message id. Admission
//! rebuilds a [`Tangle`] over current records, runs the [`Validator`], and
//! only then touches the log. Tangle bookkeeping is never persisted; it is
//! derived state.

use crate::config::Config;
use crate::encryption::{EncryptionFormat, EncryptionFormats};
use crate::error::{CoreError, CoreResult};
use crate::feed::{ChangeFeed, EventKind, MessageEvent};
use crate::ghosts::GhostStore;
use crate::message::Message;
use crate::tangle::Tangle;
use crate::validate::{GroupAuthority, OpenAuthority, Validator};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use std::sync::mpsc::Receiver;
use tangledb_storage::{record, BlockLog, CompactionProgress, CompactionResult, LogOptions};
use tracing::warn;

/// One live record: where it sits in the log and what it decodes to.
#[derive(Debug, Clone)]
pub struct RecordSlot {
    /// Global byte offset of the record in the log.
    pub offset: u64,
    /// Total slot size in the log (header + data + padding).
    pub size: usize,
    /// Message id.
    pub id: String,
    /// Decoded message.
    pub msg: Message,
}

/// An embedded message store over one block log file.
pub struct Database {
    config: Config,
    log: BlockLog,
    /// Record table in log order; `None` marks a tombstoned slot.
    records: RwLock<Vec<Option<RecordSlot>>>,
    /// Message id to record table position.
    index: RwLock<HashMap<String, usize>>,
    feed: ChangeFeed,
    authority: Box<dyn GroupAuthority>,
    formats: EncryptionFormats,
    ghosts: Option<Box<dyn GhostStore>>,
}

impl Database {
    /// Opens (or creates) the database at `path` and loads every record
    /// into memory.
    ///
    /// # Errors
    ///
    /// Fails if the log cannot be opened or an interior record cannot be
    /// read.
    pub fn open(path: &Path, config: Config) -> CoreResult<Self> {
        if !config.create_if_missing && !path.exists() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no database at {}", path.display()),
            )
            .into());
        }
        let mut options = LogOptions::new()
            .block_size(config.block_size)
            .cache_blocks(config.cache_blocks);
        if config.validate_on_open {
            options = options.validate(Box::new(|data: &[u8]| {
                serde_json::from_slice::<Message>(data).is_ok()
            }));
        }
        let log = BlockLog::open(path, options)?;

        let db = Self {
            config,
            log,
            records: RwLock::new(Vec::new()),
            index: RwLock::new(HashMap::new()),
            feed: ChangeFeed::new(),
            authority: Box::new(OpenAuthority),
            formats: EncryptionFormats::new(),
            ghosts: None,
        };
        db.reload()?;
        Ok(db)
    }

    /// Replaces the authority consulted for feed writes.
    pub fn set_authority(&mut self, authority: Box<dyn GroupAuthority>) {
        self.authority = authority;
    }

    /// Attaches a ghost store recording deleted ids.
    pub fn set_ghost_store(&mut self, ghosts: Box<dyn GhostStore>) {
        self.ghosts = Some(ghosts);
    }

    /// Registers a payload encryption format.
    ///
    /// # Errors
    ///
    /// Fails if the format's name is invalid.
    pub fn register_format(&mut self, format: Box<dyn EncryptionFormat>) -> CoreResult<()> {
        self.formats.register(format)
    }

    /// Rebuilds the record table and id index from the log.
    fn reload(&self) -> CoreResult<()> {
        let mut records = Vec::new();
        let mut index = HashMap::new();
        for entry in self.log.scan() {
            let entry = entry?;
            match entry.data {
                None => records.push(None),
                Some(data) => match serde_json::from_slice::<Message>(&data) {
                    Ok(msg) => {
                        let id = msg.id(&self.config.protocol)?;
                        index.insert(id.clone(), records.len());
                        records.push(Some(RecordSlot {
                            offset: entry.offset,
                            size: entry.size,
                            id,
                            msg,
                        }));
                    }
                    Err(e) => {
                        warn!(offset = entry.offset, error = %e, "undecodable record kept as empty slot");
                        records.push(None);
                    }
                },
            }
        }
        *self.records.write() = records;
        *self.index.write() = index;
        Ok(())
    }

    /// Admits `msg` into the tangle rooted at `tangle_root` and appends it.
    ///
    /// Idempotent: re-adding a message already present returns its id
    /// without validating or appending again.
    ///
    /// # Errors
    ///
    /// Fails with a validation error when the message is rejected, or a
    /// storage error when the append fails.
    pub fn add(&self, msg: &Message, tangle_root: &str) -> CoreResult<String> {
        let id = msg.id(&self.config.protocol)?;
        if self.index.read().contains_key(&id) {
            return Ok(id);
        }

        {
            let tangle = self.get_tangle(tangle_root);
            let records = self.records.read();
            let index = self.index.read();
            let root_msg = index
                .get(tangle_root)
                .and_then(|i| records[*i].as_ref())
                .map(|slot| &slot.msg);
            Validator::new(&self.config.protocol, self.authority.as_ref())
                .validate(&id, msg, &tangle, root_msg)?;
        }

        let bytes = serde_json::to_vec(msg)?;
        let offset = self.log.append(&bytes)?;

        let mut records = self.records.write();
        self.index.write().insert(id.clone(), records.len());
        records.push(Some(RecordSlot {
            offset,
            size: record::encoded_size(bytes.len()),
            id: id.clone(),
            msg: msg.clone(),
        }));
        drop(records);

        self.feed.emit(&id, EventKind::Added);
        Ok(id)
    }

    /// Returns the message stored under `id`.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::MessageNotFound`] for unknown or deleted ids.
    pub fn get(&self, id: &str) -> CoreResult<Message> {
        self.get_record(id)
            .map(|slot| slot.msg)
            .ok_or_else(|| CoreError::not_found(id))
    }

    /// Returns the full record slot for `id`, if present.
    #[must_use]
    pub fn get_record(&self, id: &str) -> Option<RecordSlot> {
        let records = self.records.read();
        let index = self.index.read();
        index.get(id).and_then(|i| records[*i].clone())
    }

    /// Whether a live record exists for `id`.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.get_record(id).is_some()
    }

    /// Tombstones the record for `id` in the log and drops it from the
    /// index. Ghosts are recorded per tangle when a ghost store is attached.
    ///
    /// # Errors
    ///
    /// Fails for unknown ids, during compaction, or on log I/O errors.
    pub fn del(&self, id: &str) -> CoreResult<()> {
        let slot = self.get_record(id).ok_or_else(|| CoreError::not_found(id))?;
        self.log.del(slot.offset)?;

        if let Some(ghosts) = &self.ghosts {
            for (root, entry) in &slot.msg.metadata.tangles {
                let max_depth = self.get_tangle(root).max_depth();
                ghosts.save(root, id, entry.depth, max_depth, self.config.ghost_span)?;
            }
        }

        let mut records = self.records.write();
        let mut index = self.index.write();
        if let Some(pos) = index.remove(id) {
            records[pos] = None;
        }
        drop(index);
        drop(records);

        self.feed.emit(id, EventKind::Deleted);
        Ok(())
    }

    /// Blanks the payload of `id` in place, keeping id, metadata, and
    /// signature intact. The rewritten record always fits its slot because
    /// erasing only removes bytes.
    ///
    /// # Errors
    ///
    /// Fails for unknown ids, during compaction, or on log I/O errors.
    pub fn erase(&self, id: &str) -> CoreResult<()> {
        let slot = self.get_record(id).ok_or_else(|| CoreError::not_found(id))?;
        if slot.msg.payload.is_none() {
            return Ok(());
        }
        let erased = slot.msg.erase();
        self.log.overwrite(slot.offset, &serde_json::to_vec(&erased)?)?;

        let mut records = self.records.write();
        let index = self.index.read();
        if let Some(pos) = index.get(id) {
            if let Some(slot) = records[*pos].as_mut() {
                slot.msg = erased;
            }
        }
        drop(index);
        drop(records);

        self.feed.emit(id, EventKind::Erased);
        Ok(())
    }

    /// Rebuilds the tangle rooted at `root_id` by replaying all current
    /// records in log order. O(n) per call; used once per admission.
    #[must_use]
    pub fn get_tangle(&self, root_id: &str) -> Tangle {
        let mut tangle = Tangle::new(root_id);
        for slot in self.records.read().iter().flatten() {
            tangle.add(&slot.id, &slot.msg);
        }
        tangle
    }

    /// Returns all live records in log order.
    #[must_use]
    pub fn records(&self) -> Vec<RecordSlot> {
        self.records.read().iter().flatten().cloned().collect()
    }

    /// Number of live records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    /// Whether the store holds no live records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.read().is_empty()
    }

    /// Drains pending log writes to disk.
    ///
    /// # Errors
    ///
    /// Fails on log I/O errors.
    pub fn flush(&self) -> CoreResult<()> {
        self.log.flush()?;
        Ok(())
    }

    /// Compacts the log, then rebuilds the record table against the new
    /// offsets.
    ///
    /// # Errors
    ///
    /// Fails on log I/O errors during the rewrite or the reload.
    pub fn compact(
        &self,
        progress: impl FnMut(CompactionProgress),
    ) -> CoreResult<CompactionResult> {
        let result = self.log.compact(progress)?;
        self.reload()?;
        Ok(result)
    }

    /// Subscribes to committed record operations.
    pub fn subscribe(&self) -> Receiver<MessageEvent> {
        self.feed.subscribe()
    }

    /// Decrypts the string payload of `id` using the registered formats.
    ///
    /// # Errors
    ///
    /// Fails for unknown ids, non-string payloads, or decryption errors.
    pub fn decrypt_payload(&self, id: &str, key: &[u8]) -> CoreResult<Vec<u8>> {
        let msg = self.get(id)?;
        match &msg.payload {
            Some(serde_json::Value::String(payload)) => self.formats.decrypt(payload, key),
            _ => Err(CoreError::crypto(format!(
                "payload of {id} is not an encrypted string"
            ))),
        }
    }

    /// Bytes deleted but not yet compacted away.
    #[must_use]
    pub fn deleted_bytes(&self) -> u64 {
        self.log.deleted_bytes()
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.log.path())
            .field("protocol", &self.config.protocol.version)
            .field("records", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;
    use crate::message::{CreateParams, Message};
    use crate::protocol::PROTOCOL_V3;
    use serde_json::json;
    use tempfile::TempDir;

    fn config() -> Config {
        Config::new().protocol(PROTOCOL_V3)
    }

    fn open(dir: &TempDir) -> Database {
        Database::open(&dir.path().join("db.log"), config()).unwrap()
    }

    fn add_root(db: &Database, keypair: &Keypair) -> String {
        let root = Message::create_root(&PROTOCOL_V3, "chat", keypair, None).unwrap();
        let id = root.id(&PROTOCOL_V3).unwrap();
        db.add(&root, &id).unwrap()
    }

    fn add_msg(db: &Database, keypair: &Keypair, root_id: &str, text: &str) -> String {
        let tangle = db.get_tangle(root_id);
        let msg = Message::create(
            &PROTOCOL_V3,
            CreateParams {
                payload: Some(json!({ "text": text })),
                label: "chat",
                keypair,
                causal_group: None,
                causal_group_tips: None,
                tangles: &[&tangle],
            },
        )
        .unwrap();
        db.add(&msg, root_id).unwrap()
    }

    #[test]
    fn add_get_roundtrip() {
        let dir = TempDir::new().unwrap();
        let db = open(&dir);
        let keypair = Keypair::generate();

        let root_id = add_root(&db, &keypair);
        let msg_id = add_msg(&db, &keypair, &root_id, "hello");

        assert_eq!(db.len(), 2);
        let stored = db.get(&msg_id).unwrap();
        assert_eq!(stored.payload, Some(json!({ "text": "hello" })));
        assert!(db.get("missing").is_err());
        assert_eq!(db.get_tangle(&root_id).depth_of(&msg_id), Some(1));
    }

    #[test]
    fn open_without_create_requires_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db.log");
        assert!(Database::open(&path, config().create_if_missing(false)).is_err());

        drop(open(&dir));
        assert!(Database::open(&path, config().create_if_missing(false)).is_ok());
    }

    #[test]
    fn add_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let db = open(&dir);
        let keypair = Keypair::generate();

        let root = Message::create_root(&PROTOCOL_V3, "chat", &keypair, None).unwrap();
        let id = root.id(&PROTOCOL_V3).unwrap();
        assert_eq!(db.add(&root, &id).unwrap(), id);
        assert_eq!(db.add(&root, &id).unwrap(), id);
        assert_eq!(db.len(), 1);
    }

    #[test]
    fn invalid_message_is_rejected() {
        let dir = TempDir::new().unwrap();
        let db = open(&dir);
        let keypair = Keypair::generate();
        let root_id = add_root(&db, &keypair);

        let tangle = db.get_tangle(&root_id);
        let mut msg = Message::create(
            &PROTOCOL_V3,
            CreateParams {
                payload: Some(json!({ "text": "hi" })),
                label: "chat",
                keypair: &keypair,
                causal_group: None,
                causal_group_tips: None,
                tangles: &[&tangle],
            },
        )
        .unwrap();
        msg.payload = Some(json!({ "text": "tampered" }));

        assert!(db.add(&msg, &root_id).is_err());
        assert_eq!(db.len(), 1);
    }

    #[test]
    fn del_removes_and_notifies() {
        let dir = TempDir::new().unwrap();
        let db = open(&dir);
        let keypair = Keypair::generate();
        let root_id = add_root(&db, &keypair);
        let msg_id = add_msg(&db, &keypair, &root_id, "bye");

        let rx = db.subscribe();
        db.del(&msg_id).unwrap();

        assert!(!db.contains(&msg_id));
        assert!(db.del(&msg_id).is_err());
        let event = rx.try_recv().unwrap();
        assert_eq!(event.kind, EventKind::Deleted);
        assert_eq!(event.id, msg_id);
    }

    #[test]
    fn erase_blanks_payload_but_keeps_id() {
        let dir = TempDir::new().unwrap();
        let db = open(&dir);
        let keypair = Keypair::generate();
        let root_id = add_root(&db, &keypair);
        let msg_id = add_msg(&db, &keypair, &root_id, "private");

        db.erase(&msg_id).unwrap();
        let erased = db.get(&msg_id).unwrap();
        assert_eq!(erased.payload, None);
        assert_eq!(erased.id(&PROTOCOL_V3).unwrap(), msg_id);
        // erase is idempotent
        db.erase(&msg_id).unwrap();
    }

    #[test]
    fn reload_after_reopen() {
        let dir = TempDir::new().unwrap();
        let keypair = Keypair::generate();
        let (root_id, msg_id) = {
            let db = open(&dir);
            let root_id = add_root(&db, &keypair);
            let msg_id = add_msg(&db, &keypair, &root_id, "persisted");
            db.flush().unwrap();
            (root_id, msg_id)
        };

        let db = open(&dir);
        assert_eq!(db.len(), 2);
        assert!(db.contains(&root_id));
        assert_eq!(
            db.get(&msg_id).unwrap().payload,
            Some(json!({ "text": "persisted" }))
        );
        assert_eq!(db.get_tangle(&root_id).max_depth(), 1);
    }

    #[test]
    fn deleted_record_stays_deleted_after_reopen() {
        let dir = TempDir::new().unwrap();
        let keypair = Keypair::generate();
        let (root_id, msg_id) = {
            let db = open(&dir);
            let root_id = add_root(&db, &keypair);
            let msg_id = add_msg(&db, &keypair, &root_id, "gone");
            db.del(&msg_id).unwrap();
            db.flush().unwrap();
            (root_id, msg_id)
        };

        let db = open(&dir);
        assert_eq!(db.len(), 1);
        assert!(db.contains(&root_id));
        assert!(!db.contains(&msg_id));
    }

    #[test]
    fn compact_reclaims_space_and_keeps_records() {
        let dir = TempDir::new().unwrap();
        let db = open(&dir);
        let keypair = Keypair::generate();
        let root_id = add_root(&db, &keypair);
        let keep = add_msg(&db, &keypair, &root_id, "keep");
        let drop_id = add_msg(&db, &keypair, &root_id, "drop");

        db.del(&drop_id).unwrap();
        assert!(db.deleted_bytes() > 0);

        let result = db.compact(|_| {}).unwrap();
        assert_eq!(result.holes_found, 1);
        assert_eq!(db.deleted_bytes(), 0);
        assert_eq!(db.len(), 2);
        assert!(db.contains(&root_id));
        assert!(db.contains(&keep));
        // Only root (depth 0) and keep (depth 1) survive the compaction.
        assert_eq!(db.get_tangle(&root_id).max_depth(), 1);
    }

    #[test]
    fn decrypt_payload_routes_to_format() {
        struct Plain;
        impl EncryptionFormat for Plain {
            fn name(&self) -> &'static str {
                "plain"
            }
            fn encrypt(&self, p: &[u8], _: &[u8]) -> CoreResult<Vec<u8>> {
                Ok(p.to_vec())
            }
            fn decrypt(&self, c: &[u8], _: &[u8]) -> CoreResult<Vec<u8>> {
                Ok(c.to_vec())
            }
        }

        let dir = TempDir::new().unwrap();
        let mut db = open(&dir);
        db.register_format(Box::new(Plain)).unwrap();
        let keypair = Keypair::generate();
        let root_id = add_root(&db, &keypair);

        let ciphertext = db.formats.encrypt("plain", b"hidden", b"").unwrap();
        let tangle = db.get_tangle(&root_id);
        let msg = Message::create(
            &PROTOCOL_V3,
            CreateParams {
                payload: Some(json!(ciphertext)),
                label: "chat",
                keypair: &keypair,
                causal_group: None,
                causal_group_tips: None,
                tangles: &[&tangle],
            },
        )
        .unwrap();
        let id = db.add(&msg, &root_id).unwrap();

        assert_eq!(db.decrypt_payload(&id, b"").unwrap(), b"hidden");
        assert!(db.decrypt_payload(&root_id, b"").is_err());
    }

    #[test]
    fn ghost_store_records_deletions() {
        use crate::ghosts::GhostFile;

        let dir = TempDir::new().unwrap();
        let mut db = open(&dir);
        db.set_ghost_store(Box::new(
            GhostFile::open(dir.path().join("ghosts")).unwrap(),
        ));
        let keypair = Keypair::generate();
        let root_id = add_root(&db, &keypair);
        let msg_id = add_msg(&db, &keypair, &root_id, "ghosted");

        db.del(&msg_id).unwrap();

        let ghosts = GhostFile::open(dir.path().join("ghosts")).unwrap();
        assert_eq!(ghosts.read(&root_id).unwrap(), vec![msg_id]);
    }
}
