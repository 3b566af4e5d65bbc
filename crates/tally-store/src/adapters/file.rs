use crate::domain::errors::KVStoreError;
use crate::ports::outbound::{BatchOperation, KeyValueStore};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

const OP_PUT: u8 = 0;
const OP_DELETE: u8 = 1;

struct Inner {
    data: HashMap<Vec<u8>, Vec<u8>>,
    journal: File,
    /// Byte length of the journal up to its last durable frame. Appends
    /// that fail are truncated back to this offset.
    committed_len: u64,
}

/// File-backed key-value store persisting to an append-only journal.
///
/// Journal format: a sequence of frames, one frame per batch.
///
/// ```text
/// frame  := [body_len:u32le][record...]
/// record := [op:u8][key_len:u32le][key][value_len:u32le][value]
/// ```
///
/// A frame is written and synced before the in-memory map is touched, so a
/// crash can only lose whole batches. A failed append is truncated away
/// again, keeping torn bytes off the interior of the file. The journal grows
/// with every mutation; [`FileBackedKVStore::compact`] rewrites it as a
/// single snapshot frame.
pub struct FileBackedKVStore {
    inner: Mutex<Inner>,
    path: PathBuf,
}

impl FileBackedKVStore {
    /// Open the journal at `path`, replaying it into memory.
    ///
    /// A torn tail left by an interrupted write is truncated away so that the
    /// journal ends on a frame boundary before any new frame is appended.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, KVStoreError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| KVStoreError::io(&e))?;
        }

        let mut journal = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .map_err(|e| KVStoreError::io(&e))?;

        let mut bytes = Vec::new();
        journal
            .read_to_end(&mut bytes)
            .map_err(|e| KVStoreError::io(&e))?;

        let (data, valid_len) = Self::replay(&bytes)?;

        if valid_len < bytes.len() {
            warn!(
                "[store] 💾 Discarding {} torn bytes at end of {}",
                bytes.len() - valid_len,
                path.display()
            );
            journal
                .set_len(valid_len as u64)
                .map_err(|e| KVStoreError::io(&e))?;
        }
        journal
            .seek(SeekFrom::End(0))
            .map_err(|e| KVStoreError::io(&e))?;

        if data.is_empty() {
            info!("[store] 📁 Journal empty or new at {}", path.display());
        } else {
            info!(
                "[store] 💾 Replayed {} keys from {}",
                data.len(),
                path.display()
            );
        }

        Ok(Self {
            inner: Mutex::new(Inner {
                data,
                journal,
                committed_len: valid_len as u64,
            }),
            path,
        })
    }

    /// Rewrite the journal as one snapshot frame holding only live keys.
    pub fn compact(&self) -> Result<(), KVStoreError> {
        let mut inner = self.inner.lock();

        let mut ops = Vec::with_capacity(inner.data.len());
        for (key, value) in &inner.data {
            ops.push(BatchOperation::Put {
                key: key.clone(),
                value: value.clone(),
            });
        }
        let frame = encode_frame(&ops)?;

        let temp_path = self.path.with_extension("compact");
        let mut temp = File::create(&temp_path).map_err(|e| KVStoreError::io(&e))?;
        temp.write_all(&frame).map_err(|e| KVStoreError::io(&e))?;
        temp.sync_all().map_err(|e| KVStoreError::io(&e))?;
        drop(temp);

        std::fs::rename(&temp_path, &self.path).map_err(|e| KVStoreError::io(&e))?;

        // The rename swapped inodes; reopen the append handle on the new file.
        inner.journal = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| KVStoreError::io(&e))?;
        inner.committed_len = frame.len() as u64;

        info!(
            "[store] 💾 Compacted journal to {} bytes ({} keys)",
            frame.len(),
            inner.data.len()
        );
        Ok(())
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.inner.lock().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().data.is_empty()
    }

    /// Current journal size in bytes.
    pub fn journal_bytes(&self) -> Result<u64, KVStoreError> {
        std::fs::metadata(&self.path)
            .map(|m| m.len())
            .map_err(|e| KVStoreError::io(&e))
    }

    /// Replay journal bytes into a map. Returns the map and the byte offset
    /// of the last complete frame, which is where appending may resume.
    fn replay(bytes: &[u8]) -> Result<(HashMap<Vec<u8>, Vec<u8>>, usize), KVStoreError> {
        let mut data = HashMap::new();
        let mut cursor = 0;

        while cursor + 4 <= bytes.len() {
            let body_len =
                u32::from_le_bytes(bytes[cursor..cursor + 4].try_into().unwrap_or([0; 4])) as usize;
            let body_start = cursor + 4;
            let body_end = body_start + body_len;

            if body_end > bytes.len() {
                // Torn tail from an interrupted append. Everything before
                // this frame is intact.
                break;
            }

            apply_frame(&bytes[body_start..body_end], &mut data)?;
            cursor = body_end;
        }

        Ok((data, cursor))
    }

    fn append_frame(inner: &mut Inner, ops: &[BatchOperation]) -> Result<(), KVStoreError> {
        let frame = encode_frame(ops)?;

        let written = inner
            .journal
            .write_all(&frame)
            .and_then(|()| inner.journal.sync_all());
        if let Err(e) = written {
            Self::rewind(inner);
            return Err(KVStoreError::io(&e));
        }
        inner.committed_len += frame.len() as u64;

        for op in ops {
            match op {
                BatchOperation::Put { key, value } => {
                    inner.data.insert(key.clone(), value.clone());
                }
                BatchOperation::Delete { key } => {
                    inner.data.remove(key);
                }
            }
        }
        Ok(())
    }

    /// Drop whatever a failed append left behind, so the journal still ends
    /// on a frame boundary and the next append cannot bury torn bytes in
    /// the interior of the file.
    fn rewind(inner: &mut Inner) {
        if let Err(e) = inner.journal.set_len(inner.committed_len) {
            error!("[store] 💾 Failed to truncate a torn append: {e}");
            return;
        }
        // set_len does not move the cursor, which now sits past the end.
        if let Err(e) = inner.journal.seek(SeekFrom::Start(inner.committed_len)) {
            error!("[store] 💾 Failed to reposition after truncating a torn append: {e}");
        }
    }
}

fn encode_frame(ops: &[BatchOperation]) -> Result<Vec<u8>, KVStoreError> {
    let mut body = Vec::new();
    for op in ops {
        match op {
            BatchOperation::Put { key, value } => {
                body.push(OP_PUT);
                body.extend_from_slice(&encode_len(key.len())?.to_le_bytes());
                body.extend_from_slice(key);
                body.extend_from_slice(&encode_len(value.len())?.to_le_bytes());
                body.extend_from_slice(value);
            }
            BatchOperation::Delete { key } => {
                body.push(OP_DELETE);
                body.extend_from_slice(&encode_len(key.len())?.to_le_bytes());
                body.extend_from_slice(key);
                body.extend_from_slice(&0u32.to_le_bytes());
            }
        }
    }

    let body_len = encode_len(body.len())?;
    let mut frame = Vec::with_capacity(4 + body.len());
    frame.extend_from_slice(&body_len.to_le_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Frame and record lengths are stored as little-endian u32; anything
/// larger cannot be framed and must be refused rather than truncated.
fn encode_len(len: usize) -> Result<u32, KVStoreError> {
    u32::try_from(len).map_err(|_| KVStoreError::FrameTooLarge { bytes: len })
}

/// Apply one frame body to the map. The frame was length-checked as complete,
/// so malformed records here mean real corruption, not a torn write.
fn apply_frame(body: &[u8], data: &mut HashMap<Vec<u8>, Vec<u8>>) -> Result<(), KVStoreError> {
    let mut cursor = 0;

    let corrupt = |detail: &str| KVStoreError::Corrupt {
        message: format!("malformed journal record: {detail}"),
    };

    while cursor < body.len() {
        let op = body[cursor];
        cursor += 1;

        if cursor + 4 > body.len() {
            return Err(corrupt("key length truncated"));
        }
        let key_len =
            u32::from_le_bytes(body[cursor..cursor + 4].try_into().unwrap_or([0; 4])) as usize;
        cursor += 4;

        if cursor + key_len > body.len() {
            return Err(corrupt("key truncated"));
        }
        let key = body[cursor..cursor + key_len].to_vec();
        cursor += key_len;

        if cursor + 4 > body.len() {
            return Err(corrupt("value length truncated"));
        }
        let value_len =
            u32::from_le_bytes(body[cursor..cursor + 4].try_into().unwrap_or([0; 4])) as usize;
        cursor += 4;

        if cursor + value_len > body.len() {
            return Err(corrupt("value truncated"));
        }
        let value = body[cursor..cursor + value_len].to_vec();
        cursor += value_len;

        match op {
            OP_PUT => {
                data.insert(key, value);
            }
            OP_DELETE => {
                data.remove(&key);
            }
            other => return Err(corrupt(&format!("unknown op byte {other}"))),
        }
    }

    Ok(())
}

impl KeyValueStore for FileBackedKVStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        Ok(self.inner.lock().data.get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        let mut inner = self.inner.lock();
        Self::append_frame(
            &mut inner,
            &[BatchOperation::Put {
                key: key.to_vec(),
                value: value.to_vec(),
            }],
        )
    }

    fn delete(&self, key: &[u8]) -> Result<(), KVStoreError> {
        let mut inner = self.inner.lock();
        Self::append_frame(&mut inner, &[BatchOperation::Delete { key: key.to_vec() }])
    }

    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        let mut inner = self.inner.lock();
        Self::append_frame(&mut inner, &operations)
    }

    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        Ok(self.inner.lock().data.contains_key(key))
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError> {
        let results: Vec<_> = self
            .inner
            .lock()
            .data
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(results)
    }
}
