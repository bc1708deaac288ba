//! Access-control store and its flat-file persistence.
//!
//! Every live file has exactly one record; entry 0 is the creator and owner
//! and always holds WRITE. The table is guarded by a single mutex held for
//! the duration of each query or update, and every successful mutation is
//! persisted before the lock is released, so an update is visible to later
//! requests exactly when its save has completed.

use std::io::{self, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::{FromPrimitive, ToPrimitive};
use tracing::warn;

use crate::proto::{Status, FILENAME_LEN, USERNAME_LEN};

/// Capacity of one record's entry table in the on-disk layout.
pub const MAX_ACCESS_ENTRIES: usize = 100;

/// Access level of one grant. Ordering matters: WRITE implies READ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, FromPrimitive, ToPrimitive)]
pub enum Level {
    Read = 1,
    Write = 2,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessEntry {
    pub username: String,
    pub level: Level,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRecord {
    pub filename: String,
    pub entries: Vec<AccessEntry>,
}

pub struct AccessTable {
    path: PathBuf,
    records: Mutex<Vec<AccessRecord>>,
}

impl AccessTable {
    /// Opens the table, loading the persistence file if it exists.
    pub fn load(path: &Path) -> io::Result<Self> {
        let records = match std::fs::File::open(path) {
            Ok(mut file) => read_table(&mut file)?,
            Err(err) if err.kind() == ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(err),
        };
        Ok(Self { path: path.to_owned(), records: Mutex::new(records) })
    }

    /// True when `username` holds at least `required` on `filename`.
    /// A file without a record denies everyone.
    pub fn check(&self, filename: &str, username: &str, required: Level) -> bool {
        let records = self.records.lock().unwrap();
        let Some(record) = records.iter().find(|r| r.filename == filename) else {
            return false;
        };
        record
            .entries
            .iter()
            .find(|e| e.username == username)
            .is_some_and(|e| e.level >= required)
    }

    /// Username of entry 0, if the file has a record.
    pub fn owner(&self, filename: &str) -> Option<String> {
        let records = self.records.lock().unwrap();
        let record = records.iter().find(|r| r.filename == filename)?;
        record.entries.first().map(|e| e.username.clone())
    }

    pub fn is_owner(&self, filename: &str, username: &str) -> bool {
        self.owner(filename).is_some_and(|owner| owner == username)
    }

    /// Creates the record for a fresh file with `owner` at entry 0.
    /// An existing record for the name is replaced.
    pub fn create_record(&self, filename: &str, owner: &str) {
        let mut records = self.records.lock().unwrap();
        records.retain(|r| r.filename != filename);
        records.push(AccessRecord {
            filename: filename.to_owned(),
            entries: vec![AccessEntry { username: owner.to_owned(), level: Level::Write }],
        });
        self.save_locked(&records);
    }

    /// Drops the record for a deleted file.
    pub fn remove_record(&self, filename: &str) {
        let mut records = self.records.lock().unwrap();
        records.retain(|r| r.filename != filename);
        self.save_locked(&records);
    }

    /// Owner-only: grants or updates `target`'s level on `filename`.
    pub fn grant(
        &self,
        filename: &str,
        caller: &str,
        target: &str,
        level: Level,
    ) -> Result<(), Status> {
        let mut records = self.records.lock().unwrap();
        let record = records
            .iter_mut()
            .find(|r| r.filename == filename)
            .ok_or(Status::FileNotFound)?;
        if record.entries.first().map(|e| e.username.as_str()) != Some(caller) {
            return Err(Status::PermissionDenied);
        }
        if let Some(entry) = record.entries.iter_mut().find(|e| e.username == target) {
            entry.level = level;
        } else {
            if record.entries.len() >= MAX_ACCESS_ENTRIES {
                return Err(Status::InvalidCommand);
            }
            record.entries.push(AccessEntry { username: target.to_owned(), level });
        }
        self.save_locked(&records);
        Ok(())
    }

    /// Owner-only: removes `target`'s non-owner entry on `filename`.
    /// Removing an absent or owner entry is a no-op, not an error.
    pub fn revoke(&self, filename: &str, caller: &str, target: &str) -> Result<(), Status> {
        let mut records = self.records.lock().unwrap();
        let record = records
            .iter_mut()
            .find(|r| r.filename == filename)
            .ok_or(Status::FileNotFound)?;
        if record.entries.first().map(|e| e.username.as_str()) != Some(caller) {
            return Err(Status::PermissionDenied);
        }
        if let Some(pos) = record.entries.iter().skip(1).position(|e| e.username == target) {
            record.entries.remove(pos + 1);
        }
        self.save_locked(&records);
        Ok(())
    }

    /// Every username appearing in any record, in record order.
    pub fn users(&self) -> Vec<String> {
        let records = self.records.lock().unwrap();
        records
            .iter()
            .flat_map(|r| r.entries.iter().map(|e| e.username.clone()))
            .collect()
    }

    #[cfg(test)]
    pub fn snapshot(&self) -> Vec<AccessRecord> {
        self.records.lock().unwrap().clone()
    }

    fn save_locked(&self, records: &[AccessRecord]) {
        if let Err(err) = write_table_atomic(&self.path, records) {
            warn!(path = %self.path.display(), ?err, "failed to persist access table");
        }
    }
}

fn write_fixed(dest: &mut impl Write, s: &str, len: usize) -> io::Result<()> {
    if s.len() >= len {
        return Err(io::Error::new(ErrorKind::InvalidInput, "field too long"));
    }
    dest.write_all(s.as_bytes())?;
    dest.write_all(&vec![0u8; len - s.len()])
}

fn read_fixed(src: &mut impl Read, len: usize) -> io::Result<String> {
    let mut buf = vec![0u8; len];
    src.read_exact(&mut buf)?;
    let end = buf.iter().position(|&b| b == 0).unwrap_or(len);
    buf.truncate(end);
    String::from_utf8(buf).map_err(|_| io::Error::new(ErrorKind::InvalidData, "bad utf-8"))
}

/// On-disk layout: a `u32` record count, then that many fixed-size records.
/// Each record is a fixed filename region, a `u32` entry count, and
/// [`MAX_ACCESS_ENTRIES`] entry slots of which only the first count are live.
fn write_table_atomic(path: &Path, records: &[AccessRecord]) -> io::Result<()> {
    let mut buf = Vec::new();
    buf.write_u32::<BigEndian>(records.len() as u32)?;
    for record in records {
        write_fixed(&mut buf, &record.filename, FILENAME_LEN)?;
        buf.write_u32::<BigEndian>(record.entries.len() as u32)?;
        for slot in 0..MAX_ACCESS_ENTRIES {
            match record.entries.get(slot) {
                Some(entry) => {
                    write_fixed(&mut buf, &entry.username, USERNAME_LEN)?;
                    buf.write_u32::<BigEndian>(entry.level.to_u32().unwrap_or(0))?;
                }
                None => {
                    buf.write_all(&[0u8; USERNAME_LEN])?;
                    buf.write_u32::<BigEndian>(0)?;
                }
            }
        }
    }

    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, &buf)?;
    std::fs::rename(&tmp, path)
}

fn read_table(src: &mut impl Read) -> io::Result<Vec<AccessRecord>> {
    let count = src.read_u32::<BigEndian>()?;
    let mut records = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let filename = read_fixed(src, FILENAME_LEN)?;
        let live = src.read_u32::<BigEndian>()? as usize;
        let mut entries = Vec::with_capacity(live);
        for slot in 0..MAX_ACCESS_ENTRIES {
            let username = read_fixed(src, USERNAME_LEN)?;
            let level = src.read_u32::<BigEndian>()?;
            if slot < live {
                let level = Level::from_u32(level)
                    .ok_or_else(|| io::Error::new(ErrorKind::InvalidData, "bad access level"))?;
                entries.push(AccessEntry { username, level });
            }
        }
        records.push(AccessRecord { filename, entries });
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> (tempfile::TempDir, AccessTable) {
        let dir = tempfile::TempDir::new().unwrap();
        let table = AccessTable::load(&dir.path().join("access.dat")).unwrap();
        (dir, table)
    }

    #[test]
    fn test_owner_is_entry_zero() {
        let (_dir, table) = table();
        table.create_record("a.txt", "alice");
        assert_eq!(table.owner("a.txt"), Some("alice".into()));
        assert!(table.is_owner("a.txt", "alice"));
        assert!(!table.is_owner("a.txt", "bob"));
        assert!(table.check("a.txt", "alice", Level::Write));
    }

    #[test]
    fn test_missing_record_denies() {
        let (_dir, table) = table();
        assert!(!table.check("ghost.txt", "alice", Level::Read));
        assert_eq!(table.owner("ghost.txt"), None);
    }

    #[test]
    fn test_grant_read_does_not_allow_write() {
        let (_dir, table) = table();
        table.create_record("a.txt", "alice");
        table.grant("a.txt", "alice", "bob", Level::Read).unwrap();
        assert!(table.check("a.txt", "bob", Level::Read));
        assert!(!table.check("a.txt", "bob", Level::Write));
    }

    #[test]
    fn test_grant_updates_existing_entry() {
        let (_dir, table) = table();
        table.create_record("a.txt", "alice");
        table.grant("a.txt", "alice", "bob", Level::Read).unwrap();
        table.grant("a.txt", "alice", "bob", Level::Write).unwrap();
        assert!(table.check("a.txt", "bob", Level::Write));
        // still a single record with two entries
        let snap = table.snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].entries.len(), 2);
        assert_eq!(snap[0].entries[0].username, "alice");
    }

    #[test]
    fn test_non_owner_cannot_grant() {
        let (_dir, table) = table();
        table.create_record("a.txt", "alice");
        assert_eq!(
            table.grant("a.txt", "bob", "carol", Level::Read),
            Err(Status::PermissionDenied)
        );
    }

    #[test]
    fn test_revoke_never_removes_owner() {
        let (_dir, table) = table();
        table.create_record("a.txt", "alice");
        table.revoke("a.txt", "alice", "alice").unwrap();
        assert_eq!(table.owner("a.txt"), Some("alice".into()));
    }

    #[test]
    fn test_single_record_after_mutations() {
        let (_dir, table) = table();
        table.create_record("a.txt", "alice");
        table.grant("a.txt", "alice", "bob", Level::Write).unwrap();
        table.revoke("a.txt", "alice", "bob").unwrap();
        table.create_record("b.txt", "bob");
        table.remove_record("b.txt");

        let snap = table.snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].filename, "a.txt");
        assert_eq!(snap[0].entries[0].username, "alice");
        assert_eq!(snap[0].entries[0].level, Level::Write);
    }

    #[test]
    fn test_persistence_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("access.dat");

        let table = AccessTable::load(&path).unwrap();
        table.create_record("a.txt", "alice");
        table.grant("a.txt", "alice", "bob", Level::Read).unwrap();
        table.create_record("b.txt", "carol");
        let before = table.snapshot();
        drop(table);

        let reloaded = AccessTable::load(&path).unwrap();
        assert_eq!(reloaded.snapshot(), before);
    }
}
