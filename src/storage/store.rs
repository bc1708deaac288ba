//! On-disk byte store rooted at the storage directory.
//!
//! Files live as plain files directly under the root; folders are real
//! directories inside it. Rewrites go through a temporary file and a rename
//! so readers never observe a half-written file.

use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

pub struct ByteStore {
    root: PathBuf,
}

/// File metadata reported by INFO.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub size: u64,
    pub words: usize,
    pub chars: usize,
    pub modified_secs: u64,
}

impl FileReport {
    pub fn render(&self, filename: &str) -> String {
        format!(
            "name: {}\nsize: {} bytes\nwords: {}\nchars: {}\nmodified: {}\n",
            filename, self.size, self.words, self.chars, self.modified_secs
        )
    }
}

impl ByteStore {
    /// Opens the store, creating the root directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_path(&self, name: &str) -> io::Result<PathBuf> {
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains('/')
            || name.contains('\\')
        {
            return Err(io::Error::new(ErrorKind::InvalidInput, "invalid filename"));
        }
        Ok(self.root.join(name))
    }

    fn folder_path(&self, rel: &str) -> io::Result<PathBuf> {
        let mut path = self.root.clone();
        let mut depth = 0;
        for comp in rel.split('/').filter(|c| !c.is_empty()) {
            if comp == "." || comp == ".." || comp.contains('\\') {
                return Err(io::Error::new(ErrorKind::InvalidInput, "invalid folder path"));
            }
            path.push(comp);
            depth += 1;
        }
        if depth == 0 {
            return Err(io::Error::new(ErrorKind::InvalidInput, "empty folder path"));
        }
        Ok(path)
    }

    pub fn read(&self, name: &str) -> io::Result<String> {
        fs::read_to_string(self.file_path(name)?)
    }

    /// Creates an empty file, failing with `AlreadyExists` on a collision.
    pub fn create(&self, name: &str) -> io::Result<()> {
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.file_path(name)?)
            .map(|_| ())
    }

    /// Rewrites the file through a temp file plus rename.
    pub fn write(&self, name: &str, content: &str) -> io::Result<()> {
        let path = self.file_path(name)?;
        let tmp = self.root.join(format!(".{name}.tmp"));
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &path)
    }

    pub fn remove(&self, name: &str) -> io::Result<()> {
        fs::remove_file(self.file_path(name)?)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.file_path(name).map(|p| p.is_file()).unwrap_or(false)
    }

    /// Names of the plain files at the store root, for registration.
    pub fn scan(&self) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Ok(name) = entry.file_name().into_string() {
                if !name.starts_with('.') {
                    names.push(name);
                }
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn info(&self, name: &str) -> io::Result<FileReport> {
        let path = self.file_path(name)?;
        let meta = fs::metadata(&path)?;
        let content = fs::read_to_string(&path)?;
        let modified_secs = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Ok(FileReport {
            size: meta.len(),
            words: content.split_whitespace().count(),
            chars: content.chars().count(),
            modified_secs,
        })
    }

    pub fn create_folder(&self, rel: &str) -> io::Result<()> {
        fs::create_dir_all(self.folder_path(rel)?)
    }

    /// Newline-joined folder listing; sub-folders carry a trailing slash.
    pub fn list_folder(&self, rel: &str) -> io::Result<String> {
        let mut out = Vec::new();
        for entry in fs::read_dir(self.folder_path(rel)?)? {
            let entry = entry?;
            if let Ok(name) = entry.file_name().into_string() {
                if entry.file_type()?.is_dir() {
                    out.push(format!("{name}/"));
                } else {
                    out.push(name);
                }
            }
        }
        out.sort();
        Ok(out.join("\n"))
    }

    /// Moves a root-level file into an existing folder.
    pub fn move_into_folder(&self, name: &str, rel: &str) -> io::Result<()> {
        let from = self.file_path(name)?;
        let to = self.folder_path(rel)?.join(name);
        fs::rename(from, to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, ByteStore) {
        let dir = tempfile::TempDir::new().unwrap();
        let store = ByteStore::open(dir.path().join("data")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_create_read_write_remove() {
        let (_dir, store) = store();
        store.create("a.txt").unwrap();
        assert_eq!(store.read("a.txt").unwrap(), "");
        store.write("a.txt", "Hello world.").unwrap();
        assert_eq!(store.read("a.txt").unwrap(), "Hello world.");
        store.remove("a.txt").unwrap();
        assert!(!store.exists("a.txt"));
    }

    #[test]
    fn test_create_existing_fails() {
        let (_dir, store) = store();
        store.create("a.txt").unwrap();
        let err = store.create("a.txt").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    }

    #[test]
    fn test_rejects_path_escapes() {
        let (_dir, store) = store();
        assert!(store.read("../etc/passwd").is_err());
        assert!(store.create("").is_err());
        assert!(store.create_folder("../up").is_err());
        assert!(store.create_folder("").is_err());
    }

    #[test]
    fn test_scan_skips_folders_and_temp_files() {
        let (_dir, store) = store();
        store.create("b.txt").unwrap();
        store.create("a.txt").unwrap();
        store.create_folder("sub").unwrap();
        std::fs::write(store.root().join(".a.txt.tmp"), "x").unwrap();
        assert_eq!(store.scan().unwrap(), vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn test_info_counts() {
        let (_dir, store) = store();
        store.create("a.txt").unwrap();
        store.write("a.txt", "Hello world.").unwrap();
        let report = store.info("a.txt").unwrap();
        assert_eq!(report.size, 12);
        assert_eq!(report.words, 2);
        assert_eq!(report.chars, 12);
    }

    #[test]
    fn test_folders() {
        let (_dir, store) = store();
        store.create_folder("notes/drafts").unwrap();
        store.create("memo.txt").unwrap();
        store.move_into_folder("memo.txt", "notes/drafts").unwrap();
        assert!(!store.exists("memo.txt"));
        assert_eq!(store.list_folder("notes/drafts").unwrap(), "memo.txt");
        assert_eq!(store.list_folder("notes").unwrap(), "drafts/");
    }
}
