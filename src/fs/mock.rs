// src/fs/mock.rs

use super::FileSystem;
use anyhow::{anyhow, Result};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone)]
pub enum MockEntry {
    File(Vec<u8>),
    Dir(Vec<String>), // List of child names
}

#[derive(Debug, Default)]
struct MockState {
    entries: HashMap<PathBuf, MockEntry>,
    executable: HashSet<PathBuf>,
}

/// In-memory filesystem for tests. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    state: Arc<Mutex<MockState>>,
    fail_writes: Arc<AtomicBool>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        let fs = Self::default();
        fs.lock()
            .entries
            .insert(PathBuf::from("."), MockEntry::Dir(Vec::new()));
        fs
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make every subsequent `write`/`append` fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = path.as_ref().to_path_buf();
        let mut state = self.lock();
        state.entries.insert(path.clone(), MockEntry::File(content.into()));
        link_into_parent(&mut state.entries, &path);
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        let mut state = self.lock();
        state
            .entries
            .entry(path.clone())
            .or_insert_with(|| MockEntry::Dir(Vec::new()));
        link_into_parent(&mut state.entries, &path);
    }

    pub fn is_executable(&self, path: &Path) -> bool {
        self.lock().executable.contains(path)
    }

    /// All file paths currently stored, sorted.
    pub fn files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = self
            .lock()
            .entries
            .iter()
            .filter(|(_, e)| matches!(e, MockEntry::File(_)))
            .map(|(p, _)| p.clone())
            .collect();
        files.sort();
        files
    }

    fn check_writable(&self, path: &Path) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(anyhow!("mock write failure: {:?}", path));
        }
        Ok(())
    }
}

fn parent_of(path: &Path) -> Option<&Path> {
    let parent = path.parent()?;
    Some(if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    })
}

fn link_into_parent(entries: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
    let Some(parent) = parent_of(path) else {
        return;
    };
    if parent == path {
        return;
    }
    if !entries.contains_key(parent) {
        entries.insert(parent.to_path_buf(), MockEntry::Dir(Vec::new()));
        link_into_parent(entries, parent);
    }
    if let (Some(MockEntry::Dir(children)), Some(name)) = (
        entries.get_mut(parent),
        path.file_name().and_then(|n| n.to_str()),
    ) {
        if !children.iter().any(|c| c == name) {
            children.push(name.to_string());
        }
    }
}

impl FileSystem for MockFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        match self.lock().entries.get(path) {
            Some(MockEntry::File(content)) => {
                String::from_utf8(content.clone()).map_err(|e| anyhow!("Invalid UTF-8: {}", e))
            }
            Some(MockEntry::Dir(_)) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.check_writable(path)?;
        self.add_file(path, contents);
        Ok(())
    }

    fn append(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.check_writable(path)?;
        let mut state = self.lock();
        match state.entries.get_mut(path) {
            Some(MockEntry::File(existing)) => {
                existing.extend_from_slice(contents);
                Ok(())
            }
            Some(MockEntry::Dir(_)) => Err(anyhow!("Is a directory: {:?}", path)),
            None => {
                state
                    .entries
                    .insert(path.to_path_buf(), MockEntry::File(contents.to_vec()));
                link_into_parent(&mut state.entries, path);
                Ok(())
            }
        }
    }

    fn set_executable(&self, path: &Path) -> Result<()> {
        let mut state = self.lock();
        if !matches!(state.entries.get(path), Some(MockEntry::File(_))) {
            return Err(anyhow!("File not found: {:?}", path));
        }
        state.executable.insert(path.to_path_buf());
        Ok(())
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.lock().entries.get(path), Some(MockEntry::Dir(_)))
    }

    fn is_file(&self, path: &Path) -> bool {
        matches!(self.lock().entries.get(path), Some(MockEntry::File(_)))
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        match self.lock().entries.get(path) {
            Some(MockEntry::Dir(children)) => {
                let mut out: Vec<PathBuf> = children.iter().map(|name| path.join(name)).collect();
                out.sort();
                Ok(out)
            }
            _ => Err(anyhow!("Not a directory or not found: {:?}", path)),
        }
    }
}
