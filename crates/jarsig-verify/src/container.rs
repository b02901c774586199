//! Archive container capability and implementations.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::{Component, Path, PathBuf};

use anyhow::Context;

use crate::error::{VerifyError, VerifyResult};

/// Decompressed stream of one entry plus its declared size.
pub struct EntryStream<'a> {
    pub reader: Box<dyn Read + 'a>,
    pub size: u64,
}

impl std::fmt::Debug for EntryStream<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryStream")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Random access to the entries of an archive.
///
/// Names are `/`-separated. Directory entries are not listed.
pub trait Container {
    fn list_entries(&self) -> Vec<String>;

    fn entry_exists(&self, name: &str) -> bool {
        self.list_entries().iter().any(|n| n == name)
    }

    fn open_entry(&mut self, name: &str) -> VerifyResult<EntryStream<'_>>;
}

/// Entries held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryContainer {
    entries: BTreeMap<String, Vec<u8>>,
}

impl MemoryContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, content: impl Into<Vec<u8>>) -> &mut Self {
        self.entries.insert(name.into(), content.into());
        self
    }

    pub fn with_entry(mut self, name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.insert(name, content);
        self
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<u8>> {
        self.entries.remove(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Vec<u8>> {
        self.entries.get_mut(name)
    }
}

impl Container for MemoryContainer {
    fn list_entries(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    fn entry_exists(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    fn open_entry(&mut self, name: &str) -> VerifyResult<EntryStream<'_>> {
        let content = self.entries.get(name).ok_or_else(|| VerifyError::NotFound {
            name: name.to_string(),
        })?;
        Ok(EntryStream {
            reader: Box::new(Cursor::new(content.as_slice())),
            size: content.len() as u64,
        })
    }
}

/// An unpacked archive on disk.
#[derive(Debug, Clone)]
pub struct DirectoryContainer {
    root: PathBuf,
    entries: Vec<String>,
}

impl DirectoryContainer {
    /// Walk `root` once; later changes to the tree are not seen by
    /// [`list_entries`](Container::list_entries).
    pub fn open(root: impl Into<PathBuf>) -> VerifyResult<Self> {
        let root = root.into();
        let mut entries = Vec::new();
        walk(&root, "", &mut entries)
            .with_context(|| format!("failed to list {}", root.display()))
            .map_err(|e| VerifyError::container("directory", e))?;
        entries.sort();
        Ok(Self { root, entries })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, name: &str) -> Option<PathBuf> {
        let relative = Path::new(name);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        safe.then(|| self.root.join(relative))
    }
}

fn walk(dir: &Path, prefix: &str, out: &mut Vec<String>) -> std::io::Result<()> {
    for dirent in std::fs::read_dir(dir)? {
        let dirent = dirent?;
        let file_name = dirent.file_name();
        let name = format!("{}{}", prefix, file_name.to_string_lossy());
        let file_type = dirent.file_type()?;
        if file_type.is_dir() {
            walk(&dirent.path(), &format!("{name}/"), out)?;
        } else if file_type.is_file() {
            out.push(name);
        }
    }
    Ok(())
}

impl Container for DirectoryContainer {
    fn list_entries(&self) -> Vec<String> {
        self.entries.clone()
    }

    fn entry_exists(&self, name: &str) -> bool {
        self.entries.binary_search_by(|n| n.as_str().cmp(name)).is_ok()
    }

    fn open_entry(&mut self, name: &str) -> VerifyResult<EntryStream<'_>> {
        let not_found = || VerifyError::NotFound {
            name: name.to_string(),
        };
        let path = self.resolve(name).ok_or_else(not_found)?;
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
            Err(e) => {
                return Err(VerifyError::container(
                    format!("open {}", path.display()),
                    e,
                ))
            }
        };
        let size = file
            .metadata()
            .map_err(|e| VerifyError::container(format!("stat {}", path.display()), e))?
            .len();
        Ok(EntryStream {
            reader: Box::new(file),
            size,
        })
    }
}

/// A zip archive.
pub struct ZipContainer<R> {
    archive: zip::ZipArchive<R>,
    entries: Vec<String>,
}

impl<R: Read + Seek> ZipContainer<R> {
    pub fn new(reader: R) -> VerifyResult<Self> {
        let archive = zip::ZipArchive::new(reader)
            .map_err(|e| VerifyError::container("invalid zip archive", e))?;
        let entries = archive
            .file_names()
            .filter(|name| !name.ends_with('/'))
            .map(str::to_string)
            .collect();
        Ok(Self { archive, entries })
    }
}

impl ZipContainer<File> {
    pub fn open(path: impl AsRef<Path>) -> VerifyResult<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| VerifyError::container(format!("open {}", path.display()), e))?;
        Self::new(file)
    }
}

impl<R> std::fmt::Debug for ZipContainer<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipContainer")
            .field("entries", &self.entries.len())
            .finish_non_exhaustive()
    }
}

impl<R: Read + Seek> Container for ZipContainer<R> {
    fn list_entries(&self) -> Vec<String> {
        self.entries.clone()
    }

    fn entry_exists(&self, name: &str) -> bool {
        self.entries.iter().any(|n| n == name)
    }

    fn open_entry(&mut self, name: &str) -> VerifyResult<EntryStream<'_>> {
        let file = match self.archive.by_name(name) {
            Ok(file) => file,
            Err(zip::result::ZipError::FileNotFound) => {
                return Err(VerifyError::NotFound {
                    name: name.to_string(),
                })
            }
            Err(e) => return Err(VerifyError::container(format!("open {name}"), e)),
        };
        let size = file.size();
        Ok(EntryStream {
            reader: Box::new(file),
            size,
        })
    }
}
