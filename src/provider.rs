use std::{
    fs, io,
    path::{Path, PathBuf},
};

use indexmap::IndexMap;

/// Read access to source and binary files, so the engine never touches the
/// disk directly.
pub trait SourceProvider {
    /// Finds `name` as referenced from the file `from`.
    fn resolve(&self, from: &Path, name: &str) -> Option<PathBuf>;

    fn read_bytes(&self, path: &Path) -> io::Result<Vec<u8>>;

    fn read_text(&self, path: &Path) -> io::Result<String> {
        let bytes = self.read_bytes(path)?;
        String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

pub struct FileSystemProvider {
    includes: Vec<PathBuf>,
}

impl FileSystemProvider {
    pub fn new(includes: Vec<PathBuf>) -> Self {
        Self { includes }
    }
}

impl SourceProvider for FileSystemProvider {
    fn resolve(&self, from: &Path, name: &str) -> Option<PathBuf> {
        // working directory first, then beside the including file, then every include directory
        if let Ok(path) = fs::canonicalize(name) {
            return Some(path);
        }
        if let Some(parent) = from.parent() {
            if let Ok(path) = fs::canonicalize(parent.join(name)) {
                return Some(path);
            }
        }
        self.includes
            .iter()
            .find_map(|dir| fs::canonicalize(dir.join(name)).ok())
    }

    fn read_bytes(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }
}

/// Files held in memory, for unsaved editor buffers and tests.
#[derive(Default)]
pub struct MemoryProvider {
    files: IndexMap<PathBuf, Vec<u8>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        self.insert(path, contents);
        self
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), contents.into());
    }
}

impl SourceProvider for MemoryProvider {
    fn resolve(&self, from: &Path, name: &str) -> Option<PathBuf> {
        let direct = PathBuf::from(name);
        if self.files.contains_key(&direct) {
            return Some(direct);
        }
        let sibling = from.parent()?.join(name);
        self.files.contains_key(&sibling).then_some(sibling)
    }

    fn read_bytes(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.files.get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} not found", path.display()),
            )
        })
    }
}
