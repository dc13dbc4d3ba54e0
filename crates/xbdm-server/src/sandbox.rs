//! A [`Filesystem`] implementation rooted at a real local directory.
//!
//! The virtual-path to local-path mapping never calls `canonicalize`: instead
//! `resolve` rejects `.` and `..` components outright while building the
//! local path component-by-component, so escaping the root is impossible by
//! construction rather than merely checked for afterwards.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use xbdm_types::fs::{DirEntry, FileMeta, Filesystem, FsError, OpenSink, VirtualPath};
use xbdm_types::FileTime;

/// Rooted at `root`; every virtual path is joined onto it one component at a
/// time. Directory creation is serialized through `mkdir_lock`, matching the
/// concurrency contract's "must serialize directory creation" requirement —
/// everything else proceeds unsynchronized.
pub struct SandboxFs {
    root: PathBuf,
    mkdir_lock: Mutex<()>,
}

impl std::fmt::Debug for SandboxFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SandboxFs").field("root", &self.root).finish_non_exhaustive()
    }
}

impl SandboxFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), mkdir_lock: Mutex::new(()) }
    }

    fn resolve(&self, path: &VirtualPath) -> Result<PathBuf, FsError> {
        let mut local = self.root.clone();
        for component in path.components() {
            if component == "." || component == ".." {
                return Err(FsError::Traversal(path.as_str().to_string()));
            }
            local.push(component);
        }
        Ok(local)
    }

    fn meta_for(&self, local: &Path, metadata: &fs::Metadata) -> FileMeta {
        let meta = FileMeta {
            size: metadata.len(),
            created: metadata.created().map(FileTime::from_system_time).unwrap_or(FileTime(0)),
            modified: metadata.modified().map(FileTime::from_system_time).unwrap_or(FileTime(0)),
            is_directory: metadata.is_dir(),
        };
        log::trace!("stat {} -> {:?}", local.display(), meta);
        meta
    }
}

/// Maps the one `io::Error` kind the protocol distinguishes (missing parent
/// directory, missing file) onto [`FsError::NotFound`]; everything else is
/// an opaque `FsError::Io`.
fn map_io(path: &VirtualPath, err: io::Error) -> FsError {
    match err.kind() {
        io::ErrorKind::NotFound => FsError::NotFound(path.as_str().to_string()),
        _ => FsError::Io(err),
    }
}

struct SandboxSink {
    file: File,
}

impl Write for SandboxSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }
    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl OpenSink for SandboxSink {
    fn finish(mut self: Box<Self>) -> io::Result<()> {
        self.file.flush()
    }
}

impl Filesystem for SandboxFs {
    fn stat(&self, path: &VirtualPath) -> Result<FileMeta, FsError> {
        let local = self.resolve(path)?;
        let metadata = fs::metadata(&local).map_err(|e| map_io(path, e))?;
        Ok(self.meta_for(&local, &metadata))
    }

    fn list_dir(&self, path: &VirtualPath) -> Result<Vec<DirEntry>, FsError> {
        let local = self.resolve(path)?;
        let mut entries = Vec::new();
        for entry in fs::read_dir(&local).map_err(|e| map_io(path, e))? {
            let entry = entry.map_err(|e| map_io(path, e))?;
            let metadata = entry.metadata().map_err(|e| map_io(path, e))?;
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                meta: self.meta_for(&entry.path(), &metadata),
            });
        }
        Ok(entries)
    }

    fn open_read(&self, path: &VirtualPath) -> Result<Box<dyn Read + Send>, FsError> {
        let local = self.resolve(path)?;
        let file = File::open(&local).map_err(|e| map_io(path, e))?;
        Ok(Box::new(file))
    }

    fn create_write(&self, path: &VirtualPath) -> Result<Box<dyn OpenSink>, FsError> {
        let local = self.resolve(path)?;
        let file = File::create(&local).map_err(|e| map_io(path, e))?;
        Ok(Box::new(SandboxSink { file }))
    }

    fn mkdir(&self, path: &VirtualPath) -> Result<(), FsError> {
        let local = self.resolve(path)?;
        let _guard = self.mkdir_lock.lock().unwrap();
        match fs::create_dir(&local) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(map_io(path, e)),
        }
    }

    fn remove(&self, path: &VirtualPath) -> Result<(), FsError> {
        let local = self.resolve(path)?;
        fs::remove_file(&local).map_err(|e| map_io(path, e))
    }

    fn remove_tree(&self, path: &VirtualPath) -> Result<(), FsError> {
        let local = self.resolve(path)?;
        fs::remove_dir_all(&local).map_err(|e| map_io(path, e))
    }

    fn rename(&self, from: &VirtualPath, to: &VirtualPath) -> Result<(), FsError> {
        let from_local = self.resolve(from)?;
        let to_local = self.resolve(to)?;
        if let Some(parent) = to_local.parent() {
            fs::create_dir_all(parent).map_err(|e| map_io(to, e))?;
        }
        fs::rename(&from_local, &to_local).map_err(|e| map_io(from, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sandbox() -> (tempfile::TempDir, SandboxFs) {
        let dir = tempfile::tempdir().unwrap();
        let fs = SandboxFs::new(dir.path());
        (dir, fs)
    }

    #[test]
    fn write_then_read_round_trips() {
        let (_dir, fs) = sandbox();
        let path = VirtualPath::new("a.bin");
        let mut sink = fs.create_write(&path).unwrap();
        sink.write_all(b"hello").unwrap();
        sink.finish().unwrap();

        let mut buf = Vec::new();
        fs.open_read(&path).unwrap().read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"hello");
    }

    #[test]
    fn parent_traversal_is_rejected() {
        let (_dir, fs) = sandbox();
        let path = VirtualPath::new("..\\etc\\passwd");
        assert!(matches!(fs.stat(&path), Err(FsError::Traversal(_))));
    }

    #[test]
    fn missing_parent_directory_is_not_found() {
        let (_dir, fs) = sandbox();
        let path = VirtualPath::new("no_such_dir\\a.bin");
        assert!(matches!(fs.create_write(&path), Err(FsError::NotFound(_))));
    }

    #[test]
    fn mkdir_then_list_dir_sees_nested_file() {
        let (_dir, fs) = sandbox();
        fs.mkdir(&VirtualPath::new("sub")).unwrap();
        fs.create_write(&VirtualPath::new("sub\\a.bin")).unwrap().finish().unwrap();

        let entries = fs.list_dir(&VirtualPath::new("sub")).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "a.bin");
        assert!(!entries[0].meta.is_directory);
    }

    #[test]
    fn rename_moves_file() {
        let (_dir, fs) = sandbox();
        fs.create_write(&VirtualPath::new("a.bin")).unwrap().finish().unwrap();
        fs.rename(&VirtualPath::new("a.bin"), &VirtualPath::new("b.bin")).unwrap();
        assert!(fs.stat(&VirtualPath::new("b.bin")).is_ok());
        assert!(matches!(fs.stat(&VirtualPath::new("a.bin")), Err(FsError::NotFound(_))));
    }

    #[test]
    fn remove_tree_deletes_directory_recursively() {
        let (_dir, fs) = sandbox();
        fs.mkdir(&VirtualPath::new("sub")).unwrap();
        fs.create_write(&VirtualPath::new("sub\\a.bin")).unwrap().finish().unwrap();
        fs.remove_tree(&VirtualPath::new("sub")).unwrap();
        assert!(matches!(fs.stat(&VirtualPath::new("sub")), Err(FsError::NotFound(_))));
    }
}
