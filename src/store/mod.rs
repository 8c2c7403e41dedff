//! Hierarchical backing store.
//!
//! A container file is a tree of named groups and datasets, each carrying a
//! flat attribute map. On disk the tree is a set of size-prefixed blocks:
//!
//! ```text
//! +------------------+
//! | Magic: "SMCon"   |  5 bytes
//! +------------------+
//! | Frozen flag      |  1 byte (0x00 while writing, 0xFF when complete)
//! +------------------+
//! | Version          |  2 bytes (u16 LE)
//! +------------------+
//! | Root Group Pos   |  8 bytes (u64 LE)
//! +------------------+
//! | ... Blocks ...   |
//! +------------------+
//! ```
//!
//! [`BackingStore`] loads the whole tree on open, applies mutations in
//! memory, and rewrites the file on [`BackingStore::flush`].

mod array;
mod attr;
mod codec;
mod compression;
mod format;
mod node;
mod reader;
mod stream;

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, trace};

pub use array::Array;
pub use attr::{AttrValue, Attributes};
pub use format::{CURRENT_VERSION, MAGIC};
pub use node::{Dataset, Group, Node, Payload};
pub use reader::IStreams;

use crate::util::{Error, Result};

/// Options for creating or opening a container file.
#[derive(Clone, Debug)]
pub struct ContainerOptions {
    /// Zlib level (1-9) for arrays written with compression.
    pub compression_level: i32,
    /// Memory-map the file when loading it.
    pub use_mmap: bool,
}

impl Default for ContainerOptions {
    fn default() -> Self {
        Self {
            compression_level: 6,
            use_mmap: true,
        }
    }
}

/// An open container file held as an in-memory node tree.
pub struct BackingStore {
    path: PathBuf,
    root: Group,
    options: ContainerOptions,
    dirty: bool,
}

impl BackingStore {
    /// Create (or truncate) a file holding an empty tree.
    pub fn create(path: impl AsRef<Path>, options: ContainerOptions) -> Result<Self> {
        let mut store = Self {
            path: path.as_ref().to_path_buf(),
            root: Group::new(),
            options,
            dirty: true,
        };
        store.flush()?;
        debug!(path = %store.path.display(), "created container file");
        Ok(store)
    }

    /// Open an existing file for reading and writing.
    pub fn open(path: impl AsRef<Path>, options: ContainerOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let root = {
            let streams = Arc::new(IStreams::open_opts(&path, options.use_mmap)?);
            if !streams.is_frozen() {
                return Err(Error::invalid(format!(
                    "{} was not completely written",
                    path.display()
                )));
            }
            let root_pos = streams.root_pos()?;
            codec::read_root(streams, root_pos)?
        };

        debug!(
            path = %path.display(),
            nodes = root.descendants(),
            "opened container file"
        );
        Ok(Self {
            path,
            root,
            options,
            dirty: false,
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Root group.
    pub fn root(&self) -> &Group {
        &self.root
    }

    /// Root group for mutation; marks the store as needing a flush.
    pub fn root_mut(&mut self) -> &mut Group {
        self.dirty = true;
        &mut self.root
    }

    /// True when in-memory changes have not been written yet.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Rewrite the file from the in-memory tree if anything changed.
    ///
    /// The tree is written to a sibling staging file which is synced and then
    /// renamed over the target, so a failed flush leaves the previous file
    /// in place.
    pub fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let staging = staging_path(&self.path);
        let written = self.write_tree(&staging).and_then(|bytes| {
            std::fs::rename(&staging, &self.path)?;
            Ok(bytes)
        });
        let bytes = match written {
            Ok(bytes) => bytes,
            Err(e) => {
                if let Err(cleanup) = std::fs::remove_file(&staging) {
                    trace!(path = %staging.display(), error = %cleanup, "staging file not removed");
                }
                return Err(e);
            }
        };

        debug!(path = %self.path.display(), bytes, "flushed container file");
        self.dirty = false;
        Ok(())
    }

    fn write_tree(&mut self, target: &Path) -> Result<u64> {
        let mut stream = stream::OStream::create(target)?;
        let root = Node::Group(std::mem::take(&mut self.root));
        let written = codec::write_node(&mut stream, "", &root, self.options.compression_level);
        if let Node::Group(root) = root {
            self.root = root;
        }
        let root_offset = written?;
        stream.finish(format::extract_offset(root_offset))?;
        Ok(stream.pos())
    }
}

/// `<dir>/<name>.partial` next to the target file.
fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::Dimensions;

    fn sample_tree(store: &mut BackingStore) {
        let root = store.root_mut();
        let dicts = root.ensure_group("dictionaries").unwrap();
        dicts
            .insert_dataset("config", Dataset::bytes(br#"{"a":1}"#.to_vec()))
            .unwrap();
        let imt = root
            .ensure_group("arrays")
            .unwrap()
            .ensure_group("imts")
            .unwrap()
            .ensure_group("Larger")
            .unwrap()
            .ensure_group("pga")
            .unwrap();
        imt.insert_dataset(
            "mean",
            Dataset::array(Array::from_vec((2, 2), vec![1.0f64, 2.0, 3.0, f64::NAN]).unwrap(), true)
                .with_attrs(crate::attrs! { "units" => "g" }),
        )
        .unwrap();
        imt.insert_dataset(
            "std",
            Dataset::array(Array::from_slice(&[0.5f32; 4]), false),
        )
        .unwrap();
        root.ensure_group("strings").unwrap();
        root.attrs_mut().insert("producer".into(), AttrValue::from("test"));
    }

    #[test]
    fn test_create_flush_open_roundtrip() {
        let temp = tempfile::NamedTempFile::new().expect("temp file");
        let mut store = BackingStore::create(temp.path(), ContainerOptions::default()).unwrap();
        sample_tree(&mut store);
        assert!(store.is_dirty());
        store.flush().unwrap();
        assert!(!store.is_dirty());
        let expected = store.root().clone();
        drop(store);

        for use_mmap in [true, false] {
            let options = ContainerOptions { use_mmap, ..Default::default() };
            let reopened = BackingStore::open(temp.path(), options).unwrap();
            assert_eq!(reopened.root(), &expected);

            let pga = reopened
                .root()
                .group("arrays")
                .and_then(|g| g.group("imts"))
                .and_then(|g| g.group("Larger"))
                .and_then(|g| g.group("pga"))
                .expect("pga group");
            let mean = pga.dataset("mean").unwrap();
            assert!(mean.is_compressed());
            assert_eq!(mean.attrs["units"], AttrValue::from("g"));
            assert_eq!(mean.as_array().unwrap().dims(), &Dimensions::d2(2, 2));
            assert!(!pga.dataset("std").unwrap().is_compressed());
            assert!(reopened.root().group("strings").unwrap().is_empty());
        }
    }

    #[test]
    fn test_create_writes_empty_file() {
        let temp = tempfile::NamedTempFile::new().expect("temp file");
        let store = BackingStore::create(temp.path(), ContainerOptions::default()).unwrap();
        drop(store);
        let reopened = BackingStore::open(temp.path(), ContainerOptions::default()).unwrap();
        assert!(reopened.root().is_empty());
    }

    #[test]
    fn test_flush_leaves_no_staging_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("shake.hdf");
        let mut store = BackingStore::create(&path, ContainerOptions::default()).unwrap();
        sample_tree(&mut store);
        store.flush().unwrap();
        assert!(!staging_path(&path).exists());
        let names: Vec<_> = std::fs::read_dir(dir.path()).unwrap().map(|e| e.unwrap().file_name()).collect();
        assert_eq!(names, vec![OsString::from("shake.hdf")]);
    }

    #[test]
    fn test_failed_flush_keeps_previous_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("shake.hdf");
        let mut store = BackingStore::create(&path, ContainerOptions::default()).unwrap();
        sample_tree(&mut store);
        store.flush().unwrap();
        let expected = store.root().clone();

        // A directory in the staging slot makes the next write fail.
        std::fs::create_dir(staging_path(&path)).unwrap();
        store.root_mut().ensure_group("late").unwrap();
        assert!(matches!(store.flush(), Err(Error::Io(_))));
        assert!(store.is_dirty());

        let reopened = BackingStore::open(&path, ContainerOptions::default()).unwrap();
        assert_eq!(reopened.root(), &expected);

        std::fs::remove_dir(staging_path(&path)).unwrap();
        store.flush().unwrap();
        let reopened = BackingStore::open(&path, ContainerOptions::default()).unwrap();
        assert!(reopened.root().contains("late"));
    }

    #[test]
    fn test_staging_path_is_sibling() {
        let path = Path::new("/data/event/shake_result.hdf");
        assert_eq!(staging_path(path), PathBuf::from("/data/event/shake_result.hdf.partial"));
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let result = BackingStore::open(dir.path().join("nope.hdf"), ContainerOptions::default());
        assert!(matches!(result, Err(Error::FileNotFound(_))));
    }

    #[test]
    fn test_open_rejects_unfrozen_file() {
        let temp = tempfile::NamedTempFile::new().expect("temp file");
        BackingStore::create(temp.path(), ContainerOptions::default()).unwrap();
        let mut bytes = std::fs::read(temp.path()).unwrap();
        bytes[5] = 0x00;
        std::fs::write(temp.path(), &bytes).unwrap();

        let result = BackingStore::open(temp.path(), ContainerOptions::default());
        assert!(matches!(result, Err(Error::InvalidStructure(_))));
    }

    #[test]
    fn test_open_rejects_foreign_file() {
        let temp = tempfile::NamedTempFile::new().expect("temp file");
        std::fs::write(temp.path(), b"\x89HDF\r\n\x1a\n0000000000000000").unwrap();
        let result = BackingStore::open(temp.path(), ContainerOptions::default());
        assert!(matches!(result, Err(Error::InvalidMagic)));
    }
}
