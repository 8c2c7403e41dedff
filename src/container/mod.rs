//! Path-addressed entries over a [`BackingStore`].
//!
//! Every entry lives at `category/groups.../name`:
//!
//! | category       | entry            | stored as                           |
//! |----------------|------------------|-------------------------------------|
//! | `dictionaries` | [`Mapping`]      | JSON blob                           |
//! | `strings`      | UTF-8 text       | bytes                               |
//! | `arrays`       | [`Array`]        | typed array plus attribute map      |
//! | `dataframes`   | [`DataFrame`]    | JSON blob plus `time_columns` attr  |
//!
//! `set_*` creates once and fails with `DuplicateEntry` if the leaf exists;
//! `replace_*` overwrites.
//!
//! # Example
//!
//! ```no_run
//! use smcontainer::container::Container;
//! use smcontainer::mapping;
//!
//! let mut c = Container::create("event.hdf")?;
//! c.set_dictionary(&["event"], "origin", &mapping! { "mag" => 7.1 })?;
//! c.set_string(&[], "readme", "Ridgecrest mainshock")?;
//! c.close()?;
//! # Ok::<(), smcontainer::Error>(())
//! ```

mod dataframe;
pub mod path;
mod value;

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as Json;
use tracing::{trace, warn};

pub use dataframe::{Column, ColumnKind, DataFrame};
pub use path::Category;
pub use value::{format_timestamp, parse_timestamp, validate_mapping_root, Mapping, Value, BYTES_TAG, TIMESTAMP_TAG};

use crate::store::{Array, AttrValue, Attributes, BackingStore, ContainerOptions, Dataset, Node};
use crate::util::{Error, Result};

/// Attribute holding the JSON list of timestamp column names.
pub const TIME_COLUMNS_ATTR: &str = "time_columns";

/// An open container file.
pub struct Container {
    store: Option<BackingStore>,
}

impl Container {
    /// Create (or truncate) a container file.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Self::create_with(path, ContainerOptions::default())
    }

    pub fn create_with(path: impl AsRef<Path>, options: ContainerOptions) -> Result<Self> {
        Ok(Self { store: Some(BackingStore::create(path, options)?) })
    }

    /// Open an existing container file for reading and writing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, ContainerOptions::default())
    }

    pub fn open_with(path: impl AsRef<Path>, options: ContainerOptions) -> Result<Self> {
        Ok(Self { store: Some(BackingStore::open(path, options)?) })
    }

    /// Path of the backing file.
    pub fn file_name(&self) -> Result<&Path> {
        Ok(self.store()?.path())
    }

    pub fn is_closed(&self) -> bool {
        self.store.is_none()
    }

    /// Write pending changes to disk.
    pub fn flush(&mut self) -> Result<()> {
        self.store_mut()?.flush()
    }

    /// Flush and release the file. Later calls fail with `Closed`.
    ///
    /// If the flush fails the container stays open with its changes intact,
    /// so `close` can be retried.
    pub fn close(&mut self) -> Result<()> {
        self.store_mut()?.flush()?;
        self.store = None;
        Ok(())
    }

    /// Underlying store, for inspection.
    pub fn store(&self) -> Result<&BackingStore> {
        self.store.as_ref().ok_or(Error::Closed)
    }

    pub(crate) fn store_mut(&mut self) -> Result<&mut BackingStore> {
        self.store.as_mut().ok_or(Error::Closed)
    }

    // Dictionaries

    /// Store a mapping at `dictionaries/groups.../name`.
    pub fn set_dictionary(&mut self, groups: &[&str], name: &str, dictionary: &Mapping) -> Result<()> {
        let blob = encode_mapping(dictionary)?;
        self.insert_leaf(Category::Dictionaries, groups, name, Dataset::bytes(blob), false)
    }

    /// Like [`Container::set_dictionary`], overwriting an existing entry.
    pub fn replace_dictionary(&mut self, groups: &[&str], name: &str, dictionary: &Mapping) -> Result<()> {
        let blob = encode_mapping(dictionary)?;
        self.insert_leaf(Category::Dictionaries, groups, name, Dataset::bytes(blob), true)
    }

    pub fn get_dictionary(&self, groups: &[&str], name: &str) -> Result<Mapping> {
        let dataset = self.dataset(Category::Dictionaries, groups, name)?;
        decode_mapping(bytes_payload(dataset, name)?)
    }

    pub fn drop_dictionary(&mut self, groups: &[&str], name: &str) -> Result<()> {
        self.remove_leaf(Category::Dictionaries, groups, name)
    }

    /// Paths of every dictionary, as `group/.../name`.
    pub fn get_dictionaries(&self) -> Result<Vec<String>> {
        self.list_category(Category::Dictionaries)
    }

    /// Store any serializable value that serializes to a mapping.
    pub fn set_dictionary_from<T: Serialize + ?Sized>(&mut self, groups: &[&str], name: &str, value: &T) -> Result<()> {
        let mapping = Value::from_serialize(value)?
            .into_mapping()
            .ok_or_else(|| Error::InvalidArgument(format!("{} does not serialize to a mapping", name)))?;
        self.set_dictionary(groups, name, &mapping)
    }

    /// Read a dictionary straight into a deserializable type.
    ///
    /// Bytes and timestamps arrive in their tagged JSON form.
    pub fn get_dictionary_as<T: DeserializeOwned>(&self, groups: &[&str], name: &str) -> Result<T> {
        let dataset = self.dataset(Category::Dictionaries, groups, name)?;
        Ok(serde_json::from_slice(bytes_payload(dataset, name)?)?)
    }

    // Strings

    pub fn set_string(&mut self, groups: &[&str], name: &str, text: &str) -> Result<()> {
        let dataset = Dataset::bytes(text.as_bytes().to_vec());
        self.insert_leaf(Category::Strings, groups, name, dataset, false)
    }

    pub fn replace_string(&mut self, groups: &[&str], name: &str, text: &str) -> Result<()> {
        let dataset = Dataset::bytes(text.as_bytes().to_vec());
        self.insert_leaf(Category::Strings, groups, name, dataset, true)
    }

    pub fn get_string(&self, groups: &[&str], name: &str) -> Result<String> {
        let dataset = self.dataset(Category::Strings, groups, name)?;
        Ok(String::from_utf8(bytes_payload(dataset, name)?.to_vec())?)
    }

    pub fn drop_string(&mut self, groups: &[&str], name: &str) -> Result<()> {
        self.remove_leaf(Category::Strings, groups, name)
    }

    pub fn get_strings(&self) -> Result<Vec<String>> {
        self.list_category(Category::Strings)
    }

    // Arrays

    /// Store an array with scalar metadata, zlib-compressed if `compress`.
    pub fn set_array(
        &mut self,
        groups: &[&str],
        name: &str,
        array: &Array,
        metadata: &Attributes,
        compress: bool,
    ) -> Result<()> {
        let dataset = Dataset::array(array.clone(), compress).with_attrs(metadata.clone());
        self.insert_leaf(Category::Arrays, groups, name, dataset, false)
    }

    pub fn replace_array(
        &mut self,
        groups: &[&str],
        name: &str,
        array: &Array,
        metadata: &Attributes,
        compress: bool,
    ) -> Result<()> {
        let dataset = Dataset::array(array.clone(), compress).with_attrs(metadata.clone());
        self.insert_leaf(Category::Arrays, groups, name, dataset, true)
    }

    /// Array and its metadata.
    pub fn get_array(&self, groups: &[&str], name: &str) -> Result<(Array, Attributes)> {
        let dataset = self.dataset(Category::Arrays, groups, name)?;
        let array = dataset
            .as_array()
            .ok_or_else(|| Error::corrupt(format!("{} is not an array", name)))?;
        Ok((array.clone(), dataset.attrs.clone()))
    }

    pub fn drop_array(&mut self, groups: &[&str], name: &str) -> Result<()> {
        self.remove_leaf(Category::Arrays, groups, name)
    }

    pub fn get_arrays(&self) -> Result<Vec<String>> {
        self.list_category(Category::Arrays)
    }

    // DataFrames

    pub fn set_dataframe(&mut self, groups: &[&str], name: &str, frame: &DataFrame) -> Result<()> {
        let dataset = encode_dataframe(frame)?;
        self.insert_leaf(Category::DataFrames, groups, name, dataset, false)
    }

    pub fn replace_dataframe(&mut self, groups: &[&str], name: &str, frame: &DataFrame) -> Result<()> {
        let dataset = encode_dataframe(frame)?;
        self.insert_leaf(Category::DataFrames, groups, name, dataset, true)
    }

    pub fn get_dataframe(&self, groups: &[&str], name: &str) -> Result<DataFrame> {
        let dataset = self.dataset(Category::DataFrames, groups, name)?;
        let time_columns = match dataset.attrs.get(TIME_COLUMNS_ATTR) {
            Some(AttrValue::Text(s)) => s.as_str(),
            Some(other) => {
                return Err(Error::corrupt(format!("{} attribute of {} is {}", TIME_COLUMNS_ATTR, name, other)));
            }
            None => "[]",
        };
        DataFrame::decode(bytes_payload(dataset, name)?, time_columns)
    }

    pub fn drop_dataframe(&mut self, groups: &[&str], name: &str) -> Result<()> {
        self.remove_leaf(Category::DataFrames, groups, name)
    }

    pub fn get_dataframes(&self) -> Result<Vec<String>> {
        self.list_category(Category::DataFrames)
    }

    // Listing

    /// Leaf paths below `category/groups...`, relative to that group.
    ///
    /// An absent category lists as empty; an absent sub-group is `NotFound`.
    pub fn list_entries(&self, category: Category, groups: &[&str]) -> Result<Vec<String>> {
        let root = self.store()?.root();
        if groups.is_empty() && !root.contains(category.group_name()) {
            return Ok(Vec::new());
        }
        Ok(path::leaf_paths(path::get_group(root, category, groups)?))
    }

    fn list_category(&self, category: Category) -> Result<Vec<String>> {
        self.list_entries(category, &[])
    }

    // Shared leaf plumbing

    /// Leaf dataset at `category/groups.../name`.
    pub(crate) fn dataset(&self, category: Category, groups: &[&str], name: &str) -> Result<&Dataset> {
        let group = path::get_group(self.store()?.root(), category, groups)?;
        group.dataset(name).ok_or_else(|| {
            Error::not_found(format!("{} not in {}", name, path::display_path(category, groups)))
        })
    }

    /// Check that a leaf could be inserted without touching the tree.
    pub(crate) fn check_insert(&self, category: Category, groups: &[&str], name: &str, replace: bool) -> Result<()> {
        for segment in groups.iter().copied().chain(std::iter::once(name)) {
            path::validate_name(segment)?;
        }
        let Some(group) = path::probe_group(self.store()?.root(), category, groups)? else {
            return Ok(());
        };
        match group.get(name) {
            Some(Node::Group(_)) => Err(Error::DuplicateEntry(format!(
                "{}/{} is a group",
                path::display_path(category, groups),
                name
            ))),
            Some(Node::Dataset(_)) if !replace => Err(Error::DuplicateEntry(format!(
                "{}/{}",
                path::display_path(category, groups),
                name
            ))),
            _ => Ok(()),
        }
    }

    pub(crate) fn insert_leaf(
        &mut self,
        category: Category,
        groups: &[&str],
        name: &str,
        dataset: Dataset,
        replace: bool,
    ) -> Result<()> {
        self.check_insert(category, groups, name, replace)?;
        let root = self.store_mut()?.root_mut();
        let group = path::make_groups(root, category, groups)?;
        if replace {
            group.remove(name);
        }
        group.insert_dataset(name, dataset)?;
        trace!(category = %category, groups = ?groups, name, replace, "wrote entry");
        Ok(())
    }

    pub(crate) fn remove_leaf(&mut self, category: Category, groups: &[&str], name: &str) -> Result<()> {
        self.dataset(category, groups, name)?;
        let root = self.store_mut()?.root_mut();
        path::get_group_mut(root, category, groups)?.remove(name);
        trace!(category = %category, groups = ?groups, name, "dropped entry");
        Ok(())
    }
}

impl Drop for Container {
    fn drop(&mut self) {
        if let Some(mut store) = self.store.take() {
            if let Err(e) = store.flush() {
                warn!(path = %store.path().display(), error = %e, "failed to flush container on drop");
            }
        }
    }
}

fn encode_mapping(mapping: &Mapping) -> Result<Vec<u8>> {
    validate_mapping_root(mapping)?;
    Ok(serde_json::to_vec(&Json::Object(value::mapping_to_json(mapping)?))?)
}

fn decode_mapping(blob: &[u8]) -> Result<Mapping> {
    let json: Json = serde_json::from_slice(blob)?;
    Value::from_tagged_json(json)?
        .into_mapping()
        .ok_or_else(|| Error::corrupt("dictionary blob is not a JSON object"))
}

fn encode_dataframe(frame: &DataFrame) -> Result<Dataset> {
    frame.validate()?;
    let (table, time_columns) = frame.encode()?;
    let mut attrs = Attributes::new();
    attrs.insert(TIME_COLUMNS_ATTR.to_string(), AttrValue::Text(time_columns));
    Ok(Dataset::bytes(table).with_attrs(attrs))
}

fn bytes_payload<'a>(dataset: &'a Dataset, name: &str) -> Result<&'a [u8]> {
    dataset
        .as_bytes()
        .ok_or_else(|| Error::corrupt(format!("{} is not a byte blob", name)))
}
