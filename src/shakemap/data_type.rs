//! Grid/points lock for IMT storage.

use std::fmt;
use std::str::FromStr;

use tracing::debug;

use super::ShakeMapContainer;
use crate::container::Category;
use crate::store::{Array, AttrValue, Attributes};
use crate::util::{Error, PlainOldDataType, Result};

/// Name of the lock entry under `arrays`.
pub const DATA_TYPE_NAME: &str = "file_data_type";

const TYPE_ATTR: &str = "type";

/// How IMT results are laid out. Fixed by the first IMT write.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Regular grids: `mean` and `std` per IMT
    Grid,
    /// Scattered points: `lons`, `lats`, `ids`, `mean` and `std` per IMT
    Points,
}

impl DataType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Grid => "grid",
            Self::Points => "points",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "grid" => Ok(Self::Grid),
            "points" => Ok(Self::Points),
            other => Err(Error::InvalidArgument(format!("unknown data type {:?}", other))),
        }
    }
}

/// `"unset"` or the data type name, for conflict messages.
pub(crate) fn describe(data_type: Option<DataType>) -> String {
    data_type.map_or_else(|| "unset".to_string(), |t| t.to_string())
}

impl ShakeMapContainer {
    /// Lock the container to `data_type`.
    ///
    /// Setting the type already held is a no-op; setting the other one fails
    /// with `TypeConflict`.
    pub fn set_data_type(&mut self, data_type: DataType) -> Result<()> {
        match self.get_data_type()? {
            Some(current) if current == data_type => Ok(()),
            Some(current) => Err(Error::TypeConflict {
                current: current.to_string(),
                requested: data_type.to_string(),
            }),
            None => {
                let mut attrs = Attributes::new();
                attrs.insert(TYPE_ATTR.to_string(), AttrValue::from(data_type.as_str()));
                self.inner
                    .set_array(&[], DATA_TYPE_NAME, &Array::empty(PlainOldDataType::Uint8), &attrs, false)?;
                debug!(data_type = %data_type, "locked container data type");
                Ok(())
            }
        }
    }

    /// Persisted data type, `None` until the first IMT write.
    pub fn get_data_type(&self) -> Result<Option<DataType>> {
        let dataset = match self.inner.dataset(Category::Arrays, &[], DATA_TYPE_NAME) {
            Ok(dataset) => dataset,
            Err(Error::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let name = dataset
            .attrs
            .get(TYPE_ATTR)
            .and_then(AttrValue::as_str)
            .ok_or_else(|| Error::corrupt(format!("{} has no {} attribute", DATA_TYPE_NAME, TYPE_ATTR)))?;
        name.parse()
            .map(Some)
            .map_err(|_| Error::corrupt(format!("{} holds unknown type {:?}", DATA_TYPE_NAME, name)))
    }

    /// Fail with `TypeConflict` unless the lock is unset or `data_type`.
    pub(crate) fn check_writable_as(&self, data_type: DataType) -> Result<()> {
        match self.get_data_type()? {
            Some(current) if current != data_type => Err(Error::TypeConflict {
                current: current.to_string(),
                requested: data_type.to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Fail with `TypeConflict` unless the lock is exactly `data_type`.
    pub(crate) fn check_readable_as(&self, data_type: DataType) -> Result<()> {
        let current = self.get_data_type()?;
        if current == Some(data_type) {
            Ok(())
        } else {
            Err(Error::TypeConflict {
                current: describe(current),
                requested: data_type.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch() -> (tempfile::TempDir, ShakeMapContainer) {
        let dir = tempfile::tempdir().expect("temp dir");
        let c = ShakeMapContainer::create(dir.path().join("lock.hdf")).expect("create");
        (dir, c)
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!("grid".parse::<DataType>().unwrap(), DataType::Grid);
        assert_eq!(DataType::Points.to_string(), "points");
        assert!(matches!("grids".parse::<DataType>(), Err(Error::InvalidArgument(_))));
        assert_eq!(describe(None), "unset");
    }

    #[test]
    fn test_lock_transitions() {
        let (_dir, mut c) = scratch();
        assert_eq!(c.get_data_type().unwrap(), None);
        c.set_data_type(DataType::Grid).unwrap();
        c.set_data_type(DataType::Grid).unwrap();
        match c.set_data_type(DataType::Points) {
            Err(Error::TypeConflict { current, requested }) => {
                assert_eq!(current, "grid");
                assert_eq!(requested, "points");
            }
            other => panic!("expected TypeConflict, got {:?}", other),
        }
        assert_eq!(c.get_data_type().unwrap(), Some(DataType::Grid));
    }

    #[test]
    fn test_read_check_needs_exact_type() {
        let (_dir, mut c) = scratch();
        assert!(c.check_writable_as(DataType::Points).is_ok());
        assert!(matches!(c.check_readable_as(DataType::Grid), Err(Error::TypeConflict { .. })));
        c.set_data_type(DataType::Points).unwrap();
        assert!(c.check_readable_as(DataType::Points).is_ok());
        assert!(matches!(c.check_writable_as(DataType::Grid), Err(Error::TypeConflict { .. })));
    }

    #[test]
    fn test_unknown_persisted_type_is_corrupt() {
        let (_dir, mut c) = scratch();
        let attrs = crate::attrs! { TYPE_ATTR => "mesh" };
        c.container_mut()
            .set_array(&[], DATA_TYPE_NAME, &Array::empty(PlainOldDataType::Uint8), &attrs, false)
            .unwrap();
        assert!(matches!(c.get_data_type(), Err(Error::Corrupt(_))));
    }
}
