//! # smcontainer
//!
//! Hierarchical typed container files for ShakeMap-style ground-motion
//! products.
//!
//! A container file holds four kinds of entries, each addressed by a group
//! path under its own top-level category: nested dictionaries, UTF-8 strings,
//! typed n-dimensional arrays with scalar metadata, and tables with
//! timestamp-aware columns. On top of that, [`shakemap::ShakeMapContainer`]
//! adds the fixed slots of a ShakeMap run and per-component IMT results kept
//! either as grids or as scattered points.
//!
//! ## Modules
//!
//! - [`util`] - Element types, shapes, errors
//! - [`store`] - Binary backing file and its in-memory node tree
//! - [`container`] - Path-addressed dictionary/string/array/table entries
//! - [`shakemap`] - ShakeMap schema: slots, data type lock, IMT storage
//!
//! ## Example
//!
//! ```no_run
//! use smcontainer::prelude::*;
//!
//! let mut c = ShakeMapContainer::create("shake_result.hdf")?;
//! c.set_config(&mapping! { "gmpe" => "active_crustal" })?;
//!
//! let mean = Array::from_vec((2, 2), vec![0.1f64, 0.2, 0.3, 0.4])?;
//! let std = Array::from_vec((2, 2), vec![0.6f64; 4])?;
//! c.write_grid("Larger", "pga", &mean, &attrs! { "units" => "g" }, &std, &attrs! { "units" => "ln" })?;
//! c.close()?;
//! # Ok::<(), smcontainer::Error>(())
//! ```

pub mod util;
pub mod store;
pub mod container;
pub mod shakemap;

// Re-export commonly used types
pub use util::{Dimensions, Error, PlainOldDataType, Result};
pub use store::{Array, AttrValue, Attributes, ContainerOptions};
pub use container::{Container, DataFrame, Mapping, Value};
pub use shakemap::{DataType, ShakeMapContainer};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{Dimensions, Error, PlainOldDataType, Result};
    pub use crate::store::{Array, AttrValue, Attributes, ContainerOptions};
    pub use crate::container::{Category, Column, ColumnKind, Container, DataFrame, Mapping, Value};
    pub use crate::shakemap::{DataType, GridRecord, PointsRecord, ShakeMapContainer};
    pub use crate::{attrs, mapping};
}
