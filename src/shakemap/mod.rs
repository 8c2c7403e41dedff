//! ShakeMap product schema on top of [`Container`].
//!
//! Fixed dictionary slots hold the run configuration, the rupture, the
//! station list, the version history and the product metadata. Ground-motion
//! results are stored per component and IMT under `arrays/imts`, either as
//! grids or as scattered points; see [`DataType`].

mod data_type;
mod imt;

use std::path::Path;

use tracing::debug;

pub use data_type::{DataType, DATA_TYPE_NAME};
pub use imt::{GridRecord, PointsRecord, IMTS_GROUP};

use crate::container::{Container, Mapping, Value};
use crate::store::ContainerOptions;
use crate::util::{Error, Result};

pub const CONFIG_NAME: &str = "config";
pub const RUPTURE_NAME: &str = "rupture";
pub const STATIONS_NAME: &str = "stations_dict";
pub const VERSION_HISTORY_NAME: &str = "version_history";
pub const METADATA_NAME: &str = "info.json";

/// A container holding one ShakeMap run.
pub struct ShakeMapContainer {
    inner: Container,
}

impl ShakeMapContainer {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self { inner: Container::create(path)? })
    }

    pub fn create_with(path: impl AsRef<Path>, options: ContainerOptions) -> Result<Self> {
        Ok(Self { inner: Container::create_with(path, options)? })
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self { inner: Container::open(path)? })
    }

    pub fn open_with(path: impl AsRef<Path>, options: ContainerOptions) -> Result<Self> {
        Ok(Self { inner: Container::open_with(path, options)? })
    }

    /// Generic entry access.
    pub fn container(&self) -> &Container {
        &self.inner
    }

    pub fn container_mut(&mut self) -> &mut Container {
        &mut self.inner
    }

    pub fn file_name(&self) -> Result<&Path> {
        self.inner.file_name()
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }

    pub fn close(&mut self) -> Result<()> {
        self.inner.close()
    }

    pub fn set_config(&mut self, config: &Mapping) -> Result<()> {
        self.replace_slot(CONFIG_NAME, config)
    }

    pub fn get_config(&self) -> Result<Mapping> {
        self.get_slot(CONFIG_NAME, "configuration")
    }

    /// Store the rupture description; `rupture` must be a mapping.
    pub fn set_rupture(&mut self, rupture: &Value) -> Result<()> {
        let mapping = require_mapping(rupture, "rupture")?;
        self.replace_slot(RUPTURE_NAME, mapping)
    }

    pub fn get_rupture(&self) -> Result<Mapping> {
        self.get_slot(RUPTURE_NAME, "rupture")
    }

    /// Store the station collection; `stations` must be a mapping.
    pub fn set_station_dict(&mut self, stations: &Value) -> Result<()> {
        let mapping = require_mapping(stations, "station dictionary")?;
        self.replace_slot(STATIONS_NAME, mapping)
    }

    pub fn get_station_dict(&self) -> Result<Mapping> {
        self.get_slot(STATIONS_NAME, "station dictionary")
    }

    pub fn set_version_history(&mut self, history: &Mapping) -> Result<()> {
        self.replace_slot(VERSION_HISTORY_NAME, history)
    }

    /// Version history, or an empty mapping if none was stored.
    pub fn get_version_history(&self) -> Result<Mapping> {
        match self.inner.get_dictionary(&[], VERSION_HISTORY_NAME) {
            Err(Error::NotFound(_)) => Ok(Mapping::new()),
            other => other,
        }
    }

    /// Store the product metadata (`info.json`).
    pub fn set_metadata(&mut self, info: &Mapping) -> Result<()> {
        self.replace_slot(METADATA_NAME, info)
    }

    pub fn get_metadata(&self) -> Result<Mapping> {
        self.get_slot(METADATA_NAME, "metadata")
    }

    fn replace_slot(&mut self, name: &str, value: &Mapping) -> Result<()> {
        // The new value is encoded before the old one goes away.
        self.inner.replace_dictionary(&[], name, value)?;
        debug!(slot = name, "stored schema slot");
        Ok(())
    }

    fn get_slot(&self, name: &str, what: &str) -> Result<Mapping> {
        match self.inner.get_dictionary(&[], name) {
            Err(Error::NotFound(_)) => Err(Error::not_found(format!("{} not set in container", what))),
            other => other,
        }
    }
}

fn require_mapping<'a>(value: &'a Value, what: &str) -> Result<&'a Mapping> {
    value.as_mapping().ok_or_else(|| {
        Error::InvalidArgument(format!("{} must be a mapping, got {}", what, value.kind()))
    })
}
