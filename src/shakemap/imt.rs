//! Per-component IMT results under `arrays/imts/{component}/{imt}`.

use tracing::debug;

use super::{DataType, ShakeMapContainer};
use crate::container::{path, Category};
use crate::store::{Array, Attributes};
use crate::util::{Error, Result};

/// Group under `arrays` holding every component.
pub const IMTS_GROUP: &str = "imts";

const MEAN: &str = "mean";
const STD: &str = "std";
const LONS: &str = "lons";
const LATS: &str = "lats";
const IDS: &str = "ids";

/// One IMT stored as grids.
#[derive(Clone, Debug, PartialEq)]
pub struct GridRecord {
    pub mean: Array,
    pub mean_metadata: Attributes,
    pub std: Array,
    pub std_metadata: Attributes,
}

/// One IMT stored as scattered points.
#[derive(Clone, Debug, PartialEq)]
pub struct PointsRecord {
    pub lons: Array,
    pub lats: Array,
    pub ids: Array,
    pub mean: Array,
    pub mean_metadata: Attributes,
    pub std: Array,
    pub std_metadata: Attributes,
}

impl ShakeMapContainer {
    /// Store the mean and standard deviation grids of `imt` for `component`.
    ///
    /// Locks the container to [`DataType::Grid`] on first use.
    pub fn write_grid(
        &mut self,
        component: &str,
        imt: &str,
        mean: &Array,
        mean_metadata: &Attributes,
        std: &Array,
        std_metadata: &Attributes,
    ) -> Result<()> {
        self.check_writable_as(DataType::Grid)?;
        self.check_new_record(component, imt, &[MEAN, STD])?;

        self.set_data_type(DataType::Grid)?;
        let groups = [IMTS_GROUP, component, imt];
        self.inner.set_array(&groups, MEAN, mean, mean_metadata, true)?;
        self.inner.set_array(&groups, STD, std, std_metadata, true)?;
        debug!(component, imt, shape = %mean.dims(), "wrote IMT grids");
        Ok(())
    }

    pub fn get_grid(&self, component: &str, imt: &str) -> Result<GridRecord> {
        self.check_readable_as(DataType::Grid)?;
        let groups = [IMTS_GROUP, component, imt];
        let (mean, mean_metadata) = self.inner.get_array(&groups, MEAN)?;
        let (std, std_metadata) = self.inner.get_array(&groups, STD)?;
        Ok(GridRecord { mean, mean_metadata, std, std_metadata })
    }

    /// Store point results of `imt` for `component`.
    ///
    /// All five arrays must share one shape; nothing is written otherwise.
    /// Locks the container to [`DataType::Points`] on first use.
    #[allow(clippy::too_many_arguments)]
    pub fn write_points(
        &mut self,
        component: &str,
        imt: &str,
        lons: &Array,
        lats: &Array,
        ids: &Array,
        mean: &Array,
        mean_metadata: &Attributes,
        std: &Array,
        std_metadata: &Attributes,
    ) -> Result<()> {
        self.check_writable_as(DataType::Points)?;
        let expected = lons.shape();
        for (name, array) in [(LATS, lats), (IDS, ids), (MEAN, mean), (STD, std)] {
            if array.shape() != expected {
                return Err(Error::ShapeMismatch {
                    name: name.to_string(),
                    expected: expected.to_vec(),
                    actual: array.shape().to_vec(),
                });
            }
        }
        self.check_new_record(component, imt, &[LONS, LATS, IDS, MEAN, STD])?;

        self.set_data_type(DataType::Points)?;
        let groups = [IMTS_GROUP, component, imt];
        let none = Attributes::new();
        self.inner.set_array(&groups, LONS, lons, &none, true)?;
        self.inner.set_array(&groups, LATS, lats, &none, true)?;
        self.inner.set_array(&groups, IDS, ids, &none, true)?;
        self.inner.set_array(&groups, MEAN, mean, mean_metadata, true)?;
        self.inner.set_array(&groups, STD, std, std_metadata, true)?;
        debug!(component, imt, points = lons.len(), "wrote IMT points");
        Ok(())
    }

    pub fn get_points(&self, component: &str, imt: &str) -> Result<PointsRecord> {
        self.check_readable_as(DataType::Points)?;
        let groups = [IMTS_GROUP, component, imt];
        let (lons, _) = self.inner.get_array(&groups, LONS)?;
        let (lats, _) = self.inner.get_array(&groups, LATS)?;
        let (ids, _) = self.inner.get_array(&groups, IDS)?;
        let (mean, mean_metadata) = self.inner.get_array(&groups, MEAN)?;
        let (std, std_metadata) = self.inner.get_array(&groups, STD)?;
        Ok(PointsRecord { lons, lats, ids, mean, mean_metadata, std, std_metadata })
    }

    /// IMT names for `component`, or `component/imt` for every component.
    ///
    /// Empty when no IMT was ever written.
    pub fn get_imts(&self, component: Option<&str>) -> Result<Vec<String>> {
        let Some(imts) = self.imts_group()? else {
            return Ok(Vec::new());
        };
        match component {
            Some(component) => {
                let group = imts.group(component).ok_or_else(|| {
                    Error::not_found(format!("component {} not in arrays/{}", component, IMTS_GROUP))
                })?;
                Ok(group.names())
            }
            None => {
                let mut out = Vec::new();
                for (component, node) in imts.children() {
                    if let Some(group) = node.as_group() {
                        out.extend(group.names().into_iter().map(|imt| format!("{}/{}", component, imt)));
                    }
                }
                Ok(out)
            }
        }
    }

    /// Components present, or only those holding `imt`.
    pub fn get_components(&self, imt: Option<&str>) -> Result<Vec<String>> {
        let Some(imts) = self.imts_group()? else {
            return Ok(Vec::new());
        };
        Ok(imts
            .children()
            .filter_map(|(component, node)| {
                let group = node.as_group()?;
                match imt {
                    Some(imt) if !group.contains(imt) => None,
                    _ => Some(component.to_string()),
                }
            })
            .collect())
    }

    /// Remove `imt` from every component holding it.
    pub fn drop_imt(&mut self, imt: &str) -> Result<()> {
        if self.imts_group()?.is_none() {
            return Err(Error::not_found(format!("no IMTs stored in {}", self.file_name()?.display())));
        }
        let components = self.get_components(Some(imt))?;
        let root = self.inner.store_mut()?.root_mut();
        let imts = path::get_group_mut(root, Category::Arrays, &[IMTS_GROUP])?;
        for component in &components {
            if let Some(group) = imts.group_mut(component) {
                group.remove(imt);
            }
        }
        debug!(imt, components = components.len(), "dropped IMT");
        Ok(())
    }

    fn imts_group(&self) -> Result<Option<&crate::store::Group>> {
        let root = self.inner.store()?.root();
        Ok(root.group(Category::Arrays.group_name()).and_then(|g| g.group(IMTS_GROUP)))
    }

    /// `DuplicateEntry` if any field of the record exists; name checks included.
    fn check_new_record(&self, component: &str, imt: &str, fields: &[&str]) -> Result<()> {
        let groups = [IMTS_GROUP, component, imt];
        for field in fields {
            self.inner.check_insert(Category::Arrays, &groups, field, false)?;
        }
        Ok(())
    }
}
