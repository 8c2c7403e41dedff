//! Group path resolution under the four top-level categories.

use std::fmt;

use crate::store::{Group, Node};
use crate::util::{Error, Result};

/// Top-level group an entry lives under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    Dictionaries,
    Strings,
    Arrays,
    DataFrames,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Dictionaries,
        Category::Strings,
        Category::Arrays,
        Category::DataFrames,
    ];

    /// Name of the top-level group.
    pub fn group_name(self) -> &'static str {
        match self {
            Self::Dictionaries => "dictionaries",
            Self::Strings => "strings",
            Self::Arrays => "arrays",
            Self::DataFrames => "dataframes",
        }
    }

    pub fn from_group_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.group_name() == name)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.group_name())
    }
}

/// Reject empty names and names containing `/`.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidArgument("empty name".into()));
    }
    if name.contains('/') {
        return Err(Error::InvalidArgument(format!("name {:?} contains '/'", name)));
    }
    Ok(())
}

/// `category/seg1/seg2`, for messages.
pub fn display_path(category: Category, groups: &[&str]) -> String {
    let mut out = category.group_name().to_string();
    for g in groups {
        out.push('/');
        out.push_str(g);
    }
    out
}

/// Resolve `category/groups...` without creating anything.
///
/// Fails with `NotFound` naming the first missing segment and its parent.
pub fn get_group<'a>(root: &'a Group, category: Category, groups: &[&str]) -> Result<&'a Group> {
    let base = category.group_name();
    let mut group = root
        .group(base)
        .ok_or_else(|| Error::not_found(format!("no {} group", base)))?;
    for (depth, segment) in groups.iter().enumerate() {
        group = group.group(segment).ok_or_else(|| {
            Error::not_found(format!(
                "group {} not in {}",
                segment,
                display_path(category, &groups[..depth])
            ))
        })?;
    }
    Ok(group)
}

/// Mutable counterpart of [`get_group`].
pub fn get_group_mut<'a>(root: &'a mut Group, category: Category, groups: &[&str]) -> Result<&'a mut Group> {
    let base = category.group_name();
    let mut group = root
        .group_mut(base)
        .ok_or_else(|| Error::not_found(format!("no {} group", base)))?;
    for (depth, segment) in groups.iter().enumerate() {
        group = group.group_mut(segment).ok_or_else(|| {
            Error::not_found(format!(
                "group {} not in {}",
                segment,
                display_path(category, &groups[..depth])
            ))
        })?;
    }
    Ok(group)
}

/// Walk as far as the chain exists without creating anything.
///
/// Returns the deepest group if the whole chain exists, `None` if a
/// segment is missing, and `DuplicateEntry` if a segment names a dataset.
pub fn probe_group<'a>(root: &'a Group, category: Category, groups: &[&str]) -> Result<Option<&'a Group>> {
    let mut current = root;
    let chain = std::iter::once(category.group_name()).chain(groups.iter().copied());
    for segment in chain {
        match current.get(segment) {
            None => return Ok(None),
            Some(Node::Group(g)) => current = g,
            Some(Node::Dataset(_)) => {
                return Err(Error::DuplicateEntry(format!(
                    "{} is a dataset, not a group",
                    segment
                )));
            }
        }
    }
    Ok(Some(current))
}

/// Resolve `category/groups...`, creating missing segments.
pub fn make_groups<'a>(root: &'a mut Group, category: Category, groups: &[&str]) -> Result<&'a mut Group> {
    let mut group = root.ensure_group(category.group_name())?;
    for segment in groups {
        group = group.ensure_group(segment)?;
    }
    Ok(group)
}

/// Every leaf below `group` as a `/`-joined path relative to it.
///
/// Datasets are leaves, and so is an empty group.
pub fn leaf_paths(group: &Group) -> Vec<String> {
    let mut out = Vec::new();
    for (name, node) in group.children() {
        match node {
            Node::Group(child) if !child.is_empty() => {
                out.extend(leaf_paths(child).into_iter().map(|p| format!("{}/{}", name, p)));
            }
            _ => out.push(name.to_string()),
        }
    }
    out
}
