use std::{collections::BTreeMap, path::Path};

use log::debug;
use toml::{map::Map, Value};

use crate::model::{recipe::DependencySpec, ParseError};

/// Requirements declared by upstream packages, keyed by package reference.
///
/// ```toml
/// ["opencv/4.8.0@camposs/stable"]
/// requires = ["ffmpeg/6.0", "zlib/1.2.13"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageIndex {
    packages: BTreeMap<String, Vec<DependencySpec>>,
}

impl PackageIndex {
    pub fn from_file(path: &Path) -> Result<PackageIndex, ParseError> {
        debug!("Reading package index from {}", path.display());
        PackageIndex::from_toml_str(&std::fs::read_to_string(path)?)
    }

    pub fn from_toml_str(data: &str) -> Result<PackageIndex, ParseError> {
        let table = toml::from_str::<Map<String, Value>>(data)?;

        let mut index = PackageIndex::default();
        for (reference, entry) in table {
            let package = DependencySpec::parse(&reference)?;
            let requires = entry
                .get("requires")
                .map(|v| v.clone().try_into::<Vec<String>>())
                .map_or(Ok(None), |v| v.map(Some))?
                .unwrap_or_default()
                .iter()
                .map(|r| DependencySpec::parse(r))
                .collect::<Result<Vec<_>, _>>()?;
            index.insert(&package, requires);
        }
        Ok(index)
    }

    pub fn insert(&mut self, package: &DependencySpec, requires: Vec<DependencySpec>) {
        self.packages.insert(package.to_string(), requires);
    }

    /// Requirements declared by exactly this reference; empty when unknown.
    pub fn requirements_of(&self, package: &DependencySpec) -> &[DependencySpec] {
        self.packages
            .get(&package.to_string())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}
