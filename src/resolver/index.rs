use crate::model::{index::PackageIndex, recipe::DependencySpec};

use super::RequirementProvider;

impl RequirementProvider for PackageIndex {
    fn requirements(&self, package: &DependencySpec) -> Vec<DependencySpec> {
        self.requirements_of(package).to_vec()
    }
}
