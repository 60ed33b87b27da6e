use serde::{Deserialize, Serialize};

use super::{DependencySpec, OptionOverride, OptionValue};

/// Finalized dependency graph request for one platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub dependencies: Vec<DependencySpec>,
    pub options: Vec<OptionOverride>,
}

impl Resolution {
    pub fn dependency(&self, name: &str) -> Option<&DependencySpec> {
        self.dependencies
            .iter()
            .find(|dependency| dependency.name.as_str() == name)
    }

    pub fn option(&self, package: &str, option: &str) -> Option<&OptionValue> {
        self.options
            .iter()
            .find(|o| o.package.as_str() == package && o.option == option)
            .map(|o| &o.value)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
