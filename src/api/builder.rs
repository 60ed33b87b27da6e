use std::{env, error::Error, path::PathBuf};

use crate::{model::platform::PlatformDescriptor, Capdeps};

#[derive(Default)]
pub struct CapdepsBuilder {
    // All other paths are relative to `root`
    root: Option<PathBuf>,
    recipe_file_name: Option<PathBuf>,
    lock_file_name: Option<PathBuf>,
    index_file_name: Option<PathBuf>,
    platform: Option<PlatformDescriptor>,
}

impl CapdepsBuilder {
    /// Project root directory.
    ///
    /// Defaults to the current directory.
    pub fn root(mut self, path: impl Into<PathBuf>) -> Self {
        self.root = Some(path.into());
        self
    }

    /// Name of the recipe toml file.
    ///
    /// Defaults to `capdeps.toml`.
    pub fn recipe_file_name(mut self, path: impl Into<PathBuf>) -> Self {
        self.recipe_file_name = Some(path.into());
        self
    }

    /// Name of the lock file.
    ///
    /// Defaults to `capdeps.lock`.
    pub fn lock_file_name(mut self, path: impl Into<PathBuf>) -> Self {
        self.lock_file_name = Some(path.into());
        self
    }

    /// Package index declaring the requirements of upstream packages.
    /// Without one, no transitive requirements are considered.
    pub fn index_file_name(mut self, path: impl Into<PathBuf>) -> Self {
        self.index_file_name = Some(path.into());
        self
    }

    /// Target platform. Incomplete descriptors are accepted here and
    /// rejected when resolving.
    pub fn platform(mut self, platform: PlatformDescriptor) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn try_build(self) -> Result<Capdeps, Box<dyn Error>> {
        let Self {
            root,
            recipe_file_name,
            lock_file_name,
            index_file_name,
            platform,
        } = self;
        let root = match root {
            Some(root) => root,
            None => env::current_dir()?,
        };

        let recipe_file_name = recipe_file_name.unwrap_or_else(|| PathBuf::from("capdeps.toml"));

        let lock_file_name = lock_file_name.unwrap_or_else(|| PathBuf::from("capdeps.lock"));

        Ok(Capdeps {
            root,
            recipe_file_name,
            lock_file_name,
            index_file_name,
            platform: platform.unwrap_or_default(),
        })
    }
}
