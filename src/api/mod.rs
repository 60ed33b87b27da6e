use std::{
    error::Error,
    path::{Path, PathBuf},
};

use crate::{
    cli::command_handlers::{do_clean, do_init, do_lock, do_resolve},
    model::{
        platform::PlatformDescriptor,
        recipe::{lock::LockFile, resolved::Resolution},
    },
};

mod builder;

pub use builder::CapdepsBuilder;

pub struct Capdeps {
    root: PathBuf,
    recipe_file_name: PathBuf,
    lock_file_name: PathBuf,
    index_file_name: Option<PathBuf>,
    platform: PlatformDescriptor,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum LockMode {
    /// Verify that the lock file is up to date. This mode should be normally used on CI.
    Locked,
    /// Update the lock file if necessary.
    Update,
    /// Recreate the lock file from scratch.
    Recreate,
}

impl Capdeps {
    pub fn builder() -> CapdepsBuilder {
        CapdepsBuilder::default()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn platform(&self) -> &PlatformDescriptor {
        &self.platform
    }

    /// Creates an empty recipe
    pub fn init(&self, name: Option<String>) -> Result<(), Box<dyn Error>> {
        do_init(&self.root, name, &self.recipe_file_name)
    }

    /// Resolves the recipe's dependencies and option overrides for the configured platform
    pub fn resolve(&self) -> Result<Resolution, Box<dyn Error>> {
        do_resolve(
            &self.root,
            &self.recipe_file_name,
            self.index_file_name.as_deref(),
            &self.platform,
        )
    }

    /// Creates, updates or verifies a lock file based on the recipe
    pub fn lock(&self, lock_mode: LockMode) -> Result<LockFile, Box<dyn Error>> {
        do_lock(
            lock_mode,
            &self.root,
            &self.recipe_file_name,
            &self.lock_file_name,
            self.index_file_name.as_deref(),
            &self.platform,
        )
    }

    /// Delete the lock file
    pub fn clean(&self) -> Result<(), Box<dyn Error>> {
        do_clean(&self.root, &self.lock_file_name)
    }
}
