use log::{debug, info};

use crate::{
    api::LockMode,
    flock::FileLock,
    model::{
        index::PackageIndex,
        platform::PlatformDescriptor,
        recipe::{lock::LockFile, resolved::Resolution, Recipe},
    },
    resolver::{ResolveError, Resolver},
};
use std::{
    error::Error,
    path::{Path, PathBuf},
};

/// Handler to resolve command
/// Loads the recipe and the optional package index and resolves them for the platform
pub fn do_resolve(
    root: &Path,
    recipe_file_name: &Path,
    index_file_name: Option<&Path>,
    platform: &PlatformDescriptor,
) -> Result<Resolution, Box<dyn Error>> {
    let recipe = load_recipe(root, recipe_file_name)?;
    let index = load_index(root, index_file_name)?;

    let resolution = Resolver::with_provider(&recipe, &index).resolve(platform)?;
    debug!("Resolved {}: {:?}", recipe.name, resolution);

    Ok(resolution)
}

/// Handler to lock command
/// Resolves the recipe and creates, updates or verifies the lock file
pub fn do_lock(
    lock_mode: LockMode,
    root: &Path,
    recipe_file_name: &Path,
    lock_file_name: &Path,
    index_file_name: Option<&Path>,
    platform: &PlatformDescriptor,
) -> Result<LockFile, Box<dyn Error>> {
    let recipe = load_recipe(root, recipe_file_name)?;
    let index = load_index(root, index_file_name)?;

    let resolution = Resolver::with_provider(&recipe, &index).resolve(platform)?;
    let platform = platform.complete().map_err(ResolveError::MissingField)?;
    let lockfile = LockFile::from_resolution(&recipe, platform, resolution);

    let lock_file_path = root.join(lock_file_name);
    let _guard = FileLock::new(&guard_path(&lock_file_path))?;

    let old_lock = match (lock_mode, lock_file_path.exists()) {
        (LockMode::Locked, false) => {
            return Err(format!("Lock file {} does not exist", lock_file_path.display()).into())
        }
        (LockMode::Recreate, _) | (LockMode::Update, false) => None,
        (_, true) => Some(LockFile::from_file(&lock_file_path)?),
    };

    match old_lock {
        Some(old_lock) if old_lock == lockfile => {
            debug!("Lockfile is up to date");
        }
        Some(_) if lock_mode == LockMode::Locked => {
            return Err(format!(
                "Lock file {} is out of date for {}",
                lock_file_path.display(),
                lockfile.platform
            )
            .into());
        }
        _ => {
            std::fs::write(&lock_file_path, lockfile.to_string()?)?;
            info!("Wrote lockfile to {}", lock_file_path.display());
        }
    }

    Ok(lockfile)
}

/// Handler to init command
pub fn do_init(
    root: &Path,
    name: Option<String>,
    recipe_file_name: &Path,
) -> Result<(), Box<dyn Error>> {
    let name = build_recipe_name(name, root)?;
    let recipe_file_path = root.join(recipe_file_name);
    if recipe_file_path.exists() {
        return Err(format!("File already exists: {}", recipe_file_path.display()).into());
    }
    std::fs::write(
        &recipe_file_path,
        toml::to_string_pretty(&Recipe::new(name).into_toml())?,
    )?;
    info!("Created {}", recipe_file_path.display());
    Ok(())
}

pub fn do_clean(root: &Path, lock_file_name: &Path) -> Result<(), Box<dyn Error>> {
    let lock_file_path = root.join(lock_file_name);

    info!("Removing lock file {}.", lock_file_path.display());
    match std::fs::remove_file(&lock_file_path) {
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            info!("{} is already removed, nothing to do", lock_file_path.display());
            Ok(())
        }
        otherwise => otherwise,
    }?;

    Ok(())
}

fn load_recipe(root: &Path, recipe_file_name: &Path) -> Result<Recipe, Box<dyn Error>> {
    Ok(Recipe::from_file(&root.join(recipe_file_name))?)
}

fn load_index(
    root: &Path,
    index_file_name: Option<&Path>,
) -> Result<PackageIndex, Box<dyn Error>> {
    match index_file_name {
        Some(index_file_name) => Ok(PackageIndex::from_file(&root.join(index_file_name))?),
        None => Ok(PackageIndex::default()),
    }
}

fn guard_path(lock_file_path: &Path) -> PathBuf {
    let file_name = lock_file_path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    lock_file_path.with_file_name(format!(".{}.guard", file_name))
}

/// Name if present otherwise attempt to extract from directory
fn build_recipe_name(name: Option<String>, path: &Path) -> Result<String, Box<dyn Error>> {
    match name {
        Some(name) => Ok(name),
        None => match path.canonicalize()?.file_name() {
            Some(dir) => Ok(dir.to_string_lossy().to_string()),
            None => {
                Err("Recipe name not given and could not convert location to directory name".into())
            }
        },
    }
}
