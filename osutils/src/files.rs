use std::path::Path;

use anyhow::{Context, Error};

use crate::{dependencies::Dependency, exe::Executors};

/// Creates directory `path` with elevated privileges. The parent must exist
/// and `path` itself must not.
pub fn create_directory(executors: &Executors, path: impl AsRef<Path>) -> Result<(), Error> {
    executors
        .root()
        .execute(&Dependency::Mkdir.cmd().c_locale().with_arg(path.as_ref()))
        .with_context(|| format!("Could not create directory: {}", path.as_ref().display()))?;
    Ok(())
}

/// Removes the empty directory `path` with elevated privileges.
pub fn remove_directory(executors: &Executors, path: impl AsRef<Path>) -> Result<(), Error> {
    executors
        .root()
        .execute(&Dependency::Rmdir.cmd().c_locale().with_arg(path.as_ref()))
        .with_context(|| format!("Could not remove directory: {}", path.as_ref().display()))?;
    Ok(())
}
