use std::path::Path;

use anyhow::{Context, Error};

use crate::{
    dependencies::{Dependency, DependencyError},
    exe::Executors,
};

/// Checks whether `path` is a mount point. A path that does not exist is not
/// one.
pub fn check_is_mountpoint(executors: &Executors, path: impl AsRef<Path>) -> Result<bool, Error> {
    let result = executors.root().execute(
        &Dependency::Mountpoint
            .cmd()
            .c_locale()
            .with_arg("-q")
            .with_arg(path.as_ref()),
    );
    match result {
        Ok(_) => Ok(true),
        Err(e) => {
            if let DependencyError::ExecutionFailed { .. } = *e {
                Ok(false)
            } else {
                Err(e).with_context(|| {
                    format!(
                        "Failed to determine if '{}' is a mount point",
                        path.as_ref().display()
                    )
                })
            }
        }
    }
}
