use std::path::Path;

use anyhow::{Context, Error};

use crate::{dependencies::Dependency, exe::Executors};

/// Creates an ext2 filesystem on `device_path`.
pub fn mke2fs(executors: &Executors, device_path: impl AsRef<Path>) -> Result<(), Error> {
    executors
        .root()
        .execute(
            &Dependency::Mke2fs
                .cmd()
                .c_locale()
                .with_arg(device_path.as_ref()),
        )
        .with_context(|| {
            format!(
                "Failed to create filesystem on '{}'",
                device_path.as_ref().display()
            )
        })?;
    Ok(())
}
