use std::path::Path;

use anyhow::{Context, Error};

use crate::{dependencies::Dependency, exe::Executors};

/// Mounts block device `device_path` at `mount_dir`, letting `mount` detect
/// the filesystem type.
pub fn mount(
    executors: &Executors,
    device_path: impl AsRef<Path>,
    mount_dir: impl AsRef<Path>,
) -> Result<(), Error> {
    executors
        .root()
        .execute(
            &Dependency::Mount
                .cmd()
                .c_locale()
                .with_arg(device_path.as_ref())
                .with_arg(mount_dir.as_ref()),
        )
        .with_context(|| {
            format!(
                "Failed to mount {} to path {}",
                device_path.as_ref().display(),
                mount_dir.as_ref().display(),
            )
        })?;
    Ok(())
}

/// Unmounts given directory mount_dir.
pub fn umount(executors: &Executors, mount_dir: impl AsRef<Path>) -> Result<(), Error> {
    executors
        .root()
        .execute(
            &Dependency::Umount
                .cmd()
                .c_locale()
                .with_arg(mount_dir.as_ref()),
        )
        .with_context(|| {
            format!(
                "Failed to unmount directory {}",
                mount_dir.as_ref().display()
            )
        })?;
    Ok(())
}
