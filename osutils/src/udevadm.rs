use anyhow::{Context, Error};

use crate::{dependencies::Dependency, exe::Executors};

/// Waits until the udev event queue is empty, i.e. pending device events have
/// been processed.
pub fn settle(executors: &Executors) -> Result<(), Error> {
    executors
        .root()
        .execute(&Dependency::Udevadm.cmd().with_arg("settle"))
        .context("Failed to settle udev events")?;
    Ok(())
}
