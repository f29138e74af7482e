//! Wrappers around the LVM command line tools: listing volume groups and
//! logical volumes, and creating, inspecting and removing logical volumes.
//!
//! Every command runs with `LC_ALL=C` so that parsing of the tools' textual
//! output does not depend on the host's locale.

use std::path::{Path, PathBuf};

use anyhow::{Context, Error};
use log::{debug, info, warn};

use fileshare_api::constants::{DEV_DIRECTORY, LVM_RETRY_DEACTIVATION, LVM_RETRY_IGNORE_SUSPENDED};

use crate::{
    dependencies::{Command, Dependency},
    exe::Executors,
    udevadm,
};

/// A volume group as reported by `vgs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeGroup {
    pub name: String,
    /// Total capacity in GiB, fractional part discarded.
    pub total_capacity: i64,
    /// Free capacity in GiB, fractional part discarded.
    pub free_capacity: i64,
    pub uuid: String,
}

/// Lists all volume groups, in the order `vgs` reports them.
pub fn list_volume_groups(executors: &Executors) -> Result<Vec<VolumeGroup>, Error> {
    let output = executors
        .root()
        .execute(
            &Dependency::Vgs.cmd().c_locale().with_args([
                "--noheadings",
                "--nosuffix",
                "--unit=g",
                "-o",
                "name,size,free,uuid",
            ]),
        )
        .context("Failed to list volume groups")?;

    Ok(parse_vgs(&output))
}

/// Parses `vgs --noheadings --nosuffix --unit=g -o name,size,free,uuid`.
///
/// Sizes are truncated to whole GiB. A size that does not parse is reported as
/// zero and a line with missing fields is skipped, so that one odd volume
/// group never hides the others.
pub fn parse_vgs(output: &str) -> Vec<VolumeGroup> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let [name, total, free, uuid, ..] = fields[..] else {
                warn!("Skipping malformed vgs line: '{line}'");
                return None;
            };

            Some(VolumeGroup {
                name: name.into(),
                total_capacity: parse_gib(total),
                free_capacity: parse_gib(free),
                uuid: uuid.into(),
            })
        })
        .collect()
}

fn parse_gib(field: &str) -> i64 {
    match field.parse::<f64>() {
        // Saturating float-to-int cast; NaN becomes 0
        Ok(size) => size as i64,
        Err(e) => {
            debug!("Could not parse size '{field}', reporting 0: {e}");
            0
        }
    }
}

/// Device path of a logical volume: `/dev/<group>/<name>`.
pub fn volume_path(group: &str, name: &str) -> PathBuf {
    Path::new(DEV_DIRECTORY).join(group).join(name)
}

/// Splits a device path produced by [`volume_path`] back into its group and
/// volume name.
pub fn parse_volume_path(path: impl AsRef<Path>) -> Option<(String, String)> {
    let relative = path.as_ref().strip_prefix(DEV_DIRECTORY).ok()?;
    let mut components = relative.iter().map(|c| c.to_str());
    match (components.next(), components.next(), components.next()) {
        (Some(Some(group)), Some(Some(name)), None) => Some((group.into(), name.into())),
        _ => None,
    }
}

/// Creates a logical volume of `size_gib` GiB named `name` in `group`.
///
/// Fails when the group lacks capacity or already holds a volume of that name.
pub fn create(executors: &Executors, name: &str, group: &str, size_gib: u64) -> Result<(), Error> {
    executors
        .root()
        .execute(&Dependency::Lvcreate.cmd().c_locale().with_args([
            "-Z",
            "n",
            "-n",
            name,
            "-L",
            &format!("{size_gib}g"),
            group,
        ]))
        .with_context(|| format!("Failed to create logical volume '{name}' in '{group}'"))?;

    Ok(())
}

/// Checks whether a logical volume named `name` exists in any volume group.
///
/// The check is global: a volume of the same name in another group counts.
pub fn check_exists(executors: &Executors, name: &str) -> Result<bool, Error> {
    let output = executors
        .root()
        .execute(
            &Dependency::Lvs
                .cmd()
                .c_locale()
                .with_args(["--noheadings", "-o", "name"]),
        )
        .context("Failed to list logical volumes")?;

    Ok(output.split_whitespace().any(|field| field == name))
}

/// Like [`check_exists`], but a failure to list volumes reads as "does not
/// exist".
pub fn exists(executors: &Executors, name: &str) -> bool {
    check_exists(executors, name).unwrap_or_else(|e| {
        warn!("Assuming logical volume '{name}' does not exist: {e:?}");
        false
    })
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LvAttrParseError {
    #[error("Attribute string is empty")]
    Empty,
    #[error("Attribute string '{attr}' has {len} characters, expected at least {expected}")]
    TooShort {
        attr: String,
        len: usize,
        expected: usize,
    },
}

/// The leading fields of the `lv_attr` string reported by `lvs`/`lvdisplay -C`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LvAttributes {
    /// e.g. `-` plain, `m` mirrored, `s` snapshot, `t` thin pool
    pub volume_type: char,
    /// `w` writeable, `r` read-only
    pub permissions: char,
    /// `a` anywhere, `c` contiguous, `i` inherited, `n` normal...
    pub allocation_policy: char,
    /// `m` when the minor number is fixed
    pub fixed_minor: char,
    /// `a` active, `s` suspended, `-` inactive...
    pub state: char,
    /// `o` when the device is open
    pub device_open: char,
}

impl LvAttributes {
    const FIELDS: usize = 6;

    pub fn parse(output: &str) -> Result<Self, LvAttrParseError> {
        let attr = output
            .split_whitespace()
            .next()
            .ok_or(LvAttrParseError::Empty)?;
        let chars: Vec<char> = attr.chars().collect();
        let [volume_type, permissions, allocation_policy, fixed_minor, state, device_open, ..] =
            chars[..]
        else {
            return Err(LvAttrParseError::TooShort {
                attr: attr.into(),
                len: chars.len(),
                expected: Self::FIELDS,
            });
        };

        Ok(Self {
            volume_type,
            permissions,
            allocation_policy,
            fixed_minor,
            state,
            device_open,
        })
    }

    pub fn is_active(&self) -> bool {
        self.state == 'a'
    }

    pub fn is_open(&self) -> bool {
        self.device_open == 'o'
    }
}

/// Reads the attributes of logical volume `group/name`.
pub fn attributes(executors: &Executors, name: &str, group: &str) -> Result<LvAttributes, Error> {
    let target = format!("{group}/{name}");
    let output = executors
        .root()
        .execute(
            &Dependency::Lvdisplay
                .cmd()
                .c_locale()
                .with_args(["--noheading", "-C", "-o", "Attr", &target]),
        )
        .with_context(|| format!("Failed to display logical volume '{target}'"))?;

    LvAttributes::parse(&output)
        .with_context(|| format!("Failed to parse attributes of logical volume '{target}'"))
}

/// Checks whether logical volume `group/name` is active.
pub fn check_active(executors: &Executors, name: &str, group: &str) -> Result<bool, Error> {
    Ok(attributes(executors, name, group)?.is_active())
}

/// Like [`check_active`], but any failure reads as "not active".
pub fn is_active(executors: &Executors, name: &str, group: &str) -> bool {
    check_active(executors, name, group).unwrap_or_else(|e| {
        warn!("Assuming logical volume '{group}/{name}' is not active: {e:?}");
        false
    })
}

fn lvremove(config: &str, target: &str) -> Command {
    Dependency::Lvremove
        .cmd()
        .c_locale()
        .with_args(["--config", config, "-f", target])
}

/// Removes logical volume `group/name`.
///
/// Removal races with other users of the device still deactivating it. When
/// the first attempt fails, pending udev events are settled and the removal
/// is retried once, skipping devices the first attempt may have left
/// suspended. Only a failure of the retry is reported.
pub fn remove(executors: &Executors, name: &str, group: &str) -> Result<(), Error> {
    let target = format!("{group}/{name}");

    let Err(e) = executors
        .root()
        .execute(&lvremove(LVM_RETRY_DEACTIVATION, &target))
    else {
        debug!("Removed logical volume '{target}'");
        return Ok(());
    };
    info!("Error reported running lvremove, retrying after udev settle: {e}");

    if let Err(e) = udevadm::settle(executors) {
        warn!("{e:?}");
    }

    executors
        .root()
        .execute(&lvremove(LVM_RETRY_IGNORE_SUSPENDED, &target))
        .with_context(|| format!("Failed to remove logical volume '{target}'"))?;

    info!("Successfully deleted logical volume '{target}' after udev settle");
    Ok(())
}
