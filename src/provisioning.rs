//! Creation and deletion of file shares.
//!
//! Creating a share walks through [`ProvisioningState`]: the logical volume is
//! allocated, its mount point directory created, a filesystem written to it
//! and finally mounted. Once the volume exists, a [`VolumeGuard`] removes it
//! again, along with the mount point directory, unless the share reaches
//! [`ProvisioningState::Published`]. A failed request never leaves a volume
//! behind.

use std::{
    collections::BTreeMap,
    net::IpAddr,
    path::{Path, PathBuf},
};

use log::{debug, error, info, warn};
use uuid::Uuid;

use fileshare_api::{
    config::DriverConfig,
    constants::{
        METADATA_FILESHARE_ID, METADATA_FILESHARE_NAME, METADATA_LV_PATH, METADATA_MOUNT_POINT,
    },
    error::{
        AllocationError, DeletionError, FileShareError, InvalidInputError, ProvisioningError,
        ReportError,
    },
    model::{CreateFileShareRequest, DeleteFileShareRequest, FileShareSpec},
};
use osutils::{exe::Executors, files, lvm, mkfs, mount, mountpoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProvisioningState {
    Requested,
    VolumeAllocated,
    DirectoryCreated,
    FilesystemFormatted,
    Mounted,
    Published,
    Aborted,
}

impl ProvisioningState {
    /// Whether a logical volume has been allocated for the share by the time
    /// this state is reached.
    pub fn holds_volume(&self) -> bool {
        *self >= Self::VolumeAllocated && *self != Self::Aborted
    }

    /// Whether the mount point directory has been created by this state.
    pub fn holds_directory(&self) -> bool {
        *self >= Self::DirectoryCreated && *self != Self::Aborted
    }
}

struct Progress<'a> {
    name: &'a str,
    state: ProvisioningState,
}

impl<'a> Progress<'a> {
    fn new(name: &'a str) -> Self {
        Self {
            name,
            state: ProvisioningState::Requested,
        }
    }

    fn advance(&mut self, next: ProvisioningState) {
        debug!("File share '{}': {:?} -> {:?}", self.name, self.state, next);
        self.state = next;
    }
}

/// Owns a freshly allocated logical volume until the share is published.
/// Dropping an armed guard removes the volume.
pub struct VolumeGuard<'a> {
    executors: &'a Executors,
    name: &'a str,
    group: &'a str,
    mount_point: &'a Path,
    armed: bool,
}

impl<'a> VolumeGuard<'a> {
    pub fn new(
        executors: &'a Executors,
        name: &'a str,
        group: &'a str,
        mount_point: &'a Path,
    ) -> Self {
        Self {
            executors,
            name,
            group,
            mount_point,
            armed: true,
        }
    }

    /// Keeps the volume.
    pub fn disarm(mut self) {
        self.armed = false;
    }

    /// Undoes whatever `reached` had set up and reports whether removing the
    /// volume worked. A mount point directory that cannot be removed is only
    /// logged.
    pub fn rollback(mut self, reached: ProvisioningState) -> Result<(), FileShareError> {
        self.armed = false;
        if reached.holds_directory() {
            if let Err(e) = files::remove_directory(self.executors, self.mount_point) {
                warn!(
                    "Failed to remove mount point '{}' of aborted file share: {e:?}",
                    self.mount_point.display()
                );
            }
        }

        if !reached.holds_volume() {
            return Ok(());
        }
        warn!(
            "Removing logical volume '{}/{}' of aborted file share",
            self.group, self.name
        );
        lvm::remove(self.executors, self.name, self.group).structured(
            DeletionError::RemoveVolume {
                name: self.name.into(),
                group: self.group.into(),
            },
        )
    }
}

impl Drop for VolumeGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        if let Err(e) = lvm::remove(self.executors, self.name, self.group) {
            error!(
                "Failed to remove logical volume '{}/{}' of aborted file share: {e:?}",
                self.group, self.name
            );
        }
    }
}

/// Checks a creation request before anything is allocated and returns the
/// requested size in GiB.
pub fn validate_request(request: &CreateFileShareRequest) -> Result<u64, FileShareError> {
    if request.name.is_empty() {
        return Err(FileShareError::new(InvalidInputError::EmptyName));
    }

    if request
        .name
        .chars()
        .any(|c| c == '/' || c.is_whitespace())
    {
        return Err(FileShareError::new(InvalidInputError::InvalidName {
            name: request.name.clone(),
        }));
    }

    u64::try_from(request.size)
        .ok()
        .filter(|size| *size >= 1)
        .structured(InvalidInputError::InvalidSize { size: request.size })
}

/// Provisions a file share in the configured volume group and returns its
/// descriptor. On failure, no logical volume allocated by this call remains.
pub fn create_file_share(
    executors: &Executors,
    config: &DriverConfig,
    request: &CreateFileShareRequest,
) -> Result<FileShareSpec, FileShareError> {
    let size = validate_request(request)?;
    let bind_ip = config.bind_ip()?;

    let mut progress = Progress::new(&request.name);
    match provision(executors, config, bind_ip, request, size, &mut progress) {
        Ok(spec) => {
            progress.advance(ProvisioningState::Published);
            info!(
                "Created file share '{}' exported at '{}'",
                spec.name, spec.export_locations
            );
            Ok(spec)
        }
        Err(e) => {
            progress.advance(ProvisioningState::Aborted);
            Err(e)
        }
    }
}

fn provision(
    executors: &Executors,
    config: &DriverConfig,
    bind_ip: IpAddr,
    request: &CreateFileShareRequest,
    size: u64,
    progress: &mut Progress,
) -> Result<FileShareSpec, FileShareError> {
    let name = request.name.as_str();
    let group = config.volume_group.as_str();
    let device = lvm::volume_path(group, name);
    let mount_point = config.mount_root.join(name);

    lvm::create(executors, name, group, size).structured(AllocationError::CreateVolume {
        name: name.into(),
        group: group.into(),
    })?;
    progress.advance(ProvisioningState::VolumeAllocated);
    let guard = VolumeGuard::new(executors, name, group, &mount_point);

    match prepare_volume(executors, &device, &mount_point, progress) {
        Ok(()) => guard.disarm(),
        Err(e) => {
            return Err(match guard.rollback(progress.state) {
                Ok(()) => e,
                Err(secondary) => {
                    error!("Failed to roll back file share '{name}': {secondary:?}");
                    e.secondary_error_context(secondary)
                }
            })
        }
    }

    let id = if request.id.is_empty() {
        Uuid::new_v4().to_string()
    } else {
        request.id.clone()
    };

    let metadata: BTreeMap<String, String> = BTreeMap::from([
        (METADATA_FILESHARE_NAME.into(), name.into()),
        (METADATA_FILESHARE_ID.into(), id.clone()),
        (METADATA_LV_PATH.into(), device.display().to_string()),
        (METADATA_MOUNT_POINT.into(), mount_point.display().to_string()),
    ]);

    Ok(FileShareSpec {
        id,
        name: name.into(),
        size: request.size,
        description: request.description.clone(),
        availability_zone: request.availability_zone.clone(),
        pool_id: group.into(),
        export_locations: export_location(bind_ip, &mount_point),
        metadata,
    })
}

/// `host:path` as NFS clients expect it, with IPv6 hosts in brackets.
fn export_location(bind_ip: IpAddr, mount_point: &Path) -> String {
    match bind_ip {
        IpAddr::V4(ip) => format!("{ip}:{}", mount_point.display()),
        IpAddr::V6(ip) => format!("[{ip}]:{}", mount_point.display()),
    }
}

/// Creates the mount point, formats `device` and mounts it.
fn prepare_volume(
    executors: &Executors,
    device: &Path,
    mount_point: &Path,
    progress: &mut Progress,
) -> Result<(), FileShareError> {
    files::create_directory(executors, mount_point).structured(
        ProvisioningError::CreateDirectory {
            path: mount_point.display().to_string(),
        },
    )?;
    progress.advance(ProvisioningState::DirectoryCreated);

    mkfs::mke2fs(executors, device).structured(ProvisioningError::FormatFilesystem {
        device: device.display().to_string(),
    })?;
    progress.advance(ProvisioningState::FilesystemFormatted);

    mount::mount(executors, device, mount_point).structured(ProvisioningError::Mount {
        device: device.display().to_string(),
        path: mount_point.display().to_string(),
    })?;
    progress.advance(ProvisioningState::Mounted);

    Ok(())
}

/// The logical volume and mount point of a published share, as recorded in
/// its metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareTarget {
    pub group: String,
    pub name: String,
    pub mount_point: Option<PathBuf>,
}

impl ShareTarget {
    pub fn from_request(request: &DeleteFileShareRequest) -> Result<Self, FileShareError> {
        let lv_path = request
            .metadata
            .get(METADATA_LV_PATH)
            .structured(DeletionError::MissingMetadata {
                key: METADATA_LV_PATH,
            })?;

        let (group, name) = lvm::parse_volume_path(lv_path).structured(
            DeletionError::MalformedVolumePath {
                path: lv_path.clone(),
            },
        )?;

        Ok(Self {
            group,
            name,
            mount_point: request
                .metadata
                .get(METADATA_MOUNT_POINT)
                .filter(|dir| !dir.is_empty())
                .map(PathBuf::from),
        })
    }

    pub fn device(&self) -> PathBuf {
        lvm::volume_path(&self.group, &self.name)
    }
}

/// Tears down a published share: unmounts it, removes its logical volume and
/// then its mount point directory.
///
/// A share whose volume is already gone is treated as deleted. When unmounting
/// fails the volume is kept. A mount point that is no longer mounted is left
/// alone, so a delete interrupted after unmounting can be retried.
pub fn delete_file_share(executors: &Executors, target: &ShareTarget) -> Result<(), FileShareError> {
    let exists = lvm::check_exists(executors, &target.name).structured(
        DeletionError::CheckVolume {
            name: target.name.clone(),
        },
    )?;
    if !exists {
        warn!(
            "Logical volume '{}' does not exist, nothing to delete",
            target.device().display()
        );
        return Ok(());
    }

    if let Some(mount_point) = &target.mount_point {
        unmount(executors, mount_point)?;
    }

    lvm::remove(executors, &target.name, &target.group).structured(
        DeletionError::RemoveVolume {
            name: target.name.clone(),
            group: target.group.clone(),
        },
    )?;

    if let Some(mount_point) = &target.mount_point {
        if let Err(e) = files::remove_directory(executors, mount_point) {
            warn!(
                "Failed to remove mount point '{}' of deleted file share: {e:?}",
                mount_point.display()
            );
        }
    }

    info!("Deleted file share '{}'", target.name);
    Ok(())
}

fn unmount(executors: &Executors, mount_point: &Path) -> Result<(), FileShareError> {
    let mounted = mountpoint::check_is_mountpoint(executors, mount_point).structured(
        DeletionError::CheckMountPoint {
            path: mount_point.display().to_string(),
        },
    )?;
    if !mounted {
        debug!("'{}' is not mounted", mount_point.display());
        return Ok(());
    }

    mount::umount(executors, mount_point).structured(DeletionError::Unmount {
        path: mount_point.display().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use maplit::btreemap;

    use fileshare_api::error::ErrorKind;
    use osutils::{dependencies::Dependency, testutils::fake_lvm::FakeLvm};

    fn config() -> DriverConfig {
        DriverConfig {
            volume_group: "pool-default".into(),
            ..Default::default()
        }
    }

    fn request(name: &str, size: i64) -> CreateFileShareRequest {
        CreateFileShareRequest {
            name: name.into(),
            size,
            ..Default::default()
        }
    }

    fn host() -> Arc<FakeLvm> {
        FakeLvm::with_group("pool-default", 100)
    }

    #[test]
    fn test_create() {
        let lvm = host();
        let executors = lvm.executors();

        let spec = create_file_share(&executors, &config(), &request("share1", 10)).unwrap();
        assert_eq!(spec.name, "share1");
        assert_eq!(spec.size, 10);
        assert_eq!(spec.pool_id, "pool-default");
        assert_eq!(spec.availability_zone, "");
        assert_eq!(spec.export_locations, "127.0.0.1:/var/share1");
        Uuid::parse_str(&spec.id).unwrap();
        assert_eq!(
            spec.metadata,
            btreemap! {
                "lvmFileshareName".into() => "share1".into(),
                "lvmFileshareID".into() => spec.id.clone(),
                "lvPath".into() => "/dev/pool-default/share1".into(),
                "mountPoint".into() => "/var/share1".into(),
            }
        );

        assert_eq!(
            lvm.calls(),
            vec![
                "env LC_ALL=C lvcreate -Z n -n share1 -L 10g pool-default",
                "env LC_ALL=C mkdir /var/share1",
                "env LC_ALL=C mke2fs /dev/pool-default/share1",
                "env LC_ALL=C mount /dev/pool-default/share1 /var/share1",
            ]
        );
        assert!(lvm::exists(&executors, "share1"));
        assert!(lvm.has_directory("/var/share1"));
        assert_eq!(
            lvm.mount_source("/var/share1").as_deref(),
            Some("/dev/pool-default/share1")
        );
    }

    #[test]
    fn test_create_keeps_request_fields() {
        let lvm = host();
        let config = DriverConfig {
            bind_address: "10.1.2.3".into(),
            mount_root: "/srv/shares".into(),
            ..config()
        };
        let request = CreateFileShareRequest {
            id: "e1f0".into(),
            description: "scratch space".into(),
            availability_zone: "zone-b".into(),
            ..request("scratch", 1)
        };

        let spec = create_file_share(&lvm.executors(), &config, &request).unwrap();
        assert_eq!(spec.id, "e1f0");
        assert_eq!(spec.metadata["lvmFileshareID"], "e1f0");
        assert_eq!(spec.description, "scratch space");
        assert_eq!(spec.availability_zone, "zone-b");
        assert_eq!(spec.export_locations, "10.1.2.3:/srv/shares/scratch");
    }

    #[test]
    fn test_create_ipv6_export() {
        let lvm = host();
        let config = DriverConfig {
            bind_address: "fd00::5".into(),
            ..config()
        };

        let spec = create_file_share(&lvm.executors(), &config, &request("share1", 1)).unwrap();
        assert_eq!(spec.export_locations, "[fd00::5]:/var/share1");
    }

    #[test]
    fn test_rollback_on_every_phase() {
        // Failing phase, expected error, whether the directory was created
        let phases = [
            (
                Dependency::Mkdir,
                ProvisioningError::CreateDirectory {
                    path: "/var/share1".into(),
                },
                false,
            ),
            (
                Dependency::Mke2fs,
                ProvisioningError::FormatFilesystem {
                    device: "/dev/pool-default/share1".into(),
                },
                true,
            ),
            (
                Dependency::Mount,
                ProvisioningError::Mount {
                    device: "/dev/pool-default/share1".into(),
                    path: "/var/share1".into(),
                },
                true,
            ),
        ];

        for (dependency, expected, created_directory) in phases {
            let lvm = host();
            let executors = lvm.executors();
            lvm.fail_always(dependency);

            let error =
                create_file_share(&executors, &config(), &request("share1", 10)).unwrap_err();
            assert_eq!(error.kind(), &ErrorKind::Provisioning(expected));
            assert!(
                !lvm::exists(&executors, "share1"),
                "Volume left behind after {dependency} failed"
            );
            assert_eq!(
                lvm.calls_to(Dependency::Lvremove),
                vec!["env LC_ALL=C lvremove --config 'activation { retry_deactivation = 1} ' -f pool-default/share1"]
            );
            assert_eq!(lvm.mount_source("/var/share1"), None);
            assert!(!lvm.has_directory("/var/share1"));
            assert_eq!(
                lvm.calls_to(Dependency::Rmdir),
                if created_directory {
                    vec!["env LC_ALL=C rmdir /var/share1"]
                } else {
                    vec![]
                }
            );
        }
    }

    #[test]
    fn test_retry_after_rollback() {
        let lvm = host();
        let executors = lvm.executors();
        lvm.fail_times(Dependency::Mount, 1);

        create_file_share(&executors, &config(), &request("share1", 10)).unwrap_err();
        let spec = create_file_share(&executors, &config(), &request("share1", 10)).unwrap();
        assert_eq!(spec.name, "share1");
        assert_eq!(
            lvm.mount_source("/var/share1").as_deref(),
            Some("/dev/pool-default/share1")
        );
    }

    #[test]
    fn test_mount_failure_end_to_end() {
        let lvm = host();
        let executors = lvm.executors();
        lvm.fail_always(Dependency::Mount);

        let error = create_file_share(&executors, &config(), &request("share1", 10)).unwrap_err();
        assert!(matches!(
            error.kind(),
            ErrorKind::Provisioning(ProvisioningError::Mount { .. })
        ));
        let cause = error.source().unwrap();
        assert!(cause
            .downcast_ref::<Box<osutils::dependencies::DependencyError>>()
            .is_some());
        assert!(!lvm::exists(&executors, "share1"));
    }

    #[test]
    fn test_failed_rollback_reports_original_error() {
        let lvm = host();
        let executors = lvm.executors();
        lvm.fail_always(Dependency::Mke2fs);
        lvm.fail_always(Dependency::Lvremove);

        let error = create_file_share(&executors, &config(), &request("share1", 10)).unwrap_err();
        assert!(matches!(
            error.kind(),
            ErrorKind::Provisioning(ProvisioningError::FormatFilesystem { .. })
        ));

        assert!(format!("{error:?}").contains("Failed to remove logical volume 'share1'"));

        // Both deletion phases were attempted
        assert_eq!(lvm.calls_to(Dependency::Lvremove).len(), 2);
        assert!(lvm.has_volume("pool-default", "share1"));
    }

    #[test]
    fn test_allocation_failure() {
        let lvm = FakeLvm::with_group("pool-default", 5);
        let executors = lvm.executors();

        let error = create_file_share(&executors, &config(), &request("share1", 10)).unwrap_err();
        assert_eq!(
            error.kind(),
            &ErrorKind::Allocation(AllocationError::CreateVolume {
                name: "share1".into(),
                group: "pool-default".into(),
            })
        );
        // Nothing was allocated, so nothing is cleaned up
        assert_eq!(
            lvm.calls(),
            vec!["env LC_ALL=C lvcreate -Z n -n share1 -L 10g pool-default"]
        );
    }

    #[test]
    fn test_name_collision_keeps_existing_share() {
        let lvm = host();
        let executors = lvm.executors();
        create_file_share(&executors, &config(), &request("share1", 10)).unwrap();

        let error = create_file_share(&executors, &config(), &request("share1", 10)).unwrap_err();
        assert!(matches!(error.kind(), ErrorKind::Allocation(_)));
        assert!(lvm.has_volume("pool-default", "share1"));
        assert!(lvm.calls_to(Dependency::Lvremove).is_empty());
    }

    #[test]
    fn test_invalid_requests() {
        let lvm = host();
        let executors = lvm.executors();

        let cases = [
            (request("", 10), InvalidInputError::EmptyName),
            (
                request("a/b", 10),
                InvalidInputError::InvalidName { name: "a/b".into() },
            ),
            (
                request("a b", 10),
                InvalidInputError::InvalidName { name: "a b".into() },
            ),
            (
                request("share1", 0),
                InvalidInputError::InvalidSize { size: 0 },
            ),
            (
                request("share1", -3),
                InvalidInputError::InvalidSize { size: -3 },
            ),
        ];

        for (request, expected) in cases {
            let error = create_file_share(&executors, &config(), &request).unwrap_err();
            assert_eq!(error.kind(), &ErrorKind::InvalidInput(expected));
        }
        assert!(lvm.calls().is_empty());
    }

    #[test]
    fn test_invalid_bind_address_allocates_nothing() {
        let lvm = host();
        let config = DriverConfig {
            bind_address: "nfs-server".into(),
            ..config()
        };

        let error =
            create_file_share(&lvm.executors(), &config, &request("share1", 10)).unwrap_err();
        assert!(matches!(error.kind(), ErrorKind::Initialization(_)));
        assert!(lvm.calls().is_empty());
    }

    #[test]
    fn test_state_order() {
        use ProvisioningState::*;

        assert!(!Requested.holds_volume());
        for state in [VolumeAllocated, DirectoryCreated, FilesystemFormatted, Mounted, Published] {
            assert!(state.holds_volume(), "{state:?}");
        }
        assert!(!Aborted.holds_volume());

        assert!(!VolumeAllocated.holds_directory());
        for state in [DirectoryCreated, FilesystemFormatted, Mounted, Published] {
            assert!(state.holds_directory(), "{state:?}");
        }
        assert!(!Aborted.holds_directory());
    }

    fn created(lvm: &Arc<FakeLvm>) -> DeleteFileShareRequest {
        let spec = create_file_share(&lvm.executors(), &config(), &request("share1", 10)).unwrap();
        lvm.clear_calls();
        DeleteFileShareRequest {
            id: spec.id,
            metadata: spec.metadata,
        }
    }

    #[test]
    fn test_delete() {
        let lvm = host();
        let request = created(&lvm);

        let target = ShareTarget::from_request(&request).unwrap();
        assert_eq!(
            target,
            ShareTarget {
                group: "pool-default".into(),
                name: "share1".into(),
                mount_point: Some("/var/share1".into()),
            }
        );

        delete_file_share(&lvm.executors(), &target).unwrap();
        assert_eq!(
            lvm.calls(),
            vec![
                "env LC_ALL=C lvs --noheadings -o name",
                "env LC_ALL=C mountpoint -q /var/share1",
                "env LC_ALL=C umount /var/share1",
                "env LC_ALL=C lvremove --config 'activation { retry_deactivation = 1} ' -f pool-default/share1",
                "env LC_ALL=C rmdir /var/share1",
            ]
        );
        assert!(!lvm.has_volume("pool-default", "share1"));
        assert_eq!(lvm.mount_source("/var/share1"), None);
        assert!(!lvm.has_directory("/var/share1"));

        // A second delete finds nothing to do
        lvm.clear_calls();
        delete_file_share(&lvm.executors(), &target).unwrap();
        assert_eq!(lvm.calls(), vec!["env LC_ALL=C lvs --noheadings -o name"]);
    }

    #[test]
    fn test_delete_without_mount_point() {
        let lvm = host();
        let mut request = created(&lvm);
        request.metadata.remove("mountPoint");
        lvm::create(&lvm.executors(), "other", "pool-default", 1).unwrap();

        let target = ShareTarget::from_request(&request).unwrap();
        assert_eq!(target.mount_point, None);
        delete_file_share(&lvm.executors(), &target).unwrap();
        assert!(lvm.calls_to(Dependency::Umount).is_empty());
        assert!(lvm.calls_to(Dependency::Rmdir).is_empty());
        assert!(!lvm.has_volume("pool-default", "share1"));
        assert!(lvm.has_volume("pool-default", "other"));
    }

    #[test]
    fn test_delete_bad_metadata() {
        let error = ShareTarget::from_request(&DeleteFileShareRequest {
            id: "x".into(),
            metadata: btreemap! { "mountPoint".into() => "/var/share1".into() },
        })
        .unwrap_err();
        assert_eq!(
            error.kind(),
            &ErrorKind::Deletion(DeletionError::MissingMetadata { key: "lvPath" })
        );

        let error = ShareTarget::from_request(&DeleteFileShareRequest {
            id: "x".into(),
            metadata: btreemap! { "lvPath".into() => "share1".into() },
        })
        .unwrap_err();
        assert_eq!(
            error.kind(),
            &ErrorKind::Deletion(DeletionError::MalformedVolumePath {
                path: "share1".into()
            })
        );
    }

    #[test]
    fn test_delete_unmount_failure_keeps_volume() {
        let lvm = host();
        let target = ShareTarget::from_request(&created(&lvm)).unwrap();
        lvm.fail_always(Dependency::Umount);

        let error = delete_file_share(&lvm.executors(), &target).unwrap_err();
        assert_eq!(
            error.kind(),
            &ErrorKind::Deletion(DeletionError::Unmount {
                path: "/var/share1".into()
            })
        );
        assert!(lvm.has_volume("pool-default", "share1"));
        assert!(lvm.has_directory("/var/share1"));
        assert!(lvm.calls_to(Dependency::Lvremove).is_empty());
    }

    #[test]
    fn test_delete_retries_busy_volume() {
        let lvm = host();
        let target = ShareTarget::from_request(&created(&lvm)).unwrap();
        lvm.fail_times(Dependency::Lvremove, 1);

        delete_file_share(&lvm.executors(), &target).unwrap();
        assert_eq!(lvm.calls_to(Dependency::Lvremove).len(), 2);
        assert_eq!(lvm.calls_to(Dependency::Udevadm), vec!["udevadm settle"]);
        assert!(!lvm.has_volume("pool-default", "share1"));
    }

    #[test]
    fn test_delete_remove_failure() {
        let lvm = host();
        let target = ShareTarget::from_request(&created(&lvm)).unwrap();
        lvm.fail_always(Dependency::Lvremove);

        let error = delete_file_share(&lvm.executors(), &target).unwrap_err();
        assert_eq!(
            error.kind(),
            &ErrorKind::Deletion(DeletionError::RemoveVolume {
                name: "share1".into(),
                group: "pool-default".into(),
            })
        );
        assert!(lvm.has_volume("pool-default", "share1"));
        assert!(lvm.has_directory("/var/share1"));
    }

    #[test]
    fn test_delete_retry_after_remove_failure() {
        let lvm = host();
        let target = ShareTarget::from_request(&created(&lvm)).unwrap();
        lvm.fail_times(Dependency::Lvremove, 2);

        let error = delete_file_share(&lvm.executors(), &target).unwrap_err();
        assert!(matches!(
            error.kind(),
            ErrorKind::Deletion(DeletionError::RemoveVolume { .. })
        ));
        assert_eq!(lvm.mount_source("/var/share1"), None);
        assert!(lvm.has_volume("pool-default", "share1"));

        // The share is no longer mounted, the retry goes straight to removal
        lvm.clear_calls();
        delete_file_share(&lvm.executors(), &target).unwrap();
        assert!(lvm.calls_to(Dependency::Umount).is_empty());
        assert!(!lvm.has_volume("pool-default", "share1"));
        assert!(!lvm.has_directory("/var/share1"));
    }

    #[test]
    fn test_recreate_after_delete() {
        let lvm = host();
        let executors = lvm.executors();

        for _ in 0..2 {
            let spec = create_file_share(&executors, &config(), &request("share1", 10)).unwrap();
            let target = ShareTarget::from_request(&DeleteFileShareRequest {
                id: spec.id,
                metadata: spec.metadata,
            })
            .unwrap();
            delete_file_share(&executors, &target).unwrap();
        }
        assert!(!lvm.has_volume("pool-default", "share1"));
        assert!(!lvm.has_directory("/var/share1"));
        assert_eq!(lvm.calls_to(Dependency::Lvremove).len(), 2);
    }

    #[test]
    fn test_delete_listing_failure() {
        let lvm = host();
        let target = ShareTarget::from_request(&created(&lvm)).unwrap();
        lvm.fail_always(Dependency::Lvs);

        let error = delete_file_share(&lvm.executors(), &target).unwrap_err();
        assert_eq!(
            error.kind(),
            &ErrorKind::Deletion(DeletionError::CheckVolume {
                name: "share1".into()
            })
        );
        assert!(lvm.has_volume("pool-default", "share1"));
    }
}
