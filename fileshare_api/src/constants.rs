use const_format::formatcp;

// Driver configuration constants

/// Path the driver configuration is loaded from when none is given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/opensds/driver/nfs.yaml";

/// Default address clients reach exported shares on.
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";

/// Default target configuration directory.
pub const DEFAULT_CONF_DIRECTORY: &str = "/etc/tgt/conf.d";

/// Volume group new file shares are carved from.
pub const DEFAULT_VOLUME_GROUP: &str = "opensds-files-default";

/// Parent directory of share mount points.
pub const DEFAULT_MOUNT_ROOT: &str = "/var";

/// Availability zone published for pools whose policy leaves it empty.
pub const DEFAULT_AVAILABILITY_ZONE: &str = "default";

// Device paths

/// Directory under which the device mapper exposes logical volumes as
/// `/dev/<vg>/<lv>`.
pub const DEV_DIRECTORY: &str = "/dev";

// Share metadata keys

/// Name of the logical volume backing a share.
pub const METADATA_FILESHARE_NAME: &str = "lvmFileshareName";

/// Identifier of the share.
pub const METADATA_FILESHARE_ID: &str = "lvmFileshareID";

/// Device path of the logical volume backing a share.
pub const METADATA_LV_PATH: &str = "lvPath";

/// Directory the share is mounted at.
pub const METADATA_MOUNT_POINT: &str = "mountPoint";

// LVM tuning

/// `lvremove --config` fragment enabling retried deactivation. LV removal
/// races with other writers of the device.
pub const LVM_RETRY_DEACTIVATION: &str = "activation { retry_deactivation = 1} ";

/// `lvremove --config` used on the second deletion attempt. A failed
/// `lvremove -f` may leave suspended devices behind and, without lvmetad, any
/// further LVM command would block on them forever.
pub const LVM_RETRY_IGNORE_SUSPENDED: &str =
    formatcp!("{LVM_RETRY_DEACTIVATION}devices {{ ignore_suspended_devices = 1}}");
