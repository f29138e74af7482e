use std::{
    collections::HashMap,
    net::IpAddr,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{
    constants::{
        DEFAULT_AVAILABILITY_ZONE, DEFAULT_BIND_ADDRESS, DEFAULT_CONF_DIRECTORY,
        DEFAULT_MOUNT_ROOT, DEFAULT_VOLUME_GROUP,
    },
    error::{FileShareError, InitializationError, ReportError},
};

/// Administrator supplied configuration of the file share driver.
///
/// Field names on disk follow the layout already deployed on existing hosts,
/// hence the renames.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DriverConfig {
    /// Address clients reach exported shares on.
    #[serde(rename = "tgtBindIp", default = "default_bind_address")]
    pub bind_address: String,

    #[serde(rename = "tgtConfDir", default = "default_conf_directory")]
    pub conf_directory: PathBuf,

    #[serde(rename = "enableChapAuth", default)]
    pub chap_auth_enabled: bool,

    /// Pool policy keyed by volume group name. Volume groups without an
    /// entry are not published.
    #[serde(default)]
    pub pool: HashMap<String, PoolProperties>,

    /// Volume group new file shares are allocated in.
    #[serde(default = "default_volume_group")]
    pub volume_group: String,

    /// Parent directory of share mount points.
    #[serde(default = "default_mount_root")]
    pub mount_root: PathBuf,

    /// Deadline for every external command. No deadline when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_timeout_secs: Option<u64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PoolProperties {
    #[serde(default)]
    pub storage_type: String,

    #[serde(default)]
    pub availability_zone: String,

    #[serde(default)]
    pub extras: std::collections::BTreeMap<String, serde_yaml::Value>,
}

impl PoolProperties {
    /// The availability zone to publish, falling back to the default zone
    /// when the policy leaves it empty.
    pub fn effective_availability_zone(&self) -> &str {
        if self.availability_zone.is_empty() {
            DEFAULT_AVAILABILITY_ZONE
        } else {
            &self.availability_zone
        }
    }
}

fn default_bind_address() -> String {
    DEFAULT_BIND_ADDRESS.into()
}

fn default_conf_directory() -> PathBuf {
    DEFAULT_CONF_DIRECTORY.into()
}

fn default_volume_group() -> String {
    DEFAULT_VOLUME_GROUP.into()
}

fn default_mount_root() -> PathBuf {
    DEFAULT_MOUNT_ROOT.into()
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            conf_directory: default_conf_directory(),
            chap_auth_enabled: false,
            pool: HashMap::new(),
            volume_group: default_volume_group(),
            mount_root: default_mount_root(),
            command_timeout_secs: None,
        }
    }
}

impl DriverConfig {
    /// Loads and validates the configuration at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FileShareError> {
        let contents = std::fs::read_to_string(path.as_ref()).structured(
            InitializationError::LoadDriverConfig {
                path: path.as_ref().display().to_string(),
            },
        )?;

        Self::from_yaml(&contents)
    }

    /// Parses and validates a YAML document.
    pub fn from_yaml(contents: &str) -> Result<Self, FileShareError> {
        let config: Self = serde_yaml::from_str(contents)
            .structured(InitializationError::ParseDriverConfig)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration for values that would only fail late, after a
    /// volume has already been allocated.
    pub fn validate(&self) -> Result<(), FileShareError> {
        self.bind_ip()?;
        Ok(())
    }

    pub fn bind_ip(&self) -> Result<IpAddr, FileShareError> {
        self.bind_address
            .parse()
            .structured(InitializationError::InvalidBindAddress {
                address: self.bind_address.clone(),
            })
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_secs.map(Duration::from_secs)
    }
}
