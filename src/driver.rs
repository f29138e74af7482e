use std::path::Path;

use log::{debug, info};

use fileshare_api::{
    config::DriverConfig,
    constants::DEFAULT_CONFIG_PATH,
    error::{FileShareError, FileShareResultExt},
    model::{CreateFileShareRequest, DeleteFileShareRequest, FileShareSpec, StoragePoolSpec},
};
use osutils::exe::Executors;

use crate::{
    catalog,
    locks::PoolLocks,
    provisioning::{self, ShareTarget},
};

/// Entry point of the file share driver. Holds the configuration loaded at
/// startup and the executors every operation runs its commands through.
pub struct Driver {
    config: DriverConfig,
    executors: Executors,
    locks: PoolLocks,
}

impl Driver {
    /// Loads the configuration from `config_path`, or from the default
    /// location, and sets up executors running commands on the host.
    pub fn setup(config_path: Option<&Path>) -> Result<Self, FileShareError> {
        let path = config_path.unwrap_or(Path::new(DEFAULT_CONFIG_PATH));
        debug!("Loading driver configuration from '{}'", path.display());

        let config = DriverConfig::load(path).message("Failed to set up file share driver")?;
        let executors = Executors::system(config.command_timeout());
        Self::new(config, executors)
    }

    pub fn new(config: DriverConfig, executors: Executors) -> Result<Self, FileShareError> {
        config.validate()?;
        info!(
            "File share driver ready, allocating from volume group '{}'",
            config.volume_group
        );

        Ok(Self {
            config,
            executors,
            locks: PoolLocks::new(),
        })
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Lists the storage pools published by the pool policy.
    pub fn list_pools(&self) -> Result<Vec<StoragePoolSpec>, FileShareError> {
        catalog::list_pools(&self.executors, &self.config.pool)
            .message("Failed to list storage pools")
    }

    pub fn create_file_share(
        &self,
        request: &CreateFileShareRequest,
    ) -> Result<FileShareSpec, FileShareError> {
        let _guard = self.locks.lock(&self.config.volume_group);
        provisioning::create_file_share(&self.executors, &self.config, request)
            .message(format!("Failed to create file share '{}'", request.name))
    }

    pub fn delete_file_share(&self, request: &DeleteFileShareRequest) -> Result<(), FileShareError> {
        let target = ShareTarget::from_request(request)
            .message(format!("Failed to delete file share '{}'", request.id))?;

        let _guard = self.locks.lock(&target.group);
        provisioning::delete_file_share(&self.executors, &target)
            .message(format!("Failed to delete file share '{}'", request.id))
    }
}
