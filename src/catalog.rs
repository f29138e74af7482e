use std::collections::HashMap;

use log::debug;
use uuid::Uuid;

use fileshare_api::{
    config::PoolProperties,
    error::{FileShareError, InventoryError, ReportError},
    model::StoragePoolSpec,
};
use osutils::{
    exe::Executors,
    lvm::{self, VolumeGroup},
};

/// Lists the volume groups that have an entry in the pool policy, in the order
/// the volume manager reports them.
pub fn list_pools(
    executors: &Executors,
    policy: &HashMap<String, PoolProperties>,
) -> Result<Vec<StoragePoolSpec>, FileShareError> {
    let groups =
        lvm::list_volume_groups(executors).structured(InventoryError::ListVolumeGroups)?;

    Ok(publish(groups, policy))
}

fn publish(
    groups: Vec<VolumeGroup>,
    policy: &HashMap<String, PoolProperties>,
) -> Vec<StoragePoolSpec> {
    groups
        .into_iter()
        .filter_map(|group| {
            let Some(properties) = policy.get(&group.name) else {
                debug!("Volume group '{}' has no pool policy, skipping", group.name);
                return None;
            };

            Some(StoragePoolSpec {
                id: pool_id(&group.uuid).to_string(),
                name: group.name,
                total_capacity: group.total_capacity,
                free_capacity: group.free_capacity,
                storage_type: properties.storage_type.clone(),
                availability_zone: properties.effective_availability_zone().into(),
                extras: properties.extras.clone(),
            })
        })
        .collect()
}

/// Identifier published for a volume group, derived from its native UUID.
pub fn pool_id(group_uuid: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, group_uuid.as_bytes())
}
