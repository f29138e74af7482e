//! Plain data exchanged with the request layer: incoming file share requests
//! and the descriptors published for pools and provisioned shares.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A storage pool (volume group) that passed the configured pool policy.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoragePoolSpec {
    /// UUIDv5 of the volume group's native UUID, stable across listings.
    pub id: String,

    pub name: String,

    /// Total capacity in GiB, fractional part discarded.
    pub total_capacity: i64,

    /// Free capacity in GiB, fractional part discarded.
    pub free_capacity: i64,

    pub storage_type: String,

    pub availability_zone: String,

    #[serde(default)]
    pub extras: BTreeMap<String, serde_yaml::Value>,
}

/// A file share that was created, formatted, mounted and exported.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileShareSpec {
    pub id: String,

    pub name: String,

    /// Size in GiB.
    pub size: i64,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub availability_zone: String,

    /// Volume group the share was carved from.
    pub pool_id: String,

    /// Address clients mount the share from, `<address>:<directory>`.
    pub export_locations: String,

    /// Everything needed to tear the share down again.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreateFileShareRequest {
    #[serde(default)]
    pub id: String,

    pub name: String,

    /// Requested size in GiB.
    pub size: i64,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub availability_zone: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeleteFileShareRequest {
    pub id: String,

    /// Metadata of the share as returned in [`FileShareSpec::metadata`].
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}
