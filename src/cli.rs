use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter, Result as FmtResult},
    path::PathBuf,
};

use clap::{Parser, Subcommand};
use log::LevelFilter;

use fileshare_api::{
    error::{FileShareError, InvalidInputError},
    model::{CreateFileShareRequest, DeleteFileShareRequest},
};

use crate::FILESHARE_VERSION;

#[derive(Parser, Debug)]
#[clap(version = FILESHARE_VERSION)]
pub struct Cli {
    /// Logging verbosity [OFF, ERROR, WARN, INFO, DEBUG, TRACE]
    #[arg(global = true, short, long, default_value_t = LevelFilter::Info)]
    pub verbosity: LevelFilter,

    /// Driver configuration to load instead of the default one
    #[arg(global = true, short, long)]
    pub config: Option<PathBuf>,

    /// Append JSON formatted logs to this file
    #[arg(global = true, long)]
    pub log_file: Option<PathBuf>,

    /// Path to save an eventual fatal error
    #[arg(global = true, short, long)]
    pub error: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the storage pools published by the pool policy
    #[clap(name = "list-pools")]
    ListPools,

    /// Create, format and mount a new file share
    Create {
        /// Name of the share and of its logical volume
        #[clap(short, long)]
        name: String,

        /// Size in GiB
        #[clap(short, long)]
        size: i64,

        /// Identifier of the share, generated when not given
        #[clap(long, default_value = "")]
        id: String,

        #[clap(long, default_value = "")]
        description: String,

        #[clap(long, default_value = "")]
        availability_zone: String,
    },

    /// Unmount a file share and remove its logical volume
    Delete {
        /// Identifier of the share
        #[clap(long)]
        id: String,

        /// Share metadata as printed by `create`, as key=value pairs
        #[clap(short, long, num_args = 1..)]
        metadata: Vec<String>,
    },
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Commands::ListPools => "list-pools",
            Commands::Create { .. } => "create",
            Commands::Delete { .. } => "delete",
        }
    }

    /// Builds the creation request of a `create` command.
    pub fn create_request(&self) -> Option<CreateFileShareRequest> {
        match self {
            Commands::Create {
                name,
                size,
                id,
                description,
                availability_zone,
            } => Some(CreateFileShareRequest {
                id: id.clone(),
                name: name.clone(),
                size: *size,
                description: description.clone(),
                availability_zone: availability_zone.clone(),
            }),
            _ => None,
        }
    }

    /// Builds the deletion request of a `delete` command.
    pub fn delete_request(&self) -> Option<Result<DeleteFileShareRequest, FileShareError>> {
        match self {
            Commands::Delete { id, metadata } => Some(parse_metadata(metadata).map(|metadata| {
                DeleteFileShareRequest {
                    id: id.clone(),
                    metadata,
                }
            })),
            _ => None,
        }
    }
}

impl Display for Commands {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.name())
    }
}

/// Parses `key=value` entries. Values may contain `=`.
pub fn parse_metadata(entries: &[String]) -> Result<BTreeMap<String, String>, FileShareError> {
    entries
        .iter()
        .map(|entry| match entry.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok((key.into(), value.into())),
            _ => Err(FileShareError::new(InvalidInputError::MalformedMetadata {
                entry: entry.clone(),
            })),
        })
        .collect()
}
