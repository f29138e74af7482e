use std::fmt::{Debug, Write};
use std::{borrow::Cow, panic::Location};

use serde::{ser::SerializeStruct, Deserialize, Serialize};
use strum_macros::IntoStaticStr;

/// The driver failed to initialize.
#[derive(Debug, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum InitializationError {
    #[error("Failed to load driver configuration from '{path}'")]
    LoadDriverConfig { path: String },
    #[error("Failed to parse driver configuration")]
    ParseDriverConfig,
    #[error("Bind address '{address}' is not a valid IP address")]
    InvalidBindAddress { address: String },
}

/// Caller supplied input was invalid.
#[derive(Debug, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum InvalidInputError {
    #[error("File share name must not be empty")]
    EmptyName,
    #[error("File share name '{name}' contains characters not allowed in a volume name")]
    InvalidName { name: String },
    #[error("File share size must be a positive number of GiB, got {size}")]
    InvalidSize { size: i64 },
    #[error("Metadata entry '{entry}' is not of the form key=value")]
    MalformedMetadata { entry: String },
}

/// The volume manager refused to allocate the logical volume. Nothing was
/// allocated, so nothing needs to be cleaned up.
#[derive(Debug, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum AllocationError {
    #[error("Failed to create logical volume '{name}' in volume group '{group}'")]
    CreateVolume { name: String, group: String },
}

/// A step after volume allocation failed. The allocated volume has been
/// removed on a best effort basis.
#[derive(Debug, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum ProvisioningError {
    #[error("Failed to create mount point directory '{path}'")]
    CreateDirectory { path: String },
    #[error("Failed to create filesystem on '{device}'")]
    FormatFilesystem { device: String },
    #[error("Failed to mount '{device}' at '{path}'")]
    Mount { device: String, path: String },
}

/// Tearing down a published file share failed.
#[derive(Debug, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum DeletionError {
    #[error("File share metadata is missing '{key}'")]
    MissingMetadata { key: &'static str },
    #[error("Logical volume path '{path}' is not of the form /dev/<group>/<volume>")]
    MalformedVolumePath { path: String },
    #[error("Failed to check whether logical volume '{name}' exists")]
    CheckVolume { name: String },
    #[error("Failed to determine whether '{path}' is mounted")]
    CheckMountPoint { path: String },
    #[error("Failed to unmount '{path}'")]
    Unmount { path: String },
    #[error("Failed to remove logical volume '{name}' from volume group '{group}'")]
    RemoveVolume { name: String, group: String },
}

/// Reading the live storage pool inventory failed.
#[derive(Debug, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum InventoryError {
    #[error("Failed to list volume groups")]
    ListVolumeGroups,
}

#[derive(Debug, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum InternalError {
    #[error("Internal error: {0}")]
    Internal(&'static str),
    #[error("Failed to serialize output")]
    SerializeOutput,
}

/// Each variant of `ErrorKind` corresponds to a different category of error.
/// The categories follow the points of the provisioning lifecycle at which a
/// failure can happen, so that callers can tell whether any volume may have
/// been left behind.
#[derive(Debug, Eq, thiserror::Error, IntoStaticStr, PartialEq)]
#[strum(serialize_all = "kebab-case")]
pub enum ErrorKind {
    /// The driver failed to initialize.
    #[error(transparent)]
    Initialization(#[from] InitializationError),

    /// The caller provided invalid input. No external command was run.
    #[error(transparent)]
    InvalidInput(#[from] InvalidInputError),

    /// Volume allocation failed.
    #[error(transparent)]
    Allocation(#[from] AllocationError),

    /// A provisioning step after allocation failed.
    #[error(transparent)]
    Provisioning(#[from] ProvisioningError),

    /// Deleting a file share failed.
    #[error(transparent)]
    Deletion(#[from] DeletionError),

    /// Listing storage pools failed.
    #[error(transparent)]
    Inventory(#[from] InventoryError),

    /// A bug was encountered.
    #[error(transparent)]
    Internal(#[from] InternalError),
}

#[derive(Debug)]
struct FileShareErrorInner {
    kind: ErrorKind,
    location: &'static Location<'static>,
    source: Option<anyhow::Error>,
    context: Vec<(Cow<'static, str>, &'static Location<'static>)>,
}

pub struct FileShareError(Box<FileShareErrorInner>);
impl FileShareError {
    #[track_caller]
    pub fn new(kind: impl Into<ErrorKind>) -> Self {
        FileShareError(Box::new(FileShareErrorInner {
            kind: kind.into(),
            location: Location::caller(),
            source: None,
            context: Vec::new(),
        }))
    }

    #[track_caller]
    pub fn with_source(kind: impl Into<ErrorKind>, source: anyhow::Error) -> Self {
        FileShareError(Box::new(FileShareErrorInner {
            kind: kind.into(),
            location: Location::caller(),
            source: Some(source),
            context: Vec::new(),
        }))
    }

    /// Records `secondary`, raised while handling this error, without
    /// replacing this error's kind.
    #[track_caller]
    pub fn secondary_error_context(mut self, secondary: FileShareError) -> Self {
        let context = format!("While handling this error, another one occurred:\n\n{secondary:?}");
        self.0.context.push((context.into(), Location::caller()));
        self
    }

    /// Returns a reference to the inner ErrorKind.
    pub fn kind(&self) -> &ErrorKind {
        &self.0.kind
    }

    /// Returns the underlying cause, if any.
    pub fn source(&self) -> Option<&anyhow::Error> {
        self.0.source.as_ref()
    }
}

pub trait ReportError<T, K> {
    /// Convert this error into a structured FileShareError.
    fn structured(self, kind: K) -> Result<T, FileShareError>;
}

impl<T, K> ReportError<T, K> for Option<T>
where
    K: Into<ErrorKind>,
{
    #[track_caller]
    fn structured(self, kind: K) -> Result<T, FileShareError> {
        match self {
            Some(t) => Ok(t),
            None => Err(FileShareError::new(kind)),
        }
    }
}

impl<T, E, K> ReportError<T, K> for Result<T, E>
where
    E: Into<anyhow::Error>,
    K: Into<ErrorKind>,
{
    #[track_caller]
    fn structured(self, kind: K) -> Result<T, FileShareError> {
        match self {
            Ok(o) => Ok(o),
            Err(e) => Err(FileShareError::with_source(kind, e.into())),
        }
    }
}

pub trait FileShareResultExt<T> {
    /// Pushes a context message onto the error, recording where it was added.
    fn message(self, context: impl Into<Cow<'static, str>>) -> Result<T, FileShareError>;
}

impl<T> FileShareResultExt<T> for Result<T, FileShareError> {
    #[track_caller]
    fn message(mut self, context: impl Into<Cow<'static, str>>) -> Result<T, FileShareError> {
        if let Err(ref mut e) = self {
            e.0.context.push((context.into(), Location::caller()));
        }
        self
    }
}

impl Serialize for FileShareError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("fileshare-error", 5)?;
        state.serialize_field("message", &self.0.kind.to_string())?;
        match self.0.kind {
            ErrorKind::Initialization(ref e) => state.serialize_field("error", e)?,
            ErrorKind::InvalidInput(ref e) => state.serialize_field("error", e)?,
            ErrorKind::Allocation(ref e) => state.serialize_field("error", e)?,
            ErrorKind::Provisioning(ref e) => state.serialize_field("error", e)?,
            ErrorKind::Deletion(ref e) => state.serialize_field("error", e)?,
            ErrorKind::Inventory(ref e) => state.serialize_field("error", e)?,
            ErrorKind::Internal(ref e) => state.serialize_field("error", e)?,
        }
        state.serialize_field("category", <&str>::from(&self.0.kind))?;
        state.serialize_field(
            "location",
            &format!("{}:{}", self.0.location.file(), self.0.location.line()),
        )?;
        match self.0.source {
            Some(ref e) => state.serialize_field("cause", &Some(format!("{:?}", e)))?,
            None => state.serialize_field("cause", &None::<String>)?,
        }
        state.end()
    }
}

impl Debug for FileShareError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} at {}:{}",
            self.0.kind,
            self.0.location.file(),
            self.0.location.line()
        )?;

        if !self.0.context.is_empty() {
            writeln!(f, "\n\nContext:")?;
            for (i, (context, location)) in self.0.context.iter().enumerate() {
                for (j, line) in context.split('\n').enumerate() {
                    if j == 0 {
                        write!(f, "{: >5}: ", i)?;
                    } else {
                        f.write_str("\n       ")?;
                    }
                    f.write_str(line)?;
                }
                writeln!(f, " at {}:{}", location.file(), location.line())?;
            }
        }

        if let Some(ref source) = self.0.source {
            writeln!(f, "\n\nCaused by:")?;
            let mut index = 0;
            let mut source: Option<&dyn std::error::Error> = Some(source.as_ref());
            while let Some(e) = source {
                for (i, line) in e.to_string().split('\n').enumerate() {
                    if i == 0 {
                        write!(f, "{: >5}: ", index)?;
                    } else {
                        f.write_str("\n       ")?;
                    }
                    f.write_str(line)?;
                }
                f.write_char('\n')?;
                source = e.source();
                index += 1;
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for FileShareError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.kind)
    }
}
