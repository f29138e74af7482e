pub mod dependencies;
pub mod exe;
pub mod files;
pub mod lvm;
pub mod mkfs;
pub mod mount;
pub mod mountpoint;
pub mod udevadm;

#[cfg(any(test, feature = "test-utilities"))]
pub mod testutils;
