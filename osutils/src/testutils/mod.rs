pub mod fake_lvm;
