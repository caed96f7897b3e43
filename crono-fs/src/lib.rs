//! Filesystem abstraction for crono.
//!
//! This crate provides:
//! - Filesystem trait for the handful of operations a rotating writer needs
//! - OutputHandle trait for the currently open destination file
//! - RealFilesystem backed by `std::fs`
//! - MockFilesystem with failure injection for deterministic tests

pub mod filesystem;
pub mod mock;

pub use filesystem::{FileHandle, Filesystem, FsError, OutputHandle, RealFilesystem};
pub use mock::{FailPoint, MockFilesystem, MockHandle};
