//! General interface for filesystems.
//!
//! # Filesystems
//!
//! A filesystem in this crate is a structure managing a complete on-disk layout on a given [`Device`](crate::dev::Device). It
//! validates the device content when it is attached, owns whatever in-memory state it derives from the disk, and exposes the
//! operations of its format.
//!
//! ## How to implement a filesystem?
//!
//! You can read the implementation of the `sfs` filesystem as an example, but here is a general layout of what you need to do:
//!
//! * create a core structure holding the device behind a cheaply clonable cell and the in-memory state of an attached
//!   filesystem
//!
//! * create an error structure, which implements [`core::error::Error`]. This will contain **every** error that your filesystem
//!   will be able to return, and travels inside [`FsError::Implementation`](error::FsError::Implementation)
//!
//! * create objects for every on-disk structure of your format, with a disciplined way to move them in and out of raw blocks
//!
//! * implement the attach path first (superblock validation, state reconstruction), then the read-only operations, then the
//!   write operations. The read-only ones are **MUCH** easier.

pub mod error;

#[cfg(feature = "sfs")]
pub mod sfs;
