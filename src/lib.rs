//! # simplefs
//!
//! An OS and architecture independent implementation of a classic Unix-style inode filesystem in Rust.
//!
//! ## Details
//!
//! This crate manages a flat namespace of anonymous files, identified by integer inode numbers, stored on a fixed-size block
//! device. It provides the on-disk layout, the mount-time integrity reconstruction and the block-addressed read/write engine with
//! direct and singly indirect allocation.
//!
//! The filesystem deliberately does **NOT** persist its free-block map: the map is derived state, rebuilt from the inode table on
//! every mount. This trades a linear scan at mount time for the absence of an entire class of coherence bugs between the free list
//! and the inode table. A mount that encounters an inode referencing a block outside the device fails outright and leaves the
//! device untouched.
//!
//! ### Devices
//!
//! In this crate, a [`Device`](crate::dev::Device) is a sized collection of 4 KiB blocks that can be read and written at any block
//! index. You can read the documentation in the [`dev`] module for more information on [`Device`](dev::Device)s and on how to
//! implement them.
//!
//! Two implementations are provided: [`MemoryDisk`](crate::dev::MemoryDisk) for volatile in-memory images, and (with the `std`
//! feature) [`FileDisk`](crate::dev::FileDisk) for images stored in a regular file.
//!
//! ### Filesystem interface
//!
//! The [`SimpleFs`](crate::fs::sfs::SimpleFs) structure is the entry point: [`format`](crate::fs::sfs::SimpleFs::format) prepares
//! a raw device, [`mount`](crate::fs::sfs::SimpleFs::mount) validates it and returns a handle, and the handle exposes
//! [`create`](crate::fs::sfs::SimpleFs::create), [`remove`](crate::fs::sfs::SimpleFs::remove),
//! [`stat`](crate::fs::sfs::SimpleFs::stat), [`read`](crate::fs::sfs::SimpleFs::read) and
//! [`write`](crate::fs::sfs::SimpleFs::write) on individual inodes.
//!
//! ### Concurrency
//!
//! A mounted handle exclusively owns the in-memory filesystem state. The device mount counter is advisory only: two handles
//! operating on the same device at the same time are forbidden by contract, and `mount` refuses a device that is already mounted.
//! Integration with a threaded system must serialize calls through an external lock around the whole handle.
//!
//! ### Example
//!
//! ```
//! use simplefs::dev::MemoryDisk;
//! use simplefs::fs::sfs::SimpleFs;
//!
//! let mut disk = MemoryDisk::new(20);
//! SimpleFs::format(&mut disk).unwrap();
//! let mut fs = SimpleFs::mount(disk).unwrap();
//!
//! let inumber = fs.create().unwrap();
//! assert_eq!(fs.write(inumber, b"hello world", 0).unwrap(), 11);
//! assert_eq!(fs.stat(inumber).unwrap(), 11);
//!
//! let mut buffer = [0_u8; 11];
//! assert_eq!(fs.read(inumber, &mut buffer, 0).unwrap(), 11);
//! assert_eq!(&buffer, b"hello world");
//!
//! fs.remove(inumber).unwrap();
//! fs.unmount();
//! ```

#![no_std]
#![allow(
    clippy::absolute_paths,
    clippy::arithmetic_side_effects,
    clippy::as_conversions,
    clippy::else_if_without_else,
    clippy::exhaustive_enums,
    clippy::exhaustive_structs,
    clippy::expect_used,
    clippy::implicit_return,
    clippy::integer_division,
    clippy::missing_trait_methods,
    clippy::mod_module_files,
    clippy::pattern_type_mismatch,
    clippy::pub_with_shorthand,
    clippy::question_mark_used,
    clippy::separated_literal_suffix,
    clippy::shadow_reuse,
    clippy::shadow_unrelated,
    clippy::unreachable,
    clippy::wildcard_in_or_patterns
)]
#![cfg_attr(
    test,
    allow(
        clippy::assertions_on_result_states,
        clippy::indexing_slicing,
        clippy::too_many_lines,
        clippy::unwrap_used,
        clippy::wildcard_imports
    )
)]

extern crate alloc;
#[cfg(any(feature = "std", test))]
extern crate std;

pub mod arch;
pub mod dev;
pub mod error;
pub mod fs;
