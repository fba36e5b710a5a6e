//! Errors related to simplefs manipulation.

use derive_more::derive::Display;

use super::superblock::SIGNATURE;

/// Enumeration of possible errors encountered with simplefs' manipulation.
#[allow(clippy::module_name_repetitions)]
#[derive(Debug, PartialEq, Eq, Display)]
#[display("SimpleFS Error: {_variant}")]
pub enum SfsError {
    /// A bad magic number has been found during the superblock parsing.
    #[display("Bad Magic: {_0:#010x} has been found while {SIGNATURE:#010x} was expected")]
    BadMagic(u32),

    /// The superblock declares an inode block count that disagrees with the device geometry.
    #[display("Bad Inode Block Count: the superblock declares {found} inode blocks while the geometry expects {expected}")]
    BadInodeBlockCount {
        /// Inode block count found in the superblock.
        found: u32,

        /// Inode block count derived from the device size.
        expected: u32,
    },

    /// The superblock declares an inode count that disagrees with its own inode block count.
    #[display("Bad Inode Count: the superblock declares {found} inodes while its inode blocks hold {expected}")]
    BadInodeCount {
        /// Inode count found in the superblock.
        found: u32,

        /// Inode count derived from the inode block count.
        expected: u32,
    },

    /// An inode references a block which does not exist.
    #[display("Non Existing Block: a pointer references the block {_0} which does not exist")]
    NonExistingBlock(u32),

    /// Tried to access an inode number beyond the inode table.
    #[display("Non Existing Inode: tried to access the inode {_0} which does not exist")]
    NonExistingInode(u32),

    /// Tried to access an inode which is not in use.
    #[display("Free Inode: tried to access the inode {_0} which is not in use")]
    FreeInode(u32),

    /// Requested an inode while none is available.
    #[display("Not Enough Inodes: requested an inode but all inodes are in use")]
    NotEnoughInodes,

    /// Tried to address bytes beyond the maximal file size.
    #[display("File Too Large: tried to address {requested} bytes while a file holds at most {maximum}")]
    FileTooLarge {
        /// Requested extent in bytes (`offset + length`).
        requested: u64,

        /// Maximal addressable file size in bytes.
        maximum: u64,
    },
}

impl core::error::Error for SfsError {}
