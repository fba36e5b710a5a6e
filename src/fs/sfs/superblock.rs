//! Interface with simplefs' superblock.
//!
//! The superblock lives in block 0 and records the geometry of the filesystem: the total block count, the number of blocks
//! reserved for the inode table, and the resulting inode count. Both reserved counts are derived from the total block count, so a
//! well-formed superblock is fully determined by the device size; the derivation is re-checked on every mount.

use super::block::Block;
use super::error::SfsError;
use super::inode::INODES_PER_BLOCK;
use super::DeviceCell;
use crate::dev::Device;
use crate::error::Error;
use crate::fs::error::FsError;

/// Magic number identifying a simplefs image.
pub const SIGNATURE: u32 = 0xf0f0_3410;

/// Block index of the superblock.
pub const SUPERBLOCK_BLOCK: u32 = 0;

/// A simplefs superblock.
///
/// Only the first 16 bytes of block 0 are meaningful, the rest of the block is padding.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Superblock {
    /// Magic number, always [`SIGNATURE`] on a formatted device.
    pub magic: u32,

    /// Total number of blocks on the device.
    pub blocks: u32,

    /// Number of blocks reserved for the inode table, always a tenth of the device (rounded up).
    pub inode_blocks: u32,

    /// Total number of inode slots, always `inode_blocks * INODES_PER_BLOCK`.
    pub inodes: u32,
}

impl Superblock {
    /// Computes the superblock of a freshly formatted device with the given number of blocks.
    #[must_use]
    pub const fn new(blocks: u32) -> Self {
        let inode_blocks = blocks.div_ceil(10);
        Self {
            magic: SIGNATURE,
            blocks,
            inode_blocks,
            inodes: inode_blocks * INODES_PER_BLOCK as u32,
        }
    }

    /// Returns the index of the first block of the data region.
    #[must_use]
    pub const fn data_region_start(&self) -> u32 {
        self.inode_blocks + 1
    }

    /// Returns whether the given block index lies on the device.
    #[must_use]
    pub const fn contains(&self, block: u32) -> bool {
        block < self.blocks
    }

    /// Checks the magic number and the derived geometry of this superblock.
    ///
    /// # Errors
    ///
    /// Returns a [`BadMagic`](SfsError::BadMagic) if the magic number is not [`SIGNATURE`].
    ///
    /// Returns a [`BadInodeBlockCount`](SfsError::BadInodeBlockCount) or a [`BadInodeCount`](SfsError::BadInodeCount) if a
    /// reserved count does not match its derivation.
    pub const fn check(&self) -> Result<(), SfsError> {
        if self.magic != SIGNATURE {
            return Err(SfsError::BadMagic(self.magic));
        }
        let expected_inode_blocks = self.blocks.div_ceil(10);
        if self.inode_blocks != expected_inode_blocks {
            return Err(SfsError::BadInodeBlockCount {
                found: self.inode_blocks,
                expected: expected_inode_blocks,
            });
        }
        let expected_inodes = self.inode_blocks * INODES_PER_BLOCK as u32;
        if self.inodes != expected_inodes {
            return Err(SfsError::BadInodeCount {
                found: self.inodes,
                expected: expected_inodes,
            });
        }
        Ok(())
    }

    /// Parses the superblock from the given device and checks it.
    ///
    /// # Errors
    ///
    /// Returns an [`Error::Device`] if the device cannot be read.
    ///
    /// Otherwise, returns the same errors as [`check`](Superblock::check).
    pub fn parse<Dev: Device<SfsError>>(device: &DeviceCell<Dev>) -> Result<Self, Error<SfsError>> {
        let mut block = Block::new();
        device.lock().read(SUPERBLOCK_BLOCK, block.bytes_mut())?;
        let superblock = block.superblock();
        superblock.check().map_err(|err| Error::Fs(FsError::Implementation(err)))?;
        Ok(superblock)
    }
}
