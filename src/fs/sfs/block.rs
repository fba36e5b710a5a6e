//! Interface with simplefs' blocks.
//!
//! A [`Block`] is an owned [`BLOCK_SIZE`]-byte buffer with four interpretations: raw bytes, a [`Superblock`], a table of
//! [`INODES_PER_BLOCK`](super::inode::INODES_PER_BLOCK) [`Inode`]s, or a table of [`POINTERS_PER_BLOCK`] block pointers. The
//! typed views are accessor/mutator pairs copying `repr(C)` records in and out of the buffer: callers never hold a reference
//! aliasing the raw bytes under another type.
//!
//! Records are stored in the byte order of the host that formatted the image, as the format originates from raw in-memory
//! structures; moving an image between hosts of different endianness is not supported.

use core::mem::size_of;

use super::inode::{Inode, INODES_PER_BLOCK};
use super::superblock::Superblock;
use crate::dev::BLOCK_SIZE;

/// Number of block pointers stored in one indirect block.
pub const POINTERS_PER_BLOCK: usize = BLOCK_SIZE / size_of::<u32>();

/// An owned device block.
///
/// A fresh block is zeroed, which is also the representation of an inode table of unused inodes and of a pointer table with no
/// block attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Content of the block.
    data: [u8; BLOCK_SIZE],
}

impl Block {
    /// Creates a new zeroed [`Block`].
    #[must_use]
    pub const fn new() -> Self {
        Self { data: [0; BLOCK_SIZE] }
    }

    /// Returns the raw content of this block.
    #[must_use]
    pub const fn bytes(&self) -> &[u8; BLOCK_SIZE] {
        &self.data
    }

    /// Returns the raw content of this block, mutably.
    pub fn bytes_mut(&mut self) -> &mut [u8; BLOCK_SIZE] {
        &mut self.data
    }

    /// Copies the record of type `T` stored at the given byte offset out of this block.
    ///
    /// # Panics
    ///
    /// Panics if the record does not fit in the block at the given offset.
    fn record<T: Copy>(&self, offset: usize) -> T {
        assert!(offset + size_of::<T>() <= BLOCK_SIZE, "The record does not fit in the block at the given offset");
        // SAFETY: the assertion above guarantees that the record lies inside the buffer, and `T` is a plain `Copy` record read
        // without alignment requirement
        unsafe { self.data.as_ptr().add(offset).cast::<T>().read_unaligned() }
    }

    /// Copies the given record of type `T` into this block at the given byte offset.
    ///
    /// # Panics
    ///
    /// Panics if the record does not fit in the block at the given offset.
    fn set_record<T: Copy>(&mut self, offset: usize, record: &T) {
        assert!(offset + size_of::<T>() <= BLOCK_SIZE, "The record does not fit in the block at the given offset");
        // SAFETY: the assertion above guarantees that the record lies inside the buffer, and the write goes through a raw pointer
        // without alignment requirement
        unsafe { self.data.as_mut_ptr().add(offset).cast::<T>().write_unaligned(*record) };
    }

    /// Reads this block as a [`Superblock`].
    #[must_use]
    pub fn superblock(&self) -> Superblock {
        self.record(0)
    }

    /// Writes the given [`Superblock`] at the start of this block.
    pub fn set_superblock(&mut self, superblock: &Superblock) {
        self.set_record(0, superblock);
    }

    /// Reads the [`Inode`] stored at the given slot of this block.
    ///
    /// # Panics
    ///
    /// Panics if `slot` is not smaller than [`INODES_PER_BLOCK`].
    #[must_use]
    pub fn inode(&self, slot: usize) -> Inode {
        assert!(slot < INODES_PER_BLOCK, "The inode slot is out of the inode table");
        self.record(slot * size_of::<Inode>())
    }

    /// Writes the given [`Inode`] at the given slot of this block.
    ///
    /// # Panics
    ///
    /// Panics if `slot` is not smaller than [`INODES_PER_BLOCK`].
    pub fn set_inode(&mut self, slot: usize, inode: &Inode) {
        assert!(slot < INODES_PER_BLOCK, "The inode slot is out of the inode table");
        self.set_record(slot * size_of::<Inode>(), inode);
    }

    /// Reads the block pointer stored at the given slot of this block.
    ///
    /// # Panics
    ///
    /// Panics if `slot` is not smaller than [`POINTERS_PER_BLOCK`].
    #[must_use]
    pub fn pointer(&self, slot: usize) -> u32 {
        assert!(slot < POINTERS_PER_BLOCK, "The pointer slot is out of the pointer table");
        self.record(slot * size_of::<u32>())
    }

    /// Writes the given block pointer at the given slot of this block.
    ///
    /// # Panics
    ///
    /// Panics if `slot` is not smaller than [`POINTERS_PER_BLOCK`].
    pub fn set_pointer(&mut self, slot: usize, block: u32) {
        assert!(slot < POINTERS_PER_BLOCK, "The pointer slot is out of the pointer table");
        self.set_record(slot * size_of::<u32>(), &block);
    }
}

impl Default for Block {
    fn default() -> Self {
        Self::new()
    }
}
