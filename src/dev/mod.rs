//! Everything related to the devices.
//!
//! # Devices
//!
//! In this crate, a [`Device`] is a sized collection of contiguous [`BLOCK_SIZE`]-byte blocks. Blocks are read and written whole,
//! by index, through caller-provided buffers. A device also carries an advisory mount counter, incremented by
//! [`mount`](Device::mount) and decremented by [`unmount`](Device::unmount), which the filesystem uses to refuse formatting or
//! mounting a device that is already in use.
//!
//! ## How to implement a device?
//!
//! You need to provide six methods:
//!
//! * [`size`](Device::size) which returns the size of the device in blocks
//!
//! * [`read`](Device::read) which fills the given buffer with the content of one block
//!
//! * [`write`](Device::write) which overwrites one block with the given buffer
//!
//! * [`mount`](Device::mount), [`unmount`](Device::unmount) and [`is_mounted`](Device::is_mounted) which maintain the advisory
//!   mount counter
//!
//! Accessing a block index greater than or equal to [`size`](Device::size) must fail with a [`DevError::OutOfBounds`].
//!
//! Two implementations are provided: [`MemoryDisk`], backed by a heap allocation, and [`FileDisk`] (`std` feature only), backed
//! by a [`File`](std::fs::File).
//!
//! ```
//! use simplefs::dev::{Device, MemoryDisk, BLOCK_SIZE};
//!
//! let mut disk = MemoryDisk::new(16);
//! assert_eq!(Device::<std::io::Error>::size(&disk), 16);
//!
//! let mut buffer = [0_u8; BLOCK_SIZE];
//! buffer[0] = 42;
//! Device::<std::io::Error>::write(&mut disk, 3, &buffer).unwrap();
//!
//! let mut copy = [0_u8; BLOCK_SIZE];
//! Device::<std::io::Error>::read(&mut disk, 3, &mut copy).unwrap();
//! assert_eq!(buffer, copy);
//! ```

use alloc::vec::Vec;

#[cfg(feature = "std")]
use crate::arch::usize_to_u64;
use crate::arch::{u32_to_usize, usize_to_u32};
use crate::dev::error::DevError;
use crate::error::Error;

pub mod error;

/// Size of a device block in bytes.
pub const BLOCK_SIZE: usize = 4_096;

/// General interface for devices containing a file system.
pub trait Device<FSE: core::error::Error> {
    /// Returns the size of this device in blocks.
    fn size(&self) -> u32;

    /// Fills `buffer` with the content of the block at the given index.
    ///
    /// # Errors
    ///
    /// Returns a [`DevError::OutOfBounds`] if `block` is not smaller than [`size`](Device::size).
    ///
    /// Returns an [`Error::Device`] or an [`Error::IO`] if the read could not be completed.
    fn read(&mut self, block: u32, buffer: &mut [u8; BLOCK_SIZE]) -> Result<(), Error<FSE>>;

    /// Overwrites the block at the given index with `buffer`.
    ///
    /// # Errors
    ///
    /// Returns a [`DevError::OutOfBounds`] if `block` is not smaller than [`size`](Device::size).
    ///
    /// Returns an [`Error::Device`] or an [`Error::IO`] if the write could not be completed.
    fn write(&mut self, block: u32, buffer: &[u8; BLOCK_SIZE]) -> Result<(), Error<FSE>>;

    /// Increments the advisory mount counter.
    fn mount(&mut self);

    /// Decrements the advisory mount counter.
    ///
    /// Does nothing if the counter is already zero.
    fn unmount(&mut self);

    /// Returns whether the advisory mount counter is nonzero.
    fn is_mounted(&self) -> bool;
}

/// Checks that the given block index lies on a device of `total` blocks.
fn check_bounds<FSE: core::error::Error>(block: u32, total: u32) -> Result<(), Error<FSE>> {
    if block < total {
        Ok(())
    } else {
        Err(Error::Device(DevError::OutOfBounds { block, total }))
    }
}

/// A volatile device backed by a heap allocation.
///
/// Every block starts zeroed. The content is lost when the disk is dropped, which makes this device the natural choice for tests
/// and for `no_std` environments without stable storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryDisk {
    /// Backing storage, one entry per block.
    blocks: Vec<[u8; BLOCK_SIZE]>,

    /// Advisory mount counter.
    mounts: u32,
}

impl MemoryDisk {
    /// Creates a new zero-filled [`MemoryDisk`] with the given number of blocks.
    #[must_use]
    pub fn new(blocks: u32) -> Self {
        Self {
            blocks: alloc::vec![[0; BLOCK_SIZE]; u32_to_usize(blocks)],
            mounts: 0,
        }
    }
}

impl<FSE: core::error::Error> Device<FSE> for MemoryDisk {
    fn size(&self) -> u32 {
        usize_to_u32(self.blocks.len())
    }

    fn read(&mut self, block: u32, buffer: &mut [u8; BLOCK_SIZE]) -> Result<(), Error<FSE>> {
        check_bounds(block, Device::<FSE>::size(self))?;
        buffer.copy_from_slice(&self.blocks[u32_to_usize(block)]);
        Ok(())
    }

    fn write(&mut self, block: u32, buffer: &[u8; BLOCK_SIZE]) -> Result<(), Error<FSE>> {
        check_bounds(block, Device::<FSE>::size(self))?;
        self.blocks[u32_to_usize(block)].copy_from_slice(buffer);
        Ok(())
    }

    fn mount(&mut self) {
        self.mounts += 1;
    }

    fn unmount(&mut self) {
        self.mounts = self.mounts.saturating_sub(1);
    }

    fn is_mounted(&self) -> bool {
        self.mounts > 0
    }
}

/// A device backed by a [`File`](std::fs::File).
///
/// The file holds the raw image: block `n` lives at byte offset `n * BLOCK_SIZE`. The block count is fixed when the disk is
/// created and does not follow later changes of the file length.
#[cfg(feature = "std")]
#[derive(Debug)]
pub struct FileDisk {
    /// Backing image file.
    file: std::fs::File,

    /// Number of blocks of the image.
    blocks: u32,

    /// Advisory mount counter.
    mounts: u32,
}

#[cfg(feature = "std")]
impl FileDisk {
    /// Creates a new [`FileDisk`] over the given file, deriving the block count from the file length.
    ///
    /// Trailing bytes that do not fill a whole block are ignored.
    ///
    /// # Errors
    ///
    /// Returns an [`std::io::Error`] if the file metadata could not be read.
    pub fn new(file: std::fs::File) -> std::io::Result<Self> {
        let length = file.metadata()?.len();
        let blocks = u32::try_from(length / usize_to_u64(BLOCK_SIZE)).unwrap_or(u32::MAX);
        Ok(Self { file, blocks, mounts: 0 })
    }

    /// Creates a new [`FileDisk`] with exactly the given number of blocks, growing or truncating the file as needed.
    ///
    /// Grown regions read as zeroes.
    ///
    /// # Errors
    ///
    /// Returns an [`std::io::Error`] if the file length could not be changed.
    pub fn with_capacity(file: std::fs::File, blocks: u32) -> std::io::Result<Self> {
        file.set_len(u64::from(blocks) * usize_to_u64(BLOCK_SIZE))?;
        Ok(Self { file, blocks, mounts: 0 })
    }

    /// Returns the byte offset of the given block in the image file.
    const fn offset(block: u32) -> u64 {
        (block as u64) * (BLOCK_SIZE as u64)
    }
}

#[cfg(feature = "std")]
impl<FSE: core::error::Error> Device<FSE> for FileDisk {
    fn size(&self) -> u32 {
        self.blocks
    }

    fn read(&mut self, block: u32, buffer: &mut [u8; BLOCK_SIZE]) -> Result<(), Error<FSE>> {
        check_bounds(block, self.blocks)?;
        std::io::Seek::seek(&mut self.file, std::io::SeekFrom::Start(Self::offset(block)))?;
        std::io::Read::read_exact(&mut self.file, buffer)?;
        Ok(())
    }

    fn write(&mut self, block: u32, buffer: &[u8; BLOCK_SIZE]) -> Result<(), Error<FSE>> {
        check_bounds(block, self.blocks)?;
        std::io::Seek::seek(&mut self.file, std::io::SeekFrom::Start(Self::offset(block)))?;
        std::io::Write::write_all(&mut self.file, buffer)?;
        Ok(())
    }

    fn mount(&mut self) {
        self.mounts += 1;
    }

    fn unmount(&mut self) {
        self.mounts = self.mounts.saturating_sub(1);
    }

    fn is_mounted(&self) -> bool {
        self.mounts > 0
    }
}
