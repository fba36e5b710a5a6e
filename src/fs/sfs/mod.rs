//! # sfs
//!
//! Implementation of the simplefs filesystem: a classic Unix-style inode layout on a fixed-size block device.
//!
//! ## Description
//!
//! The simplefs structure is such like this:
//!
//! ```txt
//! +-------------+----------------------------+------------------------------------------+
//! |             |                            |                                          |
//! | Superblock  |        Inode table         |               Data region                |
//! |  (block 0)  |  (blocks 1..=inode_blocks, |  (data blocks, indirect pointer blocks)  |
//! |             |   128 inodes per block)    |                                          |
//! +-------------+----------------------------+------------------------------------------+
//! ```
//!
//! Important things to know about simplefs:
//!
//! - The [`Device`] is split in contiguous [`BLOCK_SIZE`]-byte blocks. The [superblock](Superblock) records the total block
//!   count and the size of the inode table, both derived from the device size at format time.
//!
//! - Each file is described by an [inode](Inode) holding its size, 5 direct block pointers and 1 singly indirect block pointer.
//!   Files are anonymous: there are no directories and no names, an inode number is the only handle on a file.
//!
//! - No free-block map is stored on disk. [`SimpleFs::mount`] rebuilds it by walking the inode table and marking every block
//!   reachable from a valid inode, and rejects the device if any pointer leaves it. The map lives as long as the mounted handle
//!   and is simply dropped on unmount.
//!
//! - A per-inode-block population count is rebuilt along the map. It lets [`create`](SimpleFs::create) skip full inode blocks
//!   and lets lookups reject inode numbers whose block holds no valid inode without reading the device.
//!
//! ## Concurrency
//!
//! A [`SimpleFs`] handle exclusively owns the derived state of one mounted filesystem. The device mount counter is advisory:
//! mounting an already mounted device fails, but nothing prevents an external program from writing to the backing storage. Wrap
//! the whole handle in a lock to share it between threads; individual operations are not safe to interleave.

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt::Write;

use itertools::Itertools;
use spin::{Mutex, MutexGuard};

use self::block::{Block, POINTERS_PER_BLOCK};
use self::error::SfsError;
use self::inode::{Inode, INODES_PER_BLOCK, MAX_FILE_SIZE, POINTERS_PER_INODE};
use self::superblock::{Superblock, SIGNATURE, SUPERBLOCK_BLOCK};
use crate::arch::{u32_to_usize, usize_to_u32, usize_to_u64};
use crate::dev::{Device, BLOCK_SIZE};
use crate::error::Error;
use crate::fs::error::FsError;

pub mod block;
pub mod error;
pub mod inode;
pub mod superblock;

/// Shared handle on the device carrying a filesystem.
///
/// Cloning is cheap: every clone points at the same device. Operations that only inspect the device, such as
/// [`SimpleFs::debug`] and [`Superblock::parse`], borrow the cell; [`SimpleFs::mount_cell`] keeps a clone inside the returned
/// handle and locks it for the duration of each block access.
#[derive(Debug)]
pub struct DeviceCell<Dev>(Arc<Mutex<Dev>>);

impl<Dev> Clone for DeviceCell<Dev> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<Dev> DeviceCell<Dev> {
    /// Wraps the given device in a new cell.
    pub fn new(device: Dev) -> Self {
        Self(Arc::new(Mutex::new(device)))
    }

    /// Locks the device for exclusive access.
    pub fn lock(&self) -> MutexGuard<'_, Dev> {
        self.0.lock()
    }
}

/// Position of a file's logical block in the inode addressing scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    /// Direct pointer at the given index of the inode.
    Direct(usize),

    /// Pointer at the given index of the singly indirect block.
    Indirect(usize),
}

/// Returns the addressing [`Slot`] covering the given byte position of a file.
const fn slot_of(position: usize) -> Slot {
    let logical = position / BLOCK_SIZE;
    if logical < POINTERS_PER_INODE {
        Slot::Direct(logical)
    } else {
        Slot::Indirect(logical - POINTERS_PER_INODE)
    }
}

/// Interface to manipulate a device containing a simplefs filesystem.
#[derive(Debug)]
pub struct SimpleFs<Dev: Device<SfsError>> {
    /// Device containing the filesystem.
    device: DeviceCell<Dev>,

    /// Superblock of the filesystem, validated at mount time.
    superblock: Superblock,

    /// Free-block map: `true` marks a block in use.
    ///
    /// Derived from the inode table at mount time, never persisted.
    block_bitmap: Vec<bool>,

    /// Number of valid inodes held by each inode block.
    inode_counts: Vec<u32>,
}

impl<Dev: Device<SfsError>> SimpleFs<Dev> {
    /// Formats the given device: writes a fresh superblock, an inode table of unused inodes, and a zeroed data region.
    ///
    /// Formatting is idempotent: two consecutive calls on an unmounted device leave a bit-identical image.
    ///
    /// # Errors
    ///
    /// Returns an [`FsError::AlreadyMounted`] if the device is currently mounted.
    ///
    /// Returns an [`Error::Device`] if the device cannot be written.
    pub fn format(device: &mut Dev) -> Result<(), Error<SfsError>> {
        if device.is_mounted() {
            return Err(Error::Fs(FsError::AlreadyMounted));
        }

        let superblock = Superblock::new(device.size());
        log::trace!(
            "format: {} blocks, {} inode blocks, {} inodes",
            superblock.blocks,
            superblock.inode_blocks,
            superblock.inodes
        );

        let mut block = Block::new();
        block.set_superblock(&superblock);
        device.write(SUPERBLOCK_BLOCK, block.bytes())?;

        let blank = Block::new();
        for index in 1..=superblock.inode_blocks {
            device.write(index, blank.bytes())?;
        }
        for index in superblock.data_region_start()..superblock.blocks {
            device.write(index, blank.bytes())?;
        }

        Ok(())
    }

    /// Mounts the filesystem contained on the given device.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`mount_cell`](SimpleFs::mount_cell).
    pub fn mount(device: Dev) -> Result<Self, Error<SfsError>> {
        Self::mount_cell(DeviceCell::new(device))
    }

    /// Mounts the filesystem contained on the given shared device.
    ///
    /// The superblock is validated, then the whole inode table is walked to rebuild the free-block map and the per-inode-block
    /// population counts. The device mount counter is only incremented once the walk has succeeded: a failed mount leaves the
    /// device exactly as it was.
    ///
    /// # Errors
    ///
    /// Returns an [`FsError::AlreadyMounted`] if the device is currently mounted.
    ///
    /// Returns a [`NonExistingBlock`](SfsError::NonExistingBlock) if a valid inode references a block outside the device.
    ///
    /// Returns an [`Error::Device`] if the device cannot be read.
    ///
    /// Otherwise, returns the same errors as [`Superblock::parse`].
    pub fn mount_cell(device: DeviceCell<Dev>) -> Result<Self, Error<SfsError>> {
        /// Marks the given pointer as in use, rejecting pointers outside the device.
        fn mark(superblock: &Superblock, bitmap: &mut [bool], pointer: u32) -> Result<(), Error<SfsError>> {
            if !superblock.contains(pointer) {
                return Err(Error::Fs(FsError::Implementation(SfsError::NonExistingBlock(pointer))));
            }
            bitmap[u32_to_usize(pointer)] = true;
            Ok(())
        }

        if device.lock().is_mounted() {
            return Err(Error::Fs(FsError::AlreadyMounted));
        }

        let superblock = Superblock::parse(&device)?;

        let mut block_bitmap = alloc::vec![false; u32_to_usize(superblock.blocks)];
        let mut inode_counts = alloc::vec![0_u32; u32_to_usize(superblock.inode_blocks)];

        // The superblock and the inode table are always in use.
        for index in 0..=superblock.inode_blocks {
            block_bitmap[u32_to_usize(index)] = true;
        }

        for index in 1..=superblock.inode_blocks {
            let mut table = Block::new();
            device.lock().read(index, table.bytes_mut())?;

            for slot in 0..INODES_PER_BLOCK {
                let inode = table.inode(slot);
                if !inode.is_valid() {
                    continue;
                }
                inode_counts[u32_to_usize(index - 1)] += 1;

                for pointer in inode.direct {
                    if pointer != 0 {
                        mark(&superblock, &mut block_bitmap, pointer)?;
                    }
                }

                if inode.indirect != 0 {
                    mark(&superblock, &mut block_bitmap, inode.indirect)?;

                    let mut indirect = Block::new();
                    device.lock().read(inode.indirect, indirect.bytes_mut())?;
                    for entry in 0..POINTERS_PER_BLOCK {
                        let pointer = indirect.pointer(entry);
                        if pointer != 0 {
                            mark(&superblock, &mut block_bitmap, pointer)?;
                        }
                    }
                }
            }
        }

        log::trace!(
            "mount: {} blocks ({} in use), {} live inodes",
            superblock.blocks,
            block_bitmap.iter().filter(|used| **used).count(),
            inode_counts.iter().sum::<u32>()
        );

        device.lock().mount();

        Ok(Self {
            device,
            superblock,
            block_bitmap,
            inode_counts,
        })
    }

    /// Unmounts the filesystem, dropping the derived state and returning the device cell.
    pub fn unmount(self) -> DeviceCell<Dev> {
        self.device.lock().unmount();
        self.device
    }

    /// Returns the [`Superblock`] of this filesystem.
    #[must_use]
    pub const fn superblock(&self) -> &Superblock {
        &self.superblock
    }

    /// Reads the block at the given index into an owned [`Block`].
    fn load_block(&self, index: u32) -> Result<Block, Error<SfsError>> {
        let mut block = Block::new();
        self.device.lock().read(index, block.bytes_mut())?;
        Ok(block)
    }

    /// Writes the given [`Block`] at the given index.
    fn store_block(&self, index: u32, block: &Block) -> Result<(), Error<SfsError>> {
        self.device.lock().write(index, block.bytes())
    }

    /// Returns the inode block index and the slot of the inode with the given number.
    ///
    /// # Errors
    ///
    /// Returns a [`NonExistingInode`](SfsError::NonExistingInode) if the number is beyond the inode table.
    fn locate(&self, inumber: u32) -> Result<(u32, usize), Error<SfsError>> {
        if inumber >= self.superblock.inodes {
            return Err(Error::Fs(FsError::Implementation(SfsError::NonExistingInode(inumber))));
        }
        Ok((Inode::containing_block(inumber), Inode::slot(inumber)))
    }

    /// Loads the inode with the given number, returning [`None`] when the slot is not in use.
    ///
    /// An inode block whose population count is zero is rejected without reading the device.
    fn load_inode(&self, inumber: u32) -> Result<Option<Inode>, Error<SfsError>> {
        let (index, slot) = self.locate(inumber)?;
        if self.inode_counts[u32_to_usize(index - 1)] == 0 {
            return Ok(None);
        }
        let table = self.load_block(index)?;
        let inode = table.inode(slot);
        Ok(inode.is_valid().then_some(inode))
    }

    /// Returns the [`Inode`] with the given number.
    ///
    /// The returned inode is a copy: changes to it do not reach the disk.
    ///
    /// # Errors
    ///
    /// Returns a [`NonExistingInode`](SfsError::NonExistingInode) if the number is beyond the inode table.
    ///
    /// Returns a [`FreeInode`](SfsError::FreeInode) if the slot is not in use.
    ///
    /// Returns an [`Error::Device`] if the device cannot be read.
    pub fn inode(&self, inumber: u32) -> Result<Inode, Error<SfsError>> {
        self.load_inode(inumber)?
            .ok_or(Error::Fs(FsError::Implementation(SfsError::FreeInode(inumber))))
    }

    /// Writes the given inode at the slot of the given number, through a read-modify-write of its inode block.
    fn store_inode(&self, inumber: u32, inode: &Inode) -> Result<(), Error<SfsError>> {
        let (index, slot) = self.locate(inumber)?;
        let mut table = self.load_block(index)?;
        table.set_inode(slot, inode);
        self.store_block(index, &table)
    }

    /// Creates a new empty inode and returns its number.
    ///
    /// The lowest free slot is claimed: inode blocks already holding [`INODES_PER_BLOCK`] valid inodes are skipped without
    /// reading the device.
    ///
    /// # Errors
    ///
    /// Returns a [`NotEnoughInodes`](SfsError::NotEnoughInodes) if every slot of the inode table is in use.
    ///
    /// Returns an [`Error::Device`] if the device cannot be read or written.
    pub fn create(&mut self) -> Result<u32, Error<SfsError>> {
        let full = usize_to_u32(INODES_PER_BLOCK);
        for index in 1..=self.superblock.inode_blocks {
            if self.inode_counts[u32_to_usize(index - 1)] == full {
                continue;
            }

            let mut table = self.load_block(index)?;
            for slot in 0..INODES_PER_BLOCK {
                if table.inode(slot).is_valid() {
                    continue;
                }
                table.set_inode(slot, &Inode::fresh());
                self.store_block(index, &table)?;

                self.inode_counts[u32_to_usize(index - 1)] += 1;
                self.block_bitmap[u32_to_usize(index)] = true;

                let inumber = (index - 1) * full + usize_to_u32(slot);
                log::trace!("create: inode {inumber}");
                return Ok(inumber);
            }
        }

        Err(Error::Fs(FsError::Implementation(SfsError::NotEnoughInodes)))
    }

    /// Removes the inode with the given number, releasing every block it owns.
    ///
    /// The population count of its inode block is decremented, and the free-block map forgets the inode block when the count
    /// reaches zero, then every data block and the indirect block attached to the inode. The slot itself is zeroed on disk.
    ///
    /// # Errors
    ///
    /// Returns an [`Error::Device`] if the device cannot be read or written.
    ///
    /// Otherwise, returns the same errors as [`inode`](SimpleFs::inode).
    pub fn remove(&mut self, inumber: u32) -> Result<(), Error<SfsError>> {
        let inode = self.inode(inumber)?;
        let (index, slot) = self.locate(inumber)?;

        let count = &mut self.inode_counts[u32_to_usize(index - 1)];
        *count -= 1;
        if *count == 0 {
            self.block_bitmap[u32_to_usize(index)] = false;
        }

        for pointer in inode.direct {
            if pointer != 0 {
                self.block_bitmap[u32_to_usize(pointer)] = false;
            }
        }

        if inode.indirect != 0 {
            self.block_bitmap[u32_to_usize(inode.indirect)] = false;

            let indirect = self.load_block(inode.indirect)?;
            for entry in 0..POINTERS_PER_BLOCK {
                let pointer = indirect.pointer(entry);
                if pointer != 0 {
                    self.block_bitmap[u32_to_usize(pointer)] = false;
                }
            }
        }

        let mut table = self.load_block(index)?;
        table.set_inode(slot, &Inode::blank());
        self.store_block(index, &table)?;

        log::trace!("remove: inode {inumber}");
        Ok(())
    }

    /// Returns the size in bytes of the inode with the given number.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`inode`](SimpleFs::inode).
    pub fn stat(&self, inumber: u32) -> Result<u32, Error<SfsError>> {
        Ok(self.inode(inumber)?.size)
    }

    /// Reads from the inode with the given number, starting at the byte `offset`, into `buffer`. Returns the number of bytes
    /// read.
    ///
    /// The requested length is clamped to the inode size: reading at an offset past the end returns 0. A hole (a zero pointer
    /// inside the sized region) stops the read, which returns the bytes produced so far.
    ///
    /// # Errors
    ///
    /// Returns an [`Error::Device`] if the device cannot be read.
    ///
    /// Otherwise, returns the same errors as [`inode`](SimpleFs::inode).
    pub fn read(&self, inumber: u32, buffer: &mut [u8], offset: u32) -> Result<usize, Error<SfsError>> {
        let inode = self.inode(inumber)?;
        let size = u32_to_usize(inode.size);
        let start = u32_to_usize(offset);

        if start >= size {
            return Ok(0);
        }
        let length = buffer.len().min(size - start);

        let mut indirect = None;
        let mut read_bytes = 0_usize;

        while read_bytes < length {
            let position = start + read_bytes;
            let pointer = match slot_of(position) {
                Slot::Direct(slot) => inode.direct[slot],
                Slot::Indirect(slot) => {
                    if inode.indirect == 0 {
                        break;
                    }
                    if indirect.is_none() {
                        indirect = Some(self.load_block(inode.indirect)?);
                    }
                    indirect.as_ref().map_or(0, |table: &Block| table.pointer(slot))
                },
            };
            if pointer == 0 {
                break;
            }

            let data = self.load_block(pointer)?;
            let intra = position % BLOCK_SIZE;
            let count = (BLOCK_SIZE - intra).min(length - read_bytes);
            buffer[read_bytes..read_bytes + count].copy_from_slice(&data.bytes()[intra..intra + count]);
            read_bytes += count;
        }

        Ok(read_bytes)
    }

    /// Writes `buffer` into the inode with the given number, starting at the byte `offset`. Returns the number of bytes
    /// written.
    ///
    /// Data blocks (and the indirect block, when the write crosses into the indirect region) are allocated on demand. Running
    /// out of free blocks is not an error: the write stops, the inode is persisted with a size covering exactly the bytes that
    /// reached the disk, and the short count is returned.
    ///
    /// Writing at the number of a free inode slot claims it, so a file can be written without a prior
    /// [`create`](SimpleFs::create).
    ///
    /// # Errors
    ///
    /// Returns a [`FileTooLarge`](SfsError::FileTooLarge) if `offset + buffer.len()` exceeds the maximal file size.
    ///
    /// Returns a [`NonExistingInode`](SfsError::NonExistingInode) if the number is beyond the inode table.
    ///
    /// Returns an [`Error::Device`] if the device cannot be read or written.
    pub fn write(&mut self, inumber: u32, buffer: &[u8], offset: u32) -> Result<usize, Error<SfsError>> {
        let start = u32_to_usize(offset);
        let length = buffer.len();
        if start + length > MAX_FILE_SIZE {
            return Err(Error::Fs(FsError::Implementation(SfsError::FileTooLarge {
                requested: usize_to_u64(start + length),
                maximum: usize_to_u64(MAX_FILE_SIZE),
            })));
        }

        let (index, _) = self.locate(inumber)?;
        let (mut inode, prior_size) = match self.load_inode(inumber)? {
            Some(inode) => {
                let size = inode.size;
                (inode, size)
            },
            None => {
                // A write to a free slot claims it.
                self.inode_counts[u32_to_usize(index - 1)] += 1;
                self.block_bitmap[u32_to_usize(index)] = true;
                (Inode::fresh(), 0)
            },
        };

        let mut indirect: Option<Block> = None;
        let mut indirect_dirty = false;
        let mut written = 0_usize;

        while written < length {
            let position = start + written;
            let (pointer, fresh) = match slot_of(position) {
                Slot::Direct(slot) => {
                    if inode.direct[slot] == 0 {
                        let Some(block) = self.allocate_block() else { break };
                        inode.direct[slot] = block;
                        (block, true)
                    } else {
                        (inode.direct[slot], false)
                    }
                },
                Slot::Indirect(slot) => {
                    // The pointer table itself comes first.
                    if inode.indirect == 0 {
                        let Some(block) = self.allocate_block() else { break };
                        inode.indirect = block;
                        indirect = Some(Block::new());
                        indirect_dirty = true;
                    } else if indirect.is_none() {
                        indirect = Some(self.load_block(inode.indirect)?);
                    }

                    let pointer = indirect.as_ref().map_or(0, |table| table.pointer(slot));
                    if pointer == 0 {
                        let Some(block) = self.allocate_block() else { break };
                        if let Some(table) = indirect.as_mut() {
                            table.set_pointer(slot, block);
                        }
                        indirect_dirty = true;
                        (block, true)
                    } else {
                        (pointer, false)
                    }
                },
            };

            let intra = position % BLOCK_SIZE;
            let count = (BLOCK_SIZE - intra).min(length - written);
            let mut data = if fresh || count == BLOCK_SIZE {
                Block::new()
            } else {
                // Preserve the bytes of the block outside the written range.
                self.load_block(pointer)?
            };
            data.bytes_mut()[intra..intra + count].copy_from_slice(&buffer[written..written + count]);
            self.store_block(pointer, &data)?;
            written += count;
        }

        // Every exit commits the pointer table in one write, then the inode.
        if indirect_dirty {
            if let Some(table) = indirect.as_ref() {
                self.store_block(inode.indirect, table)?;
            }
        }
        inode.size = prior_size.max(offset + usize_to_u32(written));
        self.store_inode(inumber, &inode)?;

        if written < length {
            log::trace!("write: data blocks exhausted after {written} of {length} bytes on inode {inumber}");
        }
        Ok(written)
    }

    /// Claims the lowest-indexed free block of the data region, or returns [`None`] when none is left.
    fn allocate_block(&mut self) -> Option<u32> {
        let start = u32_to_usize(self.superblock.data_region_start());
        let end = u32_to_usize(self.superblock.blocks);
        match self.block_bitmap[start..end].iter().position(|used| !*used) {
            Some(found) => {
                let index = start + found;
                self.block_bitmap[index] = true;
                Some(usize_to_u32(index))
            },
            None => {
                log::trace!("allocate: no free data block left");
                None
            },
        }
    }

    /// Renders a report of the filesystem contained on the given device: the superblock geometry, then the size and the block
    /// pointers of every valid inode.
    ///
    /// The device does not need to be mounted. Geometry declarations that disagree with their derivation are reported through
    /// [`log::warn!`] and do not appear in the report.
    ///
    /// # Errors
    ///
    /// Returns a [`BadMagic`](SfsError::BadMagic) if the superblock magic number is wrong.
    ///
    /// Returns an [`Error::Device`] if the device cannot be read.
    pub fn debug(device: &DeviceCell<Dev>) -> Result<String, Error<SfsError>> {
        let mut block = Block::new();
        device.lock().read(SUPERBLOCK_BLOCK, block.bytes_mut())?;
        let superblock = block.superblock();

        if superblock.magic != SIGNATURE {
            return Err(Error::Fs(FsError::Implementation(SfsError::BadMagic(superblock.magic))));
        }

        let mut report = String::new();
        let _ = writeln!(report, "SuperBlock:");
        let _ = writeln!(report, "    magic number is valid");
        let _ = writeln!(report, "    {} blocks", superblock.blocks);
        let _ = writeln!(report, "    {} inode blocks", superblock.inode_blocks);
        let _ = writeln!(report, "    {} inodes", superblock.inodes);

        let expected_inode_blocks = superblock.blocks.div_ceil(10);
        if superblock.inode_blocks != expected_inode_blocks {
            log::warn!(
                "the superblock declares {} inode blocks while {expected_inode_blocks} were expected",
                superblock.inode_blocks
            );
        }
        let expected_inodes = superblock.inode_blocks * usize_to_u32(INODES_PER_BLOCK);
        if superblock.inodes != expected_inodes {
            log::warn!("the superblock declares {} inodes while {expected_inodes} were expected", superblock.inodes);
        }

        for index in 1..=superblock.inode_blocks {
            let mut table = Block::new();
            device.lock().read(index, table.bytes_mut())?;

            for slot in 0..INODES_PER_BLOCK {
                let inode = table.inode(slot);
                if !inode.is_valid() {
                    continue;
                }

                let inumber = u32_to_usize(index - 1) * INODES_PER_BLOCK + slot;
                let _ = writeln!(report, "Inode {inumber}:");
                let _ = writeln!(report, "    size: {} bytes", inode.size);

                let direct = inode.direct.iter().filter(|pointer| **pointer != 0).map(|pointer| alloc::format!(" {pointer}")).join("");
                let _ = writeln!(report, "    direct blocks:{direct}");

                if inode.indirect != 0 {
                    let _ = writeln!(report, "    indirect block: {}", inode.indirect);

                    let mut indirect = Block::new();
                    device.lock().read(inode.indirect, indirect.bytes_mut())?;
                    let entries = (0..POINTERS_PER_BLOCK)
                        .map(|entry| indirect.pointer(entry))
                        .filter(|pointer| *pointer != 0)
                        .map(|pointer| alloc::format!(" {pointer}"))
                        .join("");
                    let _ = writeln!(report, "    indirect data blocks:{entries}");
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod test {
    use alloc::vec::Vec;

    use itertools::Itertools;

    use super::block::Block;
    use super::error::SfsError;
    use super::inode::MAX_FILE_SIZE;
    use super::{slot_of, DeviceCell, SimpleFs, Slot};
    use crate::arch::usize_to_u32;
    use crate::dev::{Device, MemoryDisk, BLOCK_SIZE};
    use crate::error::Error;
    use crate::fs::error::FsError;
    use crate::fs::sfs::inode::Inode;
    use crate::tests::scratch_disk;

    /// Returns a freshly formatted and mounted 20-block filesystem.
    fn mounted(blocks: u32) -> SimpleFs<MemoryDisk> {
        let mut disk = scratch_disk(blocks);
        SimpleFs::format(&mut disk).unwrap();
        SimpleFs::mount(disk).unwrap()
    }

    /// Returns a deterministic byte pattern of the given length.
    fn pattern(length: usize) -> Vec<u8> {
        (0..length).map(|index| (index % 251) as u8).collect()
    }

    #[test]
    fn addressing() {
        assert_eq!(slot_of(0), Slot::Direct(0));
        assert_eq!(slot_of(BLOCK_SIZE - 1), Slot::Direct(0));
        assert_eq!(slot_of(BLOCK_SIZE), Slot::Direct(1));
        assert_eq!(slot_of(5 * BLOCK_SIZE - 1), Slot::Direct(4));
        assert_eq!(slot_of(5 * BLOCK_SIZE), Slot::Indirect(0));
        assert_eq!(slot_of(MAX_FILE_SIZE - 1), Slot::Indirect(1_023));
    }

    #[test]
    fn format_then_debug() {
        let mut disk = scratch_disk(20);
        SimpleFs::format(&mut disk).unwrap();

        let report = SimpleFs::debug(&DeviceCell::new(disk)).unwrap();
        assert_eq!(
            report,
            "SuperBlock:\n    magic number is valid\n    20 blocks\n    2 inode blocks\n    256 inodes\n"
        );
    }

    #[test]
    fn format_is_idempotent() {
        fn snapshot(disk: &mut MemoryDisk) -> Vec<Block> {
            (0_u32..20)
                .map(|index| {
                    let mut block = Block::new();
                    Device::<SfsError>::read(disk, index, block.bytes_mut()).unwrap();
                    block
                })
                .collect()
        }

        let mut disk = scratch_disk(20);
        SimpleFs::format(&mut disk).unwrap();
        let first = snapshot(&mut disk);
        SimpleFs::format(&mut disk).unwrap();
        let second = snapshot(&mut disk);

        assert!(first.iter().zip_eq(second.iter()).all(|(before, after)| before == after));
    }

    #[test]
    fn format_refuses_mounted_device() {
        let fs = mounted(20);
        let result = SimpleFs::format(&mut *fs.device.lock());
        assert!(matches!(result, Err(Error::Fs(FsError::AlreadyMounted))));
    }

    #[test]
    fn mount_refuses_mounted_device() {
        let fs = mounted(20);
        let result = SimpleFs::mount_cell(fs.device.clone());
        assert!(matches!(result, Err(Error::Fs(FsError::AlreadyMounted))));
    }

    #[test]
    fn mount_rejects_bad_magic() {
        let mut disk = scratch_disk(20);
        SimpleFs::format(&mut disk).unwrap();

        let mut block = Block::new();
        Device::<SfsError>::read(&mut disk, 0, block.bytes_mut()).unwrap();
        let mut superblock = block.superblock();
        superblock.magic = 0x0bad_f00d;
        block.set_superblock(&superblock);
        Device::<SfsError>::write(&mut disk, 0, block.bytes()).unwrap();

        let cell = DeviceCell::new(disk);
        let result = SimpleFs::mount_cell(cell.clone());
        assert!(matches!(
            result,
            Err(Error::Fs(FsError::Implementation(SfsError::BadMagic(0x0bad_f00d))))
        ));
        // A failed mount leaves the device mount counter untouched.
        assert!(!Device::<SfsError>::is_mounted(&*cell.lock()));
    }

    #[test]
    fn mount_rejects_out_of_range_pointer() {
        let mut disk = scratch_disk(20);
        SimpleFs::format(&mut disk).unwrap();

        let mut table = Block::new();
        Device::<SfsError>::read(&mut disk, 1, table.bytes_mut()).unwrap();
        let mut inode = Inode::fresh();
        inode.direct[0] = 20;
        table.set_inode(0, &inode);
        Device::<SfsError>::write(&mut disk, 1, table.bytes()).unwrap();

        let cell = DeviceCell::new(disk);
        let result = SimpleFs::mount_cell(cell.clone());
        assert!(matches!(
            result,
            Err(Error::Fs(FsError::Implementation(SfsError::NonExistingBlock(20))))
        ));
        assert!(!Device::<SfsError>::is_mounted(&*cell.lock()));
    }

    #[test]
    fn mount_rejects_out_of_range_indirect_entry() {
        let mut disk = scratch_disk(20);
        SimpleFs::format(&mut disk).unwrap();

        let mut indirect = Block::new();
        indirect.set_pointer(3, 500);
        Device::<SfsError>::write(&mut disk, 4, indirect.bytes()).unwrap();

        let mut table = Block::new();
        Device::<SfsError>::read(&mut disk, 1, table.bytes_mut()).unwrap();
        let mut inode = Inode::fresh();
        inode.indirect = 4;
        table.set_inode(0, &inode);
        Device::<SfsError>::write(&mut disk, 1, table.bytes()).unwrap();

        let result = SimpleFs::mount(disk);
        assert!(matches!(
            result,
            Err(Error::Fs(FsError::Implementation(SfsError::NonExistingBlock(500))))
        ));
    }

    #[test]
    fn create_stat_remove() {
        let mut fs = mounted(20);

        let inumber = fs.create().unwrap();
        assert_eq!(inumber, 0);
        assert_eq!(fs.stat(0).unwrap(), 0);

        fs.remove(0).unwrap();
        assert!(matches!(
            fs.stat(0),
            Err(Error::Fs(FsError::Implementation(SfsError::FreeInode(0))))
        ));
        assert!(matches!(
            fs.remove(0),
            Err(Error::Fs(FsError::Implementation(SfsError::FreeInode(0))))
        ));
    }

    #[test]
    fn create_fills_lowest_slots() {
        let mut fs = mounted(20);
        for expected in 0_u32..10 {
            assert_eq!(fs.create().unwrap(), expected);
        }
        fs.remove(4).unwrap();
        fs.remove(7).unwrap();
        assert_eq!(fs.create().unwrap(), 4);
        assert_eq!(fs.create().unwrap(), 7);
        assert_eq!(fs.create().unwrap(), 10);
    }

    #[test]
    fn remove_then_create_reuses_inumber() {
        let mut fs = mounted(20);
        let inumber = fs.create().unwrap();
        fs.write(inumber, &pattern(10_000), 0).unwrap();
        fs.remove(inumber).unwrap();
        assert_eq!(fs.create().unwrap(), inumber);
    }

    #[test]
    fn small_write_read() {
        let mut fs = mounted(20);
        let inumber = fs.create().unwrap();

        assert_eq!(fs.write(inumber, b"hello", 0).unwrap(), 5);
        assert_eq!(fs.stat(inumber).unwrap(), 5);

        let mut buffer = [0_u8; 5];
        assert_eq!(fs.read(inumber, &mut buffer, 0).unwrap(), 5);
        assert_eq!(&buffer, b"hello");

        let report = SimpleFs::debug(&fs.device).unwrap();
        assert_eq!(
            report,
            "SuperBlock:\n    magic number is valid\n    20 blocks\n    2 inode blocks\n    256 inodes\n\
             Inode 0:\n    size: 5 bytes\n    direct blocks: 3\n"
        );
    }

    #[test]
    fn write_across_direct_blocks() {
        let mut fs = mounted(20);
        let inumber = fs.create().unwrap();
        let data = pattern(5_000);

        assert_eq!(fs.write(inumber, &data, 0).unwrap(), 5_000);
        assert_eq!(fs.stat(inumber).unwrap(), 5_000);

        let mut buffer = alloc::vec![0_u8; 5_000];
        assert_eq!(fs.read(inumber, &mut buffer, 0).unwrap(), 5_000);
        assert_eq!(buffer, data);

        let inode = fs.inode(inumber).unwrap();
        assert_eq!(inode.direct, [3, 4, 0, 0, 0]);
        assert_eq!(inode.indirect, 0);
    }

    #[test]
    fn write_into_indirect_region() {
        let mut fs = mounted(20);
        let inumber = fs.create().unwrap();
        let data = pattern(BLOCK_SIZE);
        let offset = usize_to_u32(5 * BLOCK_SIZE);

        assert_eq!(fs.write(inumber, &data, offset).unwrap(), BLOCK_SIZE);
        assert_eq!(fs.stat(inumber).unwrap(), 24_576);

        let mut buffer = alloc::vec![0_u8; BLOCK_SIZE];
        assert_eq!(fs.read(inumber, &mut buffer, offset).unwrap(), BLOCK_SIZE);
        assert_eq!(buffer, data);

        // The pointer table was allocated first, then the single data block.
        let inode = fs.inode(inumber).unwrap();
        assert_eq!(inode.direct, [0; 5]);
        assert_eq!(inode.indirect, 3);
        let table = fs.load_block(inode.indirect).unwrap();
        assert_eq!(table.pointer(0), 4);
        assert_eq!((0..1_024).filter(|entry| table.pointer(*entry) != 0).count(), 1);

        // The direct region is a hole: reading it produces nothing.
        assert_eq!(fs.read(inumber, &mut buffer, 0).unwrap(), 0);

        let report = SimpleFs::debug(&fs.device).unwrap();
        assert!(report.contains(
            "Inode 0:\n    size: 24576 bytes\n    direct blocks:\n    indirect block: 3\n    indirect data blocks: 4\n"
        ));
    }

    #[test]
    fn write_spanning_direct_and_indirect() {
        let mut fs = mounted(40);
        let inumber = fs.create().unwrap();
        let data = pattern(8 * BLOCK_SIZE + 123);

        assert_eq!(fs.write(inumber, &data, 0).unwrap(), data.len());
        assert_eq!(fs.stat(inumber).unwrap(), usize_to_u32(data.len()));

        let mut buffer = alloc::vec![0_u8; data.len()];
        assert_eq!(fs.read(inumber, &mut buffer, 0).unwrap(), data.len());
        assert_eq!(buffer, data);

        let inode = fs.inode(inumber).unwrap();
        assert!(inode.direct.iter().all(|pointer| *pointer != 0));
        assert_ne!(inode.indirect, 0);
    }

    #[test]
    fn allocator_exhaustion_exact_fit() {
        // 20 blocks: 1 superblock + 2 inode blocks + 17 in the data region. A 16-block file needs
        // 5 direct + 1 pointer table + 11 indirect data blocks, exactly 17.
        let mut fs = mounted(20);
        let inumber = fs.create().unwrap();
        let data = pattern(16 * BLOCK_SIZE);

        assert_eq!(fs.write(inumber, &data, 0).unwrap(), data.len());
        assert_eq!(fs.stat(inumber).unwrap(), usize_to_u32(data.len()));

        let mut buffer = alloc::vec![0_u8; data.len()];
        assert_eq!(fs.read(inumber, &mut buffer, 0).unwrap(), data.len());
        assert_eq!(buffer, data);

        // The device is full: one more byte on a new inode is a zero-byte write, not an error.
        let next = fs.create().unwrap();
        assert_eq!(fs.write(next, b"x", 0).unwrap(), 0);
        assert_eq!(fs.stat(next).unwrap(), 0);
    }

    #[test]
    fn allocator_exhaustion_truncates() {
        let mut fs = mounted(20);
        let inumber = fs.create().unwrap();
        let data = pattern(18 * BLOCK_SIZE);

        // Only 16 data blocks fit next to the pointer table.
        assert_eq!(fs.write(inumber, &data, 0).unwrap(), 16 * BLOCK_SIZE);
        assert_eq!(fs.stat(inumber).unwrap(), usize_to_u32(16 * BLOCK_SIZE));

        let mut buffer = alloc::vec![0_u8; 16 * BLOCK_SIZE];
        assert_eq!(fs.read(inumber, &mut buffer, 0).unwrap(), 16 * BLOCK_SIZE);
        assert_eq!(buffer, data[..16 * BLOCK_SIZE]);

        // Removing the file releases every block, direct and indirect.
        fs.remove(inumber).unwrap();
        let inumber = fs.create().unwrap();
        assert_eq!(fs.write(inumber, &data[..16 * BLOCK_SIZE], 0).unwrap(), 16 * BLOCK_SIZE);
    }

    #[test]
    fn overwrite_preserves_neighbors() {
        let mut fs = mounted(20);
        let inumber = fs.create().unwrap();
        let data = pattern(5_000);

        assert_eq!(fs.write(inumber, &data, 0).unwrap(), 5_000);
        assert_eq!(fs.write(inumber, b"WORLD", 100).unwrap(), 5);
        // A short overwrite does not shrink the file.
        assert_eq!(fs.stat(inumber).unwrap(), 5_000);

        let mut expected = data;
        expected[100..105].copy_from_slice(b"WORLD");
        let mut buffer = alloc::vec![0_u8; 5_000];
        assert_eq!(fs.read(inumber, &mut buffer, 0).unwrap(), 5_000);
        assert_eq!(buffer, expected);
    }

    #[test]
    fn read_clamps_to_size() {
        let mut fs = mounted(20);
        let inumber = fs.create().unwrap();
        let data = pattern(5_000);
        fs.write(inumber, &data, 0).unwrap();

        let mut buffer = [0_u8; 100];
        assert_eq!(fs.read(inumber, &mut buffer, 4_990).unwrap(), 10);
        assert_eq!(buffer[..10], data[4_990..]);

        assert_eq!(fs.read(inumber, &mut buffer, 5_000).unwrap(), 0);
        assert_eq!(fs.read(inumber, &mut buffer, 60_000).unwrap(), 0);
    }

    #[test]
    fn write_claims_free_slot() {
        let mut fs = mounted(20);
        assert_eq!(fs.write(7, b"anonymous", 0).unwrap(), 9);
        assert_eq!(fs.stat(7).unwrap(), 9);

        // The claimed slot does not disturb the creation order.
        assert_eq!(fs.create().unwrap(), 0);
    }

    #[test]
    fn write_beyond_max_file_size() {
        let mut fs = mounted(20);
        fs.create().unwrap();
        let result = fs.write(0, b"x", usize_to_u32(MAX_FILE_SIZE));
        assert!(matches!(
            result,
            Err(Error::Fs(FsError::Implementation(SfsError::FileTooLarge { .. })))
        ));
    }

    #[test]
    fn operations_reject_bad_inumbers() {
        let mut fs = mounted(20);
        assert!(matches!(
            fs.stat(256),
            Err(Error::Fs(FsError::Implementation(SfsError::NonExistingInode(256))))
        ));
        assert!(matches!(
            fs.read(256, &mut [0; 8], 0),
            Err(Error::Fs(FsError::Implementation(SfsError::NonExistingInode(256))))
        ));
        assert!(matches!(
            fs.write(256, b"x", 0),
            Err(Error::Fs(FsError::Implementation(SfsError::NonExistingInode(256))))
        ));
        assert!(matches!(
            fs.remove(256),
            Err(Error::Fs(FsError::Implementation(SfsError::NonExistingInode(256))))
        ));
        assert!(matches!(
            fs.stat(5),
            Err(Error::Fs(FsError::Implementation(SfsError::FreeInode(5))))
        ));
    }

    #[test]
    fn derived_state_survives_remount() {
        let mut fs = mounted(20);
        let first = fs.create().unwrap();
        fs.write(first, &pattern(6_000), 0).unwrap();
        let second = fs.create().unwrap();
        fs.write(second, &pattern(2 * BLOCK_SIZE), usize_to_u32(5 * BLOCK_SIZE)).unwrap();
        fs.remove(first).unwrap();

        let bitmap = fs.block_bitmap.clone();
        let counts = fs.inode_counts.clone();

        let cell = fs.unmount();
        assert!(!Device::<SfsError>::is_mounted(&*cell.lock()));
        let fs = SimpleFs::mount_cell(cell).unwrap();

        // The free-block map and the population counts are derived: a remount rebuilds them identically.
        assert_eq!(fs.block_bitmap, bitmap);
        assert_eq!(fs.inode_counts, counts);
        assert_eq!(fs.stat(second).unwrap(), usize_to_u32(7 * BLOCK_SIZE));
    }

    #[cfg(feature = "std")]
    #[test]
    fn file_backed_filesystem() {
        let mut disk = crate::tests::scratch_file_disk(20);
        SimpleFs::format(&mut disk).unwrap();
        let mut fs = SimpleFs::mount(disk).unwrap();

        let inumber = fs.create().unwrap();
        let data = pattern(10_000);
        assert_eq!(fs.write(inumber, &data, 0).unwrap(), 10_000);

        let mut buffer = alloc::vec![0_u8; 10_000];
        assert_eq!(fs.read(inumber, &mut buffer, 0).unwrap(), 10_000);
        assert_eq!(buffer, data);

        fs.unmount();
    }
}
