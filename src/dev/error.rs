//! Errors related to device manipulation.

use derive_more::derive::{Display, Error};

/// Enumeration of possible errors encountered with device's manipulation.
#[allow(clippy::module_name_repetitions)]
#[derive(Debug, PartialEq, Eq, Display, Error)]
#[display("Device Error: {_variant}")]
pub enum DevError {
    /// Tried to access a block outside the device.
    #[display("Out of Bounds: tried to access the block {block} on a device of {total} blocks")]
    OutOfBounds {
        /// Requested block index.
        block: u32,

        /// Number of blocks on the device.
        total: u32,
    },

    /// An error returned when an operation could not be completed because an "end of file" was reached prematurely.
    ///
    /// This typically means that the backing storage is shorter than the block count it is supposed to hold.
    #[display("Unexpected End of File: an operation could not be completed because an \"end of file\" was reached prematurely")]
    UnexpectedEof,

    /// An error returned when a write operation could not make progress on the backing storage.
    #[display("Write Zero: an operation could not be completed because a write did not accept any more bytes")]
    WriteZero,
}
