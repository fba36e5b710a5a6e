//! Errors related to filesystems manipulation.

use derive_more::derive::Display;

/// Enumeration of possible errors encountered with filesystems' manipulation.
#[allow(clippy::module_name_repetitions)]
#[derive(Debug, Display)]
#[display("FileSystem Error: {_variant}")]
pub enum FsError<E: core::error::Error> {
    /// Tried to format or mount a device which is already mounted.
    #[display("Already Mounted: tried to format or mount a device which is already mounted")]
    AlreadyMounted,

    /// Indicates that this error is coming from the filesystem's implementation.
    #[display("Implementation: {_0}")]
    Implementation(E),
}

impl<E: core::error::Error> core::error::Error for FsError<E> {}
