pub mod wide_uint;
pub mod checksum;
pub mod frame;
pub mod io_stream;
pub mod archive;
pub mod inspect;

pub use wide_uint::WideUint;
pub use checksum::{crc32, Crc32};
pub use frame::{
    ContinuationFrame, DataFrame, FinishFrame, Frame, FrameError, FrameType, FrameView, HeadFrame,
};
pub use io_stream::{Builder, Loader, StreamError};

/// Container format version written into every HEAD frame
/// (`0x00MMmmpp`: major, minor, patch).  Readers accept any HEAD whose
/// version is less than or equal to this.
pub const FORMAT_VERSION: u32 = 0x0000_0100;

/// Version of this library, encoded like [`FORMAT_VERSION`].
pub fn library_version() -> u32 {
    0x0000_0100
}
