//! Streaming container engine: the frame builder and loader.
//!
//! # Builder
//! [`Builder`] emits a well-formed frame stream one frame per call:
//! HEAD, any number of DATA/CONT frames, then FINF.  The HEAD written
//! first only carries provisional counts; on a seekable destination
//! [`Builder::finalize`] rewinds and rewrites it with the real totals.
//!
//! # Loader
//! [`Loader`] consumes frames one at a time, checks checksum and sequence
//! continuity, and keeps the declared totals.  A bad frame raises a sticky
//! fault flag but never stops the read loop; the verdict is only given by
//! [`Loader::check_integrity`] once the FINF frame has been seen.
//!
//! # Stream health
//! Both sides check a "stream failed" flag before touching the stream.
//! After the first I/O error every further call returns
//! [`StreamError::NotWritable`] / [`StreamError::NotReadable`] without
//! performing I/O.  The stream itself stays owned by the caller.

use std::io;

use thiserror::Error;

use crate::frame::FrameError;

mod builder;
mod loader;

pub use builder::Builder;
pub use loader::Loader;

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("stream is not writable after an earlier failure")]
    NotWritable,
    #[error("stream is not readable after an earlier failure")]
    NotReadable,
    #[error("stream I/O error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Frame(#[from] FrameError),
}

pub type Result<T> = std::result::Result<T, StreamError>;
