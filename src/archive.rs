//! High-level encode and decode API for whole streams and files.
//!
//! ```no_run
//! use cdfs::archive::{pack_file, unpack_file, PackOptions, UnpackOptions};
//!
//! let opts = PackOptions { label: "backup".into(), ..PackOptions::default() };
//! let (container, _) = pack_file("notes.txt", None, &opts)?;
//! let (restored, summary) = unpack_file(&container, None, &UnpackOptions::default())?;
//! assert_eq!(summary.integrity, Some(true));
//! # let _ = restored;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::ffi::OsString;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, ErrorKind, Read, Seek, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::frame::{ContinuationFrame, FrameType, HeadFrame, PAYLOAD_SIZE};
use crate::io_stream::{Builder, Loader, StreamError};
use crate::wide_uint::WideUint;

/// File extension of encoded containers.
pub const EXTENSION: &str = "cdfs";

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error(transparent)]
    Stream(#[from] StreamError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("container file name must end with \".cdfs\": {}", .0.display())]
    InvalidExtension(PathBuf),
    #[error("integrity check failed ({invalid_frames} invalid frame(s), finish frame seen: {finished})")]
    IntegrityFailed { invalid_frames: usize, finished: bool },
}

// ── Options ───────────────────────────────────────────────────────────────────

/// Configuration for [`pack`] / [`pack_file`].
#[derive(Debug, Clone)]
pub struct PackOptions {
    /// Stored in the HEAD frame; at most 32 bytes are kept.
    pub label:         String,
    /// Rewind after FINF and rewrite HEAD with the final totals.
    pub finalize_head: bool,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self {
            label:         String::new(),
            finalize_head: true,
        }
    }
}

/// Configuration for [`unpack`] / [`unpack_file`].
#[derive(Debug, Clone, Default)]
pub struct UnpackOptions {
    /// Turn a failed or missing integrity verdict into an error.
    pub strict: bool,
}

// ── Summaries ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct PackSummary {
    pub frame_count: WideUint,
    pub data_size:   WideUint,
    pub data_frames: u64,
    /// Whether the HEAD was rewritten with the final totals.
    pub finalized:   bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UnpackSummary {
    pub label:          String,
    pub frames_read:    u64,
    pub bytes_written:  u64,
    /// Stream positions of frames that failed checksum or sequence checks.
    pub invalid_frames: Vec<u64>,
    pub unknown_frames: u64,
    pub integrity:      Option<bool>,
}

impl UnpackSummary {
    pub fn is_intact(&self) -> bool {
        self.integrity == Some(true)
    }
}

// ── Encoder ───────────────────────────────────────────────────────────────────

/// Encode `src` into `dst` and, if configured, finalize the HEAD in place.
pub fn pack<R: Read, W: Write + Seek>(
    src:  R,
    dst:  &mut W,
    opts: &PackOptions,
) -> Result<PackSummary, ArchiveError> {
    let mut builder = Builder::with_label(opts.label.as_str());
    let data_frames = write_body(&mut builder, src, dst)?;
    let finalized = opts.finalize_head && builder.finalize(dst)?;
    Ok(summarize(&builder, data_frames, finalized))
}

/// Encode into a sink that cannot seek.  The HEAD keeps its placeholders
/// and readers take the totals from the FINF frame.
pub fn pack_stream<R: Read, W: Write>(
    src:   R,
    dst:   &mut W,
    label: &str,
) -> Result<PackSummary, ArchiveError> {
    let mut builder = Builder::with_label(label);
    let data_frames = write_body(&mut builder, src, dst)?;
    Ok(summarize(&builder, data_frames, false))
}

fn write_body<R: Read, W: Write>(
    builder: &mut Builder,
    mut src: R,
    dst:     &mut W,
) -> Result<u64, ArchiveError> {
    builder.write_head(dst)?;
    let mut chunk = [0u8; PAYLOAD_SIZE];
    let mut data_frames = 0u64;
    loop {
        let n = fill_chunk(&mut src, &mut chunk)?;
        if n == 0 {
            break;
        }
        builder.write_data(dst, &chunk[..n])?;
        data_frames += 1;
        if n < PAYLOAD_SIZE {
            break;
        }
    }
    builder.write_finish(dst)?;
    Ok(data_frames)
}

fn summarize(builder: &Builder, data_frames: u64, finalized: bool) -> PackSummary {
    PackSummary {
        frame_count: builder.frame_count(),
        data_size: builder.data_size(),
        data_frames,
        finalized,
    }
}

/// Read until `buf` is full or the source is exhausted.
fn fill_chunk<R: Read>(src: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match src.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

// ── Decoder ───────────────────────────────────────────────────────────────────

/// Decode the container in `src` into `dst`.
///
/// Frames failing validation are logged and still written; the verdict is
/// reported in [`UnpackSummary::integrity`].  The most recent DATA payload
/// is held back until the next frame arrives so the final one can be cut
/// to the declared size even when that size is only known from FINF.
pub fn unpack<R: Read, W: Write>(
    src:  &mut R,
    dst:  &mut W,
    opts: &UnpackOptions,
) -> Result<UnpackSummary, ArchiveError> {
    let mut loader = Loader::new();
    let mut summary = UnpackSummary::default();
    let mut pending: Option<Vec<u8>> = None;

    while loader.read_next(src)? {
        summary.frames_read += 1;
        if !loader.is_valid_data() {
            let index = loader.frame_index().low_u64();
            warn!(frame = index, "frame validation failed");
            summary.invalid_frames.push(index);
        }
        let Some(frame) = loader.frame() else {
            continue;
        };

        match frame.frame_type() {
            Some(FrameType::Head) => {
                if let Ok(head) = HeadFrame::try_from(frame) {
                    info!(label = %head.label(), version = head.version(), "HEAD frame");
                }
            }
            Some(FrameType::Data) => {
                if !loader.has_head() {
                    warn!(frame = %loader.frame_index(), "DATA frame before an accepted HEAD; skipped");
                    continue;
                }
                if let Some(block) = pending.take() {
                    summary.bytes_written += flush_block(&loader, dst, &block, summary.bytes_written)?;
                }
                pending = Some(loader.data(PAYLOAD_SIZE));
            }
            Some(FrameType::Finish) => {
                info!(
                    frame_count = %loader.frame_count(),
                    data_size = %loader.data_size(),
                    "FINF frame"
                );
            }
            Some(FrameType::Continuation) => {
                if let Ok(cont) = ContinuationFrame::try_from(frame) {
                    info!(label = %cont.label(), index = %cont.current_index(), "CONT frame");
                }
            }
            Some(FrameType::Meta) | None => {
                warn!(tag = %format!("{:#010x}", frame.type_tag), "unrecognised frame type");
                summary.unknown_frames += 1;
            }
        }
    }
    if let Some(block) = pending.take() {
        summary.bytes_written += flush_block(&loader, dst, &block, summary.bytes_written)?;
    }
    dst.flush()?;

    summary.label = loader.label().to_owned();
    summary.integrity = loader.check_integrity();
    debug!(
        frames = summary.frames_read,
        bytes = summary.bytes_written,
        integrity = ?summary.integrity,
        "unpack finished"
    );

    if opts.strict && !summary.is_intact() {
        return Err(ArchiveError::IntegrityFailed {
            invalid_frames: summary.invalid_frames.len(),
            finished: summary.integrity.is_some(),
        });
    }
    Ok(summary)
}

/// Write the meaningful part of one DATA payload; returns bytes written.
fn flush_block<W: Write>(
    loader:  &Loader,
    dst:     &mut W,
    block:   &[u8],
    written: u64,
) -> io::Result<u64> {
    let size_known = loader.has_finish() || !loader.data_size().is_zero();
    let len = if size_known {
        let remaining = loader.data_size().saturating_sub(WideUint::from(written));
        if remaining >= WideUint::from(block.len()) {
            block.len()
        } else {
            remaining.low_u64() as usize
        }
    } else {
        block.len()
    };
    dst.write_all(&block[..len])?;
    Ok(len as u64)
}

// ── File helpers ──────────────────────────────────────────────────────────────

/// Encode the file at `input` into `output` (default: `input` + `.cdfs`).
pub fn pack_file<P: AsRef<Path>>(
    input:  P,
    output: Option<&Path>,
    opts:   &PackOptions,
) -> Result<(PathBuf, PackSummary), ArchiveError> {
    let input = input.as_ref();
    let output = match output {
        Some(p) => p.to_owned(),
        None => {
            let mut name = OsString::from(input.as_os_str());
            name.push(".");
            name.push(EXTENSION);
            PathBuf::from(name)
        }
    };
    let src = BufReader::new(File::open(input)?);
    let mut dst = BufWriter::new(File::create(&output)?);
    let summary = pack(src, &mut dst, opts)?;
    dst.flush()?;
    Ok((output, summary))
}

/// Decode the container at `input` into `output` (default: `input`
/// without its `.cdfs` extension).
pub fn unpack_file<P: AsRef<Path>>(
    input:  P,
    output: Option<&Path>,
    opts:   &UnpackOptions,
) -> Result<(PathBuf, UnpackSummary), ArchiveError> {
    let input = input.as_ref();
    if input.extension().map_or(true, |ext| ext != EXTENSION) {
        return Err(ArchiveError::InvalidExtension(input.to_owned()));
    }
    let output = match output {
        Some(p) => p.to_owned(),
        None => input.with_extension(""),
    };
    let mut src = BufReader::new(File::open(input)?);
    let mut dst = BufWriter::new(File::create(&output)?);
    let summary = unpack(&mut src, &mut dst, opts)?;
    Ok((output, summary))
}
