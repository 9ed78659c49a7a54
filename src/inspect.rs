//! Frame-by-frame diagnostic scan of a container.
//!
//! # How it works
//!
//! [`scan`] drives a [`Loader`] over the whole stream and records, for each
//! frame, its position, sequence number, type and health.  Nothing is
//! written anywhere; the result is a [`ScanReport`] that can be printed or
//! serialised to JSON.
//!
//! ## Frame health
//!
//! | Health | Meaning |
//! |--------|---------|
//! | `Healthy` | checksum matches and sequence equals the stream position |
//! | `ChecksumMismatch` | stored CRC-32 differs from the recomputed one |
//! | `OutOfSequence` | checksum fine, sequence number not where expected |
//!
//! ## Verdict
//!
//! `Intact` when the loader's integrity check passes, `Damaged` when it
//! fails, `Incomplete` when no FINF frame was accepted.

use std::io::Read;

use serde::Serialize;

use crate::frame::{FinishFrame, Frame, FrameType, HeadFrame, FRAME_SIZE};
use crate::io_stream::{Loader, Result};
use crate::wide_uint::WideUint;

// ── Types ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FrameHealth {
    Healthy,
    ChecksumMismatch { stored: u32, computed: u32 },
    OutOfSequence { expected: u64, found: u64 },
}

impl FrameHealth {
    pub fn is_healthy(&self) -> bool {
        matches!(self, FrameHealth::Healthy)
    }

    fn of(frame: &Frame, expected: u64) -> Self {
        let computed = frame.compute_checksum();
        if computed != frame.checksum {
            FrameHealth::ChecksumMismatch { stored: frame.checksum, computed }
        } else if frame.sequence != expected {
            FrameHealth::OutOfSequence { expected, found: frame.sequence }
        } else {
            FrameHealth::Healthy
        }
    }
}

/// Diagnostic record for one frame.
#[derive(Debug, Clone, Serialize)]
pub struct ScannedFrame {
    /// Zero-based position in the stream.
    pub index:    u64,
    /// Byte offset of the frame.
    pub offset:   u64,
    pub sequence: u64,
    /// Four-letter type name, or the raw tag in hex when unknown.
    pub kind:     String,
    /// Stored checksum as hex.
    pub checksum: String,
    pub health:   FrameHealth,
}

/// HEAD/FINF totals as declared in the container.
#[derive(Debug, Clone, Serialize)]
pub struct Declared {
    pub version:     Option<u32>,
    pub label:       String,
    pub frame_count: WideUint,
    pub data_size:   WideUint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrityVerdict {
    Intact,
    Damaged,
    Incomplete,
}

/// Complete report produced by [`scan`].
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub frames:         Vec<ScannedFrame>,
    pub healthy_frames: u64,
    pub data_frames:    u64,
    /// HEAD as written, when a HEAD frame was seen at all.
    pub head:           Option<Declared>,
    /// Totals the loader settled on (HEAD, filled in from FINF).
    pub effective:      Declared,
    /// Reserved FINF digest as hex, when a FINF frame was accepted.
    pub finish_hash:    Option<String>,
    pub verdict:        IntegrityVerdict,
}

impl ScanReport {
    pub fn total_frames(&self) -> u64 {
        self.frames.len() as u64
    }

    /// Summary line for display.
    pub fn summary(&self) -> String {
        format!(
            "{:?}: {}/{} frames healthy, {} data frame(s), label {:?}, {} byte(s) declared",
            self.verdict,
            self.healthy_frames,
            self.total_frames(),
            self.data_frames,
            self.effective.label,
            self.effective.data_size,
        )
    }
}

// ── Scanner ───────────────────────────────────────────────────────────────────

/// Scan every frame in `reader`.
///
/// `progress` is called after each frame with `(frames_scanned, bytes_scanned)`.
/// Corrupt frames never cause an `Err`; only I/O failures do.
pub fn scan<R, F>(reader: &mut R, mut progress: Option<&mut F>) -> Result<ScanReport>
where
    R: Read,
    F: FnMut(u64, u64),
{
    let mut loader = Loader::new();
    let mut frames = Vec::new();
    let mut healthy_frames = 0u64;
    let mut data_frames = 0u64;
    let mut head: Option<Declared> = None;
    let mut finish_hash = None;

    while loader.read_next(reader)? {
        let Some(frame) = loader.frame() else {
            break;
        };
        let index = loader.frame_index().low_u64();
        let health = FrameHealth::of(frame, index);
        if health.is_healthy() {
            healthy_frames += 1;
        }

        match frame.frame_type() {
            Some(FrameType::Head) if head.is_none() => {
                if let Ok(h) = HeadFrame::try_from(frame) {
                    head = Some(Declared {
                        version:     Some(h.version()),
                        label:       h.label(),
                        frame_count: h.frame_count(),
                        data_size:   h.data_size(),
                    });
                }
            }
            Some(FrameType::Data) => data_frames += 1,
            Some(FrameType::Finish) if loader.has_finish() => {
                if let Ok(finf) = FinishFrame::try_from(frame) {
                    finish_hash = Some(hex::encode(finf.hash()));
                }
            }
            _ => {}
        }

        frames.push(ScannedFrame {
            index,
            offset: index * FRAME_SIZE as u64,
            sequence: frame.sequence,
            kind: kind_name(frame),
            checksum: hex::encode(frame.checksum.to_be_bytes()),
            health,
        });

        if let Some(cb) = progress.as_mut() {
            let scanned = frames.len() as u64;
            cb(scanned, scanned * FRAME_SIZE as u64);
        }
    }

    let verdict = match loader.check_integrity() {
        Some(true) => IntegrityVerdict::Intact,
        Some(false) => IntegrityVerdict::Damaged,
        None => IntegrityVerdict::Incomplete,
    };

    Ok(ScanReport {
        frames,
        healthy_frames,
        data_frames,
        effective: Declared {
            version:     head.as_ref().and_then(|h| h.version),
            label:       loader.label().to_owned(),
            frame_count: loader.frame_count(),
            data_size:   loader.data_size(),
        },
        head,
        finish_hash,
        verdict,
    })
}

fn kind_name(frame: &Frame) -> String {
    match frame.frame_type() {
        Some(t) => t.name().to_owned(),
        None => format!("{:#010x}", frame.type_tag),
    }
}
