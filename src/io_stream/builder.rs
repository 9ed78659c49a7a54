use std::io::{Seek, SeekFrom, Write};

use tracing::debug;

use super::{Result, StreamError};
use crate::frame::{
    ContinuationFrame, DataFrame, Frame, FrameError, FrameView, FinishFrame, HeadFrame,
    PAYLOAD_SIZE,
};
use crate::wide_uint::WideUint;
use crate::FORMAT_VERSION;

/// Sequential container writer.
///
/// State moves `empty → head written → finished`.  DATA, CONT and FINF
/// writes outside the `head written` state are silently skipped and
/// reported as `Ok(false)`.
#[derive(Debug, Clone, Default)]
pub struct Builder {
    label: String,
    frame_index: WideUint,
    data_size: WideUint,
    wrote_head: bool,
    wrote_finish: bool,
    stream_failed: bool,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_label(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Sequence number the next frame will carry.  After FINF this stays
    /// at the FINF frame's own sequence.
    pub fn frame_index(&self) -> WideUint {
        self.frame_index
    }

    /// Sum of the content lengths handed to [`Builder::write_data`].
    pub fn data_size(&self) -> WideUint {
        self.data_size
    }

    pub fn wrote_head(&self) -> bool {
        self.wrote_head
    }

    pub fn wrote_finish(&self) -> bool {
        self.wrote_finish
    }

    /// Total frames in the container, HEAD and FINF included.  Only
    /// meaningful once FINF has been written.
    pub fn frame_count(&self) -> WideUint {
        self.frame_index + WideUint::ONE
    }

    fn accepts_body(&self) -> bool {
        self.wrote_head && !self.wrote_finish
    }

    fn sequence(&self) -> u64 {
        self.frame_index.low_u64()
    }

    // ── Frame writers ────────────────────────────────────────────────────────

    /// Write a HEAD carrying the running counts as placeholders.
    pub fn write_head<W: Write>(&mut self, stream: &mut W) -> Result<()> {
        self.write_head_with(stream, self.frame_index, self.data_size)
    }

    /// Write a HEAD with explicit totals.  Used for the finalize pass.
    pub fn write_head_with<W: Write>(
        &mut self,
        stream: &mut W,
        frame_count: WideUint,
        data_size: WideUint,
    ) -> Result<()> {
        let mut head = HeadFrame::default();
        head.set_sequence(0);
        head.set_version(FORMAT_VERSION);
        head.set_frame_count(frame_count);
        head.set_label(&self.label);
        head.set_data_size(data_size);
        head.validate();
        self.emit(stream, head.frame())?;

        self.wrote_head = true;
        if !self.wrote_finish {
            self.frame_index.increment();
        }
        Ok(())
    }

    /// Write one DATA frame holding `chunk` (at most 240 bytes, zero-padded).
    pub fn write_data<W: Write>(&mut self, stream: &mut W, chunk: &[u8]) -> Result<bool> {
        if chunk.len() > PAYLOAD_SIZE {
            return Err(FrameError::PayloadTooLarge {
                len: chunk.len(),
                max: PAYLOAD_SIZE,
            }
            .into());
        }
        if !self.accepts_body() {
            return Ok(false);
        }
        let mut data = DataFrame::default();
        data.set_sequence(self.sequence());
        data.set_data(chunk);
        data.validate();
        self.emit(stream, data.frame())?;

        self.frame_index.increment();
        self.data_size += WideUint::from(chunk.len());
        Ok(true)
    }

    pub fn write_continuation<W: Write>(&mut self, stream: &mut W) -> Result<bool> {
        if !self.accepts_body() {
            return Ok(false);
        }
        let mut cont = ContinuationFrame::default();
        cont.set_sequence(self.sequence());
        cont.set_current_index(self.frame_index);
        cont.set_label(&self.label);
        cont.validate();
        self.emit(stream, cont.frame())?;

        self.frame_index.increment();
        Ok(true)
    }

    /// Write the FINF frame.  No further body or FINF frames follow.
    pub fn write_finish<W: Write>(&mut self, stream: &mut W) -> Result<bool> {
        if !self.accepts_body() {
            return Ok(false);
        }
        let mut finf = FinishFrame::default();
        finf.set_sequence(self.sequence());
        finf.set_frame_count(self.frame_count());
        finf.set_data_size(self.data_size);
        finf.validate();
        self.emit(stream, finf.frame())?;

        self.wrote_finish = true;
        Ok(true)
    }

    /// Rewind, rewrite the HEAD with the final totals, and return to the end.
    ///
    /// Returns `Ok(false)` without touching the stream if FINF has not been
    /// written yet.
    pub fn finalize<W: Write + Seek>(&mut self, stream: &mut W) -> Result<bool> {
        if !self.wrote_finish {
            return Ok(false);
        }
        if self.stream_failed {
            return Err(StreamError::NotWritable);
        }
        let end = stream.seek(SeekFrom::End(0))?;
        stream.seek(SeekFrom::Start(0))?;
        self.write_head_with(stream, self.frame_count(), self.data_size)?;
        stream.seek(SeekFrom::Start(end))?;
        debug!(
            frame_count = %self.frame_count(),
            data_size = %self.data_size,
            "rewrote HEAD with final totals"
        );
        Ok(true)
    }

    fn emit<W: Write>(&mut self, stream: &mut W, frame: &Frame) -> Result<()> {
        if self.stream_failed {
            return Err(StreamError::NotWritable);
        }
        if let Err(e) = frame.write_to(&mut *stream) {
            self.stream_failed = true;
            return Err(e.into());
        }
        debug!(
            sequence = frame.sequence,
            frame_type = ?frame.frame_type(),
            "wrote frame"
        );
        Ok(())
    }
}
