use std::io::Read;

use tracing::{debug, warn};

use super::{Result, StreamError};
use crate::frame::{DataFrame, FinishFrame, Frame, FrameType, HeadFrame, PAYLOAD_SIZE};
use crate::wide_uint::WideUint;
use crate::FORMAT_VERSION;

/// Sequential container reader and validator.
#[derive(Debug, Clone, Default)]
pub struct Loader {
    current: Option<Frame>,
    label: String,
    frame_count: WideUint,
    frame_index: WideUint,
    data_size: WideUint,
    data_index: WideUint,
    read_head: bool,
    read_finish: bool,
    fault: bool,
    stream_failed: bool,
}

impl Loader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_head(&self) -> bool {
        self.read_head
    }

    pub fn has_finish(&self) -> bool {
        self.read_finish
    }

    pub fn is_faulted(&self) -> bool {
        self.fault
    }

    /// Label from the adopted HEAD frame.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Declared frame count (HEAD, or FINF when HEAD held a placeholder).
    pub fn frame_count(&self) -> WideUint {
        self.frame_count
    }

    /// Position of the current frame in the stream.
    pub fn frame_index(&self) -> WideUint {
        self.frame_index
    }

    /// Declared content size (HEAD, or FINF when HEAD held a placeholder).
    pub fn data_size(&self) -> WideUint {
        self.data_size
    }

    /// Content bytes covered by the DATA frames read so far, counting every
    /// DATA frame as a full 240-byte block.
    pub fn data_index(&self) -> WideUint {
        self.data_index
    }

    /// The most recently read frame.
    pub fn frame(&self) -> Option<&Frame> {
        self.current.as_ref()
    }

    pub fn has_value(&self) -> bool {
        self.current.is_some()
    }

    /// Whether the current frame passes the checksum and carries the
    /// expected sequence number.
    pub fn is_valid_data(&self) -> bool {
        match &self.current {
            Some(frame) => frame.is_valid() && frame.sequence == self.frame_index.low_u64(),
            None => false,
        }
    }

    /// Owned copy of the current DATA payload, at most `max_len` bytes.
    /// Empty when the current frame is not DATA.
    pub fn data(&self, max_len: usize) -> Vec<u8> {
        match self.current.as_ref().map(DataFrame::try_from) {
            Some(Ok(data)) => data.to_vec(max_len),
            _ => Vec::new(),
        }
    }

    /// Meaningful content bytes in the current DATA frame, given the
    /// declared size.  Zero when the current frame is not DATA.
    pub fn data_len(&self) -> usize {
        match &self.current {
            Some(frame) if frame.is_type(FrameType::Data) => {}
            _ => return 0,
        }
        let block = WideUint::from(PAYLOAD_SIZE);
        let start = self.data_index.saturating_sub(block);
        if self.data_size <= start {
            return 0;
        }
        let remaining = self.data_size - start;
        if remaining >= block {
            PAYLOAD_SIZE
        } else {
            remaining.low_u64() as usize
        }
    }

    /// Verdict on the whole container.  `None` until FINF has been read.
    pub fn check_integrity(&self) -> Option<bool> {
        if !self.read_finish {
            return None;
        }
        Some(!self.fault && self.frame_index + WideUint::ONE == self.frame_count)
    }

    /// Read and account for the next frame.
    ///
    /// Returns `Ok(false)` once FINF has been consumed or when fewer than
    /// 256 bytes remain.  A frame failing validation sets the fault flag
    /// and is still returned to the caller as `Ok(true)`.
    pub fn read_next<R: Read>(&mut self, stream: &mut R) -> Result<bool> {
        if self.read_finish {
            return Ok(false);
        }
        if self.stream_failed {
            return Err(StreamError::NotReadable);
        }
        if self.current.is_some() {
            self.frame_index.increment();
        }
        self.current = match Frame::read_from(&mut *stream) {
            Ok(frame) => frame,
            Err(e) => {
                self.stream_failed = true;
                self.current = None;
                return Err(e.into());
            }
        };
        let Some(frame) = self.current.clone() else {
            return Ok(false);
        };
        debug!(
            sequence = frame.sequence,
            frame_type = ?frame.frame_type(),
            "read frame"
        );

        let valid = self.is_valid_data();
        if !valid {
            self.fault = true;
            warn!(
                index = %self.frame_index,
                sequence = frame.sequence,
                checksum_ok = frame.is_valid(),
                "frame validation failed"
            );
        }

        match frame.frame_type() {
            Some(FrameType::Head) if valid && !self.read_head => self.accept_head(frame),
            Some(FrameType::Finish) if valid && self.read_head && !self.read_finish => {
                self.accept_finish(frame)
            }
            Some(FrameType::Data) if self.read_head && !self.read_finish => {
                self.data_index += WideUint::from(PAYLOAD_SIZE);
            }
            _ => {}
        }
        Ok(true)
    }

    fn accept_head(&mut self, frame: Frame) {
        let Ok(head) = HeadFrame::try_from(frame) else {
            return;
        };
        if !Self::is_version_compatible(&head) {
            warn!(
                version = head.version(),
                supported = FORMAT_VERSION,
                "unsupported HEAD version; header not adopted"
            );
            return;
        }
        self.label = head.label();
        self.frame_count = head.frame_count();
        self.data_size = head.data_size();
        self.read_head = true;
    }

    fn accept_finish(&mut self, frame: Frame) {
        let Ok(finf) = FinishFrame::try_from(frame) else {
            return;
        };
        if self.frame_count.is_zero() {
            self.frame_count = finf.frame_count();
        }
        if self.data_size.is_zero() {
            self.data_size = finf.data_size();
        }
        self.read_finish = true;
    }

    pub fn is_version_compatible(head: &HeadFrame) -> bool {
        head.version() <= FORMAT_VERSION
    }
}
