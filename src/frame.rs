//! The 256-byte CDFS frame and its four typed views.
//!
//! # Layout
//!
//! ```text
//! [ sequence  (8)   ]  offset 0
//! [ type_tag  (4)   ]  offset 8
//! [ payload   (240) ]  offset 12
//! [ checksum  (4)   ]  offset 252   CRC-32 over bytes [0, 252)
//! ```
//!
//! Multi-byte integers use the platform's native byte order.  Containers
//! are only portable between machines of the same endianness.
//!
//! # Typed views
//! [`HeadFrame`], [`FinishFrame`], [`DataFrame`] and [`ContinuationFrame`]
//! each own a [`Frame`] and decode/encode their payload fields at fixed
//! offsets on every access.  Converting a [`Frame`] into a view fails with
//! [`FrameError::TypeMismatch`] unless the type tag matches.

use std::fmt;
use std::io::{self, ErrorKind, Read, Write};

use byteorder::{ByteOrder, NativeEndian};
use thiserror::Error;

use crate::checksum::Crc32;
use crate::wide_uint::{WideUint, WIDE_UINT_SIZE};

pub const FRAME_SIZE: usize = 256;
pub const PAYLOAD_SIZE: usize = 240;
pub const LABEL_SIZE: usize = 32;
pub const HASH_SIZE: usize = 32;

const SEQUENCE_OFFSET: usize = 0;
const TYPE_OFFSET: usize = 8;
const PAYLOAD_OFFSET: usize = 12;
pub const CHECKSUM_OFFSET: usize = PAYLOAD_OFFSET + PAYLOAD_SIZE;

// Payload-relative field offsets.
const VERSION_AT: usize = 0;
const COUNT_AT: usize = 4;
const LABEL_AT: usize = 20;
const HASH_AT: usize = 20;
const SIZE_AT: usize = 52;
const CURRENT_AT: usize = 4;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame type mismatch: expected {expected}, found tag {found:#010x}")]
    TypeMismatch { expected: FrameType, found: u32 },
    #[error("payload of {len} bytes exceeds frame capacity of {max} bytes")]
    PayloadTooLarge { len: usize, max: usize },
}

// ── FrameType ────────────────────────────────────────────────────────────────

/// Logical frame types, identified on the wire by a 4-byte tag.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameType {
    Head = 0x4344_4653,
    Finish = 0x4649_4E46,
    Data = 0x4441_5444,
    Continuation = 0x434F_4E54,
    /// Reserved; never produced or interpreted by the builder or loader.
    Meta = 0x4D45_5441,
}

impl FrameType {
    pub const fn tag(self) -> u32 {
        self as u32
    }

    pub fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            0x4344_4653 => Some(Self::Head),
            0x4649_4E46 => Some(Self::Finish),
            0x4441_5444 => Some(Self::Data),
            0x434F_4E54 => Some(Self::Continuation),
            0x4D45_5441 => Some(Self::Meta),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Head => "HEAD",
            Self::Finish => "FINF",
            Self::Data => "DATA",
            Self::Continuation => "CONT",
            Self::Meta => "META",
        }
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Frame ────────────────────────────────────────────────────────────────────

/// One physical frame.  `type_tag` is kept raw so unknown tags survive a
/// read and can be inspected by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub sequence: u64,
    pub type_tag: u32,
    pub payload: [u8; PAYLOAD_SIZE],
    pub checksum: u32,
}

impl Default for Frame {
    fn default() -> Self {
        Self {
            sequence: 0,
            type_tag: 0,
            payload: [0u8; PAYLOAD_SIZE],
            checksum: 0,
        }
    }
}

impl Frame {
    /// Zero-filled frame carrying `frame_type`'s tag.
    pub fn new(frame_type: FrameType) -> Self {
        Self {
            type_tag: frame_type.tag(),
            ..Self::default()
        }
    }

    pub fn frame_type(&self) -> Option<FrameType> {
        FrameType::from_tag(self.type_tag)
    }

    pub fn is_type(&self, frame_type: FrameType) -> bool {
        self.type_tag == frame_type.tag()
    }

    pub fn to_bytes(&self) -> [u8; FRAME_SIZE] {
        let mut out = [0u8; FRAME_SIZE];
        NativeEndian::write_u64(&mut out[SEQUENCE_OFFSET..TYPE_OFFSET], self.sequence);
        NativeEndian::write_u32(&mut out[TYPE_OFFSET..PAYLOAD_OFFSET], self.type_tag);
        out[PAYLOAD_OFFSET..CHECKSUM_OFFSET].copy_from_slice(&self.payload);
        NativeEndian::write_u32(&mut out[CHECKSUM_OFFSET..], self.checksum);
        out
    }

    pub fn from_bytes(bytes: &[u8; FRAME_SIZE]) -> Self {
        let mut payload = [0u8; PAYLOAD_SIZE];
        payload.copy_from_slice(&bytes[PAYLOAD_OFFSET..CHECKSUM_OFFSET]);
        Self {
            sequence: NativeEndian::read_u64(&bytes[SEQUENCE_OFFSET..TYPE_OFFSET]),
            type_tag: NativeEndian::read_u32(&bytes[TYPE_OFFSET..PAYLOAD_OFFSET]),
            payload,
            checksum: NativeEndian::read_u32(&bytes[CHECKSUM_OFFSET..]),
        }
    }

    /// CRC-32 over every encoded byte except the checksum field.
    pub fn compute_checksum(&self) -> u32 {
        let bytes = self.to_bytes();
        let mut crc = Crc32::new();
        crc.push_slice(&bytes[..CHECKSUM_OFFSET]);
        crc.value()
    }

    /// Recompute and store the checksum.
    pub fn validate(&mut self) {
        self.checksum = self.compute_checksum();
    }

    pub fn is_valid(&self) -> bool {
        self.checksum == self.compute_checksum()
    }

    pub fn write_to<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(&self.to_bytes())
    }

    /// Read exactly one frame.
    ///
    /// Returns `Ok(None)` when the stream ends before a full 256 bytes are
    /// available; the partial bytes are discarded.
    pub fn read_from<R: Read>(mut reader: R) -> io::Result<Option<Self>> {
        let mut buf = [0u8; FRAME_SIZE];
        let mut filled = 0;
        while filled < FRAME_SIZE {
            match reader.read(&mut buf[filled..]) {
                Ok(0) => return Ok(None),
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(Some(Self::from_bytes(&buf)))
    }
}

// ── Payload field helpers ────────────────────────────────────────────────────

fn read_u32(payload: &[u8; PAYLOAD_SIZE], at: usize) -> u32 {
    NativeEndian::read_u32(&payload[at..at + 4])
}

fn write_u32(payload: &mut [u8; PAYLOAD_SIZE], at: usize, value: u32) {
    NativeEndian::write_u32(&mut payload[at..at + 4], value);
}

fn read_wide(payload: &[u8; PAYLOAD_SIZE], at: usize) -> WideUint {
    WideUint::read_ne(&payload[at..at + WIDE_UINT_SIZE])
}

fn write_wide(payload: &mut [u8; PAYLOAD_SIZE], at: usize, value: WideUint) {
    value.write_ne(&mut payload[at..at + WIDE_UINT_SIZE]);
}

fn read_array<const N: usize>(payload: &[u8; PAYLOAD_SIZE], at: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&payload[at..at + N]);
    out
}

/// Copy at most `N` bytes of `src` into the field and zero the remainder.
fn write_field<const N: usize>(payload: &mut [u8; PAYLOAD_SIZE], at: usize, src: &[u8]) {
    let field = &mut payload[at..at + N];
    let n = src.len().min(N);
    field[..n].copy_from_slice(&src[..n]);
    field[n..].fill(0);
}

/// Text up to the first NUL (or the whole field).
fn label_text(raw: &[u8; LABEL_SIZE]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(LABEL_SIZE);
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

// ── Typed views ──────────────────────────────────────────────────────────────

/// Behaviour shared by every typed view.
pub trait FrameView: Sized {
    const FRAME_TYPE: FrameType;

    fn frame(&self) -> &Frame;
    fn frame_mut(&mut self) -> &mut Frame;
    fn into_frame(self) -> Frame;

    fn sequence(&self) -> u64 {
        self.frame().sequence
    }

    fn set_sequence(&mut self, sequence: u64) {
        self.frame_mut().sequence = sequence;
    }

    fn validate(&mut self) {
        self.frame_mut().validate();
    }

    fn is_valid(&self) -> bool {
        self.frame().is_valid()
    }

    fn matches(frame: &Frame) -> bool {
        frame.is_type(Self::FRAME_TYPE)
    }
}

macro_rules! frame_view {
    ($(#[$meta:meta])* $name:ident => $kind:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            frame: Frame,
        }

        impl Default for $name {
            fn default() -> Self {
                Self { frame: Frame::new($kind) }
            }
        }

        impl FrameView for $name {
            const FRAME_TYPE: FrameType = $kind;

            fn frame(&self) -> &Frame {
                &self.frame
            }

            fn frame_mut(&mut self) -> &mut Frame {
                &mut self.frame
            }

            fn into_frame(self) -> Frame {
                self.frame
            }
        }

        impl TryFrom<Frame> for $name {
            type Error = FrameError;

            fn try_from(frame: Frame) -> Result<Self, FrameError> {
                if !Self::matches(&frame) {
                    return Err(FrameError::TypeMismatch {
                        expected: $kind,
                        found: frame.type_tag,
                    });
                }
                Ok(Self { frame })
            }
        }

        impl TryFrom<&Frame> for $name {
            type Error = FrameError;

            fn try_from(frame: &Frame) -> Result<Self, FrameError> {
                Self::try_from(frame.clone())
            }
        }

        impl From<$name> for Frame {
            fn from(view: $name) -> Frame {
                view.frame
            }
        }
    };
}

frame_view!(
    /// First logical frame: format version, declared counts and label.
    HeadFrame => FrameType::Head
);
frame_view!(
    /// Last logical frame: authoritative counts when the Head was never finalized.
    FinishFrame => FrameType::Finish
);
frame_view!(
    /// 240 bytes of raw content.
    DataFrame => FrameType::Data
);
frame_view!(
    /// Resumption marker carrying the running index and label.
    ContinuationFrame => FrameType::Continuation
);

impl HeadFrame {
    pub fn version(&self) -> u32 {
        read_u32(&self.frame.payload, VERSION_AT)
    }

    pub fn set_version(&mut self, version: u32) {
        write_u32(&mut self.frame.payload, VERSION_AT, version);
    }

    pub fn frame_count(&self) -> WideUint {
        read_wide(&self.frame.payload, COUNT_AT)
    }

    pub fn set_frame_count(&mut self, count: WideUint) {
        write_wide(&mut self.frame.payload, COUNT_AT, count);
    }

    pub fn label_bytes(&self) -> [u8; LABEL_SIZE] {
        read_array(&self.frame.payload, LABEL_AT)
    }

    pub fn label(&self) -> String {
        label_text(&self.label_bytes())
    }

    /// Stores at most 32 bytes of `label`; longer labels are cut.
    pub fn set_label(&mut self, label: &str) {
        write_field::<LABEL_SIZE>(&mut self.frame.payload, LABEL_AT, label.as_bytes());
    }

    pub fn data_size(&self) -> WideUint {
        read_wide(&self.frame.payload, SIZE_AT)
    }

    pub fn set_data_size(&mut self, size: WideUint) {
        write_wide(&mut self.frame.payload, SIZE_AT, size);
    }
}

impl FinishFrame {
    pub fn frame_count(&self) -> WideUint {
        read_wide(&self.frame.payload, COUNT_AT)
    }

    pub fn set_frame_count(&mut self, count: WideUint) {
        write_wide(&mut self.frame.payload, COUNT_AT, count);
    }

    /// Reserved digest field.  Written as zeros and never checked.
    pub fn hash(&self) -> [u8; HASH_SIZE] {
        read_array(&self.frame.payload, HASH_AT)
    }

    pub fn set_hash(&mut self, hash: &[u8; HASH_SIZE]) {
        write_field::<HASH_SIZE>(&mut self.frame.payload, HASH_AT, hash);
    }

    pub fn data_size(&self) -> WideUint {
        read_wide(&self.frame.payload, SIZE_AT)
    }

    pub fn set_data_size(&mut self, size: WideUint) {
        write_wide(&mut self.frame.payload, SIZE_AT, size);
    }
}

impl DataFrame {
    pub fn data(&self) -> &[u8; PAYLOAD_SIZE] {
        &self.frame.payload
    }

    /// Copies at most 240 bytes and zero-pads the rest of the payload.
    pub fn set_data(&mut self, data: &[u8]) {
        write_field::<PAYLOAD_SIZE>(&mut self.frame.payload, 0, data);
    }

    /// Owned copy of the first `max_len` payload bytes (capped at 240).
    pub fn to_vec(&self, max_len: usize) -> Vec<u8> {
        self.frame.payload[..max_len.min(PAYLOAD_SIZE)].to_vec()
    }
}

impl ContinuationFrame {
    pub fn current_index(&self) -> WideUint {
        read_wide(&self.frame.payload, CURRENT_AT)
    }

    pub fn set_current_index(&mut self, index: WideUint) {
        write_wide(&mut self.frame.payload, CURRENT_AT, index);
    }

    pub fn label_bytes(&self) -> [u8; LABEL_SIZE] {
        read_array(&self.frame.payload, LABEL_AT)
    }

    pub fn label(&self) -> String {
        label_text(&self.label_bytes())
    }

    pub fn set_label(&mut self, label: &str) {
        write_field::<LABEL_SIZE>(&mut self.frame.payload, LABEL_AT, label.as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn tags_spell_ascii_magic() {
        assert_eq!(FrameType::Head.tag().to_be_bytes(), *b"CDFS");
        assert_eq!(FrameType::Finish.tag().to_be_bytes(), *b"FINF");
        assert_eq!(FrameType::Data.tag().to_be_bytes(), *b"DATD");
        assert_eq!(FrameType::Continuation.tag().to_be_bytes(), *b"CONT");
        assert_eq!(FrameType::Meta.tag().to_be_bytes(), *b"META");
        for t in [FrameType::Head, FrameType::Finish, FrameType::Data, FrameType::Continuation, FrameType::Meta] {
            assert_eq!(FrameType::from_tag(t.tag()), Some(t));
        }
        assert_eq!(FrameType::from_tag(0), None);
    }

    #[test]
    fn encoded_layout() {
        let mut frame = Frame::new(FrameType::Data);
        frame.sequence = 0x0102_0304_0506_0708;
        frame.payload[0] = 0xAA;
        frame.payload[PAYLOAD_SIZE - 1] = 0xBB;
        frame.validate();

        let bytes = frame.to_bytes();
        assert_eq!(bytes.len(), FRAME_SIZE);
        assert_eq!(&bytes[..8], &frame.sequence.to_ne_bytes());
        assert_eq!(&bytes[8..12], &FrameType::Data.tag().to_ne_bytes());
        assert_eq!(bytes[12], 0xAA);
        assert_eq!(bytes[251], 0xBB);
        assert_eq!(&bytes[252..], &frame.checksum.to_ne_bytes());
        assert_eq!(frame.checksum, crc32fast::hash(&bytes[..252]));
        assert_eq!(Frame::from_bytes(&bytes), frame);
    }

    #[test]
    fn validate_then_tamper() {
        let mut frame = Frame::new(FrameType::Head);
        assert!(!frame.is_valid());
        frame.validate();
        assert!(frame.is_valid());
        frame.payload[100] ^= 0x01;
        assert!(!frame.is_valid());
    }

    #[test]
    fn read_from_short_stream_is_none() {
        let frame = Frame::new(FrameType::Data);
        let bytes = frame.to_bytes();
        assert_eq!(Frame::read_from(Cursor::new(&bytes[..255])).unwrap(), None);
        assert_eq!(Frame::read_from(Cursor::new(Vec::new())).unwrap(), None);
        assert_eq!(Frame::read_from(Cursor::new(&bytes[..])).unwrap(), Some(frame));
    }

    #[test]
    fn default_views_carry_their_tag() {
        assert!(HeadFrame::default().frame().is_type(FrameType::Head));
        assert!(FinishFrame::default().frame().is_type(FrameType::Finish));
        assert!(DataFrame::default().frame().is_type(FrameType::Data));
        assert!(ContinuationFrame::default().frame().is_type(FrameType::Continuation));
        assert_eq!(DataFrame::default().data(), &[0u8; PAYLOAD_SIZE]);
    }

    #[test]
    fn view_from_wrong_type_fails() {
        let frame = Frame::new(FrameType::Data);
        let err = HeadFrame::try_from(&frame).unwrap_err();
        assert_eq!(
            err,
            FrameError::TypeMismatch { expected: FrameType::Head, found: FrameType::Data.tag() }
        );
        assert!(DataFrame::try_from(frame).is_ok());
    }

    #[test]
    fn head_fields_at_fixed_offsets() {
        let mut head = HeadFrame::default();
        head.set_version(0x0000_0100);
        head.set_frame_count(WideUint::from_limbs(7, 9));
        head.set_label("archive");
        head.set_data_size(WideUint::from(1234u64));

        let p = &head.frame().payload;
        assert_eq!(&p[0..4], &0x0000_0100u32.to_ne_bytes());
        assert_eq!(&p[4..20], &WideUint::from_limbs(7, 9).to_ne_bytes());
        assert_eq!(&p[20..27], b"archive");
        assert!(p[27..52].iter().all(|&b| b == 0));
        assert_eq!(&p[52..68], &WideUint::from(1234u64).to_ne_bytes());
        assert!(p[68..].iter().all(|&b| b == 0));

        assert_eq!(head.version(), 0x0000_0100);
        assert_eq!(head.frame_count(), WideUint::from_limbs(7, 9));
        assert_eq!(head.label(), "archive");
        assert_eq!(head.data_size(), WideUint::from(1234u64));
    }

    #[test]
    fn long_label_is_truncated_without_touching_neighbours() {
        let mut head = HeadFrame::default();
        head.set_data_size(WideUint::MAX);
        head.set_label(&"x".repeat(40));
        assert_eq!(head.label(), "x".repeat(LABEL_SIZE));
        assert_eq!(head.data_size(), WideUint::MAX);

        head.set_label("short");
        assert_eq!(head.label(), "short");
    }

    #[test]
    fn finish_fields() {
        let mut finf = FinishFrame::default();
        finf.set_frame_count(WideUint::from(5u64));
        finf.set_data_size(WideUint::from(700u64));
        assert_eq!(finf.hash(), [0u8; HASH_SIZE]);
        finf.set_hash(&[0xEE; HASH_SIZE]);
        assert_eq!(finf.frame_count(), WideUint::from(5u64));
        assert_eq!(finf.data_size(), WideUint::from(700u64));
        assert_eq!(finf.hash(), [0xEE; HASH_SIZE]);
        assert_eq!(read_u32(&finf.frame().payload, 0), 0);
    }

    #[test]
    fn continuation_fields() {
        let mut cont = ContinuationFrame::default();
        cont.set_current_index(WideUint::from(42u64));
        cont.set_label("part-2");
        assert_eq!(cont.current_index(), WideUint::from(42u64));
        assert_eq!(cont.label(), "part-2");
        assert!(cont.frame().payload[52..].iter().all(|&b| b == 0));
    }

    #[test]
    fn data_copy_is_capped() {
        let mut data = DataFrame::default();
        data.set_data(&[7u8; 300]);
        assert_eq!(data.data(), &[7u8; PAYLOAD_SIZE]);
        assert_eq!(data.to_vec(10), vec![7u8; 10]);
        assert_eq!(data.to_vec(1000).len(), PAYLOAD_SIZE);

        data.set_data(b"abc");
        assert_eq!(&data.data()[..3], b"abc");
        assert!(data.data()[3..].iter().all(|&b| b == 0));
    }

    #[test]
    fn view_sequence_and_validation() {
        let mut cont = ContinuationFrame::default();
        cont.set_sequence(3);
        cont.validate();
        assert!(cont.is_valid());
        let frame: Frame = cont.into();
        assert_eq!(frame.sequence, 3);
        assert!(frame.is_valid());
    }
}
