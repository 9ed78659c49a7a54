use cdfs::archive::{self, ArchiveError, PackOptions, UnpackOptions};
use cdfs::frame::{FRAME_SIZE, PAYLOAD_SIZE};
use cdfs::inspect::{self, IntegrityVerdict};
use cdfs::io_stream::{Builder, Loader, StreamError};
use cdfs::{DataFrame, FinishFrame, FrameView, HeadFrame, WideUint, FORMAT_VERSION};
use std::io::{self, Cursor, Read, Write};

fn sample(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + i / 251) as u8).collect()
}

fn pack_bytes(data: &[u8], label: &str) -> Vec<u8> {
    let opts = PackOptions { label: label.to_string(), ..PackOptions::default() };
    let mut out = Cursor::new(Vec::new());
    archive::pack(data, &mut out, &opts).unwrap();
    out.into_inner()
}

fn unpack_bytes(container: &[u8]) -> (Vec<u8>, archive::UnpackSummary) {
    let mut out: Vec<u8> = Vec::new();
    let summary = archive::unpack(&mut Cursor::new(container), &mut out, &UnpackOptions::default())
        .unwrap();
    (out, summary)
}

fn read_all(container: &[u8]) -> Loader {
    let mut src = Cursor::new(container);
    let mut loader = Loader::new();
    while loader.read_next(&mut src).unwrap() {}
    loader
}

#[test]
fn test_roundtrip_various_lengths() {
    for len in [0usize, 1, 239, 240, 241, 480, 1000, 4096] {
        let data = sample(len);
        let container = pack_bytes(&data, "lengths");
        let data_frames = (len + PAYLOAD_SIZE - 1) / PAYLOAD_SIZE;
        assert_eq!(container.len(), (data_frames + 2) * FRAME_SIZE, "len {}", len);

        let (restored, summary) = unpack_bytes(&container);
        assert_eq!(restored, data, "len {}", len);
        assert_eq!(summary.integrity, Some(true));
        assert_eq!(summary.label, "lengths");
        assert!(summary.invalid_frames.is_empty());
    }
}

#[test]
fn test_swapped_data_frames_fail_integrity() {
    let mut container = pack_bytes(&sample(720), "swap");
    let (left, right) = container.split_at_mut(2 * FRAME_SIZE);
    left[FRAME_SIZE..].swap_with_slice(&mut right[..FRAME_SIZE]);

    let loader = read_all(&container);
    assert!(loader.is_faulted());
    assert_eq!(loader.check_integrity(), Some(false));

    let (_, summary) = unpack_bytes(&container);
    assert_eq!(summary.invalid_frames, vec![1, 2]);
    assert!(!summary.is_intact());
}

#[test]
fn test_strict_unpack_rejects_corruption() {
    let mut container = pack_bytes(&sample(300), "strict");
    container[FRAME_SIZE + 100] ^= 0x01;
    let mut out: Vec<u8> = Vec::new();
    let err = archive::unpack(
        &mut Cursor::new(container),
        &mut out,
        &UnpackOptions { strict: true },
    )
    .unwrap_err();
    assert!(matches!(err, ArchiveError::IntegrityFailed { invalid_frames: 1, finished: true }));
}

#[test]
fn test_truncated_container_keeps_declared_length() {
    let data = sample(500);
    let mut container = pack_bytes(&data, "");
    // Cut into the FINF frame.
    container.truncate(4 * FRAME_SIZE + 100);

    let (restored, summary) = unpack_bytes(&container);
    assert_eq!(restored, data);
    assert_eq!(summary.frames_read, 4);
    assert_eq!(summary.integrity, None);
}

#[test]
fn test_finalized_and_streamed_report_same_totals() {
    let data = sample(1234);
    let finalized = pack_bytes(&data, "totals");

    let mut streamed: Vec<u8> = Vec::new();
    let summary = archive::pack_stream(&data[..], &mut streamed, "totals").unwrap();
    assert!(!summary.finalized);
    assert_eq!(summary.data_size, WideUint::from(1234u64));

    // Placeholder HEAD differs, body frames are identical.
    assert_ne!(finalized[..FRAME_SIZE], streamed[..FRAME_SIZE]);
    assert_eq!(finalized[FRAME_SIZE..], streamed[FRAME_SIZE..]);

    let a = read_all(&finalized);
    let b = read_all(&streamed);
    assert_eq!(a.frame_count(), b.frame_count());
    assert_eq!(a.data_size(), b.data_size());
    assert_eq!(a.frame_count(), WideUint::from(8u64));
    assert_eq!(b.check_integrity(), Some(true));

    let (restored, _) = unpack_bytes(&streamed);
    assert_eq!(restored, data);
}

#[test]
fn test_newer_head_version_is_not_adopted() {
    let mut bytes: Vec<u8> = Vec::new();
    let mut head = HeadFrame::default();
    head.set_version(FORMAT_VERSION + 1);
    head.set_label("future");
    head.set_frame_count(WideUint::from(3u64));
    head.set_data_size(WideUint::from(4u64));
    head.validate();
    head.frame().write_to(&mut bytes).unwrap();

    let mut data = DataFrame::default();
    data.set_sequence(1);
    data.set_data(b"abcd");
    data.validate();
    data.frame().write_to(&mut bytes).unwrap();

    let mut finf = FinishFrame::default();
    finf.set_sequence(2);
    finf.set_frame_count(WideUint::from(3u64));
    finf.set_data_size(WideUint::from(4u64));
    finf.validate();
    finf.frame().write_to(&mut bytes).unwrap();

    let loader = read_all(&bytes);
    assert!(!loader.has_head());
    assert!(!loader.has_finish());
    assert_eq!(loader.label(), "");
    assert_eq!(loader.check_integrity(), None);

    let (restored, summary) = unpack_bytes(&bytes);
    assert!(restored.is_empty());
    assert_eq!(summary.frames_read, 3);
}

#[test]
fn test_continuation_frames_are_part_of_the_sequence() {
    let mut out = Cursor::new(Vec::new());
    let mut builder = Builder::with_label("resume");
    builder.write_head(&mut out).unwrap();
    assert!(builder.write_data(&mut out, &[b'a'; PAYLOAD_SIZE]).unwrap());
    assert!(builder.write_continuation(&mut out).unwrap());
    assert!(builder.write_data(&mut out, b"tail").unwrap());
    assert!(builder.write_finish(&mut out).unwrap());
    assert!(builder.finalize(&mut out).unwrap());
    assert!(!builder.write_continuation(&mut out).unwrap());

    let container = out.into_inner();
    assert_eq!(container.len(), 5 * FRAME_SIZE);

    let (restored, summary) = unpack_bytes(&container);
    let mut expected = vec![b'a'; PAYLOAD_SIZE];
    expected.extend_from_slice(b"tail");
    assert_eq!(restored, expected);
    assert_eq!(summary.integrity, Some(true));
    assert_eq!(summary.unknown_frames, 0);
}

#[test]
fn test_guarded_writes_leave_stream_untouched() {
    let mut sink: Vec<u8> = Vec::new();
    let mut builder = Builder::new();
    assert!(!builder.write_data(&mut sink, b"early").unwrap());
    assert!(!builder.write_continuation(&mut sink).unwrap());
    assert!(!builder.write_finish(&mut sink).unwrap());
    assert!(sink.is_empty());

    builder.write_head(&mut sink).unwrap();
    assert!(builder.write_finish(&mut sink).unwrap());
    assert!(!builder.write_data(&mut sink, b"late").unwrap());
    assert!(!builder.write_finish(&mut sink).unwrap());
    assert_eq!(sink.len(), 2 * FRAME_SIZE);
    assert_eq!(builder.frame_count(), WideUint::from(2u64));
}

#[test]
fn test_pack_and_unpack_files() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("notes.txt");
    let data = sample(2000);
    std::fs::write(&input, &data).unwrap();

    let opts = PackOptions { label: "notes".into(), ..PackOptions::default() };
    let (container, summary) = archive::pack_file(&input, None, &opts).unwrap();
    assert_eq!(container, dir.path().join("notes.txt.cdfs"));
    assert!(summary.finalized);
    assert_eq!(summary.data_frames, 9);
    assert_eq!(std::fs::metadata(&container).unwrap().len(), 11 * FRAME_SIZE as u64);

    std::fs::remove_file(&input).unwrap();
    let (restored, summary) =
        archive::unpack_file(&container, None, &UnpackOptions { strict: true }).unwrap();
    assert_eq!(restored, input);
    assert_eq!(std::fs::read(&restored).unwrap(), data);
    assert_eq!(summary.label, "notes");

    let out = dir.path().join("copy.bin");
    archive::unpack_file(&container, Some(out.as_path()), &UnpackOptions::default()).unwrap();
    assert_eq!(std::fs::read(&out).unwrap(), data);
}

#[test]
fn test_unpack_file_requires_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plain.bin");
    std::fs::write(&path, pack_bytes(b"x", "")).unwrap();
    let err = archive::unpack_file(&path, None, &UnpackOptions::default()).unwrap_err();
    assert!(matches!(err, ArchiveError::InvalidExtension(p) if p == path));
}

#[test]
fn test_inspect_report_on_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    let mut container = pack_bytes(&sample(600), "inspect");
    container[2 * FRAME_SIZE + 12] ^= 0xFF;
    file.write_all(&container).unwrap();
    file.flush().unwrap();

    let mut src = std::fs::File::open(file.path()).unwrap();
    let report = inspect::scan::<_, fn(u64, u64)>(&mut src, None).unwrap();
    assert_eq!(report.total_frames(), 5);
    assert_eq!(report.healthy_frames, 4);
    assert_eq!(report.verdict, IntegrityVerdict::Damaged);
    assert_eq!(report.effective.label, "inspect");
    assert!(report.summary().starts_with("Damaged: 4/5 frames healthy"));
}

struct BrokenPipe;

impl Read for BrokenPipe {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
    }
}

impl Write for BrokenPipe {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_failed_streams_stay_failed() {
    let mut loader = Loader::new();
    assert!(matches!(loader.read_next(&mut BrokenPipe), Err(StreamError::Io(_))));
    assert!(matches!(loader.read_next(&mut BrokenPipe), Err(StreamError::NotReadable)));
    assert!(!loader.has_value());

    let mut builder = Builder::new();
    assert!(matches!(builder.write_head(&mut BrokenPipe), Err(StreamError::Io(_))));
    let mut sink: Vec<u8> = Vec::new();
    assert!(matches!(builder.write_head(&mut sink), Err(StreamError::NotWritable)));
    assert!(sink.is_empty());
}
