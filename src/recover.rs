//! The whole rescue: locate mdat, rebuild the stream, write it, remux it.

use crate::avc::{
    reconstruct_mdat, ElementaryStream, NaluCounts, ParameterSetMode, ParameterSetSource,
    ParameterSets, StopReason, TrustLengthPrefix,
};
use crate::errors::{ContainerError, RecoveryResult};
use crate::mp4::{locate_mdat, MdatRegion};
use crate::options::{RecoveryOptions, TEMP_FILE_SUFFIX};
use crate::remux::{FfmpegRemuxer, Remuxer};
use log::{info, warn};
use std::fs;
use std::io::BufWriter;
use std::path::Path;

/// Outcome of a successful rescue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryReport {
    pub mdat: MdatRegion,
    /// Units recovered from the mdat payload
    pub units: usize,
    pub stop: StopReason,
    /// Last unit cut short, or taken raw after an untrusted prefix
    pub last_unit_truncated: bool,
    /// NAL unit types across the written stream, parameter sets included
    pub counts: NaluCounts,
    pub parameter_sets: Option<ParameterSetSource>,
    pub stream_bytes: usize,
}

impl RecoveryReport {
    /// True when the recording ended in a cut-off or garbled unit
    pub fn is_partial(&self) -> bool {
        self.stop.is_partial()
    }
}

/// Rebuild the elementary stream of an in-memory file.
pub fn rebuild_stream(
    data: &[u8],
    mode: ParameterSetMode,
) -> Result<(ElementaryStream, RecoveryReport), ContainerError> {
    let mdat = locate_mdat(data)?;
    let rec = reconstruct_mdat(data, &mdat, TrustLengthPrefix)?;
    let sets = ParameterSets::resolve(mode, data, &mdat);
    let stream = ElementaryStream::assemble(&rec, sets.as_ref());

    let report = RecoveryReport {
        units: rec.units.len(),
        stop: rec.stop,
        last_unit_truncated: rec.last_unit_truncated(),
        counts: stream.counts(),
        parameter_sets: sets.map(|s| s.source),
        stream_bytes: stream.len(),
        mdat,
    };
    Ok((stream, report))
}

/// Annex B stream of exactly the units found in the mdat payload.
pub fn extract_elementary_stream(data: &[u8]) -> Result<ElementaryStream, ContainerError> {
    rebuild_stream(data, ParameterSetMode::Omit).map(|(stream, _)| stream)
}

/// Rebuild the stream of `input` and write it to `output` as raw H.264.
///
/// Nothing is created at `output` when the input holds no recoverable video.
pub fn extract_to_file(
    input: &Path,
    output: &Path,
    options: &RecoveryOptions,
) -> RecoveryResult<RecoveryReport> {
    let data = read_input(input)?;
    let (stream, report) = rebuild_stream(&data, options.parameter_sets)?;

    // Staged beside `output` so a failed write never leaves a partial stream there
    let dir = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut staged = tempfile::Builder::new()
        .prefix(".")
        .suffix(TEMP_FILE_SUFFIX)
        .tempfile_in(dir)?;
    stream.write_to(BufWriter::new(staged.as_file_mut()))?;
    staged.persist(output).map_err(|e| e.error)?;

    info!("Wrote {} bytes to {}", stream.len(), output.display());
    Ok(report)
}

/// Rescue `input` into a playable `output` using ffmpeg.
pub fn recover_file(
    input: &Path,
    output: &Path,
    options: &RecoveryOptions,
) -> RecoveryResult<RecoveryReport> {
    info!("Recovering {} -> {}", input.display(), output.display());
    let data = read_input(input)?;
    let (stream, report) = rebuild_stream(&data, options.parameter_sets)?;
    let remuxer = FfmpegRemuxer::locate(options.ffmpeg.as_deref())?;
    info!("Muxing with {}", remuxer.program().display());
    remux_stream(&stream, output, options, &remuxer)?;
    Ok(report)
}

/// Rescue `input` into `output` with the given muxer.
pub fn recover_file_with<R: Remuxer + ?Sized>(
    input: &Path,
    output: &Path,
    options: &RecoveryOptions,
    remuxer: &R,
) -> RecoveryResult<RecoveryReport> {
    info!("Recovering {} -> {}", input.display(), output.display());
    let data = read_input(input)?;
    let (stream, report) = rebuild_stream(&data, options.parameter_sets)?;
    remux_stream(&stream, output, options, remuxer)?;
    Ok(report)
}

fn read_input(input: &Path) -> RecoveryResult<Vec<u8>> {
    let data = fs::read(input)?;
    info!("Read {} bytes from {}", data.len(), input.display());
    Ok(data)
}

/// Write the stream to a temporary file, closed before the muxer runs and
/// removed afterwards whatever the outcome.
fn remux_stream<R: Remuxer + ?Sized>(
    stream: &ElementaryStream,
    output: &Path,
    options: &RecoveryOptions,
    remuxer: &R,
) -> RecoveryResult<()> {
    let mut builder = tempfile::Builder::new();
    builder.suffix(TEMP_FILE_SUFFIX);
    let mut temp = match &options.temp_dir {
        Some(dir) => builder.tempfile_in(dir)?,
        None => builder.tempfile()?,
    };
    stream.write_to(BufWriter::new(temp.as_file_mut()))?;
    let temp_path = temp.into_temp_path();

    info!("Extraction complete. Muxing to {}...", output.display());
    let remuxed = remuxer.remux(&temp_path, output, options.frame_rate);

    match temp_path.close() {
        Ok(()) => info!("Temporary files cleaned up."),
        Err(e) => warn!("Failed to remove temporary stream: {}", e),
    }
    remuxed?;
    info!("Recovery successful!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{RecoveryError, RemuxError};
    use crate::remux::MockRemuxer;
    use crate::mp4::r#box::write_box_header;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    /// ftyp, then an mdat of size 0 holding one IDR and one cut-off slice
    fn broken_recording() -> Vec<u8> {
        let mut data = Vec::new();
        write_box_header(&mut data, b"ftyp", 16);
        data.extend_from_slice(b"isom\x00\x00\x02\x00");
        write_box_header(&mut data, b"mdat", 0);
        data.extend_from_slice(&6u32.to_be_bytes());
        data.extend_from_slice(&[0x65, 0x88, 0x84, 0x00, 0x2b, 0xff]);
        data.extend_from_slice(&8u32.to_be_bytes());
        data.extend_from_slice(&[0x41, 0x9a, 0x24, 0x6c, 0x42]);
        data
    }

    fn write_input(dir: &Path, bytes: &[u8]) -> PathBuf {
        let path = dir.join("broken.mp4");
        fs::write(&path, bytes).expect("write input");
        path
    }

    #[test]
    fn test_rebuild_report() {
        let data = broken_recording();
        let (stream, report) = rebuild_stream(&data, ParameterSetMode::Builtin).expect("rebuild");
        assert_eq!(report.units, 2);
        assert!(report.is_partial());
        assert!(report.last_unit_truncated);
        assert_eq!(report.parameter_sets, Some(ParameterSetSource::Builtin));
        assert_eq!(report.counts.idr, 1);
        assert_eq!(report.counts.non_idr, 1);
        assert_eq!(report.counts.parameter_sets, 2);
        assert_eq!(report.stream_bytes, stream.len());
        assert_eq!(report.mdat.start, 24);
    }

    #[test]
    fn test_extract_without_parameter_sets() {
        let data = broken_recording();
        let stream = extract_elementary_stream(&data).expect("extract");
        let mut expected = vec![0, 0, 0, 1, 0x65, 0x88, 0x84, 0x00, 0x2b, 0xff];
        expected.extend_from_slice(&[0, 0, 0, 1, 0x41, 0x9a, 0x24, 0x6c, 0x42]);
        assert_eq!(stream.as_bytes(), expected.as_slice());
    }

    #[test]
    fn test_remux_receives_closed_stream() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = write_input(dir.path(), &broken_recording());
        let output = dir.path().join("fixed.mp4");
        let options = RecoveryOptions::default()
            .with_temp_dir(dir.path())
            .with_parameter_sets(ParameterSetMode::Omit);

        let seen = Arc::new(Mutex::new(None::<(PathBuf, Vec<u8>)>));
        let seen_in_mock = Arc::clone(&seen);
        let mut remuxer = MockRemuxer::new();
        remuxer
            .expect_remux()
            .times(1)
            .withf(|es, _, fps| es.to_string_lossy().ends_with(TEMP_FILE_SUFFIX) && *fps == 24)
            .returning(move |es, _, _| {
                let bytes = fs::read(es).expect("stream present during remux");
                *seen_in_mock.lock().unwrap() = Some((es.to_path_buf(), bytes));
                Ok(())
            });

        let report = recover_file_with(&input, &output, &options, &remuxer).expect("recover");
        assert_eq!(report.units, 2);

        let (temp_path, bytes) = seen.lock().unwrap().take().expect("remux called");
        assert_eq!(temp_path.parent(), Some(dir.path()));
        assert_eq!(bytes, extract_elementary_stream(&broken_recording()).unwrap().into_bytes());
        assert!(!temp_path.exists(), "temporary stream should be removed");
    }

    #[test]
    fn test_remux_failure_propagates_and_cleans_up() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = write_input(dir.path(), &broken_recording());
        let options = RecoveryOptions::default().with_temp_dir(dir.path());

        let mut remuxer = MockRemuxer::new();
        remuxer.expect_remux().times(1).returning(|_, _, _| {
            Err(RemuxError::ToolNotFound {
                tool: "ffmpeg".to_string(),
            })
        });

        let err = recover_file_with(&input, &dir.path().join("fixed.mp4"), &options, &remuxer)
            .unwrap_err();
        assert!(matches!(err, RecoveryError::Remux(_)), "{}", err);

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .filter(|n| n.to_string_lossy().ends_with(TEMP_FILE_SUFFIX))
            .collect();
        assert!(leftovers.is_empty(), "{:?}", leftovers);
    }

    #[test]
    fn test_no_mdat_never_reaches_muxer() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut data = Vec::new();
        write_box_header(&mut data, b"ftyp", 16);
        data.extend_from_slice(b"isom\x00\x00\x02\x00");
        let input = write_input(dir.path(), &data);

        let mut remuxer = MockRemuxer::new();
        remuxer.expect_remux().times(0);

        let err = recover_file_with(
            &input,
            &dir.path().join("fixed.mp4"),
            &RecoveryOptions::default(),
            &remuxer,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            RecoveryError::Container(ContainerError::MdatNotFound { .. })
        ));
    }

    #[test]
    fn test_extract_to_file_writes_stream() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = write_input(dir.path(), &broken_recording());
        let output = dir.path().join("out.h264");
        let options = RecoveryOptions::default().with_parameter_sets(ParameterSetMode::Builtin);

        let report = extract_to_file(&input, &output, &options).expect("extract");
        let written = fs::read(&output).expect("output");
        assert_eq!(written.len(), report.stream_bytes);
        assert!(written.starts_with(&[0, 0, 0, 1, 0x67]));
    }

    #[test]
    fn test_missing_input_is_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = extract_to_file(
            &dir.path().join("absent.mp4"),
            &dir.path().join("out.h264"),
            &RecoveryOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, RecoveryError::Other(_)));
        assert!(!dir.path().join("out.h264").exists());
    }

    #[test]
    fn test_failed_extract_leaves_nothing_behind() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = write_input(dir.path(), &broken_recording());
        // a non-empty directory cannot be replaced by the finished stream
        let output = dir.path().join("taken");
        fs::create_dir(&output).expect("mkdir");
        fs::write(output.join("keep"), b"x").expect("write");

        let err = extract_to_file(&input, &output, &RecoveryOptions::default()).unwrap_err();
        assert!(matches!(err, RecoveryError::Other(_)), "{}", err);
        assert!(output.is_dir());

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .filter(|n| n.to_string_lossy().ends_with(TEMP_FILE_SUFFIX))
            .collect();
        assert!(leftovers.is_empty(), "{:?}", leftovers);
    }
}
