//! Byte-copy engine shared by uploads and downloads
//!
//! Copies between a transport stream and a local file with a buffer sized
//! to the transfer and progress reporting quantized to whole-percent steps,
//! so a callback fires at most ~100 times regardless of file size.

use std::io::{self, Read, Write};

/// Copy buffer for ordinary transfers
pub const DEFAULT_BUFFER_SIZE: usize = 128 * 1024;

/// Copy buffer for transfers past the large-file threshold
pub const LARGE_BUFFER_SIZE: usize = 4 * 1024 * 1024;

/// Transfers at or above this size get the large buffer (2 GiB)
pub const LARGE_TRANSFER_THRESHOLD: u64 = 2 * 1024 * 1024 * 1024;

/// Buffer size appropriate for a transfer of `total_size` bytes
pub fn buffer_size_for(total_size: u64) -> usize {
    if total_size >= LARGE_TRANSFER_THRESHOLD {
        LARGE_BUFFER_SIZE
    } else {
        DEFAULT_BUFFER_SIZE
    }
}

/// Progress callback invoked with cumulative bytes present at the
/// destination, including any bytes that were already there before a
/// resumed transfer started.
pub type ProgressFn<'a> = &'a mut dyn FnMut(u64);

/// Quantizes progress to steps of one percent of the total size.
///
/// The step is `total / 100` clamped to at least one byte, so tiny files
/// still report. A resumed transfer starts its counter at the resume
/// offset; only crossings of a step boundary yield a report.
#[derive(Debug)]
pub struct ProgressTracker {
    step: u64,
    transferred: u64,
    last_bucket: u64,
}

impl ProgressTracker {
    /// Track a transfer of `total` bytes of which `already` are in place
    pub fn new(total: u64, already: u64) -> Self {
        let step = (total / 100).max(1);
        Self {
            step,
            transferred: already,
            last_bucket: already / step,
        }
    }

    /// Account for `bytes` more transferred; returns the cumulative count
    /// when a step boundary was crossed
    pub fn advance(&mut self, bytes: u64) -> Option<u64> {
        self.transferred += bytes;
        let bucket = self.transferred / self.step;
        if bucket != self.last_bucket {
            self.last_bucket = bucket;
            Some(self.transferred)
        } else {
            None
        }
    }

    /// Cumulative bytes accounted so far
    pub fn transferred(&self) -> u64 {
        self.transferred
    }
}

/// Copy `reader` to `writer`, reporting quantized progress.
///
/// `total_size` is the full size of the file; `resume_offset` is how many
/// bytes the destination already holds. Returns the number of bytes copied
/// by this call (not counting the resumed prefix). The writer is flushed
/// before returning.
pub fn copy_with_progress<R, W>(
    reader: &mut R,
    writer: &mut W,
    total_size: u64,
    resume_offset: u64,
    mut progress: Option<ProgressFn<'_>>,
) -> io::Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut buffer = vec![0u8; buffer_size_for(total_size)];
    let mut tracker = ProgressTracker::new(total_size, resume_offset);
    let mut copied = 0u64;
    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        writer.write_all(&buffer[..n])?;
        copied += n as u64;
        if let Some(done) = tracker.advance(n as u64) {
            if let Some(report) = progress.as_deref_mut() {
                report(done);
            }
        }
    }
    writer.flush()?;
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_buffer_size_for() {
        assert_eq!(buffer_size_for(0), DEFAULT_BUFFER_SIZE);
        assert_eq!(buffer_size_for(LARGE_TRANSFER_THRESHOLD - 1), DEFAULT_BUFFER_SIZE);
        assert_eq!(buffer_size_for(LARGE_TRANSFER_THRESHOLD), LARGE_BUFFER_SIZE);
    }

    #[test]
    fn test_tracker_reports_at_percent_boundaries() {
        // 200 bytes total, step is 2; three 3-byte reads cross boundaries
        // at 3 and 6 but 3 -> 4 within the same read stays silent.
        let mut tracker = ProgressTracker::new(200, 0);
        assert_eq!(tracker.advance(3), Some(3));
        assert_eq!(tracker.advance(3), Some(6));
        assert_eq!(tracker.advance(1), None);
        assert_eq!(tracker.advance(1), Some(8));
    }

    #[test]
    fn test_tracker_starts_at_resume_offset() {
        let mut tracker = ProgressTracker::new(100, 50);
        assert_eq!(tracker.advance(0), None);
        assert_eq!(tracker.advance(1), Some(51));
    }

    #[test]
    fn test_tracker_tiny_file_uses_unit_step() {
        let mut tracker = ProgressTracker::new(5, 0);
        assert_eq!(tracker.advance(1), Some(1));
        assert_eq!(tracker.advance(4), Some(5));
    }

    #[test]
    fn test_copy_with_progress() {
        let data: Vec<u8> = (0..=255).collect();
        let mut reader = Cursor::new(data.clone());
        let mut sink = Vec::new();
        let mut reports = Vec::new();
        let mut callback = |done: u64| reports.push(done);

        let copied = copy_with_progress(
            &mut reader,
            &mut sink,
            data.len() as u64,
            0,
            Some(&mut callback),
        )
        .unwrap();

        assert_eq!(copied, 256);
        assert_eq!(sink, data);
        // One read covers the whole file; a single report at the end.
        assert_eq!(reports, vec![256]);
    }
}
