// The `.wf`/`.wfi` file pair an acquisition is saved as.
//
// `name.wf` is the raw block payload exactly as the scope sent it.  `name.wfi` is a small text file that
// describes it: each field on its own line below a `%` comment naming it, with a blank line after every field.
// MATLAB/Octave loaders read the numbers in a fixed order, so neither the order nor the comment text
// should change.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Serialize, Deserialize};

use crate::error::{Error, Result};
use crate::transport::Transport;
use crate::utils::format_g;
use super::channel::Channel;
use super::LeCroy;

// Older LeCroy loaders dropped the last point unless told otherwise
const KEEP_ALL_POINTS:u8 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveformMetadata {
	pub byte_count: u64,
	pub vertical_gain: f64,
	pub vertical_offset: f64,
	pub horizontal_interval: f64,
	pub horizontal_offset: f64,
	pub trace_count: u32,
	pub bytes_per_point: u8,
	pub segment_count: u32,
}

impl WaveformMetadata {

	// A segment count of 0 means the scope gave a nonsense answer; the raw totals are written as they are

	pub fn bytes_per_trace(&self) -> u64 {
		match self.segment_count {
			0 => self.byte_count,
			n => self.byte_count / n as u64,
		}
	}

	pub fn total_traces(&self) -> u64 {
		match self.segment_count {
			0 => self.trace_count as u64,
			n => self.trace_count as u64 * n as u64,
		}
	}

	pub fn render(&self, file_name:&str, captured_by:&str) -> String {
		let mut s = String::new();
		s += &format!("% {}\n", file_name);
		s += &format!("% Waveform captured using {}\n\n", captured_by);
		s += &format!("% Number of bytes:\n{}\n\n", self.bytes_per_trace());
		s += &format!("% Vertical gain:\n{}\n\n", format_g(self.vertical_gain));
		s += &format!("% Vertical offset:\n{}\n\n", format_g(self.vertical_offset));
		s += &format!("% Horizontal interval:\n{}\n\n", format_g(self.horizontal_interval));
		s += &format!("% Horizontal offset:\n{}\n\n", format_g(self.horizontal_offset));
		s += &format!("% Number of traces:\n{}\n\n", self.total_traces());
		s += &format!("% Number of bytes per data-point:\n{}\n\n", self.bytes_per_point);
		s += &format!("% Keep all datapoints (0 or missing knocks off 1 point, legacy lecroy):\n{}\n\n", KEEP_ALL_POINTS);
		s
	}

	pub fn write_wfi<P: AsRef<Path>>(&self, path:P, captured_by:&str) -> Result<()> {
		let path = path.as_ref();
		let text = self.render(&path.display().to_string(), captured_by);
		fs::write(path, text).map_err(|source| Error::FileWrite{ path: path.to_path_buf(), source })
	}

}

// `base.wf` and `base.wfi`, appending the extensions rather than replacing one that's already there
pub fn file_pair<P: AsRef<Path>>(base:P) -> (PathBuf, PathBuf) {
	let base = base.as_ref().as_os_str();
	let mut wf = base.to_os_string();
	wf.push(".wf");
	let mut wfi = base.to_os_string();
	wfi.push(".wfi");
	(PathBuf::from(wf), PathBuf::from(wfi))
}

// Writes a block payload (or several, back to back) as the `.wf` data file
pub fn write_waveform<P: AsRef<Path>>(path:P, payload:&[u8]) -> Result<()> {
	let path = path.as_ref();
	let file_err = |source: std::io::Error| Error::FileWrite{ path: path.to_path_buf(), source };
	let mut f = fs::File::create(path).map_err(file_err)?;
	f.write_all(payload).map_err(file_err)?;
	log::debug!("wrote {} bytes to {}", payload.len(), path.display());
	Ok(())
}

impl<T: Transport> LeCroy<T> {

	// Everything the `.wfi` file needs for data read from `chan`.  `byte_count` defaults to a fresh
	// WAVE_ARRAY_1 query and `voltage_offset` to the scope's VERTICAL_OFFSET.  An average collapses the
	// segments it was computed over, so math and memory channels always count as one segment.
	pub fn query_metadata(&mut self, chan:Channel, trace_count:u32, bytes_per_point:u8, byte_count:Option<u64>,
		voltage_offset:Option<f64>, timeout:Duration) -> Result<WaveformMetadata> {

		let byte_count = match byte_count {
			Some(n) => n,
			None    => self.calculate_byte_count(chan, timeout)?,
		};

		let src = chan.source();
		let horizontal_interval = self.insp_double(&format!("{}:INSP? HORIZ_INTERVAL", src), timeout)?;
		let horizontal_offset   = self.insp_double(&format!("{}:INSP? HORIZ_OFFSET", src), timeout)?;
		let vertical_gain       = self.insp_double(&format!("{}:INSP? VERTICAL_GAIN", src), timeout)?;
		let vertical_offset = match voltage_offset {
			Some(v) => v,
			None    => self.insp_double(&format!("{}:INSP? VERTICAL_OFFSET", src), timeout)?,
		};

		let segment_count = if chan.is_derived() { 1 } else { self.segment_count()? };

		Ok(WaveformMetadata{
			byte_count,
			vertical_gain,
			vertical_offset,
			horizontal_interval,
			horizontal_offset,
			trace_count,
			bytes_per_point,
			segment_count,
		})
	}

	// Queries the metadata for `chan` and writes it to `path`.  Returns the raw (un-normalised) byte count,
	// which is what the caller needs to size the next read.
	pub fn write_wfi_file<P: AsRef<Path>>(&mut self, path:P, chan:Channel, captured_by:&str, trace_count:u32,
		bytes_per_point:u8, byte_count:Option<u64>, voltage_offset:Option<f64>, timeout:Duration) -> Result<u64> {

		let meta = self.query_metadata(chan, trace_count, bytes_per_point, byte_count, voltage_offset, timeout)?;
		meta.write_wfi(path, captured_by)?;
		Ok(meta.byte_count)
	}

}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::Settings;
	use crate::test_support::{Call, MockTransport};

	fn sample() -> WaveformMetadata {
		WaveformMetadata{
			byte_count: 40008,
			vertical_gain: 3.125e-5,
			vertical_offset: -0.02,
			horizontal_interval: 1e-10,
			horizontal_offset: -5e-7,
			trace_count: 1,
			bytes_per_point: 2,
			segment_count: 2,
		}
	}

	#[test]
	fn render_layout() {
		let expected = "\
% trace.wfi
% Waveform captured using lgetwf

% Number of bytes:
20004

% Vertical gain:
3.125e-05

% Vertical offset:
-0.02

% Horizontal interval:
1e-10

% Horizontal offset:
-5e-07

% Number of traces:
2

% Number of bytes per data-point:
2

% Keep all datapoints (0 or missing knocks off 1 point, legacy lecroy):
1

";
		assert_eq!(sample().render("trace.wfi", "lgetwf"), expected);
	}

	#[test]
	fn zero_segments_writes_raw_totals() {
		let meta = WaveformMetadata{ segment_count: 0, trace_count: 3, ..sample() };
		assert_eq!(meta.bytes_per_trace(), 40008);
		assert_eq!(meta.total_traces(), 3);
	}

	#[test]
	fn file_pair_appends_extensions() {
		let (wf, wfi) = file_pair("/tmp/run.3");
		assert_eq!(wf, PathBuf::from("/tmp/run.3.wf"));
		assert_eq!(wfi, PathBuf::from("/tmp/run.3.wfi"));
	}

	#[test]
	fn writes_both_files() {
		let dir = tempfile::tempdir().unwrap();
		let (wf, wfi) = file_pair(dir.path().join("trace"));

		write_waveform(&wf, &[1, 2, 3, 4]).unwrap();
		sample().write_wfi(&wfi, "test").unwrap();

		assert_eq!(fs::read(&wf).unwrap(), vec![1, 2, 3, 4]);
		let text = fs::read_to_string(&wfi).unwrap();
		assert!(text.starts_with(&format!("% {}\n", wfi.display())));
		assert!(text.contains("% Number of bytes:\n20004\n\n"));
	}

	#[test]
	fn unwritable_path_is_a_file_error() {
		let dir = tempfile::tempdir().unwrap();
		let missing = dir.path().join("no/such/dir/trace.wf");
		match write_waveform(&missing, b"x") {
			Err(Error::FileWrite{ path, .. }) => assert_eq!(path, missing),
			other => panic!("expected FileWrite, got {:?}", other),
		}
		assert!(matches!(sample().write_wfi(dir.path().join("no/trace.wfi"), "x"), Err(Error::FileWrite{ .. })));
	}

	#[test]
	fn acquisition_channel_metadata_is_normalised_by_segments() {
		let mut dev = LeCroy::with_transport(MockTransport::new(), Settings::default());
		dev.transport_mut()
			.reply("WAVE_ARRAY_1 : 4000").reply("WAVE_ARRAY_1 : 40000")
			.reply("HORIZ_INTERVAL : 1e-9")
			.reply("HORIZ_OFFSET : -2.5e-6")
			.reply("VERTICAL_GAIN : 3.125e-5")
			.reply("VERTICAL_OFFSET : 0.1")
			.reply("Sequence").reply("10");

		let meta = dev.query_metadata(Channel::acquisition(2).unwrap(), 1, 2, None, None, Duration::from_secs(1)).unwrap();
		assert_eq!(meta.byte_count, 40000);
		assert_eq!(meta.bytes_per_trace(), 4000);
		assert_eq!(meta.total_traces(), 10);
		assert_eq!(meta.vertical_offset, 0.1);
		assert_eq!(dev.transport().calls[2], Call::Query("C2:INSP? HORIZ_INTERVAL".to_owned()));
		assert_eq!(dev.transport().unused_replies(), 0);
	}

	#[test]
	fn math_channel_with_offset_override() {
		let mut dev = LeCroy::with_transport(MockTransport::new(), Settings::default());
		dev.transport_mut()
			.reply("HORIZ_INTERVAL : 1e-9")
			.reply("HORIZ_OFFSET : 0")
			.reply("VERTICAL_GAIN : 1e-3");

		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("avg.wfi");
		let n = dev.write_wfi_file(&path, Channel::function(1).unwrap(), "test", 1, 2, Some(2002), Some(-0.5),
			Duration::from_secs(1)).unwrap();

		assert_eq!(n, 2002);
		// no VERTICAL_OFFSET and no segment queries
		assert_eq!(dev.transport().calls.len(), 3);
		let text = fs::read_to_string(&path).unwrap();
		assert!(text.contains("% Vertical offset:\n-0.5\n\n"));
		assert!(text.contains("% Number of traces:\n1\n\n"));
	}
}
