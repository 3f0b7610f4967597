// Driver settings.  Everything has a sensible default so a missing file or a partial JSON document is fine.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Serialize, Deserialize};

use crate::error::{Error, Result};

pub const DEFAULT_TIMEOUT_MS:u64 = 10000;
pub const DEFAULT_MAX_HEADER_SCAN:usize = 25;
pub const DEFAULT_AVERAGE_POLL_LIMIT:u32 = 100_000;
pub const DEFAULT_BANNER:&str = "LINUX VXI-11 LECROY DRIVER";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
	// Timeout used when the caller doesn't pass one explicitly
	pub timeout_ms: u64,
	// How far into a reply to look for the '#' that starts a data block
	pub max_header_scan: usize,
	// Upper bound on INR? polls in wait_all_averages.  None waits for as long as the instrument keeps answering.
	pub average_poll_limit: Option<u32>,
	pub average_poll_interval_ms: u64,
	// Pause inserted before every command sent to the scope
	pub tx_throttle_ms: u64,
	// Message shown at the bottom of the scope screen while we're connected
	pub banner: String,
	// Transfer width selected by init(), 1 or 2
	pub bytes_per_point: u8,
}

impl Default for Settings {
	fn default() -> Self {
		Self {
			timeout_ms: DEFAULT_TIMEOUT_MS,
			max_header_scan: DEFAULT_MAX_HEADER_SCAN,
			average_poll_limit: Some(DEFAULT_AVERAGE_POLL_LIMIT),
			average_poll_interval_ms: 0,
			tx_throttle_ms: 0,
			banner: DEFAULT_BANNER.to_owned(),
			bytes_per_point: 2,
		}
	}
}

impl Settings {

	pub fn from_json_str(s:&str) -> Result<Self> {
		let settings:Settings = serde_json::from_str(s).map_err(|e| Error::Config(e.to_string()))?;
		settings.validate()?;
		Ok(settings)
	}

	pub fn from_json_file<P: AsRef<Path>>(path:P) -> Result<Self> {
		let path = path.as_ref();
		let text = fs::read_to_string(path).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
		Self::from_json_str(&text)
	}

	pub fn validate(&self) -> Result<()> {
		if self.bytes_per_point != 1 && self.bytes_per_point != 2 {
			return Err(Error::Config(format!("bytes_per_point must be 1 or 2, got {}", self.bytes_per_point)));
		}
		if self.max_header_scan == 0 {
			return Err(Error::Config("max_header_scan must be at least 1".to_owned()));
		}
		Ok(())
	}

	pub fn timeout(&self) -> Duration { Duration::from_millis(self.timeout_ms) }
	pub fn tx_throttle(&self) -> Duration { Duration::from_millis(self.tx_throttle_ms) }
	pub fn average_poll_interval(&self) -> Duration { Duration::from_millis(self.average_poll_interval_ms) }

}
