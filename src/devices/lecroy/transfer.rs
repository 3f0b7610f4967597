// Getting a waveform off the scope.  Which of the clear/arm steps run depends on the channel and on the
// flags the caller picked from the AcquisitionMode table; reading a second channel of the same acquisition
// must skip both or the channels stop being synchronous.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::transport::Transport;
use super::block;
use super::channel::Channel;
use super::{AcquisitionMode, LeCroy};

impl<T: Transport> LeCroy<T> {

	// Reads chan into buf and returns the number of bytes written.  arm_and_wait defaults to true.
	//   1. derived channel and clear_sweeps: clear the averaging registers
	//   2. arm_and_wait: ARM;WAIT
	//   3. arm_and_wait or an acquisition channel: *OPC? has to answer 1
	//   4. derived channel and clear_sweeps: wait for every displayed average to finish
	//   5. WF? DAT1 and decode the block
	// A #0 block (no data) comes back as Ok(0).  A block bigger than buf fills buf and returns BufferOverflow.
	pub fn get_data(&mut self, chan:Channel, clear_sweeps:bool, arm_and_wait:Option<bool>, buf:&mut [u8],
		timeout:Duration) -> Result<usize> {

		let arm_and_wait = arm_and_wait.unwrap_or(true);
		let derived = chan.is_derived();

		if derived && clear_sweeps {
			self.clear_sweeps()?;
		}

		if arm_and_wait {
			self.send("ARM;WAIT")?;
		}

		if arm_and_wait || !derived {
			let reply = self.numeric("*OPC?", timeout)?;
			if reply != 1.0 {
				log::warn!("*OPC? answered {} while reading {}, no data taken", reply, chan);
				return Err(Error::AcquisitionIncomplete{ reply });
			}
		}

		if derived && clear_sweeps {
			self.wait_all_averages(timeout)?;
		}

		self.send(&format!("{}:WF? DAT1", chan.source()))?;
		let max_len = buf.len() + self.settings().max_header_scan;
		let raw = self.transport_mut().receive_raw(max_len, timeout)?;

		let block = block::decode(&raw, self.settings().max_header_scan)?;
		if block.is_empty() {
			log::warn!("{} returned an empty block", chan);
		}
		let n = block.copy_into(buf)?;
		log::debug!("read {} bytes from {}", n, chan);
		Ok(n)
	}

	// get_data with the flags taken from the mode table
	pub fn acquire(&mut self, chan:Channel, mode:AcquisitionMode, new_acquisition:bool, buf:&mut [u8],
		timeout:Duration) -> Result<usize> {

		if mode.reads_math_channel() != chan.is_derived() {
			log::warn!("{:?} acquisitions normally read {} channels, not {}",
				mode, if mode.reads_math_channel() { "math" } else { "acquisition" }, chan);
		}
		let flags = mode.flags(new_acquisition);
		self.get_data(chan, flags.clear_sweeps, Some(flags.arm_and_wait), buf, timeout)
	}

	// Buffer sized from WAVE_ARRAY_1, truncated to what actually arrived
	pub fn get_data_vec(&mut self, chan:Channel, clear_sweeps:bool, arm_and_wait:Option<bool>,
		timeout:Duration) -> Result<Vec<u8>> {

		let capacity = self.calculate_byte_count(chan, timeout)? as usize;
		let mut buf = vec![0u8; capacity];
		let n = self.get_data(chan, clear_sweeps, arm_and_wait, &mut buf, timeout)?;
		buf.truncate(n);
		Ok(buf)
	}

}
