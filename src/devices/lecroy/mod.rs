
use std::thread;
use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Serialize, Deserialize};

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::transport::{self, Transport};
use crate::utils::format_g;
use crate::vxi11::CoreClient;

pub mod block;
pub mod channel;
pub mod metadata;
pub mod postprocess;
pub mod transfer;

use channel::Channel;

lazy_static! {
	static ref TRMD_RE: Regex = Regex::new("(AUTO|NORM|SINGLE|STOP)").unwrap();
	static ref INT_RE: Regex  = Regex::new(r"^\s*([-+]?\d+)").unwrap();
}

// INR? bits raised when math functions F1..F4 finish a processing cycle
pub const INR_FUNCTION_DONE_SHIFT:u32 = 8;
const AVERAGING_FUNCTIONS:u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TriggerMode { Auto, Norm, Single, Stop }

impl TriggerMode {
	fn as_str(&self) -> &'static str { match self {
		TriggerMode::Auto   => "AUTO",
		TriggerMode::Norm   => "NORM",
		TriggerMode::Single => "SINGLE",
		TriggerMode::Stop   => "STOP",
	}}
}

// What kind of acquisition a read belongs to.  Together with whether this is a fresh acquisition or another
// channel of the one just taken, it decides the `clear_sweeps` / `arm_and_wait` pair for
// LeCroy::get_data.  Reading several channels of one acquisition must not clear or re-arm, or the
// traces stop being synchronous.
//
// | Mode               | Channel | New? | clear_sweeps | arm_and_wait |
// |--------------------|---------|------|--------------|--------------|
// | Realtime           | 1-4     | yes  | don't care   | true         |
// | Realtime           | 1-4     | no   | don't care   | false        |
// | Segmented          | 1-4     | yes  | don't care   | true         |
// | Segmented          | 1-4     | no   | don't care   | false        |
// | Averaged           | A-D     | yes  | true         | false        |
// | Averaged           | A-D     | no   | false        | false        |
// | Segmented averages | A-D     | yes  | true         | true         |
// | Segmented averages | A-D     | no   | false        | false        |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcquisitionMode { Realtime, Segmented, Averaged, SegmentedAveraged }

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquireFlags {
	pub clear_sweeps: bool,
	pub arm_and_wait: bool,
}

impl AcquisitionMode {

	pub fn reads_math_channel(&self) -> bool {
		matches!(self, AcquisitionMode::Averaged | AcquisitionMode::SegmentedAveraged)
	}

	// The "don't care" rows come out as false; get_data ignores clear_sweeps for acquisition channels anyway
	pub fn flags(&self, new_acquisition:bool) -> AcquireFlags {
		match self {
			AcquisitionMode::Realtime | AcquisitionMode::Segmented =>
				AcquireFlags{ clear_sweeps: false, arm_and_wait: new_acquisition },
			AcquisitionMode::Averaged =>
				AcquireFlags{ clear_sweeps: new_acquisition, arm_and_wait: false },
			AcquisitionMode::SegmentedAveraged =>
				AcquireFlags{ clear_sweeps: new_acquisition, arm_and_wait: new_acquisition },
		}
	}

}

// INSP? replies carry the parameter name, padding, a ':' and one space before the value, sometimes inside quotes
fn insp_value(reply:&str) -> Result<&str> {
	let colon = reply.find(':').ok_or_else(|| Error::BadReply(reply.to_owned()))?;
	Ok(reply.get(colon + 2..).unwrap_or(""))
}

pub fn parse_insp_long(reply:&str) -> Result<i64> {
	let value = insp_value(reply)?;
	let cap = INT_RE.captures(value).ok_or_else(|| Error::BadReply(reply.to_owned()))?;
	cap[1].parse::<i64>().map_err(|_| Error::BadReply(reply.to_owned()))
}

pub fn parse_insp_double(reply:&str) -> Result<f64> {
	let value = insp_value(reply)?;
	transport::parse_number(value).map_err(|_| Error::BadReply(reply.to_owned()))
}

pub struct LeCroy<T: Transport> {
	transport: T,
	settings: Settings,
}

impl LeCroy<CoreClient> {

	pub fn open(host:&str, settings:Settings) -> Result<Self> {
		settings.validate()?;
		let core = CoreClient::open(host)?;
		log::debug!("connected to LeCroy at {}", host);
		Ok(Self::with_transport(core, settings))
	}

}

impl<T: Transport> LeCroy<T> {

	pub fn with_transport(mut transport:T, settings:Settings) -> Self {
		transport.set_default_timeout(settings.timeout());
		Self{ transport, settings }
	}

	pub fn settings(&self) -> &Settings { &self.settings }
	pub fn transport(&self) -> &T { &self.transport }
	pub fn transport_mut(&mut self) -> &mut T { &mut self.transport }

	// Clears the screen message and ends the session, handing the transport back
	pub fn close(mut self) -> Result<T> {
		self.send("MSG")?;
		self.transport.close()?;
		Ok(self.transport)
	}

	fn throttle(&self) {
		let pause = self.settings.tx_throttle();
		if pause > Duration::from_millis(0) { thread::sleep(pause); }
	}

	pub fn send(&mut self, cmd:&str) -> Result<()> {
		self.throttle();
		log::trace!("-> {}", cmd);
		self.transport.send(cmd)?;
		Ok(())
	}

	pub fn query(&mut self, cmd:&str, timeout:Duration) -> Result<String> {
		self.throttle();
		let reply = self.transport.send_and_receive(cmd, timeout)?;
		log::trace!("-> {} <- {:?}", cmd, reply);
		Ok(reply)
	}

	pub fn numeric(&mut self, cmd:&str, timeout:Duration) -> Result<f64> {
		self.throttle();
		let value = self.transport.obtain_numeric(cmd, timeout)?;
		log::trace!("-> {} <- {}", cmd, value);
		Ok(value)
	}

	// One-time setup for data transfer: definite-length block headers, 16-bit (or 8-bit per the settings)
	// binary words, no reply headers, LSB first, and a banner at the bottom of the screen.
	pub fn init(&mut self) -> Result<()> {
		let width = self.settings.bytes_per_point;
		self.set_transfer_width(width).map_err(|e| {
			log::error!("could not send the very first command to the scope: {}", e);
			e
		})?;
		self.send("COMM_HEADER OFF")?;
		self.send("COMM_ORDER LO")?;
		let banner = format!("MSG \"{}\"", self.settings.banner);
		self.send(&banner)
	}

	pub fn set_transfer_width(&mut self, bytes_per_point:u8) -> Result<()> {
		match bytes_per_point {
			1 => self.send("COMM_FORMAT DEF9,BYTE,BIN"),
			2 => self.send("COMM_FORMAT DEF9,WORD,BIN"),
			n => Err(Error::InvalidArgument(format!("transfers are 1 or 2 bytes per point, not {}", n))),
		}
	}

	pub fn bytes_per_point(&mut self, timeout:Duration) -> Result<u8> {
		let reply = self.query("COMM_FORMAT?", timeout)?;
		Ok(if reply.contains("WORD") { 2 } else { 1 })
	}

	pub fn insp_long(&mut self, cmd:&str, timeout:Duration) -> Result<i64> {
		let reply = self.query(cmd, timeout)?;
		parse_insp_long(&reply)
	}

	pub fn insp_double(&mut self, cmd:&str, timeout:Duration) -> Result<f64> {
		let reply = self.query(cmd, timeout)?;
		parse_insp_double(&reply)
	}

	// Bytes the next `WF? DAT1` will return for `chan`.  The scope is asked twice because the first answer
	// after a timebase or sample rate change is often stale.
	pub fn calculate_byte_count(&mut self, chan:Channel, timeout:Duration) -> Result<u64> {
		let cmd = format!("{}:INSP? WAVE_ARRAY_1", chan.source());
		self.insp_long(&cmd, timeout)?;
		let n = self.insp_long(&cmd, timeout)?;
		if n < 0 { return Err(Error::BadReply(format!("negative WAVE_ARRAY_1 ({})", n))); }
		Ok(n as u64)
	}

	// Faster estimate from VBS, which tracks setting changes immediately.  Math channels return one point
	// more than NumPoints and ignore segmentation (they hold the average); acquisition channels return two
	// more per segment.
	pub fn calculate_byte_count_from_vbs(&mut self, chan:Channel, timeout:Duration) -> Result<u64> {
		let points = self.numeric("VBS? 'Return=app.Acquisition.Horizontal.NumPoints'", timeout)? as u64;
		let bpp = self.bytes_per_point(timeout)? as u64;
		if chan.is_derived() {
			Ok(bpp * (1 + points))
		} else {
			let segments = self.segment_count()? as u64;
			Ok(bpp * segments * (2 + points))
		}
	}

	pub fn set_trigger_mode(&mut self, mode:TriggerMode) -> Result<()> {
		self.send(&format!("TRMD {}", mode.as_str()))
	}

	pub fn trigger_mode(&mut self, timeout:Duration) -> Result<TriggerMode> {
		let reply = self.query("TRMD?", timeout)?;
		let cap = TRMD_RE.captures(&reply).ok_or_else(|| Error::BadReply(reply.clone()))?;
		Ok(match &cap[1] {
			"AUTO"   => TriggerMode::Auto,
			"NORM"   => TriggerMode::Norm,
			"SINGLE" => TriggerMode::Single,
			_        => TriggerMode::Stop,
		})
	}

	// One-liners
	pub fn single(&mut self) -> Result<()> { self.send("ARM;WAIT") }
	pub fn stop(&mut self)   -> Result<()> { self.send("STOP") }

	// Resets the averaging registers.  INR? has to be read first to clear it; the value doesn't matter.
	pub fn clear_sweeps(&mut self) -> Result<()> {
		let timeout = self.settings.timeout();
		self.numeric("INR?", timeout)?;
		self.send("CLSW")
	}

	// INR? mask of the math functions that will signal when an average completes: displayed F1-F4 whose
	// definition uses AVG.
	pub fn averaging_mask(&mut self, timeout:Duration) -> Result<u32> {
		let mut mask:u32 = 0;
		let mut displayed = [false; AVERAGING_FUNCTIONS as usize];
		for n in 1..=AVERAGING_FUNCTIONS {
			let reply = self.query(&format!("F{}:TRACE?", n), timeout)?;
			displayed[(n - 1) as usize] = reply.contains("ON");
		}
		for n in 1..=AVERAGING_FUNCTIONS {
			if !displayed[(n - 1) as usize] { continue; }
			let reply = self.query(&format!("F{}:DEF?", n), timeout)?;
			if reply.contains("AVG") {
				mask |= 1 << (INR_FUNCTION_DONE_SHIFT + (n - 1) as u32);
			}
		}
		Ok(mask)
	}

	// Polls INR? until every averaging math function has reported completion at least once.  Bits are OR-ed
	// into a running total, so functions finishing on different polls still count.  The poll budget comes
	// from the settings; transport failures inside the loop end it immediately.
	pub fn wait_all_averages(&mut self, timeout:Duration) -> Result<()> {
		let mask = self.averaging_mask(timeout)?;
		let limit = self.settings.average_poll_limit;
		let interval = self.settings.average_poll_interval();
		log::debug!("waiting for averages, INR mask {:#06x}", mask);

		let mut seen:u32 = 0;
		let mut polls:u32 = 0;
		loop {
			let inr = self.numeric("INR?", timeout)?;
			polls += 1;
			seen |= inr as u32;
			if seen & mask == mask {
				log::debug!("averages complete after {} polls", polls);
				return Ok(());
			}
			if let Some(limit) = limit {
				if polls >= limit { return Err(Error::AveragesTimedOut{ polls }); }
			}
			if interval > Duration::from_millis(0) { thread::sleep(interval); }
		}
	}

	// Sets up `chan` (or its twin) for summed averaging over `count` sweeps and returns the channel that now
	// holds the data to read.  Either member of an acquisition/math pair can be passed: '1' and 'A' both set
	// up F1 averaging C1.  `count <= 1` turns the math channel off and shows the plain acquisition channel.
	pub fn set_averages(&mut self, chan:Channel, count:u32) -> Result<Channel> {
		let (math, acq) = if chan.is_derived() { (chan, chan.related()) } else { (chan.related(), chan) };

		if count > 1 {
			self.send(&format!("{}:DEF EQN, 'AVG({})',AVERAGETYPE,SUMMED,SWEEPS,{} SWEEP;{}:TRACE ON;{}:TRACE OFF",
				math.source(), acq.source(), count, math.source(), acq.source()))?;
			log::debug!("{} now averages {} over {} sweeps", math, acq, count);
			Ok(math)
		} else {
			self.send(&format!("{}:TRACE OFF;{}:TRACE ON", math.source(), acq.source()))?;
			Ok(acq)
		}
	}

	pub fn get_averages(&mut self, chan:Channel, timeout:Duration) -> Result<u32> {
		let math = if chan.is_derived() { chan } else { chan.related() };
		let sweeps = self.numeric(&format!("VBS? 'Return=app.Math.{}.Operator1Setup.Sweeps'", math.source()), timeout)?;
		Ok(sweeps.max(0.0) as u32)
	}

	// Averaging across the segments of a sequence acquisition: `count` segments, then a math channel
	// averaging however many segments the scope actually agreed to.
	pub fn set_segmented_averages(&mut self, chan:Channel, count:u32, arm:bool) -> Result<Channel> {
		let actual = self.set_segmentation(count, arm)?;
		self.set_averages(chan, actual)
	}

	pub fn segmented_status(&mut self) -> Result<bool> {
		let timeout = self.settings.timeout();
		let reply = self.query("VBS? 'Return=app.Acquisition.Horizontal.SampleMode'", timeout)?;
		Ok(reply.trim_start().starts_with("Sequence"))
	}

	// Number of segments in sequence mode, 1 when not segmented
	pub fn segment_count(&mut self) -> Result<u32> {
		if self.segmented_status()? {
			let timeout = self.settings.timeout();
			let n = self.numeric("VBS? 'Return=app.Acquisition.Horizontal.NumSegments'", timeout)?;
			Ok(n.max(0.0) as u32)
		} else {
			Ok(1)
		}
	}

	// Requests `count` segments (sequence mode off for 0 or 1) and returns what the scope actually chose
	pub fn set_segmentation(&mut self, count:u32, arm:bool) -> Result<u32> {
		let cmd = match (count > 1, arm) {
			(true, false)  => format!("SEQ ON,{}", count),
			(true, true)   => format!("SEQ ON,{};ARM", count),
			(false, false) => "SEQ OFF".to_owned(),
			(false, true)  => "SEQ OFF;ARM".to_owned(),
		};
		self.send(&cmd)?;
		let actual = self.segment_count()?;
		if actual != count.max(1) {
			log::debug!("asked for {} segments, scope chose {}", count, actual);
		}
		Ok(actual)
	}

	pub fn display_channel(&mut self, chan:Channel, on:bool) -> Result<()> {
		self.send(&format!("{}:TRACE {}", chan.source(), if on { "ON" } else { "OFF" }))
	}

	// Edge trigger on `chan`
	pub fn set_trigger_channel(&mut self, chan:Channel) -> Result<()> {
		self.send(&format!("TRSE EDGE,SR,{}", chan.source()))
	}

	// Sample rate either given directly or implied by a minimum number of points across the ten divisions
	// of the screen.  If both are given the explicit rate is applied last and wins.  The returned rate is
	// what the scope reports afterwards, which may differ from either request.
	pub fn set_sample_rate(&mut self, rate:Option<f64>, min_points:Option<u64>, timeout:Duration) -> Result<f64> {
		if let Some(points) = min_points.filter(|&p| p > 0) {
			let time_range = self.numeric("TIME_DIV?", timeout)? * 10.0;
			if time_range > 0.0 {
				let wanted = points as f64 / time_range;
				self.send(&format!("VBS 'app.Acquisition.Horizontal.SampleRate={}'", format_g(wanted)))?;
			} else {
				log::warn!("scope reported a time range of {}, not deriving a sample rate from {} points", time_range, points);
			}
		}

		if let Some(rate) = rate.filter(|&r| r > 0.0) {
			self.send(&format!("VBS 'app.Acquisition.Horizontal.SampleRate={}'", format_g(rate)))?;
		}

		self.numeric("VBS? 'Return=app.Acquisition.Horizontal.SampleRate'", timeout)
	}

}
