// The four round trips the LeCroy code needs from whatever is carrying its commands.  CoreClient is the real
// thing; the device code only ever sees this trait, which is also what the tests script against.

use std::io::{self, Error, ErrorKind};
use std::str;
use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;

use crate::vxi11::CoreClient;

lazy_static! {
	static ref NUMBER_RE: Regex = Regex::new(r"^\s*([-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?)").unwrap();
}

// Replies to plain queries are short; waveform data goes through receive_raw with an explicit size
pub const MAX_TEXT_REPLY:usize = 4096;

pub trait Transport {

	fn send(&mut self, cmd:&str) -> io::Result<()>;

	fn send_and_receive(&mut self, cmd:&str, timeout:Duration) -> io::Result<String>;

	fn receive_raw(&mut self, max_len:usize, timeout:Duration) -> io::Result<Vec<u8>>;

	fn obtain_numeric(&mut self, query:&str, timeout:Duration) -> io::Result<f64> {
		let reply = self.send_and_receive(query, timeout)?;
		parse_number(&reply)
	}

	// Timeout for commands that don't wait for a reply
	fn set_default_timeout(&mut self, _timeout:Duration) {}

	// Tear down whatever session the transport holds; nothing to do by default
	fn close(&mut self) -> io::Result<()> { Ok(()) }

}

// Pull the leading number out of a reply, ignoring whatever follows it (units, newline)
pub fn parse_number(reply:&str) -> io::Result<f64> {
	let cap = NUMBER_RE.captures(reply)
		.ok_or_else(|| Error::new(ErrorKind::InvalidData, format!("Expected a number in reply {:?}", reply)))?;
	cap[1].parse::<f64>()
		.map_err(|_| Error::new(ErrorKind::InvalidData, format!("Unable to parse {:?} as a number", &cap[1])))
}

impl Transport for CoreClient {

	fn send(&mut self, cmd:&str) -> io::Result<()> {
		let timeout = self.default_timeout();
		self.write(cmd.as_bytes(), timeout)
	}

	fn set_default_timeout(&mut self, timeout:Duration) { CoreClient::set_default_timeout(self, timeout) }

	fn send_and_receive(&mut self, cmd:&str, timeout:Duration) -> io::Result<String> {
		self.write(cmd.as_bytes(), timeout)?;
		let reply = self.read(MAX_TEXT_REPLY, timeout)?;
		str::from_utf8(&reply)
			.map(|s| s.to_owned())
			.map_err(|_| Error::new(ErrorKind::InvalidData, "Unable to parse response as UTF-8"))
	}

	fn receive_raw(&mut self, max_len:usize, timeout:Duration) -> io::Result<Vec<u8>> {
		self.read(max_len, timeout)
	}

	fn close(&mut self) -> io::Result<()> {
		if self.is_linked() { self.destroy_link() } else { Ok(()) }
	}

}
