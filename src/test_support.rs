// Test-only helpers: a scripted transport that records every round trip, and a logger that keeps the warnings
// emitted on the current thread so tests can count them.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, Error, ErrorKind};
use std::sync::Once;
use std::time::Duration;

use crate::transport::{self, Transport};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
	Send(String),
	Query(String),
	Numeric(String),
	Receive(usize),
}

#[derive(Debug)]
pub enum Reply {
	Text(String),
	Fail(ErrorKind),
}

#[derive(Default)]
pub struct MockTransport {
	pub calls: Vec<Call>,
	replies: VecDeque<Reply>,
	blocks: VecDeque<Vec<u8>>,
	pub closed: bool,
	pub default_timeout: Option<Duration>,
}

impl MockTransport {

	pub fn new() -> Self { Self::default() }

	pub fn reply(&mut self, text:&str) -> &mut Self {
		self.replies.push_back(Reply::Text(text.to_owned()));
		self
	}

	pub fn fail(&mut self, kind:ErrorKind) -> &mut Self {
		self.replies.push_back(Reply::Fail(kind));
		self
	}

	pub fn block(&mut self, raw:&[u8]) -> &mut Self {
		self.blocks.push_back(raw.to_vec());
		self
	}

	pub fn sent(&self) -> Vec<String> {
		self.calls.iter().filter_map(|c| match c { Call::Send(s) => Some(s.clone()), _ => None }).collect()
	}

	pub fn unused_replies(&self) -> usize { self.replies.len() + self.blocks.len() }

	fn next_reply(&mut self, cmd:&str) -> io::Result<String> {
		match self.replies.pop_front() {
			Some(Reply::Text(s)) => Ok(s),
			Some(Reply::Fail(kind)) => Err(Error::new(kind, "scripted failure")),
			None => Err(Error::new(ErrorKind::Other, format!("no scripted reply for {:?}", cmd))),
		}
	}

}

impl Transport for MockTransport {

	fn send(&mut self, cmd:&str) -> io::Result<()> {
		self.calls.push(Call::Send(cmd.to_owned()));
		Ok(())
	}

	fn send_and_receive(&mut self, cmd:&str, _timeout:Duration) -> io::Result<String> {
		self.calls.push(Call::Query(cmd.to_owned()));
		self.next_reply(cmd)
	}

	fn receive_raw(&mut self, max_len:usize, _timeout:Duration) -> io::Result<Vec<u8>> {
		self.calls.push(Call::Receive(max_len));
		let mut raw = self.blocks.pop_front().ok_or_else(|| Error::new(ErrorKind::TimedOut, "no scripted block"))?;
		raw.truncate(max_len);
		Ok(raw)
	}

	fn obtain_numeric(&mut self, query:&str, _timeout:Duration) -> io::Result<f64> {
		self.calls.push(Call::Numeric(query.to_owned()));
		let reply = self.next_reply(query)?;
		transport::parse_number(&reply)
	}

	fn set_default_timeout(&mut self, timeout:Duration) { self.default_timeout = Some(timeout); }

	fn close(&mut self) -> io::Result<()> {
		self.closed = true;
		Ok(())
	}

}

thread_local! {
	static WARNINGS: RefCell<Vec<String>> = RefCell::new(Vec::new());
}

struct CaptureLogger;

impl log::Log for CaptureLogger {
	fn enabled(&self, metadata:&log::Metadata) -> bool { metadata.level() <= log::Level::Warn }

	fn log(&self, record:&log::Record) {
		if self.enabled(record.metadata()) {
			let msg = record.args().to_string();
			WARNINGS.with(|w| w.borrow_mut().push(msg));
		}
	}

	fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger;
static INIT: Once = Once::new();

fn install_logger() {
	INIT.call_once(|| {
		if log::set_logger(&LOGGER).is_ok() {
			log::set_max_level(log::LevelFilter::Warn);
		}
	});
}

pub fn clear_warnings() {
	install_logger();
	WARNINGS.with(|w| w.borrow_mut().clear());
}

pub fn captured_warnings() -> Vec<String> {
	WARNINGS.with(|w| w.borrow().clone())
}
