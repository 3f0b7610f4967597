// Errors surfaced by the LeCroy driver layer.  The VXI-11 and RPC plumbing underneath keeps using io::Result
// and gets folded into Error::Transport when it crosses into the device code.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::devices::lecroy::channel::Channel;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
	#[error("transport error: {0}")]
	Transport(#[from] io::Error),

	// No '#' marker within the scan window, or a header that doesn't describe the bytes that followed it.
	// `head` holds the first bytes received so the caller can see what the instrument actually sent.
	#[error("malformed data block ({reason}), first bytes received: {:?}", String::from_utf8_lossy(.head))]
	MalformedBlock { reason: &'static str, head: Vec<u8> },

	#[error("data block holds {len} bytes but the destination only has room for {capacity}")]
	BufferOverflow { len: usize, capacity: usize },

	#[error("*OPC? did not report completion (reply {reply})")]
	AcquisitionIncomplete { reply: f64 },

	#[error("unknown channel '{0}'")]
	UnknownChannel(char),

	#[error("channel {0} has no associated acquisition channel")]
	NoAcquisitionCounterpart(Channel),

	#[error("averaging did not complete after {polls} INR? polls")]
	AveragesTimedOut { polls: u32 },

	#[error("unable to interpret reply: {0:?}")]
	BadReply(String),

	#[error("invalid argument: {0}")]
	InvalidArgument(String),

	#[error("could not write {}: {source}", .path.display())]
	FileWrite { path: PathBuf, source: io::Error },

	#[error("configuration error: {0}")]
	Config(String),
}
