
// Device core
pub const DEVICE_CORE_PROG:u32  = 0x0607af;
pub const DEVICE_CORE_VERS:u32  = 1;
pub const CREATE_LINK:u32       = 10;
pub const DEVICE_WRITE:u32      = 11;
pub const DEVICE_READ:u32       = 12;
pub const DESTROY_LINK:u32      = 23;

pub const CLIENT_ID:i32 = 3333;
pub const DEFAULT_LOCK_TIMEOUT:u32 = 10000;
pub const DEFAULT_IO_TIMEOUT_MS:u64 = 10000;

pub const OPERATION_FLAGS_END_ONLY:i32 = 8;

// Reason bits in a device_read reply
pub const REASON_REQCNT:i32 = 1;
pub const REASON_CHR:i32    = 2;
pub const REASON_END:i32    = 4;

// Slack on the socket timeout so the instrument gets to report its own I/O timeout first
const SOCKET_TIMEOUT_MARGIN_MS:u64 = 1000;

use std::io::{self, Error, ErrorKind};
use std::time::Duration;

use crate::rpc::port_mapping::{TcpPortMapperClient, Mapping, Protocol};
use crate::rpc::tcp_clients::TcpClient;

fn err(msg:&str) -> io::Error { Error::new(ErrorKind::Other, msg) }

// Device_ErrorCode values from the VXI-11 standard.  Timeouts keep their own ErrorKind so callers can tell them apart.
fn device_error(code:i32) -> io::Error {
	match code {
		1  => err("Syntax error"),
		3  => err("Device not accessible"),
		4  => err("Invalid link identifier"),
		5  => err("Parameter error"),
		6  => err("Channel not established"),
		8  => err("Operation not supported"),
		9  => err("Out of resources"),
		11 => err("Device locked by another link"),
		12 => err("No lock held by this link"),
		15 => Error::new(ErrorKind::TimedOut, "I/O timeout"),
		17 => err("I/O error"),
		21 => err("Invalid address"),
		23 => err("Abort"),
		29 => err("Channel already established"),
		_  => Error::new(ErrorKind::Other, format!("Unknown device error {}", code)),
	}
}

fn millis(d:Duration) -> u32 { d.as_millis().min(u32::MAX as u128) as u32 }

pub struct CoreClient {
	client: TcpClient,
	opt_link: Option<Link>,
	default_timeout: Duration,
}

pub struct Link {
	pub link_id: i32,
	pub abort_port: u32,
	pub max_recv_size: u32,
}

impl CoreClient {

	fn get_link(&self) -> io::Result<&Link> {
		self.opt_link.as_ref().ok_or_else(|| err("No link"))
	}

	pub fn new(host:&str) -> io::Result<Self> {

		// Find the port to use for the core program
		let mut pmap_client = TcpPortMapperClient::new(host)?;

		let mapping = Mapping {
			program: DEVICE_CORE_PROG,
			version: DEVICE_CORE_VERS,
			protocol: Protocol::TCP,
			port: 0,
		};

		let port = pmap_client.get_port(&mapping)?;
		log::debug!("VXI-11 core channel for {} is on port {}", host, port);

		let client = TcpClient::connect((host, port), DEVICE_CORE_PROG, DEVICE_CORE_VERS)?;

		Ok(CoreClient{ client, opt_link: None, default_timeout: Duration::from_millis(DEFAULT_IO_TIMEOUT_MS) })
	}

	// Convenience for the usual connect-then-link sequence against the "inst0" logical device
	pub fn open(host:&str) -> io::Result<Self> {
		let mut core = Self::new(host)?;
		core.create_link()?;
		Ok(core)
	}

	pub fn is_linked(&self) -> bool { self.opt_link.is_some() }

	pub fn default_timeout(&self) -> Duration { self.default_timeout }
	pub fn set_default_timeout(&mut self, timeout:Duration) { self.default_timeout = timeout; }

	pub fn create_link(&mut self) -> io::Result<()> {
		if self.opt_link.is_some() {
			return Err(err("Already connected to a link"));
		}

		self.client.set_read_timeout(Some(Duration::from_millis(DEFAULT_LOCK_TIMEOUT as u64 + SOCKET_TIMEOUT_MARGIN_MS)))?;
		self.client.start_call(CREATE_LINK)?;
		xdr_pack::pack_create_link_parms(&mut self.client.packer, CLIENT_ID, false, DEFAULT_LOCK_TIMEOUT, "inst0")?;
		self.client.do_call()?;

		let error:i32         = self.client.unpacker.unpack_i32()?;
		let link_id:i32       = self.client.unpacker.unpack_i32()?;
		let abort_port:u32    = self.client.unpacker.unpack_u32()?;
		let max_recv_size:u32 = self.client.unpacker.unpack_u32()?;

		if error != 0 { return Err(device_error(error)); }

		log::debug!("created link {} (max_recv_size={})", link_id, max_recv_size);
		self.opt_link = Some(Link{ link_id, abort_port, max_recv_size });
		Ok(())
	}

	// Commands longer than the device's max_recv_size go out in pieces, with END only on the last one
	pub fn write(&mut self, data:&[u8], timeout:Duration) -> io::Result<()> {
		let (link_id, max_recv_size) = {
			let link = self.get_link()?;
			(link.link_id, (link.max_recv_size as usize).max(1))
		};
		self.client.set_read_timeout(Some(timeout.saturating_add(Duration::from_millis(SOCKET_TIMEOUT_MARGIN_MS))))?;

		let mut chunks = data.chunks(max_recv_size).peekable();
		while let Some(chunk) = chunks.next() {
			let flags = if chunks.peek().is_none() { OPERATION_FLAGS_END_ONLY } else { 0 };

			self.client.start_call(DEVICE_WRITE)?;
			xdr_pack::pack_device_write_parms(&mut self.client.packer, link_id, millis(timeout), DEFAULT_LOCK_TIMEOUT, flags, chunk)?;
			self.client.do_call()?;

			let error:i32 = self.client.unpacker.unpack_i32()?;
			let size:u32  = self.client.unpacker.unpack_u32()?;

			if error != 0 { return Err(device_error(error)); }
			if size as usize != chunk.len() {
				return Err(err("Number of bytes in confirmation doesn't match number of bytes sent"));
			}
		}

		Ok(())
	}

	// Reads until the device flags END (or a termination character) or until max_len bytes have arrived
	pub fn read(&mut self, max_len:usize, timeout:Duration) -> io::Result<Vec<u8>> {
		let link_id = self.get_link()?.link_id;
		self.client.set_read_timeout(Some(timeout.saturating_add(Duration::from_millis(SOCKET_TIMEOUT_MARGIN_MS))))?;

		let mut ans:Vec<u8> = vec![];
		loop {
			let request_size = (max_len - ans.len()).min(std::u32::MAX as usize) as u32;

			self.client.start_call(DEVICE_READ)?;
			xdr_pack::pack_device_read_parms(&mut self.client.packer, link_id, request_size, millis(timeout), DEFAULT_LOCK_TIMEOUT, 0, 0)?;
			self.client.do_call()?;

			let error:i32  = self.client.unpacker.unpack_i32()?;
			let reason:i32 = self.client.unpacker.unpack_i32()?;
			let data       = self.client.unpacker.unpack_variable_len_opaque()?;

			if error != 0 { return Err(device_error(error)); }
			if reason & !(REASON_REQCNT | REASON_CHR | REASON_END) != 0 {
				return Err(err("Bits in reason code that should be zero aren't zero"));
			}

			ans.extend_from_slice(&data);

			if reason & (REASON_END | REASON_CHR) != 0 || ans.len() >= max_len { return Ok(ans); }
			if data.is_empty() {
				return Err(err("Device returned no data and no reason for ending the read"));
			}
		}
	}

	pub fn destroy_link(&mut self) -> io::Result<()> {
		let link_id = match self.opt_link.take() {
			Some(link) => link.link_id,
			None => return Err(err("No link to destroy")),
		};

		self.client.start_call(DESTROY_LINK)?;
		self.client.packer.pack_i32(link_id)?;
		self.client.do_call()?;

		match self.client.unpacker.unpack_i32()? {
			0 => Ok(()),
			e => Err(device_error(e)),
		}
	}

}

impl Drop for CoreClient {

	fn drop(&mut self) {
		if self.opt_link.is_some() {
			if let Err(e) = self.destroy_link() {
				log::warn!("unable to destroy VXI-11 link: {}", e);
			}
		}
	}

}

pub mod xdr_pack;
