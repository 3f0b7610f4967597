
use std::io::{self, Error, ErrorKind};

use crate::xdr::Unpacker;
use crate::rpc::{REPLY, MSG_DENIED, RPC_MISMATCH, AUTH_ERROR, MSG_ACCEPTED, PROG_UNAVAIL, PROG_MISMATCH, PROC_UNAVAIL, GARBAGE_ARGS, SUCCESS};

fn err(msg:&str) -> io::Error { Error::new(ErrorKind::Other, msg) }

pub fn unpack_auth(unpacker:&mut Unpacker) -> io::Result<(i32, Vec<u8>)> {
	let flavor:i32    = unpacker.unpack_enum()?;
	let stuff:Vec<u8> = unpacker.unpack_variable_len_opaque()?;
	Ok((flavor, stuff))
}

// Returns the xid so the caller can match the reply to its call.  Anything other than an accepted, successful
// reply becomes an error.
pub fn unpack_replyheader(unpacker:&mut Unpacker) -> io::Result<u32> {
	let xid:u32 = unpacker.unpack_u32()?;

	if unpacker.unpack_enum()? != REPLY { return Err(err("Expected REPLY message type")); }

	match unpacker.unpack_enum()? {
		MSG_ACCEPTED => { },
		MSG_DENIED => {
			return match unpacker.unpack_enum()? {
				RPC_MISMATCH => Err(err("Message denied due to RPC_MISMATCH")),
				AUTH_ERROR   => Err(err("Message denied due to AUTH_ERROR")),
				_            => Err(err("Message denied for an unknown reason")),
			};
		},
		_ => return Err(err("Neither MSG_DENIED nor MSG_ACCEPTED in reply header")),
	}

	let _verf = unpack_auth(unpacker)?;

	match unpacker.unpack_enum()? {
		SUCCESS       => Ok(xid),
		PROG_UNAVAIL  => Err(err("Program unavailable")),
		PROG_MISMATCH => Err(err("Program version mismatch")),
		PROC_UNAVAIL  => Err(err("Procedure unavailable")),
		GARBAGE_ARGS  => Err(err("Server could not decode the call arguments")),
		_             => Err(err("Call failed for an unknown reason")),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::xdr::Packer;

	fn reply(accept_stat:i32) -> Vec<u8> {
		let mut packer = Packer::new();
		packer.pack_u32(42).unwrap();
		packer.pack_enum(REPLY).unwrap();
		packer.pack_enum(MSG_ACCEPTED).unwrap();
		packer.pack_enum(0).unwrap();
		packer.pack_variable_len_opaque(&[]).unwrap();
		packer.pack_enum(accept_stat).unwrap();
		packer.get_buf().to_vec()
	}

	#[test]
	fn accepted_reply_yields_xid() {
		let mut unpacker = Unpacker::new();
		unpacker.reset(&reply(SUCCESS));
		assert_eq!(unpack_replyheader(&mut unpacker).unwrap(), 42);
		assert!(unpacker.all_data_consumed());
	}

	#[test]
	fn prog_unavail_is_an_error() {
		let mut unpacker = Unpacker::new();
		unpacker.reset(&reply(PROG_UNAVAIL));
		assert!(unpack_replyheader(&mut unpacker).is_err());
	}
}
