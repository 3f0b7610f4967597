// Definite-length arbitrary block decoding.  A waveform reply looks like
//
//   DAT1,#9000001000<1000 bytes of data>
//   \___/||\_______/
//     |  ||    \---- number of bytes of data
//     |  |\--------- number of digits that follow (9 here, with leading zeros)
//     |  \---------- always starts with #
//     \------------- whatever array was asked for
//
// When the scope has nothing to give it sends just "#0", which is a valid empty block, not an error.

use crate::error::{Error, Result};

pub const BLOCK_MARKER:u8 = b'#';

// `payload` is what actually arrived after the header, which can be less than `announced` when the read was
// capped at the caller's buffer size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Block<'a> {
	payload: &'a [u8],
	announced: usize,
	head: &'a [u8],
}

impl<'a> Block<'a> {

	pub fn payload(&self) -> &'a [u8] { self.payload }
	pub fn len(&self) -> usize { self.announced }
	pub fn is_empty(&self) -> bool { self.announced == 0 }
	pub fn is_complete(&self) -> bool { self.payload.len() == self.announced }

	// Copies as much as fits.  A block announcing more than dest can hold is BufferOverflow, with dest
	// holding the leading part.  A block that fits but arrived short is malformed.
	pub fn copy_into(&self, dest:&mut [u8]) -> Result<usize> {
		let n = self.payload.len().min(dest.len());
		dest[..n].copy_from_slice(&self.payload[..n]);
		if self.announced > dest.len() {
			return Err(Error::BufferOverflow{ len: self.announced, capacity: dest.len() });
		}
		if !self.is_complete() {
			return Err(Error::MalformedBlock{ reason: "fewer bytes than the header announced", head: self.head.to_vec() });
		}
		Ok(n)
	}

}

pub fn decode(raw:&[u8], max_header_scan:usize) -> Result<Block<'_>> {
	let head = &raw[..raw.len().min(max_header_scan)];
	let malformed = |reason:&'static str| Error::MalformedBlock{ reason, head: head.to_vec() };

	let marker = head.iter().position(|&b| b == BLOCK_MARKER).ok_or_else(|| malformed("no '#' marker"))?;

	let ndigits = match raw.get(marker + 1) {
		Some(d) if d.is_ascii_digit() => (d - b'0') as usize,
		Some(_) => return Err(malformed("digit count is not a digit")),
		None    => return Err(malformed("header ends after '#'")),
	};
	if ndigits == 0 {
		return Ok(Block{ payload: &[], announced: 0, head });
	}

	let digits_start = marker + 2;
	let digits = raw.get(digits_start..digits_start + ndigits).ok_or_else(|| malformed("length field is truncated"))?;

	let mut len:usize = 0;
	for d in digits {
		if !d.is_ascii_digit() { return Err(malformed("length field is not decimal")); }
		len = len.checked_mul(10)
			.and_then(|l| l.checked_add((d - b'0') as usize))
			.ok_or_else(|| malformed("length field overflows"))?;
	}

	let start = digits_start + ndigits;
	let end = raw.len().min(start + len);
	let payload = raw.get(start..end).unwrap_or(&[]);

	Ok(Block{ payload, announced: len, head })
}
