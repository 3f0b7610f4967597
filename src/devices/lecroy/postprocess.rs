// Arithmetic on raw `.wf` payloads.
//
// A payload is a run of signed samples, one or two bytes each, little-endian (`COMM_ORDER LO`).  The sample
// width always comes from the caller; a buffer's length alone can't tell 1000 words from 2000 bytes.
// Everything is widened to `i64` before any arithmetic and clamped on the way back down.

use byteorder::{ByteOrder, LittleEndian};
use serde::{Serialize, Deserialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleWidth { I8, I16 }

impl SampleWidth {

	pub fn from_bytes(bytes_per_point:u8) -> Result<Self> {
		match bytes_per_point {
			1 => Ok(SampleWidth::I8),
			2 => Ok(SampleWidth::I16),
			n => Err(Error::InvalidArgument(format!("samples are 1 or 2 bytes wide, not {}", n))),
		}
	}

	pub fn bytes(&self) -> usize { match self { SampleWidth::I8 => 1, SampleWidth::I16 => 2 } }

	fn range(&self) -> (i64, i64) { match self {
		SampleWidth::I8  => (i8::MIN as i64, i8::MAX as i64),
		SampleWidth::I16 => (i16::MIN as i64, i16::MAX as i64),
	}}

}

pub fn read_samples(buf:&[u8], width:SampleWidth) -> Vec<i64> {
	match width {
		SampleWidth::I8  => buf.iter().map(|&b| b as i8 as i64).collect(),
		SampleWidth::I16 => buf.chunks_exact(2).map(|c| LittleEndian::read_i16(c) as i64).collect(),
	}
}

// Narrows to `width`, saturating.  Returns the bytes and how many samples had to be clamped.
fn write_samples(samples:&[i64], width:SampleWidth) -> (Vec<u8>, usize) {
	let (lo, hi) = width.range();
	let clamped = samples.iter().filter(|&&s| s < lo || s > hi).count();
	let narrow = samples.iter().map(|&s| s.max(lo).min(hi));

	let bytes = match width {
		SampleWidth::I8 => narrow.map(|s| s as i8 as u8).collect(),
		SampleWidth::I16 => {
			let words:Vec<i16> = narrow.map(|s| s as i16).collect();
			let mut out = vec![0u8; words.len() * 2];
			LittleEndian::write_i16_into(&words, &mut out);
			out
		},
	};
	(bytes, clamped)
}

// Mean of `segment_count` back-to-back segments, sample by sample, truncating toward zero.  Samples left
// over when the buffer doesn't divide evenly are ignored.
pub fn average_segments(buf:&[u8], segment_count:usize, width:SampleWidth) -> Result<Vec<u8>> {
	if segment_count == 0 {
		return Err(Error::InvalidArgument("can't average zero segments".to_owned()));
	}

	let samples = read_samples(buf, width);
	let points = samples.len() / segment_count;
	if samples.len() % segment_count != 0 {
		log::warn!("{} samples don't split into {} segments, ignoring the last {}",
			samples.len(), segment_count, samples.len() % segment_count);
	}

	let mut sums = vec![0i64; points];
	for segment in samples.chunks_exact(points.max(1)).take(segment_count) {
		for (sum, s) in sums.iter_mut().zip(segment) { *sum += s; }
	}
	let means:Vec<i64> = sums.iter().map(|s| s / segment_count as i64).collect();

	let (out, clamped) = write_samples(&means, width);
	if clamped > 0 {
		log::warn!("{} averaged samples didn't fit in {:?} and were clamped", clamped, width);
	}
	Ok(out)
}

// 8-bit samples move into the high byte so both inputs cover the same full-scale range
fn widen_to_i16_scale(samples:Vec<i64>, width:SampleWidth) -> Vec<i64> {
	match width {
		SampleWidth::I8  => samples.into_iter().map(|s| s << 8).collect(),
		SampleWidth::I16 => samples,
	}
}

// `a - b` over the first `points` samples of each.  The difference is clamped to the 16-bit range, then an
// 8-bit output keeps only the high byte.
pub fn subtract_traces(a:&[u8], b:&[u8], width_a:SampleWidth, width_b:SampleWidth, width_out:SampleWidth,
	points:usize) -> Result<Vec<u8>> {

	for (name, buf, width) in &[("first", a, width_a), ("second", b, width_b)] {
		if buf.len() < points * width.bytes() {
			return Err(Error::InvalidArgument(format!("{} trace has {} bytes, {} points of {:?} need {}",
				name, buf.len(), points, width, points * width.bytes())));
		}
	}

	let a = widen_to_i16_scale(read_samples(&a[..points * width_a.bytes()], width_a), width_a);
	let b = widen_to_i16_scale(read_samples(&b[..points * width_b.bytes()], width_b), width_b);

	let (lo, hi) = SampleWidth::I16.range();
	let mut clamped = 0;
	let diff:Vec<i64> = a.iter().zip(&b).map(|(x, y)| {
		let d = x - y;
		if d < lo || d > hi { clamped += 1; }
		d.max(lo).min(hi)
	}).collect();

	if clamped > 0 {
		log::warn!("{} of {} differences were clamped to the 16-bit range", clamped, points);
	}

	let narrowed:Vec<i64> = match width_out {
		SampleWidth::I8  => diff.into_iter().map(|d| d >> 8).collect(),
		SampleWidth::I16 => diff,
	};
	Ok(write_samples(&narrowed, width_out).0)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::{captured_warnings, clear_warnings};

	fn words(v:&[i16]) -> Vec<u8> {
		let mut out = vec![0u8; v.len() * 2];
		LittleEndian::write_i16_into(v, &mut out);
		out
	}

	fn unwords(b:&[u8]) -> Vec<i16> {
		let mut out = vec![0i16; b.len() / 2];
		LittleEndian::read_i16_into(b, &mut out);
		out
	}

	#[test]
	fn two_segment_mean() {
		let buf = words(&[2, 4, 6, 8]);
		let avg = average_segments(&buf, 2, SampleWidth::I16).unwrap();
		assert_eq!(unwords(&avg), vec![4, 6]);
	}

	#[test]
	fn mean_truncates_toward_zero() {
		let buf = words(&[1, -1, 2, -2]);
		assert_eq!(unwords(&average_segments(&buf, 2, SampleWidth::I16).unwrap()), vec![1, -1]);

		let bytes = [1u8, 0xfe, 2, 0xfd, 4, 0xff];   // [1,-2] [2,-3] [4,-1]
		assert_eq!(average_segments(&bytes, 3, SampleWidth::I8).unwrap(), vec![2, 0xfe]);
	}

	#[test]
	fn wide_accumulator_handles_full_scale() {
		let buf = words(&[i16::MAX, i16::MIN, i16::MAX, i16::MIN, i16::MAX, i16::MIN]);
		assert_eq!(unwords(&average_segments(&buf, 3, SampleWidth::I16).unwrap()), vec![i16::MAX, i16::MIN]);
	}

	#[test]
	fn zero_segments_rejected() {
		assert!(matches!(average_segments(&[0, 0], 0, SampleWidth::I16), Err(Error::InvalidArgument(_))));
	}

	#[test]
	fn ragged_buffer_warns() {
		clear_warnings();
		let buf = words(&[2, 4, 6]);
		assert_eq!(unwords(&average_segments(&buf, 2, SampleWidth::I16).unwrap()), vec![3]);
		assert_eq!(captured_warnings().len(), 1);
	}

	#[test]
	fn simple_difference() {
		let d = subtract_traces(&words(&[100]), &words(&[50]), SampleWidth::I16, SampleWidth::I16, SampleWidth::I16, 1).unwrap();
		assert_eq!(unwords(&d), vec![50]);
	}

	#[test]
	fn difference_clamps_exactly_at_bounds() {
		clear_warnings();
		let a = words(&[-30000, 30000, 32767]);
		let b = words(&[30000, -30000, -1]);
		let d = subtract_traces(&a, &b, SampleWidth::I16, SampleWidth::I16, SampleWidth::I16, 3).unwrap();
		assert_eq!(unwords(&d), vec![i16::MIN, i16::MAX, i16::MAX]);
		assert_eq!(captured_warnings().len(), 1);
	}

	#[test]
	fn eight_bit_input_is_scaled_to_high_byte() {
		// 1 << 8 = 256, minus 100
		let d = subtract_traces(&[1], &words(&[100]), SampleWidth::I8, SampleWidth::I16, SampleWidth::I16, 1).unwrap();
		assert_eq!(unwords(&d), vec![156]);

		let d = subtract_traces(&[0x80], &[0x7f], SampleWidth::I8, SampleWidth::I8, SampleWidth::I16, 1).unwrap();
		assert_eq!(unwords(&d), vec![i16::MIN]);
	}

	#[test]
	fn eight_bit_output_keeps_high_byte() {
		let d = subtract_traces(&words(&[0x1234, -256, -1]), &words(&[0, 0, 0]),
			SampleWidth::I16, SampleWidth::I16, SampleWidth::I8, 3).unwrap();
		assert_eq!(d, vec![0x12, 0xff, 0xff]);
	}

	#[test]
	fn short_input_rejected() {
		let r = subtract_traces(&words(&[1]), &words(&[1, 2]), SampleWidth::I16, SampleWidth::I16, SampleWidth::I16, 2);
		assert!(matches!(r, Err(Error::InvalidArgument(_))));
	}

	#[test]
	fn width_from_bytes() {
		assert_eq!(SampleWidth::from_bytes(1).unwrap(), SampleWidth::I8);
		assert_eq!(SampleWidth::from_bytes(2).unwrap().bytes(), 2);
		assert!(SampleWidth::from_bytes(4).is_err());
	}
}
