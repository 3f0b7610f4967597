// Single-character channel names and how they map onto LeCroy sources.
//
// The tokens go back to when LeCroy called their math channels A-D: `'1'..'4'` are the acquisition channels
// C1-C4, `'A'..'H'` are the math functions F1-F8 and `'S'..'Z'` are the memories M1-M8.  Letters are
// accepted in either case.
//
// Parsing comes in two flavours.  Channel::from_token is strict.  The lenient entry points
// (Channel::parse_lenient, resolve_source, related_acquisition_channel) log a warning and fall
// back to channel 1 instead, so a typo doesn't abort a long acquisition run.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

pub const ACQUISITION_CHANNELS:u8 = 4;
pub const FUNCTION_CHANNELS:u8 = 8;
pub const MEMORY_CHANNELS:u8 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
	Acquisition,
	Function,
	Memory,
}

impl Kind {
	fn slots(self) -> u8 { match self {
		Kind::Acquisition => ACQUISITION_CHANNELS,
		Kind::Function    => FUNCTION_CHANNELS,
		Kind::Memory      => MEMORY_CHANNELS,
	}}

	fn prefix(self) -> char { match self {
		Kind::Acquisition => 'C',
		Kind::Function    => 'F',
		Kind::Memory      => 'M',
	}}
}

// Fields are private so a Channel always names a slot that exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Channel {
	kind: Kind,
	slot: u8,
}

impl Channel {

	pub const DEFAULT: Channel = Channel{ kind: Kind::Acquisition, slot: 1 };

	pub fn new(kind:Kind, slot:u8) -> Result<Self> {
		if slot == 0 || slot > kind.slots() {
			return Err(Error::InvalidArgument(format!("{:?} channels are numbered 1 to {}, got {}", kind, kind.slots(), slot)));
		}
		Ok(Self{ kind, slot })
	}

	pub fn acquisition(slot:u8) -> Result<Self> { Self::new(Kind::Acquisition, slot) }
	pub fn function(slot:u8) -> Result<Self> { Self::new(Kind::Function, slot) }
	pub fn memory(slot:u8) -> Result<Self> { Self::new(Kind::Memory, slot) }

	pub fn kind(&self) -> Kind { self.kind }
	pub fn slot(&self) -> u8 { self.slot }

	pub fn from_token(token:char) -> Result<Self> {
		let c = token.to_ascii_uppercase();
		let (kind, slot) = match c {
			'1'..='4' => (Kind::Acquisition, c as u8 - b'0'),
			'A'..='H' => (Kind::Function, c as u8 - b'A' + 1),
			'S'..='Z' => (Kind::Memory, c as u8 - b'S' + 1),
			_         => return Err(Error::UnknownChannel(token)),
		};
		Ok(Self{ kind, slot })
	}

	pub fn parse_lenient(token:char) -> Self {
		match Self::from_token(token) {
			Ok(chan) => chan,
			Err(_) => {
				log::warn!("unknown channel '{}', using channel 1", token);
				Self::DEFAULT
			}
		}
	}

	pub fn token(&self) -> char {
		match self.kind {
			Kind::Acquisition => (b'0' + self.slot) as char,
			Kind::Function    => (b'A' + self.slot - 1) as char,
			Kind::Memory      => (b'S' + self.slot - 1) as char,
		}
	}

	// Instrument-side name, e.g. `C2`, `F1`, `M4`
	pub fn source(&self) -> String { format!("{}{}", self.kind.prefix(), self.slot) }

	pub fn is_derived(&self) -> bool { self.kind != Kind::Acquisition }

	// The twin of this channel: C1-C4 pair with F1-F4 in both directions.  F5-F8 and the memories have no
	// partner.
	pub fn partner(&self) -> Result<Self> {
		match self.kind {
			Kind::Acquisition => Ok(Self{ kind: Kind::Function, slot: self.slot }),
			Kind::Function if self.slot <= ACQUISITION_CHANNELS => Ok(Self{ kind: Kind::Acquisition, slot: self.slot }),
			_ => Err(Error::NoAcquisitionCounterpart(*self)),
		}
	}

	pub fn related(&self) -> Self {
		match self.partner() {
			Ok(chan) => chan,
			Err(_) => {
				log::warn!("{} doesn't have an associated acquisition channel, using channel 1", self);
				Self::DEFAULT
			}
		}
	}

}

impl fmt::Display for Channel {
	fn fmt(&self, f:&mut fmt::Formatter) -> fmt::Result { write!(f, "{}{}", self.kind.prefix(), self.slot) }
}

impl FromStr for Channel {
	type Err = Error;

	// Accepts a bare token ("2", "a") or an instrument name ("C2", "F1")
	fn from_str(s:&str) -> Result<Self> {
		let s = s.trim();
		let mut chars = s.chars();
		match (chars.next(), chars.next(), chars.next()) {
			(Some(token), None, _) => Self::from_token(token),
			(Some(prefix), Some(digit), None) => {
				let slot = digit.to_digit(10).ok_or_else(|| Error::InvalidArgument(format!("bad channel name {:?}", s)))? as u8;
				match prefix.to_ascii_uppercase() {
					'C' => Self::acquisition(slot),
					'F' => Self::function(slot),
					'M' => Self::memory(slot),
					_   => Err(Error::InvalidArgument(format!("bad channel name {:?}", s))),
				}
			},
			_ => Err(Error::InvalidArgument(format!("bad channel name {:?}", s))),
		}
	}
}

// Token-level helpers for callers that still carry channels around as chars

pub fn resolve_source(token:char) -> String { Channel::parse_lenient(token).source() }

pub fn is_derived_channel(token:char) -> bool { !('1'..='4').contains(&token) }

pub fn related_acquisition_channel(token:char) -> char {
	match Channel::from_token(token) {
		Ok(chan) => chan.related().token(),
		Err(_) => {
			log::warn!("unknown channel '{}', using channel 1", token);
			Channel::DEFAULT.token()
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::{captured_warnings, clear_warnings};

	#[test]
	fn acquisition_tokens_resolve_to_c_sources() {
		for (token, source) in &[('1', "C1"), ('2', "C2"), ('3', "C3"), ('4', "C4")] {
			assert_eq!(resolve_source(*token), *source);
			assert!(!is_derived_channel(*token));
		}
	}

	#[test]
	fn derived_tokens_are_case_insensitive() {
		assert_eq!(resolve_source('a'), "F1");
		assert_eq!(resolve_source('H'), "F8");
		assert_eq!(resolve_source('s'), "M1");
		assert_eq!(resolve_source('Z'), "M8");
		assert!(is_derived_channel('b'));
		assert!(is_derived_channel('V'));
	}

	#[test]
	fn function_partner_round_trips() {
		for token in &['1', '2', '3', '4'] {
			let math = related_acquisition_channel(*token);
			assert_eq!(related_acquisition_channel(math), *token);
		}
		assert_eq!(related_acquisition_channel('3'), 'C');
		assert_eq!(related_acquisition_channel('d'), '4');
	}

	#[test]
	fn unknown_token_falls_back_with_one_warning() {
		clear_warnings();
		assert_eq!(resolve_source('Q'), "C1");
		let warnings = captured_warnings();
		assert_eq!(warnings.len(), 1);
		assert!(warnings[0].contains("'Q'"));
	}

	#[test]
	fn unpaired_function_warns_and_uses_channel_1() {
		clear_warnings();
		assert_eq!(related_acquisition_channel('F'), '1');
		assert_eq!(related_acquisition_channel('?'), '1');
		assert_eq!(captured_warnings().len(), 2);

		let f5 = Channel::function(5).unwrap();
		assert!(matches!(f5.partner(), Err(Error::NoAcquisitionCounterpart(c)) if c == f5));
	}

	#[test]
	fn strict_parsing() {
		assert!(matches!(Channel::from_token('x'), Ok(c) if c.kind() == Kind::Memory && c.slot() == 6));
		assert!(matches!(Channel::from_token('9'), Err(Error::UnknownChannel('9'))));
		assert!(Channel::acquisition(5).is_err());
		assert!(Channel::memory(0).is_err());

		assert_eq!("F3".parse::<Channel>().unwrap(), Channel::function(3).unwrap());
		assert_eq!("c".parse::<Channel>().unwrap(), Channel::function(3).unwrap());
		assert!("C9".parse::<Channel>().is_err());
		assert!("F12".parse::<Channel>().is_err());
	}

	#[test]
	fn token_and_source_agree() {
		for token in "1234ABCDEFGHSTUVWXYZ".chars() {
			let chan = Channel::from_token(token).unwrap();
			assert_eq!(chan.token(), token);
			assert_eq!(chan.to_string(), chan.source());
		}
	}
}
