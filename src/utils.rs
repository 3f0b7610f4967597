
// Number formatting shared by the command builders and the .wfi writer.  The scope and the tools that read
// .wfi files both expect C-style "%g": six significant digits, trailing zeros dropped, and an exponent only
// when the number is very large or very small.

const SIGNIFICANT_DIGITS:i32 = 6;

fn strip_fraction_zeros(s:&str) -> &str {
	if s.contains('.') { s.trim_end_matches('0').trim_end_matches('.') } else { s }
}

pub fn format_g(value:f64) -> String {
	if !value.is_finite() { return value.to_string(); }
	if value == 0.0 { return "0".to_owned(); }

	// Rounding to six digits first settles which exponent the number really has (999999.5 becomes 1e+06)
	let sci = format!("{:.*e}", (SIGNIFICANT_DIGITS - 1) as usize, value);
	let (mantissa, exp) = match sci.split_once('e') {
		Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
		None => return sci,
	};

	if exp < -4 || exp >= SIGNIFICANT_DIGITS {
		let sign = if exp < 0 { '-' } else { '+' };
		format!("{}e{}{:02}", strip_fraction_zeros(mantissa), sign, exp.abs())
	} else {
		let decimals = (SIGNIFICANT_DIGITS - 1 - exp) as usize;
		strip_fraction_zeros(&format!("{:.*}", decimals, value)).to_owned()
	}
}
