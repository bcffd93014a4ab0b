//! ASCII variant: one `KEY VALUE` pair per line, blank lines between
//! sub-files, `#` begins a comment (spec.md §4.A, §6).
//!
//! Grounded on `ntv2_read_ov_asc`/`ntv2_read_sf_asc` in the original C
//! source: every header field occupies exactly one line of two
//! whitespace-delimited tokens. Grid-shift data lines hold four numbers
//! (accuracy columns optional, defaulting to 0.0).

use crate::error::Error;

/// A pull-style line tokeniser over ASCII source text.
pub struct AsciiReader<'a> {
    lines: std::iter::Peekable<std::str::Lines<'a>>,
}

impl<'a> AsciiReader<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines().peekable(),
        }
    }

    fn next_significant_line(&mut self) -> Option<&'a str> {
        loop {
            let line = self.lines.next()?;
            let trimmed = strip_comment(line).trim();
            if !trimmed.is_empty() {
                return Some(trimmed);
            }
        }
    }

    /// Read the next non-blank, non-comment line and split it into
    /// whitespace-delimited tokens.
    pub fn next_tokens(&mut self) -> Result<Vec<&'a str>, Error> {
        let line = self
            .next_significant_line()
            .ok_or(Error::UnexpectedEof)?;
        Ok(line.split_whitespace().collect())
    }

    /// Read a `KEY VALUE` line, returning the value token.
    pub fn read_field(&mut self, expect_key: &str) -> Result<&'a str, Error> {
        let tokens = self.next_tokens()?;
        if tokens.len() < 2 {
            return Err(Error::InvalidAsciiLine(tokens.join(" ")));
        }
        if !tokens[0].eq_ignore_ascii_case(expect_key) {
            return Err(Error::InvalidAsciiLine(format!(
                "expected {expect_key}, found {}",
                tokens[0]
            )));
        }
        Ok(tokens[1])
    }

    /// Read a grid-shift data line: lat-shift, lon-shift, and optionally
    /// lat-accuracy/lon-accuracy (defaulting to 0.0 when absent).
    pub fn read_shift_line(&mut self) -> Result<(f32, f32, f32, f32), Error> {
        let tokens = self.next_tokens()?;
        if tokens.len() < 2 {
            return Err(Error::InvalidAsciiLine(tokens.join(" ")));
        }
        let lat = parse_f32(tokens[0])?;
        let lon = parse_f32(tokens[1])?;
        let lat_acc = tokens.get(2).map(|s| parse_f32(s)).transpose()?.unwrap_or(0.0);
        let lon_acc = tokens.get(3).map(|s| parse_f32(s)).transpose()?.unwrap_or(0.0);
        Ok((lat, lon, lat_acc, lon_acc))
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(i) => &line[..i],
        None => line,
    }
}

/// Parse a numeric token, accepting either `.` or a locale decimal comma as
/// the fractional separator (spec.md §9 design note).
fn normalize_decimal(tok: &str) -> String {
    tok.replace(',', ".")
}

pub fn parse_f64(tok: &str) -> Result<f64, Error> {
    normalize_decimal(tok)
        .parse::<f64>()
        .map_err(|_| Error::InvalidAsciiLine(tok.to_string()))
}

pub fn parse_f32(tok: &str) -> Result<f32, Error> {
    normalize_decimal(tok)
        .parse::<f32>()
        .map_err(|_| Error::InvalidAsciiLine(tok.to_string()))
}

pub fn parse_i32(tok: &str) -> Result<i32, Error> {
    tok.parse::<i32>()
        .map_err(|_| Error::InvalidAsciiLine(tok.to_string()))
}

/// Format a floating-point value the way the writer emits it: up to 8
/// decimal digits, trailing zeros trimmed, a bare trailing `.` removed, `.`
/// as the decimal mark regardless of locale.
pub fn format_number(v: f64) -> String {
    let s = format!("{v:.8}");
    let s = s.trim_end_matches('0');
    let s = s.trim_end_matches('.');
    if s.is_empty() || s == "-" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_key_value_lines_skipping_comments_and_blanks() {
        let text = "# header\nNUM_OREC 11\n\nNUM_SREC 11\n";
        let mut r = AsciiReader::new(text);
        assert_eq!(r.read_field("NUM_OREC").unwrap(), "11");
        assert_eq!(r.read_field("NUM_SREC").unwrap(), "11");
    }

    #[test]
    fn shift_line_defaults_missing_accuracies() {
        let mut r = AsciiReader::new("1.5 -2.25\n");
        let (lat, lon, lat_acc, lon_acc) = r.read_shift_line().unwrap();
        assert_eq!((lat, lon, lat_acc, lon_acc), (1.5, -2.25, 0.0, 0.0));
    }

    #[test]
    fn accepts_locale_decimal_comma() {
        assert_eq!(parse_f64("51,505").unwrap(), 51.505);
    }

    #[test]
    fn format_number_trims_trailing_zeros_and_dot() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(3.25), "3.25");
        assert_eq!(format_number(-0.125), "-0.125");
    }
}
