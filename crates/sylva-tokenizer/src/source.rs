//! Source text in its input encoding.
//!
//! The lexer works on UTF-8, while every offset and column the engine hands
//! out is measured in bytes of the input encoding. [`SourceText`] keeps the
//! decoded text together with the mapping between the two.

use sylva_tree::{Length, Point};
use thiserror::Error;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum InputEncoding {
    #[default]
    Utf8,
    Utf16Le,
    Utf16Be,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("UTF-16 input has an odd length of {0} bytes")]
    OddUtf16Length(usize),
    #[error("input of {0} bytes is too large")]
    TooLarge(usize),
}

#[derive(Clone, Debug)]
pub struct SourceText {
    text: String,
    encoded_len: u32,
    /// `(utf8, encoded)` offsets of every char start plus the end, present
    /// only when the two differ.
    offsets: Option<Box<[(u32, u32)]>>,
}

impl SourceText {
    /// Decodes `input`. Invalid sequences become U+FFFD but keep their
    /// original width.
    pub fn decode(input: &[u8], encoding: InputEncoding) -> Result<Self, DecodeError> {
        if u32::try_from(input.len()).is_err() {
            return Err(DecodeError::TooLarge(input.len()));
        }
        match encoding {
            InputEncoding::Utf8 => Ok(Self::decode_utf8(input)),
            InputEncoding::Utf16Le | InputEncoding::Utf16Be => {
                if input.len() % 2 != 0 {
                    return Err(DecodeError::OddUtf16Length(input.len()));
                }
                let units = input.chunks_exact(2).map(|pair| {
                    let pair = [pair[0], pair[1]];
                    if encoding == InputEncoding::Utf16Le {
                        u16::from_le_bytes(pair)
                    } else {
                        u16::from_be_bytes(pair)
                    }
                });
                Ok(Self::decode_utf16(units))
            }
        }
    }

    pub fn from_utf16(units: &[u16]) -> Self {
        Self::decode_utf16(units.iter().copied())
    }

    fn decode_utf8(input: &[u8]) -> Self {
        if let Ok(text) = std::str::from_utf8(input) {
            return Self::from(text);
        }
        let mut text = String::with_capacity(input.len());
        let mut offsets = Vec::with_capacity(input.len() + 1);
        let mut encoded = 0;
        for chunk in input.utf8_chunks() {
            for c in chunk.valid().chars() {
                offsets.push((text.len() as u32, encoded));
                text.push(c);
                encoded += c.len_utf8() as u32;
            }
            if !chunk.invalid().is_empty() {
                offsets.push((text.len() as u32, encoded));
                text.push(char::REPLACEMENT_CHARACTER);
                encoded += chunk.invalid().len() as u32;
            }
        }
        offsets.push((text.len() as u32, encoded));
        Self { text, encoded_len: encoded, offsets: Some(offsets.into_boxed_slice()) }
    }

    fn decode_utf16(units: impl Iterator<Item = u16>) -> Self {
        let mut text = String::new();
        let mut offsets = Vec::new();
        let mut encoded = 0;
        for c in char::decode_utf16(units) {
            let (c, width) = match c {
                Ok(c) => (c, c.len_utf16() as u32 * 2),
                Err(_) => (char::REPLACEMENT_CHARACTER, 2),
            };
            offsets.push((text.len() as u32, encoded));
            text.push(c);
            encoded += width;
        }
        offsets.push((text.len() as u32, encoded));
        Self { text, encoded_len: encoded, offsets: Some(offsets.into_boxed_slice()) }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Length of the input in bytes of its encoding.
    pub fn encoded_len(&self) -> u32 {
        self.encoded_len
    }

    /// UTF-8 offset of the char containing the encoded offset.
    pub fn to_utf8(&self, encoded: u32) -> usize {
        let encoded = encoded.min(self.encoded_len);
        match &self.offsets {
            None => encoded as usize,
            Some(offsets) => {
                let index = offsets.partition_point(|&(_, start)| start <= encoded);
                offsets[index.saturating_sub(1)].0 as usize
            }
        }
    }

    /// Encoded offset of the char starting at the UTF-8 offset.
    pub fn to_encoded(&self, utf8: usize) -> u32 {
        let utf8 = utf8.min(self.text.len()) as u32;
        match &self.offsets {
            None => utf8,
            Some(offsets) => {
                let index = offsets.partition_point(|&(start, _)| start <= utf8);
                offsets[index.saturating_sub(1)].1
            }
        }
    }

    /// Encoded length and row/column extent of `text[start..end]`.
    pub fn measure(&self, start: usize, end: usize) -> Length {
        let span = &self.text.as_bytes()[start..end];
        let encoded_start = self.to_encoded(start);
        let encoded_end = self.to_encoded(end);
        let rows = span.iter().filter(|&&byte| byte == b'\n').count() as u32;
        let column = match span.iter().rposition(|&byte| byte == b'\n') {
            Some(newline) => encoded_end - self.to_encoded(start + newline + 1),
            None => encoded_end - encoded_start,
        };
        Length::new(encoded_end - encoded_start, Point::new(rows, column))
    }
}

impl From<&str> for SourceText {
    fn from(text: &str) -> Self {
        Self { text: text.to_owned(), encoded_len: text.len() as u32, offsets: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_offsets_are_identity() {
        let source = SourceText::from("ab\ncd");
        assert_eq!(source.to_utf8(4), 4);
        assert_eq!(source.measure(0, 5), Length::new(5, Point::new(1, 2)));
    }

    #[test]
    fn invalid_utf8_keeps_its_width() {
        let source = SourceText::decode(b"a\xffb", InputEncoding::Utf8).unwrap();
        assert_eq!(source.as_str(), "a\u{fffd}b");
        assert_eq!(source.encoded_len(), 3);
        assert_eq!(source.to_encoded(4), 2);
        assert_eq!(source.to_utf8(2), 4);
        assert_eq!(source.measure(0, 5), Length::new(3, Point::new(0, 3)));
    }

    #[test]
    fn utf16_counts_two_bytes_per_unit() {
        let units: Vec<u16> = "x\n\u{1F600}y".encode_utf16().collect();
        let source = SourceText::from_utf16(&units);
        assert_eq!(source.encoded_len(), 10);
        let end = source.as_str().len();
        assert_eq!(source.measure(0, end), Length::new(10, Point::new(1, 6)));

        let bytes: Vec<u8> = units.iter().flat_map(|unit| unit.to_be_bytes()).collect();
        let big_endian = SourceText::decode(&bytes, InputEncoding::Utf16Be).unwrap();
        assert_eq!(big_endian.as_str(), source.as_str());
        assert_eq!(
            SourceText::decode(&bytes[1..], InputEncoding::Utf16Le).unwrap_err(),
            DecodeError::OddUtf16Length(9)
        );
    }
}
