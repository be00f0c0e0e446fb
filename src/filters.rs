use std::io::Read;

use flate2::read::ZlibDecoder;
use log::warn;
use weezl::BitOrder;
use weezl::decode::Decoder as LzwDecoder;

use crate::error::DecompressError;
use crate::{Dictionary, Object, Result};

pub mod png;

/// Stream filters the loader can decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    Flate,
    Lzw,
    AsciiHex,
    Ascii85,
}

impl Filter {
    /// Look a filter up by its full or abbreviated (inline image) name.
    pub fn from_name(name: &[u8]) -> Option<Filter> {
        match name {
            b"FlateDecode" | b"Fl" => Some(Filter::Flate),
            b"LZWDecode" | b"LZW" => Some(Filter::Lzw),
            b"ASCIIHexDecode" | b"AHx" => Some(Filter::AsciiHex),
            b"ASCII85Decode" | b"A85" => Some(Filter::Ascii85),
            _ => None,
        }
    }

    pub fn decode(self, input: &[u8], params: Option<Dictionary<'_>>) -> Result<Vec<u8>> {
        match self {
            Filter::Flate => apply_predictor(decode_flate(input), params),
            Filter::Lzw => apply_predictor(decode_lzw(input, params), params),
            Filter::AsciiHex => Ok(decode_ascii_hex(input)?),
            Filter::Ascii85 => Ok(decode_ascii85(input)?),
        }
    }
}

/// Run `input` through a chain of filters, given in decoding order.
///
/// `params` holds the `/DecodeParms` dictionary matching each filter, if any.
pub fn decode_chain(input: &[u8], filters: &[&[u8]], params: &[Option<Dictionary<'_>>]) -> Result<Vec<u8>> {
    let mut output = input.to_vec();
    for (index, name) in filters.iter().enumerate() {
        let filter = Filter::from_name(name)
            .ok_or_else(|| DecompressError::UnsupportedFilter(String::from_utf8_lossy(name).into_owned()))?;
        output = filter.decode(&output, params.get(index).copied().flatten())?;
    }
    Ok(output)
}

/// Inflate zlib data. Output produced before an error is kept.
fn decode_flate(input: &[u8]) -> Vec<u8> {
    let mut output = Vec::with_capacity(input.len() * 2);
    if !input.is_empty() {
        let mut decoder = ZlibDecoder::new(input);
        if let Err(err) = decoder.read_to_end(&mut output) {
            warn!("FlateDecode stopped after {} bytes: {}", output.len(), err);
        }
    }
    output
}

/// Decode LZW data, honoring `/EarlyChange` (default 1). Output produced before
/// an error is kept.
fn decode_lzw(input: &[u8], params: Option<Dictionary>) -> Vec<u8> {
    const MIN_CODE_SIZE: u8 = 8;

    let early_change = params
        .and_then(|params| params.get(b"EarlyChange").and_then(Object::as_i64).ok())
        .map(|value| value != 0)
        .unwrap_or(true);

    let mut decoder = if early_change {
        LzwDecoder::with_tiff_size_switch(BitOrder::Msb, MIN_CODE_SIZE)
    } else {
        LzwDecoder::new(BitOrder::Msb, MIN_CODE_SIZE)
    };

    let mut output = Vec::with_capacity(input.len() * 2);
    let result = decoder.into_stream(&mut output).decode_all(input);
    if let Err(err) = result.status {
        warn!("LZWDecode stopped after {} bytes: {}", result.bytes_written, err);
    }
    output
}

fn apply_predictor(data: Vec<u8>, params: Option<Dictionary>) -> Result<Vec<u8>> {
    let params = match params {
        Some(params) => params,
        None => return Ok(data),
    };
    let number = |key: &[u8], default: i64| params.get(key).and_then(Object::as_i64).unwrap_or(default);

    match number(b"Predictor", 1) {
        predictor @ 10..=15 => {
            let colors = number(b"Colors", 1).clamp(1, 32) as usize;
            let bits = number(b"BitsPerComponent", 8).clamp(1, 16) as usize;
            let columns = number(b"Columns", 1).clamp(1, 1 << 24) as usize;
            let bytes_per_pixel = (colors * bits).div_ceil(8);
            let bytes_per_row = (colors * bits).saturating_mul(columns).div_ceil(8);
            log::trace!("PNG predictor {} with {} bytes per row", predictor, bytes_per_row);
            Ok(png::decode_frame(&data, bytes_per_pixel, bytes_per_row)?)
        }
        1 => Ok(data),
        predictor => {
            warn!("Predictor {} is not supported, keeping predicted data", predictor);
            Ok(data)
        }
    }
}

/// Decode ASCIIHexDecode data up to the `>` end marker.
pub fn decode_ascii_hex(input: &[u8]) -> std::result::Result<Vec<u8>, DecompressError> {
    let mut output = Vec::with_capacity(input.len() / 2 + 1);
    let mut high = None;
    for &byte in input.iter().take_while(|&&byte| byte != b'>') {
        let digit = match byte {
            b'0'..=b'9' => byte - b'0',
            b'a'..=b'f' => byte - b'a' + 10,
            b'A'..=b'F' => byte - b'A' + 10,
            byte if crate::tokenizer::is_whitespace(byte) => continue,
            byte => return Err(DecompressError::AsciiHex(byte)),
        };
        match high.take() {
            None => high = Some(digit),
            Some(high) => output.push(high << 4 | digit),
        }
    }
    if let Some(high) = high {
        output.push(high << 4);
    }
    Ok(output)
}

/// Decode ASCII85Decode data, with or without the `<~` and `~>` markers.
pub fn decode_ascii85(input: &[u8]) -> std::result::Result<Vec<u8>, DecompressError> {
    let input = input.strip_prefix(b"<~").unwrap_or(input);
    let input = match input.iter().position(|&byte| byte == b'~') {
        Some(end) => &input[..end],
        None => input,
    };

    let mut output = Vec::with_capacity(input.len() / 5 * 4 + 4);
    let mut group = [0_u8; 5];
    let mut length = 0;
    for &byte in input {
        match byte {
            b'z' if length == 0 => output.extend_from_slice(&[0; 4]),
            b'z' => return Err(DecompressError::Ascii85("'z' inside a group")),
            b'!'..=b'u' => {
                group[length] = byte - b'!';
                length += 1;
                if length == 5 {
                    output.extend_from_slice(&ascii85_group(&group)?);
                    length = 0;
                }
            }
            byte if crate::tokenizer::is_whitespace(byte) => {}
            _ => return Err(DecompressError::Ascii85("invalid character")),
        }
    }

    match length {
        0 => {}
        1 => return Err(DecompressError::Ascii85("final group has a single character")),
        _ => {
            group[length..].fill(b'u' - b'!');
            output.extend_from_slice(&ascii85_group(&group)?[..length - 1]);
        }
    }
    Ok(output)
}

fn ascii85_group(digits: &[u8; 5]) -> std::result::Result<[u8; 4], DecompressError> {
    let value = digits.iter().fold(0_u64, |value, &digit| value * 85 + u64::from(digit));
    u32::try_from(value)
        .map(u32::to_be_bytes)
        .map_err(|_| DecompressError::Ascii85("group value overflows 32 bits"))
}
