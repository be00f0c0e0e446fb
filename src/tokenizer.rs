use std::str;

use nom::branch::alt;
use nom::bytes::complete::{tag, take, take_while, take_while1, take_while_m_n};
use nom::character::complete::{digit0, digit1, one_of};
use nom::combinator::{map, map_opt, opt, recognize, verify};
use nom::error::{ErrorKind, ParseError};
use nom::multi::{fold_many0, many0};
use nom::sequence::{pair, preceded};
use nom::{AsChar, IResult, Input, Parser};
use nom_locate::LocatedSpan;

pub(crate) type ParserInput<'a> = LocatedSpan<&'a [u8]>;
pub(crate) type NomError<'a> = nom::error::Error<ParserInput<'a>>;
pub(crate) type NomResult<'a, O, E = NomError<'a>> = IResult<ParserInput<'a>, O, E>;

type ByteResult<'a, O> = IResult<&'a [u8], O>;

/// One lexical token. Byte payloads borrow the tokenized buffer and are not yet
/// unescaped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Token<'a> {
    Integer(i64),
    Real(f64),
    /// Bytes after the `/`, `#xx` escapes still in place.
    Name(&'a [u8]),
    /// Bytes between the outer parentheses, escapes still in place.
    LiteralString(&'a [u8]),
    /// Bytes between `<` and `>`.
    HexString(&'a [u8]),
    ArrayStart,
    ArrayEnd,
    DictStart,
    DictEnd,
    Keyword(Keyword<'a>),
    /// Bytes that cannot start any token: stray `)`, lone `>`, braces,
    /// unterminated strings.
    Other(&'a [u8]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword<'a> {
    Obj,
    EndObj,
    Stream,
    EndStream,
    R,
    True,
    False,
    Null,
    Xref,
    Trailer,
    StartXref,
    /// Any other bare word, e.g. a content stream operator.
    Other(&'a [u8]),
}

impl<'a> Keyword<'a> {
    fn from_bytes(word: &'a [u8]) -> Keyword<'a> {
        match word {
            b"obj" => Keyword::Obj,
            b"endobj" => Keyword::EndObj,
            b"stream" => Keyword::Stream,
            b"endstream" => Keyword::EndStream,
            b"R" => Keyword::R,
            b"true" => Keyword::True,
            b"false" => Keyword::False,
            b"null" => Keyword::Null,
            b"xref" => Keyword::Xref,
            b"trailer" => Keyword::Trailer,
            b"startxref" => Keyword::StartXref,
            _ => Keyword::Other(word),
        }
    }

    /// The keyword as it is spelled in the file.
    pub fn as_bytes(&self) -> &'a [u8] {
        match self {
            Keyword::Obj => b"obj",
            Keyword::EndObj => b"endobj",
            Keyword::Stream => b"stream",
            Keyword::EndStream => b"endstream",
            Keyword::R => b"R",
            Keyword::True => b"true",
            Keyword::False => b"false",
            Keyword::Null => b"null",
            Keyword::Xref => b"xref",
            Keyword::Trailer => b"trailer",
            Keyword::StartXref => b"startxref",
            Keyword::Other(word) => *word,
        }
    }
}

/// Forward-only lexer over a byte buffer.
///
/// Whitespace and `%` comments between tokens are skipped. Every call to
/// [`Iterator::next`] either consumes at least one byte or returns `None`, so
/// iteration always terminates, and no input makes it fail: bytes that do not
/// form a token come back as [`Token::Other`].
///
/// ```
/// use pdfnative::{Keyword, Token, Tokenizer};
///
/// let tokens: Vec<_> = Tokenizer::new(b"12 0 obj << /Type /Page >> endobj").collect();
/// assert_eq!(tokens[0], Token::Integer(12));
/// assert_eq!(tokens[2], Token::Keyword(Keyword::Obj));
/// assert_eq!(tokens[4], Token::Name(b"Type"));
/// ```
#[derive(Clone)]
pub struct Tokenizer<'a> {
    buffer: &'a [u8],
    input: ParserInput<'a>,
}

impl<'a> Tokenizer<'a> {
    pub fn new(buffer: &'a [u8]) -> Tokenizer<'a> {
        Tokenizer::at(buffer, 0)
    }

    /// Start lexing at `offset`; positions stay relative to the start of `buffer`.
    pub fn at(buffer: &'a [u8], offset: usize) -> Tokenizer<'a> {
        Tokenizer {
            buffer,
            input: LocatedSpan::new(buffer).take_from(offset.min(buffer.len())),
        }
    }

    /// Absolute offset of the next unread byte.
    pub fn offset(&self) -> usize {
        self.input.location_offset()
    }

    /// Unread part of the buffer.
    pub fn remaining(&self) -> &'a [u8] {
        *self.input.fragment()
    }

    pub fn buffer(&self) -> &'a [u8] {
        self.buffer
    }

    pub fn peek(&self) -> Option<Token<'a>> {
        self.clone().next()
    }

    pub fn is_at_end(&self) -> bool {
        self.remaining().is_empty()
    }

    /// Continue from an absolute offset.
    pub(crate) fn seek(&mut self, offset: usize) {
        self.input = LocatedSpan::new(self.buffer).take_from(offset.min(self.buffer.len()));
    }

    /// Skip whitespace and comments, leaving the tokenizer on the next token.
    pub(crate) fn skip_space(&mut self) {
        if let Ok((input, _)) = space(self.input) {
            self.input = input;
        }
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        self.skip_space();
        let input = self.input;
        let bytes: &'a [u8] = *input.fragment();
        if bytes.is_empty() {
            return None;
        }
        match token(input) {
            Ok((rest, token)) if rest.location_offset() > input.location_offset() => {
                self.input = rest;
                Some(token)
            }
            _ => {
                self.input = input.take_from(1);
                Some(Token::Other(&bytes[..1]))
            }
        }
    }
}

#[inline]
pub(crate) fn is_whitespace(c: u8) -> bool {
    b" \t\n\r\0\x0C".contains(&c)
}

#[inline]
pub(crate) fn is_delimiter(c: u8) -> bool {
    b"()<>[]{}/%".contains(&c)
}

#[inline]
pub(crate) fn is_regular(c: u8) -> bool {
    !is_whitespace(c) && !is_delimiter(c)
}

fn comment(input: ParserInput) -> NomResult<()> {
    map((tag(&b"%"[..]), take_while(|c: u8| !b"\r\n".contains(&c))), |_| ()).parse(input)
}

fn space(input: ParserInput) -> NomResult<()> {
    fold_many0(alt((map(take_while1(is_whitespace), |_| ()), comment)), || {}, |_, _| ()).parse(input)
}

fn token(input: ParserInput) -> NomResult<Token> {
    alt((
        map(tag(&b"<<"[..]), |_| Token::DictStart),
        map(tag(&b">>"[..]), |_| Token::DictEnd),
        map(tag(&b"["[..]), |_| Token::ArrayStart),
        map(tag(&b"]"[..]), |_| Token::ArrayEnd),
        map(preceded(tag(&b"/"[..]), take_while(is_regular)), |name: ParserInput| {
            Token::Name(*name.fragment())
        }),
        literal_string,
        hexadecimal_string,
        number,
        map(take_while1(is_regular), |word: ParserInput| {
            Token::Keyword(Keyword::from_bytes(*word.fragment()))
        }),
    ))
    .parse(input)
}

fn number(input: ParserInput) -> NomResult<Token> {
    map_opt(
        recognize(pair(
            opt(one_of("+-")),
            alt((
                recognize(pair(digit1, opt(pair(tag(&b"."[..]), digit0)))),
                recognize(pair(tag(&b"."[..]), digit1)),
            )),
        )),
        |digits: ParserInput| {
            let text = str::from_utf8(*digits.fragment()).ok()?;
            if text.contains('.') {
                text.parse().ok().map(Token::Real)
            } else {
                // Integers too large for i64 keep their magnitude as reals.
                text.parse()
                    .map(Token::Integer)
                    .ok()
                    .or_else(|| text.parse().ok().map(Token::Real))
            }
        },
    )
    .parse(input)
}

fn literal_string(input: ParserInput) -> NomResult<Token> {
    let bytes: &[u8] = *input.fragment();
    if bytes.first() != Some(&b'(') {
        return Err(nom::Err::Error(NomError::from_error_kind(input, ErrorKind::Char)));
    }

    let mut depth = 0usize;
    let mut index = 1;
    while index < bytes.len() {
        match bytes[index] {
            b'\\' => index += 1,
            b'(' => depth += 1,
            b')' if depth == 0 => return Ok((input.take_from(index + 1), Token::LiteralString(&bytes[1..index]))),
            b')' => depth -= 1,
            _ => {}
        }
        index += 1;
    }

    Ok((input.take_from(bytes.len()), Token::Other(bytes)))
}

fn hexadecimal_string(input: ParserInput) -> NomResult<Token> {
    let bytes: &[u8] = *input.fragment();
    if bytes.first() != Some(&b'<') || bytes.get(1) == Some(&b'<') {
        return Err(nom::Err::Error(NomError::from_error_kind(input, ErrorKind::Char)));
    }

    match bytes.iter().position(|&c| c == b'>') {
        Some(end) => Ok((input.take_from(end + 1), Token::HexString(&bytes[1..end]))),
        None => Ok((input.take_from(bytes.len()), Token::Other(bytes))),
    }
}

// Decoding of raw token payloads.

fn eol(input: &[u8]) -> ByteResult<&[u8]> {
    alt((tag(&b"\r\n"[..]), tag(&b"\n"[..]), tag(&b"\r"[..]))).parse(input)
}

fn hex_char(input: &[u8]) -> ByteResult<u8> {
    map_opt(
        verify(take(2usize), |h: &[u8]| h.iter().all(u8::is_ascii_hexdigit)),
        |h: &[u8]| str::from_utf8(h).ok().and_then(|h| u8::from_str_radix(h, 16).ok()),
    )
    .parse(input)
}

fn oct_char(input: &[u8]) -> ByteResult<u8> {
    map(take_while_m_n(1, 3, AsChar::is_oct_digit), |digits: &[u8]| {
        // Overflow past 0o377 is ignored.
        digits.iter().fold(0u16, |acc, digit| acc * 8 + u16::from(digit - b'0')) as u8
    })
    .parse(input)
}

fn escape_sequence(input: &[u8]) -> ByteResult<Option<u8>> {
    preceded(
        tag(&b"\\"[..]),
        alt((
            map(oct_char, Some),
            map(eol, |_| None),
            map(tag(&b"n"[..]), |_| Some(b'\n')),
            map(tag(&b"r"[..]), |_| Some(b'\r')),
            map(tag(&b"t"[..]), |_| Some(b'\t')),
            map(tag(&b"b"[..]), |_| Some(b'\x08')),
            map(tag(&b"f"[..]), |_| Some(b'\x0C')),
            map(take(1usize), |c: &[u8]| Some(c[0])),
        )),
    )
    .parse(input)
}

enum LiteralPiece<'a> {
    Direct(&'a [u8]),
    Escape(Option<u8>),
    Eol,
}

impl LiteralPiece<'_> {
    fn push(&self, output: &mut Vec<u8>) {
        match self {
            LiteralPiece::Direct(bytes) => output.extend_from_slice(bytes),
            LiteralPiece::Escape(escaped) => output.extend(escaped),
            LiteralPiece::Eol => output.push(b'\n'),
        }
    }
}

/// Whether a raw literal string differs from its decoded form.
pub(crate) fn literal_needs_decoding(raw: &[u8]) -> bool {
    raw.iter().any(|&c| c == b'\\' || c == b'\r')
}

/// Unescape the inside of a literal string. Unescaped end-of-line markers of
/// any kind read as a single LF.
pub(crate) fn decode_literal_string(raw: &[u8]) -> Vec<u8> {
    let result: ByteResult<Vec<u8>> = fold_many0(
        alt((
            map(take_while1(|c: u8| c != b'\\' && c != b'\r'), LiteralPiece::Direct),
            map(escape_sequence, LiteralPiece::Escape),
            map(eol, |_| LiteralPiece::Eol),
        )),
        || Vec::with_capacity(raw.len()),
        |mut output, piece| {
            piece.push(&mut output);
            output
        },
    )
    .parse(raw);

    match result {
        Ok((rest, mut output)) => {
            output.extend_from_slice(rest);
            output
        }
        Err(_) => raw.to_vec(),
    }
}

/// Decode the inside of a hex string. Non-hex bytes are skipped and a final odd
/// digit is padded with zero.
pub(crate) fn decode_hex_string(raw: &[u8]) -> Vec<u8> {
    let mut output = Vec::with_capacity(raw.len() / 2 + 1);
    let mut high = None;
    for digit in raw.iter().filter_map(|&c| char::from(c).to_digit(16)) {
        match high.take() {
            None => high = Some(digit as u8),
            Some(high) => output.push(high << 4 | digit as u8),
        }
    }
    if let Some(high) = high {
        output.push(high << 4);
    }
    output
}

pub(crate) fn name_needs_decoding(raw: &[u8]) -> bool {
    raw.contains(&b'#')
}

/// Replace `#xx` escapes in a name. A `#` without two hex digits is kept.
pub(crate) fn decode_name(raw: &[u8]) -> Vec<u8> {
    let result: ByteResult<Vec<u8>> =
        many0(alt((preceded(tag(&b"#"[..]), hex_char), map(take(1usize), |c: &[u8]| c[0])))).parse(raw);
    match result {
        Ok((_, name)) => name,
        Err(_) => raw.to_vec(),
    }
}
