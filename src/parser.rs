use log::{trace, warn};

use crate::error::ParseError;
use crate::tokenizer::{self, Keyword, Token, Tokenizer};
use crate::{Allocator, Dictionary, Error, Object, ObjectId, Result, Stream, StringFormat};

/// Reusable stacks holding the children of composites under construction.
///
/// Children are pushed while a composite is open and moved into the arena in one
/// slice when it closes, so the stacks only ever grow to the widest nesting seen.
#[derive(Default)]
pub(crate) struct Scratch<'a> {
    items: Vec<Object<'a>>,
    entries: Vec<(&'a [u8], Object<'a>)>,
}

/// Builds arena objects from the token stream of a [`Tokenizer`].
pub(crate) struct ObjectParser<'a> {
    tokenizer: Tokenizer<'a>,
    allocator: &'a Allocator,
    scratch: Scratch<'a>,
    max_depth: usize,
    references: bool,
}

impl<'a> ObjectParser<'a> {
    pub(crate) fn new(
        tokenizer: Tokenizer<'a>, allocator: &'a Allocator, scratch: Scratch<'a>, max_depth: usize,
    ) -> ObjectParser<'a> {
        ObjectParser {
            tokenizer,
            allocator,
            scratch,
            max_depth,
            references: true,
        }
    }

    /// Treat `N G R` as three separate tokens, as content streams have no references.
    pub(crate) fn without_references(mut self) -> ObjectParser<'a> {
        self.references = false;
        self
    }

    pub(crate) fn into_scratch(self) -> Scratch<'a> {
        self.scratch
    }

    pub(crate) fn tokenizer(&mut self) -> &mut Tokenizer<'a> {
        &mut self.tokenizer
    }

    pub(crate) fn allocator(&self) -> &'a Allocator {
        self.allocator
    }

    /// Parse the value that starts with `token`.
    pub(crate) fn value(&mut self, token: Token<'a>) -> Result<Object<'a>> {
        self.scratch.items.clear();
        self.scratch.entries.clear();
        self.value_from(token, 0)
    }

    pub(crate) fn next_value(&mut self) -> Result<Object<'a>> {
        let token = self.tokenizer.next().ok_or(ParseError::EndOfInput)?;
        self.value(token)
    }

    /// Parse the key/value pairs of an inline image up to and including `ID`.
    pub(crate) fn inline_image_dictionary(&mut self) -> Result<Dictionary<'a>> {
        self.scratch.items.clear();
        self.scratch.entries.clear();
        self.dictionary(1, true)
    }

    /// Read `N G obj` at the current position.
    pub(crate) fn object_header(&mut self) -> Option<ObjectId> {
        match (self.tokenizer.next(), self.tokenizer.next(), self.tokenizer.next()) {
            (Some(Token::Integer(id)), Some(Token::Integer(generation)), Some(Token::Keyword(Keyword::Obj))) => {
                Some((u32::try_from(id).ok()?, u32::try_from(generation).ok()?))
            }
            _ => None,
        }
    }

    /// Parse one indirect object, including its stream body.
    ///
    /// `length_of` resolves an indirect `/Length`; it is only called for streams.
    pub(crate) fn indirect_object(
        &mut self, length_of: &dyn Fn(ObjectId) -> Option<i64>,
    ) -> Result<(ObjectId, Object<'a>)> {
        let offset = self.tokenizer.offset();
        let id = self.object_header().ok_or(Error::IndirectObject { offset })?;

        let object = match self.tokenizer.next() {
            Some(Token::Keyword(Keyword::EndObj)) | None => Object::Null,
            Some(token) => self.value(token)?,
        };

        if let Object::Dictionary(dict) = object {
            if self.tokenizer.peek() == Some(Token::Keyword(Keyword::Stream)) {
                self.tokenizer.next();
                return Ok((id, self.stream(dict, length_of)));
            }
        }

        Ok((id, object))
    }

    fn value_from(&mut self, token: Token<'a>, depth: usize) -> Result<Object<'a>> {
        let object = match token {
            Token::Integer(value) => self.integer_or_reference(value),
            Token::Real(value) => Object::Real(value),
            Token::Name(raw) => Object::Name(self.name(raw)),
            Token::LiteralString(raw) => Object::String(self.literal(raw), StringFormat::Literal),
            Token::HexString(raw) => Object::String(
                self.allocator.alloc_bytes(&tokenizer::decode_hex_string(raw)),
                StringFormat::Hexadecimal,
            ),
            Token::ArrayStart => self.array(depth + 1)?,
            Token::DictStart => Object::Dictionary(self.dictionary(depth + 1, false)?),
            Token::Keyword(Keyword::True) => Object::Boolean(true),
            Token::Keyword(Keyword::False) => Object::Boolean(false),
            Token::Keyword(Keyword::Null) => Object::Null,
            _ => return Err(ParseError::UnexpectedToken(self.tokenizer.offset()).into()),
        };
        Ok(object)
    }

    fn integer_or_reference(&mut self, value: i64) -> Object<'a> {
        if self.references {
            let mut lookahead = self.tokenizer.clone();
            if let (Some(Token::Integer(generation)), Some(Token::Keyword(Keyword::R))) =
                (lookahead.next(), lookahead.next())
            {
                if let (Ok(id), Ok(generation)) = (u32::try_from(value), u32::try_from(generation)) {
                    self.tokenizer = lookahead;
                    return Object::Reference((id, generation));
                }
            }
        }
        Object::Integer(value)
    }

    fn check_depth(&self, depth: usize) -> Result<()> {
        if depth > self.max_depth {
            warn!("Nesting deeper than {} levels at byte {}", self.max_depth, self.tokenizer.offset());
            return Err(ParseError::NestingTooDeep(self.max_depth).into());
        }
        Ok(())
    }

    fn array(&mut self, depth: usize) -> Result<Object<'a>> {
        self.check_depth(depth)?;
        let start = self.scratch.items.len();
        loop {
            let before = self.tokenizer.offset();
            match self.tokenizer.next() {
                None | Some(Token::ArrayEnd) => break,
                Some(token) if ends_object(&token) || token == Token::DictEnd => {
                    self.tokenizer.seek(before);
                    break;
                }
                Some(token @ (Token::Other(_) | Token::Keyword(Keyword::Other(_) | Keyword::R))) => {
                    trace!("Skipping {:?} inside array at byte {}", token, before);
                }
                Some(token) => {
                    let value = self.value_from(token, depth)?;
                    self.scratch.items.push(value);
                }
            }
        }

        let allocator = self.allocator;
        Ok(Object::Array(allocator.alloc_objects(self.scratch.items.drain(start..))))
    }

    fn dictionary(&mut self, depth: usize, inline_image: bool) -> Result<Dictionary<'a>> {
        self.check_depth(depth)?;
        let start = self.scratch.entries.len();
        loop {
            let before = self.tokenizer.offset();
            let key = match self.tokenizer.next() {
                None => break,
                Some(Token::DictEnd) if !inline_image => break,
                Some(Token::Keyword(Keyword::Other(b"ID"))) if inline_image => break,
                Some(Token::Name(raw)) => self.name(raw),
                Some(token) if ends_object(&token) => {
                    self.tokenizer.seek(before);
                    break;
                }
                Some(token) => {
                    trace!("Skipping {:?} in place of a dictionary key at byte {}", token, before);
                    continue;
                }
            };

            let before = self.tokenizer.offset();
            match self.tokenizer.next() {
                None => break,
                Some(token @ (Token::DictEnd | Token::Keyword(_))) if ends_dictionary(&token, inline_image) => {
                    self.tokenizer.seek(before);
                }
                Some(token @ (Token::Other(_) | Token::ArrayEnd | Token::Keyword(Keyword::Other(_) | Keyword::R))) => {
                    trace!("Dropping key /{} with value {:?}", String::from_utf8_lossy(key), token);
                }
                Some(token) => {
                    let value = self.value_from(token, depth)?;
                    self.scratch.entries.push((key, value));
                }
            }
        }

        let allocator = self.allocator;
        Ok(Dictionary::from_entries(allocator.alloc_entries(self.scratch.entries.drain(start..))))
    }

    fn stream(&mut self, dict: Dictionary<'a>, length_of: &dyn Fn(ObjectId) -> Option<i64>) -> Object<'a> {
        let buffer = self.tokenizer.buffer();
        let start = skip_stream_eol(buffer, self.tokenizer.offset());

        let declared = match dict.get(b"Length") {
            Ok(Object::Integer(length)) => Some(*length),
            Ok(Object::Reference(id)) => length_of(*id),
            _ => None,
        };
        let end = declared
            .and_then(|length| usize::try_from(length).ok())
            .and_then(|length| start.checked_add(length))
            .filter(|&end| end <= buffer.len() && endstream_follows(buffer, end))
            .or_else(|| {
                warn!("Stream at byte {} has an unusable /Length {:?}, scanning for endstream", start, declared);
                find_endstream(buffer, start)
            })
            .unwrap_or(buffer.len());

        self.tokenizer.seek(end);
        if self.tokenizer.peek() == Some(Token::Keyword(Keyword::EndStream)) {
            self.tokenizer.next();
        }

        Object::Stream(self.allocator.alloc_stream(Stream::new(dict, &buffer[start..end], start)))
    }

    fn name(&self, raw: &'a [u8]) -> &'a [u8] {
        if tokenizer::name_needs_decoding(raw) {
            self.allocator.alloc_bytes(&tokenizer::decode_name(raw))
        } else {
            raw
        }
    }

    fn literal(&self, raw: &'a [u8]) -> &'a [u8] {
        if tokenizer::literal_needs_decoding(raw) {
            self.allocator.alloc_bytes(&tokenizer::decode_literal_string(raw))
        } else {
            raw
        }
    }
}

/// Keywords that can only appear after a complete value.
fn ends_object(token: &Token) -> bool {
    matches!(
        token,
        Token::Keyword(
            Keyword::Obj
                | Keyword::EndObj
                | Keyword::Stream
                | Keyword::EndStream
                | Keyword::Xref
                | Keyword::Trailer
                | Keyword::StartXref
        )
    )
}

fn ends_dictionary(token: &Token, inline_image: bool) -> bool {
    match token {
        Token::DictEnd => !inline_image,
        Token::Keyword(Keyword::Other(b"ID")) => inline_image,
        token => ends_object(token),
    }
}

/// Position of the first data byte after the `stream` keyword.
fn skip_stream_eol(buffer: &[u8], mut position: usize) -> usize {
    while matches!(buffer.get(position), Some(b' ' | b'\t')) {
        position += 1;
    }
    match (buffer.get(position), buffer.get(position + 1)) {
        (Some(b'\r'), Some(b'\n')) => position + 2,
        (Some(b'\r' | b'\n'), _) => position + 1,
        _ => position,
    }
}

fn endstream_follows(buffer: &[u8], position: usize) -> bool {
    Tokenizer::at(buffer, position).next() == Some(Token::Keyword(Keyword::EndStream))
}

/// End of the stream data that starts at `start`, found by scanning for the
/// `endstream` keyword and dropping the end-of-line marker before it.
pub(crate) fn find_endstream(buffer: &[u8], start: usize) -> Option<usize> {
    let needle = b"endstream";
    let data = buffer.get(start..)?;
    let found = data.windows(needle.len()).position(|window| window == needle)?;
    let mut end = start + found;
    if end > start && buffer[end - 1] == b'\n' {
        end -= 1;
    }
    if end > start && buffer[end - 1] == b'\r' {
        end -= 1;
    }
    Some(end)
}
