use std::collections::HashSet;
use std::str;

use log::{debug, error, warn};
use nom::Parser;
use nom::bytes::complete::{tag, take_while1};
use nom::combinator::map_res;
use nom::sequence::preceded;
use regex::bytes::Regex;

use crate::error::{ParseError, XrefError};
use crate::parser::{ObjectParser, Scratch};
use crate::tokenizer::{Keyword, NomResult, ParserInput, Token, Tokenizer};
use crate::xref::{Xref, XrefEntry};
use crate::{Allocator, Dictionary, Object, ObjectId, Result};

/// How far from the start of the file the `%PDF-` header may appear.
const HEADER_WINDOW: usize = 1024;
/// How far from the end of the file `startxref` is searched for.
const STARTXREF_WINDOW: usize = 1024;

/// Trailer information gathered from the xref sections.
pub(crate) struct Trailer<'a> {
    /// Newest trailer dictionary.
    pub dict: Dictionary<'a>,
    /// First `/Root` seen walking from the newest section backwards.
    pub root: Option<&'a Object<'a>>,
}

/// Reads the cross reference structure of a file buffer.
pub(crate) struct Reader<'a> {
    pub buffer: &'a [u8],
    pub allocator: &'a Allocator,
    pub max_nesting_depth: usize,
    pub max_object_id: u32,
}

/// PDF version named by the `%PDF-x.y` header, which may follow some leading garbage.
pub(crate) fn header_version(buffer: &[u8]) -> Option<String> {
    let window = &buffer[..buffer.len().min(HEADER_WINDOW)];
    let start = window.windows(5).position(|w| w == b"%PDF-")?;
    header(ParserInput::new(&buffer[start..]))
}

fn header(input: ParserInput) -> Option<String> {
    let result: NomResult<String> = map_res(
        preceded(tag(&b"%PDF-"[..]), take_while1(|c: u8| c.is_ascii_digit() || c == b'.')),
        |version: ParserInput| str::from_utf8(version.fragment()).map(String::from),
    )
    .parse(input);
    result.ok().map(|(_, version)| version)
}

/// Offset named after the last `startxref` keyword near the end of the file.
pub(crate) fn xref_start(buffer: &[u8]) -> Option<usize> {
    let tail = buffer.len().saturating_sub(STARTXREF_WINDOW);
    let found = buffer[tail..].windows(9).rposition(|w| w == b"startxref")?;
    match Tokenizer::at(buffer, tail + found + 9).next() {
        Some(Token::Integer(offset)) => usize::try_from(offset).ok(),
        _ => None,
    }
}

impl<'a> Reader<'a> {
    fn parser_at(&self, offset: usize) -> ObjectParser<'a> {
        ObjectParser::new(
            Tokenizer::at(self.buffer, offset),
            self.allocator,
            Scratch::default(),
            self.max_nesting_depth,
        )
    }

    /// Follow the chain of xref sections starting at `start`, newest first.
    ///
    /// Rows of newer sections shadow rows of older ones. The chain stops at a
    /// section without `/Prev`, at an offset already visited, or at an offset
    /// outside the file. Failing to read any section but the first ends the
    /// chain without discarding what was read so far.
    pub(crate) fn read_xref_chain(&self, xref: &mut Xref<'a>, start: usize) -> Result<Trailer<'a>> {
        let mut visited = HashSet::new();
        let mut offset = start;
        let mut newest: Option<Dictionary<'a>> = None;
        let mut root = None;

        loop {
            if !visited.insert(offset) {
                warn!("Xref chain revisits byte {}, stopping", offset);
                break;
            }

            let trailer = match self.read_section(offset, xref) {
                Ok(trailer) => trailer,
                Err(err) => match newest {
                    None => return Err(err),
                    Some(_) => {
                        warn!("Ignoring older xref section at byte {}: {}", offset, err);
                        break;
                    }
                },
            };
            debug!("Read xref section at byte {}, {} entries so far", offset, xref.len());

            if root.is_none() {
                root = trailer.get(b"Root").ok();
            }
            if newest.is_none() {
                newest = Some(trailer);
                xref.size = trailer
                    .get(b"Size")
                    .and_then(Object::as_i64)
                    .ok()
                    .and_then(|size| u32::try_from(size).ok())
                    .unwrap_or(0);
            }

            match trailer.get(b"Prev").and_then(Object::as_i64) {
                Ok(prev) => match usize::try_from(prev) {
                    Ok(prev) if prev < self.buffer.len() => offset = prev,
                    _ => {
                        warn!("{} ({})", XrefError::PrevStart, prev);
                        break;
                    }
                },
                Err(_) => break,
            }
        }

        Ok(Trailer {
            dict: newest.unwrap_or_default(),
            root,
        })
    }

    /// Read one `xref` table and its trailer dictionary.
    pub(crate) fn read_section(&self, offset: usize, xref: &mut Xref<'a>) -> Result<Dictionary<'a>> {
        let mut parser = self.parser_at(offset);
        let tokenizer = parser.tokenizer();

        match tokenizer.next() {
            Some(Token::Keyword(Keyword::Xref)) => {}
            Some(Token::Integer(_)) => {
                if let (Some(Token::Integer(_)), Some(Token::Keyword(Keyword::Obj))) = (tokenizer.next(), tokenizer.next())
                {
                    warn!("Cross-reference stream at byte {} is not supported", offset);
                    return Err(XrefError::Stream.into());
                }
                return Err(XrefError::Parse.into());
            }
            _ => return Err(XrefError::Parse.into()),
        }

        loop {
            match tokenizer.next() {
                Some(Token::Keyword(Keyword::Trailer)) => break,
                Some(Token::Integer(first)) => {
                    let (Ok(first), Some(Token::Integer(count))) = (u32::try_from(first), tokenizer.next()) else {
                        return Err(XrefError::Parse.into());
                    };
                    for index in 0..count.max(0) {
                        if !matches!(tokenizer.peek(), Some(Token::Integer(_))) {
                            warn!("Xref subsection at byte {} ends after {} of {} rows", offset, index, count);
                            break;
                        }
                        let (position, generation, kind) = match (tokenizer.next(), tokenizer.next(), tokenizer.next()) {
                            (Some(Token::Integer(position)), Some(Token::Integer(generation)), Some(Token::Keyword(Keyword::Other(kind)))) => {
                                (position, generation, kind)
                            }
                            _ => return Err(XrefError::Parse.into()),
                        };
                        let freed = match kind {
                            b"n" => false,
                            b"f" => true,
                            _ => return Err(XrefError::Parse.into()),
                        };
                        let id = u32::try_from(index).ok().and_then(|index| first.checked_add(index));
                        match (id, u32::try_from(generation)) {
                            (Some(id), Ok(generation)) if id <= self.max_object_id => {
                                xref.insert_if_absent(id, XrefEntry::new(position, generation, freed));
                            }
                            _ => debug!("Ignoring xref row for object {} + {}", first, index),
                        }
                    }
                }
                _ => return Err(XrefError::Parse.into()),
            }
        }

        match parser.next_value() {
            Ok(Object::Dictionary(trailer)) => Ok(trailer),
            _ => Err(ParseError::InvalidTrailer.into()),
        }
    }

    /// Object header (`N G obj`) at `offset`, if there is one.
    fn header_at(&self, offset: i64) -> Option<ObjectId> {
        let offset = usize::try_from(offset).ok().filter(|&offset| offset < self.buffer.len())?;
        self.parser_at(offset).object_header()
    }

    /// Rebuild the table by scanning the whole file for `N G obj` headers.
    ///
    /// For each id the first header in file order wins. A scanned header is
    /// recorded when `xref` has no entry for its id, or when the in-use entry
    /// there has not been resolved and either failed to read or does not point
    /// at a header for that id. Returns the newest trailer dictionary that names
    /// a `/Root`, or else the newest trailer found at all.
    pub(crate) fn full_scan(&self, xref: &mut Xref<'a>) -> Option<Trailer<'a>> {
        let pattern = match Regex::new(r"(?-u)(\d+)\s+(\d+)\s+obj\b") {
            Ok(pattern) => pattern,
            Err(err) => {
                error!("Object header pattern failed to compile: {}", err);
                return None;
            }
        };

        let (mut added, mut repaired) = (0, 0);
        let mut seen = HashSet::new();
        for captures in pattern.captures_iter(self.buffer) {
            let number = |index: usize| {
                captures
                    .get(index)
                    .and_then(|digits| str::from_utf8(digits.as_bytes()).ok())
                    .and_then(|digits| digits.parse::<u32>().ok())
            };
            let (Some(id), Some(generation), Some(header)) = (number(1), number(2), captures.get(0)) else {
                continue;
            };
            if id > self.max_object_id || !seen.insert(id) {
                continue;
            }
            let Ok(offset) = i64::try_from(header.start()) else {
                continue;
            };
            match xref.get(id) {
                None => {
                    xref.replace(id, XrefEntry::new(offset, generation, false));
                    added += 1;
                }
                Some(entry) if entry.is_in_use() && entry.offset != offset && entry.resolved().is_none() => {
                    if entry.is_unreadable() || self.header_at(entry.offset).map(|found| found.0) != Some(id) {
                        debug!("Object {} moved from byte {} to byte {}", id, entry.offset, offset);
                        xref.replace(id, XrefEntry::new(offset, generation, false));
                        repaired += 1;
                    }
                }
                Some(_) => {}
            }
        }
        debug!("Full scan added {} objects and repaired {}", added, repaired);

        self.scan_trailers()
    }

    fn scan_trailers(&self) -> Option<Trailer<'a>> {
        let keyword = b"trailer";
        let positions = self
            .buffer
            .windows(keyword.len())
            .enumerate()
            .filter(|(_, window)| *window == keyword)
            .map(|(position, _)| position)
            .collect::<Vec<_>>();

        let mut newest = None;
        for position in positions.into_iter().rev() {
            let mut parser = self.parser_at(position + keyword.len());
            let Ok(Object::Dictionary(dict)) = parser.next_value() else {
                continue;
            };
            if let Ok(root) = dict.get(b"Root") {
                return Some(Trailer { dict, root: Some(root) });
            }
            newest.get_or_insert(Trailer { dict, root: None });
        }
        newest
    }
}
