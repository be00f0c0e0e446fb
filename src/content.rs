use log::{trace, warn};

use crate::parser::{ObjectParser, Scratch};
use crate::tokenizer::{self, Keyword, Token, Tokenizer};
use crate::{Allocator, Object, Stream};

/// One element of a content stream.
#[derive(Debug, Clone, Copy)]
pub enum ContentToken<'a> {
    Operand(Object<'a>),
    Operator(&'a [u8]),
    /// A whole `BI ... ID <data> EI` sequence. The dictionary may use the
    /// abbreviated inline image keys.
    InlineImage(&'a Stream<'a>),
}

/// Splits a decoded content stream into operands, operators and inline images.
///
/// Operands are built in the document arena. Bytes that cannot start a value
/// are skipped.
pub struct ContentTokenizer<'a> {
    parser: ObjectParser<'a>,
}

impl<'a> ContentTokenizer<'a> {
    pub(crate) fn new(buffer: &'a [u8], allocator: &'a Allocator, max_nesting_depth: usize) -> ContentTokenizer<'a> {
        let parser = ObjectParser::new(Tokenizer::new(buffer), allocator, Scratch::default(), max_nesting_depth);
        ContentTokenizer {
            parser: parser.without_references(),
        }
    }

    fn inline_image(&mut self) -> Option<&'a Stream<'a>> {
        let dict = match self.parser.inline_image_dictionary() {
            Ok(dict) => dict,
            Err(err) => {
                warn!("Skipping inline image: {}", err);
                return None;
            }
        };

        let tokenizer = self.parser.tokenizer();
        let buffer = tokenizer.buffer();
        let mut start = tokenizer.offset();
        if buffer.get(start).is_some_and(|&byte| tokenizer::is_whitespace(byte)) {
            start += 1;
        }

        let declared = dict
            .get_abbr(b"Length", Some(b"L"))
            .and_then(Object::as_i64)
            .ok()
            .and_then(|length| usize::try_from(length).ok())
            .and_then(|length| start.checked_add(length))
            .filter(|&end| end <= buffer.len());
        let (end, resume) = declared
            .and_then(|end| end_marker_at(buffer, end).map(|resume| (end, resume)))
            .or_else(|| find_end_marker(buffer, start))
            .unwrap_or((buffer.len(), buffer.len()));
        tokenizer.seek(resume);

        let stream = Stream::new(dict, &buffer[start..end], start);
        Some(self.parser.allocator().alloc_stream(stream))
    }
}

fn ends_marker(buffer: &[u8], position: usize) -> bool {
    buffer.get(position).is_none_or(|&byte| tokenizer::is_whitespace(byte))
}

/// Offset after an `EI` found at `position`, past leading whitespace.
fn end_marker_at(buffer: &[u8], mut position: usize) -> Option<usize> {
    while buffer.get(position).is_some_and(|&byte| tokenizer::is_whitespace(byte)) {
        position += 1;
    }
    let marker = buffer.get(position..)?;
    (marker.starts_with(b"EI") && ends_marker(buffer, position + 2)).then_some(position + 2)
}

/// Find the `EI` ending inline image data that starts at `start`. It must be
/// preceded by whitespace and followed by whitespace or the end of the buffer.
/// Returns the end of the data and the offset after `EI`.
fn find_end_marker(buffer: &[u8], start: usize) -> Option<(usize, usize)> {
    let mut position = start;
    loop {
        let found = buffer.get(position..)?.windows(2).position(|window| window == b"EI")? + position;
        if found > start && tokenizer::is_whitespace(buffer[found - 1]) && ends_marker(buffer, found + 2) {
            return Some((found - 1, found + 2));
        }
        position = found + 1;
    }
}

impl<'a> Iterator for ContentTokenizer<'a> {
    type Item = ContentToken<'a>;

    fn next(&mut self) -> Option<ContentToken<'a>> {
        loop {
            let position = self.parser.tokenizer().offset();
            let token = self.parser.tokenizer().next()?;
            match token {
                Token::Keyword(Keyword::Other(b"BI")) => {
                    if let Some(image) = self.inline_image() {
                        return Some(ContentToken::InlineImage(image));
                    }
                }
                Token::Keyword(Keyword::True | Keyword::False | Keyword::Null)
                | Token::Integer(_)
                | Token::Real(_)
                | Token::Name(_)
                | Token::LiteralString(_)
                | Token::HexString(_)
                | Token::ArrayStart
                | Token::DictStart => match self.parser.value(token) {
                    Ok(operand) => return Some(ContentToken::Operand(operand)),
                    Err(err) => warn!("Skipping operand at byte {}: {}", position, err),
                },
                Token::Keyword(keyword) => return Some(ContentToken::Operator(keyword.as_bytes())),
                Token::ArrayEnd | Token::DictEnd | Token::Other(_) => {
                    trace!("Skipping {:?} in content stream at byte {}", token, position);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens<'a>(buffer: &'a [u8], allocator: &'a Allocator) -> Vec<ContentToken<'a>> {
        ContentTokenizer::new(buffer, allocator, 100).collect()
    }

    fn operators<'a>(tokens: &[ContentToken<'a>]) -> Vec<&'a [u8]> {
        tokens
            .iter()
            .filter_map(|token| match token {
                ContentToken::Operator(operator) => Some(*operator),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn operands_and_operators() {
        let allocator = Allocator::new();
        let tokens = tokens(b"BT /F1 12 Tf 72 712 Td [(Hel) -20 (lo)] TJ 1 0 0 RG ET", &allocator);
        assert_eq!(operators(&tokens), vec![&b"BT"[..], b"Tf", b"Td", b"TJ", b"RG", b"ET"]);
        assert_eq!(tokens.len(), 14);
        match tokens[1] {
            ContentToken::Operand(Object::Name(name)) => assert_eq!(name, b"F1"),
            other => panic!("unexpected {:?}", other),
        }
        match tokens[7] {
            ContentToken::Operand(Object::Array(items)) => assert_eq!(items.len(), 3),
            other => panic!("unexpected {:?}", other),
        }
        // "1 0 0 RG" stays four tokens, there are no references in content.
        assert!(matches!(tokens[9], ContentToken::Operand(Object::Integer(1))));
    }

    #[test]
    fn stray_bytes_are_skipped() {
        let allocator = Allocator::new();
        let tokens = tokens(b"q ) ] >> 1 w Q", &allocator);
        assert_eq!(operators(&tokens), vec![&b"q"[..], b"w", b"Q"]);
        assert_eq!(tokens.len(), 4);
    }

    #[test]
    fn inline_image_is_returned_whole() {
        let allocator = Allocator::new();
        let buffer = b"q BI /W 2 /H 1 /CS /G /BPC 8 /F /AHx ID 4142> EI Q";
        let tokens = tokens(buffer, &allocator);
        assert_eq!(tokens.len(), 3);
        let ContentToken::InlineImage(image) = tokens[1] else {
            panic!("expected an inline image, got {:?}", tokens[1]);
        };
        assert_eq!(image.content, b"4142>");
        assert_eq!(image.dict.get_abbr(b"Width", Some(b"W")).and_then(Object::as_i64).unwrap(), 2);
        assert!(matches!(tokens[2], ContentToken::Operator(b"Q")));
    }

    #[test]
    fn inline_image_data_may_contain_ei() {
        let allocator = Allocator::new();
        let buffer = b"BI /W 1 ID xEIyEI\nEI";
        let tokens = tokens(buffer, &allocator);
        assert_eq!(tokens.len(), 1);
        let ContentToken::InlineImage(image) = tokens[0] else {
            panic!("expected an inline image");
        };
        assert_eq!(image.content, b"xEIyEI");
    }

    #[test]
    fn inline_image_with_declared_length() {
        let allocator = Allocator::new();
        let buffer = b"BI /L 4 ID a EI\nEI Q";
        let tokens = tokens(buffer, &allocator);
        let ContentToken::InlineImage(image) = tokens[0] else {
            panic!("expected an inline image");
        };
        assert_eq!(image.content, b"a EI");
        assert!(matches!(tokens[1], ContentToken::Operator(b"Q")));
    }

    #[test]
    fn unterminated_inline_image() {
        let allocator = Allocator::new();
        let tokens = tokens(b"BI /W 1 ID abc", &allocator);
        let ContentToken::InlineImage(image) = tokens[0] else {
            panic!("expected an inline image");
        };
        assert_eq!(image.content, b"abc");
    }
}
