use thiserror::Error;

use crate::ObjectId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// An Object has the wrong type, e.g. the Object is an Array where a Name would be expected.
    #[error("object has wrong type; expected type {expected} but found type {found}")]
    ObjectType {
        expected: &'static str,
        found: &'static str,
    },
    /// Dictionary key was not found.
    #[error("missing required dictionary key \"{0}\"")]
    DictKey(String),
    /// The loader does not implement a feature the file relies on.
    #[error("unsupported feature: {0}")]
    Unimplemented(&'static str),
    /// The stream couldn't be decompressed.
    #[error("couldn't decompress stream: {0}")]
    Decompress(#[from] DecompressError),
    /// Failed to parse input.
    #[error("couldn't parse input: {0}")]
    Parse(#[from] ParseError),
    /// Invalid indirect object while parsing at offset.
    #[error("invalid indirect object at byte {offset}")]
    IndirectObject { offset: usize },
    /// IO error
    #[error("I/O error: {0}")]
    IO(#[from] std::io::Error),
    /// Found Object ID does not match Expected Object ID.
    #[error("object header names {found:?} but {expected:?} was expected")]
    ObjectIdMismatch { expected: ObjectId, found: ObjectId },
    /// The cross reference table has no usable entry for the object.
    #[error("object {0} has no usable cross-reference entry")]
    MissingXrefEntry(u32),
    /// Offset in file is invalid.
    #[error("invalid file offset {0}")]
    InvalidOffset(usize),
    /// Page number was not found in document.
    #[error("page number {0} could not be found")]
    PageNumberNotFound(usize),
    /// Dereferencing object failed due to a reference cycle.
    #[error("reference cycle detected while resolving {0:?}")]
    ReferenceCycle(ObjectId),
    /// Dereferencing object reached the limit.
    /// This might indicate a reference loop.
    #[error("reference resolution depth limit reached")]
    ReferenceLimit,
    /// Decoding byte vector to UTF8 String failed.
    #[error("invalid UTF-8")]
    UTF8,
    /// Error while parsing cross reference table.
    #[error("invalid cross-reference table: {0}")]
    Xref(#[from] XrefError),
}

#[derive(Error, Debug)]
pub enum DecompressError {
    #[error("decoding ASCII85 failed: {0}")]
    Ascii85(&'static str),
    #[error("decoding ASCIIHex failed: invalid digit {0:#04x}")]
    AsciiHex(u8),
    #[error("invalid PNG predictor row type {0}")]
    Predictor(u8),
    #[error("unsupported filter /{0}")]
    UnsupportedFilter(String),
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("unexpected end of input")]
    EndOfInput,
    #[error("invalid file header")]
    InvalidFileHeader,
    #[error("invalid file trailer")]
    InvalidTrailer,
    #[error("unexpected token at byte {0}")]
    UnexpectedToken(usize),
    #[error("arrays and dictionaries nested deeper than {0} levels")]
    NestingTooDeep(usize),
}

#[derive(Error, Debug)]
pub enum XrefError {
    /// Could not parse cross reference table.
    #[error("could not parse xref")]
    Parse,
    /// Could not find start of cross reference table.
    #[error("invalid start value")]
    Start,
    /// The trailer's "Prev" field was invalid.
    #[error("invalid start value in Prev field")]
    PrevStart,
    /// The section is a cross-reference stream.
    #[error("cross-reference streams are not supported")]
    Stream,
    /// No trailer dictionary names a usable document catalog.
    #[error("no usable /Root catalog")]
    MissingRoot,
}

impl From<std::str::Utf8Error> for Error {
    fn from(_err: std::str::Utf8Error) -> Self {
        Error::UTF8
    }
}
