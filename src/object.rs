use std::cell::OnceCell;
use std::fmt;
use std::str;

use crate::{Error, Result};

/// Object identifier consists of two parts: object number and generation number.
pub type ObjectId = (u32, u32);

/// Dictionary object.
///
/// Entries are kept in file order inside the document arena. Lookup scans from the
/// back, so when a key is repeated the last occurrence wins.
#[derive(Clone, Copy, Default)]
pub struct Dictionary<'a>(&'a [(&'a [u8], Object<'a>)]);

/// Stream object
/// Warning - all streams must be indirect objects, while
/// the stream dictionary may be a direct object
pub struct Stream<'a> {
    /// Associated stream dictionary
    pub dict: Dictionary<'a>,
    /// Raw (still encoded) contents of the stream, borrowed from the file buffer.
    pub content: &'a [u8],
    /// Stream data's position in PDF file.
    pub start_position: usize,
    pub(crate) decoded: OnceCell<Option<&'a [u8]>>,
}

/// Basic PDF object types defined in an enum.
#[derive(Clone, Copy)]
pub enum Object<'a> {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Name(&'a [u8]),
    String(&'a [u8], StringFormat),
    Array(&'a [Object<'a>]),
    Dictionary(Dictionary<'a>),
    Stream(&'a Stream<'a>),
    Reference(ObjectId),
}

/// String objects can be written in two formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StringFormat {
    #[default]
    Literal,
    Hexadecimal,
}

impl<'a> Object<'a> {
    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Object::Boolean(_))
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Object::Integer(_))
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Object::Integer(_) | Object::Real(_))
    }

    pub fn is_name(&self) -> bool {
        matches!(self, Object::Name(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Object::String(..))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Object::Array(_))
    }

    pub fn is_dictionary(&self) -> bool {
        matches!(self, Object::Dictionary(_))
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, Object::Stream(_))
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Object::Reference(_))
    }

    pub fn as_bool(&self) -> Result<bool> {
        match *self {
            Object::Boolean(value) => Ok(value),
            _ => Err(self.type_error("Boolean")),
        }
    }

    pub fn as_i64(&self) -> Result<i64> {
        match *self {
            Object::Integer(value) => Ok(value),
            _ => Err(self.type_error("Integer")),
        }
    }

    pub fn as_f64(&self) -> Result<f64> {
        match *self {
            Object::Real(value) => Ok(value),
            _ => Err(self.type_error("Real")),
        }
    }

    /// Numeric value of an Integer or a Real.
    pub fn as_number(&self) -> Result<f64> {
        match *self {
            Object::Integer(value) => Ok(value as f64),
            Object::Real(value) => Ok(value),
            _ => Err(self.type_error("Integer or Real")),
        }
    }

    pub fn as_name(&self) -> Result<&'a [u8]> {
        match *self {
            Object::Name(name) => Ok(name),
            _ => Err(self.type_error("Name")),
        }
    }

    pub fn as_name_str(&self) -> Result<&'a str> {
        Ok(str::from_utf8(self.as_name()?)?)
    }

    pub fn as_str(&self) -> Result<&'a [u8]> {
        match *self {
            Object::String(string, _) => Ok(string),
            _ => Err(self.type_error("String")),
        }
    }

    pub fn as_reference(&self) -> Result<ObjectId> {
        match *self {
            Object::Reference(id) => Ok(id),
            _ => Err(self.type_error("Reference")),
        }
    }

    pub fn as_array(&self) -> Result<&'a [Object<'a>]> {
        match *self {
            Object::Array(array) => Ok(array),
            _ => Err(self.type_error("Array")),
        }
    }

    pub fn as_dict(&self) -> Result<Dictionary<'a>> {
        match *self {
            Object::Dictionary(dict) => Ok(dict),
            _ => Err(self.type_error("Dictionary")),
        }
    }

    pub fn as_stream(&self) -> Result<&'a Stream<'a>> {
        match *self {
            Object::Stream(stream) => Ok(stream),
            _ => Err(self.type_error("Stream")),
        }
    }

    /// Dictionary of a Dictionary object, or the dictionary attached to a Stream.
    pub fn as_dict_or_stream_dict(&self) -> Result<Dictionary<'a>> {
        match *self {
            Object::Dictionary(dict) => Ok(dict),
            Object::Stream(stream) => Ok(stream.dict),
            _ => Err(self.type_error("Dictionary or Stream")),
        }
    }

    pub fn type_name(&self) -> Result<&'a str> {
        match *self {
            Object::Dictionary(ref dict) => dict.type_name(),
            Object::Stream(stream) => stream.dict.type_name(),
            _ => Err(self.type_error("Dictionary or Stream")),
        }
    }

    pub fn enum_variant(&self) -> &'static str {
        match self {
            Object::Null => "Null",
            Object::Boolean(_) => "Boolean",
            Object::Integer(_) => "Integer",
            Object::Real(_) => "Real",
            Object::Name(_) => "Name",
            Object::String(..) => "String",
            Object::Array(_) => "Array",
            Object::Dictionary(_) => "Dictionary",
            Object::Stream(_) => "Stream",
            Object::Reference(_) => "Reference",
        }
    }

    fn type_error(&self, expected: &'static str) -> Error {
        Error::ObjectType {
            expected,
            found: self.enum_variant(),
        }
    }
}

impl fmt::Debug for Object<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Object::Null => f.write_str("null"),
            Object::Boolean(value) => {
                if value {
                    f.write_str("true")
                } else {
                    f.write_str("false")
                }
            }
            Object::Integer(value) => write!(f, "{}", value),
            Object::Real(value) => write!(f, "{}", value),
            Object::Name(name) => write!(f, "/{}", String::from_utf8_lossy(name)),
            Object::String(text, StringFormat::Literal) => write!(f, "({})", String::from_utf8_lossy(text)),
            Object::String(text, StringFormat::Hexadecimal) => {
                f.write_str("<")?;
                for byte in text {
                    write!(f, "{:02X}", byte)?;
                }
                f.write_str(">")
            }
            Object::Array(array) => {
                let items = array.iter().map(|item| format!("{:?}", item)).collect::<Vec<String>>();
                write!(f, "[{}]", items.join(" "))
            }
            Object::Dictionary(ref dict) => write!(f, "{:?}", dict),
            Object::Stream(stream) => write!(f, "{:?}stream...endstream", stream.dict),
            Object::Reference(id) => write!(f, "{} {} R", id.0, id.1),
        }
    }
}

impl<'a> Dictionary<'a> {
    pub(crate) fn from_entries(entries: &'a [(&'a [u8], Object<'a>)]) -> Dictionary<'a> {
        Dictionary(entries)
    }

    pub fn has(&self, key: &[u8]) -> bool {
        self.0.iter().any(|(k, _)| *k == key)
    }

    pub fn get(&self, key: &[u8]) -> Result<&'a Object<'a>> {
        self.0
            .iter()
            .rev()
            .find(|(k, _)| *k == key)
            .map(|(_, value)| value)
            .ok_or_else(|| Error::DictKey(String::from_utf8_lossy(key).into_owned()))
    }

    /// Look a key up, falling back to its abbreviated spelling (inline image
    /// dictionaries use `/W` for `/Width`, `/BPC` for `/BitsPerComponent` and so on).
    pub fn get_abbr(&self, key: &[u8], abbreviation: Option<&[u8]>) -> Result<&'a Object<'a>> {
        match (self.get(key), abbreviation) {
            (Err(_), Some(abbreviation)) => self.get(abbreviation),
            (result, _) => result,
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn type_name(&self) -> Result<&'a str> {
        self.get(b"Type")
            .and_then(Object::as_name_str)
            .or_else(|_| self.get(b"Linearized").and(Ok("Linearized")))
    }

    pub fn type_is(&self, type_name: &[u8]) -> bool {
        self.get(b"Type").and_then(Object::as_name).ok() == Some(type_name)
    }

    /// Entries in file order, duplicates included.
    pub fn iter(&self) -> impl Iterator<Item = (&'a [u8], &'a Object<'a>)> + 'a {
        self.0.iter().map(|(key, value)| (*key, value))
    }
}

impl fmt::Debug for Dictionary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self
            .iter()
            .map(|(key, value)| format!("/{} {:?}", String::from_utf8_lossy(key), value))
            .collect::<Vec<String>>();
        write!(f, "<<{}>>", entries.concat())
    }
}

impl<'a> Stream<'a> {
    pub(crate) fn new(dict: Dictionary<'a>, content: &'a [u8], start_position: usize) -> Stream<'a> {
        Stream {
            dict,
            content,
            start_position,
            decoded: OnceCell::new(),
        }
    }

    /// Filter names in decoding order. References are not followed here; see
    /// [`crate::Document::stream_content`] for full decoding.
    pub fn filters(&self) -> Result<Vec<&'a [u8]>> {
        let filter = match self.dict.get(b"Filter") {
            Ok(filter) => filter,
            Err(_) => return Ok(vec![]),
        };

        if let Ok(name) = filter.as_name() {
            Ok(vec![name])
        } else if let Ok(names) = filter.as_array() {
            names.iter().map(Object::as_name).collect()
        } else {
            Err(Error::ObjectType {
                expected: "Name or Array",
                found: filter.enum_variant(),
            })
        }
    }

    /// Decoded contents if they were already computed.
    pub fn cached_content(&self) -> Option<&'a [u8]> {
        self.decoded.get().copied().flatten()
    }
}

impl fmt::Debug for Stream<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("dict", &self.dict)
            .field("length", &self.content.len())
            .field("start_position", &self.start_position)
            .finish()
    }
}
