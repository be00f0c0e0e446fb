use std::cell::Cell;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use log::{debug, error, warn};

use crate::content::ContentTokenizer;
use crate::error::{ParseError, XrefError};
use crate::filters;
use crate::page_tree::{self, Page};
use crate::parser::{ObjectParser, Scratch};
use crate::reader::{self, Reader};
use crate::tokenizer::Tokenizer;
use crate::xref::Xref;
use crate::{Allocator, Dictionary, Error, LoadOptions, Object, ObjectId, Rect, Result, Stream};

/// PDF document loaded from a byte buffer.
///
/// The document borrows the file bytes and the [`Allocator`] that owns every
/// object it creates. Only the cross reference table is read while loading,
/// together with the catalog and the page tree; other objects are parsed the
/// first time they are resolved and cached from then on.
pub struct Document<'a> {
    /// The version of the PDF specification named in the file header, if any.
    pub version: Option<String>,

    buffer: &'a [u8],
    allocator: &'a Allocator,
    options: LoadOptions,

    /// The cross-reference table contains locations of the indirect objects.
    xref: Xref<'a>,

    /// The trailer gives the location of the cross-reference table and of certain special objects.
    trailer: Dictionary<'a>,
    catalog: Option<Dictionary<'a>>,
    pages: Vec<Page<'a>>,

    null: &'a Object<'a>,
    depth: Cell<usize>,
    scratch: Cell<Option<Scratch<'a>>>,
}

impl<'a> Document<'a> {
    /// Load a PDF document from a specified file path.
    ///
    /// The file is read into `allocator`; failing to read it is the only error.
    pub fn load<P: AsRef<Path>>(path: P, allocator: &'a Allocator) -> Result<Document<'a>> {
        let file = File::open(path)?;
        let capacity = file.metadata().ok().and_then(|metadata| usize::try_from(metadata.len()).ok());
        let buffer = allocator.read_from(file, capacity)?;
        Ok(Document::load_mem(buffer, allocator))
    }

    /// Load a PDF document from an arbitrary source.
    pub fn load_from<R: Read>(source: R, allocator: &'a Allocator) -> Result<Document<'a>> {
        let buffer = allocator.read_from(source, None)?;
        Ok(Document::load_mem(buffer, allocator))
    }

    /// Load a PDF document from a memory slice.
    pub fn load_mem(buffer: &'a [u8], allocator: &'a Allocator) -> Document<'a> {
        Document::load_mem_with_options(buffer, allocator, LoadOptions::default())
    }

    /// Load a PDF document from a memory slice with custom limits.
    ///
    /// Malformed input never fails the load: a document whose catalog cannot be
    /// found has no pages.
    pub fn load_mem_with_options(buffer: &'a [u8], allocator: &'a Allocator, options: LoadOptions) -> Document<'a> {
        let version = reader::header_version(buffer);
        if version.is_none() {
            warn!("{}", ParseError::InvalidFileHeader);
        }

        let mut document = Document {
            version,
            buffer,
            allocator,
            options,
            xref: Xref::new(),
            trailer: Dictionary::default(),
            catalog: None,
            pages: Vec::new(),
            null: allocator.create_null(),
            depth: Cell::new(0),
            scratch: Cell::new(Some(Scratch::default())),
        };

        document.read_structure();
        document.pages = match document.catalog {
            Some(catalog) => page_tree::collect_pages(&document, catalog),
            None => Vec::new(),
        };
        document
    }

    fn read_structure(&mut self) {
        let reader = Reader {
            buffer: self.buffer,
            allocator: self.allocator,
            max_nesting_depth: self.options.max_nesting_depth,
            max_object_id: self.options.max_object_id,
        };

        let chain = match reader::xref_start(self.buffer) {
            Some(start) if start < self.buffer.len() => match reader.read_xref_chain(&mut self.xref, start) {
                Ok(trailer) => Some(trailer),
                Err(err) => {
                    warn!("Cross-reference chain at byte {} is unusable: {}", start, err);
                    None
                }
            },
            _ => {
                warn!("{}", XrefError::Start);
                None
            }
        };
        if let Some(trailer) = chain {
            self.trailer = trailer.dict;
            self.catalog = trailer.root.and_then(|root| self.catalog_from(root));
        }

        if self.catalog.is_none() {
            if self.options.full_scan_fallback {
                warn!("{}, scanning the whole file for objects", XrefError::MissingRoot);
                let scanned = reader.full_scan(&mut self.xref);
                if let Some(trailer) = scanned {
                    if self.trailer.is_empty() {
                        self.trailer = trailer.dict;
                    }
                    self.catalog = trailer.root.and_then(|root| self.catalog_from(root));
                }
                if self.catalog.is_none() {
                    self.catalog = self.find_catalog();
                }
            }
            if self.catalog.is_none() {
                error!("{}, the document has no pages", XrefError::MissingRoot);
            }
        }

        if self.xref.size != 0 && self.xref.max_id().checked_add(1) != Some(self.xref.size) {
            warn!(
                "Trailer /Size is {} but the highest object number is {}",
                self.xref.size,
                self.xref.max_id()
            );
        }
        if self.trailer.has(b"Encrypt") {
            warn!("{}", Error::Unimplemented("encryption"));
        }
        debug!("Loaded cross-reference table with {} entries", self.xref.len());
    }

    fn catalog_from(&self, root: &'a Object<'a>) -> Option<Dictionary<'a>> {
        match self.resolve_reference(root).as_dict() {
            Ok(catalog) => Some(catalog),
            Err(err) => {
                warn!("Trailer /Root {:?} is not a usable catalog: {}", root, err);
                None
            }
        }
    }

    /// First object typed `/Catalog`, in object number order.
    fn find_catalog(&self) -> Option<Dictionary<'a>> {
        let catalog = self
            .objects()
            .find_map(|(_, object)| object.as_dict().ok().filter(|dict| dict.type_is(b"Catalog")));
        if catalog.is_some() {
            debug!("Using the first /Catalog object found by the full scan");
        }
        catalog
    }

    /// Resolve a reference to the object it names. Any other object is
    /// returned unchanged.
    ///
    /// Unknown, freed, unreadable and cyclic references resolve to `Null`.
    /// Resolving the same reference again returns the same cached object.
    pub fn resolve_reference(&self, object: &'a Object<'a>) -> &'a Object<'a> {
        match *object {
            Object::Reference(id) => self.resolve_or_null(id),
            _ => object,
        }
    }

    /// Follow a chain of references (a reference to a reference and so on) up
    /// to the resolution depth limit.
    pub fn dereference(&self, object: &'a Object<'a>) -> &'a Object<'a> {
        let mut current = object;
        let mut hops = 0;
        while let Object::Reference(id) = *current {
            if hops == self.options.max_resolution_depth {
                warn!("{} while dereferencing {:?}", Error::ReferenceLimit, object);
                return self.null;
            }
            hops += 1;
            current = self.resolve_or_null(id);
        }
        current
    }

    /// Object with number `id`, using the generation recorded in the table.
    pub fn object(&self, id: u32) -> &'a Object<'a> {
        match self.xref.get(id) {
            Some(entry) => self.resolve_or_null((id, entry.generation)),
            None => self.null,
        }
    }

    /// Number of objects with an in-use table entry, the count [`Document::objects`]
    /// yields. Nothing is parsed.
    pub fn objects_count(&self) -> usize {
        self.xref.in_use_ids().count()
    }

    /// Every object that has an in-use table entry, in object number order.
    ///
    /// Iterating resolves (and so parses) each object.
    pub fn objects(&self) -> impl Iterator<Item = (ObjectId, &'a Object<'a>)> + '_ {
        self.xref.iter().filter(|(_, entry)| entry.is_in_use()).map(|(id, entry)| {
            let id = (id, entry.generation);
            (id, self.resolve_or_null(id))
        })
    }

    /// Look `key` up in `dict`, falling back to `abbreviation`, and resolve the
    /// value. A missing key yields `Null`.
    pub fn get(&self, dict: Dictionary<'a>, key: &[u8], abbreviation: Option<&[u8]>) -> &'a Object<'a> {
        match dict.get_abbr(key, abbreviation) {
            Ok(value) => self.resolve_reference(value),
            Err(_) => self.null,
        }
    }

    fn resolve_or_null(&self, id: ObjectId) -> &'a Object<'a> {
        match self.resolve(id) {
            Ok(object) => object,
            Err(err) => {
                match err {
                    Error::MissingXrefEntry(_) => debug!("Reference {} {} R: {}", id.0, id.1, err),
                    Error::IndirectObject { .. } | Error::Parse(_) => error!("Reference {} {} R: {}", id.0, id.1, err),
                    _ => warn!("Reference {} {} R: {}", id.0, id.1, err),
                }
                self.null
            }
        }
    }

    fn resolve(&self, id: ObjectId) -> Result<&'a Object<'a>> {
        let entry = self
            .xref
            .get(id.0)
            .filter(|entry| entry.is_in_use())
            .ok_or(Error::MissingXrefEntry(id.0))?;
        if self.options.strict_generation && entry.generation != id.1 {
            return Err(Error::ObjectIdMismatch {
                expected: id,
                found: (id.0, entry.generation),
            });
        }

        if let Some(object) = entry.resolved() {
            return Ok(object);
        }
        if entry.failed.get() {
            let offset = usize::try_from(entry.offset).unwrap_or_default();
            return Err(Error::IndirectObject { offset });
        }
        if entry.resolving.get() {
            return Err(Error::ReferenceCycle(id));
        }
        let depth = self.depth.get();
        if depth >= self.options.max_resolution_depth {
            return Err(Error::ReferenceLimit);
        }

        entry.resolving.set(true);
        self.depth.set(depth + 1);
        let result = self.read_object(id, entry.offset);
        self.depth.set(depth);
        entry.resolving.set(false);

        match result {
            Ok(object) => {
                let object = self.allocator.alloc_object(object);
                Ok(*entry.resolved.get_or_init(|| object))
            }
            Err(err) => {
                entry.failed.set(true);
                Err(err)
            }
        }
    }

    fn read_object(&self, id: ObjectId, offset: i64) -> Result<Object<'a>> {
        let offset = usize::try_from(offset).map_err(|_| Error::MissingXrefEntry(id.0))?;
        if offset >= self.buffer.len() {
            return Err(Error::InvalidOffset(offset));
        }

        let scratch = self.scratch.take().unwrap_or_default();
        let mut parser = ObjectParser::new(
            Tokenizer::at(self.buffer, offset),
            self.allocator,
            scratch,
            self.options.max_nesting_depth,
        );
        let result = parser.indirect_object(&|length_id| self.resolve_or_null(length_id).as_i64().ok());
        self.scratch.set(Some(parser.into_scratch()));

        let (found, object) = result?;
        if found.0 != id.0 || (self.options.strict_generation && found.1 != id.1) {
            return Err(Error::ObjectIdMismatch { expected: id, found });
        }
        Ok(object)
    }

    /// Decoded body of a stream, cached inside the stream.
    ///
    /// Streams without filters decode to their raw bytes. Unsupported filters
    /// and undecodable data yield `None`.
    pub fn stream_content(&self, stream: &'a Stream<'a>) -> Option<&'a [u8]> {
        *stream.decoded.get_or_init(|| self.decode_stream(stream))
    }

    fn decode_stream(&self, stream: &'a Stream<'a>) -> Option<&'a [u8]> {
        let names = match self.filter_names(stream.dict) {
            Ok(names) => names,
            Err(err) => {
                warn!("Stream at byte {} has an invalid /Filter: {}", stream.start_position, err);
                return None;
            }
        };
        if names.is_empty() {
            return Some(stream.content);
        }

        let params = self.decode_params(stream.dict);
        match filters::decode_chain(stream.content, &names, &params) {
            Ok(decoded) => Some(self.allocator.alloc_bytes(&decoded)),
            Err(err) => {
                warn!("Cannot decode stream at byte {}: {}", stream.start_position, err);
                None
            }
        }
    }

    /// `/Filter` names in decoding order. The `/F` abbreviation of inline
    /// images only counts when it holds names, since `/F` of a regular stream
    /// is a file specification.
    fn filter_names(&self, dict: Dictionary<'a>) -> Result<Vec<&'a [u8]>> {
        let mut filter = self.get(dict, b"Filter", None);
        if filter.is_null() {
            filter = self.get(dict, b"F", None);
            if !filter.is_name() && !filter.is_array() {
                return Ok(vec![]);
            }
        }

        match filter {
            Object::Null => Ok(vec![]),
            Object::Name(name) => Ok(vec![*name]),
            Object::Array(names) => names.iter().map(|name| self.resolve_reference(name).as_name()).collect(),
            other => Err(Error::ObjectType {
                expected: "Name or Array",
                found: other.enum_variant(),
            }),
        }
    }

    fn decode_params(&self, dict: Dictionary<'a>) -> Vec<Option<Dictionary<'a>>> {
        match self.get(dict, b"DecodeParms", Some(b"DP")) {
            Object::Dictionary(params) => vec![Some(*params)],
            Object::Array(params) => params
                .iter()
                .map(|params| self.resolve_reference(params).as_dict().ok())
                .collect(),
            _ => vec![],
        }
    }

    /// Number of pages.
    pub fn pages(&self) -> usize {
        self.pages.len()
    }

    /// Page with zero-based index `index`, in document order.
    pub fn page(&self, index: usize) -> Option<&Page<'a>> {
        self.pages.get(index)
    }

    pub fn page_iter(&self) -> impl Iterator<Item = &Page<'a>> {
        self.pages.iter()
    }

    /// Own or inherited resources of a page.
    pub fn page_resources(&self, index: usize) -> Option<Dictionary<'a>> {
        self.page(index).and_then(|page| page.resources)
    }

    /// Media box of a page, empty when neither the page nor an ancestor
    /// declares one.
    pub fn media_box(&self, index: usize) -> Option<Rect> {
        self.page(index).map(|page| page.media_box)
    }

    /// Tokenizer over all `/Contents` streams of a page, decoded and joined
    /// with a newline.
    pub fn tokenizer_of_page(&self, index: usize) -> Result<ContentTokenizer<'a>> {
        let page = self.page(index).ok_or(Error::PageNumberNotFound(index))?;
        let parts: Vec<&'a [u8]> = match self.get(page.dict, b"Contents", None) {
            Object::Stream(stream) => self.stream_content(*stream).into_iter().collect(),
            Object::Array(streams) => streams
                .iter()
                .filter_map(|stream| self.resolve_reference(stream).as_stream().ok())
                .filter_map(|stream| self.stream_content(stream))
                .collect(),
            _ => Vec::new(),
        };

        let buffer = match parts.as_slice() {
            [single] => *single,
            parts => self.allocator.join_bytes(parts, b'\n'),
        };
        Ok(self.tokenizer_of_buffer(buffer))
    }

    /// Tokenizer over the decoded body of a stream. An undecodable stream
    /// yields no tokens.
    pub fn tokenizer_of_stream(&self, stream: &'a Stream<'a>) -> ContentTokenizer<'a> {
        self.tokenizer_of_buffer(self.stream_content(stream).unwrap_or_default())
    }

    pub fn tokenizer_of_buffer(&self, buffer: &'a [u8]) -> ContentTokenizer<'a> {
        ContentTokenizer::new(buffer, self.allocator, self.options.max_nesting_depth)
    }

    /// Allocate a default value in the document arena.
    pub fn create_real(&self, value: f64) -> &'a Object<'a> {
        self.allocator.create_real(value)
    }

    pub fn create_integer(&self, value: i64) -> &'a Object<'a> {
        self.allocator.create_integer(value)
    }

    pub fn create_string(&self, value: &[u8]) -> &'a Object<'a> {
        self.allocator.create_string(value)
    }

    pub fn create_name(&self, value: &[u8]) -> &'a Object<'a> {
        self.allocator.create_name(value)
    }

    /// Total arena footprint, shared with everything else allocated from the
    /// same allocator.
    pub fn bytes_used(&self) -> usize {
        self.allocator.bytes_used()
    }

    pub fn catalog(&self) -> Option<Dictionary<'a>> {
        self.catalog
    }

    pub fn trailer(&self) -> Dictionary<'a> {
        self.trailer
    }

    pub fn xref(&self) -> &Xref<'a> {
        &self.xref
    }

    pub fn buffer(&self) -> &'a [u8] {
        self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load<'a>(body: &str, allocator: &'a Allocator) -> Document<'a> {
        let buffer = allocator.alloc_bytes(format!("%PDF-1.5\n{}\ntrailer << /Root 1 0 R >>\n%%EOF\n", body).as_bytes());
        Document::load_mem(buffer, allocator)
    }

    #[test]
    fn resolution_is_cached() {
        let allocator = Allocator::new();
        let doc = load(
            "1 0 obj << /Type /Catalog /Pages 2 0 R /Extra 3 0 R >> endobj
2 0 obj << /Type /Pages /Kids [] >> endobj
3 0 obj [1 2 3] endobj",
            &allocator,
        );
        let catalog = doc.catalog().unwrap();
        let first = doc.get(catalog, b"Extra", None);
        let second = doc.object(3);
        assert!(std::ptr::eq(first, second));
        assert_eq!(first.as_array().unwrap().len(), 3);
        assert_eq!(doc.version.as_deref(), Some("1.5"));
    }

    #[test]
    fn missing_and_cyclic_references_are_null() {
        let allocator = Allocator::new();
        let doc = load(
            "1 0 obj << /Type /Catalog >> endobj
4 0 obj 5 0 R endobj
5 0 obj 4 0 R endobj",
            &allocator,
        );
        assert!(doc.object(99).is_null());
        assert!(doc.resolve_reference(allocator.alloc_object(Object::Reference((42, 0)))).is_null());
        assert!(doc.dereference(doc.object(4)).is_null());
        assert!(doc.get(doc.catalog().unwrap(), b"Missing", None).is_null());
    }

    #[test]
    fn stream_length_cycle_falls_back_to_scanning() {
        let allocator = Allocator::new();
        let doc = load(
            "1 0 obj << /Type /Catalog >> endobj
6 0 obj << /Length 6 0 R >>
stream
abc
endstream
endobj",
            &allocator,
        );
        let stream = doc.object(6).as_stream().unwrap();
        assert_eq!(stream.content, b"abc");
        assert_eq!(doc.stream_content(stream), Some(&b"abc"[..]));
    }

    #[test]
    fn header_names_a_different_object() {
        let allocator = Allocator::new();
        let buffer = b"%PDF-1.4
1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj
2 0 obj << /Type /Pages /Kids [] >> endobj
xref
0 3
0000000000 65535 f
0000000009 00000 n
0000000009 00000 n
trailer << /Size 3 /Root 1 0 R >>
startxref
101
%%EOF
";
        let doc = Document::load_mem(buffer, &allocator);
        assert!(doc.catalog().is_some());
        assert!(doc.object(2).is_null());
    }

    #[test]
    fn strict_generation() {
        let allocator = Allocator::new();
        let buffer = allocator.alloc_bytes(
            b"%PDF-1.4\n1 0 obj << /Type /Catalog /Info 2 1 R >> endobj\n2 0 obj (info) endobj\ntrailer << /Root 1 0 R >>",
        );
        let lenient = Document::load_mem(buffer, &allocator);
        assert!(lenient.get(lenient.catalog().unwrap(), b"Info", None).is_string());

        let options = LoadOptions::builder().strict_generation(true).build();
        let strict = Document::load_mem_with_options(buffer, &allocator, options);
        assert!(strict.get(strict.catalog().unwrap(), b"Info", None).is_null());
    }

    #[test]
    fn synthesized_defaults() {
        let allocator = Allocator::new();
        let doc = Document::load_mem(b"", &allocator);
        assert_eq!(doc.pages(), 0);
        assert!(doc.catalog().is_none());
        assert_eq!(doc.create_integer(7).as_i64().unwrap(), 7);
        assert_eq!(doc.create_real(0.5).as_f64().unwrap(), 0.5);
        assert_eq!(doc.create_string(b"x").as_str().unwrap(), b"x");
        assert_eq!(doc.create_name(b"DeviceRGB").as_name().unwrap(), b"DeviceRGB");
        assert!(doc.bytes_used() > 0);
        assert!(matches!(doc.tokenizer_of_page(0), Err(Error::PageNumberNotFound(0))));
    }
}
