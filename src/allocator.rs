use bumpalo::Bump;
use std::io::Read;

use crate::{Dictionary, Object, Result, Stream, StringFormat};

/// Arena owning every object created while loading one document.
///
/// Objects, composite children, decoded stream bodies and synthesized values are
/// bump-allocated and released together when the allocator is dropped. Nothing
/// stored here owns heap memory of its own, so no destructor ever needs to run.
///
/// ```
/// use pdfnative::{Allocator, Document};
///
/// let allocator = Allocator::new();
/// let doc = Document::load_mem(b"%PDF-1.4\n%%EOF\n", &allocator);
/// assert_eq!(doc.pages(), 0);
/// ```
pub struct Allocator {
    bump: Bump,
}

impl Allocator {
    pub fn new() -> Allocator {
        Allocator { bump: Bump::new() }
    }

    /// Create an arena with room for `capacity` bytes before it needs to grow.
    pub fn with_capacity(capacity: usize) -> Allocator {
        Allocator {
            bump: Bump::with_capacity(capacity),
        }
    }

    /// Total number of bytes the arena has claimed from the system allocator.
    pub fn bytes_used(&self) -> usize {
        self.bump.allocated_bytes()
    }

    /// Read a whole source into arena-owned memory.
    pub fn read_from<R: Read>(&self, mut source: R, capacity: Option<usize>) -> Result<&[u8]> {
        let mut buffer = capacity.map(Vec::with_capacity).unwrap_or_default();
        source.read_to_end(&mut buffer)?;
        Ok(self.bump.alloc_slice_copy(&buffer))
    }

    pub fn alloc_bytes(&self, bytes: &[u8]) -> &[u8] {
        self.bump.alloc_slice_copy(bytes)
    }

    pub(crate) fn alloc_object<'a>(&'a self, object: Object<'a>) -> &'a Object<'a> {
        self.bump.alloc(object)
    }

    pub(crate) fn alloc_stream<'a>(&'a self, stream: Stream<'a>) -> &'a Stream<'a> {
        self.bump.alloc(stream)
    }

    /// Move the drained children of a composite into one contiguous arena slice.
    pub(crate) fn alloc_objects<'a, I>(&'a self, objects: I) -> &'a [Object<'a>]
    where
        I: IntoIterator<Item = Object<'a>>,
        I::IntoIter: ExactSizeIterator,
    {
        self.bump.alloc_slice_fill_iter(objects)
    }

    pub(crate) fn alloc_entries<'a, I>(&'a self, entries: I) -> &'a [(&'a [u8], Object<'a>)]
    where
        I: IntoIterator<Item = (&'a [u8], Object<'a>)>,
        I::IntoIter: ExactSizeIterator,
    {
        self.bump.alloc_slice_fill_iter(entries)
    }

    /// Join several byte buffers with `separator` into one arena slice.
    pub(crate) fn join_bytes<'a>(&'a self, parts: &[&[u8]], separator: u8) -> &'a [u8] {
        let total = parts.iter().map(|part| part.len() + 1).sum::<usize>().saturating_sub(1);
        let joined = self.bump.alloc_slice_fill_copy(total, separator);
        let mut position = 0;
        for part in parts {
            joined[position..position + part.len()].copy_from_slice(part);
            position += part.len() + 1;
        }
        joined
    }

    pub fn create_null(&self) -> &Object<'_> {
        self.alloc_object(Object::Null)
    }

    pub fn create_integer(&self, value: i64) -> &Object<'_> {
        self.alloc_object(Object::Integer(value))
    }

    pub fn create_real(&self, value: f64) -> &Object<'_> {
        self.alloc_object(Object::Real(value))
    }

    pub fn create_string(&self, value: &[u8]) -> &Object<'_> {
        let bytes = self.alloc_bytes(value);
        self.alloc_object(Object::String(bytes, StringFormat::Literal))
    }

    pub fn create_name(&self, value: &[u8]) -> &Object<'_> {
        let bytes = self.alloc_bytes(value);
        self.alloc_object(Object::Name(bytes))
    }

    pub fn create_dictionary<'a>(&'a self, entries: &[(&[u8], Object<'a>)]) -> Dictionary<'a> {
        Dictionary::from_entries(
            self.alloc_entries(entries.iter().map(|&(key, value)| (self.alloc_bytes(key), value))),
        )
    }
}

impl Default for Allocator {
    fn default() -> Self {
        Self::new()
    }
}
