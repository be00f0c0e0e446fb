//! Lazily-resolving PDF document loader.
//!
//! A [`Document`] borrows the file bytes and an [`Allocator`] arena. Loading
//! reads the cross reference table (falling back to a full scan of the file),
//! the catalog and the page tree; every other object is parsed on first use.
//!
//! ```
//! use pdfnative::{Allocator, Document};
//!
//! let allocator = Allocator::new();
//! let doc = Document::load_mem(
//!     b"%PDF-1.4
//! 1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj
//! 2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj
//! 3 0 obj << /Type /Page /MediaBox [0 0 612 792] >> endobj
//! trailer << /Root 1 0 R >>
//! %%EOF",
//!     &allocator,
//! );
//! assert_eq!(doc.pages(), 1);
//! assert_eq!(doc.media_box(0).unwrap().width(), 612.0);
//! ```

mod allocator;
pub use crate::allocator::Allocator;

mod object;
pub use crate::object::{Dictionary, Object, ObjectId, Stream, StringFormat};

mod rect;
pub use crate::rect::Rect;

pub mod tokenizer;
pub use crate::tokenizer::{Keyword, Token, Tokenizer};

mod xref;
pub use crate::xref::{Xref, XrefEntry};

mod options;
pub use crate::options::{LoadOptions, LoadOptionsBuilder};

mod page_tree;
pub use crate::page_tree::Page;

mod content;
pub use crate::content::{ContentToken, ContentTokenizer};

mod document;
pub use crate::document::Document;

mod error;
pub use crate::error::{DecompressError, Error, ParseError, Result, XrefError};

pub mod filters;
pub use crate::filters::Filter;

mod parser;
mod reader;
