use pdfnative::{Allocator, Document, LoadOptions, Object};

mod utils;
use utils::PdfBuilder;

fn catalog_with(builder: &mut PdfBuilder, extra: &str) {
    builder
        .object(1, &format!("<< /Type /Catalog /Pages 2 0 R {} >>", extra))
        .object(2, "<< /Type /Pages /Kids [] /Count 0 >>");
}

#[test]
fn resolving_twice_returns_the_same_object() {
    utils::init_logger();
    let mut builder = PdfBuilder::new("1.4");
    catalog_with(&mut builder, "/Names 3 0 R /Again 3 0 R");
    builder.object(3, "<< /Dests [1 2 3] >>");
    builder.xref("/Root 1 0 R");
    let buffer = builder.build();

    let allocator = Allocator::new();
    let doc = Document::load_mem(&buffer, &allocator);
    let catalog = doc.catalog().unwrap();
    let names = doc.get(catalog, b"Names", None);
    let again = doc.get(catalog, b"Again", None);
    assert!(std::ptr::eq(names, again));
    assert!(std::ptr::eq(names, doc.object(3)));
    assert!(std::ptr::eq(names, doc.resolve_reference(catalog.get(b"Names").unwrap())));

    let direct = catalog.get(b"Type").unwrap();
    assert!(std::ptr::eq(direct, doc.resolve_reference(direct)));
}

#[test]
fn freed_and_unknown_ids_are_null() {
    let mut builder = PdfBuilder::new("1.4");
    catalog_with(&mut builder, "/Info 7 0 R");
    builder.xref("/Root 1 0 R");
    let buffer = builder.build();

    let allocator = Allocator::new();
    let doc = Document::load_mem(&buffer, &allocator);
    assert!(doc.object(0).is_null());
    assert!(doc.object(7).is_null());
    assert!(doc.object(u32::MAX).is_null());
    assert!(doc.get(doc.catalog().unwrap(), b"Info", None).is_null());
}

#[test]
fn reference_cycles_resolve_to_null() {
    let mut builder = PdfBuilder::new("1.4");
    catalog_with(&mut builder, "/A 3 0 R");
    builder.object(3, "4 0 R").object(4, "3 0 R");
    builder.xref("/Root 1 0 R");
    let buffer = builder.build();

    let allocator = Allocator::new();
    let doc = Document::load_mem(&buffer, &allocator);
    let a = doc.get(doc.catalog().unwrap(), b"A", None);
    assert_eq!(a.as_reference().unwrap(), (4, 0));
    assert!(doc.dereference(a).is_null());
}

#[test]
fn indirect_stream_length() {
    let mut builder = PdfBuilder::new("1.4");
    catalog_with(&mut builder, "");
    builder.object(3, "<< /Length 4 0 R >>\nstream\n0123456789endstream\n");
    builder.object(4, "10");
    builder.xref("/Root 1 0 R");
    let buffer = builder.build();

    let allocator = Allocator::new();
    let doc = Document::load_mem(&buffer, &allocator);
    let stream = doc.object(3).as_stream().unwrap();
    assert_eq!(stream.content, b"0123456789");
    assert_eq!(doc.object(4).as_i64().unwrap(), 10);
}

#[test]
fn stream_length_cycle_does_not_recurse() {
    let mut builder = PdfBuilder::new("1.4");
    catalog_with(&mut builder, "");
    builder.object(3, "<< /Length 3 0 R >>\nstream\nabc\nendstream");
    builder.object(4, "<< /Length 5 0 R >>\nstream\ndef\nendstream");
    builder.object(5, "<< /Length 4 0 R >>\nstream\nghi\nendstream");
    builder.xref("/Root 1 0 R");
    let buffer = builder.build();

    let allocator = Allocator::new();
    let doc = Document::load_mem(&buffer, &allocator);
    assert_eq!(doc.object(3).as_stream().unwrap().content, b"abc");
    assert_eq!(doc.object(4).as_stream().unwrap().content, b"def");
    assert_eq!(doc.object(5).as_stream().unwrap().content, b"ghi");
}

#[test]
fn long_length_chains_hit_the_depth_limit() {
    let mut builder = PdfBuilder::new("1.4");
    catalog_with(&mut builder, "");
    for id in 3..200 {
        builder.object(id, &format!("<< /Length {} 0 R >>\nstream\nx\nendstream", id + 1));
    }
    builder.xref("/Root 1 0 R");
    let buffer = builder.build();

    let allocator = Allocator::new();
    let options = LoadOptions::builder().max_resolution_depth(8).build();
    let doc = Document::load_mem_with_options(&buffer, &allocator, options);
    let stream = doc.object(3).as_stream().unwrap();
    assert_eq!(stream.content, b"x");
    // Object 11 was out of reach while 3 was resolved, but hitting the limit is
    // not cached, so it resolves once asked for directly.
    assert!(doc.object(11).is_stream());
    assert!(doc.object(150).is_stream());
}

#[test]
fn lenient_generation_by_default() {
    let mut builder = PdfBuilder::new("1.4");
    catalog_with(&mut builder, "/Info 3 5 R");
    builder.object_with_generation(3, 2, "(info)");
    builder.xref("/Root 1 0 R");
    let buffer = builder.build();

    let allocator = Allocator::new();
    let doc = Document::load_mem(&buffer, &allocator);
    assert!(doc.get(doc.catalog().unwrap(), b"Info", None).is_string());
    assert_eq!(doc.xref().get(3).unwrap().generation, 2);

    let options = LoadOptions::builder().strict_generation(true).build();
    let doc = Document::load_mem_with_options(&buffer, &allocator, options);
    assert!(doc.get(doc.catalog().unwrap(), b"Info", None).is_null());
    assert!(doc.object(3).is_string());
}

#[test]
fn deep_nesting_is_rejected() {
    let mut builder = PdfBuilder::new("1.4");
    catalog_with(&mut builder, "");
    builder.object(3, &format!("{}1{}", "[".repeat(150), "]".repeat(150)));
    builder.object(4, &format!("{}1{}", "[".repeat(20), "]".repeat(20)));
    builder.xref("/Root 1 0 R");
    let buffer = builder.build();

    let allocator = Allocator::new();
    let doc = Document::load_mem(&buffer, &allocator);
    assert!(doc.object(3).is_null());
    let mut object: &Object = doc.object(4);
    let mut depth = 0;
    while let Ok(items) = object.as_array() {
        object = &items[0];
        depth += 1;
    }
    assert_eq!(depth, 20);
    assert_eq!(object.as_i64().unwrap(), 1);
}
