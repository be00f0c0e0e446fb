use std::hint::black_box;
use std::io::Write;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use flate2::Compression;
use flate2::write::ZlibEncoder;
use pdfnative::{Allocator, Document, LoadOptions};

/// A document with `pages` pages, each with its own compressed content stream.
fn generate(pages: u32) -> Vec<u8> {
    let mut buffer = b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n".to_vec();
    let mut offsets = Vec::new();
    let mut object = |buffer: &mut Vec<u8>, id: u32, body: &[u8]| {
        offsets.push((id, buffer.len()));
        buffer.extend_from_slice(format!("{} 0 obj\n", id).as_bytes());
        buffer.extend_from_slice(body);
        buffer.extend_from_slice(b"\nendobj\n");
    };

    object(&mut buffer, 1, b"<< /Type /Catalog /Pages 2 0 R >>");
    let kids = (0..pages).map(|page| format!("{} 0 R", 4 + page * 2)).collect::<Vec<_>>();
    let tree = format!(
        "<< /Type /Pages /Kids [{}] /Count {} /MediaBox [0 0 612 792] /Resources << /Font << /F1 3 0 R >> >> >>",
        kids.join(" "),
        pages
    );
    object(&mut buffer, 2, tree.as_bytes());
    object(&mut buffer, 3, b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>");
    for page in 0..pages {
        let id = 4 + page * 2;
        let dict = format!("<< /Type /Page /Parent 2 0 R /Contents {} 0 R >>", id + 1);
        object(&mut buffer, id, dict.as_bytes());

        let text = (0..40)
            .map(|line| format!("BT /F1 10 Tf 72 {} Td (Page {} line {}) Tj ET\n", 760 - line * 16, page, line))
            .collect::<String>();
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        let data = encoder.finish().unwrap();
        let mut stream = format!("<< /Length {} /Filter /FlateDecode >>\nstream\n", data.len()).into_bytes();
        stream.extend_from_slice(&data);
        stream.extend_from_slice(b"\nendstream");
        object(&mut buffer, id + 1, &stream);
    }

    let start = buffer.len();
    let size = 4 + pages * 2;
    buffer.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", size).as_bytes());
    offsets.sort_unstable();
    for (_, offset) in offsets {
        buffer.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    buffer.extend_from_slice(format!("trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n", size, start).as_bytes());
    buffer
}

fn bench_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("load");
    for pages in [1, 50, 500] {
        let buffer = generate(pages);
        group.throughput(Throughput::Bytes(buffer.len() as u64));
        group.bench_with_input(BenchmarkId::new("xref", pages), &buffer, |b, buffer| {
            b.iter(|| {
                let allocator = Allocator::new();
                let doc = Document::load_mem(black_box(buffer), &allocator);
                doc.pages()
            })
        });

        let cut = buffer.windows(4).rposition(|window| window == b"xref").unwrap_or(buffer.len());
        group.bench_with_input(BenchmarkId::new("full_scan", pages), &buffer[..cut], |b, buffer| {
            b.iter(|| {
                let allocator = Allocator::new();
                let doc = Document::load_mem_with_options(black_box(buffer), &allocator, LoadOptions::default());
                doc.pages()
            })
        });
    }
    group.finish();
}

fn bench_content(c: &mut Criterion) {
    let buffer = generate(50);
    c.bench_function("tokenize_all_pages", |b| {
        b.iter(|| {
            let allocator = Allocator::new();
            let doc = Document::load_mem(&buffer, &allocator);
            (0..doc.pages())
                .filter_map(|page| doc.tokenizer_of_page(page).ok())
                .map(|tokens| tokens.count())
                .sum::<usize>()
        })
    });
}

criterion_group!(benches, bench_load, bench_content);
criterion_main!(benches);
