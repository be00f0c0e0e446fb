use std::io::Write;

use flate2::Compression;
use flate2::write::ZlibEncoder;

/// Install a test logger once per test binary.
#[allow(dead_code)]
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Assembles PDF files with correct byte offsets.
///
/// Objects written since the previous call to [`PdfBuilder::xref`] go into
/// the next cross reference section, so calling `xref` again after adding more
/// objects produces an incremental update chained through `/Prev`.
#[allow(dead_code)]
pub struct PdfBuilder {
    buffer: Vec<u8>,
    pending: Vec<(u32, u32, usize)>,
    max_id: u32,
    last_xref: Option<usize>,
}

#[allow(dead_code)]
impl PdfBuilder {
    pub fn new(version: &str) -> PdfBuilder {
        let mut buffer = format!("%PDF-{}\n", version).into_bytes();
        buffer.extend_from_slice(b"%\xe2\xe3\xcf\xd3\n");
        PdfBuilder {
            buffer,
            pending: Vec::new(),
            max_id: 0,
            last_xref: None,
        }
    }

    pub fn position(&self) -> usize {
        self.buffer.len()
    }

    pub fn raw(&mut self, bytes: &[u8]) -> &mut PdfBuilder {
        self.buffer.extend_from_slice(bytes);
        self
    }

    pub fn object(&mut self, id: u32, body: &str) -> &mut PdfBuilder {
        self.object_with_generation(id, 0, body)
    }

    pub fn object_with_generation(&mut self, id: u32, generation: u32, body: &str) -> &mut PdfBuilder {
        self.record(id, generation);
        self.raw(format!("{} {} obj\n{}\nendobj\n", id, generation, body).as_bytes())
    }

    /// Write a stream object; `/Length` is appended to `dict_entries`.
    pub fn stream(&mut self, id: u32, dict_entries: &str, data: &[u8]) -> &mut PdfBuilder {
        self.record(id, 0);
        self.raw(format!("{} 0 obj\n<< {} /Length {} >>\nstream\n", id, dict_entries, data.len()).as_bytes());
        self.raw(data);
        self.raw(b"\nendstream\nendobj\n")
    }

    fn record(&mut self, id: u32, generation: u32) {
        let offset = self.buffer.len();
        self.pending.push((id, generation, offset));
        self.max_id = self.max_id.max(id);
    }

    /// Write a cross reference section for the pending objects, then the
    /// trailer (with `/Size`, `/Prev` and `trailer_entries`), `startxref` and
    /// `%%EOF`. Returns the offset of the section.
    pub fn xref(&mut self, trailer_entries: &str) -> usize {
        let start = self.buffer.len();
        let mut rows = std::mem::take(&mut self.pending);
        if self.last_xref.is_none() {
            rows.push((0, 65535, 0));
        }
        rows.sort_by_key(|(id, _, _)| *id);
        rows.dedup_by_key(|(id, _, _)| *id);

        let mut table = String::from("xref\n");
        let mut index = 0;
        while index < rows.len() {
            let mut end = index + 1;
            while end < rows.len() && rows[end].0 == rows[end - 1].0 + 1 {
                end += 1;
            }
            table.push_str(&format!("{} {}\n", rows[index].0, end - index));
            for &(id, generation, offset) in &rows[index..end] {
                let kind = if id == 0 { 'f' } else { 'n' };
                table.push_str(&format!("{:010} {:05} {} \n", offset, generation, kind));
            }
            index = end;
        }

        let prev = self.last_xref.map(|prev| format!(" /Prev {}", prev)).unwrap_or_default();
        table.push_str(&format!(
            "trailer\n<< /Size {}{} {} >>\nstartxref\n{}\n%%EOF\n",
            self.max_id + 1,
            prev,
            trailer_entries,
            start
        ));
        self.raw(table.as_bytes());
        self.last_xref = Some(start);
        start
    }

    pub fn build(&self) -> Vec<u8> {
        self.buffer.clone()
    }
}

/// A document with one page holding a Flate-compressed content stream.
#[allow(dead_code)]
pub fn single_page_pdf() -> Vec<u8> {
    let mut builder = PdfBuilder::new("1.4");
    builder
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
        .object(
            3,
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 595 842] /Contents 4 0 R \
             /Resources << /Font << /F1 5 0 R >> >> >>",
        )
        .stream(4, "/Filter /FlateDecode", &zlib(b"BT /F1 24 Tf 72 720 Td (Hello, world!) Tj ET"))
        .object(5, "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>");
    builder.xref("/Root 1 0 R");
    builder.build()
}

#[allow(dead_code)]
pub fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}
