use std::io::{Cursor, Read};

use anyhow::Context;
use quick_xml::Reader;
use quick_xml::events::Event;

/// Extract plain text from a .docx file: the text of every paragraph in
/// document order, joined with newlines. Empty paragraphs contribute empty
/// lines, so `["A", "", "B"]` comes back as `"A\n\nB"`.
///
/// Callers treat an empty or whitespace-only result as "no usable content".
pub fn extract_docx_text(bytes: &[u8]) -> anyhow::Result<String> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).context("not a zip container")?;
    let mut part = archive
        .by_name("word/document.xml")
        .context("word/document.xml missing, not a docx file")?;

    let mut xml = String::new();
    part.read_to_string(&mut xml)
        .context("word/document.xml is not valid UTF-8")?;

    paragraphs_from_xml(&xml)
}

/// Walk the WordprocessingML body collecting `w:t` runs per `w:p` paragraph.
fn paragraphs_from_xml(xml: &str) -> anyhow::Result<String> {
    let mut reader = Reader::from_str(xml);

    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_text_run = false;

    loop {
        match reader.read_event().context("malformed document xml")? {
            Event::Start(e) if e.local_name().as_ref() == b"t" => in_text_run = true,
            Event::End(e) if e.local_name().as_ref() == b"t" => in_text_run = false,
            Event::Text(t) if in_text_run => {
                current.push_str(&t.unescape().context("bad text run")?);
            }
            Event::End(e) if e.local_name().as_ref() == b"p" => {
                paragraphs.push(std::mem::take(&mut current));
            }
            // Empty paragraphs are usually written self-closing.
            Event::Empty(e) if e.local_name().as_ref() == b"p" => {
                paragraphs.push(std::mem::take(&mut current));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(paragraphs.join("\n"))
}

/// Build an in-memory docx with the given paragraphs.
#[cfg(test)]
pub(crate) fn docx_from_paragraphs(paragraphs: &[&str]) -> Vec<u8> {
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    let body = paragraphs
        .iter()
        .map(|p| {
            if p.is_empty() {
                "<w:p/>".to_string()
            } else {
                format!("<w:p><w:r><w:t>{p}</w:t></w:r></w:p>")
            }
        })
        .collect::<String>();
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
<w:body>{body}</w:body>
</w:document>"#
    );

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("word/document.xml", SimpleFileOptions::default())
        .unwrap();
    writer.write_all(xml.as_bytes()).unwrap();
    writer.finish().unwrap().into_inner()
}
