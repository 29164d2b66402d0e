//! Office Open XML (DOCX, PPTX) extraction.

use super::{Block, ConvertedDocument, ConverterError};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use zip::ZipArchive;
use zip::result::ZipError;

/// An opened OOXML package with a budget on decompressed bytes.
///
/// Every part read counts against the budget so a small archive cannot
/// expand without bound.
struct Package {
    archive: ZipArchive<File>,
    limit: u64,
    remaining: u64,
}

impl Package {
    fn open(path: &Path, limit: u64) -> Result<Self, ConverterError> {
        let file = File::open(path)?;
        let archive = ZipArchive::new(file)
            .map_err(|e| ConverterError::Malformed(format!("not a valid OOXML package: {}", e)))?;
        Ok(Self {
            archive,
            limit,
            remaining: limit,
        })
    }

    fn file_names(&self) -> impl Iterator<Item = &str> {
        self.archive.file_names()
    }

    fn read_part(&mut self, name: &str) -> Result<Option<String>, ConverterError> {
        let part = match self.archive.by_name(name) {
            Ok(part) => part,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(e) => {
                return Err(ConverterError::Malformed(format!(
                    "failed to read {}: {}",
                    name, e
                )));
            }
        };

        let mut bytes = Vec::new();
        part.take(self.remaining.saturating_add(1))
            .read_to_end(&mut bytes)?;
        let read = bytes.len() as u64;
        if read > self.remaining {
            return Err(ConverterError::Malformed(format!(
                "decompressed content exceeds the limit of {} bytes at {}",
                self.limit, name
            )));
        }
        self.remaining -= read;

        String::from_utf8(bytes)
            .map(Some)
            .map_err(|_| ConverterError::Malformed(format!("{} is not valid UTF-8", name)))
    }
}

fn xml_error(part: &str, e: quick_xml::Error) -> ConverterError {
    ConverterError::Malformed(format!("invalid XML in {}: {}", part, e))
}

fn attr(e: &BytesStart, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == name)
        .map(|a| String::from_utf8_lossy(&a.value).to_string())
}

/// Like `attr`, but only matches a namespaced attribute (`r:id`, not `id`)
fn prefixed_attr(e: &BytesStart, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.prefix().is_some() && a.key.local_name().as_ref() == name)
        .map(|a| String::from_utf8_lossy(&a.value).to_string())
}

/// Resolve a predefined or numeric character reference (`amp`, `#x41`, ...)
fn resolve_entity(name: &[u8]) -> Option<char> {
    match name {
        b"amp" => Some('&'),
        b"lt" => Some('<'),
        b"gt" => Some('>'),
        b"quot" => Some('"'),
        b"apos" => Some('\''),
        _ => {
            let name = std::str::from_utf8(name).ok()?;
            let code = if let Some(hex) = name.strip_prefix("#x") {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                name.strip_prefix('#')?.parse().ok()?
            };
            char::from_u32(code)
        }
    }
}

// ---------------------------------------------------------------------------
// DOCX
// ---------------------------------------------------------------------------

/// List formats from `word/numbering.xml`, keyed by (numId, ilvl)
#[derive(Debug, Default)]
struct Numbering {
    num_to_abstract: HashMap<String, String>,
    formats: HashMap<(String, usize), String>,
}

impl Numbering {
    fn parse(xml: &str) -> Result<Self, ConverterError> {
        let mut numbering = Numbering::default();
        let mut reader = Reader::from_str(xml);
        let mut buf = Vec::new();
        let mut current_abstract: Option<String> = None;
        let mut current_level = 0usize;
        let mut current_num: Option<String> = None;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                    b"abstractNum" => current_abstract = attr(&e, b"abstractNumId"),
                    b"lvl" => {
                        current_level = attr(&e, b"ilvl")
                            .and_then(|v| v.parse().ok())
                            .unwrap_or(0)
                    }
                    b"numFmt" => {
                        if let (Some(abs), Some(fmt)) = (&current_abstract, attr(&e, b"val")) {
                            numbering.formats.insert((abs.clone(), current_level), fmt);
                        }
                    }
                    b"num" => current_num = attr(&e, b"numId"),
                    b"abstractNumId" => {
                        if let (Some(num), Some(abs)) = (&current_num, attr(&e, b"val")) {
                            numbering.num_to_abstract.insert(num.clone(), abs);
                        }
                    }
                    _ => {}
                },
                Ok(Event::End(e)) => match e.local_name().as_ref() {
                    b"abstractNum" => current_abstract = None,
                    b"num" => current_num = None,
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(xml_error("word/numbering.xml", e)),
                _ => {}
            }
            buf.clear();
        }

        Ok(numbering)
    }

    fn is_ordered(&self, num_id: &str, level: usize) -> bool {
        self.num_to_abstract
            .get(num_id)
            .and_then(|abs| self.formats.get(&(abs.clone(), level)))
            .is_some_and(|fmt| fmt != "bullet" && fmt != "none")
    }
}

#[derive(Debug, Default)]
struct ParagraphState {
    text: String,
    style: Option<String>,
    num_id: Option<String>,
    level: usize,
}

#[derive(Debug, Default)]
struct TableState {
    rows: Vec<Vec<String>>,
    row: Vec<String>,
    cell: String,
}

fn heading_level(style: &str) -> Option<u8> {
    let style = style.to_lowercase().replace(' ', "");
    if style == "title" {
        return Some(1);
    }
    style
        .strip_prefix("heading")?
        .parse::<u8>()
        .ok()
        .filter(|level| (1..=9).contains(level))
        .map(|level| level.min(6))
}

fn paragraph_block(paragraph: ParagraphState, numbering: &Numbering) -> Option<Block> {
    let text = paragraph.text.trim().to_string();
    if text.is_empty() {
        return None;
    }
    if let Some(level) = paragraph.style.as_deref().and_then(heading_level) {
        return Some(Block::Heading { level, text });
    }
    if let Some(num_id) = paragraph.num_id {
        return Some(Block::ListItem {
            ordered: numbering.is_ordered(&num_id, paragraph.level),
            depth: paragraph.level,
            text,
        });
    }
    Some(Block::Paragraph(text))
}

fn append_spaced(target: &mut String, text: &str) {
    let text = text.trim();
    if text.is_empty() {
        return;
    }
    if !target.is_empty() {
        target.push(' ');
    }
    target.push_str(text);
}

pub(super) fn convert_docx(
    path: &Path,
    max_extracted: u64,
) -> Result<ConvertedDocument, ConverterError> {
    let mut package = Package::open(path, max_extracted)?;
    let body = package.read_part("word/document.xml")?.ok_or_else(|| {
        ConverterError::Malformed("missing word/document.xml".to_string())
    })?;
    let numbering = match package.read_part("word/numbering.xml")? {
        Some(xml) => Numbering::parse(&xml)?,
        None => Numbering::default(),
    };

    let mut result = ConvertedDocument::new("docx");
    let mut reader = Reader::from_str(&body);
    let mut buf = Vec::new();

    let mut paragraph: Option<ParagraphState> = None;
    let mut tables: Vec<TableState> = Vec::new();
    let mut in_text = false;
    let mut in_run = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"p" => paragraph = Some(ParagraphState::default()),
                b"r" => in_run = true,
                b"t" => in_text = true,
                b"tbl" => tables.push(TableState::default()),
                b"tr" => {
                    if let Some(table) = tables.last_mut() {
                        table.row.clear();
                    }
                }
                b"tc" => {
                    if let Some(table) = tables.last_mut() {
                        table.cell.clear();
                    }
                }
                name => apply_paragraph_property(&mut paragraph, name, &e),
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" | b"br" | b"cr" if in_run => {
                    if let Some(p) = paragraph.as_mut() {
                        p.text.push(' ');
                    }
                }
                name => apply_paragraph_property(&mut paragraph, name, &e),
            },
            Ok(Event::Text(e)) if in_text => {
                if let Some(p) = paragraph.as_mut() {
                    p.text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::GeneralRef(e)) if in_text => {
                if let (Some(p), Some(c)) = (paragraph.as_mut(), resolve_entity(e.as_ref())) {
                    p.text.push(c);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"r" => in_run = false,
                b"p" => {
                    if let Some(p) = paragraph.take() {
                        if let Some(table) = tables.last_mut() {
                            append_spaced(&mut table.cell, &p.text);
                        } else if let Some(block) = paragraph_block(p, &numbering) {
                            result.push(block);
                        }
                    }
                }
                b"tc" => {
                    if let Some(table) = tables.last_mut() {
                        let cell = std::mem::take(&mut table.cell);
                        table.row.push(cell);
                    }
                }
                b"tr" => {
                    if let Some(table) = tables.last_mut() {
                        let row = std::mem::take(&mut table.row);
                        table.rows.push(row);
                    }
                }
                b"tbl" => {
                    if let Some(table) = tables.pop() {
                        if let Some(parent) = tables.last_mut() {
                            // Nested tables are flattened into the enclosing cell
                            for cell in table.rows.iter().flatten() {
                                append_spaced(&mut parent.cell, cell);
                            }
                        } else if !table.rows.is_empty() {
                            result.push(Block::Table(table.rows));
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error("word/document.xml", e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(result)
}

fn apply_paragraph_property(paragraph: &mut Option<ParagraphState>, name: &[u8], e: &BytesStart) {
    let Some(p) = paragraph.as_mut() else { return };
    match name {
        b"pStyle" => p.style = attr(e, b"val"),
        b"ilvl" => p.level = attr(e, b"val").and_then(|v| v.parse().ok()).unwrap_or(0),
        // numId 0 explicitly removes numbering
        b"numId" => p.num_id = attr(e, b"val").filter(|v| v != "0"),
        _ => {}
    }
}

// ---------------------------------------------------------------------------
// PPTX
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Slide {
    title: Option<String>,
    paragraphs: Vec<String>,
}

fn slide_number(name: &str) -> Option<u32> {
    name.strip_prefix("ppt/slides/slide")?
        .strip_suffix(".xml")?
        .parse()
        .ok()
}

fn parse_slide(name: &str, xml: &str) -> Result<Slide, ConverterError> {
    let mut slide = Slide::default();
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    let mut in_title_shape = false;
    let mut in_text = false;
    let mut current: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"sp" => in_title_shape = false,
                b"p" => current = Some(String::new()),
                b"t" => in_text = true,
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"ph" => {
                    let kind = attr(&e, b"type");
                    if matches!(kind.as_deref(), Some("title") | Some("ctrTitle")) {
                        in_title_shape = true;
                    }
                }
                b"br" => {
                    if let Some(text) = current.as_mut() {
                        text.push(' ');
                    }
                }
                _ => {}
            },
            Ok(Event::Text(e)) if in_text => {
                if let Some(text) = current.as_mut() {
                    text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::GeneralRef(e)) if in_text => {
                if let (Some(text), Some(c)) = (current.as_mut(), resolve_entity(e.as_ref())) {
                    text.push(c);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    let text = current.take().unwrap_or_default();
                    let text = text.trim();
                    if text.is_empty() {
                        // nothing to keep
                    } else if in_title_shape {
                        let title = slide.title.get_or_insert_with(String::new);
                        append_spaced(title, text);
                    } else {
                        slide.paragraphs.push(text.to_string());
                    }
                }
                b"sp" => in_title_shape = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(name, e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(slide)
}

/// Slide parts in deck order.
///
/// The order comes from `sldIdLst` in `ppt/presentation.xml`, resolved through
/// its relationships. Packages without that list fall back to the number in
/// each slide's file name.
fn slide_order(package: &mut Package) -> Result<Vec<String>, ConverterError> {
    let listed = match (
        package.read_part("ppt/presentation.xml")?,
        package.read_part("ppt/_rels/presentation.xml.rels")?,
    ) {
        (Some(presentation), Some(rels)) => {
            let targets = parse_relationships(&rels)?;
            parse_slide_ids(&presentation)?
                .iter()
                .filter_map(|rel_id| targets.get(rel_id))
                .map(|target| resolve_target(target))
                .collect()
        }
        _ => Vec::new(),
    };
    if !listed.is_empty() {
        return Ok(listed);
    }

    let mut numbered: Vec<(u32, String)> = package
        .file_names()
        .filter_map(|name| slide_number(name).map(|n| (n, name.to_string())))
        .collect();
    numbered.sort();
    Ok(numbered.into_iter().map(|(_, name)| name).collect())
}

/// Relationship id → target from a `.rels` part
fn parse_relationships(xml: &str) -> Result<HashMap<String, String>, ConverterError> {
    let mut targets = HashMap::new();
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                if let (Some(id), Some(target)) = (attr(&e, b"Id"), attr(&e, b"Target")) {
                    targets.insert(id, target);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error("ppt/_rels/presentation.xml.rels", e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(targets)
}

/// Relationship ids of `sldId` entries, in document order
fn parse_slide_ids(xml: &str) -> Result<Vec<String>, ConverterError> {
    let mut ids = Vec::new();
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == b"sldId" => {
                if let Some(id) = prefixed_attr(&e, b"id") {
                    ids.push(id);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error("ppt/presentation.xml", e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(ids)
}

/// Targets are relative to `ppt/` unless absolute within the package
fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("ppt/{}", target),
    }
}

pub(super) fn convert_pptx(
    path: &Path,
    max_extracted: u64,
) -> Result<ConvertedDocument, ConverterError> {
    let mut package = Package::open(path, max_extracted)?;
    let slide_names = slide_order(&mut package)?;

    if slide_names.is_empty() {
        return Err(ConverterError::Malformed(
            "presentation has no slides".to_string(),
        ));
    }

    let mut result = ConvertedDocument::new("pptx");
    for (index, name) in slide_names.iter().enumerate() {
        let Some(xml) = package.read_part(name)? else {
            tracing::warn!("Slide {} listed but missing from package", name);
            continue;
        };
        let slide = parse_slide(name, &xml)?;

        result.push(Block::Heading {
            level: 2,
            text: slide
                .title
                .unwrap_or_else(|| format!("Slide {}", index + 1)),
        });
        for paragraph in slide.paragraphs {
            result.push(Block::Paragraph(paragraph));
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;

    const LIMIT: u64 = 64 * 1024 * 1024;

    fn package(suffix: &str, parts: &[(&str, &str)]) -> tempfile::NamedTempFile {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        for (name, content) in parts {
            writer.start_file(*name, FileOptions::default()).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        let bytes = writer.finish().unwrap().into_inner();

        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(&bytes).unwrap();
        file
    }

    const NUMBERING: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<w:numbering xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:abstractNum w:abstractNumId="0"><w:lvl w:ilvl="0"><w:numFmt w:val="decimal"/></w:lvl></w:abstractNum>
  <w:abstractNum w:abstractNumId="1"><w:lvl w:ilvl="0"><w:numFmt w:val="bullet"/></w:lvl></w:abstractNum>
  <w:num w:numId="1"><w:abstractNumId w:val="0"/></w:num>
  <w:num w:numId="2"><w:abstractNumId w:val="1"/></w:num>
</w:numbering>"#;

    const DOCUMENT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>
  <w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t>Annual Report</w:t></w:r></w:p>
  <w:p><w:r><w:t xml:space="preserve">Profit &amp; loss </w:t></w:r><w:r><w:t>improved.</w:t></w:r></w:p>
  <w:p><w:pPr><w:numPr><w:ilvl w:val="0"/><w:numId w:val="1"/></w:numPr></w:pPr><w:r><w:t>First step</w:t></w:r></w:p>
  <w:p><w:pPr><w:numPr><w:ilvl w:val="0"/><w:numId w:val="2"/></w:numPr></w:pPr><w:r><w:t>A bullet</w:t></w:r></w:p>
  <w:tbl>
    <w:tr><w:tc><w:p><w:r><w:t>Region</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>Sales</w:t></w:r></w:p></w:tc></w:tr>
    <w:tr><w:tc><w:p><w:r><w:t>North</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>42</w:t></w:r></w:p></w:tc></w:tr>
  </w:tbl>
  <w:p/>
</w:body></w:document>"#;

    #[test]
    fn test_convert_docx_structure() {
        let file = package(
            ".docx",
            &[
                ("word/document.xml", DOCUMENT),
                ("word/numbering.xml", NUMBERING),
            ],
        );
        let doc = convert_docx(file.path(), LIMIT).unwrap();

        assert_eq!(
            doc.blocks(),
            &[
                Block::Heading {
                    level: 1,
                    text: "Annual Report".to_string()
                },
                Block::Paragraph("Profit & loss improved.".to_string()),
                Block::ListItem {
                    ordered: true,
                    depth: 0,
                    text: "First step".to_string()
                },
                Block::ListItem {
                    ordered: false,
                    depth: 0,
                    text: "A bullet".to_string()
                },
                Block::Table(vec![
                    vec!["Region".to_string(), "Sales".to_string()],
                    vec!["North".to_string(), "42".to_string()],
                ]),
            ]
        );
    }

    #[test]
    fn test_docx_without_body_is_malformed() {
        let file = package(".docx", &[("docProps/core.xml", "<x/>")]);
        let err = convert_docx(file.path(), LIMIT).unwrap_err();
        assert!(err.to_string().contains("word/document.xml"));
    }

    #[test]
    fn test_not_a_zip_is_malformed() {
        let mut file = tempfile::Builder::new().suffix(".docx").tempfile().unwrap();
        file.write_all(b"plain bytes").unwrap();
        assert!(matches!(
            convert_docx(file.path(), LIMIT),
            Err(ConverterError::Malformed(_))
        ));
    }

    #[test]
    fn test_heading_levels() {
        assert_eq!(heading_level("Heading2"), Some(2));
        assert_eq!(heading_level("heading 3"), Some(3));
        assert_eq!(heading_level("Title"), Some(1));
        assert_eq!(heading_level("Heading8"), Some(6));
        assert_eq!(heading_level("BodyText"), None);
    }

    #[test]
    fn test_resolve_entity() {
        assert_eq!(resolve_entity(b"amp"), Some('&'));
        assert_eq!(resolve_entity(b"#x41"), Some('A'));
        assert_eq!(resolve_entity(b"#66"), Some('B'));
        assert_eq!(resolve_entity(b"nbsp"), None);
    }

    const SLIDE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<p:sld xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main">
<p:cSld><p:spTree>
  <p:sp><p:nvSpPr><p:nvPr><p:ph type="title"/></p:nvPr></p:nvSpPr>
    <p:txBody><a:p><a:r><a:t>Roadmap</a:t></a:r></a:p></p:txBody></p:sp>
  <p:sp><p:txBody><a:p><a:r><a:t>Ship v2</a:t></a:r></a:p></p:txBody></p:sp>
</p:spTree></p:cSld></p:sld>"#;

    #[test]
    fn test_pptx_without_deck_list_orders_slides_numerically() {
        let file = package(
            ".pptx",
            &[
                ("ppt/slides/slide10.xml", SLIDE),
                (
                    "ppt/slides/slide2.xml",
                    r#"<p:sld xmlns:p="p" xmlns:a="a"><a:p><a:r><a:t>Intro</a:t></a:r></a:p></p:sld>"#,
                ),
            ],
        );
        let doc = convert_pptx(file.path(), LIMIT).unwrap();
        let md = doc.export_markdown().unwrap();
        assert_eq!(md, "## Slide 1\n\nIntro\n\n## Roadmap\n\nShip v2\n");
    }

    #[test]
    fn test_pptx_without_slides_is_malformed() {
        let file = package(".pptx", &[("ppt/presentation.xml", "<p/>")]);
        assert!(convert_pptx(file.path(), LIMIT).is_err());
    }

    #[test]
    fn test_pptx_follows_presentation_slide_list() {
        let file = package(
            ".pptx",
            &[
                (
                    "ppt/presentation.xml",
                    r#"<p:presentation xmlns:p="p" xmlns:r="r"><p:sldIdLst>
  <p:sldId id="256" r:id="rId3"/>
  <p:sldId id="257" r:id="rId2"/>
</p:sldIdLst></p:presentation>"#,
                ),
                (
                    "ppt/_rels/presentation.xml.rels",
                    r#"<Relationships xmlns="rels">
  <Relationship Id="rId2" Type="slide" Target="slides/slide1.xml"/>
  <Relationship Id="rId3" Type="slide" Target="/ppt/slides/slide2.xml"/>
</Relationships>"#,
                ),
                (
                    "ppt/slides/slide1.xml",
                    r#"<p:sld xmlns:p="p" xmlns:a="a"><a:p><a:r><a:t>Moved to the end</a:t></a:r></a:p></p:sld>"#,
                ),
                ("ppt/slides/slide2.xml", SLIDE),
            ],
        );
        let md = convert_pptx(file.path(), LIMIT)
            .unwrap()
            .export_markdown()
            .unwrap();
        assert_eq!(
            md,
            "## Roadmap\n\nShip v2\n\n## Slide 2\n\nMoved to the end\n"
        );
    }

    #[test]
    fn test_resolve_target() {
        assert_eq!(resolve_target("slides/slide3.xml"), "ppt/slides/slide3.xml");
        assert_eq!(resolve_target("/ppt/slides/slide3.xml"), "ppt/slides/slide3.xml");
    }

    #[test]
    fn test_compressed_part_over_limit_is_rejected() {
        // Compresses to a few KiB, expands to 4 MiB
        let mut body = String::from(
            r#"<w:document xmlns:w="w"><w:body><w:p><w:r><w:t>"#,
        );
        body.push_str(&"a".repeat(4 * 1024 * 1024));
        body.push_str("</w:t></w:r></w:p></w:body></w:document>");
        let file = package(".docx", &[("word/document.xml", body.as_str())]);
        assert!(std::fs::metadata(file.path()).unwrap().len() < 64 * 1024);

        let err = convert_docx(file.path(), 1024 * 1024).unwrap_err();
        match err {
            ConverterError::Malformed(msg) => {
                assert!(msg.contains("exceeds the limit of 1048576 bytes"), "{msg}");
                assert!(msg.contains("word/document.xml"), "{msg}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_limit_applies_across_parts() {
        // Each part fits on its own, together they do not
        let file = package(
            ".docx",
            &[
                ("word/document.xml", DOCUMENT),
                ("word/numbering.xml", NUMBERING),
            ],
        );
        let limit = DOCUMENT.len() as u64 + 10;
        assert!((NUMBERING.len() as u64) < limit);

        let err = convert_docx(file.path(), limit).unwrap_err();
        assert!(err.to_string().contains("word/numbering.xml"));
    }
}
