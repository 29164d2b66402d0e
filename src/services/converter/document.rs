use super::ConverterError;

/// A structural element of a converted document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading { level: u8, text: String },
    Paragraph(String),
    ListItem { ordered: bool, depth: usize, text: String },
    /// First row is rendered as the header row
    Table(Vec<Vec<String>>),
    Code { language: Option<String>, text: String },
    PageBreak,
    /// Already-rendered Markdown, emitted verbatim
    Markdown(String),
}

/// Result of a successful conversion. Lives for the duration of one request.
#[derive(Debug, Clone, Default)]
pub struct ConvertedDocument {
    format: String,
    blocks: Vec<Block>,
}

impl ConvertedDocument {
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            blocks: Vec::new(),
        }
    }

    pub fn from_markdown(format: impl Into<String>, markdown: impl Into<String>) -> Self {
        let mut doc = Self::new(format);
        doc.push(Block::Markdown(markdown.into()));
        doc
    }

    pub fn push(&mut self, block: Block) {
        self.blocks.push(block);
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// True when no block carries any visible text
    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(|block| match block {
            Block::Heading { text, .. }
            | Block::Paragraph(text)
            | Block::ListItem { text, .. }
            | Block::Code { text, .. }
            | Block::Markdown(text) => text.trim().is_empty(),
            Block::Table(rows) => rows.iter().flatten().all(|c| c.trim().is_empty()),
            Block::PageBreak => true,
        })
    }

    /// Render the document as Markdown.
    ///
    /// Blocks are separated by a blank line, except consecutive list items
    /// which stay on adjacent lines so they form a single list.
    pub fn export_markdown(&self) -> Result<String, ConverterError> {
        if self.is_empty() {
            return Err(ConverterError::Malformed("no extractable text".to_string()));
        }

        let mut out = String::new();
        let mut prev_was_list = false;

        for block in &self.blocks {
            let Some(rendered) = render_block(block) else {
                continue;
            };
            let is_list = matches!(block, Block::ListItem { .. });

            if !out.is_empty() {
                if is_list && prev_was_list {
                    out.push('\n');
                } else {
                    out.push_str("\n\n");
                }
            }
            out.push_str(&rendered);
            prev_was_list = is_list;
        }

        let trimmed = out.trim_end();
        Ok(format!("{}\n", trimmed))
    }
}

fn render_block(block: &Block) -> Option<String> {
    match block {
        Block::Heading { level, text } => {
            let text = collapse_whitespace(text);
            if text.is_empty() {
                return None;
            }
            let level = (*level).clamp(1, 6) as usize;
            Some(format!("{} {}", "#".repeat(level), text))
        }
        Block::Paragraph(text) => {
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        }
        Block::ListItem {
            ordered,
            depth,
            text,
        } => {
            let text = collapse_whitespace(text);
            if text.is_empty() {
                return None;
            }
            let marker = if *ordered { "1." } else { "-" };
            Some(format!("{}{} {}", "    ".repeat(*depth), marker, text))
        }
        Block::Table(rows) => render_table(rows),
        Block::Code { language, text } => {
            if text.trim().is_empty() {
                return None;
            }
            let fence = if text.contains("```") { "~~~~" } else { "```" };
            Some(format!(
                "{fence}{}\n{}\n{fence}",
                language.as_deref().unwrap_or(""),
                text.trim_end_matches('\n')
            ))
        }
        // Pages are separated by the blank line every block already gets
        Block::PageBreak => None,
        Block::Markdown(text) => {
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        }
    }
}

fn render_table(rows: &[Vec<String>]) -> Option<String> {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    if width == 0 {
        return None;
    }

    let render_row = |row: &[String]| {
        let mut cells: Vec<String> = row.iter().map(|c| escape_cell(c)).collect();
        cells.resize(width, String::new());
        format!("| {} |", cells.join(" | "))
    };

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(render_row(&rows[0]));
    lines.push(format!("|{}", " --- |".repeat(width)));
    for row in &rows[1..] {
        lines.push(render_row(row));
    }
    Some(lines.join("\n"))
}

fn escape_cell(cell: &str) -> String {
    collapse_whitespace(cell).replace('|', "\\|")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headings_and_paragraphs() {
        let mut doc = ConvertedDocument::new("docx");
        doc.push(Block::Heading {
            level: 1,
            text: "Quarterly  Report".to_string(),
        });
        doc.push(Block::Paragraph("Revenue grew.".to_string()));
        doc.push(Block::Heading {
            level: 9,
            text: "Deep".to_string(),
        });

        let md = doc.export_markdown().unwrap();
        assert_eq!(md, "# Quarterly Report\n\nRevenue grew.\n\n###### Deep\n");
    }

    #[test]
    fn test_list_items_stay_together() {
        let mut doc = ConvertedDocument::new("docx");
        doc.push(Block::Paragraph("Steps:".to_string()));
        doc.push(Block::ListItem {
            ordered: true,
            depth: 0,
            text: "Open".to_string(),
        });
        doc.push(Block::ListItem {
            ordered: false,
            depth: 1,
            text: "Carefully".to_string(),
        });
        doc.push(Block::Paragraph("Done.".to_string()));

        let md = doc.export_markdown().unwrap();
        assert_eq!(md, "Steps:\n\n1. Open\n    - Carefully\n\nDone.\n");
    }

    #[test]
    fn test_table_pads_and_escapes_cells() {
        let mut doc = ConvertedDocument::new("docx");
        doc.push(Block::Table(vec![
            vec!["Name".to_string(), "Value".to_string()],
            vec!["a|b".to_string()],
        ]));

        let md = doc.export_markdown().unwrap();
        assert_eq!(md, "| Name | Value |\n| --- | --- |\n| a\\|b |  |\n");
    }

    #[test]
    fn test_code_fence_avoids_collision() {
        let mut doc = ConvertedDocument::new("md");
        doc.push(Block::Code {
            language: Some("md".to_string()),
            text: "```inner```".to_string(),
        });
        let md = doc.export_markdown().unwrap();
        assert!(md.starts_with("~~~~md\n"));
    }

    #[test]
    fn test_page_breaks_do_not_add_text() {
        let mut doc = ConvertedDocument::new("pdf");
        doc.push(Block::Paragraph("Page one".to_string()));
        doc.push(Block::PageBreak);
        doc.push(Block::Paragraph("Page two".to_string()));
        assert_eq!(doc.export_markdown().unwrap(), "Page one\n\nPage two\n");
    }

    #[test]
    fn test_empty_document_fails_export() {
        let mut doc = ConvertedDocument::new("pdf");
        doc.push(Block::PageBreak);
        doc.push(Block::Paragraph("   ".to_string()));
        assert!(doc.is_empty());
        assert!(matches!(
            doc.export_markdown(),
            Err(ConverterError::Malformed(_))
        ));
    }

    #[test]
    fn test_verbatim_markdown() {
        let doc = ConvertedDocument::from_markdown("docling", "## Title\n\nBody\n\n");
        assert_eq!(doc.format(), "docling");
        assert_eq!(doc.export_markdown().unwrap(), "## Title\n\nBody\n");
    }
}
