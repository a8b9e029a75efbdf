use std::path::{Path, PathBuf};

use common::helper::error_chain_fmt;
use lopdf::{Dictionary, Document, Object, Stream};
use tracing::info;

use crate::domain::entities::{
    document_element::{DocumentElement, ElementCategory},
    page_record::PageImage,
};

/// Reader for PDF sources.
///
/// Partitions a document into typed elements (title, narrative text, table)
/// with 1-based page numbers, and exports embedded images to disk. The
/// partitioning is heuristic: it classifies the text blocks that
/// `lopdf::Document::extract_text` yields per page, it does not run any
/// layout model.
pub struct PdfReader {
    source: Document,
    total_pages: usize,
}

#[derive(thiserror::Error)]
pub enum PdfReaderError {
    #[error(transparent)]
    PdfDocError(#[from] lopdf::Error),

    #[error(transparent)]
    IoError(#[from] std::io::Error),
}

impl std::fmt::Debug for PdfReaderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl PdfReader {
    pub fn try_from_path(path: &Path) -> Result<Self, PdfReaderError> {
        // Reads the whole document in memory: necessary for the lopdf logic
        let source = Document::load(path)?;
        let total_pages = source.get_pages().len();

        info!("PDF reader source: nb pages: {}", total_pages);

        Ok(Self {
            source,
            total_pages,
        })
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    /// Partitions the document into typed elements, page by page.
    ///
    /// Pages without extractable text are skipped.
    pub fn partition(&self) -> Result<Vec<DocumentElement>, PdfReaderError> {
        let mut elements = Vec::new();

        for page_number in 1..=self.total_pages as u32 {
            let content = self.source.extract_text(&[page_number])?;
            if content.trim().is_empty() {
                continue;
            }

            elements.extend(partition_page_text(&content, page_number));
        }

        Ok(elements)
    }

    /// Exports the images embedded in the document, one file per occurrence.
    ///
    /// Files are named `page_<page>_img_<index>.<ext>` inside
    /// `output_folder`; the returned associations carry a sequential id
    /// (`img_1`, `img_2`, ...) over the whole document.
    pub fn extract_images(&self, output_folder: &Path) -> Result<Vec<PageImage>, PdfReaderError> {
        std::fs::create_dir_all(output_folder)?;

        let mut images = Vec::new();
        let mut sequential_id = 0usize;

        for (page_number, page_id) in self.source.get_pages() {
            let page_dict = match self.source.get_dictionary(page_id) {
                Ok(dict) => dict,
                Err(_) => continue,
            };
            let xobjects = match self.page_xobjects(page_dict) {
                Some(xobjects) => xobjects,
                None => continue,
            };

            let mut page_index = 0usize;
            for (_name, object) in xobjects.iter() {
                let stream = match self.resolve(object).as_stream() {
                    Ok(stream) => stream,
                    Err(_) => continue,
                };
                if !is_image_stream(stream) {
                    continue;
                }

                sequential_id += 1;
                page_index += 1;

                let file_path: PathBuf = output_folder.join(format!(
                    "page_{}_img_{}.{}",
                    page_number,
                    page_index,
                    image_extension(stream)
                ));
                std::fs::write(&file_path, &stream.content)?;

                images.push(PageImage {
                    id: format!("img_{}", sequential_id),
                    page_number,
                    path: file_path,
                });
            }
        }

        info!("Extracted {} images", images.len());
        Ok(images)
    }

    /// The XObject dictionary of a page, when it has one.
    fn page_xobjects<'a>(&'a self, page_dict: &'a Dictionary) -> Option<&'a Dictionary> {
        let resources = self.resolve(page_dict.get(b"Resources").ok()?).as_dict().ok()?;
        self.resolve(resources.get(b"XObject").ok()?).as_dict().ok()
    }

    /// Follows one level of indirection when the object is a reference.
    fn resolve<'a>(&'a self, object: &'a Object) -> &'a Object {
        match object.as_reference() {
            Ok(id) => self.source.get_object(id).unwrap_or(object),
            Err(_) => object,
        }
    }
}

fn is_image_stream(stream: &Stream) -> bool {
    stream
        .dict
        .get(b"Subtype")
        .ok()
        .and_then(|object| object.as_name().ok())
        == Some(&b"Image"[..])
}

/// File extension for an exported image stream, from its encoding filter.
fn image_extension(stream: &Stream) -> &'static str {
    let filter = match stream.dict.get(b"Filter") {
        Ok(object) => object,
        Err(_) => return "bin",
    };
    let name = match filter.as_name() {
        Ok(name) => Some(name),
        // Filter chains: the last applied filter decides the encoding
        Err(_) => filter
            .as_array()
            .ok()
            .and_then(|filters| filters.last())
            .and_then(|object| object.as_name().ok()),
    };

    match name {
        Some(b"DCTDecode") => "jpg",
        Some(b"JPXDecode") => "jp2",
        _ => "bin",
    }
}

/// Splits one page of extracted text into typed elements.
///
/// Blocks are separated by blank lines. A block of aligned columns becomes a
/// `Table`, a single short unterminated line a `Title`, anything else
/// `NarrativeText`.
pub(crate) fn partition_page_text(content: &str, page_number: u32) -> Vec<DocumentElement> {
    let mut elements = Vec::new();
    let mut block: Vec<&str> = Vec::new();

    for line in content.lines() {
        if line.trim().is_empty() {
            flush_block(&mut elements, &mut block, page_number);
        } else {
            block.push(line);
        }
    }
    flush_block(&mut elements, &mut block, page_number);

    elements
}

fn flush_block(elements: &mut Vec<DocumentElement>, block: &mut Vec<&str>, page_number: u32) {
    if block.is_empty() {
        return;
    }

    let category = classify_block(block);
    let text = match category {
        // Keeps table rows on their own lines
        ElementCategory::Table => block
            .iter()
            .map(|line| line.trim_end())
            .collect::<Vec<_>>()
            .join("\n"),
        _ => block
            .iter()
            .map(|line| line.trim())
            .collect::<Vec<_>>()
            .join(" "),
    };

    elements.push(DocumentElement::new(category, text, page_number));
    block.clear();
}

fn classify_block(lines: &[&str]) -> ElementCategory {
    if lines.len() >= 2 {
        let table_rows = lines.iter().filter(|line| looks_like_table_row(line)).count();
        if table_rows * 2 >= lines.len() {
            return ElementCategory::Table;
        }
    }

    if lines.len() == 1 && looks_like_title(lines[0]) {
        return ElementCategory::Title;
    }

    ElementCategory::NarrativeText
}

/// A row of a drawn table: tab-separated cells or at least two runs of
/// three-or-more spaces between cells.
fn looks_like_table_row(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.contains('\t') {
        return true;
    }

    let mut gaps = 0;
    let mut run = 0;
    for c in trimmed.chars() {
        if c == ' ' {
            run += 1;
        } else {
            if run >= 3 {
                gaps += 1;
            }
            run = 0;
        }
    }

    gaps >= 2
}

fn looks_like_title(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.len() > 90 {
        return false;
    }
    if trimmed.ends_with(['.', ',', ';', ':']) {
        return false;
    }

    is_numbered_heading(trimmed) || is_mostly_uppercase(trimmed) || is_title_cased(trimmed)
}

/// `3 Results`, `3.1 Adverse events`, `4.2.1 ...`
fn is_numbered_heading(line: &str) -> bool {
    let prefix: String = line
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    !prefix.is_empty()
        && prefix.chars().any(|c| c.is_ascii_digit())
        && line[prefix.len()..].starts_with(' ')
}

fn is_mostly_uppercase(line: &str) -> bool {
    let alphabetic: Vec<char> = line.chars().filter(|c| c.is_alphabetic()).collect();
    if alphabetic.is_empty() {
        return false;
    }

    let uppercase = alphabetic.iter().filter(|c| c.is_uppercase()).count();
    uppercase * 10 >= alphabetic.len() * 6
}

/// Every word capitalized, few words: `Adverse Events`, `Study Design`
fn is_title_cased(line: &str) -> bool {
    let words: Vec<&str> = line.split_whitespace().collect();
    if words.is_empty() || words.len() > 8 {
        return false;
    }

    words.iter().all(|word| {
        word.chars()
            .find(|c| c.is_alphabetic())
            .map(|c| c.is_uppercase())
            // All-digit words are fine in a heading
            .unwrap_or(true)
    })
}
