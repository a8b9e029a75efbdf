use std::collections::HashMap;

use crate::domain::entities::{
    document_element::{DocumentElement, ElementCategory},
    page_record::{PageImage, PageRecord},
};

/// A contiguous run of elements bounded by titles, assigned to the page its
/// first element was found on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub page_number: u32,
    pub text: String,
}

/// Groups partitioned elements into title-bounded chunks.
///
/// A `Title` element closes the current chunk and opens a new one; table
/// elements are left out, they are aggregated separately.
pub fn chunk_by_title(elements: &[DocumentElement]) -> Vec<TextChunk> {
    let mut chunks: Vec<TextChunk> = Vec::new();
    let mut current: Option<TextChunk> = None;

    let opening_chunk = |element: &DocumentElement| TextChunk {
        page_number: element.page_number,
        text: element.text.clone(),
    };

    for element in elements
        .iter()
        .filter(|element| element.category != ElementCategory::Table)
    {
        if element.category == ElementCategory::Title {
            if let Some(chunk) = current.take() {
                chunks.push(chunk);
            }
            current = Some(opening_chunk(element));
        } else if let Some(chunk) = current.as_mut() {
            chunk.text.push('\n');
            chunk.text.push_str(&element.text);
        } else {
            current = Some(opening_chunk(element));
        }
    }

    if let Some(chunk) = current {
        chunks.push(chunk);
    }

    chunks
}

/// Builds one `PageRecord` per page number encountered in any of the three
/// streams, in encounter order.
///
/// Chunk texts for one page are concatenated in encounter order with no
/// deduplication: a page number recurring non-contiguously still appends.
/// One table and one image are kept per page, last occurrence winning.
pub fn aggregate_pages(
    chunks: &[TextChunk],
    tables: &[DocumentElement],
    images: &[PageImage],
) -> Vec<PageRecord> {
    let mut pages: Vec<PageRecord> = Vec::new();
    let mut index_by_page: HashMap<u32, usize> = HashMap::new();

    let mut record_for = |pages: &mut Vec<PageRecord>, page_number: u32| -> usize {
        *index_by_page.entry(page_number).or_insert_with(|| {
            pages.push(PageRecord::new(page_number));
            pages.len() - 1
        })
    };

    for chunk in chunks {
        let index = record_for(&mut pages, chunk.page_number);
        let record = &mut pages[index];
        if !record.text.is_empty() {
            record.text.push('\n');
        }
        record.text.push_str(&chunk.text);
    }

    for table in tables {
        let index = record_for(&mut pages, table.page_number);
        pages[index].table = Some(table.text.clone());
    }

    for image in images {
        let index = record_for(&mut pages, image.page_number);
        pages[index].image = Some(image.clone());
    }

    pages
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn title(text: &str, page: u32) -> DocumentElement {
        DocumentElement::new(ElementCategory::Title, text, page)
    }

    fn narrative(text: &str, page: u32) -> DocumentElement {
        DocumentElement::new(ElementCategory::NarrativeText, text, page)
    }

    fn table(text: &str, page: u32) -> DocumentElement {
        DocumentElement::new(ElementCategory::Table, text, page)
    }

    #[test]
    fn titles_bound_chunks_and_tables_are_left_out() {
        let elements = vec![
            title("Adverse Events", 4),
            narrative("Dizziness was reported in 12% of patients.", 4),
            table("Dizziness    12%    3%", 4),
            narrative("Most cases resolved without intervention.", 5),
            title("Study Design", 6),
            narrative("Patients were randomized 2:1.", 6),
        ];

        let chunks = chunk_by_title(&elements);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].page_number, 4);
        assert_eq!(
            chunks[0].text,
            "Adverse Events\nDizziness was reported in 12% of patients.\n\
             Most cases resolved without intervention."
        );
        assert_eq!(chunks[1].page_number, 6);
    }

    #[test]
    fn a_leading_chunk_without_title_is_kept() {
        let elements = vec![
            narrative("Preamble text.", 1),
            title("Introduction", 1),
            narrative("Body.", 1),
        ];

        let chunks = chunk_by_title(&elements);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "Preamble text.");
    }

    #[test]
    fn pages_are_kept_in_encounter_order_with_no_dedup() {
        let chunks = vec![
            TextChunk {
                page_number: 2,
                text: "first on page 2".into(),
            },
            TextChunk {
                page_number: 1,
                text: "on page 1".into(),
            },
            // Page 2 recurs non-contiguously: its text still appends in order
            TextChunk {
                page_number: 2,
                text: "second on page 2".into(),
            },
        ];

        let pages = aggregate_pages(&chunks, &[], &[]);

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].page_number, 2);
        assert_eq!(pages[0].text, "first on page 2\nsecond on page 2");
        assert_eq!(pages[1].page_number, 1);
    }

    #[test]
    fn tables_and_images_attach_to_their_page() {
        let chunks = vec![TextChunk {
            page_number: 3,
            text: "text".into(),
        }];
        let tables = vec![table("Event    Drug X    Placebo", 3)];
        let images = vec![PageImage {
            id: "img_1".into(),
            page_number: 3,
            path: PathBuf::from("extracted_images/page_3_img_1.jpg"),
        }];

        let pages = aggregate_pages(&chunks, &tables, &images);

        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].table.as_deref(), Some("Event    Drug X    Placebo"));
        assert_eq!(pages[0].image.as_ref().unwrap().id, "img_1");
    }

    #[test]
    fn a_page_seen_only_as_table_or_image_still_gets_a_record() {
        let tables = vec![table("Lab value    Baseline    Week 12", 7)];
        let images = vec![PageImage {
            id: "img_1".into(),
            page_number: 9,
            path: PathBuf::from("extracted_images/page_9_img_1.jpg"),
        }];

        let pages = aggregate_pages(&[], &tables, &images);

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].page_number, 7);
        assert!(pages[0].text.is_empty());
        assert_eq!(pages[1].page_number, 9);
    }
}
