use crate::error::ChatError;
use crate::ingest::digest_bytes;
use crate::models::{DocumentSummary, UploadedDocument};
use lopdf::Document;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

pub trait PdfExtractor {
    fn extract_pages(&self, document: &UploadedDocument) -> Result<Vec<PageText>, ChatError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, upload: &UploadedDocument) -> Result<Vec<PageText>, ChatError> {
        let parse_error = |reason: String| ChatError::Extraction {
            document: upload.name.clone(),
            reason,
        };

        let document = Document::load_mem(&upload.bytes).map_err(|error| parse_error(error.to_string()))?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| parse_error(format!("page {page_no}: {error}")))?;

            pages.push(PageText {
                number: page_no,
                text,
            });
        }

        Ok(pages)
    }
}

/// Text of every page of every document, in upload order then page order.
#[derive(Debug, Clone, Default)]
pub struct RawText {
    pub text: String,
    pub documents: Vec<DocumentSummary>,
}

/// Stops at the first unreadable document so a partial upload never turns
/// into an index that silently lacks content.
pub fn extract_text<X>(extractor: &X, documents: &[UploadedDocument]) -> Result<RawText, ChatError>
where
    X: PdfExtractor + ?Sized,
{
    let mut raw = RawText::default();

    for document in documents {
        let pages = extractor.extract_pages(document)?;
        let mut characters = 0;

        for page in &pages {
            characters += page.text.chars().count();
            raw.text.push_str(&page.text);
        }

        if pages.iter().all(|page| page.text.trim().is_empty()) {
            warn!(document = %document.name, "pdf had no readable page text");
        }
        debug!(document = %document.name, pages = pages.len(), characters, "extracted pdf text");

        raw.documents.push(DocumentSummary {
            name: document.name.clone(),
            pages: pages.len(),
            characters,
            checksum: digest_bytes(&document.bytes),
        });
    }

    Ok(raw)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};

    /// Builds a one-page-per-entry PDF in memory.
    pub(crate) fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        });

        let mut kids: Vec<Object> = Vec::new();
        for text in pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let encoded = content.encode().expect("content stream should encode");
            let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("pdf should serialize");
        bytes
    }

    struct ScriptedExtractor;

    impl PdfExtractor for ScriptedExtractor {
        fn extract_pages(&self, document: &UploadedDocument) -> Result<Vec<PageText>, ChatError> {
            if document.name.starts_with("bad") {
                return Err(ChatError::Extraction {
                    document: document.name.clone(),
                    reason: "corrupt".to_string(),
                });
            }
            Ok(vec![PageText {
                number: 1,
                text: format!("text of {}", document.name),
            }])
        }
    }

    #[test]
    fn lopdf_extracts_pages_in_order() {
        let upload = UploadedDocument::new("guide.pdf", pdf_with_pages(&["Alpha page", "Beta page"]));
        let pages = LopdfExtractor.extract_pages(&upload).expect("pdf should parse");

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].number, 1);
        assert!(pages[0].text.contains("Alpha"));
        assert!(pages[1].text.contains("Beta"));
    }

    #[test]
    fn corrupt_pdf_reports_document_name() {
        let upload = UploadedDocument::new("broken.pdf", b"%PDF-1.4\n%broken".to_vec());
        let error = LopdfExtractor
            .extract_pages(&upload)
            .expect_err("garbage bytes must not parse");

        match error {
            ChatError::Extraction { document, .. } => assert_eq!(document, "broken.pdf"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn documents_are_concatenated_in_upload_order() {
        let documents = vec![
            UploadedDocument::new("one.pdf", b"1".to_vec()),
            UploadedDocument::new("two.pdf", b"2".to_vec()),
        ];

        let raw = extract_text(&ScriptedExtractor, &documents).expect("both documents are readable");
        assert_eq!(raw.text, "text of one.pdftext of two.pdf");
        assert_eq!(raw.documents.len(), 2);
        assert_eq!(raw.documents[1].characters, "text of two.pdf".len());
    }

    #[test]
    fn extraction_aborts_on_first_unreadable_document() {
        let documents = vec![
            UploadedDocument::new("good.pdf", b"1".to_vec()),
            UploadedDocument::new("bad.pdf", b"2".to_vec()),
            UploadedDocument::new("later.pdf", b"3".to_vec()),
        ];

        let error = extract_text(&ScriptedExtractor, &documents).expect_err("bad.pdf must abort");
        assert!(error.to_string().contains("bad.pdf"));
    }
}
