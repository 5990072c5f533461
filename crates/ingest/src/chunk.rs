use serde::{Deserialize, Serialize};

/// One segment of a document, addressed by byte offsets into the UTF-8
/// encoding of the full text. The id is derived solely from
/// `(doc_id, start_offset)`, so re-chunking identical text yields the same
/// ids and upserts converge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub doc_id: String,
    pub text: String,
    pub start_offset: usize,
    pub end_offset: usize,
    pub index: usize,
    pub page: Option<u32>,
    pub heading: Option<String>,
}

impl Chunk {
    pub fn new(
        doc_id: String,
        text: String,
        start_offset: usize,
        end_offset: usize,
        index: usize,
    ) -> Self {
        let chunk_id = ident::chunk_id(&doc_id, start_offset);
        Self {
            chunk_id,
            doc_id,
            text,
            start_offset,
            end_offset,
            index,
            page: None,
            heading: None,
        }
    }

    pub fn len_bytes(&self) -> usize {
        self.end_offset - self.start_offset
    }
}
