//! Deterministic, content-addressable identifiers for every node in the
//! knowledge graph. Each function is a pure function of its normalized
//! input: the same arguments produce byte-identical output in any process,
//! which is what makes re-ingestion idempotent and concurrent writers safe
//! to merge on identity.

use sha2::{Digest, Sha256};

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Normalize a URL so that trivial variants map to the same document.
///
/// Lowercases the whole URL, drops the fragment, forces the `https` scheme,
/// strips a leading `www.`, strips trailing slashes from the path (the root
/// path stays `/`), and sorts query parameters by key.
pub fn normalize_url(url: &str) -> String {
    let lowered = url.trim().to_lowercase();
    let without_fragment = lowered.split('#').next().unwrap_or("");

    let rest = match without_fragment.find("://") {
        Some(idx) => &without_fragment[idx + 3..],
        None => without_fragment,
    };

    let split_at = rest
        .find(['/', '?'])
        .unwrap_or(rest.len());
    let (host_part, tail) = rest.split_at(split_at);
    let host = host_part.strip_prefix("www.").unwrap_or(host_part);

    let (raw_path, raw_query) = match tail.find('?') {
        Some(idx) => (&tail[..idx], &tail[idx + 1..]),
        None => (tail, ""),
    };

    let trimmed = raw_path.trim_end_matches('/');
    let path = if trimmed.is_empty() { "/" } else { trimmed };

    let mut params: Vec<&str> = raw_query.split('&').filter(|p| !p.is_empty()).collect();
    params.sort_unstable();

    let mut normalized = format!("https://{}{}", host, path);
    if !params.is_empty() {
        normalized.push('?');
        normalized.push_str(&params.join("&"));
    }
    normalized
}

/// Document identity: SHA-256 of the normalized URL.
pub fn document_id(url: &str) -> String {
    sha256_hex(&normalize_url(url))
}

/// Chunk identity: document id plus the zero-padded byte offset the chunk
/// starts at. Same offset in the same document means same content, so the
/// id doubles as the upsert key.
pub fn chunk_id(doc_id: &str, start_offset: usize) -> String {
    format!("{}_{:010}", doc_id, start_offset)
}

/// Mention identity: SHA-256 of `chunk_id|lower(trim(text))|offset`.
pub fn mention_id(chunk_id: &str, text: &str, offset_in_chunk: usize) -> String {
    let normalized = text.trim().to_lowercase();
    sha256_hex(&format!("{}|{}|{}", chunk_id, normalized, offset_in_chunk))
}

/// Entity identity: SHA-256 of the normalized surface text plus the
/// uppercased type. Distinct (text, type) pairs are distinct entities.
pub fn entity_id(text: &str, entity_type: &str) -> String {
    sha256_hex(&format!(
        "{}|{}",
        normalize_entity_text(text),
        entity_type.to_uppercase()
    ))
}

/// Lowercase, trim, and collapse internal whitespace. Shared by entity
/// identity and the linker's fuzzy matching.
pub fn normalize_entity_text(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Coreference cluster identity: first 16 hex chars of
/// SHA-256(`chunk_id:entity_token:pronoun_token`).
pub fn coref_cluster_id(chunk_id: &str, entity_token: usize, pronoun_token: usize) -> String {
    let digest = sha256_hex(&format!("{}:{}:{}", chunk_id, entity_token, pronoun_token));
    digest[..16].to_string()
}
