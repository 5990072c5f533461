use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use extract::ExtractedMention;
use graph::{GraphError, GraphStore, RelationEdge};

use crate::coref::CorefLink;

/// Trigger phrases that warrant full confidence for their relation type.
const STRONG_TRIGGERS: &[&str] = &["founded", "works at", "headquartered in", "according to"];

/// A mention as the relation stage sees it: either a direct entity mention
/// or a coref-resolved pronoun standing in for its antecedent's entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationMention {
    pub entity_id: String,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

impl RelationMention {
    pub fn from_mention(m: &ExtractedMention) -> Self {
        Self {
            entity_id: m.entity_id.clone(),
            text: m.text.clone(),
            start: m.offset,
            end: m.end_offset(),
        }
    }

    pub fn from_coref(link: &CorefLink) -> Self {
        Self {
            entity_id: link.entity_id.clone(),
            text: link.pronoun.clone(),
            start: link.pronoun_offset,
            end: link.pronoun_offset + link.pronoun.len(),
        }
    }
}

struct RelationPattern {
    relation_type: &'static str,
    regex: Regex,
}

fn default_patterns() -> Vec<RelationPattern> {
    let table: &[(&str, &str)] = &[
        ("EMPLOYED_BY", r"(?i)\b(works at|employed by|joined|employee of)\b"),
        ("FOUNDED", r"(?i)\b(founded|started|established|created|co-founded)\b"),
        ("CITES", r"(?i)\b(according to|referenced|cited|per|says)\b"),
        ("LOCATED_IN", r"(?i)\b(based in|located in|headquartered in|in)\b"),
    ];
    table
        .iter()
        .map(|(relation_type, pattern)| RelationPattern {
            relation_type,
            regex: Regex::new(pattern).unwrap(),
        })
        .collect()
}

fn trigger_confidence(relation_type: &str, trigger: &str) -> f64 {
    if STRONG_TRIGGERS.contains(&trigger) {
        return 0.95;
    }
    if relation_type == "LOCATED_IN" && trigger == "in" {
        return 0.7;
    }
    0.85
}

/// True when the word right after the trigger is "by" (passive voice).
fn followed_by_by(text: &str, from: usize) -> bool {
    let rest = text[from..].trim_start();
    let mut words = rest.split_whitespace();
    matches!(words.next(), Some(w) if w.eq_ignore_ascii_case("by"))
}

/// Pattern-table relation extraction over the mentions of one chunk. Each
/// trigger match takes the nearest preceding mention as subject and the
/// nearest following mention as object; triples are upserted with
/// keep-the-max confidence merging.
pub struct RelationExtractor<S> {
    store: Arc<S>,
    patterns: Vec<RelationPattern>,
    year_re: Regex,
}

impl<S: GraphStore> RelationExtractor<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            patterns: default_patterns(),
            year_re: Regex::new(r"\b(19|20)\d{2}\b").unwrap(),
        }
    }

    pub async fn extract_chunk(
        &self,
        chunk_id: &str,
        chunk_text: &str,
        mentions: &[RelationMention],
    ) -> Result<Vec<RelationEdge>, GraphError> {
        if mentions.len() < 2 {
            return Ok(Vec::new());
        }

        let year = self.year_re.find(chunk_text).map(|m| m.as_str().to_string());
        let mut edges = Vec::new();

        for pattern in &self.patterns {
            for m in pattern.regex.find_iter(chunk_text) {
                let trigger = m.as_str().to_lowercase();

                let subject = mentions
                    .iter()
                    .filter(|mention| mention.end <= m.start())
                    .max_by_key(|mention| mention.end);
                let object = mentions
                    .iter()
                    .filter(|mention| mention.start >= m.end())
                    .min_by_key(|mention| mention.start);

                let (mut subject, mut object) = match (subject, object) {
                    (Some(s), Some(o)) => (s, o),
                    _ => continue,
                };
                if subject.entity_id == object.entity_id {
                    continue;
                }

                // Passive voice: "X was founded by Y" means Y founded X.
                if pattern.relation_type == "FOUNDED" && followed_by_by(chunk_text, m.end()) {
                    std::mem::swap(&mut subject, &mut object);
                }

                let evidence_start = subject.start.min(object.start);
                let evidence_end = subject.end.max(object.end);
                let edge = RelationEdge {
                    relation_type: pattern.relation_type.to_string(),
                    subject_id: subject.entity_id.clone(),
                    object_id: object.entity_id.clone(),
                    confidence: trigger_confidence(pattern.relation_type, &trigger),
                    evidence: chunk_text[evidence_start..evidence_end].to_string(),
                    source_chunk_id: chunk_id.to_string(),
                    year: year.clone(),
                };
                self.store.upsert_relation(&edge).await?;
                debug!(
                    chunk_id,
                    relation = pattern.relation_type,
                    trigger = %trigger,
                    confidence = edge.confidence,
                    "relation extracted"
                );
                edges.push(edge);
            }
        }

        Ok(edges)
    }
}
