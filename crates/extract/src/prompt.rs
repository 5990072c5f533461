use crate::schema::ENTITY_TYPES;

pub fn build_entity_prompt(chunk_text: &str) -> String {
    let vocabulary = ENTITY_TYPES.join("|");
    format!(
        r#"Extract named entities from the following text.

INSTRUCTIONS:
1. Identify entities: people, organizations, places, products, facilities, events, dates, concepts
2. Copy each entity text EXACTLY as it appears in the source, character for character
3. Output ONLY valid JSON, nothing else

SCHEMA:
[
  {{"text": "exact substring from the text", "type": "{vocabulary}"}}
]

RULES:
- "text" must be a literal substring of the input, with original casing
- "type" must be one of: {vocabulary}
- Do not invent entities that are not in the text
- Output ONLY the JSON array, no markdown, no explanations

TEXT:
{chunk_text}

JSON OUTPUT:"#
    )
}

pub fn build_repair_prompt(invalid_json: &str) -> String {
    format!(
        r#"The following JSON is invalid:

{invalid_json}

Fix this JSON. Output only valid JSON with no markdown formatting, no code blocks, no explanations. Just the raw JSON array."#
    )
}
