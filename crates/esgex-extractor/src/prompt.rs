//! Instruction text sent with every extraction call

/// Instruction shared by every schema of a run
///
/// The schema itself travels separately as the backend's response schema, so
/// the instruction only describes how to read the document.
pub const DEFAULT_INSTRUCTION: &str = r#"You are extracting sustainability disclosures from a corporate ESG, sustainability or annual responsibility report.

Rules:
1. Follow the response schema exactly. Return a single JSON object and nothing else.
2. Read every part of the document: narrative sections, tables, charts and infographics (use their labels, legends and captions), footnotes and annexures.
3. Report each value with the unit stated in the document. Do not convert units unless the schema asks for it.
4. Use the reporting year of the document. When several years are shown, take the most recent one unless the schema says otherwise.
5. When a value is not disclosed, use null. Never invent figures.
6. Keep company names, terminology and units consistent across all fields."#;
