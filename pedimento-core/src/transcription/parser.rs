use crate::error::TranscriptionError;
use crate::raw::RawFragment;

/// Parse a collaborator response into a raw fragment.
///
/// The JSON object may be wrapped in a code fence or surrounded by prose.
/// Inside the object, shape mismatches degrade field by field; only text
/// that holds no JSON object at all is rejected.
pub fn parse_fragment(response: &str) -> Result<RawFragment, TranscriptionError> {
    let json_str = extract_json_object(response)?;
    serde_json::from_str::<RawFragment>(json_str)
        .map_err(|e| TranscriptionError::Malformed(e.to_string()))
}

fn extract_json_object(response: &str) -> Result<&str, TranscriptionError> {
    let body = match response.find("```") {
        Some(fence) => {
            let after = &response[fence + 3..];
            // skip the language tag line, if any
            let content_start = match after.find('\n') {
                Some(i) if !after[..i].contains('{') => i + 1,
                _ => 0,
            };
            let content = &after[content_start..];
            let end = content.find("```").unwrap_or(content.len());
            &content[..end]
        }
        None => response,
    };

    let start = body
        .find('{')
        .ok_or_else(|| TranscriptionError::Malformed("No JSON object found".into()))?;
    let end = body
        .rfind('}')
        .filter(|end| *end > start)
        .ok_or_else(|| TranscriptionError::Malformed("Unclosed JSON object".into()))?;

    Ok(&body[start..=end])
}
