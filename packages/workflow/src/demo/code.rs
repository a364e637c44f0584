// ABOUTME: Clean-up of generated page code
// ABOUTME: Strips markdown code fences the model wraps around components

const FENCE: &str = "```";

/// Remove leading ```lang and trailing ``` fences.
///
/// Input without fences is returned unchanged, and stripping is repeated
/// until no fence remains, so applying it twice equals applying it once.
pub fn strip_code_fences(code: &str) -> String {
    let mut current = code.to_string();
    while let Some(next) = strip_once(&current) {
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn strip_once(code: &str) -> Option<String> {
    let trimmed = code.trim();
    if !trimmed.starts_with(FENCE) && !trimmed.ends_with(FENCE) {
        return None;
    }

    let mut body = trimmed;
    if body.starts_with(FENCE) {
        body = match body.find('\n') {
            Some(newline) => &body[newline + 1..],
            None => &body[FENCE.len()..],
        };
    }
    if let Some(stripped) = body.strip_suffix(FENCE) {
        body = stripped.trim_end();
    }
    Some(body.to_string())
}
