//! Response cleanup applied to every successful generation.

/// Remove `<think>…</think>` reasoning blocks and an enclosing markdown
/// code fence, then trim.
pub fn sanitize_response(raw: &str) -> String {
    let without_reasoning = strip_reasoning(raw);
    strip_code_fences(&without_reasoning)
}

/// Drop every `<think>…</think>` block. An unterminated block swallows the
/// rest of the text, matching how reasoning models truncate.
pub fn strip_reasoning(text: &str) -> String {
    const OPEN: &str = "<think>";
    const CLOSE: &str = "</think>";

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        match rest[start + OPEN.len()..].find(CLOSE) {
            Some(end) => rest = &rest[start + OPEN.len() + end + CLOSE.len()..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Strip a markdown code fence (```lang … ```) surrounding the content.
/// Text outside the first fenced block is discarded; unfenced text is
/// returned trimmed.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    let Some(open) = trimmed.find("```") else {
        return trimmed.to_string();
    };

    let after_open = &trimmed[open + 3..];
    // Skip the info string (e.g. "python") up to the end of the line.
    let body_start = after_open.find('\n').map(|i| i + 1).unwrap_or(after_open.len());
    let body = &after_open[body_start..];

    let body = match body.rfind("```") {
        Some(close) => &body[..close],
        None => body,
    };
    body.trim().to_string()
}
