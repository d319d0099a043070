//! Removes a single fenced code block wrapped around model output.

/// Returns the body of a fenced block enclosing all of `text`.
///
/// The opening fence is three or more backticks or tildes with an optional
/// info string (e.g. `html`); the closing fence uses the same character and is
/// at least as long. Text that is not entirely enclosed is returned trimmed.
pub fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    let Some((first_line, rest)) = trimmed.split_once('\n') else {
        return trimmed.to_string();
    };

    let Some((fence_char, fence_len)) = opening_fence(first_line) else {
        return trimmed.to_string();
    };

    let (body, last_line) = rest.rsplit_once('\n').unwrap_or(("", rest));

    if !is_closing_fence(last_line, fence_char, fence_len) {
        return trimmed.to_string();
    }

    body.trim().to_string()
}

fn opening_fence(line: &str) -> Option<(char, usize)> {
    let line = line.trim_start();
    let fence_char = line.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let len = line.chars().take_while(|c| *c == fence_char).count();
    if len < 3 {
        return None;
    }
    // Backtick info strings may not contain backticks.
    let info = &line[len..];
    if fence_char == '`' && info.contains('`') {
        return None;
    }
    Some((fence_char, len))
}

fn is_closing_fence(line: &str, fence_char: char, min_len: usize) -> bool {
    let line = line.trim();
    !line.is_empty() && line.chars().all(|c| c == fence_char) && line.chars().count() >= min_len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_html_fence() {
        let raw = "```html\n<div>\n  <p>Backpropagation</p>\n</div>\n```";
        assert_eq!(
            strip_code_fence(raw),
            "<div>\n  <p>Backpropagation</p>\n</div>"
        );
    }

    #[test]
    fn strips_fences_without_info_string_and_tildes() {
        assert_eq!(strip_code_fence("```\n<div>x</div>\n```"), "<div>x</div>");
        assert_eq!(strip_code_fence("~~~~ html\n<div>x</div>\n~~~~~"), "<div>x</div>");
    }

    #[test]
    fn unfenced_text_is_only_trimmed() {
        assert_eq!(strip_code_fence("  <div>plain</div>\n"), "<div>plain</div>");
        assert_eq!(
            strip_code_fence("Intro\n```html\n<div/>\n```"),
            "Intro\n```html\n<div/>\n```"
        );
    }

    #[test]
    fn mismatched_or_short_closing_fence_is_kept() {
        let tilde_close = "```html\n<div/>\n~~~";
        assert_eq!(strip_code_fence(tilde_close), tilde_close);

        let short_close = "````\n<div/>\n```";
        assert_eq!(strip_code_fence(short_close), short_close);

        let unclosed = "```html\n<div/>";
        assert_eq!(strip_code_fence(unclosed), unclosed);
    }

    #[test]
    fn empty_fenced_block_yields_empty_text() {
        assert_eq!(strip_code_fence("```html\n```"), "");
    }
}
