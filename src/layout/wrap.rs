/// Greedy word wrap.
///
/// Hard line breaks are kept (a blank line stays a blank line). Words wider
/// than `max_width` on their own are split between characters.
pub fn wrap_text<F>(text: &str, max_width: f32, measure: F) -> Vec<String>
where
    F: Fn(&str) -> f32,
{
    let mut lines = Vec::new();
    let text = text.trim_end();
    if text.is_empty() {
        return lines;
    }

    for paragraph in text.split('\n') {
        let paragraph = paragraph.trim_end_matches('\r');
        let mut current = String::new();
        let mut has_words = false;

        for word in paragraph.split_whitespace() {
            has_words = true;
            if current.is_empty() {
                place_word(word, max_width, &measure, &mut current, &mut lines);
                continue;
            }
            let candidate = format!("{} {}", current, word);
            if measure(&candidate) <= max_width {
                current = candidate;
            } else {
                lines.push(std::mem::take(&mut current));
                place_word(word, max_width, &measure, &mut current, &mut lines);
            }
        }

        if has_words {
            lines.push(current);
        } else {
            lines.push(String::new());
        }
    }
    lines
}

/// Starts a line with `word`, emitting full chunks when the word is too wide.
fn place_word<F>(word: &str, max_width: f32, measure: &F, current: &mut String, lines: &mut Vec<String>)
where
    F: Fn(&str) -> f32,
{
    if measure(word) <= max_width {
        current.push_str(word);
        return;
    }
    for c in word.chars() {
        current.push(c);
        if current.chars().count() > 1 && measure(current.as_str()) > max_width {
            current.pop();
            lines.push(std::mem::take(current));
            current.push(c);
        }
    }
}
