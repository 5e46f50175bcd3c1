pub fn strip_code_blocks(s: &str) -> String {
    let s = s.trim();
    if s.starts_with("```json") {
        s.trim_start_matches("```json").trim_end_matches("```").trim().to_string()
    } else if s.starts_with("```") {
        s.trim_start_matches("```").trim_end_matches("```").trim().to_string()
    } else {
        s.to_string()
    }
}

/// File name of the rendered book. Whitespace runs and characters that are
/// not allowed in file names become `_`, so the name never leaves the
/// output directory.
pub fn output_file_name(title: &str) -> String {
    let stem = title
        .split_whitespace()
        .map(|word| {
            word.chars()
                .map(|c| match c {
                    '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
                    c if c.is_control() => '_',
                    c => c,
                })
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("_");
    if stem.is_empty() || stem.chars().all(|c| c == '.') {
        "book.pdf".to_string()
    } else {
        format!("{}.pdf", stem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_blocks() {
        assert_eq!(strip_code_blocks("json"), "json");
        assert_eq!(strip_code_blocks("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("```\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("  ```json  \n  {}  \n  ```  "), "{}");
    }

    #[test]
    fn test_output_file_name() {
        assert_eq!(output_file_name("My First  Book"), "My_First_Book.pdf");
        assert_eq!(output_file_name("  Dragons\tand\nKnights "), "Dragons_and_Knights.pdf");
        assert_eq!(output_file_name("AC/DC Story"), "AC_DC_Story.pdf");
        assert_eq!(output_file_name("a\\b:c*d?\"e<f>g|h"), "a_b_c_d__e_f_g_h.pdf");
        assert_eq!(output_file_name("../../x"), ".._.._x.pdf");
        assert_eq!(output_file_name(".."), "book.pdf");
        assert_eq!(output_file_name("bell\u{7}"), "bell_.pdf");
    }
}
