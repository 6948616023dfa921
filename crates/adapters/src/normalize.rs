// SPDX-License-Identifier: MIT

//! Stream normalization: CR handling, blank-line collapsing, and ANSI
//! escape stripping for plain-log output.

/// Splits raw engine stdout into normalized lines.
///
/// - `\r\n` collapses to a single line break.
/// - A bare `\r` overwrites the current (unterminated) line rather than
///   ending it — progress-bar style redraws collapse to whatever text was
///   written after the last `\r` before the next real `\n`.
/// - Runs of 2+ blank lines collapse to a single blank line.
pub fn normalize_lines(raw: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                    lines.push(std::mem::take(&mut current));
                } else {
                    current.clear();
                }
            }
            '\n' => {
                lines.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }

    let mut collapsed = Vec::with_capacity(lines.len());
    let mut blank_run = 0usize;
    for line in lines {
        if line.is_empty() {
            blank_run += 1;
            if blank_run <= 1 {
                collapsed.push(line);
            }
        } else {
            blank_run = 0;
            collapsed.push(line);
        }
    }
    collapsed
}

/// Strips ANSI CSI escape sequences (`\x1b[...<letter>`), used only in
/// plain-log (non-TTY-passthrough) presentation mode.
pub fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\x1b' && chars.peek() == Some(&'[') {
            chars.next();
            for next in chars.by_ref() {
                if next.is_ascii_alphabetic() {
                    break;
                }
            }
            continue;
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crlf_collapses_to_single_newline() {
        let lines = normalize_lines("one\r\ntwo\r\nthree");
        assert_eq!(lines, vec!["one", "two", "three"]);
    }

    #[test]
    fn overwrite_run_keeps_only_last_segment_before_newline() {
        let lines = normalize_lines("progress: 10%\rprogress: 50%\rprogress: 100%\ndone\n");
        assert_eq!(lines, vec!["progress: 100%", "done"]);
    }

    #[test]
    fn trailing_bare_cr_with_no_following_newline_drops_the_overwritten_text() {
        let lines = normalize_lines("first\nworking\rdone");
        assert_eq!(lines, vec!["first", "done"]);
    }

    #[test]
    fn blank_line_runs_collapse() {
        let lines = normalize_lines("a\n\n\n\nb");
        assert_eq!(lines, vec!["a", "", "b"]);
    }

    #[test]
    fn ansi_escapes_are_stripped() {
        let stripped = strip_ansi("\x1b[31mred\x1b[0m plain");
        assert_eq!(stripped, "red plain");
    }
}
