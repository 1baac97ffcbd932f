//! Embedded markup detection.
//!
//! A bounded, line-oriented heuristic: each line is tested against a fixed
//! list of case-insensitive patterns and the first hit wins. Lines past the
//! budget are never looked at, so false negatives past that point are
//! expected. Tags split across lines are not matched.

use crate::core::config::{DEFAULT_HTML_CHECK_LINES, DEFAULT_MAX_LINE_BYTES};
use crate::core::error::{Error, Result};
use crate::core::types::MarkupRule;
use regex::Regex;
use std::io::{BufRead, Read};

impl MarkupRule {
    /// Regular expression for this rule (matched case-insensitively).
    pub fn pattern(&self) -> &'static str {
        match self {
            MarkupRule::AnchorHref => r"<A\s+[^>]*HREF[^>]+>",
            MarkupRule::Iframe => r"<IFRAME[^>]*>",
            MarkupRule::Frameset => r"<FRAMESET[^>]*>",
            MarkupRule::Meta => r"<META[\W][^>]*>",
            MarkupRule::Script => r"<SCRIPT[^>]*>",
        }
    }
}

/// Line-bounded scanner for renderable markup.
#[derive(Debug, Clone)]
pub struct MarkupScanner {
    rules: Vec<(MarkupRule, Regex)>,
    max_lines: usize,
    max_line_bytes: usize,
}

impl MarkupScanner {
    /// Compile the rule set with the default line budget.
    pub fn new() -> Result<Self> {
        Self::with_limits(DEFAULT_HTML_CHECK_LINES, DEFAULT_MAX_LINE_BYTES)
    }

    /// Compile the rule set with explicit bounds.
    ///
    /// `max_line_bytes` only applies to live streams; in-memory input is
    /// already bounded by whoever read it.
    pub fn with_limits(max_lines: usize, max_line_bytes: usize) -> Result<Self> {
        let rules = MarkupRule::ALL
            .iter()
            .map(|rule| {
                Regex::new(&format!("(?i){}", rule.pattern()))
                    .map(|regex| (*rule, regex))
                    .map_err(|e| Error::PatternCompile(format!("{}: {}", rule, e)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            rules,
            max_lines,
            max_line_bytes: max_line_bytes.max(1),
        })
    }

    /// Line budget.
    pub fn max_lines(&self) -> usize {
        self.max_lines
    }

    /// Test a single decoded line against every rule, in order.
    pub fn match_line(&self, line: &str) -> Option<MarkupRule> {
        self.rules
            .iter()
            .find(|(_, regex)| regex.is_match(line))
            .map(|(rule, _)| *rule)
    }

    /// Scan a sequence of lines, stopping at the first hit or the line budget.
    ///
    /// Lines are decoded leniently; invalid UTF-8 is replaced, never rejected.
    pub fn first_match<I>(&self, lines: I) -> Option<MarkupRule>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        lines
            .into_iter()
            .take(self.max_lines)
            .find_map(|line| self.match_line(&String::from_utf8_lossy(line.as_ref())))
    }

    /// Scan an in-memory chunk, split on `\n`, `\r` or `\r\n`.
    pub fn scan_chunk(&self, chunk: &[u8]) -> Option<MarkupRule> {
        self.first_match(split_lines(chunk))
    }

    /// Scan a live stream row by row.
    ///
    /// Reads at most `max_lines` lines of at most `max_line_bytes` each; a
    /// longer line is cut and its remainder counts as the next line.
    pub fn scan_reader<R: BufRead>(&self, mut reader: R) -> std::io::Result<Option<MarkupRule>> {
        let mut line = Vec::new();

        for _ in 0..self.max_lines {
            line.clear();
            let read = (&mut reader)
                .take(self.max_line_bytes as u64)
                .read_until(b'\n', &mut line)?;
            if read == 0 {
                break;
            }

            if let Some(rule) = self.match_line(&String::from_utf8_lossy(&line)) {
                return Ok(Some(rule));
            }
        }

        Ok(None)
    }

    /// Boolean form of [`first_match`](Self::first_match).
    pub fn is_unsafe<I>(&self, lines: I) -> bool
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        self.first_match(lines).is_some()
    }
}

/// Split a byte chunk into lines without their terminators.
fn split_lines(chunk: &[u8]) -> impl Iterator<Item = &[u8]> + '_ {
    let mut rest = chunk;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }

        match rest.iter().position(|&b| b == b'\n' || b == b'\r') {
            Some(i) => {
                let line = &rest[..i];
                let skip = if rest[i] == b'\r' && rest.get(i + 1) == Some(&b'\n') {
                    2
                } else {
                    1
                };
                rest = &rest[i + skip..];
                Some(line)
            }
            None => {
                let line = rest;
                rest = &[];
                Some(line)
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn scanner() -> MarkupScanner {
        MarkupScanner::new().unwrap()
    }

    #[test]
    fn test_each_rule_matches() {
        let s = scanner();
        assert_eq!(
            s.match_line(r#"<a href="http://x">x</a>"#),
            Some(MarkupRule::AnchorHref)
        );
        assert_eq!(s.match_line("<iframe src=x>"), Some(MarkupRule::Iframe));
        assert_eq!(s.match_line("<frameset cols=2>"), Some(MarkupRule::Frameset));
        assert_eq!(
            s.match_line(r#"<meta http-equiv="refresh" content="0">"#),
            Some(MarkupRule::Meta)
        );
        assert_eq!(
            s.match_line("<script>alert(1)</script>"),
            Some(MarkupRule::Script)
        );
    }

    #[test]
    fn test_case_insensitive() {
        let s = scanner();
        assert_eq!(s.match_line("<ScRiPt src=a.js>"), Some(MarkupRule::Script));
        assert_eq!(s.match_line(r#"<A HrEf="/">"#), Some(MarkupRule::AnchorHref));
    }

    #[test]
    fn test_benign_markup_ignored() {
        let s = scanner();
        assert_eq!(s.match_line(r#"<a name="top">"#), None);
        assert_eq!(s.match_line("<metadata>"), None);
        assert_eq!(s.match_line("<p>hello</p>"), None);
        assert_eq!(s.match_line("chr1\t100\t200\tgene"), None);
    }

    #[test]
    fn test_rule_order() {
        let s = scanner();
        assert_eq!(
            s.match_line("<script></script><iframe>"),
            Some(MarkupRule::Iframe)
        );
    }

    #[test]
    fn test_line_budget() {
        let s = MarkupScanner::with_limits(100, 1024).unwrap();

        let mut lines = vec!["plain"; 99];
        lines.push("<script>");
        assert_eq!(s.first_match(&lines), Some(MarkupRule::Script));

        let mut lines = vec!["plain"; 100];
        lines.push("<script>");
        assert_eq!(s.first_match(&lines), None);
    }

    #[test]
    fn test_lossy_decoding() {
        let s = scanner();
        let line: &[u8] = b"\xff\xfe<IFRAME>\xc3";
        assert!(s.is_unsafe([line]));
    }

    #[test]
    fn test_scan_chunk_line_endings() {
        let s = MarkupScanner::with_limits(3, 1024).unwrap();
        assert_eq!(s.scan_chunk(b"a\r\nb\r\n<script>"), Some(MarkupRule::Script));
        assert_eq!(s.scan_chunk(b"a\rb\rc\r<script>"), None);
        assert_eq!(s.scan_chunk(b""), None);
    }

    #[test]
    fn test_split_lines() {
        let lines: Vec<&[u8]> = split_lines(b"one\r\ntwo\nthree\rfour").collect();
        assert_eq!(
            lines,
            vec![&b"one"[..], &b"two"[..], &b"three"[..], &b"four"[..]]
        );
    }

    #[test]
    fn test_scan_reader() {
        let s = scanner();
        let data = b"header\nsecond\n<frameset rows=1>\n".to_vec();
        assert_eq!(
            s.scan_reader(Cursor::new(data)).unwrap(),
            Some(MarkupRule::Frameset)
        );
    }

    #[test]
    fn test_scan_reader_bounds_long_lines() {
        let s = MarkupScanner::with_limits(3, 10).unwrap();

        let mut data = vec![b'x'; 30];
        data.extend_from_slice(b"<script>");
        assert_eq!(s.scan_reader(Cursor::new(data)).unwrap(), None);

        let mut data = vec![b'x'; 20];
        data.extend_from_slice(b"<iframe>");
        assert_eq!(
            s.scan_reader(Cursor::new(data)).unwrap(),
            Some(MarkupRule::Iframe)
        );
    }
}
