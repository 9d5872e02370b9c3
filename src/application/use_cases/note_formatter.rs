//! Local notes fallback: turns raw extracted text into structured HTML.
//!
//! Pure function, no I/O. Every piece of source text is escaped, and the
//! emitted tags are balanced no matter how the input is shaped.

use html_escape::encode_text;
use once_cell::sync::Lazy;
use regex::Regex;

static PAGE_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^Page\s+(\d+):\s*$").unwrap());
static MARKDOWN_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(#{1,6})\s+(.+)$").unwrap());
static BULLET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-*•·▪]\s+(.+)$").unwrap());
static NUMBERED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{1,3}[.)]\s+(.+)$").unwrap());
static BOLD_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*([^*\n]+?)\*\*").unwrap());
static KEY_TERM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Z][A-Za-z0-9 ()/'-]{1,40}):\s+(\S.*)$").unwrap());

const MAX_HEADING_CHARS: usize = 80;
const MAX_LABEL_HEADING_CHARS: usize = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    Blank,
    PageMarker(String),
    Heading(u8, String),
    Bullet(String),
    Numbered(String),
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    None,
    Paragraph,
    BulletList,
    NumberedList,
}

fn is_all_caps_heading(line: &str) -> bool {
    let letters: Vec<char> = line.chars().filter(|c| c.is_alphabetic()).collect();
    letters.len() >= 3
        && line.chars().count() <= MAX_HEADING_CHARS
        && letters.iter().all(|c| c.is_uppercase())
}

fn is_label_heading(line: &str) -> bool {
    line.ends_with(':')
        && line.chars().count() <= MAX_LABEL_HEADING_CHARS
        && line.chars().filter(|c| c.is_alphabetic()).count() >= 3
}

fn classify(raw: &str) -> Line {
    let line = raw.trim();
    if line.is_empty() {
        return Line::Blank;
    }
    if let Some(caps) = PAGE_MARKER.captures(line) {
        return Line::PageMarker(caps[1].to_string());
    }
    if let Some(caps) = MARKDOWN_HEADING.captures(line) {
        let level = (caps[1].len() as u8 + 1).min(6);
        return Line::Heading(level, caps[2].trim().to_string());
    }
    if let Some(caps) = BULLET.captures(line) {
        return Line::Bullet(caps[1].trim().to_string());
    }
    if let Some(caps) = NUMBERED.captures(line) {
        return Line::Numbered(caps[1].trim().to_string());
    }
    if is_all_caps_heading(line) {
        return Line::Heading(3, line.to_string());
    }
    if is_label_heading(line) {
        return Line::Heading(4, line.trim_end_matches(':').trim().to_string());
    }
    Line::Text(line.to_string())
}

/// Escape text and apply inline emphasis (`**term**`, leading `Term:` labels).
fn inline(text: &str) -> String {
    if let Some(caps) = KEY_TERM.captures(text) {
        return format!(
            "<strong>{}:</strong> {}",
            emphasize(&caps[1]),
            emphasize(&caps[2])
        );
    }
    emphasize(text)
}

fn emphasize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in BOLD_SPAN.captures_iter(text) {
        let (whole, inner) = match (caps.get(0), caps.get(1)) {
            (Some(w), Some(i)) => (w, i),
            _ => continue,
        };
        out.push_str(&encode_text(&text[last..whole.start()]));
        out.push_str("<strong>");
        out.push_str(&encode_text(inner.as_str()));
        out.push_str("</strong>");
        last = whole.end();
    }
    out.push_str(&encode_text(&text[last..]));
    out
}

struct Writer {
    html: String,
    block: Block,
    paragraph: Vec<String>,
}

impl Writer {
    fn new() -> Self {
        Self {
            html: String::new(),
            block: Block::None,
            paragraph: Vec::new(),
        }
    }

    fn close_block(&mut self) {
        match self.block {
            Block::None => {}
            Block::Paragraph => {
                let body = self.paragraph.join(" ");
                self.paragraph.clear();
                self.html.push_str(&format!("<p>{}</p>\n", inline(&body)));
            }
            Block::BulletList => self.html.push_str("</ul>\n"),
            Block::NumberedList => self.html.push_str("</ol>\n"),
        }
        self.block = Block::None;
    }

    fn enter(&mut self, block: Block) {
        if self.block == block {
            return;
        }
        self.close_block();
        match block {
            Block::BulletList => self.html.push_str("<ul>\n"),
            Block::NumberedList => self.html.push_str("<ol>\n"),
            Block::None | Block::Paragraph => {}
        }
        self.block = block;
    }

    fn heading(&mut self, level: u8, text: &str) {
        self.close_block();
        self.html
            .push_str(&format!("<h{0}>{1}</h{0}>\n", level, emphasize(text)));
    }

    fn item(&mut self, block: Block, text: &str) {
        self.enter(block);
        self.html.push_str(&format!("<li>{}</li>\n", inline(text)));
    }

    fn text(&mut self, text: String) {
        self.enter(Block::Paragraph);
        self.paragraph.push(text);
    }

    fn finish(mut self) -> String {
        self.close_block();
        self.html.trim_end().to_string()
    }
}

/// Reconstruct headings, lists and paragraphs from plain extracted text.
pub fn format_notes(raw: &str) -> String {
    let mut writer = Writer::new();

    for raw_line in raw.lines() {
        match classify(raw_line) {
            Line::Blank => writer.close_block(),
            Line::PageMarker(number) => writer.heading(2, &format!("Page {}", number)),
            Line::Heading(level, text) => writer.heading(level, &text),
            Line::Bullet(text) => writer.item(Block::BulletList, &text),
            Line::Numbered(text) => writer.item(Block::NumberedList, &text),
            Line::Text(text) => writer.text(text),
        }
    }

    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag_balance(html: &str) -> bool {
        let open = Regex::new(r"<([a-z0-9]+)>").unwrap();
        let close = Regex::new(r"</([a-z0-9]+)>").unwrap();
        let mut stack: Vec<String> = Vec::new();
        let tags = Regex::new(r"</?[a-z0-9]+>").unwrap();
        for m in tags.find_iter(html) {
            if let Some(c) = close.captures(m.as_str()) {
                if stack.pop().as_deref() != Some(&c[1]) {
                    return false;
                }
            } else if let Some(o) = open.captures(m.as_str()) {
                stack.push(o[1].to_string());
            }
        }
        stack.is_empty()
    }

    #[test]
    fn test_page_markers_become_sections() {
        let html = format_notes("Page 2:\nIntro text here.\n\nPage 3:\nMore text.");
        assert_eq!(
            html,
            "<h2>Page 2</h2>\n<p>Intro text here.</p>\n<h2>Page 3</h2>\n<p>More text.</p>"
        );
    }

    #[test]
    fn test_lists_are_grouped() {
        let html = format_notes("- apples\n- pears\n1. first\n2) second\nafter");
        assert_eq!(
            html,
            "<ul>\n<li>apples</li>\n<li>pears</li>\n</ul>\n<ol>\n<li>first</li>\n<li>second</li>\n</ol>\n<p>after</p>"
        );
    }

    #[test]
    fn test_heading_heuristics() {
        assert_eq!(classify("INTRODUCTION"), Line::Heading(3, "INTRODUCTION".to_string()));
        assert_eq!(classify("Key findings:"), Line::Heading(4, "Key findings".to_string()));
        assert_eq!(classify("## Methods"), Line::Heading(3, "Methods".to_string()));
        assert_eq!(classify("A 1"), Line::Text("A 1".to_string()));
    }

    #[test]
    fn test_paragraph_lines_are_joined() {
        let html = format_notes("The cell is the\nbasic unit of life.\n\nNext paragraph.");
        assert_eq!(
            html,
            "<p>The cell is the basic unit of life.</p>\n<p>Next paragraph.</p>"
        );
    }

    #[test]
    fn test_key_terms_emphasized() {
        assert_eq!(
            inline("Mitochondria: the powerhouse of the cell"),
            "<strong>Mitochondria:</strong> the powerhouse of the cell"
        );
        assert_eq!(
            inline("remember **osmosis** well"),
            "remember <strong>osmosis</strong> well"
        );
    }

    #[test]
    fn test_markup_in_source_is_escaped() {
        let html = format_notes("<script>alert(1)</script>\n- <b>x</b>");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("<li>&lt;b&gt;x&lt;/b&gt;</li>"));
    }

    #[test]
    fn test_pathological_inputs_stay_balanced() {
        let inputs = [
            "",
            "\n\n\n",
            "- a\n  - b\n    - c\n1. d\n- e",
            "**unclosed bold\n**\n****",
            "</ul></li></p>\n<ul><li>",
            "ALL CAPS\n- x\nALL CAPS AGAIN\n1) y\n\n\n:",
            "Page 1:\nPage 2:\n- \n-\n1.",
        ];
        for input in inputs {
            let html = format_notes(input);
            assert!(tag_balance(&html), "unbalanced output for {:?}: {}", input, html);
        }
    }

    #[test]
    fn test_empty_input_yields_empty_output() {
        assert_eq!(format_notes(""), "");
    }
}
