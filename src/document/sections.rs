use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})[ \t]+(.+?)[ \t]*$").unwrap());
static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*(```|~~~)").unwrap());

pub const DEFAULT_LEVEL: u8 = 2;

/// A heading-delimited region of a document. Spans are byte offsets.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub heading: String,
    pub level: u8,
    /// The heading line, including its line break if any.
    pub heading_span: Range<usize>,
    /// From after the heading line to the next heading of equal or
    /// shallower level, or end of text.
    pub body_span: Range<usize>,
}

/// Replace or insert one named section.
#[derive(Debug, Clone)]
pub struct SectionUpdate {
    pub heading: String,
    pub body: String,
    /// Level used only when the section has to be created.
    pub level: u8,
    /// Preferred predecessor when the section has to be created.
    pub after: Option<String>,
}

impl SectionUpdate {
    pub fn new(heading: &str, body: impl Into<String>) -> Self {
        SectionUpdate {
            heading: heading.to_string(),
            body: body.into(),
            level: DEFAULT_LEVEL,
            after: None,
        }
    }

    pub fn after(mut self, heading: &str) -> Self {
        self.after = Some(heading.to_string());
        self
    }
}

struct HeadingLine {
    level: u8,
    text: String,
    span: Range<usize>,
}

/// Lines with their start offsets, line breaks kept.
fn lines_with_offsets(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.split_inclusive('\n').scan(0, |offset, line| {
        let start = *offset;
        *offset += line.len();
        Some((start, line))
    })
}

/// Headings outside code fences, plus the marker of a fence still open at
/// end of text.
fn scan_lines(text: &str) -> (Vec<HeadingLine>, Option<String>) {
    let mut open_fence: Option<String> = None;
    let mut out = Vec::new();
    for (start, line) in lines_with_offsets(text) {
        let bare = line.trim_end_matches(['\n', '\r']);
        if let Some(caps) = FENCE_RE.captures(bare) {
            open_fence = match open_fence {
                Some(_) => None,
                None => Some(caps[1].to_string()),
            };
            continue;
        }
        if open_fence.is_some() {
            continue;
        }
        if let Some(caps) = HEADING_RE.captures(bare) {
            out.push(HeadingLine {
                level: caps[1].len() as u8,
                text: caps[2].to_string(),
                span: start..start + line.len(),
            });
        }
    }
    (out, open_fence)
}

/// All sections in document order. Text before the first heading belongs to none.
pub fn parse_sections(text: &str) -> Vec<Section> {
    let (headings, _) = scan_lines(text);
    headings
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let end = headings[i + 1..]
                .iter()
                .find(|next| next.level <= h.level)
                .map_or(text.len(), |next| next.span.start);
            Section {
                heading: h.text.clone(),
                level: h.level,
                heading_span: h.span.clone(),
                body_span: h.span.end..end,
            }
        })
        .collect()
}

fn same_heading(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

/// Shallowest section with this heading; the first one on a tie.
pub fn find_section<'a>(sections: &'a [Section], heading: &str) -> Option<&'a Section> {
    sections
        .iter()
        .filter(|s| same_heading(&s.heading, heading))
        .min_by_key(|s| s.level)
}

/// Section with this heading that sits at `level`: an exact level match
/// first, else the shallowest match not nested under a heading at or
/// below `level`. A `### Lore` inside `## Skills` is not a level 2 `Lore`.
fn find_section_at<'a>(sections: &'a [Section], heading: &str, level: u8) -> Option<&'a Section> {
    let candidates = move || {
        sections
            .iter()
            .enumerate()
            .filter(move |(_, s)| same_heading(&s.heading, heading))
    };
    if let Some((_, s)) = candidates().find(|(_, s)| s.level == level) {
        return Some(s);
    }
    candidates()
        .filter(|(i, s)| s.level < level || parent_level(sections, *i).map_or(true, |p| p < level))
        .map(|(_, s)| s)
        .min_by_key(|s| s.level)
}

/// Level of the nearest enclosing section, if any.
fn parent_level(sections: &[Section], index: usize) -> Option<u8> {
    let level = sections[index].level;
    sections[..index].iter().rev().find(|p| p.level < level).map(|p| p.level)
}

/// Blank lines trimmed; headings at or above `level` pushed to `level + 1`;
/// an unterminated fence is closed.
fn normalize_body(body: &str, level: u8) -> String {
    let demoted = "#".repeat(level as usize + 1);
    let mut in_fence = false;
    let mut lines = Vec::new();
    for line in body.trim_end().lines() {
        if FENCE_RE.is_match(line) {
            in_fence = !in_fence;
            lines.push(line.to_string());
            continue;
        }
        match HEADING_RE.captures(line) {
            Some(caps) if !in_fence && caps[1].len() as u8 <= level => {
                lines.push(format!("{} {}", demoted, &caps[2]));
            }
            _ => lines.push(line.to_string()),
        }
    }
    let first = lines.iter().position(|l| !l.trim().is_empty());
    let mut out = first.map(|i| lines[i..].join("\n")).unwrap_or_default();
    if in_fence {
        out.push_str("\n```");
    }
    out
}

/// Body text as stored: one blank line after the heading, content, and a
/// blank line before any following heading.
fn render_body(body: &str, level: u8, followed: bool) -> String {
    let content = normalize_body(body, level);
    let mut out = if content.is_empty() {
        "\n".to_string()
    } else {
        format!("\n{}\n", content)
    };
    if followed {
        out.push('\n');
    }
    out
}

/// Upsert `update` into `doc`. Everything outside the target section's body is
/// preserved byte for byte; applying the same update twice changes nothing.
pub fn merge_section(doc: &str, update: &SectionUpdate) -> String {
    let sections = parse_sections(doc);

    let level = update.level.clamp(1, 6);
    if let Some(section) = find_section_at(&sections, &update.heading, level) {
        let body = &section.body_span;
        let mut rendered = render_body(&update.body, section.level, body.end < doc.len());
        if !doc[section.heading_span.clone()].ends_with('\n') {
            rendered.insert(0, '\n');
        }
        let mut out = String::with_capacity(doc.len() + rendered.len());
        out.push_str(&doc[..body.start]);
        out.push_str(&rendered);
        out.push_str(&doc[body.end..]);
        return out;
    }

    let pos = insertion_point(doc, &sections, update.after.as_deref(), level);
    let (before, rest) = doc.split_at(pos);

    let mut out = String::with_capacity(doc.len() + update.body.len() + 32);
    out.push_str(before);
    // A fence left open at the end would swallow the new heading.
    if let (_, Some(marker)) = scan_lines(before) {
        if !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&marker);
        out.push('\n');
    }
    if !before.is_empty() {
        if !out.ends_with('\n') {
            out.push('\n');
        }
        if !out.ends_with("\n\n") {
            out.push('\n');
        }
    }
    out.push_str(&format!("{} {}\n", "#".repeat(level as usize), update.heading.trim()));
    out.push_str(&render_body(&update.body, level, !rest.is_empty()));
    out.push_str(rest);
    out
}

/// End of the predecessor's section, moved past any deeper headings that
/// would otherwise fall inside the new section. End of text by default.
fn insertion_point(doc: &str, sections: &[Section], after: Option<&str>, level: u8) -> usize {
    let Some(pred) = after.and_then(|h| find_section_at(sections, h, level)) else {
        return doc.len();
    };
    sections
        .iter()
        .find(|s| s.heading_span.start >= pred.body_span.end && s.level <= level)
        .map_or(doc.len(), |s| s.heading_span.start)
}
