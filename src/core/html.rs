// src/core/html.rs
//
// Markup tolerance for the leaderboard page. The page is plain text today;
// these helpers keep the parser working if it comes back wrapped in markup.

/// Split a document into clean text lines: `<br>` and block closers become
/// line breaks, remaining tags are dropped, common entities decoded,
/// whitespace collapsed. Blank lines are skipped.
pub fn text_lines(doc: &str) -> Vec<String> {
    let broken = break_blocks(doc);
    broken
        .lines()
        .map(|l| normalize_ws(&decode_entities(&strip_tags(l))))
        .filter(|l| !l.is_empty())
        .collect()
}

fn break_blocks(doc: &str) -> String {
    let mut out = String::with_capacity(doc.len());
    let mut rest = doc;
    while let Some(lt) = rest.find('<') {
        out.push_str(&rest[..lt]);
        let Some(gt) = rest[lt..].find('>') else {
            out.push_str(&rest[lt..]);
            return out;
        };
        let tag = &rest[lt..lt + gt + 1];
        let name = tag_name(tag);
        if matches!(name.as_str(), "br" | "/p" | "/div" | "/li" | "/tr" | "p" | "div" | "li" | "tr") {
            out.push('\n');
        } else {
            out.push_str(tag);
        }
        rest = &rest[lt + gt + 1..];
    }
    out.push_str(rest);
    out
}

fn tag_name(tag: &str) -> String {
    tag.trim_start_matches('<')
        .trim_end_matches('>')
        .trim_end_matches('/')
        .split(|c: char| c.is_whitespace())
        .next()
        .unwrap_or("")
        .to_ascii_lowercase()
}

/// Drop `<...>` runs. An unterminated `<` is kept as literal text.
pub fn strip_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(lt) = rest.find('<') {
        out.push_str(&rest[..lt]);
        match rest[lt..].find('>') {
            Some(gt) => rest = &rest[lt + gt + 1..],
            None => {
                out.push_str(&rest[lt..]);
                return out;
            }
        }
    }
    out.push_str(rest);
    out
}

pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

pub fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
