//! Just enough HTML scanning for the portal's server-rendered tables and forms.
//!
//! Searches run on an ASCII-lowercased copy, which keeps byte offsets identical
//! to the original so slices can be taken from the original text.

pub fn to_lower(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii() { c.to_ascii_lowercase() } else { c })
        .collect()
}

/// Finds the next `open ... close` block at or after `from` in the lowercased
/// document `lc`; `open` and `close` must already be lowercase.
///
/// Returns byte offsets `(start, end)` with `end` just past `close`.
fn next_block(lc: &str, open: &str, close: &str, from: usize) -> Option<(usize, usize)> {
    let start = lc.get(from..)?.find(open)? + from;
    let open_end = lc[start..].find('>')? + start + 1;
    let end_rel = lc[open_end..].find(close)?;
    Some((start, open_end + end_rel + close.len()))
}

/// Every `open ... close` block in `s`, in document order, matched case-insensitively.
pub fn tag_blocks<'a>(s: &'a str, open: &str, close: &str) -> Vec<&'a str> {
    let lc = to_lower(s);
    let open = to_lower(open);
    let close = to_lower(close);

    let mut out = Vec::new();
    let mut pos = 0usize;
    while let Some((start, end)) = next_block(&lc, &open, &close, pos) {
        out.push(&s[start..end]);
        pos = end;
    }
    out
}

/// The opening tag of a block, e.g. `<tr class="trboder">`.
pub fn open_tag(block: &str) -> &str {
    match block.find('>') {
        Some(end) => &block[..=end],
        None => block,
    }
}

pub fn inner_after_open_tag(block: &str) -> &str {
    if let Some(oe) = block.find('>') {
        if let Some(cs) = block.rfind('<') {
            if cs > oe {
                return &block[oe + 1..cs];
            }
        }
    }
    ""
}

/// The element whose opening tag carries `id="<id>"`, through its matching close tag.
///
/// Nested elements of the same name are not balanced; the portal's tables do not nest.
pub fn element_by_id<'a>(s: &'a str, tag: &str, id: &str) -> Option<&'a str> {
    let lc = to_lower(s);
    let open = format!("<{}", to_lower(tag));
    let close = format!("</{}", to_lower(tag));
    let id_lc = to_lower(id);

    let mut pos = 0usize;
    while let Some(rel) = lc[pos..].find(&open) {
        let start = pos + rel;
        let open_end = lc[start..].find('>')? + start;
        let tag_text = &lc[start..open_end];
        let has_id = [format!("id=\"{}\"", id_lc), format!("id='{}'", id_lc), format!("id={}", id_lc)]
            .iter()
            .any(|pat| {
                tag_text.find(pat.as_str()).is_some_and(|i| {
                    let after = &tag_text[i + pat.len()..];
                    pat.ends_with(['"', '\'']) || after.is_empty() || after.starts_with([' ', '/'])
                })
            });
        if has_id {
            let end = lc[open_end..].find(&close).map(|i| open_end + i)?;
            let close_end = lc[end..].find('>').map(|i| end + i + 1).unwrap_or(s.len());
            return Some(&s[start..close_end]);
        }
        pos = open_end;
    }
    None
}

/// Whether the `class` attribute of `tag` lists `class_name`.
pub fn has_class(tag: &str, class_name: &str) -> bool {
    let lc = to_lower(tag);
    let wanted = to_lower(class_name);
    for quote in ['"', '\''] {
        let pat = format!("class={}", quote);
        if let Some(i) = lc.find(&pat) {
            let rest = &lc[i + pat.len()..];
            let value = rest.split(quote).next().unwrap_or("");
            if value.split_whitespace().any(|c| c == wanted) {
                return true;
            }
        }
    }
    false
}

pub fn strip_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;

    for ch in s.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out
}

pub fn normalize_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

pub fn normalize_ws(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !prev_space {
                out.push(' ');
                prev_space = true;
            }
        } else {
            out.push(ch);
            prev_space = false;
        }
    }
    out.trim().to_string()
}

/// Visible text of a cell: tags removed, entities decoded, whitespace collapsed.
pub fn cell_text(block: &str) -> String {
    normalize_ws(&normalize_entities(&strip_tags(inner_after_open_tag(block))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_by_id_matches_exact_id() {
        let doc = r#"<table id="tblsub"><tr><td>x</td></tr></table>
<TABLE ID="tblsubjectwiseattendence"><tr><td>y</td></tr></TABLE>"#;
        let table = element_by_id(doc, "table", "tblsubjectwiseattendence").unwrap();
        assert!(table.contains("<td>y</td>"));
        assert!(!table.contains("<td>x</td>"));
        assert!(element_by_id(doc, "table", "missing").is_none());
    }

    #[test]
    fn test_has_class() {
        assert!(has_class(r#"<tr class="row trboder">"#, "trboder"));
        assert!(has_class("<tr class='TRODD2'>", "trodd2"));
        assert!(!has_class(r#"<tr class="trboderless">"#, "trboder"));
        assert!(!has_class("<tr>", "trboder"));
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text("<td> <b>Data&nbsp;Structures</b>\n </td>"), "Data Structures");
        assert_eq!(cell_text("<td>R&amp;D</td>"), "R&D");
        assert_eq!(cell_text("<td></td>"), "");
    }

    #[test]
    fn test_tag_blocks_in_order() {
        let row = "<tr><td>1</td><TD>2</TD><td>3</td></tr>";
        let cells: Vec<_> = tag_blocks(row, "<td", "</td>").into_iter().map(cell_text).collect();
        assert_eq!(cells, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_tag_blocks_on_a_large_page() {
        let rows: String = (0..5000)
            .map(|i| format!("<TR class=\"row\"><td>Ünïcode {}</td></TR>\n", i))
            .collect();
        let blocks = tag_blocks(&rows, "<tr", "</tr>");
        assert_eq!(blocks.len(), 5000);
        assert_eq!(cell_text(tag_blocks(blocks[4999], "<td", "</td>")[0]), "Ünïcode 4999");
    }
}
