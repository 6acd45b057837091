use super::Span;

/// Recovers source spans for a parsed program.
///
/// The tree parser keeps no positions, so start tags are found by scanning the
/// source. Elements must be requested in document order.
pub struct Locator<'s> {
    source: &'s str,
    cursor: usize,
}

impl<'s> Locator<'s> {
    pub fn new(source: &'s str) -> Self {
        Self { source, cursor: 0 }
    }

    /// Span of the next start tag written as `qname`.
    pub fn element(&mut self, qname: &str) -> Option<Span> {
        let needle = format!("<{qname}");
        let mut from = self.cursor;
        while let Some(offset) = self.source.get(from..)?.find(&needle) {
            let start = from + offset;
            let after = start + needle.len();
            let next = self.source[after..].chars().next();
            if matches!(next, Some(c) if c.is_whitespace() || c == '/' || c == '>') {
                self.cursor = after;
                let end = tag_end(self.source, after).unwrap_or(self.source.len());
                return Some(Span::new(start, end));
            }
            from = after;
        }
        None
    }

    /// Span of the value of attribute `name` inside the start tag `tag`.
    pub fn attribute(&self, tag: Span, name: &str) -> Option<Span> {
        let text = self.source.get(tag.range())?;
        let bytes = text.as_bytes();
        let mut quote: Option<u8> = None;
        let mut i = 0;
        while i < bytes.len() {
            let b = bytes[i];
            match quote {
                Some(q) if b == q => quote = None,
                Some(_) => {}
                None if b == b'"' || b == b'\'' => quote = Some(b),
                None if bytes[i.saturating_sub(1)].is_ascii_whitespace()
                    && text.is_char_boundary(i)
                    && text[i..].starts_with(name) =>
                {
                    if let Some(span) = attribute_value(text, i + name.len()) {
                        let base = tag.start as usize;
                        return Some(Span::new(base + span.start as usize, base + span.end as usize));
                    }
                }
                None => {}
            }
            i += 1;
        }
        None
    }
}

/// Value span (relative to `text`) of an attribute whose name ends at `from`.
fn attribute_value(text: &str, from: usize) -> Option<Span> {
    let rest = &text[from..];
    let trimmed = rest.trim_start();
    let rest = trimmed.strip_prefix('=')?.trim_start();
    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let value_start = text.len() - rest.len() + 1;
    let value_len = rest[1..].find(quote)?;
    Some(Span::new(value_start, value_start + value_len))
}

fn tag_end(source: &str, from: usize) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (offset, c) in source[from..].char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == '>' => return Some(from + offset + 1),
            None => {}
        }
    }
    None
}
