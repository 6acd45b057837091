//! Template match patterns.

/// Split a pattern on `|` outside of predicates, parentheses and strings.
pub fn split_alternatives(pattern: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in pattern.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '"' | '\'' => quote = Some(c),
                '[' | '(' => depth += 1,
                ']' | ')' => depth = depth.saturating_sub(1),
                '|' if depth == 0 => {
                    parts.push(pattern[start..i].trim());
                    start = i + 1;
                }
                _ => {}
            },
        }
    }
    parts.push(pattern[start..].trim());
    parts
}

/// Priority of a pattern alternative without an explicit `priority`.
pub fn default_priority(alternative: &str) -> f64 {
    let step = alternative.trim();
    let step = step
        .strip_prefix("child::")
        .or_else(|| step.strip_prefix("attribute::"))
        .or_else(|| step.strip_prefix('@'))
        .unwrap_or(step);

    if matches!(
        step,
        "*" | "node()" | "text()" | "comment()" | "processing-instruction()"
    ) {
        return -0.5;
    }
    if step.starts_with("processing-instruction(") && step.ends_with(')') {
        return 0.0;
    }
    match step.split_once(':') {
        Some((prefix, "*")) if is_ncname(prefix) => -0.25,
        Some((prefix, local)) if is_ncname(prefix) && is_ncname(local) => 0.0,
        None if is_ncname(step) => 0.0,
        _ => 0.5,
    }
}

fn is_ncname(s: &str) -> bool {
    let mut chars = s.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_alphabetic() || first == '_')
        && chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}
