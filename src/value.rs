//! Typed property values and their textual encoding.
//!
//! Panel properties carry a small closed set of value types. The textual
//! form mirrors the GVariant text format that xfconf tooling uses, so
//! manifests written here stay readable by the same conventions:
//! `'text'`, `true`, `42`, `[1, 2]`, `['a', 'b']`, with `@ai []` / `@as []`
//! for empty arrays (a bare `[]` would not say which element type it has).

/// One panel property value. Exhaustive by design: anything the live
/// property service reports outside this set is dropped at capture time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Str(String),
    Bool(bool),
    Int(i64),
    IntArray(Vec<i64>),
    StrArray(Vec<String>),
}

impl PropertyValue {
    /// Render the value in manifest text form. `parse` inverts this exactly.
    pub fn to_text(&self) -> String {
        match self {
            PropertyValue::Str(s) => quote(s),
            PropertyValue::Bool(b) => b.to_string(),
            PropertyValue::Int(n) => n.to_string(),
            PropertyValue::IntArray(values) => {
                if values.is_empty() {
                    return "@ai []".to_string();
                }
                let items: Vec<String> = values.iter().map(|n| n.to_string()).collect();
                format!("[{}]", items.join(", "))
            }
            PropertyValue::StrArray(values) => {
                if values.is_empty() {
                    return "@as []".to_string();
                }
                let items: Vec<String> = values.iter().map(|s| quote(s)).collect();
                format!("[{}]", items.join(", "))
            }
        }
    }

    /// Parse manifest text back into a value. Returns `None` on anything
    /// malformed; manifest readers treat such lines as skippable.
    pub fn parse(text: &str) -> Option<PropertyValue> {
        let text = text.trim();
        if let Some(rest) = text.strip_prefix("@ai") {
            return (rest.trim() == "[]").then(|| PropertyValue::IntArray(Vec::new()));
        }
        if let Some(rest) = text.strip_prefix("@as") {
            return (rest.trim() == "[]").then(|| PropertyValue::StrArray(Vec::new()));
        }
        if text.starts_with('\'') {
            let (s, rest) = parse_quoted(text)?;
            return rest.is_empty().then_some(PropertyValue::Str(s));
        }
        if let Some(inner) = text.strip_prefix('[') {
            let inner = inner.strip_suffix(']')?;
            return parse_array(inner);
        }
        match text {
            "true" => Some(PropertyValue::Bool(true)),
            "false" => Some(PropertyValue::Bool(false)),
            _ => text.parse::<i64>().ok().map(PropertyValue::Int),
        }
    }
}

/// Single-quote a string, escaping the backslash, the quote itself and the
/// control characters that would break the one-line manifest format.
fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Consume one quoted string from the front of `text`, returning it and the
/// unconsumed remainder. `None` on unterminated quotes or unknown escapes.
fn parse_quoted(text: &str) -> Option<(String, &str)> {
    let rest = text.strip_prefix('\'')?;
    let mut out = String::new();
    let mut chars = rest.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => match chars.next()?.1 {
                '\\' => out.push('\\'),
                '\'' => out.push('\''),
                'n' => out.push('\n'),
                'r' => out.push('\r'),
                't' => out.push('\t'),
                _ => return None,
            },
            '\'' => return Some((out, &rest[i + 1..])),
            _ => out.push(c),
        }
    }
    None
}

fn parse_array(inner: &str) -> Option<PropertyValue> {
    let inner = inner.trim();
    if inner.is_empty() {
        // only the typed spellings @ai []/@as [] are unambiguous
        return None;
    }
    if inner.starts_with('\'') {
        let mut items = Vec::new();
        let mut rest = inner;
        loop {
            let (item, after) = parse_quoted(rest.trim_start())?;
            items.push(item);
            rest = after.trim_start();
            if rest.is_empty() {
                break;
            }
            rest = rest.strip_prefix(',')?;
        }
        Some(PropertyValue::StrArray(items))
    } else {
        let mut items = Vec::new();
        for piece in inner.split(',') {
            items.push(piece.trim().parse::<i64>().ok()?);
        }
        Some(PropertyValue::IntArray(items))
    }
}
