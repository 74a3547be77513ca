//! SQL text piped through the wrapper when creating schemas.

/// Backtick-quote an identifier, doubling embedded backticks.
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Inverse of [`quote_identifier`]. Returns `None` for anything that is not
/// exactly one quoted identifier.
pub fn unquote_identifier(quoted: &str) -> Option<String> {
    let inner = quoted.trim().strip_prefix('`')?.strip_suffix('`')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '`' {
            // Inside the quotes a backtick only appears doubled.
            if chars.next() != Some('`') {
                return None;
            }
        }
        out.push(c);
    }
    Some(out)
}

/// Statements that (re)create `schema`.
pub fn schema_script(schema: &str, drop_first: bool) -> String {
    let quoted = quote_identifier(schema);
    let mut script = String::new();
    if drop_first {
        script.push_str(&format!("drop schema if exists {quoted};\n"));
    }
    script.push_str(&format!("create schema if not exists {quoted};\n"));
    script
}
