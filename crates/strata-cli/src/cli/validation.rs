/// Parse a JSX factory or fragment name.
///
/// Accepts a dotted JavaScript identifier path such as `h`, `React.createElement`
/// or `$jsx.frag`.
pub fn parse_jsx_name(s: &str) -> Result<String, String> {
    if s.is_empty() {
        return Err("JSX name cannot be empty".to_string());
    }

    for segment in s.split('.') {
        let mut chars = segment.chars();
        let Some(first) = chars.next() else {
            return Err(format!("JSX name has an empty segment: '{s}'"));
        };
        if !first.is_alphabetic() && first != '_' && first != '$' {
            return Err(format!(
                "JSX name segments must start with a letter, underscore, or dollar sign: '{s}'"
            ));
        }
        if chars.any(|c| !c.is_alphanumeric() && c != '_' && c != '$') {
            return Err(format!(
                "JSX name may only contain letters, digits, '_', '$' and '.': '{s}'"
            ));
        }
    }

    Ok(s.to_string())
}

/// Parse a debounce window in milliseconds. Zero is rejected.
pub fn parse_debounce(s: &str) -> Result<u64, String> {
    let ms: u64 = s
        .parse()
        .map_err(|_| format!("Debounce must be a whole number of milliseconds: '{s}'"))?;
    if ms == 0 {
        return Err("Debounce must be at least 1 ms".to_string());
    }
    Ok(ms)
}
