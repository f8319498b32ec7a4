/// Converts a string to PascalCase.
/// - If the string contains underscores, it splits on underscores and converts
///   each word so that its first letter is uppercase and the rest lowercase.
/// - If the string is fully uppercase, only the first letter stays uppercase.
/// - Otherwise, it ensures only the first letter is uppercase.
pub fn to_pascal_case(s: &str) -> String {
    fn capitalize(word: &str, lower_rest: bool) -> String {
        let mut chars = word.chars();
        match chars.next() {
            None => String::new(),
            Some(first) => {
                let rest = chars.as_str();
                let rest = if lower_rest { rest.to_lowercase() } else { rest.to_string() };
                first.to_uppercase().to_string() + &rest
            }
        }
    }

    if s.contains('_') {
        s.split('_')
            .filter(|word| !word.is_empty())
            .map(|word| capitalize(word, true))
            .collect()
    } else if !s.is_empty() && s == s.to_uppercase() {
        capitalize(s, true)
    } else {
        capitalize(s, false)
    }
}

/// Converts a string to snake_case without breaking up acronyms, so that
/// "sessionID" becomes "session_id" and "CounterService" becomes
/// "counter_service".
pub fn to_snake_case(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut snake = String::new();
    for i in 0..chars.len() {
        let c = chars[i];
        if c.is_uppercase() {
            if i > 0 {
                let prev = chars[i - 1];
                if !prev.is_uppercase() || (i + 1 < chars.len() && chars[i + 1].is_lowercase()) {
                    snake.push('_');
                }
            }
            snake.extend(c.to_lowercase());
        } else {
            snake.push(c);
        }
    }
    snake
}

/// Escapes Rust reserved keywords by suffixing with an underscore.
pub fn escape_rust_keyword(s: &str) -> String {
    let keywords = [
        "as", "break", "const", "continue", "crate", "else",
        "enum", "extern", "false", "fn", "for", "if", "impl",
        "in", "let", "loop", "match", "mod", "move", "mut",
        "pub", "ref", "return", "self", "Self", "static",
        "struct", "super", "trait", "true", "type", "unsafe",
        "use", "where", "while",
    ];
    if keywords.contains(&s) {
        format!("{}_", s)
    } else {
        s.to_string()
    }
}

/// Derives the generated entity type name from a schema service name:
/// a trailing "Service" suffix is stripped and the remainder goes through
/// PascalCase ("CounterService" -> "Counter").
pub fn entity_type_name(service_name: &str) -> String {
    let base = match service_name.strip_suffix("Service") {
        Some(stripped) if !stripped.is_empty() => stripped,
        _ => service_name,
    };
    to_pascal_case(base)
}

/// The last segment of a `::`-separated name, e.g. "app::registry" ->
/// "registry". Dots are accepted as separators too.
pub fn last_segment(qualified: &str) -> &str {
    qualified
        .rsplit(|c| c == ':' || c == '.')
        .next()
        .unwrap_or(qualified)
}
