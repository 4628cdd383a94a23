//! Name and type normalization for LLM-extracted intent.

/// Split on underscores, hyphens and whitespace, dropping empty parts
fn words(name: &str) -> Vec<&str> {
    name.split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .collect()
}

/// Uppercase the first character and keep the rest as written
fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Convert a name to camelCase. Names that are already camelCase pass through.
pub fn to_camel_case(name: &str) -> String {
    let parts = words(name);
    let Some((first, rest)) = parts.split_first() else {
        return "unknown".to_string();
    };

    let mut result = if rest.is_empty() {
        let mut chars = first.chars();
        match chars.next() {
            Some(c) => c.to_lowercase().chain(chars).collect(),
            None => String::new(),
        }
    } else {
        first.to_lowercase()
    };

    for part in rest {
        result.push_str(&capitalize(part));
    }
    result
}

/// Convert a name to PascalCase
pub fn to_pascal_case(name: &str) -> String {
    let result: String = words(name).into_iter().map(capitalize).collect();
    if result.is_empty() { "Unknown".to_string() } else { result }
}

/// Map loose type names onto Concerto primitives; anything else is
/// treated as a declared type and capitalized.
pub fn normalize_type(type_name: &str) -> String {
    let trimmed = type_name.trim();
    let mapped = match trimmed.to_lowercase().as_str() {
        "string" | "str" | "text" => "String",
        "int" | "integer" | "number" => "Integer",
        "long" => "Long",
        "double" | "float" | "decimal" => "Double",
        "bool" | "boolean" => "Boolean",
        "date" | "datetime" | "time" | "timestamp" => "DateTime",
        _ => return capitalize(trimmed),
    };
    mapped.to_string()
}
