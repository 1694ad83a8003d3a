//! Suggestions for template errors

/// Global functions registered in every environment
pub const AVAILABLE_FUNCTIONS: &[&str] = &[
    "HasLocalRegistry",
    "LocalRegistryHost",
    "LocalRegistryNamespace",
    "LocalRegistryAddress",
    "LocalImageName",
    "ConfigOption",
    "ConfigOptionEquals",
    "Namespace",
    "Base64Encode",
    "Base64Decode",
    "KurlString",
    "KurlInt",
    "KurlBool",
    "KurlAll",
];

/// Maximum edit distance for a suggestion to be offered
const MAX_SUGGESTION_DISTANCE: usize = 3;

/// Closest candidates to `input`, best first
pub fn find_closest_matches<'a>(
    input: &str,
    candidates: &[&'a str],
    max_results: usize,
) -> Vec<&'a str> {
    let mut matches: Vec<(usize, &str)> = candidates
        .iter()
        .map(|&candidate| (strsim::levenshtein(input, candidate), candidate))
        .filter(|(distance, _)| *distance > 0 && *distance <= MAX_SUGGESTION_DISTANCE)
        .collect();

    matches.sort_by_key(|(distance, _)| *distance);
    matches.truncate(max_results);
    matches.into_iter().map(|(_, candidate)| candidate).collect()
}

/// Suggest a correction for an unknown function
pub fn suggest_unknown_function(name: &str) -> Option<String> {
    let matches = find_closest_matches(name, AVAILABLE_FUNCTIONS, 3);

    if matches.is_empty() {
        Some(format!(
            "Unknown function `{}`. Available functions: {}",
            name,
            AVAILABLE_FUNCTIONS.join(", ")
        ))
    } else {
        let quoted: Vec<String> = matches.iter().map(|m| format!("`{}`", m)).collect();
        Some(format!("Did you mean {}?", quoted.join(" or ")))
    }
}

/// Name of the first function called on the failing line of a MiniJinja error display
///
/// MiniJinja marks the failing line with `>`:
/// ```text
///    3 >   image: '{{ LocalRegistryHots() }}/app'
/// ```
pub fn extract_call_from_display(display: &str) -> Option<String> {
    let line = display.lines().find(|line| {
        let trimmed = line.trim_start();
        trimmed.contains(" > ") || trimmed.starts_with("> ")
    })?;

    let start = line.find("{{")?;
    let expr = &line[start + 2..];
    let paren = expr.find('(')?;
    let name = expr[..paren]
        .rsplit(|c: char| !(c.is_alphanumeric() || c == '_'))
        .next()?;

    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
