//! Prompt template rendering.

/// Build a prompt string with variable substitution.
///
/// Replaces `{key}` placeholders in the template with the matching value in
/// a single pass, so substituted values are never re-scanned for
/// placeholders. Placeholders without a value are left as-is.
///
/// Use `{{` to insert a literal `{` and `}}` to insert a literal `}`.
///
/// # Example
///
/// ```
/// use chunkbuddy::prompt::render;
///
/// let result = render(
///     "Explain {topic}. Reply as {{\"score\": 1}}",
///     &[("topic", "TLS")],
/// );
/// assert_eq!(result, r#"Explain TLS. Reply as {"score": 1}"#);
/// ```
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find(&['{', '}'][..]) {
        rendered.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if tail.starts_with("{{") || tail.starts_with("}}") {
            rendered.push_str(&tail[..1]);
            rest = &tail[2..];
            continue;
        }

        if tail.starts_with('{') {
            if let Some(close) = tail.find('}') {
                let key = &tail[1..close];
                if let Some((_, value)) = vars.iter().find(|(k, _)| *k == key) {
                    rendered.push_str(value);
                    rest = &tail[close + 1..];
                    continue;
                }
            }
        }

        rendered.push_str(&tail[..1]);
        rest = &tail[1..];
    }

    rendered.push_str(rest);
    rendered
}

/// Render items as a `- item` bullet list, or `placeholder` when empty.
pub fn bullet_list<S: AsRef<str>>(items: &[S], placeholder: &str) -> String {
    if items.is_empty() {
        return placeholder.to_string();
    }
    items
        .iter()
        .map(|item| format!("- {}", item.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Create a numbered list from items (1-indexed).
pub fn numbered_list<S: AsRef<str>>(items: &[S]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{}. {}", i + 1, item.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}
