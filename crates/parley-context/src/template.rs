use parley_protocol::Settings;

/// Marks where the user's text goes inside an input template.
pub const TEXT_PLACEHOLDER: &str = "{{text}}";

/// Wrap a user turn in the configured template.
///
/// Identity when the template is empty or has no placeholder.
pub fn apply_input_template(template: &str, text: &str) -> String {
    if template.is_empty() || !template.contains(TEXT_PLACEHOLDER) {
        return text.to_string();
    }
    template.replace(TEXT_PLACEHOLDER, text)
}

/// Expand `{{char}}` and `{{user}}` in a system prompt.
pub fn render_system_prompt(prompt: &str, settings: &Settings) -> String {
    prompt
        .replace("{{char}}", &settings.ai_name)
        .replace("{{user}}", &settings.user_name)
}
