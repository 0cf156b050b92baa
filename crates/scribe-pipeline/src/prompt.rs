//! `{placeholder}` substitution for prompt templates.

use scribe_core::{PromptTemplate, Result, ScribeError};

/// Values a template may reference.
#[derive(Debug, Clone)]
pub struct PromptVars<'a> {
    pub title: &'a str,
    pub site_name: &'a str,
    pub category: &'a str,
}

impl PromptVars<'_> {
    fn lookup(&self, name: &str) -> Option<&str> {
        match name {
            "title" => Some(self.title),
            "site_name" => Some(self.site_name),
            "category" => Some(self.category),
            _ => None,
        }
    }
}

/// Rendered system + user prompt pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    pub system: String,
    pub user: String,
}

/// Render both prompts of `template`. The user prompt must mention `{title}`.
pub fn render_template(template: &PromptTemplate, vars: &PromptVars<'_>) -> Result<RenderedPrompt> {
    if !template.user_prompt.contains("{title}") {
        return Err(ScribeError::PromptRender(format!(
            "user prompt of template {} does not reference {{title}}",
            template.name
        )));
    }
    Ok(RenderedPrompt {
        system: render(&template.system_prompt, vars)?,
        user: render(&template.user_prompt, vars)?,
    })
}

/// Substitute every `{name}` in `text`.
///
/// Braces that do not enclose an identifier (JSON snippets, `{ }`) are kept
/// verbatim. An unknown identifier or an empty value is an error.
pub fn render(text: &str, vars: &PromptVars<'_>) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match placeholder_name(after) {
            Some(name) => {
                let value = vars.lookup(name).ok_or_else(|| {
                    ScribeError::PromptRender(format!("unknown placeholder {{{name}}}"))
                })?;
                if value.trim().is_empty() {
                    return Err(ScribeError::PromptRender(format!(
                        "placeholder {{{name}}} has no value"
                    )));
                }
                out.push_str(value);
                rest = &after[name.len() + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    Ok(out)
}

/// Identifier immediately followed by `}` at the start of `s`.
fn placeholder_name(s: &str) -> Option<&str> {
    let end = s.find('}')?;
    let name = &s[..end];
    let mut chars = name.chars();
    let first = chars.next()?;
    if !(first.is_ascii_lowercase() || first == '_') {
        return None;
    }
    if chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_') {
        Some(name)
    } else {
        None
    }
}
