//! Compose template rendering
//!
//! Templates are plain compose YAML with `{{ hostname }}` and `{{ fqdn }}`
//! placeholders. Anything else between double braces is rejected so that a
//! half-rendered document never reaches the disk.

use crate::error::TemplateError;
use regex::Regex;
use std::sync::OnceLock;
use tokio::process::Command;

/// Host identity facts available to templates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostFacts {
    /// Short host name
    pub hostname: String,
    /// Fully qualified domain name
    pub fqdn: String,
}

impl HostFacts {
    pub fn new(hostname: impl Into<String>, fqdn: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            fqdn: fqdn.into(),
        }
    }

    /// Detect facts for the local host
    ///
    /// The FQDN comes from `hostname --fqdn`; when that fails the plain
    /// hostname is used instead.
    pub async fn detect() -> Self {
        let hostname = gethostname::gethostname().to_string_lossy().into_owned();

        let fqdn = match Command::new("hostname").arg("--fqdn").output().await {
            Ok(out) if out.status.success() => {
                let name = String::from_utf8_lossy(&out.stdout).trim().to_string();
                if name.is_empty() {
                    hostname.clone()
                } else {
                    name
                }
            }
            Ok(out) => {
                tracing::debug!(
                    "hostname --fqdn exited with {}, falling back to {}",
                    out.status,
                    hostname
                );
                hostname.clone()
            }
            Err(e) => {
                tracing::debug!("hostname --fqdn failed: {}, falling back to {}", e, hostname);
                hostname.clone()
            }
        };

        Self { hostname, fqdn }
    }

    fn lookup(&self, name: &str) -> Option<&str> {
        match name {
            "hostname" => Some(self.hostname.as_str()),
            "fqdn" => Some(self.fqdn.as_str()),
            _ => None,
        }
    }
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{([^{}]*)\}\}").expect("placeholder pattern is valid"))
}

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid"))
}

/// Check literal text between placeholders for stray opening delimiters
///
/// Closing delimiters on their own are ordinary text.
fn check_literal(text: &str, base: usize) -> Result<(), TemplateError> {
    for token in ["{{", "{%", "{#"] {
        if let Some(pos) = text.find(token) {
            let message = match token {
                "{{" => "unterminated placeholder".to_string(),
                _ => format!("unsupported template syntax '{}'", token),
            };
            return Err(TemplateError::Malformed {
                offset: base + pos,
                message,
            });
        }
    }
    Ok(())
}

/// Render a compose template with the given host facts
pub fn render(template: &str, facts: &HostFacts) -> Result<String, TemplateError> {
    let mut output = String::with_capacity(template.len());
    let mut last = 0;

    for caps in placeholder_re().captures_iter(template) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let literal = &template[last..whole.start()];
        check_literal(literal, last)?;
        output.push_str(literal);

        let name = caps[1].trim();
        if !identifier_re().is_match(name) {
            return Err(TemplateError::Malformed {
                offset: whole.start(),
                message: format!("invalid placeholder expression '{}'", name),
            });
        }

        let value = facts
            .lookup(name)
            .ok_or_else(|| TemplateError::UnknownPlaceholder {
                name: name.to_string(),
                offset: whole.start(),
            })?;
        output.push_str(value);
        last = whole.end();
    }

    let tail = &template[last..];
    check_literal(tail, last)?;
    output.push_str(tail);

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts() -> HostFacts {
        HostFacts::new("node1", "node1.example.com")
    }

    #[test]
    fn test_render_substitutes_known_placeholders() {
        let template = "services:\n  web:\n    hostname: {{ hostname }}\n    environment:\n      URL: https://{{fqdn}}/\n";
        let rendered = render(template, &facts()).unwrap();
        assert_eq!(
            rendered,
            "services:\n  web:\n    hostname: node1\n    environment:\n      URL: https://node1.example.com/\n"
        );
    }

    #[test]
    fn test_render_without_placeholders_is_identity() {
        let template = "services:\n web:\n image: nginx\n ports:\n - \"8080:80\"";
        assert_eq!(render(template, &facts()).unwrap(), template);
    }

    #[test]
    fn test_render_is_deterministic() {
        let template = "{{ hostname }}-{{ fqdn }}-{{ hostname }}";
        let first = render(template, &facts()).unwrap();
        let second = render(template, &facts()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, "node1-node1.example.com-node1");
    }

    #[test]
    fn test_render_keeps_shell_style_variables() {
        let template = "image: nginx:${TAG:-latest}";
        assert_eq!(render(template, &facts()).unwrap(), template);
    }

    #[test]
    fn test_unknown_placeholder_is_rejected() {
        let err = render("a: {{ domain }}", &facts()).unwrap_err();
        assert_eq!(
            err,
            TemplateError::UnknownPlaceholder {
                name: "domain".to_string(),
                offset: 3
            }
        );
    }

    #[test]
    fn test_unterminated_placeholder_is_rejected() {
        let err = render("a: {{ hostname", &facts()).unwrap_err();
        assert!(matches!(err, TemplateError::Malformed { offset: 3, .. }));
    }

    #[test]
    fn test_stray_closing_delimiters_are_literal_text() {
        assert_eq!(
            render("a: {{ hostname }} }}", &facts()).unwrap(),
            "a: node1 }}"
        );

        let template = "command: echo }}\nlabels:\n  note: \"50%} #}\"\n";
        assert_eq!(render(template, &facts()).unwrap(), template);
    }

    #[test]
    fn test_expressions_are_rejected() {
        let err = render("a: {{ hostname | upper }}", &facts()).unwrap_err();
        assert!(matches!(err, TemplateError::Malformed { .. }));

        let err = render("{% if x %}a{% endif %}", &facts()).unwrap_err();
        assert!(matches!(err, TemplateError::Malformed { offset: 0, .. }));
    }
}
