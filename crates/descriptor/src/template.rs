//! HTTP path templates
//!
//! Templates are carried opaquely; the resolver only needs the names of
//! the variables they bind and the optional custom verb. Matching a
//! request path against a template is the gateway runtime's job.

use ease_gateway_common::{GeneratorError, Result};
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

static VARIABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_.]*)(?:=[^{}]*)?\}").expect("invalid variable pattern")
});

/// A parsed path template such as `/v1/{name=shelves/*}/books:publish`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Template {
    /// The template as written in the HTTP rule
    pub template: String,
    /// Custom verb after the last `:`, if any
    pub verb: Option<String>,
    /// Field paths of the variables, in order of appearance
    pub fields: Vec<String>,
}

impl Template {
    pub fn parse(template: &str) -> Result<Self> {
        if !template.starts_with('/') {
            return Err(GeneratorError::Parse(format!(
                "path template must start with '/': {:?}",
                template
            )));
        }

        let mut depth = 0usize;
        for ch in template.chars() {
            match ch {
                '{' if depth == 0 => depth += 1,
                '}' if depth == 1 => depth -= 1,
                '{' | '}' => {
                    return Err(GeneratorError::Parse(format!(
                        "unbalanced braces in path template {:?}",
                        template
                    )))
                }
                _ => {}
            }
        }
        if depth != 0 {
            return Err(GeneratorError::Parse(format!(
                "unterminated variable in path template {:?}",
                template
            )));
        }

        // The verb follows the last segment, outside of any variable.
        let last_segment = template.rsplit('/').next().unwrap_or_default();
        let verb = match last_segment.rfind(':') {
            Some(pos) if !last_segment[pos..].contains('}') => {
                Some(last_segment[pos + 1..].to_string())
            }
            _ => None,
        };

        let fields = VARIABLE
            .captures_iter(template)
            .map(|caps| caps[1].to_string())
            .collect::<Vec<_>>();

        let declared = template.matches('{').count();
        if fields.len() != declared {
            return Err(GeneratorError::Parse(format!(
                "invalid variable in path template {:?}",
                template
            )));
        }

        Ok(Self {
            template: template.to_string(),
            verb,
            fields,
        })
    }
}
