//! Template loading and management

use ease_gateway_common::{GeneratorError, Result};
use std::collections::HashMap;
use tera::{Tera, Value};

/// Name of the gateway file template
pub const GATEWAY_TEMPLATE: &str = "gateway.go";

/// Load all templates
pub fn load_templates() -> Result<Tera> {
    let mut tera = Tera::default();

    tera.register_filter("go_quote", go_quote_filter);

    tera.add_raw_template(GATEWAY_TEMPLATE, include_str!("../templates/gateway.go.tera"))
        .map_err(|e| {
            GeneratorError::Generation(format!("Failed to load {} template: {}", GATEWAY_TEMPLATE, e))
        })?;

    Ok(tera)
}

/// Filter to render a string as a Go interpreted string literal
fn go_quote_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    let s = value
        .as_str()
        .ok_or_else(|| tera::Error::msg("go_quote filter expects a string"))?;

    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');

    Ok(Value::String(out))
}
