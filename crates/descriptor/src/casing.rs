//! Go identifier casing, as produced by protoc-gen-go

/// Converts a snake_case proto identifier into the CamelCase name used
/// by protoc-gen-go.
///
/// A leading underscore becomes `X`, an underscore followed by a lower
/// case letter is dropped and the letter upper cased, digits are kept.
pub fn camel(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = String::with_capacity(bytes.len() + 1);
    let mut i = 0;

    if bytes.first() == Some(&b'_') {
        out.push('X');
        i = 1;
    }

    while i < bytes.len() {
        let c = bytes[i];
        if c == b'_' && i + 1 < bytes.len() && bytes[i + 1].is_ascii_lowercase() {
            i += 1;
            continue;
        }
        if c.is_ascii_digit() {
            out.push(c as char);
            i += 1;
            continue;
        }
        out.push(c.to_ascii_uppercase() as char);
        while i + 1 < bytes.len() && bytes[i + 1].is_ascii_lowercase() {
            i += 1;
            out.push(bytes[i] as char);
        }
        i += 1;
    }

    out
}
