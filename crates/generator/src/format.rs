//! Cleanup and sanity checks for emitted Go source

use ease_gateway_common::{GeneratorError, Result};

/// Strips trailing whitespace, collapses runs of blank lines and checks
/// that brackets are balanced outside of literals and comments.
pub fn tidy(file: &str, source: &str) -> Result<String> {
    check_balanced(source).map_err(|reason| GeneratorError::Emission {
        file: file.to_string(),
        reason,
    })?;

    let mut out = String::with_capacity(source.len());
    let mut blank = 0;
    for line in source.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            blank += 1;
            if blank > 1 {
                continue;
            }
        } else {
            blank = 0;
        }
        out.push_str(line);
        out.push('\n');
    }

    let trimmed = out.trim_matches('\n');
    if trimmed.is_empty() {
        return Err(GeneratorError::Emission {
            file: file.to_string(),
            reason: "empty output".to_string(),
        });
    }
    Ok(format!("{}\n", trimmed))
}

fn check_balanced(source: &str) -> std::result::Result<(), String> {
    let mut stack = Vec::new();
    let mut chars = source.chars().peekable();
    let mut line = 1;

    while let Some(c) = chars.next() {
        match c {
            '\n' => line += 1,
            '/' if chars.peek() == Some(&'/') => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        line += 1;
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = ' ';
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '\n' {
                        line += 1;
                    }
                    if prev == '*' && c == '/' {
                        closed = true;
                        break;
                    }
                    prev = c;
                }
                if !closed {
                    return Err(format!("unterminated comment at line {}", line));
                }
            }
            '"' | '\'' => {
                let mut escaped = false;
                let mut closed = false;
                for d in chars.by_ref() {
                    if d == '\n' {
                        return Err(format!("unterminated literal at line {}", line));
                    }
                    if escaped {
                        escaped = false;
                    } else if d == '\\' {
                        escaped = true;
                    } else if d == c {
                        closed = true;
                        break;
                    }
                }
                if !closed {
                    return Err(format!("unterminated literal at line {}", line));
                }
            }
            '`' => {
                let mut closed = false;
                for d in chars.by_ref() {
                    if d == '\n' {
                        line += 1;
                    }
                    if d == '`' {
                        closed = true;
                        break;
                    }
                }
                if !closed {
                    return Err(format!("unterminated raw string at line {}", line));
                }
            }
            '(' | '[' | '{' => stack.push((c, line)),
            ')' | ']' | '}' => {
                let expected = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                match stack.pop() {
                    Some((open, _)) if open == expected => {}
                    Some((open, at)) => {
                        return Err(format!(
                            "mismatched {:?} at line {} closes {:?} from line {}",
                            c, line, open, at
                        ))
                    }
                    None => return Err(format!("unexpected {:?} at line {}", c, line)),
                }
            }
            _ => {}
        }
    }

    match stack.pop() {
        Some((open, at)) => Err(format!("unclosed {:?} from line {}", open, at)),
        None => Ok(()),
    }
}
