//! Positional `?` placeholders to the `@P1..@Pn` names the TDS RPC layer expects.
//!
//! Question marks inside string literals, quoted or bracketed identifiers and
//! comments are left alone.

/// Statement text rewritten for the driver, with the number of placeholders found.
#[derive(Debug, Clone, PartialEq)]
pub struct Translated {
    pub sql: String,
    pub placeholders: usize,
}

/// Rewrite `?` placeholders starting at `@P1`.
pub fn translate(sql: &str) -> Translated {
    translate_from(sql, 0)
}

/// Rewrite `?` placeholders, numbering them after `offset` (the first becomes `@P{offset+1}`).
pub fn translate_from(sql: &str, offset: usize) -> Translated {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut count = 0;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '?' => {
                count += 1;
                out.push_str("@P");
                out.push_str(&(offset + count).to_string());
            }
            '\'' | '"' => {
                out.push(c);
                copy_quoted(&mut chars, &mut out, c);
            }
            '[' => {
                out.push(c);
                copy_quoted(&mut chars, &mut out, ']');
            }
            '-' if chars.peek() == Some(&'-') => {
                out.push(c);
                for next in chars.by_ref() {
                    out.push(next);
                    if next == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                out.push(c);
                if let Some(star) = chars.next() {
                    out.push(star);
                }
                let mut prev = '\0';
                for next in chars.by_ref() {
                    out.push(next);
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
            }
            _ => out.push(c),
        }
    }

    Translated {
        sql: out,
        placeholders: count,
    }
}

/// Copy up to and including the closing delimiter. A doubled delimiter is an escape.
fn copy_quoted<I>(chars: &mut std::iter::Peekable<I>, out: &mut String, close: char)
where
    I: Iterator<Item = char>,
{
    while let Some(next) = chars.next() {
        out.push(next);
        if next == close {
            if chars.peek() == Some(&close) {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
                continue;
            }
            return;
        }
    }
}
