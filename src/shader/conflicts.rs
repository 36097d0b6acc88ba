//! Top-level identifier collision detection and renaming for GLSL fragments.
//!
//! Several independently written fragments end up in one translation unit, so
//! every name a fragment defines at global scope (functions, initialized
//! globals, `#define` macros) is suffixed with the pass instance index.
//! Identifiers inside `{ ... }` are local and left alone.

const QUALIFIERS: [&str; 7] = [
    "attribute", "const", "highp", "lowp", "mediump", "uniform", "varying",
];

const BUILTIN_MACROS: [&str; 5] = [
    "__LINE__",
    "__FILE__",
    "__VERSION__",
    "GL_core_profile",
    "GL_compatibility_profile",
];

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn is_ident_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

fn ident_end(bytes: &[u8], start: usize) -> usize {
    let mut i = start;
    while i < bytes.len() && is_ident_char(bytes[i]) {
        i += 1;
    }
    i
}

/// End of a numeric literal such as `2.0`, `1e5` or `0.5f`.
fn number_end(bytes: &[u8], start: usize) -> usize {
    let mut i = start;
    while i < bytes.len() && (is_ident_char(bytes[i]) || bytes[i] == b'.') {
        i += 1;
    }
    i
}

fn skip_spaces(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && (bytes[i] == b' ' || bytes[i] == b'\t') {
        i += 1;
    }
    i
}

/// Index of the newline ending a preprocessor line, honouring `\` continuations.
fn preprocessor_line_end(bytes: &[u8], mut i: usize) -> usize {
    let mut continued = false;
    while i < bytes.len() {
        match bytes[i] {
            b'\n' if continued => continued = false,
            b'\n' => break,
            b'\\' => continued = true,
            b'\r' | b' ' | b'\t' => {}
            _ => continued = false,
        }
        i += 1;
    }
    i
}

/// Index just past a comment starting at `i`, or `None` if there is none.
fn skip_comment(bytes: &[u8], i: usize) -> Option<usize> {
    if bytes[i] != b'/' {
        return None;
    }
    match bytes.get(i + 1) {
        Some(b'/') => {
            let mut j = i + 2;
            while j < bytes.len() && bytes[j] != b'\n' {
                j += 1;
            }
            Some(j)
        }
        Some(b'*') => {
            let mut j = i + 2;
            while j + 1 < bytes.len() && !(bytes[j] == b'*' && bytes[j + 1] == b'/') {
                j += 1;
            }
            Some((j + 2).min(bytes.len()))
        }
        _ => None,
    }
}

fn push_unique(conflicts: &mut Vec<String>, name: &str) {
    if !name.is_empty() && !conflicts.iter().any(|c| c == name) {
        conflicts.push(name.to_string());
    }
}

/// Names defined at global scope, longest first.
pub fn find_global_conflicts(source: &str) -> Vec<String> {
    let bytes = source.as_bytes();
    let mut conflicts = Vec::new();
    let mut depth = 0usize;
    let mut parens = 0usize;
    let mut last_identifier = "";

    let mut i = 0;
    while i < bytes.len() {
        if let Some(next) = skip_comment(bytes, i) {
            i = next;
            continue;
        }

        let c = bytes[i];
        if depth > 0 {
            match c {
                b'{' => depth += 1,
                b'}' => depth -= 1,
                _ => {}
            }
            i += 1;
            continue;
        }

        if is_ident_start(c) {
            let end = ident_end(bytes, i);
            let identifier = &source[i..end];
            if !QUALIFIERS.contains(&identifier) && !BUILTIN_MACROS.contains(&identifier) {
                last_identifier = identifier;
            }
            i = end;
            continue;
        }
        if c.is_ascii_digit() {
            i = number_end(bytes, i);
            continue;
        }

        match c {
            b'#' => {
                let start = skip_spaces(bytes, i + 1);
                let end = ident_end(bytes, start);
                if &source[start..end] == "define" {
                    let name_start = skip_spaces(bytes, end);
                    let name_end = ident_end(bytes, name_start);
                    push_unique(&mut conflicts, &source[name_start..name_end]);
                }
                i = preprocessor_line_end(bytes, end);
                continue;
            }
            b'{' => depth += 1,
            b'(' => {
                if parens == 0 && last_identifier != "layout" {
                    push_unique(&mut conflicts, last_identifier);
                }
                parens += 1;
            }
            b')' => parens = parens.saturating_sub(1),
            b'=' if parens == 0 => {
                push_unique(&mut conflicts, last_identifier);
                while i < bytes.len() && bytes[i] != b';' {
                    i += 1;
                }
            }
            _ => {}
        }
        i += 1;
    }

    conflicts.sort_by(|a, b| b.len().cmp(&a.len()));
    conflicts
}

/// Replace every whole-identifier occurrence of `from` with `to`.
///
/// Numeric literal suffixes (`2.0f`) are not identifiers and stay untouched.
pub fn replace_identifier(text: &str, from: &str, to: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if c.is_ascii_digit() {
            i = number_end(bytes, i);
        } else if is_ident_start(c) {
            let end = ident_end(bytes, i);
            if &text[i..end] == from {
                out.push_str(&text[copied..i]);
                out.push_str(to);
                copied = end;
            }
            i = end;
        } else {
            i += 1;
        }
    }
    out.push_str(&text[copied..]);
    out
}

fn placeholder(position: usize) -> String {
    format!("_{position}_RENAME_PENDING_{position}_")
}

/// Suffix every conflicting identifier with `_{instance_index}`.
///
/// Each name is first swapped for a placeholder unique to its position in
/// `conflicts`, then all placeholders are resolved, so a rename never feeds
/// into a later one.
pub fn rewrite(source: &str, conflicts: &[String], instance_index: u32) -> String {
    let mut text = source.to_string();
    for (i, identifier) in conflicts.iter().enumerate() {
        text = replace_identifier(&text, identifier, &placeholder(i));
    }
    for (i, identifier) in conflicts.iter().enumerate() {
        text = replace_identifier(&text, &placeholder(i), &format!("{identifier}_{instance_index}"));
    }
    text
}
