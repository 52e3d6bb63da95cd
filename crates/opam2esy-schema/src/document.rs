use crate::SchemaError;

/// An opam file split into its top-level fields.
///
/// Field values are kept as raw text (continuation lines included, comments
/// removed) and parsed on demand by [`crate::list`]. Order follows the source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpamDocument {
    fields: Vec<(String, String)>,
}

impl OpamDocument {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Raw text of a field, or `""` when the document does not declare it.
    pub fn get_or_empty(&self, name: &str) -> &str {
        self.get(name).unwrap_or("")
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Match `^[A-Za-z-]+\s*:` and return the field name and the text after the colon.
fn field_start(line: &str) -> Option<(&str, &str)> {
    let name_len = line
        .find(|c: char| !(c.is_ascii_alphabetic() || c == '-'))
        .unwrap_or(line.len());
    if name_len == 0 {
        return None;
    }
    let rest = line[name_len..].trim_start().strip_prefix(':')?;
    Some((&line[..name_len], rest))
}

/// Quote state carried from one line to the next.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Quote {
    #[default]
    Closed,
    Plain,
    Triple,
}

const TRIPLE_QUOTE: &[u8] = b"\"\"\"";

/// Remove a trailing `#` comment, ignoring `#` inside quoted strings.
///
/// `quote` carries the string state across lines so multi-line values
/// (`"""` descriptions) are not cut. A lone `"` inside `"""` is literal.
fn strip_comment<'a>(line: &'a str, quote: &mut Quote) -> &'a str {
    let bytes = line.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let rest = &bytes[i..];
        match *quote {
            Quote::Closed if rest.starts_with(TRIPLE_QUOTE) => {
                *quote = Quote::Triple;
                i += TRIPLE_QUOTE.len();
                continue;
            }
            Quote::Closed if rest[0] == b'"' => *quote = Quote::Plain,
            Quote::Closed if rest[0] == b'#' => return &line[..i],
            Quote::Plain | Quote::Triple if rest[0] == b'\\' => {
                i += 2;
                continue;
            }
            Quote::Plain if rest[0] == b'"' => *quote = Quote::Closed,
            Quote::Triple if rest.starts_with(TRIPLE_QUOTE) => {
                *quote = Quote::Closed;
                i += TRIPLE_QUOTE.len();
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    line
}

/// Split raw opam text into an [`OpamDocument`].
///
/// A line of the form `name:` opens a field; every other line continues the
/// open one. Lines starting with `#` are skipped. A field declared twice, or
/// a string still open at the end of the input, is rejected.
pub fn parse_document(text: &str) -> Result<OpamDocument, SchemaError> {
    let mut doc = OpamDocument::default();
    let mut current: Option<(String, String)> = None;
    let mut quote = Quote::Closed;
    let mut string_opened_at = 0;

    for (lineno, line) in text.lines().enumerate() {
        let in_string = quote != Quote::Closed;
        if !in_string && line.starts_with('#') {
            continue;
        }

        let opens_field = if in_string { None } else { field_start(line) };
        let stripped = strip_comment(line, &mut quote);
        if !in_string && quote != Quote::Closed {
            string_opened_at = lineno + 1;
        }

        if let Some((name, _)) = opens_field {
            if let Some((prev, value)) = current.take() {
                push_field(&mut doc, prev, &value)?;
            }
            let rest = stripped.split_once(':').map_or("", |(_, v)| v);
            current = Some((name.to_owned(), rest.to_owned()));
            continue;
        }

        match current.as_mut() {
            Some((_, value)) => {
                value.push('\n');
                value.push_str(stripped);
            }
            None if stripped.trim().is_empty() => {}
            None => {
                return Err(SchemaError::MalformedField(format!(
                    "line {}: text outside of any field",
                    lineno + 1
                )));
            }
        }
    }

    if quote != Quote::Closed {
        return Err(SchemaError::MalformedField(format!(
            "line {string_opened_at}: unterminated string"
        )));
    }
    if let Some((name, value)) = current {
        push_field(&mut doc, name, &value)?;
    }
    Ok(doc)
}

fn push_field(doc: &mut OpamDocument, name: String, value: &str) -> Result<(), SchemaError> {
    if doc.contains(&name) {
        return Err(SchemaError::DuplicateField(name));
    }
    doc.fields.push((name, value.trim().to_owned()));
    Ok(())
}
