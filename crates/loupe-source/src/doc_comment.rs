use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static COMMENT_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\*+/$").unwrap());
static COMMENT_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(/\*+|\*+)\s?").unwrap());
static COMMENT_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\*+/$").unwrap());
static ARRAY_OF_TYPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<type>[^\s\[\]<>]+)\[\]$").unwrap());
static TYPE_MAP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^array\s*<\s*(?P<key>[^,\s>]+)\s*,\s*(?P<value>[^>\s]+)\s*>$").unwrap());

/// Properties of a `@param`/`@var`/`@return` type declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDeclaration {
    pub type_name: String,
    /// For array types, the key type.
    pub key: Option<String>,
    /// For array types, the value type.
    pub value: Option<String>,
}

/// A parsed `/** ... */` documentation block.
///
/// The block is normalized into logical lines: decoration is stripped,
/// continuation lines are joined with a single space, and a blank line or
/// a line starting with `@` begins a new entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocComment {
    lines: Vec<String>,
}

impl DocComment {
    pub fn new(text: &str) -> Self {
        let mut lines = Vec::new();
        let mut content = String::new();
        for raw in text.lines() {
            let trimmed = raw.trim();
            if COMMENT_END.is_match(trimmed) || trimmed == "/**" || trimmed == "/*" {
                continue;
            }
            let stripped = COMMENT_PREFIX.replace(trimmed, "");
            let stripped = COMMENT_SUFFIX.replace(&stripped, "");
            let line = stripped.trim();

            if line.is_empty() || line.starts_with('@') {
                if !content.is_empty() {
                    lines.push(std::mem::take(&mut content));
                }
                content = line.to_string();
                continue;
            }

            if !content.is_empty() {
                content.push(' ');
            }
            content.push_str(line);
        }
        if !content.is_empty() {
            lines.push(content);
        }
        DocComment { lines }
    }

    /// All normalized logical lines, tags included.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Contents of every line carrying the given tag, tag prefix removed.
    pub fn tags(&self, name: &str) -> Vec<&str> {
        let prefix = format!("@{}", name);
        self.lines
            .iter()
            .filter_map(|line| {
                let rest = line.strip_prefix(&prefix)?;
                if rest.is_empty() {
                    return Some(rest);
                }
                // `@var` must not match `@variant`.
                let trimmed = rest.trim_start();
                if trimmed.len() == rest.len() {
                    return None;
                }
                Some(trimmed)
            })
            .collect()
    }

    pub fn has_tag(&self, name: &str) -> bool {
        !self.tags(name).is_empty()
    }

    /// Lines which are not tags.
    pub fn text_lines(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter(|line| !line.starts_with('@'))
            .map(String::as_str)
            .collect()
    }

    /// First text line, if any.
    pub fn summary(&self) -> Option<&str> {
        self.text_lines().first().copied()
    }

    /// Text lines after the first one, joined with the given glue.
    pub fn details(&self, glue: &str) -> Option<String> {
        let text = self.text_lines();
        if text.len() < 2 {
            return None;
        }
        Some(text[1..].join(glue))
    }

    /// Classify a type declaration appearing in a tag.
    pub fn type_declaration(declaration: &str) -> TypeDeclaration {
        if let Some(captures) = ARRAY_OF_TYPE.captures(declaration) {
            return TypeDeclaration {
                type_name: "array".to_string(),
                key: Some("integer".to_string()),
                value: Some(captures["type"].to_string()),
            };
        }
        if let Some(captures) = TYPE_MAP.captures(declaration) {
            return TypeDeclaration {
                type_name: "array".to_string(),
                key: Some(captures["key"].to_string()),
                value: Some(captures["value"].to_string()),
            };
        }
        TypeDeclaration {
            type_name: declaration.to_string(),
            key: None,
            value: None,
        }
    }
}

impl fmt::Display for DocComment {
    /// Re-render a canonical block with one blank gutter line between
    /// logical entries.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "/**")?;
        for (i, line) in self.lines.iter().enumerate() {
            if i > 0 {
                writeln!(f, " *")?;
            }
            writeln!(f, " * {}", line)?;
        }
        writeln!(f, " */")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "/**\n * Scope visitor event.\n * Raised when a closing bracket\n * is encountered.\n *\n * @var string\n * @param integer $index Token\n *        index\n */";

    #[test]
    fn continuation_lines_are_joined() {
        let doc = DocComment::new(SAMPLE);
        assert_eq!(
            doc.summary(),
            Some("Scope visitor event. Raised when a closing bracket is encountered.")
        );
        assert_eq!(doc.tags("param"), vec!["integer $index Token index"]);
    }

    #[test]
    fn tag_prefix_must_be_a_whole_word() {
        let doc = DocComment::new("/**\n * @var string\n * @variant other\n */");
        assert_eq!(doc.tags("var"), vec!["string"]);
        assert!(doc.has_tag("variant"));
    }

    #[test]
    fn text_and_details() {
        let doc = DocComment::new("/**\n * Summary.\n *\n * More detail\n *\n * And more.\n */");
        assert_eq!(doc.text_lines().len(), 3);
        assert_eq!(doc.details(" "), Some("More detail And more.".to_string()));
        let single = DocComment::new("/** Only summary */");
        assert_eq!(single.summary(), Some("Only summary"));
        assert_eq!(single.details(" "), None);
    }

    #[test]
    fn type_declarations() {
        let array = DocComment::type_declaration("string[]");
        assert_eq!(array.type_name, "array");
        assert_eq!(array.key.as_deref(), Some("integer"));
        assert_eq!(array.value.as_deref(), Some("string"));

        let map = DocComment::type_declaration("array<string, integer>");
        assert_eq!(map.key.as_deref(), Some("string"));
        assert_eq!(map.value.as_deref(), Some("integer"));

        let plain = DocComment::type_declaration("boolean");
        assert_eq!(plain.type_name, "boolean");
        assert!(plain.key.is_none());
    }

    #[test]
    fn display_round_trips_through_parse() {
        let doc = DocComment::new(SAMPLE);
        let rendered = doc.to_string();
        let reparsed = DocComment::new(&rendered);
        assert_eq!(doc, reparsed);
    }
}
