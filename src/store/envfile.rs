// ABOUTME: KEY=value environment file codec.
// ABOUTME: Edits keep comments, unmanaged lines, and the exact bytes of untouched entries.

#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    Entry {
        key: String,
        value: String,
        raw: String,
    },
    Other(String),
}

/// A parsed environment file that renders back to its original bytes unless edited.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EnvFile {
    lines: Vec<Line>,
    trailing_newline: bool,
}

impl EnvFile {
    pub fn parse(text: &str) -> Self {
        if text.is_empty() {
            return Self::default();
        }

        let trailing_newline = text.ends_with('\n');
        let body = text.strip_suffix('\n').unwrap_or(text);
        let lines = body.split('\n').map(parse_line).collect();

        Self {
            lines,
            trailing_newline,
        }
    }

    /// Value of `key`. When a key repeats, the last occurrence wins.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.lines.iter().rev().find_map(|line| match line {
            Line::Entry { key: k, value, .. } if k == key => Some(value.as_str()),
            _ => None,
        })
    }

    /// Set `key` to `value`. Returns true if the rendered file changed.
    pub fn set(&mut self, key: &str, value: &str) -> bool {
        let position = self
            .lines
            .iter()
            .rposition(|line| matches!(line, Line::Entry { key: k, .. } if k == key));

        let Some(index) = position else {
            self.lines.push(Line::Entry {
                key: key.to_string(),
                value: value.to_string(),
                raw: render_entry(key, value),
            });
            self.trailing_newline = true;
            return true;
        };

        match &mut self.lines[index] {
            Line::Entry { value: current, .. } if current.as_str() == value => false,
            Line::Entry {
                value: current,
                raw,
                ..
            } => {
                *current = value.to_string();
                *raw = render_entry(key, value);
                true
            }
            Line::Other(_) => false,
        }
    }

    /// Drop every entry for `key`. Returns true if the rendered file changed.
    pub fn remove(&mut self, key: &str) -> bool {
        let before = self.lines.len();
        self.lines
            .retain(|line| !matches!(line, Line::Entry { key: k, .. } if k == key));
        self.lines.len() != before
    }

    pub fn render(&self) -> String {
        let mut out = self
            .lines
            .iter()
            .map(|line| match line {
                Line::Entry { raw, .. } => raw.as_str(),
                Line::Other(raw) => raw.as_str(),
            })
            .collect::<Vec<_>>()
            .join("\n");
        if self.trailing_newline && !self.lines.is_empty() {
            out.push('\n');
        }
        out
    }
}

fn parse_line(raw: &str) -> Line {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Line::Other(raw.to_string());
    }

    let assignment = trimmed.strip_prefix("export ").unwrap_or(trimmed);
    let Some((key, value)) = assignment.split_once('=') else {
        return Line::Other(raw.to_string());
    };

    let key = key.trim();
    if key.is_empty() || key.contains(char::is_whitespace) {
        return Line::Other(raw.to_string());
    }

    Line::Entry {
        key: key.to_string(),
        value: unquote(value.trim()).to_string(),
        raw: raw.to_string(),
    }
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

fn render_entry(key: &str, value: &str) -> String {
    if value.is_empty() || value.chars().any(|c| c.is_whitespace() || c == '#' || c == '"') {
        format!("{}='{}'", key, value)
    } else {
        format!("{}={}", key, value)
    }
}
