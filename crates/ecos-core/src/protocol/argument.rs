// ── Argument decoding ──
//
// One `name[param, param]` token, as found in entry lines and inside
// command parentheses. Quoted parameters may carry commas, brackets and
// whitespace.

use std::fmt;

/// A decoded `name[params]` token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    name: String,
    parameters: Vec<String>,
    was_quoted: bool,
}

impl Argument {
    /// Build an argument for an outgoing command.
    pub fn new<I, S>(name: impl Into<String>, parameters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            parameters: parameters.into_iter().map(Into::into).collect(),
            was_quoted: false,
        }
    }

    /// A bare argument without brackets, e.g. `view` or `control`.
    pub fn flag(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            was_quoted: false,
        }
    }

    /// A single-parameter argument whose value is always quoted on the wire.
    pub fn quoted(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: vec![value.into()],
            was_quoted: true,
        }
    }

    /// Decode a single token. Returns `None` for malformed input: empty
    /// name, missing `]`, trailing text after `]` or an unterminated quote.
    pub fn parse(token: &str, keep_quotes: bool) -> Option<Self> {
        let token = token.trim();
        if token.is_empty() {
            return None;
        }

        let Some(open) = token.find('[') else {
            if token.contains(']') {
                return None;
            }
            return Some(Self::flag(token));
        };

        let name = token[..open].trim();
        if name.is_empty() {
            return None;
        }

        let rest = &token[open + 1..];
        let close = rest.rfind(']')?;
        if !rest[close + 1..].trim().is_empty() {
            return None;
        }

        let (parameters, was_quoted) = split_parameters(&rest[..close], keep_quotes)?;

        Some(Self {
            name: name.to_owned(),
            parameters,
            was_quoted,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    pub fn was_quoted(&self) -> bool {
        self.was_quoted
    }

    /// Case-insensitive name comparison, the way the station spells
    /// keywords inconsistently (`ProtocolVersion` vs `protocolversion`).
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    pub fn parameter(&self, index: usize) -> Option<&str> {
        self.parameters.get(index).map(String::as_str)
    }

    pub fn first(&self) -> Option<&str> {
        self.parameter(0)
    }

    /// Parameter `index` parsed as an integer.
    pub fn int(&self, index: usize) -> Option<i32> {
        self.parameter(index)?.trim().parse().ok()
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if self.parameters.is_empty() {
            return Ok(());
        }

        f.write_str("[")?;
        for (i, param) in self.parameters.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            let already_quoted = param.len() >= 2 && param.starts_with('"') && param.ends_with('"');
            if !already_quoted && (self.was_quoted || needs_quotes(param)) {
                write!(f, "\"{param}\"")?;
            } else {
                f.write_str(param)?;
            }
        }
        f.write_str("]")
    }
}

/// Split a line remainder into argument tokens.
///
/// Separators are whitespace and commas, but only outside brackets and
/// quotes: `name["18 527 DRG"] func[0, 1]` yields two tokens.
pub fn tokenize(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut depth = 0usize;
    let mut in_quotes = false;
    let mut start: Option<usize> = None;

    for (i, c) in text.char_indices() {
        let separator = !in_quotes && depth == 0 && (c.is_whitespace() || c == ',');
        if separator {
            if let Some(s) = start.take() {
                tokens.push(&text[s..i]);
            }
            continue;
        }

        if start.is_none() {
            start = Some(i);
        }

        match c {
            '"' => in_quotes = !in_quotes,
            '[' if !in_quotes => depth += 1,
            ']' if !in_quotes => depth = depth.saturating_sub(1),
            _ => {}
        }
    }

    if let Some(s) = start {
        tokens.push(&text[s..]);
    }

    tokens
}

/// Decode every token of `text`, skipping the malformed ones.
pub fn parse_arguments(text: &str, keep_quotes: bool) -> Vec<Argument> {
    tokenize(text)
        .into_iter()
        .filter_map(|token| {
            let arg = Argument::parse(token, keep_quotes);
            if arg.is_none() {
                tracing::trace!(token, "skipping malformed argument");
            }
            arg
        })
        .collect()
}

fn split_parameters(body: &str, keep_quotes: bool) -> Option<(Vec<String>, bool)> {
    if body.trim().is_empty() {
        return Some((Vec::new(), false));
    }

    let mut params = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut was_quoted = false;

    for c in body.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                was_quoted = true;
                current.push(c);
            }
            ',' if !in_quotes => {
                params.push(finish_parameter(&current, keep_quotes));
                current.clear();
            }
            _ => current.push(c),
        }
    }

    if in_quotes {
        return None;
    }
    params.push(finish_parameter(&current, keep_quotes));

    Some((params, was_quoted))
}

fn finish_parameter(raw: &str, keep_quotes: bool) -> String {
    let trimmed = raw.trim();
    if keep_quotes {
        return trimmed.to_owned();
    }
    trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed)
        .to_owned()
}

fn needs_quotes(param: &str) -> bool {
    param
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, ',' | '[' | ']'))
}
