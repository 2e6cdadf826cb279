use crate::error::ServiceError;
use std::fmt;
use std::sync::Arc;

/// Hierarchical, dot-separated service name such as `dhub.deployment.unit."app.war"`.
///
/// Segments that are not plain identifiers are quoted in the canonical form, so
/// a segment may itself contain dots.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServiceName {
    segments: Arc<[String]>,
}

impl ServiceName {
    /// Builds a name from its segments.
    pub fn of<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { segments: segments.into_iter().map(Into::into).collect() }
    }

    /// Parses a canonical name.
    ///
    /// # Errors
    /// Returns [`ServiceError::InvalidName`] for empty input, empty segments or
    /// an unterminated quote.
    pub fn parse(raw: &str) -> Result<Self, ServiceError> {
        let invalid = |reason: &'static str| ServiceError::InvalidName {
            message: reason.into(),
            context: Some(raw.to_owned().into()),
        };

        let mut segments = Vec::new();
        let mut chars = raw.chars().peekable();
        loop {
            let mut segment = String::new();
            if chars.peek() == Some(&'"') {
                chars.next();
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => segment.push(chars.next().ok_or_else(|| invalid("dangling escape"))?),
                        Some(c) => segment.push(c),
                        None => return Err(invalid("unterminated quote")),
                    }
                }
                if !matches!(chars.peek(), None | Some('.')) {
                    return Err(invalid("unexpected character after quoted segment"));
                }
            } else {
                while let Some(&c) = chars.peek() {
                    if c == '.' {
                        break;
                    }
                    if c == '"' {
                        return Err(invalid("quote inside unquoted segment"));
                    }
                    segment.push(c);
                    chars.next();
                }
            }

            if segment.is_empty() {
                return Err(invalid("empty segment"));
            }
            segments.push(segment);

            if chars.next().is_none() {
                break;
            }
        }

        Ok(Self { segments: segments.into() })
    }

    /// Returns a child name with `segment` appended.
    #[must_use]
    pub fn append(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.to_vec();
        segments.push(segment.into());
        Self { segments: segments.into() }
    }

    /// The enclosing name, `None` for a single-segment name.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        match self.segments.len() {
            0 | 1 => None,
            n => Some(Self { segments: self.segments[..n - 1].into() }),
        }
    }

    /// True when `other` lies strictly below this name.
    #[must_use]
    pub fn is_parent_of(&self, other: &Self) -> bool {
        other.segments.len() > self.segments.len() && other.segments.starts_with(&self.segments)
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    #[must_use]
    pub fn simple_name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    #[must_use]
    pub fn canonical_name(&self) -> String {
        self.to_string()
    }
}

fn is_plain(segment: &str) -> bool {
    !segment.is_empty()
        && segment.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '$'))
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            if is_plain(segment) {
                f.write_str(segment)?;
            } else {
                f.write_str("\"")?;
                for c in segment.chars() {
                    if matches!(c, '"' | '\\') {
                        f.write_str("\\")?;
                    }
                    write!(f, "{c}")?;
                }
                f.write_str("\"")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceName({self})")
    }
}
