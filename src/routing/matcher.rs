//! Route matching logic.
//!
//! # Responsibilities
//! - Parse stored patterns into literal / `{name}` / `{name?}` segments
//! - Match a request path against a pattern, segment by segment
//! - Bind named parameters in declaration order
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - An omitted optional parameter is bound to `None`, never to `""`
//! - No partial matches: leftover request segments reject the route
//! - No regex to guarantee O(n) matching

use std::fmt;

/// One `/`-delimited unit of a route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Required(String),
    Optional(String),
}

impl Segment {
    /// Classify a raw pattern segment.
    pub fn parse(raw: &str) -> Self {
        let inner = raw
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
            .filter(|s| !s.is_empty());

        match inner {
            Some(name) => match name.strip_suffix('?') {
                Some(opt) if !opt.is_empty() => Segment::Optional(opt.to_string()),
                _ => Segment::Required(name.to_string()),
            },
            None => Segment::Literal(raw.to_string()),
        }
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, Segment::Optional(_))
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Literal(s) => f.write_str(s),
            Segment::Required(name) => write!(f, "{{{}}}", name),
            Segment::Optional(name) => write!(f, "{{{}?}}", name),
        }
    }
}

/// Split a path on `/` after trimming separators at both ends.
///
/// An empty path yields no segments. Inner empty segments (`a//b`) are kept.
pub fn split_path(path: &str) -> Vec<&str> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        Vec::new()
    } else {
        trimmed.split('/').collect()
    }
}

/// A parsed route pattern, stored without leading or trailing separators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Parse a pattern. Ordering of optional parameters is not checked here;
    /// see [`PathPattern::first_segment_after_optional`].
    pub fn parse(path: &str) -> Self {
        Self {
            segments: split_path(path).into_iter().map(Segment::parse).collect(),
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Prepend a group prefix. The prefix is trimmed of separators and
    /// ignored when empty.
    pub fn prepend(&mut self, prefix: &str) {
        let head = PathPattern::parse(prefix);
        if head.segments.is_empty() {
            return;
        }
        let mut segments = head.segments;
        segments.append(&mut self.segments);
        self.segments = segments;
    }

    /// Returns the first non-optional segment that follows an optional one.
    ///
    /// Such a segment could only match when the optional value is present,
    /// which makes the parameter effectively required.
    pub fn first_segment_after_optional(&self) -> Option<&Segment> {
        self.segments
            .iter()
            .skip_while(|s| !s.is_optional())
            .find(|s| !s.is_optional())
    }

    /// Match request segments against this pattern.
    ///
    /// Returns the bound parameters on success.
    pub fn matches(&self, request: &[&str]) -> Option<Params> {
        let mut params = Params::default();

        for (i, segment) in self.segments.iter().enumerate() {
            let actual = request.get(i).copied();
            match segment {
                Segment::Optional(name) => params.bind(name, actual.map(str::to_string)),
                Segment::Required(name) => {
                    let value = actual?;
                    params.bind(name, Some(value.to_string()));
                }
                Segment::Literal(lit) => {
                    if actual? != lit.as_str() {
                        return None;
                    }
                }
            }
        }

        if request.len() > self.segments.len() {
            return None;
        }

        Some(params)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("/")?;
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

/// Parameters bound from a request path, in pattern-declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: Vec<(String, Option<String>)>,
}

impl Params {
    /// Bind a value. A repeated name keeps its first position and takes the
    /// latest value.
    fn bind(&mut self, name: &str, value: Option<String>) {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name.to_string(), value)),
        }
    }

    /// Value of a bound parameter. `None` when the name is unknown or the
    /// optional segment was omitted.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| v.as_deref())
    }

    /// Whether the pattern declared this parameter, present or not.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    /// Values in declaration order; omitted optionals are `None`.
    pub fn positional(&self) -> Vec<Option<&str>> {
        self.entries.iter().map(|(_, v)| v.as_deref()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
