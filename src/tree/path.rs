use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Segment {
    Key(String),
    Index(usize),
}

impl Segment {
    /// The segment as a map key; indices use their decimal form.
    pub fn key(&self) -> Cow<'_, str> {
        match self {
            Segment::Key(key) => Cow::Borrowed(key),
            Segment::Index(index) => Cow::Owned(index.to_string()),
        }
    }

    fn parse(raw: String) -> Self {
        if is_index(&raw) {
            if let Ok(index) = raw.parse() {
                return Segment::Index(index);
            }
        }
        Segment::Key(raw)
    }
}

fn is_index(raw: &str) -> bool {
    match raw.as_bytes() {
        [] => false,
        [b'0'] => true,
        [b'0', ..] => false,
        bytes => bytes.iter().all(u8::is_ascii_digit),
    }
}

/// A dotted/bracketed path such as `friends[0].name` or `friends.0.name`.
///
/// Equality, ordering and hashing only consider the parsed segments, so both
/// spellings above name the same field. The original spelling is kept for
/// display.
#[derive(Clone, Debug, Default)]
pub struct FieldPath {
    raw: String,
    segments: Vec<Segment>,
}

impl FieldPath {
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let segments = parse_segments(&raw);
        Self { raw, segments }
    }

    pub fn root() -> Self {
        Self::default()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

fn parse_segments(raw: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = raw.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '.' => flush(&mut segments, &mut current),
            '[' => {
                flush(&mut segments, &mut current);
                let quote = chars.next_if(|next| *next == '"' || *next == '\'');
                let mut inner = String::new();
                for next in chars.by_ref() {
                    match quote {
                        Some(quote) if next == quote => break,
                        None if next == ']' => break,
                        _ => inner.push(next),
                    }
                }
                if quote.is_some() {
                    chars.next_if_eq(&']');
                    segments.push(Segment::Key(inner));
                } else {
                    segments.push(Segment::parse(inner));
                }
            }
            ']' => {}
            _ => current.push(ch),
        }
    }
    flush(&mut segments, &mut current);
    segments
}

fn flush(segments: &mut Vec<Segment>, current: &mut String) {
    if !current.is_empty() {
        segments.push(Segment::parse(std::mem::take(current)));
    }
}

impl PartialEq for FieldPath {
    fn eq(&self, other: &Self) -> bool {
        self.segments == other.segments
    }
}

impl Eq for FieldPath {}

impl PartialOrd for FieldPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FieldPath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.segments.cmp(&other.segments)
    }
}

impl Hash for FieldPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.segments.hash(state);
    }
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for FieldPath {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl From<String> for FieldPath {
    fn from(value: String) -> Self {
        Self::parse(value)
    }
}

impl From<&String> for FieldPath {
    fn from(value: &String) -> Self {
        Self::parse(value.as_str())
    }
}

impl From<&FieldPath> for FieldPath {
    fn from(value: &FieldPath) -> Self {
        value.clone()
    }
}
