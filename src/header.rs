use std::fmt;

/// Value of a single header card.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl HeaderValue {
    /// Parse the value field of a card (the text after `= `, comment already removed).
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
            let inner = raw[1..raw.len() - 1].replace("''", "'");
            return HeaderValue::Str(inner.trim_end().to_string());
        }
        match raw {
            "T" => return HeaderValue::Bool(true),
            "F" => return HeaderValue::Bool(false),
            _ => {}
        }
        if let Ok(i) = raw.parse::<i64>() {
            return HeaderValue::Int(i);
        }
        // FORTRAN-style exponents show up in older instrument headers
        if let Ok(f) = raw.replace(['D', 'd'], "E").parse::<f64>() {
            return HeaderValue::Float(f);
        }
        HeaderValue::Str(raw.to_string())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HeaderValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view of the value. Numeric strings are accepted as well.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HeaderValue::Int(i) => Some(*i as f64),
            HeaderValue::Float(f) => Some(*f),
            HeaderValue::Str(s) => s.trim().parse::<f64>().ok(),
            HeaderValue::Bool(_) => None,
        }
    }
}

impl fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderValue::Str(s) => write!(f, "{s}"),
            HeaderValue::Int(i) => write!(f, "{i}"),
            HeaderValue::Float(v) => write!(f, "{v}"),
            HeaderValue::Bool(b) => write!(f, "{}", if *b { "T" } else { "F" }),
        }
    }
}

/// Header key/value records of one HDU, in file order.
///
/// Keys are stored upper-case. `HIERARCH` cards are stored without the
/// `HIERARCH ` prefix, and lookups accept either spelling, so
/// `"HIERARCH ESO INS FILT1 ID"` and `"ESO INS FILT1 ID"` address the same card.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    cards: Vec<(String, HeaderValue)>,
}

fn normalize_key(key: &str) -> String {
    let key = key.trim();
    let upper = key.to_ascii_uppercase();
    match upper.strip_prefix("HIERARCH ") {
        Some(rest) => rest.trim().to_string(),
        None => upper,
    }
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a card. Replacing keeps the original position.
    pub fn insert(&mut self, key: &str, value: HeaderValue) {
        let key = normalize_key(key);
        match self.cards.iter_mut().find(|(k, _)| *k == key) {
            Some(card) => card.1 = value,
            None => self.cards.push((key, value)),
        }
    }

    /// Builder-style insert, handy for synthetic headers.
    pub fn with(mut self, key: &str, value: impl Into<HeaderValue>) -> Self {
        self.insert(key, value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&HeaderValue> {
        let key = normalize_key(key);
        self.cards.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// String value of `key`. Non-string values are rendered as text.
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).map(|v| v.to_string())
    }

    /// String value of `key`, or the empty string when absent.
    pub fn get_or_empty(&self, key: &str) -> String {
        self.get_string(key).unwrap_or_default()
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(HeaderValue::as_f64)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            HeaderValue::Int(i) => Some(*i),
            HeaderValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            HeaderValue::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderValue)> {
        self.cards.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

impl From<&str> for HeaderValue {
    fn from(s: &str) -> Self {
        HeaderValue::Str(s.to_string())
    }
}

impl From<String> for HeaderValue {
    fn from(s: String) -> Self {
        HeaderValue::Str(s)
    }
}

impl From<i64> for HeaderValue {
    fn from(i: i64) -> Self {
        HeaderValue::Int(i)
    }
}

impl From<f64> for HeaderValue {
    fn from(f: f64) -> Self {
        HeaderValue::Float(f)
    }
}

impl From<bool> for HeaderValue {
    fn from(b: bool) -> Self {
        HeaderValue::Bool(b)
    }
}
