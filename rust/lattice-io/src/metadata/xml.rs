// rust/lattice-io/src/metadata/xml.rs

//! Flat tag/value text codec.
//!
//! Documents look like
//! `<?xml version="1.0" encoding="UTF-8"?><root><tag>value</tag>...</root>`.
//! Decoding counts how often each known tag occurs so callers can reject
//! documents with missing, repeated or unknown tags.

use crate::error::{LatticeError, Result};

/// Longest metadata document accepted.
pub const MAX_XML_LEN: usize = 4096;

pub const XML_PREFIX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Typed value of one tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagValue {
    Str(String),
    Int(i64),
    Char(char),
    Hex32(u32),
    IntList(Vec<i64>),
}

impl TagValue {
    fn render(&self) -> String {
        match self {
            TagValue::Str(s) => escape(s),
            TagValue::Int(i) => i.to_string(),
            TagValue::Char(c) => escape(&c.to_string()),
            TagValue::Hex32(h) => format!("{h:x}"),
            TagValue::IntList(list) => list
                .iter()
                .map(|i| i.to_string())
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    /// Parses `text` as a value of the same kind as `self`.
    fn parse_like(&self, text: &str) -> std::result::Result<TagValue, String> {
        let text = text.trim();
        match self {
            TagValue::Str(_) => Ok(TagValue::Str(unescape(text))),
            TagValue::Int(_) => text
                .parse()
                .map(TagValue::Int)
                .map_err(|_| format!("'{text}' is not an integer")),
            TagValue::Char(_) => {
                let text = unescape(text);
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(TagValue::Char(c)),
                    _ => Err(format!("'{text}' is not a single character")),
                }
            }
            TagValue::Hex32(_) => u32::from_str_radix(text, 16)
                .map(TagValue::Hex32)
                .map_err(|_| format!("'{text}' is not a 32-bit hex value")),
            TagValue::IntList(_) => text
                .split_whitespace()
                .map(|t| t.parse().map_err(|_| format!("'{t}' is not an integer")))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(TagValue::IntList),
        }
    }
}

#[derive(Debug, Clone)]
struct TagEntry {
    name: &'static str,
    value: TagValue,
    occur: u32,
}

/// A fixed set of tags under one root element.
///
/// Errors are raised through the constructor given at creation, so file,
/// record and checksum documents each report their own error kind.
#[derive(Debug, Clone)]
pub struct TagTable {
    root: &'static str,
    entries: Vec<TagEntry>,
    error: fn(String) -> LatticeError,
}

impl TagTable {
    pub fn new(root: &'static str, error: fn(String) -> LatticeError) -> Self {
        Self {
            root,
            entries: Vec::new(),
            error,
        }
    }

    /// Adds a tag. Its value also fixes the type decoding expects.
    pub fn with(mut self, name: &'static str, value: TagValue) -> Self {
        self.entries.push(TagEntry {
            name,
            value,
            occur: 0,
        });
        self
    }

    pub fn get(&self, name: &str) -> Option<&TagValue> {
        self.entries.iter().find(|e| e.name == name).map(|e| &e.value)
    }

    /// How many times `name` was seen by the last decode.
    pub fn occurrences(&self, name: &str) -> u32 {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map_or(0, |e| e.occur)
    }

    pub fn encode(&self) -> Result<String> {
        let mut out = String::with_capacity(256);
        out.push_str(XML_PREFIX);
        out.push_str(&format!("<{}>", self.root));
        for entry in &self.entries {
            out.push_str(&format!(
                "<{0}>{1}</{0}>",
                entry.name,
                entry.value.render()
            ));
        }
        out.push_str(&format!("</{}>", self.root));

        if out.len() > MAX_XML_LEN {
            return Err((self.error)(format!(
                "<{}> document is {} bytes, limit is {MAX_XML_LEN}",
                self.root,
                out.len()
            )));
        }
        Ok(out)
    }

    /// Fills the table from `text`. Every tag must appear exactly once and
    /// no other tag may appear.
    pub fn decode(&mut self, text: &str) -> Result<()> {
        if text.len() > MAX_XML_LEN {
            return Err((self.error)(format!(
                "document is {} bytes, limit is {MAX_XML_LEN}",
                text.len()
            )));
        }
        let pairs = parse_tags(text, self.root).map_err(self.error)?;

        for entry in &mut self.entries {
            entry.occur = 0;
        }
        for (name, body) in pairs {
            let entry = self
                .entries
                .iter_mut()
                .find(|e| e.name == name)
                .ok_or_else(|| (self.error)(format!("unexpected tag <{name}>")))?;
            entry.occur += 1;
            if entry.occur > 1 {
                return Err((self.error)(format!("tag <{name}> appears more than once")));
            }
            entry.value = entry
                .value
                .parse_like(body)
                .map_err(|e| (self.error)(format!("tag <{name}>: {e}")))?;
        }

        if let Some(missing) = self.entries.iter().find(|e| e.occur == 0) {
            return Err((self.error)(format!("missing tag <{}>", missing.name)));
        }
        Ok(())
    }
}

/// Splits `<root><a>x</a><b>y</b></root>` into `[("a", "x"), ("b", "y")]`.
fn parse_tags<'a>(text: &'a str, root: &str) -> std::result::Result<Vec<(&'a str, &'a str)>, String> {
    let mut rest = text.trim_start();
    if rest.starts_with("<?") {
        let end = rest.find("?>").ok_or("unterminated XML declaration")?;
        rest = rest[end + 2..].trim_start();
    }

    let open = format!("<{root}>");
    rest = rest
        .strip_prefix(open.as_str())
        .ok_or_else(|| format!("document does not start with {open}"))?;
    let close = format!("</{root}>");

    let mut pairs = Vec::new();
    loop {
        rest = rest.trim_start();
        if let Some(after) = rest.strip_prefix(close.as_str()) {
            if !after.trim().trim_end_matches('\0').is_empty() {
                return Err(format!("trailing text after {close}"));
            }
            return Ok(pairs);
        }

        let body = rest
            .strip_prefix('<')
            .ok_or_else(|| format!("expected a tag or {close}"))?;
        let name_end = body.find('>').ok_or("unterminated tag")?;
        let name = &body[..name_end];
        if name.is_empty() || name.starts_with('/') || name.contains(char::is_whitespace) {
            return Err(format!("malformed tag <{name}>"));
        }

        let value_start = &body[name_end + 1..];
        let end_tag = format!("</{name}>");
        let value_end = value_start
            .find(end_tag.as_str())
            .ok_or_else(|| format!("missing {end_tag}"))?;

        pairs.push((name, &value_start[..value_end]));
        rest = &value_start[value_end + end_tag.len()..];
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn unescape(s: &str) -> String {
    s.replace("&lt;", "<").replace("&gt;", ">").replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> TagTable {
        TagTable::new("sample", |m| LatticeError::bad_record_info(m))
            .with("name", TagValue::Str(String::new()))
            .with("count", TagValue::Int(0))
            .with("kind", TagValue::Char(' '))
            .with("sum", TagValue::Hex32(0))
            .with("dims", TagValue::IntList(Vec::new()))
    }

    fn filled() -> TagTable {
        TagTable::new("sample", |m| LatticeError::bad_record_info(m))
            .with("name", TagValue::Str("a<b".into()))
            .with("count", TagValue::Int(-3))
            .with("kind", TagValue::Char('F'))
            .with("sum", TagValue::Hex32(0xdead_beef))
            .with("dims", TagValue::IntList(vec![4, 4, 8]))
    }

    #[test]
    fn test_encode_format() {
        let text = filled().encode().unwrap();
        assert_eq!(
            text,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><sample><name>a&lt;b</name>\
             <count>-3</count><kind>F</kind><sum>deadbeef</sum><dims>4 4 8</dims></sample>"
        );
    }

    #[test]
    fn test_decode_fills_values_and_counts() {
        let text = filled().encode().unwrap();
        let mut decoded = table();
        decoded.decode(&text).unwrap();

        assert_eq!(decoded.get("name"), Some(&TagValue::Str("a<b".into())));
        assert_eq!(decoded.get("count"), Some(&TagValue::Int(-3)));
        assert_eq!(decoded.get("kind"), Some(&TagValue::Char('F')));
        assert_eq!(decoded.get("sum"), Some(&TagValue::Hex32(0xdead_beef)));
        assert_eq!(decoded.get("dims"), Some(&TagValue::IntList(vec![4, 4, 8])));
        assert_eq!(decoded.occurrences("dims"), 1);
    }

    #[test]
    fn test_decode_tolerates_whitespace_and_no_prefix() {
        let text = "<sample>\n  <name>x</name>\n  <count> 7 </count>\n  <kind>D</kind>\n  \
                    <sum>1f</sum>\n  <dims> 2  3 </dims>\n</sample>\n";
        let mut decoded = table();
        decoded.decode(text).unwrap();
        assert_eq!(decoded.get("count"), Some(&TagValue::Int(7)));
        assert_eq!(decoded.get("dims"), Some(&TagValue::IntList(vec![2, 3])));
    }

    #[test]
    fn test_missing_duplicate_and_unexpected_tags() {
        let mut t = table();
        let missing = "<sample><name>x</name><count>1</count><kind>F</kind><sum>0</sum></sample>";
        assert!(matches!(
            t.decode(missing),
            Err(LatticeError::BadRecordInfo { message }) if message.contains("<dims>")
        ));

        let duplicate = "<sample><name>x</name><name>y</name></sample>";
        assert!(t.decode(duplicate).is_err());

        let unexpected = "<sample><color>red</color></sample>";
        assert!(t.decode(unexpected).is_err());
    }

    #[test]
    fn test_malformed_documents() {
        let mut t = table();
        assert!(t.decode("<other></other>").is_err());
        assert!(t.decode("<sample><name>x</sample>").is_err());
        assert!(t.decode("<sample><count>many</count></sample>").is_err());
        assert!(t.decode(&"x".repeat(MAX_XML_LEN + 1)).is_err());
    }

    #[test]
    fn test_encode_respects_limit() {
        let t = TagTable::new("big", |m| LatticeError::bad_file_info(m))
            .with("blob", TagValue::Str("y".repeat(MAX_XML_LEN)));
        assert!(matches!(t.encode(), Err(LatticeError::BadFileInfo { .. })));
    }
}
