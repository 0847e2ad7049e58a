use std::fmt;

use tracing::warn;

/// One delimited message harvested from a sink, terminator stripped.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Record {
    /// 1-based position of the record in the sink.
    pub line_number: usize,
    pub text: String,
}

impl Record {
    pub(crate) fn decode(line_number: usize, bytes: Vec<u8>) -> Self {
        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(err) => {
                warn!(line_number, "record is not valid UTF-8; decoding lossily");
                String::from_utf8_lossy(err.as_bytes()).into_owned()
            }
        };
        Self { line_number, text }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl PartialEq<str> for Record {
    fn eq(&self, other: &str) -> bool {
        self.text == other
    }
}

impl PartialEq<&str> for Record {
    fn eq(&self, other: &&str) -> bool {
        self.text == *other
    }
}
