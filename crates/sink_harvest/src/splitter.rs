use crate::config::SplitterConfig;

/// Unterminated tail of the data seen so far, waiting for its terminator.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct CarryFragment(Vec<u8>);

impl CarryFragment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl From<&[u8]> for CarryFragment {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<Vec<u8>> for CarryFragment {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// Splits raw chunks into terminator-delimited records.
///
/// The splitter keeps no history. All state between calls lives in the [`CarryFragment`] the
/// caller threads through [`split`](Self::split), so any valid carry is a valid restart point.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineSplitter {
    config: SplitterConfig,
}

impl LineSplitter {
    pub fn new(config: SplitterConfig) -> Self {
        Self { config }
    }

    pub fn terminator(&self) -> u8 {
        self.config.terminator
    }

    /// Returns the complete records found in `carry + chunk` and the new carry.
    ///
    /// Records are returned without their terminator.
    pub fn split(&self, chunk: &[u8], carry: CarryFragment) -> (Vec<Vec<u8>>, CarryFragment) {
        if chunk.is_empty() {
            return (Vec::new(), carry);
        }

        let terminator = self.config.terminator;
        let mut records = Vec::new();
        let mut pending = carry.into_bytes();
        let mut pos = 0;

        while let Some(idx) = chunk[pos..].iter().position(|b| *b == terminator) {
            let segment = &chunk[pos..pos + idx];
            let record = if pending.is_empty() {
                segment.to_vec()
            } else {
                let mut record = std::mem::take(&mut pending);
                record.extend_from_slice(segment);
                record
            };
            records.push(self.finish(record));
            pos += idx + 1;
        }

        pending.extend_from_slice(&chunk[pos..]);
        (records, CarryFragment(pending))
    }

    fn finish(&self, mut record: Vec<u8>) -> Vec<u8> {
        if self.config.strip_carriage_return && record.last() == Some(&b'\r') {
            record.pop();
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn splitter() -> LineSplitter {
        LineSplitter::default()
    }

    fn texts(records: &[Vec<u8>]) -> Vec<&str> {
        records
            .iter()
            .map(|r| std::str::from_utf8(r).unwrap())
            .collect()
    }

    #[test]
    fn empty_chunk_returns_carry_untouched() {
        let (records, carry) = splitter().split(b"", CarryFragment::from(&b"half"[..]));
        assert!(records.is_empty());
        assert_eq!(carry.as_bytes(), b"half");
    }

    #[test]
    fn lone_terminator_completes_the_carry() {
        let (records, carry) = splitter().split(b"\n", CarryFragment::from(&b"tail"[..]));
        assert_eq!(texts(&records), vec!["tail"]);
        assert!(carry.is_empty());
    }

    #[test]
    fn lone_terminator_without_carry_is_an_empty_record() {
        let (records, carry) = splitter().split(b"\n", CarryFragment::new());
        assert_eq!(texts(&records), vec![""]);
        assert!(carry.is_empty());
    }

    #[test]
    fn partial_frame_is_carried_to_the_next_call() {
        let s = splitter();
        let (first, carry) = s.split(b"ab", CarryFragment::new());
        assert!(first.is_empty());
        assert_eq!(carry.as_bytes(), b"ab");

        let (second, carry) = s.split(b"c\n", carry);
        assert_eq!(texts(&second), vec!["abc"]);
        assert!(carry.is_empty());
    }

    #[test]
    fn several_records_and_a_tail() {
        let (records, carry) = splitter().split(b"one\ntwo\n\nthr", CarryFragment::new());
        assert_eq!(texts(&records), vec!["one", "two", ""]);
        assert_eq!(carry.as_bytes(), b"thr");
    }

    #[test]
    fn custom_terminator_and_cr_stripping() {
        let s = LineSplitter::new(SplitterConfig {
            terminator: 0,
            strip_carriage_return: true,
        });
        let (records, carry) = s.split(b"a\r\0b\nc\0d", CarryFragment::new());
        assert_eq!(texts(&records), vec!["a", "b\nc"]);
        assert_eq!(carry.as_bytes(), b"d");
    }

    #[test]
    fn cr_is_kept_by_default() {
        let (records, _) = splitter().split(b"x\r\n", CarryFragment::new());
        assert_eq!(texts(&records), vec!["x\r"]);
    }

    #[test]
    fn any_chunking_reassembles_the_input() {
        let input: &[u8] = b"alpha\nbeta\n\ngamma delta\nepsilon\nunterminated";
        let s = splitter();
        for size in 1..=input.len() {
            let mut carry = CarryFragment::new();
            let mut rebuilt = Vec::new();
            for chunk in input.chunks(size) {
                let (records, next) = s.split(chunk, carry);
                for record in records {
                    rebuilt.extend_from_slice(&record);
                    rebuilt.push(b'\n');
                }
                carry = next;
            }
            rebuilt.extend_from_slice(carry.as_bytes());
            assert_eq!(rebuilt, input, "chunk size {size}");
        }
    }
}
