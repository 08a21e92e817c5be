//! Field access for `code:field2:field3…` lines. Fields are 1-based.

pub const FIELD_SEPARATOR: char = ':';

#[derive(Debug, Clone, Copy)]
pub struct Fields<'a> {
    line: &'a str,
}

impl<'a> Fields<'a> {
    pub fn new(line: &'a str) -> Self {
        Self { line }
    }

    pub fn count(&self) -> usize {
        self.line.split(FIELD_SEPARATOR).count()
    }

    /// Field `n` (1-based), `None` when absent.
    pub fn get(&self, n: usize) -> Option<&'a str> {
        n.checked_sub(1)
            .and_then(|i| self.line.split(FIELD_SEPARATOR).nth(i))
    }

    /// Field `n` or `""`.
    pub fn str(&self, n: usize) -> &'a str {
        self.get(n).unwrap_or("")
    }

    /// First character of field `n`.
    pub fn char(&self, n: usize) -> Option<char> {
        self.get(n).and_then(|f| f.chars().next())
    }

    pub fn is_num(&self, n: usize) -> bool {
        self.get(n).is_some_and(is_num)
    }

    /// Integer value of field `n`; 0 when the field is absent or not numeric.
    pub fn int(&self, n: usize) -> i32 {
        self.get(n).filter(|f| is_num(f)).map_or(0, leading_int)
    }
}

/// Non-empty and made only of digits, `+`, `-` and `.`.
pub fn is_num(s: &str) -> bool {
    !s.is_empty()
        && s
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.'))
}

/// Parse an optional sign followed by digits, stopping at the first other
/// byte (`"12.7"` → 12, `"-"` → 0). Saturates instead of overflowing.
pub fn leading_int(s: &str) -> i32 {
    let bytes = s.as_bytes();
    let (negative, digits) = match bytes.first() {
        Some(b'-') => (true, &bytes[1..]),
        Some(b'+') => (false, &bytes[1..]),
        _ => (false, bytes),
    };
    let mut value: i32 = 0;
    for &b in digits.iter().take_while(|b| b.is_ascii_digit()) {
        value = value.saturating_mul(10).saturating_add(i32::from(b - b'0'));
    }
    if negative { -value } else { value }
}
