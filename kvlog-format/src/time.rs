/// A UTC offset in effect for a span of a stream, in seconds east of UTC.
///
/// Streams open at offset zero; a UTC offset change unit replaces the
/// current offset for all subsequent log events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UtcOffset(i64);

impl UtcOffset {
    pub fn new(seconds: i64) -> UtcOffset {
        UtcOffset(seconds)
    }

    pub fn as_seconds(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for UtcOffset {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}s", self.0)
    }
}
