//! Live output sinks.

/// Receives remote output lines as they are produced when live logging is on.
pub trait OutputSink {
    /// Emits one decoded, right-trimmed chunk of remote output.
    fn emit(&self, line: &str);
}

/// Sink that forwards every chunk to `tracing` at debug level.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl OutputSink for TracingSink {
    fn emit(&self, line: &str) {
        tracing::debug!(target: "stevedore::output", "{line}");
    }
}

impl<S: OutputSink + ?Sized> OutputSink for &S {
    fn emit(&self, line: &str) {
        (**self).emit(line);
    }
}

/// Decodes a raw output chunk the way live logging presents it: lossily, with
/// trailing whitespace removed.
#[must_use]
pub fn render_chunk(chunk: &[u8]) -> String {
    String::from_utf8_lossy(chunk).trim_end().to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(b"ready\n".as_slice(), "ready")]
    #[case(b"  indented \t\r\n".as_slice(), "  indented")]
    #[case(&[0xc3, 0x28, b'x'], "\u{FFFD}(x")]
    #[case(&[0xff], "\u{FFFD}")]
    fn chunks_are_decoded_lossily_and_right_trimmed(#[case] chunk: &[u8], #[case] expected: &str) {
        assert_eq!(render_chunk(chunk), expected);
    }
}
