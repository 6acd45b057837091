//! Terminal styling for rendered field values.

/// Escape sequences for each role a rendered value can play.
///
/// Every sequence is empty when styling is off, so renderers can write them
/// unconditionally.
#[derive(Clone, Copy, Debug, Default)]
pub struct Colors {
    /// Field names and object keys.
    pub key: &'static str,
    /// Text and serialized markup.
    pub string: &'static str,
    /// Brackets, separators and nulls.
    pub muted: &'static str,
    pub reset: &'static str,
}

impl Colors {
    pub const ON: Self = Self {
        key: "\x1b[34m",
        string: "\x1b[32m",
        muted: "\x1b[2m",
        reset: "\x1b[0m",
    };

    pub const OFF: Self = Self {
        key: "",
        string: "",
        muted: "",
        reset: "",
    };

    pub fn new(enabled: bool) -> Self {
        if enabled { Self::ON } else { Self::OFF }
    }

    /// Append `text` to `out` wrapped in `style`.
    pub fn paint(&self, out: &mut String, style: &str, text: &str) {
        out.push_str(style);
        out.push_str(text);
        out.push_str(self.reset);
    }
}
