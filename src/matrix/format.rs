//! JSON rendering styles for matrix documents.

use std::io;

use serde_json::ser::Formatter;

/// How matrix documents are rendered.
///
/// Both styles produce standard, deterministic JSON on a single line per document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JsonStyle {
    /// `,` and `:` separators, one document per line.
    #[default]
    Compact,
    /// `", "` and `": "` separators, documents written back to back with no separator.
    Standard,
}

impl JsonStyle {
    /// Text written between two consecutive top-level documents.
    pub fn root_separator(self) -> &'static str {
        match self {
            Self::Compact => "\n",
            Self::Standard => "",
        }
    }

    fn entry_separator(self) -> &'static [u8] {
        match self {
            Self::Compact => b",",
            Self::Standard => b", ",
        }
    }
}

impl Formatter for JsonStyle {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(self.entry_separator())
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(self.entry_separator())
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        match self {
            Self::Compact => writer.write_all(b":"),
            Self::Standard => writer.write_all(b": "),
        }
    }
}

/// Serialize `value` to a string in the given style.
pub fn to_string_styled<T: serde::Serialize + ?Sized>(
    value: &T,
    style: JsonStyle,
) -> serde_json::Result<String> {
    let mut out = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut out, style);
    value.serialize(&mut ser)?;
    // serde_json only writes valid UTF-8.
    Ok(String::from_utf8_lossy(&out).into_owned())
}

#[cfg(test)]
mod tests {
    use super::{JsonStyle, to_string_styled};
    use serde_json::json;

    #[test]
    fn standard_style_spaces_separators() {
        let v = json!({"a": [1, 2, null], "b": "x"});
        assert_eq!(
            to_string_styled(&v, JsonStyle::Standard).unwrap(),
            r#"{"a": [1, 2, null], "b": "x"}"#
        );
        assert_eq!(
            to_string_styled(&v, JsonStyle::Compact).unwrap(),
            r#"{"a":[1,2,null],"b":"x"}"#
        );
    }
}
