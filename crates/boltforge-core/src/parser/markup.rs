//! Low-level tag recognition for the action markup.
//!
//! Everything here works on a byte slice of the scan buffer and answers one of
//! three ways: the input is a complete construct, it is malformed, or it may
//! still become valid once more text arrives.

use crate::types::ActionKind;

pub(crate) const ACTION_TAG: &str = "action";
pub(crate) const ARTIFACT_TAG: &str = "boltArtifact";
pub(crate) const ACTION_CLOSE: &str = "</action";
pub(crate) const ARTIFACT_CLOSE: &str = "</boltArtifact";

/// Tag kinds the scanner recognizes at a `<`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TagName {
    ActionOpen,
    ArtifactOpen,
    ArtifactClose,
}

impl TagName {
    /// Marker text following the `<`.
    fn marker(&self) -> &'static str {
        match self {
            Self::ActionOpen => ACTION_TAG,
            Self::ArtifactOpen => ARTIFACT_TAG,
            Self::ArtifactClose => &ARTIFACT_CLOSE[1..],
        }
    }

    /// Byte length of `<` plus the marker.
    pub(crate) fn prefix_len(&self) -> usize {
        1 + self.marker().len()
    }

    fn accepts_boundary(&self, byte: u8) -> bool {
        match self {
            Self::ActionOpen | Self::ArtifactOpen => {
                byte.is_ascii_whitespace() || byte == b'>' || byte == b'/'
            }
            Self::ArtifactClose => byte.is_ascii_whitespace() || byte == b'>',
        }
    }
}

/// Result of looking at the text right after a `<`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TagStart {
    Match(TagName),
    /// The buffer ends before a candidate can be confirmed or ruled out.
    Undecided,
    NoMatch,
}

/// Classify `input` (starting at `<`) against the candidate tag names.
pub(crate) fn classify_tag_start(input: &[u8], candidates: &[TagName]) -> TagStart {
    debug_assert_eq!(input.first(), Some(&b'<'));
    let rest = &input[1..];
    let mut undecided = false;
    for candidate in candidates {
        let marker = candidate.marker().as_bytes();
        if rest.len() < marker.len() {
            if marker.starts_with(rest) {
                undecided = true;
            }
            continue;
        }
        if !rest.starts_with(marker) {
            continue;
        }
        match rest.get(marker.len()) {
            None => undecided = true,
            Some(byte) if candidate.accepts_boundary(*byte) => return TagStart::Match(*candidate),
            Some(_) => {}
        }
    }
    if undecided {
        TagStart::Undecided
    } else {
        TagStart::NoMatch
    }
}

/// Parsed attribute list of an open tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Attributes(Vec<(String, String)>);

impl Attributes {
    /// First value for `name`.
    pub(crate) fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn push(&mut self, name: String, value: String) {
        self.0.push((name, value));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum OpenTagParse {
    Complete {
        attributes: Attributes,
        self_closing: bool,
        /// Bytes consumed, including the closing `>`.
        len: usize,
    },
    Incomplete,
    Malformed,
}

fn is_attr_name_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'-' | b':' | b'.')
}

/// Parse the attribute section of an open tag. `input` starts right after
/// the tag name.
pub(crate) fn parse_open_tag(input: &str) -> OpenTagParse {
    let bytes = input.as_bytes();
    let mut attributes = Attributes::default();
    let mut i = 0;

    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        let Some(&byte) = bytes.get(i) else {
            return OpenTagParse::Incomplete;
        };

        match byte {
            b'>' => {
                return OpenTagParse::Complete {
                    attributes,
                    self_closing: false,
                    len: i + 1,
                }
            }
            b'/' => {
                return match bytes.get(i + 1) {
                    None => OpenTagParse::Incomplete,
                    Some(b'>') => OpenTagParse::Complete {
                        attributes,
                        self_closing: true,
                        len: i + 2,
                    },
                    Some(_) => OpenTagParse::Malformed,
                };
            }
            b if is_attr_name_byte(b) => {
                let name_start = i;
                while i < bytes.len() && is_attr_name_byte(bytes[i]) {
                    i += 1;
                }
                let name = &input[name_start..i];

                let mut j = i;
                while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                    j += 1;
                }
                let Some(&next) = bytes.get(j) else {
                    return OpenTagParse::Incomplete;
                };
                if next != b'=' {
                    // Bare attribute; the next iteration resumes at `i`.
                    attributes.push(name.to_string(), String::new());
                    continue;
                }

                j += 1;
                while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                    j += 1;
                }
                let Some(&quote) = bytes.get(j) else {
                    return OpenTagParse::Incomplete;
                };
                if quote != b'"' && quote != b'\'' {
                    return OpenTagParse::Malformed;
                }
                let value_start = j + 1;
                let Some(offset) = bytes[value_start..].iter().position(|b| *b == quote) else {
                    return OpenTagParse::Incomplete;
                };
                let value_end = value_start + offset;
                attributes.push(name.to_string(), input[value_start..value_end].to_string());
                i = value_end + 1;
            }
            _ => return OpenTagParse::Malformed,
        }
    }
}

/// How an `<action>` open tag resolves, before its content is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ActionHeader {
    File { file_path: String },
    Shell,
    /// `type` names something this grammar does not know; the body is
    /// skipped but produces no action.
    Unrecognized { type_attr: String },
}

impl ActionHeader {
    /// `None` when the tag has no `type`: such a tag is prose, not markup.
    pub(crate) fn from_attributes(attributes: &Attributes) -> Option<Self> {
        let raw = attributes.get("type")?;
        let header = match ActionKind::from_type_attr(raw) {
            Some(ActionKind::File) => Self::File {
                file_path: attributes.get("filePath").unwrap_or_default().to_string(),
            },
            Some(ActionKind::Shell) => Self::Shell,
            None => Self::Unrecognized {
                type_attr: raw.to_string(),
            },
        };
        Some(header)
    }

    pub(crate) fn kind(&self) -> Option<ActionKind> {
        match self {
            Self::File { .. } => Some(ActionKind::File),
            Self::Shell => Some(ActionKind::Shell),
            Self::Unrecognized { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CloseTagParse {
    /// Bytes consumed after the marker, including `>`.
    Complete(usize),
    Incomplete,
    Mismatch,
}

/// Finish a close tag. `input` starts right after `</name`.
pub(crate) fn parse_close_tag_tail(input: &[u8]) -> CloseTagParse {
    let mut i = 0;
    while i < input.len() && input[i].is_ascii_whitespace() {
        i += 1;
    }
    match input.get(i) {
        None => CloseTagParse::Incomplete,
        Some(b'>') => CloseTagParse::Complete(i + 1),
        Some(_) => CloseTagParse::Mismatch,
    }
}

/// Length of the longest suffix of `haystack` that is a proper prefix of
/// `needle`. Used to keep a possibly split marker in the buffer.
pub(crate) fn partial_suffix_len(haystack: &[u8], needle: &[u8]) -> usize {
    let max = needle.len().saturating_sub(1).min(haystack.len());
    (1..=max)
        .rev()
        .find(|k| haystack[haystack.len() - k..] == needle[..*k])
        .unwrap_or(0)
}
