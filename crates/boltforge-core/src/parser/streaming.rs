//! Incremental scanner over model output.
//!
//! The scanner keeps only the unconsumed tail of the text it has been given.
//! Tags that are still open when a chunk ends stay buffered until a later
//! chunk completes them, so feeding a text in any split produces the same
//! events as feeding it at once.

use serde::Serialize;

use super::markup::{
    classify_tag_start, parse_close_tag_tail, parse_open_tag, partial_suffix_len, ActionHeader,
    CloseTagParse, OpenTagParse, TagName, TagStart, ACTION_CLOSE,
};
use crate::types::{Action, ActionKind, Artifact};

const OUTSIDE_CANDIDATES: &[TagName] = &[TagName::ArtifactOpen, TagName::ActionOpen];
const IN_ARTIFACT_CANDIDATES: &[TagName] = &[TagName::ArtifactClose, TagName::ActionOpen];

/// Something the scanner recognized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ParseEvent {
    /// An artifact open marker completed.
    ArtifactOpened { id: String, title: String },
    /// An action closed. `artifact_id` is set when it sits inside an open artifact.
    ActionClosed {
        artifact_id: Option<String>,
        action: Action,
    },
    /// An artifact close marker completed; carries every action seen inside it.
    ArtifactClosed { artifact: Artifact },
}

/// Markup still open when [`StreamingParser::finish`] was called.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "tag", rename_all = "snake_case")]
pub enum PendingTag {
    /// An open tag whose `>` never arrived.
    OpenTag { text: String },
    /// An action whose close marker never arrived.
    Action {
        kind: Option<ActionKind>,
        partial_content: String,
    },
    /// An artifact whose close marker never arrived.
    Artifact {
        id: String,
        title: String,
        closed_actions: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenTarget {
    Action,
    Artifact,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum CloseTarget {
    Action {
        header: ActionHeader,
        content_start: usize,
        content_end: usize,
    },
    Artifact {
        start: usize,
    },
}

/// Scanner state. Offsets are byte positions in the parser buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ScanState {
    Outside,
    InOpenTag {
        start: usize,
        target: OpenTarget,
    },
    InContent {
        header: ActionHeader,
        content_start: usize,
    },
    InCloseTag {
        target: CloseTarget,
    },
}

impl ScanState {
    /// Earliest buffer offset this state still refers to.
    fn retain_from(&self, cursor: usize) -> usize {
        match self {
            Self::Outside => cursor,
            Self::InOpenTag { start, .. } => *start,
            Self::InContent { content_start, .. } => *content_start,
            Self::InCloseTag {
                target: CloseTarget::Action { content_start, .. },
            } => *content_start,
            Self::InCloseTag {
                target: CloseTarget::Artifact { start },
            } => *start,
        }
    }

    fn shift(&mut self, by: usize) {
        match self {
            Self::Outside => {}
            Self::InOpenTag { start, .. } => *start -= by,
            Self::InContent { content_start, .. } => *content_start -= by,
            Self::InCloseTag {
                target:
                    CloseTarget::Action {
                        content_start,
                        content_end,
                        ..
                    },
            } => {
                *content_start -= by;
                *content_end -= by;
            }
            Self::InCloseTag {
                target: CloseTarget::Artifact { start },
            } => *start -= by,
        }
    }
}

/// Push-based parser for action and artifact markup.
#[derive(Debug, Clone)]
pub struct StreamingParser {
    buffer: String,
    cursor: usize,
    state: ScanState,
    artifact: Option<Artifact>,
}

impl Default for StreamingParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamingParser {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            cursor: 0,
            state: ScanState::Outside,
            artifact: None,
        }
    }

    /// Feed the next chunk of text and return everything that completed.
    pub fn push(&mut self, chunk: &str) -> Vec<ParseEvent> {
        self.buffer.push_str(chunk);
        let mut events = Vec::new();
        while self.advance(&mut events) {}
        self.compact();
        events
    }

    /// Bytes currently held back waiting for more input.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether the parser sits between tags with no open artifact.
    pub fn is_idle(&self) -> bool {
        self.state == ScanState::Outside && self.artifact.is_none()
    }

    /// End of input: report unterminated markup and reset the parser.
    pub fn finish(&mut self) -> Vec<PendingTag> {
        let mut pending = Vec::new();
        if let Some(artifact) = &self.artifact {
            pending.push(PendingTag::Artifact {
                id: artifact.id.clone(),
                title: artifact.title.clone(),
                closed_actions: artifact.actions.len(),
            });
        }
        match &self.state {
            ScanState::Outside
            | ScanState::InCloseTag {
                target: CloseTarget::Artifact { .. },
            } => {}
            ScanState::InOpenTag { start, .. } => pending.push(PendingTag::OpenTag {
                text: self.buffer[*start..].to_string(),
            }),
            ScanState::InContent {
                header,
                content_start,
            }
            | ScanState::InCloseTag {
                target:
                    CloseTarget::Action {
                        header,
                        content_start,
                        ..
                    },
            } => pending.push(PendingTag::Action {
                kind: header.kind(),
                partial_content: self.buffer[*content_start..].trim().to_string(),
            }),
        }
        *self = Self::new();
        pending
    }

    /// Run one scanner transition. Returns false when more input is needed.
    fn advance(&mut self, events: &mut Vec<ParseEvent>) -> bool {
        match std::mem::replace(&mut self.state, ScanState::Outside) {
            ScanState::Outside => self.scan_outside(),
            ScanState::InOpenTag { start, target } => self.scan_open_tag(start, target, events),
            ScanState::InContent {
                header,
                content_start,
            } => self.scan_content(header, content_start),
            ScanState::InCloseTag { target } => self.scan_close_tag(target, events),
        }
    }

    fn scan_outside(&mut self) -> bool {
        let Some(offset) = self.buffer[self.cursor..].find('<') else {
            self.cursor = self.buffer.len();
            return false;
        };
        let start = self.cursor + offset;
        let candidates = if self.artifact.is_some() {
            IN_ARTIFACT_CANDIDATES
        } else {
            OUTSIDE_CANDIDATES
        };

        match classify_tag_start(&self.buffer.as_bytes()[start..], candidates) {
            TagStart::Match(tag) => {
                self.cursor = start + tag.prefix_len();
                self.state = match tag {
                    TagName::ActionOpen => ScanState::InOpenTag {
                        start,
                        target: OpenTarget::Action,
                    },
                    TagName::ArtifactOpen => ScanState::InOpenTag {
                        start,
                        target: OpenTarget::Artifact,
                    },
                    TagName::ArtifactClose => ScanState::InCloseTag {
                        target: CloseTarget::Artifact { start },
                    },
                };
                true
            }
            TagStart::Undecided => {
                self.cursor = start;
                false
            }
            TagStart::NoMatch => {
                self.cursor = start + 1;
                true
            }
        }
    }

    fn scan_open_tag(
        &mut self,
        start: usize,
        target: OpenTarget,
        events: &mut Vec<ParseEvent>,
    ) -> bool {
        match parse_open_tag(&self.buffer[self.cursor..]) {
            OpenTagParse::Incomplete => {
                self.state = ScanState::InOpenTag { start, target };
                false
            }
            OpenTagParse::Malformed => {
                tracing::debug!(offset = start, "skipping malformed open tag");
                self.cursor = start + 1;
                true
            }
            OpenTagParse::Complete {
                attributes,
                self_closing,
                len,
            } => {
                let end = self.cursor + len;
                self.cursor = end;
                if self_closing {
                    tracing::debug!(offset = start, "ignoring self-closing tag");
                    return true;
                }
                match target {
                    OpenTarget::Action => match ActionHeader::from_attributes(&attributes) {
                        Some(header) => {
                            self.state = ScanState::InContent {
                                header,
                                content_start: end,
                            };
                        }
                        None => tracing::debug!(offset = start, "action tag without type is prose"),
                    },
                    OpenTarget::Artifact => match (attributes.get("id"), attributes.get("title")) {
                        (Some(id), Some(title)) => {
                            let (id, title) = (id.to_string(), title.to_string());
                            self.artifact = Some(Artifact::new(id.clone(), title.clone()));
                            events.push(ParseEvent::ArtifactOpened { id, title });
                        }
                        _ => tracing::debug!(offset = start, "artifact tag without id or title is prose"),
                    },
                }
                true
            }
        }
    }

    fn scan_content(&mut self, header: ActionHeader, content_start: usize) -> bool {
        let haystack = &self.buffer[self.cursor..];
        match haystack.find(ACTION_CLOSE) {
            Some(offset) => {
                let content_end = self.cursor + offset;
                self.cursor = content_end + ACTION_CLOSE.len();
                self.state = ScanState::InCloseTag {
                    target: CloseTarget::Action {
                        header,
                        content_start,
                        content_end,
                    },
                };
                true
            }
            None => {
                let keep = partial_suffix_len(haystack.as_bytes(), ACTION_CLOSE.as_bytes());
                self.cursor = self.buffer.len() - keep;
                self.state = ScanState::InContent {
                    header,
                    content_start,
                };
                false
            }
        }
    }

    fn scan_close_tag(&mut self, target: CloseTarget, events: &mut Vec<ParseEvent>) -> bool {
        match parse_close_tag_tail(&self.buffer.as_bytes()[self.cursor..]) {
            CloseTagParse::Incomplete => {
                self.state = ScanState::InCloseTag { target };
                false
            }
            CloseTagParse::Mismatch => {
                match target {
                    CloseTarget::Action {
                        header,
                        content_start,
                        content_end,
                    } => {
                        self.cursor = content_end + 1;
                        self.state = ScanState::InContent {
                            header,
                            content_start,
                        };
                    }
                    CloseTarget::Artifact { start } => self.cursor = start + 1,
                }
                true
            }
            CloseTagParse::Complete(len) => {
                match target {
                    CloseTarget::Action {
                        header,
                        content_start,
                        content_end,
                    } => {
                        let content = self.buffer[content_start..content_end].trim().to_string();
                        self.emit_action(header, content, events);
                    }
                    CloseTarget::Artifact { .. } => {
                        if let Some(artifact) = self.artifact.take() {
                            events.push(ParseEvent::ArtifactClosed { artifact });
                        }
                    }
                }
                self.cursor += len;
                true
            }
        }
    }

    fn emit_action(&mut self, header: ActionHeader, content: String, events: &mut Vec<ParseEvent>) {
        let action = match header {
            ActionHeader::File { file_path } => Action::file(file_path, content),
            ActionHeader::Shell => Action::shell(content),
            ActionHeader::Unrecognized { type_attr } => {
                tracing::debug!(action_type = %type_attr, "dropping action with unknown type");
                return;
            }
        };
        let artifact_id = match self.artifact.as_mut() {
            Some(artifact) => {
                artifact.actions.push(action.clone());
                Some(artifact.id.clone())
            }
            None => None,
        };
        events.push(ParseEvent::ActionClosed {
            artifact_id,
            action,
        });
    }

    /// Drop consumed text from the front of the buffer.
    fn compact(&mut self) {
        let retain_from = self.state.retain_from(self.cursor);
        if retain_from == 0 {
            return;
        }
        self.buffer.drain(..retain_from);
        self.cursor -= retain_from;
        self.state.shift(retain_from);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"Sure! Here is your app <3, wrapped in a <boltArtifact> of <action> tags.
<boltArtifact id="todo" title="Todo App ✓">
  <action type="file" filePath="src/App.jsx">
    export default function App() {
      return <div className="app">héllo</div>;
    }
  </action>
  <action type="shell">npm install && npm run dev</action>
</boltArtifact>
Trailing prose with a stray </boltArtifact> and <action type="shell">ls</action>"#;

    fn collect_all(parser: &mut StreamingParser, chunks: &[&str]) -> Vec<ParseEvent> {
        chunks.iter().flat_map(|chunk| parser.push(chunk)).collect()
    }

    #[test]
    fn test_events_arrive_in_document_order() {
        let mut parser = StreamingParser::new();
        let events = parser.push(SAMPLE);

        assert_eq!(events.len(), 5);
        assert_eq!(
            events[0],
            ParseEvent::ArtifactOpened {
                id: "todo".to_string(),
                title: "Todo App ✓".to_string()
            }
        );
        match &events[1] {
            ParseEvent::ActionClosed {
                artifact_id,
                action,
            } => {
                assert_eq!(artifact_id.as_deref(), Some("todo"));
                assert_eq!(action.file_path(), Some("src/App.jsx"));
                assert!(action.content().starts_with("export default function App() {"));
                assert!(action.content().contains("<div className=\"app\">héllo</div>"));
                assert!(action.content().ends_with('}'));
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(
            events[2],
            ParseEvent::ActionClosed {
                artifact_id: Some("todo".to_string()),
                action: Action::shell("npm install && npm run dev"),
            }
        );
        match &events[3] {
            ParseEvent::ArtifactClosed { artifact } => assert_eq!(artifact.actions.len(), 2),
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(
            events[4],
            ParseEvent::ActionClosed {
                artifact_id: None,
                action: Action::shell("ls"),
            }
        );
        assert!(parser.is_idle());
    }

    #[test]
    fn test_any_chunking_yields_identical_events() {
        let whole = StreamingParser::new().push(SAMPLE);

        let chars: Vec<String> = SAMPLE.chars().map(|c| c.to_string()).collect();
        let char_chunks: Vec<&str> = chars.iter().map(String::as_str).collect();
        let by_char = collect_all(&mut StreamingParser::new(), &char_chunks);
        assert_eq!(by_char, whole);

        for split in [1, 7, 13, 64] {
            let mut chunks = Vec::new();
            let mut rest = SAMPLE;
            while !rest.is_empty() {
                let mut at = split.min(rest.len());
                while !rest.is_char_boundary(at) {
                    at += 1;
                }
                let (head, tail) = rest.split_at(at);
                chunks.push(head);
                rest = tail;
            }
            assert_eq!(collect_all(&mut StreamingParser::new(), &chunks), whole);
        }
    }

    #[test]
    fn test_incomplete_action_waits_for_close_marker() {
        let mut parser = StreamingParser::new();
        assert!(parser
            .push("<action type=\"file\" filePath=\"a.txt\">partial")
            .is_empty());
        assert!(parser.push(" body</act").is_empty());
        let events = parser.push("ion>");
        assert_eq!(
            events,
            vec![ParseEvent::ActionClosed {
                artifact_id: None,
                action: Action::file("a.txt", "partial body"),
            }]
        );
    }

    #[test]
    fn test_finish_reports_unterminated_markup_and_resets() {
        let mut parser = StreamingParser::new();
        parser.push("<boltArtifact id=\"x\" title=\"X\"><action type=\"shell\">echo hi</action>");
        parser.push("<action type=\"file\" filePath=\"b.txt\">half of it");
        let pending = parser.finish();
        assert_eq!(
            pending,
            vec![
                PendingTag::Artifact {
                    id: "x".to_string(),
                    title: "X".to_string(),
                    closed_actions: 1,
                },
                PendingTag::Action {
                    kind: Some(ActionKind::File),
                    partial_content: "half of it".to_string(),
                },
            ]
        );
        assert!(parser.is_idle());
        assert_eq!(parser.buffered_len(), 0);

        parser.push("<action type=\"sh");
        assert_eq!(
            parser.finish(),
            vec![PendingTag::OpenTag {
                text: "<action type=\"sh".to_string()
            }]
        );
    }

    #[test]
    fn test_buffer_is_compacted_between_tags() {
        let mut parser = StreamingParser::new();
        parser.push(&"plain prose ".repeat(100));
        assert_eq!(parser.buffered_len(), 0);
        parser.push("and then <acti");
        assert_eq!(parser.buffered_len(), "<acti".len());
    }
}
