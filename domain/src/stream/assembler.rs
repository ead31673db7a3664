//! Message assembler: folds a turn's event stream into logical units.
//!
//! The assembler is fed events strictly in arrival order by a single
//! consumer. It owns one [`ToolCallAccumulator`] per open correlation id and
//! a single in-progress text run.
//!
//! Text and reasoning chunks are passed through immediately as
//! [`AssemblyOutput::Chunk`] for incremental rendering, and consolidated into
//! one [`AssemblyOutput::MessageFinalized`] when the run is interrupted by an
//! event of a different kind or by `turn_end`.

use super::accumulator::{AssemblyError, ToolCallAccumulator};
use crate::protocol::event::{ChunkKind, ProtocolEvent};
use crate::tool::entities::ToolCall;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A consolidated run of same-kind chunks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizedMessage {
    pub kind: ChunkKind,
    pub content: String,
}

/// Output of feeding one event to the assembler.
#[derive(Debug, Clone, PartialEq)]
pub enum AssemblyOutput {
    /// Incremental text or reasoning.
    Chunk { kind: ChunkKind, text: String },
    /// A text or reasoning run ended.
    MessageFinalized(FinalizedMessage),
    /// An accumulator was opened.
    ToolCallStarted { id: String, name: String },
    /// Arguments parsed; the call may be dispatched.
    ToolCallReady(ToolCall),
    /// The call can never be dispatched.
    ToolCallFailed {
        id: String,
        name: String,
        error: AssemblyError,
    },
    /// An out-of-order event was dropped.
    Rejected(AssemblyError),
}

#[derive(Debug)]
struct TextRun {
    kind: ChunkKind,
    content: String,
}

/// Turn-scoped assembler state.
#[derive(Debug, Default)]
pub struct MessageAssembler {
    open: HashMap<String, ToolCallAccumulator>,
    closed: HashSet<String>,
    run: Option<TextRun>,
    last_text: Option<String>,
}

impl MessageAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one event.
    pub fn push(&mut self, event: &ProtocolEvent) -> Vec<AssemblyOutput> {
        let mut out = Vec::new();

        match event {
            ProtocolEvent::TextChunk { text } => {
                self.append_chunk(ChunkKind::Text, text, &mut out);
                return out;
            }
            ProtocolEvent::ReasoningChunk { text } => {
                self.append_chunk(ChunkKind::Reasoning, text, &mut out);
                return out;
            }
            _ => self.finalize_run(&mut out),
        }

        match event {
            ProtocolEvent::ToolCallStart { id, name } => {
                if self.open.contains_key(id) || self.closed.contains(id) {
                    out.push(AssemblyOutput::Rejected(AssemblyError::DuplicateStart {
                        id: id.clone(),
                    }));
                } else {
                    self.open
                        .insert(id.clone(), ToolCallAccumulator::start(id, name));
                    out.push(AssemblyOutput::ToolCallStarted {
                        id: id.clone(),
                        name: name.clone(),
                    });
                }
            }
            ProtocolEvent::ToolCallDelta { id, arg_fragment } => {
                let result = match self.open.get_mut(id) {
                    Some(acc) => acc.push_fragment(arg_fragment),
                    None if self.closed.contains(id) => {
                        Err(AssemblyError::DeltaAfterEnd { id: id.clone() })
                    }
                    None => Err(AssemblyError::DeltaWithoutStart { id: id.clone() }),
                };
                if let Err(e) = result {
                    out.push(AssemblyOutput::Rejected(e));
                }
            }
            ProtocolEvent::ToolCallEnd { id } => match self.open.remove(id) {
                Some(mut acc) => {
                    self.closed.insert(id.clone());
                    match acc.finish() {
                        Ok(call) => out.push(AssemblyOutput::ToolCallReady(call)),
                        Err(error) => out.push(AssemblyOutput::ToolCallFailed {
                            id: id.clone(),
                            name: acc.name().to_string(),
                            error,
                        }),
                    }
                }
                None if self.closed.contains(id) => {
                    out.push(AssemblyOutput::Rejected(AssemblyError::DuplicateEnd {
                        id: id.clone(),
                    }));
                }
                None => {
                    out.push(AssemblyOutput::Rejected(AssemblyError::EndWithoutStart {
                        id: id.clone(),
                    }));
                }
            },
            ProtocolEvent::TurnEnd { .. } => out.extend(self.finish()),
            ProtocolEvent::ApprovalRequest { .. }
            | ProtocolEvent::Error { .. }
            | ProtocolEvent::Unknown { .. } => {}
            ProtocolEvent::TextChunk { .. } | ProtocolEvent::ReasoningChunk { .. } => {}
        }

        out
    }

    /// Flush the open text run and fail every accumulator still open.
    ///
    /// Called on `turn_end`; safe to call more than once.
    pub fn finish(&mut self) -> Vec<AssemblyOutput> {
        let mut out = Vec::new();
        self.finalize_run(&mut out);

        let mut ids: Vec<String> = self.open.keys().cloned().collect();
        ids.sort();
        for id in ids {
            if let Some(acc) = self.open.remove(&id) {
                self.closed.insert(id.clone());
                out.push(AssemblyOutput::ToolCallFailed {
                    id: id.clone(),
                    name: acc.name().to_string(),
                    error: AssemblyError::Incomplete { id },
                });
            }
        }
        out
    }

    /// Last finalized assistant text of the turn.
    pub fn final_message(&self) -> Option<&str> {
        self.last_text.as_deref()
    }

    /// Whether an accumulator is open for `id`.
    pub fn is_open(&self, id: &str) -> bool {
        self.open.contains_key(id)
    }

    /// Whether `id` has been seen and closed (ready or failed).
    pub fn is_closed(&self, id: &str) -> bool {
        self.closed.contains(id)
    }

    fn append_chunk(&mut self, kind: ChunkKind, text: &str, out: &mut Vec<AssemblyOutput>) {
        if self.run.as_ref().is_some_and(|run| run.kind != kind) {
            self.finalize_run(out);
        }
        match self.run.as_mut() {
            Some(run) => run.content.push_str(text),
            None => {
                self.run = Some(TextRun {
                    kind,
                    content: text.to_string(),
                })
            }
        }
        out.push(AssemblyOutput::Chunk {
            kind,
            text: text.to_string(),
        });
    }

    fn finalize_run(&mut self, out: &mut Vec<AssemblyOutput>) {
        if let Some(run) = self.run.take() {
            if run.kind == ChunkKind::Text {
                self.last_text = Some(run.content.clone());
            }
            out.push(AssemblyOutput::MessageFinalized(FinalizedMessage {
                kind: run.kind,
                content: run.content,
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::event::TurnEndReason;
    use serde_json::json;

    fn start(id: &str, name: &str) -> ProtocolEvent {
        ProtocolEvent::ToolCallStart {
            id: id.into(),
            name: name.into(),
        }
    }

    fn delta(id: &str, fragment: &str) -> ProtocolEvent {
        ProtocolEvent::ToolCallDelta {
            id: id.into(),
            arg_fragment: fragment.into(),
        }
    }

    fn end(id: &str) -> ProtocolEvent {
        ProtocolEvent::ToolCallEnd { id: id.into() }
    }

    fn text(t: &str) -> ProtocolEvent {
        ProtocolEvent::TextChunk { text: t.into() }
    }

    fn reasoning(t: &str) -> ProtocolEvent {
        ProtocolEvent::ReasoningChunk { text: t.into() }
    }

    fn turn_end() -> ProtocolEvent {
        ProtocolEvent::TurnEnd {
            reason: TurnEndReason::EndTurn,
        }
    }

    fn ready_calls(outputs: &[AssemblyOutput]) -> Vec<ToolCall> {
        outputs
            .iter()
            .filter_map(|o| match o {
                AssemblyOutput::ToolCallReady(call) => Some(call.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_assembled_arguments_equal_parse_of_concatenation() {
        let cases: [&[&str]; 4] = [
            &["{\"pattern\":\"*.py\"}"],
            &["{\"pat", "tern\":\"**/", "*.rs\",\"path\":", "\"src\"}"],
            &["{", "\"n\"", ":", "1", ",\"nested\":{\"a\":[1,2]}", "}"],
            &[],
        ];

        for fragments in cases {
            let mut asm = MessageAssembler::new();
            let mut outputs = asm.push(&start("1", "Glob"));
            for f in fragments {
                outputs.extend(asm.push(&delta("1", f)));
            }
            outputs.extend(asm.push(&end("1")));

            let calls = ready_calls(&outputs);
            assert_eq!(calls.len(), 1);

            let concatenated = fragments.concat();
            let expected = if concatenated.is_empty() {
                json!({})
            } else {
                serde_json::from_str::<serde_json::Value>(&concatenated).unwrap()
            };
            assert_eq!(calls[0].arguments_value(), expected);
        }
    }

    #[test]
    fn test_end_before_start_is_rejected() {
        let mut asm = MessageAssembler::new();
        let out = asm.push(&end("1"));
        assert_eq!(
            out,
            vec![AssemblyOutput::Rejected(AssemblyError::EndWithoutStart {
                id: "1".into()
            })]
        );

        // A later start for the same id still works normally.
        asm.push(&start("1", "Glob"));
        let out = asm.push(&end("1"));
        assert_eq!(ready_calls(&out).len(), 1);
    }

    #[test]
    fn test_duplicate_end_is_rejected_and_not_redispatched() {
        let mut asm = MessageAssembler::new();
        asm.push(&start("1", "Glob"));
        assert_eq!(ready_calls(&asm.push(&end("1"))).len(), 1);

        let out = asm.push(&end("1"));
        assert_eq!(
            out,
            vec![AssemblyOutput::Rejected(AssemblyError::DuplicateEnd {
                id: "1".into()
            })]
        );
    }

    #[test]
    fn test_delta_without_start_is_rejected() {
        let mut asm = MessageAssembler::new();
        let out = asm.push(&delta("9", "{}"));
        assert!(matches!(
            out.as_slice(),
            [AssemblyOutput::Rejected(AssemblyError::DeltaWithoutStart { .. })]
        ));
    }

    #[test]
    fn test_parse_failure_marks_call_failed() {
        let mut asm = MessageAssembler::new();
        asm.push(&start("1", "Glob"));
        asm.push(&delta("1", "{\"pattern\": "));
        let out = asm.push(&end("1"));

        assert!(ready_calls(&out).is_empty());
        assert!(matches!(
            out.as_slice(),
            [AssemblyOutput::ToolCallFailed { id, name, error: AssemblyError::InvalidArguments { .. } }]
                if id == "1" && name == "Glob"
        ));
        assert!(asm.is_closed("1"));
    }

    #[test]
    fn test_interleaved_ids_accumulate_independently() {
        let mut asm = MessageAssembler::new();
        asm.push(&start("a", "Glob"));
        asm.push(&start("b", "Read"));
        asm.push(&delta("a", "{\"pattern\":"));
        asm.push(&delta("b", "{\"file_path\":\"x\"}"));
        asm.push(&delta("a", "\"*.md\"}"));

        let b = ready_calls(&asm.push(&end("b")));
        let a = ready_calls(&asm.push(&end("a")));
        assert_eq!(a[0].arguments_value(), json!({"pattern": "*.md"}));
        assert_eq!(b[0].arguments_value(), json!({"file_path": "x"}));
    }

    #[test]
    fn test_same_kind_chunks_concatenate_until_kind_changes() {
        let mut asm = MessageAssembler::new();
        asm.push(&reasoning("thinking "));
        asm.push(&reasoning("hard"));
        let out = asm.push(&text("Hel"));

        assert_eq!(
            out,
            vec![
                AssemblyOutput::MessageFinalized(FinalizedMessage {
                    kind: ChunkKind::Reasoning,
                    content: "thinking hard".into()
                }),
                AssemblyOutput::Chunk {
                    kind: ChunkKind::Text,
                    text: "Hel".into()
                },
            ]
        );

        asm.push(&text("lo"));
        let out = asm.push(&turn_end());
        assert_eq!(
            out,
            vec![AssemblyOutput::MessageFinalized(FinalizedMessage {
                kind: ChunkKind::Text,
                content: "Hello".into()
            })]
        );
        assert_eq!(asm.final_message(), Some("Hello"));
    }

    #[test]
    fn test_tool_events_interrupt_text_runs() {
        let mut asm = MessageAssembler::new();
        asm.push(&text("Let me look."));
        let out = asm.push(&start("1", "Glob"));
        assert!(matches!(
            out.first(),
            Some(AssemblyOutput::MessageFinalized(FinalizedMessage { kind: ChunkKind::Text, .. }))
        ));
        assert!(matches!(out.get(1), Some(AssemblyOutput::ToolCallStarted { .. })));
    }

    #[test]
    fn test_final_message_is_last_text_run() {
        let mut asm = MessageAssembler::new();
        asm.push(&text("first"));
        asm.push(&start("1", "Glob"));
        asm.push(&end("1"));
        asm.push(&text("second"));
        asm.push(&reasoning("musing"));
        asm.push(&turn_end());
        assert_eq!(asm.final_message(), Some("second"));
    }

    #[test]
    fn test_turn_end_fails_open_accumulators() {
        let mut asm = MessageAssembler::new();
        asm.push(&start("1", "Glob"));
        asm.push(&delta("1", "{"));
        let out = asm.push(&turn_end());
        assert_eq!(
            out,
            vec![AssemblyOutput::ToolCallFailed {
                id: "1".into(),
                name: "Glob".into(),
                error: AssemblyError::Incomplete { id: "1".into() }
            }]
        );
        assert!(asm.finish().is_empty());
    }
}
