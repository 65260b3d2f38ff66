// Fri Jan 16 2026 - Alex

use crate::engine::buffer::WorkingBuffer;
use crate::engine::phase::{Phase, PhaseContext, PhaseError, PhaseKind, PhaseOutcome};
use crate::utils::scanner::{TokenKind, TokenStream};
use crate::utils::string::StringUtils;
use std::fmt;

const MAX_INSTRUCTIONS: usize = 100_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmInstruction {
    pub opcode: String,
    pub operands: Vec<String>,
}

impl fmt::Display for VmInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.opcode, self.operands.join(", "))
    }
}

fn is_opcode(name: &str) -> bool {
    let bytes = name.as_bytes();
    !bytes.is_empty()
        && bytes[0].is_ascii_uppercase()
        && bytes.iter().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || *b == b'_')
}

/// Collects every `UPPERCASE(args)` call shape in source order, nested ones
/// included. Text inside strings and comments is ignored.
pub fn collect_instructions(src: &str) -> Vec<VmInstruction> {
    let stream = TokenStream::new(src);
    let mut instructions = Vec::new();

    for idx in 0..stream.len() {
        if instructions.len() >= MAX_INSTRUCTIONS {
            log::warn!("Instruction trace truncated at {}", MAX_INSTRUCTIONS);
            break;
        }
        let Some(tok) = stream.get(idx) else { break };
        if tok.kind != TokenKind::Name || !is_opcode(stream.text(idx)) {
            continue;
        }
        let Some(open) = stream.next_significant(idx) else { continue };
        if !stream.is_punct(open, '(') {
            continue;
        }
        if let Ok(list) = stream.parse_args(open) {
            instructions.push(VmInstruction {
                opcode: stream.text(idx).to_string(),
                operands: list.args.iter().map(|r| src[r.clone()].to_string()).collect(),
            });
        }
    }
    instructions
}

#[derive(Debug, Default)]
pub struct VmState {
    pub operand_stack: Vec<String>,
    pub handled: Vec<String>,
    pub unknown: Vec<String>,
}

impl VmState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replays one instruction. Returns false when the opcode has no handler
    /// or its operands do not fit.
    pub fn step(&mut self, instruction: &VmInstruction) -> bool {
        match instruction.opcode.as_str() {
            "LOADK" => match instruction.operands.first() {
                Some(value) => {
                    self.operand_stack.push(value.clone());
                    self.handled.push(format!("LOADK {}", StringUtils::truncate(value, 32)));
                    true
                }
                None => false,
            },
            "CALL" => match self.operand_stack.pop() {
                Some(callee) => {
                    self.operand_stack.push("called".to_string());
                    self.handled.push(format!("CALL {}", StringUtils::truncate(&callee, 32)));
                    true
                }
                None => false,
            },
            "RETURN" => {
                self.operand_stack.pop();
                self.handled.push("RETURN".to_string());
                true
            }
            _ => false,
        }
    }

    pub fn run(instructions: &[VmInstruction]) -> Self {
        let mut state = Self::new();
        for instruction in instructions {
            if !state.step(instruction) {
                state.unknown.push(instruction.opcode.clone());
            }
        }
        state
    }

    pub fn output(&self) -> Option<String> {
        if self.operand_stack.is_empty() {
            None
        } else {
            Some(self.operand_stack.join("\n"))
        }
    }
}

/// Linear replay of an opcode trace. Best effort: no jumps, no real call
/// semantics, so each step contributes little confidence.
pub struct VmReconstructionPhase;

impl VmReconstructionPhase {
    pub fn new() -> Self {
        Self
    }
}

impl Default for VmReconstructionPhase {
    fn default() -> Self {
        Self::new()
    }
}

impl Phase for VmReconstructionPhase {
    fn kind(&self) -> PhaseKind {
        PhaseKind::VmReconstruction
    }

    fn apply(&self, buffer: WorkingBuffer, ctx: &PhaseContext<'_>) -> Result<PhaseOutcome, PhaseError> {
        let mut outcome = PhaseOutcome::new(self.kind(), buffer);
        if !ctx.family.is_vm() {
            return Ok(outcome);
        }

        let instructions = collect_instructions(outcome.buffer.as_str());
        log::debug!("Collected {} VM instructions", instructions.len());
        let state = VmState::run(&instructions);

        for opcode in &state.unknown {
            outcome.record_failure(format!("VM failed on {}", opcode));
        }

        let replaced = match state.output() {
            Some(text) => outcome.buffer.set(text),
            None => false,
        };
        if replaced {
            for step in &state.handled {
                outcome.record_change(format!("Replayed {}", step));
            }
        } else if !state.handled.is_empty() {
            outcome.record_note(format!("Replayed {} instruction(s) without output", state.handled.len()));
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::signature::Family;

    fn apply(src: &str, family: Family) -> PhaseOutcome {
        let config = Config::default();
        let ctx = PhaseContext::new(family, &config);
        VmReconstructionPhase::new().apply(WorkingBuffer::from(src), &ctx).unwrap()
    }

    #[test]
    fn test_collects_in_source_order() {
        let instructions = collect_instructions("VM.LOADK(\"a\") -- CALL()\nVM.CALL(MOVE(1, 2))");
        let opcodes: Vec<&str> = instructions.iter().map(|i| i.opcode.as_str()).collect();
        assert_eq!(opcodes, vec!["LOADK", "CALL", "MOVE"]);
        assert_eq!(instructions[0].operands, vec!["\"a\""]);
        assert_eq!(instructions[2].to_string(), "MOVE(1, 2)");
    }

    #[test]
    fn test_replay() {
        let outcome = apply("VM.LOADK(\"hello\")\nVM.LOADK(print)\nVM.CALL()", Family::GenericVm);
        assert_eq!(outcome.buffer.as_str(), "\"hello\"\ncalled");
        assert_eq!(outcome.changes, 3);
    }

    #[test]
    fn test_unknown_opcode_logged() {
        let outcome = apply("VM.LOADK(1)\nVM.JMP(4)\nVM.LOADK(2)", Family::GenericVm);
        assert_eq!(outcome.buffer.as_str(), "1\n2");
        assert_eq!(outcome.failure_count(), 1);
        assert!(outcome.entries.iter().any(|e| e.description == "VM failed on JMP"));
    }

    #[test]
    fn test_inactive_for_non_vm_family() {
        let src = "LOADK(\"hello\")\nCALL()";
        let outcome = apply(src, Family::MoonSec);
        assert_eq!(outcome.buffer.as_str(), src);
        assert!(outcome.entries.is_empty());
    }

    #[test]
    fn test_empty_stack_leaves_buffer() {
        let src = "VM.LOADK(1)\nVM.RETURN()";
        let outcome = apply(src, Family::GenericVm);
        assert_eq!(outcome.buffer.as_str(), src);
        assert_eq!(outcome.changes, 0);
    }
}
