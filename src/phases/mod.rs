// Fri Jan 16 2026 - Alex

pub mod anti_tamper;
pub mod cleanup;
pub mod control_flow;
pub mod literals;
pub mod vm;

pub use anti_tamper::{AntiTamperPhase, Guard};
pub use cleanup::CleanupPhase;
pub use control_flow::ControlFlowPhase;
pub use literals::{LiteralDecoder, LiteralDecodingPhase};
pub use vm::{VmInstruction, VmReconstructionPhase, VmState};
