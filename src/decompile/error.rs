use thiserror::Error;

/// Error type for decompilation failures. Every variant is fatal for the method
/// being processed and leaves other methods unaffected.
#[derive(Debug, Error)]
pub enum DecompileError {
    #[error("unknown opcode {opcode:#04x} at offset {offset}")]
    UnknownOpcode { opcode: u8, offset: u32 },

    #[error("truncated operands for instruction at offset {offset}")]
    Truncated { offset: u32 },

    #[error("malformed operands for instruction at offset {offset}: {source}")]
    Operands {
        offset: u32,
        #[source]
        source: binrw::Error,
    },

    #[error("branch at offset {offset} targets {target}, which is not an instruction boundary")]
    InvalidTarget { offset: u32, target: i64 },

    #[error("instruction `{instruction}` at offset {offset} is not supported")]
    NotSupported {
        instruction: &'static str,
        offset: u32,
    },

    #[error("operand stack underflow at offset {offset}")]
    StackUnderflow { offset: u32 },

    #[error("expected {expected}, found {found}")]
    UnexpectedValue { expected: &'static str, found: String },

    #[error("constant pool entry #{index} could not be resolved")]
    UnresolvedConstant { index: u16 },

    #[error("invalid descriptor `{0}`")]
    InvalidDescriptor(String),

    #[error("invalid {reason} shape at statement node {node}")]
    InvalidShape { node: usize, reason: &'static str },

    #[error("loop headed by statement node {header} exits to unrelated targets")]
    InvalidBreak { header: usize },

    #[error("loop end node conflict: jump to loop {target} has no enclosing loop")]
    LoopEndConflict { target: usize },
}

pub type DecompileResult<T> = Result<T, DecompileError>;
