//! Instruction metadata and the binary layouts used while decoding method code.

pub mod operands;
pub mod table;
pub mod types;

pub use operands::{LookupSwitch, TableSwitch, WideOperands};
pub use table::{instruction, opcodes, InstrInfo, OpcodeFlags, OperandLen};
pub use types::{CodeAttribute, ExceptionEntry};
