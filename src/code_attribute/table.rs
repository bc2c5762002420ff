//! Static per-opcode metadata: operand length, stack shape and control-flow kind.
//!
//! The table is built once on first use and never mutated afterwards.

use bitflags::bitflags;
use once_cell::sync::Lazy;

bitflags! {
    /// Control-flow and bookkeeping properties of an opcode.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct OpcodeFlags: u16 {
        /// Conditional branch with a signed 2-byte offset.
        const BRANCH = 0x0001;
        const GOTO = 0x0002;
        const SWITCH = 0x0004;
        const RETURN = 0x0008;
        const THROW = 0x0010;
        const NOP = 0x0020;
        /// Branch offset is 4 bytes wide (`goto_w`, `jsr_w`).
        const LONG_OFFSET = 0x0040;
        const SUBROUTINE = 0x0080;
        const INVOKE = 0x0100;
        /// Synthetic node that never appears in a class file.
        const PSEUDO = 0x0200;
    }
}

/// How many operand bytes follow the opcode byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperandLen {
    Fixed(u8),
    TableSwitch,
    LookupSwitch,
    Wide,
}

/// Stack count that depends on the operand (invocations, `multianewarray`).
pub const VARIES: u8 = u8::MAX;

/// Immutable descriptor of one instruction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstrInfo {
    pub opcode: u8,
    pub name: &'static str,
    pub operands: OperandLen,
    pub pops: u8,
    pub pushes: u8,
    pub flags: OpcodeFlags,
}

impl InstrInfo {
    pub fn is_branch(&self) -> bool {
        self.flags.contains(OpcodeFlags::BRANCH)
    }

    pub fn is_goto(&self) -> bool {
        self.flags.contains(OpcodeFlags::GOTO)
    }

    pub fn is_switch(&self) -> bool {
        self.flags.contains(OpcodeFlags::SWITCH)
    }

    /// Return-family instruction or `athrow`: control leaves the method.
    pub fn exits_method(&self) -> bool {
        self.flags.intersects(OpcodeFlags::RETURN | OpcodeFlags::THROW)
    }

    pub fn is_nop(&self) -> bool {
        self.flags.contains(OpcodeFlags::NOP)
    }

    pub fn is_pseudo(&self) -> bool {
        self.flags.contains(OpcodeFlags::PSEUDO)
    }

    /// Entries pushed, counting operand-dependent forms as one.
    pub fn push_count(&self) -> usize {
        if self.pushes == VARIES {
            1
        } else {
            self.pushes as usize
        }
    }
}

const F0: OperandLen = OperandLen::Fixed(0);
const F1: OperandLen = OperandLen::Fixed(1);
const F2: OperandLen = OperandLen::Fixed(2);
const F3: OperandLen = OperandLen::Fixed(3);
const F4: OperandLen = OperandLen::Fixed(4);

const PLAIN: OpcodeFlags = OpcodeFlags::empty();
const BRANCH: OpcodeFlags = OpcodeFlags::BRANCH;
const RETURN: OpcodeFlags = OpcodeFlags::RETURN;
const INVOKE: OpcodeFlags = OpcodeFlags::INVOKE;

macro_rules! instruction_table {
    ($( $konst:ident = $code:literal => $name:literal, $operands:expr, $pops:expr, $pushes:expr, $flags:expr; )*) => {
        /// Opcode byte values.
        pub mod opcodes {
            $( pub const $konst: u8 = $code; )*
        }

        static RAW_TABLE: &[InstrInfo] = &[
            $( InstrInfo {
                opcode: $code,
                name: $name,
                operands: $operands,
                pops: $pops,
                pushes: $pushes,
                flags: $flags,
            }, )*
        ];
    };
}

instruction_table! {
    NOP = 0x00 => "nop", F0, 0, 0, OpcodeFlags::NOP;
    ACONST_NULL = 0x01 => "aconst_null", F0, 0, 1, PLAIN;
    ICONST_M1 = 0x02 => "iconst_m1", F0, 0, 1, PLAIN;
    ICONST_0 = 0x03 => "iconst_0", F0, 0, 1, PLAIN;
    ICONST_1 = 0x04 => "iconst_1", F0, 0, 1, PLAIN;
    ICONST_2 = 0x05 => "iconst_2", F0, 0, 1, PLAIN;
    ICONST_3 = 0x06 => "iconst_3", F0, 0, 1, PLAIN;
    ICONST_4 = 0x07 => "iconst_4", F0, 0, 1, PLAIN;
    ICONST_5 = 0x08 => "iconst_5", F0, 0, 1, PLAIN;
    LCONST_0 = 0x09 => "lconst_0", F0, 0, 1, PLAIN;
    LCONST_1 = 0x0a => "lconst_1", F0, 0, 1, PLAIN;
    FCONST_0 = 0x0b => "fconst_0", F0, 0, 1, PLAIN;
    FCONST_1 = 0x0c => "fconst_1", F0, 0, 1, PLAIN;
    FCONST_2 = 0x0d => "fconst_2", F0, 0, 1, PLAIN;
    DCONST_0 = 0x0e => "dconst_0", F0, 0, 1, PLAIN;
    DCONST_1 = 0x0f => "dconst_1", F0, 0, 1, PLAIN;
    BIPUSH = 0x10 => "bipush", F1, 0, 1, PLAIN;
    SIPUSH = 0x11 => "sipush", F2, 0, 1, PLAIN;
    LDC = 0x12 => "ldc", F1, 0, 1, PLAIN;
    LDC_W = 0x13 => "ldc_w", F2, 0, 1, PLAIN;
    LDC2_W = 0x14 => "ldc2_w", F2, 0, 1, PLAIN;
    ILOAD = 0x15 => "iload", F1, 0, 1, PLAIN;
    LLOAD = 0x16 => "lload", F1, 0, 1, PLAIN;
    FLOAD = 0x17 => "fload", F1, 0, 1, PLAIN;
    DLOAD = 0x18 => "dload", F1, 0, 1, PLAIN;
    ALOAD = 0x19 => "aload", F1, 0, 1, PLAIN;
    ILOAD_0 = 0x1a => "iload_0", F0, 0, 1, PLAIN;
    ILOAD_1 = 0x1b => "iload_1", F0, 0, 1, PLAIN;
    ILOAD_2 = 0x1c => "iload_2", F0, 0, 1, PLAIN;
    ILOAD_3 = 0x1d => "iload_3", F0, 0, 1, PLAIN;
    LLOAD_0 = 0x1e => "lload_0", F0, 0, 1, PLAIN;
    LLOAD_1 = 0x1f => "lload_1", F0, 0, 1, PLAIN;
    LLOAD_2 = 0x20 => "lload_2", F0, 0, 1, PLAIN;
    LLOAD_3 = 0x21 => "lload_3", F0, 0, 1, PLAIN;
    FLOAD_0 = 0x22 => "fload_0", F0, 0, 1, PLAIN;
    FLOAD_1 = 0x23 => "fload_1", F0, 0, 1, PLAIN;
    FLOAD_2 = 0x24 => "fload_2", F0, 0, 1, PLAIN;
    FLOAD_3 = 0x25 => "fload_3", F0, 0, 1, PLAIN;
    DLOAD_0 = 0x26 => "dload_0", F0, 0, 1, PLAIN;
    DLOAD_1 = 0x27 => "dload_1", F0, 0, 1, PLAIN;
    DLOAD_2 = 0x28 => "dload_2", F0, 0, 1, PLAIN;
    DLOAD_3 = 0x29 => "dload_3", F0, 0, 1, PLAIN;
    ALOAD_0 = 0x2a => "aload_0", F0, 0, 1, PLAIN;
    ALOAD_1 = 0x2b => "aload_1", F0, 0, 1, PLAIN;
    ALOAD_2 = 0x2c => "aload_2", F0, 0, 1, PLAIN;
    ALOAD_3 = 0x2d => "aload_3", F0, 0, 1, PLAIN;
    IALOAD = 0x2e => "iaload", F0, 2, 1, PLAIN;
    LALOAD = 0x2f => "laload", F0, 2, 1, PLAIN;
    FALOAD = 0x30 => "faload", F0, 2, 1, PLAIN;
    DALOAD = 0x31 => "daload", F0, 2, 1, PLAIN;
    AALOAD = 0x32 => "aaload", F0, 2, 1, PLAIN;
    BALOAD = 0x33 => "baload", F0, 2, 1, PLAIN;
    CALOAD = 0x34 => "caload", F0, 2, 1, PLAIN;
    SALOAD = 0x35 => "saload", F0, 2, 1, PLAIN;
    ISTORE = 0x36 => "istore", F1, 1, 0, PLAIN;
    LSTORE = 0x37 => "lstore", F1, 1, 0, PLAIN;
    FSTORE = 0x38 => "fstore", F1, 1, 0, PLAIN;
    DSTORE = 0x39 => "dstore", F1, 1, 0, PLAIN;
    ASTORE = 0x3a => "astore", F1, 1, 0, PLAIN;
    ISTORE_0 = 0x3b => "istore_0", F0, 1, 0, PLAIN;
    ISTORE_1 = 0x3c => "istore_1", F0, 1, 0, PLAIN;
    ISTORE_2 = 0x3d => "istore_2", F0, 1, 0, PLAIN;
    ISTORE_3 = 0x3e => "istore_3", F0, 1, 0, PLAIN;
    LSTORE_0 = 0x3f => "lstore_0", F0, 1, 0, PLAIN;
    LSTORE_1 = 0x40 => "lstore_1", F0, 1, 0, PLAIN;
    LSTORE_2 = 0x41 => "lstore_2", F0, 1, 0, PLAIN;
    LSTORE_3 = 0x42 => "lstore_3", F0, 1, 0, PLAIN;
    FSTORE_0 = 0x43 => "fstore_0", F0, 1, 0, PLAIN;
    FSTORE_1 = 0x44 => "fstore_1", F0, 1, 0, PLAIN;
    FSTORE_2 = 0x45 => "fstore_2", F0, 1, 0, PLAIN;
    FSTORE_3 = 0x46 => "fstore_3", F0, 1, 0, PLAIN;
    DSTORE_0 = 0x47 => "dstore_0", F0, 1, 0, PLAIN;
    DSTORE_1 = 0x48 => "dstore_1", F0, 1, 0, PLAIN;
    DSTORE_2 = 0x49 => "dstore_2", F0, 1, 0, PLAIN;
    DSTORE_3 = 0x4a => "dstore_3", F0, 1, 0, PLAIN;
    ASTORE_0 = 0x4b => "astore_0", F0, 1, 0, PLAIN;
    ASTORE_1 = 0x4c => "astore_1", F0, 1, 0, PLAIN;
    ASTORE_2 = 0x4d => "astore_2", F0, 1, 0, PLAIN;
    ASTORE_3 = 0x4e => "astore_3", F0, 1, 0, PLAIN;
    IASTORE = 0x4f => "iastore", F0, 3, 0, PLAIN;
    LASTORE = 0x50 => "lastore", F0, 3, 0, PLAIN;
    FASTORE = 0x51 => "fastore", F0, 3, 0, PLAIN;
    DASTORE = 0x52 => "dastore", F0, 3, 0, PLAIN;
    AASTORE = 0x53 => "aastore", F0, 3, 0, PLAIN;
    BASTORE = 0x54 => "bastore", F0, 3, 0, PLAIN;
    CASTORE = 0x55 => "castore", F0, 3, 0, PLAIN;
    SASTORE = 0x56 => "sastore", F0, 3, 0, PLAIN;
    POP = 0x57 => "pop", F0, 1, 0, PLAIN;
    POP2 = 0x58 => "pop2", F0, 2, 0, PLAIN;
    DUP = 0x59 => "dup", F0, 1, 2, PLAIN;
    DUP_X1 = 0x5a => "dup_x1", F0, 2, 3, PLAIN;
    DUP_X2 = 0x5b => "dup_x2", F0, 3, 4, PLAIN;
    DUP2 = 0x5c => "dup2", F0, 2, 4, PLAIN;
    DUP2_X1 = 0x5d => "dup2_x1", F0, 3, 5, PLAIN;
    DUP2_X2 = 0x5e => "dup2_x2", F0, 4, 6, PLAIN;
    SWAP = 0x5f => "swap", F0, 2, 2, PLAIN;
    IADD = 0x60 => "iadd", F0, 2, 1, PLAIN;
    LADD = 0x61 => "ladd", F0, 2, 1, PLAIN;
    FADD = 0x62 => "fadd", F0, 2, 1, PLAIN;
    DADD = 0x63 => "dadd", F0, 2, 1, PLAIN;
    ISUB = 0x64 => "isub", F0, 2, 1, PLAIN;
    LSUB = 0x65 => "lsub", F0, 2, 1, PLAIN;
    FSUB = 0x66 => "fsub", F0, 2, 1, PLAIN;
    DSUB = 0x67 => "dsub", F0, 2, 1, PLAIN;
    IMUL = 0x68 => "imul", F0, 2, 1, PLAIN;
    LMUL = 0x69 => "lmul", F0, 2, 1, PLAIN;
    FMUL = 0x6a => "fmul", F0, 2, 1, PLAIN;
    DMUL = 0x6b => "dmul", F0, 2, 1, PLAIN;
    IDIV = 0x6c => "idiv", F0, 2, 1, PLAIN;
    LDIV = 0x6d => "ldiv", F0, 2, 1, PLAIN;
    FDIV = 0x6e => "fdiv", F0, 2, 1, PLAIN;
    DDIV = 0x6f => "ddiv", F0, 2, 1, PLAIN;
    IREM = 0x70 => "irem", F0, 2, 1, PLAIN;
    LREM = 0x71 => "lrem", F0, 2, 1, PLAIN;
    FREM = 0x72 => "frem", F0, 2, 1, PLAIN;
    DREM = 0x73 => "drem", F0, 2, 1, PLAIN;
    INEG = 0x74 => "ineg", F0, 1, 1, PLAIN;
    LNEG = 0x75 => "lneg", F0, 1, 1, PLAIN;
    FNEG = 0x76 => "fneg", F0, 1, 1, PLAIN;
    DNEG = 0x77 => "dneg", F0, 1, 1, PLAIN;
    ISHL = 0x78 => "ishl", F0, 2, 1, PLAIN;
    LSHL = 0x79 => "lshl", F0, 2, 1, PLAIN;
    ISHR = 0x7a => "ishr", F0, 2, 1, PLAIN;
    LSHR = 0x7b => "lshr", F0, 2, 1, PLAIN;
    IUSHR = 0x7c => "iushr", F0, 2, 1, PLAIN;
    LUSHR = 0x7d => "lushr", F0, 2, 1, PLAIN;
    IAND = 0x7e => "iand", F0, 2, 1, PLAIN;
    LAND = 0x7f => "land", F0, 2, 1, PLAIN;
    IOR = 0x80 => "ior", F0, 2, 1, PLAIN;
    LOR = 0x81 => "lor", F0, 2, 1, PLAIN;
    IXOR = 0x82 => "ixor", F0, 2, 1, PLAIN;
    LXOR = 0x83 => "lxor", F0, 2, 1, PLAIN;
    IINC = 0x84 => "iinc", F2, 0, 0, PLAIN;
    I2L = 0x85 => "i2l", F0, 1, 1, PLAIN;
    I2F = 0x86 => "i2f", F0, 1, 1, PLAIN;
    I2D = 0x87 => "i2d", F0, 1, 1, PLAIN;
    L2I = 0x88 => "l2i", F0, 1, 1, PLAIN;
    L2F = 0x89 => "l2f", F0, 1, 1, PLAIN;
    L2D = 0x8a => "l2d", F0, 1, 1, PLAIN;
    F2I = 0x8b => "f2i", F0, 1, 1, PLAIN;
    F2L = 0x8c => "f2l", F0, 1, 1, PLAIN;
    F2D = 0x8d => "f2d", F0, 1, 1, PLAIN;
    D2I = 0x8e => "d2i", F0, 1, 1, PLAIN;
    D2L = 0x8f => "d2l", F0, 1, 1, PLAIN;
    D2F = 0x90 => "d2f", F0, 1, 1, PLAIN;
    I2B = 0x91 => "i2b", F0, 1, 1, PLAIN;
    I2C = 0x92 => "i2c", F0, 1, 1, PLAIN;
    I2S = 0x93 => "i2s", F0, 1, 1, PLAIN;
    LCMP = 0x94 => "lcmp", F0, 2, 1, PLAIN;
    FCMPL = 0x95 => "fcmpl", F0, 2, 1, PLAIN;
    FCMPG = 0x96 => "fcmpg", F0, 2, 1, PLAIN;
    DCMPL = 0x97 => "dcmpl", F0, 2, 1, PLAIN;
    DCMPG = 0x98 => "dcmpg", F0, 2, 1, PLAIN;
    IFEQ = 0x99 => "ifeq", F2, 1, 0, BRANCH;
    IFNE = 0x9a => "ifne", F2, 1, 0, BRANCH;
    IFLT = 0x9b => "iflt", F2, 1, 0, BRANCH;
    IFGE = 0x9c => "ifge", F2, 1, 0, BRANCH;
    IFGT = 0x9d => "ifgt", F2, 1, 0, BRANCH;
    IFLE = 0x9e => "ifle", F2, 1, 0, BRANCH;
    IF_ICMPEQ = 0x9f => "if_icmpeq", F2, 2, 0, BRANCH;
    IF_ICMPNE = 0xa0 => "if_icmpne", F2, 2, 0, BRANCH;
    IF_ICMPLT = 0xa1 => "if_icmplt", F2, 2, 0, BRANCH;
    IF_ICMPGE = 0xa2 => "if_icmpge", F2, 2, 0, BRANCH;
    IF_ICMPGT = 0xa3 => "if_icmpgt", F2, 2, 0, BRANCH;
    IF_ICMPLE = 0xa4 => "if_icmple", F2, 2, 0, BRANCH;
    IF_ACMPEQ = 0xa5 => "if_acmpeq", F2, 2, 0, BRANCH;
    IF_ACMPNE = 0xa6 => "if_acmpne", F2, 2, 0, BRANCH;
    GOTO = 0xa7 => "goto", F2, 0, 0, OpcodeFlags::GOTO;
    JSR = 0xa8 => "jsr", F2, 0, 1, OpcodeFlags::SUBROUTINE;
    RET = 0xa9 => "ret", F1, 0, 0, OpcodeFlags::SUBROUTINE;
    TABLESWITCH = 0xaa => "tableswitch", OperandLen::TableSwitch, 1, 0, OpcodeFlags::SWITCH;
    LOOKUPSWITCH = 0xab => "lookupswitch", OperandLen::LookupSwitch, 1, 0, OpcodeFlags::SWITCH;
    IRETURN = 0xac => "ireturn", F0, 1, 0, RETURN;
    LRETURN = 0xad => "lreturn", F0, 1, 0, RETURN;
    FRETURN = 0xae => "freturn", F0, 1, 0, RETURN;
    DRETURN = 0xaf => "dreturn", F0, 1, 0, RETURN;
    ARETURN = 0xb0 => "areturn", F0, 1, 0, RETURN;
    RETURN = 0xb1 => "return", F0, 0, 0, RETURN;
    GETSTATIC = 0xb2 => "getstatic", F2, 0, 1, PLAIN;
    PUTSTATIC = 0xb3 => "putstatic", F2, 1, 0, PLAIN;
    GETFIELD = 0xb4 => "getfield", F2, 1, 1, PLAIN;
    PUTFIELD = 0xb5 => "putfield", F2, 2, 0, PLAIN;
    INVOKEVIRTUAL = 0xb6 => "invokevirtual", F2, VARIES, VARIES, INVOKE;
    INVOKESPECIAL = 0xb7 => "invokespecial", F2, VARIES, VARIES, INVOKE;
    INVOKESTATIC = 0xb8 => "invokestatic", F2, VARIES, VARIES, INVOKE;
    INVOKEINTERFACE = 0xb9 => "invokeinterface", F4, VARIES, VARIES, INVOKE;
    INVOKEDYNAMIC = 0xba => "invokedynamic", F4, VARIES, VARIES, INVOKE;
    NEW = 0xbb => "new", F2, 0, 1, PLAIN;
    NEWARRAY = 0xbc => "newarray", F1, 1, 1, PLAIN;
    ANEWARRAY = 0xbd => "anewarray", F2, 1, 1, PLAIN;
    ARRAYLENGTH = 0xbe => "arraylength", F0, 1, 1, PLAIN;
    ATHROW = 0xbf => "athrow", F0, 1, 0, OpcodeFlags::THROW;
    CHECKCAST = 0xc0 => "checkcast", F2, 1, 1, PLAIN;
    INSTANCEOF = 0xc1 => "instanceof", F2, 1, 1, PLAIN;
    MONITORENTER = 0xc2 => "monitorenter", F0, 1, 0, PLAIN;
    MONITOREXIT = 0xc3 => "monitorexit", F0, 1, 0, PLAIN;
    WIDE = 0xc4 => "wide", OperandLen::Wide, 0, 0, PLAIN;
    MULTIANEWARRAY = 0xc5 => "multianewarray", F3, VARIES, 1, PLAIN;
    IFNULL = 0xc6 => "ifnull", F2, 1, 0, BRANCH;
    IFNONNULL = 0xc7 => "ifnonnull", F2, 1, 0, BRANCH;
    GOTO_W = 0xc8 => "goto_w", F4, 0, 0, OpcodeFlags::GOTO.union(OpcodeFlags::LONG_OFFSET);
    JSR_W = 0xc9 => "jsr_w", F4, 0, 1, OpcodeFlags::SUBROUTINE.union(OpcodeFlags::LONG_OFFSET);
}

/// Opcode values of the synthetic nodes added by the jump-graph builder. They are
/// taken from the reserved range and are never decoded from bytecode.
pub mod pseudo {
    pub const START: u8 = 0xfc;
    pub const END: u8 = 0xfd;
    pub const TRY_START: u8 = 0xfe;
}

pub static START: InstrInfo = InstrInfo {
    opcode: pseudo::START,
    name: "start",
    operands: F0,
    pops: 0,
    pushes: 0,
    flags: OpcodeFlags::PSEUDO,
};

pub static END: InstrInfo = InstrInfo {
    opcode: pseudo::END,
    name: "end",
    operands: F0,
    pops: 0,
    pushes: 0,
    flags: OpcodeFlags::PSEUDO,
};

pub static TRY_START: InstrInfo = InstrInfo {
    opcode: pseudo::TRY_START,
    name: "try_start",
    operands: F0,
    pops: 0,
    pushes: 0,
    flags: OpcodeFlags::PSEUDO,
};

static TABLE: Lazy<Vec<Option<&'static InstrInfo>>> = Lazy::new(|| {
    let mut table = vec![None; 256];
    for info in RAW_TABLE {
        table[info.opcode as usize] = Some(info);
    }
    table
});

/// Look up the descriptor for an opcode byte. `None` means the byte is not a
/// valid JVM opcode.
pub fn instruction(opcode: u8) -> Option<&'static InstrInfo> {
    TABLE[opcode as usize]
}

/// Number of defined (non-synthetic) opcodes.
pub fn defined_count() -> usize {
    RAW_TABLE.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_opcodes() {
        let info = instruction(opcodes::TABLESWITCH).unwrap();
        assert_eq!(info.name, "tableswitch");
        assert!(info.is_switch());
        assert_eq!(info.operands, OperandLen::TableSwitch);

        let info = instruction(opcodes::IF_ICMPGE).unwrap();
        assert!(info.is_branch());
        assert_eq!(info.pops, 2);

        let info = instruction(opcodes::GOTO_W).unwrap();
        assert!(info.is_goto());
        assert!(info.flags.contains(OpcodeFlags::LONG_OFFSET));
    }

    #[test]
    fn test_reserved_bytes_are_unknown() {
        assert!(instruction(0xca).is_none());
        assert!(instruction(pseudo::START).is_none());
        assert!(instruction(pseudo::TRY_START).is_none());
        assert!(instruction(0xff).is_none());
    }

    #[test]
    fn test_table_is_dense_up_to_jsr_w() {
        assert_eq!(defined_count(), 0xca);
        for op in 0..=0xc9u8 {
            let info = instruction(op).unwrap_or_else(|| panic!("missing opcode {:#x}", op));
            assert_eq!(info.opcode, op);
        }
    }
}
