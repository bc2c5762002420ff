//! Bytecode decoding: raw `code` bytes to a linear instruction list.

use std::collections::BTreeMap;
use std::io::Cursor;

use binrw::BinRead;

use crate::code_attribute::{
    instruction, InstrInfo, LookupSwitch, OpcodeFlags, OperandLen, TableSwitch, WideOperands,
};

use super::error::{DecompileError, DecompileResult};

/// Switch operands with jump targets resolved to absolute offsets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SwitchTargets {
    /// `(key, target offset)` in table order.
    pub cases: Vec<(i32, u32)>,
    pub default: u32,
}

impl SwitchTargets {
    /// Key to target offset, with the default stored under `-1` unless a real
    /// case already uses that key.
    pub fn as_key_map(&self) -> BTreeMap<i32, u32> {
        let mut map: BTreeMap<i32, u32> = self.cases.iter().copied().collect();
        map.entry(-1).or_insert(self.default);
        map
    }

    /// Distinct targets, cases first in table order, then the default.
    pub fn targets(&self) -> Vec<u32> {
        let mut out: Vec<u32> = Vec::new();
        for target in self.cases.iter().map(|(_, t)| *t).chain(std::iter::once(self.default)) {
            if !out.contains(&target) {
                out.push(target);
            }
        }
        out
    }
}

/// One decoded instruction.
#[derive(Clone, Debug, PartialEq)]
pub struct Instruction {
    pub offset: u32,
    /// Metadata of the executed instruction; for `wide` forms this is the
    /// widened instruction.
    pub info: &'static InstrInfo,
    /// Raw operand bytes. Widened forms hold their 2-byte index (and 2-byte
    /// `iinc` delta).
    pub operands: Vec<u8>,
    pub wide: bool,
    /// Absolute target of a branch or goto.
    pub jump: Option<i64>,
    pub switch: Option<SwitchTargets>,
    /// Encoded length in bytes, opcode included.
    pub length: u32,
}

impl Instruction {
    pub fn u8_operand(&self) -> u8 {
        self.operands.first().copied().unwrap_or(0)
    }

    pub fn u16_operand(&self) -> u16 {
        match self.operands.as_slice() {
            [hi, lo, ..] => u16::from_be_bytes([*hi, *lo]),
            _ => 0,
        }
    }

    /// Local-variable index of a load, store, `iinc` or `ret`.
    pub fn local_index(&self) -> u16 {
        if self.wide {
            self.u16_operand()
        } else {
            self.u8_operand() as u16
        }
    }

    /// Increment of an `iinc`.
    pub fn iinc_delta(&self) -> i32 {
        if self.wide {
            match self.operands.as_slice() {
                [_, _, hi, lo] => i16::from_be_bytes([*hi, *lo]) as i32,
                _ => 0,
            }
        } else {
            self.operands.get(1).map(|b| *b as i8 as i32).unwrap_or(0)
        }
    }

    /// Sign-extended immediate of `bipush`/`sipush`.
    pub fn immediate(&self) -> i32 {
        match self.operands.as_slice() {
            [b] => *b as i8 as i32,
            [hi, lo] => i16::from_be_bytes([*hi, *lo]) as i32,
            _ => 0,
        }
    }
}

/// Instruction list plus offset/index maps in both directions.
#[derive(Clone, Debug, Default)]
pub struct DecodedCode {
    pub nodes: Vec<Instruction>,
    pub offset_to_index: BTreeMap<u32, usize>,
    pub index_to_offset: Vec<u32>,
}

impl DecodedCode {
    pub fn index_of(&self, offset: u32) -> Option<usize> {
        self.offset_to_index.get(&offset).copied()
    }
}

pub fn decode(code: &[u8]) -> DecompileResult<DecodedCode> {
    let mut decoded = DecodedCode::default();
    let mut pos = 0usize;
    while pos < code.len() {
        let offset = pos as u32;
        let instr = decode_one(code, offset)?;
        pos += instr.length as usize;
        decoded.offset_to_index.insert(offset, decoded.nodes.len());
        decoded.index_to_offset.push(offset);
        decoded.nodes.push(instr);
    }
    log::debug!("decoded {} instructions from {} bytes", decoded.nodes.len(), code.len());
    Ok(decoded)
}

fn decode_one(code: &[u8], offset: u32) -> DecompileResult<Instruction> {
    let pos = offset as usize;
    let opcode = code[pos];
    let info = instruction(opcode).ok_or(DecompileError::UnknownOpcode { opcode, offset })?;
    let mut cursor = Cursor::new(code);
    cursor.set_position(pos as u64 + 1);
    let malformed = |source| DecompileError::Operands { offset, source };

    let mut instr = Instruction {
        offset,
        info,
        operands: Vec::new(),
        wide: false,
        jump: None,
        switch: None,
        length: 1,
    };

    match info.operands {
        OperandLen::Fixed(n) => {
            let end = pos + 1 + n as usize;
            let bytes = code
                .get(pos + 1..end)
                .ok_or(DecompileError::Truncated { offset })?;
            instr.operands = bytes.to_vec();
            instr.length += n as u32;
            let has_offset = info.is_branch()
                || info.is_goto()
                || (info.flags.contains(OpcodeFlags::SUBROUTINE) && n >= 2);
            if has_offset {
                let rel = match bytes {
                    [a, b, c, d] => i32::from_be_bytes([*a, *b, *c, *d]) as i64,
                    [hi, lo] => i16::from_be_bytes([*hi, *lo]) as i64,
                    _ => return Err(DecompileError::Truncated { offset }),
                };
                instr.jump = Some(offset as i64 + rel);
            }
        }
        OperandLen::TableSwitch => {
            let table = TableSwitch::read_args(&mut cursor, binrw::args! { address: offset })
                .map_err(malformed)?;
            instr.length += table.encoded_len(offset);
            let base = offset as i64;
            let mut cases = Vec::with_capacity(table.offsets.len());
            for (i, rel) in table.offsets.iter().enumerate() {
                let key = table.low.wrapping_add(i as i32);
                cases.push((key, absolute(base, *rel, offset)?));
            }
            instr.switch = Some(SwitchTargets {
                cases,
                default: absolute(base, table.default, offset)?,
            });
        }
        OperandLen::LookupSwitch => {
            let table = LookupSwitch::read_args(&mut cursor, binrw::args! { address: offset })
                .map_err(malformed)?;
            instr.length += table.encoded_len(offset);
            let base = offset as i64;
            let cases = table
                .pairs
                .iter()
                .map(|(key, rel)| Ok((*key, absolute(base, *rel, offset)?)))
                .collect::<DecompileResult<Vec<_>>>()?;
            instr.switch = Some(SwitchTargets {
                cases,
                default: absolute(base, table.default, offset)?,
            });
        }
        OperandLen::Wide => {
            let widened = WideOperands::read(&mut cursor).map_err(malformed)?;
            instr.length += widened.encoded_len();
            instr.wide = true;
            match widened {
                WideOperands::Iinc { index, delta } => {
                    instr.info = widened_info(0x84, offset)?;
                    instr.operands = [index.to_be_bytes(), delta.to_be_bytes()].concat();
                }
                WideOperands::Local { opcode, index } => {
                    instr.info = widened_info(opcode, offset)?;
                    instr.operands = index.to_be_bytes().to_vec();
                }
            }
        }
    }
    log::trace!("{:>5}: {} {:?}", offset, instr.info.name, instr.operands);
    Ok(instr)
}

fn widened_info(opcode: u8, offset: u32) -> DecompileResult<&'static InstrInfo> {
    instruction(opcode).ok_or(DecompileError::UnknownOpcode { opcode, offset })
}

fn absolute(base: i64, rel: i32, offset: u32) -> DecompileResult<u32> {
    let target = base + rel as i64;
    u32::try_from(target).map_err(|_| DecompileError::InvalidTarget { offset, target })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code_attribute::opcodes;

    #[test]
    fn test_decode_simple_sequence() {
        // iconst_1; istore_1; iload_1; ireturn
        let decoded = decode(&[0x04, 0x3c, 0x1b, 0xac]).unwrap();
        assert_eq!(decoded.nodes.len(), 4);
        assert_eq!(decoded.index_to_offset, vec![0, 1, 2, 3]);
        assert_eq!(decoded.nodes[3].info.opcode, opcodes::IRETURN);
    }

    #[test]
    fn test_decode_branch_target() {
        // 0: iload_0; 1: ifeq +5 (-> 6); 4: iconst_1; 5: ireturn; 6: iconst_0; 7: ireturn
        let decoded = decode(&[0x1a, 0x99, 0x00, 0x05, 0x04, 0xac, 0x03, 0xac]).unwrap();
        assert_eq!(decoded.nodes[1].jump, Some(6));
        assert_eq!(decoded.index_of(6), Some(4));
        assert_eq!(decoded.index_of(2), None);
    }

    #[test]
    fn test_decode_wide_iinc() {
        // wide iinc 300, -2; return
        let decoded = decode(&[0xc4, 0x84, 0x01, 0x2c, 0xff, 0xfe, 0xb1]).unwrap();
        let iinc = &decoded.nodes[0];
        assert!(iinc.wide);
        assert_eq!(iinc.info.opcode, opcodes::IINC);
        assert_eq!(iinc.local_index(), 300);
        assert_eq!(iinc.iinc_delta(), -2);
        assert_eq!(iinc.length, 6);
        assert_eq!(decoded.nodes[1].offset, 6);
    }

    #[test]
    fn test_unknown_opcode() {
        let err = decode(&[0x00, 0xcb]).unwrap_err();
        assert!(matches!(err, DecompileError::UnknownOpcode { opcode: 0xcb, offset: 1 }));
    }

    #[test]
    fn test_truncated_operand() {
        let err = decode(&[0x11, 0x01]).unwrap_err();
        assert!(matches!(err, DecompileError::Truncated { offset: 0 }));
    }

    #[test]
    fn test_switch_key_map_default() {
        let targets = SwitchTargets {
            cases: vec![(1, 20), (2, 30)],
            default: 40,
        };
        let map = targets.as_key_map();
        assert_eq!(map.get(&-1), Some(&40));
        assert_eq!(map.get(&2), Some(&30));
        assert_eq!(targets.targets(), vec![20, 30, 40]);

        let colliding = SwitchTargets {
            cases: vec![(-1, 20)],
            default: 40,
        };
        assert_eq!(colliding.as_key_map().get(&-1), Some(&20));
    }
}
