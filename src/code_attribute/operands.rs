use binrw::binread;

/// Operands of `tableswitch`. `address` is the byte offset of the opcode; the
/// operands start at the next 4-byte boundary.
#[derive(Clone, Debug, Eq, PartialEq)]
#[binread]
#[br(big, import { address: u32 })]
pub struct TableSwitch {
    #[br(pad_before = ((4 - (address + 1) % 4) % 4))]
    pub default: i32,
    pub low: i32,
    #[br(assert(high >= low, "tableswitch high {} below low {}", high, low))]
    pub high: i32,
    #[br(count = (high as i64 - low as i64 + 1) as usize)]
    pub offsets: Vec<i32>,
}

/// Operands of `lookupswitch`, aligned like [`TableSwitch`].
#[derive(Clone, Debug, Eq, PartialEq)]
#[binread]
#[br(big, import { address: u32 })]
pub struct LookupSwitch {
    #[br(pad_before = ((4 - (address + 1) % 4) % 4))]
    pub default: i32,
    pub npairs: u32,
    #[br(count = npairs)]
    pub pairs: Vec<(i32, i32)>,
}

/// Instruction following a `wide` prefix.
#[derive(Clone, Debug, Eq, PartialEq)]
#[binread]
#[br(big)]
pub enum WideOperands {
    #[br(magic = 0x84u8)]
    Iinc { index: u16, delta: i16 },
    Local {
        #[br(assert(
            matches!(opcode, 0x15..=0x19 | 0x36..=0x3a | 0xa9),
            "opcode {:#04x} cannot be widened",
            opcode
        ))]
        opcode: u8,
        index: u16,
    },
}

impl WideOperands {
    /// Encoded length of the widened instruction, excluding the `wide` byte.
    pub fn encoded_len(&self) -> u32 {
        match self {
            WideOperands::Iinc { .. } => 5,
            WideOperands::Local { .. } => 3,
        }
    }
}

impl TableSwitch {
    /// Encoded length including padding, excluding the opcode byte.
    pub fn encoded_len(&self, address: u32) -> u32 {
        (4 - (address + 1) % 4) % 4 + 12 + 4 * self.offsets.len() as u32
    }
}

impl LookupSwitch {
    pub fn encoded_len(&self, address: u32) -> u32 {
        (4 - (address + 1) % 4) % 4 + 8 + 8 * self.pairs.len() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use binrw::BinRead;
    use std::io::Cursor;

    #[test]
    fn test_tableswitch_alignment() {
        // Opcode at 3: operands begin at 4, no padding.
        let unpadded = vec![0, 0, 0, 10, 0, 0, 0, 20, 0, 0, 0, 21, 0, 0, 0, 30, 0, 0, 0, 31];
        // Opcode at 0: three padding bytes.
        let mut padded = vec![0, 0, 0];
        padded.extend_from_slice(&unpadded);

        let expected = TableSwitch {
            default: 10,
            low: 20,
            high: 21,
            offsets: vec![30, 31],
        };
        for (address, bytes) in [(3u32, unpadded), (0u32, padded)] {
            let parsed =
                TableSwitch::read_args(&mut Cursor::new(&bytes), binrw::args! { address })
                    .unwrap();
            assert_eq!(parsed, expected);
            assert_eq!(parsed.encoded_len(address) as usize, bytes.len());
        }
    }

    #[test]
    fn test_lookupswitch_pairs() {
        let bytes = vec![
            0, 0, // padding for address 1
            0, 0, 0, 40, // default
            0, 0, 0, 2, // npairs
            0xff, 0xff, 0xff, 0xff, 0, 0, 0, 20, // -1 => 20
            0, 0, 0, 7, 0, 0, 0, 30, // 7 => 30
        ];
        let parsed =
            LookupSwitch::read_args(&mut Cursor::new(&bytes), binrw::args! { address: 1 })
                .unwrap();
        assert_eq!(parsed.default, 40);
        assert_eq!(parsed.pairs, vec![(-1, 20), (7, 30)]);
        assert_eq!(parsed.encoded_len(1) as usize, bytes.len());
    }

    #[test]
    fn test_wide_forms() {
        let iload = WideOperands::read(&mut Cursor::new(&[0x15u8, 0xaa, 0xbb])).unwrap();
        assert_eq!(iload, WideOperands::Local { opcode: 0x15, index: 0xaabb });

        let iinc = WideOperands::read(&mut Cursor::new(&[0x84u8, 0x01, 0x00, 0xff, 0xfe])).unwrap();
        assert_eq!(iinc, WideOperands::Iinc { index: 0x100, delta: -2 });
        assert_eq!(iinc.encoded_len(), 5);

        assert!(WideOperands::read(&mut Cursor::new(&[0x60u8, 0, 0])).is_err());
    }
}
