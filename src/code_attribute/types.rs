use std::io::Cursor;

use binrw::{binread, BinRead};

/// One row of a method's exception table.
#[derive(Clone, Debug, Eq, PartialEq)]
#[binread]
#[br(big)]
pub struct ExceptionEntry {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    /// Constant-pool index of the caught class, 0 for catch-all handlers.
    pub catch_type: u16,
}

/// A raw attribute nested inside the `Code` attribute. Only carried through.
#[derive(Clone, Debug)]
#[binread]
#[br(big)]
pub struct NestedAttribute {
    pub attribute_name_index: u16,
    pub attribute_length: u32,
    #[br(count = attribute_length)]
    pub info: Vec<u8>,
}

/// Body of a `Code` attribute (everything after the attribute header).
#[derive(Clone, Debug)]
#[binread]
#[br(big)]
pub struct CodeAttribute {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code_length: u32,
    #[br(count = code_length)]
    pub code: Vec<u8>,
    pub exception_table_length: u16,
    #[br(count = exception_table_length)]
    pub exception_table: Vec<ExceptionEntry>,
    pub attributes_count: u16,
    #[br(count = attributes_count)]
    pub attributes: Vec<NestedAttribute>,
}

impl CodeAttribute {
    /// Parse the `info` bytes of a `Code` attribute.
    pub fn parse(info: &[u8]) -> binrw::BinResult<Self> {
        CodeAttribute::read(&mut Cursor::new(info))
    }
}
