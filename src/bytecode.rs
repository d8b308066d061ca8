//! JVM instruction stream decoding.
//!
//! Walks a method's `code` array once, computing each instruction's length
//! (including switch padding and `wide` forms) and resolving constant-pool
//! operands into symbolic references. No control flow is reconstructed.

use serde::Serialize;

use crate::classfile::{ConstantPool, DecodeError, Literal, MemberRef};

pub mod opcodes {
    pub const LDC: u8 = 0x12;
    pub const LDC_W: u8 = 0x13;
    pub const LDC2_W: u8 = 0x14;
    pub const IINC: u8 = 0x84;
    pub const RET: u8 = 0xa9;
    pub const TABLESWITCH: u8 = 0xaa;
    pub const LOOKUPSWITCH: u8 = 0xab;
    pub const GETSTATIC: u8 = 0xb2;
    pub const PUTSTATIC: u8 = 0xb3;
    pub const GETFIELD: u8 = 0xb4;
    pub const PUTFIELD: u8 = 0xb5;
    pub const INVOKEVIRTUAL: u8 = 0xb6;
    pub const INVOKESPECIAL: u8 = 0xb7;
    pub const INVOKESTATIC: u8 = 0xb8;
    pub const INVOKEINTERFACE: u8 = 0xb9;
    pub const INVOKEDYNAMIC: u8 = 0xba;
    pub const NEW: u8 = 0xbb;
    pub const ANEWARRAY: u8 = 0xbd;
    pub const CHECKCAST: u8 = 0xc0;
    pub const INSTANCEOF: u8 = 0xc1;
    pub const WIDE: u8 = 0xc4;
    pub const MULTIANEWARRAY: u8 = 0xc5;
    pub const RETURN: u8 = 0xb1;
    pub const NOP: u8 = 0x00;
}

use opcodes::*;

/// Resolved operand of an instruction. Purely numeric operands (locals,
/// branch offsets, immediates) are not retained.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Operand {
    None,
    Member(MemberRef),
    Dynamic { name: String, descriptor: String },
    Class { name: String },
    Constant { value: Literal },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Instruction {
    pub offset: u32,
    pub opcode: u8,
    pub operand: Operand,
}

impl Instruction {
    pub fn is_invoke(&self) -> bool {
        matches!(
            self.opcode,
            INVOKEVIRTUAL | INVOKESPECIAL | INVOKESTATIC | INVOKEINTERFACE
        )
    }

    pub fn is_field_access(&self) -> bool {
        matches!(self.opcode, GETSTATIC | PUTSTATIC | GETFIELD | PUTFIELD)
    }

    pub fn member(&self) -> Option<&MemberRef> {
        match &self.operand {
            Operand::Member(m) => Some(m),
            _ => None,
        }
    }
}

/// Number of operand bytes following `opcode`, for fixed-length forms.
/// Variable-length and undefined opcodes return `None`.
fn operand_len(opcode: u8) -> Option<usize> {
    let len = match opcode {
        0x00..=0x0f => 0,
        0x10 => 1,
        0x11 => 2,
        LDC => 1,
        LDC_W | LDC2_W => 2,
        0x15..=0x19 => 1,
        0x1a..=0x35 => 0,
        0x36..=0x3a => 1,
        0x3b..=0x83 => 0,
        IINC => 2,
        0x85..=0x98 => 0,
        0x99..=0xa8 => 2,
        RET => 1,
        0xac..=RETURN => 0,
        GETSTATIC..=INVOKESTATIC => 2,
        INVOKEINTERFACE | INVOKEDYNAMIC => 4,
        NEW => 2,
        0xbc => 1,
        ANEWARRAY => 2,
        0xbe | 0xbf => 0,
        CHECKCAST | INSTANCEOF => 2,
        0xc2 | 0xc3 => 0,
        MULTIANEWARRAY => 3,
        0xc6 | 0xc7 => 2,
        0xc8 | 0xc9 => 4,
        0xca | 0xfe | 0xff => 0,
        _ => return None,
    };
    Some(len)
}

fn u2_at(code: &[u8], at: usize) -> Result<u16, DecodeError> {
    match code.get(at..at + 2) {
        Some(b) => Ok(u16::from_be_bytes([b[0], b[1]])),
        None => Err(DecodeError::Truncated { offset: at, wanted: 2 }),
    }
}

fn i4_at(code: &[u8], at: usize) -> Result<i32, DecodeError> {
    match code.get(at..at + 4) {
        Some(b) => Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]])),
        None => Err(DecodeError::Truncated { offset: at, wanted: 4 }),
    }
}

/// Length of a `tableswitch`/`lookupswitch` starting at `pc`, opcode included.
fn switch_len(code: &[u8], pc: usize, opcode: u8) -> Result<usize, DecodeError> {
    let pad = (4 - (pc + 1) % 4) % 4;
    let base = pc + 1 + pad;
    let remaining = code.len().saturating_sub(base) as i64;

    let table_bytes: i64 = if opcode == TABLESWITCH {
        let low = i4_at(code, base + 4)? as i64;
        let high = i4_at(code, base + 8)? as i64;
        if high < low {
            return Err(DecodeError::Malformed(format!(
                "tableswitch at {pc} has high {high} < low {low}"
            )));
        }
        12 + (high - low + 1) * 4
    } else {
        let pairs = i4_at(code, base + 4)? as i64;
        if pairs < 0 {
            return Err(DecodeError::Malformed(format!(
                "lookupswitch at {pc} has negative pair count"
            )));
        }
        8 + pairs * 8
    };

    if table_bytes > remaining {
        return Err(DecodeError::Truncated {
            offset: base,
            wanted: usize::try_from(table_bytes).unwrap_or(usize::MAX),
        });
    }
    Ok(1 + pad + table_bytes as usize)
}

fn wide_len(code: &[u8], pc: usize) -> Result<usize, DecodeError> {
    let Some(&inner) = code.get(pc + 1) else {
        return Err(DecodeError::Truncated {
            offset: pc + 1,
            wanted: 1,
        });
    };
    match inner {
        IINC => Ok(6),
        0x15..=0x19 | 0x36..=0x3a | RET => Ok(4),
        other => Err(DecodeError::BadOpcode {
            opcode: other,
            offset: pc + 1,
        }),
    }
}

fn resolve_operand(
    code: &[u8],
    pc: usize,
    opcode: u8,
    pool: &ConstantPool,
) -> Result<Operand, DecodeError> {
    let operand = match opcode {
        GETSTATIC..=INVOKEINTERFACE => Operand::Member(pool.member_ref(u2_at(code, pc + 1)?)?),
        INVOKEDYNAMIC => {
            let (name, descriptor) = pool.dynamic(u2_at(code, pc + 1)?)?;
            Operand::Dynamic { name, descriptor }
        }
        NEW | ANEWARRAY | CHECKCAST | INSTANCEOF | MULTIANEWARRAY => Operand::Class {
            name: pool.class_name(u2_at(code, pc + 1)?)?.to_string(),
        },
        LDC => loadable(pool, u16::from(code[pc + 1]))?,
        LDC_W | LDC2_W => loadable(pool, u2_at(code, pc + 1)?)?,
        _ => Operand::None,
    };
    Ok(operand)
}

fn loadable(pool: &ConstantPool, index: u16) -> Result<Operand, DecodeError> {
    if let Some(value) = pool.literal(index)? {
        return Ok(Operand::Constant { value });
    }
    match pool.class_name(index) {
        Ok(name) => Ok(Operand::Class {
            name: name.to_string(),
        }),
        // Method handles, method types and dynamic constants carry nothing
        // the checks match on.
        Err(_) => Ok(Operand::None),
    }
}

/// Decode every instruction in a method body, in code order.
pub fn decode_code(code: &[u8], pool: &ConstantPool) -> Result<Vec<Instruction>, DecodeError> {
    let mut instructions = Vec::with_capacity(code.len() / 2);
    let mut pc = 0usize;

    while pc < code.len() {
        let opcode = code[pc];
        let len = match opcode {
            TABLESWITCH | LOOKUPSWITCH => switch_len(code, pc, opcode)?,
            WIDE => wide_len(code, pc)?,
            _ => match operand_len(opcode) {
                Some(n) => 1 + n,
                None => return Err(DecodeError::BadOpcode { opcode, offset: pc }),
            },
        };

        if pc + len > code.len() {
            return Err(DecodeError::Truncated {
                offset: pc,
                wanted: len,
            });
        }

        instructions.push(Instruction {
            offset: pc as u32,
            opcode,
            operand: resolve_operand(code, pc, opcode, pool)?,
        });
        pc += len;
    }

    Ok(instructions)
}
