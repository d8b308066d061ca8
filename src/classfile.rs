//! JVM class-file decoding.
//!
//! Parses the constant pool, method bodies and class-level annotations of a
//! single `.class` entry. Every read is bounds-checked; malformed input yields
//! a [`DecodeError`] and never panics. Fields, stack map frames, line tables
//! and other debug attributes are skipped.

use serde::Serialize;
use thiserror::Error;

use crate::bytecode::{self, Instruction};
use crate::error::ClassParseFailure;

pub const MAGIC: u32 = 0xCAFE_BABE;
pub const MIN_MAJOR_VERSION: u16 = 45;
pub const MAX_MAJOR_VERSION: u16 = 70;

const MAX_ANNOTATION_DEPTH: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unexpected end of data at offset {offset} (wanted {wanted} bytes)")]
    Truncated { offset: usize, wanted: usize },

    #[error("bad magic {0:#010x}")]
    BadMagic(u32),

    #[error("unsupported class file version {0}")]
    UnsupportedVersion(u16),

    #[error("unknown constant tag {tag} at pool index {index}")]
    BadConstantTag { tag: u8, index: u16 },

    #[error("constant pool index {index}: {reason}")]
    BadConstant { index: u16, reason: &'static str },

    #[error("undefined opcode {opcode:#04x} at offset {offset}")]
    BadOpcode { opcode: u8, offset: usize },

    #[error("{0}")]
    Malformed(String),
}

impl DecodeError {
    pub fn into_failure(self, entry: &str) -> ClassParseFailure {
        ClassParseFailure::new(entry, self.to_string())
    }
}

/// Fixed-width constant value, as loaded by `ldc` or stored in an annotation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Bool(bool),
    Char(char),
    String(String),
}

/// Symbolic reference to a field or method, in internal (slash) form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct MemberRef {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// Slot 0 and the second slot of a long/double.
    Unusable,
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class(u16),
    String(u16),
    FieldRef { class: u16, name_and_type: u16 },
    MethodRef { class: u16, name_and_type: u16 },
    InterfaceMethodRef { class: u16, name_and_type: u16 },
    NameAndType { name: u16, descriptor: u16 },
    MethodHandle { kind: u8, reference: u16 },
    MethodType(u16),
    Dynamic { bootstrap: u16, name_and_type: u16 },
    InvokeDynamic { bootstrap: u16, name_and_type: u16 },
    Module(u16),
    Package(u16),
}

/// Ordered table of constants, indexed from 1 as in the class file.
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    entries: Vec<Constant>,
}

impl ConstantPool {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }

    pub fn get(&self, index: u16) -> Result<&Constant, DecodeError> {
        match self.entries.get(index as usize) {
            Some(Constant::Unusable) | None => Err(DecodeError::BadConstant {
                index,
                reason: "index out of range or unusable",
            }),
            Some(c) => Ok(c),
        }
    }

    pub fn utf8(&self, index: u16) -> Result<&str, DecodeError> {
        match self.get(index)? {
            Constant::Utf8(s) => Ok(s),
            _ => Err(DecodeError::BadConstant {
                index,
                reason: "expected Utf8",
            }),
        }
    }

    pub fn class_name(&self, index: u16) -> Result<&str, DecodeError> {
        match self.get(index)? {
            Constant::Class(name) => self.utf8(*name),
            _ => Err(DecodeError::BadConstant {
                index,
                reason: "expected Class",
            }),
        }
    }

    pub fn name_and_type(&self, index: u16) -> Result<(&str, &str), DecodeError> {
        match self.get(index)? {
            Constant::NameAndType { name, descriptor } => {
                Ok((self.utf8(*name)?, self.utf8(*descriptor)?))
            }
            _ => Err(DecodeError::BadConstant {
                index,
                reason: "expected NameAndType",
            }),
        }
    }

    pub fn member_ref(&self, index: u16) -> Result<MemberRef, DecodeError> {
        let (class, nat) = match self.get(index)? {
            Constant::FieldRef {
                class,
                name_and_type,
            }
            | Constant::MethodRef {
                class,
                name_and_type,
            }
            | Constant::InterfaceMethodRef {
                class,
                name_and_type,
            } => (*class, *name_and_type),
            _ => {
                return Err(DecodeError::BadConstant {
                    index,
                    reason: "expected field or method reference",
                });
            }
        };
        let (name, descriptor) = self.name_and_type(nat)?;
        Ok(MemberRef {
            owner: self.class_name(class)?.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        })
    }

    /// Name and descriptor of an `InvokeDynamic` call site.
    pub fn dynamic(&self, index: u16) -> Result<(String, String), DecodeError> {
        match self.get(index)? {
            Constant::InvokeDynamic { name_and_type, .. } => {
                let (name, descriptor) = self.name_and_type(*name_and_type)?;
                Ok((name.to_string(), descriptor.to_string()))
            }
            _ => Err(DecodeError::BadConstant {
                index,
                reason: "expected InvokeDynamic",
            }),
        }
    }

    /// Loadable numeric or string constant; `None` for other loadable kinds.
    pub fn literal(&self, index: u16) -> Result<Option<Literal>, DecodeError> {
        let value = match self.get(index)? {
            Constant::Integer(v) => Literal::Int(i64::from(*v)),
            Constant::Long(v) => Literal::Int(*v),
            Constant::Float(v) => Literal::Float(f64::from(*v)),
            Constant::Double(v) => Literal::Float(*v),
            Constant::String(s) => Literal::String(self.utf8(*s)?.to_string()),
            _ => return Ok(None),
        };
        Ok(Some(value))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AnnotationValue {
    Literal(Literal),
    Enum { type_name: String, constant: String },
    Class(String),
    Annotation(Annotation),
    Array(Vec<AnnotationValue>),
}

impl AnnotationValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AnnotationValue::Literal(Literal::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AnnotationValue::Literal(Literal::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn as_annotation(&self) -> Option<&Annotation> {
        match self {
            AnnotationValue::Annotation(a) => Some(a),
            _ => None,
        }
    }

    /// Array elements; a lone value is treated as a one-element array, as
    /// javac does for single-element array initializers.
    pub fn as_slice(&self) -> &[AnnotationValue] {
        match self {
            AnnotationValue::Array(items) => items,
            single => std::slice::from_ref(single),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Annotation {
    /// Field descriptor of the annotation type, e.g. `Lcom/example/Plugin;`.
    pub type_descriptor: String,
    pub elements: Vec<(String, AnnotationValue)>,
    pub visible: bool,
}

impl Annotation {
    /// Internal name of the annotation type, without the `L...;` wrapper.
    pub fn type_name(&self) -> &str {
        self.type_descriptor
            .strip_prefix('L')
            .and_then(|s| s.strip_suffix(';'))
            .unwrap_or(&self.type_descriptor)
    }

    pub fn get(&self, element: &str) -> Option<&AnnotationValue> {
        self.elements
            .iter()
            .find(|(name, _)| name == element)
            .map(|(_, value)| value)
    }
}

#[derive(Debug, Clone)]
pub struct DecodedMethod {
    pub name: String,
    pub descriptor: String,
    pub access_flags: u16,
    /// Empty for abstract and native methods.
    pub instructions: Vec<Instruction>,
}

#[derive(Debug, Clone)]
pub struct DecodedClass {
    /// Internal name, e.g. `com/example/Main`.
    pub name: String,
    pub super_name: Option<String>,
    pub access_flags: u16,
    pub major_version: u16,
    pub constant_pool: ConstantPool,
    pub annotations: Vec<Annotation>,
    pub methods: Vec<DecodedMethod>,
}

impl DecodedClass {
    /// Class-level annotation by internal type name.
    pub fn annotation(&self, type_name: &str) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.type_name() == type_name)
    }

    pub fn instruction_count(&self) -> usize {
        self.methods.iter().map(|m| m.instructions.len()).sum()
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn bytes(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if n > self.remaining() {
            return Err(DecodeError::Truncated {
                offset: self.pos,
                wanted: n,
            });
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn u1(&mut self) -> Result<u8, DecodeError> {
        Ok(self.bytes(1)?[0])
    }

    fn u2(&mut self) -> Result<u16, DecodeError> {
        let b = self.bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u4(&mut self) -> Result<u32, DecodeError> {
        let b = self.bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u8(&mut self) -> Result<u64, DecodeError> {
        let hi = u64::from(self.u4()?);
        let lo = u64::from(self.u4()?);
        Ok(hi << 32 | lo)
    }

    /// Reject counts that cannot possibly fit in the remaining input.
    fn ensure_room(&self, count: usize, min_size: usize, what: &str) -> Result<(), DecodeError> {
        if count.saturating_mul(min_size) > self.remaining() {
            return Err(DecodeError::Malformed(format!(
                "{what} count {count} exceeds remaining data"
            )));
        }
        Ok(())
    }
}

/// Java "modified UTF-8": NUL as two bytes, supplementary characters as
/// surrogate pairs. Invalid sequences decode to U+FFFD.
fn decode_modified_utf8(bytes: &[u8]) -> String {
    if bytes.iter().all(|b| (0x01..0x80).contains(b)) {
        return bytes.iter().map(|&b| b as char).collect();
    }

    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        let cont = |k: usize| bytes.get(i + k).filter(|&&c| c & 0xc0 == 0x80).copied();
        if b & 0x80 == 0 {
            units.push(u16::from(b));
            i += 1;
        } else if b & 0xe0 == 0xc0 {
            match cont(1) {
                Some(c1) => {
                    units.push((u16::from(b & 0x1f) << 6) | u16::from(c1 & 0x3f));
                    i += 2;
                }
                None => {
                    units.push(0xfffd);
                    i += 1;
                }
            }
        } else if b & 0xf0 == 0xe0 {
            match (cont(1), cont(2)) {
                (Some(c1), Some(c2)) => {
                    units.push(
                        (u16::from(b & 0x0f) << 12)
                            | (u16::from(c1 & 0x3f) << 6)
                            | u16::from(c2 & 0x3f),
                    );
                    i += 3;
                }
                _ => {
                    units.push(0xfffd);
                    i += 1;
                }
            }
        } else {
            units.push(0xfffd);
            i += 1;
        }
    }
    String::from_utf16_lossy(&units)
}

fn read_constant_pool(r: &mut Reader<'_>) -> Result<ConstantPool, DecodeError> {
    let count = r.u2()?;
    if count == 0 {
        return Err(DecodeError::Malformed("constant pool count is zero".into()));
    }
    r.ensure_room(usize::from(count) - 1, 3, "constant pool")?;

    let mut entries = Vec::with_capacity(usize::from(count));
    entries.push(Constant::Unusable);

    let mut index: u16 = 1;
    while index < count {
        let tag = r.u1()?;
        let constant = match tag {
            1 => {
                let len = r.u2()?;
                Constant::Utf8(decode_modified_utf8(r.bytes(usize::from(len))?))
            }
            3 => Constant::Integer(r.u4()? as i32),
            4 => Constant::Float(f32::from_bits(r.u4()?)),
            5 => Constant::Long(r.u8()? as i64),
            6 => Constant::Double(f64::from_bits(r.u8()?)),
            7 => Constant::Class(r.u2()?),
            8 => Constant::String(r.u2()?),
            9 => Constant::FieldRef {
                class: r.u2()?,
                name_and_type: r.u2()?,
            },
            10 => Constant::MethodRef {
                class: r.u2()?,
                name_and_type: r.u2()?,
            },
            11 => Constant::InterfaceMethodRef {
                class: r.u2()?,
                name_and_type: r.u2()?,
            },
            12 => Constant::NameAndType {
                name: r.u2()?,
                descriptor: r.u2()?,
            },
            15 => Constant::MethodHandle {
                kind: r.u1()?,
                reference: r.u2()?,
            },
            16 => Constant::MethodType(r.u2()?),
            17 => Constant::Dynamic {
                bootstrap: r.u2()?,
                name_and_type: r.u2()?,
            },
            18 => Constant::InvokeDynamic {
                bootstrap: r.u2()?,
                name_and_type: r.u2()?,
            },
            19 => Constant::Module(r.u2()?),
            20 => Constant::Package(r.u2()?),
            _ => return Err(DecodeError::BadConstantTag { tag, index }),
        };

        let wide = matches!(constant, Constant::Long(_) | Constant::Double(_));
        entries.push(constant);
        index += 1;
        if wide {
            if index >= count {
                return Err(DecodeError::BadConstant {
                    index: index - 1,
                    reason: "long or double occupies the last slot",
                });
            }
            entries.push(Constant::Unusable);
            index += 1;
        }
    }

    Ok(ConstantPool { entries })
}

/// Yields `(name, body)` for each attribute in a table.
fn read_attributes<'a>(r: &mut Reader<'a>) -> Result<Vec<(u16, &'a [u8])>, DecodeError> {
    let count = usize::from(r.u2()?);
    r.ensure_room(count, 6, "attribute")?;
    let mut attrs = Vec::with_capacity(count);
    for _ in 0..count {
        let name = r.u2()?;
        let len = r.u4()? as usize;
        attrs.push((name, r.bytes(len)?));
    }
    Ok(attrs)
}

fn read_code(body: &[u8], pool: &ConstantPool) -> Result<Vec<Instruction>, DecodeError> {
    let mut r = Reader::new(body);
    let _max_stack = r.u2()?;
    let _max_locals = r.u2()?;
    let len = r.u4()? as usize;
    let code = r.bytes(len)?;
    bytecode::decode_code(code, pool)
}

fn read_element_value(
    r: &mut Reader<'_>,
    pool: &ConstantPool,
    depth: usize,
    visible: bool,
) -> Result<AnnotationValue, DecodeError> {
    if depth > MAX_ANNOTATION_DEPTH {
        return Err(DecodeError::Malformed("annotation nesting too deep".into()));
    }

    let tag = r.u1()?;
    let value = match tag {
        b'B' | b'I' | b'J' | b'S' | b'D' | b'F' => {
            let index = r.u2()?;
            match pool.literal(index)? {
                Some(lit @ (Literal::Int(_) | Literal::Float(_))) => AnnotationValue::Literal(lit),
                _ => {
                    return Err(DecodeError::BadConstant {
                        index,
                        reason: "expected numeric constant",
                    });
                }
            }
        }
        b'Z' | b'C' => {
            let index = r.u2()?;
            let raw = match pool.get(index)? {
                Constant::Integer(v) => *v,
                _ => {
                    return Err(DecodeError::BadConstant {
                        index,
                        reason: "expected Integer",
                    });
                }
            };
            if tag == b'Z' {
                AnnotationValue::Literal(Literal::Bool(raw != 0))
            } else {
                let c = u32::try_from(raw)
                    .ok()
                    .and_then(char::from_u32)
                    .unwrap_or('\u{fffd}');
                AnnotationValue::Literal(Literal::Char(c))
            }
        }
        b's' => AnnotationValue::Literal(Literal::String(pool.utf8(r.u2()?)?.to_string())),
        b'e' => AnnotationValue::Enum {
            type_name: pool.utf8(r.u2()?)?.to_string(),
            constant: pool.utf8(r.u2()?)?.to_string(),
        },
        b'c' => AnnotationValue::Class(pool.utf8(r.u2()?)?.to_string()),
        b'@' => AnnotationValue::Annotation(read_annotation(r, pool, depth + 1, visible)?),
        b'[' => {
            let count = usize::from(r.u2()?);
            r.ensure_room(count, 3, "array element")?;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(read_element_value(r, pool, depth + 1, visible)?);
            }
            AnnotationValue::Array(items)
        }
        other => {
            return Err(DecodeError::Malformed(format!(
                "unknown annotation element tag {:?}",
                other as char
            )));
        }
    };
    Ok(value)
}

fn read_annotation(
    r: &mut Reader<'_>,
    pool: &ConstantPool,
    depth: usize,
    visible: bool,
) -> Result<Annotation, DecodeError> {
    let type_descriptor = pool.utf8(r.u2()?)?.to_string();
    let count = usize::from(r.u2()?);
    r.ensure_room(count, 5, "annotation element")?;
    let mut elements = Vec::with_capacity(count);
    for _ in 0..count {
        let name = pool.utf8(r.u2()?)?.to_string();
        elements.push((name, read_element_value(r, pool, depth, visible)?));
    }
    Ok(Annotation {
        type_descriptor,
        elements,
        visible,
    })
}

fn read_annotations(
    body: &[u8],
    pool: &ConstantPool,
    visible: bool,
    out: &mut Vec<Annotation>,
) -> Result<(), DecodeError> {
    let mut r = Reader::new(body);
    let count = usize::from(r.u2()?);
    r.ensure_room(count, 4, "annotation")?;
    for _ in 0..count {
        out.push(read_annotation(&mut r, pool, 0, visible)?);
    }
    Ok(())
}

/// Decode a complete class file.
pub fn decode(bytes: &[u8]) -> Result<DecodedClass, DecodeError> {
    let mut r = Reader::new(bytes);

    let magic = r.u4()?;
    if magic != MAGIC {
        return Err(DecodeError::BadMagic(magic));
    }
    let _minor = r.u2()?;
    let major_version = r.u2()?;
    if !(MIN_MAJOR_VERSION..=MAX_MAJOR_VERSION).contains(&major_version) {
        return Err(DecodeError::UnsupportedVersion(major_version));
    }

    let constant_pool = read_constant_pool(&mut r)?;
    let access_flags = r.u2()?;
    let name = constant_pool.class_name(r.u2()?)?.to_string();
    let super_name = match r.u2()? {
        0 => None,
        index => Some(constant_pool.class_name(index)?.to_string()),
    };

    let interfaces = usize::from(r.u2()?);
    r.bytes(interfaces * 2)?;

    let fields = usize::from(r.u2()?);
    r.ensure_room(fields, 8, "field")?;
    for _ in 0..fields {
        r.bytes(6)?;
        read_attributes(&mut r)?;
    }

    let method_count = usize::from(r.u2()?);
    r.ensure_room(method_count, 8, "method")?;
    let mut methods = Vec::with_capacity(method_count);
    for _ in 0..method_count {
        let access_flags = r.u2()?;
        let name = constant_pool.utf8(r.u2()?)?.to_string();
        let descriptor = constant_pool.utf8(r.u2()?)?.to_string();
        let mut instructions = Vec::new();
        for (attr, body) in read_attributes(&mut r)? {
            if constant_pool.utf8(attr)? == "Code" {
                instructions = read_code(body, &constant_pool).map_err(|e| {
                    DecodeError::Malformed(format!("method {name}{descriptor}: {e}"))
                })?;
            }
        }
        methods.push(DecodedMethod {
            name,
            descriptor,
            access_flags,
            instructions,
        });
    }

    let mut annotations = Vec::new();
    for (attr, body) in read_attributes(&mut r)? {
        match constant_pool.utf8(attr)? {
            "RuntimeVisibleAnnotations" => {
                read_annotations(body, &constant_pool, true, &mut annotations)?
            }
            "RuntimeInvisibleAnnotations" => {
                read_annotations(body, &constant_pool, false, &mut annotations)?
            }
            _ => {}
        }
    }

    Ok(DecodedClass {
        name,
        super_name,
        access_flags,
        major_version,
        constant_pool,
        annotations,
        methods,
    })
}
