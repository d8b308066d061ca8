//! Fixtures shared by the unit tests and, through `tests/common`, the
//! integration tests: a minimal class-file writer and a jar builder.
//!
//! Depends on nothing from the library so both test crates can compile it.

use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use zip::write::FileOptions;

const RETURN: u8 = 0xb1;

pub fn jar(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (name, content) in entries {
        if name.ends_with('/') {
            zip.add_directory(*name, options).unwrap();
            continue;
        }
        zip.start_file(*name, options).unwrap();
        zip.write_all(content).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

pub fn temp_path(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!(
        "plugin_intake_test_{}_{}_{}",
        std::process::id(),
        nanos,
        name
    ))
}

/// `op idx` for any two-byte-index instruction.
pub fn invoke(opcode: u8, index: u16) -> Vec<u8> {
    let [hi, lo] = index.to_be_bytes();
    vec![opcode, hi, lo]
}

pub enum Element<'a> {
    Str(&'a str),
    Int(i32),
    Bool(bool),
    Array(Vec<Element<'a>>),
    Nested(&'a str, Vec<(&'a str, Element<'a>)>),
}

pub struct ClassBuilder {
    pool: Vec<u8>,
    next_index: u16,
    utf8: HashMap<String, u16>,
    this_class: u16,
    super_class: u16,
    methods: Vec<u8>,
    method_count: u16,
    visible: AnnotationTable,
    invisible: AnnotationTable,
}

#[derive(Default)]
struct AnnotationTable {
    bytes: Vec<u8>,
    count: u16,
}

impl ClassBuilder {
    pub fn new(name: &str) -> Self {
        let mut b = Self {
            pool: Vec::new(),
            next_index: 1,
            utf8: HashMap::new(),
            this_class: 0,
            super_class: 0,
            methods: Vec::new(),
            method_count: 0,
            visible: AnnotationTable::default(),
            invisible: AnnotationTable::default(),
        };
        b.this_class = b.class(name);
        b.super_class = b.class("java/lang/Object");
        b
    }

    fn push(&mut self, bytes: &[u8]) -> u16 {
        self.pool.extend_from_slice(bytes);
        let index = self.next_index;
        self.next_index += 1;
        index
    }

    pub fn utf8(&mut self, s: &str) -> u16 {
        if let Some(&index) = self.utf8.get(s) {
            return index;
        }
        let mut entry = vec![1];
        entry.extend_from_slice(&(s.len() as u16).to_be_bytes());
        entry.extend_from_slice(s.as_bytes());
        let index = self.push(&entry);
        self.utf8.insert(s.to_string(), index);
        index
    }

    fn tagged(&mut self, tag: u8, a: u16, b: Option<u16>) -> u16 {
        let mut entry = vec![tag];
        entry.extend_from_slice(&a.to_be_bytes());
        if let Some(b) = b {
            entry.extend_from_slice(&b.to_be_bytes());
        }
        self.push(&entry)
    }

    pub fn class(&mut self, name: &str) -> u16 {
        let name = self.utf8(name);
        self.tagged(7, name, None)
    }

    pub fn string(&mut self, s: &str) -> u16 {
        let s = self.utf8(s);
        self.tagged(8, s, None)
    }

    pub fn integer(&mut self, value: i32) -> u16 {
        let mut entry = vec![3];
        entry.extend_from_slice(&value.to_be_bytes());
        self.push(&entry)
    }

    /// A `Long` constant; it takes two pool slots.
    pub fn long(&mut self, value: i64) -> u16 {
        let mut entry = vec![5];
        entry.extend_from_slice(&value.to_be_bytes());
        let index = self.push(&entry);
        self.next_index += 1;
        index
    }

    fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name = self.utf8(name);
        let descriptor = self.utf8(descriptor);
        self.tagged(12, name, Some(descriptor))
    }

    fn member(&mut self, tag: u8, owner: &str, name: &str, descriptor: &str) -> u16 {
        let class = self.class(owner);
        let nat = self.name_and_type(name, descriptor);
        self.tagged(tag, class, Some(nat))
    }

    pub fn field_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        self.member(9, owner, name, descriptor)
    }

    pub fn method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        self.member(10, owner, name, descriptor)
    }

    pub fn interface_method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        self.member(11, owner, name, descriptor)
    }

    /// Add a public method whose body is `code` followed by `return`.
    pub fn method(&mut self, name: &str, descriptor: &str, code: Vec<u8>) {
        let name = self.utf8(name);
        let descriptor = self.utf8(descriptor);
        let code_attr = self.utf8("Code");

        let mut body = code;
        body.push(RETURN);

        let mut attr = Vec::new();
        attr.extend_from_slice(&4u16.to_be_bytes());
        attr.extend_from_slice(&4u16.to_be_bytes());
        attr.extend_from_slice(&(body.len() as u32).to_be_bytes());
        attr.extend_from_slice(&body);
        attr.extend_from_slice(&0u16.to_be_bytes());
        attr.extend_from_slice(&0u16.to_be_bytes());

        self.methods.extend_from_slice(&0x0001u16.to_be_bytes());
        self.methods.extend_from_slice(&name.to_be_bytes());
        self.methods.extend_from_slice(&descriptor.to_be_bytes());
        self.methods.extend_from_slice(&1u16.to_be_bytes());
        self.methods.extend_from_slice(&code_attr.to_be_bytes());
        self.methods
            .extend_from_slice(&(attr.len() as u32).to_be_bytes());
        self.methods.extend_from_slice(&attr);
        self.method_count += 1;
    }

    pub fn abstract_method(&mut self, name: &str, descriptor: &str) {
        let name = self.utf8(name);
        let descriptor = self.utf8(descriptor);
        self.methods.extend_from_slice(&0x0401u16.to_be_bytes());
        self.methods.extend_from_slice(&name.to_be_bytes());
        self.methods.extend_from_slice(&descriptor.to_be_bytes());
        self.methods.extend_from_slice(&0u16.to_be_bytes());
        self.method_count += 1;
    }

    fn encode_element(&mut self, element: &Element<'_>, out: &mut Vec<u8>) {
        match element {
            Element::Str(s) => {
                out.push(b's');
                out.extend_from_slice(&self.utf8(s).to_be_bytes());
            }
            Element::Int(v) => {
                out.push(b'I');
                out.extend_from_slice(&self.integer(*v).to_be_bytes());
            }
            Element::Bool(v) => {
                out.push(b'Z');
                out.extend_from_slice(&self.integer(i32::from(*v)).to_be_bytes());
            }
            Element::Array(items) => {
                out.push(b'[');
                out.extend_from_slice(&(items.len() as u16).to_be_bytes());
                for item in items {
                    self.encode_element(item, out);
                }
            }
            Element::Nested(type_descriptor, elements) => {
                out.push(b'@');
                self.encode_annotation(type_descriptor, elements, out);
            }
        }
    }

    fn encode_annotation(
        &mut self,
        type_descriptor: &str,
        elements: &[(&str, Element<'_>)],
        out: &mut Vec<u8>,
    ) {
        out.extend_from_slice(&self.utf8(type_descriptor).to_be_bytes());
        out.extend_from_slice(&(elements.len() as u16).to_be_bytes());
        for (name, value) in elements {
            out.extend_from_slice(&self.utf8(name).to_be_bytes());
            self.encode_element(value, out);
        }
    }

    /// Add a runtime-visible class annotation.
    pub fn annotation(&mut self, type_descriptor: &str, elements: Vec<(&str, Element<'_>)>) {
        let mut out = Vec::new();
        self.encode_annotation(type_descriptor, &elements, &mut out);
        self.visible.bytes.extend_from_slice(&out);
        self.visible.count += 1;
    }

    /// Add a class annotation with `CLASS` retention.
    pub fn invisible_annotation(
        &mut self,
        type_descriptor: &str,
        elements: Vec<(&str, Element<'_>)>,
    ) {
        let mut out = Vec::new();
        self.encode_annotation(type_descriptor, &elements, &mut out);
        self.invisible.bytes.extend_from_slice(&out);
        self.invisible.count += 1;
    }

    pub fn build(mut self) -> Vec<u8> {
        let tables = [
            ("RuntimeVisibleAnnotations", std::mem::take(&mut self.visible)),
            ("RuntimeInvisibleAnnotations", std::mem::take(&mut self.invisible)),
        ];
        let attributes: Vec<(u16, Vec<u8>)> = tables
            .into_iter()
            .filter(|(_, table)| table.count > 0)
            .map(|(name, table)| {
                let mut body = table.count.to_be_bytes().to_vec();
                body.extend(table.bytes);
                (self.utf8(name), body)
            })
            .collect();

        let mut out = Vec::new();
        out.extend_from_slice(&0xCAFE_BABEu32.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&52u16.to_be_bytes());
        out.extend_from_slice(&self.next_index.to_be_bytes());
        out.extend_from_slice(&self.pool);
        out.extend_from_slice(&0x0021u16.to_be_bytes());
        out.extend_from_slice(&self.this_class.to_be_bytes());
        out.extend_from_slice(&self.super_class.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&self.method_count.to_be_bytes());
        out.extend_from_slice(&self.methods);

        out.extend_from_slice(&(attributes.len() as u16).to_be_bytes());
        for (name, body) in &attributes {
            out.extend_from_slice(&name.to_be_bytes());
            out.extend_from_slice(&(body.len() as u32).to_be_bytes());
            out.extend_from_slice(body);
        }
        out
    }
}
