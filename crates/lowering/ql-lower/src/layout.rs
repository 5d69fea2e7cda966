//! Fixed memory regions and the string data segment

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Bytes per object field; slot 0 of every object holds its vtable
pub const FIELD_SLOT_SIZE: u32 = 8;

/// Name of the global holding the end of static data
pub const DATA_END: &str = "~lib/memory/__data_end";
/// Name of the global holding the shadow stack pointer
pub const STACK_POINTER: &str = "~lib/memory/__stack_pointer";
/// Name of the global holding the first heap address
pub const HEAP_BASE: &str = "~lib/memory/__heap_base";
/// Name of the table holding extref handles
pub const EXTREF_TABLE: &str = "extref_table";

/// Memory and table sizing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayoutPolicy {
    /// Bytes reserved before the first data segment
    pub reserved_header: u32,
    /// Shadow stack size in bytes
    pub stack_size: u32,
    /// Alignment of the stack start
    pub stack_align: u32,
    /// Initial memory pages
    pub initial_pages: u32,
    /// Maximum memory pages
    pub maximum_pages: u32,
    /// Extref table growth step
    pub table_grow: u32,
    /// Maximum extref table size
    pub table_maximum: u32,
}

impl Default for LayoutPolicy {
    fn default() -> Self {
        Self {
            reserved_header: 1024,
            stack_size: 32768,
            stack_align: 8,
            initial_pages: 1,
            maximum_pages: 10,
            table_grow: 1,
            table_maximum: 10,
        }
    }
}

/// Deduplicated, NUL-terminated string literals placed after the header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringPool {
    base: u32,
    offsets: IndexMap<String, u32>,
    end: u32,
}

impl StringPool {
    /// Empty pool starting at `base`
    #[must_use]
    pub fn new(base: u32) -> Self {
        Self {
            base,
            offsets: IndexMap::new(),
            end: base,
        }
    }

    /// Address of `text`, adding it on first use
    pub fn intern(&mut self, text: &str) -> u32 {
        if let Some(offset) = self.offsets.get(text) {
            return *offset;
        }
        let offset = self.end;
        self.end += text.len() as u32 + 1;
        self.offsets.insert(text.to_string(), offset);
        offset
    }

    /// Address of an interned string
    pub fn offset(&self, text: &str) -> Option<u32> {
        self.offsets.get(text).copied()
    }

    /// First address after the pool
    pub const fn end(&self) -> u32 {
        self.end
    }

    /// Number of distinct strings
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Whether no string was interned
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Segment contents, starting at the pool base
    pub fn bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity((self.end - self.base) as usize);
        for text in self.offsets.keys() {
            bytes.extend_from_slice(text.as_bytes());
            bytes.push(0);
        }
        bytes
    }

    /// Address of the first string
    pub const fn base(&self) -> u32 {
        self.base
    }
}

/// Concrete addresses derived from a [`LayoutPolicy`] and the data size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryPlan {
    /// End of static data
    pub data_end: u32,
    /// Lowest stack address
    pub stack_start: u32,
    /// Stack size
    pub stack_size: u32,
    /// First heap address, also the initial stack pointer
    pub heap_base: u32,
    /// Initial memory pages
    pub initial_pages: u32,
    /// Maximum memory pages
    pub maximum_pages: u32,
    /// Extref table size at start
    pub table_initial: u32,
    /// Extref table growth step
    pub table_grow: u32,
    /// Maximum extref table size
    pub table_maximum: u32,
}

impl MemoryPlan {
    /// Lay out memory after `data_end`
    #[must_use]
    pub fn new(policy: &LayoutPolicy, data_end: u32) -> Self {
        let stack_start = align_up(data_end, policy.stack_align);
        Self {
            data_end,
            stack_start,
            stack_size: policy.stack_size,
            heap_base: stack_start + policy.stack_size,
            initial_pages: policy.initial_pages,
            maximum_pages: policy.maximum_pages,
            table_initial: 0,
            table_grow: policy.table_grow,
            table_maximum: policy.table_maximum,
        }
    }
}

/// Round `value` up to a multiple of `align`
#[must_use]
pub const fn align_up(value: u32, align: u32) -> u32 {
    if align <= 1 {
        return value;
    }
    value.div_ceil(align) * align
}
