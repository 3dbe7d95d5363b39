//! DSDL type model.
//!
//! This module contains the data structures describing fully resolved DSDL
//! types: primitives, arrays, void padding and compound (message/service)
//! definitions, together with their fields and constants.

use std::sync::Arc;

/// Deepest type node nesting, counted in arrays, that parsing and code
/// generation accept.
pub const MAX_TYPE_DEPTH: usize = 32;

/// Type of a field, a constant or an array element.
///
/// New tags may be added by future versions of the type model, so code outside
/// this crate must keep a fallback arm when matching on it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TypeDescriptor {
    /// Boolean, integer or floating point scalar.
    Primitive(PrimitiveType),
    /// Fixed-size or variable-size array.
    Array(ArrayType),
    /// Reference to another compound type.
    Compound(Arc<CompoundType>),
    /// Padding that occupies wire space but carries no name.
    Void(VoidType),
}

impl TypeDescriptor {
    /// Returns the innermost non-array type, unwrapping nested arrays.
    #[must_use]
    pub fn innermost(&self) -> &TypeDescriptor {
        let mut current = self;
        while let Self::Array(array) = current {
            current = &array.element;
        }
        current
    }

    /// Returns true if this is a void padding type.
    #[must_use]
    pub const fn is_void(&self) -> bool {
        matches!(self, Self::Void(_))
    }

    /// Returns true if this is an array type.
    #[must_use]
    pub const fn is_array(&self) -> bool {
        matches!(self, Self::Array(_))
    }

    /// Returns a short human-readable tag for diagnostics.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Primitive(p) => format!("{}{}", p.kind.dsdl_name(), p.bit_length),
            Self::Array(a) => match a.sizing {
                ArraySizing::Static(size) => format!("{}[{}]", a.element.describe(), size),
                ArraySizing::Dynamic(max) => format!("{}[<={}]", a.element.describe(), max),
            },
            Self::Compound(c) => c.full_name.clone(),
            Self::Void(v) => format!("void{}", v.bit_length),
        }
    }
}

/// Primitive scalar kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PrimitiveKind {
    /// Single-bit boolean.
    Boolean,
    /// Unsigned integer.
    UnsignedInt,
    /// Two's complement signed integer.
    SignedInt,
    /// IEEE 754 floating point.
    Float,
}

impl PrimitiveKind {
    /// Returns the DSDL spelling of the kind (without bit length).
    #[must_use]
    pub const fn dsdl_name(&self) -> &'static str {
        match self {
            Self::Boolean => "bool",
            Self::UnsignedInt => "uint",
            Self::SignedInt => "int",
            Self::Float => "float",
        }
    }

    /// Returns true if literals of this kind are floating point literals.
    #[must_use]
    pub const fn is_float(&self) -> bool {
        matches!(self, Self::Float)
    }

    /// Returns true if this is an unsigned integer kind.
    #[must_use]
    pub const fn is_unsigned(&self) -> bool {
        matches!(self, Self::UnsignedInt)
    }
}

/// Overflow policy applied when a value is narrowed to the bit length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum CastMode {
    /// Clamp to the representable range (default).
    #[default]
    Saturated,
    /// Discard the excess high bits.
    Truncated,
}

impl CastMode {
    /// Parses a cast mode from its DSDL keyword.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "saturated" | "saturate" => Some(Self::Saturated),
            "truncated" | "truncate" => Some(Self::Truncated),
            _ => None,
        }
    }
}

/// Primitive scalar type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrimitiveType {
    /// Scalar kind.
    pub kind: PrimitiveKind,
    /// Width on the wire, in bits.
    pub bit_length: u8,
    /// Overflow policy.
    pub cast_mode: CastMode,
}

impl PrimitiveType {
    /// Creates a primitive type with the default (saturated) cast mode.
    #[must_use]
    pub const fn new(kind: PrimitiveKind, bit_length: u8) -> Self {
        Self {
            kind,
            bit_length,
            cast_mode: CastMode::Saturated,
        }
    }

    /// Returns a copy with the given cast mode.
    #[must_use]
    pub const fn with_cast_mode(mut self, cast_mode: CastMode) -> Self {
        self.cast_mode = cast_mode;
        self
    }
}

/// Array sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArraySizing {
    /// Exactly this many elements.
    Static(usize),
    /// Up to this many elements.
    Dynamic(usize),
}

impl ArraySizing {
    /// Returns the size (static) or maximum size (dynamic).
    #[must_use]
    pub const fn capacity(&self) -> usize {
        match self {
            Self::Static(n) | Self::Dynamic(n) => *n,
        }
    }
}

/// Array type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayType {
    /// Element type.
    pub element: Box<TypeDescriptor>,
    /// Static size or dynamic capacity.
    pub sizing: ArraySizing,
}

impl ArrayType {
    /// Creates a new array type.
    #[must_use]
    pub fn new(element: TypeDescriptor, sizing: ArraySizing) -> Self {
        Self {
            element: Box::new(element),
            sizing,
        }
    }
}

/// Void padding type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoidType {
    /// Width on the wire, in bits.
    pub bit_length: u8,
}

/// Field of a compound type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Field name; `None` only for void padding.
    pub name: Option<String>,
    /// Field type.
    pub data_type: TypeDescriptor,
}

impl Attribute {
    /// Creates a named field.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: TypeDescriptor) -> Self {
        Self {
            name: Some(name.into()),
            data_type,
        }
    }

    /// Creates an unnamed void padding field.
    #[must_use]
    pub fn padding(bit_length: u8) -> Self {
        Self {
            name: None,
            data_type: TypeDescriptor::Void(VoidType { bit_length }),
        }
    }
}

/// Constant of a compound type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constant {
    /// Constant name.
    pub name: String,
    /// Declared type.
    pub data_type: PrimitiveType,
    /// Literal text as written in the definition.
    pub string_value: String,
}

impl Constant {
    /// Creates a new constant.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        data_type: PrimitiveType,
        string_value: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            data_type,
            string_value: string_value.into(),
        }
    }
}

/// Field and constant list of a message, or of one half of a service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructType {
    /// Fields in declaration order.
    pub fields: Vec<Attribute>,
    /// Constants in declaration order.
    pub constants: Vec<Constant>,
    /// True if the fields are mutually exclusive alternatives.
    pub union: bool,
}

impl StructType {
    /// Creates an empty, non-union structure.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field.
    pub fn add_field(&mut self, field: Attribute) {
        self.fields.push(field);
    }

    /// Adds a constant.
    pub fn add_constant(&mut self, constant: Constant) {
        self.constants.push(constant);
    }
}

/// Message or service body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompoundKind {
    /// Broadcast message.
    Message(StructType),
    /// Request/response service.
    Service {
        /// Request structure.
        request: StructType,
        /// Response structure.
        response: StructType,
    },
}

/// Named compound type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompoundType {
    /// Dotted full name, e.g. `uavcan.node.Heartbeat`.
    pub full_name: String,
    /// Fixed port identifier, if any.
    pub fixed_port_id: Option<u32>,
    /// Message or service body.
    pub kind: CompoundKind,
}

impl CompoundType {
    /// Creates a message type.
    #[must_use]
    pub fn message(full_name: impl Into<String>, body: StructType) -> Self {
        Self {
            full_name: full_name.into(),
            fixed_port_id: None,
            kind: CompoundKind::Message(body),
        }
    }

    /// Creates a service type.
    #[must_use]
    pub fn service(full_name: impl Into<String>, request: StructType, response: StructType) -> Self {
        Self {
            full_name: full_name.into(),
            fixed_port_id: None,
            kind: CompoundKind::Service { request, response },
        }
    }

    /// Creates a bodiless reference to a type defined outside the current
    /// document (a type from a lookup namespace).
    #[must_use]
    pub fn reference(full_name: impl Into<String>) -> Self {
        Self::message(full_name, StructType::new())
    }

    /// Returns a copy with the given fixed port identifier.
    #[must_use]
    pub fn with_fixed_port_id(mut self, port_id: u32) -> Self {
        self.fixed_port_id = Some(port_id);
        self
    }

    /// Returns the dot-separated name components.
    pub fn name_components(&self) -> impl Iterator<Item = &str> {
        self.full_name.split('.')
    }

    /// Returns the last name component.
    #[must_use]
    pub fn short_name(&self) -> &str {
        self.full_name
            .rsplit_once('.')
            .map_or(self.full_name.as_str(), |(_, short)| short)
    }

    /// Returns the namespace components (all but the last).
    #[must_use]
    pub fn namespace_components(&self) -> Vec<&str> {
        match self.full_name.rsplit_once('.') {
            Some((namespace, _)) => namespace.split('.').collect(),
            None => Vec::new(),
        }
    }

    /// Returns true if this is a service type.
    #[must_use]
    pub const fn is_service(&self) -> bool {
        matches!(self.kind, CompoundKind::Service { .. })
    }

    /// Returns every field list of the type (one for messages, request and
    /// response for services).
    #[must_use]
    pub fn structs(&self) -> Vec<&StructType> {
        match &self.kind {
            CompoundKind::Message(body) => vec![body],
            CompoundKind::Service { request, response } => vec![request, response],
        }
    }
}
