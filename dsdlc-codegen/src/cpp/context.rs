//! Rendering context construction.
//!
//! A context is built per top-level type and handed to the template as `t`.
//! Messages and services get distinct shapes, selected by the `kind` tag.

use crate::cpp::types::{compound_type, primitive_type, resolve};
use crate::error::{CodegenError, Result};
use dsdlc_schema::validation::VOID_NAME_PREFIX;
use dsdlc_schema::{Attribute, CompoundKind, CompoundType, Constant, SchemaError, StructType, TypeDescriptor};
use serde::Serialize;
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Extension of generated headers.
pub const OUTPUT_FILE_EXTENSION: &str = "hpp";

/// Per-type rendering context.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind")]
pub enum RenderingContext<'a> {
    /// Context of a message type.
    Message(MessageContext<'a>),
    /// Context of a service type.
    Service(ServiceContext<'a>),
}

impl<'a> RenderingContext<'a> {
    /// Returns the naming/include part shared by both kinds.
    #[must_use]
    pub fn header(&self) -> &TypeHeader<'a> {
        match self {
            Self::Message(m) => &m.header,
            Self::Service(s) => &s.header,
        }
    }

    /// Returns the `kind` discriminator token.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Message(_) => "Message",
            Self::Service(_) => "Service",
        }
    }
}

/// Naming, include and port information common to messages and services.
#[derive(Debug, Clone, Serialize)]
pub struct TypeHeader<'a> {
    /// Dotted full name.
    pub full_name: &'a str,
    /// Last name component.
    pub short_name: &'a str,
    /// Name of the generated C++ template struct (`short_name` + `_`).
    pub cpp_type_name: String,
    /// Fully qualified C++ name.
    pub cpp_full_type_name: String,
    /// Namespace components, outermost first.
    pub namespace_components: Vec<&'a str>,
    /// Full name uppercased with `.` replaced by `_`.
    pub unique_id: String,
    /// Include guard macro.
    pub include_guard: String,
    /// Header paths of referenced compound types, sorted and deduplicated.
    pub includes: Vec<String>,
    /// True if the type has a fixed port identifier.
    pub has_fixed_port_id: bool,
    /// Fixed port identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_port_id: Option<u32>,
    /// libuavcan data type kind token.
    pub cpp_kind: &'static str,
    /// True for services.
    pub is_service: bool,
}

/// Context of a message type.
#[derive(Debug, Clone, Serialize)]
pub struct MessageContext<'a> {
    /// Shared naming information.
    #[serde(flatten)]
    pub header: TypeHeader<'a>,
    /// Fields in declaration order.
    pub fields: Vec<FieldContext<'a>>,
    /// Constants in declaration order.
    pub constants: Vec<ConstantContext<'a>>,
    /// True for a union with at least one field.
    pub union: bool,
}

/// Context of a service type.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceContext<'a> {
    /// Shared naming information.
    #[serde(flatten)]
    pub header: TypeHeader<'a>,
    /// Request fields.
    pub request_fields: Vec<FieldContext<'a>>,
    /// Request constants.
    pub request_constants: Vec<ConstantContext<'a>>,
    /// True if the request is a union with at least one field.
    pub request_union: bool,
    /// Response fields.
    pub response_fields: Vec<FieldContext<'a>>,
    /// Response constants.
    pub response_constants: Vec<ConstantContext<'a>>,
    /// True if the response is a union with at least one field.
    pub response_union: bool,
}

/// One field as seen by the template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldContext<'a> {
    /// Declared name, or `_void_<n>` for padding.
    pub name: Cow<'a, str>,
    /// C++ type expression.
    pub cpp_type: String,
    /// True for void padding.
    pub void: bool,
}

/// One constant as seen by the template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConstantContext<'a> {
    /// Constant name.
    pub name: &'a str,
    /// C++ type expression.
    pub cpp_type: String,
    /// C++ literal.
    pub cpp_value: String,
    /// Literal as written in the definition.
    pub value: &'a str,
}

struct StructContext<'a> {
    fields: Vec<FieldContext<'a>>,
    constants: Vec<ConstantContext<'a>>,
    union: bool,
}

/// Builds the rendering context of one top-level type, with includes spelled
/// with [`OUTPUT_FILE_EXTENSION`].
///
/// # Errors
/// See [`build_with_extension`].
pub fn build(ty: &CompoundType) -> Result<RenderingContext<'_>> {
    build_with_extension(ty, OUTPUT_FILE_EXTENSION)
}

/// Builds the rendering context of one top-level type.
///
/// # Arguments
/// * `ty` - Message or service type
/// * `extension` - Extension of generated headers, used for the includes
///
/// # Returns
/// The typed context; it borrows names from `ty`.
///
/// # Errors
/// Returns the resolver's errors, `InvalidLiteral` for malformed constants and
/// a schema error for unnamed non-void fields.
pub fn build_with_extension<'a>(ty: &'a CompoundType, extension: &str) -> Result<RenderingContext<'a>> {
    let header = build_header(ty, extension);

    let context = match &ty.kind {
        CompoundKind::Message(body) => {
            let body = build_struct(&ty.full_name, body)?;
            RenderingContext::Message(MessageContext {
                header,
                fields: body.fields,
                constants: body.constants,
                union: body.union,
            })
        }
        CompoundKind::Service { request, response } => {
            let request = build_struct(&ty.full_name, request)?;
            let response = build_struct(&ty.full_name, response)?;
            RenderingContext::Service(ServiceContext {
                header,
                request_fields: request.fields,
                request_constants: request.constants,
                request_union: request.union,
                response_fields: response.fields,
                response_constants: response.constants,
                response_union: response.union,
            })
        }
    };

    Ok(context)
}

fn build_header<'a>(ty: &'a CompoundType, extension: &str) -> TypeHeader<'a> {
    let unique_id = ty.full_name.replace('.', "_").to_uppercase();
    let is_service = ty.is_service();

    TypeHeader {
        full_name: &ty.full_name,
        short_name: ty.short_name(),
        cpp_type_name: format!("{}_", ty.short_name()),
        cpp_full_type_name: compound_type(ty),
        namespace_components: ty.namespace_components(),
        include_guard: format!("{unique_id}_HPP_INCLUDED"),
        unique_id,
        includes: includes(ty, extension),
        has_fixed_port_id: ty.fixed_port_id.is_some(),
        fixed_port_id: ty.fixed_port_id,
        cpp_kind: if is_service {
            "::uavcan::DataTypeKindService"
        } else {
            "::uavcan::DataTypeKindMessage"
        },
        is_service,
    }
}

fn build_struct<'a>(type_name: &str, body: &'a StructType) -> Result<StructContext<'a>> {
    let fields = build_fields(type_name, &body.fields)?;
    let constants = body
        .constants
        .iter()
        .map(build_constant)
        .collect::<Result<Vec<_>>>()?;
    let union = body.union && !fields.is_empty();

    Ok(StructContext {
        fields,
        constants,
        union,
    })
}

/// Maps fields, naming void padding `_void_0`, `_void_1`, ... in order.
fn build_fields<'a>(type_name: &str, fields: &'a [Attribute]) -> Result<Vec<FieldContext<'a>>> {
    let mut void_index = 0;
    let mut out = Vec::with_capacity(fields.len());

    for (index, field) in fields.iter().enumerate() {
        let cpp_type = resolve(&field.data_type)?;
        let void = field.data_type.is_void();
        let name = if void {
            let name = format!("{VOID_NAME_PREFIX}{void_index}");
            void_index += 1;
            Cow::Owned(name)
        } else {
            let name = field.name.as_deref().ok_or_else(|| {
                CodegenError::Schema(SchemaError::invalid_field(type_name, index, "missing name"))
            })?;
            Cow::Borrowed(name)
        };
        out.push(FieldContext {
            name,
            cpp_type,
            void,
        });
    }

    Ok(out)
}

fn build_constant(constant: &Constant) -> Result<ConstantContext<'_>> {
    Ok(ConstantContext {
        name: &constant.name,
        cpp_type: primitive_type(&constant.data_type)?,
        cpp_value: constant_value(constant)?,
        value: &constant.string_value,
    })
}

/// Validates a constant's literal and returns its C++ spelling.
///
/// Float literals are emitted verbatim; integer literals of unsigned constants
/// get a `U` suffix.
///
/// # Errors
/// Returns `InvalidLiteral` if the text does not parse as the declared kind.
pub fn constant_value(constant: &Constant) -> Result<String> {
    let value = &constant.string_value;
    let invalid = |expected: &'static str| CodegenError::InvalidLiteral {
        constant: constant.name.clone(),
        value: value.clone(),
        expected,
    };

    if constant.data_type.kind.is_float() {
        value.parse::<f64>().map_err(|_| invalid("float"))?;
        return Ok(value.clone());
    }

    value.parse::<i128>().map_err(|_| invalid("integer"))?;
    if constant.data_type.kind.is_unsigned() {
        Ok(format!("{value}U"))
    } else {
        Ok(value.clone())
    }
}

/// Returns the header path of a compound type relative to the output root.
#[must_use]
pub fn output_relative_path(ty: &CompoundType, extension: &str) -> PathBuf {
    let mut path: PathBuf = ty.name_components().collect();
    path.set_extension(extension);
    path
}

/// Returns the `#include` spelling of a compound type's header. Matches
/// [`output_relative_path`] with `/` separators.
#[must_use]
pub fn include_path(ty: &CompoundType, extension: &str) -> String {
    format!(
        "{}.{extension}",
        ty.name_components().collect::<Vec<_>>().join("/")
    )
}

/// Collects the headers of every compound referenced by the type's fields,
/// looking through arrays. Sorted so output does not depend on field order.
fn includes(ty: &CompoundType, extension: &str) -> Vec<String> {
    let set: BTreeSet<String> = ty
        .structs()
        .into_iter()
        .flat_map(|body| body.fields.iter())
        .filter_map(|field| match field.data_type.innermost() {
            TypeDescriptor::Compound(compound) => Some(include_path(compound, extension)),
            _ => None,
        })
        .collect();
    set.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dsdlc_schema::{ArraySizing, ArrayType, PrimitiveKind, PrimitiveType};
    use std::sync::Arc;

    fn uint(bits: u8) -> PrimitiveType {
        PrimitiveType::new(PrimitiveKind::UnsignedInt, bits)
    }

    fn compound(name: &str) -> TypeDescriptor {
        TypeDescriptor::Compound(Arc::new(CompoundType::reference(name)))
    }

    fn message_with(fields: Vec<Attribute>, constants: Vec<Constant>) -> CompoundType {
        CompoundType::message(
            "uavcan.node.Heartbeat",
            StructType {
                fields,
                constants,
                union: false,
            },
        )
    }

    fn unwrap_message<'a>(ctx: &'a RenderingContext<'a>) -> &'a MessageContext<'a> {
        match ctx {
            RenderingContext::Message(m) => m,
            RenderingContext::Service(_) => panic!("expected message context"),
        }
    }

    #[test]
    fn test_header_naming() {
        let ty = message_with(vec![], vec![]).with_fixed_port_id(7509);
        let ctx = build(&ty).expect("Failed to build context");
        let header = ctx.header();

        assert_eq!(header.short_name, "Heartbeat");
        assert_eq!(header.namespace_components, vec!["uavcan", "node"]);
        assert_eq!(header.unique_id, "UAVCAN_NODE_HEARTBEAT");
        assert_eq!(header.include_guard, "UAVCAN_NODE_HEARTBEAT_HPP_INCLUDED");
        assert_eq!(header.cpp_type_name, "Heartbeat_");
        assert_eq!(header.cpp_full_type_name, "::uavcan::node::Heartbeat");
        assert!(header.has_fixed_port_id);
        assert_eq!(header.fixed_port_id, Some(7509));
        assert_eq!(ctx.kind(), "Message");
    }

    #[test]
    fn test_includes_sorted_and_deduplicated() {
        let fields = vec![
            Attribute::new("z", compound("zeta.Last")),
            Attribute::new(
                "arr",
                TypeDescriptor::Array(ArrayType::new(compound("alpha.First"), ArraySizing::Dynamic(3))),
            ),
            Attribute::new("again", compound("zeta.Last")),
            Attribute::new(
                "nested",
                TypeDescriptor::Array(ArrayType::new(
                    TypeDescriptor::Array(ArrayType::new(compound("mid.Middle"), ArraySizing::Static(2))),
                    ArraySizing::Static(2),
                )),
            ),
            Attribute::new("plain", TypeDescriptor::Primitive(uint(8))),
        ];
        let ty = message_with(fields, vec![]);
        let ctx = build(&ty).expect("Failed to build context");

        assert_eq!(
            ctx.header().includes,
            vec!["alpha/First.hpp", "mid/Middle.hpp", "zeta/Last.hpp"]
        );
    }

    #[test]
    fn test_includes_ignore_declaration_order() {
        let a = Attribute::new("a", compound("b.Bee"));
        let b = Attribute::new("b", compound("a.Ay"));
        let first = message_with(vec![a.clone(), b.clone()], vec![]);
        let second = message_with(vec![b, a], vec![]);

        let first_ctx = build(&first).expect("Failed to build context");
        let second_ctx = build(&second).expect("Failed to build context");
        assert_eq!(first_ctx.header().includes, second_ctx.header().includes);
    }

    #[test]
    fn test_void_field_names() {
        let fields = vec![
            Attribute::padding(2),
            Attribute::new("a", TypeDescriptor::Primitive(uint(8))),
            Attribute::padding(3),
            Attribute::new("b", TypeDescriptor::Primitive(uint(8))),
            Attribute::padding(1),
        ];
        let ty = message_with(fields, vec![]);
        let ctx = build(&ty).expect("Failed to build context");
        let names: Vec<_> = unwrap_message(&ctx)
            .fields
            .iter()
            .map(|f| f.name.as_ref())
            .collect();

        assert_eq!(names, vec!["_void_0", "a", "_void_1", "b", "_void_2"]);
        assert!(unwrap_message(&ctx).fields[0].void);
        assert!(!unwrap_message(&ctx).fields[1].void);
    }

    #[test]
    fn test_service_void_counters_are_independent() {
        let request = StructType {
            fields: vec![Attribute::padding(1), Attribute::padding(1)],
            ..StructType::new()
        };
        let response = StructType {
            fields: vec![Attribute::padding(1)],
            ..StructType::new()
        };
        let ty = CompoundType::service("a.Srv", request, response);
        let ctx = build(&ty).expect("Failed to build context");

        let RenderingContext::Service(service) = &ctx else {
            panic!("expected service context");
        };
        assert_eq!(service.request_fields[1].name, "_void_1");
        assert_eq!(service.response_fields[0].name, "_void_0");
        assert_eq!(ctx.kind(), "Service");
        assert_eq!(ctx.header().cpp_kind, "::uavcan::DataTypeKindService");
    }

    #[test]
    fn test_service_includes_cover_both_sections() {
        let request = StructType {
            fields: vec![Attribute::new("r", compound("x.Req"))],
            ..StructType::new()
        };
        let response = StructType {
            fields: vec![Attribute::new("s", compound("a.Resp"))],
            ..StructType::new()
        };
        let ty = CompoundType::service("a.Srv", request, response);
        let ctx = build(&ty).expect("Failed to build context");
        assert_eq!(ctx.header().includes, vec!["a/Resp.hpp", "x/Req.hpp"]);
    }

    #[test]
    fn test_unsigned_constant_suffix() {
        let constant = Constant::new("MAX", uint(8), "42");
        assert_eq!(constant_value(&constant).unwrap(), "42U");

        let signed = Constant::new("MIN", PrimitiveType::new(PrimitiveKind::SignedInt, 8), "-42");
        assert_eq!(constant_value(&signed).unwrap(), "-42");

        let flag = Constant::new("ON", PrimitiveType::new(PrimitiveKind::Boolean, 1), "1");
        assert_eq!(constant_value(&flag).unwrap(), "1");
    }

    #[test]
    fn test_float_constant_verbatim() {
        let constant = Constant::new("PI", PrimitiveType::new(PrimitiveKind::Float, 32), "3.14159e0");
        assert_eq!(constant_value(&constant).unwrap(), "3.14159e0");
    }

    #[test]
    fn test_invalid_float_literal_fails_build() {
        let constant = Constant::new("BAD", PrimitiveType::new(PrimitiveKind::Float, 32), "abc");
        let ty = message_with(vec![], vec![constant]);
        let err = build(&ty).unwrap_err();
        assert!(matches!(
            err,
            CodegenError::InvalidLiteral {
                expected: "float",
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_integer_literal() {
        let constant = Constant::new("BAD", uint(8), "4.2");
        assert!(matches!(
            constant_value(&constant),
            Err(CodegenError::InvalidLiteral {
                expected: "integer",
                ..
            })
        ));
    }

    #[test]
    fn test_union_requires_fields() {
        let empty_union = CompoundType::message(
            "a.U",
            StructType {
                union: true,
                ..StructType::new()
            },
        );
        let ctx = build(&empty_union).expect("Failed to build context");
        assert!(!unwrap_message(&ctx).union);

        let union = CompoundType::message(
            "a.U",
            StructType {
                fields: vec![Attribute::new("a", TypeDescriptor::Primitive(uint(8)))],
                constants: vec![],
                union: true,
            },
        );
        let ctx = build(&union).expect("Failed to build context");
        assert!(unwrap_message(&ctx).union);
    }

    #[test]
    fn test_context_serialization_shape() {
        let ty = message_with(vec![Attribute::padding(3)], vec![]);
        let ctx = build(&ty).expect("Failed to build context");
        let value = minijinja::Value::from_serialize(&ctx);

        let kind = value.get_attr("kind").expect("Failed to read kind");
        assert_eq!(kind.as_str(), Some("Message"));
        let fixed = value.get_attr("fixed_port_id").expect("Failed to read attr");
        assert!(fixed.is_undefined());
    }

    #[test]
    fn test_output_paths() {
        let ty = CompoundType::reference("uavcan.node.Heartbeat");
        assert_eq!(
            output_relative_path(&ty, OUTPUT_FILE_EXTENSION),
            PathBuf::from("uavcan").join("node").join("Heartbeat.hpp")
        );
        assert_eq!(include_path(&ty, OUTPUT_FILE_EXTENSION), "uavcan/node/Heartbeat.hpp");
        assert_eq!(include_path(&ty, "h"), "uavcan/node/Heartbeat.h");
    }

    #[test]
    fn test_includes_follow_extension() {
        let ty = message_with(vec![Attribute::new("i", compound("a.Inner"))], vec![]);

        let ctx = build_with_extension(&ty, "h").expect("Failed to build context");
        assert_eq!(ctx.header().includes, vec!["a/Inner.h".to_string()]);
        let ctx = build(&ty).expect("Failed to build context");
        assert_eq!(ctx.header().includes, vec!["a/Inner.hpp".to_string()]);
    }
}
