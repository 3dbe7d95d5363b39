//! DSDL to libuavcan C++ type mapping.

use crate::error::{CodegenError, Result};
use dsdlc_schema::{ArraySizing, CastMode, CompoundType, PrimitiveKind, PrimitiveType, TypeDescriptor};

pub use dsdlc_schema::MAX_TYPE_DEPTH;

/// Resolves a type node to its libuavcan C++ type expression.
///
/// # Arguments
/// * `ty` - Field, constant or array element type
///
/// # Returns
/// C++ type syntax such as `::uavcan::IntegerSpec< 8, ::uavcan::SignednessUnsigned, ::uavcan::CastModeSaturate >`.
///
/// # Errors
/// Returns `UnknownType`/`UnknownCastMode` for tags the mapping does not cover
/// and `TypeNestingTooDeep` when arrays nest beyond [`MAX_TYPE_DEPTH`].
pub fn resolve(ty: &TypeDescriptor) -> Result<String> {
    resolve_at(ty, 0)
}

fn resolve_at(ty: &TypeDescriptor, depth: usize) -> Result<String> {
    if depth >= MAX_TYPE_DEPTH {
        return Err(CodegenError::TypeNestingTooDeep {
            limit: MAX_TYPE_DEPTH,
        });
    }

    match ty {
        TypeDescriptor::Primitive(p) => primitive_type(p),
        TypeDescriptor::Array(array) => {
            let value_type = resolve_at(&array.element, depth + 1)?;
            let (mode, size) = match array.sizing {
                ArraySizing::Static(size) => ("::uavcan::ArrayModeStatic", size),
                ArraySizing::Dynamic(max_size) => ("::uavcan::ArrayModeDynamic", max_size),
            };
            Ok(format!("::uavcan::Array< {value_type}, {mode}, {size} >"))
        }
        TypeDescriptor::Compound(compound) => Ok(compound_type(compound)),
        TypeDescriptor::Void(void) => Ok(format!(
            "::uavcan::IntegerSpec< {}, ::uavcan::SignednessUnsigned, ::uavcan::CastModeSaturate >",
            void.bit_length
        )),
        other => Err(CodegenError::UnknownType {
            description: format!("{other:?}"),
        }),
    }
}

/// Maps a primitive to an `IntegerSpec` or `FloatSpec`.
///
/// # Errors
/// Returns `UnknownType` for an unrecognized kind and `UnknownCastMode` for an
/// unrecognized cast mode.
pub fn primitive_type(p: &PrimitiveType) -> Result<String> {
    let cast_mode = cast_mode(p.cast_mode)?;
    let signedness = match p.kind {
        PrimitiveKind::Float => {
            return Ok(format!("::uavcan::FloatSpec< {}, {cast_mode} >", p.bit_length));
        }
        PrimitiveKind::Boolean | PrimitiveKind::UnsignedInt => "::uavcan::SignednessUnsigned",
        PrimitiveKind::SignedInt => "::uavcan::SignednessSigned",
        other => {
            return Err(CodegenError::UnknownType {
                description: format!("{other:?}"),
            });
        }
    };
    Ok(format!(
        "::uavcan::IntegerSpec< {}, {signedness}, {cast_mode} >",
        p.bit_length
    ))
}

/// Maps a cast mode to its libuavcan token.
///
/// # Errors
/// Returns `UnknownCastMode` for modes other than saturated and truncated.
pub fn cast_mode(mode: CastMode) -> Result<&'static str> {
    match mode {
        CastMode::Saturated => Ok("::uavcan::CastModeSaturate"),
        CastMode::Truncated => Ok("::uavcan::CastModeTruncate"),
        other => Err(CodegenError::UnknownCastMode {
            mode: format!("{other:?}"),
        }),
    }
}

/// Returns the fully qualified C++ name of a compound type.
#[must_use]
pub fn compound_type(compound: &CompoundType) -> String {
    format!("::{}", compound.full_name.replace('.', "::"))
}
