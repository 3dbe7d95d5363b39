//! Type-model validation utilities.
//!
//! The front end is expected to hand over a consistent model; these checks
//! guard the invariants the generator relies on before any output is produced.

use crate::error::SchemaError;
use crate::types::{CompoundType, StructType, TypeDescriptor};
use std::collections::HashSet;

/// Prefix reserved for the synthetic names of void padding fields.
pub const VOID_NAME_PREFIX: &str = "_void_";

/// Validates a sequence of top-level types.
///
/// # Arguments
/// * `types` - Types in the order they will be generated
///
/// # Returns
/// Ok(()) if valid, or SchemaError describing the first issue.
///
/// # Errors
/// Returns `SchemaError` if validation fails.
pub fn validate_types(types: &[CompoundType]) -> Result<(), SchemaError> {
    let mut seen = HashSet::new();

    for ty in types {
        validate_type(ty)?;
        if !seen.insert(ty.full_name.as_str()) {
            return Err(SchemaError::DuplicateType {
                name: ty.full_name.clone(),
            });
        }
    }

    Ok(())
}

/// Validates one compound type.
///
/// # Errors
/// Returns `SchemaError` if validation fails.
pub fn validate_type(ty: &CompoundType) -> Result<(), SchemaError> {
    validate_full_name(&ty.full_name)?;
    for body in ty.structs() {
        validate_struct(&ty.full_name, body)?;
    }
    Ok(())
}

/// Validates a dotted full name: non-empty identifier components.
///
/// # Errors
/// Returns `SchemaError::InvalidName` if any component is not an identifier.
pub fn validate_full_name(name: &str) -> Result<(), SchemaError> {
    if name.split('.').all(is_identifier) {
        Ok(())
    } else {
        Err(SchemaError::InvalidName {
            name: name.to_string(),
        })
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

fn validate_struct(type_name: &str, body: &StructType) -> Result<(), SchemaError> {
    let mut field_names = HashSet::new();

    for (index, field) in body.fields.iter().enumerate() {
        match (&field.name, field.data_type.is_void()) {
            (Some(_), true) => {
                return Err(SchemaError::invalid_field(
                    type_name,
                    index,
                    "void padding cannot be named",
                ));
            }
            (None, false) => {
                return Err(SchemaError::invalid_field(type_name, index, "missing name"));
            }
            (Some(name), false) => {
                if !is_identifier(name) || name.starts_with(VOID_NAME_PREFIX) {
                    return Err(SchemaError::invalid_field(
                        type_name,
                        index,
                        format!("invalid name '{name}'"),
                    ));
                }
                if !field_names.insert(name.as_str()) {
                    return Err(SchemaError::DuplicateAttribute {
                        type_name: type_name.to_string(),
                        attribute: name.clone(),
                    });
                }
            }
            (None, true) => {}
        }
        validate_sizes(type_name, &field.data_type)?;
    }

    let mut constant_names = HashSet::new();
    for constant in &body.constants {
        if !constant_names.insert(constant.name.as_str()) {
            return Err(SchemaError::DuplicateAttribute {
                type_name: type_name.to_string(),
                attribute: constant.name.clone(),
            });
        }
    }

    Ok(())
}

fn validate_sizes(type_name: &str, data_type: &TypeDescriptor) -> Result<(), SchemaError> {
    let mut current = data_type;
    while let TypeDescriptor::Array(array) = current {
        if array.sizing.capacity() == 0 {
            return Err(SchemaError::EmptyArray {
                type_name: type_name.to_string(),
            });
        }
        current = &array.element;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ArraySizing, ArrayType, Attribute, Constant, PrimitiveKind, PrimitiveType};

    fn uint8() -> TypeDescriptor {
        TypeDescriptor::Primitive(PrimitiveType::new(PrimitiveKind::UnsignedInt, 8))
    }

    fn message(fields: Vec<Attribute>) -> CompoundType {
        let mut body = StructType::new();
        body.fields = fields;
        CompoundType::message("test.Msg", body)
    }

    #[test]
    fn test_valid_message() {
        let ty = message(vec![
            Attribute::new("a", uint8()),
            Attribute::padding(3),
            Attribute::new("b", uint8()),
            Attribute::padding(5),
        ]);
        assert!(validate_types(&[ty]).is_ok());
    }

    #[test]
    fn test_invalid_full_names() {
        assert!(validate_full_name("uavcan.node.Heartbeat").is_ok());
        assert!(validate_full_name("").is_err());
        assert!(validate_full_name("uavcan..Heartbeat").is_err());
        assert!(validate_full_name("uavcan.1node.X").is_err());
    }

    #[test]
    fn test_duplicate_types() {
        let result = validate_types(&[message(vec![]), message(vec![])]);
        assert!(matches!(result, Err(SchemaError::DuplicateType { .. })));
    }

    #[test]
    fn test_duplicate_field_names() {
        let ty = message(vec![Attribute::new("a", uint8()), Attribute::new("a", uint8())]);
        assert!(matches!(
            validate_type(&ty),
            Err(SchemaError::DuplicateAttribute { .. })
        ));
    }

    #[test]
    fn test_field_name_reserved_for_padding() {
        let ty = message(vec![Attribute::new("_void_0", uint8())]);
        assert!(matches!(
            validate_type(&ty),
            Err(SchemaError::InvalidField { .. })
        ));
    }

    #[test]
    fn test_unnamed_non_void_field() {
        let ty = message(vec![Attribute {
            name: None,
            data_type: uint8(),
        }]);
        assert!(validate_type(&ty).is_err());
    }

    #[test]
    fn test_zero_sized_array() {
        let ty = message(vec![Attribute::new(
            "a",
            TypeDescriptor::Array(ArrayType::new(uint8(), ArraySizing::Dynamic(0))),
        )]);
        assert!(matches!(
            validate_type(&ty),
            Err(SchemaError::EmptyArray { .. })
        ));
    }

    #[test]
    fn test_duplicate_constants() {
        let mut body = StructType::new();
        let prim = PrimitiveType::new(PrimitiveKind::UnsignedInt, 8);
        body.add_constant(Constant::new("C", prim, "1"));
        body.add_constant(Constant::new("C", prim, "2"));
        let ty = CompoundType::message("test.Msg", body);
        assert!(validate_type(&ty).is_err());
    }
}
