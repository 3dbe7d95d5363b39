//! Type-model document parser.
//!
//! The DSDL front end hands resolved types to the generator as an XML
//! document: a `<dsdl>` root holding `<message>` and `<service>` elements whose
//! bodies list `<field>` and `<constant>` elements. Each of those wraps exactly
//! one type element (`<bool>`, `<uint>`, `<int>`, `<float>`, `<void>`,
//! `<compound>` or a nested `<array>`).

use crate::error::ParseError;
use crate::types::{
    ArraySizing, ArrayType, Attribute, CastMode, CompoundType, Constant, MAX_TYPE_DEPTH,
    PrimitiveKind, PrimitiveType, StructType, TypeDescriptor, VoidType,
};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Compound types defined so far, used to resolve `<compound>` references.
type Known = HashMap<String, Arc<CompoundType>>;

/// Parses a type-model document from a string.
///
/// # Arguments
/// * `xml` - Document content
///
/// # Returns
/// The top-level types in document order.
///
/// # Errors
/// Returns `ParseError` if the XML is malformed or contains invalid elements.
pub fn parse_types(xml: &str) -> Result<Vec<CompoundType>, ParseError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut known = Known::new();
    let mut types = Vec::new();
    let mut root_seen = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name_bytes = e.name().as_ref().to_vec();
                let name = std::str::from_utf8(&name_bytes)?;
                match name {
                    "dsdl" => root_seen = true,
                    "message" if root_seen => {
                        let ty = parse_message(&mut reader, e, &known)?;
                        register(&mut known, &mut types, ty);
                    }
                    "service" if root_seen => {
                        let ty = parse_service(&mut reader, e, &known)?;
                        register(&mut known, &mut types, ty);
                    }
                    other => return Err(ParseError::unknown_element(other, "dsdl")),
                }
            }
            Ok(Event::Empty(ref e)) => {
                let name_bytes = e.name().as_ref().to_vec();
                let name = std::str::from_utf8(&name_bytes)?;
                match name {
                    "dsdl" => root_seen = true,
                    "message" if root_seen => {
                        let (full_name, port_id, union) = parse_compound_attrs(e, "message")?;
                        let body = StructType {
                            union,
                            ..StructType::new()
                        };
                        let ty = with_port(CompoundType::message(full_name, body), port_id);
                        register(&mut known, &mut types, ty);
                    }
                    "service" if root_seen => {
                        let (full_name, port_id, _) = parse_compound_attrs(e, "service")?;
                        let ty = CompoundType::service(full_name, StructType::new(), StructType::new());
                        register(&mut known, &mut types, with_port(ty, port_id));
                    }
                    other => return Err(ParseError::unknown_element(other, "dsdl")),
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ParseError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    if !root_seen {
        return Err(ParseError::structure("No dsdl element found"));
    }

    Ok(types)
}

/// Parses a type-model document from a file.
///
/// # Errors
/// Returns `ParseError` if the file cannot be read or parsed.
pub fn parse_file(path: &Path) -> Result<Vec<CompoundType>, ParseError> {
    let xml = std::fs::read_to_string(path)?;
    parse_types(&xml)
}

fn register(known: &mut Known, types: &mut Vec<CompoundType>, ty: CompoundType) {
    known.insert(ty.full_name.clone(), Arc::new(ty.clone()));
    types.push(ty);
}

fn with_port(ty: CompoundType, port_id: Option<u32>) -> CompoundType {
    match port_id {
        Some(id) => ty.with_fixed_port_id(id),
        None => ty,
    }
}

/// Parses `name`, `fixedPortId` and `union` of a message or service element.
fn parse_compound_attrs(
    e: &BytesStart<'_>,
    element: &str,
) -> Result<(String, Option<u32>, bool), ParseError> {
    let mut name = None;
    let mut port_id = None;
    let mut union = false;

    for attr in e.attributes().flatten() {
        let key = std::str::from_utf8(attr.key.as_ref())?;
        let value = std::str::from_utf8(&attr.value)?;

        match key {
            "name" => name = Some(value.to_string()),
            "fixedPortId" => {
                port_id = Some(
                    value
                        .parse()
                        .map_err(|_| ParseError::invalid_attr(element, "fixedPortId", value))?,
                )
            }
            "union" => union = parse_bool(element, "union", value)?,
            _ => {}
        }
    }

    let name = name.ok_or_else(|| ParseError::missing_attr(element, "name"))?;
    Ok((name, port_id, union))
}

fn parse_bool(element: &str, attribute: &str, value: &str) -> Result<bool, ParseError> {
    match value {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(ParseError::invalid_attr(element, attribute, value)),
    }
}

/// Parses a message element with content.
fn parse_message(
    reader: &mut Reader<&[u8]>,
    e: &BytesStart<'_>,
    known: &Known,
) -> Result<CompoundType, ParseError> {
    let (full_name, port_id, union) = parse_compound_attrs(e, "message")?;
    let mut body = parse_struct_body(reader, "message", known)?;
    body.union = union;
    Ok(with_port(CompoundType::message(full_name, body), port_id))
}

/// Parses a service element and its request/response sections.
fn parse_service(
    reader: &mut Reader<&[u8]>,
    e: &BytesStart<'_>,
    known: &Known,
) -> Result<CompoundType, ParseError> {
    let (full_name, port_id, _) = parse_compound_attrs(e, "service")?;
    let mut request = None;
    let mut response = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name_bytes = e.name().as_ref().to_vec();
                let name = std::str::from_utf8(&name_bytes)?;
                let union = parse_section_union(e, name)?;
                let mut body = match name {
                    "request" | "response" => parse_struct_body(reader, name, known)?,
                    other => return Err(ParseError::unknown_element(other, "service")),
                };
                body.union = union;
                if name == "request" {
                    request = Some(body);
                } else {
                    response = Some(body);
                }
            }
            Ok(Event::Empty(ref e)) => {
                let name_bytes = e.name().as_ref().to_vec();
                let name = std::str::from_utf8(&name_bytes)?;
                let body = StructType {
                    union: parse_section_union(e, name)?,
                    ..StructType::new()
                };
                match name {
                    "request" => request = Some(body),
                    "response" => response = Some(body),
                    other => return Err(ParseError::unknown_element(other, "service")),
                }
            }
            Ok(Event::End(_)) => break,
            Ok(Event::Eof) => {
                return Err(ParseError::structure(format!(
                    "unexpected end of document inside service '{full_name}'"
                )));
            }
            Err(e) => return Err(ParseError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    let ty = CompoundType::service(
        full_name,
        request.unwrap_or_default(),
        response.unwrap_or_default(),
    );
    Ok(with_port(ty, port_id))
}

fn parse_section_union(e: &BytesStart<'_>, element: &str) -> Result<bool, ParseError> {
    for attr in e.attributes().flatten() {
        let key = std::str::from_utf8(attr.key.as_ref())?;
        if key == "union" {
            let value = std::str::from_utf8(&attr.value)?;
            return parse_bool(element, "union", value);
        }
    }
    Ok(false)
}

/// Parses the fields and constants of a message or service section, up to and
/// including the section's end tag.
fn parse_struct_body(
    reader: &mut Reader<&[u8]>,
    context: &str,
    known: &Known,
) -> Result<StructType, ParseError> {
    let mut body = StructType::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name_bytes = e.name().as_ref().to_vec();
                let name = std::str::from_utf8(&name_bytes)?;
                match name {
                    "field" => {
                        let field_name = optional_attr(e, "name")?;
                        let data_type = parse_wrapped_type(reader, "field", known, 0)?;
                        body.add_field(Attribute {
                            name: field_name,
                            data_type,
                        });
                    }
                    "constant" => {
                        let constant_name = optional_attr(e, "name")?
                            .ok_or_else(|| ParseError::missing_attr("constant", "name"))?;
                        let value = optional_attr(e, "value")?
                            .ok_or_else(|| ParseError::missing_attr("constant", "value"))?;
                        let data_type = match parse_wrapped_type(reader, "constant", known, 0)? {
                            TypeDescriptor::Primitive(p) => p,
                            other => {
                                return Err(ParseError::invalid_attr(
                                    "constant",
                                    "type",
                                    other.describe(),
                                ));
                            }
                        };
                        body.add_constant(Constant::new(constant_name, data_type, value));
                    }
                    other => return Err(ParseError::unknown_element(other, context)),
                }
            }
            Ok(Event::Empty(ref e)) => {
                let name_bytes = e.name().as_ref().to_vec();
                let name = std::str::from_utf8(&name_bytes)?;
                return Err(match name {
                    "field" | "constant" => {
                        ParseError::structure(format!("<{name}> in <{context}> has no type"))
                    }
                    other => ParseError::unknown_element(other, context),
                });
            }
            Ok(Event::End(_)) => break,
            Ok(Event::Eof) => {
                return Err(ParseError::structure(format!(
                    "unexpected end of document inside <{context}>"
                )));
            }
            Err(e) => return Err(ParseError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(body)
}

fn optional_attr(e: &BytesStart<'_>, wanted: &str) -> Result<Option<String>, ParseError> {
    for attr in e.attributes().flatten() {
        let key = std::str::from_utf8(attr.key.as_ref())?;
        if key == wanted {
            return Ok(Some(std::str::from_utf8(&attr.value)?.to_string()));
        }
    }
    Ok(None)
}

/// Parses the single type element wrapped by `context`, consuming the
/// wrapper's end tag. `depth` counts the enclosing arrays.
fn parse_wrapped_type(
    reader: &mut Reader<&[u8]>,
    context: &str,
    known: &Known,
    depth: usize,
) -> Result<TypeDescriptor, ParseError> {
    if depth >= MAX_TYPE_DEPTH {
        return Err(ParseError::structure(format!(
            "arrays nested deeper than {MAX_TYPE_DEPTH} levels"
        )));
    }

    let mut data_type = None;
    let mut buf = Vec::new();

    loop {
        let element = match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => Some((e.into_owned(), false)),
            Ok(Event::Empty(e)) => Some((e.into_owned(), true)),
            Ok(Event::End(_)) => break,
            Ok(Event::Eof) => {
                return Err(ParseError::structure(format!(
                    "unexpected end of document inside <{context}>"
                )));
            }
            Err(e) => return Err(ParseError::Xml(e)),
            _ => None,
        };
        buf.clear();

        let Some((e, empty)) = element else {
            continue;
        };
        if data_type.is_some() {
            return Err(ParseError::structure(format!(
                "<{context}> must contain exactly one type"
            )));
        }
        data_type = Some(parse_type_element(reader, &e, empty, known, depth)?);
    }

    data_type.ok_or_else(|| ParseError::structure(format!("<{context}> has no type")))
}

/// Parses one type element. For non-empty elements the end tag is consumed.
fn parse_type_element(
    reader: &mut Reader<&[u8]>,
    e: &BytesStart<'_>,
    empty: bool,
    known: &Known,
    depth: usize,
) -> Result<TypeDescriptor, ParseError> {
    let name_bytes = e.name().as_ref().to_vec();
    let element = std::str::from_utf8(&name_bytes)?;

    let kind = match element {
        "bool" => Some(PrimitiveKind::Boolean),
        "uint" => Some(PrimitiveKind::UnsignedInt),
        "int" => Some(PrimitiveKind::SignedInt),
        "float" => Some(PrimitiveKind::Float),
        _ => None,
    };

    let data_type = if let Some(kind) = kind {
        TypeDescriptor::Primitive(parse_primitive(e, element, kind)?)
    } else {
        match element {
            "void" => {
                let bits = optional_attr(e, "bits")?
                    .ok_or_else(|| ParseError::missing_attr("void", "bits"))?;
                TypeDescriptor::Void(VoidType {
                    bit_length: parse_bits("void", &bits)?,
                })
            }
            "compound" => {
                let name = optional_attr(e, "name")?
                    .ok_or_else(|| ParseError::missing_attr("compound", "name"))?;
                let target = known
                    .get(&name)
                    .cloned()
                    .unwrap_or_else(|| Arc::new(CompoundType::reference(name)));
                TypeDescriptor::Compound(target)
            }
            "array" => {
                let sizing = parse_array_sizing(e)?;
                if empty {
                    return Err(ParseError::structure("<array> has no element type"));
                }
                // The element parser consumes the array's end tag.
                let element_type = parse_wrapped_type(reader, "array", known, depth + 1)?;
                return Ok(TypeDescriptor::Array(ArrayType::new(element_type, sizing)));
            }
            other => return Err(ParseError::unknown_element(other, "type")),
        }
    };

    if !empty {
        skip_to_end(reader)?;
    }
    Ok(data_type)
}

fn parse_primitive(
    e: &BytesStart<'_>,
    element: &str,
    kind: PrimitiveKind,
) -> Result<PrimitiveType, ParseError> {
    let mut bits = None;
    let mut cast_mode = CastMode::default();

    for attr in e.attributes().flatten() {
        let key = std::str::from_utf8(attr.key.as_ref())?;
        let value = std::str::from_utf8(&attr.value)?;

        match key {
            "bits" => bits = Some(parse_bits(element, value)?),
            "cast" => {
                cast_mode = CastMode::parse(value)
                    .ok_or_else(|| ParseError::invalid_attr(element, "cast", value))?
            }
            _ => {}
        }
    }

    let bit_length = match (bits, kind) {
        (Some(bits), _) => bits,
        (None, PrimitiveKind::Boolean) => 1,
        (None, _) => return Err(ParseError::missing_attr(element, "bits")),
    };

    Ok(PrimitiveType::new(kind, bit_length).with_cast_mode(cast_mode))
}

fn parse_bits(element: &str, value: &str) -> Result<u8, ParseError> {
    match value.parse::<u8>() {
        Ok(bits) if (1..=64).contains(&bits) => Ok(bits),
        _ => Err(ParseError::invalid_attr(element, "bits", value)),
    }
}

fn parse_array_sizing(e: &BytesStart<'_>) -> Result<ArraySizing, ParseError> {
    let mut sizing = None;

    for attr in e.attributes().flatten() {
        let key = std::str::from_utf8(attr.key.as_ref())?;
        let value = std::str::from_utf8(&attr.value)?;

        let make: fn(usize) -> ArraySizing = match key {
            "size" => ArraySizing::Static,
            "maxSize" => ArraySizing::Dynamic,
            _ => continue,
        };
        if sizing.is_some() {
            return Err(ParseError::structure(
                "<array> takes either 'size' or 'maxSize', not both",
            ));
        }
        let n = value
            .parse()
            .map_err(|_| ParseError::invalid_attr("array", key, value))?;
        sizing = Some(make(n));
    }

    sizing.ok_or_else(|| ParseError::missing_attr("array", "size"))
}

/// Skips everything up to the end tag of the element just opened.
fn skip_to_end(reader: &mut Reader<&[u8]>) -> Result<(), ParseError> {
    let mut buf = Vec::new();
    let mut depth = 1;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(_)) => depth += 1,
            Ok(Event::End(_)) => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            Ok(Event::Eof) => {
                return Err(ParseError::structure("unexpected end of document"));
            }
            Err(e) => return Err(ParseError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CompoundKind;

    const HEARTBEAT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<dsdl>
    <message name="uavcan.node.Health">
        <constant name="NOMINAL" value="0"><uint bits="2"/></constant>
        <field name="value"><uint bits="2"/></field>
    </message>
    <message name="uavcan.node.Heartbeat" fixedPortId="7509">
        <constant name="MAX_PUBLICATION_PERIOD" value="1"><uint bits="16"/></constant>
        <field name="uptime"><uint bits="32" cast="truncated"/></field>
        <field name="health"><compound name="uavcan.node.Health"/></field>
        <field><void bits="3"/></field>
        <field name="values">
            <array maxSize="8"><float bits="32"/></array>
        </field>
    </message>
</dsdl>"#;

    const GET_INFO: &str = r#"<dsdl>
    <service name="uavcan.node.GetInfo" fixedPortId="430">
        <request/>
        <response union="true">
            <field name="name"><array maxSize="50"><uint bits="8"/></array></field>
            <field name="version"><compound name="uavcan.node.Version"/></field>
        </response>
    </service>
</dsdl>"#;

    #[test]
    fn test_parse_messages() {
        let types = parse_types(HEARTBEAT).expect("Failed to parse types");
        assert_eq!(types.len(), 2);

        let heartbeat = &types[1];
        assert_eq!(heartbeat.full_name, "uavcan.node.Heartbeat");
        assert_eq!(heartbeat.fixed_port_id, Some(7509));

        let CompoundKind::Message(body) = &heartbeat.kind else {
            panic!("expected message");
        };
        assert_eq!(body.fields.len(), 4);
        assert_eq!(body.constants.len(), 1);
        assert!(!body.union);
        assert_eq!(body.constants[0].string_value, "1");
    }

    #[test]
    fn test_parse_field_types() {
        let types = parse_types(HEARTBEAT).expect("Failed to parse types");
        let CompoundKind::Message(body) = &types[1].kind else {
            panic!("expected message");
        };

        assert_eq!(
            body.fields[0].data_type,
            TypeDescriptor::Primitive(
                PrimitiveType::new(PrimitiveKind::UnsignedInt, 32)
                    .with_cast_mode(CastMode::Truncated)
            )
        );
        assert!(body.fields[2].name.is_none());
        assert!(body.fields[2].data_type.is_void());
        assert_eq!(body.fields[3].data_type.describe(), "float32[<=8]");
    }

    #[test]
    fn test_compound_reference_resolves_earlier_definition() {
        let types = parse_types(HEARTBEAT).expect("Failed to parse types");
        let CompoundKind::Message(body) = &types[1].kind else {
            panic!("expected message");
        };
        let TypeDescriptor::Compound(health) = &body.fields[1].data_type else {
            panic!("expected compound");
        };
        assert_eq!(health.as_ref(), &types[0]);
    }

    #[test]
    fn test_parse_service() {
        let types = parse_types(GET_INFO).expect("Failed to parse types");
        assert_eq!(types.len(), 1);
        let CompoundKind::Service { request, response } = &types[0].kind else {
            panic!("expected service");
        };
        assert!(request.fields.is_empty());
        assert!(response.union);
        assert_eq!(response.fields.len(), 2);

        // Not defined in the document: resolved to a bodiless reference.
        let TypeDescriptor::Compound(version) = &response.fields[1].data_type else {
            panic!("expected compound");
        };
        assert_eq!(version.full_name, "uavcan.node.Version");
    }

    #[test]
    fn test_missing_root() {
        let result = parse_types("<message name=\"a.B\"/>");
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_type_element() {
        let xml = r#"<dsdl><message name="a.B"><field name="x"><utf8/></field></message></dsdl>"#;
        let err = parse_types(xml).unwrap_err();
        assert!(matches!(err, ParseError::UnknownElement { .. }));
    }

    fn nested_arrays(levels: usize) -> String {
        format!(
            r#"<dsdl><message name="a.B"><field name="x">{}<uint bits="8"/>{}</field></message></dsdl>"#,
            r#"<array size="1">"#.repeat(levels),
            "</array>".repeat(levels)
        )
    }

    #[test]
    fn test_array_nesting_limit() {
        let types = parse_types(&nested_arrays(MAX_TYPE_DEPTH - 1)).expect("Failed to parse types");
        let body = types[0].structs()[0];
        assert!(matches!(body.fields[0].data_type, TypeDescriptor::Array(_)));

        let err = parse_types(&nested_arrays(MAX_TYPE_DEPTH)).unwrap_err();
        assert!(matches!(err, ParseError::InvalidStructure { .. }));
    }

    #[test]
    fn test_pathological_nesting_is_an_error() {
        let err = parse_types(&nested_arrays(100_000)).unwrap_err();
        assert!(matches!(err, ParseError::InvalidStructure { .. }));
    }

    #[test]
    fn test_invalid_cast_mode() {
        let xml = r#"<dsdl><message name="a.B"><field name="x"><uint bits="8" cast="wrap"/></field></message></dsdl>"#;
        let err = parse_types(xml).unwrap_err();
        assert!(matches!(err, ParseError::InvalidAttribute { .. }));
    }

    #[test]
    fn test_field_without_type() {
        let xml = r#"<dsdl><message name="a.B"><field name="x"/></message></dsdl>"#;
        assert!(matches!(
            parse_types(xml).unwrap_err(),
            ParseError::InvalidStructure { .. }
        ));
    }

    #[test]
    fn test_constant_must_be_primitive() {
        let xml = r#"<dsdl><message name="a.B"><constant name="C" value="1"><void bits="2"/></constant></message></dsdl>"#;
        assert!(parse_types(xml).is_err());
    }

    #[test]
    fn test_array_requires_single_sizing() {
        let xml = r#"<dsdl><message name="a.B"><field name="x"><array size="2" maxSize="3"><uint bits="8"/></array></field></message></dsdl>"#;
        assert!(parse_types(xml).is_err());
    }

    #[test]
    fn test_nested_arrays() {
        let xml = r#"<dsdl><message name="a.B"><field name="m">
            <array size="3"><array maxSize="4"><int bits="16"/></array></array>
        </field></message></dsdl>"#;
        let types = parse_types(xml).expect("Failed to parse types");
        let CompoundKind::Message(body) = &types[0].kind else {
            panic!("expected message");
        };
        assert_eq!(body.fields[0].data_type.describe(), "int16[<=4][3]");
    }

    #[test]
    fn test_bool_defaults_to_one_bit() {
        let xml = r#"<dsdl><message name="a.B"><field name="flag"><bool/></field></message></dsdl>"#;
        let types = parse_types(xml).expect("Failed to parse types");
        let CompoundKind::Message(body) = &types[0].kind else {
            panic!("expected message");
        };
        assert_eq!(
            body.fields[0].data_type,
            TypeDescriptor::Primitive(PrimitiveType::new(PrimitiveKind::Boolean, 1))
        );
    }
}
