//! Error types for type-model parsing and validation.

use thiserror::Error;

/// Failure to read a type-model document.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Malformed XML.
    #[error("malformed type-model XML: {0}")]
    Xml(#[from] quick_xml::Error),

    /// An element lacks an attribute it cannot do without.
    #[error("<{element}> requires a '{attribute}' attribute")]
    MissingAttribute {
        /// Element carrying the attribute.
        element: String,
        /// Attribute that was expected.
        attribute: String,
    },

    /// An attribute value does not parse.
    #[error("<{element}> has unusable {attribute}=\"{value}\"")]
    InvalidAttribute {
        /// Element carrying the attribute.
        element: String,
        /// Attribute key.
        attribute: String,
        /// Rejected text.
        value: String,
    },

    /// An element appears where it is not allowed.
    #[error("<{element}> is not allowed inside <{parent}>")]
    UnknownElement {
        /// Offending element.
        element: String,
        /// Enclosing element.
        parent: String,
    },

    /// The document does not have the expected shape.
    #[error("malformed type-model document: {message}")]
    InvalidStructure {
        /// What is wrong.
        message: String,
    },

    /// The document could not be read.
    #[error("cannot read type-model document: {0}")]
    Io(#[from] std::io::Error),

    /// A name or value is not valid UTF-8.
    #[error("type-model document is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

/// Error type for type-model validation.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Full name is empty or has an invalid component.
    #[error("invalid full name '{name}'")]
    InvalidName {
        /// Offending name.
        name: String,
    },

    /// Two types share a full name.
    #[error("duplicate type definition: '{name}'")]
    DuplicateType {
        /// Duplicated full name.
        name: String,
    },

    /// Two attributes of one list share a name.
    #[error("duplicate attribute '{attribute}' in '{type_name}'")]
    DuplicateAttribute {
        /// Enclosing type.
        type_name: String,
        /// Duplicated attribute name.
        attribute: String,
    },

    /// A non-void field has no name, or a void field has one.
    #[error("field #{index} of '{type_name}': {message}")]
    InvalidField {
        /// Enclosing type.
        type_name: String,
        /// Zero-based position in its list.
        index: usize,
        /// Error message.
        message: String,
    },

    /// Array with zero capacity.
    #[error("array in '{type_name}' must have a positive size")]
    EmptyArray {
        /// Enclosing type.
        type_name: String,
    },
}

impl ParseError {
    /// Missing `attribute` on `element`.
    pub fn missing_attr(element: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::MissingAttribute {
            element: element.into(),
            attribute: attribute.into(),
        }
    }

    /// Unparseable `attribute` value on `element`.
    pub fn invalid_attr(
        element: impl Into<String>,
        attribute: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::InvalidAttribute {
            element: element.into(),
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// `element` found inside `parent`, where it does not belong.
    pub fn unknown_element(element: impl Into<String>, parent: impl Into<String>) -> Self {
        Self::UnknownElement {
            element: element.into(),
            parent: parent.into(),
        }
    }

    /// Document shape problem.
    pub fn structure(message: impl Into<String>) -> Self {
        Self::InvalidStructure {
            message: message.into(),
        }
    }
}

impl SchemaError {
    /// Problem with field `index` of `type_name`.
    pub fn invalid_field(type_name: impl Into<String>, index: usize, message: impl Into<String>) -> Self {
        Self::InvalidField {
            type_name: type_name.into(),
            index,
            message: message.into(),
        }
    }
}
