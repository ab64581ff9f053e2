//! # Record Schemas
//!
//! Compiles per-field layout annotations into a validated, position-ordered
//! [`Schema`].
//!
//! ## Annotation Format
//! ```text
//! position:<int>,bytecount:<int>
//! position:<int>,bytecount:<FieldName>
//! ```
//! Both keys are mandatory and may appear in any order. A numeric `bytecount`
//! is a fixed width; anything else names the sibling field whose decoded
//! integer value gives the width at runtime. Such a sibling must sit at an
//! earlier position than the field that refers to it.
//!
//! Positions across a schema must be exactly `1..=N`.

use crate::error::SchemaError;
use std::collections::HashSet;
use tracing::debug;

/// Annotation key carrying the 1-based field position
pub const TAG_POSITION: &str = "position";

/// Annotation key carrying the field width (literal or sibling reference)
pub const TAG_BYTE_COUNT: &str = "bytecount";

/// Width of a field on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Size {
    /// Always exactly this many bytes
    Fixed(usize),
    /// As many bytes as the named sibling field's decoded integer value
    DynamicRef(String),
}

/// Value kind a field decodes into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Int,
    Bytes,
    Text,
    Bool,
}

impl FieldKind {
    /// Get human-readable name
    pub fn name(self) -> &'static str {
        match self {
            FieldKind::Int => "int",
            FieldKind::Bytes => "bytes",
            FieldKind::Text => "text",
            FieldKind::Bool => "bool",
        }
    }
}

/// A parsed annotation, before schema-level validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub position: i64,
    pub size: Size,
}

/// Parse a single layout annotation.
///
/// Keys are matched case-insensitively.
pub fn parse_tag(tag: &str) -> Result<Tag, SchemaError> {
    let mut position = None;
    let mut size = None;

    for part in tag.split(',') {
        let mut kv = part.split(':');
        let (key, value) = match (kv.next(), kv.next(), kv.next()) {
            (Some(key), Some(value), None) => (key, value),
            _ => return Err(SchemaError::MalformedTag(part.to_string())),
        };

        match key.to_ascii_lowercase().as_str() {
            TAG_POSITION => {
                let parsed = value
                    .parse::<i64>()
                    .map_err(|_| SchemaError::MalformedTag(part.to_string()))?;
                position = Some(parsed);
            }
            TAG_BYTE_COUNT => {
                if value.is_empty() {
                    return Err(SchemaError::MalformedTag(part.to_string()));
                }
                let parsed = match value.parse::<i64>() {
                    Ok(n) => usize::try_from(n)
                        .map(Size::Fixed)
                        .map_err(|_| SchemaError::MalformedTag(part.to_string()))?,
                    Err(_) => Size::DynamicRef(value.to_string()),
                };
                size = Some(parsed);
            }
            _ => return Err(SchemaError::UnknownTag(key.to_string())),
        }
    }

    Ok(Tag {
        position: position.ok_or(SchemaError::MissingTag(TAG_POSITION))?,
        size: size.ok_or(SchemaError::MissingTag(TAG_BYTE_COUNT))?,
    })
}

/// Static declaration of one candidate field.
///
/// An empty `tag` marks a field that does not take part in the wire layout.
#[derive(Debug, Clone, Copy)]
pub struct FieldDef<'a> {
    pub name: &'a str,
    pub tag: &'a str,
    pub kind: FieldKind,
}

impl<'a> FieldDef<'a> {
    pub const fn new(name: &'a str, tag: &'a str, kind: FieldKind) -> Self {
        Self { name, tag, kind }
    }
}

/// One validated field of a schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    name: String,
    position: u32,
    size: Size,
    kind: FieldKind,
}

impl Field {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> u32 {
        self.position
    }

    pub fn size(&self) -> &Size {
        &self.size
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }
}

/// Validated field layout, sorted by position. Immutable once compiled.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    /// Compile field declarations into a schema.
    ///
    /// # Errors
    /// - `UnknownTag` / `MissingTag` / `MalformedTag` for a bad annotation
    /// - `DuplicatePosition` when two fields claim the same position
    /// - `DuplicateName` when two tagged fields share a name
    /// - `InvalidPosition` for a position below 1 or a gap in `1..=max`
    pub fn compile(defs: &[FieldDef<'_>]) -> Result<Self, SchemaError> {
        let mut seen = HashSet::new();
        let mut names = HashSet::new();
        let mut max = 0u32;
        let mut fields = Vec::with_capacity(defs.len());

        for def in defs {
            if def.tag.is_empty() {
                continue;
            }

            let tag = parse_tag(def.tag)?;
            let position = u32::try_from(tag.position)
                .ok()
                .filter(|p| *p >= 1)
                .ok_or(SchemaError::InvalidPosition(tag.position))?;

            if !seen.insert(position) {
                return Err(SchemaError::DuplicatePosition(position));
            }
            if !names.insert(def.name) {
                return Err(SchemaError::DuplicateName(def.name.to_string()));
            }
            max = max.max(position);

            fields.push(Field {
                name: def.name.to_string(),
                position,
                size: tag.size,
                kind: def.kind,
            });
        }

        fields.sort_by_key(|f| f.position);

        // Distinct positions >= 1 are contiguous iff the largest equals the count
        if max as usize != fields.len() {
            let missing = (1..=max)
                .zip(fields.iter())
                .find(|(expected, field)| field.position != *expected)
                .map(|(expected, _)| expected)
                .unwrap_or(max);
            return Err(SchemaError::InvalidPosition(i64::from(missing)));
        }

        debug!(fields = fields.len(), "Compiled record schema");
        Ok(Self { fields })
    }

    /// Fields in wire order
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
