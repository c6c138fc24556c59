use serde::{Deserialize, Serialize};

/// Maximum length, in characters, of the text fields carried by the download outputs.
pub const MAX_TEXT_LENGTH: usize = 999_999;

/// Storage type of a field, as declared by the host's record metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    Bool,
    Int64,
    Double,
    String,
    VString,
    VWString,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub field_type: FieldType,
    pub size: usize,
}

/// The ordered set of fields every record on a connection carries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordLayout {
    fields: Vec<Field>,
}

impl RecordLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// A layout holding a single wide string field of `MAX_TEXT_LENGTH`.
    pub fn single_text_field(name: &str) -> Self {
        let mut layout = Self::new();
        layout.add_field(name, FieldType::VWString, MAX_TEXT_LENGTH);
        layout
    }

    /// Append a field and return its index.
    pub fn add_field(&mut self, name: &str, field_type: FieldType, size: usize) -> usize {
        self.fields.push(Field {
            name: name.to_owned(),
            field_type,
            size,
        });
        self.fields.len() - 1
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.field_index(name).is_some()
    }

    /// Resolve a field name once so per-record reads skip the name lookup.
    pub fn accessor(&self, name: &str) -> Option<FieldAccessor> {
        self.field_index(name).map(|index| FieldAccessor { index })
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// One record's values, positionally matching a `RecordLayout`. `None` is a null value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    values: Vec<Option<String>>,
}

impl Record {
    pub fn new(values: Vec<Option<String>>) -> Self {
        Self { values }
    }

    /// A record for a single text field layout, truncated to `MAX_TEXT_LENGTH`.
    pub fn single_text(value: &str) -> Self {
        Self {
            values: vec![Some(truncate_text(value, MAX_TEXT_LENGTH))],
        }
    }

    pub fn values(&self) -> &[Option<String>] {
        &self.values
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.values.get(index).and_then(|value| value.as_deref())
    }
}

/// Pre-resolved position of a field within a layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldAccessor {
    index: usize,
}

impl FieldAccessor {
    pub fn get_as_string<'r>(&self, record: &'r Record) -> Option<&'r str> {
        record.get(self.index)
    }
}

/// Outcome of reading a field by name from a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    /// The layout has no field with that name.
    Missing,
    Null,
    Text(&'a str),
}

/// A record together with the layout that names its fields.
/// Handles borrow both and must not outlive the callback that produced them.
#[derive(Debug, Clone, Copy)]
pub struct RecordHandle<'a> {
    layout: &'a RecordLayout,
    record: &'a Record,
}

impl<'a> RecordHandle<'a> {
    pub fn new(layout: &'a RecordLayout, record: &'a Record) -> Self {
        Self { layout, record }
    }

    pub fn get_as_string(&self, name: &str) -> FieldValue<'a> {
        match self.layout.field_index(name) {
            None => FieldValue::Missing,
            Some(index) => match self.record.get(index) {
                Some(value) => FieldValue::Text(value),
                None => FieldValue::Null,
            },
        }
    }
}

/// Cut `value` down to at most `max_chars` characters.
pub fn truncate_text(value: &str, max_chars: usize) -> String {
    match value.char_indices().nth(max_chars) {
        Some((byte_index, _)) => value[..byte_index].to_owned(),
        None => value.to_owned(),
    }
}
