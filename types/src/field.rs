//! Declarative field configuration
//!
//! Fields come in two families:
//! - **data fields** own a column in the collection's table
//! - **layout fields** (`tabs`, `collapsible`, `row`) carry nested fields for
//!   presentation purposes and contribute their children's columns instead of
//!   their own
//!
//! [`flatten_fields`] resolves the layout family away, leaving the flat column
//! list the schema builder works with. A named tab is the one hybrid: it is
//! stored as a single JSON group column rather than hoisting its children.

use serde::{Deserialize, Serialize};

/// A field in a collection config, tagged by its `type` key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Field {
    Text(DataField),
    Textarea(DataField),
    RichText(DataField),
    Email(DataField),
    Slug(DataField),
    Select(SelectField),
    Number(DataField),
    Checkbox(DataField),
    Date(DataField),
    Relationship(RelationshipField),
    Upload(RelationshipField),
    Array(DataField),
    Group(GroupField),
    Blocks(DataField),
    Json(DataField),
    Tabs(TabsField),
    Collapsible(ContainerField),
    Row(ContainerField),
}

/// Common shape for simple data fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataField {
    pub name: String,
    #[serde(default)]
    pub required: bool,
}

/// A select field with its option list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectField {
    pub name: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub options: Vec<String>,
}

/// A relationship (or upload) field pointing at another collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipField {
    pub name: String,
    #[serde(default)]
    pub required: bool,
    pub relation_to: RelationTarget,
    #[serde(default)]
    pub has_many: bool,
    #[serde(default)]
    pub on_delete: Option<OnDeleteRule>,
}

impl RelationshipField {
    /// The single target slug, if this relationship is not polymorphic
    #[must_use]
    pub fn single_target(&self) -> Option<&str> {
        match &self.relation_to {
            RelationTarget::Collection(slug) => Some(slug),
            RelationTarget::Polymorphic(_) => None,
        }
    }
}

/// Relationship target: one collection slug, or a set of slugs (polymorphic)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelationTarget {
    Collection(String),
    Polymorphic(Vec<String>),
}

/// Referential action requested on the config side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OnDeleteRule {
    Cascade,
    Restrict,
    SetNull,
}

/// A group field, stored as a single JSON column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupField {
    pub name: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub fields: Vec<Field>,
}

/// A tabs layout field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabsField {
    pub tabs: Vec<Tab>,
}

/// One tab: named tabs own a JSON group column, unnamed tabs hoist children
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub fields: Vec<Field>,
}

/// A layout container (`collapsible`, `row`) that only hoists its children
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerField {
    #[serde(default)]
    pub fields: Vec<Field>,
}

/// Storage-owning field kinds after layout flattening
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Text,
    Textarea,
    RichText,
    Email,
    Slug,
    Select,
    Number,
    Checkbox,
    Date,
    Relationship,
    Upload,
    Array,
    Group,
    Blocks,
    Json,
}

/// A column-owning field produced by [`flatten_fields`]
#[derive(Debug, Clone, PartialEq)]
pub struct FlattenedField {
    pub name: String,
    pub required: bool,
    pub kind: FieldKind,
    /// Present for relationship/upload fields; drives FK emission
    pub relationship: Option<RelationshipField>,
}

impl FlattenedField {
    fn data(name: &str, required: bool, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            required,
            kind,
            relationship: None,
        }
    }
}

/// Flatten layout fields into the list of column-owning fields
///
/// `tabs` (unnamed), `collapsible` and `row` hoist their children in place;
/// a named tab becomes a single JSON group column carrying the tab's name.
#[must_use]
pub fn flatten_fields(fields: &[Field]) -> Vec<FlattenedField> {
    let mut out = Vec::new();
    flatten_into(fields, &mut out);
    out
}

fn flatten_into(fields: &[Field], out: &mut Vec<FlattenedField>) {
    for field in fields {
        match field {
            Field::Text(f) => out.push(FlattenedField::data(&f.name, f.required, FieldKind::Text)),
            Field::Textarea(f) => {
                out.push(FlattenedField::data(&f.name, f.required, FieldKind::Textarea))
            }
            Field::RichText(f) => {
                out.push(FlattenedField::data(&f.name, f.required, FieldKind::RichText))
            }
            Field::Email(f) => {
                out.push(FlattenedField::data(&f.name, f.required, FieldKind::Email))
            }
            Field::Slug(f) => out.push(FlattenedField::data(&f.name, f.required, FieldKind::Slug)),
            Field::Select(f) => {
                out.push(FlattenedField::data(&f.name, f.required, FieldKind::Select))
            }
            Field::Number(f) => {
                out.push(FlattenedField::data(&f.name, f.required, FieldKind::Number))
            }
            Field::Checkbox(f) => {
                out.push(FlattenedField::data(&f.name, f.required, FieldKind::Checkbox))
            }
            Field::Date(f) => out.push(FlattenedField::data(&f.name, f.required, FieldKind::Date)),
            Field::Relationship(f) => out.push(FlattenedField {
                name: f.name.clone(),
                required: f.required,
                kind: FieldKind::Relationship,
                relationship: Some(f.clone()),
            }),
            Field::Upload(f) => out.push(FlattenedField {
                name: f.name.clone(),
                required: f.required,
                kind: FieldKind::Upload,
                relationship: Some(f.clone()),
            }),
            Field::Array(f) => {
                out.push(FlattenedField::data(&f.name, f.required, FieldKind::Array))
            }
            Field::Group(f) => {
                out.push(FlattenedField::data(&f.name, f.required, FieldKind::Group))
            }
            Field::Blocks(f) => {
                out.push(FlattenedField::data(&f.name, f.required, FieldKind::Blocks))
            }
            Field::Json(f) => out.push(FlattenedField::data(&f.name, f.required, FieldKind::Json)),
            Field::Tabs(tabs) => {
                for tab in &tabs.tabs {
                    match &tab.name {
                        // A named tab is persisted as one JSON group column
                        Some(name) => out.push(FlattenedField::data(name, false, FieldKind::Group)),
                        None => flatten_into(&tab.fields, out),
                    }
                }
            }
            Field::Collapsible(c) | Field::Row(c) => flatten_into(&c.fields, out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(name: &str, required: bool) -> Field {
        Field::Text(DataField {
            name: name.to_string(),
            required,
        })
    }

    #[test]
    fn test_flatten_plain_fields() {
        let fields = vec![text("title", true), text("body", false)];
        let flat = flatten_fields(&fields);
        assert_eq!(flat.len(), 2);
        assert_eq!(flat[0].name, "title");
        assert!(flat[0].required);
        assert_eq!(flat[1].name, "body");
        assert!(!flat[1].required);
    }

    #[test]
    fn test_flatten_hoists_layout_children() {
        let fields = vec![Field::Row(ContainerField {
            fields: vec![
                text("left", false),
                Field::Collapsible(ContainerField {
                    fields: vec![text("inner", true)],
                }),
            ],
        })];
        let flat = flatten_fields(&fields);
        assert_eq!(
            flat.iter().map(|f| f.name.as_str()).collect::<Vec<_>>(),
            vec!["left", "inner"]
        );
    }

    #[test]
    fn test_flatten_tabs() {
        let fields = vec![Field::Tabs(TabsField {
            tabs: vec![
                Tab {
                    name: None,
                    fields: vec![text("hoisted", false)],
                },
                Tab {
                    name: Some("meta".to_string()),
                    fields: vec![text("ignored", true)],
                },
            ],
        })];
        let flat = flatten_fields(&fields);
        assert_eq!(flat.len(), 2);
        assert_eq!(flat[0].name, "hoisted");
        assert_eq!(flat[1].name, "meta");
        assert_eq!(flat[1].kind, FieldKind::Group);
    }

    #[test]
    fn test_field_deserializes_from_tagged_json() {
        let json = r#"{"type":"relationship","name":"author","required":true,"relationTo":"users"}"#;
        let field: Field = serde_json::from_str(json).unwrap();
        match field {
            Field::Relationship(rel) => {
                assert_eq!(rel.name, "author");
                assert!(rel.required);
                assert_eq!(rel.single_target(), Some("users"));
                assert!(!rel.has_many);
            }
            other => panic!("unexpected field: {:?}", other),
        }
    }

    #[test]
    fn test_polymorphic_relation_target() {
        let json = r#"{"type":"relationship","name":"subject","relationTo":["posts","pages"]}"#;
        let field: Field = serde_json::from_str(json).unwrap();
        match field {
            Field::Relationship(rel) => {
                assert_eq!(rel.single_target(), None);
            }
            other => panic!("unexpected field: {:?}", other),
        }
    }
}
