//! Documentation generation
//!
//! A schema is walked once into a neutral [`DocNode`] tree, which is then
//! rendered as Markdown or as a plain-text outline.

use std::fmt::Write;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::{Additional, Items, Kind, SchemaNode};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocFormat {
    #[default]
    Markdown,
    Text,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocOptions {
    /// Root heading; falls back to the schema's `title`
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub format: DocFormat,
    #[serde(default)]
    pub include_examples: bool,
}

/// Documentation record for one schema node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocNode {
    pub name: String,
    pub types: Vec<String>,
    pub description: Option<String>,
    pub required: bool,
    pub nullable: bool,
    pub constraints: Vec<String>,
    pub default: Option<Value>,
    pub example: Option<Value>,
    pub children: Vec<DocNode>,
}

pub fn build(schema: &SchemaNode, options: &DocOptions) -> DocNode {
    let name = options
        .title
        .clone()
        .or_else(|| schema.title.clone())
        .unwrap_or_else(|| "Schema".to_string());
    doc_node(name, schema, false, options)
}

fn doc_node(name: String, node: &SchemaNode, required: bool, options: &DocOptions) -> DocNode {
    let mut doc = DocNode {
        name,
        types: node.type_names(),
        description: node.description.clone().or_else(|| node.title.clone()),
        required,
        nullable: node.nullable,
        constraints: Vec::new(),
        default: node.default.clone(),
        example: if options.include_examples { node.example.clone() } else { None },
        children: Vec::new(),
    };

    if let Some(values) = &node.enum_values {
        let listed: Vec<String> = values.iter().map(Value::to_string).collect();
        doc.constraints.push(format!("one of: {}", listed.join(", ")));
    }

    for kind in &node.kinds {
        match kind {
            Kind::String(rules) => {
                push_opt(&mut doc.constraints, "minLength", rules.min_length);
                push_opt(&mut doc.constraints, "maxLength", rules.max_length);
                if let Some(pattern) = &rules.pattern {
                    doc.constraints.push(format!("pattern: `{}`", pattern.source));
                }
                if let Some(format) = &rules.format {
                    doc.constraints.push(format!("format: {}", format));
                }
            }
            Kind::Number(rules) | Kind::Integer(rules) => {
                push_opt(&mut doc.constraints, "minimum", rules.minimum);
                push_opt(&mut doc.constraints, "exclusiveMinimum", rules.exclusive_minimum);
                push_opt(&mut doc.constraints, "maximum", rules.maximum);
                push_opt(&mut doc.constraints, "exclusiveMaximum", rules.exclusive_maximum);
                push_opt(&mut doc.constraints, "multipleOf", rules.multiple_of);
            }
            Kind::Object(rules) => {
                push_opt(&mut doc.constraints, "minProperties", rules.min_properties);
                push_opt(&mut doc.constraints, "maxProperties", rules.max_properties);
                for (key, prop) in &rules.properties {
                    doc.children
                        .push(doc_node(key.clone(), prop, rules.is_required(key), options));
                }
                match &rules.additional {
                    Additional::Allowed => {}
                    Additional::Forbidden => doc.constraints.push("no additional properties".to_string()),
                    Additional::Schema(schema) => doc.children.push(doc_node("*".to_string(), schema, false, options)),
                }
            }
            Kind::Array(rules) => {
                push_opt(&mut doc.constraints, "minItems", rules.min_items);
                push_opt(&mut doc.constraints, "maxItems", rules.max_items);
                if rules.unique_items {
                    doc.constraints.push("unique items".to_string());
                }
                match &rules.items {
                    Items::Any => {}
                    Items::Single(schema) => doc.children.push(doc_node("[]".to_string(), schema, false, options)),
                    Items::Tuple(schemas) => {
                        for (i, schema) in schemas.iter().enumerate() {
                            doc.children.push(doc_node(format!("[{}]", i), schema, false, options));
                        }
                        match &rules.additional_items {
                            Additional::Allowed => {}
                            Additional::Forbidden => doc.constraints.push("no additional items".to_string()),
                            Additional::Schema(schema) => doc
                                .children
                                .push(doc_node(format!("[{}..]", schemas.len()), schema, false, options)),
                        }
                    }
                }
            }
            Kind::Boolean | Kind::Null | Kind::Custom(_) => {}
        }
    }

    for (label, branches) in [("allOf", &node.all_of), ("anyOf", &node.any_of), ("oneOf", &node.one_of)] {
        if !branches.is_empty() {
            let types: Vec<String> = branches.iter().map(|b| type_label(&b.type_names())).collect();
            doc.constraints.push(format!("{}: {}", label, types.join(", ")));
        }
    }
    if let Some(not) = &node.not {
        doc.constraints.push(format!("not: {}", type_label(&not.type_names())));
    }
    if let Some(hook) = &node.hook {
        doc.constraints.push(format!("checked by `{}`", hook));
    }

    doc
}

fn push_opt<T: std::fmt::Display>(constraints: &mut Vec<String>, label: &str, value: Option<T>) {
    if let Some(value) = value {
        constraints.push(format!("{}: {}", label, value));
    }
}

fn type_label(types: &[String]) -> String {
    if types.is_empty() {
        "any".to_string()
    } else {
        types.join(" | ")
    }
}

pub fn render(doc: &DocNode, options: &DocOptions) -> String {
    let mut out = String::new();
    match options.format {
        DocFormat::Markdown => render_markdown(doc, &mut out),
        DocFormat::Text => render_text(doc, 0, &mut out),
    }
    out
}

fn render_markdown(doc: &DocNode, out: &mut String) {
    let _ = writeln!(out, "# {}\n", doc.name);
    if let Some(description) = &doc.description {
        let _ = writeln!(out, "{}\n", description);
    }
    let _ = writeln!(out, "**Type:** `{}`\n", type_label(&doc.types));
    write_details(doc, "", out);
    if !doc.constraints.is_empty() || doc.default.is_some() || doc.example.is_some() {
        out.push('\n');
    }

    if !doc.children.is_empty() {
        let _ = writeln!(out, "## Properties\n");
        for child in &doc.children {
            render_markdown_item(child, "", out);
        }
    }
}

fn render_markdown_item(doc: &DocNode, indent: &str, out: &mut String) {
    let mut flags = vec![format!("`{}`", type_label(&doc.types))];
    if doc.required {
        flags.push("required".to_string());
    }
    if doc.nullable {
        flags.push("nullable".to_string());
    }
    let _ = write!(out, "{}- **{}** ({})", indent, doc.name, flags.join(", "));
    if let Some(description) = &doc.description {
        let _ = write!(out, ": {}", description);
    }
    out.push('\n');

    let nested = format!("{}  ", indent);
    write_details(doc, &nested, out);
    for child in &doc.children {
        render_markdown_item(child, &nested, out);
    }
}

fn write_details(doc: &DocNode, indent: &str, out: &mut String) {
    for constraint in &doc.constraints {
        let _ = writeln!(out, "{}- {}", indent, constraint);
    }
    if let Some(default) = &doc.default {
        let _ = writeln!(out, "{}- default: `{}`", indent, default);
    }
    if let Some(example) = &doc.example {
        let _ = writeln!(out, "{}- example: `{}`", indent, example);
    }
}

fn render_text(doc: &DocNode, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    let _ = write!(out, "{}{} ({}", indent, doc.name, type_label(&doc.types));
    if doc.required {
        out.push_str(", required");
    }
    if doc.nullable {
        out.push_str(", nullable");
    }
    out.push(')');
    if let Some(description) = &doc.description {
        let _ = write!(out, ": {}", description);
    }
    out.push('\n');

    for constraint in &doc.constraints {
        let _ = writeln!(out, "{}  * {}", indent, constraint);
    }
    if let Some(default) = &doc.default {
        let _ = writeln!(out, "{}  * default: {}", indent, default);
    }
    if let Some(example) = &doc.example {
        let _ = writeln!(out, "{}  * example: {}", indent, example);
    }
    for child in &doc.children {
        render_text(child, depth + 1, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user_schema() -> SchemaNode {
        SchemaNode::from_value(&json!({
            "title": "User",
            "description": "An account holder",
            "type": "object",
            "required": ["email"],
            "additionalProperties": false,
            "properties": {
                "email": { "type": "string", "format": "email", "example": "ada@example.com" },
                "age": { "type": "integer", "minimum": 0, "description": "Age in years" },
                "tags": { "type": "array", "items": { "type": "string" }, "uniqueItems": true }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_build_tree() {
        let doc = build(&user_schema(), &DocOptions::default());
        assert_eq!(doc.name, "User");
        assert_eq!(doc.constraints, vec!["no additional properties"]);
        let names: Vec<_> = doc.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["age", "email", "tags"]);
        let email = &doc.children[1];
        assert!(email.required);
        assert_eq!(email.example, None);
        assert_eq!(doc.children[2].children[0].name, "[]");
    }

    #[test]
    fn test_render_markdown() {
        let options = DocOptions { include_examples: true, ..Default::default() };
        let text = render(&build(&user_schema(), &options), &options);
        assert!(text.starts_with("# User\n\nAn account holder\n\n**Type:** `object`\n"));
        assert!(text.contains("- **email** (`string`, required)\n  - format: email\n  - example: `\"ada@example.com\"`\n"));
        assert!(text.contains("- **age** (`integer`): Age in years\n  - minimum: 0\n"));
        assert!(text.contains("  - **[]** (`string`)\n"));
    }

    #[test]
    fn test_render_text_outline() {
        let options = DocOptions { title: Some("Account".into()), format: DocFormat::Text, include_examples: false };
        let text = render(&build(&user_schema(), &options), &options);
        assert!(text.starts_with("Account (object): An account holder\n  * no additional properties\n"));
        assert!(text.contains("\n  email (string, required)\n    * format: email\n"));
        assert!(!text.contains("ada@example.com"));
    }
}
