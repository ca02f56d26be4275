//! Structural validation for untrusted document JSON.
//!
//! Validation never fails: every problem is collected into a
//! [`ValidationResult`] so an editor can render the whole list at once.
//! Each issue carries a JSON Pointer `instancePath`, a schema `keyword`, a
//! human message and keyword `params`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::document::SCHEMA_VERSION;
use crate::id::Id;
use crate::node::NodeKind;
use crate::CanvasDocument;

/// Default maximum number of nodes per document.
pub const DEFAULT_MAX_NODES: usize = 10_000;
/// Default maximum nesting depth below an artboard.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// A single validation problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    /// JSON Pointer to the offending value.
    pub instance_path: String,
    /// Human-readable description.
    pub message: String,
    /// Schema keyword that failed (`type`, `required`, `minimum`, ...).
    pub keyword: String,
    /// Keyword parameters.
    pub params: Value,
}

/// Outcome of validating a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Whether no issues were found.
    pub valid: bool,
    /// All issues, in document order.
    pub errors: Vec<ValidationIssue>,
    /// The typed document, present when valid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<CanvasDocument>,
}

/// Validator limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidatorConfig {
    /// Maximum number of nodes across all artboards.
    pub max_nodes: usize,
    /// Maximum nesting depth below an artboard.
    pub max_depth: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_nodes: DEFAULT_MAX_NODES,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Stateless document validator.
#[derive(Debug, Clone, Copy, Default)]
pub struct Validator {
    config: ValidatorConfig,
}

struct Walk {
    errors: Vec<ValidationIssue>,
    nodes: usize,
}

impl Walk {
    fn push(&mut self, path: &str, keyword: &str, message: impl Into<String>, params: Value) {
        self.errors.push(ValidationIssue {
            instance_path: path.to_string(),
            message: message.into(),
            keyword: keyword.to_string(),
            params,
        });
    }
}

impl Validator {
    /// Create a validator with the given limits.
    #[must_use]
    pub const fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// The active limits.
    #[must_use]
    pub const fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Validate a JSON string.
    #[must_use]
    pub fn validate_str(&self, json: &str) -> ValidationResult {
        match serde_json::from_str::<Value>(json) {
            Ok(value) => self.validate_value(&value),
            Err(e) => ValidationResult {
                valid: false,
                errors: vec![ValidationIssue {
                    instance_path: String::new(),
                    message: format!("invalid JSON: {e}"),
                    keyword: "type".to_string(),
                    params: json!({"line": e.line(), "column": e.column()}),
                }],
                document: None,
            },
        }
    }

    /// Validate a JSON value.
    #[must_use]
    pub fn validate_value(&self, value: &Value) -> ValidationResult {
        let mut walk = Walk {
            errors: Vec::new(),
            nodes: 0,
        };
        self.check_document(value, &mut walk);

        if walk.nodes > self.config.max_nodes {
            walk.push(
                "/artboards",
                "maxItems",
                format!("too many nodes (max {})", self.config.max_nodes),
                json!({"limit": self.config.max_nodes, "count": walk.nodes}),
            );
        }

        let document = if walk.errors.is_empty() {
            match CanvasDocument::from_value(value.clone()) {
                Ok(doc) => Some(doc),
                Err(e) => {
                    walk.push("", "type", e.to_string(), json!({}));
                    None
                }
            }
        } else {
            None
        };

        tracing::debug!(errors = walk.errors.len(), nodes = walk.nodes, "validated document");
        ValidationResult {
            valid: walk.errors.is_empty(),
            errors: walk.errors,
            document,
        }
    }

    fn check_document(&self, value: &Value, walk: &mut Walk) {
        let Some(obj) = value.as_object() else {
            walk.push("", "type", "document must be an object", json!({"type": "object"}));
            return;
        };

        match obj.get("schemaVersion") {
            None => required(walk, "", "schemaVersion"),
            Some(Value::String(v)) if v == SCHEMA_VERSION => {}
            Some(_) => walk.push(
                "/schemaVersion",
                "const",
                format!("schemaVersion must be {SCHEMA_VERSION}"),
                json!({"allowedValue": SCHEMA_VERSION}),
            ),
        }
        check_id(obj.get("id"), "", walk);
        check_string(obj.get("name"), "", "name", walk);

        match obj.get("artboards") {
            None => required(walk, "", "artboards"),
            Some(Value::Array(artboards)) => {
                if artboards.is_empty() {
                    walk.push(
                        "/artboards",
                        "minItems",
                        "document must contain at least one artboard",
                        json!({"limit": 1}),
                    );
                }
                for (i, artboard) in artboards.iter().enumerate() {
                    self.check_artboard(artboard, &format!("/artboards/{i}"), walk);
                }
            }
            Some(_) => type_error(walk, "/artboards", "array"),
        }
    }

    fn check_artboard(&self, value: &Value, path: &str, walk: &mut Walk) {
        let Some(obj) = value.as_object() else {
            type_error(walk, path, "object");
            return;
        };
        check_id(obj.get("id"), path, walk);
        check_string(obj.get("name"), path, "name", walk);
        check_frame(obj.get("frame"), path, walk);
        self.check_children(obj.get("children"), path, 1, walk);
    }

    fn check_children(&self, value: Option<&Value>, path: &str, depth: usize, walk: &mut Walk) {
        match value {
            None => {}
            Some(Value::Array(children)) => {
                for (i, child) in children.iter().enumerate() {
                    self.check_node(child, &format!("{path}/children/{i}"), depth, walk);
                }
            }
            Some(_) => type_error(walk, &format!("{path}/children"), "array"),
        }
    }

    fn check_node(&self, value: &Value, path: &str, depth: usize, walk: &mut Walk) {
        walk.nodes += 1;
        let Some(obj) = value.as_object() else {
            type_error(walk, path, "object");
            return;
        };
        if depth > self.config.max_depth {
            walk.push(
                path,
                "maxDepth",
                format!("nesting too deep (max {})", self.config.max_depth),
                json!({"limit": self.config.max_depth}),
            );
            return;
        }

        check_id(obj.get("id"), path, walk);
        check_string(obj.get("name"), path, "name", walk);
        check_frame(obj.get("frame"), path, walk);

        if let Some(visible) = obj.get("visible") {
            if !visible.is_boolean() {
                type_error(walk, &format!("{path}/visible"), "boolean");
            }
        }
        if let Some(key) = obj.get("semanticKey") {
            if !key.is_string() {
                type_error(walk, &format!("{path}/semanticKey"), "string");
            }
        }
        if let Some(opacity) = obj.get("style").and_then(|s| s.get("opacity")) {
            check_unit_interval(opacity, &format!("{path}/style/opacity"), walk);
        }

        let kind = match obj.get("type") {
            None => {
                required(walk, path, "type");
                return;
            }
            Some(Value::String(tag)) => match NodeKind::from_tag(tag) {
                Some(kind) => kind,
                None => {
                    walk.push(
                        &format!("{path}/type"),
                        "enum",
                        format!("unknown node type {tag:?}"),
                        json!({"allowedValues": NodeKind::ALL.map(|k| k.as_str())}),
                    );
                    return;
                }
            },
            Some(_) => {
                type_error(walk, &format!("{path}/type"), "string");
                return;
            }
        };

        match kind {
            NodeKind::Frame | NodeKind::Group => {
                self.check_children(obj.get("children"), path, depth + 1, walk);
            }
            NodeKind::Vector => check_string(obj.get("path"), path, "path", walk),
            NodeKind::Text => check_string(obj.get("text"), path, "text", walk),
            NodeKind::Image => check_string(obj.get("src"), path, "src", walk),
            NodeKind::ComponentInstance => {
                check_string(obj.get("componentKey"), path, "componentKey", walk);
            }
        }
        if !kind.is_container() && obj.contains_key("children") {
            walk.push(
                &format!("{path}/children"),
                "additionalProperties",
                format!("{kind} nodes cannot own children"),
                json!({"additionalProperty": "children"}),
            );
        }
    }
}

fn required(walk: &mut Walk, path: &str, property: &str) {
    walk.push(
        path,
        "required",
        format!("must have required property '{property}'"),
        json!({"missingProperty": property}),
    );
}

fn type_error(walk: &mut Walk, path: &str, expected: &str) {
    walk.push(path, "type", format!("must be {expected}"), json!({"type": expected}));
}

fn check_string(value: Option<&Value>, parent: &str, property: &str, walk: &mut Walk) {
    match value {
        None => required(walk, parent, property),
        Some(Value::String(_)) => {}
        Some(_) => type_error(walk, &format!("{parent}/{property}"), "string"),
    }
}

fn check_id(value: Option<&Value>, parent: &str, walk: &mut Walk) {
    match value {
        None => required(walk, parent, "id"),
        Some(Value::String(s)) if Id::is_valid(s) => {}
        Some(Value::String(_)) => walk.push(
            &format!("{parent}/id"),
            "pattern",
            "must be a 26-character ULID",
            json!({"pattern": "^[0-7][0-9A-HJKMNP-TV-Z]{25}$"}),
        ),
        Some(_) => type_error(walk, &format!("{parent}/id"), "string"),
    }
}

fn check_frame(value: Option<&Value>, parent: &str, walk: &mut Walk) {
    let path = format!("{parent}/frame");
    let Some(value) = value else {
        required(walk, parent, "frame");
        return;
    };
    let Some(frame) = value.as_object() else {
        type_error(walk, &path, "object");
        return;
    };
    for field in ["x", "y", "width", "height"] {
        match frame.get(field) {
            None => required(walk, &path, field),
            Some(v) => match v.as_f64() {
                None => type_error(walk, &format!("{path}/{field}"), "number"),
                Some(n) if (field == "width" || field == "height") && n < 0.0 => walk.push(
                    &format!("{path}/{field}"),
                    "minimum",
                    format!("{field} must be >= 0"),
                    json!({"comparison": ">=", "limit": 0}),
                ),
                Some(_) => {}
            },
        }
    }
}

fn check_unit_interval(value: &Value, path: &str, walk: &mut Walk) {
    match value.as_f64() {
        None => type_error(walk, path, "number"),
        Some(n) if n < 0.0 => walk.push(
            path,
            "minimum",
            "must be >= 0",
            json!({"comparison": ">=", "limit": 0}),
        ),
        Some(n) if n > 1.0 => walk.push(
            path,
            "maximum",
            "must be <= 1",
            json!({"comparison": "<=", "limit": 1}),
        ),
        Some(_) => {}
    }
}
