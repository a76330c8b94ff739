//! API description tree and its translation into a Swagger document.
//!
//! The tree mirrors how routes are grouped: a root, nested groups, and operations
//! as leaves. Paths are relative to the parent and may use `:name` or `{name}`
//! parameters and a trailing `*rest` / `{*rest}` wildcard.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use super::document::{
    Contact, Definition, Info, Items, License, Operation, Parameter, Property, Response, Schema, Swagger, Tag,
    Xml, COMMON_MIME_TYPES, SWAGGER_VERSION,
};
use crate::config::AppInfoConfig;

#[derive(Debug, Clone)]
pub struct MiddlewareDoc {
    pub name: String,
    pub description: String,
}

/// One documented parameter. `model` is an example value that decides the
/// parameter type; `None` documents a file upload.
#[derive(Debug, Clone)]
pub struct ApiParam {
    pub location: String,
    pub name: String,
    pub description: String,
    pub required: bool,
    pub model: Option<Value>,
}

impl ApiParam {
    pub fn new(location: &str, name: &str, description: &str, required: bool, model: Option<Value>) -> Self {
        Self {
            location: location.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            required,
            model,
        }
    }
}

/// Example of a successful response body.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResult {
    pub code: i64,
    pub info: Value,
}

#[derive(Debug, Clone)]
pub struct ApiOperation {
    pub id: String,
    pub methods: Vec<String>,
    pub params: Vec<ApiParam>,
    pub http200: Vec<ApiResult>,
}

#[derive(Debug, Clone)]
pub enum ApiNodeKind {
    Group(Vec<ApiNode>),
    Operation(ApiOperation),
}

#[derive(Debug, Clone)]
pub struct ApiNode {
    pub path: String,
    pub description: String,
    pub middlewares: Vec<MiddlewareDoc>,
    pub kind: ApiNodeKind,
}

impl ApiNode {
    pub fn root(description: &str) -> Self {
        Self::group("/", description)
    }

    pub fn group(path: &str, description: &str) -> Self {
        Self {
            path: path.to_string(),
            description: description.to_string(),
            middlewares: Vec::new(),
            kind: ApiNodeKind::Group(Vec::new()),
        }
    }

    pub fn operation(path: &str, id: &str, methods: &[&str], description: &str) -> Self {
        Self {
            path: path.to_string(),
            description: description.to_string(),
            middlewares: Vec::new(),
            kind: ApiNodeKind::Operation(ApiOperation {
                id: id.to_string(),
                methods: methods.iter().map(|m| m.to_string()).collect(),
                params: Vec::new(),
                http200: Vec::new(),
            }),
        }
    }

    /// Adds a child; ignored on operations.
    pub fn child(mut self, node: ApiNode) -> Self {
        if let ApiNodeKind::Group(children) = &mut self.kind {
            children.push(node);
        }
        self
    }

    pub fn middleware(mut self, name: &str, description: &str) -> Self {
        self.middlewares.push(MiddlewareDoc { name: name.to_string(), description: description.to_string() });
        self
    }

    pub fn param(mut self, param: ApiParam) -> Self {
        if let ApiNodeKind::Operation(op) = &mut self.kind {
            op.params.push(param);
        }
        self
    }

    pub fn http200(mut self, code: i64, info: Value) -> Self {
        if let ApiNodeKind::Operation(op) = &mut self.kind {
            op.http200.push(ApiResult { code, info });
        }
        self
    }

    pub fn is_operation(&self) -> bool {
        matches!(self.kind, ApiNodeKind::Operation(_))
    }
}

/// Joins a parent path and a relative path with exactly one `/` between them.
pub fn join_path(parent: &str, path: &str) -> String {
    let joined = format!("{}/{}", parent.trim_end_matches('/'), path.trim_start_matches('/'));
    if joined.len() > 1 {
        joined.trim_end_matches('/').to_string()
    } else {
        joined
    }
}

/// Swagger path of a route: `:id` / `{id}` → `{id}`, a wildcard segment and
/// everything after it → `{static}`.
pub fn create_path(route: &str) -> String {
    let mut out = String::new();
    for segment in route.split('/').filter(|s| !s.is_empty()) {
        out.push('/');
        if segment.starts_with('*') || segment.starts_with("{*") {
            out.push_str("{static}");
            break;
        }
        match segment.strip_prefix(':') {
            Some(name) => {
                out.push('{');
                out.push_str(name);
                out.push('}');
            }
            None => out.push_str(segment),
        }
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// First line of the description.
pub fn summary(description: &str) -> String {
    description.trim().lines().next().unwrap_or_default().trim().to_string()
}

/// Swagger parameter type of an example value.
pub fn build_type(model: Option<&Value>) -> &'static str {
    match model {
        None => "file",
        Some(Value::Null) => "file",
        Some(Value::Bool(_)) => "bool",
        Some(Value::Number(n)) if n.is_i64() || n.is_u64() => "integer",
        Some(Value::Number(_)) => "number",
        Some(Value::String(_)) => "string",
        Some(Value::Array(_)) => "array",
        Some(Value::Object(_)) => "object",
    }
}

fn format_of(value: &Value) -> &'static str {
    match value {
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_i64() || n.is_u64() => "int64",
        Value::Number(_) => "double",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
        Value::Null => "",
    }
}

fn properties(model: &Value) -> BTreeMap<String, Property> {
    let object = match model {
        Value::Array(items) => items.first(),
        other => Some(other),
    };
    match object {
        Some(Value::Object(fields)) => fields
            .iter()
            .map(|(name, value)| {
                let property = Property {
                    kind: build_type(Some(value)).to_string(),
                    format: format_of(value).to_string(),
                    default: Some(value.clone()),
                };
                (name.clone(), property)
            })
            .collect(),
        _ => BTreeMap::new(),
    }
}

struct Builder {
    doc: Swagger,
}

impl Builder {
    /// Registers a definition for `model` and returns its reference.
    fn definition(&mut self, route: &str, pname: &str, model: &Value) -> String {
        let name = format!("{}{}", route.get(1..).unwrap_or_default(), pname).replace('/', "__");
        self.doc.definitions.insert(
            name.clone(),
            Definition { kind: "object".to_string(), properties: properties(model), xml: Xml { name: name.clone() } },
        );
        format!("#/definitions/{}", name)
    }

    fn parameter(&mut self, route: &str, param: &ApiParam, consumes: &mut Vec<String>) -> Parameter {
        let mut p = Parameter {
            location: param.location.clone(),
            name: param.name.clone(),
            description: param.description.clone(),
            required: param.required,
            ..Default::default()
        };
        let kind = build_type(param.model.as_ref());
        match (kind, param.model.as_ref()) {
            ("file", _) => {
                *consumes = vec!["multipart/form-data".to_string()];
                p.kind = kind.to_string();
            }
            ("array", Some(model @ Value::Array(items))) => {
                let first = items.first();
                match first.map(|f| build_type(Some(f))) {
                    Some("object") => {
                        let reference = self.definition(route, &param.name, model);
                        p.schema = Some(Schema {
                            kind: kind.to_string(),
                            items: Some(Items { reference, ..Default::default() }),
                            ..Default::default()
                        });
                    }
                    sub => {
                        p.kind = kind.to_string();
                        p.items = Some(Items {
                            kind: sub.unwrap_or("string").to_string(),
                            values: items.clone(),
                            default: first.cloned(),
                            ..Default::default()
                        });
                        p.collection_format = "multi".to_string();
                    }
                }
            }
            ("object", Some(model)) => {
                let reference = self.definition(route, &param.name, model);
                p.schema = Some(Schema { reference, kind: kind.to_string(), ..Default::default() });
            }
            (_, model) => {
                p.kind = kind.to_string();
                p.format = model.map(format_of).unwrap_or_default().to_string();
                p.default = model.cloned();
            }
        }
        p
    }

    fn add_operation(&mut self, route: &str, node: &ApiNode, op: &ApiOperation, tag: &str, middleware_docs: &[&MiddlewareDoc]) {
        let pid = create_path(route);
        let summary = summary(&node.description);
        let description = describe(&node.description, middleware_docs);

        let mut operations = BTreeMap::new();
        for method in &op.methods {
            let method = match method.to_ascii_uppercase().as_str() {
                "CONNECT" | "TRACE" => continue,
                "WS" => "get".to_string(),
                other => other.to_ascii_lowercase(),
            };

            let mut consumes: Vec<String> = COMMON_MIME_TYPES.iter().map(|m| m.to_string()).collect();
            let mut parameters: Vec<Parameter> =
                op.params.iter().map(|param| self.parameter(route, param, &mut consumes)).collect();
            if pid.ends_with("/{static}") {
                parameters.push(static_param());
            }

            let response = match op.http200.as_slice() {
                [] => Response { description: "successful operation".to_string(), schema: None },
                [one] => {
                    let model = serde_json::to_value(one).unwrap_or(Value::Null);
                    let reference = self.definition(route, "http200", &model);
                    Response {
                        description: "successful operation".to_string(),
                        schema: Some(Schema { reference, kind: "object".to_string(), ..Default::default() }),
                    }
                }
                many => {
                    let keyed: Map<String, Value> = many
                        .iter()
                        .map(|r| (format!("Code == {}", r.code), serde_json::to_value(r).unwrap_or(Value::Null)))
                        .collect();
                    let reference = self.definition(route, "http200", &Value::Object(keyed));
                    Response {
                        description: "successful operation".to_string(),
                        schema: Some(Schema { reference, kind: "object".to_string(), ..Default::default() }),
                    }
                }
            };

            let operation = Operation {
                tags: vec![tag.to_string()],
                summary: summary.clone(),
                description: description.clone(),
                operation_id: op.id.clone(),
                consumes,
                produces: COMMON_MIME_TYPES.iter().map(|m| m.to_string()).collect(),
                parameters,
                responses: BTreeMap::from([("200".to_string(), response)]),
            };
            operations.insert(method, operation);
        }
        self.doc.paths.entry(pid).or_default().extend(operations);
    }

    fn push_tag(&mut self, route: &str, node: &ApiNode) -> String {
        self.doc.tags.push(Tag { name: route.to_string(), description: node.description.trim().to_string() });
        route.to_string()
    }

    /// Walks the tree. Groups down to depth two get their own tag; deeper groups
    /// contribute their operations to the depth-two tag.
    fn walk<'a>(&mut self, node: &'a ApiNode, route: &str, depth: usize, tag: &str, mut docs: Vec<&'a MiddlewareDoc>) {
        // Ancestors first; within one node the last registered comes first.
        docs.extend(node.middlewares.iter().rev());
        match &node.kind {
            ApiNodeKind::Operation(op) => self.add_operation(route, node, op, tag, &docs),
            ApiNodeKind::Group(children) => {
                let tag = if depth <= 2 { self.push_tag(route, node) } else { tag.to_string() };
                for child in children {
                    let child_route = join_path(route, &child.path);
                    self.walk(child, &child_route, depth + 1, &tag, docs.clone());
                }
            }
        }
    }
}

fn static_param() -> Parameter {
    Parameter {
        location: "path".to_string(),
        name: "static".to_string(),
        description: "any static path or file".to_string(),
        required: true,
        kind: "string".to_string(),
        format: "string".to_string(),
        default: Some(Value::String(String::new())),
        ..Default::default()
    }
}

/// `<pre>` + description + numbered middleware descriptions: ancestors before the
/// node, each node's own list in reverse registration order.
pub fn describe(description: &str, middlewares: &[&MiddlewareDoc]) -> String {
    let mut out = format!("<pre>{}", description.trim());
    for (i, m) in middlewares.iter().enumerate() {
        out.push_str(&format!("\n\n[Route middleware {}] {}:\n{}", i + 1, m.name, m.description));
    }
    out.push_str("</pre>");
    out
}

/// Builds the Swagger document for `tree`.
pub fn build_swagger(tree: &ApiNode, info: &AppInfoConfig, host: &str, scheme: &str) -> Swagger {
    let doc = Swagger {
        version: SWAGGER_VERSION.to_string(),
        info: Info {
            title: format!("{} API", info.name),
            description: info.description.clone(),
            version: info.version.clone(),
            contact: Contact { email: info.email.clone() },
            terms_of_service: info.terms_of_service_url.clone(),
            license: Some(License { name: info.license.clone(), url: info.license_url.clone() }),
        },
        host: host.to_string(),
        base_path: "/".to_string(),
        tags: Vec::new(),
        schemes: vec![scheme.to_string()],
        paths: BTreeMap::new(),
        definitions: BTreeMap::new(),
    };
    let mut builder = Builder { doc };
    let root_route = join_path("/", &tree.path);
    builder.walk(tree, &root_route, 0, &root_route, Vec::new());
    builder.doc
}
