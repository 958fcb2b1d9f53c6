//! Resolution of resource identifiers to content.
//!
//! `call-graph://` identifiers go through the registry; the help document and
//! the language catalog are generated on every request.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{json, Value};

use crate::registry::{ResourceContent, ResourceRegistry, CALL_GRAPH_SCHEME};

/// Identifier of the usage documentation.
pub const HELP_URI: &str = "help://code2flow";

/// Identifier of the supported-languages catalog.
pub const LANGUAGES_URI: &str = "languages://supported";

const HELP_TEXT: &str = r#"# Code2Flow MCP server

Generates call graphs for source code by driving the `code2flow` command-line tool.

## Tools

- `generate_call_graph`: render a call graph to PNG and register it as a resource
- `check_code2flow_version`: report the installed code2flow version
- `analyze_code_complexity`: run code2flow in analysis-only mode and summarise its output

## Examples

Graph a single file:

```json
{"name": "generate_call_graph", "arguments": {"source_paths": ["path/to/file.py"]}}
```

Graph a directory, skipping tests:

```json
{"name": "generate_call_graph", "arguments": {
  "source_paths": ["path/to/project"],
  "language": "py",
  "exclude": ["**/test/**"]
}}
```

Check the installed version:

```json
{"name": "check_code2flow_version", "arguments": {}}
```

Analyse a directory:

```json
{"name": "analyze_code_complexity", "arguments": {"source_path": "path/to/project", "language": "py"}}
```

## Resources

- `call-graph://<name>`: a generated graph (image/png), returned by `generate_call_graph`
- `help://code2flow`: this document
- `languages://supported`: languages understood by code2flow (JSON)
"#;

/// A language code2flow can analyse.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SupportedLanguage {
    pub name: &'static str,
    pub extension: &'static str,
    pub description: &'static str,
}

/// Keys are the values accepted by the `language` argument.
const SUPPORTED_LANGUAGES: [(&str, SupportedLanguage); 4] = [
    (
        "python",
        SupportedLanguage {
            name: "Python",
            extension: ".py",
            description: "The Python programming language",
        },
    ),
    (
        "js",
        SupportedLanguage {
            name: "JavaScript",
            extension: ".js",
            description: "The JavaScript programming language",
        },
    ),
    (
        "ruby",
        SupportedLanguage {
            name: "Ruby",
            extension: ".rb",
            description: "The Ruby programming language",
        },
    ),
    (
        "php",
        SupportedLanguage {
            name: "PHP",
            extension: ".php",
            description: "The PHP programming language",
        },
    ),
];

/// Returns the usage documentation as markdown.
pub fn help_document() -> String {
    HELP_TEXT.to_string()
}

/// Returns the language catalog serialized as pretty JSON.
pub fn supported_languages_json() -> String {
    let catalog: BTreeMap<&str, SupportedLanguage> = SUPPORTED_LANGUAGES.into_iter().collect();
    serde_json::to_string_pretty(&catalog).unwrap_or_default()
}

/// Resolves an identifier to its content, or `None` if it does not exist.
pub fn resolve_resource(registry: &ResourceRegistry, uri: &str) -> Option<ResourceContent> {
    if uri.starts_with(CALL_GRAPH_SCHEME) {
        return registry.resolve(uri);
    }
    match uri {
        HELP_URI => Some(ResourceContent {
            uri: uri.to_string(),
            mime_type: "text/markdown".to_string(),
            bytes: help_document().into_bytes(),
        }),
        LANGUAGES_URI => Some(ResourceContent {
            uri: uri.to_string(),
            mime_type: "application/json".to_string(),
            bytes: supported_languages_json().into_bytes(),
        }),
        _ => None,
    }
}

/// Describes every resource that can currently be read, for `resources/list`.
pub fn get_resource_definitions(registry: &ResourceRegistry) -> Vec<Value> {
    let mut resources = vec![
        json!({
            "uri": HELP_URI,
            "name": "code2flow help",
            "description": "Usage documentation for this server",
            "mimeType": "text/markdown",
        }),
        json!({
            "uri": LANGUAGES_URI,
            "name": "Supported languages",
            "description": "Languages code2flow can analyse",
            "mimeType": "application/json",
        }),
    ];

    resources.extend(registry.list().into_iter().map(|record| {
        let name = record
            .identifier
            .trim_start_matches(CALL_GRAPH_SCHEME)
            .to_string();
        json!({
            "uri": record.identifier,
            "name": name,
            "description": format!("Call graph rendered to {}", record.backing_path.display()),
            "mimeType": record.mime_type,
        })
    }));

    resources
}

/// Describes the parameterised resources, for `resources/templates/list`.
pub fn get_resource_templates() -> Vec<Value> {
    vec![json!({
        "uriTemplate": format!("{}{{name}}", CALL_GRAPH_SCHEME),
        "name": "Generated call graph",
        "description": "PNG call graph produced by generate_call_graph",
        "mimeType": "image/png",
    })]
}
