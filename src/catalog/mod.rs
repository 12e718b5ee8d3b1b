//! Static tool catalog: one tool per action, one per standalone command, and
//! the `{prefix}_help` tool. Built once from the discovered registry.

pub mod classify;
pub mod help;
pub mod schema;

use std::collections::HashMap;

use serde::Serialize;

pub use classify::{ActionGroup, Classification, classify};
pub use schema::JsonObject;

use crate::config::{ServerConfig, sanitize_tool_token};
use crate::discover::Registry;
use crate::tree::CommandTree;

/// What a tool call resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolTarget {
    Hierarchical {
        action: String,
        resources: Vec<String>,
    },
    Standalone {
        path: Vec<String>,
    },
    Help,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: JsonObject,
    #[serde(skip)]
    pub target: ToolTarget,
}

#[derive(Debug, Clone)]
pub struct Catalog {
    root_name: String,
    prefix: String,
    registry: Registry,
    classification: Classification,
    tools: Vec<ToolDefinition>,
    by_name: HashMap<String, usize>,
    dangerous: Vec<Vec<String>>,
}

impl Catalog {
    /// Discover `tree` and build the tool set described by `config`.
    pub fn build(tree: &CommandTree, config: &ServerConfig) -> Self {
        let config = config.clone().normalized(tree.root_name());
        let registry = Registry::discover(tree);
        let classification = classify(
            &registry,
            config.actions.as_deref(),
            config.standalone.as_deref(),
        );
        let dangerous = config
            .dangerous_commands
            .iter()
            .map(|c| c.split_whitespace().map(str::to_string).collect::<Vec<_>>())
            .filter(|c| !c.is_empty())
            .collect();

        let mut catalog = Catalog {
            root_name: tree.root_name().to_string(),
            prefix: config.tool_prefix.clone(),
            registry,
            classification,
            tools: Vec::new(),
            by_name: HashMap::new(),
            dangerous,
        };
        catalog.generate();
        tracing::info!(
            tools = catalog.tools.len(),
            commands = catalog.registry.len(),
            prefix = %catalog.prefix,
            "tool catalog built"
        );
        catalog
    }

    fn generate(&mut self) {
        let mut tools = Vec::new();

        for group in &self.classification.actions {
            let mut description = self
                .registry
                .find(&[group.action.as_str()])
                .map(|d| d.summary().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| format!("Run '{}' commands", group.action));
            let resources: Vec<String> = group
                .resources
                .iter()
                .map(|r| {
                    match self
                        .registry
                        .find(&[group.action.as_str(), r.as_str()])
                        .map(|d| d.summary())
                        .filter(|s| !s.is_empty())
                    {
                        Some(summary) => format!("{r} ({summary})"),
                        None => r.clone(),
                    }
                })
                .collect();
            description.push_str(&format!(". Resources: {}.", resources.join(", ")));
            self.append_danger_note(&mut description, std::slice::from_ref(&group.action));

            tools.push(ToolDefinition {
                name: self.tool_name(&group.action),
                description,
                input_schema: schema::hierarchical_schema(group, &self.registry),
                target: ToolTarget::Hierarchical {
                    action: group.action.clone(),
                    resources: group.resources.clone(),
                },
            });
        }

        for name in &self.classification.standalone {
            if sanitize_tool_token(name) == "help" {
                tracing::warn!("standalone 'help' command shadowed by the help tool");
                continue;
            }
            let Some(desc) = self.registry.find(&[name.as_str()]) else {
                continue;
            };
            let mut description = if desc.long.is_empty() {
                desc.short.clone()
            } else {
                desc.long.clone()
            };
            self.append_danger_note(&mut description, &desc.path);
            tools.push(ToolDefinition {
                name: self.tool_name(name),
                description,
                input_schema: schema::standalone_schema(desc),
                target: ToolTarget::Standalone {
                    path: desc.path.clone(),
                },
            });
        }

        tools.push(ToolDefinition {
            name: self.help_tool_name(),
            description: format!(
                "Describe {} commands: flags, usage and the tool that runs them. \
                 Pass a command path such as \"create cluster\" or omit it to list everything.",
                self.root_name
            ),
            input_schema: schema::help_schema(),
            target: ToolTarget::Help,
        });

        for tool in tools {
            if self.by_name.contains_key(&tool.name) {
                tracing::warn!(tool = %tool.name, "duplicate tool name skipped");
                continue;
            }
            self.by_name.insert(tool.name.clone(), self.tools.len());
            self.tools.push(tool);
        }
    }

    fn append_danger_note(&self, description: &mut String, prefix: &[String]) {
        let hits: Vec<String> = self
            .dangerous
            .iter()
            .filter(|d| d.starts_with(prefix) || prefix.starts_with(d))
            .map(|d| d.join(" "))
            .collect();
        if !hits.is_empty() {
            description.push_str(&format!(
                " DANGEROUS: {}. Confirm with the user before calling.",
                hits.join(", ")
            ));
        }
    }

    pub(crate) fn tool_name(&self, token: &str) -> String {
        format!("{}_{}", self.prefix, sanitize_tool_token(token))
    }

    pub fn help_tool_name(&self) -> String {
        self.tool_name("help")
    }

    pub fn tools(&self) -> &[ToolDefinition] {
        &self.tools
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.by_name.get(name).map(|&i| &self.tools[i])
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn root_name(&self) -> &str {
        &self.root_name
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn classification(&self) -> &Classification {
        &self.classification
    }

    /// Advisory check against the configured dangerous commands. A listed
    /// path marks itself and everything below it.
    pub fn is_dangerous<S: AsRef<str>>(&self, path: &[S]) -> bool {
        self.dangerous.iter().any(|d| {
            d.len() <= path.len() && d.iter().zip(path).all(|(a, b)| a == b.as_ref())
        })
    }

    pub fn dangerous_commands(&self) -> Vec<String> {
        self.dangerous.iter().map(|d| d.join(" ")).collect()
    }

    /// Tool (and resource) that runs `path`, for help output.
    pub fn tool_for_path(&self, path: &[String]) -> Option<String> {
        let first = path.first()?;
        if let Some(group) = self.classification.action(first) {
            let tool = self.tool_name(&group.action);
            return Some(match path.get(1) {
                Some(resource) => format!("{tool} (resource: {resource})"),
                None => format!("{tool} (resource: one of {})", group.resources.join(", ")),
            });
        }
        (path.len() == 1 && self.classification.is_standalone(first))
            .then(|| self.tool_name(first))
            .filter(|name| self.by_name.contains_key(name))
    }

    /// Help tool output for `query`.
    pub fn help(&self, query: Option<&str>) -> String {
        help::render(self, query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::demo_tree;

    fn names(cat: &Catalog) -> Vec<&str> {
        cat.tools().iter().map(|t| t.name.as_str()).collect()
    }

    #[test]
    fn default_surface() {
        let cat = Catalog::build(&demo_tree(), &ServerConfig::default());
        assert_eq!(
            names(&cat),
            vec![
                "demo_create",
                "demo_delete",
                "demo_list",
                "demo_version",
                "demo_crash",
                "demo_fail",
                "demo_noisy",
                "demo_help",
            ]
        );
        assert_eq!(
            cat.get("demo_list").unwrap().target,
            ToolTarget::Hierarchical {
                action: "list".into(),
                resources: vec!["clusters".into(), "nodes".into()],
            }
        );
        assert!(cat.get("demo_internal").is_none());
    }

    #[test]
    fn custom_prefix_is_sanitized() {
        let cfg = ServerConfig::default().with_prefix("my.cli");
        let cat = Catalog::build(&demo_tree(), &cfg);
        assert!(cat.get("my_cli_version").is_some());
        assert_eq!(cat.help_tool_name(), "my_cli_help");
    }

    #[test]
    fn catalog_is_deterministic() {
        let a = Catalog::build(&demo_tree(), &ServerConfig::default());
        let b = Catalog::build(&demo_tree(), &ServerConfig::default());
        let dump = |c: &Catalog| serde_json::to_string(c.tools()).unwrap();
        assert_eq!(dump(&a), dump(&b));
    }

    #[test]
    fn dangerous_commands_are_flagged_not_removed() {
        let cfg = ServerConfig {
            dangerous_commands: vec!["delete cluster".into()],
            ..ServerConfig::default()
        };
        let cat = Catalog::build(&demo_tree(), &cfg);
        assert!(cat.is_dangerous(&["delete", "cluster"]));
        assert!(!cat.is_dangerous(&["delete"]));
        assert!(!cat.is_dangerous(&["create", "cluster"]));
        let delete = cat.get("demo_delete").unwrap();
        assert!(delete.description.contains("DANGEROUS: delete cluster"));
        assert!(!cat.get("demo_create").unwrap().description.contains("DANGEROUS"));
    }

    #[test]
    fn resource_enums_match_second_level_tokens() {
        let cat = Catalog::build(&demo_tree(), &ServerConfig::default());
        let mut checked = 0;
        for tool in cat.tools() {
            let ToolTarget::Hierarchical { action, resources } = &tool.target else {
                continue;
            };
            let expected: Vec<String> = cat
                .registry()
                .iter()
                .filter(|d| d.path.len() >= 2 && &d.path[0] == action)
                .map(|d| d.path[1].clone())
                .fold(Vec::new(), |mut acc, r| {
                    if !acc.contains(&r) {
                        acc.push(r);
                    }
                    acc
                });
            assert_eq!(resources, &expected, "{}", tool.name);

            let schema_enum: Vec<&str> = tool.input_schema["properties"]["resource"]["enum"]
                .as_array()
                .unwrap()
                .iter()
                .map(|v| v.as_str().unwrap())
                .collect();
            assert_eq!(schema_enum, expected.iter().map(String::as_str).collect::<Vec<_>>());

            for resource in resources {
                let tokens = vec![action.clone(), resource.clone()];
                let (desc, rest) = cat.registry().resolve(&tokens, 2).unwrap();
                assert_eq!(desc.path, tokens);
                assert!(rest.is_empty());
            }
            checked += 1;
        }
        assert_eq!(checked, 3);
    }

    #[test]
    fn hierarchical_description_lists_resources() {
        let cat = Catalog::build(&demo_tree(), &ServerConfig::default());
        let list = cat.get("demo_list").unwrap();
        assert_eq!(
            list.description,
            "List resources. Resources: clusters (List clusters), nodes (List nodes)."
        );
    }
}
