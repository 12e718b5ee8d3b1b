//! Action / resource classification of discovered command paths.
//!
//! The first path token is the action; distinct second tokens under it are
//! its resources, in first-occurrence order. First-level commands with no
//! nested tokens and a handler are standalone candidates.

use crate::discover::Registry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionGroup {
    pub action: String,
    pub resources: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub actions: Vec<ActionGroup>,
    pub standalone: Vec<String>,
}

impl Classification {
    pub fn action(&self, name: &str) -> Option<&ActionGroup> {
        self.actions.iter().find(|a| a.action == name)
    }

    pub fn is_standalone(&self, name: &str) -> bool {
        self.standalone.iter().any(|s| s == name)
    }
}

/// Classify `registry`. `None` lists mean automatic classification.
///
/// With an action whitelist, first-level tokens not listed are dropped
/// entirely rather than demoted to standalone. An explicit standalone list
/// replaces the leaf heuristic.
pub fn classify(
    registry: &Registry,
    actions: Option<&[String]>,
    standalone: Option<&[String]>,
) -> Classification {
    // First-level tokens in discovery order, each with its resource set.
    let mut groups: Vec<ActionGroup> = Vec::new();
    for desc in registry.iter() {
        let Some(first) = desc.path.first() else {
            continue;
        };
        let idx = match groups.iter().position(|g| &g.action == first) {
            Some(i) => i,
            None => {
                groups.push(ActionGroup {
                    action: first.clone(),
                    resources: Vec::new(),
                });
                groups.len() - 1
            }
        };
        if let Some(second) = desc.path.get(1)
            && !groups[idx].resources.contains(second)
        {
            groups[idx].resources.push(second.clone());
        }
    }

    if let Some(list) = actions {
        for name in list {
            match groups.iter().find(|g| &g.action == name) {
                Some(g) if g.resources.is_empty() => {
                    tracing::warn!(action = %name, "whitelisted action has no resources; ignored")
                }
                None => tracing::warn!(action = %name, "whitelisted action not found"),
                _ => {}
            }
        }
    }

    let mut out = Classification::default();
    for group in groups {
        let has_resources = !group.resources.is_empty();
        let is_action = has_resources
            && actions.is_none_or(|list| list.iter().any(|a| a == &group.action));

        if is_action {
            out.actions.push(group);
            continue;
        }

        let Some(desc) = registry.find(&[group.action.as_str()]) else {
            continue;
        };
        let is_standalone = match standalone {
            Some(list) => list.iter().any(|s| s == &group.action),
            None => !has_resources && desc.runnable,
        };
        if is_standalone {
            out.standalone.push(group.action);
        }
    }

    if let Some(list) = standalone {
        for name in list {
            if !out.is_standalone(name) && out.action(name).is_none() {
                tracing::warn!(command = %name, "standalone command not found");
            }
        }
    }
    out
}
