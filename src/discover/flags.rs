//! Flag metadata extraction from clap args.
//!
//! Each switch-bearing arg becomes a `FlagDescriptor` with one of five
//! semantic kinds. Enum hints come from clap's possible values when declared,
//! else from a best-effort scan of the help text.

use std::any::TypeId;

use clap::{Arg, ArgAction};
use serde::Serialize;

/// Semantic value type of a flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlagKind {
    String,
    Bool,
    Integer,
    Float,
    StringList,
}

impl FlagKind {
    /// JSON schema `type` for this kind.
    pub fn json_type(&self) -> &'static str {
        match self {
            FlagKind::String => "string",
            FlagKind::Bool => "boolean",
            FlagKind::Integer => "integer",
            FlagKind::Float => "number",
            FlagKind::StringList => "array",
        }
    }
}

/// How the flag is spelled on a command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlagStyle {
    /// `--name=value`
    Value,
    /// `--name` when true, absent when false
    Switch,
    /// `--name` repeated N times
    Counter,
    /// `--name=a --name=b`
    Repeated,
    /// `--name a b`, a single occurrence taking several values
    MultiValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlagDescriptor {
    pub name: String,
    pub long: Option<String>,
    pub shorthand: Option<char>,
    pub description: String,
    pub kind: FlagKind,
    pub style: FlagStyle,
    pub required: bool,
    /// Declared as a global flag on an ancestor.
    pub inherited: bool,
    pub enum_hint: Option<Vec<String>>,
}

impl FlagDescriptor {
    /// Build a descriptor from a clap arg. Positionals, hidden args and
    /// clap's implicit help/version switches yield `None`.
    pub fn from_arg(arg: &Arg, inherited: bool) -> Option<Self> {
        if arg.is_positional() || arg.is_hide_set() {
            return None;
        }
        if matches!(
            arg.get_action(),
            ArgAction::Help | ArgAction::HelpShort | ArgAction::HelpLong | ArgAction::Version
        ) {
            return None;
        }

        let long = arg.get_long().map(str::to_string);
        let name = long
            .clone()
            .unwrap_or_else(|| arg.get_id().as_str().to_string());
        let description = arg
            .get_long_help()
            .or_else(|| arg.get_help())
            .map(|s| s.to_string())
            .unwrap_or_default();
        let (kind, style) = classify_arg(arg);

        let declared: Vec<String> = arg
            .get_possible_values()
            .iter()
            .filter(|pv| !pv.is_hide_set())
            .map(|pv| pv.get_name().to_string())
            .collect();
        let enum_hint = if !declared.is_empty() {
            Some(declared)
        } else if matches!(kind, FlagKind::String | FlagKind::StringList) {
            enum_hint_from_description(&description)
        } else {
            None
        };

        Some(FlagDescriptor {
            name,
            long,
            shorthand: arg.get_short(),
            description,
            kind,
            style,
            required: arg.is_required_set(),
            inherited,
            enum_hint,
        })
    }

    /// The switch token, `--long` or `-s`.
    pub fn switch(&self) -> String {
        match (&self.long, self.shorthand) {
            (Some(l), _) => format!("--{l}"),
            (None, Some(c)) => format!("-{c}"),
            (None, None) => format!("--{}", self.name),
        }
    }
}

fn classify_arg(arg: &Arg) -> (FlagKind, FlagStyle) {
    match arg.get_action() {
        ArgAction::SetTrue | ArgAction::SetFalse => return (FlagKind::Bool, FlagStyle::Switch),
        ArgAction::Count => return (FlagKind::Integer, FlagStyle::Counter),
        ArgAction::Append => return (FlagKind::StringList, FlagStyle::Repeated),
        _ => {}
    }
    if arg
        .get_num_args()
        .is_some_and(|range| range.max_values() > 1)
    {
        return (FlagKind::StringList, FlagStyle::MultiValue);
    }

    let id = arg.get_value_parser().type_id();
    let is_one_of = |candidates: &[TypeId]| candidates.iter().any(|c| id == *c);
    let kind = if is_one_of(&[
        TypeId::of::<i8>(),
        TypeId::of::<i16>(),
        TypeId::of::<i32>(),
        TypeId::of::<i64>(),
        TypeId::of::<isize>(),
        TypeId::of::<u8>(),
        TypeId::of::<u16>(),
        TypeId::of::<u32>(),
        TypeId::of::<u64>(),
        TypeId::of::<usize>(),
    ]) {
        FlagKind::Integer
    } else if is_one_of(&[TypeId::of::<f32>(), TypeId::of::<f64>()]) {
        FlagKind::Float
    } else if id == TypeId::of::<bool>() {
        FlagKind::Bool
    } else {
        FlagKind::String
    };
    (kind, FlagStyle::Value)
}

/// Extract an enum list from free-form help text.
///
/// Looks for a single comma / "or"-separated run of capitalized or quoted
/// tokens, e.g. `"Cluster size: Small, Medium, or Large (required)"`.
/// Returns `None` when no run is found, when more than one candidate run
/// exists, or when the text is negated ("not", "except", "excluding").
pub fn enum_hint_from_description(text: &str) -> Option<Vec<String>> {
    let lowered = text.to_ascii_lowercase();
    if lowered
        .split(|c: char| !c.is_ascii_alphanumeric())
        .any(|w| matches!(w, "not" | "except" | "excluding"))
    {
        return None;
    }

    let mut found: Option<Vec<String>> = None;
    for clause in text.split([':', ';', '.']) {
        let Some(tokens) = list_in_clause(clause) else {
            continue;
        };
        if found.is_some() {
            return None;
        }
        found = Some(tokens);
    }
    found
}

fn list_in_clause(clause: &str) -> Option<Vec<String>> {
    let clause = strip_qualifiers(clause.trim());
    if !clause.contains(',') && !clause.contains(" or ") {
        return None;
    }

    let mut tokens = Vec::new();
    for part in clause.split(',') {
        for piece in part.split(" or ") {
            let piece = piece.trim();
            let piece = piece.strip_prefix("or ").unwrap_or(piece).trim();
            if piece.is_empty() {
                continue;
            }
            tokens.push(enum_token(piece)?);
        }
    }
    (tokens.len() >= 2).then_some(tokens)
}

/// A single enum token: one quoted word or one capitalized word.
fn enum_token(piece: &str) -> Option<String> {
    for quote in ['"', '\'', '`'] {
        if let Some(inner) = piece
            .strip_prefix(quote)
            .and_then(|p| p.strip_suffix(quote))
        {
            return (!inner.is_empty() && !inner.contains(char::is_whitespace))
                .then(|| inner.to_string());
        }
    }
    let mut chars = piece.chars();
    let first = chars.next()?;
    let word_ok = piece
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_');
    (first.is_uppercase() && word_ok).then(|| piece.to_string())
}

/// Drop trailing parenthesized qualifiers such as "(required)".
fn strip_qualifiers(mut s: &str) -> &str {
    loop {
        let trimmed = s.trim_end();
        if trimmed.ends_with(')')
            && let Some(open) = trimmed.rfind('(')
        {
            s = &trimmed[..open];
            continue;
        }
        return trimmed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{Arg, ArgAction, value_parser};

    #[test]
    fn capitalized_list_with_or_and_qualifier() {
        assert_eq!(
            enum_hint_from_description("Cluster size: Small, Medium, or Large (required)"),
            Some(vec!["Small".into(), "Medium".into(), "Large".into()])
        );
    }

    #[test]
    fn quoted_tokens() {
        assert_eq!(
            enum_hint_from_description(r#"Confidence level: "normal" or "high""#),
            Some(vec!["normal".into(), "high".into()])
        );
    }

    #[test]
    fn prose_without_list_yields_none() {
        assert_eq!(
            enum_hint_from_description(
                "Use a specific AWS region (such as us-east-1), overriding the AWS_REGION environment variable."
            ),
            None
        );
        assert_eq!(enum_hint_from_description("Resource name to delete (required)"), None);
        assert_eq!(enum_hint_from_description(""), None);
    }

    #[test]
    fn negated_or_multiple_lists_yield_none() {
        assert_eq!(enum_hint_from_description("Any tier except Gold, Silver"), None);
        assert_eq!(
            enum_hint_from_description("Size: Small, Large. Color: Red, Blue"),
            None
        );
    }

    #[test]
    fn lowercase_plain_words_are_not_enums() {
        assert_eq!(
            enum_hint_from_description("name of the thing, used for lookups or display"),
            None
        );
    }

    #[test]
    fn kinds_follow_action_and_parser() {
        let flag = |a: Arg| FlagDescriptor::from_arg(&a, false).unwrap();

        let b = flag(Arg::new("force").long("force").action(ArgAction::SetTrue));
        assert_eq!((b.kind, b.style), (FlagKind::Bool, FlagStyle::Switch));

        let c = flag(Arg::new("verbose").short('v').action(ArgAction::Count));
        assert_eq!((c.kind, c.style), (FlagKind::Integer, FlagStyle::Counter));
        assert_eq!(c.switch(), "-v");

        let l = flag(Arg::new("tag").long("tag").action(ArgAction::Append));
        assert_eq!((l.kind, l.style), (FlagKind::StringList, FlagStyle::Repeated));

        let m = flag(Arg::new("ids").long("ids").num_args(1..));
        assert_eq!((m.kind, m.style), (FlagKind::StringList, FlagStyle::MultiValue));

        let i = flag(Arg::new("count").long("count").value_parser(value_parser!(u32)));
        assert_eq!(i.kind, FlagKind::Integer);

        let f = flag(Arg::new("ratio").long("ratio").value_parser(value_parser!(f64)));
        assert_eq!(f.kind, FlagKind::Float);

        let s = flag(Arg::new("name").long("name").required(true));
        assert_eq!((s.kind, s.style), (FlagKind::String, FlagStyle::Value));
        assert!(s.required);
    }

    #[test]
    fn possible_values_win_over_prose() {
        let arg = Arg::new("format")
            .long("format")
            .help("Output format: Table or Wide")
            .value_parser(["json", "yaml"]);
        let d = FlagDescriptor::from_arg(&arg, false).unwrap();
        assert_eq!(d.enum_hint, Some(vec!["json".into(), "yaml".into()]));
    }

    #[test]
    fn positionals_and_hidden_are_skipped() {
        assert!(FlagDescriptor::from_arg(&Arg::new("file"), false).is_none());
        let hidden = Arg::new("secret").long("secret").hide(true);
        assert!(FlagDescriptor::from_arg(&hidden, false).is_none());
    }
}
