//! Variable extraction by walking the parsed template.
//!
//! The template is compiled but never executed, so extraction is safe to
//! run on untrusted operator input. Helper names and block keywords are
//! filtered out; what remains are the data paths the template reads, in
//! first-appearance order.

use std::collections::HashSet;

use handlebars::template::{Parameter, Template, TemplateElement};

use crate::TemplateError;

/// Built-in helpers and keywords that look like variable references in
/// the parse tree but never resolve against request parameters.
const BUILTINS: &[&str] = &[
    "if", "unless", "each", "with", "lookup", "log", "eq", "ne", "gt", "gte", "lt", "lte", "and",
    "or", "not", "len", "this", "else", "raw",
];

/// List the variables an expression references, deduplicated and in
/// order of first appearance.
pub fn extract_variables(expression: &str) -> Result<Vec<String>, TemplateError> {
    let template = Template::compile(expression)?;
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    walk_template(&template, &mut out, &mut seen);
    Ok(out)
}

fn walk_template(template: &Template, out: &mut Vec<String>, seen: &mut HashSet<String>) {
    for element in &template.elements {
        walk_element(element, out, seen);
    }
}

fn walk_element(element: &TemplateElement, out: &mut Vec<String>, seen: &mut HashSet<String>) {
    match element {
        TemplateElement::Expression(ht) | TemplateElement::HtmlExpression(ht) => {
            if ht.params.is_empty() {
                // A bare `{{name}}` mention; its name is the variable.
                record_parameter(&ht.name, out, seen);
            } else {
                // `{{helper a b}}`; the name is a helper call.
                for param in &ht.params {
                    record_parameter(param, out, seen);
                }
            }
            walk_hash(ht.hash.values(), out, seen);
        }
        TemplateElement::HelperBlock(ht) => {
            for param in &ht.params {
                record_parameter(param, out, seen);
            }
            walk_hash(ht.hash.values(), out, seen);
            if let Some(inner) = &ht.template {
                walk_template(inner, out, seen);
            }
            if let Some(inverse) = &ht.inverse {
                walk_template(inverse, out, seen);
            }
        }
        _ => {}
    }
}

fn walk_hash<'a>(
    values: impl Iterator<Item = &'a Parameter>,
    out: &mut Vec<String>,
    seen: &mut HashSet<String>,
) {
    for param in values {
        record_parameter(param, out, seen);
    }
}

fn record_parameter(param: &Parameter, out: &mut Vec<String>, seen: &mut HashSet<String>) {
    match param {
        Parameter::Name(name) => record_name(name, out, seen),
        Parameter::Path(path) => {
            let raw = match path {
                handlebars::Path::Relative((_, raw)) => raw.as_str(),
                handlebars::Path::Local((_, _, raw)) => raw.as_str(),
            };
            record_name(raw, out, seen)
        }
        Parameter::Subexpression(sub) => {
            match sub.params() {
                Some(params) if !params.is_empty() => {
                    for param in params {
                        record_parameter(param, out, seen);
                    }
                }
                // `(name)` with no arguments is a variable mention.
                _ => record_name(sub.name(), out, seen),
            }
            if let Some(hash) = sub.hash() {
                walk_hash(hash.values(), out, seen);
            }
        }
        Parameter::Literal(_) => {}
        _ => {}
    }
}

/// Normalize a raw path to its root segment and record it unless it is a
/// builtin, a block-local (`@index`, `@key`) or `this`.
fn record_name(raw: &str, out: &mut Vec<String>, seen: &mut HashSet<String>) {
    let trimmed = raw.strip_prefix("./").unwrap_or(raw);
    let root = trimmed
        .split(['.', '/'])
        .find(|seg| !seg.is_empty())
        .unwrap_or("");
    if root.is_empty() || root.starts_with('@') || BUILTINS.contains(&root) {
        return;
    }
    if seen.insert(root.to_string()) {
        out.push(root.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_mentions_are_extracted_in_order() {
        let vars = extract_variables("select {{b}} from t where a = {{a}} and b = {{b}}").unwrap();
        assert_eq!(vars, vec!["b", "a"]);
    }

    #[test]
    fn helper_calls_yield_their_arguments() {
        let vars = extract_variables(
            "where name = '{{name}}' {{#if (eq age 1)}}and age = 1{{/if}} \
             and id in ({{#each ids}}{{this}},{{/each}}0)",
        )
        .unwrap();
        assert_eq!(vars, vec!["name", "age", "ids"]);
    }

    #[test]
    fn block_locals_and_builtins_are_ignored() {
        let vars =
            extract_variables("{{#each rows}}{{@index}}: {{this.id}} {{value}}{{/each}}").unwrap();
        assert_eq!(vars, vec!["rows", "value"]);
    }

    #[test]
    fn dotted_paths_collapse_to_their_root() {
        let vars = extract_variables("{{user.name}} {{user.age}} {{order.id}}").unwrap();
        assert_eq!(vars, vec!["user", "order"]);
    }

    #[test]
    fn malformed_template_is_a_parse_error() {
        assert!(extract_variables("{{#if x}} unclosed").is_err());
    }

    #[test]
    fn literal_arguments_are_not_variables() {
        let vars = extract_variables("{{#if (eq status \"open\")}}x{{/if}}").unwrap();
        assert_eq!(vars, vec!["status"]);
    }
}
