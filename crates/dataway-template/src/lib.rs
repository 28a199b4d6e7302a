//! Handlebars templating for dataset expressions.
//!
//! A dataset's query expression is a handlebars template over the merged
//! request parameters. This crate renders those templates (non-strict, so
//! an absent variable becomes the empty string), extracts the variables a
//! template references without executing it, and builds the markdown API
//! document for a published dataset.

mod doc;
mod extract;

pub use doc::render_api_doc;
pub use extract::extract_variables;

use handlebars::Handlebars;
use serde_json::Value;
use thiserror::Error;

use dataway_entities::{ParamLocation, ParamType, RequestParam};

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("template parse error: {0}")]
    Parse(#[from] handlebars::TemplateError),

    #[error("template render error: {0}")]
    Render(#[from] handlebars::RenderError),
}

/// Shared handlebars registry configured for query text.
///
/// HTML escaping is disabled: the output is SQL or a backend query DSL,
/// never markup.
pub struct TemplateEngine {
    registry: Handlebars<'static>,
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine {
    pub fn new() -> Self {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(handlebars::no_escape);
        Self { registry }
    }

    /// Render an expression against the merged request parameters.
    /// Unknown variables render as empty strings.
    pub fn render(&self, expression: &str, params: &Value) -> Result<String, TemplateError> {
        Ok(self.registry.render_template(expression, params)?)
    }

    /// Propose request-parameter declarations from the variables an
    /// expression references. Every suggestion is a required body
    /// parameter of string type; the operator refines them in the UI.
    pub fn suggest_request_params(
        &self,
        expression: &str,
    ) -> Result<Vec<RequestParam>, TemplateError> {
        let vars = extract_variables(expression)?;
        Ok(vars
            .into_iter()
            .map(|name| RequestParam {
                id: String::new(),
                dataset_id: String::new(),
                name,
                description: String::new(),
                param_location: ParamLocation::Body,
                param_type: ParamType::String,
                required: true,
                default_value: String::new(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn render_substitutes_params() {
        let engine = TemplateEngine::new();
        let out = engine
            .render(
                "select * from users where name = '{{name}}'",
                &json!({"name": "ada"}),
            )
            .unwrap();
        assert_eq!(out, "select * from users where name = 'ada'");
    }

    #[test]
    fn render_leaves_missing_variables_empty() {
        let engine = TemplateEngine::new();
        let out = engine
            .render("where id = '{{id}}'", &json!({}))
            .unwrap();
        assert_eq!(out, "where id = ''");
    }

    #[test]
    fn render_does_not_escape_query_text() {
        let engine = TemplateEngine::new();
        let out = engine
            .render("where a {{op}} 1", &json!({"op": "<>"}))
            .unwrap();
        assert_eq!(out, "where a <> 1");
    }

    #[test]
    fn suggested_params_are_required_body_strings() {
        let engine = TemplateEngine::new();
        let params = engine
            .suggest_request_params("select * from t where a = {{a}} and b = {{b}}")
            .unwrap();
        let names: Vec<&str> = params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        for p in &params {
            assert!(p.required);
            assert_eq!(p.param_location, ParamLocation::Body);
            assert_eq!(p.param_type, ParamType::String);
        }
    }
}
