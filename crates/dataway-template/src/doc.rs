//! Markdown API document for a published dataset.

use handlebars::{handlebars_helper, Handlebars};

use dataway_entities::Dataset;

use crate::TemplateError;

const DOC_TEMPLATE: &str = r#"# {{name}}

{{#if description}}{{description}}

{{/if}}- **Method**: `POST`
- **Path**: `{{servePath}}`
- **Content-Type**: `application/json`

## Request Parameters

| Name | Location | Type | Required | Default | Description |
|------|----------|------|----------|---------|-------------|
{{#each requestParams}}| {{name}} | {{location_name paramLocation}} | {{type_name paramType}} | {{#if required}}yes{{else}}no{{/if}} | {{defaultValue}} | {{description}} |
{{/each}}

## Response Parameters

| Name | Type | Description |
|------|------|-------------|
{{#each responseParams}}| {{field_name this}} | {{type_name paramType}} | {{description}} |
{{/each}}

## Response Body

```json
{
  "success": true,
  "message": "",
  "data": {
    "page": 1,
    "size": 10,
    "total": 0,
    "data": []
  }
}
```
"#;

handlebars_helper!(location_name: |location: str| {
    match location {
        "path" => "Path",
        "query" => "Query",
        "body" => "Body",
        other => other,
    }
    .to_string()
});

handlebars_helper!(type_name: |param_type: str| {
    match param_type {
        "boolean" => "Boolean",
        "int" => "Int",
        "long" => "Long",
        "float" => "Float",
        "double" => "Double",
        "dateTime" => "DateTime",
        "string" => "String",
        "object" => "Object",
        "array" => "Array",
        other => other,
    }
    .to_string()
});

handlebars_helper!(field_name: |param: Json| {
    let name = param["name"].as_str().unwrap_or_default();
    if param["convertType"] == "rename" {
        param["convertValue"].as_str().unwrap_or(name).to_string()
    } else {
        name.to_string()
    }
});

/// Render the markdown document a published dataset exposes alongside its
/// endpoint. `serve_prefix` is the mount point of the serving router,
/// e.g. `/api/v1/serve`.
pub fn render_api_doc(dataset: &Dataset, serve_prefix: &str) -> Result<String, TemplateError> {
    let mut registry = Handlebars::new();
    registry.register_escape_fn(handlebars::no_escape);
    registry.register_helper("location_name", Box::new(location_name));
    registry.register_helper("type_name", Box::new(type_name));
    registry.register_helper("field_name", Box::new(field_name));

    let mut data = serde_json::to_value(dataset).map_err(|e| {
        TemplateError::Render(handlebars::RenderError::from(
            handlebars::RenderErrorReason::SerdeError(e),
        ))
    })?;
    data["servePath"] = serde_json::Value::String(format!(
        "{}/{}",
        serve_prefix.trim_end_matches('/'),
        dataset.path
    ));
    Ok(registry.render_template(DOC_TEMPLATE, &data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataway_entities::{ConvertType, ParamLocation, ParamType, RequestParam, ResponseParam};

    fn sample_dataset() -> Dataset {
        Dataset {
            id: "ds1".to_string(),
            name: "User lookup".to_string(),
            description: "Find users by name".to_string(),
            source_id: "src1".to_string(),
            path: "users/:name".to_string(),
            expression: "select * from users where name = '{{name}}'".to_string(),
            publish_status: true,
            enable_page: true,
            batch_limit: 1000,
            enable_cache: false,
            expire_seconds: 0,
            request_params: vec![RequestParam {
                id: String::new(),
                dataset_id: String::new(),
                name: "name".to_string(),
                description: "user name".to_string(),
                param_location: ParamLocation::Path,
                param_type: ParamType::String,
                required: true,
                default_value: String::new(),
            }],
            response_params: vec![
                ResponseParam {
                    id: String::new(),
                    dataset_id: String::new(),
                    name: "id".to_string(),
                    description: "identifier".to_string(),
                    param_type: ParamType::Long,
                    convert_type: ConvertType::Rename,
                    convert_value: "userId".to_string(),
                },
                ResponseParam {
                    id: String::new(),
                    dataset_id: String::new(),
                    name: "name".to_string(),
                    description: String::new(),
                    param_type: ParamType::String,
                    convert_type: ConvertType::None,
                    convert_value: String::new(),
                },
            ],
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn doc_lists_params_with_display_names() {
        let doc = render_api_doc(&sample_dataset(), "/api/v1/serve/").unwrap();
        assert!(doc.contains("# User lookup"));
        assert!(doc.contains("`/api/v1/serve/users/:name`"));
        assert!(doc.contains("| name | Path | String | yes |"));
        assert!(doc.contains("| userId | Long | identifier |"));
        assert!(doc.contains("| name | String |  |"));
    }
}
