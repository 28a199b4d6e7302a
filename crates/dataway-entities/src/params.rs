use serde::{Deserialize, Serialize};

/// Where a request parameter is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParamLocation {
    Path,
    Query,
    Body,
}

impl ParamLocation {
    pub fn display_name(&self) -> &'static str {
        match self {
            ParamLocation::Path => "Path",
            ParamLocation::Query => "Query",
            ParamLocation::Body => "Body",
        }
    }
}

/// Declared parameter type. Documentation metadata; the serving path does
/// not enforce it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParamType {
    Boolean,
    Int,
    Long,
    Float,
    Double,
    DateTime,
    String,
    Object,
    Array,
}

impl ParamType {
    pub fn display_name(&self) -> &'static str {
        match self {
            ParamType::Boolean => "Boolean",
            ParamType::Int => "Int",
            ParamType::Long => "Long",
            ParamType::Float => "Float",
            ParamType::Double => "Double",
            ParamType::DateTime => "DateTime",
            ParamType::String => "String",
            ParamType::Object => "Object",
            ParamType::Array => "Array",
        }
    }
}

/// How a response field is converted before it leaves the engine. Closed
/// variant; adding a conversion kind means adding a variant and one arm in
/// the projection dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConvertType {
    #[default]
    None,
    Rename,
}

/// A declared input of a dataset. Metadata for documentation and the UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestParam {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub dataset_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub param_location: ParamLocation,
    pub param_type: ParamType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default_value: String,
}

/// A declared output field: the allow-list entry plus optional renaming.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseParam {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub dataset_id: String,
    /// Source field name in the raw row.
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub param_type: ParamType,
    #[serde(default)]
    pub convert_type: ConvertType,
    /// Target alias when `convert_type` is `Rename`.
    #[serde(default)]
    pub convert_value: String,
}
