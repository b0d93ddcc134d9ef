use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Whether a tool's registered handler runs in one step or as a chain of
/// linked tasks (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolType {
    SingleStep,
    MultiStep,
}

/// One entry of a multi-step tool's `configJson.steps` array (§3, §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolStep {
    pub name: String,
    pub provider: String,
    pub model: Option<String>,
    #[serde(default)]
    pub params: JsonValue,
}

/// Pricing snapshot attached to a job at intake time (§4.2 step 4) so that
/// later edits to the tool's catalog entry cannot retroactively alter
/// in-flight work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceConfig {
    pub currency: String,
    pub unit_price: f64,
    #[serde(default)]
    pub extra: JsonValue,
}

/// Catalog entry: `slug -> {handler binding, configJson, priceConfig,
/// active flag}` (§3, §4.6). The "handler binding" itself is not data —
/// it is the matching entry in `relay-handlers::HandlerRegistry`, looked up
/// by `slug` at dispatch time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    pub slug: String,
    pub tool_type: ToolType,
    pub steps: Vec<ToolStep>,
    pub price_config: PriceConfig,
    pub reference_images: Vec<String>,
    pub is_active: bool,
}
