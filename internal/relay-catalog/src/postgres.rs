use async_trait::async_trait;
use relay_types::{PriceConfig, RelayError, RelayResult, Tool, ToolStep, ToolType};
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgPool};

use crate::ToolCatalog;

#[derive(FromRow)]
struct ToolRow {
    slug: String,
    tool_type: String,
    steps: JsonValue,
    price_config: JsonValue,
    reference_images: JsonValue,
    is_active: bool,
}

impl ToolRow {
    fn into_tool(self) -> RelayResult<Tool> {
        let tool_type = match self.tool_type.as_str() {
            "single_step" => ToolType::SingleStep,
            "multi_step" => ToolType::MultiStep,
            other => {
                return Err(RelayError::Internal {
                    message: format!("unknown tool_type '{other}' for tool {}", self.slug),
                })
            }
        };
        let steps: Vec<ToolStep> = serde_json::from_value(self.steps).map_err(|e| RelayError::Internal {
            message: format!("corrupt steps for tool {}: {e}", self.slug),
        })?;
        let price_config: PriceConfig =
            serde_json::from_value(self.price_config).map_err(|e| RelayError::Internal {
                message: format!("corrupt price_config for tool {}: {e}", self.slug),
            })?;
        let reference_images: Vec<String> = serde_json::from_value(self.reference_images)
            .map_err(|e| RelayError::Internal {
                message: format!("corrupt reference_images for tool {}: {e}", self.slug),
            })?;
        Ok(Tool {
            slug: self.slug,
            tool_type,
            steps,
            price_config,
            reference_images,
            is_active: self.is_active,
        })
    }
}

pub struct PgToolCatalog {
    pool: PgPool,
}

impl PgToolCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> RelayResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| RelayError::Database {
                message: e.to_string(),
            })
    }
}

#[async_trait]
impl ToolCatalog for PgToolCatalog {
    async fn get(&self, slug: &str) -> RelayResult<Tool> {
        let row: Option<ToolRow> = sqlx::query_as(
            r"
            SELECT slug, tool_type, steps, price_config, reference_images, is_active
            FROM tools
            WHERE slug = $1 AND is_active = true
            ",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RelayError::Database {
            message: e.to_string(),
        })?;

        row.ok_or_else(|| RelayError::UnknownTool {
            slug: slug.to_string(),
        })?
        .into_tool()
    }

    async fn list(&self) -> RelayResult<Vec<Tool>> {
        let rows: Vec<ToolRow> = sqlx::query_as(
            "SELECT slug, tool_type, steps, price_config, reference_images, is_active FROM tools ORDER BY slug",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RelayError::Database {
            message: e.to_string(),
        })?;

        rows.into_iter().map(ToolRow::into_tool).collect()
    }
}
