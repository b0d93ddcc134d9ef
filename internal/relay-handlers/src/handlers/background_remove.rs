use std::time::{Duration, Instant};

use async_trait::async_trait;
use relay_types::{RelayError, RelayResult, TaskResponseRow};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

use crate::{HandlerContext, HandlerOutput, ToolHandler};

const PROVIDER_SLUG: &str = "fal_ai";
const DEFAULT_BASE_URL: &str = "https://fal.run/fal-ai/background-remove";
const DEFAULT_TTL: Duration = Duration::from_secs(3600);
const POLL_INTERVAL: Duration = Duration::from_millis(500);
const MAX_POLLS: u32 = 20;

#[derive(Debug, Deserialize)]
struct FalSubmitResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    image: Option<FalImage>,
    #[serde(default)]
    status_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FalImage {
    url: String,
}

/// Single-step handler (§4.4): removes the background from an input image
/// via fal.ai's `background-remove` model.
pub struct BackgroundRemoveHandler;

#[async_trait]
impl ToolHandler for BackgroundRemoveHandler {
    fn slug(&self) -> &'static str {
        "background-remove"
    }

    async fn execute(&self, ctx: &HandlerContext) -> RelayResult<HandlerOutput> {
        let creds = ctx.credentials(PROVIDER_SLUG).await?;
        let api_key = creds.api_key.as_ref().ok_or_else(|| RelayError::ProviderNoApiKey {
            slug: PROVIDER_SLUG.to_string(),
        })?;

        let image_url = ctx
            .input_params
            .get("imageUrl")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| RelayError::InvalidRequest {
                message: "missing inputParams.imageUrl".to_string(),
            })?;
        let signed_input = ctx.sign_artifact_url(image_url, Duration::from_secs(300))?;

        ctx.report_progress(10, None).await?;

        let base_url = creds.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        let request_body = json!({ "image_url": signed_input });
        let started = Instant::now();

        let response = ctx
            .http
            .post(base_url)
            .header("Authorization", format!("Key {api_key}"))
            .json(&request_body)
            .send()
            .await
            .map_err(|e| RelayError::Internal {
                message: format!("fal.ai request failed: {e}"),
            })?;
        let status_code = response.status().as_u16();
        let body: FalSubmitResponse = response.json().await.map_err(|e| RelayError::Internal {
            message: format!("fal.ai response decode failed: {e}"),
        })?;

        ctx.report_progress(30, None).await?;

        let mut output_image = body.image;
        let mut poll_url = body.status_url;
        let mut polls = 0;
        while output_image.is_none() {
            let Some(url) = poll_url.as_ref() else {
                break;
            };
            if polls >= MAX_POLLS {
                return Err(RelayError::Internal {
                    message: "fal.ai polling exceeded max attempts".to_string(),
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
            let poll_response: FalSubmitResponse = ctx
                .http
                .get(url)
                .header("Authorization", format!("Key {api_key}"))
                .send()
                .await
                .map_err(|e| RelayError::Internal {
                    message: format!("fal.ai poll failed: {e}"),
                })?
                .json()
                .await
                .map_err(|e| RelayError::Internal {
                    message: format!("fal.ai poll decode failed: {e}"),
                })?;
            output_image = poll_response.image;
            poll_url = poll_response.status_url;
            polls += 1;
            // Map polling progress onto the 30-70 sub-range of the task's own schedule.
            let pct = 30 + (polls * 40 / MAX_POLLS).min(40) as u8;
            ctx.report_progress(pct, None).await?;
        }

        ctx.report_progress(70, None).await?;

        let output_image = output_image.ok_or_else(|| RelayError::Internal {
            message: "fal.ai never returned an output image".to_string(),
        })?;

        let unsigned_result_url = ctx.fetch_and_put_artifact(None, "png", &output_image.url).await?;
        let signed_result_url = ctx.sign_artifact_url(&unsigned_result_url, DEFAULT_TTL)?;

        let latency_ms = started.elapsed().as_millis() as i64;
        ctx.record_response(TaskResponseRow {
            id: Uuid::now_v7(),
            task_id: ctx.task_id,
            step_name: None,
            provider: PROVIDER_SLUG.to_string(),
            model: Some("background-remove".to_string()),
            raw_request: request_body,
            raw_response: json!({ "status": body.status, "image_url": output_image.url }),
            latency_ms,
            status_code: Some(status_code),
            error_message: None,
            created_at: chrono::Utc::now(),
        })
        .await;

        ctx.report_progress(100, None).await?;

        // The aggregate UsageLog row is written by the worker from this
        // usage_data once the handler returns (§4.3 step 3), not by the
        // handler itself — exactly one per terminal attempt (§8 invariant 3).
        let usage_data = json!({
            "provider": PROVIDER_SLUG,
            "model": "background-remove",
            "apiLatencyMs": latency_ms,
        });

        Ok(HandlerOutput {
            output_data: json!({
                "resultUrl": signed_result_url,
                "unsignedResultUrl": unsigned_result_url,
                "provider": PROVIDER_SLUG,
                "model": "background-remove",
            }),
            usage_data,
        })
    }
}
