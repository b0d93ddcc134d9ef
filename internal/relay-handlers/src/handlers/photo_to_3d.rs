use std::time::{Duration, Instant};

use async_trait::async_trait;
use relay_types::{RelayError, RelayResult, TaskResponseRow};
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

use crate::{HandlerContext, HandlerOutput, ToolHandler};

const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Multi-step handler (§4.4): photo → stylized image → 3-D model. Each step
/// is its own task linked by `parentTaskId`; this one function contains one
/// branch per step name, matched on `inputParams.step`.
pub struct Photo3DHandler;

#[async_trait]
impl ToolHandler for Photo3DHandler {
    fn slug(&self) -> &'static str {
        "photo-to-3d"
    }

    async fn execute(&self, ctx: &HandlerContext) -> RelayResult<HandlerOutput> {
        let step = ctx
            .input_params
            .get("step")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| RelayError::InvalidRequest {
                message: "missing inputParams.step".to_string(),
            })?;

        match step {
            "stylize" => run_stylize(ctx).await,
            "model" => run_model_3d(ctx).await,
            other => Err(RelayError::InvalidRequest {
                message: format!("unknown photo-to-3d step '{other}'"),
            }),
        }
    }
}

async fn run_stylize(ctx: &HandlerContext) -> RelayResult<HandlerOutput> {
    let creds = ctx.credentials("stability_ai").await?;
    let api_key = creds.api_key.as_ref().ok_or_else(|| RelayError::ProviderNoApiKey {
        slug: "stability_ai".to_string(),
    })?;
    let image_url = ctx
        .input_params
        .get("imageUrl")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| RelayError::InvalidRequest {
            message: "missing inputParams.imageUrl".to_string(),
        })?;

    ctx.report_progress(10, Some("stylizing source photo".to_string())).await?;

    let signed_input = ctx.sign_artifact_url(image_url, Duration::from_secs(300))?;
    let base_url = creds
        .base_url
        .as_deref()
        .unwrap_or("https://api.stability.ai/v2beta/stable-image/control/style");
    let request_body = json!({ "image_url": signed_input, "style_preset": "3d-model" });
    let started = Instant::now();

    let response = ctx
        .http
        .post(base_url)
        .header("Authorization", format!("Bearer {api_key}"))
        .json(&request_body)
        .send()
        .await
        .map_err(|e| RelayError::Internal {
            message: format!("stability.ai request failed: {e}"),
        })?;
    let status_code = response.status().as_u16();
    let body: JsonValue = response.json().await.map_err(|e| RelayError::Internal {
        message: format!("stability.ai response decode failed: {e}"),
    })?;

    ctx.report_progress(60, None).await?;

    let image_url_out = body
        .get("image_url")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| RelayError::Internal {
            message: "stability.ai response missing image_url".to_string(),
        })?;
    let unsigned_result_url = ctx
        .fetch_and_put_artifact(Some("stylize"), "png", image_url_out)
        .await?;
    let signed_result_url = ctx.sign_artifact_url(&unsigned_result_url, DEFAULT_TTL)?;

    let latency_ms = started.elapsed().as_millis() as i64;
    ctx.record_response(TaskResponseRow {
        id: Uuid::now_v7(),
        task_id: ctx.task_id,
        step_name: Some("stylize".to_string()),
        provider: "stability_ai".to_string(),
        model: Some("stable-image-control".to_string()),
        raw_request: request_body,
        raw_response: body,
        latency_ms,
        status_code: Some(status_code),
        error_message: None,
        created_at: chrono::Utc::now(),
    })
    .await;

    ctx.report_progress(100, None).await?;

    // Aggregate UsageLog row for this step-task is written by the worker
    // from this usage_data, not here (§4.3 step 3, §8 invariant 3).
    let usage_data = json!({
        "provider": "stability_ai",
        "model": "stable-image-control",
        "apiLatencyMs": latency_ms,
    });

    Ok(HandlerOutput {
        output_data: json!({
            "resultUrl": signed_result_url,
            "unsignedResultUrl": unsigned_result_url,
            "provider": "stability_ai",
            "model": "stable-image-control",
        }),
        usage_data,
    })
}

async fn run_model_3d(ctx: &HandlerContext) -> RelayResult<HandlerOutput> {
    let creds = ctx.credentials("tripo_ai").await?;
    let api_key = creds.api_key.as_ref().ok_or_else(|| RelayError::ProviderNoApiKey {
        slug: "tripo_ai".to_string(),
    })?;
    // The caller supplies the parent step's bare unsignedResultUrl (§4.4),
    // not a freshly signed one — we sign it ourselves before sending it out.
    let image_url = ctx
        .input_params
        .get("imageUrl")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| RelayError::InvalidRequest {
            message: "missing inputParams.imageUrl".to_string(),
        })?;
    let signed_input = ctx.sign_artifact_url(image_url, Duration::from_secs(300))?;

    ctx.report_progress(5, Some("submitting to 3D generation".to_string())).await?;

    let base_url = creds.base_url.as_deref().unwrap_or("https://api.tripo3d.ai/v2/generate");
    let request_body = json!({ "image_url": signed_input });
    let started = Instant::now();

    let response = ctx
        .http
        .post(base_url)
        .header("Authorization", format!("Bearer {api_key}"))
        .json(&request_body)
        .send()
        .await
        .map_err(|e| RelayError::Internal {
            message: format!("tripo3d request failed: {e}"),
        })?;
    let status_code = response.status().as_u16();
    let body: JsonValue = response.json().await.map_err(|e| RelayError::Internal {
        message: format!("tripo3d response decode failed: {e}"),
    })?;

    // Generation is the slow part of this step; occupy 20-80 of our own
    // progress range for it (§4.4's sub-range mapping guidance), reported
    // as a single jump since this adapter has no intermediate poll events.
    ctx.report_progress(80, None).await?;

    let model_url = body
        .get("model_url")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| RelayError::Internal {
            message: "tripo3d response missing model_url".to_string(),
        })?;
    let unsigned_result_url = ctx.fetch_and_put_artifact(Some("model"), "glb", model_url).await?;
    let signed_result_url = ctx.sign_artifact_url(&unsigned_result_url, DEFAULT_TTL)?;

    let latency_ms = started.elapsed().as_millis() as i64;
    ctx.record_response(TaskResponseRow {
        id: Uuid::now_v7(),
        task_id: ctx.task_id,
        step_name: Some("model".to_string()),
        provider: "tripo_ai".to_string(),
        model: Some("tripo-v2".to_string()),
        raw_request: request_body,
        raw_response: body,
        latency_ms,
        status_code: Some(status_code),
        error_message: None,
        created_at: chrono::Utc::now(),
    })
    .await;

    ctx.report_progress(100, None).await?;

    let usage_data = json!({
        "provider": "tripo_ai",
        "model": "tripo-v2",
        "apiLatencyMs": latency_ms,
    });

    Ok(HandlerOutput {
        output_data: json!({
            "resultUrl": signed_result_url,
            "unsignedResultUrl": unsigned_result_url,
            "provider": "tripo_ai",
            "model": "tripo-v2",
        }),
        usage_data,
    })
}
