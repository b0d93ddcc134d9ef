use relay_types::Tool;

/// Development-mode consistency check (§4.6): every active catalog slug
/// must resolve to a registered handler. Returns the slugs that don't, for
/// the caller to log — this never fails startup, since a stale catalog
/// entry for a tool being decommissioned is a normal state to pass through.
pub fn validate_against_handlers<'a>(tools: &'a [Tool], registered_slugs: &[String]) -> Vec<&'a str> {
    tools
        .iter()
        .filter(|tool| tool.is_active)
        .filter(|tool| !registered_slugs.iter().any(|slug| slug == &tool.slug))
        .map(|tool| tool.slug.as_str())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_types::{PriceConfig, ToolType};
    use serde_json::json;

    fn tool(slug: &str, active: bool) -> Tool {
        Tool {
            slug: slug.to_string(),
            tool_type: ToolType::SingleStep,
            steps: vec![],
            price_config: PriceConfig {
                currency: "USD".to_string(),
                unit_price: 0.1,
                extra: json!({}),
            },
            reference_images: vec![],
            is_active: active,
        }
    }

    #[test]
    fn flags_active_tool_missing_a_handler() {
        let tools = vec![tool("background-remove", true)];
        let missing = validate_against_handlers(&tools, &[]);
        assert_eq!(missing, vec!["background-remove"]);
    }

    #[test]
    fn ignores_inactive_tools() {
        let tools = vec![tool("retired-tool", false)];
        assert!(validate_against_handlers(&tools, &[]).is_empty());
    }

    #[test]
    fn matched_slug_is_not_flagged() {
        let tools = vec![tool("background-remove", true)];
        let registered = vec!["background-remove".to_string()];
        assert!(validate_against_handlers(&tools, &registered).is_empty());
    }
}
