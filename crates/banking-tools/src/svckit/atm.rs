//! ATM Locator Tool

use std::sync::Arc;

use agent_core::{Tool, ToolCall, ToolContext, ToolDefinition, ToolExecutionResult};
use async_trait::async_trait;
use serde_json::json;

use super::{backend_failure, str_arg};
use crate::backend::BankingBackend;

/// Tool for finding ATMs by city and district
pub struct FindAtmTool {
    backend: Arc<dyn BankingBackend>,
}

impl FindAtmTool {
    pub fn new(backend: Arc<dyn BankingBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for FindAtmTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "find_atm",
            "Find the bank's ATMs in a city, optionally narrowed to a district. \
             Reports opening hours and whether cash deposits are accepted.",
            json!({
                "type": "object",
                "properties": {
                    "city": { "type": "string", "description": "City name (e.g., 'Istanbul')" },
                    "district": { "type": "string", "description": "District within the city" }
                },
                "required": ["city"]
            }),
        )
    }

    async fn execute(&self, call: &ToolCall, _ctx: &ToolContext) -> anyhow::Result<ToolExecutionResult> {
        let Some(city) = str_arg(&call.args, "city") else {
            return Ok(ToolExecutionResult::failure("Parameter 'city' is required."));
        };
        let district = str_arg(&call.args, "district");

        let atms = match self.backend.atms(city, district).await {
            Ok(atms) => atms,
            Err(e) => return Ok(backend_failure("find_atm", &e)),
        };

        if atms.is_empty() {
            let place = district.map_or_else(|| city.to_string(), |d| format!("{d}, {city}"));
            return Ok(ToolExecutionResult::success(format!("No ATMs found in {place}.")));
        }

        let lines: Vec<String> = atms
            .iter()
            .map(|a| {
                format!(
                    "- {}, {} ({}{})",
                    a.address,
                    a.district,
                    if a.open_24h { "24h" } else { "branch hours" },
                    if a.accepts_deposits { ", deposits" } else { "" }
                )
            })
            .collect();

        Ok(ToolExecutionResult::success(format!("ATMs in {city}:\n{}", lines.join("\n")))
            .with_data(serde_json::to_value(&atms)?))
    }
}
