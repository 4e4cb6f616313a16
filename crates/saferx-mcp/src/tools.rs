//! The SafeRx tool adapter: `check_drug_safety` and `get_drug_metadata`.

use crate::client::SafetyBackend;
use crate::error::{AdapterError, Result, ValidationError};
use crate::format;
use crate::model::{Condition, DrugSafetyRequest, Lang, MAX_DRUGS, Population, SafetyDomain};
use crate::registry::{ToolDefinition, ToolHandler, ToolRegistry};
use crate::schema;
use async_trait::async_trait;
use rmcp::model::{CallToolResult, Content, JsonObject, ToolAnnotations};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{info, warn};

pub const CHECK_DRUG_SAFETY: &str = "check_drug_safety";
pub const GET_DRUG_METADATA: &str = "get_drug_metadata";

const CHECK_DESCRIPTION: &str = "Screen drugs for safety issues across 6 domains: adverse effects (Black Box Warnings, monitoring), drug interactions, pregnancy/lactation risks, food interactions, clinical considerations, and dosing. Covers 28,000+ Egyptian pharmaceutical products with bilingual EN/AR support.";
const METADATA_DESCRIPTION: &str = "Get SafeRx Drug Safety API metadata: available populations, conditions, database versions, risk scales, and current tier limits. Useful for discovering valid parameter values.";

/// Adapter between tool calls and a [`SafetyBackend`].
pub struct SafetyTools {
    backend: Arc<dyn SafetyBackend>,
}

impl SafetyTools {
    #[must_use]
    pub fn new(backend: Arc<dyn SafetyBackend>) -> Self {
        Self { backend }
    }

    /// Register both tools with `registry`.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry already holds a tool with one of these names.
    pub fn register(self, registry: &mut dyn ToolRegistry) -> Result<()> {
        let tools = Arc::new(self);

        let check = check_definition();
        registry.register(
            check.clone(),
            Arc::new(CheckDrugSafety {
                tools: tools.clone(),
                schema: check.input_schema,
            }),
        )?;

        let metadata = metadata_definition();
        registry.register(
            metadata.clone(),
            Arc::new(GetDrugMetadata {
                tools,
                schema: metadata.input_schema,
            }),
        )?;
        Ok(())
    }

    /// Screen `request.drugs` against the backend.
    ///
    /// Non-success HTTP statuses become an error result (`isError: true`); they are not
    /// retried.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Validation`] (before any request is made) if the drug count is
    /// outside `1..=20`, and a transport error if the backend is unreachable or replies with
    /// a non-JSON body.
    pub async fn check_drug_safety(&self, request: &DrugSafetyRequest) -> Result<CallToolResult> {
        check_drug_count(request)?;

        let resp = self.backend.check(request).await?;
        if !resp.is_success() {
            warn!(tool = CHECK_DRUG_SAFETY, status = resp.status, "SafeRx returned an error");
            return Ok(error_result(resp.status, &resp.body));
        }

        let text = format::check_result_text(&resp.body);
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }

    /// Fetch backend metadata (valid parameter values, database versions, tier limits).
    ///
    /// # Errors
    ///
    /// Returns a transport error if the backend is unreachable or replies with a non-JSON body.
    pub async fn get_drug_metadata(&self) -> Result<CallToolResult> {
        let resp = self.backend.metadata().await?;
        if !resp.is_success() {
            warn!(tool = GET_DRUG_METADATA, status = resp.status, "SafeRx returned an error");
            return Ok(error_result(resp.status, &resp.body));
        }

        let text = format::metadata_text(&resp.body);
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }
}

fn check_drug_count(request: &DrugSafetyRequest) -> Result<()> {
    let n = request.drugs.len();
    if (1..=MAX_DRUGS).contains(&n) {
        return Ok(());
    }
    Err(AdapterError::Validation(ValidationError::new(
        format!("Invalid params: drugs must contain between 1 and {MAX_DRUGS} items (got {n})"),
        vec![json!({
            "type": "constraint-violation",
            "message": format!("expected 1..={MAX_DRUGS} items, got {n}"),
            "instancePath": "/drugs",
        })],
    )))
}

fn error_result(status: u16, body: &Value) -> CallToolResult {
    CallToolResult::error(vec![Content::text(format::error_text(status, body))])
}

struct CheckDrugSafety {
    tools: Arc<SafetyTools>,
    schema: Arc<JsonObject>,
}

#[async_trait]
impl ToolHandler for CheckDrugSafety {
    async fn call(&self, arguments: Value) -> Result<CallToolResult> {
        let request: DrugSafetyRequest = schema::validate(&arguments, &self.schema)?;
        info!(
            tool = CHECK_DRUG_SAFETY,
            drugs = request.drugs.len(),
            lang = request.effective_lang().as_str(),
            "screening drugs"
        );
        self.tools.check_drug_safety(&request).await
    }
}

#[derive(Deserialize)]
struct NoArguments {}

struct GetDrugMetadata {
    tools: Arc<SafetyTools>,
    schema: Arc<JsonObject>,
}

#[async_trait]
impl ToolHandler for GetDrugMetadata {
    async fn call(&self, arguments: Value) -> Result<CallToolResult> {
        let NoArguments {} = schema::validate(&arguments, &self.schema)?;
        info!(tool = GET_DRUG_METADATA, "fetching metadata");
        self.tools.get_drug_metadata().await
    }
}

/// Both tools only read from SafeRx; neither changes backend state.
fn read_only_annotations() -> ToolAnnotations {
    ToolAnnotations {
        title: None,
        read_only_hint: Some(true),
        destructive_hint: Some(false),
        idempotent_hint: Some(true),
        open_world_hint: Some(true),
    }
}

fn enum_schema(values: Vec<&'static str>) -> Value {
    json!({ "type": "string", "enum": values })
}

fn into_schema(v: Value) -> Arc<JsonObject> {
    Arc::new(v.as_object().cloned().unwrap_or_default())
}

#[must_use]
pub fn check_definition() -> ToolDefinition {
    let populations: Vec<&str> = Population::ALL.iter().copied().map(Population::as_str).collect();
    let conditions: Vec<&str> = Condition::ALL.iter().copied().map(Condition::as_str).collect();
    let domains: Vec<&str> = SafetyDomain::ALL.iter().copied().map(SafetyDomain::as_str).collect();
    let langs: Vec<&str> = Lang::ALL.iter().copied().map(Lang::as_str).collect();

    let schema = json!({
        "type": "object",
        "properties": {
            "drugs": {
                "type": "array",
                "items": { "type": "string" },
                "minItems": 1,
                "maxItems": MAX_DRUGS,
                "description": "Drug names to screen (trade or generic, e.g. 'Augmentin 1g')"
            },
            "patient_profile": {
                "type": "object",
                "properties": {
                    "populations": {
                        "type": "array",
                        "items": enum_schema(populations),
                        "description": "Patient populations for personalized alerts"
                    },
                    "conditions": {
                        "type": "array",
                        "items": enum_schema(conditions),
                        "description": "Patient comorbidities"
                    }
                },
                "additionalProperties": false,
                "description": "Patient context for personalized safety screening"
            },
            "include": {
                "type": "array",
                "items": enum_schema(domains),
                "description": "Safety domains to check (ae=adverse effects, ddi=drug interactions, pllr=pregnancy/lactation, food=food interactions, clinical=population/condition safety, dose=max daily dose). Omit for all."
            },
            "lang": {
                "type": "string",
                "enum": langs,
                "default": Lang::default().as_str(),
                "description": "Response language"
            }
        },
        "required": ["drugs"],
        "additionalProperties": false
    });

    ToolDefinition {
        name: CHECK_DRUG_SAFETY.to_string(),
        description: CHECK_DESCRIPTION.to_string(),
        input_schema: into_schema(schema),
        annotations: Some(read_only_annotations()),
    }
}

#[must_use]
pub fn metadata_definition() -> ToolDefinition {
    ToolDefinition {
        name: GET_DRUG_METADATA.to_string(),
        description: METADATA_DESCRIPTION.to_string(),
        input_schema: into_schema(json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        })),
        annotations: Some(read_only_annotations()),
    }
}
