//! SETPOINT LLM - Delegated Completion Layer
//!
//! Provider-agnostic trait for schema-constrained JSON completions plus the
//! registry agents resolve providers from. Actual transport implementations
//! are user-supplied; this crate ships only the contract and a deterministic
//! mock for tests.
//!
//! Failure semantics: every transport, timeout, or schema failure is
//! collapsed into `LlmError::UpstreamUnavailable` at the retry helper, so a
//! caller has exactly one fallback boundary instead of error branching
//! scattered through its body.

use serde::de::DeserializeOwned;
use serde_json::Value;
use setpoint_core::{LlmError, SetpointError, SetpointResult};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};

// ============================================================================
// COMPLETION PROVIDER TRAIT
// ============================================================================

/// Metadata returned alongside a completion payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionMeta {
    /// Provider identifier (e.g. "openai-compatible")
    pub provider: String,
    /// Model identifier the completion came from
    pub model: String,
    /// Provider-specific extras (role, endpoint, token counts, ...)
    pub extras: BTreeMap<String, String>,
}

impl CompletionMeta {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            extras: BTreeMap::new(),
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }

    /// Flatten into the string map drafts carry as `llm_metadata`.
    pub fn as_map(&self) -> BTreeMap<String, String> {
        let mut map = self.extras.clone();
        map.insert("provider".to_string(), self.provider.clone());
        map.insert("model".to_string(), self.model.clone());
        map
    }
}

/// Trait for delegated JSON-completion providers.
/// Implementations must be thread-safe (Send + Sync).
///
/// # Example
/// ```ignore
/// struct OpenAICompatible { /* ... */ }
///
/// impl CompletionProvider for OpenAICompatible {
///     fn complete_json(&self, role: &str, system_prompt: &str, user_payload: &Value, temperature: f32)
///         -> SetpointResult<(Value, CompletionMeta)> {
///         // POST /chat/completions with response_format=json
///     }
/// }
/// ```
pub trait CompletionProvider: Send + Sync {
    /// Run one schema-constrained completion.
    ///
    /// # Arguments
    /// * `role` - Which agent is asking ("mapper", "generator", "critic")
    /// * `system_prompt` - Role instructions
    /// * `user_payload` - Structured task input
    /// * `temperature` - Sampling temperature
    ///
    /// # Returns
    /// * `Ok((payload, meta))` - Raw JSON payload plus provider metadata
    /// * `Err(SetpointError::Llm)` - On any transport or protocol failure
    fn complete_json(
        &self,
        role: &str,
        system_prompt: &str,
        user_payload: &Value,
        temperature: f32,
    ) -> SetpointResult<(Value, CompletionMeta)>;

    /// Identifier reported in diagnostics.
    fn provider_id(&self) -> &str;
}

// ============================================================================
// PROVIDER REGISTRY
// ============================================================================

/// Registry for the delegated completion provider.
/// Providers must be explicitly registered - no auto-discovery. Populated
/// once at process start and read-only afterwards.
pub struct ProviderRegistry {
    completion: Option<Arc<dyn CompletionProvider>>,
}

impl ProviderRegistry {
    /// Create a new empty provider registry.
    pub fn new() -> Self {
        Self { completion: None }
    }

    /// Register a completion provider.
    /// Replaces any previously registered provider.
    pub fn register_completion(&mut self, provider: Box<dyn CompletionProvider>) {
        self.completion = Some(Arc::from(provider));
    }

    /// Get the registered completion provider.
    ///
    /// # Returns
    /// * `Ok(Arc<dyn CompletionProvider>)` - Handle to the provider
    /// * `Err(SetpointError::Llm(LlmError::ProviderNotConfigured))` - If none registered
    pub fn completion(&self) -> SetpointResult<Arc<dyn CompletionProvider>> {
        self.completion
            .clone()
            .ok_or(SetpointError::Llm(LlmError::ProviderNotConfigured))
    }

    /// Check if a completion provider is registered.
    pub fn has_completion(&self) -> bool {
        self.completion.is_some()
    }

    /// Clear the completion provider registration.
    pub fn clear_completion(&mut self) {
        self.completion = None;
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("completion", &self.completion.is_some())
            .finish()
    }
}

// ============================================================================
// BOUNDED RETRY HELPER
// ============================================================================

/// Run a delegated completion up to `attempts` times and parse the payload
/// into `T`. Transport failures and schema mismatches are treated uniformly;
/// after exhaustion the last failure reason is folded into a single
/// `LlmError::UpstreamUnavailable`, which is the only error this returns.
pub fn complete_validated<T: DeserializeOwned>(
    provider: &dyn CompletionProvider,
    role: &str,
    system_prompt: &str,
    user_payload: &Value,
    temperature: f32,
    attempts: u32,
) -> Result<(T, CompletionMeta), LlmError> {
    let mut last_reason = "no attempts made".to_string();

    for attempt in 1..=attempts.max(1) {
        match provider.complete_json(role, system_prompt, user_payload, temperature) {
            Ok((payload, meta)) => match serde_json::from_value::<T>(payload) {
                Ok(parsed) => return Ok((parsed, meta)),
                Err(err) => {
                    last_reason = format!("schema mismatch on attempt {}: {}", attempt, err);
                    tracing::debug!(role, attempt, %err, "delegated payload failed schema check");
                }
            },
            Err(err) => {
                last_reason = format!("attempt {} failed: {}", attempt, err);
                tracing::debug!(role, attempt, %err, "delegated completion failed");
            }
        }
    }

    Err(LlmError::UpstreamUnavailable {
        role: role.to_string(),
        reason: last_reason,
    })
}

// ============================================================================
// MOCK PROVIDER FOR TESTING
// ============================================================================

/// One scripted reply: a payload to return or a failure to raise.
type ScriptedReply = Result<Value, String>;

/// Mock completion provider for testing.
/// Replies are scripted per role and consumed in FIFO order; an unscripted
/// call fails, which exercises fallback paths deterministically.
pub struct MockCompletionProvider {
    model_id: String,
    scripts: Mutex<BTreeMap<String, VecDeque<ScriptedReply>>>,
    calls: RwLock<Vec<String>>,
}

impl MockCompletionProvider {
    pub fn new() -> Self {
        Self {
            model_id: "mock-json:v1".to_string(),
            scripts: Mutex::new(BTreeMap::new()),
            calls: RwLock::new(Vec::new()),
        }
    }

    /// Script a successful payload for a role.
    pub fn with_response(self, role: &str, payload: Value) -> Self {
        self.push(role, Ok(payload));
        self
    }

    /// Script a failure for a role.
    pub fn with_failure(self, role: &str, reason: &str) -> Self {
        self.push(role, Err(reason.to_string()));
        self
    }

    /// Roles called so far, in call order.
    pub fn call_log(&self) -> Vec<String> {
        self.calls.read().map(|log| log.clone()).unwrap_or_default()
    }

    fn push(&self, role: &str, reply: ScriptedReply) {
        if let Ok(mut scripts) = self.scripts.lock() {
            scripts.entry(role.to_string()).or_default().push_back(reply);
        }
    }
}

impl Default for MockCompletionProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionProvider for MockCompletionProvider {
    fn complete_json(
        &self,
        role: &str,
        _system_prompt: &str,
        _user_payload: &Value,
        _temperature: f32,
    ) -> SetpointResult<(Value, CompletionMeta)> {
        if let Ok(mut calls) = self.calls.write() {
            calls.push(role.to_string());
        }

        let reply = self
            .scripts
            .lock()
            .ok()
            .and_then(|mut scripts| scripts.get_mut(role).and_then(|queue| queue.pop_front()));

        match reply {
            Some(Ok(payload)) => {
                let meta = CompletionMeta::new("mock", self.model_id.clone())
                    .with_extra("role", role.to_string());
                Ok((payload, meta))
            }
            Some(Err(reason)) => Err(SetpointError::Llm(LlmError::UpstreamUnavailable {
                role: role.to_string(),
                reason,
            })),
            None => Err(SetpointError::Llm(LlmError::UpstreamUnavailable {
                role: role.to_string(),
                reason: "no scripted response".to_string(),
            })),
        }
    }

    fn provider_id(&self) -> &str {
        "mock"
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================


// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================
