// Shared prompt fragments. Each stage that calls the LLM keeps its own prompts.rs alongside it.

/// Appended to every system prompt whose answer is decoded as JSON.
pub const JSON_ONLY_INSTRUCTION: &str = "You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON value. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Builds a system prompt from a role line and the JSON-only instruction.
pub fn json_system(role: &str) -> String {
    format!("{role} {JSON_ONLY_INSTRUCTION}")
}
