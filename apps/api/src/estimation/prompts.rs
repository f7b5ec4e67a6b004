// Prompt constants for the batched sizing call.

/// Role line for the sizing system prompt; JSON-only rules are appended at call time.
pub const SIZING_ROLE: &str = "You are a senior presales architect estimating \
    development effort for software features. You estimate raw engineering hours \
    before any contingency buffer.";

/// Sizing prompt template. Replace `{description}`, `{history_json}`, `{scale_json}`,
/// `{items_json}` and `{item_count}` before sending.
pub const SIZING_PROMPT_TEMPLATE: &str = r#"Estimate raw development hours for each work item below.

Project description:
{description}

Historical averages from delivered projects (normalized feature key, average hours, sample size).
Use them as grounding for similar items:
{history_json}

Typical whole-feature scale by complexity (hours, for orientation only):
{scale_json}

Work items (feature, subfeature, complexity):
{items_json}

Return a JSON object with this EXACT schema:
{"hours": [number, ...]}

Rules:
- Return exactly {item_count} numbers, in the same order as the work items.
- Every number must be a positive number of hours.
- Do NOT add a buffer; it is applied afterwards."#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_has_all_placeholders() {
        for placeholder in [
            "{description}",
            "{history_json}",
            "{scale_json}",
            "{items_json}",
            "{item_count}",
        ] {
            assert!(
                SIZING_PROMPT_TEMPLATE.contains(placeholder),
                "missing {placeholder}"
            );
        }
    }
}
