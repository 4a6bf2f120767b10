use tracing::warn;

use crate::catalog::EditorTask;
use crate::error::PayloadError;

use super::Edits;

/// Read a provider payload against the task's closed schema.
///
/// Exactly the three namespaced arrays must be present; anything missing,
/// extra, or of the wrong type is rejected. Arrays of unequal length are
/// truncated to the shortest one, so every index still describes one complete
/// flagged spot.
pub fn parse_edits(task: &EditorTask, payload: &serde_json::Value) -> Result<Edits, PayloadError> {
    let object = payload.as_object().ok_or(PayloadError::NotAnObject)?;
    let fields = task.fields();

    if let Some(extra) = object.keys().find(|k| !fields.contains(*k)) {
        return Err(PayloadError::UnexpectedField(extra.clone()));
    }

    let [context, reasoning, suggestion] = fields.map(|field| string_array(object, &field));
    let (edits, truncated) = reconcile(context?, reasoning?, suggestion?);

    if let Some((c, r, s)) = truncated {
        warn!(
            task = task.name,
            context = c,
            reasoning = r,
            suggestion = s,
            kept = edits.len(),
            "array lengths differ, truncating to shortest"
        );
    }

    Ok(edits)
}

fn string_array(
    object: &serde_json::Map<String, serde_json::Value>,
    field: &str,
) -> Result<Vec<String>, PayloadError> {
    let items = object
        .get(field)
        .ok_or_else(|| PayloadError::MissingField(field.to_string()))?
        .as_array()
        .ok_or_else(|| PayloadError::NotStringArray(field.to_string()))?;

    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| PayloadError::NotStringArray(field.to_string()))
        })
        .collect()
}

/// Cut all three arrays to a common length. Returns the original lengths
/// when anything had to be dropped.
fn reconcile(
    mut context: Vec<String>,
    mut reasoning: Vec<String>,
    mut suggestion: Vec<String>,
) -> (Edits, Option<(usize, usize, usize)>) {
    let lengths = (context.len(), reasoning.len(), suggestion.len());
    let shortest = lengths.0.min(lengths.1).min(lengths.2);
    let truncated = (lengths.0 != shortest || lengths.1 != shortest || lengths.2 != shortest)
        .then_some(lengths);

    context.truncate(shortest);
    reasoning.truncate(shortest);
    suggestion.truncate(shortest);

    (
        Edits {
            context,
            reasoning,
            suggestion,
        },
        truncated,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::find_task;
    use serde_json::json;

    fn simplify() -> &'static EditorTask {
        find_task("simplify").unwrap()
    }

    #[test]
    fn parses_matching_arrays() {
        let payload = json!({
            "simplify_context": ["utilize", "paradigm"],
            "simplify_reasoning": ["jargon", "abstract"],
            "simplify_suggestion": ["use", "model"],
        });
        let edits = parse_edits(simplify(), &payload).unwrap();
        assert_eq!(edits.context, ["utilize", "paradigm"]);
        assert_eq!(edits.reasoning, ["jargon", "abstract"]);
        assert_eq!(edits.suggestion, ["use", "model"]);
    }

    #[test]
    fn reasoning_is_read_from_its_own_field() {
        let payload = json!({
            "simplify_context": ["ctx"],
            "simplify_reasoning": ["why"],
            "simplify_suggestion": ["fix"],
        });
        let edits = parse_edits(simplify(), &payload).unwrap();
        assert_eq!(edits.reasoning, ["why"]);
    }

    #[test]
    fn length_mismatch_truncates_to_shortest() {
        let payload = json!({
            "simplify_context": ["a"],
            "simplify_reasoning": ["b", "c"],
            "simplify_suggestion": ["d"],
        });
        let edits = parse_edits(simplify(), &payload).unwrap();
        assert_eq!(edits.context, ["a"]);
        assert_eq!(edits.reasoning, ["b"]);
        assert_eq!(edits.suggestion, ["d"]);
    }

    #[test]
    fn one_empty_array_empties_all() {
        let payload = json!({
            "simplify_context": ["a", "b"],
            "simplify_reasoning": [],
            "simplify_suggestion": ["c", "d"],
        });
        let edits = parse_edits(simplify(), &payload).unwrap();
        assert!(edits.is_empty());
    }

    #[test]
    fn empty_arrays_are_a_valid_result() {
        let payload = json!({
            "simplify_context": [],
            "simplify_reasoning": [],
            "simplify_suggestion": [],
        });
        assert!(parse_edits(simplify(), &payload).unwrap().is_empty());
    }

    #[test]
    fn missing_field_rejected() {
        let payload = json!({
            "simplify_context": ["a"],
            "simplify_suggestion": ["d"],
        });
        assert_eq!(
            parse_edits(simplify(), &payload).unwrap_err(),
            PayloadError::MissingField("simplify_reasoning".to_string())
        );
    }

    #[test]
    fn extra_field_rejected() {
        let payload = json!({
            "simplify_context": [],
            "simplify_reasoning": [],
            "simplify_suggestion": [],
            "simplify_score": 3,
        });
        assert_eq!(
            parse_edits(simplify(), &payload).unwrap_err(),
            PayloadError::UnexpectedField("simplify_score".to_string())
        );
    }

    #[test]
    fn fields_of_another_task_rejected() {
        let payload = json!({
            "clarify_context": [],
            "clarify_reasoning": [],
            "clarify_suggestion": [],
        });
        assert!(matches!(
            parse_edits(simplify(), &payload),
            Err(PayloadError::UnexpectedField(_))
        ));
    }

    #[test]
    fn non_string_items_rejected() {
        let payload = json!({
            "simplify_context": ["a"],
            "simplify_reasoning": [42],
            "simplify_suggestion": ["d"],
        });
        assert_eq!(
            parse_edits(simplify(), &payload).unwrap_err(),
            PayloadError::NotStringArray("simplify_reasoning".to_string())
        );
    }

    #[test]
    fn non_object_rejected() {
        assert_eq!(
            parse_edits(simplify(), &json!(["a"])).unwrap_err(),
            PayloadError::NotAnObject
        );
    }
}
