//! The fixed registry of editor tasks.
//!
//! Every evaluation task asks the model for three parallel arrays whose field
//! names are prefixed with the task name (`simplify_context`,
//! `simplify_reasoning`, `simplify_suggestion`), so payloads from different
//! editors can never be confused with one another. The essay-writing task is
//! kept apart: it is a single call that returns one `final_answer` string.

pub mod prompts;

use serde_json::json;

use crate::provider::ResponseSchema;

/// Schema name sent with every evaluation request.
pub const EVALUATION_SCHEMA_NAME: &str = "evaluation_response";

/// One named evaluation lens applied to an essay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditorTask {
    pub name: &'static str,
    pub system_prompt: &'static str,
    pub instruction_prompt: &'static str,
    /// Whether the source text is sent along with the essay.
    pub requires_source: bool,
}

impl EditorTask {
    pub fn context_field(&self) -> String {
        format!("{}_context", self.name)
    }

    pub fn reasoning_field(&self) -> String {
        format!("{}_reasoning", self.name)
    }

    pub fn suggestion_field(&self) -> String {
        format!("{}_suggestion", self.name)
    }

    /// The three field names, in context/reasoning/suggestion order.
    pub fn fields(&self) -> [String; 3] {
        [
            self.context_field(),
            self.reasoning_field(),
            self.suggestion_field(),
        ]
    }

    /// Closed object schema: exactly the three string arrays, all required.
    pub fn response_schema(&self) -> ResponseSchema {
        let fields = self.fields();
        let string_array = json!({"type": "array", "items": {"type": "string"}});
        let properties: serde_json::Map<String, serde_json::Value> = fields
            .iter()
            .map(|f| (f.clone(), string_array.clone()))
            .collect();

        ResponseSchema {
            name: EVALUATION_SCHEMA_NAME.to_string(),
            schema: json!({
                "type": "object",
                "properties": properties,
                "required": fields,
                "additionalProperties": false,
            }),
        }
    }
}

/// The single-shot essay-writing task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationTask {
    pub name: &'static str,
    pub system_prompt: &'static str,
    pub answer_field: &'static str,
}

impl GenerationTask {
    pub fn response_schema(&self) -> ResponseSchema {
        ResponseSchema {
            name: "essay_response".to_string(),
            schema: json!({
                "type": "object",
                "properties": {self.answer_field: {"type": "string"}},
                "required": [self.answer_field],
                "additionalProperties": false,
            }),
        }
    }
}

pub const GENERATION_TASK: GenerationTask = GenerationTask {
    name: "rewrite",
    system_prompt: prompts::REWRITE_SYSTEM,
    answer_field: "final_answer",
};

/// Evaluation tasks in response order. Callers index batches by this order.
pub static EVALUATION_TASKS: [EditorTask; 5] = [
    EditorTask {
        name: "simplify",
        system_prompt: prompts::SIMPLIFY_SYSTEM,
        instruction_prompt: prompts::SIMPLIFY_TASK,
        requires_source: false,
    },
    EditorTask {
        name: "exemplify",
        system_prompt: prompts::EXEMPLIFY_SYSTEM,
        instruction_prompt: prompts::EXEMPLIFY_TASK,
        requires_source: false,
    },
    EditorTask {
        name: "factcheck",
        system_prompt: prompts::FACTCHECK_SYSTEM,
        instruction_prompt: prompts::FACTCHECK_TASK,
        requires_source: true,
    },
    EditorTask {
        name: "clarify",
        system_prompt: prompts::CLARIFY_SYSTEM,
        instruction_prompt: prompts::CLARIFY_TASK,
        requires_source: false,
    },
    EditorTask {
        name: "assert",
        system_prompt: prompts::ASSERT_SYSTEM,
        instruction_prompt: prompts::ASSERT_TASK,
        requires_source: false,
    },
];

pub fn evaluation_tasks() -> &'static [EditorTask] {
    &EVALUATION_TASKS
}

pub fn find_task(name: &str) -> Option<&'static EditorTask> {
    EVALUATION_TASKS.iter().find(|t| t.name == name)
}
