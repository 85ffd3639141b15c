use serde_json::Value;

use samarth_pipeline::{Metadata, StageError};

use super::{ParsedQuery, encode};
use crate::parser::parse_question;

/// `{question}` → [`ParsedQuery`]
pub fn process(payload: &Value, _metadata: &Metadata) -> Result<Value, StageError> {
    let question = payload
        .get("question")
        .and_then(Value::as_str)
        .ok_or_else(|| StageError::InvalidInput("payload has no 'question' string".to_string()))?;
    if question.trim().is_empty() {
        return Err(StageError::InvalidInput("question is empty".to_string()));
    }

    let query = parse_question(question);
    tracing::debug!(intent = query.name(), "question parsed");

    encode(&ParsedQuery {
        question: question.to_string(),
        query,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_stage_output() {
        let out = process(
            &json!({"question": "Compare rainfall in Kerala and Punjab over 3 years"}),
            &Metadata::new(),
        )
        .unwrap();

        assert_eq!(out["question"], "Compare rainfall in Kerala and Punjab over 3 years");
        assert_eq!(out["query"]["intent"], "compare_rainfall_and_crops");
        assert_eq!(out["query"]["params"]["state_b"], "Punjab");
    }

    #[test]
    fn test_parse_stage_rejects_missing_question() {
        let err = process(&json!({"text": "hi"}), &Metadata::new()).unwrap_err();
        assert_eq!(err.kind(), "invalid_input");

        let err = process(&json!({"question": "   "}), &Metadata::new()).unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
    }
}
