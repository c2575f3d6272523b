//! EthBool - 入力値を EVM の bool ワード（32 バイト）にエンコードする
//!
//! `false` と `null` は 0、それ以外（`"false"` という文字列や 0 を含む）は 1。

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::{Adapter, AdapterParams};
use crate::app::context::ExecutionContext;
use crate::domain::RunResult;

pub const EVM_FALSE: &str = "0x0000000000000000000000000000000000000000000000000000000000000000";
pub const EVM_TRUE: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EthBoolParams {}

impl AdapterParams for EthBoolParams {
    const TYPE: &'static str = "ethbool";
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EthBool;

/// EVM word for a JSON value's truthiness.
pub fn encode(value: &Value) -> &'static str {
    match value {
        Value::Null | Value::Bool(false) => EVM_FALSE,
        _ => EVM_TRUE,
    }
}

#[async_trait]
impl Adapter<EthBoolParams> for EthBool {
    async fn perform(
        &self,
        _params: EthBoolParams,
        input: &RunResult,
        _ctx: &ExecutionContext,
    ) -> RunResult {
        input.with_result(encode(input.result())).completed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::testing::manual_context;
    use crate::domain::{JobRunId, RunStatus};
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case::json_false(json!(false), EVM_FALSE)]
    #[case::json_null(json!(null), EVM_FALSE)]
    #[case::json_true(json!(true), EVM_TRUE)]
    #[case::string_false(json!("false"), EVM_TRUE)]
    #[case::zero(json!(0), EVM_TRUE)]
    #[case::empty_string(json!(""), EVM_TRUE)]
    #[case::object(json!({"a": 1}), EVM_TRUE)]
    fn truthiness(#[case] value: Value, #[case] expected: &str) {
        assert_eq!(encode(&value), expected);
    }

    #[test]
    fn words_are_32_bytes_of_lowercase_hex() {
        for word in [EVM_FALSE, EVM_TRUE] {
            assert_eq!(word.len(), 66);
            let digits = word.strip_prefix("0x").unwrap();
            assert!(digits.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')));
        }
        assert!(EVM_TRUE.ends_with('1'));
    }

    #[tokio::test]
    async fn missing_value_encodes_false_and_completes() {
        let id = JobRunId::random();
        let (ctx, ..) = manual_context(id);
        let input = RunResult::new(id, json!({"other": true}));

        let out = EthBool.perform(EthBoolParams::default(), &input, &ctx).await;

        assert_eq!(out.status, RunStatus::Completed);
        assert_eq!(out.result(), &json!(EVM_FALSE));
        assert_eq!(out.get("other"), Some(&json!(true)));
    }
}
