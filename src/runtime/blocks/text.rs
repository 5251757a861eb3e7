//! Text blocks: whitespace/case transforms and find/replace rules

use crate::runtime::executor::{BlockContext, BlockExecutor, BlockOutcome};
use crate::runtime::variables::VariableStore;
use crate::workflow::types::{block_types, Block};
use anyhow::Result;
use async_trait::async_trait;
use regex::RegexBuilder;
use serde::Deserialize;

use super::{invalid_config, truncate};

const DEFAULT_RESULT_VARIABLE: &str = "result";
const REGEX_SIZE_LIMIT: usize = 1 << 20;
const PREVIEW_LIMIT: usize = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum TextOperation {
    Trim,
    Lower,
    Upper,
}

/// Where a text block reads its input from: a non-empty variable value wins
/// over the literal
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TextInput {
    #[serde(default)]
    input_variable: Option<String>,
    #[serde(default)]
    input_value: Option<String>,
    #[serde(default)]
    result_variable: Option<String>,
}

impl TextInput {
    fn read(&self, variables: &VariableStore) -> String {
        let from_variable = match self.input_variable.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => variables.get_or_empty(name),
            _ => String::new(),
        };
        if from_variable.is_empty() {
            variables.resolve(self.input_value.as_deref().unwrap_or_default())
        } else {
            from_variable
        }
    }

    fn target(&self) -> String {
        self.result_variable
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_RESULT_VARIABLE)
            .to_string()
    }
}

#[derive(Debug, Deserialize)]
struct TransformConfig {
    #[serde(flatten)]
    input: TextInput,
    operation: TextOperation,
}

/// Expected config: { "inputVariable": "name", "operation": "Upper", "resultVariable": "shout" }
#[derive(Debug, Default)]
pub struct TextTransformExecutor;

pub fn transform(operation: TextOperation, input: &str) -> String {
    match operation {
        TextOperation::Trim => input.trim().to_string(),
        TextOperation::Lower => input.to_lowercase(),
        TextOperation::Upper => input.to_uppercase(),
    }
}

#[async_trait]
impl BlockExecutor for TextTransformExecutor {
    fn name(&self) -> &'static str {
        "TextTransform"
    }

    fn can_execute(&self, block: &Block) -> bool {
        block.is_type(block_types::TEXT_TRANSFORM)
    }

    async fn execute(&self, block: &Block, ctx: &mut BlockContext<'_>) -> BlockOutcome {
        let config: TransformConfig = match block.parse_config() {
            Ok(config) => config,
            Err(e) => return invalid_config(block, e),
        };

        let input = config.input.read(ctx.variables);
        let output = transform(config.operation, &input);
        let target = config.input.target();
        ctx.variables.set(&target, output.clone());

        BlockOutcome::success(format!(
            "TextTransform {}: {:?} -> {} = '{}'",
            block.name,
            config.operation,
            target,
            truncate(&output, PREVIEW_LIMIT)
        ))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceRule {
    pub find: String,
    #[serde(default)]
    pub replace: String,
    #[serde(default)]
    pub use_regex: bool,
    #[serde(default)]
    pub ignore_case: bool,
}

#[derive(Debug, Deserialize)]
struct ReplaceConfig {
    #[serde(flatten)]
    input: TextInput,
    #[serde(default)]
    rules: Vec<ReplaceRule>,
}

/// Expected config:
/// { "inputVariable": "text", "rules": [{"find": "\\d+", "replace": "#", "useRegex": true}] }
#[derive(Debug, Default)]
pub struct TextReplaceExecutor;

/// Apply rules in order, each to the output of the previous one.
/// Rules with an empty `find` are skipped.
pub fn apply_rules(input: &str, rules: &[ReplaceRule]) -> Result<String> {
    let mut text = input.to_string();
    for rule in rules.iter().filter(|r| !r.find.is_empty()) {
        if !rule.use_regex && !rule.ignore_case {
            text = text.replace(&rule.find, &rule.replace);
            continue;
        }

        let pattern = if rule.use_regex {
            rule.find.clone()
        } else {
            regex::escape(&rule.find)
        };
        let regex = RegexBuilder::new(&pattern)
            .case_insensitive(rule.ignore_case)
            .size_limit(REGEX_SIZE_LIMIT)
            .build()
            .map_err(|e| anyhow::anyhow!("invalid pattern '{}': {}", rule.find, e))?;

        text = if rule.use_regex {
            regex.replace_all(&text, rule.replace.as_str()).into_owned()
        } else {
            regex
                .replace_all(&text, regex::NoExpand(&rule.replace))
                .into_owned()
        };
    }
    Ok(text)
}

#[async_trait]
impl BlockExecutor for TextReplaceExecutor {
    fn name(&self) -> &'static str {
        "TextReplace"
    }

    fn can_execute(&self, block: &Block) -> bool {
        block.is_type(block_types::TEXT_REPLACE)
    }

    async fn execute(&self, block: &Block, ctx: &mut BlockContext<'_>) -> BlockOutcome {
        let config: ReplaceConfig = match block.parse_config() {
            Ok(config) => config,
            Err(e) => return invalid_config(block, e),
        };

        let input = config.input.read(ctx.variables);
        let output = match apply_rules(&input, &config.rules) {
            Ok(output) => output,
            Err(e) => return BlockOutcome::error(format!("TextReplace {}: {}", block.name, e)),
        };
        let target = config.input.target();
        ctx.variables.set(&target, output.clone());

        BlockOutcome::success(format!(
            "TextReplace {}: {} rule(s) -> {} = '{}'",
            block.name,
            config.rules.len(),
            target,
            truncate(&output, PREVIEW_LIMIT)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::blocks::test_block;

    fn rule(find: &str, replace: &str, use_regex: bool, ignore_case: bool) -> ReplaceRule {
        ReplaceRule {
            find: find.to_string(),
            replace: replace.to_string(),
            use_regex,
            ignore_case,
        }
    }

    #[test]
    fn transforms() {
        assert_eq!(transform(TextOperation::Trim, "  hi  "), "hi");
        assert_eq!(transform(TextOperation::Lower, "HeLLo"), "hello");
        assert_eq!(transform(TextOperation::Upper, "straße"), "STRASSE");
    }

    #[test]
    fn rules_apply_in_sequence() {
        let rules = vec![
            rule("cat", "dog", false, false),
            rule("DOG", "wolf", false, true),
            rule(r"\d+", "#", true, false),
            rule("", "ignored", false, false),
        ];
        assert_eq!(apply_rules("cat 42 Cat", &rules).unwrap(), "wolf # Cat");
    }

    #[test]
    fn literal_ignore_case_does_not_interpret_pattern() {
        let rules = vec![rule("a.b", "$1", false, true)];
        assert_eq!(apply_rules("A.B axb", &rules).unwrap(), "$1 axb");
    }

    #[test]
    fn regex_replacement_supports_groups() {
        let rules = vec![rule(r"(\w+)@(\w+)", "$2 at $1", true, false)];
        assert_eq!(apply_rules("ada@home", &rules).unwrap(), "home at ada");
    }

    #[test]
    fn invalid_regex_is_an_error() {
        assert!(apply_rules("x", &[rule("(", "", true, false)]).is_err());
    }

    #[tokio::test]
    async fn transform_block_writes_default_result() {
        let block = test_block(block_types::TEXT_TRANSFORM, r#"{"inputValue":"$name","operation":"Upper"}"#);
        let mut variables = VariableStore::new();
        variables.set("name", "ada");

        let mut ctx = BlockContext { variables: &mut variables, skip_waits: false };
        let outcome = TextTransformExecutor.execute(&block, &mut ctx).await;

        assert!(!outcome.is_error);
        assert_eq!(variables.get("result"), Some("ADA"));
    }

    #[tokio::test]
    async fn empty_variable_falls_back_to_literal() {
        let block = test_block(
            block_types::TEXT_TRANSFORM,
            r#"{"inputVariable":"blank","inputValue":"  padded  ","operation":"Trim","resultVariable":"out"}"#,
        );
        let mut variables = VariableStore::new();
        variables.set("blank", "");

        let mut ctx = BlockContext { variables: &mut variables, skip_waits: false };
        TextTransformExecutor.execute(&block, &mut ctx).await;

        assert_eq!(variables.get("out"), Some("padded"));
    }

    #[tokio::test]
    async fn replace_block_reads_input_variable() {
        let block = test_block(
            block_types::TEXT_REPLACE,
            r#"{"inputVariable":"text","resultVariable":"clean",
                "rules":[{"find":"\\s+","replace":" ","useRegex":true}]}"#,
        );
        let mut variables = VariableStore::new();
        variables.set("text", "a   b\t c");

        let mut ctx = BlockContext { variables: &mut variables, skip_waits: false };
        let outcome = TextReplaceExecutor.execute(&block, &mut ctx).await;

        assert!(!outcome.is_error, "{}", outcome.description);
        assert_eq!(variables.get("clean"), Some("a b c"));
    }

    #[tokio::test]
    async fn replace_block_with_bad_pattern_routes_to_error() {
        let block = test_block(
            block_types::TEXT_REPLACE,
            r#"{"inputValue":"x","rules":[{"find":"[","useRegex":true}]}"#,
        );
        let mut variables = VariableStore::new();

        let mut ctx = BlockContext { variables: &mut variables, skip_waits: false };
        assert!(TextReplaceExecutor.execute(&block, &mut ctx).await.is_error);
        assert!(!variables.contains("result"));
    }
}
