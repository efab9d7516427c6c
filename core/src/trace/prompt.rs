use crate::config::TraceConfig;
use crate::transform::Language;

pub const SYSTEM_PROMPT: &str = "You are a precise program-execution simulator. \
Given a code snippet, predict step by step what happens when it runs, without \
running it. Report every side effect (file reads and writes, network access, \
process creation, environment access) exactly as the code would perform it, \
including effects that only happen under particular conditions that hold at \
run time. Answer with a single JSON object and nothing else.";

pub fn build_user_prompt(code: &str, language: Language, cfg: &TraceConfig) -> String {
    let mut fields = vec![
        "\"line\": <source line number>",
        "\"operation\": <one of assignment, function_call, return, loop, conditional, or a short label>",
    ];
    if cfg.include_variables {
        fields.push("\"variables\": {<name>: <value after this step>}");
    }
    if cfg.include_side_effects {
        fields.push("\"side_effects\": [<description of each external effect>]");
    }

    format!(
        "Predict the execution trace of the following {lang} code.\n\n\
         ```\n{code}\n```\n\n\
         Respond with JSON of the form:\n\
         {{\n  \"steps\": [{{ {fields} }}],\n  \
         \"final_state\": {{ \"variables\": {{}}, \"outputs\": [<each line written to stdout>], \"errors\": [<each error raised>] }},\n  \
         \"confidence\": <number between 0 and 1>\n}}\n\n\
         List at most {max_steps} steps.",
        lang = language.as_str(),
        code = code,
        fields = fields.join(", "),
        max_steps = cfg.max_steps,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embeds_code_and_limits() {
        let cfg = TraceConfig {
            max_steps: 7,
            include_variables: false,
            ..Default::default()
        };
        let p = build_user_prompt("echo hi", Language::Shell, &cfg);
        assert!(p.contains("```\necho hi\n```"));
        assert!(p.contains("at most 7 steps"));
        assert!(p.contains("side_effects"));
        assert!(!p.contains("\"variables\": {<name>"));
    }
}
