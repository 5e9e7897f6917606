// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Prompt builders for the agent protocol
//!
//! Every instruction pins the model to the single-JSON-object step format
//! and spells out the finish rule. Tool lists are rendered from the live
//! registry so the prompts never drift from what is actually dispatchable.

use crate::llm::provider::ToolDefinition;

use super::types::Scratchpad;

/// Render registered tools as a bullet list for an instruction block
pub fn render_tool_list(definitions: &[ToolDefinition]) -> String {
    definitions
        .iter()
        .map(|d| format!("- `{}`: {}", d.name, d.description))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Instruction for the classification call.
///
/// One call both routes the goal and, on the simple path, produces the
/// first step so the ReAct loop starts without an extra round-trip.
pub fn master_instruction(definitions: &[ToolDefinition]) -> String {
    format!(
        r#"You are the routing stage of an autonomous command-line agent. Analyze the user's objective and decide which execution path fits it.

A **simple task** is anything achievable with a short sequence of tool calls against the current machine: answering a question, inspecting files, running a command, searching the web.

A **project** is a request to build something new that needs its own directory and multiple files: an application, a website, a script package.

Your entire output MUST be a single valid JSON object. No prose before or after it.

For a simple task, respond with the classification AND the first step toward the objective:
```json
{{
    "task_type": "simple_task",
    "first_step": {{
        "thought": "The user wants to know what is in this directory, so I will list it.",
        "action": {{
            "tool_name": "list_directory",
            "tool_args": {{"path": "."}}
        }}
    }}
}}
```

For a project, respond with the classification AND the complete development plan:
```json
{{
    "task_type": "project_plan",
    "plan": {{
        "project_name": "simple_flask_app",
        "reasoning": "A minimal Flask layout fits a small web application.",
        "structure": {{
            "simple_flask_app": {{
                "app.py": null,
                "templates": {{"index.html": null}}
            }}
        }},
        "files": [
            {{"path": "simple_flask_app/app.py", "description": "Main application file with the route definitions."}},
            {{"path": "simple_flask_app/templates/index.html", "description": "HTML template for the landing page."}}
        ]
    }}
}}
```

Plan rules: `project_name` is short, lowercase, and filesystem-safe. `structure` is a nested object using `{{}}` for folders and `null` for files. `files` lists every file to create with a one-sentence description of its purpose.

AVAILABLE TOOLS:
{tools}
"#,
        tools = render_tool_list(definitions)
    )
}

/// System instruction for the ReAct loop
pub fn react_instruction(definitions: &[ToolDefinition]) -> String {
    format!(
        r#"You are a ReAct agent. You communicate exclusively through a JSON step format; you never answer in plain prose.

RULES:
1. Your entire output MUST be a single valid JSON object with exactly two keys: "thought" and "action".
2. Never write conversational text outside the JSON. Your job each turn is to pick the next tool.
3. When you have enough information to answer, your final action MUST call the `finish` tool; its `answer` argument is the only place the user sees your response.

AVAILABLE TOOLS:
{tools}

Intermediate step example:
```json
{{
    "thought": "I need current information, so I will search the web.",
    "action": {{
        "tool_name": "web_search",
        "tool_args": {{"query": "rust 1.80 release notes"}}
    }}
}}
```

Final step example:
```json
{{
    "thought": "The search results answer the question, so I will finish.",
    "action": {{
        "tool_name": "finish",
        "tool_args": {{"answer": "Rust 1.80 stabilized LazyCell and LazyLock."}}
    }}
}}
```

The user's objective is your first message. Follow the rules exactly."#,
        tools = render_tool_list(definitions)
    )
}

/// System instruction for the plan executor loop
pub fn executor_instruction(definitions: &[ToolDefinition]) -> String {
    format!(
        r#"You are the executor of a development plan. The plan arrives as a PROJECT_PLAN JSON block in your first message.

RULES:
1. Implement the plan. In each turn take the single most logical next step.
2. Your entire output MUST be a single valid JSON object with exactly two keys: "thought" and "action".
3. Review previous observations carefully before acting; never recreate a file that already succeeded.
4. When every file in the plan exists, your final action MUST call the `finish` tool. Its `answer` argument MUST summarize the work and give step-by-step instructions for installing dependencies and running the project.

AVAILABLE TOOLS:
{tools}

Example of a finishing step:
```json
{{
    "thought": "All planned files are in place, so I will hand the project over.",
    "action": {{
        "tool_name": "finish",
        "tool_args": {{"answer": "Created the flask_site project.\n\nTo run it:\n1. cd flask_site\n2. pip install -r requirements.txt\n3. python app.py"}}
    }}
}}
```

Begin with the first file in the plan."#,
        tools = render_tool_list(definitions)
    )
}

/// The immutable plan rendered as a message block
pub fn plan_block(plan_json: &str) -> String {
    format!("PROJECT_PLAN:\n```json\n{}\n```", plan_json)
}

/// First executor message, carrying the immutable plan
pub fn executor_kickoff(plan_json: &str) -> String {
    format!(
        "{}\n\nBegin executing the plan. What is your first thought and action?",
        plan_block(plan_json)
    )
}

/// Feed a tool observation back and ask for the next step
pub fn observation_prompt(observation: &str, goal: &str) -> String {
    format!(
        "This was the result of your last action:\n\n{}\n\nBased on this, what is your next thought and action to achieve the original objective: '{}'?",
        observation, goal
    )
}

/// Re-seed a rebuilt session with the progress made so far.
///
/// `context` restates the objective (ReAct) or the PROJECT_PLAN block
/// (executor) so the fresh session loses nothing but the dead credential.
pub fn resume_prompt(context: &str, scratchpad: &Scratchpad) -> String {
    let mut prompt = String::from(
        "The session was restarted; your earlier messages are gone but your progress is not.\n\n",
    );
    if scratchpad.is_empty() {
        prompt.push_str("No steps have completed yet.\n\n");
    } else {
        prompt.push_str("Completed steps so far:\n\n");
        prompt.push_str(&scratchpad.render());
        prompt.push('\n');
    }
    prompt.push_str(context);
    prompt.push_str("\n\nContinue from the current state. What is your next thought and action?");
    prompt
}

/// Objective restatement used as resume context on the ReAct path
pub fn objective_context(goal: &str) -> String {
    format!("Original objective: '{}'", goal)
}
