// ABOUTME: Prompt construction for assistant calls
// ABOUTME: Renders project context as text and wraps it in per-call instructions

use std::fmt::Write;

use chrono::{DateTime, Utc};
use droneguide_core::ProjectContext;

/// Describe a project so the model can pick up where the user left off
pub fn build_context(context: &ProjectContext, now: DateTime<Utc>) -> String {
    let mut text = String::new();

    let _ = writeln!(
        text,
        "This conversation continues the drone project \"{}\" (ID: {}).",
        context.project_name, context.project_id
    );

    if let Some(drone_type) = context.drone_type.as_deref().filter(|t| !t.trim().is_empty()) {
        let _ = writeln!(text, "The user is building a {} drone.", drone_type);
    }

    if context.components.is_empty() {
        text.push_str("No components have been identified yet.\n");
    } else {
        text.push_str("Components identified so far:\n");
        for component in &context.components {
            match component.purpose.as_deref().filter(|p| !p.trim().is_empty()) {
                Some(purpose) => {
                    let _ = writeln!(text, "- {} ({})", component.name, purpose);
                }
                None => {
                    let _ = writeln!(text, "- {}", component.name);
                }
            }
        }
    }

    if !context.completed_steps.is_empty() {
        text.push_str("Completed steps:\n");
        for step in &context.completed_steps {
            let _ = writeln!(text, "- Step {}: {}", step.step_number, step.title);
        }
    }

    let _ = writeln!(
        text,
        "The user is currently on step {} of the assembly.",
        context.current_step
    );
    let _ = writeln!(
        text,
        "Last interaction was {} ago.",
        describe_elapsed(now - context.last_interaction)
    );

    text
}

fn describe_elapsed(elapsed: chrono::Duration) -> String {
    let elapsed = elapsed.max(chrono::Duration::zero());
    if elapsed.num_days() > 0 {
        format!("{} day(s)", elapsed.num_days())
    } else if elapsed.num_hours() > 0 {
        format!("{} hour(s)", elapsed.num_hours())
    } else {
        format!("{} minute(s)", elapsed.num_minutes())
    }
}

pub fn validation_prompt(step: u32, context: &str) -> String {
    format!(
        r#"You are a drone assembly assistant reviewing a photo of a drone build at step {step}.

{context}
Reply with a single JSON object and no markdown:
{{
  "status": "success|warning|error",
  "feedback": "overall assessment of the current state",
  "warnings": ["specific problems or risks"],
  "nextSteps": ["ordered actions to take next"],
  "misalignments": ["parts that need adjusting"],
  "progress": "percent of this step that is done",
  "canProceed": true or false,
  "identifiedComponents": [{{"name": "component name", "purpose": "what it does"}}]
}}

Always include "identifiedComponents" listing every component visible in the photo, even ones
already known from earlier context. Use an empty array if nothing is visible.

Pay attention to placement and alignment, secure connections, wire routing, safety hazards and
common beginner mistakes. Keep the feedback specific and actionable."#
    )
}

pub fn voice_prompt(query: &str, step: u32, context: &str) -> String {
    format!(
        r#"You are a drone assembly assistant. The user asked: "{query}".
A photo of their build at step {step} is attached.

1. Answer the question directly.
2. List any drone components you can see in "identifiedComponents".
3. Keep the tone friendly and brief, with a little humour, but stay factual.
4. If the user asks which components have been found so far, answer from "identifiedComponents".
5. If the user asks for a picture of a drone, say image generation is still in beta and playfully
   promise to try.

Reply with a single JSON object and no markdown:
{{
  "status": "success|warning|error",
  "answer": "short direct answer",
  "details": "supporting context",
  "recommendations": ["optional suggestions"],
  "warnings": ["optional cautions"],
  "identifiedComponents": [{{"name": "component name", "purpose": "what it does", "condition": "visible condition"}}]
}}

{context}"#
    )
}

pub fn instructions_prompt(step: u32, context: &str) -> String {
    format!(
        r#"Write detailed drone assembly instructions for step {step}.

{context}
Reply with a single JSON object:
{{
  "stepTitle": "short title for the step",
  "overview": "what this step accomplishes",
  "tools": ["tools needed"],
  "components": ["components needed"],
  "steps": ["numbered, detailed actions"],
  "safetyNotes": ["safety considerations"],
  "tips": ["tips and common mistakes to avoid"]
}}

Write for a beginner: clear, concrete and thorough."#
    )
}

pub fn identify_parts_prompt(context: &str) -> String {
    format!(
        r#"Identify the drone components visible in this photo.

{context}
Reply with a single JSON object:
{{
  "identifiedParts": [
    {{"name": "component name", "purpose": "its function", "condition": "visible condition", "notes": "anything notable"}}
  ],
  "missingComponents": ["parts you would expect but cannot see"],
  "recommendations": ["assembly advice"],
  "concerns": ["quality or compatibility concerns"]
}}

Be technically precise but explain in beginner-friendly terms."#
    )
}

pub fn welcome_prompt(drone_type: Option<&str>) -> String {
    let target = drone_type
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or("drone");
    format!(
        "You are a friendly drone assembly assistant. Write a short welcome for a new user who \
         wants to build a {target}. Introduce yourself, explain how you can help during assembly, \
         and suggest a sensible first step. Keep it conversational and under 100 words."
    )
}
