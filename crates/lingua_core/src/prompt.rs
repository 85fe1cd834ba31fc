//! crates/lingua_core/src/prompt.rs
//!
//! Pure prompt construction. Every message list sent to the chat-completion
//! port is built here, so wording, memory-window size, and role mapping live
//! in one place.

use crate::domain::Exercise;
use crate::domain::Turn;
use crate::ports::ChatMessage;

/// Number of recent turns included as conversational context. Older turns
/// are silently dropped from the prompt but remain in permanent storage.
pub const MEMORY_WINDOW: usize = 10;

const WORKSHEET_SYSTEM_PROMPT: &str = r#"You are an expert language teacher and curriculum designer.
Generate a structured worksheet as a SINGLE JSON object.

The JSON MUST contain exactly these keys:
- scenario_summary (string): 2-3 sentence overview of the scenario
- vocabulary (array of objects with word, translation, example_sentence)
- grammar_focus (string): the primary grammar topic covered (MUST match the requested verb tense/grammar if provided)
- explanations (string): clear, beginner-friendly grammar explanation focusing on the specified tense/grammar topic
- exercises (array of objects with type, question, answer, hint)
  type must be one of: fill_blank, conjugation, sentence_building, translation
- roleplay_prompts (array of strings): 3-5 conversation starters for practice

IMPORTANT: If a specific verb tense or grammar topic is requested, ALL exercises MUST focus on that tense.
The explanations MUST thoroughly cover the requested grammar topic with conjugation tables if applicable.
Include 8-12 vocabulary items and 6-10 exercises.
Return ONLY valid JSON. No markdown, no code fences."#;

const GRADING_SYSTEM_PROMPT: &str = r#"You are a language-learning exercise evaluator.
Given a correct answer and a user's attempt, respond with a JSON object:
{
  "is_correct": true/false,
  "score": 0.0 to 1.0,
  "feedback": "brief explanation of what was right/wrong"
}
Be encouraging. If almost correct, give partial credit.
Ignore case and punctuation differences when evaluating.
Accept equivalent answers (e.g., synonyms, different valid conjugations).
Return ONLY valid JSON."#;

/// Maps an ISO language code to its display name. Unknown codes pass
/// through verbatim.
pub fn language_display_name(code: &str) -> &str {
    match code {
        "en" => "English",
        "fr" => "French",
        "es" => "Spanish",
        other => other,
    }
}

fn tutor_system_prompt(target_language: &str, scenario_context: Option<&str>) -> String {
    let lang_name = language_display_name(target_language);
    let mut base = format!(
        "You are a friendly language tutor having a natural conversation in {lang_name}. \
         Stay in {lang_name} at all times. Keep responses to 2-4 sentences. \
         When the user makes grammar or verb-tense mistakes, gently provide the corrected \
         phrasing in parentheses - but do not break conversational immersion. \
         Ask follow-up questions to keep the dialogue flowing."
    );
    if let Some(scenario) = scenario_context {
        base.push_str("\n\nConversation scenario: ");
        base.push_str(scenario);
    }
    base
}

/// Builds the full message list for one tutoring turn: the system prompt,
/// at most the last [`MEMORY_WINDOW`] prior turns mapped role-for-role, and
/// the new user text as the final message.
pub fn tutor_messages(
    target_language: &str,
    scenario_context: Option<&str>,
    recent_turns: &[Turn],
    user_text: &str,
) -> Vec<ChatMessage> {
    let window_start = recent_turns.len().saturating_sub(MEMORY_WINDOW);

    let mut messages =
        vec![ChatMessage::system(tutor_system_prompt(target_language, scenario_context))];
    for turn in &recent_turns[window_start..] {
        messages.push(ChatMessage { role: turn.role.into(), content: turn.text.clone() });
    }
    messages.push(ChatMessage::user(user_text));
    messages
}

/// Builds the generation prompt for a structured worksheet document.
pub fn worksheet_messages(
    scenario: &str,
    target_language: &str,
    grammar_focus: Option<&str>,
    difficulty: &str,
) -> Vec<ChatMessage> {
    let lang_name = language_display_name(target_language);
    let mut parts = vec![
        format!("Create a {lang_name} language worksheet for the scenario: \"{scenario}\"."),
        format!("Difficulty level: {difficulty} (CEFR)."),
    ];
    if let Some(focus) = grammar_focus {
        parts.push(format!(
            "REQUIRED GRAMMAR FOCUS: {focus}. All exercises must practice this specific tense/grammar topic."
        ));
    }
    parts.push("Ensure exercises test both comprehension and production.".to_string());

    vec![
        ChatMessage::system(WORKSHEET_SYSTEM_PROMPT),
        ChatMessage::user(parts.join(" ")),
    ]
}

/// Builds the grading prompt comparing a stored correct answer to a
/// submitted answer.
pub fn grading_messages(exercise: &Exercise, submitted_answer: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(GRADING_SYSTEM_PROMPT),
        ChatMessage::user(format!(
            "Correct answer: {}\nUser's answer: {}\nExercise type: {}\nQuestion: {}\nHint: {}",
            exercise.correct_answer,
            submitted_answer,
            exercise.kind.as_str(),
            exercise.question,
            exercise.hint.as_deref().unwrap_or("none"),
        )),
    ]
}
