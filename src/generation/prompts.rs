// src/generation/prompts.rs

use crate::{
    generation::{DEFAULT_NUM_QUESTIONS, GenerationRequest},
    models::{
        question::{AnswerKey, Question},
        test_config::InputMethod,
    },
};

pub const EXTRACTION_PROMPT: &str = "Extract all text from this document/image. Respond with only \
the extracted text. If the document is primarily in a non-English language (e.g., Hindi), extract \
the text in that language.";

pub const TUTOR_PERSONA: &str = "You are Elsa, a helpful AI assistant.
Your personality is razor-sharp, clear, and composed. You value truth and elegance.
When answering, provide clear, concise, and accurate responses.
- Use markdown for formatting (**bold**, *italics*, lists with '*'). Each list item must be on a new line.
- Stick to the context of the question.
- Keep responses brief.
- Do not offer to change the correct answer.";

pub const CHAT_ACKNOWLEDGEMENT: &str =
    "Context understood. I am ready to answer the user's follow-up question as Elsa.";

fn option_letter(index: usize) -> char {
    (b'A' + (index % 26) as u8) as char
}

fn json_structure_note(target_language: &str) -> String {
    format!(
        r#"
The response MUST be a valid JSON array of objects. Each object represents one question and must have ONE of the following structures:

1. For Multiple-Choice Questions (MCQ):
{{
  "passageText": "Optional. Text passage preceding the question in {lang}. Can contain simple HTML.",
  "questionText": "The question in {lang}. Can contain simple HTML like <table>.",
  "options": ["Option A", "Option B", "Option C", "Option D"],
  "correctAnswerIndex": 0
}}

2. For Type-In-The-Answer (TITA) / Fill-in-the-blanks Questions:
{{
  "passageText": "Optional. Text passage preceding the question in {lang}.",
  "questionText": "The question with a blank, like 'The capital of France is ___.' in {lang}.",
  "correctAnswerText": "Paris"
}}

CRITICAL JSON RULES:
1. For MCQs, 'options' array MUST have 4 distinct string elements and 'correctAnswerIndex' must be a number (0-3).
2. For TITA questions, 'options' and 'correctAnswerIndex' MUST be omitted.
3. For "Match the Following" questions, use a valid HTML <table> inside 'questionText' and treat it as an MCQ.
4. All strings must be in double quotes.
"#,
        lang = target_language
    )
}

/// Builds the question generation prompt.
///
/// Difficulty and custom instructions only apply to syllabus and topic tests.
/// A document without a requested count asks for every question it contains.
pub fn question_prompt(request: &GenerationRequest) -> String {
    let target_language = request
        .language
        .map(|l| l.to_string())
        .unwrap_or_else(|| "the source document's primary language".to_string());

    let language_rule = request
        .language
        .map(|l| {
            format!(
                "\n- Language Focus: Generate questions *strictly* in **{0}**. All passageText, \
                 questionText, and options must be in **{0}**.",
                l
            )
        })
        .unwrap_or_default();

    let passage_rule = "Identify passages/contexts and place them in 'passageText'. The \
                        'questionText' should then contain the actual question. If no passage, \
                        omit 'passageText'.";

    let instructions = if request.input_method == InputMethod::Document {
        format!(
            "The provided content is from a document.\nYour tasks are:\n- {}\n- Identify actual \
             questions. These can be Multiple-Choice (MCQ) or Type-In-The-Answer (TITA).\n- Ignore \
             non-question content like instructions or cover pages.{}",
            passage_rule, language_rule
        )
    } else {
        let mut text = format!("{}{}", passage_rule, language_rule);
        if let Some(level) = request.difficulty {
            text.push_str(&format!("\n- Difficulty Level: **{}** on a scale of 1 to 5.", level));
        }
        if let Some(custom) = request
            .custom_instructions
            .as_deref()
            .filter(|c| !c.trim().is_empty())
        {
            text.push_str(&format!("\n- User-Provided Custom Instructions: {}", custom));
        }
        text
    };

    let task = match (request.input_method, request.num_questions) {
        (InputMethod::Document, None) => format!(
            "Extract ALL identifiable unique questions ({}) from the document in {}.",
            if request.tita_enabled { "both MCQ and TITA" } else { "only MCQ" },
            target_language
        ),
        (_, count) => {
            let mut task = format!(
                "Generate EXACTLY {} unique questions ({}).",
                count.filter(|c| *c > 0).unwrap_or(DEFAULT_NUM_QUESTIONS),
                if request.tita_enabled {
                    "can be a mix of MCQ and TITA"
                } else {
                    "only MCQ"
                }
            );
            if !request.tita_enabled {
                task.push_str(
                    "\nIMPORTANT: Do NOT generate any TITA (Type-In-The-Answer) or \
                     fill-in-the-blank questions. Only generate MCQs with 4 options and a correct \
                     answer index.",
                );
            }
            task
        }
    };

    format!(
        "You are an expert multilingual test creator. Based on the {} content:\n---\n{}\n---\n{}\n{}\n{}",
        request.input_method,
        request.content,
        instructions,
        task,
        json_structure_note(&target_language)
    )
}

/// Question, options and correct answer as plain text for the model.
fn question_context(question: &Question, options_separator: &str) -> String {
    let mut text = String::new();
    if let Some(passage) = &question.passage_text {
        text.push_str(&format!("Passage:\n{}\n---\n", passage));
    }
    text.push_str(&format!("Question: {}\n", question.question_text));

    match &question.answer {
        AnswerKey::Choice {
            options,
            correct_index,
            ..
        } => {
            let listed: Vec<String> = options
                .iter()
                .enumerate()
                .map(|(i, opt)| format!("{}. {}", option_letter(i), opt))
                .collect();
            text.push_str(&format!("Options: {}\n", listed.join(options_separator)));
            text.push_str(&format!(
                "Correct Answer: {}. {}\n",
                option_letter(*correct_index),
                options.get(*correct_index).map(String::as_str).unwrap_or_default()
            ));
        }
        AnswerKey::Text { correct_text, .. } => {
            text.push_str(&format!("Correct Answer: {}\n", correct_text));
        }
    }
    text
}

pub fn explanation_prompt(question: &Question) -> String {
    let user_answer = match &question.answer {
        AnswerKey::Choice {
            options,
            chosen_index: Some(chosen),
            ..
        } => format!(
            "User's Answer: {}. {}\n",
            option_letter(*chosen),
            options.get(*chosen).map(String::as_str).unwrap_or_default()
        ),
        AnswerKey::Text { chosen_text, .. } if !chosen_text.is_empty() => {
            format!("User's Answer: {}\n", chosen_text)
        }
        _ => String::new(),
    };

    format!(
        "You are an expert tutor. For the following question:\n---\n{}{}---\n\
         Provide a concise explanation for why the correct answer is correct. If the user answered \
         incorrectly, also explain why their choice is wrong (if applicable for MCQ).\n\
         Be helpful and educational. Keep it to a few sentences. Do not repeat the question or options.\n\
         The explanation should be in the same language as the question if possible.",
        question_context(question, " | "),
        user_answer
    )
}

/// First user turn of a follow-up chat: the question and its explanation.
pub fn chat_priming(question: &Question, explanation: Option<&str>) -> String {
    let explanation = match explanation {
        Some(text) => format!("Explanation: {}", text),
        None => "An official explanation has not been provided. Based on the question and \
                 correct answer, please assist the user."
            .to_string(),
    };

    format!(
        "Context for AI: The user is asking about the following question. Your persona is Elsa.\n\
         ---\n{}{}\n---\nThe user's next message is their actual question.",
        question_context(question, "\n"),
        explanation
    )
}
