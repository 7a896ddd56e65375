// Prompt text for cover-letter generation.
// Templates use `{placeholder}` markers filled in by `build`.

use super::GenerationInputs;

/// System prompt template. Replace `{tone}` and `{word_count}`.
pub const COVER_LETTER_SYSTEM: &str = "You are an expert career writer. \
    Write a tailored cover letter for the candidate described in the résumé, \
    addressed to the role in the job description. \
    Use a {tone} tone and aim for about {word_count} words. \
    Only state facts supported by the résumé or the additional context. \
    Return the letter body as plain text: no markdown, no placeholders, no commentary.";

/// User prompt template. Replace `{job_description}` and `{resume}`.
pub const COVER_LETTER_PROMPT: &str = "JOB DESCRIPTION:\n{job_description}\n\nRÉSUMÉ:\n{resume}\n";

/// Appended when the user selected a previous letter to reuse.
pub const TEMPLATE_SECTION: &str = "\nEXISTING COVER LETTER (match its structure and voice, not its facts):\n{cover_letter}\n";

/// Appended when the user supplied extra notes.
pub const CONTEXT_SECTION: &str = "\nADDITIONAL CONTEXT FROM THE CANDIDATE:\n{additional_context}\n";

/// Returns `(system_instructions, user_prompt)`.
pub fn build(inputs: &GenerationInputs) -> (String, String) {
    let word_count = inputs.word_count_target.to_string();
    let system = fill(
        COVER_LETTER_SYSTEM,
        &[("tone", inputs.tone.as_str()), ("word_count", word_count.as_str())],
    );

    let mut prompt = fill(
        COVER_LETTER_PROMPT,
        &[
            ("job_description", inputs.job_description.as_str()),
            ("resume", inputs.resume.as_str()),
        ],
    );
    if let Some(letter) = &inputs.cover_letter {
        prompt.push_str(&fill(TEMPLATE_SECTION, &[("cover_letter", letter.as_str())]));
    }
    if let Some(ctx) = &inputs.additional_context {
        prompt.push_str(&fill(CONTEXT_SECTION, &[("additional_context", ctx.as_str())]));
    }
    (system, prompt)
}

/// Replace `{key}` markers in one left-to-right pass. Substituted text is
/// never scanned again, and unknown markers are kept as written.
fn fill(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let hit = vars.iter().find_map(|(key, value)| {
            let tail = after.strip_prefix(key)?.strip_prefix('}')?;
            Some((*value, tail))
        });
        match hit {
            Some((value, tail)) => {
                out.push_str(value);
                rest = tail;
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
