//! Instruction templates for each stage.
//!
//! The rubric text is constant. Caller-provided fields are inserted
//! verbatim with no escaping; the model is trusted to parse them.

use crate::normalize::join_labels;

/// Sentinel the diagnosis rubric asks the model to emit when nothing can
/// be identified.
pub const INSUFFICIENT_DIAGNOSIS: &str = "Insufficient information to determine problem areas.";

/// Sentinel the solutions rubric asks the model to emit.
pub const INSUFFICIENT_SOLUTIONS: &str = "Insufficient information to provide suggestions. \
Please provide more details about the patient and their context.";

/// Prompt for the problem-area extraction stage.
pub fn diagnosis_prompt(patient_context: &str) -> String {
    format!(
        "You will be provided with the following information:

Patient Context: {patient_context}

Instructions:

1. Carefully analyze the provided patient context.
2. Identify potential problem areas the patient might be experiencing based on the information provided.
3. Output the potential problem areas as a comma-separated Proper cased list of values. For example: anxiety, depression, relationship issues, work stress, grief.
4. If no specific problems can be identified based on the context, output \"{INSUFFICIENT_DIAGNOSIS}\"
5. Remember, your output is for informational purposes only and should not be considered a diagnosis. Always consult with a licensed mental health professional for diagnosis and treatment."
    )
}

/// Prompt for the intervention suggestion stage.
pub fn solutions_prompt(patient_context: &str) -> String {
    format!(
        "You will be provided with the following information:

Patient Context: {patient_context}

Instructions:

1. Carefully analyze the provided patient information and context.
2. Based on the provided information, suggest possible solutions or interventions that could be beneficial for the patient.
3. Output the suggestions as a comma-separated Proper cased list of values.
4. Do not include any explanations or additional text beyond the list of suggestions.
5. Do not invent any information. Base your suggestions solely on the provided patient information and context.
6. If the provided information is insufficient to suggest any solutions, output: \"{INSUFFICIENT_SOLUTIONS}\""
    )
}

/// Prompt for the counselor-facing response stage.
///
/// Lists are joined with `", "` before substitution.
pub fn response_prompt(patient_context: &str, problems: &[String], solutions: &[String]) -> String {
    let problems = join_labels(problems);
    let solutions = join_labels(solutions);
    format!(
        "You will be provided with the following information:

Patient Context: {patient_context}
Problem Areas: {problems}
Possible Solutions: {solutions}

Instructions:

1. Carefully consider the provided patient context, problem areas, and possible solutions.
2. Generate a natural language response that can help the mental health counselor deliver the best care to the patient.
3. Your response should be informative, supportive, and focused on aiding the counselor in their decision-making process.
4. Return properly formatted text with paragraphs, breaks, and an easily readable format.
5. Do not offer medical advice or diagnoses. Your role is to provide support and insights based on the given information, Do not ask follow up questions.
6. If any information is missing or unclear, request clarification using the appropriate placeholder name.

Example:

Patient Context: A 25-year-old female experiencing increased stress due to work and relationship issues. She reports difficulty sleeping and concentrating.

Problem Areas: anxiety, stress, insomnia

Possible Solutions: CBT, mindfulness exercises, medication

Response:

Considering the patient's context, her reported anxiety, stress, and insomnia seem to be stemming from work and relationship issues. CBT and mindfulness exercises could be beneficial in helping her manage stress and improve sleep quality. It's also important to explore medication as a potential option in conjunction with therapy. Further assessment is recommended to determine the severity of her symptoms and tailor the treatment plan accordingly. The counselor should also consider exploring the specific work and relationship issues contributing to her distress."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_is_inserted_verbatim() {
        let context = "  \"quoted\" {braces} & <tags>\n second line ";
        assert!(diagnosis_prompt(context).contains(&format!("Patient Context: {context}\n")));
        assert!(solutions_prompt(context).contains(&format!("Patient Context: {context}\n")));
    }

    #[test]
    fn templates_carry_their_sentinels() {
        assert!(diagnosis_prompt("x").contains(INSUFFICIENT_DIAGNOSIS));
        assert!(solutions_prompt("x").contains(INSUFFICIENT_SOLUTIONS));
    }

    #[test]
    fn response_prompt_joins_lists() {
        let prompt = response_prompt(
            "25-year-old with work stress",
            &["Anxiety".into(), "Insomnia".into()],
            &["Cbt".into(), "Sleep Hygiene".into()],
        );
        assert!(prompt.contains("Patient Context: 25-year-old with work stress\n"));
        assert!(prompt.contains("Problem Areas: Anxiety, Insomnia\n"));
        assert!(prompt.contains("Possible Solutions: Cbt, Sleep Hygiene\n"));
    }

    #[test]
    fn templates_are_deterministic() {
        assert_eq!(diagnosis_prompt("same"), diagnosis_prompt("same"));
    }
}
