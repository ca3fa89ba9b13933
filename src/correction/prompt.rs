//! Follow-up request sent to the model after a failed syntax check

use super::types::CodeArtifact;
use crate::validation::ValidationResult;

/// Build the correction request for `artifact`
///
/// Embeds the failing source verbatim and every diagnostic, and asks for
/// the complete file back in the tag format the parser understands.
pub fn correction_prompt(artifact: &CodeArtifact, validation: &ValidationResult) -> String {
    let language = artifact.language.name();
    format!(
        "Your previous content for `{path}` is not valid {language}: the syntax check failed.\n\n\
         Diagnostics (line numbers are 1-based):\n{diagnostics}\n\n\
         The code that failed:\n```{language}\n{source}\n```\n\n\
         Analyse the errors and reply with the complete, syntactically valid content of `{path}` \
         in this exact format:\n\
         <file_modifications>\n\
         <file path=\"{path}\" action=\"overwrite\">\n\
         CORRECTED CONTENT\n\
         </file>\n\
         </file_modifications>",
        path = artifact.path,
        language = language,
        diagnostics = validation.render(),
        source = artifact.content,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{Diagnostic, SourceLanguage};

    #[test]
    fn test_prompt_embeds_source_and_diagnostics() {
        let artifact = CodeArtifact::new("app.py", "print(\"hi\"", SourceLanguage::Python);
        let validation = ValidationResult::rejected(vec![Diagnostic::new(1, "missing `)`")]);
        let prompt = correction_prompt(&artifact, &validation);

        assert!(prompt.contains("```python\nprint(\"hi\"\n```"));
        assert!(prompt.contains("line 1: missing `)`"));
        assert!(prompt.contains("<file path=\"app.py\" action=\"overwrite\">"));
    }
}
