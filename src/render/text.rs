//! Plain text rendering of translated documents.

use std::fmt::Write;

use crate::error::{Error, Result};
use crate::model::{Document, Paragraph, TranslationStatus};

use super::RenderOptions;

/// Render the selected pages as bilingual plain text.
///
/// Each page starts with a `## Page N` header. Paragraphs that are not
/// translated yet show a status marker in place of the translation.
pub fn to_text(doc: &Document, options: &RenderOptions) -> Result<String> {
    let mut output = String::new();

    for page in doc
        .pages
        .iter()
        .filter(|page| options.page_selection.includes(page.number))
    {
        writeln!(output, "## Page {}\n", page.number).map_err(render_error)?;

        for paragraph in page
            .paragraphs
            .iter()
            .filter(|p| options.include_ineligible || p.is_eligible(options.min_line_count))
        {
            if options.include_source {
                writeln!(output, "{}", paragraph.text).map_err(render_error)?;
            }
            writeln!(output, "{}\n", translated_text(paragraph)).map_err(render_error)?;
        }
    }

    Ok(output.trim().to_string())
}

fn translated_text(paragraph: &Paragraph) -> String {
    match paragraph.status {
        TranslationStatus::Done => paragraph.translation.clone(),
        TranslationStatus::Error => format!(
            "[error: {}]",
            paragraph.error.as_deref().unwrap_or("translation failed")
        ),
        TranslationStatus::Translating => "[translating]".to_string(),
        TranslationStatus::Skipped => "[skipped]".to_string(),
        TranslationStatus::Idle => "[not translated]".to_string(),
    }
}

fn render_error(e: std::fmt::Error) -> Error {
    Error::Render(e.to_string())
}
