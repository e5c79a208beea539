//! Synthesized edit instructions for the actions that do not take free text.

use crate::model::Locale;

/// Fixed resolution-enhancement instruction used by the upscale endpoint.
pub fn upscale_instruction() -> String {
    "Upscale this image and add high-frequency details while preserving the subject, \
     composition, and color palette exactly."
        .to_string()
}

/// Instruction for compositing a drawn object into a sketched region. The
/// mask travels as the second image.
pub fn add_object_instruction(object: &str, locale: Locale) -> String {
    match locale {
        Locale::En => format!(
            "In the original image, add a \"{}\" in the area sketched in the second image.",
            object
        ),
        Locale::Vi => format!(
            "Trong ảnh gốc, thêm \"{}\" vào khu vực được phác thảo trong ảnh thứ hai.",
            object
        ),
    }
}

/// Instruction for compositing a person photo into the scene. A user caption
/// wins over the default phrasing.
pub fn add_person_instruction(caption: Option<&str>, locale: Locale) -> String {
    if let Some(caption) = caption.filter(|c| !c.trim().is_empty()) {
        return caption.trim().to_string();
    }
    match locale {
        Locale::En => "Add this person into the scene naturally.".to_string(),
        Locale::Vi => "Thêm người này vào cảnh một cách tự nhiên.".to_string(),
    }
}

/// Step prompt for series generation; the step counter keeps the sequence
/// narratable.
pub fn series_step_prompt(base: &str, step: usize, total: usize, change: &str) -> String {
    format!("{}\n\nStep {}/{}: {}", base, step, total, change)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_object_references_sketched_area() {
        let en = add_object_instruction("red bicycle", Locale::En);
        assert!(en.contains("\"red bicycle\""));
        assert!(en.contains("second image"));
        let vi = add_object_instruction("xe đạp", Locale::Vi);
        assert!(vi.contains("\"xe đạp\""));
    }

    #[test]
    fn test_add_person_caption_wins() {
        assert_eq!(
            add_person_instruction(Some("  standing by the window "), Locale::En),
            "standing by the window"
        );
        assert_eq!(
            add_person_instruction(Some("   "), Locale::En),
            "Add this person into the scene naturally."
        );
        assert_eq!(
            add_person_instruction(None, Locale::Vi),
            "Thêm người này vào cảnh một cách tự nhiên."
        );
    }

    #[test]
    fn test_series_step_prompt_counts_from_one() {
        let p = series_step_prompt("base", 2, 3, "smiles faintly");
        assert!(p.starts_with("base"));
        assert!(p.contains("Step 2/3: smiles faintly"));
    }
}
