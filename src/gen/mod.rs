//! External generation service boundary.
//!
//! The studio consumes five endpoints: image generation, in-place edit,
//! upscale, prompt refinement, and narrative text. All of them share one
//! failure shape; an answer that contains zero images is a refusal, not a
//! transport error.

pub mod provider;

use crate::error::GenerateError;
use crate::model::{ImagePart, Locale};

/// A generation service. Implementations return images as data URIs so the
/// rest of the system never cares where the bytes came from.
pub trait Generator: Send + Sync {
    /// Text prompt plus optional reference images; one or more result images.
    fn generate(&self, prompt: &str, images: &[ImagePart]) -> Result<Vec<String>, GenerateError>;

    /// Derive exactly one replacement bitmap for an existing asset. The base
    /// image travels first, auxiliary inputs (sketch mask, person cut-out)
    /// after it.
    fn edit_in_place(
        &self,
        prompt: &str,
        base: &ImagePart,
        auxiliary: &[ImagePart],
    ) -> Result<String, GenerateError> {
        let mut images = Vec::with_capacity(1 + auxiliary.len());
        images.push(base.clone());
        images.extend_from_slice(auxiliary);
        let results = self.generate(prompt, &images)?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| GenerateError::Refused("the model returned no image".to_string()))
    }

    /// Resolution enhancement with a fixed instruction.
    fn upscale(&self, src: &str) -> Result<Vec<String>, GenerateError>;

    /// Rewrite a user prompt into a detailed one.
    fn refine(&self, prompt: &str, locale: Locale) -> Result<String, GenerateError>;

    /// Short narrative text for a set of images.
    fn narrate(&self, images: &[ImagePart], locale: Locale) -> Result<String, GenerateError>;

    fn provider_name(&self) -> &'static str;
}

/// Parse a data URI into an `ImagePart`, failing with a protocol error when
/// the payload is not a data URI (an edit needs raw bytes to send).
pub fn part_from_src(src: &str) -> Result<ImagePart, GenerateError> {
    ImagePart::from_data_uri(src)
        .ok_or_else(|| GenerateError::Protocol(format!("not a data URI: {:.32}...", src)))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<String>);

    impl Generator for Fixed {
        fn generate(&self, _: &str, _: &[ImagePart]) -> Result<Vec<String>, GenerateError> {
            Ok(self.0.clone())
        }
        fn upscale(&self, _: &str) -> Result<Vec<String>, GenerateError> {
            Ok(self.0.clone())
        }
        fn refine(&self, p: &str, _: Locale) -> Result<String, GenerateError> {
            Ok(p.to_string())
        }
        fn narrate(&self, _: &[ImagePart], _: Locale) -> Result<String, GenerateError> {
            Ok(String::new())
        }
        fn provider_name(&self) -> &'static str {
            "fixed"
        }
    }

    #[test]
    fn test_edit_in_place_takes_first_result() {
        let gen = Fixed(vec!["one".to_string(), "two".to_string()]);
        let base = ImagePart {
            mime_type: "image/png".to_string(),
            data: "aa".to_string(),
        };
        assert_eq!(gen.edit_in_place("p", &base, &[]).unwrap(), "one");
    }

    #[test]
    fn test_edit_in_place_empty_result_is_refusal() {
        let gen = Fixed(Vec::new());
        let base = ImagePart {
            mime_type: "image/png".to_string(),
            data: "aa".to_string(),
        };
        let err = gen.edit_in_place("p", &base, &[]).unwrap_err();
        assert!(matches!(err, GenerateError::Refused(_)));
    }

    #[test]
    fn test_part_from_src_requires_data_uri() {
        assert!(part_from_src("https://example.com/x.png").is_err());
        assert!(part_from_src("data:image/png;base64,aa").is_ok());
    }
}
