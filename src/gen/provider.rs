//! HTTP provider for a Gemini-style generateContent API.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{part_from_src, Generator};
use crate::config::GeneratorConfig;
use crate::error::GenerateError;
use crate::model::{ImagePart, Locale};

pub struct HttpProvider {
    endpoint: String,
    image_model: String,
    text_model: String,
    api_key: Option<String>,
    timeout_secs: u64,
}

// ============================================================================
// Wire format
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Contents,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Contents {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

impl HttpProvider {
    pub fn new(config: &GeneratorConfig) -> Self {
        Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            image_model: config.image_model.clone(),
            text_model: config.text_model.clone(),
            api_key: config.api_key.clone(),
            timeout_secs: config.timeout_secs,
        }
    }

    fn call(&self, model: &str, request: &GenerateContentRequest) -> Result<GenerateContentResponse, GenerateError> {
        let url = format!("{}/models/{}:generateContent", self.endpoint, model);

        let agent = ureq::AgentBuilder::new()
            .timeout(std::time::Duration::from_secs(self.timeout_secs))
            .build();

        let mut req = agent.post(&url).set("Content-Type", "application/json");
        if let Some(ref api_key) = self.api_key {
            req = req.set("x-goog-api-key", api_key);
        }

        debug!(model, url = %url, "sending generation request");
        let response = req.send_json(request).map_err(map_transport_error)?;

        response
            .into_json()
            .map_err(|e| GenerateError::Protocol(format!("failed to parse response: {}", e)))
    }

    fn image_request(&self, prompt: &str, images: &[ImagePart]) -> GenerateContentRequest {
        let mut parts = vec![Part {
            text: Some(prompt.to_string()),
            inline_data: None,
        }];
        parts.extend(images.iter().map(|img| Part {
            text: None,
            inline_data: Some(InlineData {
                mime_type: img.mime_type.clone(),
                data: img.data.clone(),
            }),
        }));
        GenerateContentRequest {
            contents: Contents { parts },
            generation_config: Some(GenerationConfig {
                response_modalities: vec!["IMAGE".to_string()],
            }),
        }
    }

    fn text_of(response: GenerateContentResponse) -> Option<String> {
        let text: String = response
            .candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .filter_map(|p| p.text)
            .collect();
        let text = text.trim().to_string();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    fn images_of(response: GenerateContentResponse) -> Vec<String> {
        response
            .candidates
            .into_iter()
            .take(1)
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .filter_map(|p| p.inline_data)
            .map(|d| format!("data:{};base64,{}", d.mime_type, d.data))
            .collect()
    }
}

impl Generator for HttpProvider {
    fn generate(&self, prompt: &str, images: &[ImagePart]) -> Result<Vec<String>, GenerateError> {
        let request = self.image_request(prompt, images);
        let response = self.call(&self.image_model, &request)?;
        let results = Self::images_of(response);
        if results.is_empty() {
            return Err(GenerateError::Refused(
                "no images were generated; the model may have declined the request, try adjusting the prompt"
                    .to_string(),
            ));
        }
        Ok(results)
    }

    fn upscale(&self, src: &str) -> Result<Vec<String>, GenerateError> {
        let base = part_from_src(src)?;
        let instruction = crate::pipeline::instruction::upscale_instruction();
        self.generate(&instruction, std::slice::from_ref(&base))
    }

    fn refine(&self, prompt: &str, locale: Locale) -> Result<String, GenerateError> {
        let instruction = refine_instruction(prompt, locale);
        let request = GenerateContentRequest {
            contents: Contents {
                parts: vec![Part {
                    text: Some(instruction),
                    inline_data: None,
                }],
            },
            generation_config: None,
        };
        let response = self.call(&self.text_model, &request)?;
        Self::text_of(response)
            .ok_or_else(|| GenerateError::Refused("the model did not return a refined prompt".to_string()))
    }

    fn narrate(&self, images: &[ImagePart], locale: Locale) -> Result<String, GenerateError> {
        let mut request = self.image_request(narrate_instruction(locale), images);
        request.generation_config = None;
        let response = self.call(&self.text_model, &request)?;
        Self::text_of(response)
            .ok_or_else(|| GenerateError::Refused("the model did not return a narrative".to_string()))
    }

    fn provider_name(&self) -> &'static str {
        "gemini-http"
    }
}

fn map_transport_error(e: ureq::Error) -> GenerateError {
    let message = e.to_string();
    let lowered = message.to_lowercase();
    if lowered.contains("safety") || lowered.contains("blocked") {
        GenerateError::Refused(message)
    } else {
        GenerateError::Transport(message)
    }
}

fn refine_instruction(prompt: &str, locale: Locale) -> String {
    match locale {
        Locale::En => format!(
            "You are an expert prompt engineer for image generation models. Rewrite and expand \
             the following user's prompt to be highly detailed and optimized. Add specifics about \
             lighting, camera angles, art style, composition, and technical parameters like lens \
             type and resolution. The output should be only the refined prompt, without any \
             conversational text or preamble. User prompt: \"{}\"",
            prompt
        ),
        Locale::Vi => format!(
            "Bạn là một kỹ sư prompt chuyên nghiệp cho các mô hình tạo ảnh. Hãy viết lại và mở \
             rộng prompt sau của người dùng để nó trở nên cực kỳ chi tiết và được tối ưu hóa. Đầu \
             ra chỉ nên là prompt đã được tinh chỉnh bằng tiếng Việt, không có lời nói đầu. Prompt \
             của người dùng: \"{}\"",
            prompt
        ),
    }
}

fn narrate_instruction(locale: Locale) -> &'static str {
    match locale {
        Locale::En => {
            "Based on the following image(s), write a short, evocative, and artistic story or \
             description. Capture the mood, setting, and potential narrative behind the visuals."
        }
        Locale::Vi => {
            "Dựa trên (các) hình ảnh sau, hãy viết một câu chuyện hoặc mô tả ngắn, gợi cảm và \
             nghệ thuật bằng tiếng Việt. Nắm bắt tâm trạng, bối cảnh và câu chuyện tiềm ẩn đằng \
             sau hình ảnh."
        }
    }
}
