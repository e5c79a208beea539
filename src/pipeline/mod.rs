//! Edit-pipeline coordinator.
//!
//! Seven surface actions collapse into two request shapes against the
//! generation service: `create` (no base image, N results, one new history
//! item) and `replace` (exactly one base image, exactly one replacement `src`
//! for the same asset id). Crop is replace-shaped but purely local.
//!
//! In-flight replace operations are keyed by the asset's current `src`, so
//! concurrent edits of different assets never block each other while a second
//! edit of the same asset is rejected.

pub mod crop;
pub mod instruction;

use std::collections::HashSet;
use std::time::Instant;

use tracing::{info, warn};

use crate::error::PipelineError;
use crate::gen::{part_from_src, Generator};
use crate::library::{ImageUpdate, Library};
use crate::model::{
    mint_run_id, GeneratedImage, GenerationSettings, HistoryItem, ImagePart, Locale, UploadedImage,
};

pub use crop::CropRegion;

/// Inputs for a create-mode run.
#[derive(Debug, Clone, Default)]
pub struct CreateRequest {
    pub prompt: String,
    pub negative_prompt: String,
    pub uploaded_images: Vec<UploadedImage>,
    pub settings: GenerationSettings,
    pub tags: Vec<String>,
}

/// The edit actions that derive a replacement bitmap for an existing asset.
#[derive(Debug, Clone)]
pub enum EditAction {
    /// Deterministic local pixel extraction; never calls the service.
    Crop(CropRegion),
    /// Fixed resolution-enhancement instruction.
    Upscale,
    /// User-supplied free text.
    Remix(String),
    /// User-supplied free text describing new canvas regions.
    Expand(String),
    /// User-supplied free text describing the defect.
    Fix(String),
    /// Synthesized instruction referencing a drawn mask.
    AddObject { object: String, mask: ImagePart },
    /// Synthesized instruction plus an optional user caption.
    AddPerson {
        photo: ImagePart,
        caption: Option<String>,
    },
}

impl EditAction {
    fn label(&self) -> &'static str {
        match self {
            EditAction::Crop(_) => "crop",
            EditAction::Upscale => "upscale",
            EditAction::Remix(_) => "remix",
            EditAction::Expand(_) => "expand",
            EditAction::Fix(_) => "fix",
            EditAction::AddObject { .. } => "add-object",
            EditAction::AddPerson { .. } => "add-person",
        }
    }
}

pub struct Coordinator {
    generator: Box<dyn Generator>,
    locale: Locale,
    /// Current `src` of every asset with a replace in flight.
    in_flight: HashSet<String>,
}

impl Coordinator {
    pub fn new(generator: Box<dyn Generator>, locale: Locale) -> Self {
        Self {
            generator,
            locale,
            in_flight: HashSet::new(),
        }
    }

    /// Whether an edit is currently in flight for this bitmap.
    pub fn is_processing(&self, src: &str) -> bool {
        self.in_flight.contains(src)
    }

    /// Run one generation and commit the results as a new history item.
    /// Nothing is persisted unless the whole run succeeds.
    pub fn create(&self, lib: &mut Library, request: CreateRequest) -> Result<String, PipelineError> {
        let parts: Vec<ImagePart> = request
            .uploaded_images
            .iter()
            .filter_map(|u| u.as_part())
            .collect();

        let started = Instant::now();
        let srcs = self.generator.generate(&request.prompt, &parts)?;
        let elapsed = started.elapsed().as_millis() as u64;

        let images = srcs
            .into_iter()
            .map(|src| GeneratedImage::new(src, Some(elapsed)))
            .collect();
        let run_id = self.commit(lib, request, images)?;
        info!(run = %run_id, "generation run committed");
        Ok(run_id)
    }

    /// Run N prompt variations strictly in order and aggregate every result
    /// into a single history item. A mid-series failure aborts the remaining
    /// steps and persists nothing; the error names the failed step.
    pub fn create_series(
        &self,
        lib: &mut Library,
        base_prompt: &str,
        changes: &[String],
        mut request: CreateRequest,
    ) -> Result<String, PipelineError> {
        let total = changes.len();
        let parts: Vec<ImagePart> = request
            .uploaded_images
            .iter()
            .filter_map(|u| u.as_part())
            .collect();

        let started = Instant::now();
        let mut images: Vec<GeneratedImage> = Vec::new();
        for (i, change) in changes.iter().enumerate() {
            let step = i + 1;
            let prompt = instruction::series_step_prompt(base_prompt, step, total, change);
            let srcs = self
                .generator
                .generate(&prompt, &parts)
                .map_err(|source| {
                    warn!(step, total, "series run aborted");
                    PipelineError::SeriesStep {
                        step,
                        total,
                        source,
                    }
                })?;
            let elapsed = started.elapsed().as_millis() as u64 / total.max(1) as u64;
            images.extend(
                srcs.into_iter()
                    .map(|src| GeneratedImage::new(src, Some(elapsed))),
            );
        }

        request.prompt = format!("Series: {}", base_prompt);
        request.tags.push("series".to_string());
        let run_id = self.commit(lib, request, images)?;
        info!(run = %run_id, steps = total, "series run committed");
        Ok(run_id)
    }

    fn commit(
        &self,
        lib: &mut Library,
        request: CreateRequest,
        images: Vec<GeneratedImage>,
    ) -> Result<String, PipelineError> {
        let item = HistoryItem {
            id: mint_run_id(),
            prompt: request.prompt,
            negative_prompt: request.negative_prompt,
            uploaded_images: request.uploaded_images,
            generated_images: images,
            settings: request.settings,
            tags: request.tags,
            folder_id: None,
        };
        Ok(lib.commit_run(item)?)
    }

    /// Derive a replacement bitmap for one existing asset and propagate it to
    /// every view through the synchronizer, exactly once, on success only.
    /// Returns the new `src`.
    pub fn replace(
        &mut self,
        lib: &mut Library,
        history_id: &str,
        image_id: &str,
        action: EditAction,
    ) -> Result<String, PipelineError> {
        let Some((item, img)) = lib.find_image(image_id) else {
            return Err(PipelineError::UnknownAsset);
        };
        if item.id != history_id {
            return Err(PipelineError::UnknownAsset);
        }
        let old_src = img.src.clone();

        if !self.in_flight.insert(old_src.clone()) {
            return Err(PipelineError::Busy);
        }
        let label = action.label();
        let started = Instant::now();
        let result = self.derive(&old_src, action);
        self.in_flight.remove(&old_src);

        match result {
            Ok(Derived { src, timed }) => {
                let update = ImageUpdate {
                    src: Some(src.clone()),
                    generation_time: timed.then(|| started.elapsed().as_millis() as u64),
                    ..ImageUpdate::default()
                };
                // A delete that raced the edit makes this a benign no-op.
                let applied = lib.apply_image_update(history_id, image_id, update)?;
                if !applied {
                    info!(image_id, action = label, "edit target deleted mid-flight; result dropped");
                }
                Ok(src)
            }
            Err(e) => {
                warn!(image_id, action = label, error = %e, "edit failed; asset unchanged");
                Err(e)
            }
        }
    }

    fn derive(&self, old_src: &str, action: EditAction) -> Result<Derived, PipelineError> {
        match action {
            EditAction::Crop(region) => Ok(Derived {
                src: crop::crop_data_uri(old_src, region)?,
                timed: false,
            }),
            EditAction::Upscale => {
                let results = self.generator.upscale(old_src)?;
                let src = results.into_iter().next().ok_or_else(|| {
                    PipelineError::Generate(crate::error::GenerateError::Refused(
                        "the model returned no upscaled image".to_string(),
                    ))
                })?;
                Ok(Derived { src, timed: true })
            }
            EditAction::Remix(text) | EditAction::Expand(text) | EditAction::Fix(text) => {
                self.edit_with(old_src, &text, &[])
            }
            EditAction::AddObject { object, mask } => {
                let prompt = instruction::add_object_instruction(&object, self.locale);
                self.edit_with(old_src, &prompt, std::slice::from_ref(&mask))
            }
            EditAction::AddPerson { photo, caption } => {
                let prompt = instruction::add_person_instruction(caption.as_deref(), self.locale);
                self.edit_with(old_src, &prompt, std::slice::from_ref(&photo))
            }
        }
    }

    fn edit_with(
        &self,
        old_src: &str,
        prompt: &str,
        auxiliary: &[ImagePart],
    ) -> Result<Derived, PipelineError> {
        let base = part_from_src(old_src)?;
        let src = self.generator.edit_in_place(prompt, &base, auxiliary)?;
        Ok(Derived { src, timed: true })
    }

    /// Prompt refinement pass-through.
    pub fn refine_prompt(&self, prompt: &str) -> Result<String, PipelineError> {
        Ok(self.generator.refine(prompt, self.locale)?)
    }

    /// Narrative pass-through for a set of data-URI images.
    pub fn narrate(&self, srcs: &[String]) -> Result<String, PipelineError> {
        let parts = srcs
            .iter()
            .map(|s| part_from_src(s))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.generator.narrate(&parts, self.locale)?)
    }

    #[cfg(test)]
    fn force_in_flight(&mut self, src: &str) {
        self.in_flight.insert(src.to_string());
    }
}

struct Derived {
    src: String,
    /// Network-backed edits record a generation time; local crop does not.
    timed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenerateError;
    use crate::library::test_support::library;
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use std::sync::Mutex;

    /// Scripted generator: pops one canned response per call and records the
    /// prompts it saw in a log shared with the test.
    struct MockGenerator {
        responses: Mutex<Vec<Result<Vec<String>, GenerateError>>>,
        prompts: std::sync::Arc<Mutex<Vec<String>>>,
    }

    impl MockGenerator {
        fn new(responses: Vec<Result<Vec<String>, GenerateError>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                prompts: std::sync::Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn returning(srcs: &[&str]) -> Self {
            Self::new(vec![Ok(srcs.iter().map(|s| s.to_string()).collect())])
        }

        fn prompt_log(&self) -> std::sync::Arc<Mutex<Vec<String>>> {
            self.prompts.clone()
        }
    }

    impl Generator for MockGenerator {
        fn generate(&self, prompt: &str, _: &[ImagePart]) -> Result<Vec<String>, GenerateError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err(GenerateError::Transport("unexpected call".to_string()));
            }
            responses.remove(0)
        }

        fn upscale(&self, src: &str) -> Result<Vec<String>, GenerateError> {
            self.generate(&format!("upscale {}", src), &[])
        }

        fn refine(&self, prompt: &str, _: Locale) -> Result<String, GenerateError> {
            Ok(format!("refined: {}", prompt))
        }

        fn narrate(&self, _: &[ImagePart], _: Locale) -> Result<String, GenerateError> {
            Ok("a story".to_string())
        }

        fn provider_name(&self) -> &'static str {
            "mock"
        }
    }

    fn data_uri(tag: &str) -> String {
        format!("data:image/png;base64,{}", BASE64.encode(tag))
    }

    fn coordinator(responses: Vec<Result<Vec<String>, GenerateError>>) -> Coordinator {
        Coordinator::new(Box::new(MockGenerator::new(responses)), Locale::En)
    }

    fn create_one(coord: &Coordinator, lib: &mut Library, prompt: &str) -> String {
        coord
            .create(
                lib,
                CreateRequest {
                    prompt: prompt.to_string(),
                    ..CreateRequest::default()
                },
            )
            .unwrap()
    }

    /// A real encoded bitmap so crop has something to decode.
    fn bitmap_data_uri() -> String {
        use image::{ImageFormat, RgbImage};
        use std::io::Cursor;
        let img = RgbImage::from_pixel(16, 16, image::Rgb([128, 64, 32]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        format!("data:image/png;base64,{}", BASE64.encode(&buf))
    }

    #[test]
    fn test_identity_stable_across_every_edit_kind() {
        let mut lib = library(20, 25);
        let mut coord = coordinator(vec![
            Ok(vec![bitmap_data_uri()]),    // create
            Ok(vec![data_uri("upscaled")]), // upscale
            Ok(vec![data_uri("remixed")]),  // remix
            Ok(vec![data_uri("expanded")]), // expand
            Ok(vec![data_uri("fixed")]),    // fix
            Ok(vec![data_uri("object")]),   // add object
            Ok(vec![data_uri("person")]),   // add person
        ]);
        let run = create_one(&coord, &mut lib, "a lighthouse");
        let image_id = lib.history()[0].generated_images[0].id.clone();

        let aux = ImagePart {
            mime_type: "image/png".to_string(),
            data: "bWFzaw==".to_string(),
        };
        let actions = vec![
            EditAction::Crop(CropRegion {
                x: 0,
                y: 0,
                width: 8,
                height: 8,
            }),
            EditAction::Upscale,
            EditAction::Remix("warmer light".to_string()),
            EditAction::Expand("more sky above".to_string()),
            EditAction::Fix("remove the artifact".to_string()),
            EditAction::AddObject {
                object: "sailboat".to_string(),
                mask: aux.clone(),
            },
            EditAction::AddPerson {
                photo: aux,
                caption: None,
            },
        ];
        for action in actions {
            coord.replace(&mut lib, &run, &image_id, action).unwrap();
        }

        let img = &lib.history()[0].generated_images[0];
        assert_eq!(img.id, image_id, "id never reassigned");
        assert_eq!(img.src, data_uri("person"), "src reflects the last edit");
    }

    #[test]
    fn test_crop_never_calls_the_service() {
        let mut lib = library(20, 25);
        let mock = MockGenerator::returning(&[&bitmap_data_uri()]);
        let log = mock.prompt_log();
        let mut coord = Coordinator::new(Box::new(mock), Locale::En);
        let run = create_one(&coord, &mut lib, "p");
        let image_id = lib.history()[0].generated_images[0].id.clone();
        assert_eq!(log.lock().unwrap().len(), 1);

        let new_src = coord
            .replace(
                &mut lib,
                &run,
                &image_id,
                EditAction::Crop(CropRegion {
                    x: 2,
                    y: 2,
                    width: 4,
                    height: 4,
                }),
            )
            .unwrap();
        assert!(new_src.starts_with("data:image/jpeg;base64,"));
        assert_eq!(lib.history()[0].generated_images[0].src, new_src);
        // Still only the create call: crop stayed local.
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_failed_edit_leaves_asset_untouched() {
        let mut lib = library(20, 25);
        let mut coord = coordinator(vec![
            Ok(vec![data_uri("original")]),
            Err(GenerateError::Refused("blocked".to_string())),
        ]);
        let run = create_one(&coord, &mut lib, "p");
        let image_id = lib.history()[0].generated_images[0].id.clone();

        let err = coord
            .replace(&mut lib, &run, &image_id, EditAction::Remix("x".to_string()))
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Generate(GenerateError::Refused(_))
        ));
        assert_eq!(lib.history()[0].generated_images[0].src, data_uri("original"));
        assert!(!coord.is_processing(&data_uri("original")));
    }

    #[test]
    fn test_series_failure_persists_nothing() {
        let mut lib = library(20, 25);
        let coord = coordinator(vec![
            Ok(vec![data_uri("s1")]),
            Err(GenerateError::Transport("timeout".to_string())),
        ]);
        let changes = vec![
            "looks left".to_string(),
            "smiles".to_string(),
            "closes eyes".to_string(),
        ];

        let err = coord
            .create_series(&mut lib, "portrait", &changes, CreateRequest::default())
            .unwrap_err();
        match err {
            PipelineError::SeriesStep { step, total, .. } => {
                assert_eq!(step, 2);
                assert_eq!(total, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(lib.history().is_empty(), "partial runs never appear");
    }

    #[test]
    fn test_series_success_is_one_run_with_ordered_steps() {
        let mut lib = library(20, 25);
        let mock = MockGenerator::new(vec![
            Ok(vec![data_uri("s1")]),
            Ok(vec![data_uri("s2")]),
        ]);
        let coord = Coordinator::new(Box::new(mock), Locale::En);
        let changes = vec!["a".to_string(), "b".to_string()];

        coord
            .create_series(&mut lib, "base", &changes, CreateRequest::default())
            .unwrap();

        assert_eq!(lib.history().len(), 1);
        let item = &lib.history()[0];
        assert_eq!(item.prompt, "Series: base");
        assert_eq!(item.tags, vec!["series".to_string()]);
        let srcs: Vec<&str> = item.generated_images.iter().map(|i| i.src.as_str()).collect();
        assert_eq!(srcs, vec![data_uri("s1"), data_uri("s2")]);
    }

    #[test]
    fn test_series_prompts_are_sequential() {
        let mut lib = library(20, 25);
        let mock = MockGenerator::new(vec![
            Ok(vec![data_uri("s1")]),
            Ok(vec![data_uri("s2")]),
        ]);
        let log = mock.prompt_log();
        let coord = Coordinator::new(Box::new(mock), Locale::En);
        let changes = vec!["a".to_string(), "b".to_string()];
        coord
            .create_series(&mut lib, "base", &changes, CreateRequest::default())
            .unwrap();

        let prompts = log.lock().unwrap();
        assert_eq!(prompts[0], "base\n\nStep 1/2: a");
        assert_eq!(prompts[1], "base\n\nStep 2/2: b");
    }

    #[test]
    fn test_replace_on_unknown_asset_is_an_error() {
        let mut lib = library(20, 25);
        let mut coord = coordinator(vec![Ok(vec![data_uri("one")])]);
        let run = create_one(&coord, &mut lib, "p");

        let err = coord
            .replace(&mut lib, &run, "missing", EditAction::Upscale)
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnknownAsset));

        // Right image, wrong run: also unknown.
        let image_id = lib.history()[0].generated_images[0].id.clone();
        let err = coord
            .replace(&mut lib, "other-run", &image_id, EditAction::Upscale)
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnknownAsset));
    }

    #[test]
    fn test_concurrent_edit_of_same_asset_is_rejected() {
        let mut lib = library(20, 25);
        let mut coord = coordinator(vec![Ok(vec![data_uri("one")])]);
        let run = create_one(&coord, &mut lib, "p");
        let image_id = lib.history()[0].generated_images[0].id.clone();
        let src = lib.history()[0].generated_images[0].src.clone();

        coord.force_in_flight(&src);
        let err = coord
            .replace(&mut lib, &run, &image_id, EditAction::Remix("x".to_string()))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Busy));
        assert!(coord.is_processing(&src));
    }

    #[test]
    fn test_history_cap_example_scenario_via_coordinator() {
        // Capacity 2, both slots full, neither favorited: a third successful
        // run evicts the oldest automatically.
        let mut lib = library(2, 25);
        let coord = coordinator(vec![
            Ok(vec![data_uri("r1")]),
            Ok(vec![data_uri("r2")]),
            Ok(vec![data_uri("r3")]),
        ]);
        let first = create_one(&coord, &mut lib, "one");
        let second = create_one(&coord, &mut lib, "two");
        let third = create_one(&coord, &mut lib, "three");

        let ids: Vec<&str> = lib.history().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec![second.as_str(), third.as_str()]);
        assert!(!ids.contains(&first.as_str()));
    }

    #[test]
    fn test_replace_refreshes_gallery_snapshot() {
        let mut lib = library(20, 25);
        let mut coord = coordinator(vec![
            Ok(vec![data_uri("original")]),
            Ok(vec![data_uri("remixed")]),
        ]);
        let run = create_one(&coord, &mut lib, "p");
        let image_id = lib.history()[0].generated_images[0].id.clone();
        lib.toggle_gallery(&image_id).unwrap();

        coord
            .replace(&mut lib, &run, &image_id, EditAction::Remix("v".to_string()))
            .unwrap();
        assert_eq!(lib.gallery()[0].src, data_uri("remixed"));
    }
}
