//! Command-line surface over the studio contracts.
//!
//! This is deliberately thin: every subcommand is a direct caller of the
//! create/replace/favorite-toggle/gallery-toggle contracts or the registry
//! CRUD. No studio logic lives here.

use anyhow::{anyhow, bail, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use std::path::Path;

use crate::config::Config;
use crate::gen::provider::HttpProvider;
use crate::library::{ImageUpdate, Library};
use crate::model::{ImagePart, LiveConfig, UploadedImage};
use crate::pipeline::{Coordinator, CreateRequest, CropRegion, EditAction};
use crate::store::persister::Persister;
use crate::store::KvStore;

pub struct App {
    library: Library,
    coordinator: Coordinator,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let kv = KvStore::open(&config.store.path, config.store.capacity_bytes)?;
        let persister = Persister::open(kv)?;
        let library = Library::open(
            persister,
            config.store.history_limit,
            config.store.gallery_limit,
        )?;
        let provider = HttpProvider::new(&config.generator);
        let coordinator = Coordinator::new(Box::new(provider), config.locale);
        Ok(Self {
            library,
            coordinator,
        })
    }

    pub fn run(&mut self, args: &[String]) -> Result<()> {
        let command = args.first().map(|s| s.as_str()).unwrap_or("history");
        let rest = &args[1.min(args.len())..];
        match command {
            "generate" => self.generate(rest),
            "series" => self.series(rest),
            "edit" => self.edit(rest),
            "history" => self.show_history(),
            "favorites" => self.show_favorites(),
            "favorite" => self.toggle_favorite(rest),
            "gallery" => self.gallery(rest),
            "delete" => self.delete(rest),
            "folder" => self.folder(rest),
            "profile" => self.profile(rest),
            "theme" => self.theme(rest),
            "refine" => self.refine(rest),
            "narrate" => self.narrate(rest),
            other => bail!("unknown command: {}", other),
        }
    }

    fn generate(&mut self, args: &[String]) -> Result<()> {
        let mut prompt = None;
        let mut negative_prompt = String::new();
        let mut uploads = Vec::new();
        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "--negative" => {
                    negative_prompt = take_value(args, &mut i, "--negative")?;
                }
                "--image" => {
                    let path = take_value(args, &mut i, "--image")?;
                    uploads.push(load_upload(Path::new(&path))?);
                }
                text if prompt.is_none() => prompt = Some(text.to_string()),
                other => bail!("unexpected argument: {}", other),
            }
            i += 1;
        }
        let prompt = prompt.ok_or_else(|| anyhow!("generate requires a prompt"))?;

        let run_id = self.coordinator.create(
            &mut self.library,
            CreateRequest {
                prompt,
                negative_prompt,
                uploaded_images: uploads,
                ..CreateRequest::default()
            },
        )?;
        let run = self
            .library
            .history()
            .iter()
            .find(|i| i.id == run_id)
            .ok_or_else(|| anyhow!("run {} was evicted immediately", run_id))?;
        println!("run {} with {} image(s):", run.id, run.generated_images.len());
        for img in &run.generated_images {
            println!("  {}", img.id);
        }
        Ok(())
    }

    fn series(&mut self, args: &[String]) -> Result<()> {
        let mut base = None;
        let mut steps = Vec::new();
        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "--step" => steps.push(take_value(args, &mut i, "--step")?),
                text if base.is_none() => base = Some(text.to_string()),
                other => bail!("unexpected argument: {}", other),
            }
            i += 1;
        }
        let base = base.ok_or_else(|| anyhow!("series requires a base prompt"))?;
        if steps.is_empty() {
            bail!("series requires at least one --step");
        }

        let run_id =
            self.coordinator
                .create_series(&mut self.library, &base, &steps, CreateRequest::default())?;
        println!("series run {} committed ({} steps)", run_id, steps.len());
        Ok(())
    }

    fn edit(&mut self, args: &[String]) -> Result<()> {
        let [image_id, kind, rest @ ..] = args else {
            bail!("usage: edit <image-id> <crop|upscale|remix|expand|fix|add-object|add-person> ...");
        };
        let action = match kind.as_str() {
            "crop" => {
                let [x, y, w, h] = rest else {
                    bail!("usage: edit <image-id> crop <x> <y> <width> <height>");
                };
                EditAction::Crop(CropRegion {
                    x: x.parse()?,
                    y: y.parse()?,
                    width: w.parse()?,
                    height: h.parse()?,
                })
            }
            "upscale" => EditAction::Upscale,
            "remix" => EditAction::Remix(joined_text(rest, "remix")?),
            "expand" => EditAction::Expand(joined_text(rest, "expand")?),
            "fix" => EditAction::Fix(joined_text(rest, "fix")?),
            "add-object" => {
                let [object, mask_path] = rest else {
                    bail!("usage: edit <image-id> add-object <object> <mask-path>");
                };
                EditAction::AddObject {
                    object: object.clone(),
                    mask: load_part(Path::new(mask_path))?,
                }
            }
            "add-person" => {
                let [photo_path, caption @ ..] = rest else {
                    bail!("usage: edit <image-id> add-person <photo-path> [caption...]");
                };
                let caption = (!caption.is_empty()).then(|| caption.join(" "));
                EditAction::AddPerson {
                    photo: load_part(Path::new(photo_path))?,
                    caption,
                }
            }
            other => bail!("unknown edit action: {}", other),
        };

        let history_id = self.owning_run(image_id)?;
        self.coordinator
            .replace(&mut self.library, &history_id, image_id, action)?;
        println!("image {} updated", image_id);
        Ok(())
    }

    fn show_history(&self) -> Result<()> {
        for item in self.library.history().iter().rev() {
            println!(
                "{}  [{} image(s)]  {}",
                item.id,
                item.generated_images.len(),
                first_line(&item.prompt)
            );
            for img in &item.generated_images {
                let star = if img.is_favorite { "*" } else { " " };
                println!("  {} {}", star, img.id);
            }
        }
        Ok(())
    }

    fn show_favorites(&self) -> Result<()> {
        for fav in self.library.favorites() {
            println!("{}  (run {})  {}", fav.image.id, fav.history_id, first_line(&fav.prompt));
        }
        Ok(())
    }

    fn toggle_favorite(&mut self, args: &[String]) -> Result<()> {
        let [image_id] = args else {
            bail!("usage: favorite <image-id>");
        };
        let history_id = self.owning_run(image_id)?;
        let (_, img) = self
            .library
            .find_image(image_id)
            .ok_or_else(|| anyhow!("image not found: {}", image_id))?;
        let next = !img.is_favorite;
        self.library.apply_image_update(
            &history_id,
            image_id,
            ImageUpdate {
                is_favorite: Some(next),
                ..ImageUpdate::default()
            },
        )?;
        println!("{} {}", image_id, if next { "favorited" } else { "unfavorited" });
        Ok(())
    }

    fn gallery(&mut self, args: &[String]) -> Result<()> {
        match args {
            [] => {
                for entry in self.library.gallery() {
                    println!("{}  ->  {}  {}", entry.id, entry.image_id, first_line(&entry.prompt));
                }
                Ok(())
            }
            [toggle, image_id] if toggle == "toggle" => {
                match self.library.toggle_gallery(image_id)? {
                    Some(outcome) => println!("{} {:?}", image_id, outcome),
                    None => println!("image not found: {}", image_id),
                }
                Ok(())
            }
            _ => bail!("usage: gallery [toggle <image-id>]"),
        }
    }

    fn delete(&mut self, args: &[String]) -> Result<()> {
        let [image_id] = args else {
            bail!("usage: delete <image-id>");
        };
        let history_id = self.owning_run(image_id)?;
        if self.library.delete_image(&history_id, image_id)? {
            println!("image {} deleted", image_id);
        } else {
            println!("image not found: {}", image_id);
        }
        Ok(())
    }

    fn folder(&mut self, args: &[String]) -> Result<()> {
        match args {
            [] => {
                for folder in self.library.folders() {
                    println!("{}  {}", folder.id, folder.name);
                }
                Ok(())
            }
            [add, name] if add == "add" => {
                let id = self.library.add_folder(name)?;
                println!("folder {} created", id);
                Ok(())
            }
            [rm, id] if rm == "rm" => {
                if self.library.delete_folder(id)? {
                    println!("folder {} deleted", id);
                } else {
                    println!("folder not found: {}", id);
                }
                Ok(())
            }
            [assign, run_id, folder_id] if assign == "assign" => {
                if self.library.assign_folder(run_id, Some(folder_id))? {
                    println!("run {} moved", run_id);
                } else {
                    println!("run or folder not found");
                }
                Ok(())
            }
            _ => bail!("usage: folder [add <name> | rm <id> | assign <run-id> <folder-id>]"),
        }
    }

    fn profile(&mut self, args: &[String]) -> Result<()> {
        match args {
            [] => {
                for profile in self.library.profiles() {
                    println!("{}  {}  {}", profile.id, profile.name, first_line(&profile.prompt));
                }
                Ok(())
            }
            [save, name, prompt @ ..] if save == "save" && !prompt.is_empty() => {
                let config = LiveConfig {
                    prompt: prompt.join(" "),
                    ..LiveConfig::default()
                };
                let id = self.library.save_profile(name, &config)?;
                println!("profile {} saved", id);
                Ok(())
            }
            [rm, id] if rm == "rm" => {
                if self.library.delete_profile(id)? {
                    println!("profile {} deleted", id);
                } else {
                    println!("profile not found: {}", id);
                }
                Ok(())
            }
            _ => bail!("usage: profile [save <name> <prompt...> | rm <id>]"),
        }
    }

    fn theme(&mut self, args: &[String]) -> Result<()> {
        match args {
            [] => {
                println!("{}", self.library.theme()?.as_deref().unwrap_or("light"));
                Ok(())
            }
            [value] => {
                self.library.set_theme(value)?;
                Ok(())
            }
            _ => bail!("usage: theme [light|dark]"),
        }
    }

    fn refine(&mut self, args: &[String]) -> Result<()> {
        if args.is_empty() {
            bail!("usage: refine <prompt...>");
        }
        let refined = self.coordinator.refine_prompt(&args.join(" "))?;
        println!("{}", refined);
        Ok(())
    }

    fn narrate(&mut self, args: &[String]) -> Result<()> {
        if args.is_empty() {
            bail!("usage: narrate <image-id>...");
        }
        let mut srcs = Vec::new();
        for image_id in args {
            let (_, img) = self
                .library
                .find_image(image_id)
                .ok_or_else(|| anyhow!("image not found: {}", image_id))?;
            srcs.push(img.src.clone());
        }
        println!("{}", self.coordinator.narrate(&srcs)?);
        Ok(())
    }

    fn owning_run(&self, image_id: &str) -> Result<String> {
        self.library
            .find_image(image_id)
            .map(|(item, _)| item.id.clone())
            .ok_or_else(|| anyhow!("image not found: {}", image_id))
    }
}

fn take_value(args: &[String], i: &mut usize, flag: &str) -> Result<String> {
    *i += 1;
    args.get(*i)
        .cloned()
        .ok_or_else(|| anyhow!("{} requires a value", flag))
}

fn joined_text(rest: &[String], action: &str) -> Result<String> {
    if rest.is_empty() {
        bail!("{} requires an instruction", action);
    }
    Ok(rest.join(" "))
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}

fn load_part(path: &Path) -> Result<ImagePart> {
    let bytes = std::fs::read(path)?;
    let mime_type = match path.extension().and_then(|e| e.to_str()) {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    };
    Ok(ImagePart {
        mime_type: mime_type.to_string(),
        data: BASE64.encode(&bytes),
    })
}

fn load_upload(path: &Path) -> Result<UploadedImage> {
    let part = load_part(path)?;
    Ok(UploadedImage {
        mime_type: part.mime_type.clone(),
        base64: part.to_data_uri(),
    })
}
