use anyhow::Result;
use std::path::PathBuf;

use atelier::app::App;
use atelier::config::Config;
use atelier::logging;

fn parse_args() -> (Option<PathBuf>, Vec<String>) {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = None;
    let mut command = Vec::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("atelier {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
            }
            _ => {
                // Remaining arguments form the subcommand
                command.extend(args[i..].iter().cloned());
                break;
            }
        }
        i += 1;
    }

    (config_path, command)
}

fn print_help() {
    println!(
        r#"atelier - image-generation studio engine

USAGE:
    atelier [OPTIONS] <COMMAND> [ARGS]

COMMANDS:
    generate <prompt> [--negative TEXT] [--image PATH]...
                        Generate a new run of images
    series <prompt> --step TEXT [--step TEXT]...
                        Generate a sequential story series
    edit <image-id> <crop|upscale|remix|expand|fix|add-object|add-person> ...
                        Replace one image in place
    history             List generation runs, newest first
    favorites           List favorited images
    favorite <image-id> Toggle an image's favorite flag
    gallery [toggle <image-id>]
                        Show the gallery, or toggle membership
    delete <image-id>   Remove an image (and its run when it was the last one)
    folder [add NAME | rm ID | assign RUN-ID FOLDER-ID]
                        Manage project folders
    profile [save NAME PROMPT... | rm ID]
                        Manage style profiles
    theme [light|dark]  Show or set the display theme
    refine <prompt>     Rewrite a prompt with richer detail
    narrate <image-id>...
                        Write a short narrative for the given images

OPTIONS:
    --config, -c PATH   Path to config file
    --version, -V       Show version
    --help, -h          Show this help message

ENVIRONMENT:
    ATELIER_LOG         Log level (trace, debug, info, warn, error)

Config file location: $XDG_CONFIG_HOME/atelier/config.toml"#
    );
}

fn main() -> Result<()> {
    let (config_path, command) = parse_args();

    // Initialize logging (uses journald on Linux, file fallback otherwise)
    let _ = logging::init(None);

    // Load configuration
    let config = match config_path {
        Some(path) => Config::load_from(&path)?,
        None => Config::load()?,
    };

    let mut app = App::new(config)?;
    app.run(&command)
}
