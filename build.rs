//! Build script for the chipper showcase.
//!
//! Copies the `.env.example` configuration template into the user's local
//! data directory so that a fresh install finds a ready-to-edit template
//! next to the place where `config::load_env` looks for `.env`:
//!
//! - Linux: `~/.local/share/chipper/.env.example`
//! - macOS: `~/Library/Application Support/chipper/.env.example`
//! - Windows: `%LOCALAPPDATA%/chipper/.env.example`
//!
//! A missing template only produces a cargo warning.

use std::{env, fs, path::PathBuf};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=.env.example");

    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?);
    let template = manifest_dir.join(".env.example");

    let mut out_dir = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    out_dir.push("chipper");
    fs::create_dir_all(&out_dir)?;

    if template.is_file() {
        let contents = fs::read_to_string(&template)?;
        fs::write(out_dir.join(".env.example"), contents)?;
    } else {
        println!(
            "cargo:warning=.env.example not found at {}",
            template.display()
        );
    }

    Ok(())
}
