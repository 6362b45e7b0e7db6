//! Loading sprite sources from disk, either one file per sprite or through a
//! JSON project manifest.

use crate::SpriteSource;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub title: Option<String>,
    pub sprites: Vec<ManifestSprite>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ManifestSprite {
    #[serde(default)]
    pub name: Option<String>,
    pub file: PathBuf,
    #[serde(default)]
    pub is_stage: bool,
    #[serde(default)]
    pub costume_names: Option<Vec<String>>,
    #[serde(default)]
    pub sound_names: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct LoadedProject {
    pub title: Option<String>,
    pub sprites: Vec<SpriteSource>,
    /// Source path of each sprite, index-aligned with `sprites`.
    pub files: Vec<PathBuf>,
}

pub fn load_manifest(path: &Path) -> Result<LoadedProject> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest '{}'", path.display()))?;
    let manifest: Manifest = serde_json::from_str(&text)
        .with_context(|| format!("Invalid project manifest '{}'", path.display()))?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));

    let mut sprites = Vec::with_capacity(manifest.sprites.len());
    let mut files = Vec::with_capacity(manifest.sprites.len());
    for entry in manifest.sprites {
        let file = if entry.file.is_absolute() {
            entry.file.clone()
        } else {
            base.join(&entry.file)
        };
        let name = match entry.name {
            Some(name) => name,
            None => sprite_name_for(&file)?,
        };
        sprites.push(SpriteSource {
            name,
            code: read_source(&file)?,
            is_stage: entry.is_stage,
            costume_names: entry.costume_names,
            sound_names: entry.sound_names,
        });
        files.push(file);
    }
    Ok(LoadedProject {
        title: manifest.title,
        sprites,
        files,
    })
}

/// One sprite per file, named by file stem. `stage` marks the sprite with
/// that name (case-insensitive) as the Stage.
pub fn sprites_from_files(paths: &[PathBuf], stage: Option<&str>) -> Result<LoadedProject> {
    let mut sprites = Vec::with_capacity(paths.len());
    for path in paths {
        let name = sprite_name_for(path)?;
        let is_stage = stage.is_some_and(|wanted| wanted.eq_ignore_ascii_case(&name));
        sprites.push(SpriteSource {
            name,
            code: read_source(path)?,
            is_stage,
            costume_names: None,
            sound_names: None,
        });
    }
    if let Some(wanted) = stage {
        if !sprites.iter().any(|s| s.is_stage) {
            bail!("--stage '{}' does not match any input file name.", wanted);
        }
    }
    Ok(LoadedProject {
        title: None,
        sprites,
        files: paths.to_vec(),
    })
}

/// Marks `stage` in an already loaded project, clearing any other stage flag.
pub fn mark_stage(project: &mut LoadedProject, stage: &str) -> Result<()> {
    if !project.sprites.iter().any(|s| s.name.eq_ignore_ascii_case(stage)) {
        bail!("--stage '{}' does not match any sprite in the project.", stage);
    }
    for sprite in &mut project.sprites {
        sprite.is_stage = sprite.name.eq_ignore_ascii_case(stage);
    }
    Ok(())
}

/// Sprite names that occur more than once, compared case-insensitively.
pub fn duplicate_names(sprites: &[SpriteSource]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    for sprite in sprites {
        let key = sprite.name.to_lowercase();
        if !seen.insert(key) && !duplicates.iter().any(|d: &String| d.eq_ignore_ascii_case(&sprite.name)) {
            duplicates.push(sprite.name.clone());
        }
    }
    duplicates
}

fn sprite_name_for(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Cannot derive a sprite name from '{}'.", path.display()))
}

fn read_source(path: &Path) -> Result<String> {
    if !path.is_file() {
        bail!("Input file not found: '{}'.", path.display());
    }
    fs::read_to_string(path).with_context(|| format!("Failed to read sprite source '{}'", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn manifest_resolves_files_relative_to_itself() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("sprites")).unwrap();
        fs::write(dir.path().join("sprites/cat.sbtext"), "when flag clicked\n    move 10\n").unwrap();
        fs::write(dir.path().join("backdrop.sbtext"), "when flag clicked\n    next backdrop\n").unwrap();
        let manifest = dir.path().join("project.json");
        fs::write(
            &manifest,
            r#"{
                "title": "Chase",
                "sprites": [
                    { "file": "backdrop.sbtext", "name": "Stage", "isStage": true, "costumeNames": ["day", "night"] },
                    { "file": "sprites/cat.sbtext", "soundNames": ["meow"] }
                ]
            }"#,
        )
        .unwrap();

        let project = load_manifest(&manifest).unwrap();
        assert_eq!(project.title.as_deref(), Some("Chase"));
        assert_eq!(project.sprites.len(), 2);
        assert_eq!(project.sprites[0].name, "Stage");
        assert!(project.sprites[0].is_stage);
        assert_eq!(
            project.sprites[0].costume_names,
            Some(vec!["day".to_string(), "night".to_string()])
        );
        assert_eq!(project.sprites[1].name, "cat");
        assert!(project.sprites[1].code.contains("move 10"));
        assert_eq!(project.files[1], dir.path().join("sprites/cat.sbtext"));
    }

    #[test]
    fn missing_sprite_file_is_reported() {
        let dir = tempdir().unwrap();
        let manifest = dir.path().join("project.json");
        fs::write(&manifest, r#"{ "sprites": [{ "file": "nope.sbtext" }] }"#).unwrap();
        let err = load_manifest(&manifest).unwrap_err();
        assert!(err.to_string().contains("nope.sbtext"));
    }

    #[test]
    fn unknown_manifest_fields_are_rejected() {
        let dir = tempdir().unwrap();
        let manifest = dir.path().join("project.json");
        fs::write(&manifest, r#"{ "sprites": [], "extensions": ["pen"] }"#).unwrap();
        let err = load_manifest(&manifest).unwrap_err();
        assert!(err.to_string().contains("Invalid project manifest"));
    }

    #[test]
    fn files_are_named_by_stem_and_stage_is_marked() {
        let dir = tempdir().unwrap();
        let cat = dir.path().join("Cat.sbtext");
        let stage = dir.path().join("Stage.sbtext");
        fs::write(&cat, "").unwrap();
        fs::write(&stage, "").unwrap();
        let project = sprites_from_files(&[cat, stage], Some("stage")).unwrap();
        let names = project.sprites.iter().map(|s| s.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["Cat", "Stage"]);
        assert!(!project.sprites[0].is_stage);
        assert!(project.sprites[1].is_stage);
    }

    #[test]
    fn unknown_stage_name_is_an_error() {
        let dir = tempdir().unwrap();
        let cat = dir.path().join("cat.sbtext");
        fs::write(&cat, "").unwrap();
        assert!(sprites_from_files(&[cat], Some("Backdrop")).is_err());
    }

    #[test]
    fn duplicate_names_ignore_case() {
        let sprite = |name: &str| SpriteSource {
            name: name.to_string(),
            ..SpriteSource::default()
        };
        let names = duplicate_names(&[sprite("Cat"), sprite("dog"), sprite("cat"), sprite("CAT")]);
        assert_eq!(names, vec!["cat".to_string()]);
    }
}
