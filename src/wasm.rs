use crate::{CompileOptions, SpriteSource};
use serde::Deserialize;
use wasm_bindgen::prelude::*;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WasmOptions {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    frame_delay_ms: Option<u64>,
    #[serde(default)]
    broadcast_wait_ms: Option<u64>,
    #[serde(default)]
    auto_start: Option<bool>,
}

impl WasmOptions {
    fn into_options(self) -> CompileOptions {
        let defaults = CompileOptions::default();
        CompileOptions {
            title: self.title.unwrap_or(defaults.title),
            frame_delay_ms: self.frame_delay_ms.unwrap_or(defaults.frame_delay_ms),
            broadcast_wait_ms: self.broadcast_wait_ms.unwrap_or(defaults.broadcast_wait_ms),
            auto_start: self.auto_start.unwrap_or(defaults.auto_start),
        }
    }
}

/// Compiles one sprite and returns the `CompileResult` as JSON.
#[wasm_bindgen]
pub fn compile_source(source: &str) -> Result<String, JsValue> {
    to_json(&crate::compile(source))
}

/// Takes a JSON array of sprite sources (`name`, `code`, `isStage`,
/// `costumeNames`, `soundNames`).
#[wasm_bindgen]
pub fn compile_sprites(sprites_json: &str) -> Result<String, JsValue> {
    let sprites: Vec<SpriteSource> =
        serde_json::from_str(sprites_json).map_err(|e| JsValue::from_str(&e.to_string()))?;
    to_json(&crate::compile_multi_sprite(&sprites))
}

#[wasm_bindgen]
pub fn compile_sprites_with_options(sprites_json: &str, options_json: &str) -> Result<String, JsValue> {
    let sprites: Vec<SpriteSource> =
        serde_json::from_str(sprites_json).map_err(|e| JsValue::from_str(&e.to_string()))?;
    let options: WasmOptions =
        serde_json::from_str(options_json).map_err(|e| JsValue::from_str(&e.to_string()))?;
    to_json(&crate::compile_multi_sprite_with_options(
        &sprites,
        &options.into_options(),
    ))
}

fn to_json(result: &crate::CompileResult) -> Result<String, JsValue> {
    serde_json::to_string(result).map_err(|e| JsValue::from_str(&e.to_string()))
}
