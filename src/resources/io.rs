//! Reading asset files: from `./assets` natively, relative to the page origin
//! on the web.

use anyhow::Context as _;

use super::{SceneContext, SceneData};

#[cfg(target_arch = "wasm32")]
fn format_url(file_name: &str) -> anyhow::Result<reqwest::Url> {
    let window = web_sys::window().ok_or_else(|| anyhow::anyhow!("no window"))?;
    let origin = window
        .location()
        .origin()
        .map_err(|_| anyhow::anyhow!("page has no origin"))?;
    let base = reqwest::Url::parse(&format!("{origin}/assets/"))?;
    Ok(base.join(file_name)?)
}

#[cfg(not(target_arch = "wasm32"))]
fn asset_path(file_name: &str) -> std::path::PathBuf {
    std::path::Path::new("./").join("assets").join(file_name)
}

pub async fn load_string(file_name: &str) -> anyhow::Result<String> {
    #[cfg(target_arch = "wasm32")]
    let txt = {
        let url = format_url(file_name)?;
        reqwest::get(url).await?.text().await?
    };
    #[cfg(not(target_arch = "wasm32"))]
    let txt = std::fs::read_to_string(asset_path(file_name))
        .with_context(|| format!("reading {file_name}"))?;

    Ok(txt)
}

pub async fn load_binary(file_name: &str) -> anyhow::Result<Vec<u8>> {
    #[cfg(target_arch = "wasm32")]
    let data = {
        let url = format_url(file_name)?;
        reqwest::get(url).await?.bytes().await?.to_vec()
    };
    #[cfg(not(target_arch = "wasm32"))]
    let data =
        std::fs::read(asset_path(file_name)).with_context(|| format!("reading {file_name}"))?;

    Ok(data)
}

/// Fetch a `.glb` file, decode it and read its resources. Images are decoded
/// before this returns; nothing is uploaded.
pub async fn load_scene(file_name: &str) -> anyhow::Result<(SceneData, SceneContext)> {
    let bytes = load_binary(file_name).await?;
    let scene = SceneData::from_glb(&bytes).with_context(|| format!("decoding {file_name}"))?;
    let context = SceneContext::load(&scene)
        .await
        .with_context(|| format!("loading resources of {file_name}"))?;
    log::info!("Loaded scene {file_name}");
    Ok((scene, context))
}
