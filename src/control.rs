//! Model selection and the server configuration snapshot

use serde::Serialize;
use tracing::{debug, info};

use crate::backend::ModelInfo;
use crate::config::ModelConfig;
use crate::error::Result;
use crate::pipeline::{spawn_reclaim, SAMPLERS};
use crate::plugin::{PluginInfo, PluginKind};
use crate::AppState;

/// Read-only projection of the running configuration, rebuilt on every call
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfigResponse {
    pub plugins: Vec<PluginInfo>,
    pub model_infos: Vec<ModelInfo>,
    #[serde(rename = "removeBGModel")]
    pub remove_bg_model: Option<String>,
    #[serde(rename = "removeBGModels")]
    pub remove_bg_models: Vec<&'static str>,
    pub realesrgan_model: Option<String>,
    pub realesrgan_models: Vec<&'static str>,
    pub interactive_seg_model: Option<String>,
    pub interactive_seg_models: Vec<&'static str>,
    pub enable_file_manager: bool,
    pub enable_auto_saving: bool,
    pub disable_model_switch: bool,
    pub enable_controlnet: bool,
    pub controlnet_method: Option<String>,
    pub is_desktop: bool,
    pub samplers: Vec<&'static str>,
}

/// Switch a plugin's sub-model and persist the selection.
///
/// Unknown plugins are ignored so the editor can send selections for
/// plugins this server does not run.
pub async fn switch_plugin_model(state: &AppState, plugin: &str, model: &str) -> Result<()> {
    if !state.plugins.switch_model(plugin, model).await? {
        debug!(plugin = %plugin, "Ignoring model switch for unknown plugin");
        return Ok(());
    }

    {
        let mut settings = state.settings.write().await;
        if let Some(entry) = settings.plugin_mut(plugin) {
            entry.model = Some(model.to_string());
        }
    }
    info!(plugin = %plugin, model = %model, "Plugin model selection saved");

    if let Some(plugin) = state.plugins.get(plugin) {
        spawn_reclaim(plugin);
    }

    Ok(())
}

/// ControlNet is only reported on when configured and the active backend has it
fn controlnet_selection(model: &ModelConfig, active: &ModelInfo) -> (bool, Option<String>) {
    if model.enable_controlnet && active.support_controlnet {
        (true, model.controlnet_method.clone())
    } else {
        (false, None)
    }
}

/// Assemble the configuration snapshot the editor boots from
pub async fn describe_server_config(state: &AppState) -> Result<ServerConfigResponse> {
    let model_infos = state.backends.scan_models().await?;
    let settings = state.settings.read().await;
    let (enable_controlnet, controlnet_method) =
        controlnet_selection(&settings.model, &state.backends.current_model());

    let selected = |kind: PluginKind| {
        settings
            .plugin(kind.as_str())
            .and_then(|entry| entry.model.clone())
            .or_else(|| state.plugins.get(kind.as_str()).and_then(|p| p.current_model()))
            .or_else(|| kind.default_model().map(String::from))
    };

    Ok(ServerConfigResponse {
        plugins: state.plugins.infos(),
        model_infos,
        remove_bg_model: selected(PluginKind::RemoveBg),
        remove_bg_models: PluginKind::RemoveBg.model_catalog().to_vec(),
        realesrgan_model: selected(PluginKind::RealEsrgan),
        realesrgan_models: PluginKind::RealEsrgan.model_catalog().to_vec(),
        interactive_seg_model: selected(PluginKind::InteractiveSeg),
        interactive_seg_models: PluginKind::InteractiveSeg.model_catalog().to_vec(),
        enable_file_manager: settings
            .storage
            .input_path()
            .is_some_and(|path| path.is_dir()),
        enable_auto_saving: settings.storage.output_dir.is_some(),
        disable_model_switch: settings.model.disable_model_switch,
        enable_controlnet,
        controlnet_method,
        is_desktop: false,
        samplers: SAMPLERS.to_vec(),
    })
}
