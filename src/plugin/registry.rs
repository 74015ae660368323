//! Registry of the plugins enabled at startup

use dashmap::DashMap;
use reqwest::Client;
use std::sync::Arc;
use tracing::{info, warn};

use crate::backend::http_backend::WorkerClient;
use crate::config::Settings;
use crate::error::{AppError, Result};
use crate::plugin::{unsupported, Capability, HttpPlugin, Plugin, PluginInfo};

/// Fixed set of named plugins. The set of names does not change after
/// startup; each plugin's sub-model selection does.
pub struct PluginRegistry {
    plugins: DashMap<String, Arc<dyn Plugin>>,
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            plugins: DashMap::new(),
        }
    }

    /// Build worker-backed plugins for every configured entry
    pub fn from_settings(settings: &Settings, client: Client) -> Self {
        let registry = Self::new();

        for entry in &settings.plugins {
            let endpoint = entry.endpoint.as_deref().unwrap_or(&settings.worker.endpoint);
            let worker = WorkerClient::with_client(client.clone(), endpoint);
            registry.register(Arc::new(HttpPlugin::new(entry.name, worker, entry.model.clone())));
        }

        registry
    }

    pub fn register(&self, plugin: Arc<dyn Plugin>) {
        let name = plugin.name().to_string();
        info!(
            plugin = %name,
            gen_image = plugin.capabilities().gen_image,
            gen_mask = plugin.capabilities().gen_mask,
            model = ?plugin.current_model(),
            "Registered plugin"
        );
        if self.plugins.insert(name.clone(), plugin).is_some() {
            warn!(plugin = %name, "Plugin registered twice; keeping the latest");
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.plugins.get(name).map(|p| p.value().clone())
    }

    /// Look up a plugin that supports `capability`
    pub fn resolve(&self, name: &str, capability: Capability) -> Result<Arc<dyn Plugin>> {
        let plugin = self
            .get(name)
            .ok_or_else(|| AppError::PluginNotFound(name.to_string()))?;

        if !plugin.capabilities().supports(capability) {
            return Err(unsupported(name, capability));
        }

        Ok(plugin)
    }

    /// Switch a plugin's sub-model. Returns `Ok(false)` when no plugin is
    /// registered under `name`.
    pub async fn switch_model(&self, name: &str, model: &str) -> Result<bool> {
        let Some(plugin) = self.get(name) else {
            return Ok(false);
        };

        let catalog = plugin.kind().model_catalog();
        if !catalog.is_empty() && !catalog.contains(&model) {
            return Err(AppError::ModelNotFound(format!("{} (plugin {})", model, name)));
        }

        plugin.switch_model(model).await?;
        info!(plugin = %name, model = %model, "Switched plugin model");
        Ok(true)
    }

    /// Descriptors of all plugins, sorted by name
    pub fn infos(&self) -> Vec<PluginInfo> {
        let mut infos: Vec<PluginInfo> = self
            .plugins
            .iter()
            .map(|entry| {
                let capabilities = entry.value().capabilities();
                PluginInfo {
                    name: entry.key().clone(),
                    support_gen_image: capabilities.gen_image,
                    support_gen_mask: capabilities.gen_mask,
                }
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}
