//! Application state.

use std::sync::Arc;
use std::time::Duration;

use genio_core::MediaType;
use genio_store::Store;

use crate::artifacts::{ArtifactStore, CloudinaryStore};
use crate::config::{ServiceConfig, DEFAULT_CLOUDINARY_BASE_URL};
use crate::gateway::{ProviderGateway, Route, Target};
use crate::ledger::Ledger;
use crate::orchestrator::Orchestrator;
use crate::providers::gemini::DEFAULT_GEMINI_MODEL;
use crate::providers::huggingface::{
    AUDIO_MODEL, IMAGE_MODEL, TEXT_FALLBACK_MODEL, TEXT_MODEL, VIDEO_MODEL,
};
use crate::providers::{GeminiClient, HuggingFaceClient, Provider};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The storage backend.
    pub store: Arc<dyn Store>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Credit ledger.
    pub ledger: Ledger,

    /// Generation orchestrator.
    pub orchestrator: Orchestrator,
}

impl AppState {
    /// Create application state, building provider and artifact clients from
    /// the configuration.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: ServiceConfig) -> Self {
        let gateway = build_gateway(&config);

        let artifacts = config.cloudinary.clone().and_then(|cloudinary| {
            match CloudinaryStore::new(DEFAULT_CLOUDINARY_BASE_URL, cloudinary) {
                Ok(client) => {
                    tracing::info!("Cloudinary artifact storage enabled");
                    Some(Arc::new(client) as Arc<dyn ArtifactStore>)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create Cloudinary client");
                    None
                }
            }
        });

        if artifacts.is_none() {
            tracing::warn!("Cloudinary not configured - image, voice and video generation disabled");
        }

        Self::from_parts(store, config, gateway, artifacts)
    }

    /// Assemble state from already-built parts.
    #[must_use]
    pub fn from_parts(
        store: Arc<dyn Store>,
        config: ServiceConfig,
        gateway: ProviderGateway,
        artifacts: Option<Arc<dyn ArtifactStore>>,
    ) -> Self {
        let ledger = Ledger::new(store.clone());
        let orchestrator = Orchestrator::new(
            ledger.clone(),
            config.pricing.clone(),
            gateway,
            artifacts,
            config.generation_deadline(),
        );

        Self {
            store,
            config,
            ledger,
            orchestrator,
        }
    }
}

/// Route every media type to the providers that have credentials.
fn build_gateway(config: &ServiceConfig) -> ProviderGateway {
    let gemini: Option<Arc<dyn Provider>> = config.gemini_api_key.as_ref().and_then(|key| {
        match GeminiClient::new(&config.gemini_base_url, key) {
            Ok(client) => {
                tracing::info!("Gemini text generation enabled");
                Some(Arc::new(client) as Arc<dyn Provider>)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to create Gemini client");
                None
            }
        }
    });

    let huggingface: Option<Arc<dyn Provider>> =
        config.huggingface_api_key.as_ref().and_then(|key| {
            match HuggingFaceClient::new(&config.huggingface_base_url, key) {
                Ok(client) => {
                    tracing::info!("Hugging Face inference enabled");
                    Some(Arc::new(client) as Arc<dyn Provider>)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create Hugging Face client");
                    None
                }
            }
        });

    let timeouts = config.provider_timeouts;
    let route = |primary: Target, fallback: Option<Target>, timeout: Duration| Route {
        primary,
        fallback,
        timeout,
    };

    let mut gateway = ProviderGateway::new(config.retry);

    let text = match (&gemini, &huggingface) {
        (Some(gemini), hf) => Some(route(
            Target::new(gemini.clone(), DEFAULT_GEMINI_MODEL),
            hf.as_ref().map(|hf| Target::new(hf.clone(), TEXT_MODEL)),
            timeouts.text,
        )),
        (None, Some(hf)) => Some(route(
            Target::new(hf.clone(), TEXT_MODEL),
            Some(Target::new(hf.clone(), TEXT_FALLBACK_MODEL)),
            timeouts.text,
        )),
        (None, None) => None,
    };
    if let Some(text) = text {
        gateway = gateway.with_route(MediaType::Text, text);
    }

    if let Some(hf) = &huggingface {
        gateway = gateway
            .with_route(
                MediaType::Image,
                route(Target::new(hf.clone(), IMAGE_MODEL), None, timeouts.image),
            )
            .with_route(
                MediaType::Voice,
                route(Target::new(hf.clone(), AUDIO_MODEL), None, timeouts.media),
            )
            .with_route(
                MediaType::Video,
                route(Target::new(hf.clone(), VIDEO_MODEL), None, timeouts.media),
            );
    }

    for media in MediaType::ALL {
        if !gateway.has_route(*media) {
            tracing::warn!(%media, "No provider configured - generation disabled");
        }
    }

    gateway
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_providers_route_every_media() {
        let config = ServiceConfig {
            gemini_api_key: Some("g".into()),
            huggingface_api_key: Some("h".into()),
            ..ServiceConfig::default()
        };
        let gateway = build_gateway(&config);
        assert_eq!(gateway.routed_media(), MediaType::ALL.to_vec());
    }

    #[test]
    fn no_credentials_means_no_routes() {
        let gateway = build_gateway(&ServiceConfig::default());
        assert!(gateway.routed_media().is_empty());
    }

    #[test]
    fn gemini_alone_serves_text_only() {
        let config = ServiceConfig {
            gemini_api_key: Some("g".into()),
            ..ServiceConfig::default()
        };
        assert_eq!(build_gateway(&config).routed_media(), vec![MediaType::Text]);
    }
}
