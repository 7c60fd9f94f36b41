//! Backend selection with lazy, once-per-process tier loading.
//!
//! Every tier owns a [`OnceCell`] slot: the first caller runs the tier's
//! probe and load, concurrent callers block on the same initialisation and
//! everyone afterwards reuses the outcome, failures included.

use crate::core::errors::MathError;
use crate::core::inference::init_runtime;
use crate::core::traits::Recognizer;
use crate::domain::adapters::{
    Backend, FormulaNetAdapterBuilder, MathpixAdapter, TesseractAdapter, TextLineAdapter,
};
use crate::domain::{BackendFailure, SourceTag};
use crate::pipeline::config::BackendConfig;
use crate::processors::TextMarkupPostProcessor;
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Probes and loads one tier.
pub type BackendLoader = Box<dyn Fn() -> Result<Backend, BackendFailure> + Send + Sync>;

struct TierSlot {
    tag: SourceTag,
    loader: BackendLoader,
    loaded: OnceCell<Result<Arc<Backend>, BackendFailure>>,
}

impl fmt::Debug for TierSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TierSlot")
            .field("tag", &self.tag)
            .field("loaded", &self.loaded.get().map(|r| r.is_ok()))
            .finish()
    }
}

/// Priority-ordered recognition tiers.
#[derive(Debug)]
pub struct BackendSelector {
    tiers: Vec<TierSlot>,
    selected: OnceCell<Option<usize>>,
}

impl BackendSelector {
    /// Tiers in the given order. Duplicate tags keep their first loader.
    pub fn with_loaders(loaders: Vec<(SourceTag, BackendLoader)>) -> Self {
        let mut tiers: Vec<TierSlot> = Vec::with_capacity(loaders.len());
        for (tag, loader) in loaders {
            if tiers.iter().any(|t| t.tag == tag) {
                warn!(backend = %tag, "duplicate tier ignored");
                continue;
            }
            tiers.push(TierSlot {
                tag,
                loader,
                loaded: OnceCell::new(),
            });
        }
        Self {
            tiers,
            selected: OnceCell::new(),
        }
    }

    /// Enabled tiers from `config`, in fixed priority order.
    pub fn from_config(config: &BackendConfig) -> Self {
        let loaders = SourceTag::TIERS
            .into_iter()
            .filter(|tag| config.is_enabled(*tag))
            .map(|tag| {
                let config = config.clone();
                let loader: BackendLoader = Box::new(move || load_tier(tag, &config));
                (tag, loader)
            })
            .collect();
        Self::with_loaders(loaders)
    }

    /// No neural tiers: every recognition uses the rule fallback.
    pub fn empty() -> Self {
        Self::with_loaders(Vec::new())
    }

    pub fn tier_count(&self) -> usize {
        self.tiers.len()
    }

    pub fn tier_tags(&self) -> Vec<SourceTag> {
        self.tiers.iter().map(|t| t.tag).collect()
    }

    /// The first loadable tier, resolved once. Blocks while loading.
    pub fn selected(&self) -> Option<(usize, Arc<Backend>)> {
        let position = *self.selected.get_or_init(|| {
            let found = self.first_available_from(0).map(|(pos, _)| pos);
            match found {
                Some(pos) => info!(backend = %self.tiers[pos].tag, "recognition backend selected"),
                None => info!(backend = %SourceTag::RuleFallback, "recognition backend selected"),
            }
            found
        });
        let pos = position?;
        self.load(pos).map(|backend| (pos, backend))
    }

    /// The first loadable tier at or after `position`. Blocks while loading.
    pub fn first_available_from(&self, position: usize) -> Option<(usize, Arc<Backend>)> {
        (position..self.tiers.len()).find_map(|pos| self.load(pos).map(|b| (pos, b)))
    }

    fn load(&self, pos: usize) -> Option<Arc<Backend>> {
        let slot = self.tiers.get(pos)?;
        let outcome = slot.loaded.get_or_init(|| {
            debug!(backend = %slot.tag, "loading recognition tier");
            let loaded = (slot.loader)().and_then(|backend| {
                if backend.tag() == slot.tag {
                    Ok(Arc::new(backend))
                } else {
                    Err(BackendFailure::Unavailable(format!(
                        "loader for {} produced {}",
                        slot.tag,
                        backend.tag()
                    )))
                }
            });
            if let Err(failure) = &loaded {
                warn!(
                    backend = %slot.tag,
                    failure = failure.kind(),
                    error = %failure,
                    "recognition tier unavailable"
                );
            }
            loaded
        });
        outcome.as_ref().ok().cloned()
    }
}

fn load_tier(tag: SourceTag, config: &BackendConfig) -> Result<Backend, BackendFailure> {
    match tag {
        SourceTag::FormulaNet => {
            let (model, tokenizer) = config
                .formula_model
                .as_deref()
                .zip(config.formula_tokenizer.as_deref())
                .ok_or_else(|| {
                    BackendFailure::MissingWeights(
                        "formula model or tokenizer not configured".to_string(),
                    )
                })?;
            init_runtime(config.ort_dylib.as_deref()).map_err(runtime_unavailable)?;
            let adapter = FormulaNetAdapterBuilder::new()
                .tokenizer_path(tokenizer)
                .with_ort_config(config.ort_session.clone())
                .build(model)?;
            Ok(Backend::FormulaNet(Box::new(adapter)))
        }
        SourceTag::Mathpix => {
            let app_id = config.mathpix_app_id.clone().unwrap_or_default();
            let app_key = config.mathpix_app_key.clone().unwrap_or_default();
            MathpixAdapter::new(config.mathpix_endpoint.clone(), app_id, app_key)
                .map(Backend::Mathpix)
        }
        SourceTag::TextLine => {
            let (model, dict) = config
                .text_model
                .as_deref()
                .zip(config.text_dict.as_deref())
                .ok_or_else(|| {
                    BackendFailure::MissingWeights(
                        "text model or dictionary not configured".to_string(),
                    )
                })?;
            init_runtime(config.ort_dylib.as_deref()).map_err(runtime_unavailable)?;
            let adapter = TextLineAdapter::build(
                model,
                dict,
                config.ort_session.clone(),
                TextMarkupPostProcessor::new(),
            )?;
            Ok(Backend::TextLine(Box::new(adapter)))
        }
        SourceTag::Tesseract => TesseractAdapter::probe(
            config.tesseract_binary.clone(),
            TextMarkupPostProcessor::new(),
        )
        .map(Backend::Tesseract),
        SourceTag::RuleFallback => Err(BackendFailure::Unavailable(
            "rule fallback is not a selectable tier".to_string(),
        )),
    }
}

fn runtime_unavailable(error: MathError) -> BackendFailure {
    BackendFailure::Unavailable(error.to_string())
}
