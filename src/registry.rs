//! Generation Type Registry
//!
//! The single lookup table mapping each generation type to its parser, saver
//! and model-client kind. Built once at startup and consulted by every call
//! site instead of matching on the type again.

use crate::parser::{CodeParser, HtmlCodeParser, MultiFileCodeParser};
use crate::saver::{CodeFileSaver, HtmlCodeFileSaver, MultiFileCodeFileSaver};
use crate::types::*;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientKind {
    /// Plain chat model: one-shot completion or text token stream.
    Chat,
    /// Streaming model with tool execution (file writes) mid-generation.
    ToolStreaming,
}

#[derive(Clone)]
pub struct GenerationProfile {
    pub gen_type: GenerationType,
    pub client_kind: ClientKind,
    pub parser: Option<Arc<dyn CodeParser>>,
    pub saver: Option<Arc<dyn CodeFileSaver>>,
}

impl GenerationProfile {
    /// Whether the facade parses and saves output itself. Tool-driven
    /// projects are written by the tools during generation instead.
    pub fn persists_artifact(&self) -> bool {
        self.parser.is_some() && self.saver.is_some()
    }
}

pub struct GenerationRegistry {
    profiles: HashMap<GenerationType, GenerationProfile>,
}

impl GenerationRegistry {
    pub fn empty() -> Self {
        Self {
            profiles: HashMap::new(),
        }
    }

    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register(GenerationProfile {
            gen_type: GenerationType::SingleFile,
            client_kind: ClientKind::Chat,
            parser: Some(Arc::new(HtmlCodeParser)),
            saver: Some(Arc::new(HtmlCodeFileSaver)),
        });
        registry.register(GenerationProfile {
            gen_type: GenerationType::MultiFile,
            client_kind: ClientKind::Chat,
            parser: Some(Arc::new(MultiFileCodeParser)),
            saver: Some(Arc::new(MultiFileCodeFileSaver)),
        });
        registry.register(GenerationProfile {
            gen_type: GenerationType::ToolDrivenProject,
            client_kind: ClientKind::ToolStreaming,
            parser: None,
            saver: None,
        });
        registry
    }

    pub fn register(&mut self, profile: GenerationProfile) {
        self.profiles.insert(profile.gen_type, profile);
    }

    pub fn profile(&self, gen_type: GenerationType) -> Result<&GenerationProfile> {
        match self.profiles.get(&gen_type) {
            Some(p) => Ok(p),
            None => Err(CodeloomError::Configuration(format!(
                "No generation profile registered for {}",
                gen_type
            ))
            .into()),
        }
    }

    pub fn parser(&self, gen_type: GenerationType) -> Result<Arc<dyn CodeParser>> {
        match &self.profile(gen_type)?.parser {
            Some(p) => Ok(p.clone()),
            None => Err(CodeloomError::Configuration(format!(
                "No code parser for generation type {}",
                gen_type
            ))
            .into()),
        }
    }

    pub fn saver(&self, gen_type: GenerationType) -> Result<Arc<dyn CodeFileSaver>> {
        match &self.profile(gen_type)?.saver {
            Some(s) => Ok(s.clone()),
            None => Err(CodeloomError::Configuration(format!(
                "No code file saver for generation type {}",
                gen_type
            ))
            .into()),
        }
    }
}

impl Default for GenerationRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
