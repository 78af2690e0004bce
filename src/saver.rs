use crate::constants::{INDEX_HTML_FILE, SCRIPT_JS_FILE, STYLE_CSS_FILE};
use crate::content_store::ContentStore;
use crate::registry::GenerationRegistry;
use crate::types::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Maps an artifact onto the files it produces. The write sequence itself
/// (validate, build the target directory, write non-blank files) is shared
/// and lives in [`SaverDispatch`].
pub trait CodeFileSaver: Send + Sync {
    fn generation_type(&self) -> GenerationType;

    /// `(file name, content)` pairs in write order.
    fn files<'a>(&self, artifact: &'a GeneratedArtifact) -> Result<Vec<(&'static str, &'a str)>>;

    fn validate(&self, artifact: &GeneratedArtifact) -> Result<()> {
        if artifact.generation_type() != self.generation_type() {
            return Err(CodeloomError::Configuration(format!(
                "{} saver cannot save a {} artifact",
                self.generation_type(),
                artifact.generation_type()
            ))
            .into());
        }
        artifact.validate()
    }
}

#[derive(Debug, Default)]
pub struct HtmlCodeFileSaver;

impl CodeFileSaver for HtmlCodeFileSaver {
    fn generation_type(&self) -> GenerationType {
        GenerationType::SingleFile
    }

    fn files<'a>(&self, artifact: &'a GeneratedArtifact) -> Result<Vec<(&'static str, &'a str)>> {
        match artifact {
            GeneratedArtifact::SingleFile(a) => Ok(vec![(INDEX_HTML_FILE, a.html.as_str())]),
            other => Err(CodeloomError::Configuration(format!(
                "html saver received a {} artifact",
                other.generation_type()
            ))
            .into()),
        }
    }
}

#[derive(Debug, Default)]
pub struct MultiFileCodeFileSaver;

impl CodeFileSaver for MultiFileCodeFileSaver {
    fn generation_type(&self) -> GenerationType {
        GenerationType::MultiFile
    }

    fn files<'a>(&self, artifact: &'a GeneratedArtifact) -> Result<Vec<(&'static str, &'a str)>> {
        match artifact {
            GeneratedArtifact::MultiFile(a) => Ok(vec![
                (INDEX_HTML_FILE, a.html.as_str()),
                (STYLE_CSS_FILE, a.css.as_str()),
                (SCRIPT_JS_FILE, a.js.as_str()),
            ]),
            other => Err(CodeloomError::Configuration(format!(
                "multi-file saver received a {} artifact",
                other.generation_type()
            ))
            .into()),
        }
    }
}

/// Routes an artifact to its saver and writes it under
/// `{root}/{type key}_{app id}`. The same pair always lands in the same
/// directory, so regenerating overwrites the previous version.
#[derive(Clone)]
pub struct SaverDispatch {
    registry: Arc<GenerationRegistry>,
    store: Arc<dyn ContentStore>,
    root: PathBuf,
}

impl SaverDispatch {
    pub fn new(
        registry: Arc<GenerationRegistry>,
        store: Arc<dyn ContentStore>,
        root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            registry,
            store,
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn location(&self, gen_type: GenerationType, app_id: AppId) -> PathBuf {
        self.root.join(gen_type.dir_name(app_id))
    }

    pub async fn save(
        &self,
        gen_type: GenerationType,
        artifact: &GeneratedArtifact,
        app_id: AppId,
    ) -> Result<PathBuf> {
        let saver = self.registry.saver(gen_type)?;
        saver.validate(artifact)?;
        let files: Vec<(&'static str, &str)> = saver
            .files(artifact)?
            .into_iter()
            .filter(|(name, content)| {
                let blank = content.trim().is_empty();
                if blank {
                    tracing::debug!("[💾] Skipping empty {} for app {}", name, app_id);
                }
                !blank
            })
            .collect();
        if files.is_empty() {
            return Err(CodeloomError::Validation(format!(
                "{} artifact for app {} has nothing to save",
                gen_type, app_id
            ))
            .into());
        }

        let dir = self.location(gen_type, app_id);
        self.store.ensure_directory(&dir).await?;
        for (name, content) in &files {
            self.store.write(&dir, name, content.as_bytes()).await?;
        }

        tracing::info!(
            "[💾] Saved {} file(s) for app {} ({}) to {}",
            files.len(),
            app_id,
            gen_type,
            dir.display()
        );
        Ok(dir)
    }
}
