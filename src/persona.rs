//! Persona and fact sheet documents
//!
//! Both documents are plain JSON files read at session start. The store
//! keeps the last parsed pair keyed by the SHA-256 fingerprint of the raw
//! bytes, so reloading is cheap when nothing changed on disk.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Error, Result};

/// Descriptive profile used to steer generated responses
///
/// Every field is optional; the prompt builder supplies defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Persona {
    /// Display name the assistant speaks as
    pub name: Option<String>,

    /// Who the persona is (free text)
    pub role: Option<String>,

    /// Overall tone (e.g. "warm, direct")
    pub tone: Option<String>,

    /// How sentences should sound when spoken
    pub speaking_style: Option<String>,

    /// Situation the conversation happens in
    pub context: Option<String>,

    /// Extra behavioral instructions, in order
    #[serde(default)]
    pub instructions: Vec<String>,
}

impl Persona {
    /// First word of the display name, for page headers
    #[must_use]
    pub fn first_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .and_then(|n| n.split_whitespace().next())
    }
}

/// Grounding data constraining factual claims
///
/// Arbitrary JSON; the prompt builder renders it verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct FactSheet(pub serde_json::Value);

impl FactSheet {
    /// An empty fact sheet (`{}`)
    #[must_use]
    pub fn empty() -> Self {
        Self(serde_json::Value::Object(serde_json::Map::new()))
    }
}

/// Content fingerprint of a document (SHA-256, hex)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint raw document bytes
    #[must_use]
    pub fn of(bytes: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(bytes)))
    }

    /// Hex digest
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A parsed persona + fact sheet pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonaDocuments {
    pub persona: Persona,
    pub facts: FactSheet,
}

impl PersonaDocuments {
    /// Parse both documents from raw bytes
    ///
    /// # Errors
    ///
    /// Returns `Error::DataLoad` naming the offending path if either
    /// document is not valid JSON of the expected shape
    pub fn parse(
        persona_path: &Path,
        persona_bytes: &[u8],
        facts_path: &Path,
        facts_bytes: &[u8],
    ) -> Result<Self> {
        let persona: Persona =
            serde_json::from_slice(persona_bytes).map_err(|e| Error::DataLoad {
                path: persona_path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let facts: FactSheet =
            serde_json::from_slice(facts_bytes).map_err(|e| Error::DataLoad {
                path: facts_path.to_path_buf(),
                reason: e.to_string(),
            })?;

        Ok(Self { persona, facts })
    }
}

struct CachedDocuments {
    persona_fingerprint: Fingerprint,
    facts_fingerprint: Fingerprint,
    documents: Arc<PersonaDocuments>,
}

/// Loads persona documents, re-parsing only when their content changes
///
/// There is no file watch. Call [`PersonaStore::load`] whenever changes
/// should be picked up; each call re-fingerprints both files.
pub struct PersonaStore {
    persona_path: PathBuf,
    facts_path: PathBuf,
    cache: Mutex<Option<CachedDocuments>>,
}

impl PersonaStore {
    /// Create a store for the given document paths
    #[must_use]
    pub const fn new(persona_path: PathBuf, facts_path: PathBuf) -> Self {
        Self {
            persona_path,
            facts_path,
            cache: Mutex::new(None),
        }
    }

    /// Path of the persona document
    #[must_use]
    pub fn persona_path(&self) -> &Path {
        &self.persona_path
    }

    /// Path of the fact sheet document
    #[must_use]
    pub fn facts_path(&self) -> &Path {
        &self.facts_path
    }

    /// Load both documents
    ///
    /// Reads the files, fingerprints them, and returns the cached pair if
    /// both fingerprints match the last successful load.
    ///
    /// # Errors
    ///
    /// Returns `Error::DataLoad` if either file is missing or malformed
    pub fn load(&self) -> Result<Arc<PersonaDocuments>> {
        let persona_bytes = read_document(&self.persona_path)?;
        let facts_bytes = read_document(&self.facts_path)?;

        let persona_fingerprint = Fingerprint::of(&persona_bytes);
        let facts_fingerprint = Fingerprint::of(&facts_bytes);

        let mut cache = self
            .cache
            .lock()
            .map_err(|_| Error::Config("persona cache lock poisoned".to_string()))?;

        if let Some(cached) = cache.as_ref() {
            if cached.persona_fingerprint == persona_fingerprint
                && cached.facts_fingerprint == facts_fingerprint
            {
                tracing::debug!(
                    persona = %persona_fingerprint,
                    facts = %facts_fingerprint,
                    "persona documents unchanged, using cache"
                );
                return Ok(Arc::clone(&cached.documents));
            }
        }

        let documents = Arc::new(PersonaDocuments::parse(
            &self.persona_path,
            &persona_bytes,
            &self.facts_path,
            &facts_bytes,
        )?);

        tracing::info!(
            persona_path = %self.persona_path.display(),
            facts_path = %self.facts_path.display(),
            persona = %persona_fingerprint,
            facts = %facts_fingerprint,
            "loaded persona documents"
        );

        *cache = Some(CachedDocuments {
            persona_fingerprint,
            facts_fingerprint,
            documents: Arc::clone(&documents),
        });

        Ok(documents)
    }
}

fn read_document(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| Error::DataLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}
