//! Name-tagged face store
//!
//! Faces are saved under a single preference key as a JSON object mapping
//! each name to its raw RGBA pixels (base64). Lookup returns the first saved
//! name whose image is byte-identical to the query after both are
//! downscaled to the compare size.
//!
//! NOTE: exact equality almost never matches two different photos of the
//! same person. Replacing it needs an embedding model and a similarity
//! threshold; the store format would then hold embeddings instead of pixels.

use crate::domain::face::FaceImage;
use crate::io::preferences::PreferenceStore;
use anyhow::Context;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Preference key holding the face map
pub const FACES_KEY: &str = "saved_faces";

/// Default side length of the comparison square
pub const DEFAULT_COMPARE_SIZE: u32 = 64;

#[derive(Debug, Serialize, Deserialize)]
struct StoredFace {
    w: u32,
    h: u32,
    /// Base64 RGBA8 pixels
    px: String,
}

impl StoredFace {
    fn encode(image: &FaceImage) -> Self {
        Self { w: image.width(), h: image.height(), px: STANDARD.encode(image.as_rgba()) }
    }

    fn decode(self) -> anyhow::Result<FaceImage> {
        let rgba = STANDARD.decode(self.px.as_bytes()).context("invalid base64 pixels")?;
        Ok(FaceImage::new(self.w, self.h, rgba)?)
    }
}

pub struct FaceStore {
    store: Arc<dyn PreferenceStore>,
    compare_size: u32,
}

impl FaceStore {
    pub fn new(store: Arc<dyn PreferenceStore>, compare_size: u32) -> Self {
        Self { store, compare_size: compare_size.max(1) }
    }

    pub fn compare_size(&self) -> u32 {
        self.compare_size
    }

    /// Save (or replace) the face tagged with `name`
    pub fn save(&self, name: &str, image: &FaceImage) -> anyhow::Result<()> {
        let mut faces = self.raw_faces()?;
        let encoded = serde_json::to_value(StoredFace::encode(image))?;
        let replaced = faces.insert(name.to_string(), encoded).is_some();
        self.store.put(FACES_KEY, Value::Object(faces)).context("Failed to save face")?;

        info!(
            name = %name,
            width = %image.width(),
            height = %image.height(),
            replaced = %replaced,
            "face_saved"
        );
        Ok(())
    }

    /// Remove a saved face; returns true if it existed
    pub fn forget(&self, name: &str) -> anyhow::Result<bool> {
        let mut faces = self.raw_faces()?;
        if faces.remove(name).is_none() {
            return Ok(false);
        }
        self.store.put(FACES_KEY, Value::Object(faces)).context("Failed to save faces")?;
        info!(name = %name, "face_forgotten");
        Ok(true)
    }

    /// All decodable saved faces, ordered by name
    ///
    /// Entries that fail to decode are skipped.
    pub fn saved_faces(&self) -> anyhow::Result<BTreeMap<String, FaceImage>> {
        let mut decoded = BTreeMap::new();
        for (name, value) in self.raw_faces()? {
            let image = serde_json::from_value::<StoredFace>(value)
                .map_err(anyhow::Error::from)
                .and_then(StoredFace::decode);
            match image {
                Ok(image) => {
                    decoded.insert(name, image);
                }
                Err(e) => {
                    warn!(name = %name, error = %e, "face_entry_undecodable");
                }
            }
        }
        Ok(decoded)
    }

    /// Name of the saved face identical to `image` at the compare size
    pub fn lookup(&self, image: &FaceImage) -> anyhow::Result<Option<String>> {
        let query = image.downscale(self.compare_size);
        for (name, saved) in self.saved_faces()? {
            if saved.downscale(self.compare_size) == query {
                debug!(name = %name, "face_matched");
                return Ok(Some(name));
            }
        }
        debug!("face_no_match");
        Ok(None)
    }

    fn raw_faces(&self) -> anyhow::Result<Map<String, Value>> {
        match self.store.get(FACES_KEY).context("Failed to read saved faces")? {
            Some(Value::Object(map)) => Ok(map),
            Some(other) => {
                warn!(value_len = %other.to_string().len(), "saved_faces_not_an_object");
                Ok(Map::new())
            }
            None => Ok(Map::new()),
        }
    }
}
