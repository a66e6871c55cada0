//! Chunked log upload.
//!
//! Console output is shipped to the hub in blocks, each tagged with its
//! byte offset and an md5 digest of the block so the hub can verify and
//! reassemble the file. A final marker with a negative offset tells the
//! hub the transfer is complete.

use std::sync::Arc;

use base64::prelude::*;
use md5::{Digest, Md5};

use labwatch_hub::{ChunkOffset, ControlPlane, LogChunk, RecipeId};

use crate::error::AgentResult;

/// Uploads blocks of one log file to the hub's log store.
pub struct ChunkedUploader {
    plane: Arc<dyn ControlPlane>,
    recipe_id: RecipeId,
    path: String,
    name: String,
}

impl ChunkedUploader {
    /// Create an uploader for one destination file of a recipe.
    ///
    /// `path` is the directory within the recipe's log store and `name`
    /// the file name within it.
    #[must_use]
    pub fn new(
        plane: Arc<dyn ControlPlane>,
        recipe_id: RecipeId,
        path: String,
        name: String,
    ) -> Self {
        Self {
            plane,
            recipe_id,
            path,
            name,
        }
    }

    /// Upload one block at the given byte offset.
    pub async fn upload_block(&self, offset: u64, bytes: &[u8]) -> AgentResult<()> {
        self.submit(ChunkOffset::Data(offset), bytes).await
    }

    /// Mark the transfer complete.
    ///
    /// Monitors are normally stopped by signal mid-stream, so this is
    /// only reached when a log is closed in an orderly fashion.
    pub async fn finish(&self) -> AgentResult<()> {
        self.submit(ChunkOffset::Final, &[]).await
    }

    async fn submit(&self, offset: ChunkOffset, bytes: &[u8]) -> AgentResult<()> {
        let chunk = LogChunk {
            path: self.path.clone(),
            name: self.name.clone(),
            size: bytes.len() as u64,
            md5: hex::encode(Md5::digest(bytes)),
            offset,
            data: BASE64_STANDARD.encode(bytes),
        };

        self.plane.upload_chunk(self.recipe_id, &chunk).await?;
        Ok(())
    }
}
