use std::fmt::{Display, Formatter};
use std::ops::Range;

use azblob_core::{Error, Result};
use serde::Serialize;

/// Identifier of a staged block.
///
/// The block index zero padded to eight digits. Digits belong to the base64
/// alphabet and the width is a multiple of four, so the id is already a valid
/// base64 string of fixed length, and ids sort in upload order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(String);

/// Wide enough for the 50,000 blocks a blob can hold.
const BLOCK_ID_WIDTH: usize = 8;

impl BlockId {
    /// Id of the block at `index`.
    pub fn from_index(index: usize) -> Self {
        Self(format!("{index:0width$}", width = BLOCK_ID_WIDTH))
    }

    /// The encoded id as sent in `blockid`.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for BlockId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for BlockId {
    fn from(v: String) -> Self {
        Self(v)
    }
}

/// How a payload of a given length is uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockPlan {
    /// One put blob with the whole body.
    Single,
    /// One put block per range, then a put block list with the ids in order.
    Blocks(Vec<(BlockId, Range<usize>)>),
}

impl BlockPlan {
    /// Plan the upload of `len` bytes with at most `block_size` bytes per request.
    pub fn new(len: usize, block_size: usize) -> Result<Self> {
        if block_size == 0 {
            return Err(Error::config_invalid("block size must be greater than 0"));
        }
        if len <= block_size {
            return Ok(BlockPlan::Single);
        }

        let blocks = (0..len)
            .step_by(block_size)
            .enumerate()
            .map(|(index, start)| {
                (
                    BlockId::from_index(index),
                    start..(start + block_size).min(len),
                )
            })
            .collect();
        Ok(BlockPlan::Blocks(blocks))
    }
}

/// Request of Put Block List.
#[derive(Debug, Serialize)]
#[serde(rename = "BlockList", rename_all = "PascalCase")]
struct PutBlockListRequest {
    latest: Vec<String>,
}

/// XML body committing `ids` in the given order.
pub fn block_list_body(ids: &[BlockId]) -> Result<String> {
    let content = quick_xml::se::to_string(&PutBlockListRequest {
        latest: ids.iter().map(|v| v.0.clone()).collect(),
    })
    .map_err(|e| Error::unexpected("failed to serialize block list").with_source(e))?;

    Ok(format!(r#"<?xml version="1.0" encoding="utf-8"?>{content}"#))
}
