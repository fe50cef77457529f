use crate::domain::asset::Asset;
use crate::domain::server_timing::ServerTiming;

pub mod asset;
pub mod error;
pub mod server_timing;
pub mod upload;

pub trait MediaTypeProvider {
    fn get_media_type(&self) -> String;
}

/// What a successful operation produced, before it is put on the wire.
#[derive(Debug)]
pub enum Outcome {
    Created(Asset),
    Replaced(Asset),
    Found(Asset),
    Content(Asset),
    Catalog(Vec<Asset>),
    Removed,
}

#[derive(Debug)]
pub struct AssetReply {
    pub outcome: Outcome,
    pub server_timing: ServerTiming,
}
