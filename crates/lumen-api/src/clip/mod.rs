// CLIP v2 REST surface: `/clip/v2/resource[/{type}[/{id}]]`.

mod client;
mod types;

pub use client::ClipClient;
pub use types::{ClipEnvelope, ClipErrorItem, ResourceRef};
