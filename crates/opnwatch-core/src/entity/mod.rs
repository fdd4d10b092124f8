// ── Entity set management ──

mod manager;
mod slug;

pub use manager::{AddedFn, DescriptorFn, EntityManager};
pub use slug::{entity_unique_id, slugify};
