// Engine orchestration — versioned cache buckets and the update coordinator.

pub mod bucket;
pub mod coordinator;
