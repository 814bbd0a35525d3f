//! Object store implementations

mod memory;
mod s3;
mod supabase;

pub use memory::MemoryObjectStore;
pub use s3::{S3Config, S3ObjectStore};
pub use supabase::{SupabaseConfig, SupabaseStore};
