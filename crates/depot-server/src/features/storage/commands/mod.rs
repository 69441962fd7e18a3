pub mod create_pool;
pub mod create_zone;
