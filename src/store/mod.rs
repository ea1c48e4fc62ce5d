pub mod kv;
pub mod plan_store;
pub mod schema;
