pub mod manager;
pub mod memory;
pub mod object_id;
pub mod postgres;
pub mod record;
pub mod store;

pub use manager::{DatabaseError, DatabaseManager};
pub use memory::MemoryStore;
pub use object_id::ObjectId;
pub use postgres::PgStore;
pub use record::Document;
pub use store::{DeleteResult, Filter, InsertResult, Store, StoreError, UpdateResult};
