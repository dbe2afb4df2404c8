pub mod codec;
pub mod executor;
pub mod mutation;
pub mod predicate;
pub mod schema;
pub mod session;
pub mod store;

// re-exports
pub use session::DbSession;
