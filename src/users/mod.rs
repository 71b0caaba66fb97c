pub mod memory;
pub mod model;
pub mod repo;
pub mod store;

pub use model::{Identity, Role, UserRecord};
pub use store::UserStore;
