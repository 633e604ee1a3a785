pub mod item;
pub mod item_store;

pub use item::*;
pub use item_store::*;
