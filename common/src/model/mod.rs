pub mod column;
pub mod event;
pub mod product;
pub mod record;
