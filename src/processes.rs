pub mod archiver;
pub mod remover;
pub mod skeeter_deleter;

pub use skeeter_deleter::{Options, SkeeterDeleter};
