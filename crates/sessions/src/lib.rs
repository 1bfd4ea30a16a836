pub mod flash;
pub mod store;

pub use {
    flash::{FlashLevel, FlashMessage},
    store::{FileSessionStore, MemorySessionStore},
};
