//! HTTP Handlers

mod book;
mod generation;
mod ping;
mod stream;

pub use book::*;
pub use generation::generate_book;
pub use ping::*;
pub use stream::{generate_book_stream, USER_ID_HEADER};
