//! Memory Layer - In-Memory State Management
//!
//! 内存版书籍仓储（storage.backend = memory 及测试使用）

mod book_store;

pub use book_store::InMemoryBookRepository;
