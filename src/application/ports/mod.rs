//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod bibliography;
mod book_repository;
mod cover_image;
mod text_generator;

pub use bibliography::{BibliographyPort, Reference};
pub use book_repository::{
    BibliographySummary, BookMetadata, BookPatch, BookRecord, BookRepositoryPort, BookStatus,
    ChapterRecord, RepositoryError,
};
pub use cover_image::{BrandingOptions, CoverImagePort, CoverRequest};
pub use text_generator::{BatchChapter, ChapterRequest, ChapterSink, GeneratedText, GenerationError, TextGeneratorPort};
