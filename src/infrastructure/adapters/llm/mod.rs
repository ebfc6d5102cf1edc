//! LLM Adapter - 文本与图像生成提供方

mod fake_provider;
mod openai_client;

pub use fake_provider::{FakeProvider, FakeProviderConfig};
pub use openai_client::*;
