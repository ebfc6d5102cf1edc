//! Book Queries

use uuid::Uuid;

/// 查询书籍生成进度（只读，不推进任何工作）
#[derive(Debug, Clone)]
pub struct GetBookProgress {
    pub user_id: String,
    pub book_id: Uuid,
}
