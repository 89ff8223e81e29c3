//! Đơn vị đầu ra của bộ khử trùng lặp.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Nguồn gốc của một thành viên trong nhóm.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Provenance {
    pub source: String,
    pub record_id: Option<String>,
    pub recorded_at: Option<DateTime<Utc>>,
}

/// Bản ghi chuẩn đã gộp, kèm đủ thông tin để truy ngược về bản gốc.
///
/// Nhóm một thành viên có cùng cấu trúc với nhóm lớn hơn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DuplicateGroup<T> {
    pub merged: T,
    /// Tên nguồn không trùng, theo thứ tự xuất hiện đầu tiên.
    pub sources: Vec<String>,
    pub provenance: Vec<Provenance>,
    /// Bản ghi trước khi gộp, theo thứ tự đầu vào.
    pub originals: Vec<T>,
}

impl<T> DuplicateGroup<T> {
    pub fn len(&self) -> usize {
        self.originals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.originals.is_empty()
    }

    /// `true` khi nhóm gộp từ hai bản ghi trở lên.
    pub fn has_duplicates(&self) -> bool {
        self.originals.len() > 1
    }
}
