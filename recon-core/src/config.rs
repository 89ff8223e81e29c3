//! Các ngưỡng điều chỉnh cho việc so khớp bản ghi.

use serde::{Deserialize, Serialize};

/// Cách gom các bản ghi ứng viên thành nhóm.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Clustering {
    /// Mỗi bản ghi chỉ so với thành viên đầu tiên của nhóm đang mở.
    #[default]
    Seed,
    /// Bao đóng bắc cầu của đồ thị so khớp từng cặp.
    ConnectedComponents,
}

/// Ngưỡng so khớp. Độ tương đồng trong khoảng `0.0..=1.0`, cửa sổ tính bằng ngày.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DedupConfig {
    pub clustering: Clustering,
    pub medication_name_similarity: f64,
    pub medication_quantity_window_days: i64,
    pub medication_ndc_window_days: i64,
    pub medication_name_window_days: i64,
    pub lab_name_similarity: f64,
    /// Chênh lệch tương đối tối đa giữa hai giá trị xét nghiệm dạng số.
    pub lab_value_tolerance: f64,
    pub condition_cross_system_similarity: f64,
    pub condition_name_similarity: f64,
    pub condition_onset_window_days: i64,
    pub encounter_type_similarity: f64,
    pub patient_name_similarity: f64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            clustering: Clustering::Seed,
            medication_name_similarity: 0.90,
            medication_quantity_window_days: 7,
            medication_ndc_window_days: 30,
            medication_name_window_days: 14,
            lab_name_similarity: 0.95,
            lab_value_tolerance: 0.05,
            condition_cross_system_similarity: 0.95,
            condition_name_similarity: 0.92,
            condition_onset_window_days: 90,
            encounter_type_similarity: 0.95,
            patient_name_similarity: 0.90,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let json = r#"{"clustering":"connected_components","lab_name_similarity":0.9}"#;
        let config: DedupConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.clustering, Clustering::ConnectedComponents);
        assert_eq!(config.lab_name_similarity, 0.9);
        assert_eq!(config.medication_name_similarity, 0.90);
    }
}
