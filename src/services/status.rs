//! Class id → nutritional status and advice, as shown to the web client.
//!
//! The wire strings are Thai; the PHP front-end renders them verbatim.

use serde::{Deserialize, Serialize};

use crate::ml::ClassLabel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NutritionStatus {
    Normal,
    AtRisk,
    Malnourished,
    Unknown,
}

impl NutritionStatus {
    pub fn from_label(label: &ClassLabel) -> Self {
        match label.as_index() {
            Some(0) => Self::Normal,
            Some(1) => Self::AtRisk,
            Some(2) => Self::Malnourished,
            _ => Self::Unknown,
        }
    }

    /// Status text for the client.
    pub fn display_text(&self) -> &'static str {
        match self {
            Self::Normal => "ปกติ",
            Self::AtRisk => "เสี่ยงขาดสารอาหาร",
            Self::Malnourished => "ขาดสารอาหาร",
            Self::Unknown => "ไม่ทราบผล",
        }
    }

    pub fn recommendation(&self) -> &'static str {
        match self {
            Self::Normal => "ดีมากครับ! รักษาระดับการกินอาหารให้คงที่แบบนี้ต่อไป",
            Self::AtRisk => "เริ่มมีสัญญาณเสี่ยง ควรเพิ่มปริมาณอาหารหรือความถี่ในการกิน",
            Self::Malnourished => "ต้องรีบปรับพฤติกรรมการกินด่วน! แนะนำปรึกษาหมอโภชนาการ",
            Self::Unknown => "ไม่มีคำแนะนำ",
        }
    }
}

pub const STATUS_BAD_REQUEST: &str = "ผิดพลาด";
pub const STATUS_SERVER_ERROR: &str = "ข้อผิดพลาดของเซิร์ฟเวอร์";
pub const MISSING_TAB_INPUT: &str = "กรุณาส่ง tab_data หรืออัปโหลดไฟล์";

/// "ข้อมูลไม่ครบ (ต้องมี A และ B)"
pub fn missing_columns_message(required: &[String]) -> String {
    format!("ข้อมูลไม่ครบ (ต้องมี {})", required.join(" และ "))
}

/// Probability as a percentage with one decimal, e.g. `0.7311` → `"73.1%"`.
pub fn format_confidence(confidence: f64) -> String {
    format!("{:.1}%", confidence * 100.0)
}
