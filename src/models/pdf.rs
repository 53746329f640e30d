use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Document payload sent to the replacement-report template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfContent {
    pub doc_date: String,
    pub manager: String,
    pub leader: String,
    pub installation_name: String,
    pub ca: String,
    pub pea_old: String,
    pub pea_new: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_old: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_new: Decimal,
    pub installation_date: String,
}

/// Rendering service reply: the PDF as base64
#[derive(Debug, Clone, Deserialize)]
pub struct PdfRenderResponse {
    pub data: String,
}
