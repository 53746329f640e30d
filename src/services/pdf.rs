//! Replacement report rendering through the external PDF template service

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, FixedOffset, Utc};
use reqwest::Client;
use rust_decimal::Decimal;

use crate::config::PDF_TIMEOUT;
use crate::entities::meters;
use crate::models::pdf::{PdfContent, PdfRenderResponse};
use crate::services::thai_date::format_long_date;

const MANAGER_TITLE: &str = "ผจก.สข.";
const LEADER_TITLE: &str = "หผ.มต.";

#[derive(Debug, Clone, PartialEq)]
pub enum PdfError {
    /// Rendering service answered with a non-success status
    Render(String),
    Timeout,
    Unavailable(String),
    /// Reply body was not the expected base64 payload
    Decode(String),
}

impl std::fmt::Display for PdfError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PdfError::Render(msg) => write!(f, "cannot create pdf: {}", msg),
            PdfError::Timeout => write!(f, "Request timed out after {} ms", PDF_TIMEOUT.as_millis()),
            PdfError::Unavailable(msg) => write!(f, "cannot connect pea server: {}", msg),
            PdfError::Decode(msg) => write!(f, "cannot create pdf: {}", msg),
        }
    }
}

impl std::error::Error for PdfError {}

impl From<reqwest::Error> for PdfError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PdfError::Timeout
        } else {
            PdfError::Unavailable(err.to_string())
        }
    }
}

/// Template payload for a meter record, dated `now`
pub fn build_content(meter: &meters::Model, now: DateTime<Utc>, offset: FixedOffset) -> PdfContent {
    PdfContent {
        doc_date: format_long_date(&now, offset),
        manager: MANAGER_TITLE.to_string(),
        leader: LEADER_TITLE.to_string(),
        installation_name: meter.installation_name.clone().unwrap_or_default(),
        ca: meter.ca.clone().unwrap_or_default(),
        pea_old: meter.pea_no_old.clone().unwrap_or_default(),
        pea_new: meter.pea_no_new.clone(),
        unit_old: meter.unit_old.unwrap_or(Decimal::ZERO),
        unit_new: meter.unit_new.unwrap_or(Decimal::ZERO),
        installation_date: meter
            .installation_date
            .map(|d| format_long_date(&d, offset))
            .unwrap_or_default(),
    }
}

#[derive(Clone)]
pub struct PdfService {
    client: Client,
    base_url: String,
}

impl PdfService {
    pub fn new(base_url: String) -> Self {
        let client = Client::builder()
            .timeout(PDF_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn check_status(&self) -> Result<(), PdfError> {
        let response = self
            .client
            .get(format!("{}/status", self.base_url))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(PdfError::Unavailable(format!("status {}", response.status())));
        }
        Ok(())
    }

    /// Render the report and return the PDF bytes
    pub async fn render(&self, content: &PdfContent) -> Result<Vec<u8>, PdfError> {
        let response = self
            .client
            .post(format!("{}/pdf", self.base_url))
            .header("Accept", "application/pdf")
            .json(content)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::warn!(status = %status, pea_new = %content.pea_new, "PDF render failed");
            return Err(PdfError::Render(format!("status {}", status)));
        }

        let body: PdfRenderResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                PdfError::Timeout
            } else {
                PdfError::Decode(e.to_string())
            }
        })?;
        decode_pdf(&body.data)
    }
}

/// Decode the base64 payload, accepting a `data:` URI prefix
pub fn decode_pdf(data: &str) -> Result<Vec<u8>, PdfError> {
    let payload = match data.split_once(";base64,") {
        Some((_, rest)) => rest,
        None => data,
    };
    BASE64
        .decode(payload.trim())
        .map_err(|e| PdfError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::bangkok_offset;
    use crate::test_support::meter_fixture;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn test_build_content() {
        let picked = bangkok_offset().with_ymd_and_hms(2025, 1, 28, 9, 0, 0).unwrap();
        let mut meter = meter_fixture("765765765765", picked);
        meter.pea_no_old = Some("124123412341".to_string());
        meter.ca = Some("2000000000".to_string());
        meter.installation_name = Some("นายระทวย คงควรคอย".to_string());
        meter.installation_date = Some(bangkok_offset().with_ymd_and_hms(2025, 1, 30, 10, 0, 0).unwrap());
        meter.unit_old = Some(dec!(12342));

        let now = Utc.with_ymd_and_hms(2025, 1, 31, 3, 0, 0).unwrap();
        let content = build_content(&meter, now, bangkok_offset());

        assert_eq!(content.doc_date, "31 มกราคม 2568");
        assert_eq!(content.installation_date, "30 มกราคม 2568");
        assert_eq!(content.manager, "ผจก.สข.");
        assert_eq!(content.leader, "หผ.มต.");
        assert_eq!(content.unit_new, Decimal::ZERO);

        let json = serde_json::to_value(&content).unwrap();
        assert_eq!(json["peaOld"], "124123412341");
        assert_eq!(json["unitOld"], 12342.0);
        assert_eq!(json["installationName"], "นายระทวย คงควรคอย");
    }

    #[test]
    fn test_uninstalled_meter_has_empty_fields() {
        let picked = bangkok_offset().with_ymd_and_hms(2025, 1, 28, 9, 0, 0).unwrap();
        let content = build_content(&meter_fixture("P-1", picked), Utc::now(), bangkok_offset());
        assert_eq!(content.installation_date, "");
        assert_eq!(content.pea_old, "");
        assert_eq!(content.ca, "");
    }

    #[test]
    fn test_decode_pdf() {
        let encoded = BASE64.encode(b"%PDF-1.7 test");
        assert_eq!(decode_pdf(&encoded).unwrap(), b"%PDF-1.7 test");
        let uri = format!("data:application/pdf;base64,{}", encoded);
        assert_eq!(decode_pdf(&uri).unwrap(), b"%PDF-1.7 test");
        assert!(matches!(decode_pdf("***"), Err(PdfError::Decode(_))));
    }

    #[test]
    fn test_timeout_message() {
        assert_eq!(PdfError::Timeout.to_string(), "Request timed out after 10000 ms");
    }
}
