//! Meter request/response models
//!
//! Query parameters for the meter list and CSV export, the list response,
//! and the pick/installation forms decoded from multipart uploads.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::meters;

pub const DEFAULT_PAGE_SIZE: u64 = 10;
pub const MAX_PAGE_SIZE: u64 = 100;

/// Status constraint selected in the list filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    WaitInstallation,
    IsInstalled,
    PickerOverdue,
    All,
}

impl std::str::FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wait_installation" => Ok(StatusFilter::WaitInstallation),
            "is_installed" => Ok(StatusFilter::IsInstalled),
            "picker_overdue" => Ok(StatusFilter::PickerOverdue),
            "all" => Ok(StatusFilter::All),
            _ => Err(format!("Unknown status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl std::str::FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            _ => Err(format!("Unknown sort order: {}", s)),
        }
    }
}

/// Filter applied to the meter list, CSV export and counts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterFilter {
    pub status: Option<StatusFilter>,
    pub search_pea_no_new: Option<String>,
    pub search_pea_no_old: Option<String>,
    pub search_ca: Option<String>,
    pub picker_date_start: Option<DateTime<FixedOffset>>,
    pub picker_date_end: Option<DateTime<FixedOffset>>,
    pub sort_order: Option<SortOrder>,
}

/// Raw query string for GET /api/meters and GET /api/meters/export.csv
///
/// Everything arrives as text so empty form fields (`searchCa=`) can be
/// treated as absent instead of failing deserialization.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterListQuery {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub status: Option<String>,
    pub search_pea_no_new: Option<String>,
    pub search_pea_no_old: Option<String>,
    pub search_ca: Option<String>,
    /// `YYYY-MM-DD` (local midnight) or RFC 3339
    pub picker_date_start: Option<String>,
    /// `YYYY-MM-DD` (local midnight) or RFC 3339
    pub picker_date_end: Option<String>,
    pub sort_order: Option<String>,
}

impl MeterListQuery {
    /// Validate paging parameters
    pub fn validate(&self) -> Result<(), String> {
        if let Some(page) = self.page {
            if page < 1 {
                return Err("page must be at least 1".to_string());
            }
        }
        if let Some(page_size) = self.page_size {
            if page_size < 1 {
                return Err("pageSize must be at least 1".to_string());
            }
            if page_size > MAX_PAGE_SIZE {
                return Err(format!("pageSize cannot exceed {}", MAX_PAGE_SIZE));
            }
        }
        Ok(())
    }

    pub fn page(&self) -> u64 {
        self.page.unwrap_or(1)
    }

    pub fn page_size(&self) -> u64 {
        self.page_size.unwrap_or(DEFAULT_PAGE_SIZE)
    }

    /// Convert the raw query into a typed filter, interpreting plain dates in `offset`
    pub fn to_filter(&self, offset: FixedOffset) -> Result<MeterFilter, String> {
        let status = non_empty(&self.status).map(|s| s.parse::<StatusFilter>()).transpose()?;
        let sort_order = non_empty(&self.sort_order).map(|s| s.parse::<SortOrder>()).transpose()?;

        Ok(MeterFilter {
            status,
            search_pea_no_new: needle(&self.search_pea_no_new),
            search_pea_no_old: needle(&self.search_pea_no_old),
            search_ca: needle(&self.search_ca),
            picker_date_start: non_empty(&self.picker_date_start)
                .map(|raw| parse_date_bound(raw, offset))
                .transpose()?,
            picker_date_end: non_empty(&self.picker_date_end)
                .map(|raw| parse_date_bound(raw, offset))
                .transpose()?,
            sort_order,
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Search text is matched as typed; only an empty string means no search
fn needle(value: &Option<String>) -> Option<String> {
    value.as_deref().filter(|s| !s.is_empty()).map(str::to_string)
}

/// Parse `YYYY-MM-DD` (midnight in `offset`) or a full RFC 3339 timestamp
pub fn parse_date_bound(raw: &str, offset: FixedOffset) -> Result<DateTime<FixedOffset>, String> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return offset
            .from_local_datetime(&date.and_time(NaiveTime::MIN))
            .single()
            .ok_or_else(|| format!("Invalid date: {}", raw));
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&offset))
        .map_err(|_| format!("Invalid date: {} (expected YYYY-MM-DD or RFC 3339)", raw))
}

/// Meter record as shown in list views, with its derived display status
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterView {
    pub id: Uuid,
    pub ca: Option<String>,
    pub pea_no_new: String,
    pub pea_no_old: Option<String>,
    pub picker_name: String,
    pub picker_date: DateTime<FixedOffset>,
    pub installation_name: Option<String>,
    pub installation_date: Option<DateTime<FixedOffset>>,
    pub installation_location: Option<String>,
    pub unit_old: Option<Decimal>,
    pub unit_new: Option<Decimal>,
    pub new_meter_image_url: Option<String>,
    pub old_meter_image_url: Option<String>,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
    /// Thai status label
    pub status: String,
    /// Badge color token for the status
    pub color: String,
}

impl MeterView {
    pub fn new(model: meters::Model, status: &str, color: &str) -> Self {
        Self {
            id: model.id,
            ca: model.ca,
            pea_no_new: model.pea_no_new,
            pea_no_old: model.pea_no_old,
            picker_name: model.picker_name,
            picker_date: model.picker_date,
            installation_name: model.installation_name,
            installation_date: model.installation_date,
            installation_location: model.installation_location,
            unit_old: model.unit_old,
            unit_new: model.unit_new,
            new_meter_image_url: model.new_meter_image_url,
            old_meter_image_url: model.old_meter_image_url,
            created_at: model.created_at,
            updated_at: model.updated_at,
            status: status.to_string(),
            color: color.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterListResponse {
    pub meters: Vec<MeterView>,
    pub total_count: u64,
    pub current_page: u64,
    pub page_size: u64,
}

/// Photo received in a multipart upload, before resizing
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Fields of the warehouse "pick" form
#[derive(Debug, Clone, Default)]
pub struct PickForm {
    pub pea_no_new: String,
    pub picker_name: String,
    pub picker_date: Option<DateTime<FixedOffset>>,
    pub ca: Option<String>,
}

impl PickForm {
    pub fn validate(&self) -> Result<(), String> {
        if self.pea_no_new.trim().is_empty() {
            return Err("กรุณากรอกหมายเลข PEA No.".to_string());
        }
        if self.picker_name.trim().is_empty() {
            return Err("pickerName is required".to_string());
        }
        if self.picker_date.is_none() {
            return Err("pickerDate is required".to_string());
        }
        Ok(())
    }
}

/// Fields of the installation/replacement form
#[derive(Debug, Clone, Default)]
pub struct InstallationForm {
    pub ca: Option<String>,
    pub pea_no_new: String,
    pub pea_no_old: String,
    pub installation_name: String,
    pub installation_date: Option<DateTime<FixedOffset>>,
    pub unit_old: Option<Decimal>,
    pub unit_new: Option<Decimal>,
    pub installation_location: String,
}

impl InstallationForm {
    pub fn validate(&self) -> Result<(), String> {
        if self.pea_no_new.trim().is_empty() || self.pea_no_old.trim().is_empty() {
            return Err("กรุณากรอกหมายเลข PEA No.".to_string());
        }
        if self.installation_date.is_none() {
            return Err("installationDate is required".to_string());
        }
        match self.unit_old {
            Some(unit) if unit >= Decimal::ZERO => {}
            _ => return Err("กรุณาระบุหน่วยมิเตอร์เก่าที่ถูกต้อง".to_string()),
        }
        match self.unit_new {
            Some(unit) if unit >= Decimal::ZERO => {}
            _ => return Err("กรุณาระบุหน่วยมิเตอร์ใหม่ที่ถูกต้อง".to_string()),
        }
        Ok(())
    }
}
