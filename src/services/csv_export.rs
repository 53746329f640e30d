//! CSV export of the filtered meter list
//!
//! UTF-8 with a byte-order mark so spreadsheet tools pick the right
//! encoding for the Thai headers.

use chrono::FixedOffset;
use rust_decimal::Decimal;

use crate::models::meter::MeterView;
use crate::services::thai_date::format_date_time;

pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

pub const CSV_HEADERS: [&str; 12] = [
    "CA",
    "PEA ใหม่",
    "PEA เก่า",
    "สถานะ",
    "ผู้เบิก",
    "วันที่เบิก",
    "ผู้ติดตั้ง",
    "วันที่ติดตั้ง",
    "หน่วยเก่า",
    "หน่วยใหม่",
    "ตำแหน่งติดตั้ง",
    "รูปมิเตอร์ใหม่",
];

#[derive(Debug)]
pub struct CsvExportError(String);

impl std::fmt::Display for CsvExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CSV export failed: {}", self.0)
    }
}

impl std::error::Error for CsvExportError {}

impl From<csv::Error> for CsvExportError {
    fn from(err: csv::Error) -> Self {
        CsvExportError(err.to_string())
    }
}

fn units(value: Option<Decimal>) -> String {
    value.map(|v| format!("{:.2}", v)).unwrap_or_default()
}

fn row(meter: &MeterView, offset: FixedOffset) -> [String; 12] {
    [
        meter.ca.clone().unwrap_or_default(),
        meter.pea_no_new.clone(),
        meter.pea_no_old.clone().unwrap_or_default(),
        meter.status.clone(),
        meter.picker_name.clone(),
        format_date_time(&meter.picker_date, offset),
        meter.installation_name.clone().unwrap_or_default(),
        meter
            .installation_date
            .map(|d| format_date_time(&d, offset))
            .unwrap_or_default(),
        units(meter.unit_old),
        units(meter.unit_new),
        meter.installation_location.clone().unwrap_or_default(),
        meter.new_meter_image_url.clone().unwrap_or_default(),
    ]
}

/// Serialize `meters` in the given order, dates rendered in `offset`
pub fn export_csv(meters: &[MeterView], offset: FixedOffset) -> Result<Vec<u8>, CsvExportError> {
    let mut buffer = UTF8_BOM.to_vec();
    {
        let mut writer = csv::Writer::from_writer(&mut buffer);
        writer.write_record(CSV_HEADERS)?;
        for meter in meters {
            writer.write_record(row(meter, offset))?;
        }
        writer.flush().map_err(|e| CsvExportError(e.to_string()))?;
    }
    Ok(buffer)
}
