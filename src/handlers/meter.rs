//! Meter endpoints
//!
//! List/export take the filter as query parameters. Pick and installation
//! forms arrive as `multipart/form-data` with the photos as file parts.

use std::collections::HashMap;
use std::str::FromStr;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::FixedOffset;
use rust_decimal::Decimal;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::models::error::ErrorResponse;
use crate::models::gis::CustomerDetails;
use crate::models::meter::{
    parse_date_bound, InstallationForm, MeterListQuery, MeterListResponse, MeterView, PhotoUpload,
    PickForm,
};
use crate::services::csv_export::export_csv;
use crate::services::gis::GisError;
use crate::services::meter_service::MeterServiceError;
use crate::services::pdf::{build_content, PdfError};
use crate::services::photo_storage::PhotoError;
use crate::AppState;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse::new(message)))
}

fn map_meter_error(err: MeterServiceError) -> ApiError {
    match &err {
        MeterServiceError::Validation(_) => api_error(StatusCode::BAD_REQUEST, err.to_string()),
        MeterServiceError::NotFound => api_error(StatusCode::NOT_FOUND, err.to_string()),
        MeterServiceError::Fetch(_) | MeterServiceError::Save(_) => {
            api_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
        MeterServiceError::Photo(PhotoError::Decode(_)) => api_error(StatusCode::BAD_REQUEST, err.to_string()),
        MeterServiceError::Photo(_) => api_error(StatusCode::BAD_GATEWAY, err.to_string()),
    }
}

/// Text fields and file parts of a multipart body
#[derive(Debug, Default)]
struct MultipartFields {
    text: HashMap<String, String>,
    files: HashMap<String, PhotoUpload>,
}

impl MultipartFields {
    fn text(&self, name: &str) -> Option<&str> {
        self.text.get(name).map(|s| s.trim()).filter(|s| !s.is_empty())
    }

    fn string(&self, name: &str) -> String {
        self.text(name).unwrap_or_default().to_string()
    }

    fn date(&self, name: &str, offset: FixedOffset) -> Result<Option<chrono::DateTime<FixedOffset>>, ApiError> {
        self.text(name)
            .map(|raw| parse_date_bound(raw, offset))
            .transpose()
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("{}: {}", name, e)))
    }

    fn decimal(&self, name: &str) -> Result<Option<Decimal>, ApiError> {
        self.text(name)
            .map(Decimal::from_str)
            .transpose()
            .map_err(|_| api_error(StatusCode::BAD_REQUEST, format!("{} must be a number", name)))
    }

    fn take_file(&mut self, name: &str) -> Option<PhotoUpload> {
        self.files.remove(name)
    }
}

async fn read_multipart(mut multipart: Multipart) -> Result<MultipartFields, ApiError> {
    let mut fields = MultipartFields::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("Invalid form data: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("Invalid file {}: {}", name, e)))?;
                // browsers send an empty part for an untouched file input
                if !bytes.is_empty() {
                    fields.files.insert(
                        name,
                        PhotoUpload {
                            file_name,
                            bytes: bytes.to_vec(),
                        },
                    );
                }
            }
            None => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("Invalid field {}: {}", name, e)))?;
                fields.text.insert(name, value);
            }
        }
    }
    Ok(fields)
}

fn pick_form(fields: &MultipartFields, offset: FixedOffset) -> Result<PickForm, ApiError> {
    Ok(PickForm {
        pea_no_new: fields.string("peaNoNew"),
        picker_name: fields.string("pickerName"),
        picker_date: fields.date("pickerDate", offset)?,
        ca: fields.text("ca").map(str::to_string),
    })
}

fn installation_form(fields: &MultipartFields, offset: FixedOffset) -> Result<InstallationForm, ApiError> {
    Ok(InstallationForm {
        ca: fields.text("ca").map(str::to_string),
        pea_no_new: fields.string("peaNoNew"),
        pea_no_old: fields.string("peaNoOld"),
        installation_name: fields.string("installationName"),
        installation_date: fields.date("installationDate", offset)?,
        unit_old: fields.decimal("unitOld")?,
        unit_new: fields.decimal("unitNew")?,
        installation_location: fields.string("installationLocation"),
    })
}

/// List meters
///
/// GET /api/meters
///
/// # Query Parameters
///
/// - `page` (default 1), `pageSize` (default 10, max 100)
/// - `status` - `wait_installation` | `is_installed` | `picker_overdue` | `all`
/// - `searchPeaNoNew`, `searchPeaNoOld`, `searchCa` - case-insensitive substring
/// - `pickerDateStart`, `pickerDateEnd` - `YYYY-MM-DD` or RFC 3339
/// - `sortOrder` - `asc` | `desc` on picker date (default `desc`)
pub async fn list_meters(
    State(state): State<AppState>,
    Query(query): Query<MeterListQuery>,
) -> Result<Json<MeterListResponse>, ApiError> {
    info!(
        page = ?query.page,
        page_size = ?query.page_size,
        status = ?query.status,
        "Meter list request received"
    );

    if let Err(e) = query.validate() {
        warn!(error = %e, "Invalid query parameters");
        return Err(api_error(StatusCode::BAD_REQUEST, e));
    }
    let filter = query
        .to_filter(state.local_offset)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?;

    let response = state
        .meters
        .fetch_meters(&filter, query.page(), query.page_size())
        .await
        .map_err(map_meter_error)?;

    info!(
        count = response.meters.len(),
        total = response.total_count,
        "Meter list returned"
    );
    Ok(Json(response))
}

/// GET /api/meters/export.csv
pub async fn export_meters_csv(
    State(state): State<AppState>,
    Query(query): Query<MeterListQuery>,
) -> Result<Response, ApiError> {
    let filter = query
        .to_filter(state.local_offset)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?;
    let rows = state.meters.export_rows(&filter).await.map_err(map_meter_error)?;

    let body = export_csv(&rows, state.local_offset).map_err(|e| {
        error!(error = %e, "CSV export failed");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    info!(rows = rows.len(), "Meter CSV exported");

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"meters.csv\""),
        ],
        body,
    )
        .into_response())
}

/// GET /api/meters/{id}
pub async fn get_meter(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MeterView>, ApiError> {
    state.meters.get_meter(id).await.map(Json).map_err(map_meter_error)
}

/// POST /api/meters (multipart: peaNoNew, pickerName, pickerDate, ca, newMeterImage)
pub async fn create_meter(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<MeterView>), ApiError> {
    let mut fields = read_multipart(multipart).await?;
    let form = pick_form(&fields, state.local_offset)?;
    let photo = fields
        .take_file("newMeterImage")
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "กรุณาอัปโหลดรูปมิเตอร์ใหม่"))?;

    let meter = state.meters.pick_meter(form, photo).await.map_err(map_meter_error)?;
    Ok((StatusCode::CREATED, Json(meter)))
}

/// PUT /api/meters/{id} (multipart, newMeterImage optional)
pub async fn update_meter(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<MeterView>, ApiError> {
    let mut fields = read_multipart(multipart).await?;
    let form = pick_form(&fields, state.local_offset)?;
    let photo = fields.take_file("newMeterImage");

    state
        .meters
        .update_pick(id, form, photo)
        .await
        .map(Json)
        .map_err(map_meter_error)
}

/// PUT /api/meters/{id}/installation (multipart, newMeterImage/oldMeterImage optional)
pub async fn record_installation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<MeterView>, ApiError> {
    let mut fields = read_multipart(multipart).await?;
    let form = installation_form(&fields, state.local_offset)?;
    let new_photo = fields.take_file("newMeterImage");
    let old_photo = fields.take_file("oldMeterImage");

    state
        .meters
        .record_installation(id, form, new_photo, old_photo)
        .await
        .map(Json)
        .map_err(map_meter_error)
}

/// GET /api/meters/{id}/gis
pub async fn meter_gis(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CustomerDetails>, ApiError> {
    let meter = state.meters.get_record(id).await.map_err(map_meter_error)?;

    state.gis.customer_details(&meter).await.map(Json).map_err(|e| {
        warn!(meter_id = %id, error = %e, "GIS lookup failed");
        let status = match e {
            GisError::NotFound | GisError::MissingIdentifier => StatusCode::NOT_FOUND,
            GisError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            GisError::Unavailable(_) => StatusCode::BAD_GATEWAY,
        };
        api_error(status, e.to_string())
    })
}

/// GET /api/meters/{id}/pdf
pub async fn meter_pdf(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let meter = state.meters.get_record(id).await.map_err(map_meter_error)?;
    let content = build_content(&meter, state.clock.utc(), state.local_offset);

    let pdf = state.pdf.render(&content).await.map_err(|e| {
        error!(meter_id = %id, error = %e, "PDF render failed");
        let status = match e {
            PdfError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::BAD_GATEWAY,
        };
        api_error(status, e.to_string())
    })?;

    let disposition = format!("inline; filename=\"{}.pdf\"", meter.pea_no_new.replace('"', ""));
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        pdf,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::bangkok_offset;
    use crate::services::meter_store::StoreError;
    use rust_decimal_macros::dec;

    fn fields(pairs: &[(&str, &str)]) -> MultipartFields {
        MultipartFields {
            text: pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            files: HashMap::new(),
        }
    }

    #[test]
    fn test_installation_form_from_fields() {
        let f = fields(&[
            ("peaNoNew", " 1100 "),
            ("peaNoOld", "5500"),
            ("installationDate", "2026-10-17"),
            ("unitOld", "12.5"),
            ("unitNew", "0"),
            ("ca", ""),
        ]);
        let form = installation_form(&f, bangkok_offset()).unwrap();
        assert_eq!(form.pea_no_new, "1100");
        assert_eq!(form.unit_old, Some(dec!(12.5)));
        assert_eq!(form.ca, None);
        assert_eq!(
            form.installation_date.unwrap().to_rfc3339(),
            "2026-10-17T00:00:00+07:00"
        );
    }

    #[test]
    fn test_bad_number_is_rejected() {
        let f = fields(&[("unitOld", "twelve")]);
        let (status, Json(body)) = installation_form(&f, bangkok_offset()).unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "unitOld must be a number");
    }

    #[test]
    fn test_error_mapping() {
        assert_eq!(map_meter_error(MeterServiceError::NotFound).0, StatusCode::NOT_FOUND);
        let (status, Json(body)) = map_meter_error(MeterServiceError::Fetch(StoreError::NotFound));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "Failed to fetch meter data.");
        assert_eq!(
            map_meter_error(MeterServiceError::Photo(PhotoError::Upload("x".into()))).0,
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            map_meter_error(MeterServiceError::Photo(PhotoError::Decode("x".into()))).0,
            StatusCode::BAD_REQUEST
        );
    }
}
