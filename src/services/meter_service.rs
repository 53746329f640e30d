//! Meter operations: list, pick, pick edit and installation
//!
//! Writes that carry photos follow a fixed sequence:
//! 1. upload every new photo (on failure, delete the ones already uploaded)
//! 2. persist the record (on failure, delete every new upload)
//! 3. delete the photos the record no longer references (failures are
//!    logged and leave an orphaned file)

use std::sync::Arc;

use chrono::FixedOffset;
use mockable::Clock;
use uuid::Uuid;

use crate::entities::meters;
use crate::models::meter::{
    InstallationForm, MeterFilter, MeterListResponse, MeterView, PhotoUpload, PickForm,
};
use crate::services::meter_filter::build_predicate;
use crate::services::meter_status::derive_status;
use crate::services::meter_store::{MeterStore, StoreError};
use crate::services::photo_storage::{PhotoError, PhotoStorage, UploadedPhoto};

#[derive(Debug, Clone, PartialEq)]
pub enum MeterServiceError {
    Validation(String),
    NotFound,
    /// Read failed
    Fetch(StoreError),
    /// Insert/update failed
    Save(StoreError),
    Photo(PhotoError),
}

impl std::fmt::Display for MeterServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MeterServiceError::Validation(msg) => write!(f, "{}", msg),
            MeterServiceError::NotFound => write!(f, "Meter not found"),
            MeterServiceError::Fetch(_) => write!(f, "Failed to fetch meter data."),
            MeterServiceError::Save(e) => write!(f, "Failed to save meter data: {}", e),
            MeterServiceError::Photo(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for MeterServiceError {}

/// Which photo slot of a record an upload replaces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PhotoSlot {
    NewMeter,
    OldMeter,
}

impl PhotoSlot {
    fn current_id(self, meter: &meters::Model) -> Option<String> {
        match self {
            PhotoSlot::NewMeter => meter.new_meter_image_id.clone(),
            PhotoSlot::OldMeter => meter.old_meter_image_id.clone(),
        }
    }

    fn assign(self, meter: &mut meters::Model, photo: &UploadedPhoto) {
        match self {
            PhotoSlot::NewMeter => {
                meter.new_meter_image_id = Some(photo.file_id.clone());
                meter.new_meter_image_url = Some(photo.url.clone());
            }
            PhotoSlot::OldMeter => {
                meter.old_meter_image_id = Some(photo.file_id.clone());
                meter.old_meter_image_url = Some(photo.url.clone());
            }
        }
    }
}

#[derive(Clone)]
pub struct MeterService {
    store: Arc<dyn MeterStore>,
    photos: Arc<dyn PhotoStorage>,
    clock: Arc<dyn Clock + Send + Sync>,
    offset: FixedOffset,
}

impl MeterService {
    pub fn new(
        store: Arc<dyn MeterStore>,
        photos: Arc<dyn PhotoStorage>,
        clock: Arc<dyn Clock + Send + Sync>,
        offset: FixedOffset,
    ) -> Self {
        Self {
            store,
            photos,
            clock,
            offset,
        }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    fn view(&self, meter: meters::Model) -> MeterView {
        let status = derive_status(&meter, self.clock.utc(), self.offset);
        MeterView::new(meter, status.label(), status.color())
    }

    /// One page of meters matching `filter`, with display status
    pub async fn fetch_meters(
        &self,
        filter: &MeterFilter,
        page: u64,
        page_size: u64,
    ) -> Result<MeterListResponse, MeterServiceError> {
        let predicate = build_predicate(filter, self.clock.utc(), self.offset);
        let skip = page.saturating_sub(1).saturating_mul(page_size);

        let (rows, total_count) = tokio::try_join!(
            self.store.find_page(&predicate, skip, page_size),
            self.store.count(&predicate),
        )
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to fetch meters");
            MeterServiceError::Fetch(e)
        })?;

        Ok(MeterListResponse {
            meters: rows.into_iter().map(|m| self.view(m)).collect(),
            total_count,
            current_page: page,
            page_size,
        })
    }

    /// Every meter matching `filter`, for export
    pub async fn export_rows(&self, filter: &MeterFilter) -> Result<Vec<MeterView>, MeterServiceError> {
        let predicate = build_predicate(filter, self.clock.utc(), self.offset);
        let rows = self.store.find_all(&predicate).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to fetch meters for export");
            MeterServiceError::Fetch(e)
        })?;
        Ok(rows.into_iter().map(|m| self.view(m)).collect())
    }

    async fn load(&self, id: Uuid) -> Result<meters::Model, MeterServiceError> {
        self.store
            .find_by_id(id)
            .await
            .map_err(MeterServiceError::Fetch)?
            .ok_or(MeterServiceError::NotFound)
    }

    pub async fn get_meter(&self, id: Uuid) -> Result<MeterView, MeterServiceError> {
        self.load(id).await.map(|m| self.view(m))
    }

    /// Raw record, for services that need fields the view omits
    pub async fn get_record(&self, id: Uuid) -> Result<meters::Model, MeterServiceError> {
        self.load(id).await
    }

    /// Register a meter taken from the warehouse
    pub async fn pick_meter(&self, form: PickForm, photo: PhotoUpload) -> Result<MeterView, MeterServiceError> {
        form.validate().map_err(MeterServiceError::Validation)?;
        let picker_date = form
            .picker_date
            .ok_or_else(|| MeterServiceError::Validation("pickerDate is required".to_string()))?;

        let now = self.clock.utc().with_timezone(&self.offset);
        let mut meter = meters::Model {
            id: Uuid::new_v4(),
            ca: form.ca.filter(|s| !s.trim().is_empty()),
            pea_no_new: form.pea_no_new.trim().to_string(),
            pea_no_old: None,
            picker_name: form.picker_name.trim().to_string(),
            picker_date,
            installation_name: None,
            installation_date: None,
            installation_location: None,
            unit_old: None,
            unit_new: None,
            new_meter_image_id: None,
            new_meter_image_url: None,
            old_meter_image_id: None,
            old_meter_image_url: None,
            created_at: now,
            updated_at: now,
        };

        let uploaded = self.upload_all(vec![(PhotoSlot::NewMeter, photo)]).await?;
        for (slot, photo) in &uploaded {
            slot.assign(&mut meter, photo);
        }

        match self.store.insert(meter).await {
            Ok(saved) => {
                tracing::info!(meter_id = %saved.id, pea_no_new = %saved.pea_no_new, "Meter picked");
                Ok(self.view(saved))
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to insert picked meter");
                self.compensate(&uploaded).await;
                Err(MeterServiceError::Save(e))
            }
        }
    }

    /// Edit pick details, optionally replacing the new-meter photo
    pub async fn update_pick(
        &self,
        id: Uuid,
        form: PickForm,
        photo: Option<PhotoUpload>,
    ) -> Result<MeterView, MeterServiceError> {
        form.validate().map_err(MeterServiceError::Validation)?;
        let picker_date = form
            .picker_date
            .ok_or_else(|| MeterServiceError::Validation("pickerDate is required".to_string()))?;

        let mut meter = self.load(id).await?;
        meter.pea_no_new = form.pea_no_new.trim().to_string();
        meter.picker_name = form.picker_name.trim().to_string();
        meter.picker_date = picker_date;
        meter.ca = form.ca.filter(|s| !s.trim().is_empty());

        let photos = photo.map(|p| vec![(PhotoSlot::NewMeter, p)]).unwrap_or_default();
        self.save_with_photos(meter, photos).await
    }

    /// Record the replacement of the old meter by the new one
    pub async fn record_installation(
        &self,
        id: Uuid,
        form: InstallationForm,
        new_meter_photo: Option<PhotoUpload>,
        old_meter_photo: Option<PhotoUpload>,
    ) -> Result<MeterView, MeterServiceError> {
        form.validate().map_err(MeterServiceError::Validation)?;

        let mut meter = self.load(id).await?;
        meter.pea_no_new = form.pea_no_new.trim().to_string();
        meter.pea_no_old = Some(form.pea_no_old.trim().to_string());
        meter.installation_name = Some(form.installation_name.trim().to_string()).filter(|s| !s.is_empty());
        meter.installation_date = form.installation_date;
        meter.unit_old = form.unit_old;
        meter.unit_new = form.unit_new;
        meter.installation_location =
            Some(form.installation_location.trim().to_string()).filter(|s| !s.is_empty());
        if let Some(ca) = form.ca.filter(|s| !s.trim().is_empty()) {
            meter.ca = Some(ca.trim().to_string());
        }

        let mut photos = Vec::new();
        if let Some(photo) = new_meter_photo {
            photos.push((PhotoSlot::NewMeter, photo));
        }
        if let Some(photo) = old_meter_photo {
            photos.push((PhotoSlot::OldMeter, photo));
        }
        self.save_with_photos(meter, photos).await
    }

    async fn save_with_photos(
        &self,
        mut meter: meters::Model,
        photos: Vec<(PhotoSlot, PhotoUpload)>,
    ) -> Result<MeterView, MeterServiceError> {
        let superseded: Vec<String> = photos
            .iter()
            .filter_map(|(slot, _)| slot.current_id(&meter))
            .collect();

        let uploaded = self.upload_all(photos).await?;
        for (slot, photo) in &uploaded {
            slot.assign(&mut meter, photo);
        }
        meter.updated_at = self.clock.utc().with_timezone(&self.offset);

        let saved = match self.store.update(meter).await {
            Ok(saved) => saved,
            Err(e) => {
                tracing::error!(error = %e, "Failed to update meter");
                self.compensate(&uploaded).await;
                return Err(match e {
                    StoreError::NotFound => MeterServiceError::NotFound,
                    other => MeterServiceError::Save(other),
                });
            }
        };

        self.release_superseded(&superseded).await;
        tracing::info!(meter_id = %saved.id, photos = uploaded.len(), "Meter updated");
        Ok(self.view(saved))
    }

    /// Upload in order; on the first failure remove what was already stored
    async fn upload_all(
        &self,
        photos: Vec<(PhotoSlot, PhotoUpload)>,
    ) -> Result<Vec<(PhotoSlot, UploadedPhoto)>, MeterServiceError> {
        let mut uploaded = Vec::with_capacity(photos.len());
        for (slot, photo) in photos {
            match self.photos.upload(photo).await {
                Ok(stored) => uploaded.push((slot, stored)),
                Err(e) => {
                    tracing::error!(error = %e, ?slot, "Photo upload failed");
                    self.compensate(&uploaded).await;
                    return Err(MeterServiceError::Photo(e));
                }
            }
        }
        Ok(uploaded)
    }

    async fn compensate(&self, uploaded: &[(PhotoSlot, UploadedPhoto)]) {
        for (_, photo) in uploaded {
            if let Err(e) = self.photos.delete(&photo.file_id).await {
                tracing::warn!(file_id = %photo.file_id, error = %e, "Failed to remove uploaded photo, file is orphaned");
            }
        }
    }

    async fn release_superseded(&self, file_ids: &[String]) {
        for file_id in file_ids {
            if let Err(e) = self.photos.delete(file_id).await {
                tracing::warn!(file_id = %file_id, error = %e, "Failed to delete replaced photo, file is orphaned");
            }
        }
    }
}
