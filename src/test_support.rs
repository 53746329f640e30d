//! In-memory stores, a settable clock and a recording photo storage for tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Local, TimeDelta, Utc};
use mockable::Clock;
use uuid::Uuid;

use crate::entities::{meters, users};
use crate::models::meter::{PhotoUpload, SortOrder};
use crate::models::user::{UserRole, UserSortBy};
use crate::services::meter_filter::MeterPredicate;
use crate::services::meter_store::{MeterStore, StoreError};
use crate::services::photo_storage::{PhotoError, PhotoStorage, UploadedPhoto};
use crate::services::user_store::{UserSearch, UserStore};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Picked-but-not-installed meter
pub fn meter_fixture(pea_no_new: &str, picker_date: DateTime<FixedOffset>) -> meters::Model {
    meters::Model {
        id: Uuid::new_v4(),
        ca: None,
        pea_no_new: pea_no_new.to_string(),
        pea_no_old: None,
        picker_name: "picker".to_string(),
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
        created_at: picker_date,
        updated_at: picker_date,
    }
}

pub fn user_fixture(username: &str, role: UserRole, password_hash: &str) -> users::Model {
    let now = Utc::now().fixed_offset();
    users::Model {
        id: Uuid::new_v4(),
        username: username.to_string(),
        displayname: username.to_string(),
        password: password_hash.to_string(),
        role: role.to_string(),
        created_at: now,
        updated_at: now,
    }
}

/// Clock pinned to an instant that tests move explicitly
pub struct FixedClock(Mutex<DateTime<Utc>>);

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *lock(&self.0) = now;
    }

    pub fn advance(&self, delta: TimeDelta) {
        *lock(&self.0) += delta;
    }
}

impl Clock for FixedClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *lock(&self.0)
    }
}

#[derive(Default)]
pub struct InMemoryMeterStore {
    rows: Mutex<Vec<meters::Model>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl InMemoryMeterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: Vec<meters::Model>) -> Self {
        Self {
            rows: Mutex::new(rows),
            ..Default::default()
        }
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn rows(&self) -> Vec<meters::Model> {
        lock(&self.rows).clone()
    }

    fn check_read(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Database("connection refused".to_string()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Database("write rejected".to_string()));
        }
        Ok(())
    }

    fn matching(&self, predicate: &MeterPredicate) -> Vec<meters::Model> {
        let mut rows: Vec<_> = lock(&self.rows)
            .iter()
            .filter(|m| predicate.matches(m))
            .cloned()
            .collect();
        rows.sort_by(|a, b| match predicate.sort_order {
            SortOrder::Asc => a.picker_date.cmp(&b.picker_date),
            SortOrder::Desc => b.picker_date.cmp(&a.picker_date),
        });
        rows
    }
}

#[async_trait]
impl MeterStore for InMemoryMeterStore {
    async fn find_page(
        &self,
        predicate: &MeterPredicate,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<meters::Model>, StoreError> {
        self.check_read()?;
        Ok(self
            .matching(predicate)
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn count(&self, predicate: &MeterPredicate) -> Result<u64, StoreError> {
        self.check_read()?;
        Ok(self.matching(predicate).len() as u64)
    }

    async fn find_all(&self, predicate: &MeterPredicate) -> Result<Vec<meters::Model>, StoreError> {
        self.check_read()?;
        Ok(self.matching(predicate))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<meters::Model>, StoreError> {
        self.check_read()?;
        Ok(lock(&self.rows).iter().find(|m| m.id == id).cloned())
    }

    async fn insert(&self, meter: meters::Model) -> Result<meters::Model, StoreError> {
        self.check_write()?;
        let mut rows = lock(&self.rows);
        if rows.iter().any(|m| m.id == meter.id) {
            return Err(StoreError::Conflict(format!("duplicate id {}", meter.id)));
        }
        rows.push(meter.clone());
        Ok(meter)
    }

    async fn update(&self, meter: meters::Model) -> Result<meters::Model, StoreError> {
        self.check_write()?;
        let mut rows = lock(&self.rows);
        let slot = rows
            .iter_mut()
            .find(|m| m.id == meter.id)
            .ok_or(StoreError::NotFound)?;
        *slot = meter.clone();
        Ok(meter)
    }
}

/// Photo storage that records calls instead of talking to a service
#[derive(Default)]
pub struct FakePhotoStorage {
    uploads: Mutex<Vec<(String, UploadedPhoto)>>,
    deletes: Mutex<Vec<String>>,
    counter: AtomicUsize,
    /// 1-based index of the upload that fails, if any
    fail_upload_at: Mutex<Option<usize>>,
    fail_deletes: AtomicBool,
}

impl FakePhotoStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_upload_at(&self, nth: usize) {
        *lock(&self.fail_upload_at) = Some(nth);
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// File names and references of successful uploads, in order
    pub fn uploads(&self) -> Vec<(String, UploadedPhoto)> {
        lock(&self.uploads).clone()
    }

    /// Attempted deletes, successful or not
    pub fn deletes(&self) -> Vec<String> {
        lock(&self.deletes).clone()
    }
}

#[async_trait]
impl PhotoStorage for FakePhotoStorage {
    async fn upload(&self, photo: PhotoUpload) -> Result<UploadedPhoto, PhotoError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        if *lock(&self.fail_upload_at) == Some(n) {
            return Err(PhotoError::Upload("storage unavailable".to_string()));
        }
        let uploaded = UploadedPhoto {
            file_id: format!("file-{}", n),
            url: format!("https://img.test/{}/{}", n, photo.file_name),
        };
        lock(&self.uploads).push((photo.file_name, uploaded.clone()));
        Ok(uploaded)
    }

    async fn delete(&self, file_id: &str) -> Result<(), PhotoError> {
        lock(&self.deletes).push(file_id.to_string());
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(PhotoError::Delete("storage unavailable".to_string()));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryUserStore {
    rows: Mutex<Vec<users::Model>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(rows: Vec<users::Model>) -> Self {
        Self { rows: Mutex::new(rows) }
    }

    pub fn users(&self) -> Vec<users::Model> {
        lock(&self.rows).clone()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn search(&self, search: &UserSearch) -> Result<(Vec<users::Model>, u64), StoreError> {
        let mut rows: Vec<_> = lock(&self.rows)
            .iter()
            .filter(|u| search.matches(u))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            let ordering = match search.sort_by {
                UserSortBy::Username => a.username.cmp(&b.username),
                UserSortBy::CreatedAt => a.created_at.cmp(&b.created_at),
            };
            match search.sort_order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });
        let total = rows.len() as u64;
        let page = rows
            .into_iter()
            .skip(search.offset as usize)
            .take(search.limit as usize)
            .collect();
        Ok((page, total))
    }

    async fn count_all(&self) -> Result<u64, StoreError> {
        Ok(lock(&self.rows).len() as u64)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<users::Model>, StoreError> {
        Ok(lock(&self.rows).iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<users::Model>, StoreError> {
        Ok(lock(&self.rows).iter().find(|u| u.username == username).cloned())
    }

    async fn insert(&self, user: users::Model) -> Result<users::Model, StoreError> {
        let mut rows = lock(&self.rows);
        if rows.iter().any(|u| u.username == user.username) {
            return Err(StoreError::Conflict(format!("duplicate username {}", user.username)));
        }
        rows.push(user.clone());
        Ok(user)
    }

    async fn update(&self, user: users::Model) -> Result<users::Model, StoreError> {
        let mut rows = lock(&self.rows);
        if rows.iter().any(|u| u.username == user.username && u.id != user.id) {
            return Err(StoreError::Conflict(format!("duplicate username {}", user.username)));
        }
        let slot = rows
            .iter_mut()
            .find(|u| u.id == user.id)
            .ok_or(StoreError::NotFound)?;
        *slot = user.clone();
        Ok(user)
    }

    async fn delete(&self, id: Uuid) -> Result<Option<users::Model>, StoreError> {
        let mut rows = lock(&self.rows);
        let removed = rows.iter().position(|u| u.id == id).map(|i| rows.remove(i));
        Ok(removed)
    }
}
