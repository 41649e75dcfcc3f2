//! Site settings: read with defaults, per-section saves, and managed images.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::aggregates::{HeroSlide, SettingsSection, SiteSettings, TeamMember};
use crate::storage::{Folder, ObjectStorage, StorageError};
use crate::store::{Backend, DocumentStore, StoreError, StoreResult};

const SETTINGS_PATH: &str = "site_settings";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Invalid {section} settings: {source}")]
    InvalidSection { section: SettingsSection, source: serde_json::Error },

    #[error("No entry at position {0}")]
    EntryNotFound(usize),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Load settings. Missing or malformed sections fall back to their defaults.
pub async fn load_settings<S: DocumentStore>(store: &S) -> StoreResult<SiteSettings> {
    let Some(Value::Object(stored)) = store.get(SETTINGS_PATH).await? else {
        return Ok(SiteSettings::default());
    };
    let defaults = serde_json::to_value(SiteSettings::default()).unwrap_or_default();
    let Value::Object(mut merged) = defaults else { return Ok(SiteSettings::default()) };
    for (key, value) in stored {
        let Ok(section) = key.parse::<SettingsSection>() else { continue };
        match section.validate(&value) {
            Ok(()) => { merged.insert(key, value); }
            Err(err) => tracing::warn!(%section, error = %err, "ignoring malformed settings section"),
        }
    }
    Ok(serde_json::from_value(Value::Object(merged)).unwrap_or_default())
}

#[derive(Clone)]
pub struct SiteSettingsService {
    store: Backend,
    storage: ObjectStorage,
}

impl SiteSettingsService {
    pub fn new(store: Backend, storage: ObjectStorage) -> Self { Self { store, storage } }

    pub async fn get(&self) -> Result<SiteSettings, SettingsError> { Ok(load_settings(&self.store).await?) }

    /// Replace one top-level section.
    #[tracing::instrument(skip(self, value))]
    pub async fn update_section(&self, section: SettingsSection, value: Value) -> Result<SiteSettings, SettingsError> {
        section.validate(&value).map_err(|source| SettingsError::InvalidSection { section, source })?;
        let mut fields = Map::new();
        fields.insert(section.key().to_string(), value);
        self.store.update(SETTINGS_PATH, fields).await?;
        tracing::info!(%section, "site settings saved");
        self.get().await
    }

    pub async fn upload_hero_image(&self, file_name: &str, content_type: &str, bytes: &[u8]) -> Result<String, SettingsError> {
        Ok(self.storage.upload(Folder::HeroSlides, file_name, content_type, bytes).await?)
    }

    pub async fn upload_team_image(&self, file_name: &str, content_type: &str, bytes: &[u8]) -> Result<String, SettingsError> {
        Ok(self.storage.upload(Folder::TeamImages, file_name, content_type, bytes).await?)
    }

    /// Drop the slide at `index` and delete its image if this service stored it.
    pub async fn remove_hero_slide(&self, index: usize) -> Result<SiteSettings, SettingsError> {
        let removed: HeroSlide = self.remove_entry(SettingsSection::HeroSlides, index).await?;
        self.forget_image(&removed.image_url).await;
        self.get().await
    }

    /// Drop the team member at `index` and delete their photo if this service stored it.
    pub async fn remove_team_member(&self, index: usize) -> Result<SiteSettings, SettingsError> {
        let removed: TeamMember = self.remove_entry(SettingsSection::TeamMembers, index).await?;
        self.forget_image(&removed.image_url).await;
        self.get().await
    }

    async fn remove_entry<T: serde::de::DeserializeOwned>(&self, section: SettingsSection, index: usize) -> Result<T, SettingsError> {
        let path = format!("{SETTINGS_PATH}/{}", section.key());
        let mut removed = None;
        let committed = self
            .store
            .transaction(&path, |current| {
                let Some(Value::Array(mut entries)) = current else { return None };
                if index >= entries.len() { return None; }
                removed = Some(entries.remove(index));
                Some(Value::Array(entries))
            })
            .await?;
        match (committed, removed) {
            (Some(_), Some(entry)) => serde_json::from_value(entry).map_err(|source| SettingsError::InvalidSection { section, source }),
            _ => Err(SettingsError::EntryNotFound(index)),
        }
    }

    async fn forget_image(&self, url: &str) {
        if self.storage.is_managed_url(url) {
            self.storage.delete_quietly(url).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn service(memory: MemoryStore) -> SiteSettingsService {
        let dir = std::env::temp_dir().join(format!("storefront-settings-{}", uuid::Uuid::new_v4()));
        SiteSettingsService::new(Backend::Memory(memory), ObjectStorage::new(dir, "images", "http://localhost:8083"))
    }

    #[tokio::test]
    async fn test_missing_document_yields_defaults() {
        let settings = service(MemoryStore::new()).get().await.unwrap();
        assert_eq!(settings, SiteSettings::default());
    }

    #[tokio::test]
    async fn test_malformed_section_falls_back() {
        let memory = MemoryStore::with_data(json!({"site_settings": {
            "site_name": {"name": "Kora"},
            "hero_slides": "not a list"
        }}));
        let settings = service(memory).get().await.unwrap();
        assert_eq!(settings.site_name.name, "Kora");
        assert!(settings.hero_slides.is_empty());
    }

    #[tokio::test]
    async fn test_update_section_validates_and_merges() {
        let memory = MemoryStore::with_data(json!({"site_settings": {"site_name": {"name": "Kora"}}}));
        let service = service(memory);
        let settings = service
            .update_section(SettingsSection::ContactInfo, json!({"email": "hi@kora.ng", "phone": "0800", "address": "Yaba", "hours": "9-5"}))
            .await
            .unwrap();
        assert_eq!(settings.contact_info.email, "hi@kora.ng");
        assert_eq!(settings.site_name.name, "Kora");

        let err = service.update_section(SettingsSection::HeroSlides, json!({"oops": 1})).await.unwrap_err();
        assert!(matches!(err, SettingsError::InvalidSection { .. }));
    }

    #[tokio::test]
    async fn test_remove_hero_slide_deletes_managed_image() {
        let memory = MemoryStore::new();
        let service = service(memory.clone());
        let url = service.upload_hero_image("a.webp", "image/webp", b"RIFF").await.unwrap();
        let path = service.storage.object_path(&url).unwrap();
        service
            .update_section(SettingsSection::HeroSlides, json!([
                {"imageUrl": url, "title": "One", "subtitle": ""},
                {"imageUrl": "https://cdn.example.com/b.png", "title": "Two", "subtitle": ""}
            ]))
            .await
            .unwrap();

        let settings = service.remove_hero_slide(0).await.unwrap();
        assert_eq!(settings.hero_slides.len(), 1);
        assert_eq!(settings.hero_slides[0].title, "Two");
        assert!(!service.storage.bucket_dir().join(path).exists());
        assert!(matches!(service.remove_hero_slide(5).await, Err(SettingsError::EntryNotFound(5))));
    }
}
