//! Media asset gateway: upload with CDN-to-local fallback, deletion routing,
//! delivery URLs, and local-to-CDN migration.

use crate::cdn::{
    public_id_for, CdnClient, CdnService, CdnUrlCodec, DeliveryOptions, RemoteUploadRequest,
};
use crate::image;
use crate::models::{
    Asset, AssetRef, Backend, BatchUploadReport, Category, Config, DeleteOutcome, FailedUpload,
    UploadFile, UploadOptions,
};
use crate::selector::{BackendSelection, RemoteCredentials};
use crate::store::{local_id_from_url, local_url, LocalStore, NewLocalFile, SqliteStore};
use crate::{Error, Result};
use futures::future::join_all;
use std::time::Duration;
use tracing::{error, info, warn};

const DATABASE_POOL_SIZE: u32 = 5;

pub struct MediaGateway {
    cdn: Box<dyn CdnService>,
    store: Box<dyn LocalStore>,
    settings: GatewaySettings,
}

/// Injectable backend bundle used to construct [`MediaGateway`] in tests/harnesses.
pub struct GatewayServices {
    pub cdn: Box<dyn CdnService>,
    pub store: Box<dyn LocalStore>,
}

#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub selection: BackendSelection,
    pub codec: CdnUrlCodec,
    pub local_url_prefix: String,
    pub max_upload_bytes: u64,
}

impl GatewaySettings {
    pub fn from_config(config: &Config) -> Self {
        let credentials = RemoteCredentials::from_config(config);
        Self {
            selection: BackendSelection::from_credentials(&credentials),
            codec: CdnUrlCodec::new(
                &config.cdn_delivery_host,
                &credentials.cloud_name,
                &config.cdn_root_folder,
            ),
            local_url_prefix: config.local_url_prefix.clone(),
            max_upload_bytes: config.max_upload_bytes,
        }
    }
}

/// Where an asset reference points once resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Remote(String),
    Local(i64),
}

impl MediaGateway {
    pub fn with_services(services: GatewayServices, settings: GatewaySettings) -> Self {
        Self {
            cdn: services.cdn,
            store: services.store,
            settings,
        }
    }

    /// Construct a gateway backed by the real CDN client and SQLite store.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let settings = GatewaySettings::from_config(config);
        let credentials = RemoteCredentials::from_config(config);

        if settings.selection.remote_available() {
            info!("CDN credentials present; uploads prefer the CDN");
        } else {
            info!("CDN credentials missing; all uploads go to the local store");
        }

        let cdn = CdnClient::new(
            credentials,
            config.cdn_api_base_url.clone(),
            Duration::from_secs(config.cdn_timeout_secs),
        )?;
        let store = SqliteStore::connect(&config.database_url, DATABASE_POOL_SIZE).await?;

        Ok(Self::with_services(
            GatewayServices {
                cdn: Box::new(cdn),
                store: Box::new(store),
            },
            settings,
        ))
    }

    pub fn selection(&self) -> BackendSelection {
        self.settings.selection
    }

    pub fn codec(&self) -> &CdnUrlCodec {
        &self.settings.codec
    }

    /// Store one validated file on the preferred backend.
    ///
    /// A failed CDN upload falls back to the local store once. Only when both
    /// backends fail is [`Error::UploadFailed`] returned.
    pub async fn upload(&self, file: UploadFile, options: &UploadOptions) -> Result<Asset> {
        file.validate(self.settings.max_upload_bytes)?;

        if !self.settings.selection.remote_available() {
            return self.upload_local(&file, options).await;
        }

        match self.upload_remote(&file, options.category, options.owner_id.clone()).await {
            Ok(asset) => Ok(asset),
            Err(remote_err) => {
                warn!(
                    "CDN upload of {} failed, falling back to local store: {}",
                    file.original_name, remote_err
                );
                self.upload_local(&file, options).await.map_err(|local_err| {
                    error!(
                        "Upload of {} failed on both backends: remote={}, local={}",
                        file.original_name, remote_err, local_err
                    );
                    Error::UploadFailed {
                        remote: remote_err.to_string(),
                        local: local_err.to_string(),
                    }
                })
            }
        }
    }

    /// Upload files concurrently. Failures are collected per file and never
    /// abort or roll back the rest of the batch.
    pub async fn upload_multiple(
        &self,
        files: Vec<UploadFile>,
        options: &UploadOptions,
    ) -> BatchUploadReport {
        let results = join_all(files.into_iter().map(|file| async move {
            let original_name = file.original_name.clone();
            (original_name, self.upload(file, options).await)
        }))
        .await;

        let mut report = BatchUploadReport::default();
        for (original_name, result) in results {
            match result {
                Ok(asset) => report.uploaded.push(asset),
                Err(e) => report.failed.push(FailedUpload {
                    original_name,
                    error: e.to_string(),
                }),
            }
        }
        info!(
            "Batch upload finished: {} uploaded, {} failed",
            report.uploaded.len(),
            report.failed.len()
        );
        report
    }

    async fn upload_remote(
        &self,
        file: &UploadFile,
        category: Category,
        owner_id: Option<String>,
    ) -> Result<Asset> {
        let request = RemoteUploadRequest {
            bytes: file.bytes.clone(),
            mime_type: file.mime_type.clone(),
            original_name: file.original_name.clone(),
            public_id: public_id_for(
                &self.settings.codec.root_folder(),
                category.folder(),
                &file.original_name,
            ),
            profile: category.profile(),
        };

        let upload = self.cdn.upload(&request).await?;
        if upload.secure_url.is_empty() || upload.public_id.is_empty() {
            return Err(Error::Cdn(
                "Upload response is missing the URL or public id".to_string(),
            ));
        }
        info!("Uploaded {} to CDN as {}", file.original_name, upload.public_id);

        Ok(Asset {
            identifier: upload.public_id,
            backend: Backend::Remote,
            url: upload.secure_url,
            category,
            bytes: upload.bytes.or(Some(file.size())),
            mime_type: Some(file.mime_type.clone()),
            original_name: Some(file.original_name.clone()),
            width: upload.width,
            height: upload.height,
            format: upload.format,
            owner_id,
        })
    }

    async fn upload_local(&self, file: &UploadFile, options: &UploadOptions) -> Result<Asset> {
        let id = self
            .store
            .insert(NewLocalFile {
                original_name: file.original_name.clone(),
                data: file.bytes.to_vec(),
                mime_type: file.mime_type.clone(),
                category: options.category.to_string(),
                owner_id: options.owner_id.clone(),
            })
            .await?;
        info!("Stored {} locally as file {}", file.original_name, id);

        let probed = image::probe(&file.bytes);
        Ok(Asset {
            identifier: id.to_string(),
            backend: Backend::Local,
            url: local_url(&self.settings.local_url_prefix, id),
            category: options.category,
            bytes: Some(file.size()),
            mime_type: Some(file.mime_type.clone()),
            original_name: Some(file.original_name.clone()),
            width: options.width.or(probed.as_ref().map(|info| info.width)),
            height: options.height.or(probed.as_ref().map(|info| info.height)),
            format: probed.map(|info| info.format),
            owner_id: options.owner_id.clone(),
        })
    }

    /// Parse a reference into its backend target without touching storage.
    fn resolve(&self, asset: &AssetRef) -> Result<Target> {
        let unrecognized = || Error::UnrecognizedAsset(format!("{:?}", asset));
        match asset {
            AssetRef::Stored {
                identifier,
                backend: Backend::Remote,
            } if !identifier.is_empty() => Ok(Target::Remote(identifier.clone())),
            AssetRef::Stored {
                identifier,
                backend: Backend::Local,
            } => identifier
                .trim()
                .parse()
                .map(Target::Local)
                .map_err(|_| unrecognized()),
            AssetRef::Url(url) if self.settings.codec.is_remote_url(url) => self
                .settings
                .codec
                .extract_public_id(url)
                .map(Target::Remote)
                .ok_or_else(unrecognized),
            AssetRef::Url(url) => local_id_from_url(&self.settings.local_url_prefix, url)
                .map(Target::Local)
                .ok_or_else(unrecognized),
            _ => Err(unrecognized()),
        }
    }

    /// CDN URL and public id of a local row that has been migrated.
    async fn migrated_copy(&self, id: i64) -> Result<Option<(String, String)>> {
        let row = self.store.fetch(id).await?;
        Ok(row.and_then(|row| match (row.remote_url, row.remote_public_id) {
            (Some(url), Some(public_id)) => Some((url, public_id)),
            _ => None,
        }))
    }

    /// Remove an asset's bytes from whichever backend owns them.
    ///
    /// Transport failures are returned as errors; a backend that reports the
    /// asset as missing yields `success: false`. Nothing else is rolled back.
    /// A migrated local row only loses its bytes; the row and its CDN pointer
    /// stay so existing references keep resolving.
    pub async fn delete_asset(&self, asset: &AssetRef) -> Result<DeleteOutcome> {
        match self.resolve(asset)? {
            Target::Remote(public_id) => {
                let success = self.cdn.destroy(&public_id).await.map_err(|e| {
                    warn!("CDN delete of {} failed: {}", public_id, e);
                    e
                })?;
                info!("CDN delete of {}: success={}", public_id, success);
                Ok(DeleteOutcome {
                    backend: Backend::Remote,
                    success,
                })
            }
            Target::Local(id) => {
                let migrated = self.migrated_copy(id).await?.is_some();
                let affected = if migrated {
                    self.store.clear_data(id).await
                } else {
                    self.store.delete(id).await
                }
                .map_err(|e| {
                    warn!("Local delete of file {} failed: {}", id, e);
                    e
                })?;
                if migrated {
                    info!("Cleared local bytes of migrated file {}", id);
                } else {
                    info!("Local delete of file {}: {} row(s) removed", id, affected);
                }
                Ok(DeleteOutcome {
                    backend: Backend::Local,
                    success: affected > 0,
                })
            }
        }
    }

    /// Plain delivery URL. Migrated local files are served from their CDN copy.
    /// URLs that belong to neither backend are returned unchanged.
    pub async fn delivery_url(&self, asset: &AssetRef) -> Result<String> {
        let target = match (self.resolve(asset), asset) {
            (Ok(target), _) => target,
            (Err(_), AssetRef::Url(url)) => return Ok(url.clone()),
            (Err(e), _) => return Err(e),
        };
        Ok(match target {
            Target::Remote(public_id) => match asset {
                AssetRef::Url(url) => url.clone(),
                AssetRef::Stored { .. } => self.settings.codec.build_plain_url(&public_id),
            },
            Target::Local(id) => match self.migrated_copy(id).await? {
                Some((remote_url, _)) => remote_url,
                None => local_url(&self.settings.local_url_prefix, id),
            },
        })
    }

    /// Transformed delivery URL. Local assets have no transformation support
    /// and get their plain URL unless they have been migrated.
    pub async fn optimized_url(
        &self,
        asset: &AssetRef,
        options: &DeliveryOptions,
    ) -> Result<String> {
        let target = match (self.resolve(asset), asset) {
            (Ok(target), _) => target,
            (Err(_), AssetRef::Url(url)) => return Ok(url.clone()),
            (Err(e), _) => return Err(e),
        };
        Ok(match target {
            Target::Remote(public_id) => self.settings.codec.build_url(&public_id, options),
            Target::Local(id) => match self.migrated_copy(id).await? {
                Some((_, public_id)) => self.settings.codec.build_url(&public_id, options),
                None => local_url(&self.settings.local_url_prefix, id),
            },
        })
    }

    /// Copy a locally stored file to the CDN and point its record at the copy.
    ///
    /// There is no fallback: the CDN must accept the upload. The local bytes are
    /// kept; removing them is a separate cleanup step. A record that already
    /// points at a CDN copy is rejected with [`Error::AlreadyMigrated`].
    pub async fn migrate(&self, local_id: i64, category: Option<Category>) -> Result<Asset> {
        let row = self
            .store
            .fetch(local_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("local file {}", local_id)))?;

        if row.is_migrated() {
            warn!(
                "Local file {} already migrated to {}",
                local_id,
                row.remote_url.as_deref().unwrap_or_default()
            );
            return Err(Error::AlreadyMigrated(local_id));
        }
        if !self.settings.selection.remote_available() {
            return Err(Error::Config(
                "CDN credentials are not configured; cannot migrate".to_string(),
            ));
        }

        let category = category.unwrap_or_else(|| Category::resolve(&row.category));
        let file = UploadFile::new(row.data, &row.mime_type, &row.original_name);
        let asset = self.upload_remote(&file, category, row.owner_id).await?;

        if let Err(e) = self
            .store
            .record_migration(local_id, &asset.url, &asset.identifier)
            .await
        {
            error!(
                "Uploaded file {} to CDN as {} but could not record it: {}",
                local_id, asset.identifier, e
            );
            // Nothing references the copy without the record.
            match self.cdn.destroy(&asset.identifier).await {
                Ok(true) => info!("Removed unrecorded CDN copy {}", asset.identifier),
                Ok(false) => warn!("Unrecorded CDN copy {} was already gone", asset.identifier),
                Err(destroy_err) => warn!(
                    "Could not remove unrecorded CDN copy {}: {}",
                    asset.identifier, destroy_err
                ),
            }
            return Err(e);
        }
        info!("Migrated local file {} to {}", local_id, asset.url);

        Ok(asset)
    }
}

#[cfg(test)]
mod tests {
    use super::{GatewayServices, GatewaySettings, MediaGateway, Target};
    use crate::cdn::{CdnUrlCodec, DeliveryOptions, MockCdnClient};
    use crate::models::{AssetRef, Backend, Category, UploadFile, UploadOptions};
    use crate::selector::BackendSelection;
    use crate::store::MockLocalStore;
    use crate::Error;
    use pretty_assertions::assert_eq;

    const CDN_HOST: &str = "res.cloudinary.com";
    const CLOUD: &str = "mock-cloud";

    fn settings(remote_available: bool) -> GatewaySettings {
        GatewaySettings {
            selection: BackendSelection::new(remote_available),
            codec: CdnUrlCodec::new(CDN_HOST, CLOUD, "gallery"),
            local_url_prefix: "/api/uploads".to_string(),
            max_upload_bytes: 1024 * 1024,
        }
    }

    fn build_gateway(
        remote_available: bool,
        cdn: MockCdnClient,
        store: MockLocalStore,
    ) -> MediaGateway {
        MediaGateway::with_services(
            GatewayServices {
                cdn: Box::new(cdn),
                store: Box::new(store),
            },
            settings(remote_available),
        )
    }

    fn png(name: &str) -> UploadFile {
        UploadFile::new(vec![7u8; 10 * 1024], "image/png", name)
    }

    #[tokio::test]
    async fn test_upload_prefers_cdn_when_available() {
        let cdn = MockCdnClient::new();
        let store = MockLocalStore::new();
        let gateway = build_gateway(true, cdn.clone(), store.clone());

        let asset = gateway
            .upload(png("hero.png"), &UploadOptions::for_category(Category::Hero))
            .await
            .unwrap();

        assert_eq!(asset.backend, Backend::Remote);
        assert!(asset.url.contains(CDN_HOST));
        assert!(asset.url.contains("/gallery/hero/"));
        assert_eq!(asset.width, Some(1920));
        assert_eq!(asset.height, Some(1080));
        assert_eq!(cdn.get_upload_count(), 1);
        assert_eq!(store.get_insert_count(), 0);
    }

    #[tokio::test]
    async fn test_upload_without_credentials_never_calls_cdn() {
        let cdn = MockCdnClient::new();
        let store = MockLocalStore::new();
        let gateway = build_gateway(false, cdn.clone(), store.clone());

        let asset = gateway
            .upload(png("a.png"), &UploadOptions::default())
            .await
            .unwrap();

        assert_eq!(asset.backend, Backend::Local);
        assert_eq!(asset.url, "/api/uploads/1");
        assert_eq!(asset.identifier, "1");
        assert_eq!(cdn.get_upload_count(), 0);
    }

    #[tokio::test]
    async fn test_upload_falls_back_to_local_on_cdn_failure() {
        let cdn = MockCdnClient::new().with_failure(true);
        let store = MockLocalStore::new();
        let gateway = build_gateway(true, cdn.clone(), store.clone());

        let options = UploadOptions {
            category: Category::Artwork,
            owner_id: Some("curator".to_string()),
            width: Some(640),
            height: Some(480),
        };
        let asset = gateway.upload(png("piece.png"), &options).await.unwrap();

        assert_eq!(asset.backend, Backend::Local);
        assert_eq!(asset.width, Some(640));
        assert_eq!(asset.owner_id.as_deref(), Some("curator"));
        assert_eq!(cdn.get_upload_count(), 1);
        assert_eq!(store.get_row(1).unwrap().category, "artwork");
    }

    #[tokio::test]
    async fn test_upload_fails_when_both_backends_fail() {
        let gateway = build_gateway(
            true,
            MockCdnClient::new().with_failure(true),
            MockLocalStore::new().with_failure(true),
        );

        let err = gateway
            .upload(png("doomed.png"), &UploadOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UploadFailed { .. }));
    }

    #[tokio::test]
    async fn test_validation_rejection_does_not_touch_backends() {
        let cdn = MockCdnClient::new();
        let store = MockLocalStore::new();
        let gateway = build_gateway(true, cdn.clone(), store.clone());

        let err = gateway
            .upload(
                UploadFile::new(Vec::new(), "image/png", "empty.png"),
                &UploadOptions::default(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::NoFile));
        assert_eq!(cdn.get_upload_count(), 0);
        assert_eq!(store.get_insert_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_routes_by_url() {
        let cdn = MockCdnClient::new();
        let store = MockLocalStore::new();
        let gateway = build_gateway(true, cdn.clone(), store.clone());

        let remote = gateway
            .upload(png("r.png"), &UploadOptions::default())
            .await
            .unwrap();
        let outcome = gateway
            .delete_asset(&AssetRef::Url(remote.url.clone()))
            .await
            .unwrap();
        assert_eq!(outcome.backend, Backend::Remote);
        assert!(outcome.success);
        assert_eq!(cdn.get_destroyed(), vec![remote.identifier]);
        assert!(store.get_deleted().is_empty());

        let outcome = gateway
            .delete_asset(&AssetRef::Url("/api/uploads/5".to_string()))
            .await
            .unwrap();
        assert_eq!(outcome.backend, Backend::Local);
        assert!(!outcome.success);
        assert_eq!(store.get_deleted(), vec![5]);
        assert_eq!(cdn.get_destroyed().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_reports_cdn_failure() {
        let gateway = build_gateway(
            true,
            MockCdnClient::new().with_failure(true),
            MockLocalStore::new(),
        );
        let result = gateway
            .delete_asset(&AssetRef::Stored {
                identifier: "gallery/hero/x_1".to_string(),
                backend: Backend::Remote,
            })
            .await;
        assert!(matches!(result, Err(Error::Cdn(_))));
    }

    #[test]
    fn test_resolve_rejects_unparseable_references() {
        let gateway = build_gateway(true, MockCdnClient::new(), MockLocalStore::new());

        let bad_local = AssetRef::Stored {
            identifier: "abc".to_string(),
            backend: Backend::Local,
        };
        assert!(matches!(
            gateway.resolve(&bad_local),
            Err(Error::UnrecognizedAsset(_))
        ));

        let foreign_cdn = AssetRef::Url(format!(
            "https://{}/{}/image/upload/v1/misc/a.png",
            CDN_HOST, CLOUD
        ));
        assert!(gateway.resolve(&foreign_cdn).is_err());

        let stored = AssetRef::Stored {
            identifier: "12".to_string(),
            backend: Backend::Local,
        };
        assert_eq!(gateway.resolve(&stored).unwrap(), Target::Local(12));
    }

    #[tokio::test]
    async fn test_delivery_and_optimized_urls() {
        let gateway = build_gateway(true, MockCdnClient::new(), MockLocalStore::new());

        let remote = AssetRef::Stored {
            identifier: "gallery/artists/ana_12345678".to_string(),
            backend: Backend::Remote,
        };
        assert_eq!(
            gateway.delivery_url(&remote).await.unwrap(),
            "https://res.cloudinary.com/mock-cloud/image/upload/gallery/artists/ana_12345678"
        );
        let options = DeliveryOptions {
            width: Some(300),
            ..DeliveryOptions::default()
        };
        assert_eq!(
            gateway.optimized_url(&remote, &options).await.unwrap(),
            "https://res.cloudinary.com/mock-cloud/image/upload/w_300,q_auto,f_auto/gallery/artists/ana_12345678"
        );

        let local = AssetRef::Stored {
            identifier: "9".to_string(),
            backend: Backend::Local,
        };
        assert_eq!(gateway.delivery_url(&local).await.unwrap(), "/api/uploads/9");
        assert_eq!(
            gateway.optimized_url(&local, &options).await.unwrap(),
            "/api/uploads/9"
        );

        let foreign = AssetRef::Url("https://images.example.org/photos/1".to_string());
        assert_eq!(
            gateway.delivery_url(&foreign).await.unwrap(),
            "https://images.example.org/photos/1"
        );
    }

    #[tokio::test]
    async fn test_migrated_local_reference_is_served_from_cdn() {
        let cdn = MockCdnClient::new();
        let store = MockLocalStore::new();
        let local_only = build_gateway(false, cdn.clone(), store.clone());
        let local = local_only
            .upload(png("moved.png"), &UploadOptions::for_category(Category::Artwork))
            .await
            .unwrap();

        let gateway = build_gateway(true, cdn.clone(), store.clone());
        let migrated = gateway.migrate(1, None).await.unwrap();

        let by_id = AssetRef::from(&local);
        let by_url = AssetRef::Url(local.url.clone());
        assert_eq!(gateway.delivery_url(&by_id).await.unwrap(), migrated.url);
        assert_eq!(gateway.delivery_url(&by_url).await.unwrap(), migrated.url);

        let options = DeliveryOptions {
            width: Some(300),
            ..DeliveryOptions::default()
        };
        assert_eq!(
            gateway.optimized_url(&by_id, &options).await.unwrap(),
            gateway.codec().build_url(&migrated.identifier, &options)
        );
    }

    #[tokio::test]
    async fn test_cleanup_after_migration_keeps_pointer() {
        let cdn = MockCdnClient::new();
        let store = MockLocalStore::new();
        let local_only = build_gateway(false, cdn.clone(), store.clone());
        let local = local_only
            .upload(png("kept.png"), &UploadOptions::default())
            .await
            .unwrap();

        let gateway = build_gateway(true, cdn.clone(), store.clone());
        let migrated = gateway.migrate(1, None).await.unwrap();

        let outcome = gateway.delete_asset(&AssetRef::from(&local)).await.unwrap();
        assert_eq!(outcome.backend, Backend::Local);
        assert!(outcome.success);
        assert!(store.get_deleted().is_empty());
        assert!(cdn.get_destroyed().is_empty());

        let row = store.get_row(1).unwrap();
        assert!(row.data.is_empty());
        assert_eq!(row.remote_url.as_deref(), Some(migrated.url.as_str()));
        assert_eq!(
            gateway.delivery_url(&AssetRef::from(&local)).await.unwrap(),
            migrated.url
        );
    }

    #[tokio::test]
    async fn test_delete_rejects_urls_outside_local_prefix() {
        let cdn = MockCdnClient::new();
        let store = MockLocalStore::new();
        let gateway = build_gateway(false, cdn.clone(), store.clone());
        gateway
            .upload(png("one.png"), &UploadOptions::default())
            .await
            .unwrap();

        for url in [
            "https://images.example.org/photos/1",
            "https://elsewhere.example.org/api/uploads/1",
            "/photos/1",
        ] {
            let err = gateway
                .delete_asset(&AssetRef::Url(url.to_string()))
                .await
                .unwrap_err();
            assert!(matches!(err, Error::UnrecognizedAsset(_)), "{}", url);
        }

        assert!(store.get_row(1).is_some());
        assert!(store.get_deleted().is_empty());
        assert!(cdn.get_destroyed().is_empty());
    }

    #[tokio::test]
    async fn test_migrate_moves_local_file_to_cdn() {
        let cdn = MockCdnClient::new();
        let store = MockLocalStore::new();
        let local_only = build_gateway(false, cdn.clone(), store.clone());
        let local = local_only
            .upload(png("old.png"), &UploadOptions::for_category(Category::Exhibition))
            .await
            .unwrap();
        let id: i64 = local.identifier.parse().unwrap();

        let gateway = build_gateway(true, cdn.clone(), store.clone());
        let migrated = gateway.migrate(id, None).await.unwrap();

        assert_eq!(migrated.backend, Backend::Remote);
        assert!(migrated.identifier.starts_with("gallery/exhibitions/old_"));
        assert_eq!(migrated.width, Some(1200));

        let row = store.get_row(id).unwrap();
        assert_eq!(row.remote_url.as_deref(), Some(migrated.url.as_str()));
        assert_eq!(row.data.len(), 10 * 1024);

        let again = gateway.migrate(id, None).await.unwrap_err();
        assert!(matches!(again, Error::AlreadyMigrated(_)));
        assert_eq!(cdn.get_upload_count(), 1);
    }

    #[tokio::test]
    async fn test_migrate_missing_file_skips_cdn() {
        let cdn = MockCdnClient::new();
        let gateway = build_gateway(true, cdn.clone(), MockLocalStore::new());

        let err = gateway.migrate(404, Some(Category::Hero)).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(cdn.get_upload_count(), 0);
    }

    #[tokio::test]
    async fn test_migrate_has_no_local_fallback() {
        let store = MockLocalStore::new();
        let local_only = build_gateway(false, MockCdnClient::new(), store.clone());
        local_only
            .upload(png("stay.png"), &UploadOptions::default())
            .await
            .unwrap();

        let gateway = build_gateway(true, MockCdnClient::new().with_failure(true), store.clone());
        let err = gateway.migrate(1, None).await.unwrap_err();

        assert!(matches!(err, Error::Cdn(_)));
        assert_eq!(store.get_insert_count(), 1);
        assert!(!store.get_row(1).unwrap().is_migrated());
    }

    #[tokio::test]
    async fn test_migrate_requires_cdn_credentials() {
        let store = MockLocalStore::new();
        let gateway = build_gateway(false, MockCdnClient::new(), store.clone());
        gateway
            .upload(png("x.png"), &UploadOptions::default())
            .await
            .unwrap();

        let err = gateway.migrate(1, None).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_migrate_removes_cdn_copy_when_record_fails() {
        let cdn = MockCdnClient::new();
        let store = MockLocalStore::new();
        build_gateway(false, cdn.clone(), store.clone())
            .upload(png("orphan.png"), &UploadOptions::default())
            .await
            .unwrap();

        let store = store.with_record_failure(true);
        let gateway = build_gateway(true, cdn.clone(), store.clone());
        let err = gateway.migrate(1, None).await.unwrap_err();

        assert!(matches!(err, Error::Io(_)));
        assert_eq!(cdn.get_upload_count(), 1);
        let destroyed = cdn.get_destroyed();
        assert_eq!(destroyed.len(), 1);
        assert!(destroyed[0].starts_with("gallery/gallery/orphan_"));
        assert!(!store.get_row(1).unwrap().is_migrated());
    }
}
