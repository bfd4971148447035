use super::{CdnService, RemoteUpload, RemoteUploadRequest};
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// In-memory CDN that mimics upload/destroy responses, with failure injection.
#[derive(Clone)]
pub struct MockCdnClient {
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    delivery_host: String,
    cloud_name: String,
    upload_count: Arc<Mutex<usize>>,
    destroyed: Arc<Mutex<Vec<String>>>,
    should_fail: Arc<Mutex<bool>>,
}

impl MockCdnClient {
    pub fn new() -> Self {
        Self {
            files: Arc::new(Mutex::new(HashMap::new())),
            delivery_host: "res.cloudinary.com".to_string(),
            cloud_name: "mock-cloud".to_string(),
            upload_count: Arc::new(Mutex::new(0)),
            destroyed: Arc::new(Mutex::new(Vec::new())),
            should_fail: Arc::new(Mutex::new(false)),
        }
    }

    pub fn with_delivery_host(mut self, delivery_host: String) -> Self {
        self.delivery_host = delivery_host;
        self
    }

    pub fn with_cloud_name(mut self, cloud_name: String) -> Self {
        self.cloud_name = cloud_name;
        self
    }

    pub fn with_file(self, public_id: String, content: Vec<u8>) -> Self {
        self.files.lock().unwrap().insert(public_id, content);
        self
    }

    pub fn with_failure(self, should_fail: bool) -> Self {
        *self.should_fail.lock().unwrap() = should_fail;
        self
    }

    /// Number of upload attempts, including failed ones.
    pub fn get_upload_count(&self) -> usize {
        *self.upload_count.lock().unwrap()
    }

    /// Public ids passed to `destroy`, in call order.
    pub fn get_destroyed(&self) -> Vec<String> {
        self.destroyed.lock().unwrap().clone()
    }

    pub fn get_files(&self) -> HashMap<String, Vec<u8>> {
        self.files.lock().unwrap().clone()
    }
}

impl Default for MockCdnClient {
    fn default() -> Self {
        Self::new()
    }
}

fn extension_for(mime_type: &str) -> &str {
    match mime_type {
        "image/jpeg" => "jpg",
        "image/svg+xml" => "svg",
        other => other.strip_prefix("image/").unwrap_or("bin"),
    }
}

#[async_trait]
impl CdnService for MockCdnClient {
    async fn upload(&self, request: &RemoteUploadRequest) -> Result<RemoteUpload> {
        *self.upload_count.lock().unwrap() += 1;

        if *self.should_fail.lock().unwrap() {
            return Err(crate::Error::Cdn("Mock upload failure".to_string()));
        }

        self.files
            .lock()
            .unwrap()
            .insert(request.public_id.clone(), request.bytes.to_vec());

        let format = extension_for(&request.mime_type).to_string();
        Ok(RemoteUpload {
            public_id: request.public_id.clone(),
            secure_url: format!(
                "https://{}/{}/image/upload/v1/{}.{}",
                self.delivery_host, self.cloud_name, request.public_id, format
            ),
            width: Some(request.profile.width),
            height: Some(request.profile.height),
            format: Some(format),
            bytes: Some(request.bytes.len() as u64),
        })
    }

    async fn destroy(&self, public_id: &str) -> Result<bool> {
        self.destroyed.lock().unwrap().push(public_id.to_string());

        if *self.should_fail.lock().unwrap() {
            return Err(crate::Error::Cdn("Mock destroy failure".to_string()));
        }

        Ok(self.files.lock().unwrap().remove(public_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;

    fn request(public_id: &str) -> RemoteUploadRequest {
        RemoteUploadRequest {
            bytes: b"image".to_vec().into(),
            mime_type: "image/jpeg".to_string(),
            original_name: "a.jpg".to_string(),
            public_id: public_id.to_string(),
            profile: Category::Artist.profile(),
        }
    }

    #[tokio::test]
    async fn test_mock_cdn_upload_and_destroy() {
        let client = MockCdnClient::new();

        let upload = client.upload(&request("gallery/artists/a_1")).await.unwrap();
        assert_eq!(
            upload.secure_url,
            "https://res.cloudinary.com/mock-cloud/image/upload/v1/gallery/artists/a_1.jpg"
        );
        assert_eq!(upload.width, Some(800));
        assert_eq!(client.get_upload_count(), 1);

        assert!(client.destroy("gallery/artists/a_1").await.unwrap());
        assert!(!client.destroy("gallery/artists/a_1").await.unwrap());
        assert_eq!(client.get_destroyed().len(), 2);
    }

    #[tokio::test]
    async fn test_mock_cdn_failure() {
        let client = MockCdnClient::new().with_failure(true);

        let result = client.upload(&request("gallery/artists/b_2")).await;
        assert!(result.is_err());
        assert_eq!(client.get_upload_count(), 1);
        assert!(client.get_files().is_empty());
    }

    #[tokio::test]
    async fn test_mock_cdn_preloaded_file() {
        let client = MockCdnClient::new().with_file("gallery/hero/x".to_string(), vec![1]);
        assert!(client.destroy("gallery/hero/x").await.unwrap());
    }
}
