//! File listing and direct-download calls.

use reqwest::Response;
use transfer_types::{FileEntry, FileListing};

use crate::client::TransferClient;
use crate::error::Result;

impl TransferClient {
    /// Lists the directory at `path` (empty string for the root).
    pub async fn list_files(&self, path: &str) -> Result<FileListing> {
        let url = self.connection().url("files/list")?;
        let response = self
            .connection()
            .send_with_retry(|http| http.get(url.clone()).query(&[("path", path)]))
            .await?;
        Ok(response.json().await?)
    }

    pub async fn file_info(&self, path: &str) -> Result<FileEntry> {
        let url = self.connection().url("files/info")?;
        let response = self
            .connection()
            .send_with_retry(|http| http.get(url.clone()).query(&[("path", path)]))
            .await?;
        Ok(response.json().await?)
    }

    /// Direct, untracked byte download. Returns the response so the host
    /// can stream the body natively.
    pub async fn download_file_direct(&self, path: &str) -> Result<Response> {
        let url = self.connection().url("files/download")?;
        self.connection()
            .send_with_retry(|http| http.get(url.clone()).query(&[("path", path)]))
            .await
    }
}
