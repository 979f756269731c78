//! Storage-link endpoints.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Method;

use super::{DriveApi, HttpApi};
use crate::errors::ClientError;
use crate::models::{
    ConnectResponse, ConnectionStatus, CreateFolderRequest, DriveEntry, FileUpload, Listing,
};

#[async_trait]
impl DriveApi for HttpApi {
    /// GET /api/drive/status
    async fn connection_status(&self) -> Result<ConnectionStatus, ClientError> {
        self.send(self.request(Method::GET, "/drive/status")).await
    }

    /// POST /api/drive/connect
    async fn begin_link(&self) -> Result<ConnectResponse, ClientError> {
        self.send(self.request(Method::POST, "/drive/connect")).await
    }

    /// GET /api/drive/files?folderId=..&search=..
    async fn list_entries(
        &self,
        folder_id: Option<&str>,
        search: Option<&str>,
    ) -> Result<Listing, ClientError> {
        let mut query: Vec<(&str, &str)> = Vec::new();
        if let Some(folder_id) = folder_id {
            query.push(("folderId", folder_id));
        }
        if let Some(search) = search {
            query.push(("search", search));
        }
        self.send(self.request(Method::GET, "/drive/files").query(&query))
            .await
    }

    /// POST /api/drive/upload (multipart)
    async fn upload_entry(
        &self,
        file: &FileUpload,
        parent_id: Option<&str>,
    ) -> Result<DriveEntry, ClientError> {
        let part = Part::bytes(file.bytes.clone())
            .file_name(file.name.clone())
            .mime_str(&file.mime_type)
            .map_err(|e| {
                ClientError::Validation(format!("Invalid MIME type '{}': {}", file.mime_type, e))
            })?;
        let mut form = Form::new().part("file", part);
        if let Some(parent_id) = parent_id {
            form = form.text("parentId", parent_id.to_string());
        }
        self.send(self.request(Method::POST, "/drive/upload").multipart(form))
            .await
    }

    /// POST /api/drive/folders
    async fn create_folder(
        &self,
        name: &str,
        parent_id: Option<&str>,
    ) -> Result<DriveEntry, ClientError> {
        let body = CreateFolderRequest { name, parent_id };
        self.send(self.request(Method::POST, "/drive/folders").json(&body))
            .await
    }
}
