use async_trait::async_trait;
use huntbot_core::backend::{CreatedDocument, DocumentService};
use huntbot_core::domain::puzzle::DocumentKind;
use huntbot_core::errors::BackendError;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::client::{send, GoogleApiError, GoogleClient};

const FILE_FIELDS: &str = "id, name, mimeType, webViewLink";

/// Creates puzzle documents inside the hunt folder via Drive v3.
#[derive(Clone)]
pub struct GoogleDriveDocuments {
    client: GoogleClient,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewFile<'a> {
    name: &'a str,
    mime_type: &'static str,
    parents: [&'a str; 1],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    #[serde(default)]
    web_view_link: Option<String>,
}

impl GoogleDriveDocuments {
    pub fn new(base_url: &str, access_token: SecretString) -> Result<Self, BackendError> {
        let client =
            GoogleClient::new(base_url, access_token).map_err(GoogleApiError::into_documents)?;
        Ok(Self { client })
    }
}

/// Link used when Drive omits `webViewLink`.
fn fallback_link(kind: DocumentKind, id: &str) -> String {
    let path = match kind {
        DocumentKind::Sheet => "spreadsheets",
        DocumentKind::Doc => "document",
    };
    format!("https://docs.google.com/{path}/d/{id}/edit")
}

#[async_trait]
impl DocumentService for GoogleDriveDocuments {
    async fn create_document(
        &self,
        name: &str,
        parent_folder_id: &str,
        kind: DocumentKind,
    ) -> Result<CreatedDocument, BackendError> {
        let body = NewFile { name, mime_type: kind.mime_type(), parents: [parent_folder_id] };
        let request = self
            .client
            .post(self.client.endpoint(&["files"]))
            .query(&[("fields", FILE_FIELDS), ("supportsAllDrives", "true")])
            .json(&body);
        let response =
            send(request, "drive files.create").await.map_err(GoogleApiError::into_documents)?;
        let file = response.json::<DriveFile>().await.map_err(|error| {
            BackendError::Documents(format!("unreadable files.create response: {error}"))
        })?;

        let link = file.web_view_link.unwrap_or_else(|| fallback_link(kind, &file.id));
        info!(
            event_name = "google.drive.created",
            document_id = %file.id,
            kind = kind.label(),
            name,
            "document created"
        );
        Ok(CreatedDocument { id: file.id, link })
    }
}

#[cfg(test)]
mod tests {
    use huntbot_core::domain::puzzle::DocumentKind;

    use super::{fallback_link, DriveFile, NewFile};

    #[test]
    fn request_body_uses_drive_field_names() {
        let body = NewFile {
            name: "Crossing Guard",
            mime_type: DocumentKind::Sheet.mime_type(),
            parents: ["folder-1"],
        };

        let value = serde_json::to_value(&body).expect("serialize");
        assert_eq!(value["mimeType"], "application/vnd.google-apps.spreadsheet");
        assert_eq!(value["parents"][0], "folder-1");
    }

    #[test]
    fn response_link_is_optional() {
        let file = serde_json::from_str::<DriveFile>(
            r#"{"id":"abc","name":"Alpha","mimeType":"application/vnd.google-apps.document"}"#,
        )
        .expect("decode");

        assert!(file.web_view_link.is_none());
        assert_eq!(
            fallback_link(DocumentKind::Doc, &file.id),
            "https://docs.google.com/document/d/abc/edit"
        );
    }
}
