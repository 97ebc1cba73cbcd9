//! Google Drive v3 backend over the REST API.
//!
//! Authentication is out of scope: the client is handed a bearer token that
//! an external OAuth flow produced.

use super::{CloudStorage, FileFilter, FileQuery, Scope};
use crate::config::DriveConfig;
use crate::error::Error;
use crate::model::{mime_for_path, RemoteFileRecord, FOLDER_MIME_TYPE};
use reqwest::blocking::{Client, Response};
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde_json::json;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Only the fields the agents need, to keep listing payloads small.
const LIST_FIELDS: &str = "nextPageToken, files(id, name, mimeType, size, md5Checksum)";

const MULTIPART_BOUNDARY: &str = "space_fixer_multipart_boundary";

pub struct DriveClient {
    client: Client,
    access_token: String,
    api_base: String,
    upload_base: String,
    page_size: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    mime_type: String,
    size: Option<String>,
    md5_checksum: Option<String>,
}

impl From<DriveFile> for RemoteFileRecord {
    fn from(file: DriveFile) -> Self {
        RemoteFileRecord {
            id: file.id,
            name: file.name,
            size: file
                .size
                .as_deref()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
            mime_type: file.mime_type,
            content_hash: file.md5_checksum.filter(|h| !h.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreatedFile {
    id: String,
}

impl DriveClient {
    pub fn new(config: &DriveConfig) -> Result<Self, Error> {
        let access_token = config
            .access_token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                Error::Setup(
                    "drive.access_token is not set (SPACE_FIXER__DRIVE__ACCESS_TOKEN)".to_string(),
                )
            })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            access_token,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            upload_base: config.upload_base.trim_end_matches('/').to_string(),
            page_size: config.page_size,
        })
    }

    fn upload_media(&self, id: &str, source: &Path) -> Result<(), Error> {
        let file = File::open(source)?;
        let response = self
            .client
            .patch(format!("{}/files/{}", self.upload_base, id))
            .bearer_auth(&self.access_token)
            .query(&[("uploadType", "media"), ("fields", "id")])
            .header(CONTENT_TYPE, mime_for_path(source).to_string())
            .body(file)
            .send()?;
        check(response)?;
        Ok(())
    }
}

impl CloudStorage for DriveClient {
    fn list(&self, query: &FileQuery) -> Result<Vec<RemoteFileRecord>, Error> {
        let q = drive_query(query);
        let page_size = self.page_size.to_string();
        let mut records = Vec::new();
        let mut page_token: Option<String> = None;
        let start = Instant::now();

        loop {
            let mut request = self
                .client
                .get(format!("{}/files", self.api_base))
                .bearer_auth(&self.access_token)
                .query(&[
                    ("q", q.as_str()),
                    ("fields", LIST_FIELDS),
                    ("pageSize", page_size.as_str()),
                    ("spaces", "drive"),
                ]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let page: FileList = check(request.send()?)?.json()?;
            trace!("Listed page of {} files", page.files.len());
            records.extend(page.files.into_iter().map(RemoteFileRecord::from));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!(
            "Drive query `{}` returned {} files in {:.2}s",
            q,
            records.len(),
            start.elapsed().as_secs_f64()
        );
        Ok(records)
    }

    fn get_media(&self, id: &str) -> Result<Box<dyn Read>, Error> {
        let response = self
            .client
            .get(format!("{}/files/{}", self.api_base, id))
            .bearer_auth(&self.access_token)
            .query(&[("alt", "media")])
            .send()?;
        Ok(Box::new(check(response)?))
    }

    fn delete(&self, id: &str) -> Result<(), Error> {
        let response = self
            .client
            .delete(format!("{}/files/{}", self.api_base, id))
            .bearer_auth(&self.access_token)
            .send()?;
        check(response)?;
        Ok(())
    }

    /// Metadata and content are sent in a single multipart request.
    fn create(&self, name: &str, parent_id: &str, source: &Path) -> Result<String, Error> {
        let metadata = json!({ "name": name, "parents": [parent_id] });
        let mut content = Vec::new();
        File::open(source)?.read_to_end(&mut content)?;
        let body = multipart_body(&metadata, &mime_for_path(source), &content);

        let response = self
            .client
            .post(format!("{}/files", self.upload_base))
            .bearer_auth(&self.access_token)
            .query(&[("uploadType", "multipart"), ("fields", "id")])
            .header(
                CONTENT_TYPE,
                format!("multipart/related; boundary={}", MULTIPART_BOUNDARY),
            )
            .body(body)
            .send()?;
        let created: CreatedFile = check(response)?.json()?;
        Ok(created.id)
    }

    fn update(&self, id: &str, source: &Path) -> Result<(), Error> {
        self.upload_media(id, source)
    }
}

fn check(response: Response) -> Result<Response, Error> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .text()
        .unwrap_or_else(|e| format!("<unreadable body: {}>", e));
    Err(Error::Remote {
        status: status.as_u16(),
        message,
    })
}

fn multipart_body(metadata: &serde_json::Value, content_type: &mime::Mime, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(content.len() + 512);
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{meta}\r\n--{b}\r\nContent-Type: {ct}\r\n\r\n",
            b = MULTIPART_BOUNDARY,
            meta = metadata,
            ct = content_type
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", MULTIPART_BOUNDARY).as_bytes());
    body
}

/// Translate a query into the Drive `q` search syntax.
pub fn drive_query(query: &FileQuery) -> String {
    let mut clauses = Vec::new();
    if let Scope::Folder(id) = &query.scope {
        clauses.push(format!("'{}' in parents", escape(id)));
    }
    match &query.filter {
        FileFilter::Any => {}
        FileFilter::MimePrefix(prefix) => {
            clauses.push(format!("mimeType contains '{}'", escape(prefix)));
        }
        FileFilter::NotFolder => clauses.push(format!("mimeType != '{}'", FOLDER_MIME_TYPE)),
    }
    if !query.include_trashed {
        clauses.push("trashed = false".to_string());
    }
    clauses.join(" and ")
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}
