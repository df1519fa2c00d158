use anyhow::{anyhow, Context, Result};
use rand::RngCore;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const PUSHBULLET_API: &str = "https://api.pushbullet.com/v2";

/// Outbound notification transport.
///
/// Called from alert workers, never from the frame loop. Errors are logged by
/// the worker pool and never retried.
pub trait Notifier: Send + Sync {
    fn send_text(&self, message: &str, title: Option<&str>) -> Result<()>;

    fn send_file(&self, path: &Path, message: Option<&str>, title: Option<&str>) -> Result<()>;
}

/// Logs notifications instead of sending them. Used by dry runs and replay.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send_text(&self, message: &str, title: Option<&str>) -> Result<()> {
        log::info!("notify text title={:?} body={:?}", title, message);
        Ok(())
    }

    fn send_file(&self, path: &Path, message: Option<&str>, title: Option<&str>) -> Result<()> {
        log::info!(
            "notify file {} title={:?} body={:?}",
            path.display(),
            title,
            message
        );
        Ok(())
    }
}

/// Pushbullet REST client.
pub struct PushbulletNotifier {
    agent: ureq::Agent,
    api_key: String,
    base_url: String,
    default_title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadRequestResponse {
    file_name: String,
    file_type: String,
    file_url: String,
    upload_url: String,
}

impl PushbulletNotifier {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(anyhow!("pushbullet api key must not be empty"));
        }
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Ok(Self {
            agent,
            api_key,
            base_url: PUSHBULLET_API.to_string(),
            default_title: None,
        })
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.default_title = Some(title.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn title<'a>(&'a self, title: Option<&'a str>) -> Option<&'a str> {
        title.or(self.default_title.as_deref())
    }

    fn push(&self, body: serde_json::Value) -> Result<()> {
        self.agent
            .post(&format!("{}/pushes", self.base_url))
            .set("Access-Token", &self.api_key)
            .send_json(body)
            .map_err(|e| anyhow!("pushbullet push failed: {}", e))?;
        Ok(())
    }

    fn upload(&self, path: &Path) -> Result<UploadRequestResponse> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| anyhow!("snapshot path {} has no file name", path.display()))?;
        let file_type = mime_for(path);
        let bytes = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;

        let request: UploadRequestResponse = self
            .agent
            .post(&format!("{}/upload-request", self.base_url))
            .set("Access-Token", &self.api_key)
            .send_json(serde_json::json!({
                "file_name": file_name,
                "file_type": file_type,
            }))
            .map_err(|e| anyhow!("pushbullet upload-request failed: {}", e))?
            .into_json()
            .context("decode upload-request response")?;

        let (content_type, body) = multipart_file(&request.file_name, &request.file_type, &bytes);
        self.agent
            .post(&request.upload_url)
            .set("Content-Type", &content_type)
            .send_bytes(&body)
            .map_err(|e| anyhow!("pushbullet upload failed: {}", e))?;
        Ok(request)
    }
}

impl Notifier for PushbulletNotifier {
    fn send_text(&self, message: &str, title: Option<&str>) -> Result<()> {
        let mut body = serde_json::json!({ "type": "note", "body": message });
        if let Some(title) = self.title(title) {
            body["title"] = title.into();
        }
        self.push(body)
    }

    fn send_file(&self, path: &Path, message: Option<&str>, title: Option<&str>) -> Result<()> {
        let upload = self.upload(path)?;
        let mut body = serde_json::json!({
            "type": "file",
            "file_name": upload.file_name,
            "file_type": upload.file_type,
            "file_url": upload.file_url,
        });
        if let Some(message) = message {
            body["body"] = message.into();
        }
        if let Some(title) = self.title(title) {
            body["title"] = title.into();
        }
        self.push(body)
    }
}

fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        _ => "application/octet-stream",
    }
}

/// Single-field `multipart/form-data` body. Returns (content type, body).
fn multipart_file(file_name: &str, file_type: &str, bytes: &[u8]) -> (String, Vec<u8>) {
    let mut nonce = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut nonce);
    let boundary = format!(
        "----alertd{}",
        nonce.iter().map(|b| format!("{:02x}", b)).collect::<String>()
    );

    let mut body = Vec::with_capacity(bytes.len() + 256);
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
            file_name.replace('"', "")
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", file_type).as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    (format!("multipart/form-data; boundary={}", boundary), body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_api_key() {
        assert!(PushbulletNotifier::new("  ", Duration::from_secs(5)).is_err());
    }

    #[test]
    fn explicit_title_wins_over_default() {
        let notifier = PushbulletNotifier::new("key", Duration::from_secs(5))
            .unwrap()
            .with_title("Backyard");
        assert_eq!(notifier.title(None), Some("Backyard"));
        assert_eq!(notifier.title(Some("Porch")), Some("Porch"));
    }

    #[test]
    fn multipart_body_wraps_file_bytes() {
        let (content_type, body) = multipart_file("poop-20240101-120000.jpg", "image/jpeg", b"JPEG");
        let boundary = content_type
            .strip_prefix("multipart/form-data; boundary=")
            .unwrap();
        let text = String::from_utf8(body).unwrap();

        assert!(text.starts_with(&format!("--{}\r\n", boundary)));
        assert!(text.contains("filename=\"poop-20240101-120000.jpg\""));
        assert!(text.contains("Content-Type: image/jpeg\r\n\r\nJPEG\r\n"));
        assert!(text.ends_with(&format!("--{}--\r\n", boundary)));
    }

    #[test]
    fn mime_from_extension() {
        assert_eq!(mime_for(Path::new("a/b.JPG")), "image/jpeg");
        assert_eq!(mime_for(Path::new("a/b.png")), "image/png");
        assert_eq!(mime_for(Path::new("a/b")), "application/octet-stream");
    }
}
