//! Email templates.
//!
//! Defaults are compiled in; a file with the same name in the override
//! directory replaces the default. HTML output is autoescaped.

use std::path::Path;

use serde::Serialize;
use tera::{Context, Tera};
use tracing::info;

use vframe_models::{format_bytes, format_duration, User, Video};

use crate::error::NotifyResult;

pub const VIDEO_COMPLETED_TEMPLATE: &str = "video_completed.html";
pub const VIDEO_FAILED_TEMPLATE: &str = "video_failed.html";

const DEFAULT_ERROR_MESSAGE: &str = "Unknown error occurred";

const EMBEDDED: [(&str, &str); 2] = [
    (
        VIDEO_COMPLETED_TEMPLATE,
        include_str!("../templates/video_completed.html"),
    ),
    (
        VIDEO_FAILED_TEMPLATE,
        include_str!("../templates/video_failed.html"),
    ),
];

/// Values available to the templates.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EmailData {
    pub user_name: String,
    pub video_id: String,
    pub video_name: String,
    pub frame_count: i32,
    pub zip_size: Option<String>,
    pub download_url: String,
    pub error_message: String,
    pub processing_time: Option<String>,
}

impl EmailData {
    /// Data for a `video_completed` email.
    pub fn completed(user: &User, video: &Video, public_base_url: &str) -> Self {
        Self {
            frame_count: video.frame_count.unwrap_or(0),
            zip_size: video
                .zip_size_bytes
                .map(|bytes| format_bytes(bytes.max(0) as u64)),
            download_url: download_url(public_base_url, &video.id),
            processing_time: video.processing_duration().map(format_duration),
            ..Self::base(user, video)
        }
    }

    /// Data for a `video_failed` email.
    pub fn failed(user: &User, video: &Video) -> Self {
        Self {
            error_message: video
                .error_message
                .clone()
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string()),
            ..Self::base(user, video)
        }
    }

    fn base(user: &User, video: &Video) -> Self {
        Self {
            user_name: user.name.clone(),
            video_id: video.id.clone(),
            video_name: video.original_name.clone(),
            ..Self::default()
        }
    }
}

/// `<base>/api/v1/videos/<id>/download`
pub fn download_url(public_base_url: &str, video_id: &str) -> String {
    format!(
        "{}/api/v1/videos/{}/download",
        public_base_url.trim_end_matches('/'),
        video_id
    )
}

pub struct Templates {
    tera: Tera,
}

impl Templates {
    /// Compiled-in templates only.
    pub fn embedded() -> NotifyResult<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(EMBEDDED.to_vec())?;
        tera.autoescape_on(vec![".html"]);
        Ok(Self { tera })
    }

    /// Compiled-in templates, with any same-named files in `dir` taking precedence.
    pub fn load(dir: Option<&Path>) -> NotifyResult<Self> {
        let mut templates = Self::embedded()?;
        let Some(dir) = dir else {
            return Ok(templates);
        };

        for (name, _) in EMBEDDED {
            let path = dir.join(name);
            if path.is_file() {
                templates.tera.add_template_file(&path, Some(name))?;
                info!(template = name, path = %path.display(), "Loaded template override");
            }
        }
        Ok(templates)
    }

    pub fn render(&self, name: &str, data: &EmailData) -> NotifyResult<String> {
        let context = Context::from_serialize(data)?;
        Ok(self.tera.render(name, &context)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn user() -> User {
        User {
            id: "u1".to_string(),
            email: "ana@example.com".to_string(),
            name: "Ana".to_string(),
        }
    }

    fn video() -> Video {
        let mut video = Video::new("v1", "u1");
        video.original_name = "holiday.mp4".to_string();
        video
    }

    #[test]
    fn test_completed_data() {
        let mut video = video();
        video.frame_count = Some(100);
        video.zip_size_bytes = Some(1_572_864);
        let started = Utc::now();
        video.processing_started_at = Some(started);
        video.processing_completed_at = Some(started + Duration::seconds(150));

        let data = EmailData::completed(&user(), &video, "https://frames.example.com/");

        assert_eq!(data.frame_count, 100);
        assert_eq!(data.zip_size.as_deref(), Some("1.5 MB"));
        assert_eq!(data.processing_time.as_deref(), Some("2 minutes 30 seconds"));
        assert_eq!(
            data.download_url,
            "https://frames.example.com/api/v1/videos/v1/download"
        );
    }

    #[test]
    fn test_duration_needs_both_timestamps() {
        let mut video = video();
        video.processing_started_at = Some(Utc::now());
        let data = EmailData::completed(&user(), &video, "http://localhost:8080");
        assert!(data.processing_time.is_none());
    }

    #[test]
    fn test_failed_data_defaults_error() {
        let data = EmailData::failed(&user(), &video());
        assert_eq!(data.error_message, "Unknown error occurred");
    }

    #[test]
    fn test_completed_body_names_video_once() {
        let mut video = video();
        video.frame_count = Some(100);
        let templates = Templates::embedded().unwrap();
        let body = templates
            .render(
                VIDEO_COMPLETED_TEMPLATE,
                &EmailData::completed(&user(), &video, "http://localhost:8080"),
            )
            .unwrap();

        assert_eq!(body.matches("holiday.mp4").count(), 1);
        assert!(body.contains("Frames extracted: 100"));
        assert!(body.contains("Download frames"));
        assert!(!body.contains("Processing time"));
    }

    #[test]
    fn test_values_are_escaped() {
        let mut video = video();
        video.original_name = "<script>alert(1)</script>".to_string();
        let templates = Templates::embedded().unwrap();
        let body = templates
            .render(VIDEO_FAILED_TEMPLATE, &EmailData::failed(&user(), &video))
            .unwrap();

        assert!(!body.contains("<script>"));
        assert!(body.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_override_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(VIDEO_FAILED_TEMPLATE),
            "<p>{{ video_name }}: {{ error_message }}</p>",
        )
        .unwrap();

        let templates = Templates::load(Some(dir.path())).unwrap();
        let body = templates
            .render(VIDEO_FAILED_TEMPLATE, &EmailData::failed(&user(), &video()))
            .unwrap();
        assert_eq!(body, "<p>holiday.mp4: Unknown error occurred</p>");

        // Templates without an override keep the default.
        let body = templates
            .render(
                VIDEO_COMPLETED_TEMPLATE,
                &EmailData::completed(&user(), &video(), "http://localhost:8080"),
            )
            .unwrap();
        assert!(body.contains("Your video is ready"));
    }
}
