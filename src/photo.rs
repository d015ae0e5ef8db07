use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::gateway::{ApiBackend, ImageRequest};

const PROMPT_PLACEHOLDER: &str = "{}";
const IMAGE_EXTENSION: &str = "png";

/// Everything needed to generate and store one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoQuerier {
    pub url: String,
    pub model: String,
    pub prompt_format: String,
    pub photo_dir: PathBuf,
    pub photo_prefix: String,
    pub raw: bool,
}

impl PhotoQuerier {
    pub fn format_prompt(&self, prompt: &str) -> String {
        if self.prompt_format.contains(PROMPT_PLACEHOLDER) {
            self.prompt_format.replace(PROMPT_PLACEHOLDER, prompt)
        } else if self.prompt_format.trim().is_empty() {
            prompt.to_string()
        } else {
            format!("{} {}", self.prompt_format, prompt)
        }
    }

    /// First free `<dir>/<prefix>_<timestamp>[_n].png`.
    pub fn image_path(&self, timestamp: NaiveDateTime) -> PathBuf {
        let stem = format!("{}_{}", self.photo_prefix, timestamp.format("%Y%m%d_%H%M%S"));
        let mut path = self.photo_dir.join(format!("{stem}.{IMAGE_EXTENSION}"));
        let mut attempt = 1;
        while path.exists() {
            path = self
                .photo_dir
                .join(format!("{stem}_{attempt}.{IMAGE_EXTENSION}"));
            attempt += 1;
        }
        path
    }

    pub async fn query(
        &self,
        backend: &impl ApiBackend,
        prompt: &str,
        out: &mut impl Write,
    ) -> Result<PathBuf> {
        let full_prompt = self.format_prompt(prompt);
        let image = backend
            .generate_image(ImageRequest {
                url: &self.url,
                model: &self.model,
                prompt: &full_prompt,
            })
            .await?;

        fs::create_dir_all(&self.photo_dir).with_context(|| {
            format!(
                "Failed to create picture directory '{}'",
                self.photo_dir.display()
            )
        })?;
        let path = self.image_path(Local::now().naive_local());
        fs::write(&path, &image.bytes)
            .with_context(|| format!("Failed to write image '{}'", path.display()))?;
        debug!(path = %path.display(), image_bytes = image.bytes.len(), "saved generated image");

        self.print_result(out, &path, image.revised_prompt.as_deref())
            .context("Failed to write photo result")?;

        Ok(path)
    }

    fn print_result(
        &self,
        out: &mut impl Write,
        path: &Path,
        revised_prompt: Option<&str>,
    ) -> io::Result<()> {
        if self.raw {
            writeln!(out, "{}", path.display())?;
        } else {
            writeln!(out, "image saved to: {}", path.display())?;
            if let Some(revised) = revised_prompt {
                writeln!(out, "revised prompt: {revised}")?;
            }
        }
        out.flush()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use std::fs;
    use std::path::Path;

    use super::PhotoQuerier;
    use crate::gateway::stub::StubBackend;

    fn querier(dir: &Path, format: &str, raw: bool) -> PhotoQuerier {
        PhotoQuerier {
            url: "http://api/v1/images/generations".to_string(),
            model: "dall-e-3".to_string(),
            prompt_format: format.to_string(),
            photo_dir: dir.to_path_buf(),
            photo_prefix: "clai".to_string(),
            raw,
        }
    }

    fn timestamp() -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .and_then(|date| date.and_hms_opt(14, 5, 7))
            .expect("timestamp should be valid")
    }

    #[test]
    fn format_prompt_fills_placeholder() {
        let photo = querier(Path::new("/tmp"), "draw '{}' simply", false);
        assert_eq!(photo.format_prompt("a fox"), "draw 'a fox' simply");
    }

    #[test]
    fn format_prompt_appends_without_placeholder() {
        let photo = querier(Path::new("/tmp"), "watercolor:", false);
        assert_eq!(photo.format_prompt("a fox"), "watercolor: a fox");
        let photo = querier(Path::new("/tmp"), "", false);
        assert_eq!(photo.format_prompt("a fox"), "a fox");
    }

    #[test]
    fn image_path_uses_prefix_and_timestamp() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let photo = querier(dir.path(), "{}", false);
        assert_eq!(
            photo.image_path(timestamp()),
            dir.path().join("clai_20240309_140507.png")
        );
    }

    #[test]
    fn image_path_skips_existing_files() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        fs::write(dir.path().join("clai_20240309_140507.png"), b"old").unwrap();
        let photo = querier(dir.path(), "{}", false);
        assert_eq!(
            photo.image_path(timestamp()),
            dir.path().join("clai_20240309_140507_1.png")
        );
    }

    #[tokio::test]
    async fn query_writes_image_and_reports_path() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let photo_dir = dir.path().join("nested").join("pics");
        let photo = querier(&photo_dir, "simple: {}", false);
        let backend = StubBackend::image(b"\x89PNG fake", Some("a calm fox"));
        let mut out = Vec::new();

        let path = photo
            .query(&backend, "fox", &mut out)
            .await
            .expect("photo query should succeed");

        assert!(path.starts_with(&photo_dir));
        assert_eq!(fs::read(&path).unwrap(), b"\x89PNG fake");
        let printed = String::from_utf8(out).unwrap();
        assert!(printed.contains(&format!("image saved to: {}", path.display())));
        assert!(printed.contains("revised prompt: a calm fox"));

        let images = backend.images.borrow();
        assert_eq!(images[0].prompt, "simple: fox");
        assert_eq!(images[0].model, "dall-e-3");
    }

    #[tokio::test]
    async fn raw_mode_prints_only_path() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let photo = querier(dir.path(), "{}", true);
        let backend = StubBackend::image(b"img", None);
        let mut out = Vec::new();

        let path = photo
            .query(&backend, "fox", &mut out)
            .await
            .expect("photo query should succeed");

        assert_eq!(String::from_utf8(out).unwrap(), format!("{}\n", path.display()));
    }

    #[tokio::test]
    async fn backend_errors_leave_directory_untouched() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let photo_dir = dir.path().join("never");
        let photo = querier(&photo_dir, "{}", false);
        let backend = StubBackend::err("content policy violation");

        let err = photo
            .query(&backend, "fox", &mut std::io::sink())
            .await
            .expect_err("backend failure should propagate");

        assert!(format!("{err:#}").contains("content policy violation"));
        assert!(!photo_dir.exists());
    }
}
