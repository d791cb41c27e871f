use std::path::{Path, PathBuf};

use regex::Regex;

/// The image the next analysis will run against. At most one source is
/// active; a selected file wins over a URL at submission time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    File(PathBuf),
    Url(String),
}

impl ImageSource {
    /// Human-readable label stored with history records.
    pub fn label(&self) -> String {
        match self {
            ImageSource::File(path) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                format!("File: {}", name)
            }
            ImageSource::Url(url) => format!("URL: {}", url),
        }
    }

    /// Form tag sent as the `image_source` field.
    pub fn kind(&self) -> &'static str {
        match self {
            ImageSource::File(_) => "file",
            ImageSource::Url(_) => "url",
        }
    }
}

/// Classify pasted or confirmed text as an image source.
///
/// An existing local path becomes a file source, an `http(s)` URL a URL
/// source. Anything else is sniffed for an embedded `<img src="...">`
/// fragment (terminals hand over raw HTML when an image is dragged out of
/// a browser). Unclassifiable text yields `None` and the caller ignores it.
pub fn classify_text(text: &str) -> Option<ImageSource> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        return Some(ImageSource::Url(trimmed.to_string()));
    }
    let path = Path::new(trimmed);
    if path.is_file() {
        return Some(ImageSource::File(path.to_path_buf()));
    }
    extract_img_src(trimmed).map(ImageSource::Url)
}

/// Best-effort extraction of the `src` attribute from an `<img>` fragment,
/// quoted or bare.
pub fn extract_img_src(html: &str) -> Option<String> {
    let re = Regex::new(r#"<img[^>]+src="?([^"\s>]+)"?"#).ok()?;
    re.captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_classify_url() {
        let source = classify_text("https://example.com/cat.jpg").unwrap();
        assert_eq!(source, ImageSource::Url("https://example.com/cat.jpg".to_string()));
        assert_eq!(source.kind(), "url");
    }

    #[test]
    fn test_classify_existing_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"not really an image").unwrap();
        let path_str = file.path().to_string_lossy().into_owned();

        let source = classify_text(&path_str).unwrap();
        assert_eq!(source, ImageSource::File(file.path().to_path_buf()));
        assert_eq!(source.kind(), "file");
    }

    #[test]
    fn test_classify_img_fragment_quoted() {
        let html = r#"<div><img class="photo" src="https://example.com/a.png" alt="a"></div>"#;
        let source = classify_text(html).unwrap();
        assert_eq!(source, ImageSource::Url("https://example.com/a.png".to_string()));
    }

    #[test]
    fn test_classify_img_fragment_unquoted() {
        let html = "<img src=https://example.com/b.gif>";
        assert_eq!(
            extract_img_src(html),
            Some("https://example.com/b.gif".to_string())
        );
    }

    #[test]
    fn test_classify_garbage_is_none() {
        assert_eq!(classify_text("just some words"), None);
        assert_eq!(classify_text("   "), None);
        assert_eq!(classify_text("/no/such/file/anywhere.png"), None);
    }

    #[test]
    fn test_label_uses_file_name() {
        let source = ImageSource::File(PathBuf::from("/tmp/photos/cat.jpg"));
        assert_eq!(source.label(), "File: cat.jpg");

        let source = ImageSource::Url("https://example.com/cat.jpg".to_string());
        assert_eq!(source.label(), "URL: https://example.com/cat.jpg");
    }
}
