//! Content-Type and Cache-Control derived from the file extension.
//!
//! | tier      | extensions                         | Cache-Control                          |
//! |-----------|------------------------------------|----------------------------------------|
//! | Document  | html, htm                          | `no-cache`                             |
//! | Feed      | xml, rss, atom                     | `public, max-age=3600`                 |
//! | Immutable | css, js, images, fonts, media      | `public, max-age=31536000, immutable`  |
//! | Default   | everything else                    | `public, max-age=86400`                |

/// Caching tier of an output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTier {
    Document,
    Feed,
    Immutable,
    Default,
}

impl CacheTier {
    pub fn for_path(path: &str) -> Self {
        match extension(path).as_deref() {
            Some("html" | "htm") => CacheTier::Document,
            Some("xml" | "rss" | "atom") => CacheTier::Feed,
            Some(
                "css" | "js" | "mjs" | "png" | "jpg" | "jpeg" | "gif" | "webp" | "avif" | "svg"
                | "ico" | "woff" | "woff2" | "ttf" | "otf" | "eot" | "mp4" | "webm" | "mp3",
            ) => CacheTier::Immutable,
            _ => CacheTier::Default,
        }
    }

    pub fn cache_control(self) -> &'static str {
        match self {
            CacheTier::Document => "no-cache",
            CacheTier::Feed => "public, max-age=3600",
            CacheTier::Immutable => "public, max-age=31536000, immutable",
            CacheTier::Default => "public, max-age=86400",
        }
    }
}

/// Headers attached to an uploaded object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHeaders {
    pub content_type: &'static str,
    pub cache_control: &'static str,
}

impl ObjectHeaders {
    pub fn for_path(path: &str) -> Self {
        Self {
            content_type: content_type(path),
            cache_control: CacheTier::for_path(path).cache_control(),
        }
    }

    /// The control file must always be revalidated.
    pub fn control_file() -> Self {
        Self {
            content_type: "application/json",
            cache_control: "no-cache",
        }
    }
}

pub fn content_type(path: &str) -> &'static str {
    match extension(path).as_deref() {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "application/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("xml") => "application/xml",
        Some("rss") => "application/rss+xml",
        Some("atom") => "application/atom+xml",
        Some("txt") => "text/plain; charset=utf-8",
        Some("md") => "text/markdown; charset=utf-8",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("avif") => "image/avif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("otf") => "font/otf",
        Some("eot") => "application/vnd.ms-fontobject",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mp3") => "audio/mpeg",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

fn extension(path: &str) -> Option<String> {
    let name = path.rsplit('/').next().unwrap_or(path);
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
