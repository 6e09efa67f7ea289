use url::Url;

use crate::fetch::media_type;

/// Used when neither the response nor the URL names a format.
pub const DEFAULT_EXTENSION: &str = "jpg";

/// Extensions the assembler accepts as pages.
pub const PAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

/// Picks the stored extension for a downloaded image: declared content type,
/// then the URL path's extension, then [`DEFAULT_EXTENSION`]. Always lowercase.
pub fn infer_extension(content_type: Option<&str>, url: &Url) -> String {
    content_type
        .and_then(extension_for_content_type)
        .map(str::to_string)
        .or_else(|| extension_from_path(url.path()))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

pub fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    let media = media_type(content_type).to_ascii_lowercase();
    let ext = match media.as_str() {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => "jpg",
        "image/png" | "image/apng" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/bmp" | "image/x-ms-bmp" => "bmp",
        "image/svg+xml" => "svg",
        "image/tiff" => "tiff",
        "image/avif" => "avif",
        "image/heic" => "heic",
        "image/x-icon" | "image/vnd.microsoft.icon" => "ico",
        _ => return None,
    };
    Some(ext)
}

fn extension_from_path(path: &str) -> Option<String> {
    let segment = path.rsplit('/').next()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Case-insensitive check against [`PAGE_EXTENSIONS`].
pub fn is_page_extension(ext: &str) -> bool {
    PAGE_EXTENSIONS
        .iter()
        .any(|candidate| candidate.eq_ignore_ascii_case(ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn content_type_wins() {
        let ext = infer_extension(Some("image/png; charset=binary"), &url("https://h/a.gif"));
        assert_eq!(ext, "png");
        assert_eq!(infer_extension(Some("IMAGE/JPEG"), &url("https://h/a")), "jpg");
    }

    #[test]
    fn unmappable_content_type_falls_back_to_path() {
        let ext = infer_extension(Some("application/octet-stream"), &url("https://h/p/A.WEBP"));
        assert_eq!(ext, "webp");
        assert_eq!(infer_extension(None, &url("https://h/p/b.gif?wx_fmt=png")), "gif");
    }

    #[test]
    fn defaults_to_jpg() {
        assert_eq!(infer_extension(None, &url("https://mmbiz.qpic.cn/x/640")), "jpg");
        assert_eq!(infer_extension(None, &url("https://h/.hidden")), "jpg");
        assert_eq!(infer_extension(Some("text/html"), &url("https://h/")), "jpg");
    }

    #[test]
    fn page_extensions_ignore_case() {
        assert!(is_page_extension("JPG"));
        assert!(is_page_extension("webp"));
        assert!(!is_page_extension("pdf"));
        assert!(!is_page_extension("json"));
    }
}
