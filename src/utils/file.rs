use std::path::Path;

pub fn get_extension(path: &str) -> Option<String> {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_lowercase())
}

/// 按扩展名推断内容类型；识别不了的一律按二进制流处理
pub fn guess_content_type(filename: &str) -> String {
    let mime = match get_extension(filename).as_deref() {
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("txt") => "text/plain",
        Some("md") => "text/markdown",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    };

    mime.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_extension() {
        assert_eq!(get_extension("report.PDF").as_deref(), Some("pdf"));
        assert_eq!(get_extension("archive.tar.gz").as_deref(), Some("gz"));
        assert_eq!(get_extension("no_extension"), None);
    }

    #[test]
    fn test_guess_content_type() {
        assert_eq!(guess_content_type("report.pdf"), "application/pdf");
        assert_eq!(guess_content_type("photo.JPG"), "image/jpeg");
        assert_eq!(guess_content_type("blob"), "application/octet-stream");
    }
}
