/// Fallback media type for members whose extension is unknown.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Media type of an archive member, derived from its file name extension.
pub fn mime_type_for(name: &str) -> &'static str {
    let file_name = name.rsplit('/').next().unwrap_or(name);
    let Some((_, ext)) = file_name.rsplit_once('.') else {
        return DEFAULT_MIME_TYPE;
    };

    match ext.to_ascii_lowercase().as_str() {
        "zip" => "application/zip",
        "jar" | "war" | "ear" => "application/java-archive",
        "class" => "application/java-vm",
        "xml" | "pom" | "xsd" => "application/xml",
        "json" => "application/json",
        "js" => "text/javascript",
        "txt" | "mf" | "properties" | "md" | "sha1" | "md5" => "text/plain",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "csv" => "text/csv",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "pdf" => "application/pdf",
        "gz" | "tgz" => "application/gzip",
        "tar" => "application/x-tar",
        _ => DEFAULT_MIME_TYPE,
    }
}
