/// Small fixed extension-to-MIME-type map (§4.7: "content-type inferred from
/// extension via a small internal map"). Deliberately not backed by a
/// crate like `mime_guess` — the set of output extensions a tool handler
/// can produce is closed and short.
pub fn content_type_for_ext(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "mp4" => "video/mp4",
        "glb" => "model/gltf-binary",
        "gltf" => "model/gltf+json",
        "obj" => "model/obj",
        "zip" => "application/zip",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extension_maps_to_its_mime_type() {
        assert_eq!(content_type_for_ext("png"), "image/png");
        assert_eq!(content_type_for_ext("JPG"), "image/jpeg");
    }

    #[test]
    fn unknown_extension_falls_back_to_octet_stream() {
        assert_eq!(content_type_for_ext("xyz"), "application/octet-stream");
    }
}
