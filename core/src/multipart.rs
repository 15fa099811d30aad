//! File parts for `multipart/form-data` uploads.
//!
//! The form travels to the transport as plain data; `UreqTransport` encodes
//! it with ureq's multipart support, which owns the boundary and framing.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    /// Form field name.
    pub name: String,
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartForm {
    parts: Vec<FilePart>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, name: &str, filename: &str, content_type: &str, data: Vec<u8>) -> Self {
        self.parts.push(FilePart {
            name: name.to_string(),
            filename: filename.to_string(),
            content_type: content_type.to_string(),
            data,
        });
        self
    }

    pub fn parts(&self) -> &[FilePart] {
        &self.parts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parts_keep_insertion_order() {
        let form = MultipartForm::new()
            .file("file", "a.pdf", "application/pdf", b"%PDF".to_vec())
            .file("file", "b.txt", "text/plain", b"hi".to_vec());

        let names: Vec<&str> = form.parts().iter().map(|p| p.filename.as_str()).collect();
        assert_eq!(names, vec!["a.pdf", "b.txt"]);
        assert_eq!(form.parts()[0].content_type, "application/pdf");
        assert_eq!(form.parts()[1].data, b"hi");
    }
}
