pub trait TextSanitizer: Send + Sync {
    fn sanitize(&self, text: &str) -> String;
}
