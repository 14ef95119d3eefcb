pub(crate) async fn hello() -> &'static str {
    "Hello, I'm test server!"
}
