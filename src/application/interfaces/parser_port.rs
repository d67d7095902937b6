use async_trait::async_trait;

use crate::domain::{DomainError, Language, ParseResult};

/// External parser adapter boundary (§4.3). The core treats implementors as
/// a black box: it only ever consumes the returned `ParseResult`.
#[async_trait]
pub trait SourceParser: Send + Sync {
    async fn parse_file(
        &self,
        content: &str,
        file_path: &str,
        language: Language,
    ) -> Result<ParseResult, DomainError>;

    fn supported_languages(&self) -> Vec<Language>;

    fn supports_language(&self, language: Language) -> bool {
        self.supported_languages().contains(&language)
    }
}
