pub mod completion;
pub mod context;
pub mod credentials;
pub mod mock;
pub mod notifier;
pub mod repository;

pub use completion::{CompletionProvider, OpenAiChatProvider, ProviderError};
pub use credentials::CredentialPool;
pub use notifier::{LeadDetector, LeadNotifier, TelegramSink};
pub use repository::{HttpTenantStore, TenantStore};
