//! Provider traits, concrete providers, and the factory/registry pair that
//! constructs and tracks them.
//!
//! - [`traits`]: the `Provider` lifecycle surface plus `AiProvider` and
//!   `DataProvider` capabilities
//! - [`factory`]: type tag + config → provider instance
//! - [`registry`]: live instances, health, usage and selection
//! - [`mock`], [`openai`], [`espn`]: built-in implementations
//! - [`cache`]: TTL response cache wrapped around data providers

pub mod cache;
pub mod espn;
pub mod factory;
pub mod health;
mod http;
pub mod mock;
pub mod openai;
pub mod registry;
pub mod retry;
mod state;
pub mod traits;

pub use cache::CachingDataProvider;
pub use espn::EspnDataProvider;
pub use factory::{AiCreator, DataCreator, FactoryConfig, ProviderFactory};
pub use health::RegistryConfig;
pub use mock::{MockAiProvider, MockDataProvider};
pub use openai::OpenAiProvider;
pub use registry::{DEFAULT_PRIORITY, ProviderRegistration, ProviderRegistry, ProviderStats};
pub use retry::RetryConfig;
pub use traits::{AiProvider, DataProvider, Provider, ProviderHandle};
