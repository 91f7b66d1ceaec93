//! Provider adapter contract and request types

mod credentials;
mod provider;
mod request;

pub use credentials::{env_var_name, Credentials};
pub use provider::{single_fragment, FragmentStream, ProviderAdapter};
pub use request::{GenerationParams, PromptRequest};

#[cfg(test)]
pub use provider::mock::{MockProviderAdapter, MockReply};
