pub mod fanout;
pub mod profile;
pub mod provider;
pub mod static_provider;

pub use fanout::{Fanout, NamingFanout, NamingResult, Slot};
pub use profile::{DomainProfile, DomainResolver, SocialProfile};
pub use provider::{EnsProfileSource, NamingProvider, ProviderId};
pub use static_provider::{
    NameRecord, NameTable, ProfileRecord, StaticNamingProvider, StaticProfileSource,
};
