pub mod resolver;
pub mod state;

pub use resolver::{ImportSink, Resolver, ResolverContext};
pub use state::{
    Command, Event, Generation, Observation, Phase, Provenance, ResolutionState, ResolvedAddress,
    Status, StatusFlags,
};
