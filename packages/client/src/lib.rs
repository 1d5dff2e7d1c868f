// ABOUTME: Client side of DroneGuide: API access, generation polling and local identity
// ABOUTME: Used by the command line tool and usable from any Rust front end

pub mod api;
pub mod guard;
pub mod identity;
pub mod poller;

pub use api::{
    ApiClient, ClientError, ClientResult, FetchedImage, GenerationApi, StartedGeneration,
    TaskProgress,
};
pub use guard::{Channel, ChannelGuard, ChannelLocks};
pub use identity::{Identity, IdentityError, IdentityStore};
pub use poller::{
    cancel_pair, CancelHandle, CancelToken, GenerationPoller, PollError, PollerConfig,
    MIN_POLL_INTERVAL,
};
