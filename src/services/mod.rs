pub mod ads;
pub mod aggregator;
pub mod archive;
pub mod credentials;
pub mod graph;
pub mod powerbi;

pub use ads::{AdsError, AdsSyncService, SyncOutcome, SyncRequest};
pub use aggregator::{AggregateError, AggregatedRecord, Aggregator, PageRecord};
pub use archive::{ArchiveError, ArchiveStore, AzureBlobStore, DisabledArchiveStore, MemoryArchiveStore};
pub use credentials::CredentialVerifier;
pub use graph::{FacebookGraphClient, GraphApi};
pub use powerbi::{EmbedConfig, PowerBiClient};
