pub mod anilist;
pub mod document;
pub mod error;
pub mod factory;
pub mod firebase;
pub mod http;
pub mod mal;
pub mod memory;
pub mod traits;

pub use anilist::AniListClient;
pub use document::{Document, DocumentPath, DocumentUpdate, Snapshot, StoredDocument, Subscription};
pub use error::{SourceError, SourceResult};
pub use factory::{FirebaseServices, ServiceFactory};
pub use firebase::{FirebaseAuth, FirebaseStorage, FirestoreClient};
pub use mal::MalClient;
pub use memory::{LocalIdentity, MemoryDocumentStore, MemoryObjectStore};
pub use traits::{DocumentStore, IdentityProvider, ObjectStore, StoredObject};
