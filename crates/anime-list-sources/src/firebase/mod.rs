pub mod auth;
pub mod firestore;
pub mod storage;
pub mod value;

pub use auth::FirebaseAuth;
pub use firestore::FirestoreClient;
pub use storage::FirebaseStorage;
