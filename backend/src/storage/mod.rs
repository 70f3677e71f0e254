//! Local storage of managed repositories.

pub mod managed_content;

pub use managed_content::ManagedRepositoryContent;
