//! Repository layer for the chat service.
//!
//! PostgreSQL access for the `participants` and `messages` tables. Handlers
//! reach these through the `ChatStore` seam in `services`.

pub mod messages;
pub mod participants;

pub use messages::MessagesRepository;
pub use participants::ParticipantsRepository;
