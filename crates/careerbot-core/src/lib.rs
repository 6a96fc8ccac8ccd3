pub mod auth;
pub mod config;
pub mod connection;
pub mod controller;
pub mod input;
pub mod protocol;
pub mod question;
pub mod session;
pub mod state;
pub mod view;

// Re-export main types for convenience
pub use auth::{AuthClient, AuthError, AuthErrorKind};
pub use config::Config;
pub use connection::ChatSession;
pub use controller::{ChatController, Effect, SessionEvent, TransportEvent};
pub use input::{Affordance, InputRejection, QuestionInput};
pub use protocol::{parse_event, ProtocolError, ServerEvent};
pub use question::{Constraints, Progress, QuestionDescriptor, QuestionType};
pub use session::{AuthState, FileTokenStorage, MemoryTokenStorage, SessionStore, TokenStorage};
pub use state::{ChatMessage, ConnectionState, MessageKind};
pub use view::{route, AuthField, AuthMode, AuthRequest, AuthScreen, View};
