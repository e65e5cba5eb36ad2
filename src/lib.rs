pub mod application;
pub mod cli;
pub mod connector;
pub mod domain;

pub use application::{
    classify_response, classify_transport_error, extract_content, ChatSessionUseCase,
    DispatchCompletionUseCase, DispatchDefaults, HttpResponse, HttpTransport, TransportError,
};

pub use connector::{
    ChatConfig, ConnectionInfo, MockTransport, RecordedCall, ReqwestTransport, TerminalRenderer,
};

pub use domain::{
    parse_entity_id, ChatEntry, ChatHistory, CompletionOutcome, CompletionRequest, Dispatch,
    DomainError, Message, Role, Threat,
};
